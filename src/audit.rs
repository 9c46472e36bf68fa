//! Post-generation audit: re-checks a call list against the program rules.
//! Detection only; findings never mutate the schedule.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::config::AppConfiguration;
use crate::model::{AcademicYear, CallAssignment, CallType, LeaveRequest, LeaveStatus, Resident,
    ResidentId, RotationType};
use crate::scheduler::{max_calls, StaffingLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    DoubleCall,
    PostCallViolation,
    LeaveOverlap,
    CallCapExceeded,
    WeekendCapExceeded,
    OffRotationCall,
    ExemptChiefCall,
    TeamMismatch,
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditKind::DoubleCall => "double-call",
            AuditKind::PostCallViolation => "post-call-violation",
            AuditKind::LeaveOverlap => "leave-overlap",
            AuditKind::CallCapExceeded => "call-cap-exceeded",
            AuditKind::WeekendCapExceeded => "weekend-cap-exceeded",
            AuditKind::OffRotationCall => "off-rotation-call",
            AuditKind::ExemptChiefCall => "exempt-chief-call",
            AuditKind::TeamMismatch => "team-mismatch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub resident_id: ResidentId,
    pub date: NaiveDate,
    pub kind: AuditKind,
    pub detail: String,
}

/// Checks every non-post-call assignment against the roster, rotation
/// grid, approved leave and configured caps.
pub fn audit_schedule(
    residents: &[Resident],
    academic_year: &AcademicYear,
    leave_requests: &[LeaveRequest],
    config: &AppConfiguration,
    staffing: StaffingLevel,
    assignments: &[CallAssignment],
) -> Vec<AuditFinding> {
    let mut findings = Vec::new();
    let roster: BTreeMap<&ResidentId, &Resident> =
        residents.iter().map(|r| (&r.id, r)).collect();

    let mut per_resident: BTreeMap<&ResidentId, Vec<&CallAssignment>> = BTreeMap::new();
    for call in assignments.iter().filter(|a| !a.is_post_call()) {
        per_resident.entry(&call.resident_id).or_default().push(call);
    }

    for (resident_id, mut calls) in per_resident {
        calls.sort_by_key(|c| c.date);

        for pair in calls.windows(2) {
            let gap = calendar::days_between(pair[0].date, pair[1].date);
            if gap == 0 {
                findings.push(AuditFinding {
                    resident_id: (*resident_id).clone(),
                    date: pair[1].date,
                    kind: AuditKind::DoubleCall,
                    detail: format!("two calls on {}", pair[1].date),
                });
            } else if gap == 1 {
                findings.push(AuditFinding {
                    resident_id: (*resident_id).clone(),
                    date: pair[1].date,
                    kind: AuditKind::PostCallViolation,
                    detail: format!("call on {} follows call on {}", pair[1].date, pair[0].date),
                });
            }
        }

        let resident = roster.get(resident_id).copied();
        if let Some(resident) = resident {
            if resident.is_chief && resident.call_exempt && !calls.is_empty() {
                findings.push(AuditFinding {
                    resident_id: (*resident_id).clone(),
                    date: calls[0].date,
                    kind: AuditKind::ExemptChiefCall,
                    detail: format!("{} call(s) held by a call-exempt chief", calls.len()),
                });
            }
        }

        for call in &calls {
            let on_leave = leave_requests.iter().any(|l| {
                l.resident_id == *resident_id
                    && l.status == LeaveStatus::Approved
                    && l.spans(call.date)
            });
            if on_leave {
                findings.push(AuditFinding {
                    resident_id: (*resident_id).clone(),
                    date: call.date,
                    kind: AuditKind::LeaveOverlap,
                    detail: format!("call on {} during approved leave", call.date),
                });
            }

            match academic_year.rotation_for(resident_id, call.date) {
                Some(rotation) => {
                    if rotation.rotation_type != RotationType::CoreNsx {
                        findings.push(AuditFinding {
                            resident_id: (*resident_id).clone(),
                            date: call.date,
                            kind: AuditKind::OffRotationCall,
                            detail: format!("call while on {}", rotation.rotation_name),
                        });
                    }
                    if let (Some(expected), Some(actual)) = (rotation.team, call.team) {
                        if expected != actual {
                            findings.push(AuditFinding {
                                resident_id: (*resident_id).clone(),
                                date: call.date,
                                kind: AuditKind::TeamMismatch,
                                detail: format!(
                                    "call tagged {:?} but block team is {:?}",
                                    actual, expected
                                ),
                            });
                        }
                    }
                }
                None => findings.push(AuditFinding {
                    resident_id: (*resident_id).clone(),
                    date: call.date,
                    kind: AuditKind::OffRotationCall,
                    detail: format!("no rotation covers {}", call.date),
                }),
            }
        }

        if let Some(resident) = resident {
            check_block_caps(
                resident,
                &calls,
                academic_year,
                config,
                staffing,
                &mut findings,
            );
        }
    }

    findings
}

fn check_block_caps(
    resident: &Resident,
    calls: &[&CallAssignment],
    academic_year: &AcademicYear,
    config: &AppConfiguration,
    staffing: StaffingLevel,
    findings: &mut Vec<AuditFinding>,
) {
    for block in &academic_year.blocks {
        let in_block: Vec<&&CallAssignment> =
            calls.iter().filter(|c| block.contains(c.date)).collect();
        if in_block.is_empty() {
            continue;
        }
        let working_days =
            calendar::working_days(block.start_date, block.end_date, &config.holidays);
        let cap = max_calls(resident, working_days, staffing, &config.monthly_scheduler);
        if in_block.len() as u32 > cap {
            findings.push(AuditFinding {
                resident_id: resident.id.clone(),
                date: block.start_date,
                kind: AuditKind::CallCapExceeded,
                detail: format!(
                    "{} calls in block {} exceed cap {}",
                    in_block.len(),
                    block.block_number,
                    cap
                ),
            });
        }
        let weekends = in_block
            .iter()
            .filter(|c| c.call_type == CallType::Weekend)
            .count() as u32;
        if weekends > config.monthly_scheduler.max_weekends_per_rotation {
            findings.push(AuditFinding {
                resident_id: resident.id.clone(),
                date: block.start_date,
                kind: AuditKind::WeekendCapExceeded,
                detail: format!(
                    "{} weekend calls in block {} exceed cap {}",
                    weekends, block.block_number, config.monthly_scheduler.max_weekends_per_rotation
                ),
            });
        }
    }
}
