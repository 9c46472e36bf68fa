use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::model::{CallAssignment, ClinicalDuty, ClinicalSlot, DateRange, ResidentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    Call,
    OperatingRoom,
    Clinic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
}

/// A scheduled duty inside the requested leave window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub kind: ConflictKind,
    pub date: NaiveDate,
    pub description: String,
    pub severity: Severity,
}

/// Scans every day of `range` against the call and clinical schedules.
/// Calls and OR commitments are High severity; clinics are Medium.
/// Post-call markers are rest, not duties, and never conflict.
pub fn scan(
    resident: &ResidentId,
    range: DateRange,
    calls: &[CallAssignment],
    clinical: &[ClinicalSlot],
) -> Vec<ScheduleConflict> {
    let mut out = Vec::new();
    for date in calendar::iter_days(range.start, range.end) {
        for call in calls {
            if call.resident_id != *resident || call.date != date || call.is_post_call() {
                continue;
            }
            out.push(ScheduleConflict {
                kind: ConflictKind::Call,
                date,
                description: format!("{} call on {}", call.call_type, date),
                severity: Severity::High,
            });
        }
        for slot in clinical {
            if slot.resident_id != *resident || slot.date != date {
                continue;
            }
            let (kind, severity, what) = match slot.duty {
                ClinicalDuty::OperatingRoom => {
                    (ConflictKind::OperatingRoom, Severity::High, "OR duty")
                }
                ClinicalDuty::Clinic => (ConflictKind::Clinic, Severity::Medium, "clinic"),
            };
            out.push(ScheduleConflict {
                kind,
                date,
                description: format!("{what} ({}) on {date}", slot.description),
                severity,
            });
        }
    }
    out
}
