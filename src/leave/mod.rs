mod conflicts;
mod coverage;
mod fairness;
mod policy;

pub use conflicts::{ConflictKind, ScheduleConflict, Severity};
pub use coverage::{CoverageImpact, RiskLevel};
pub use fairness::FairnessAssessment;
pub use policy::PolicyCompliance;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfiguration;
use crate::model::{
    CallAssignment, ClinicalSlot, DateRange, LeaveRequest, LeaveStatus, ReportId, RequestId,
    Resident,
};

const ALTERNATIVE_SEARCH_DAYS: i64 = 14;
const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Approve,
    Deny,
    FlagForReview,
}

impl Recommendation {
    /// The request status this recommendation transitions to.
    pub fn to_status(self) -> LeaveStatus {
        match self {
            Recommendation::Approve => LeaveStatus::PendingApproval,
            Recommendation::Deny => LeaveStatus::Denied,
            Recommendation::FlagForReview => LeaveStatus::FlaggedForReview,
        }
    }
}

/// Write-once analysis record for one leave request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveAnalysisReport {
    pub id: ReportId,
    pub request_id: RequestId,
    pub coverage: CoverageImpact,
    pub fairness: FairnessAssessment,
    pub conflicts: Vec<ScheduleConflict>,
    pub policy: PolicyCompliance,
    pub alternative_dates: Vec<DateRange>,
    pub recommendation: Recommendation,
    pub rationale: String,
    pub version: u32,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("request {0} is not pending analysis")]
    NotPending(String),
    #[error("request {request} names unknown resident {resident}")]
    UnknownResident { request: String, resident: String },
    #[error("request {0} has an inverted date range")]
    InvalidRange(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The six externally-fetched reads, joined by the caller before analysis.
/// Analysis itself is synchronous and deterministic.
pub struct AnalysisInput<'a> {
    pub request: &'a LeaveRequest,
    pub roster: &'a [Resident],
    pub all_leave: &'a [LeaveRequest],
    pub call_schedule: &'a [CallAssignment],
    pub clinical_schedule: &'a [ClinicalSlot],
    pub config: &'a AppConfiguration,
    pub today: NaiveDate,
}

/// Runs the four assessments and synthesizes a recommendation. The caller
/// persists the report and the status transition together.
pub fn analyze(input: &AnalysisInput<'_>) -> Result<LeaveAnalysisReport, AnalysisError> {
    let request = input.request;
    if request.status != LeaveStatus::PendingAnalysis {
        return Err(AnalysisError::NotPending(request.id.as_str().to_string()));
    }
    let resident = input
        .roster
        .iter()
        .find(|r| r.id == request.resident_id)
        .ok_or_else(|| AnalysisError::UnknownResident {
            request: request.id.as_str().to_string(),
            resident: request.resident_id.as_str().to_string(),
        })?;
    let range = DateRange::new(request.start_date, request.end_date)
        .map_err(|_| AnalysisError::InvalidRange(request.id.as_str().to_string()))?;

    let weekend_definition = &input.config.monthly_scheduler.weekend_definition;
    let coverage = coverage::assess(
        resident,
        input.roster,
        input.all_leave,
        range,
        weekend_definition,
    );
    let fairness = fairness::assess(request, resident, input.roster, input.all_leave, input.today);
    let conflicts = conflicts::scan(
        &resident.id,
        range,
        input.call_schedule,
        input.clinical_schedule,
    );
    let policy = policy::check(
        request,
        input.all_leave,
        &input.config.leave_policy,
        input.today,
    );

    let (recommendation, rationale) =
        synthesize(&coverage, &fairness, &conflicts, &policy);

    let alternative_dates = if recommendation == Recommendation::Approve {
        Vec::new()
    } else {
        find_alternatives(resident, input, range, coverage.ratio)
    };

    Ok(LeaveAnalysisReport {
        id: ReportId::random(),
        request_id: request.id.clone(),
        coverage,
        fairness,
        conflicts,
        policy,
        alternative_dates,
        recommendation,
        rationale,
        version: 1,
    })
}

/// First matching rule wins; anything short of a denial but carrying a
/// concern goes to human review.
fn synthesize(
    coverage: &CoverageImpact,
    fairness: &FairnessAssessment,
    conflicts: &[ScheduleConflict],
    policy: &PolicyCompliance,
) -> (Recommendation, String) {
    if let Some(conflict) = conflicts.iter().find(|c| c.severity == Severity::High) {
        return (
            Recommendation::Deny,
            format!("conflicts with existing schedule: {}", conflict.description),
        );
    }
    if policy.violations.len() >= 2 {
        return (
            Recommendation::Deny,
            format!("multiple policy violations: {}", policy.violations.join("; ")),
        );
    }
    if coverage.risk == RiskLevel::High && coverage.ratio < 0.5 {
        return (
            Recommendation::Deny,
            format!(
                "coverage would drop to {} of {} residents",
                coverage.available_residents, coverage.total_residents
            ),
        );
    }

    let mut concerns = Vec::new();
    if coverage.risk == RiskLevel::Medium {
        concerns.push("medium coverage risk");
    }
    if fairness.score < 40.0 {
        concerns.push("low fairness score");
    }
    if !conflicts.is_empty() {
        concerns.push("schedule conflicts");
    }
    if !policy.compliant {
        concerns.push("policy violation");
    }

    if concerns.is_empty() {
        (
            Recommendation::Approve,
            "no conflicts, adequate coverage, policy compliant".to_string(),
        )
    } else {
        (
            Recommendation::FlagForReview,
            format!("needs review: {}", concerns.join(", ")),
        )
    }
}

/// Scans +/- 14 days for same-length windows disjoint from the request
/// whose coverage comes out Low and strictly better than the original.
fn find_alternatives(
    resident: &Resident,
    input: &AnalysisInput<'_>,
    original: DateRange,
    current_ratio: f64,
) -> Vec<DateRange> {
    let weekend_definition = &input.config.monthly_scheduler.weekend_definition;
    let mut out = Vec::new();
    for offset in -ALTERNATIVE_SEARCH_DAYS..=ALTERNATIVE_SEARCH_DAYS {
        if offset == 0 {
            continue;
        }
        let start = original.start + Duration::days(offset);
        let end = original.end + Duration::days(offset);
        let Ok(candidate) = DateRange::new(start, end) else {
            continue;
        };
        if candidate.overlaps(&original) {
            continue;
        }
        let impact = coverage::assess(
            resident,
            input.roster,
            input.all_leave,
            candidate,
            weekend_definition,
        );
        if impact.risk == RiskLevel::Low && impact.ratio > current_ratio {
            out.push(candidate);
            if out.len() == MAX_ALTERNATIVES {
                break;
            }
        }
    }
    out
}
