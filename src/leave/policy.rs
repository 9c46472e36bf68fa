use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::config::LeavePolicy;
use crate::model::{LeaveRequest, LeaveStatus, LeaveType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCompliance {
    pub compliant: bool,
    pub violations: Vec<String>,
}

/// Checks the request against the leave policy: notice period (waived for
/// compassionate leave), consecutive-day ceiling, annual allotment.
pub fn check(
    request: &LeaveRequest,
    resident_history: &[LeaveRequest],
    policy: &LeavePolicy,
    today: NaiveDate,
) -> PolicyCompliance {
    let mut violations = Vec::new();

    let notice = calendar::days_between(today, request.start_date);
    if notice < policy.min_notice_days && request.leave_type != LeaveType::Compassionate {
        violations.push(format!(
            "insufficient notice: {notice} days (minimum {})",
            policy.min_notice_days
        ));
    }

    let requested = request.days();
    if requested > policy.max_consecutive_days {
        violations.push(format!(
            "{requested} consecutive days exceeds the {}-day limit",
            policy.max_consecutive_days
        ));
    }

    let year = request.start_date.year();
    let used: i64 = resident_history
        .iter()
        .filter(|l| {
            l.resident_id == request.resident_id
                && l.id != request.id
                && l.status == LeaveStatus::Approved
                && l.start_date.year() == year
        })
        .map(|l| l.days())
        .sum();
    if used + requested > policy.annual_limit {
        violations.push(format!(
            "annual allotment exceeded: {used} days used, {requested} requested, limit {}",
            policy.annual_limit
        ));
    }

    PolicyCompliance {
        compliant: violations.is_empty(),
        violations,
    }
}
