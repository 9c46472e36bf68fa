use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::types::CallStats;
use crate::calendar;
use crate::model::{AcademicYear, CallType, LeaveRequest, LeaveStatus, Resident, ResidentId};

/// Per-component contributions; `total` is the clamped sum over the base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub fairness: f64,
    pub rest: f64,
    pub seniority: f64,
    pub points_balance: f64,
    pub team_balance: f64,
    pub leave_penalty: f64,
    pub total: f64,
}

const BASE_SCORE: f64 = 100.0;
const PENDING_LEAVE_PENALTY: f64 = -50.0;

/// Scores one eligible resident for a call slot. Averages span all
/// residents of the run, not only the eligible ones.
pub fn score(
    resident: &Resident,
    date: NaiveDate,
    call_type: CallType,
    residents: &[Resident],
    stats: &BTreeMap<ResidentId, CallStats>,
    academic_year: &AcademicYear,
    unsettled_leave: &[LeaveRequest],
) -> ScoreBreakdown {
    let own = stats.get(&resident.id).cloned().unwrap_or_default();
    let n = residents.len().max(1) as f64;
    let total_calls: u32 = stats.values().map(|s| s.total_calls).sum();
    let total_points: u32 = stats.values().map(|s| s.points).sum();
    let avg_calls = f64::from(total_calls) / n;
    let avg_points = f64::from(total_points) / n;

    let fairness = (30.0 - (f64::from(own.total_calls) - avg_calls) * 10.0).max(0.0);

    let rest = match own.last_call_before(date) {
        Some(last) => (calendar::days_between(last, date) as f64 * 3.0).min(30.0),
        None => 30.0,
    };

    let seniority = match call_type {
        CallType::Weekend | CallType::Holiday => 2.0 * f64::from(resident.pgy_level),
        CallType::Night | CallType::PostCall => 0.0,
    };

    let points_balance = (20.0 - (f64::from(own.points) - avg_points)).max(0.0);

    let team_balance = match academic_year.team_for(&resident.id, date) {
        Some(team) => {
            let mut team_total = 0u32;
            let mut team_size = 0u32;
            for r in residents {
                if academic_year.team_for(&r.id, date) == Some(team) {
                    team_size += 1;
                    team_total += stats.get(&r.id).map(|s| s.total_calls).unwrap_or(0);
                }
            }
            if team_size == 0 {
                0.0
            } else {
                let team_avg = f64::from(team_total) / f64::from(team_size);
                (5.0 * (avg_calls - team_avg)).round()
            }
        }
        None => 0.0,
    };

    let has_unsettled = unsettled_leave.iter().any(|l| {
        l.resident_id == resident.id
            && matches!(
                l.status,
                LeaveStatus::PendingAnalysis
                    | LeaveStatus::PendingApproval
                    | LeaveStatus::FlaggedForReview
                    | LeaveStatus::Denied
            )
            && l.spans(date)
    });
    let leave_penalty = if has_unsettled {
        PENDING_LEAVE_PENALTY
    } else {
        0.0
    };

    let total = (BASE_SCORE + fairness + rest + seniority + points_balance + team_balance
        + leave_penalty)
        .max(0.0);

    ScoreBreakdown {
        fairness,
        rest,
        seniority,
        points_balance,
        team_balance,
        leave_penalty,
        total,
    }
}

/// Ordering for candidate selection: score descending, then current call
/// count ascending, then resident id ascending.
pub fn better_candidate(
    a: (&ResidentId, f64, u32),
    b: (&ResidentId, f64, u32),
) -> std::cmp::Ordering {
    let (a_id, a_score, a_calls) = a;
    let (b_id, b_score, b_calls) = b;
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a_calls.cmp(&b_calls))
        .then_with(|| a_id.cmp(b_id))
}
