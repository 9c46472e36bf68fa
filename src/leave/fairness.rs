use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{LeaveRequest, LeaveStatus, Resident, ResidentId};

const TRAILING_WINDOW_DAYS: i64 = 183;
const DEFAULT_PEER_AVERAGE: f64 = 10.0;

/// How the request sits against the resident's recent leave history and
/// their peer group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessAssessment {
    /// 0..=100; higher favors granting.
    pub score: f64,
    pub recent_days_off: i64,
    /// Approval rate of the resident's past requests landing in the same
    /// calendar month; 0.5 when there is no history.
    pub historical_rate: f64,
    /// Recent days off relative to the peer average.
    pub peer_comparison: f64,
}

/// Scores fairness for `request`. Peers share PGY level and specialty.
pub fn assess(
    request: &LeaveRequest,
    resident: &Resident,
    roster: &[Resident],
    all_leave: &[LeaveRequest],
    today: NaiveDate,
) -> FairnessAssessment {
    let recent_days_off = recent_approved_days(&resident.id, all_leave, today);

    let mut approved = 0u32;
    let mut decided = 0u32;
    for past in all_leave {
        if past.resident_id != resident.id || past.id == request.id {
            continue;
        }
        if past.start_date.month() != request.start_date.month() {
            continue;
        }
        decided += 1;
        if past.status == LeaveStatus::Approved {
            approved += 1;
        }
    }
    let historical_rate = if decided == 0 {
        0.5
    } else {
        f64::from(approved) / f64::from(decided)
    };

    let peers: Vec<&Resident> = roster
        .iter()
        .filter(|r| {
            r.id != resident.id
                && r.pgy_level == resident.pgy_level
                && r.specialty == resident.specialty
        })
        .collect();
    let peer_average = if peers.is_empty() {
        DEFAULT_PEER_AVERAGE
    } else {
        let sum: i64 = peers
            .iter()
            .map(|p| recent_approved_days(&p.id, all_leave, today))
            .sum();
        let avg = sum as f64 / peers.len() as f64;
        if avg > 0.0 {
            avg
        } else {
            DEFAULT_PEER_AVERAGE
        }
    };
    let peer_comparison = recent_days_off as f64 / peer_average;

    let mut score = 100.0;
    if recent_days_off > 15 {
        score -= 30.0;
    } else if recent_days_off > 10 {
        score -= 20.0;
    } else if recent_days_off > 5 {
        score -= 10.0;
    }
    if peer_comparison > 1.5 {
        score -= 20.0;
    } else if peer_comparison > 1.2 {
        score -= 10.0;
    }
    if peer_comparison < 0.5 {
        score += 10.0;
    }
    score += 2.0 * f64::from(resident.pgy_level);
    score = score.clamp(0.0, 100.0);

    FairnessAssessment {
        score,
        recent_days_off,
        historical_rate,
        peer_comparison,
    }
}

/// Approved days off for one resident over the trailing six months.
fn recent_approved_days(resident: &ResidentId, all_leave: &[LeaveRequest], today: NaiveDate) -> i64 {
    let window_start = today - Duration::days(TRAILING_WINDOW_DAYS);
    all_leave
        .iter()
        .filter(|l| {
            l.resident_id == *resident
                && l.status == LeaveStatus::Approved
                && l.start_date >= window_start
                && l.start_date <= today
        })
        .map(|l| l.days())
        .sum()
}
