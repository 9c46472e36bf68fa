use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::model::{DateRange, LeaveRequest, LeaveStatus, Resident};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// How thin the service would run if the leave were granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageImpact {
    pub total_residents: u32,
    pub overlapping_leave: u32,
    pub available_residents: u32,
    pub ratio: f64,
    pub risk: RiskLevel,
}

/// Assesses coverage for `range` were the requester away. Peers are the
/// on-service residents sharing the requester's specialty (requester
/// included in the total). Long requests escalate the risk: more than two
/// weekend days raises Low to Medium, more than four forces High.
pub fn assess(
    requester: &Resident,
    roster: &[Resident],
    all_leave: &[LeaveRequest],
    range: DateRange,
    weekend_definition: &[Weekday],
) -> CoverageImpact {
    let peers: Vec<&Resident> = roster
        .iter()
        .filter(|r| r.on_service && r.specialty == requester.specialty)
        .collect();
    let total = peers.len() as u32;

    let overlapping = peers
        .iter()
        .filter(|peer| {
            peer.id != requester.id
                && all_leave.iter().any(|l| {
                    l.resident_id == peer.id
                        && l.status == LeaveStatus::Approved
                        && l.overlaps(range.start, range.end)
                })
        })
        .count() as u32;

    let available = total.saturating_sub(overlapping).saturating_sub(1);
    let ratio = if total == 0 {
        0.0
    } else {
        f64::from(available) / f64::from(total)
    };

    let mut risk = if ratio >= 0.8 {
        RiskLevel::Low
    } else if ratio >= 0.6 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    let weekend_days = calendar::iter_days(range.start, range.end)
        .filter(|d| calendar::is_weekend(*d, weekend_definition))
        .count();
    if weekend_days > 4 {
        risk = RiskLevel::High;
    } else if weekend_days > 2 && risk == RiskLevel::Low {
        risk = RiskLevel::Medium;
    }

    CoverageImpact {
        total_residents: total,
        overlapping_leave: overlapping,
        available_residents: available,
        ratio,
        risk,
    }
}
