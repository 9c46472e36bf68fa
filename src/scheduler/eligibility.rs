use chrono::NaiveDate;
use tracing::warn;

use super::types::{CallStats, StaffingLevel};
use crate::calendar;
use crate::config::{AppConfiguration, MonthlySchedulerConfig};
use crate::model::{AcademicYear, CallType, LeaveRequest, LeaveStatus, Resident, RotationType};

/// First failed check, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibilityReason {
    OffService,
    ChiefCallExempt,
    NotOnCoreRotation,
    OnApprovedLeave,
    PostCallRest,
    CallCapReached,
    WeekendCapReached,
    ParoRollingLimit,
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IneligibilityReason::OffService => "not on service",
            IneligibilityReason::ChiefCallExempt => "chief is call-exempt",
            IneligibilityReason::NotOnCoreRotation => "not on the core rotation",
            IneligibilityReason::OnApprovedLeave => "on approved leave",
            IneligibilityReason::PostCallRest => "post-call rest",
            IneligibilityReason::CallCapReached => "call cap reached",
            IneligibilityReason::WeekendCapReached => "weekend cap reached",
            IneligibilityReason::ParoRollingLimit => "PARO 1-in-4 rolling limit",
        };
        f.write_str(s)
    }
}

/// PARO fallback when no hard-cap row matches the rotation length.
pub const DEFAULT_PARO_CAP: u32 = 8;
/// Averaged 1-in-4: at most 7 calls in any trailing 28-day window.
pub const PARO_ROLLING_MAX: u32 = 7;

/// Per-rotation call ceiling: the PARO hard cap intersected with the PGY
/// target under Normal staffing, the PARO cap alone under Shortage.
pub fn max_calls(
    resident: &Resident,
    working_days: u32,
    staffing: StaffingLevel,
    config: &MonthlySchedulerConfig,
) -> u32 {
    if resident.is_chief && resident.call_exempt {
        return 0;
    }
    let paro_cap = config
        .paro_hard_caps
        .iter()
        .find(|cap| cap.min_days <= working_days && working_days <= cap.max_days)
        .map(|cap| cap.calls)
        .unwrap_or(DEFAULT_PARO_CAP);
    let Some(&ratio) = config.call_ratios.get(&resident.pgy_level) else {
        warn!(
            pgy = resident.pgy_level,
            resident = resident.id.as_str(),
            "no call ratio configured; applying PARO cap only"
        );
        return paro_cap;
    };
    let pgy_target = working_days / ratio;
    match staffing {
        StaffingLevel::Normal => paro_cap.min(pgy_target),
        StaffingLevel::Shortage => paro_cap,
    }
}

/// Shared read-only context for eligibility checks during a run.
pub struct EligibilityContext<'a> {
    pub academic_year: &'a AcademicYear,
    pub approved_leave: &'a [LeaveRequest],
    pub config: &'a AppConfiguration,
    pub staffing: StaffingLevel,
}

/// Decides whether `resident` may take a `call_type` call on `date`.
/// Checks short-circuit; the first failure is returned.
pub fn check(
    resident: &Resident,
    date: NaiveDate,
    call_type: CallType,
    stats: &CallStats,
    ctx: &EligibilityContext<'_>,
) -> Result<(), IneligibilityReason> {
    if !resident.on_service {
        return Err(IneligibilityReason::OffService);
    }
    if resident.is_chief && resident.call_exempt {
        return Err(IneligibilityReason::ChiefCallExempt);
    }

    let Some(block) = ctx.academic_year.block_for(date) else {
        return Err(IneligibilityReason::NotOnCoreRotation);
    };
    let on_core = block
        .assignment_for(&resident.id)
        .map(|a| a.rotation_type == RotationType::CoreNsx)
        .unwrap_or(false);
    if !on_core {
        return Err(IneligibilityReason::NotOnCoreRotation);
    }

    let on_leave = ctx.approved_leave.iter().any(|l| {
        l.resident_id == resident.id && l.status == LeaveStatus::Approved && l.spans(date)
    });
    if on_leave {
        return Err(IneligibilityReason::OnApprovedLeave);
    }

    // Days are filled in priority order, not calendar order, so the rest
    // check must hold against calls on either side of the candidate date.
    if stats.adjacent_call(date) {
        return Err(IneligibilityReason::PostCallRest);
    }

    let working_days =
        calendar::working_days(block.start_date, block.end_date, &ctx.config.holidays);
    let cap = max_calls(
        resident,
        working_days,
        ctx.staffing,
        &ctx.config.monthly_scheduler,
    );
    if stats.total_calls >= cap {
        return Err(IneligibilityReason::CallCapReached);
    }

    if call_type == CallType::Weekend
        && stats.weekend_calls >= ctx.config.monthly_scheduler.max_weekends_per_rotation
    {
        return Err(IneligibilityReason::WeekendCapReached);
    }

    if stats.recent_calls(date) + 1 > PARO_ROLLING_MAX {
        return Err(IneligibilityReason::ParoRollingLimit);
    }

    Ok(())
}
