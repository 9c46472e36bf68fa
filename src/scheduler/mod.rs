pub mod eligibility;
pub mod scoring;
mod types;

pub use eligibility::{max_calls, EligibilityContext, IneligibilityReason};
pub use scoring::ScoreBreakdown;
pub use types::{
    CallStats, DayRequirement, MonthlySchedule, ScheduleError, ScheduleMetadata, ScheduleMetrics,
    ScheduleOutcome, StaffingLevel,
};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::warn;

use crate::calendar;
use crate::config::AppConfiguration;
use crate::model::{
    AcademicYear, CallAssignment, CallId, CallStatus, CallType, LeaveRequest, LeaveStatus,
    Resident, ResidentId,
};

/// Day-by-day monthly call scheduler. Construct one per run; state is the
/// per-resident counters only.
pub struct MonthlyScheduler<'a> {
    residents: Vec<Resident>,
    config: &'a AppConfiguration,
    academic_year: &'a AcademicYear,
    approved_leave: Vec<LeaveRequest>,
    unsettled_leave: Vec<LeaveRequest>,
    staffing: StaffingLevel,
    stats: BTreeMap<ResidentId, CallStats>,
}

impl<'a> MonthlyScheduler<'a> {
    pub fn new(
        residents: &[Resident],
        config: &'a AppConfiguration,
        academic_year: &'a AcademicYear,
        leave_requests: &[LeaveRequest],
        staffing: StaffingLevel,
    ) -> Self {
        // Sorted roster keeps every tie-break independent of input order.
        let mut residents = residents.to_vec();
        residents.sort_by(|a, b| a.id.cmp(&b.id));

        let approved_leave: Vec<_> = leave_requests
            .iter()
            .filter(|l| l.status == LeaveStatus::Approved)
            .cloned()
            .collect();
        let unsettled_leave: Vec<_> = leave_requests
            .iter()
            .filter(|l| l.status != LeaveStatus::Approved)
            .cloned()
            .collect();

        let stats = residents
            .iter()
            .map(|r| (r.id.clone(), CallStats::default()))
            .collect();

        Self {
            residents,
            config,
            academic_year,
            approved_leave,
            unsettled_leave,
            staffing,
            stats,
        }
    }

    /// Seeds counters from assignments made in an earlier run (e.g. the
    /// part of the rotation block that fell in the previous month).
    pub fn with_existing(mut self, existing: &[CallAssignment]) -> Self {
        for call in existing {
            if let Some(stats) = self.stats.get_mut(&call.resident_id) {
                stats.record(call);
            }
        }
        self
    }

    pub fn stats(&self) -> &BTreeMap<ResidentId, CallStats> {
        &self.stats
    }

    /// Generates the call list for one calendar month. Unfillable slots
    /// degrade coverage and are reported as warnings, never as errors.
    pub fn generate(&mut self, year: i32, month: u32) -> Result<ScheduleOutcome, ScheduleError> {
        let (month_start, month_end) =
            calendar::month_span(year, month).ok_or(ScheduleError::InvalidMonth(month))?;
        if self.residents.is_empty() {
            return Err(ScheduleError::EmptyRoster);
        }

        let mut requirements = self.day_requirements(month_start, month_end);
        // Stable sort: scarce senior capacity goes to holidays first, and
        // equal priorities keep calendar order.
        requirements.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.date.cmp(&b.date)));

        let mut assignments: Vec<CallAssignment> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        for req in &requirements {
            let Some(call_type) = req.call_type else {
                continue;
            };
            let mut taken_today: BTreeSet<ResidentId> = BTreeSet::new();
            for _ in 0..req.required_coverage {
                match self.select(req.date, call_type, &taken_today) {
                    Some(resident_id) => {
                        taken_today.insert(resident_id.clone());
                        self.emit(&resident_id, req, call_type, month_end, &mut assignments);
                    }
                    None => {
                        warn!(date = %req.date, call_type = %call_type, "no eligible resident");
                        warnings.push(format!(
                            "no eligible resident for {} call on {}",
                            call_type, req.date
                        ));
                    }
                }
            }
        }

        assignments.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.resident_id.cmp(&b.resident_id))
        });

        let metrics = self.metrics(&assignments, month_start, month_end);
        Ok(ScheduleOutcome {
            assignments,
            metrics,
            warnings,
        })
    }

    fn day_requirements(&self, start: NaiveDate, end: NaiveDate) -> Vec<DayRequirement> {
        let monthly = &self.config.monthly_scheduler;
        calendar::iter_days(start, end)
            .map(|date| {
                let is_holiday = calendar::is_holiday(date, &self.config.holidays);
                let is_weekend = calendar::is_weekend(date, &monthly.weekend_definition);
                let weeknight = matches!(
                    date.weekday(),
                    Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu
                );
                let call_type = if is_holiday {
                    Some(CallType::Holiday)
                } else if is_weekend {
                    Some(CallType::Weekend)
                } else if weeknight {
                    Some(CallType::Night)
                } else {
                    None
                };
                let (priority, required_coverage) = match call_type {
                    Some(CallType::Holiday) => (3, 2),
                    Some(CallType::Weekend) => (2, 1),
                    Some(CallType::Night) => (1, 1),
                    _ => (0, 0),
                };
                DayRequirement {
                    date,
                    call_type,
                    priority,
                    required_coverage,
                    is_holiday,
                }
            })
            .collect()
    }

    fn select(
        &self,
        date: NaiveDate,
        call_type: CallType,
        taken_today: &BTreeSet<ResidentId>,
    ) -> Option<ResidentId> {
        let ctx = EligibilityContext {
            academic_year: self.academic_year,
            approved_leave: &self.approved_leave,
            config: self.config,
            staffing: self.staffing,
        };

        let mut best: Option<(ResidentId, f64, u32)> = None;
        for resident in &self.residents {
            if taken_today.contains(&resident.id) {
                continue;
            }
            let stats = &self.stats[&resident.id];
            if eligibility::check(resident, date, call_type, stats, &ctx).is_err() {
                continue;
            }
            let breakdown = scoring::score(
                resident,
                date,
                call_type,
                &self.residents,
                &self.stats,
                self.academic_year,
                &self.unsettled_leave,
            );
            let candidate = (resident.id.clone(), breakdown.total, stats.total_calls);
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let ord = scoring::better_candidate(
                        (&candidate.0, candidate.1, candidate.2),
                        (&current.0, current.1, current.2),
                    );
                    if ord == std::cmp::Ordering::Less {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.map(|(id, _, _)| id)
    }

    fn emit(
        &mut self,
        resident_id: &ResidentId,
        req: &DayRequirement,
        call_type: CallType,
        month_end: NaiveDate,
        assignments: &mut Vec<CallAssignment>,
    ) {
        let call = CallAssignment {
            id: CallId::random(),
            resident_id: resident_id.clone(),
            date: req.date,
            call_type,
            points: call_type.points(),
            is_holiday: req.is_holiday,
            team: self.academic_year.team_for(resident_id, req.date),
            status: CallStatus::Scheduled,
        };
        let stats = self
            .stats
            .get_mut(resident_id)
            .expect("stats exist for every rostered resident");
        stats.record(&call);
        assignments.push(call);

        // A selection that broke the cap would be a programmer error in the
        // eligibility filter.
        debug_assert!(self.within_cap(resident_id, req.date));

        if let Some(next_day) = req.date.succ_opt() {
            if next_day <= month_end {
                assignments.push(CallAssignment {
                    id: CallId::random(),
                    resident_id: resident_id.clone(),
                    date: next_day,
                    call_type: CallType::PostCall,
                    points: 0,
                    is_holiday: calendar::is_holiday(next_day, &self.config.holidays),
                    team: self.academic_year.team_for(resident_id, next_day),
                    status: CallStatus::PostCall,
                });
            }
        }
    }

    fn within_cap(&self, resident_id: &ResidentId, date: NaiveDate) -> bool {
        let Some(resident) = self.residents.iter().find(|r| &r.id == resident_id) else {
            return false;
        };
        let Some(block) = self.academic_year.block_for(date) else {
            return false;
        };
        let working_days =
            calendar::working_days(block.start_date, block.end_date, &self.config.holidays);
        let cap = eligibility::max_calls(
            resident,
            working_days,
            self.staffing,
            &self.config.monthly_scheduler,
        );
        self.stats[resident_id].total_calls <= cap
    }

    fn metrics(
        &self,
        assignments: &[CallAssignment],
        start: NaiveDate,
        end: NaiveDate,
    ) -> ScheduleMetrics {
        let mut night_calls = 0;
        let mut weekend_calls = 0;
        let mut holiday_calls = 0;
        let mut covered: BTreeSet<NaiveDate> = BTreeSet::new();
        for call in assignments {
            match call.call_type {
                CallType::Night => night_calls += 1,
                CallType::Weekend => weekend_calls += 1,
                CallType::Holiday => holiday_calls += 1,
                CallType::PostCall => continue,
            }
            covered.insert(call.date);
        }
        let days_in_month = (calendar::days_between(start, end) + 1) as f64;
        let counts: Vec<u32> = self.stats.values().map(|s| s.total_calls).collect();
        ScheduleMetrics {
            total_calls: night_calls + weekend_calls + holiday_calls,
            night_calls,
            weekend_calls,
            holiday_calls,
            coverage_rate: covered.len() as f64 / days_in_month,
            gini: gini(&counts),
        }
    }
}

/// Gini coefficient over call counts, standard Lorenz formulation:
/// sum of absolute pairwise differences over `2 * n^2 * mean`.
pub fn gini(counts: &[u32]) -> f64 {
    let n = counts.len();
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = counts.iter().map(|c| u64::from(*c)).sum();
    if sum == 0 {
        return 0.0;
    }
    let mut diff_sum = 0u64;
    for a in counts {
        for b in counts {
            diff_sum += u64::from(a.abs_diff(*b));
        }
    }
    diff_sum as f64 / (2.0 * n as f64 * sum as f64)
}
