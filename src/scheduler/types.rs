use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar;
use crate::model::{CallAssignment, CallType};

/// Normal applies both the PARO cap and the PGY target; Shortage keeps only
/// the PARO cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffingLevel {
    Normal,
    Shortage,
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid month: {0} (expected 1..=12)")]
    InvalidMonth(u32),
    #[error("empty roster: no residents to schedule")]
    EmptyRoster,
    #[error("invalid date range for {0}: end precedes start")]
    InvalidDateRange(String),
    #[error("academic year '{0}' has a malformed id (expected YYYY-YYYY)")]
    BadAcademicYearId(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-resident counters accumulated over one scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    pub total_calls: u32,
    pub night_calls: u32,
    pub weekend_calls: u32,
    pub holiday_calls: u32,
    pub points: u32,
    pub last_call_date: Option<NaiveDate>,
    /// Non-post-call dates, kept sorted.
    pub call_dates: Vec<NaiveDate>,
}

impl CallStats {
    /// Folds a call into the counters. Post-call markers carry no weight.
    pub fn record(&mut self, call: &CallAssignment) {
        match call.call_type {
            CallType::PostCall => return,
            CallType::Night => self.night_calls += 1,
            CallType::Weekend => self.weekend_calls += 1,
            CallType::Holiday => self.holiday_calls += 1,
        }
        self.total_calls += 1;
        self.points += call.points;
        self.last_call_date = Some(match self.last_call_date {
            Some(last) => last.max(call.date),
            None => call.date,
        });
        let pos = self.call_dates.partition_point(|d| *d < call.date);
        self.call_dates.insert(pos, call.date);
    }

    /// Calls inside the 28-day look-back window `[date-28, date)`.
    pub fn recent_calls(&self, date: NaiveDate) -> u32 {
        self.call_dates
            .iter()
            .filter(|d| {
                let delta = calendar::days_between(**d, date);
                delta > 0 && delta <= 28
            })
            .count() as u32
    }

    /// Most recent call strictly before `date`.
    pub fn last_call_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.call_dates.iter().rev().find(|d| **d < date).copied()
    }

    /// True when any existing call sits within one day of `date`.
    pub fn adjacent_call(&self, date: NaiveDate) -> bool {
        self.call_dates
            .iter()
            .any(|d| calendar::days_between(*d, date).abs() < 2)
    }
}

/// What one calendar day needs from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRequirement {
    pub date: NaiveDate,
    pub call_type: Option<CallType>,
    pub priority: u8,
    pub required_coverage: u8,
    pub is_holiday: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetrics {
    pub total_calls: u32,
    pub night_calls: u32,
    pub weekend_calls: u32,
    pub holiday_calls: u32,
    /// Days with at least one non-post-call assignment over days in month.
    pub coverage_rate: f64,
    /// Gini coefficient of per-resident call counts, 0 = perfect equality.
    pub gini: f64,
}

/// Result of one monthly run: the assignments plus quality metrics and any
/// degradation warnings (unfilled slots never fail the run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub assignments: Vec<CallAssignment>,
    pub metrics: ScheduleMetrics,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetadata {
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub staffing_level: StaffingLevel,
    pub total_calls: u32,
    pub unique_residents: u32,
    pub version: u32,
}

/// Persisted monthly schedule document, keyed by "YYYY-MM".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySchedule {
    pub id: String,
    pub year: i32,
    pub month: u32,
    pub assignments: Vec<CallAssignment>,
    pub metrics: ScheduleMetrics,
    pub warnings: Vec<String>,
    pub metadata: ScheduleMetadata,
    pub published: bool,
}

impl MonthlySchedule {
    pub fn from_outcome(
        year: i32,
        month: u32,
        outcome: ScheduleOutcome,
        generated_at: DateTime<Utc>,
        generated_by: &str,
        staffing_level: StaffingLevel,
    ) -> Self {
        let mut residents: Vec<_> = outcome
            .assignments
            .iter()
            .filter(|a| !a.is_post_call())
            .map(|a| a.resident_id.clone())
            .collect();
        residents.sort();
        residents.dedup();
        let metadata = ScheduleMetadata {
            generated_at,
            generated_by: generated_by.to_string(),
            staffing_level,
            total_calls: outcome.metrics.total_calls,
            unique_residents: residents.len() as u32,
            version: 1,
        };
        Self {
            id: calendar::month_id(year, month),
            year,
            month,
            assignments: outcome.assignments,
            metrics: outcome.metrics,
            warnings: outcome.warnings,
            metadata,
            published: false,
        }
    }
}
