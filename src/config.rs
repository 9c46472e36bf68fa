use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::calendar;

/// One row of the PARO hard-cap table: rotations whose working-day count
/// falls in `[min_days, max_days]` allow at most `calls` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParoHardCap {
    pub min_days: u32,
    pub max_days: u32,
    pub calls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySchedulerConfig {
    pub paro_hard_caps: Vec<ParoHardCap>,
    /// PGY level -> "1 call in N working days" ratio.
    pub call_ratios: BTreeMap<u8, u32>,
    pub max_weekends_per_rotation: u32,
    #[serde(with = "weekday_names")]
    pub weekend_definition: Vec<Weekday>,
}

impl Default for MonthlySchedulerConfig {
    fn default() -> Self {
        Self {
            paro_hard_caps: vec![ParoHardCap {
                min_days: 1,
                max_days: 31,
                calls: 8,
            }],
            call_ratios: BTreeMap::from([(1, 4), (2, 5), (3, 4), (4, 3), (5, 3)]),
            max_weekends_per_rotation: 2,
            weekend_definition: vec![Weekday::Fri, Weekday::Sat, Weekday::Sun],
        }
    }
}

/// Places every resident of the listed PGY levels in `block_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRule {
    pub block_number: u8,
    pub pgy_levels: Vec<u8>,
    pub rotation_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlySchedulerConfig {
    #[serde(default)]
    pub mandatory_rotations: Vec<RotationRule>,
    #[serde(default)]
    pub exam_leave: Vec<RotationRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageRuleKind {
    Specialty,
    SpecialtyPgyMin,
}

/// Minimum staffing a block must keep on the home service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRule {
    pub name: String,
    pub kind: CoverageRuleKind,
    pub specialty: String,
    #[serde(default)]
    pub min_pgy_level: u8,
    pub min_count: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePolicy {
    pub min_notice_days: i64,
    pub max_consecutive_days: i64,
    pub annual_limit: i64,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self {
            min_notice_days: 14,
            max_consecutive_days: 14,
            annual_limit: 20,
        }
    }
}

/// Read-once configuration for a scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfiguration {
    #[serde(default)]
    pub monthly_scheduler: MonthlySchedulerConfig,
    #[serde(default)]
    pub yearly_scheduler: YearlySchedulerConfig,
    #[serde(default)]
    pub coverage_rules: Vec<CoverageRule>,
    #[serde(default)]
    pub leave_policy: LeavePolicy,
    /// Program holidays; the fixed statutory dates are always added on top.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl AppConfiguration {
    pub fn validate(&self) -> Result<()> {
        if self.monthly_scheduler.weekend_definition.is_empty() {
            bail!("weekend definition cannot be empty");
        }
        for cap in &self.monthly_scheduler.paro_hard_caps {
            if cap.min_days > cap.max_days {
                bail!(
                    "PARO cap range inverted: {}..{}",
                    cap.min_days,
                    cap.max_days
                );
            }
        }
        for (pgy, ratio) in &self.monthly_scheduler.call_ratios {
            if *ratio == 0 {
                bail!("call ratio for PGY-{pgy} must be > 0");
            }
        }
        let rules = self
            .yearly_scheduler
            .mandatory_rotations
            .iter()
            .chain(self.yearly_scheduler.exam_leave.iter());
        for rule in rules {
            if rule.block_number == 0 || rule.block_number > calendar::BLOCKS_PER_YEAR {
                bail!(
                    "rotation rule '{}' names block {} (valid: 1..{})",
                    rule.rotation_name,
                    rule.block_number,
                    calendar::BLOCKS_PER_YEAR
                );
            }
            if rule.rotation_name.trim().is_empty() {
                bail!("rotation rule name cannot be empty");
            }
        }
        for rule in &self.coverage_rules {
            if rule.min_count == 0 {
                bail!("coverage rule '{}' requires min_count > 0", rule.name);
            }
        }
        if self.leave_policy.min_notice_days < 0
            || self.leave_policy.max_consecutive_days <= 0
            || self.leave_policy.annual_limit <= 0
        {
            bail!("leave policy values must be positive");
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data =
            fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfiguration = serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Serializes weekdays as short names ("Fri"), the form the configuration
/// document uses.
mod weekday_names {
    use chrono::Weekday;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn short_name(day: Weekday) -> &'static str {
        match day {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }

    pub fn parse(s: &str) -> Option<Weekday> {
        match s.to_ascii_lowercase().as_str() {
            "mon" | "monday" => Some(Weekday::Mon),
            "tue" | "tuesday" => Some(Weekday::Tue),
            "wed" | "wednesday" => Some(Weekday::Wed),
            "thu" | "thursday" => Some(Weekday::Thu),
            "fri" | "friday" => Some(Weekday::Fri),
            "sat" | "saturday" => Some(Weekday::Sat),
            "sun" | "sunday" => Some(Weekday::Sun),
            _ => None,
        }
    }

    pub fn serialize<S: Serializer>(days: &[Weekday], ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_seq(days.iter().map(|d| short_name(*d)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Weekday>, D::Error> {
        let names = Vec::<String>::deserialize(de)?;
        names
            .iter()
            .map(|n| parse(n).ok_or_else(|| D::Error::custom(format!("unknown weekday: {n}"))))
            .collect()
    }
}
