#![forbid(unsafe_code)]
use std::collections::BTreeMap;

use callrota::model::{CallType, LeaveStatus, LeaveType, ResidentId};
use callrota::scheduler::{eligibility, gini, CallStats, EligibilityContext, IneligibilityReason};
use callrota::{
    audit_schedule, calendar, AcademicYear, AppConfiguration, CallAssignment, LeaveRequest,
    MonthlyScheduler, ParoHardCap, Resident, StaffingLevel, YearlyEngine,
};
use chrono::{Datelike, NaiveDate, Weekday};

fn resident(id: &str, name: &str, pgy: u8) -> Resident {
    let mut r = Resident::new(name, pgy, "Neurosurgery");
    r.id = ResidentId::new(id);
    r
}

fn february_config() -> AppConfiguration {
    let mut config = AppConfiguration::default();
    config.monthly_scheduler.paro_hard_caps = vec![ParoHardCap {
        min_days: 1,
        max_days: 31,
        calls: 7,
    }];
    config.monthly_scheduler.call_ratios = BTreeMap::from([(2, 5), (3, 4), (4, 3), (5, 3)]);
    config.monthly_scheduler.max_weekends_per_rotation = 2;
    config
}

fn four_residents() -> Vec<Resident> {
    vec![
        resident("r1", "Avery", 2),
        resident("r2", "Blake", 3),
        resident("r3", "Casey", 4),
        resident("r4", "Drew", 5),
    ]
}

fn rotation_year(residents: &[Resident], config: &AppConfiguration, id: &str) -> AcademicYear {
    YearlyEngine::new(residents, &[], config)
        .generate(id)
        .unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn february_schedule_fills_nights_and_respects_caps() {
    let config = february_config();
    let residents = four_residents();
    let year = rotation_year(&residents, &config, "2024-2025");

    let mut scheduler =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal);
    let outcome = scheduler.generate(2025, 2).unwrap();

    let calls: Vec<&CallAssignment> = outcome
        .assignments
        .iter()
        .filter(|a| !a.is_post_call())
        .collect();

    // Every weeknight is covered.
    for day in 1..=28 {
        let d = date(2025, 2, day);
        if matches!(
            d.weekday(),
            Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu
        ) {
            assert!(
                calls.iter().any(|c| c.date == d),
                "weeknight {d} left unfilled"
            );
        }
    }

    // Four weekend slots exceed the combined weekend allowance and must be
    // reported, not silently dropped.
    let weekend_calls = calls
        .iter()
        .filter(|c| c.call_type == CallType::Weekend)
        .count();
    assert_eq!(weekend_calls, 8);
    assert_eq!(outcome.warnings.len(), 4);
    assert!(outcome.warnings.iter().all(|w| w.contains("Weekend")));

    // Per-resident ceilings.
    let mut totals: BTreeMap<&str, u32> = BTreeMap::new();
    let mut weekends: BTreeMap<&str, u32> = BTreeMap::new();
    for c in &calls {
        *totals.entry(c.resident_id.as_str()).or_default() += 1;
        if c.call_type == CallType::Weekend {
            *weekends.entry(c.resident_id.as_str()).or_default() += 1;
        }
    }
    for (id, total) in &totals {
        assert!(*total <= 7, "{id} holds {total} calls");
    }
    // PGY-2 at ratio 1:5 over 28 working days targets 5.
    assert!(totals.get("r1").copied().unwrap_or(0) <= 5);
    for count in weekends.values() {
        assert!(*count <= 2);
    }

    // Each call is followed by its post-call day inside the month.
    for c in &calls {
        if let Some(next) = c.date.succ_opt() {
            if next.month() == 2 {
                assert!(
                    outcome.assignments.iter().any(|a| a.is_post_call()
                        && a.resident_id == c.resident_id
                        && a.date == next),
                    "call on {} has no post-call marker",
                    c.date
                );
            }
        }
    }

    assert_eq!(outcome.metrics.total_calls, 24);
    assert!((outcome.metrics.coverage_rate - 24.0 / 28.0).abs() < 1e-9);
    assert!(outcome.metrics.gini <= 0.2);

    let findings = audit_schedule(
        &residents,
        &year,
        &[],
        &config,
        StaffingLevel::Normal,
        &outcome.assignments,
    );
    assert!(findings.is_empty(), "audit found {findings:?}");
}

#[test]
fn output_is_independent_of_roster_order() {
    let config = february_config();
    let residents = four_residents();
    let year = rotation_year(&residents, &config, "2024-2025");

    let mut reversed = residents.clone();
    reversed.reverse();

    let run = |roster: &[Resident]| {
        let mut scheduler =
            MonthlyScheduler::new(roster, &config, &year, &[], StaffingLevel::Normal);
        let outcome = scheduler.generate(2025, 2).unwrap();
        outcome
            .assignments
            .iter()
            .map(|a| (a.date, a.resident_id.as_str().to_string(), a.call_type))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(&residents), run(&reversed));
}

#[test]
fn shortage_mode_keeps_only_the_paro_cap() {
    let mut config = february_config();
    config.monthly_scheduler.call_ratios = BTreeMap::from([(2, 10)]);
    let junior = resident("r1", "Avery", 2);

    let normal = eligibility::max_calls(
        &junior,
        28,
        StaffingLevel::Normal,
        &config.monthly_scheduler,
    );
    let shortage = eligibility::max_calls(
        &junior,
        28,
        StaffingLevel::Shortage,
        &config.monthly_scheduler,
    );
    assert_eq!(normal, 2);
    assert_eq!(shortage, 7);
    assert!(shortage >= normal);
}

#[test]
fn approved_leave_blocks_the_whole_month() {
    let config = february_config();
    let residents = four_residents();
    let year = rotation_year(&residents, &config, "2024-2025");

    let mut leave = LeaveRequest::new(
        ResidentId::new("r2"),
        LeaveType::Annual,
        date(2025, 2, 1),
        date(2025, 2, 28),
    )
    .unwrap();
    leave.status = LeaveStatus::Approved;

    let mut scheduler = MonthlyScheduler::new(
        &residents,
        &config,
        &year,
        std::slice::from_ref(&leave),
        StaffingLevel::Normal,
    );
    let outcome = scheduler.generate(2025, 2).unwrap();

    assert!(
        outcome
            .assignments
            .iter()
            .all(|a| a.resident_id.as_str() != "r2"),
        "resident on leave received an assignment"
    );
}

#[test]
fn consecutive_nights_alternate_between_two_residents() {
    let mut config = february_config();
    config.monthly_scheduler.call_ratios = BTreeMap::from([(4, 3), (5, 3)]);
    let residents = vec![resident("r1", "Avery", 4), resident("r2", "Blake", 5)];
    let year = rotation_year(&residents, &config, "2024-2025");

    let mut scheduler =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal);
    let outcome = scheduler.generate(2025, 2).unwrap();

    let calls: Vec<&CallAssignment> = outcome
        .assignments
        .iter()
        .filter(|a| !a.is_post_call())
        .collect();
    for a in &calls {
        for b in &calls {
            if (b.date - a.date).num_days() == 1 {
                assert_ne!(
                    a.resident_id, b.resident_id,
                    "same resident on {} and {}",
                    a.date, b.date
                );
            }
        }
    }
    assert!(calls.iter().any(|c| c.resident_id.as_str() == "r1"));
    assert!(calls.iter().any(|c| c.resident_id.as_str() == "r2"));
}

#[test]
fn call_exempt_chief_is_never_assigned() {
    let config = february_config();
    let mut residents = four_residents();
    let mut chief = resident("r5", "Emory", 5);
    chief.is_chief = true;
    chief.call_exempt = true;
    residents.push(chief);
    let year = rotation_year(&residents, &config, "2024-2025");

    let mut scheduler =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal);
    let outcome = scheduler.generate(2025, 2).unwrap();

    assert!(outcome
        .assignments
        .iter()
        .all(|a| a.resident_id.as_str() != "r5"));
}

#[test]
fn holiday_gets_double_senior_coverage() {
    let config = AppConfiguration::default();
    let residents = four_residents();
    let year = rotation_year(&residents, &config, "2025-2026");

    let mut scheduler =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal);
    let outcome = scheduler.generate(2025, 7).unwrap();

    // July 4 is a fixed holiday: two residents, senior-weighted.
    let fourth: Vec<&CallAssignment> = outcome
        .assignments
        .iter()
        .filter(|a| a.date == date(2025, 7, 4) && !a.is_post_call())
        .collect();
    assert_eq!(fourth.len(), 2);
    let mut ids: Vec<&str> = fourth.iter().map(|c| c.resident_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["r3", "r4"]);
    for c in &fourth {
        assert_eq!(c.call_type, CallType::Holiday);
        assert_eq!(c.points, 3);
        assert!(c.is_holiday);
    }
    for id in ["r3", "r4"] {
        assert!(outcome.assignments.iter().any(|a| a.is_post_call()
            && a.resident_id.as_str() == id
            && a.date == date(2025, 7, 5)));
    }
}

#[test]
fn rolling_window_blocks_an_eighth_call() {
    let config = AppConfiguration::default();
    let residents = vec![resident("r1", "Avery", 3)];
    let year = rotation_year(&residents, &config, "2024-2025");

    let mut stats = CallStats::default();
    for day in [7, 10, 13, 16, 19, 22, 25] {
        stats.call_dates.push(date(2025, 1, day));
    }
    stats.total_calls = 7;
    stats.last_call_date = Some(date(2025, 1, 25));

    let ctx = EligibilityContext {
        academic_year: &year,
        approved_leave: &[],
        config: &config,
        staffing: StaffingLevel::Shortage,
    };

    // All seven January calls sit inside the look-back window on Feb 4.
    assert_eq!(
        eligibility::check(&residents[0], date(2025, 2, 4), CallType::Night, &stats, &ctx),
        Err(IneligibilityReason::ParoRollingLimit)
    );
    // A day later the oldest call leaves the window.
    assert_eq!(
        eligibility::check(&residents[0], date(2025, 2, 5), CallType::Night, &stats, &ctx),
        Ok(())
    );

    // Under normal staffing the PGY target binds first.
    let normal_ctx = EligibilityContext {
        staffing: StaffingLevel::Normal,
        ..ctx
    };
    assert_eq!(
        eligibility::check(
            &residents[0],
            date(2025, 2, 4),
            CallType::Night,
            &stats,
            &normal_ctx
        ),
        Err(IneligibilityReason::CallCapReached)
    );
}

#[test]
fn block_caps_hold_across_consecutive_months() {
    // July and August 2025 share the block running Jul 29 - Aug 25; the
    // August run is seeded with July's share of that block.
    let config = AppConfiguration::default();
    let residents = four_residents();
    let year = rotation_year(&residents, &config, "2025-2026");

    let mut july =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal);
    let july_out = july.generate(2025, 7).unwrap();

    let (aug_start, aug_end) = calendar::month_span(2025, 8).unwrap();
    let carried: Vec<CallAssignment> = july_out
        .assignments
        .iter()
        .filter(|a| {
            year.block_for(a.date)
                .map_or(false, |b| b.start_date <= aug_end && aug_start <= b.end_date)
        })
        .cloned()
        .collect();

    let mut august =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal)
            .with_existing(&carried);
    let august_out = august.generate(2025, 8).unwrap();

    let mut combined = july_out.assignments.clone();
    combined.extend(august_out.assignments.iter().cloned());

    // The combined per-resident count inside any one block stays within
    // that block's cap.
    for block in &year.blocks {
        let working = calendar::working_days(block.start_date, block.end_date, &config.holidays);
        for r in &residents {
            let cap = eligibility::max_calls(
                r,
                working,
                StaffingLevel::Normal,
                &config.monthly_scheduler,
            );
            let held = combined
                .iter()
                .filter(|a| !a.is_post_call() && a.resident_id == r.id && block.contains(a.date))
                .count() as u32;
            assert!(
                held <= cap,
                "{} holds {held} calls in block {} (cap {cap})",
                r.id.as_str(),
                block.block_number
            );
        }
    }

    // The seeded call dates also keep post-call rest across the boundary.
    let findings = audit_schedule(
        &residents,
        &year,
        &[],
        &config,
        StaffingLevel::Normal,
        &combined,
    );
    assert!(findings.is_empty(), "audit found {findings:?}");
}

#[test]
fn gini_of_uniform_and_skewed_counts() {
    assert_eq!(gini(&[]), 0.0);
    assert_eq!(gini(&[3, 3, 3, 3]), 0.0);
    assert!((gini(&[0, 4]) - 0.25).abs() < 1e-12);
}
