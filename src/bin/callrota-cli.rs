#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use callrota::{
    analyze, audit_schedule, calendar, io, leave::AnalysisInput, model::RequestId,
    scheduler::MonthlySchedule, AppConfiguration, MonthlyScheduler, ScheduleStore, StaffingLevel,
    YearlyEngine,
};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// Resident call and rotation scheduling over a local document directory.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Enable logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Document store directory
    #[arg(long, global = true, default_value = "schedule-data")]
    data: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StaffingArg {
    Normal,
    Shortage,
}

impl From<StaffingArg> for StaffingLevel {
    fn from(value: StaffingArg) -> Self {
        match value {
            StaffingArg::Normal => StaffingLevel::Normal,
            StaffingArg::Shortage => StaffingLevel::Shortage,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import residents from a CSV roster
    ImportResidents {
        #[arg(long)]
        csv: String,
    },

    /// Store or show the configuration document
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },

    /// Generate and store the rotation grid for an academic year
    GenerateYear {
        /// Academic year id, e.g. 2025-2026
        #[arg(long)]
        year: String,
    },

    /// Generate and store the call schedule for one calendar month
    GenerateMonth {
        #[arg(long)]
        year: i32,
        /// 1..=12
        #[arg(long)]
        month: u32,
        /// Academic year id covering the month (2026-01 belongs to 2025-2026)
        #[arg(long)]
        academic_year: String,
        #[arg(long, value_enum, default_value_t = StaffingArg::Normal)]
        staffing: StaffingArg,
        /// Overwrite an existing schedule for the month
        #[arg(long)]
        force: bool,
    },

    /// Analyze a pending leave request and commit the outcome
    AnalyzeLeave {
        #[arg(long)]
        request: String,
    },

    /// Re-check a stored monthly schedule against the program rules
    Audit {
        /// Month id, e.g. 2025-02
        #[arg(long)]
        month: String,
        #[arg(long)]
        academic_year: String,
        #[arg(long, value_enum, default_value_t = StaffingArg::Normal)]
        staffing: StaffingArg,
        /// CSV export of the findings (optional)
        #[arg(long)]
        report: Option<String>,
    },

    /// Export a stored monthly schedule
    Export {
        /// Month id, e.g. 2025-02
        #[arg(long)]
        month: String,
        #[arg(long)]
        out_csv: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate and store a configuration JSON file
    Set {
        #[arg(long)]
        file: String,
    },
    /// Print the stored configuration
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let store = ScheduleStore::open(&cli.data)?;

    let code = match cli.cmd {
        Commands::ImportResidents { csv } => {
            let residents = io::import_residents_csv(csv)?;
            let count = residents.len();
            store.save_residents(&residents)?;
            println!("Imported {count} resident(s)");
            0
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommand::Set { file } => {
                let config = AppConfiguration::load_from_file(&file)?;
                store.save_config(&config)?;
                println!("Configuration stored");
                0
            }
            ConfigCommand::Show => {
                let config = store.load_config()?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                0
            }
        },
        Commands::GenerateYear { year } => {
            let residents = store.load_residents().context("no roster imported")?;
            let config = store.load_config().context("no configuration stored")?;
            let engine = YearlyEngine::new(&residents, &[], &config);
            let academic_year = engine.generate(&year)?;
            store.save_academic_year(&academic_year)?;
            println!(
                "Academic year {} stored ({} blocks)",
                academic_year.id,
                academic_year.blocks.len()
            );
            if academic_year.violations.is_empty() {
                0
            } else {
                for v in &academic_year.violations {
                    eprintln!(
                        "coverage violation: block {} rule '{}' has {} of {}",
                        v.block_number, v.rule_name, v.actual, v.required
                    );
                }
                2
            }
        }
        Commands::GenerateMonth {
            year,
            month,
            academic_year,
            staffing,
            force,
        } => {
            let month_id = calendar::month_id(year, month);
            if !force && store.monthly_schedule_exists(&month_id) {
                let cached = store.load_monthly_schedule(&month_id)?;
                println!(
                    "Schedule {} already exists ({} calls); pass --force to regenerate",
                    cached.id, cached.metrics.total_calls
                );
                return Ok(());
            }
            let residents = store.load_residents().context("no roster imported")?;
            let config = store.load_config().context("no configuration stored")?;
            let rotation_year = store
                .load_academic_year(&academic_year)
                .with_context(|| format!("academic year {academic_year} not generated"))?;
            let leave = store.list_leave_requests()?;
            let carried = carried_assignments(&store, &rotation_year, year, month)?;

            let mut scheduler =
                MonthlyScheduler::new(&residents, &config, &rotation_year, &leave, staffing.into())
                    .with_existing(&carried);
            let outcome = scheduler.generate(year, month)?;
            let warnings = outcome.warnings.clone();
            let schedule = MonthlySchedule::from_outcome(
                year,
                month,
                outcome,
                Utc::now(),
                "callrota-cli",
                staffing.into(),
            );
            store.save_monthly_schedule(&schedule, force)?;
            println!(
                "Schedule {} stored: {} calls, coverage {:.0}%, gini {:.3}",
                schedule.id,
                schedule.metrics.total_calls,
                schedule.metrics.coverage_rate * 100.0,
                schedule.metrics.gini
            );
            if warnings.is_empty() {
                0
            } else {
                for w in &warnings {
                    eprintln!("warning: {w}");
                }
                2
            }
        }
        Commands::AnalyzeLeave { request } => {
            let request_id = RequestId::new(&request);
            let pending = store.load_leave_request(&request_id)?;
            let roster = store.load_residents().context("no roster imported")?;
            let config = store.load_config().context("no configuration stored")?;
            let all_leave = store.list_leave_requests()?;
            let call_schedule = load_calls_overlapping(&store, &pending)?;

            let input = AnalysisInput {
                request: &pending,
                roster: &roster,
                all_leave: &all_leave,
                call_schedule: &call_schedule,
                clinical_schedule: &[],
                config: &config,
                today: Utc::now().date_naive(),
            };
            match analyze(&input) {
                Ok(report) => match store.commit_analysis(&report)? {
                    Some(updated) => {
                        println!(
                            "Request {} -> {:?}: {}",
                            request, updated.status, report.rationale
                        );
                        0
                    }
                    None => {
                        println!("Request {request} was already analyzed; skipped");
                        0
                    }
                },
                Err(err) => {
                    store.mark_analysis_failed(&request_id, &err.to_string())?;
                    eprintln!("analysis failed: {err}");
                    2
                }
            }
        }
        Commands::Audit {
            month,
            academic_year,
            staffing,
            report,
        } => {
            let schedule = store.load_monthly_schedule(&month)?;
            let residents = store.load_residents().context("no roster imported")?;
            let config = store.load_config().context("no configuration stored")?;
            let rotation_year = store.load_academic_year(&academic_year)?;
            let leave = store.list_leave_requests()?;

            let findings = audit_schedule(
                &residents,
                &rotation_year,
                &leave,
                &config,
                staffing.into(),
                &schedule.assignments,
            );
            if findings.is_empty() {
                println!("OK: no findings");
                0
            } else {
                eprintln!("Found {} finding(s)", findings.len());
                for f in &findings {
                    eprintln!("{} | {} | {} | {}", f.resident_id.as_str(), f.date, f.kind, f.detail);
                }
                if let Some(path) = report {
                    io::export_findings_csv(path, &findings)?;
                }
                2
            }
        }
        Commands::Export {
            month,
            out_csv,
            out_json,
        } => {
            let schedule = store.load_monthly_schedule(&month)?;
            if out_csv.is_none() && out_json.is_none() {
                bail!("nothing to do: pass --out-csv and/or --out-json");
            }
            if let Some(path) = out_csv {
                io::export_calls_csv(path, &schedule.assignments)?;
            }
            if let Some(path) = out_json {
                io::export_json(path, &schedule)?;
            }
            println!("Exported {}", schedule.id);
            0
        }
    };

    std::process::exit(code);
}

/// Assignments already stored for the neighboring months that fall in a
/// rotation block overlapping the target month. Rotation blocks run 28
/// days, so no block reaches past the adjacent months; seeding these keeps
/// per-block call caps and post-call rest intact across month boundaries.
fn carried_assignments(
    store: &ScheduleStore,
    academic_year: &callrota::AcademicYear,
    year: i32,
    month: u32,
) -> Result<Vec<callrota::CallAssignment>> {
    let Some((month_start, month_end)) = calendar::month_span(year, month) else {
        return Ok(Vec::new());
    };
    let neighbors = [
        if month == 1 { (year - 1, 12) } else { (year, month - 1) },
        if month == 12 { (year + 1, 1) } else { (year, month + 1) },
    ];
    let mut out = Vec::new();
    for (y, m) in neighbors {
        let id = calendar::month_id(y, m);
        if !store.monthly_schedule_exists(&id) {
            continue;
        }
        let prior = store.load_monthly_schedule(&id)?;
        out.extend(prior.assignments.into_iter().filter(|a| {
            academic_year
                .block_for(a.date)
                .map_or(false, |b| b.start_date <= month_end && month_start <= b.end_date)
        }));
    }
    Ok(out)
}

/// Calls already stored for any month the request touches.
fn load_calls_overlapping(
    store: &ScheduleStore,
    request: &callrota::LeaveRequest,
) -> Result<Vec<callrota::CallAssignment>> {
    let mut out = Vec::new();
    let mut cursor = request.start_date.with_day(1).context("month start")?;
    while cursor <= request.end_date {
        let id = calendar::month_id(cursor.year(), cursor.month());
        if store.monthly_schedule_exists(&id) {
            out.extend(store.load_monthly_schedule(&id)?.assignments);
        }
        cursor = next_month(cursor).context("month overflow")?;
    }
    Ok(out)
}

fn next_month(date: chrono::NaiveDate) -> Option<chrono::NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    chrono::NaiveDate::from_ymd_opt(year, month, 1)
}
