use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AppConfiguration;
use crate::leave::LeaveAnalysisReport;
use crate::model::{AcademicYear, LeaveRequest, LeaveStatus, RequestId, Resident};
use crate::scheduler::MonthlySchedule;

const MAX_PERSIST_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 25;

/// One staged analysis transaction: the flipped request and its report,
/// written as a single document and applied together.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnalysisCommit {
    request: LeaveRequest,
    report: LeaveAnalysisReport,
}

/// File-backed document store: one JSON document per entry, grouped in
/// per-collection directories under a base path.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    base_dir: PathBuf,
}

impl ScheduleStore {
    /// Opens the store and finishes any analysis transaction a crash left
    /// half-applied.
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let store = Self {
            base_dir: dir.as_ref().to_path_buf(),
        };
        store.replay_staged_commits()?;
        Ok(store)
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.base_dir.join(collection).join(format!("{id}.json"))
    }

    fn read_doc<T: DeserializeOwned>(&self, collection: &str, id: &str) -> anyhow::Result<T> {
        let path = self.doc_path(collection, id);
        let data =
            fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Atomic write: temp file in the target directory, fsync, rename.
    /// Retries with exponential backoff before giving up.
    fn write_doc<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> anyhow::Result<()> {
        let path = self.doc_path(collection, id);
        let dir = self.base_dir.join(collection);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating collection directory {}", dir.display()))?;
        let json = serde_json::to_vec_pretty(value)?;

        let mut last_err = None;
        for attempt in 0..MAX_PERSIST_ATTEMPTS {
            match persist_once(&dir, &path, &json) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        path = %path.display(),
                        error = %err,
                        "persist attempt failed"
                    );
                    last_err = Some(err);
                    thread::sleep(Duration::from_millis(BACKOFF_BASE_MS << attempt));
                }
            }
        }
        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("persist failed"));
        Err(err.context(format!("writing {}", path.display())))
    }

    fn exists(&self, collection: &str, id: &str) -> bool {
        self.doc_path(collection, id).exists()
    }

    pub fn save_residents(&self, residents: &[Resident]) -> anyhow::Result<()> {
        self.write_doc("rosters", "residents", &residents)
    }

    pub fn load_residents(&self) -> anyhow::Result<Vec<Resident>> {
        self.read_doc("rosters", "residents")
    }

    pub fn save_config(&self, config: &AppConfiguration) -> anyhow::Result<()> {
        config.validate()?;
        self.write_doc("configuration", "main", config)
    }

    pub fn load_config(&self) -> anyhow::Result<AppConfiguration> {
        let config: AppConfiguration = self.read_doc("configuration", "main")?;
        config.validate()?;
        Ok(config)
    }

    /// Academic years are write-once per id.
    pub fn save_academic_year(&self, year: &AcademicYear) -> anyhow::Result<()> {
        self.write_doc("academic_years", &year.id, year)
    }

    pub fn load_academic_year(&self, id: &str) -> anyhow::Result<AcademicYear> {
        self.read_doc("academic_years", id)
    }

    pub fn monthly_schedule_exists(&self, id: &str) -> bool {
        self.exists("monthly_schedules", id)
    }

    /// Refuses to overwrite an existing month unless forced.
    pub fn save_monthly_schedule(
        &self,
        schedule: &MonthlySchedule,
        force_regenerate: bool,
    ) -> anyhow::Result<()> {
        if !force_regenerate && self.monthly_schedule_exists(&schedule.id) {
            bail!(
                "monthly schedule {} already exists (pass force to regenerate)",
                schedule.id
            );
        }
        self.write_doc("monthly_schedules", &schedule.id, schedule)
    }

    pub fn load_monthly_schedule(&self, id: &str) -> anyhow::Result<MonthlySchedule> {
        self.read_doc("monthly_schedules", id)
    }

    pub fn save_leave_request(&self, request: &LeaveRequest) -> anyhow::Result<()> {
        self.write_doc("leave_requests", request.id.as_str(), request)
    }

    pub fn load_leave_request(&self, id: &RequestId) -> anyhow::Result<LeaveRequest> {
        self.read_doc("leave_requests", id.as_str())
    }

    pub fn list_leave_requests(&self) -> anyhow::Result<Vec<LeaveRequest>> {
        let dir = self.base_dir.join("leave_requests");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read(&path)?;
            match serde_json::from_slice::<LeaveRequest>(&data) {
                Ok(request) => out.push(request),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable request");
                }
            }
        }
        out.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(out)
    }

    pub fn load_leave_report(&self, id: &str) -> anyhow::Result<LeaveAnalysisReport> {
        self.read_doc("leave_reports", id)
    }

    /// Persists the analysis and flips the request status as one
    /// transaction. Returns None (and writes nothing) when the stored
    /// request already left `PendingAnalysis` — a second analyzer
    /// invocation must skip. The pair is staged as a single document
    /// before either collection is touched; a crash mid-apply is replayed
    /// on the next `open`, so neither write becomes durable without the
    /// other, and no reader ever sees a report whose request is still
    /// pending.
    pub fn commit_analysis(
        &self,
        report: &LeaveAnalysisReport,
    ) -> anyhow::Result<Option<LeaveRequest>> {
        let mut request = self.load_leave_request(&report.request_id)?;
        if request.status != LeaveStatus::PendingAnalysis {
            return Ok(None);
        }
        request.status = report.recommendation.to_status();
        request.analysis_report_id = Some(report.id.clone());
        request.denial_justification = if request.status == LeaveStatus::Denied {
            Some(report.rationale.clone())
        } else {
            None
        };
        let commit = AnalysisCommit {
            request,
            report: report.clone(),
        };
        self.write_doc("leave_commits", commit.request.id.as_str(), &commit)?;
        self.apply_commit(&commit)?;
        Ok(Some(commit.request))
    }

    /// Applies any analysis transaction that was staged but not fully
    /// applied before a crash. Idempotent; statuses only ever transition
    /// out of `PendingAnalysis` once, so a replay can never clobber a
    /// newer state.
    fn replay_staged_commits(&self) -> anyhow::Result<()> {
        let dir = self.base_dir.join("leave_commits");
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read(&path)?;
            match serde_json::from_slice::<AnalysisCommit>(&data) {
                Ok(commit) => self.apply_commit(&commit)?,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable staged commit");
                }
            }
        }
        Ok(())
    }

    /// The request flips before the report lands, so a reader never
    /// observes a report whose request has not transitioned.
    fn apply_commit(&self, commit: &AnalysisCommit) -> anyhow::Result<()> {
        self.write_doc("leave_requests", commit.request.id.as_str(), &commit.request)?;
        self.write_doc("leave_reports", commit.report.id.as_str(), &commit.report)?;
        let staged = self.doc_path("leave_commits", commit.request.id.as_str());
        if staged.exists() {
            fs::remove_file(&staged)
                .with_context(|| format!("removing staged commit {}", staged.display()))?;
        }
        Ok(())
    }

    /// Records a failed analysis; no report is written.
    pub fn mark_analysis_failed(&self, id: &RequestId, error: &str) -> anyhow::Result<()> {
        let mut request = self.load_leave_request(id)?;
        if request.status != LeaveStatus::PendingAnalysis {
            return Ok(());
        }
        request.status = LeaveStatus::AnalysisFailed;
        request.analysis_error = Some(error.to_string());
        self.save_leave_request(&request)
    }
}

fn persist_once(dir: &Path, path: &Path, json: &[u8]) -> anyhow::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("creating temp file")?;
    tmp.write_all(json)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).context("atomic rename")?;
    Ok(())
}
