#![forbid(unsafe_code)]
use callrota::leave::{self, AnalysisInput};
use callrota::model::{LeaveStatus, LeaveType, RequestId, ResidentId};
use callrota::scheduler::MonthlySchedule;
use callrota::{
    calendar, AppConfiguration, LeaveRequest, MonthlyScheduler, Resident, ScheduleStore,
    StaffingLevel, YearlyEngine,
};
use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::tempdir;

fn resident(id: &str, name: &str, pgy: u8) -> Resident {
    let mut r = Resident::new(name, pgy, "Neurosurgery");
    r.id = ResidentId::new(id);
    r
}

fn roster() -> Vec<Resident> {
    vec![
        resident("r1", "Avery", 2),
        resident("r2", "Blake", 3),
        resident("r3", "Casey", 4),
        resident("r4", "Drew", 5),
        resident("r5", "Emory", 3),
    ]
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_schedule(store: &ScheduleStore) -> MonthlySchedule {
    let residents = roster();
    let config = AppConfiguration::default();
    let year = YearlyEngine::new(&residents, &[], &config)
        .generate("2024-2025")
        .unwrap();
    store.save_academic_year(&year).unwrap();

    let mut scheduler =
        MonthlyScheduler::new(&residents, &config, &year, &[], StaffingLevel::Normal);
    let outcome = scheduler.generate(2025, 2).unwrap();
    MonthlySchedule::from_outcome(
        2025,
        2,
        outcome,
        Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap(),
        "tests",
        StaffingLevel::Normal,
    )
}

#[test]
fn documents_round_trip() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::open(dir.path()).unwrap();

    let residents = roster();
    store.save_residents(&residents).unwrap();
    assert_eq!(store.load_residents().unwrap(), residents);

    let config = AppConfiguration::default();
    store.save_config(&config).unwrap();
    assert_eq!(store.load_config().unwrap(), config);

    let schedule = sample_schedule(&store);
    assert_eq!(schedule.id, calendar::month_id(2025, 2));
    store.save_monthly_schedule(&schedule, false).unwrap();
    let loaded = store.load_monthly_schedule("2025-02").unwrap();
    assert_eq!(loaded, schedule);

    let year = store.load_academic_year("2024-2025").unwrap();
    assert_eq!(year.id, "2024-2025");
}

#[test]
fn monthly_rewrite_requires_force() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::open(dir.path()).unwrap();

    let schedule = sample_schedule(&store);
    store.save_monthly_schedule(&schedule, false).unwrap();

    let err = store.save_monthly_schedule(&schedule, false).unwrap_err();
    assert!(err.to_string().contains("already exists"));

    let mut regenerated = schedule.clone();
    regenerated.published = true;
    store.save_monthly_schedule(&regenerated, true).unwrap();
    assert!(store.load_monthly_schedule("2025-02").unwrap().published);
}

#[test]
fn analysis_commits_exactly_once() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::open(dir.path()).unwrap();
    let residents = roster();
    let config = AppConfiguration::default();

    let mut request = LeaveRequest::new(
        ResidentId::new("r2"),
        LeaveType::Annual,
        date(2025, 3, 4),
        date(2025, 3, 6),
    )
    .unwrap();
    request.id = RequestId::new("q1");
    store.save_leave_request(&request).unwrap();

    let report = leave::analyze(&AnalysisInput {
        request: &request,
        roster: &residents,
        all_leave: &[],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 1, 2),
    })
    .unwrap();

    let updated = store.commit_analysis(&report).unwrap().unwrap();
    assert_eq!(updated.status, LeaveStatus::PendingApproval);
    assert_eq!(updated.analysis_report_id.as_ref(), Some(&report.id));

    let stored = store.load_leave_request(&request.id).unwrap();
    assert_eq!(stored, updated);
    let stored_report = store.load_leave_report(report.id.as_str()).unwrap();
    assert_eq!(stored_report, report);

    // A second invocation for the same request must skip.
    assert!(store.commit_analysis(&report).unwrap().is_none());
}

#[test]
fn staged_analysis_commit_replays_on_open() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::open(dir.path()).unwrap();
    let residents = roster();
    let config = AppConfiguration::default();

    let mut request = LeaveRequest::new(
        ResidentId::new("r2"),
        LeaveType::Annual,
        date(2025, 3, 4),
        date(2025, 3, 6),
    )
    .unwrap();
    request.id = RequestId::new("q1");
    store.save_leave_request(&request).unwrap();

    let report = leave::analyze(&AnalysisInput {
        request: &request,
        roster: &residents,
        all_leave: &[],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 1, 2),
    })
    .unwrap();

    // Simulate a crash right after the transaction was staged: the commit
    // document exists, neither collection was written.
    let mut flipped = request.clone();
    flipped.status = report.recommendation.to_status();
    flipped.analysis_report_id = Some(report.id.clone());
    let staged_dir = dir.path().join("leave_commits");
    std::fs::create_dir_all(&staged_dir).unwrap();
    let staged = serde_json::json!({ "request": flipped, "report": report });
    std::fs::write(
        staged_dir.join("q1.json"),
        serde_json::to_vec_pretty(&staged).unwrap(),
    )
    .unwrap();

    // Nothing is visible yet: no report without a flipped status.
    assert_eq!(
        store.load_leave_request(&request.id).unwrap().status,
        LeaveStatus::PendingAnalysis
    );
    assert!(store.load_leave_report(report.id.as_str()).is_err());

    // Reopening the store applies the staged pair together.
    let reopened = ScheduleStore::open(dir.path()).unwrap();
    let recovered = reopened.load_leave_request(&request.id).unwrap();
    assert_eq!(recovered.status, LeaveStatus::PendingApproval);
    assert_eq!(recovered.analysis_report_id.as_ref(), Some(&report.id));
    assert_eq!(
        reopened.load_leave_report(report.id.as_str()).unwrap(),
        report
    );
    assert!(!staged_dir.join("q1.json").exists());

    // The replayed transaction already settled the request; a retried
    // analysis commit must skip instead of minting a second report.
    assert!(reopened.commit_analysis(&report).unwrap().is_none());
}

#[test]
fn failed_analysis_is_recorded_once() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::open(dir.path()).unwrap();

    let mut request = LeaveRequest::new(
        ResidentId::new("r2"),
        LeaveType::Annual,
        date(2025, 3, 4),
        date(2025, 3, 6),
    )
    .unwrap();
    request.id = RequestId::new("q1");
    store.save_leave_request(&request).unwrap();

    store
        .mark_analysis_failed(&request.id, "resident lookup timed out")
        .unwrap();
    let stored = store.load_leave_request(&request.id).unwrap();
    assert_eq!(stored.status, LeaveStatus::AnalysisFailed);
    assert_eq!(
        stored.analysis_error.as_deref(),
        Some("resident lookup timed out")
    );

    // The terminal state sticks.
    store.mark_analysis_failed(&request.id, "second failure").unwrap();
    let stored = store.load_leave_request(&request.id).unwrap();
    assert_eq!(
        stored.analysis_error.as_deref(),
        Some("resident lookup timed out")
    );
}

#[test]
fn listed_requests_come_back_sorted() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::open(dir.path()).unwrap();
    for id in ["q3", "q1", "q2"] {
        let mut request = LeaveRequest::new(
            ResidentId::new("r1"),
            LeaveType::Annual,
            date(2025, 3, 4),
            date(2025, 3, 6),
        )
        .unwrap();
        request.id = RequestId::new(id);
        store.save_leave_request(&request).unwrap();
    }
    let listed = store.list_leave_requests().unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["q1", "q2", "q3"]);
}
