#![forbid(unsafe_code)]
use callrota::leave::{self, AnalysisInput, Recommendation, RiskLevel};
use callrota::model::{
    CallAssignment, CallId, CallStatus, CallType, DateRange, LeaveStatus, LeaveType, RequestId,
    ResidentId,
};
use callrota::{AppConfiguration, LeaveRequest, Resident};
use chrono::NaiveDate;

fn resident(id: &str, name: &str, pgy: u8) -> Resident {
    let mut r = Resident::new(name, pgy, "Neurosurgery");
    r.id = ResidentId::new(id);
    r
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn request(id: &str, resident: &str, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
    let mut req = LeaveRequest::new(ResidentId::new(resident), LeaveType::Annual, start, end)
        .unwrap();
    req.id = RequestId::new(id);
    req
}

fn approved(id: &str, resident: &str, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
    let mut req = request(id, resident, start, end);
    req.status = LeaveStatus::Approved;
    req
}

fn roster_of_five() -> Vec<Resident> {
    vec![
        resident("r1", "Avery", 3),
        resident("r2", "Blake", 3),
        resident("r3", "Casey", 3),
        resident("r4", "Drew", 4),
        resident("r5", "Emory", 5),
    ]
}

fn weekend_call(resident: &str, on: NaiveDate) -> CallAssignment {
    CallAssignment {
        id: CallId::random(),
        resident_id: ResidentId::new(resident),
        date: on,
        call_type: CallType::Weekend,
        points: 2,
        is_holiday: false,
        team: None,
        status: CallStatus::Scheduled,
    }
}

#[test]
fn high_severity_conflict_denies_outright() {
    let config = AppConfiguration::default();
    let roster = roster_of_five();
    let req = request("q1", "r1", date(2025, 3, 7), date(2025, 3, 9));
    let calls = vec![weekend_call("r1", date(2025, 3, 8))];

    let report = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &[],
        call_schedule: &calls,
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 1, 15),
    })
    .unwrap();

    assert_eq!(report.recommendation, Recommendation::Deny);
    assert_eq!(report.recommendation.to_status(), LeaveStatus::Denied);
    assert!(report.rationale.contains("Weekend"));
    assert!(report.rationale.contains("2025-03-08"));
    assert_eq!(report.conflicts.len(), 1);
}

#[test]
fn clean_request_is_recommended_for_approval() {
    let config = AppConfiguration::default();
    let roster = roster_of_five();
    // Mid-week request, two months of notice, empty history.
    let req = request("q1", "r1", date(2025, 3, 4), date(2025, 3, 6));

    let report = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &[],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 1, 2),
    })
    .unwrap();

    assert_eq!(report.recommendation, Recommendation::Approve);
    assert_eq!(report.recommendation.to_status(), LeaveStatus::PendingApproval);
    assert_eq!(report.coverage.risk, RiskLevel::Low);
    assert!((report.coverage.ratio - 0.8).abs() < 1e-9);
    assert!(report.fairness.score >= 80.0);
    assert!(report.conflicts.is_empty());
    assert!(report.policy.compliant);
    assert!(report.alternative_dates.is_empty());
}

#[test]
fn overlapping_peer_leave_flags_and_offers_alternatives() {
    let config = AppConfiguration::default();
    let roster = roster_of_five();
    let req = request("q1", "r1", date(2025, 3, 4), date(2025, 3, 6));
    let peer_leave = approved("q0", "r2", date(2025, 3, 4), date(2025, 3, 6));

    let report = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &[peer_leave],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 1, 2),
    })
    .unwrap();

    // 3 of 5 available: medium coverage goes to review with alternatives.
    assert_eq!(report.coverage.risk, RiskLevel::Medium);
    assert!((report.coverage.ratio - 0.6).abs() < 1e-9);
    assert_eq!(report.recommendation, Recommendation::FlagForReview);

    assert_eq!(report.alternative_dates.len(), 3);
    let first = report.alternative_dates[0];
    assert_eq!(first, DateRange::new(date(2025, 2, 18), date(2025, 2, 20)).unwrap());
    for alt in &report.alternative_dates {
        assert!(alt.end < req.start_date || alt.start > req.end_date);
    }
}

#[test]
fn stacked_policy_violations_deny() {
    let config = AppConfiguration::default();
    let roster = roster_of_five();
    // Two days of notice and a twenty-day stretch: two violations.
    let req = request("q1", "r1", date(2025, 3, 3), date(2025, 3, 22));

    let report = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &[],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 3, 1),
    })
    .unwrap();

    assert_eq!(report.recommendation, Recommendation::Deny);
    assert_eq!(report.policy.violations.len(), 2);
    assert!(report.rationale.contains("policy"));
}

#[test]
fn compassionate_leave_waives_the_notice_period() {
    let config = AppConfiguration::default();
    let roster = roster_of_five();
    let mut req = request("q1", "r1", date(2025, 3, 4), date(2025, 3, 6));
    req.leave_type = LeaveType::Compassionate;

    let report = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &[],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 3, 2),
    })
    .unwrap();

    assert!(report.policy.compliant);
    assert_eq!(report.recommendation, Recommendation::Approve);
}

#[test]
fn fairness_tracks_history_and_peer_balance() {
    let config = AppConfiguration::default();
    let mut roster = vec![
        resident("r1", "Avery", 2),
        resident("r2", "Blake", 2),
        resident("r3", "Casey", 2),
        resident("r4", "Drew", 2),
        resident("r5", "Emory", 2),
    ];
    roster[0].specialty = "Neurosurgery".to_string();

    // Requester took 12 recent days; the peer group averages 6.
    let history = vec![
        approved("h1", "r1", date(2025, 5, 1), date(2025, 5, 12)),
        approved("h2", "r2", date(2025, 5, 1), date(2025, 5, 6)),
        approved("h3", "r3", date(2025, 5, 1), date(2025, 5, 6)),
        approved("h4", "r4", date(2025, 5, 1), date(2025, 5, 6)),
        approved("h5", "r5", date(2025, 5, 1), date(2025, 5, 6)),
    ];
    let req = request("q1", "r1", date(2025, 6, 20), date(2025, 6, 21));

    let report = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &history,
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 6, 1),
    })
    .unwrap();

    assert_eq!(report.fairness.recent_days_off, 12);
    assert!((report.fairness.peer_comparison - 2.0).abs() < 1e-9);
    // 100 - 20 (recent) - 20 (peer ratio) + 4 (PGY-2) = 64.
    assert!((report.fairness.score - 64.0).abs() < 1e-9);
    // No request history in June: neutral historical rate.
    assert!((report.fairness.historical_rate - 0.5).abs() < 1e-9);
}

#[test]
fn already_analyzed_requests_are_rejected() {
    let config = AppConfiguration::default();
    let roster = roster_of_five();
    let mut req = request("q1", "r1", date(2025, 3, 4), date(2025, 3, 6));
    req.status = LeaveStatus::Approved;

    let result = leave::analyze(&AnalysisInput {
        request: &req,
        roster: &roster,
        all_leave: &[],
        call_schedule: &[],
        clinical_schedule: &[],
        config: &config,
        today: date(2025, 1, 2),
    });
    assert!(result.is_err());
}
