use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strong identifier for a resident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidentId(String);

impl ResidentId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strong identifier for a call assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strong identifier for a leave request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strong identifier for a leave analysis report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(String);

impl ReportId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A resident in the training program. Immutable during a scheduling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    pub id: ResidentId,
    pub name: String,
    pub pgy_level: u8,
    pub specialty: String,
    #[serde(default = "default_true")]
    pub on_service: bool,
    #[serde(default)]
    pub is_chief: bool,
    #[serde(default)]
    pub call_exempt: bool,
    #[serde(default = "default_leave_quota")]
    pub annual_leave_quota: u32,
}

fn default_true() -> bool {
    true
}

fn default_leave_quota() -> u32 {
    20
}

impl Resident {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, pgy_level: u8, specialty: S) -> Self {
        Self {
            id: ResidentId::random(),
            name: name.into(),
            pgy_level,
            specialty: specialty.into(),
            on_service: true,
            is_chief: false,
            call_exempt: false,
            annual_leave_quota: default_leave_quota(),
        }
    }
}

/// Visiting rotator from another program; counts toward coverage only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRotator {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ExternalRotator {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Service team within the home rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationType {
    CoreNsx,
    MandatoryOffService,
    ExamLeave,
    HolidayLeave,
    Flexible,
}

/// One rotation placement; a resident holds at most one per block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationAssignment {
    pub resident_id: ResidentId,
    pub rotation_name: String,
    pub rotation_type: RotationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday_type: Option<String>,
}

/// Fixed 28-day scheduling unit; 13 per academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationBlock {
    pub block_number: u8,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub assignments: Vec<RotationAssignment>,
}

impl RotationBlock {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn assignment_for(&self, resident: &ResidentId) -> Option<&RotationAssignment> {
        self.assignments.iter().find(|a| &a.resident_id == resident)
    }
}

/// Recorded when a block fails an enabled coverage rule. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageViolation {
    pub block_number: u8,
    pub rule_name: String,
    pub required: u32,
    pub actual: u32,
}

/// Output of the yearly rotation engine. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    /// "YYYY-YYYY", always supplied by the caller.
    pub id: String,
    pub blocks: Vec<RotationBlock>,
    #[serde(default)]
    pub violations: Vec<CoverageViolation>,
    #[serde(default = "default_version")]
    pub version: u32,
}

pub(crate) fn default_version() -> u32 {
    1
}

impl AcademicYear {
    pub fn block_for(&self, date: NaiveDate) -> Option<&RotationBlock> {
        self.blocks.iter().find(|b| b.contains(date))
    }

    pub fn rotation_for(
        &self,
        resident: &ResidentId,
        date: NaiveDate,
    ) -> Option<&RotationAssignment> {
        self.block_for(date).and_then(|b| b.assignment_for(resident))
    }

    /// The resident's team on the block containing `date`, if tagged.
    pub fn team_for(&self, resident: &ResidentId, date: NaiveDate) -> Option<Team> {
        self.rotation_for(resident, date).and_then(|a| a.team)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    Night,
    Weekend,
    Holiday,
    PostCall,
}

impl CallType {
    pub fn points(self) -> u32 {
        match self {
            CallType::Night => 1,
            CallType::Weekend => 2,
            CallType::Holiday => 3,
            CallType::PostCall => 0,
        }
    }
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallType::Night => "Night",
            CallType::Weekend => "Weekend",
            CallType::Holiday => "Holiday",
            CallType::PostCall => "PostCall",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    Scheduled,
    PostCall,
}

/// One call duty on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAssignment {
    pub id: CallId,
    pub resident_id: ResidentId,
    pub date: NaiveDate,
    pub call_type: CallType,
    pub points: u32,
    pub is_holiday: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    pub status: CallStatus,
}

impl CallAssignment {
    pub fn is_post_call(&self) -> bool {
        self.call_type == CallType::PostCall
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveType {
    Annual,
    Conference,
    Sick,
    Compassionate,
    Personal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveStatus {
    PendingAnalysis,
    PendingApproval,
    Approved,
    Denied,
    FlaggedForReview,
    AnalysisFailed,
}

/// A leave request. Created externally as `PendingAnalysis`; the analyzer
/// transitions it exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub resident_id: ResidentId,
    pub leave_type: LeaveType,
    pub status: LeaveStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_report_id: Option<ReportId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_justification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

impl LeaveRequest {
    pub fn new(
        resident_id: ResidentId,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, String> {
        if end_date < start_date {
            return Err("leave end must not precede start".to_string());
        }
        Ok(Self {
            id: RequestId::random(),
            resident_id,
            leave_type,
            status: LeaveStatus::PendingAnalysis,
            start_date,
            end_date,
            analysis_report_id: None,
            denial_justification: None,
            analysis_error: None,
        })
    }

    /// Inclusive length in days.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn spans(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Inclusive civil-date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err("range end must not precede start".to_string());
        }
        Ok(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClinicalDuty {
    OperatingRoom,
    Clinic,
}

/// One OR or clinic commitment; input to the leave analyzer's conflict scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalSlot {
    pub date: NaiveDate,
    pub duty: ClinicalDuty,
    pub resident_id: ResidentId,
    pub description: String,
}
