// On-demand report jobs: a job-status store, a bounded worker pool and the
// report generators it runs.

pub mod handlers;
pub mod reports;
pub mod runner;
pub mod store;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use runner::JobRunner;
pub use store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Queued and processing jobs are active; everything else is final.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    CrtSummary,
    Activity,
}

impl ReportType {
    pub const ALL: [ReportType; 2] = [ReportType::CrtSummary, ReportType::Activity];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::CrtSummary => "crt_summary",
            ReportType::Activity => "activity",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw.trim())
    }
}

/// Parameters accepted by the report generators. Each report reads only the
/// ones it understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportParams {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    /// 0 while queued, 10 once a worker picks the job up, 100 when done.
    pub progress: u8,
    pub message: String,
    pub report_type: ReportType,
    pub parameters: ReportParams,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn queued(job_id: String, report_type: ReportType, parameters: ReportParams) -> Self {
        JobRecord {
            job_id,
            status: JobStatus::Queued,
            progress: 0,
            message: "Queued for processing".to_string(),
            report_type,
            parameters,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}
