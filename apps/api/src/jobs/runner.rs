//! Bounded report worker pool.
//!
//! Every job takes a permit from its report type's semaphore first, then one
//! from the global worker semaphore, so a burst of one report type can never
//! occupy workers it is not allowed to run on. There are no retries.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::reports;
use super::{JobRecord, JobStatus, JobStore, ReportParams, ReportType};
use crate::errors::AppError;
use crate::manifest::today;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct JobRunner {
    jobs: JobStore,
    store: Arc<Store>,
    workers: Arc<Semaphore>,
    crt_summary_slots: Arc<Semaphore>,
    activity_slots: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(store: Arc<Store>, workers: usize, max_instances: usize) -> Self {
        let workers = workers.max(1);
        let max_instances = max_instances.max(1);
        info!(workers, max_instances, "Report worker pool ready");
        JobRunner {
            jobs: JobStore::new(),
            store,
            workers: Arc::new(Semaphore::new(workers)),
            crt_summary_slots: Arc::new(Semaphore::new(max_instances)),
            activity_slots: Arc::new(Semaphore::new(max_instances)),
        }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    fn slots(&self, report_type: ReportType) -> Arc<Semaphore> {
        match report_type {
            ReportType::CrtSummary => Arc::clone(&self.crt_summary_slots),
            ReportType::Activity => Arc::clone(&self.activity_slots),
        }
    }

    /// Records a queued job and hands it to the pool.
    pub async fn submit(&self, report_type: ReportType, parameters: ReportParams) -> JobRecord {
        let job_id = format!("report_{}_{}", report_type.as_str(), Uuid::new_v4().simple());
        let record = JobRecord::queued(job_id.clone(), report_type, parameters);
        self.jobs.set(record.clone()).await;
        info!(job_id = %job_id, report_type = report_type.as_str(), "Report job queued");

        let runner = self.clone();
        tokio::spawn(async move { runner.execute(job_id).await });
        record
    }

    /// Best-effort cancel. Queued jobs never start; running jobs finish but
    /// their result is discarded.
    pub async fn cancel(&self, job_id: &str) -> Result<JobRecord, AppError> {
        let mut was_active = false;
        let record = self
            .jobs
            .update(job_id, |r| {
                if r.status.is_active() {
                    was_active = true;
                    r.status = JobStatus::Cancelled;
                    r.message = "Cancelled by user".to_string();
                    r.completed_at = Some(Utc::now());
                }
            })
            .await
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        if !was_active {
            return Err(AppError::Validation(format!(
                "job {job_id} already finished with status {:?}",
                record.status
            )));
        }
        info!(job_id, "Report job cancelled");
        Ok(record)
    }

    async fn execute(self, job_id: String) {
        let Some(queued) = self.jobs.get(&job_id).await else {
            return;
        };
        let report_type = queued.report_type;

        let Ok(_type_permit) = self.slots(report_type).acquire_owned().await else {
            self.fail(&job_id, anyhow!("report slots closed")).await;
            return;
        };
        let Ok(_worker_permit) = Arc::clone(&self.workers).acquire_owned().await else {
            self.fail(&job_id, anyhow!("worker pool closed")).await;
            return;
        };

        let started = self
            .jobs
            .update(&job_id, |r| {
                if r.status == JobStatus::Queued {
                    r.status = JobStatus::Processing;
                    r.progress = 10;
                    r.message = "Processing report".to_string();
                    r.started_at = Some(Utc::now());
                }
            })
            .await;
        if started.map(|r| r.status) != Some(JobStatus::Processing) {
            info!(job_id = %job_id, "Skipping cancelled report job");
            return;
        }

        let store = Arc::clone(&self.store);
        let parameters = queued.parameters;
        let outcome = run_blocking(move || {
            let tables = store.blocking_read();
            reports::run(report_type, &parameters, &tables, today())
        })
        .await;

        match outcome {
            Ok(result) => {
                let finished = self
                    .jobs
                    .update(&job_id, |r| {
                        if r.status == JobStatus::Processing {
                            r.status = JobStatus::Completed;
                            r.progress = 100;
                            r.message = "Report completed".to_string();
                            r.result = Some(result);
                            r.completed_at = Some(Utc::now());
                        }
                    })
                    .await;
                match finished.map(|r| r.status) {
                    Some(JobStatus::Completed) => {
                        info!(job_id = %job_id, report_type = report_type.as_str(), "Report job completed")
                    }
                    _ => warn!(job_id = %job_id, "Report finished after cancel; result discarded"),
                }
            }
            Err(e) => self.fail(&job_id, e).await,
        }
    }

    async fn fail(&self, job_id: &str, e: anyhow::Error) {
        error!(job_id, "Report job failed: {e:#}");
        self.jobs
            .update(job_id, |r| {
                if r.status != JobStatus::Cancelled {
                    r.status = JobStatus::Failed;
                    r.message = format!("Error: {e}");
                    r.error = Some(format!("{e:?}"));
                    r.completed_at = Some(Utc::now());
                }
            })
            .await;
    }
}

/// Runs a generator on the blocking pool. A panic comes back as an error so
/// the job can still be marked failed.
async fn run_blocking<F>(generate: F) -> anyhow::Result<Value>
where
    F: FnOnce() -> anyhow::Result<Value> + Send + 'static,
{
    match tokio::task::spawn_blocking(generate).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow!("report generator panicked: {detail}"))
        }
        Err(e) => Err(anyhow!("report task did not finish: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::time::Duration;

    async fn wait_for(runner: &JobRunner, job_id: &str) -> JobRecord {
        for _ in 0..400 {
            if let Some(record) = runner.jobs().get(job_id).await {
                if !record.status.is_active() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} did not finish");
    }

    fn runner(max_instances: usize) -> JobRunner {
        JobRunner::new(Arc::new(Store::new()), 2, max_instances)
    }

    // ── execution ──

    #[tokio::test]
    async fn test_submit_runs_to_completion() {
        let runner = runner(3);
        let queued = runner
            .submit(ReportType::CrtSummary, ReportParams::default())
            .await;
        assert!(queued.job_id.starts_with("report_crt_summary_"));

        let done = wait_for(&runner, &queued.job_id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.result.unwrap()["total_waybills"], 0);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_report_error_is_recorded_as_failed() {
        let runner = runner(3);
        let params = ReportParams {
            days: Some(-1),
            ..Default::default()
        };
        let queued = runner.submit(ReportType::Activity, params).await;

        let done = wait_for(&runner, &queued.job_id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.message.contains("days must be positive"));
        assert!(done.error.is_some());
        assert!(done.result.is_none());
    }

    #[tokio::test]
    async fn test_per_type_limit_holds_jobs_in_queue() {
        let runner = runner(1);
        let held = runner.slots(ReportType::Activity).acquire_owned().await.unwrap();

        let queued = runner.submit(ReportType::Activity, ReportParams::default()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            runner.jobs().get(&queued.job_id).await.unwrap().status,
            JobStatus::Queued
        );

        drop(held);
        assert_eq!(wait_for(&runner, &queued.job_id).await.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_generator_panic_becomes_error() {
        let err = run_blocking(|| panic!("bad row")).await.unwrap_err();
        assert!(err.to_string().contains("panicked: bad row"));

        let ok = run_blocking(|| Ok(serde_json::json!({ "n": 1 }))).await.unwrap();
        assert_eq!(ok["n"], 1);
    }

    #[tokio::test]
    async fn test_overflowing_summary_job_ends_failed() {
        let store = Arc::new(Store::new());
        {
            let mut tables = store.write().await;
            for number in ["B1", "B2"] {
                let waybill: crate::models::waybill::Waybill = serde_json::from_value(
                    serde_json::json!({ "number": number, "declared_value": Decimal::MAX.to_string() }),
                )
                .unwrap();
                let id = tables.waybills.allocate_id();
                tables.waybills.put(id, crate::models::waybill::Waybill { id, ..waybill });
            }
        }
        let runner = JobRunner::new(store, 2, 3);
        let queued = runner
            .submit(ReportType::CrtSummary, ReportParams::default())
            .await;

        let done = wait_for(&runner, &queued.job_id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.message.contains("overflows"));
        assert!(runner.jobs().list_active().await.is_empty());
    }

    // ── cancel ──

    #[tokio::test]
    async fn test_cancelled_queued_job_never_starts() {
        let runner = runner(3);
        let record = JobRecord::queued(
            "report_activity_manual".to_string(),
            ReportType::Activity,
            ReportParams::default(),
        );
        runner.jobs().set(record).await;

        let cancelled = runner.cancel("report_activity_manual").await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        runner.clone().execute("report_activity_manual".to_string()).await;
        let after = runner.jobs().get("report_activity_manual").await.unwrap();
        assert_eq!(after.status, JobStatus::Cancelled);
        assert!(after.started_at.is_none());
        assert!(after.result.is_none());
    }

    #[tokio::test]
    async fn test_cancel_finished_job_is_rejected() {
        let runner = runner(3);
        let queued = runner.submit(ReportType::Activity, ReportParams::default()).await;
        wait_for(&runner, &queued.job_id).await;

        let err = runner.cancel(&queued.job_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let err = runner(3).cancel("report_nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
