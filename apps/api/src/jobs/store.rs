use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::JobRecord;

/// In-memory job-status store shared by the runner and the HTTP handlers.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn set(&self, record: JobRecord) {
        self.jobs
            .write()
            .await
            .insert(record.job_id.clone(), record);
    }

    /// Applies `f` to the record under the write lock and returns the result.
    pub async fn update<F>(&self, job_id: &str, f: F) -> Option<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(job_id)?;
        f(record);
        Some(record.clone())
    }

    /// Queued and processing jobs, oldest first.
    pub async fn list_active(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.read().await;
        let mut active: Vec<JobRecord> = jobs
            .values()
            .filter(|r| r.status.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        active
    }
}
