use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobRunner;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Reference tables, waybills and manifests.
    pub store: Arc<Store>,
    /// Report worker pool; also owns the job-status store.
    pub jobs: JobRunner,
}

impl AppState {
    pub fn new(config: Config, store: Arc<Store>) -> Self {
        let jobs = JobRunner::new(
            Arc::clone(&store),
            config.report_workers,
            config.report_max_instances,
        );
        AppState {
            config,
            store,
            jobs,
        }
    }
}
