pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::jobs::handlers as reports;
use crate::manifest::handlers as manifests;
use crate::models::reference::{Carrier, City, Country, Currency, Party};
use crate::models::waybill::Waybill;
use crate::reference::handlers::crud_routes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Reference data and waybills
        .merge(crud_routes::<Country>("/api/countries"))
        .merge(crud_routes::<City>("/api/cities"))
        .merge(crud_routes::<Currency>("/api/currencies"))
        .merge(crud_routes::<Carrier>("/api/carriers"))
        .merge(crud_routes::<Party>("/api/parties"))
        .merge(crud_routes::<Waybill>("/api/waybills"))
        // Waybill → manifest
        .route(
            "/api/waybills/:id/manifest-data",
            get(manifests::handle_manifest_data),
        )
        .route(
            "/api/waybills/:id/manifest-preview",
            get(manifests::handle_manifest_preview),
        )
        .route(
            "/api/waybills/:id/expense-breakdown",
            get(manifests::handle_expense_breakdown),
        )
        .route(
            "/api/waybills/:id/manifest",
            post(manifests::handle_generate_from_waybill),
        )
        .route(
            "/api/waybills/:id/manifests",
            post(manifests::handle_save_from_waybill),
        )
        // Manifests
        .route(
            "/api/manifests",
            get(manifests::handle_list_manifests).post(manifests::handle_create_manifest),
        )
        .route("/api/manifests/stats", get(manifests::handle_manifest_stats))
        .route(
            "/api/manifests/status-config",
            get(manifests::handle_status_config),
        )
        .route(
            "/api/manifests/:id",
            get(manifests::handle_get_manifest)
                .put(manifests::handle_update_manifest)
                .delete(manifests::handle_void_manifest),
        )
        .route(
            "/api/manifests/:id/duplicate",
            post(manifests::handle_duplicate_manifest),
        )
        .route("/api/manifests/:id/pdf", get(manifests::handle_manifest_pdf))
        // Report jobs
        .route("/api/reports", post(reports::handle_create_report))
        .route("/api/reports/types", get(reports::handle_report_types))
        .route("/api/reports/active", get(reports::handle_active_reports))
        .route("/api/reports/:job_id", get(reports::handle_report_status))
        .route(
            "/api/reports/:job_id/cancel",
            post(reports::handle_cancel_report),
        )
        .with_state(state)
}
