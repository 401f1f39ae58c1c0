//! Generic CRUD handlers shared by every reference table and waybills.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::errors::AppError;
use crate::state::AppState;
use crate::store::Record;

/// GET /api/{table}
pub async fn list_records<R: Record>(State(state): State<AppState>) -> Json<Vec<R>> {
    Json(state.store.list::<R>().await)
}

/// GET /api/{table}/:id
pub async fn get_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<R>, AppError> {
    Ok(Json(state.store.get::<R>(id).await?))
}

/// POST /api/{table}
pub async fn create_record<R: Record>(
    State(state): State<AppState>,
    Json(row): Json<R>,
) -> Result<(StatusCode, Json<R>), AppError> {
    let created = state.store.create(row).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/{table}/:id
pub async fn update_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(row): Json<R>,
) -> Result<Json<R>, AppError> {
    Ok(Json(state.store.update(id, row).await?))
}

/// DELETE /api/{table}/:id
pub async fn delete_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete::<R>(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mounts the five CRUD routes for `R` under `path`.
pub fn crud_routes<R: Record>(path: &str) -> Router<AppState> {
    Router::new()
        .route(path, get(list_records::<R>).post(create_record::<R>))
        .route(
            &format!("{path}/:id"),
            get(get_record::<R>)
                .put(update_record::<R>)
                .delete(delete_record::<R>),
        )
}
