//! Axum route handlers for manifests and the waybill-to-manifest flow.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::layout::render_manifest;
use crate::manifest::builder::{clone_preview, derive_fields, resolve, ClonePreview, ResolvedWaybill};
use crate::manifest::expenses::{breakdown, ExpenseBreakdown, TotalOverflow};
use crate::manifest::record::{FieldError, ManifestFields};
use crate::manifest::status::{status_table, validate_update, ManifestStatus, StatusRule, TransitionError};
use crate::manifest::today;
use crate::models::manifest::ManifestRow;
use crate::models::waybill::Waybill;
use crate::state::AppState;
use crate::store::{not_found, Tables};

const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ManifestPage {
    pub items: Vec<ManifestRow>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Serialize)]
pub struct ManifestStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateManifestRequest {
    #[serde(default)]
    pub waybill_id: Option<i64>,
    #[serde(flatten)]
    pub fields: ManifestFields,
}

#[derive(Debug, Deserialize)]
pub struct UpdateManifestRequest {
    /// Acknowledges a transition into a status that needs confirmation.
    #[serde(default)]
    pub confirm: bool,
    /// Field edits; `status` here is the requested transition.
    #[serde(flatten)]
    pub changes: ManifestFields,
}

#[derive(Debug, Serialize)]
pub struct ManifestData {
    pub waybill_id: i64,
    pub fields: ManifestFields,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    #[serde(default)]
    pub save: bool,
    #[serde(default = "default_true")]
    pub download: bool,
}

#[derive(Debug, Deserialize)]
pub struct SaveQuery {
    #[serde(default)]
    pub pdf: bool,
}

fn default_true() -> bool {
    true
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn field_error(e: FieldError) -> AppError {
    AppError::Validation(e.to_string())
}

fn overflow_error(e: TotalOverflow) -> AppError {
    AppError::Validation(e.to_string())
}

fn transition_error(e: TransitionError) -> AppError {
    match e {
        TransitionError::ConfirmationRequired(_) => AppError::Validation(e.to_string()),
        TransitionError::NotAllowed { .. } | TransitionError::Locked(_) => {
            AppError::Conflict(e.to_string())
        }
    }
}

fn manifest_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("manifest {id} not found"))
}

fn resolve_waybill(tables: &Tables, id: i64) -> Result<ResolvedWaybill, AppError> {
    let waybill = tables
        .waybills
        .get(id)
        .ok_or_else(|| not_found::<Waybill>(id))?;
    Ok(resolve(tables, waybill))
}

/// Normalizes `fields` and stores them as a new PROVISORIO manifest.
fn insert_manifest(
    tables: &mut Tables,
    waybill_id: Option<i64>,
    mut fields: ManifestFields,
) -> Result<ManifestRow, AppError> {
    fields.status = Some(ManifestStatus::Provisional);
    let fields = fields.normalized(today()).map_err(field_error)?;

    let id = tables.manifests.allocate_id();
    let now = Utc::now();
    let row = ManifestRow {
        id,
        waybill_id,
        fields,
        created_at: now,
        updated_at: now,
    };
    tables.manifests.put(id, row.clone());
    info!(manifest_id = id, ?waybill_id, "Manifest created");
    Ok(row)
}

fn pdf_filename(fields: &ManifestFields, fallback_id: Option<i64>) -> String {
    let stem: String = fields
        .waybill_number
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    match (stem.is_empty(), fallback_id) {
        (false, _) => format!("MIC_{stem}.pdf"),
        (true, Some(id)) => format!("MIC_{id}.pdf"),
        (true, None) => "MIC.pdf".to_string(),
    }
}

fn pdf_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn matches_query(row: &ManifestRow, needle: &str, tables: &Tables) -> bool {
    let waybill_number = row
        .waybill_id
        .and_then(|id| tables.waybills.get(id))
        .map(|w| w.number.as_str());
    [
        row.fields.carrier.as_deref(),
        row.fields.waybill_number.as_deref(),
        row.fields.goods_description.as_deref(),
        waybill_number,
    ]
    .into_iter()
    .flatten()
    .any(|haystack| haystack.to_lowercase().contains(needle))
}

// ────────────────────────────────────────────────────────────────────────────
// Manifest handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/manifests
///
/// Newest first. `q` searches the carrier, waybill number and goods description.
pub async fn handle_list_manifests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ManifestPage> {
    let tables = state.store.read().await;
    let needle = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let matching: Vec<&ManifestRow> = tables
        .manifests
        .values()
        .rev()
        .filter(|row| needle.as_deref().map_or(true, |n| matches_query(row, n, &tables)))
        .collect();

    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);
    let total = matching.len();
    let items = matching
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    Json(ManifestPage {
        items,
        page,
        per_page,
        total,
        pages: total.div_ceil(per_page),
    })
}

/// GET /api/manifests/stats
pub async fn handle_manifest_stats(State(state): State<AppState>) -> Json<ManifestStats> {
    let tables = state.store.read().await;
    let mut by_status: BTreeMap<&'static str, usize> =
        ManifestStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for row in tables.manifests.values() {
        *by_status.entry(row.status().as_str()).or_default() += 1;
    }
    Json(ManifestStats {
        total: tables.manifests.len(),
        by_status,
    })
}

/// GET /api/manifests/status-config
pub async fn handle_status_config() -> Json<&'static [StatusRule]> {
    Json(status_table())
}

/// POST /api/manifests
///
/// Manual creation. Boxes 1 (carrier) and 23 (waybill number) are required.
pub async fn handle_create_manifest(
    State(state): State<AppState>,
    Json(request): Json<CreateManifestRequest>,
) -> Result<(StatusCode, Json<ManifestRow>), AppError> {
    let fields = request.fields;
    for (number, value) in [(1, &fields.carrier), (23, &fields.waybill_number)] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("box {number} is required")));
        }
    }
    if fields.status.is_some_and(|s| s != ManifestStatus::Provisional) {
        return Err(AppError::Validation(
            "new manifests start as PROVISORIO".to_string(),
        ));
    }

    let mut tables = state.store.write().await;
    if let Some(waybill_id) = request.waybill_id {
        if !tables.waybills.contains(waybill_id) {
            return Err(AppError::Validation(format!(
                "waybill {waybill_id} does not exist"
            )));
        }
    }
    let row = insert_manifest(&mut tables, request.waybill_id, fields)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/manifests/:id
pub async fn handle_get_manifest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ManifestRow>, AppError> {
    let tables = state.store.read().await;
    let mut row = tables
        .manifests
        .get(id)
        .cloned()
        .ok_or_else(|| manifest_not_found(id))?;
    row.fields.mirror_owner();
    Ok(Json(row))
}

/// PUT /api/manifests/:id
///
/// Field edits and/or a status transition, validated against the status table.
pub async fn handle_update_manifest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateManifestRequest>,
) -> Result<Json<ManifestRow>, AppError> {
    let mut tables = state.store.write().await;
    let row = tables
        .manifests
        .get_mut(id)
        .ok_or_else(|| manifest_not_found(id))?;

    let current = row.status();
    let mut edited = row.fields.clone();
    edited.merge_edits(&request.changes);
    let edited = edited.normalized(today()).map_err(field_error)?;
    let edits_fields = edited.differs_besides_status(&row.fields);

    let target = validate_update(current, request.changes.status, edits_fields, request.confirm)
        .map_err(transition_error)?;

    row.fields = edited;
    row.fields.status = Some(target);
    row.updated_at = Utc::now();
    if target != current {
        info!(
            manifest_id = id,
            from = current.as_str(),
            to = target.as_str(),
            closed = target.is_terminal(),
            "Manifest status changed"
        );
    }
    Ok(Json(row.clone()))
}

/// DELETE /api/manifests/:id
///
/// Manifests are never removed: this voids them.
pub async fn handle_void_manifest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ManifestRow>, AppError> {
    let mut tables = state.store.write().await;
    let row = tables
        .manifests
        .get_mut(id)
        .ok_or_else(|| manifest_not_found(id))?;

    let current = row.status();
    let target = validate_update(current, Some(ManifestStatus::Voided), false, true)
        .map_err(transition_error)?;
    row.fields.status = Some(target);
    row.updated_at = Utc::now();
    info!(manifest_id = id, from = current.as_str(), "Manifest voided");
    Ok(Json(row.clone()))
}

/// POST /api/manifests/:id/duplicate
pub async fn handle_duplicate_manifest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ManifestRow>), AppError> {
    let mut tables = state.store.write().await;
    let source = tables
        .manifests
        .get(id)
        .cloned()
        .ok_or_else(|| manifest_not_found(id))?;

    let mut fields = source.fields;
    fields.issue_date = None;
    let row = insert_manifest(&mut tables, source.waybill_id, fields)?;
    info!(source_id = id, manifest_id = row.id, "Manifest duplicated");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/manifests/:id/pdf
pub async fn handle_manifest_pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let fields = {
        let tables = state.store.read().await;
        tables
            .manifests
            .get(id)
            .map(|row| row.fields.clone())
            .ok_or_else(|| manifest_not_found(id))?
    };
    let filename = pdf_filename(&fields, Some(id));
    let bytes = render_manifest(fields).await?;
    Ok(pdf_response(bytes, &filename))
}

// ────────────────────────────────────────────────────────────────────────────
// Waybill-derived handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/waybills/:id/manifest-data
///
/// The derived field values, for pre-filling a manifest form.
pub async fn handle_manifest_data(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ManifestData>, AppError> {
    let tables = state.store.read().await;
    let resolved = resolve_waybill(&tables, id)?;
    Ok(Json(ManifestData {
        waybill_id: id,
        fields: derive_fields(&resolved, None).map_err(overflow_error)?,
    }))
}

/// GET /api/waybills/:id/manifest-preview
pub async fn handle_manifest_preview(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ClonePreview>, AppError> {
    let tables = state.store.read().await;
    let resolved = resolve_waybill(&tables, id)?;
    Ok(Json(clone_preview(&resolved).map_err(overflow_error)?))
}

/// GET /api/waybills/:id/expense-breakdown
pub async fn handle_expense_breakdown(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ExpenseBreakdown>, AppError> {
    let tables = state.store.read().await;
    let waybill = tables
        .waybills
        .get(id)
        .ok_or_else(|| not_found::<Waybill>(id))?;
    Ok(Json(breakdown(&waybill.expenses).map_err(overflow_error)?))
}

/// POST /api/waybills/:id/manifest?save&download
///
/// Derives the manifest (plus optional overrides in the body). With `save`
/// it is stored; the PDF is returned unless `download=false`.
pub async fn handle_generate_from_waybill(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<GenerateQuery>,
    overrides: Option<Json<ManifestFields>>,
) -> Result<Response, AppError> {
    let overrides = overrides.map(|Json(o)| o);

    let (fields, saved) = {
        let mut tables = state.store.write().await;
        let resolved = resolve_waybill(&tables, id)?;
        let derived = derive_fields(&resolved, overrides.as_ref()).map_err(overflow_error)?;
        if query.save {
            let row = insert_manifest(&mut tables, Some(id), derived)?;
            (row.fields.clone(), Some(row))
        } else {
            let mut preview = derived.normalized(today()).map_err(field_error)?;
            preview.status = Some(ManifestStatus::Provisional);
            (preview, None)
        }
    };

    if let (Some(row), false) = (&saved, query.download) {
        return Ok((StatusCode::CREATED, Json(row.clone())).into_response());
    }

    let filename = pdf_filename(&fields, saved.as_ref().map(|r| r.id));
    let bytes = render_manifest(fields).await?;
    Ok(pdf_response(bytes, &filename))
}

/// POST /api/waybills/:id/manifests?pdf
///
/// Derives and stores a manifest. Returns the row, or its PDF with `pdf=true`.
pub async fn handle_save_from_waybill(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<SaveQuery>,
    overrides: Option<Json<ManifestFields>>,
) -> Result<Response, AppError> {
    let overrides = overrides.map(|Json(o)| o);

    let row = {
        let mut tables = state.store.write().await;
        let resolved = resolve_waybill(&tables, id)?;
        let derived = derive_fields(&resolved, overrides.as_ref()).map_err(overflow_error)?;
        insert_manifest(&mut tables, Some(id), derived)?
    };

    if !query.pdf {
        return Ok((StatusCode::CREATED, Json(row)).into_response());
    }
    let filename = pdf_filename(&row.fields, Some(row.id));
    let bytes = render_manifest(row.fields).await?;
    Ok(pdf_response(bytes, &filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_filename_sanitizes_number() {
        let fields = ManifestFields {
            waybill_number: Some("PY 0001/24".into()),
            ..Default::default()
        };
        assert_eq!(pdf_filename(&fields, Some(3)), "MIC_PY000124.pdf");
        assert_eq!(pdf_filename(&ManifestFields::default(), Some(3)), "MIC_3.pdf");
        assert_eq!(pdf_filename(&ManifestFields::default(), None), "MIC.pdf");
    }

    #[test]
    fn test_transition_errors_map_to_status_classes() {
        use ManifestStatus::*;
        assert!(matches!(
            transition_error(TransitionError::ConfirmationRequired(Final)),
            AppError::Validation(_)
        ));
        assert!(matches!(
            transition_error(TransitionError::Locked(Confirmed)),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            transition_error(TransitionError::NotAllowed { from: Voided, to: Final }),
            AppError::Conflict(_)
        ));
    }
}
