use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::record::ManifestFields;
use crate::manifest::status::ManifestStatus;

/// A stored MIC/DTA manifest. Rows are never removed; voiding moves them to
/// `ANULADO`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRow {
    pub id: i64,
    /// The waybill the manifest was derived from, if any.
    pub waybill_id: Option<i64>,
    pub fields: ManifestFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ManifestRow {
    pub fn status(&self) -> ManifestStatus {
        self.fields.current_status()
    }
}
