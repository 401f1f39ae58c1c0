// MIC/DTA manifests: the box table, the typed record, derivation from CRT
// waybills, expense totals, entity blocks and the status lifecycle.

pub mod builder;
pub mod entity;
pub mod expenses;
pub mod fields;
pub mod handlers;
pub mod record;
pub mod status;

use chrono::NaiveDate;

/// Local calendar date used to stamp box 6 when it is empty.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
