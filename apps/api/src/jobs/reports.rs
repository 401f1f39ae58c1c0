//! Report generators. Each one is a pure function over a snapshot of the
//! tables so the runner can hold the read lock only while it computes.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use super::{ReportParams, ReportType};
use crate::store::Tables;

const DEFAULT_ACTIVITY_DAYS: i64 = 30;
const NO_STATUS: &str = "SIN_ESTADO";
const NO_DATE: &str = "SIN_FECHA";

#[derive(Debug, Serialize)]
pub struct CrtSummary {
    pub total_waybills: usize,
    pub total_value: Decimal,
    pub by_status: BTreeMap<String, usize>,
    pub by_currency: BTreeMap<String, usize>,
    pub by_month: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct ActivityReport {
    pub period_days: i64,
    pub since: NaiveDate,
    pub waybills_issued: usize,
    pub manifests_created: usize,
    pub total_activity: usize,
}

/// Runs `report_type` and returns its JSON result.
pub fn run(
    report_type: ReportType,
    params: &ReportParams,
    tables: &Tables,
    today: NaiveDate,
) -> Result<Value> {
    let value = match report_type {
        ReportType::CrtSummary => serde_json::to_value(crt_summary(tables, params)?)?,
        ReportType::Activity => serde_json::to_value(activity(tables, params, today)?)?,
    };
    Ok(value)
}

/// Waybill statistics for an optional issue-date window. With a bound set,
/// waybills without an issue date are excluded.
pub fn crt_summary(tables: &Tables, params: &ReportParams) -> Result<CrtSummary> {
    if let (Some(from), Some(to)) = (params.date_from, params.date_to) {
        if from > to {
            bail!("date_from {from} is after date_to {to}");
        }
    }

    let in_window = |date: Option<NaiveDate>| match (params.date_from, params.date_to, date) {
        (None, None, _) => true,
        (_, _, None) => false,
        (from, to, Some(d)) => from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t),
    };

    let mut summary = CrtSummary {
        total_waybills: 0,
        total_value: Decimal::ZERO,
        by_status: BTreeMap::new(),
        by_currency: BTreeMap::new(),
        by_month: BTreeMap::new(),
    };

    for waybill in tables.waybills.values().filter(|w| in_window(w.issue_date)) {
        summary.total_waybills += 1;
        let Some(total) = summary
            .total_value
            .checked_add(waybill.declared_value.unwrap_or_default())
        else {
            bail!("total declared value overflows at waybill {}", waybill.number);
        };
        summary.total_value = total;

        let status = waybill
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_STATUS);
        *summary.by_status.entry(status.to_string()).or_default() += 1;

        if let Some(currency) = waybill.currency_id.and_then(|id| tables.currencies.get(id)) {
            *summary.by_currency.entry(currency.name.clone()).or_default() += 1;
        }

        let month = waybill
            .issue_date
            .map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_else(|| NO_DATE.to_string());
        *summary.by_month.entry(month).or_default() += 1;
    }

    Ok(summary)
}

/// Waybills issued and manifests created in the last `days` days.
pub fn activity(tables: &Tables, params: &ReportParams, today: NaiveDate) -> Result<ActivityReport> {
    let days = params.days.unwrap_or(DEFAULT_ACTIVITY_DAYS);
    if days <= 0 {
        bail!("days must be positive, got {days}");
    }
    let Some(since) = today.checked_sub_signed(Duration::days(days)) else {
        bail!("days out of range: {days}");
    };

    let waybills_issued = tables
        .waybills
        .values()
        .filter(|w| w.issue_date.is_some_and(|d| d >= since))
        .count();
    let manifests_created = tables
        .manifests
        .values()
        .filter(|m| m.created_at.date_naive() >= since)
        .count();

    Ok(ActivityReport {
        period_days: days,
        since,
        waybills_issued,
        manifests_created,
        total_activity: waybills_issued + manifests_created,
    })
}

/// Catalogue served at `GET /api/reports/types`.
pub fn catalogue() -> Value {
    json!({
        "crt_summary": {
            "name": "CRT summary",
            "description": "Waybill statistics by status, currency and month for a period",
            "parameters": {
                "date_from": { "type": "date", "required": false, "description": "Issued on or after" },
                "date_to": { "type": "date", "required": false, "description": "Issued on or before" }
            }
        },
        "activity": {
            "name": "Activity",
            "description": "Waybills issued and manifests created in a recent window",
            "parameters": {
                "days": { "type": "number", "required": false, "default": DEFAULT_ACTIVITY_DAYS, "description": "Days to look back" }
            }
        }
    })
}
