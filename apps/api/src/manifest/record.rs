//! `ManifestFields`: the typed values of a MIC/DTA form.
//!
//! Box 9 (vehicle owner) always repeats box 1 (carrier). The mirror is
//! re-applied on every path that produces or reads a record, so a stale or
//! client-supplied box 9 never survives.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::expenses::parse_localized_amount;
use crate::manifest::fields::{self, FIELDS};
use crate::manifest::status::ManifestStatus;

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("box {number} must be a number, got '{value}'")]
    InvalidNumber { number: u8, value: String },
    #[error("unknown manifest status '{0}'")]
    InvalidStatus(String),
    #[error("invalid issue date '{0}', expected dd/mm/yyyy or yyyy-mm-dd")]
    InvalidDate(String),
    #[error("box {0} does not hold data")]
    NoSuchBox(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestFields {
    pub carrier: Option<String>,
    pub carrier_tax_id: Option<String>,
    pub customs_transit: Option<String>,
    pub status: Option<ManifestStatus>,
    pub sheet: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub departure_customs: Option<String>,
    pub destination: Option<String>,
    pub vehicle_owner: Option<String>,
    pub owner_tax_id: Option<String>,
    pub truck_plate: Option<String>,
    pub truck_make: Option<String>,
    pub towing_capacity: Option<String>,
    pub truck_year: Option<String>,
    pub trailer_plate: Option<String>,
    pub substitute_owner: Option<String>,
    pub substitute_tax_id: Option<String>,
    pub substitute_plate: Option<String>,
    pub substitute_make: Option<String>,
    pub substitute_capacity: Option<String>,
    pub substitute_year: Option<String>,
    pub substitute_trailer: Option<String>,
    pub waybill_number: Option<String>,
    pub destination_customs: Option<String>,
    pub currency: Option<String>,
    pub goods_origin: Option<String>,
    pub fot_value: Option<String>,
    pub freight_usd: Option<String>,
    pub insurance_usd: Option<String>,
    pub package_type: Option<String>,
    pub package_count: Option<String>,
    pub gross_weight: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub consignee: Option<String>,
    pub attached_documents: Option<String>,
    pub seals: Option<String>,
    pub goods_description: Option<String>,
    pub dta_route: Option<String>,
}

macro_rules! text_slots {
    ($($n:literal => $member:ident),* $(,)?) => {
        impl ManifestFields {
            fn slot(&self, number: u8) -> Option<&Option<String>> {
                match number {
                    $($n => Some(&self.$member),)*
                    _ => None,
                }
            }

            fn slot_mut(&mut self, number: u8) -> Option<&mut Option<String>> {
                match number {
                    $($n => Some(&mut self.$member),)*
                    _ => None,
                }
            }
        }
    };
}

text_slots! {
    1 => carrier, 2 => carrier_tax_id, 3 => customs_transit, 5 => sheet,
    7 => departure_customs, 8 => destination, 9 => vehicle_owner,
    10 => owner_tax_id, 11 => truck_plate, 12 => truck_make, 13 => towing_capacity,
    14 => truck_year, 15 => trailer_plate, 16 => substitute_owner,
    17 => substitute_tax_id, 18 => substitute_plate, 19 => substitute_make,
    20 => substitute_capacity, 21 => substitute_year, 22 => substitute_trailer,
    23 => waybill_number, 24 => destination_customs, 25 => currency,
    26 => goods_origin, 27 => fot_value, 28 => freight_usd, 29 => insurance_usd,
    30 => package_type, 31 => package_count, 32 => gross_weight, 33 => sender,
    34 => recipient, 35 => consignee, 36 => attached_documents, 37 => seals,
    38 => goods_description, 40 => dta_route,
}

pub const DATE_FORMAT: &str = "%d/%m/%Y";

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl ManifestFields {
    /// The raw value of a box as text, without defaults. Box 9 reads box 1.
    pub fn text(&self, number: u8) -> Option<String> {
        match number {
            4 => self.status.map(|s| s.as_str().to_string()),
            6 => self.issue_date.map(|d| d.format(DATE_FORMAT).to_string()),
            9 => self.carrier.clone(),
            n => self.slot(n).cloned().flatten(),
        }
    }

    /// What the form prints for a box: the value, or the box default.
    pub fn display_text(&self, number: u8) -> String {
        fields::apply_default(number, self.text(number).as_deref())
    }

    pub fn set_text(&mut self, number: u8, value: Option<String>) -> Result<(), FieldError> {
        match number {
            4 => {
                self.status = match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                    Some(raw) => Some(
                        ManifestStatus::parse(raw)
                            .ok_or_else(|| FieldError::InvalidStatus(raw.to_string()))?,
                    ),
                    None => None,
                };
            }
            6 => {
                self.issue_date = match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                    Some(raw) => {
                        Some(parse_date(raw).ok_or_else(|| FieldError::InvalidDate(raw.to_string()))?)
                    }
                    None => None,
                };
            }
            n => {
                let slot = self.slot_mut(n).ok_or(FieldError::NoSuchBox(n))?;
                *slot = value;
            }
        }
        Ok(())
    }

    pub fn mirror_owner(&mut self) {
        self.vehicle_owner = self.carrier.clone();
    }

    /// Applies client overrides on top of derived values. Any member the
    /// client sent replaces ours, except that a blank freight or insurance
    /// never clears a computed total.
    pub fn apply_overrides(&mut self, overrides: &ManifestFields) {
        self.overlay(overrides, true);
    }

    /// Applies an edit: every member present in `changes` replaces ours.
    /// The status is left alone; transitions go through `validate_update`.
    pub fn merge_edits(&mut self, changes: &ManifestFields) {
        let status = self.status;
        self.overlay(changes, false);
        self.status = status;
    }

    fn overlay(&mut self, incoming: &ManifestFields, keep_totals: bool) {
        if incoming.status.is_some() {
            self.status = incoming.status;
        }
        if incoming.issue_date.is_some() {
            self.issue_date = incoming.issue_date;
        }
        for spec in FIELDS.iter().filter(|f| f.key.is_some()) {
            let n = spec.number;
            if matches!(n, 4 | 6) {
                continue;
            }
            let Some(value) = incoming.slot(n) else {
                continue;
            };
            if value.is_none() || (keep_totals && matches!(n, 28 | 29) && is_blank(value)) {
                continue;
            }
            if let Some(slot) = self.slot_mut(n) {
                *slot = value.clone();
            }
        }
        self.mirror_owner();
    }

    /// Prepares a record for storage: trims, fills box defaults, cuts values
    /// to their length limits, checks numeric boxes, dates the form with
    /// `today` when box 6 is empty and mirrors box 9.
    pub fn normalized(mut self, today: NaiveDate) -> Result<Self, FieldError> {
        for spec in FIELDS.iter().filter(|f| f.key.is_some()) {
            let n = spec.number;
            if matches!(n, 4 | 6 | 9) {
                continue;
            }
            let value = fields::apply_default(n, self.text(n).as_deref());
            if spec.numeric && !value.is_empty() && parse_localized_amount(&value).is_none() {
                return Err(FieldError::InvalidNumber { number: n, value });
            }
            let value = fields::clamp_len(n, &value);
            self.set_text(n, (!value.is_empty()).then_some(value))?;
        }
        self.status = Some(self.status.unwrap_or_default());
        self.issue_date = Some(self.issue_date.unwrap_or(today));
        self.mirror_owner();
        Ok(self)
    }

    /// True when any box other than the status differs.
    pub fn differs_besides_status(&self, other: &ManifestFields) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.status = None;
        b.status = None;
        a.mirror_owner();
        b.mirror_owner();
        a != b
    }

    pub fn current_status(&self) -> ManifestStatus {
        self.status.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_box_nine_reads_box_one() {
        let fields = ManifestFields {
            carrier: Some("TRANSPORTES SA".into()),
            vehicle_owner: Some("stale owner".into()),
            ..Default::default()
        };
        assert_eq!(fields.text(9).as_deref(), Some("TRANSPORTES SA"));
    }

    #[test]
    fn test_text_for_status_and_date() {
        let fields = ManifestFields {
            status: Some(ManifestStatus::Final),
            issue_date: Some(today()),
            ..Default::default()
        };
        assert_eq!(fields.text(4).as_deref(), Some("DEFINITIVO"));
        assert_eq!(fields.text(6).as_deref(), Some("15/03/2024"));
        assert_eq!(fields.display_text(13), "45 TON");
    }

    #[test]
    fn test_set_text_parses_status_and_dates() {
        let mut fields = ManifestFields::default();
        fields.set_text(4, Some("anulado".into())).unwrap();
        assert_eq!(fields.status, Some(ManifestStatus::Voided));
        fields.set_text(6, Some("2024-03-15".into())).unwrap();
        assert_eq!(fields.issue_date, Some(today()));
        assert!(matches!(
            fields.set_text(6, Some("15-03".into())),
            Err(FieldError::InvalidDate(_))
        ));
        assert_eq!(fields.set_text(39, None), Err(FieldError::NoSuchBox(39)));
    }

    #[test]
    fn test_overrides_keep_computed_totals_when_blank() {
        let mut derived = ManifestFields {
            carrier: Some("A".into()),
            freight_usd: Some("2.500,00".into()),
            insurance_usd: Some("300,00".into()),
            seals: Some("x".into()),
            ..Default::default()
        };
        let overrides = ManifestFields {
            carrier: Some("B".into()),
            freight_usd: Some("  ".into()),
            insurance_usd: None,
            seals: Some(String::new()),
            ..Default::default()
        };
        derived.apply_overrides(&overrides);
        assert_eq!(derived.carrier.as_deref(), Some("B"));
        assert_eq!(derived.vehicle_owner.as_deref(), Some("B"));
        assert_eq!(derived.freight_usd.as_deref(), Some("2.500,00"));
        assert_eq!(derived.insurance_usd.as_deref(), Some("300,00"));
        assert_eq!(derived.seals.as_deref(), Some(""));
    }

    #[test]
    fn test_merge_edits_keeps_status_and_allows_clearing() {
        let mut current = ManifestFields {
            status: Some(ManifestStatus::Final),
            freight_usd: Some("10,00".into()),
            ..Default::default()
        };
        current.merge_edits(&ManifestFields {
            status: Some(ManifestStatus::Voided),
            freight_usd: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(current.status, Some(ManifestStatus::Final));
        assert_eq!(current.freight_usd.as_deref(), Some(""));
    }

    #[test]
    fn test_normalized_fills_defaults_and_date() {
        let fields = ManifestFields {
            carrier: Some("  CARRIER  ".into()),
            goods_description: Some("x".repeat(2000)),
            ..Default::default()
        }
        .normalized(today())
        .unwrap();
        assert_eq!(fields.carrier.as_deref(), Some("CARRIER"));
        assert_eq!(fields.vehicle_owner.as_deref(), Some("CARRIER"));
        assert_eq!(fields.status, Some(ManifestStatus::Provisional));
        assert_eq!(fields.issue_date, Some(today()));
        assert_eq!(fields.substitute_owner.as_deref(), Some("******"));
        assert_eq!(fields.currency.as_deref(), Some("DOLAR AMERICANO"));
        assert_eq!(fields.goods_description.map(|d| d.len()), Some(1500));
        assert_eq!(fields.seals, None);
    }

    #[test]
    fn test_normalized_rejects_non_numeric_amounts() {
        let result = ManifestFields {
            gross_weight: Some("pesado".into()),
            ..Default::default()
        }
        .normalized(today());
        assert!(matches!(result, Err(FieldError::InvalidNumber { number: 32, .. })));
    }

    #[test]
    fn test_differs_besides_status() {
        let a = ManifestFields {
            carrier: Some("A".into()),
            status: Some(ManifestStatus::Provisional),
            ..Default::default()
        };
        let mut b = a.clone();
        b.status = Some(ManifestStatus::Final);
        assert!(!a.differs_besides_status(&b));
        b.seals = Some("123".into());
        assert!(a.differs_besides_status(&b));
    }
}
