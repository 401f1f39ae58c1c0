//! Derives MIC/DTA field values from a CRT waybill.

use serde::Serialize;

use crate::manifest::entity::{format_entity, EntityParts};
use crate::manifest::expenses::{aggregate_expenses, format_amount, TotalOverflow};
use crate::manifest::fields::{
    self, DEFAULT_CURRENCY, DEFAULT_ORIGIN, DEFAULT_SHEET, DEFAULT_TOWING_CAPACITY, FILLER,
};
use crate::manifest::record::ManifestFields;
use crate::manifest::status::ManifestStatus;
use crate::models::waybill::Waybill;
use crate::store::Tables;

const DESCRIPTION_LIMIT: usize = 1500;

/// A waybill with every reference it points at looked up.
#[derive(Debug, Clone)]
pub struct ResolvedWaybill {
    pub waybill: Waybill,
    pub carrier: Option<EntityParts>,
    pub sender: Option<EntityParts>,
    pub recipient: Option<EntityParts>,
    pub consignee: Option<EntityParts>,
    pub currency_name: Option<String>,
}

fn location(tables: &Tables, city_id: Option<i64>) -> (Option<String>, Option<String>) {
    let city = city_id.and_then(|id| tables.cities.get(id));
    let country = city.and_then(|c| tables.countries.get(c.country_id));
    (city.map(|c| c.name.clone()), country.map(|c| c.name.clone()))
}

fn party(tables: &Tables, id: Option<i64>) -> Option<EntityParts> {
    let party = tables.parties.get(id?)?;
    let (city, country) = location(tables, party.city_id);
    Some(EntityParts::from(party).with_location(city, country))
}

pub fn resolve(tables: &Tables, waybill: &Waybill) -> ResolvedWaybill {
    let carrier = waybill
        .carrier_id
        .and_then(|id| tables.carriers.get(id))
        .map(|carrier| {
            let (city, country) = location(tables, carrier.city_id);
            EntityParts::from(carrier).with_location(city, country)
        });

    ResolvedWaybill {
        waybill: waybill.clone(),
        carrier,
        sender: party(tables, waybill.sender_id),
        recipient: party(tables, waybill.recipient_id),
        consignee: party(tables, waybill.consignee_id),
        currency_name: waybill
            .currency_id
            .and_then(|id| tables.currencies.get(id))
            .map(|c| c.name.clone()),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn block(parts: Option<&EntityParts>) -> Option<String> {
    parts.map(format_entity).and_then(non_empty)
}

/// `Factura: X | Despacho: Y`, keeping only the halves that are present.
pub fn attached_documents(invoice: Option<&str>, dispatch: Option<&str>) -> Option<String> {
    let parts: Vec<String> = [("Factura", invoice), ("Despacho", dispatch)]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" | "))
}

/// Maps a resolved waybill onto the form.
pub fn build_fields(resolved: &ResolvedWaybill) -> Result<ManifestFields, TotalOverflow> {
    let waybill = &resolved.waybill;
    let totals = aggregate_expenses(&waybill.expenses)?;
    let recipient = block(resolved.recipient.as_ref());

    let mut fields = ManifestFields {
        carrier: block(resolved.carrier.as_ref()),
        status: Some(ManifestStatus::Provisional),
        sheet: Some(DEFAULT_SHEET.to_string()),
        issue_date: waybill.issue_date,
        destination: waybill.delivery_place.clone().and_then(non_empty),
        towing_capacity: Some(DEFAULT_TOWING_CAPACITY.to_string()),
        substitute_owner: Some(FILLER.to_string()),
        substitute_tax_id: Some(FILLER.to_string()),
        substitute_plate: Some(FILLER.to_string()),
        substitute_make: Some(FILLER.to_string()),
        substitute_capacity: Some(FILLER.to_string()),
        substitute_year: Some(FILLER.to_string()),
        substitute_trailer: Some(FILLER.to_string()),
        waybill_number: non_empty(waybill.number.clone()),
        currency: Some(
            resolved
                .currency_name
                .clone()
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        ),
        goods_origin: Some(DEFAULT_ORIGIN.to_string()),
        fot_value: waybill.declared_value.map(format_amount).and_then(non_empty),
        freight_usd: non_empty(totals.freight_text()),
        insurance_usd: non_empty(totals.insurance_text()),
        gross_weight: waybill.gross_weight.map(format_amount).and_then(non_empty),
        sender: block(resolved.sender.as_ref()),
        consignee: block(resolved.consignee.as_ref()).or_else(|| recipient.clone()),
        recipient,
        attached_documents: attached_documents(
            waybill.export_invoice.as_deref(),
            waybill.dispatch_number.as_deref(),
        ),
        goods_description: waybill
            .goods_description
            .as_deref()
            .map(|d| d.chars().take(DESCRIPTION_LIMIT).collect())
            .and_then(non_empty),
        ..Default::default()
    };

    fields.mirror_owner();
    Ok(fields)
}

/// Builds the form and lays client overrides on top.
pub fn derive_fields(
    resolved: &ResolvedWaybill,
    overrides: Option<&ManifestFields>,
) -> Result<ManifestFields, TotalOverflow> {
    let mut fields = build_fields(resolved)?;
    if let Some(overrides) = overrides {
        fields.apply_overrides(overrides);
    }
    Ok(fields)
}

// ────────────────────────────────────────────────────────────────────────────
// Clone preview
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PreviewBlock {
    pub number: u8,
    pub title: &'static str,
    pub text: String,
    pub lines: Vec<String>,
    pub line_count: usize,
    pub char_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClonePreview {
    pub waybill_id: i64,
    pub waybill_number: String,
    pub blocks: Vec<PreviewBlock>,
}

/// The entity blocks (1, 33, 34, 35) exactly as the form will print them.
pub fn clone_preview(resolved: &ResolvedWaybill) -> Result<ClonePreview, TotalOverflow> {
    let fields = build_fields(resolved)?;
    let blocks = [1u8, 33, 34, 35]
        .into_iter()
        .map(|n| {
            let text = fields.text(n).unwrap_or_default();
            let lines: Vec<String> = text.lines().map(str::to_string).collect();
            PreviewBlock {
                number: n,
                title: fields::field(n).map(|f| f.title).unwrap_or(""),
                line_count: lines.len(),
                char_count: text.chars().count(),
                lines,
                text,
            }
        })
        .collect();

    Ok(ClonePreview {
        waybill_id: resolved.waybill.id,
        waybill_number: resolved.waybill.number.clone(),
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::waybill::ExpenseLine;

    fn parts(name: &str) -> EntityParts {
        EntityParts {
            name: name.into(),
            document_number: Some("123".into()),
            ..Default::default()
        }
    }

    fn resolved() -> ResolvedWaybill {
        let waybill: Waybill = serde_json::from_value(serde_json::json!({
            "id": 7,
            "number": "PY0001",
            "issue_date": "2024-03-15",
            "delivery_place": "Santos - Brasil",
            "declared_value": "15000",
            "gross_weight": 24500.5,
            "goods_description": "SOJA EN GRANOS",
            "export_invoice": "001-001-0000123",
        }))
        .unwrap();
        ResolvedWaybill {
            waybill: Waybill {
                expenses: vec![
                    ExpenseLine {
                        leg: "Flete terrestre".into(),
                        sender_amount: Decimal::from_str("2500").ok(),
                        ..Default::default()
                    },
                    ExpenseLine {
                        leg: "Seguro total".into(),
                        recipient_amount: Decimal::from_str("300").ok(),
                        ..Default::default()
                    },
                ],
                ..waybill
            },
            carrier: Some(parts("TRANSPORTES DEL SUR")),
            sender: Some(parts("EXPORTADORA SA")),
            recipient: Some(parts("IMPORTADORA LTDA")),
            consignee: None,
            currency_name: None,
        }
    }

    #[test]
    fn test_build_maps_waybill_onto_boxes() {
        let fields = build_fields(&resolved()).unwrap();
        assert_eq!(fields.carrier.as_deref(), Some("TRANSPORTES DEL SUR\nDOC:123"));
        assert_eq!(fields.vehicle_owner, fields.carrier);
        assert_eq!(fields.sender.as_deref(), Some("EXPORTADORA SA\nDOC:123"));
        assert_eq!(fields.freight_usd.as_deref(), Some("2.500,00"));
        assert_eq!(fields.insurance_usd.as_deref(), Some("300,00"));
        assert_eq!(fields.status, Some(ManifestStatus::Provisional));
        assert_eq!(fields.sheet.as_deref(), Some("1 / 1"));
        assert_eq!(fields.issue_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(fields.destination.as_deref(), Some("Santos - Brasil"));
        assert_eq!(fields.towing_capacity.as_deref(), Some("45 TON"));
        assert_eq!(fields.substitute_trailer.as_deref(), Some("******"));
        assert_eq!(fields.waybill_number.as_deref(), Some("PY0001"));
        assert_eq!(fields.currency.as_deref(), Some("DOLAR AMERICANO"));
        assert_eq!(fields.goods_origin.as_deref(), Some("520-PARAGUAY"));
        assert_eq!(fields.fot_value.as_deref(), Some("15.000,00"));
        assert_eq!(fields.gross_weight.as_deref(), Some("24.500,50"));
        assert_eq!(fields.attached_documents.as_deref(), Some("Factura: 001-001-0000123"));
        assert_eq!(fields.goods_description.as_deref(), Some("SOJA EN GRANOS"));
    }

    #[test]
    fn test_consignee_falls_back_to_recipient() {
        let fields = build_fields(&resolved()).unwrap();
        assert_eq!(fields.consignee, fields.recipient);
    }

    #[test]
    fn test_description_is_cut_at_limit() {
        let mut input = resolved();
        input.waybill.goods_description = Some("ü".repeat(1600));
        let fields = build_fields(&input).unwrap();
        assert_eq!(fields.goods_description.map(|d| d.chars().count()), Some(1500));
    }

    #[test]
    fn test_attached_documents_halves() {
        assert_eq!(
            attached_documents(Some("F1"), Some("D2")).as_deref(),
            Some("Factura: F1 | Despacho: D2")
        );
        assert_eq!(attached_documents(None, Some("D2")).as_deref(), Some("Despacho: D2"));
        assert_eq!(attached_documents(Some(" "), None), None);
    }

    #[test]
    fn test_overrides_win_but_not_blank_totals() {
        let overrides = ManifestFields {
            carrier: Some("OTRO TRANSPORTISTA".into()),
            freight_usd: Some(String::new()),
            truck_plate: Some("ABC 123".into()),
            ..Default::default()
        };
        let fields = derive_fields(&resolved(), Some(&overrides)).unwrap();
        assert_eq!(fields.carrier.as_deref(), Some("OTRO TRANSPORTISTA"));
        assert_eq!(fields.vehicle_owner.as_deref(), Some("OTRO TRANSPORTISTA"));
        assert_eq!(fields.freight_usd.as_deref(), Some("2.500,00"));
        assert_eq!(fields.truck_plate.as_deref(), Some("ABC 123"));
    }

    #[test]
    fn test_overflowing_expenses_fail_the_build() {
        let mut input = resolved();
        let line = ExpenseLine {
            leg: "Flete".into(),
            sender_amount: Some(Decimal::MAX),
            ..Default::default()
        };
        input.waybill.expenses = vec![line.clone(), line];
        assert!(build_fields(&input).is_err());
        assert!(derive_fields(&input, None).is_err());
        assert!(clone_preview(&input).is_err());
    }

    #[test]
    fn test_clone_preview_blocks() {
        let preview = clone_preview(&resolved()).unwrap();
        let numbers: Vec<u8> = preview.blocks.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 33, 34, 35]);
        assert_eq!(preview.blocks[0].line_count, 2);
        assert_eq!(preview.blocks[3].lines[0], "IMPORTADORA LTDA");
    }

    #[test]
    fn test_resolve_looks_up_locations() {
        use crate::models::reference::{City, Country, Party};

        let mut tables = Tables::default();
        tables.countries.put(1, Country { id: 1, code: "PY".into(), name: "Paraguay".into() });
        tables.cities.put(1, City { id: 1, name: "Asunción".into(), country_id: 1 });
        tables.parties.put(
            1,
            Party {
                id: 1,
                name: "EXPORTADORA SA".into(),
                address: None,
                city_id: Some(1),
                document_type: Some("RUC".into()),
                document_number: Some("800-1".into()),
                phone: None,
            },
        );
        let mut waybill = resolved().waybill;
        waybill.sender_id = Some(1);

        let resolved = resolve(&tables, &waybill);
        let sender = resolved.sender.unwrap();
        assert_eq!(sender.city.as_deref(), Some("Asunción"));
        assert_eq!(sender.country.as_deref(), Some("Paraguay"));
        assert!(resolved.carrier.is_none());
    }
}
