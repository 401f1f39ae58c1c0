use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::manifest::expenses::parse_localized_amount;

/// CRT: international road consignment note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Waybill {
    #[serde(default)]
    pub id: i64,
    pub number: String,
    /// Free-text workflow status of the waybill itself (not the manifest status).
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub issue_city_id: Option<i64>,
    #[serde(default)]
    pub carrier_id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    pub consignee_id: Option<i64>,
    #[serde(default)]
    pub currency_id: Option<i64>,
    #[serde(default)]
    pub delivery_place: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub declared_value: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub gross_weight: Option<Decimal>,
    #[serde(default)]
    pub goods_description: Option<String>,
    #[serde(default)]
    pub export_invoice: Option<String>,
    #[serde(default)]
    pub dispatch_number: Option<String>,
    #[serde(default)]
    pub expenses: Vec<ExpenseLine>,
}

/// One itemized charge on a waybill, payable by the sender and/or the recipient.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpenseLine {
    /// Route-leg label ("tramo"), e.g. "Flete terrestre" or "Seguro total".
    #[serde(default)]
    pub leg: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub sender_amount: Option<Decimal>,
    #[serde(default)]
    pub sender_currency_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub recipient_amount: Option<Decimal>,
    #[serde(default)]
    pub recipient_currency_id: Option<i64>,
}

/// Accepts amounts as JSON numbers or strings. `null`, `""` and `"None"` are absent;
/// strings may use `2.500,00` notation.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid amount '{raw}'")))
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "None" {
                return Ok(None);
            }
            parse_localized_amount(trimmed)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid amount '{trimmed}'")))
        }
        Some(other) => Err(de::Error::custom(format!(
            "expected a number or string amount, got {other}"
        ))),
    }
}
