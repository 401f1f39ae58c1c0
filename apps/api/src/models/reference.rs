use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Country {
    #[serde(default)]
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub country_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Currency {
    #[serde(default)]
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

/// Road carrier (transportadora). Printed in boxes 1 and 9 of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carrier {
    #[serde(default)]
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city_id: Option<i64>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Sender, recipient or consignee of a waybill (remitente).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Party {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city_id: Option<i64>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
