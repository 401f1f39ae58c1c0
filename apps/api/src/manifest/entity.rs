//! Multi-line identity blocks for carriers and parties (boxes 1, 9, 33–35).

use crate::models::reference::{Carrier, Party};

/// The attributes of a carrier or party that end up on the form, with the
/// city and country already resolved to names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityParts {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub phone: Option<String>,
}

impl EntityParts {
    pub fn with_location(mut self, city: Option<String>, country: Option<String>) -> Self {
        self.city = city;
        self.country = country;
        self
    }
}

impl From<&Carrier> for EntityParts {
    fn from(carrier: &Carrier) -> Self {
        EntityParts {
            name: carrier.name.clone(),
            address: carrier.address.clone(),
            document_type: carrier.document_type.clone(),
            document_number: carrier.document_number.clone(),
            phone: carrier.phone.clone(),
            ..Default::default()
        }
    }
}

impl From<&Party> for EntityParts {
    fn from(party: &Party) -> Self {
        EntityParts {
            name: party.name.clone(),
            address: party.address.clone(),
            document_type: party.document_type.clone(),
            document_number: party.document_number.clone(),
            phone: party.phone.clone(),
            ..Default::default()
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Renders the block in fixed order: name, address lines, `city - country`,
/// document, phone. Absent attributes are skipped.
pub fn format_entity(parts: &EntityParts) -> String {
    let mut lines: Vec<String> = Vec::new();

    let name = parts.name.trim();
    if !name.is_empty() {
        lines.push(name.to_string());
    }

    if let Some(address) = non_blank(&parts.address) {
        lines.extend(
            address
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }

    let location: Vec<&str> = [non_blank(&parts.city), non_blank(&parts.country)]
        .into_iter()
        .flatten()
        .collect();
    if !location.is_empty() {
        lines.push(location.join(" - "));
    }

    match (non_blank(&parts.document_type), non_blank(&parts.document_number)) {
        (Some(kind), Some(number)) => lines.push(format!("{kind}:{number}")),
        (None, Some(number)) => lines.push(format!("DOC:{number}")),
        _ => {}
    }

    if let Some(phone) = non_blank(&parts.phone) {
        lines.push(format!("Tel: {phone}"));
    }

    lines.join("\n")
}
