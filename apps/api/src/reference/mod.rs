//! Reference data and waybills: the `Record` rules for each table.

pub mod handlers;

use crate::errors::AppError;
use crate::models::reference::{Carrier, City, Country, Currency, Party};
use crate::models::waybill::Waybill;
use crate::store::{in_use, require_ref, require_text, Record, Table, Tables};

impl Record for Country {
    const KIND: &'static str = "country";

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.countries
    }
    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.countries
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self, _tables: &Tables) -> Result<(), AppError> {
        require_text(Self::KIND, "code", &self.code)?;
        require_text(Self::KIND, "name", &self.name)
    }

    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError> {
        if tables.cities.values().any(|c| c.country_id == id) {
            return Err(in_use(Self::KIND, id, "city"));
        }
        Ok(())
    }
}

impl Record for City {
    const KIND: &'static str = "city";

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.cities
    }
    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.cities
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self, tables: &Tables) -> Result<(), AppError> {
        require_text(Self::KIND, "name", &self.name)?;
        require_ref(&tables.countries, Country::KIND, Some(self.country_id))
    }

    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError> {
        if tables.carriers.values().any(|c| c.city_id == Some(id)) {
            return Err(in_use(Self::KIND, id, "carrier"));
        }
        if tables.parties.values().any(|p| p.city_id == Some(id)) {
            return Err(in_use(Self::KIND, id, "party"));
        }
        if tables.waybills.values().any(|w| w.issue_city_id == Some(id)) {
            return Err(in_use(Self::KIND, id, "waybill"));
        }
        Ok(())
    }
}

impl Record for Currency {
    const KIND: &'static str = "currency";

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.currencies
    }
    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.currencies
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self, _tables: &Tables) -> Result<(), AppError> {
        require_text(Self::KIND, "code", &self.code)?;
        require_text(Self::KIND, "name", &self.name)
    }

    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError> {
        let used = tables.waybills.values().any(|w| {
            w.currency_id == Some(id)
                || w.expenses.iter().any(|e| {
                    e.sender_currency_id == Some(id) || e.recipient_currency_id == Some(id)
                })
        });
        if used {
            return Err(in_use(Self::KIND, id, "waybill"));
        }
        Ok(())
    }
}

impl Record for Carrier {
    const KIND: &'static str = "carrier";

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.carriers
    }
    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.carriers
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self, tables: &Tables) -> Result<(), AppError> {
        require_text(Self::KIND, "code", &self.code)?;
        require_text(Self::KIND, "name", &self.name)?;
        require_ref(&tables.cities, City::KIND, self.city_id)
    }

    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError> {
        if tables.waybills.values().any(|w| w.carrier_id == Some(id)) {
            return Err(in_use(Self::KIND, id, "waybill"));
        }
        Ok(())
    }
}

impl Record for Party {
    const KIND: &'static str = "party";

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.parties
    }
    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.parties
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self, tables: &Tables) -> Result<(), AppError> {
        require_text(Self::KIND, "name", &self.name)?;
        require_ref(&tables.cities, City::KIND, self.city_id)
    }

    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError> {
        let used = tables.waybills.values().any(|w| {
            [w.sender_id, w.recipient_id, w.consignee_id].contains(&Some(id))
        });
        if used {
            return Err(in_use(Self::KIND, id, "waybill"));
        }
        Ok(())
    }
}

impl Record for Waybill {
    const KIND: &'static str = "waybill";

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.waybills
    }
    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.waybills
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self, tables: &Tables) -> Result<(), AppError> {
        require_text(Self::KIND, "number", &self.number)?;

        let number = self.number.trim();
        let duplicate = tables
            .waybills
            .values()
            .any(|w| w.id != self.id() && w.number.trim() == number);
        if duplicate {
            return Err(AppError::Conflict(format!(
                "waybill number '{number}' already exists"
            )));
        }

        require_ref(&tables.cities, City::KIND, self.issue_city_id)?;
        require_ref(&tables.carriers, Carrier::KIND, self.carrier_id)?;
        require_ref(&tables.parties, Party::KIND, self.sender_id)?;
        require_ref(&tables.parties, Party::KIND, self.recipient_id)?;
        require_ref(&tables.parties, Party::KIND, self.consignee_id)?;
        require_ref(&tables.currencies, Currency::KIND, self.currency_id)?;
        for line in &self.expenses {
            require_ref(&tables.currencies, Currency::KIND, line.sender_currency_id)?;
            require_ref(&tables.currencies, Currency::KIND, line.recipient_currency_id)?;
        }
        Ok(())
    }

    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError> {
        if tables.manifests.values().any(|m| m.waybill_id == Some(id)) {
            return Err(in_use(Self::KIND, id, "manifest"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn country(code: &str) -> Country {
        Country {
            id: 0,
            code: code.into(),
            name: format!("Country {code}"),
        }
    }

    fn waybill(number: &str) -> Waybill {
        serde_json::from_value(serde_json::json!({ "number": number })).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_validates() {
        let store = Store::new();
        let py = store.create(country("PY")).await.unwrap();
        assert_eq!(py.id, 1);

        let blank = store.create(country("  ")).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        // The failed create did not consume an id.
        let ar = store.create(country("AR")).await.unwrap();
        assert_eq!(ar.id, 2);
    }

    #[tokio::test]
    async fn test_city_requires_existing_country() {
        let store = Store::new();
        let orphan = City {
            id: 0,
            name: "Asunción".into(),
            country_id: 42,
        };
        assert!(matches!(
            store.create(orphan).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_referenced_country_conflicts() {
        let store = Store::new();
        let py = store.create(country("PY")).await.unwrap();
        store
            .create(City {
                id: 0,
                name: "Asunción".into(),
                country_id: py.id,
            })
            .await
            .unwrap();
        assert!(matches!(
            store.delete::<Country>(py.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store.delete::<Country>(99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_waybill_number_is_unique() {
        let store = Store::new();
        let first = store.create(waybill("PY0001")).await.unwrap();
        assert!(matches!(
            store.create(waybill(" PY0001 ")).await,
            Err(AppError::Conflict(_))
        ));
        // Updating a waybill with its own number is fine.
        let updated = store.update(first.id, waybill("PY0001")).await.unwrap();
        assert_eq!(updated.id, first.id);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = Store::new();
        assert!(matches!(
            store.update(7, country("UY")).await,
            Err(AppError::NotFound(_))
        ));
    }
}
