//! Default countries and currencies for a fresh store.

use tracing::info;

use crate::models::reference::{Country, Currency};
use crate::store::{Store, Table, Tables};

const COUNTRIES: &[(&str, &str)] = &[
    ("PY", "Paraguay"),
    ("AR", "Argentina"),
    ("BR", "Brasil"),
    ("UY", "Uruguay"),
    ("BO", "Bolivia"),
    ("CL", "Chile"),
    ("CO", "Colombia"),
    ("EC", "Ecuador"),
    ("PE", "Perú"),
    ("VE", "Venezuela"),
];

const CURRENCIES: &[(&str, &str, &str)] = &[
    ("PYG", "Guaraní", "₲"),
    ("USD", "DOLAR AMERICANO", "$"),
    ("ARS", "Peso Argentino", "$"),
    ("BRL", "Real Brasileño", "R$"),
    ("EUR", "Euro", "€"),
    ("UYU", "Peso Uruguayo", "$"),
    ("BOB", "Boliviano", "Bs"),
    ("CLP", "Peso Chileno", "$"),
];

fn fill<T>(table: &mut Table<T>, rows: impl Iterator<Item = impl FnOnce(i64) -> T>) -> usize {
    if !table.is_empty() {
        return 0;
    }
    let mut added = 0;
    for make in rows {
        let id = table.allocate_id();
        table.put(id, make(id));
        added += 1;
    }
    added
}

/// Loads the defaults into empty tables. Tables that already hold rows are
/// left alone. Returns `(countries, currencies)` added.
pub fn seed_tables(tables: &mut Tables) -> (usize, usize) {
    let countries = fill(
        &mut tables.countries,
        COUNTRIES.iter().map(|&(code, name)| {
            move |id| Country {
                id,
                code: code.to_string(),
                name: name.to_string(),
            }
        }),
    );
    let currencies = fill(
        &mut tables.currencies,
        CURRENCIES.iter().map(|&(code, name, symbol)| {
            move |id| Currency {
                id,
                code: code.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
            }
        }),
    );
    (countries, currencies)
}

pub async fn seed_reference_data(store: &Store) {
    let mut tables = store.write().await;
    let (countries, currencies) = seed_tables(&mut tables);
    info!("Seeded {countries} countries and {currencies} currencies");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_fills_empty_tables() {
        let mut tables = Tables::default();
        assert_eq!(seed_tables(&mut tables), (10, 8));
        let usd = tables.currencies.values().find(|c| c.code == "USD").unwrap();
        assert_eq!(usd.name, "DOLAR AMERICANO");
        assert_eq!(tables.countries.get(1).map(|c| c.code.as_str()), Some("PY"));
    }

    #[test]
    fn test_seed_skips_populated_tables() {
        let mut tables = Tables::default();
        let id = tables.countries.allocate_id();
        tables.countries.put(
            id,
            Country {
                id,
                code: "XX".into(),
                name: "Custom".into(),
            },
        );
        assert_eq!(seed_tables(&mut tables), (0, 8));
        assert_eq!(tables.countries.len(), 1);
    }
}
