//! In-process document store.
//!
//! Every table lives behind one `tokio::sync::RwLock`, so a request either
//! sees all of another request's writes or none of them. Writers validate
//! before they mutate, which keeps each request all-or-nothing.

pub mod seed;

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::errors::AppError;
use crate::models::manifest::ManifestRow;
use crate::models::reference::{Carrier, City, Country, Currency, Party};
use crate::models::waybill::Waybill;

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

/// Rows keyed by sequential ids, starting at 1. Ids are never reused.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    pub fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hands out the next id without inserting anything.
    pub fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn put(&mut self, id: i64, row: T) {
        self.rows.insert(id, row);
    }

    pub fn remove(&mut self, id: i64) -> Option<T> {
        self.rows.remove(&id)
    }
}

#[derive(Debug, Default)]
pub struct Tables {
    pub countries: Table<Country>,
    pub cities: Table<City>,
    pub currencies: Table<Currency>,
    pub carriers: Table<Carrier>,
    pub parties: Table<Party>,
    pub waybills: Table<Waybill>,
    pub manifests: Table<ManifestRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Record contract
// ────────────────────────────────────────────────────────────────────────────

/// A row type served by the generic CRUD operations.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable kind used in error messages and logs.
    const KIND: &'static str;

    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);

    /// Required attributes and referenced ids. `self.id()` is already set, so
    /// uniqueness checks can skip the row being updated.
    fn validate(&self, tables: &Tables) -> Result<(), AppError>;

    /// Rejects the delete while another row still points at `id`.
    fn check_delete(id: i64, tables: &Tables) -> Result<(), AppError>;
}

pub fn not_found<R: Record>(id: i64) -> AppError {
    AppError::NotFound(format!("{} {id} not found", R::KIND))
}

pub fn require_text(kind: &str, attribute: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "{kind} {attribute} cannot be empty"
        )));
    }
    Ok(())
}

pub fn require_ref<T>(table: &Table<T>, kind: &str, id: Option<i64>) -> Result<(), AppError> {
    match id {
        Some(id) if !table.contains(id) => Err(AppError::Validation(format!(
            "{kind} {id} does not exist"
        ))),
        _ => Ok(()),
    }
}

pub fn in_use(kind: &str, id: i64, by: &str) -> AppError {
    AppError::Conflict(format!("{kind} {id} is still referenced by a {by}"))
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }

    /// Read access from a blocking thread. Panics inside an async context.
    pub fn blocking_read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.blocking_read()
    }

    pub async fn list<R: Record>(&self) -> Vec<R> {
        let tables = self.read().await;
        R::table(&tables).values().cloned().collect()
    }

    pub async fn get<R: Record>(&self, id: i64) -> Result<R, AppError> {
        let tables = self.read().await;
        R::table(&tables).get(id).cloned().ok_or_else(|| not_found::<R>(id))
    }

    pub async fn create<R: Record>(&self, mut row: R) -> Result<R, AppError> {
        let mut tables = self.write().await;
        // Validate with a provisional id so a failed create does not burn one.
        row.set_id(0);
        row.validate(&tables)?;
        let id = R::table_mut(&mut tables).allocate_id();
        row.set_id(id);
        R::table_mut(&mut tables).put(id, row.clone());
        info!("Created {} {id}", R::KIND);
        Ok(row)
    }

    pub async fn update<R: Record>(&self, id: i64, mut row: R) -> Result<R, AppError> {
        let mut tables = self.write().await;
        if !R::table(&tables).contains(id) {
            return Err(not_found::<R>(id));
        }
        row.set_id(id);
        row.validate(&tables)?;
        R::table_mut(&mut tables).put(id, row.clone());
        info!("Updated {} {id}", R::KIND);
        Ok(row)
    }

    pub async fn delete<R: Record>(&self, id: i64) -> Result<(), AppError> {
        let mut tables = self.write().await;
        if !R::table(&tables).contains(id) {
            return Err(not_found::<R>(id));
        }
        R::check_delete(id, &tables)?;
        R::table_mut(&mut tables).remove(id);
        info!("Deleted {} {id}", R::KIND);
        Ok(())
    }
}
