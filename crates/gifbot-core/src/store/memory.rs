//! In-memory [`Store`] implementation for testing and embedding.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! Raw rows can be injected directly so loader diagnostics can be exercised
//! without a database.

use std::sync::{PoisonError, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::corpus::decode_row;
use crate::models::{RawRow, Record};

use super::Store;

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<RawRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let rows = records.into_iter().map(|r| RawRow::from(&r)).collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Append a row exactly as given, bypassing validation.
    pub fn push_raw(&self, row: RawRow) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    fn find_mut(rows: &mut [RawRow], id: u64) -> Option<&mut RawRow> {
        let key = id.to_string();
        rows.iter_mut().find(|r| r.id.as_deref() == Some(key.as_str()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        Ok(self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn get(&self, id: u64) -> Result<Option<Record>> {
        let key = id.to_string();
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows
            .iter()
            .find(|r| r.id.as_deref() == Some(key.as_str()))
            .and_then(|r| decode_row(r.clone()).ok()))
    }

    async fn update_handle(&self, id: u64, handle: &str) -> Result<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        match Self::find_mut(&mut rows, id) {
            Some(row) => {
                row.cached_handle = Some(handle.to_string());
                Ok(())
            }
            None => bail!("no record with id {}", id),
        }
    }

    async fn clear_handle(&self, id: u64) -> Result<bool> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        Ok(match Self::find_mut(&mut rows, id) {
            Some(row) => {
                row.cached_handle = None;
                true
            }
            None => false,
        })
    }

    async fn insert(&self, name: &str, text: &str) -> Result<u64> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let next_id = rows
            .iter()
            .filter_map(|r| r.id.as_deref()?.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        rows.push(RawRow::from(&Record::new(next_id, name, text)));
        Ok(next_id)
    }
}
