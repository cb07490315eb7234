//! Storage abstraction for the gif corpus.
//!
//! The [`Store`] trait defines the operations the loader and the asset
//! cache reconciler need, enabling pluggable backends (SQLite in the
//! application crate, in-memory for tests).
//!
//! Implementations must be `Send + Sync` so a single long-lived store can be
//! shared by every concurrent query.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::corpus;
use crate::error::Error;
use crate::models::{RawRow, Record};

/// Abstract storage backend for the corpus.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`fetch_rows`](Store::fetch_rows) | Read every row, undecoded |
/// | [`get`](Store::get) | Read one record by id |
/// | [`update_handle`](Store::update_handle) | Persist a remote handle for a record |
/// | [`clear_handle`](Store::clear_handle) | Forget a record's remote handle |
/// | [`insert`](Store::insert) | Register a new asset |
/// | [`list_all`](Store::list_all) | Decoded corpus, malformed rows skipped |
#[async_trait]
pub trait Store: Send + Sync {
    /// Read all rows in a stable order.
    ///
    /// Fails only if the storage itself cannot be read; individual bad rows
    /// are returned as-is and rejected later by the loader.
    async fn fetch_rows(&self) -> Result<Vec<RawRow>>;

    /// Read a single record by id. Malformed or missing rows yield `None`.
    async fn get(&self, id: u64) -> Result<Option<Record>>;

    /// Set the cached handle for `id`.
    ///
    /// A single keyed row update: writing twice simply overwrites. Fails if
    /// no record with this id exists.
    async fn update_handle(&self, id: u64, handle: &str) -> Result<()>;

    /// Clear the cached handle for `id`. Returns `false` if no such record.
    async fn clear_handle(&self, id: u64) -> Result<bool>;

    /// Register a new asset and return its id.
    async fn insert(&self, name: &str, text: &str) -> Result<u64>;

    /// The full decoded corpus. Malformed rows are skipped with a diagnostic.
    async fn list_all(&self) -> Result<Vec<Record>, Error> {
        Ok(corpus::load_corpus(self).await?.records)
    }
}
