//! SQLite-backed [`Store`] implementation.
//!
//! Schema (see [`migrate`](crate::migrate)):
//!
//! ```text
//! gifs(id INTEGER PRIMARY KEY, name TEXT, text TEXT, cached_handle TEXT NULL)
//! ```
//!
//! Rows are read with every column cast to text so that a legacy row with a
//! non-numeric id or a missing field reaches the loader as a malformed row
//! instead of failing the whole read.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use gifbot_core::corpus::decode_row;
use gifbot_core::models::{RawRow, Record};
use gifbot_core::store::Store;

const SELECT_ROWS: &str = r#"
    SELECT CAST(id AS TEXT) AS id,
           CAST(name AS TEXT) AS name,
           CAST(text AS TEXT) AS text,
           CAST(cached_handle AS TEXT) AS cached_handle
    FROM gifs
"#;

/// SQLite implementation of the [`Store`] trait.
///
/// Wraps a long-lived [`SqlitePool`]; clone the pool, not the store, if
/// another component needs raw access.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the underlying pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn text_column(row: &SqliteRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column).ok().flatten()
}

fn raw_row(row: &SqliteRow) -> RawRow {
    RawRow {
        id: text_column(row, "id"),
        name: text_column(row, "name"),
        text: text_column(row, "text"),
        cached_handle: text_column(row, "cached_handle"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let rows = sqlx::query(&format!("{SELECT_ROWS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(raw_row).collect())
    }

    async fn get(&self, id: u64) -> Result<Option<Record>> {
        let Ok(key) = i64::try_from(id) else {
            return Ok(None);
        };
        let row = sqlx::query(&format!("{SELECT_ROWS} WHERE id = ?"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| raw_row(&r)).and_then(|raw| decode_row(raw).ok()))
    }

    async fn update_handle(&self, id: u64, handle: &str) -> Result<()> {
        let key = i64::try_from(id)?;
        let result = sqlx::query("UPDATE gifs SET cached_handle = ? WHERE id = ?")
            .bind(handle)
            .bind(key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("no record with id {}", id);
        }
        Ok(())
    }

    async fn clear_handle(&self, id: u64) -> Result<bool> {
        let Ok(key) = i64::try_from(id) else {
            return Ok(false);
        };
        let result = sqlx::query("UPDATE gifs SET cached_handle = NULL WHERE id = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert(&self, name: &str, text: &str) -> Result<u64> {
        // Explicit id so tables with an untyped legacy id column get one too.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO gifs (id, name, text, cached_handle)
            VALUES ((SELECT COALESCE(MAX(CAST(id AS INTEGER)), 0) + 1 FROM gifs), ?, ?, NULL)
            RETURNING CAST(id AS INTEGER)
            "#,
        )
        .bind(name)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(id)?)
    }
}
