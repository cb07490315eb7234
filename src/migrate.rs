use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database and bring its schema up to date.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = apply_schema(&pool).await;
    pool.close().await;
    result
}

/// Create the corpus schema on `pool`. Idempotent.
///
/// An existing `gifs` table is kept as-is, including legacy tables whose
/// `id` column has no declared type. Databases written by the older bot
/// store handles in `tg_file_id`; those gain a `cached_handle` column
/// seeded from it.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gifs (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            text TEXT NOT NULL,
            cached_handle TEXT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('gifs')")
        .fetch_all(pool)
        .await?;

    if !columns.iter().any(|c| c == "cached_handle") {
        sqlx::query("ALTER TABLE gifs ADD COLUMN cached_handle TEXT NULL")
            .execute(pool)
            .await?;
        if columns.iter().any(|c| c == "tg_file_id") {
            sqlx::query(
                "UPDATE gifs SET cached_handle = tg_file_id WHERE tg_file_id IS NOT NULL AND tg_file_id != ''",
            )
            .execute(pool)
            .await?;
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_gifs_name ON gifs(name)")
        .execute(pool)
        .await?;

    Ok(())
}
