//! Corpus management commands: `add`, `list`, `forget`.
//!
//! The corpus itself is usually produced by an external cutting tool that
//! writes the asset files and their captions. These commands cover the
//! manual cases: registering a single asset, inspecting what the bot will
//! search, and forgetting a cached handle after an asset file is replaced.

use anyhow::{bail, Result};
use gifbot_core::corpus::load_corpus;
use gifbot_core::reconcile::asset_path;
use gifbot_core::store::Store;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Register an asset under `[assets].dir` with its caption text.
pub async fn run_add(config: &Config, name: &str, text: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("asset name must not be empty");
    }
    let Some(path) = asset_path(&config.assets.dir, name) else {
        bail!("asset name must be a relative path inside the asset directory: {}", name);
    };
    if !path.is_file() {
        warn!(path = %path.display(), "asset file does not exist yet");
    }

    let store = SqliteStore::new(db::connect(config).await?);
    let result = store.insert(name, text).await;
    store.close().await;

    let id = result?;
    println!("added {} as id {}", name, id);
    Ok(())
}

/// Print every record in corpus order with its cache state.
pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let corpus = load_corpus(&store).await;
    store.close().await;
    let corpus = corpus?;

    if corpus.records.is_empty() {
        println!("No records.");
    }
    for record in &corpus.records {
        let cache = match record.handle() {
            Some(_) => "cached",
            None => "-",
        };
        println!("{:>6}  {:<8}  {}  \"{}\"", record.id, cache, record.name, record.text);
    }
    if corpus.skipped > 0 {
        println!("skipped {} malformed rows", corpus.skipped);
    }
    Ok(())
}

/// Clear the cached handle of record `id`; the next delivery re-uploads it.
pub async fn run_forget(config: &Config, id: u64) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let result = store.clear_handle(id).await;
    store.close().await;

    if !result? {
        bail!("no record with id {}", id);
    }
    println!("forgot cached handle for id {}", id);
    Ok(())
}
