use anyhow::Result;
use gifbot_core::search::search_scored;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Run a fuzzy search from the command line and print the ranked results.
///
/// `limit` overrides `[search].max_matches`; `0` means unlimited.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let mut params = config.search_params();
    if let Some(limit) = limit {
        params.max_matches = limit;
    }

    let store = SqliteStore::new(db::connect(config).await?);
    let results = search_scored(&store, query, &params).await;
    store.close().await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, m) in results.iter().enumerate() {
        let cache = if m.record.handle().is_some() {
            "cached"
        } else {
            "not uploaded"
        };
        println!("{}. [{}] {}", i + 1, m.score, m.record.name);
        println!("    id: {}", m.record.id);
        println!("    text: \"{}\"", m.record.text.replace('\n', " ").trim());
        println!("    handle: {}", cache);
        println!();
    }

    Ok(())
}
