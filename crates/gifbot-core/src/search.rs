//! Query interface: load → match → rank.
//!
//! A query is a pure read over the store. The functions here never upload or
//! write; resolving remote handles is the job of
//! [`AssetResolver`](crate::reconcile::AssetResolver).
//!
//! | Function | Returns |
//! |----------|---------|
//! | [`search`] | asset names, ranked |
//! | [`search_ex`] | full records, ranked (caller decides upload vs reuse) |
//! | [`search_scored`] | records with their relevance scores |
//! | [`match_records`] | same as `search_scored` over an in-memory slice |

use tracing::debug;

use crate::corpus::load_corpus;
use crate::error::Error;
use crate::fuzzy::{find_from, EmptyQueryPolicy};
use crate::models::{MatchResult, Record};
use crate::rank::rank;
use crate::store::Store;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchParams {
    /// Result cap; `0` means unlimited.
    pub max_matches: usize,
    /// What an empty query returns.
    pub empty_query: EmptyQueryPolicy,
}

impl SearchParams {
    pub fn with_max_matches(max_matches: usize) -> Self {
        Self {
            max_matches,
            ..Self::default()
        }
    }
}

/// Match and rank an in-memory set of records.
pub fn match_records(records: &[Record], query: &str, params: &SearchParams) -> Vec<MatchResult> {
    let matches = find_from(query, records, params.empty_query);
    rank(matches, params.max_matches)
        .into_iter()
        .map(|m| MatchResult {
            record: records[m.index].clone(),
            score: m.score,
        })
        .collect()
}

/// Load the corpus from `store`, then match and rank it.
pub async fn search_scored<S: Store + ?Sized>(
    store: &S,
    query: &str,
    params: &SearchParams,
) -> Result<Vec<MatchResult>, Error> {
    let corpus = load_corpus(store).await?;
    let results = match_records(&corpus.records, query, params);
    debug!(
        query,
        corpus = corpus.records.len(),
        matched = results.len(),
        "search complete"
    );
    Ok(results)
}

/// Ranked full records for `query`.
pub async fn search_ex<S: Store + ?Sized>(
    store: &S,
    query: &str,
    params: &SearchParams,
) -> Result<Vec<Record>, Error> {
    Ok(search_scored(store, query, params)
        .await?
        .into_iter()
        .map(|m| m.record)
        .collect())
}

/// Ranked asset names for `query`.
pub async fn search<S: Store + ?Sized>(
    store: &S,
    query: &str,
    params: &SearchParams,
) -> Result<Vec<String>, Error> {
    Ok(search_ex(store, query, params)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect())
}
