//! Corpus loading: read every row from a [`Store`] and decode it.
//!
//! A single bad row never aborts the load. Rows that fail [`decode_row`]
//! are logged and counted in [`Corpus::skipped`]; only a failure to read the
//! store at all is reported as [`Error::StoreUnavailable`].

use tracing::{debug, warn};

use crate::error::{Error, MalformedRecord};
use crate::fuzzy::Searchable;
use crate::models::{RawRow, Record};
use crate::store::Store;

/// The decoded corpus for one query pass.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Records in store order.
    pub records: Vec<Record>,
    /// Number of rows rejected as malformed.
    pub skipped: usize,
}

impl Searchable for Corpus {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn text_at(&self, index: usize) -> &str {
        self.records.text_at(index)
    }
}

/// Load the full corpus from `store`.
pub async fn load_corpus<S: Store + ?Sized>(store: &S) -> Result<Corpus, Error> {
    let rows = store
        .fetch_rows()
        .await
        .map_err(|e| Error::store_unavailable(&e))?;

    let mut corpus = Corpus {
        records: Vec::with_capacity(rows.len()),
        skipped: 0,
    };
    for row in rows {
        match decode_row(row) {
            Ok(record) => corpus.records.push(record),
            Err(malformed) => {
                warn!(row_id = %malformed.id, reason = %malformed.reason, "skipping malformed corpus row");
                corpus.skipped += 1;
            }
        }
    }

    debug!(
        records = corpus.records.len(),
        skipped = corpus.skipped,
        "corpus loaded"
    );
    Ok(corpus)
}

/// Decode a raw storage row into a [`Record`].
///
/// Requires a non-negative integer id and non-null `name` and `text`. The
/// name must be non-empty since it locates the raw asset. An empty cached
/// handle is treated as absent.
pub fn decode_row(row: RawRow) -> Result<Record, MalformedRecord> {
    let raw_id = row.id.unwrap_or_default();
    let malformed = |reason: &str| MalformedRecord {
        id: if raw_id.is_empty() {
            "<missing>".to_string()
        } else {
            raw_id.clone()
        },
        reason: reason.to_string(),
    };

    if raw_id.trim().is_empty() {
        return Err(malformed("missing id"));
    }
    let id: u64 = raw_id
        .trim()
        .parse()
        .map_err(|_| malformed("id is not a non-negative integer"))?;

    let name = match row.name {
        Some(n) if !n.trim().is_empty() => n,
        Some(_) => return Err(malformed("empty name")),
        None => return Err(malformed("missing name")),
    };
    let text = row.text.ok_or_else(|| malformed("missing text"))?;
    let cached_handle = row.cached_handle.filter(|h| !h.is_empty());

    Ok(Record {
        id,
        name,
        text,
        cached_handle,
    })
}
