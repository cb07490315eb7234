//! Core data types shared by the loader, matcher, ranker, and reconciler.

use serde::Serialize;

/// A searchable asset in the corpus.
///
/// `name` locates the raw asset (a file name under the asset directory) and
/// `text` is the free-form description the fuzzy matcher scores against.
/// `cached_handle` is the opaque remote handle issued by the delivery gateway
/// after the asset was first uploaded; `None` means it has never been uploaded
/// (or the handle was cleared because the asset changed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    pub text: String,
    pub cached_handle: Option<String>,
}

impl Record {
    pub fn new(id: u64, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            text: text.into(),
            cached_handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.cached_handle = Some(handle.into());
        self
    }

    /// The cached handle, if present and non-empty.
    pub fn handle(&self) -> Option<&str> {
        self.cached_handle.as_deref().filter(|h| !h.is_empty())
    }
}

/// An undecoded row as it comes out of a store.
///
/// Every column is optional and the id is carried as text, so a row with a
/// missing field or a non-numeric id can be represented and rejected by
/// [`decode_row`](crate::corpus::decode_row) instead of failing the whole load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub id: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cached_handle: Option<String>,
}

impl From<&Record> for RawRow {
    fn from(record: &Record) -> Self {
        Self {
            id: Some(record.id.to_string()),
            name: Some(record.name.clone()),
            text: Some(record.text.clone()),
            cached_handle: record.cached_handle.clone(),
        }
    }
}

/// A record together with its relevance score for one query.
///
/// Produced per query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub record: Record,
    pub score: u32,
}
