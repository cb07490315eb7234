//! Failure taxonomy for the retrieval and asset cache pipeline.
//!
//! Only [`Error::StoreUnavailable`] is fatal to a whole query. Every other
//! variant is scoped to a single record: the loader skips malformed rows,
//! and the reconciler reports upload failures per record while the rest of
//! the result set is still delivered.

use thiserror::Error;

/// A single storage row that could not be decoded into a [`Record`](crate::models::Record).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record (id {id}): {reason}")]
pub struct MalformedRecord {
    /// The raw id column as stored, or `<missing>`.
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The corpus cannot be opened or read at all.
    #[error("corpus store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),

    /// The delivery gateway rejected or timed out the upload. The record's
    /// cached handle is left untouched.
    #[error("upload of record {record_id} ('{name}') failed: {reason}")]
    UploadFailure {
        record_id: u64,
        name: String,
        reason: String,
    },

    /// A handle was obtained but could not be persisted.
    #[error("could not persist handle for record {record_id}: {reason}")]
    CacheWriteFailure { record_id: u64, reason: String },
}

impl Error {
    pub fn store_unavailable(err: &anyhow::Error) -> Self {
        Error::StoreUnavailable {
            reason: format!("{err:#}"),
        }
    }

    /// The record this error is scoped to, if any.
    pub fn record_id(&self) -> Option<u64> {
        match self {
            Error::UploadFailure { record_id, .. } | Error::CacheWriteFailure { record_id, .. } => {
                Some(*record_id)
            }
            Error::MalformedRecord(m) => m.id.parse().ok(),
            Error::StoreUnavailable { .. } => None,
        }
    }

    /// Whether this error aborts the whole query rather than a single record.
    pub fn is_query_fatal(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. })
    }
}
