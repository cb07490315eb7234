//! Asset cache reconciliation: turn a ranked record into a deliverable handle.
//!
//! A record that already carries a cached handle is returned as-is. On a
//! cache miss the asset is uploaded through the [`DeliveryGateway`] and the
//! returned handle is written back to the [`Store`] against the record's id.
//!
//! # At-most-once upload
//!
//! Resolutions of the same record id are serialized by a per-id async mutex.
//! Whoever acquires it first re-reads the stored handle, uploads only if it
//! is still missing, and writes it back before releasing the mutex. Waiters
//! then find the persisted handle on their own re-read instead of uploading
//! again. Different ids never contend.
//!
//! # Cancellation
//!
//! The check → upload → write-back sequence runs on a detached task. If the
//! caller goes away mid-upload, the task still completes and caches the
//! handle for future queries.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::gateway::DeliveryGateway;
use crate::models::Record;
use crate::store::Store;

type InFlight = Arc<Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>>;

/// Where a resolved handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSource {
    /// The record already carried a handle.
    Cached,
    /// The handle appeared in the store while this resolution waited for an
    /// in-flight upload of the same record.
    Coalesced,
    /// This resolution uploaded the asset.
    Uploaded,
}

/// A deliverable reference to one record's asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub record_id: u64,
    pub handle: String,
    pub source: HandleSource,
    /// `false` when the handle was obtained but could not be written back;
    /// it is still usable for the current delivery.
    pub persisted: bool,
}

/// Resolves records to remote handles, uploading on cache miss.
///
/// Share one resolver (behind an `Arc`) between all concurrent queries so the
/// per-record coalescing applies across them.
pub struct AssetResolver {
    store: Arc<dyn Store>,
    gateway: Arc<dyn DeliveryGateway>,
    asset_dir: PathBuf,
    in_flight: InFlight,
}

impl AssetResolver {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn DeliveryGateway>,
        asset_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            gateway,
            asset_dir: asset_dir.into(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Resolve one record to a handle.
    ///
    /// On [`Error::UploadFailure`] the record's cache is left untouched. A
    /// failed write-back is not an error: the handle is returned with
    /// `persisted == false`.
    pub async fn resolve(&self, record: &Record) -> Result<Resolved, Error> {
        if let Some(handle) = record.handle() {
            debug!(record_id = record.id, "cache hit");
            return Ok(Resolved {
                record_id: record.id,
                handle: handle.to_string(),
                source: HandleSource::Cached,
                persisted: true,
            });
        }

        let path = asset_path(&self.asset_dir, &record.name).ok_or_else(|| {
            Error::UploadFailure {
                record_id: record.id,
                name: record.name.clone(),
                reason: "asset name escapes the asset directory".to_string(),
            }
        })?;

        let guard = self.lock_for(record.id).lock_owned().await;

        let task = UploadTask {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            in_flight: Arc::clone(&self.in_flight),
            record: record.clone(),
            path,
        };
        match tokio::spawn(task.run(guard)).await {
            Ok(result) => result,
            Err(join_err) => Err(Error::UploadFailure {
                record_id: record.id,
                name: record.name.clone(),
                reason: format!("upload task failed: {}", join_err),
            }),
        }
    }

    /// Resolve records one after another, preserving their order.
    ///
    /// A failure for one record does not affect the others.
    pub async fn resolve_all(&self, records: &[Record]) -> Vec<Result<Resolved, Error>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.resolve(record).await);
        }
        out
    }

    fn lock_for(&self, id: u64) -> Arc<AsyncMutex<()>> {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(id).or_default())
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The locked part of a cache miss, run on its own task.
struct UploadTask {
    store: Arc<dyn Store>,
    gateway: Arc<dyn DeliveryGateway>,
    in_flight: InFlight,
    record: Record,
    path: PathBuf,
}

impl UploadTask {
    async fn run(self, guard: OwnedMutexGuard<()>) -> Result<Resolved, Error> {
        let result = self.check_upload_persist().await;
        drop(guard);

        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.record.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.record.id);
        }
        result
    }

    async fn check_upload_persist(&self) -> Result<Resolved, Error> {
        let id = self.record.id;

        match self.store.get(id).await {
            Ok(Some(current)) => {
                if let Some(handle) = current.handle() {
                    debug!(record_id = id, "handle persisted by a concurrent resolution");
                    return Ok(Resolved {
                        record_id: id,
                        handle: handle.to_string(),
                        source: HandleSource::Coalesced,
                        persisted: true,
                    });
                }
            }
            Ok(None) => {
                warn!(record_id = id, "record no longer in store; uploading anyway");
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(record_id = id, error = %reason, "could not re-check cached handle");
            }
        }

        info!(record_id = id, name = %self.record.name, "cache miss, uploading asset");
        let handle = self
            .gateway
            .upload_asset(&self.path)
            .await
            .map_err(|e| self.upload_failure(format!("{e:#}")))?;
        if handle.is_empty() {
            return Err(self.upload_failure("gateway returned an empty handle".to_string()));
        }

        let persisted = match self.store.update_handle(id, &handle).await {
            Ok(()) => true,
            Err(e) => {
                let err = Error::CacheWriteFailure {
                    record_id: id,
                    reason: format!("{e:#}"),
                };
                warn!(error = %err, "handle delivered once, will re-upload on next query");
                false
            }
        };

        Ok(Resolved {
            record_id: id,
            handle,
            source: HandleSource::Uploaded,
            persisted,
        })
    }

    fn upload_failure(&self, reason: String) -> Error {
        Error::UploadFailure {
            record_id: self.record.id,
            name: self.record.name.clone(),
            reason,
        }
    }
}

/// Locate `name` under `dir`, refusing names that are absolute or climb out.
pub fn asset_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let rel = Path::new(name);
    let mut components = rel.components().peekable();
    components.peek()?;
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(dir.join(rel))
    } else {
        None
    }
}
