//! The delivery gateway seam.
//!
//! The gateway is the messaging transport's upload endpoint. The core only
//! needs one operation from it: turn raw asset bytes into an opaque, reusable
//! remote handle. Sending an already-cached handle to a user is transport
//! specific and lives with the transport.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Uploads assets and returns remote handles.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Upload the asset at `path` and return the handle the transport issued.
    ///
    /// Handles are treated as opaque strings, reusable indefinitely. An empty
    /// handle is considered a failed upload.
    async fn upload_asset(&self, path: &Path) -> Result<String>;
}
