//! Media relay: hands image payloads to an asset host and gets back a
//! stable URL plus the host's asset id.

pub mod cloudinary;
pub mod local;
pub mod sweep;

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use crate::config::{MediaBackend, MediaConfig};
use crate::db::OrphanRepository;

pub use self::cloudinary::CloudinaryRelay;
pub use self::local::LocalRelay;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media backend not configured: {0}")]
    NotConfigured(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub asset_id: String,
    pub url: String,
}

impl MediaError {
    /// Failures a later attempt might get past. Rejected payloads and
    /// ids never will.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaError::Http(_) | MediaError::Api { .. } | MediaError::Io(_)
        )
    }
}

#[async_trait]
pub trait MediaRelay: Send + Sync {
    /// Check that `store` would accept `payload`, without uploading it.
    fn validate(&self, payload: &str) -> Result<(), MediaError>;

    /// Upload `payload` (a base64 data URI, or a remote URL where the
    /// backend supports fetching).
    async fn store(&self, payload: &str) -> Result<StoredAsset, MediaError>;

    /// Remove an asset. Deleting an asset that no longer exists succeeds.
    async fn delete(&self, asset_id: &str) -> Result<(), MediaError>;
}

pub type DynMediaRelay = Arc<dyn MediaRelay>;

/// Build the relay selected in config.
pub fn build_relay(config: &MediaConfig, uploads_path: std::path::PathBuf) -> Result<DynMediaRelay, MediaError> {
    match config.backend {
        MediaBackend::Local => Ok(Arc::new(LocalRelay::new(
            uploads_path,
            config.public_base_url.clone(),
        ))),
        MediaBackend::Cloudinary => Ok(Arc::new(CloudinaryRelay::new(&config.cloudinary)?)),
    }
}

/// Asset id embedded in a hosted URL: the last path segment without its
/// extension. `None` for data URIs and URLs with no usable segment.
pub fn derive_asset_id(url: &str) -> Option<String> {
    if url.starts_with("data:") {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let stem = segment.split('.').next()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange<'a> {
    Unchanged,
    Replace(&'a str),
}

/// Decide whether an incoming image field refers to the asset already
/// stored on a record. Absent or blank input keeps the stored image.
pub fn image_change<'a>(
    incoming: Option<&'a str>,
    stored_url: Option<&str>,
    stored_id: Option<&str>,
) -> ImageChange<'a> {
    let Some(incoming) = incoming.map(str::trim).filter(|s| !s.is_empty()) else {
        return ImageChange::Unchanged;
    };

    if stored_url == Some(incoming) {
        return ImageChange::Unchanged;
    }

    // Hosted ids may carry a folder prefix ("products/abc"); URLs only
    // expose the final segment.
    let stored_tail = stored_id.and_then(|id| id.rsplit('/').next());
    match (derive_asset_id(incoming), stored_tail) {
        (Some(derived), Some(tail)) if derived == tail => ImageChange::Unchanged,
        _ => ImageChange::Replace(incoming),
    }
}

/// Best-effort delete. Failures are logged and journalled for the sweep
/// instead of failing the request.
pub async fn discard_asset(relay: &dyn MediaRelay, orphans: &dyn OrphanRepository, asset_id: &str) {
    if let Err(e) = relay.delete(asset_id).await {
        tracing::warn!("Failed to delete asset {}: {}", asset_id, e);
        if !e.is_retryable() {
            return;
        }
        if let Err(e) = orphans.record(asset_id, &e.to_string()).await {
            tracing::warn!("Failed to journal orphaned asset {}: {}", asset_id, e);
        }
    }
}

/// Delete the previous asset (if any), then upload the replacement.
/// A payload the relay would reject leaves the previous asset in place.
pub async fn replace_asset(
    relay: &dyn MediaRelay,
    orphans: &dyn OrphanRepository,
    old_asset_id: Option<&str>,
    payload: &str,
) -> Result<StoredAsset, MediaError> {
    relay.validate(payload)?;
    if let Some(old) = old_asset_id {
        discard_asset(relay, orphans, old).await;
    }
    relay.store(payload).await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Parse `data:<mime>[;param]*;base64,<data>`.
pub fn parse_data_uri(payload: &str) -> Result<DataUri, MediaError> {
    let invalid = || MediaError::InvalidPayload("Image must be a base64 data URI".into());

    let rest = payload.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, data) = rest.split_once(',').ok_or_else(invalid)?;
    let header = header.strip_suffix(";base64").ok_or_else(invalid)?;
    let mime = header.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() {
        return Err(invalid());
    }

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| MediaError::InvalidPayload("Image data is not valid base64".into()))?;

    Ok(DataUri {
        mime: mime.to_ascii_lowercase(),
        bytes,
    })
}
