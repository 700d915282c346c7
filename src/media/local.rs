use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{parse_data_uri, DataUri, MediaError, MediaRelay, StoredAsset};

/// Stores uploads on local disk as `<uuid>.<ext>`. The files are served
/// back by the `/uploads` route.
pub struct LocalRelay {
    root: PathBuf,
    public_base_url: String,
}

impl LocalRelay {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn extension_for(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        other => mime_guess::get_mime_extensions_str(other).and_then(|exts| exts.first().copied()),
    }
}

/// Asset ids are generated UUIDs; anything that could walk the
/// filesystem is refused.
fn is_safe_id(asset_id: &str) -> bool {
    !asset_id.is_empty()
        && asset_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Decode an image data URI and pick its file extension.
fn decode_image(payload: &str) -> Result<(DataUri, &'static str), MediaError> {
    let data = parse_data_uri(payload)?;
    let ext = data
        .mime
        .starts_with("image/")
        .then(|| extension_for(&data.mime))
        .flatten()
        .ok_or_else(|| {
            MediaError::InvalidPayload(format!("Unsupported image type: {}", data.mime))
        })?;
    Ok((data, ext))
}

#[async_trait]
impl MediaRelay for LocalRelay {
    fn validate(&self, payload: &str) -> Result<(), MediaError> {
        decode_image(payload).map(|_| ())
    }

    async fn store(&self, payload: &str) -> Result<StoredAsset, MediaError> {
        let (data, ext) = decode_image(payload)?;

        tokio::fs::create_dir_all(&self.root).await?;

        let asset_id = uuid::Uuid::now_v7().to_string();
        let file_name = format!("{asset_id}.{ext}");
        tokio::fs::write(self.root.join(&file_name), &data.bytes).await?;

        tracing::debug!("Stored {} bytes as {}", data.bytes.len(), file_name);

        Ok(StoredAsset {
            url: format!("{}/{}", self.public_base_url, file_name),
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), MediaError> {
        if !is_safe_id(asset_id) {
            return Err(MediaError::InvalidPayload(format!(
                "Invalid asset id: {asset_id}"
            )));
        }

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(asset_id) {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}
