//! Cloudinary upload API client.
//!
//! Uploads and deletions are signed requests: the signature is the hex
//! SHA-256 of the sorted `key=value` parameters joined with `&`, followed
//! by the API secret.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{parse_data_uri, MediaError, MediaRelay, StoredAsset};
use crate::config::CloudinaryConfig;

/// Cloudinary API base URL.
const BASE_URL: &str = "https://api.cloudinary.com/v1_1";

#[derive(Clone)]
pub struct CloudinaryRelay {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryRelay {
    /// # Errors
    ///
    /// Returns `NotConfigured` when cloud name, key or secret is missing.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, MediaError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| MediaError::NotConfigured(format!("cloudinary {name} is missing")))
        };

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: BASE_URL.to_string(),
            cloud_name: required(&config.cloud_name, "cloud_name")?,
            api_key: required(&config.api_key, "api_key")?,
            api_secret: required(&config.api_secret, "api_secret")?,
            folder: config.folder.clone().filter(|f| !f.is_empty()),
        })
    }

    /// Point the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Signed params plus `api_key`, `signature` and `signature_algorithm`.
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("timestamp", chrono::Utc::now().timestamp().to_string()));
        let signature = self.sign(&params);
        params.push(("api_key", self.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));
        params
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.base_url, self.cloud_name, action)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        form: &[(&'static str, String)],
    ) -> Result<T, MediaError> {
        let response = self.client.post(self.endpoint(action)).form(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MediaError::Parse(e.to_string()))
    }
}

/// Well-formed image data URIs, or absolute http(s) URLs Cloudinary can
/// fetch itself.
fn is_supported_payload(payload: &str) -> bool {
    if payload.starts_with("data:") {
        return parse_data_uri(payload).is_ok_and(|data| data.mime.starts_with("image/"));
    }
    match url::Url::parse(payload) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[async_trait]
impl MediaRelay for CloudinaryRelay {
    fn validate(&self, payload: &str) -> Result<(), MediaError> {
        if is_supported_payload(payload) {
            Ok(())
        } else {
            Err(MediaError::InvalidPayload(
                "Image must be a data URI or URL".into(),
            ))
        }
    }

    async fn store(&self, payload: &str) -> Result<StoredAsset, MediaError> {
        self.validate(payload)?;

        let mut params = Vec::new();
        if let Some(folder) = &self.folder {
            params.push(("folder", folder.clone()));
        }
        let mut form = self.signed_form(params);
        form.push(("file", payload.to_string()));

        let uploaded: UploadResponse = self.post("upload", &form).await?;
        tracing::debug!("Uploaded image to cloudinary as {}", uploaded.public_id);

        Ok(StoredAsset {
            asset_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), MediaError> {
        let form = self.signed_form(vec![("public_id", asset_id.to_string())]);
        let destroyed: DestroyResponse = self.post("destroy", &form).await?;

        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Api {
                status: 200,
                message: format!("destroy returned {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: Some("demo".into()),
            api_key: Some("1234".into()),
            api_secret: Some("abcd".into()),
            folder: None,
        }
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut cfg = config();
        cfg.api_secret = None;
        let err = CloudinaryRelay::new(&cfg).err().unwrap();
        assert!(matches!(err, MediaError::NotConfigured(ref m) if m.contains("api_secret")));
    }

    #[test]
    fn signature_is_sorted_sha256_hex() {
        let relay = CloudinaryRelay::new(&config()).unwrap();
        let sig = relay.sign(&[
            ("timestamp", "1315060510".to_string()),
            ("public_id", "sample".to_string()),
            ("eager", String::new()),
        ]);

        let mut hasher = Sha256::new();
        hasher.update(b"public_id=sample&timestamp=1315060510abcd");
        assert_eq!(sig, hex::encode(hasher.finalize()));
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn signed_form_carries_key_and_algorithm() {
        let relay = CloudinaryRelay::new(&config()).unwrap();
        let form = relay.signed_form(vec![("public_id", "x".into())]);
        let keys: Vec<&str> = form.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["public_id", "timestamp", "api_key", "signature", "signature_algorithm"]
        );
    }

    #[test]
    fn endpoint_uses_cloud_name() {
        let relay = CloudinaryRelay::new(&config())
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(
            relay.endpoint("upload"),
            "http://localhost:9999/demo/image/upload"
        );
    }

    #[tokio::test]
    async fn rejects_unsupported_payload_without_network() {
        let relay = CloudinaryRelay::new(&config()).unwrap();
        let err = relay.store("not an image").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidPayload(_)));
    }

    #[test]
    fn accepts_data_uris_and_web_urls() {
        assert!(is_supported_payload("data:image/png;base64,AAAA"));
        assert!(is_supported_payload("https://cdn.test/a.png"));
        assert!(!is_supported_payload("ftp://cdn.test/a.png"));
        assert!(!is_supported_payload("/uploads/a.png"));
        assert!(!is_supported_payload("data:image/png,notbase64"));
        assert!(!is_supported_payload("data:text/plain;base64,aGk="));
    }
}
