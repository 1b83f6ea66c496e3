use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CloudinaryConfig;

const UPLOAD_FOLDER: &str = "jewelry";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("media host is not configured")]
    NotConfigured,

    #[error("request to media host failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("media host rejected the upload ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Payload shape problems are client errors, reported before anything leaves the process.
#[derive(Debug, PartialEq, Eq)]
pub enum PayloadError {
    Empty,
    NotBase64,
}

/// Accepts `data:<mime>;base64,<data>` or bare base64 and returns the string to forward.
pub fn normalize_payload(image: &str) -> Result<String, PayloadError> {
    let image = image.trim();
    if image.is_empty() {
        return Err(PayloadError::Empty);
    }

    let (prefix, data) = match image.split_once(";base64,") {
        Some((mime, data)) if mime.starts_with("data:") => (Some(mime), data),
        _ => (None, image),
    };
    if data.is_empty() || STANDARD.decode(data).is_err() {
        return Err(PayloadError::NotBase64);
    }

    Ok(match prefix {
        Some(mime) => format!("{mime};base64,{data}"),
        None => format!("data:image/png;base64,{data}"),
    })
}

#[derive(Clone)]
pub struct ImageUploader {
    client: reqwest::Client,
    config: Option<CloudinaryConfig>,
}

impl ImageUploader {
    pub fn new(config: Option<CloudinaryConfig>) -> Self {
        if config.is_none() {
            log::warn!("Cloudinary is not configured; image uploads will fail");
        }
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Uploads a normalized data URI and returns the hosted HTTPS URL.
    pub async fn upload(&self, data_uri: &str) -> Result<String, UploadError> {
        let config = self.config.as_ref().ok_or(UploadError::NotConfigured)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", UPLOAD_FOLDER), ("timestamp", timestamp.as_str())],
            &config.api_secret,
        );

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            config.cloud_name
        );
        let form = [
            ("file", data_uri),
            ("api_key", config.api_key.as_str()),
            ("folder", UPLOAD_FOLDER),
            ("timestamp", timestamp.as_str()),
            ("signature_algorithm", "sha256"),
            ("signature", signature.as_str()),
        ];

        let response = self.client.post(url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status, body });
        }

        let uploaded: UploadResponse = response.json().await?;
        log::info!("Uploaded image to {}", uploaded.secure_url);
        Ok(uploaded.secure_url)
    }
}

/// Cloudinary request signature: parameters sorted by key, joined as `k=v&k=v`,
/// followed by the API secret, hashed with SHA-256.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
