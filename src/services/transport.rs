use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use reqwest::{Client, StatusCode};
use uuid::Uuid;

use crate::services::storage::{BlobStore, StorageError};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
pub const DEFAULT_NAMESPACE: &str = "edited";

const JPEG_CONTENT_TYPE: &str = "image/jpeg";
const JPEG_EXTENSION: &str = "jpg";

/// Downloads source images and publishes edited ones.
pub struct ImageTransport {
    http: Client,
    blobs: Arc<dyn BlobStore>,
    namespace: String,
    jpeg_quality: u8,
}

impl ImageTransport {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        namespace: &str,
        jpeg_quality: u8,
        fetch_timeout: Duration,
    ) -> Result<Self, DecodeError> {
        let http = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(DecodeError::Http)?;

        Ok(Self {
            http,
            blobs,
            namespace: namespace.trim_matches('/').to_string(),
            jpeg_quality,
        })
    }

    /// Download an image and decode it to 8-bit RGB.
    ///
    /// Alpha is dropped and grayscale expanded to three channels.
    pub async fn fetch(&self, url: &str) -> Result<RgbImage, DecodeError> {
        let response = self.http.get(url).send().await.map_err(DecodeError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecodeError::Status { url: url.to_string(), status });
        }

        let bytes = response.bytes().await.map_err(DecodeError::Http)?;
        decode(&bytes)
    }

    /// Encode as JPEG and upload under a fresh key, returning its public URL.
    ///
    /// Every call writes a new object so a cached copy of an earlier run is
    /// never served in place of this one.
    pub async fn publish(&self, job_id: Uuid, image: &RgbImage) -> Result<String, PublishError> {
        let encoded = encode_jpeg(image, self.jpeg_quality)?;
        let key = artifact_key(&self.namespace, job_id, Uuid::new_v4());

        self.blobs
            .put(&key, &encoded, JPEG_CONTENT_TYPE)
            .await
            .map_err(PublishError::Storage)?;

        tracing::debug!(job_id = %job_id, key = %key, bytes = encoded.len(), "Published edited image");

        Ok(self.blobs.public_url(&key))
    }
}

/// `{namespace}/{job_id}_{run_id}.jpg`
pub fn artifact_key(namespace: &str, job_id: Uuid, run_id: Uuid) -> String {
    format!("{namespace}/{job_id}_{run_id}.{JPEG_EXTENSION}")
}

pub fn decode(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let image = image::load_from_memory(bytes).map_err(DecodeError::Image)?;
    Ok(image.to_rgb8())
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PublishError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(image)
        .map_err(PublishError::Encode)?;
    Ok(buf.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Image download failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Image download from {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("Could not decode image: {0}")]
    Image(#[source] image::ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode image as JPEG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to store edited image: {0}")]
    Storage(#[source] StorageError),
}
