//! Payload acquisition for image uploads.

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use tracing::debug;

use idra_core::{defaults, Error, Result};

/// Where an uploaded image payload comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw bytes already in hand (multipart upload).
    Inline(Vec<u8>),
    /// Base64-encoded bytes (JSON tool argument).
    Base64(String),
    /// Remote URL, fetched with a bounded timeout.
    Url(String),
    /// Local filesystem path.
    Path(PathBuf),
}

impl ImageSource {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inline(_) => "inline",
            Self::Base64(_) => "base64",
            Self::Url(_) => "url",
            Self::Path(_) => "path",
        }
    }
}

/// Fetches/reads image payloads during upload.
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    /// Create a fetcher with the default remote-fetch timeout.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::IMAGE_FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("cannot build image fetch client: {}", e)))?;
        Ok(Self { client })
    }

    /// Materialize the payload bytes from the source.
    pub async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>> {
        let bytes = match source {
            ImageSource::Inline(bytes) => bytes.clone(),
            ImageSource::Base64(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| Error::InvalidInput(format!("invalid base64 image data: {}", e)))?,
            ImageSource::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| Error::ImageFetch(format!("fetch {}: {}", url, e)))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Error::ImageFetch(format!(
                        "fetch {}: server returned {}",
                        url, status
                    )));
                }

                response
                    .bytes()
                    .await
                    .map_err(|e| Error::ImageFetch(format!("read body of {}: {}", url, e)))?
                    .to_vec()
            }
            ImageSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| Error::ImageFetch(format!("read {}: {}", path.display(), e)))?,
        };

        if bytes.is_empty() {
            return Err(Error::ImageFetch(format!(
                "empty image payload from {} source",
                source.kind()
            )));
        }

        debug!(
            subsystem = "media",
            source = source.kind(),
            bytes = bytes.len(),
            "image payload fetched"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_inline_bytes_pass_through() {
        let fetcher = ImageFetcher::new().unwrap();
        let bytes = fetcher
            .fetch(&ImageSource::Inline(vec![0x89, 0x50, 0x4e, 0x47]))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn test_base64_decodes() {
        let fetcher = ImageFetcher::new().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"diagram");
        let bytes = fetcher.fetch(&ImageSource::Base64(encoded)).await.unwrap();
        assert_eq!(bytes, b"diagram");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_invalid_input() {
        let fetcher = ImageFetcher::new().unwrap();
        let err = fetcher
            .fetch(&ImageSource::Base64("!!! not base64 !!!".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_path_is_image_fetch_error() {
        let fetcher = ImageFetcher::new().unwrap();
        let err = fetcher
            .fetch(&ImageSource::Path("/nonexistent/diagram.png".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImageFetch(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_local_path_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"png bytes").unwrap();

        let fetcher = ImageFetcher::new().unwrap();
        let bytes = fetcher
            .fetch(&ImageSource::Path(file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(bytes, b"png bytes");
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let fetcher = ImageFetcher::new().unwrap();
        let err = fetcher.fetch(&ImageSource::Inline(vec![])).await.unwrap_err();
        assert!(matches!(err, Error::ImageFetch(_)));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_image_fetch_error() {
        let fetcher = ImageFetcher::new().unwrap();
        // Port 1 on loopback: nothing listens there, connection is refused.
        let err = fetcher
            .fetch(&ImageSource::Url("http://127.0.0.1:1/diagram.png".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImageFetch(_)), "got {:?}", err);
    }
}
