//! The TTL-bounded image record store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use idra_core::{defaults, Clock, Error, QueryVector, Result};

use crate::fetch::{ImageFetcher, ImageSource};

/// What an image record stores: raw bytes, or a precomputed embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    Vector(QueryVector),
}

struct ImageRecord {
    payload: ImagePayload,
    media_type: Option<String>,
    created_at: DateTime<Utc>,
}

/// Payload handed back by a successful resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub payload: ImagePayload,
    pub media_type: Option<String>,
}

/// Receipt returned by an upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub image_id: String,
    /// Human-readable validity window, e.g. "1 hour".
    pub valid_for: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

struct CacheInner {
    records: RwLock<HashMap<String, ImageRecord>>,
    fetcher: ImageFetcher,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

/// Time-bounded store mapping opaque image ids to uploaded payloads.
///
/// Identifiers are random per upload, so identical bytes uploaded twice get
/// distinct ids (no content addressing). Expiry is checked lazily at resolve
/// time; [`ImageCache::sweep`] additionally evicts expired records to bound
/// memory but is not required for correctness.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<CacheInner>,
}

impl ImageCache {
    /// Create a cache with the standard 1-hour TTL.
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_ttl(clock, Duration::seconds(defaults::IMAGE_TTL_SECS))
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(CacheInner {
                records: RwLock::new(HashMap::new()),
                fetcher: ImageFetcher::new()?,
                ttl,
                clock,
            }),
        })
    }

    fn new_image_id() -> String {
        format!("{}{}", defaults::IMAGE_ID_PREFIX, Uuid::new_v4().simple())
    }

    fn render_ttl(&self) -> String {
        let secs = self.inner.ttl.num_seconds();
        if secs % 3600 == 0 {
            let hours = secs / 3600;
            if hours == 1 {
                "1 hour".to_string()
            } else {
                format!("{} hours", hours)
            }
        } else {
            format!("{} seconds", secs)
        }
    }

    /// Fetch the payload from the source and store it under a fresh id.
    pub async fn upload(&self, source: &ImageSource) -> Result<UploadReceipt> {
        let bytes = self.inner.fetcher.fetch(source).await?;
        let media_type = infer::get(&bytes).map(|kind| kind.mime_type().to_string());
        let image_id = self.insert(ImagePayload::Bytes(bytes), media_type.clone());

        info!(
            subsystem = "media",
            op = "upload",
            image_id = %image_id,
            source = source.kind(),
            media_type = media_type.as_deref().unwrap_or("unknown"),
            "image uploaded"
        );

        Ok(UploadReceipt {
            image_id,
            valid_for: self.render_ttl(),
            media_type,
        })
    }

    /// Store an already-materialized payload under a fresh id.
    pub fn insert(&self, payload: ImagePayload, media_type: Option<String>) -> String {
        let image_id = Self::new_image_id();
        let record = ImageRecord {
            payload,
            media_type,
            created_at: self.inner.clock.now(),
        };

        let mut records = self
            .inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        records.insert(image_id.clone(), record);
        image_id
    }

    /// Return the payload iff the record exists and is unexpired.
    ///
    /// A missing id and an expired one produce the same error: callers
    /// cannot tell the two apart.
    pub fn resolve(&self, image_id: &str) -> Result<ResolvedImage> {
        let now = self.inner.clock.now();
        let records = self
            .inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        match records.get(image_id) {
            Some(record) if now < record.created_at + self.inner.ttl => {
                debug!(subsystem = "media", op = "resolve", image_id, "image resolved");
                Ok(ResolvedImage {
                    payload: record.payload.clone(),
                    media_type: record.media_type.clone(),
                })
            }
            _ => Err(Error::ImageNotFoundOrExpired(image_id.to_string())),
        }
    }

    /// Evict expired records. Optional memory bounding; the visibility
    /// contract is already enforced at resolve time.
    pub fn sweep(&self) -> usize {
        let now = self.inner.clock.now();
        let ttl = self.inner.ttl;
        let mut records = self
            .inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let before = records.len();
        records.retain(|_, record| now < record.created_at + ttl);
        let evicted = before - records.len();

        if evicted > 0 {
            debug!(subsystem = "media", op = "sweep", evicted, "expired images evicted");
        }
        evicted
    }

    /// Number of records physically present (expired or not).
    pub fn len(&self) -> usize {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idra_core::ManualClock;

    fn cache_with_clock() -> (ImageCache, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = ImageCache::new(Arc::new(clock.clone())).unwrap();
        (cache, clock)
    }

    #[tokio::test]
    async fn test_resolve_inside_and_outside_ttl_boundary() {
        let (cache, clock) = cache_with_clock();
        let receipt = cache
            .upload(&ImageSource::Inline(b"diagram bytes".to_vec()))
            .await
            .unwrap();
        assert_eq!(receipt.valid_for, "1 hour");

        // ttl - 1s: still visible
        clock.advance(Duration::seconds(defaults::IMAGE_TTL_SECS - 1));
        let resolved = cache.resolve(&receipt.image_id).unwrap();
        assert_eq!(resolved.payload, ImagePayload::Bytes(b"diagram bytes".to_vec()));

        // ttl + 1s: logically absent
        clock.advance(Duration::seconds(2));
        let err = cache.resolve(&receipt.image_id).unwrap_err();
        assert!(matches!(err, Error::ImageNotFoundOrExpired(_)));
    }

    #[tokio::test]
    async fn test_resolve_at_exactly_ttl_fails() {
        let (cache, clock) = cache_with_clock();
        let receipt = cache
            .upload(&ImageSource::Inline(vec![1, 2, 3]))
            .await
            .unwrap();

        clock.advance(Duration::seconds(defaults::IMAGE_TTL_SECS));
        assert!(cache.resolve(&receipt.image_id).is_err());
    }

    #[tokio::test]
    async fn test_identical_bytes_get_distinct_ids() {
        let (cache, _clock) = cache_with_clock();
        let first = cache
            .upload(&ImageSource::Inline(b"same".to_vec()))
            .await
            .unwrap();
        let second = cache
            .upload(&ImageSource::Inline(b"same".to_vec()))
            .await
            .unwrap();

        assert_ne!(first.image_id, second.image_id);
        assert!(first.image_id.starts_with(defaults::IMAGE_ID_PREFIX));
    }

    #[test]
    fn test_unknown_id_indistinguishable_from_expired() {
        let (cache, _clock) = cache_with_clock();
        let err = cache.resolve("img_does_not_exist").unwrap_err();
        assert!(matches!(err, Error::ImageNotFoundOrExpired(_)));
        assert_eq!(err.kind(), "image_not_found_or_expired");
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired() {
        let (cache, clock) = cache_with_clock();
        cache
            .upload(&ImageSource::Inline(b"old".to_vec()))
            .await
            .unwrap();

        clock.advance(Duration::seconds(defaults::IMAGE_TTL_SECS + 1));
        let fresh = cache
            .upload(&ImageSource::Inline(b"fresh".to_vec()))
            .await
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.resolve(&fresh.image_id).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_61_minutes_after_upload_fails() {
        let (cache, clock) = cache_with_clock();
        let receipt = cache
            .upload(&ImageSource::Inline(b"diagram.png contents".to_vec()))
            .await
            .unwrap();

        clock.advance(Duration::minutes(61));
        let err = cache.resolve(&receipt.image_id).unwrap_err();
        assert!(matches!(err, Error::ImageNotFoundOrExpired(_)));
    }

    #[tokio::test]
    async fn test_media_type_sniffed_from_magic_bytes() {
        let (cache, _clock) = cache_with_clock();
        // Minimal PNG signature.
        let png = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
        let receipt = cache.upload(&ImageSource::Inline(png)).await.unwrap();
        assert_eq!(receipt.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_inserted_vector_payload_round_trips() {
        let (cache, _clock) = cache_with_clock();
        let id = cache.insert(ImagePayload::Vector(vec![0.1, 0.2]), None);
        let resolved = cache.resolve(&id).unwrap();
        assert_eq!(resolved.payload, ImagePayload::Vector(vec![0.1, 0.2]));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_all_visible() {
        let (cache, _clock) = cache_with_clock();
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .upload(&ImageSource::Inline(vec![i; 8]))
                    .await
                    .unwrap()
                    .image_id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        for id in &ids {
            assert!(cache.resolve(id).is_ok());
        }
    }
}
