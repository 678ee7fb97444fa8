//! Hybrid search orchestration: query construction, collection pinning,
//! image fold-in, and the retry-on-empty policy.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use idra_core::{
    defaults, Error, HybridQuery, ImageEmbedder, QueryVector, Result, SearchHit, SearchRequest,
    SearchResponse, VectorStore,
};
use idra_media::{ImageCache, ImagePayload};

use crate::reformulate::broaden;

/// Deployment-level search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// The single collection this deployment serves. Inbound requests
    /// naming any other collection are corrected, never honored.
    pub collection: String,
    /// Default vector-vs-lexical weight.
    pub alpha: f32,
    /// Default maximum hits per search.
    pub limit: usize,
    /// Default lexical match fields.
    pub query_properties: Vec<String>,
    /// Fields surfaced per hit.
    pub return_properties: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            collection: defaults::COLLECTION.to_string(),
            alpha: defaults::SEARCH_ALPHA,
            limit: defaults::SEARCH_LIMIT,
            query_properties: defaults::QUERY_PROPERTIES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            return_properties: defaults::RETURN_PROPERTIES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl SearchConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `IDRA_COLLECTION` | `TechnicalDocuments` | The pinned collection |
    /// | `IDRA_ALPHA` | `0.8` | Default hybrid weight |
    /// | `IDRA_LIMIT` | `10` | Default result limit |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(collection) = std::env::var("IDRA_COLLECTION") {
            if !collection.trim().is_empty() {
                config.collection = collection;
            }
        }
        if let Some(alpha) = std::env::var("IDRA_ALPHA")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
        {
            config.alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(limit) = std::env::var("IDRA_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.limit = limit.max(1);
        }

        config
    }

    /// Set the pinned collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

/// Builds and executes hybrid queries against the store.
///
/// Read-only with respect to the store: no writes or mutations are ever
/// issued from here.
pub struct SearchOrchestrator {
    store: Arc<dyn VectorStore>,
    images: ImageCache,
    embedder: Option<Arc<dyn ImageEmbedder>>,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(
        store: Arc<dyn VectorStore>,
        images: ImageCache,
        embedder: Option<Arc<dyn ImageEmbedder>>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            images,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Execute the two-step search pipeline.
    ///
    /// Attempt 1 runs the request as given (with the collection pinned).
    /// Zero hits trigger exactly one reformulated attempt; backend errors
    /// propagate immediately and never trigger the retry.
    #[instrument(skip(self, request), fields(
        subsystem = "search",
        op = "search",
        collection = %self.config.collection,
    ))]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();

        if !request.has_query() {
            return Err(Error::InvalidInput(
                "at least one of query_text or an image reference is required".to_string(),
            ));
        }

        // The collection is pinned by deployment design, not negotiable
        // per request.
        if let Some(requested) = request
            .collection
            .as_deref()
            .filter(|c| *c != self.config.collection)
        {
            warn!(
                requested_collection = requested,
                pinned_collection = %self.config.collection,
                "collection override ignored"
            );
        }

        let vector = self.resolve_vector(&request).await?;

        let query_text = request
            .query_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let alpha = request
            .alpha
            .unwrap_or(self.config.alpha)
            .clamp(0.0, 1.0);
        let limit = request.limit.unwrap_or(self.config.limit).max(1);

        let query_properties = request
            .query_properties
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.query_properties.clone());
        let return_properties = request
            .return_properties
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.return_properties.clone());

        let first = HybridQuery {
            collection: self.config.collection.clone(),
            query_text: query_text.clone(),
            vector: vector.clone(),
            query_properties,
            return_properties: return_properties.clone(),
            alpha,
            limit,
        };

        let hits = self.store.hybrid(&first).await?;
        if !hits.is_empty() {
            let response = self.shape(hits, 1, &return_properties);
            info!(
                attempt = 1,
                result_count = response.hits.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "search completed"
            );
            return Ok(response);
        }

        // Exactly one more execution: broadened text, widened property
        // restriction. Only emptiness gets us here, never an error.
        let second = HybridQuery {
            query_text: query_text.as_deref().and_then(broaden).or(query_text),
            query_properties: self.config.query_properties.clone(),
            ..first
        };
        debug!(
            reformulated_query = second.query_text.as_deref().unwrap_or(""),
            "first attempt empty; running reformulated query"
        );

        let hits = self.store.hybrid(&second).await?;
        let response = self.shape(hits, 2, &return_properties);
        info!(
            attempt = 2,
            result_count = response.hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "search completed after reformulation"
        );
        Ok(response)
    }

    /// Resolve the image side of the request to a concrete vector.
    ///
    /// An unknown or expired image id is surfaced to the caller, never
    /// silently treated as "no image".
    async fn resolve_vector(&self, request: &SearchRequest) -> Result<Option<QueryVector>> {
        if let Some(vector) = &request.image_vector {
            return Ok(Some(vector.clone()));
        }

        let Some(image_id) = &request.image_id else {
            return Ok(None);
        };

        let resolved = self.images.resolve(image_id)?;
        match resolved.payload {
            ImagePayload::Vector(vector) => Ok(Some(vector)),
            ImagePayload::Bytes(bytes) => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    Error::Embedding("no image embedder configured for raw image payloads".to_string())
                })?;
                let vector = embedder
                    .embed_image(&bytes, request.query_text.as_deref())
                    .await?;
                Ok(Some(vector))
            }
        }
    }

    /// Keep only the configured return properties per hit; store order and
    /// scores pass through untouched.
    fn shape(&self, hits: Vec<SearchHit>, attempts: u32, return_properties: &[String]) -> SearchResponse {
        let shaped = hits
            .into_iter()
            .map(|hit| SearchHit {
                properties: hit
                    .properties
                    .into_iter()
                    .filter(|(key, _)| return_properties.iter().any(|p| p == key))
                    .collect(),
                score: hit.score,
            })
            .collect();

        SearchResponse::new(shaped, attempts)
    }
}
