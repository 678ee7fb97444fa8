//! Seams to external services: the vector store and the embedding provider.

use async_trait::async_trait;

use crate::models::{QueryVector, SearchHit};
use crate::Result;

/// A fully resolved hybrid query, ready for execution against the store.
///
/// By the time a query reaches the store the collection is already pinned
/// and any image reference has been resolved to a concrete vector.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub collection: String,
    pub query_text: Option<String>,
    pub vector: Option<QueryVector>,
    pub query_properties: Vec<String>,
    pub return_properties: Vec<String>,
    pub alpha: f32,
    pub limit: usize,
}

/// Read-only query seam to the vector store.
///
/// Implementations surface their own timeouts; callers never retry errors,
/// only empty result sets (and only once, in the orchestrator).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Execute a hybrid query, returning hits in store-assigned order.
    async fn hybrid(&self, query: &HybridQuery) -> Result<Vec<SearchHit>>;

    /// Liveness probe against the store.
    async fn is_ready(&self) -> Result<bool>;
}

/// Derives an embedding vector from raw image bytes.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// Embed an image, optionally with contextual text.
    async fn embed_image(
        &self,
        image: &[u8],
        contextual_text: Option<&str>,
    ) -> Result<QueryVector>;
}
