//! HTTP client for the store, with per-call credential injection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use idra_auth::{CredentialSnapshot, CredentialStore};
use idra_core::{
    defaults, CredentialSource, Error, HybridQuery, Result, SearchHit, VectorStore,
};

use crate::graphql;

/// Connection configuration for the store.
#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub base_url: String,
    /// Store-side API key, sent as the cluster's own bearer auth.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl WeaviateConfig {
    /// Read the cluster coordinates from the environment.
    ///
    /// `WEAVIATE_CLUSTER_URL` (preferred) or `WEAVIATE_URL` is required;
    /// `WEAVIATE_API_KEY` is optional for unauthenticated local clusters.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("WEAVIATE_CLUSTER_URL")
            .or_else(|_| std::env::var("WEAVIATE_URL"))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("set WEAVIATE_URL or WEAVIATE_CLUSTER_URL".to_string())
            })?;

        let api_key = std::env::var("WEAVIATE_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            base_url,
            api_key,
            timeout_secs: defaults::STORE_TIMEOUT_SECS,
        })
    }
}

/// Store client executing hybrid queries over GraphQL REST.
///
/// Read-only: this client never issues writes or schema mutations.
pub struct WeaviateClient {
    client: Client,
    config: WeaviateConfig,
    credentials: CredentialStore,
}

impl WeaviateClient {
    pub fn new(config: WeaviateConfig, credentials: CredentialStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("cannot build store client: {}", e)))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Attach store auth plus the provider credential headers.
    ///
    /// A static provider key travels only in `X-Goog-Vertex-Api-Key` and
    /// the store's own key keeps the `Authorization` slot. A minted or
    /// supplied bearer takes over `Authorization` instead, which the
    /// cluster forwards to its embedding module.
    fn apply_headers(
        &self,
        mut request: RequestBuilder,
        snapshot: &CredentialSnapshot,
    ) -> RequestBuilder {
        request = request.header("X-Goog-Vertex-Api-Key", snapshot.token().to_string());
        match snapshot.source() {
            CredentialSource::StaticKey => {
                if let Some(api_key) = &self.config.api_key {
                    request = request.bearer_auth(api_key);
                }
                request
            }
            _ => request.bearer_auth(snapshot.token()),
        }
    }

    /// The current provider credential as gRPC connection metadata, for
    /// deployments wired to the store's RPC channel. Captured at call time;
    /// a later refresh does not mutate already-issued pairs.
    pub fn rpc_metadata(&self) -> [(&'static str, String); 2] {
        self.credentials.snapshot().rpc_metadata()
    }
}

#[async_trait]
impl VectorStore for WeaviateClient {
    #[instrument(skip(self, query), fields(
        subsystem = "store",
        op = "hybrid",
        collection = %query.collection,
        alpha = query.alpha,
    ))]
    async fn hybrid(&self, query: &HybridQuery) -> Result<Vec<SearchHit>> {
        let rendered = graphql::build_query(query)?;
        let body = json!({ "query": rendered });
        let snapshot = self.credentials.snapshot();

        let request = self
            .apply_headers(self.client.post(self.endpoint("v1/graphql")), &snapshot)
            .json(&body);

        let response = request
            .send()
            .await
            .map_err(|e| Error::SearchBackend(format!("store unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::SearchBackend(format!(
                "store returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::SearchBackend(format!("malformed store response: {}", e)))?;

        let hits = graphql::decode_response(&body, &query.collection)?;
        debug!(result_count = hits.len(), "hybrid query executed");
        Ok(hits)
    }

    async fn is_ready(&self) -> Result<bool> {
        let snapshot = self.credentials.snapshot();
        let response = self
            .apply_headers(self.client.get(self.endpoint("v1/.well-known/ready")), &snapshot)
            .send()
            .await
            .map_err(|e| Error::SearchBackend(format!("store unreachable: {}", e)))?;

        Ok(response.status().is_success())
    }
}
