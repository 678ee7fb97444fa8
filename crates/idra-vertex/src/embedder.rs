//! Vertex multimodal embedding backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use idra_auth::CredentialStore;
use idra_core::{defaults, Error, ImageEmbedder, QueryVector, Result};

/// Configuration for the Vertex embedding endpoint.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project: String,
    pub location: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl VertexConfig {
    /// Read the endpoint coordinates from the environment.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VERTEX_PROJECT` | — (required) | GCP project id |
    /// | `VERTEX_LOCATION` | `us-central1` | Endpoint region |
    /// | `VERTEX_EMBED_MODEL` | `multimodalembedding@001` | Model slug |
    pub fn from_env() -> Result<Self> {
        let project = std::env::var("VERTEX_PROJECT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config("VERTEX_PROJECT is not set".to_string()))?;

        let location = std::env::var("VERTEX_LOCATION")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::VERTEX_LOCATION.to_string());

        let model = std::env::var("VERTEX_EMBED_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::VERTEX_EMBED_MODEL.to_string());

        Ok(Self {
            project,
            location,
            model,
            timeout_secs: defaults::EMBED_TIMEOUT_SECS,
        })
    }

    fn predict_url(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/publishers/google/models/{model}:predict",
            loc = self.location,
            proj = self.project,
            model = self.model,
        )
    }
}

/// Embedding backend that derives vectors from image bytes (optionally with
/// contextual text) via the Vertex prediction REST API.
pub struct VertexEmbedder {
    client: Client,
    config: VertexConfig,
    credentials: CredentialStore,
}

impl VertexEmbedder {
    pub fn new(config: VertexConfig, credentials: CredentialStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("cannot build embedding client: {}", e)))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    fn build_instances(image: &[u8], contextual_text: Option<&str>) -> Value {
        let mut instance = json!({
            "image": {
                "bytesBase64Encoded": base64::engine::general_purpose::STANDARD.encode(image),
            }
        });
        if let Some(text) = contextual_text.filter(|t| !t.trim().is_empty()) {
            instance["text"] = json!(text);
        }
        json!({ "instances": [instance] })
    }

    fn extract_vector(body: &Value) -> Result<QueryVector> {
        let prediction = body
            .get("predictions")
            .and_then(|p| p.get(0))
            .ok_or_else(|| Error::Embedding("no predictions in response".to_string()))?;

        let embedding = prediction
            .get("imageEmbedding")
            .or_else(|| prediction.get("textEmbedding"))
            .or_else(|| prediction.get("embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))?;

        embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| Error::Embedding("non-numeric embedding component".to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl ImageEmbedder for VertexEmbedder {
    async fn embed_image(
        &self,
        image: &[u8],
        contextual_text: Option<&str>,
    ) -> Result<QueryVector> {
        let body = Self::build_instances(image, contextual_text);
        // Capture the credential once; both header fields carry this value
        // for the whole request, refresh or not.
        let snapshot = self.credentials.snapshot();

        let mut request = self.client.post(self.config.predict_url()).json(&body);
        for (name, value) in snapshot.rest_headers() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("prediction request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "prediction endpoint returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("malformed prediction response: {}", e)))?;

        let vector = Self::extract_vector(&body)?;
        debug!(
            subsystem = "vertex",
            op = "embed_image",
            model = %self.config.model,
            dimension = vector.len(),
            "image embedded"
        );
        Ok(vector)
    }
}
