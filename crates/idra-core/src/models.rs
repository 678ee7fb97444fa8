//! Shared data models: credentials, search requests, and search results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Embedding vector used to fold image similarity into a hybrid query.
pub type QueryVector = Vec<f32>;

// =============================================================================
// CREDENTIALS
// =============================================================================

/// How the current outbound bearer credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Static provider API key from the environment. Never expires.
    StaticKey,
    /// Pre-obtained bearer token supplied via the environment. Never expires.
    SuppliedBearer,
    /// Bearer minted by exchanging a service-account assertion. Expires and
    /// is replaced by the background refresher.
    OauthServiceAccount,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaticKey => write!(f, "static_key"),
            Self::SuppliedBearer => write!(f, "supplied_bearer"),
            Self::OauthServiceAccount => write!(f, "oauth_service_account"),
        }
    }
}

/// A bearer credential for the embedding provider.
///
/// Exactly one credential is current at a time; the refresher replaces it
/// wholesale, never field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    /// Opaque bearer token value.
    pub token: String,
    /// When this credential was minted.
    pub issued_at: DateTime<Utc>,
    /// Objective expiry; `None` for static sources.
    pub expires_at: Option<DateTime<Utc>>,
    pub source: CredentialSource,
}

impl Credential {
    /// A credential that never expires (static key or supplied bearer).
    pub fn non_expiring(token: impl Into<String>, source: CredentialSource, now: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            issued_at: now,
            expires_at: None,
            source,
        }
    }

    /// A minted OAuth credential; expiry is always derived as
    /// `issued_at + lifetime`.
    pub fn with_lifetime(token: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at: Some(issued_at + lifetime),
            source: CredentialSource::OauthServiceAccount,
        }
    }

    /// Whether the credential is objectively past its expiry. Expired
    /// credentials are still served as the best-known token; the provider
    /// is the authority on rejection.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// Inbound hybrid search request, mirroring the tool-call argument names.
///
/// At least one of `query_text` / `image_id` / `image_vector` must be
/// present. The collection field is advisory only: the orchestrator pins
/// every query to the single configured collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    /// Identifier of a previously uploaded image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Inline precomputed image embedding, used directly when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_vector: Option<QueryVector>,
    /// Textual fields matched by the lexical side of the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_properties: Option<Vec<String>>,
    /// Fields surfaced per hit; extra store properties are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_properties: Option<Vec<String>>,
    /// Vector-vs-lexical weight in [0, 1]. Defaults to 0.8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    /// Maximum hits to return. Defaults to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Create a text-only request.
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query_text: Some(query.into()),
            ..Default::default()
        }
    }

    /// Whether the request carries anything searchable.
    pub fn has_query(&self) -> bool {
        self.query_text.as_deref().is_some_and(|q| !q.trim().is_empty())
            || self.image_id.is_some()
            || self.image_vector.is_some()
    }
}

/// A single search hit, shaped to the configured return properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Property name → value. Keys sort alphabetically; the ordering that
    /// matters, hit order, is carried by the surrounding `Vec`.
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Combined score assigned by the store, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SearchHit {
    /// Build a hit from property pairs.
    pub fn from_pairs<I, K>(pairs: I, score: Option<f32>) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self {
            properties: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            score,
        }
    }
}

/// The outcome of a search, tagged with how many query executions it took.
///
/// An empty result after both attempts is a success with an explanatory
/// summary, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Number of query executions performed (1, or 2 after the
    /// retry-on-empty reformulation).
    pub attempts: u32,
    /// Human-readable outcome line, e.g. "0 risultati dopo 2 ricerche".
    pub summary: String,
}

impl SearchResponse {
    /// Build a response, deriving the summary line from the hit count and
    /// attempt count.
    pub fn new(hits: Vec<SearchHit>, attempts: u32) -> Self {
        let summary = if attempts == 1 {
            format!("{} risultati dopo 1 ricerca", hits.len())
        } else {
            format!("{} risultati dopo {} ricerche", hits.len(), attempts)
        };
        Self {
            hits,
            attempts,
            summary,
        }
    }

    /// Whether the search found anything.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_credential_expiry_is_issued_plus_lifetime() {
        let issued = Utc::now();
        let cred = Credential::with_lifetime("tok", issued, Duration::seconds(55 * 60));
        assert_eq!(cred.expires_at, Some(issued + Duration::seconds(55 * 60)));
        assert_eq!(cred.source, CredentialSource::OauthServiceAccount);
        assert!(!cred.is_expired(issued + Duration::minutes(54)));
        assert!(cred.is_expired(issued + Duration::minutes(55)));
    }

    #[test]
    fn test_static_credential_never_expires() {
        let now = Utc::now();
        let cred = Credential::non_expiring("key", CredentialSource::StaticKey, now);
        assert_eq!(cred.expires_at, None);
        assert!(!cred.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn test_credential_source_display() {
        assert_eq!(CredentialSource::StaticKey.to_string(), "static_key");
        assert_eq!(
            CredentialSource::OauthServiceAccount.to_string(),
            "oauth_service_account"
        );
    }

    #[test]
    fn test_search_request_has_query() {
        assert!(SearchRequest::text("schema idraulico").has_query());
        assert!(!SearchRequest::text("   ").has_query());
        assert!(!SearchRequest::default().has_query());

        let req = SearchRequest {
            image_id: Some("img_123".into()),
            ..Default::default()
        };
        assert!(req.has_query());
    }

    #[test]
    fn test_search_response_summary_lines() {
        let resp = SearchResponse::new(vec![], 2);
        assert_eq!(resp.summary, "0 risultati dopo 2 ricerche");
        assert!(resp.is_empty());

        let hit = SearchHit::from_pairs([("name", serde_json::json!("flangia"))], Some(0.9));
        let resp = SearchResponse::new(vec![hit], 1);
        assert_eq!(resp.summary, "1 risultati dopo 1 ricerca");
        assert_eq!(resp.attempts, 1);
    }

    #[test]
    fn test_search_request_deserializes_tool_arguments() {
        let req: SearchRequest = serde_json::from_str(
            r#"{"collection":"Other","query_text":"schema idraulico","image_id":"img_123","alpha":0.8,"limit":10}"#,
        )
        .unwrap();
        assert_eq!(req.collection.as_deref(), Some("Other"));
        assert_eq!(req.query_text.as_deref(), Some("schema idraulico"));
        assert_eq!(req.image_id.as_deref(), Some("img_123"));
        assert_eq!(req.alpha, Some(0.8));
        assert_eq!(req.limit, Some(10));
        assert!(req.query_properties.is_none());
    }
}
