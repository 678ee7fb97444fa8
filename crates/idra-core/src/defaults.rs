//! Centralized default constants for idra.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Lifetime of a minted service-account OAuth bearer token (55 minutes).
pub const TOKEN_LIFETIME_SECS: i64 = 55 * 60;

/// Safety margin subtracted from the token lifetime for the refresh tick.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Interval between scheduled refresh ticks (lifetime minus margin).
pub const REFRESH_INTERVAL_SECS: i64 = TOKEN_LIFETIME_SECS - REFRESH_MARGIN_SECS;

/// Upper bound on a single mint/exchange attempt.
pub const MINT_TIMEOUT_SECS: u64 = 30;

/// OAuth scope requested for the service-account exchange.
pub const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Fixed fallback path for service-account material when neither the inline
/// JSON nor the path environment variable is set.
pub const SERVICE_ACCOUNT_PATH: &str = "/etc/secrets/weaviate-sa.json";

// =============================================================================
// IMAGES
// =============================================================================

/// Visibility window for an uploaded image artifact (1 hour).
pub const IMAGE_TTL_SECS: i64 = 60 * 60;

/// Upper bound on a remote image fetch during upload.
pub const IMAGE_FETCH_TIMEOUT_SECS: u64 = 30;

/// Prefix for generated image identifiers.
pub const IMAGE_ID_PREFIX: &str = "img_";

// =============================================================================
// SEARCH
// =============================================================================

/// Default hybrid weighting: 0.8 favors vector similarity over lexical match.
pub const SEARCH_ALPHA: f32 = 0.8;

/// Default maximum number of hits per search.
pub const SEARCH_LIMIT: usize = 10;

/// The single collection this deployment serves.
pub const COLLECTION: &str = "TechnicalDocuments";

/// Default textual fields matched by the lexical side of a hybrid query.
pub const QUERY_PROPERTIES: &[&str] = &["name", "caption", "content"];

/// Default fields surfaced per hit; anything else the store returns is
/// dropped during result shaping.
pub const RETURN_PROPERTIES: &[&str] = &["name", "source_pdf", "page_index", "mediaType"];

// =============================================================================
// VECTOR STORE
// =============================================================================

/// Timeout for vector-store query requests (seconds).
pub const STORE_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// EMBEDDING PROVIDER
// =============================================================================

/// Default Vertex multimodal embedding model.
pub const VERTEX_EMBED_MODEL: &str = "multimodalembedding@001";

/// Default Vertex location/region.
pub const VERTEX_LOCATION: &str = "us-central1";

/// Timeout for embedding prediction requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 10000;

/// Maximum request body size in bytes (32 MB, bounded by image uploads).
pub const MAX_BODY_SIZE_BYTES: usize = 32 * 1024 * 1024;
