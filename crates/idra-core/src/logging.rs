//! Structured logging field name constants for idra.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (hits, vectors) |

/// Subsystem originating the log event.
/// Values: "api", "auth", "media", "search", "store", "vertex"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "search", "upload", "mint", "refresh"
pub const OPERATION: &str = "op";

/// Search query text.
pub const QUERY: &str = "query";

/// Collection targeted by a query.
pub const COLLECTION: &str = "collection";

/// Image identifier being uploaded or resolved.
pub const IMAGE_ID: &str = "image_id";

/// Credential source enum variant ("static_key", "supplied_bearer",
/// "oauth_service_account").
pub const CREDENTIAL_SOURCE: &str = "credential_source";

/// Which attempt of the retry-on-empty policy produced the result (1 or 2).
pub const ATTEMPT: &str = "attempt";

/// Hybrid alpha weight used for a query.
pub const ALPHA: &str = "alpha";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search.
pub const RESULT_COUNT: &str = "result_count";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
