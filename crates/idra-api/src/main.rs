//! idra-api - HTTP API server for idra

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use idra_auth::{minter_for, seed_store, AuthConfig, RefresherConfig, TokenRefresher};
use idra_core::{defaults, SearchRequest, SearchResponse, SystemClock, VectorStore};
use idra_media::{ImageCache, ImageSource, UploadReceipt};
use idra_search::{SearchConfig, SearchOrchestrator};
use idra_vertex::{VertexConfig, VertexEmbedder};
use idra_weaviate::{WeaviateClient, WeaviateConfig};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs, so request IDs in
/// the logs sort chronologically.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<SearchOrchestrator>,
    images: ImageCache,
    /// Used directly only by the connectivity probe; search goes through
    /// the orchestrator.
    store: Arc<dyn VectorStore>,
    credentials: idra_auth::CredentialStore,
    search_config: SearchConfig,
    store_url: String,
    embedder_configured: bool,
}

// =============================================================================
// OPENAPI
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        hybrid_search,
        upload_image,
        upload_image_multipart,
        get_config,
        check_connection,
    ),
    info(
        title = "idra",
        description = "Multimodal hybrid search over a Weaviate-backed technical document collection"
    )
)]
struct ApiDoc;

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "idra_api=debug,tower_http=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "idra_api=debug,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        let mut layer = tracing_subscriber::fmt::layer();
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
    }

    info!(log_format = %log_format, "Logging initialized");

    // Resolve the credential source and mint the initial credential before
    // accepting traffic: a process that cannot authenticate must not start.
    let auth_config = AuthConfig::from_env()?;
    info!(
        credential_source = auth_config.source_label(),
        "Credential source resolved"
    );

    let clock = Arc::new(SystemClock);
    let minter = minter_for(&auth_config, clock.clone())?;
    let credentials = seed_store(&minter, Duration::from_secs(defaults::MINT_TIMEOUT_SECS)).await?;

    // The refresher only runs for minted credentials; static keys and
    // supplied bearers never expire.
    let refresher = match &auth_config {
        AuthConfig::ServiceAccount { .. } => Some(
            TokenRefresher::new(credentials.clone(), minter, RefresherConfig::default()).spawn(),
        ),
        _ => None,
    };

    // Vector store client
    let weaviate_config = WeaviateConfig::from_env()?;
    let store_url = weaviate_config.base_url.clone();
    let store = Arc::new(WeaviateClient::new(weaviate_config, credentials.clone())?);
    info!(store_url = %store_url, "Vector store client initialized");

    // Direct embedding endpoint, needed only when raw image bytes must be
    // embedded server-side. Without it, image search still works for
    // precomputed vectors.
    let embedder: Option<Arc<dyn idra_core::ImageEmbedder>> = match VertexConfig::from_env() {
        Ok(config) => {
            info!(model = %config.model, "Embedding endpoint initialized");
            Some(Arc::new(VertexEmbedder::new(config, credentials.clone())?))
        }
        Err(e) => {
            warn!(error = %e, "Embedding endpoint not configured; raw image payloads cannot be embedded");
            None
        }
    };
    let embedder_configured = embedder.is_some();

    let images = ImageCache::new(clock)?;
    spawn_image_sweeper(images.clone());

    let search_config = SearchConfig::from_env();
    info!(
        collection = %search_config.collection,
        alpha = search_config.alpha,
        limit = search_config.limit,
        "Search configuration loaded"
    );

    let orchestrator = Arc::new(SearchOrchestrator::new(
        store.clone() as Arc<dyn VectorStore>,
        images.clone(),
        embedder,
        search_config.clone(),
    ));

    let state = AppState {
        orchestrator,
        images,
        store: store as Arc<dyn VectorStore>,
        credentials,
        search_config,
        store_url,
        embedder_configured,
    };

    let app = build_router(state);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("IDRA_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = refresher {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

/// Periodically evict expired image records. Visibility is already enforced
/// lazily at resolve time; this only bounds memory.
fn spawn_image_sweeper(images: ImageCache) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(600));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            images.sweep();
        }
    });
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Tool surface
        .route("/api/v1/tools/hybrid_search", post(hybrid_search))
        .route("/api/v1/tools/upload_image", post(upload_image))
        .route("/api/v1/tools/get_config", post(get_config))
        .route("/api/v1/tools/check_connection", post(check_connection))
        // Direct multipart upload
        .route("/api/v1/images", post(upload_image_multipart))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
        )
        .layer(DefaultBodyLimit::max(defaults::MAX_BODY_SIZE_BYTES))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy"))
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "credential_source": state.credentials.snapshot().source().to_string(),
    }))
}

// =============================================================================
// SEARCH HANDLERS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/v1/tools/hybrid_search",
    responses(
        (status = 200, description = "Ranked hits with attempt count and summary"),
        (status = 400, description = "Request carries nothing searchable"),
        (status = 404, description = "Referenced image id is unknown or expired"),
        (status = 502, description = "Vector store or embedding provider failure")
    )
)]
async fn hybrid_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let response = state.orchestrator.search(request).await?;
    Ok(Json(response))
}

// =============================================================================
// IMAGE HANDLERS
// =============================================================================

/// JSON tool arguments for an image upload. Exactly one source must be set.
#[derive(Debug, Deserialize)]
struct UploadImageArgs {
    image_base64: Option<String>,
    image_url: Option<String>,
    image_path: Option<String>,
}

impl UploadImageArgs {
    fn into_source(self) -> Result<ImageSource, ApiError> {
        let sources = [
            self.image_base64.map(ImageSource::Base64),
            self.image_url.map(ImageSource::Url),
            self.image_path.map(|p| ImageSource::Path(p.into())),
        ];
        let mut provided: Vec<ImageSource> = sources.into_iter().flatten().collect();

        match provided.len() {
            1 => Ok(provided.remove(0)),
            0 => Err(ApiError::BadRequest(
                "one of image_base64, image_url, or image_path is required".to_string(),
            )),
            _ => Err(ApiError::BadRequest(
                "provide exactly one of image_base64, image_url, or image_path".to_string(),
            )),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/tools/upload_image",
    responses(
        (status = 200, description = "Upload receipt with the image id and validity window"),
        (status = 400, description = "Missing, ambiguous, or undecodable image source")
    )
)]
async fn upload_image(
    State(state): State<AppState>,
    Json(args): Json<UploadImageArgs>,
) -> Result<Json<UploadReceipt>, ApiError> {
    let source = args.into_source()?;
    let receipt = state.images.upload(&source).await?;
    Ok(Json(receipt))
}

#[utoipa::path(
    post,
    path = "/api/v1/images",
    responses(
        (status = 200, description = "Upload receipt with the image id and validity window"),
        (status = 400, description = "Missing or empty file field")
    )
)]
async fn upload_image_multipart(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("cannot read file field: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("file field is empty".to_string()));
        }
        let receipt = state
            .images
            .upload(&ImageSource::Inline(bytes.to_vec()))
            .await?;
        return Ok(Json(receipt));
    }

    Err(ApiError::BadRequest(
        "multipart field 'file' is required".to_string(),
    ))
}

// =============================================================================
// INTROSPECTION HANDLERS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/v1/tools/get_config",
    responses((status = 200, description = "Active non-secret configuration"))
)]
async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    // Secret values never appear here; only which source is in play.
    Json(serde_json::json!({
        "collection": state.search_config.collection,
        "alpha": state.search_config.alpha,
        "limit": state.search_config.limit,
        "query_properties": state.search_config.query_properties,
        "return_properties": state.search_config.return_properties,
        "credential_source": state.credentials.snapshot().source().to_string(),
        "weaviate_url": state.store_url,
        "embedder_configured": state.embedder_configured,
        "image_ttl_secs": defaults::IMAGE_TTL_SECS,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/tools/check_connection",
    responses((status = 200, description = "Store reachability, including failures"))
)]
async fn check_connection(State(state): State<AppState>) -> impl IntoResponse {
    // Unreachable is a reportable outcome here, not an HTTP error.
    match state.store.is_ready().await {
        Ok(ready) => Json(serde_json::json!({
            "connected": ready,
            "weaviate_url": state.store_url,
        })),
        Err(e) => Json(serde_json::json!({
            "connected": false,
            "weaviate_url": state.store_url,
            "error": e.to_string(),
        })),
    }
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Core(idra_core::Error),
    BadRequest(String),
}

impl From<idra_core::Error> for ApiError {
    fn from(err: idra_core::Error) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            ApiError::Core(err) => {
                use idra_core::Error;
                let status = match &err {
                    Error::InvalidInput(_) | Error::ImageFetch(_) => StatusCode::BAD_REQUEST,
                    Error::ImageNotFoundOrExpired(_) => StatusCode::NOT_FOUND,
                    Error::SearchBackend(_)
                    | Error::Embedding(_)
                    | Error::CredentialMint(_)
                    | Error::Request(_)
                    | Error::Serialization(_) => StatusCode::BAD_GATEWAY,
                    Error::Config(_) | Error::Io(_) | Error::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.kind(), err.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
