//! Web search front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/search?query=<q>&limit=<n>` | Ranked matches as JSON |
//! | `GET`  | `/gifs/<name>` | The asset files themselves |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The web front end never uploads anything: results link to the local asset
//! files, so the remote handle cache is only reported, not consulted.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unavailable` (503).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use gifbot_core::search::{search_scored, SearchParams};
use gifbot_core::store::Store;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    params: SearchParams,
}

/// Serve the web front end on `[server].bind` until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::new(db::connect(config).await?));
    let app = router(store.clone(), config.web_search_params(), &config.assets.dir);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Web server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
        })
        .await?;

    info!("web server shutting down");
    store.close().await;
    Ok(())
}

/// Build the HTTP router over `store`, serving assets from `asset_dir`.
pub fn router(store: Arc<dyn Store>, params: SearchParams, asset_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", get(handle_search))
        .route("/health", get(handle_health))
        .nest_service("/gifs", ServeDir::new(asset_dir))
        .layer(cors)
        .with_state(AppState { store, params })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "unavailable",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    query: String,
    /// Overrides `[server].max_matches`; `0` means unlimited.
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct SearchHit {
    id: u64,
    name: String,
    text: String,
    score: u32,
    url: String,
    cached: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(req): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let mut params = state.params;
    if let Some(limit) = req.limit {
        params.max_matches = limit;
    }

    let matches = search_scored(state.store.as_ref(), query, &params)
        .await
        .map_err(|e| {
            error!(query, error = %e, "search failed");
            unavailable(e.to_string())
        })?;

    let results = matches
        .into_iter()
        .map(|m| SearchHit {
            url: asset_url(&m.record.name),
            cached: m.record.handle().is_some(),
            id: m.record.id,
            score: m.score,
            name: m.record.name,
            text: m.record.text,
        })
        .collect();

    Ok(Json(SearchResponse {
        query: query.to_string(),
        results,
    }))
}

/// Link to an asset under `/gifs`, percent-encoding each path segment.
fn asset_url(name: &str) -> String {
    let segments: Vec<_> = name.split('/').map(urlencoding::encode).collect();
    format!("/gifs/{}", segments.join("/"))
}
