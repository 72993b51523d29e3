pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod storage;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::{AppConfig, BlobBackend, StorageBackend};
use crate::database::{MemoryStore, PgStore, Store, StoreError};
use crate::services::{FavoriteService, FileService, IdentityService};
use crate::storage::{BlobStore, LocalBlobStore, MemoryBlobStore};

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: IdentityService,
    pub files: FileService,
    pub favorites: FavoriteService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        let files = FileService::new(store.clone(), blobs.clone())
            .with_strict_blob_access(config.security.strict_blob_access);
        Self {
            identity: IdentityService::new(store.clone()),
            favorites: FavoriteService::new(store.clone()),
            files,
            config: Arc::new(config),
            store,
            blobs,
        }
    }

    /// Builds the configured store and blob backends.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Postgres => {
                let pg = PgStore::connect(&config.storage.database_url, config.storage.max_connections).await?;
                pg.migrate().await?;
                Arc::new(pg)
            }
        };
        let blobs: Arc<dyn BlobStore> = match config.blobs.backend {
            BlobBackend::Memory => Arc::new(MemoryBlobStore::new(&config.blobs.public_base_url)?),
            BlobBackend::Local => Arc::new(LocalBlobStore::open(&config.blobs.root, &config.blobs.public_base_url).await?),
        };
        info!(
            "Using {} storage and {} blobs",
            config.storage.backend, config.blobs.backend
        );
        Ok(Self::new(config, store, blobs))
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(webhook_routes())
        // Bearer identity resolved for everything under /api
        .merge(api_routes().route_layer(from_fn_with_state(state.clone(), middleware::caller_identity_middleware)))
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn webhook_routes() -> Router<AppState> {
    use handlers::public::webhooks;

    Router::new().route("/webhooks/identity", post(webhooks::identity))
}

fn api_routes() -> Router<AppState> {
    use handlers::protected::{blobs, favorites, files, users};

    Router::new()
        .route("/api/me", get(users::me))
        .route("/api/users/:id/profile", get(users::profile))
        .route("/api/uploads", post(files::upload_ticket))
        .route("/api/orgs/:org_id/files", get(files::list).post(files::create))
        .route("/api/orgs/:org_id/favorites", get(favorites::list))
        .route("/api/files/:id", delete(files::mark_for_deletion))
        .route("/api/files/:id/restore", post(files::restore))
        .route("/api/files/:id/favorite", post(favorites::toggle))
        .route("/api/blobs/:blob_ref/url", get(blobs::url))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Fileshare API",
            "version": version,
            "description": "Multi-tenant file sharing backend built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "webhooks": "/webhooks/identity (shared secret)",
                "me": "/api/me",
                "profiles": "/api/users/:id/profile",
                "uploads": "/api/uploads",
                "files": "/api/orgs/:org_id/files, /api/files/:id[/restore|/favorite]",
                "favorites": "/api/orgs/:org_id/favorites",
                "blobs": "/api/blobs/:blob_ref/url",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    health_response(state.store.health_check().await)
}

fn health_response(store_health: Result<(), StoreError>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match store_health {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}
