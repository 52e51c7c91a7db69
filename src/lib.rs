//! XDR Detection Engine & Network Analysis Service
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       XDR SERVER                           │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────┐   ┌───────────────┐ │
//! │  │  API      │   │ Detection Engine │   │ Network       │ │
//! │  │  Gateway  │──▶│ rules/indicators │   │ Analysis      │ │
//! │  │  (Axum)   │   │ correlation      │   │ flows/lateral │ │
//! │  └───────────┘   └──────────────────┘   └───────────────┘ │
//! │                    in-memory stores (process lifetime)     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Engines are constructed once per server lifecycle and injected through
//! axum state; there are no module-level singletons.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};
use logic::{DetectionEngine, NetworkAnalysis};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub detection: Arc<DetectionEngine>,
    pub network: Arc<NetworkAnalysis>,
    pub config: config::Config,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        Self {
            detection: Arc::new(DetectionEngine::new(config.max_action_history)),
            network: Arc::new(NetworkAnalysis::new()),
            config,
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route(
            "/api/v1/xdr/detection-engine",
            get(handlers::detection::get)
                .post(handlers::detection::create)
                .put(handlers::detection::update)
                .delete(handlers::detection::remove),
        )
        .route(
            "/api/v1/xdr/network",
            get(handlers::network::get)
                .post(handlers::network::create)
                .delete(handlers::network::remove),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
