//! HTTP and WebSocket API for the sonia wellness journal.
//!
//! The router is built from a shared [`ServerState`] so the binary and the
//! integration tests assemble exactly the same application.

pub mod auth;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use sonia_config::AppConfig;
use sonia_llm::WellnessModel;
use sonia_store::WellnessStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Recorded clips arrive base64 encoded in JSON bodies.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub struct ServerState {
    pub store: WellnessStore,
    pub model: Arc<dyn WellnessModel>,
    pub config: AppConfig,
}

impl ServerState {
    pub fn new(store: WellnessStore, model: Arc<dyn WellnessModel>, config: AppConfig) -> Self {
        Self { store, model, config }
    }
}

fn api_routes() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route("/chat/save", post(handlers::chat::save))
        .route("/chat/history", get(handlers::chat::history))
        .route("/chat/message", post(handlers::chat::message))
        .route("/chat/voice", post(handlers::chat::voice))
        .route("/journal", get(handlers::journal::list).post(handlers::journal::create))
        .route("/journal/{id}", delete(handlers::journal::delete))
        .route("/context", get(handlers::context::get).put(handlers::context::update))
        .route("/dashboard", get(handlers::insights::dashboard))
        .route("/wellness", get(handlers::insights::wellness))
        .route("/report", post(handlers::insights::report))
        .route("/voice/transcribe", post(handlers::voice::transcribe))
        .route("/voice/speak", post(handlers::voice::speak))
        .route("/voice/live", get(handlers::voice::live))
}

/// Builds the full application router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            // Path only: the live endpoint carries its token in the query.
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri().path(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let mut app = Router::new()
        .nest("/api", api_routes().layer(trace_layer))
        .route("/health", get(handlers::health));

    if let Some(dir) = &state.config.static_dir {
        info!("Serving client bundle from {}", dir.display());
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}
