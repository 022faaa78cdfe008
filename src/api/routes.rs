use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::{handlers, RequestPolicy};
use crate::tts::TtsService;

pub struct AppState {
    pub tts: TtsService,
    pub api_policy: RequestPolicy,
    pub web_policy: RequestPolicy,
}

pub fn create_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/tts/generate", post(handlers::generate))
        .route("/tts/voices", get(handlers::list_voices))
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api", api_routes)
        .route("/generate", post(handlers::generate_web))
        .route("/audio/:filename", get(handlers::audio))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
