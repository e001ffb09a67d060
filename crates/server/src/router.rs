use super::{handlers, state::AppState};
use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Creates the Axum router with all the application routes.
///
/// Uploads larger than `max_upload_bytes` are rejected before any handler runs.
pub fn create_router(app_state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(app_state.config.max_upload_bytes);

    Router::new()
        // HTML form flow
        .route("/", get(handlers::index_page))
        .route("/extract", post(handlers::extract_page))
        .route("/export/{format}", post(handlers::export_page))
        .route("/convert", post(handlers::convert_page))
        .route("/repair", post(handlers::repair_page))
        .route("/health", get(handlers::health_check))
        // JSON API
        .route("/api/extract", post(handlers::api_extract_handler))
        .route("/api/extract/file", post(handlers::api_extract_file_handler))
        .route("/api/export/{format}", post(handlers::api_export_handler))
        .route("/api/text/repair", post(handlers::api_repair_handler))
        .layer(upload_limit)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
