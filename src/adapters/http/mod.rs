pub mod error;
pub mod pages;
pub mod routes;
pub mod state;

use std::path::Path;

use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::adapters::http::state::HttpState;
use crate::domain::upload::MAX_UPLOAD_BYTES;

/// Margen para las cabeceras y separadores del multipart.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: HttpState, static_dir: &Path, upload_dir: &Path) -> Router {
    Router::new()
        .route("/", get(routes::index).post(routes::upload_page))
        .route("/api/predict", post(routes::api_predict))
        .route("/admin", get(routes::admin_page).post(routes::admin_submit))
        .route("/admin/api", get(routes::get_thresholds).post(routes::set_thresholds))
        .route("/preview/:filename", get(routes::preview))
        .route("/health", get(routes::health))
        .nest_service(pages::UPLOADS_URL, ServeDir::new(upload_dir))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
