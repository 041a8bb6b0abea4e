use axum::http::Uri;
use service_core::error::AppError;

/// JSON 404 for every path without a route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}
