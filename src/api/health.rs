use axum::{extract::State, routing::get, Json, Router};
use sqlx::PgPool;
use axum::http::StatusCode;
use serde_json::json;

use crate::config::Config;

/// Defines health check routes
pub fn health_routes() -> Router<PgPool> {
    Router::new()
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

/// **Liveness Check**
/// Verifies that the API is running; does not touch the database.
async fn liveness_check() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": "API is live" }))
}

/// **Readiness Check**
/// Needs the database and a usable attachment directory; `503` otherwise.
async fn readiness_check(State(pool): State<PgPool>) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    sqlx::query("SELECT 1")
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "error": "Database unavailable", "details": e.to_string() })),
            )
        })?;

    let storage = Config::get().attachment_storage_path.clone();
    tokio::fs::create_dir_all(&storage).await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "Attachment storage unavailable", "details": e.to_string() })),
        )
    })?;

    Ok(Json(json!({ "success": true, "message": "API is ready" })))
}
