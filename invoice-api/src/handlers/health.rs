use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::{db, AppState};

/// Service banner.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Invoice API",
        "status": "healthy",
    }))
}

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "invoice-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
///
/// Verifies that the database connection is working by executing
/// a simple query.
pub async fn db_health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    db::health_check(&state.db).await.map_err(|e| {
        tracing::error!("Database health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(json!({
        "status": "ok",
        "database": "connected"
    })))
}
