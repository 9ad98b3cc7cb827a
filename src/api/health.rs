/// Health check endpoint
use crate::{context::AppContext, error::AppResult};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/health", get(health_check))
}

/// GET /health — liveness plus a database round-trip
async fn health_check(State(ctx): State<AppContext>) -> AppResult<Json<serde_json::Value>> {
    crate::db::test_connection(&ctx.db).await?;

    Ok(Json(json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
