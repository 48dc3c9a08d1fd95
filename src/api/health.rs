/// Health check endpoint
use crate::context::AppContext;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    // A failing SELECT 1 means the database is gone; report degraded
    let db_ok = sqlx::query("SELECT 1").execute(&ctx.db).await.is_ok();

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "storageMode": ctx.config.storage.mode,
    }))
}
