/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{SiteError, SiteResult},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

/// Multipart framing overhead allowed on top of the file ceiling
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let body_limit = ctx.config.upload.max_upload_bytes + BODY_LIMIT_SLACK;
    let uploads_dir = ctx.config.storage.uploads_directory.clone();

    Router::new()
        .merge(crate::api::routes())
        // Locally stored photos are served straight off disk
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> SiteResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("sitetrack listening on {}", addr);
    info!("   Public base URL: {}", ctx.config.service.public_base_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SiteError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| SiteError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
