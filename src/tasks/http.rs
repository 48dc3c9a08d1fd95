/// Task management endpoints
use crate::{
    context::AppContext,
    error::{SiteError, SiteResult},
    tasks::model::{CreateTaskRequest, UpdateTaskRequest},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;

/// Build task routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/:id",
            patch(update_task).get(get_task).delete(delete_task),
        )
}

/// POST /api/tasks
async fn create_task(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateTaskRequest>,
) -> SiteResult<impl IntoResponse> {
    let task = ctx
        .tasks
        .create(&body.name, body.project_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks
async fn list_tasks(State(ctx): State<AppContext>) -> SiteResult<impl IntoResponse> {
    Ok(Json(ctx.tasks.list().await?))
}

/// GET /api/tasks/:id
async fn get_task(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> SiteResult<impl IntoResponse> {
    let task = ctx
        .tasks
        .get(&id)
        .await?
        .ok_or_else(|| SiteError::TaskNotFound(id))?;
    Ok(Json(task))
}

/// PATCH /api/tasks/:id
async fn update_task(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskRequest>,
) -> SiteResult<impl IntoResponse> {
    let task = ctx
        .tasks
        .update(&id, body.name.as_deref(), body.status.as_deref())
        .await?
        .ok_or_else(|| SiteError::TaskNotFound(id))?;
    Ok(Json(task))
}

/// DELETE /api/tasks/:id
///
/// Stored photo bytes are removed best-effort before the rows cascade
async fn delete_task(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> SiteResult<impl IntoResponse> {
    if ctx.tasks.get(&id).await?.is_none() {
        return Err(SiteError::TaskNotFound(id));
    }

    let warnings = ctx.photos.delete_blobs_for_task(&id).await?;
    ctx.tasks.delete(&id).await?;

    Ok(Json(json!({
        "deleted": true,
        "warnings": warnings,
    })))
}
