/// Photo upload and management endpoints
use crate::{
    context::AppContext,
    error::{SiteError, SiteResult},
    photos::{
        model::{PhotoDeleteResponse, PhotoUploadResponse, UpdatePhotoRequest},
        service::IngestRequest,
    },
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, patch, post},
    Json, Router,
};

/// Build photo routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/tasks/:task_id/photos",
            post(upload_photo).get(list_photos),
        )
        .route(
            "/api/tasks/:task_id/photos/:photo_id",
            patch(update_photo),
        )
        .route("/api/photos/:id", delete(delete_photo))
}

/// Pull the upload out of a multipart body: one required `photo` file part
/// plus optional `description` and `uploadedBy` text parts
async fn read_upload(mut multipart: Multipart) -> SiteResult<IngestRequest> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut description = None;
    let mut uploaded_by = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SiteError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("photo") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| SiteError::Validation(format!("Unreadable file part: {}", e)))?;
                file = Some((file_name, mime_type, bytes.to_vec()));
            }
            Some("description") => {
                description = Some(field.text().await.map_err(|e| {
                    SiteError::Validation(format!("Unreadable description: {}", e))
                })?);
            }
            Some("uploadedBy") => {
                uploaded_by = Some(field.text().await.map_err(|e| {
                    SiteError::Validation(format!("Unreadable uploadedBy: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let (file_name, mime_type, bytes) = file
        .ok_or_else(|| SiteError::Validation("Missing 'photo' file field".to_string()))?;

    Ok(IngestRequest {
        file_name,
        mime_type,
        bytes,
        description,
        uploaded_by,
    })
}

/// POST /api/tasks/:task_id/photos
async fn upload_photo(
    State(ctx): State<AppContext>,
    Path(task_id): Path<String>,
    multipart: Multipart,
) -> SiteResult<impl IntoResponse> {
    let request = read_upload(multipart).await?;
    let result = ctx.photos.ingest(&task_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(PhotoUploadResponse {
            photo: result.photo,
            warnings: result.warnings,
        }),
    ))
}

/// GET /api/tasks/:task_id/photos
async fn list_photos(
    State(ctx): State<AppContext>,
    Path(task_id): Path<String>,
) -> SiteResult<impl IntoResponse> {
    let photos = ctx.photos.list_for_task(&task_id).await?;
    Ok(Json(photos))
}

/// PATCH /api/tasks/:task_id/photos/:photo_id
async fn update_photo(
    State(ctx): State<AppContext>,
    Path((task_id, photo_id)): Path<(String, String)>,
    Json(body): Json<UpdatePhotoRequest>,
) -> SiteResult<impl IntoResponse> {
    let photo = ctx
        .photos
        .update_description(&task_id, &photo_id, body.description)
        .await?;
    Ok(Json(photo))
}

/// DELETE /api/photos/:id
///
/// The record always goes; stuck blob cleanup surfaces as warnings only
async fn delete_photo(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> SiteResult<impl IntoResponse> {
    let warnings = ctx.photos.delete(&id).await?;
    Ok(Json(PhotoDeleteResponse {
        deleted: true,
        warnings,
    }))
}
