/// Photo data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored site photo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub task_id: String,
    /// Fetchable URL of the primary copy; null while only a fallback
    /// copy exists
    pub primary_url: Option<String>,
    /// Backend-specific id for later deletion (S3 key, drive file id)
    pub backend_file_id: Option<String>,
    /// Relative path of the on-disk copy, when one exists
    pub local_path: Option<String>,
    /// True while the bytes sit on the fallback and owe the primary a copy
    pub needs_sync: bool,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub mime_type: String,
}

/// Ingest response: the stored photo plus non-fatal warnings
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadResponse {
    pub photo: Photo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// PATCH body for description updates
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoRequest {
    pub description: Option<String>,
}

/// DELETE response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDeleteResponse {
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
