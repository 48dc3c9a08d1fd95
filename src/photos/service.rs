/// Photo ingestion service
///
/// Owns the upload pipeline: validate, compress, store per policy, record.
/// Blob writes happen before the record insert; a failed insert triggers
/// best-effort blob cleanup so storage does not accumulate orphans.
use crate::{
    blob_store::StoragePolicy,
    compress::{compress, CompressionConstraints},
    error::{SiteError, SiteResult},
    photos::{model::Photo, store::PhotoStore},
    tasks::{model::Task, store::TaskStore},
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_DESCRIPTION_CHARS: usize = 200;
const SYNC_BATCH_SIZE: i64 = 25;

pub struct PhotoService {
    store: PhotoStore,
    tasks: TaskStore,
    policy: Arc<StoragePolicy>,
    constraints: CompressionConstraints,
    max_upload_bytes: usize,
    uploads_dir: PathBuf,
}

/// One incoming upload, already pulled out of the multipart body
#[derive(Debug)]
pub struct IngestRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
}

#[derive(Debug)]
pub struct IngestResult {
    pub photo: Photo,
    pub warnings: Vec<String>,
}

/// Make a name safe to use as a directory or file name segment
fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .take(80)
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim().is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

fn extension_for(mime_type: &str, original_name: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => {
            // Unknown output type: trust the original extension if sane
            match original_name.rsplit('.').next() {
                Some("png") => "png",
                Some("gif") => "gif",
                Some("webp") => "webp",
                _ => "jpg",
            }
        }
    }
}

/// Container path for a task: project level, then task level
fn container_segments(task: &Task) -> Vec<String> {
    vec![
        sanitize_segment(task.project_id.as_deref().unwrap_or("general")),
        sanitize_segment(&task.name),
    ]
}

fn validate_description(description: &Option<String>) -> SiteResult<()> {
    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(SiteError::Validation(format!(
                "Description exceeds {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }
    Ok(())
}

impl PhotoService {
    pub fn new(
        store: PhotoStore,
        tasks: TaskStore,
        policy: Arc<StoragePolicy>,
        constraints: CompressionConstraints,
        max_upload_bytes: usize,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            tasks,
            policy,
            constraints,
            max_upload_bytes,
            uploads_dir,
        }
    }

    /// Ingest one photo for a task
    pub async fn ingest(&self, task_id: &str, request: IngestRequest) -> SiteResult<IngestResult> {
        // The task must exist before anything about the upload is judged
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| SiteError::TaskNotFound(task_id.to_string()))?;

        validate_description(&request.description)?;

        if !request.mime_type.starts_with("image/") {
            return Err(SiteError::InvalidFileType(request.mime_type));
        }
        if request.bytes.is_empty() {
            return Err(SiteError::EmptyFile);
        }
        if request.bytes.len() > self.max_upload_bytes {
            return Err(SiteError::FileTooLarge {
                size: request.bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        // JPEG re-encoding is CPU-bound; keep it off the async workers
        let constraints = self.constraints.clone();
        let bytes = request.bytes;
        let mime_type = request.mime_type.clone();
        let compressed = tokio::task::spawn_blocking(move || {
            compress(&bytes, &mime_type, &constraints)
        })
        .await
        .map_err(|e| SiteError::Internal(format!("Compression task failed: {}", e)))??;

        let mut warnings = Vec::new();
        if let Some(warning) = compressed.warning.clone() {
            warnings.push(warning);
        }

        let file_name = format!(
            "{}_{}-{}.{}",
            sanitize_segment(&task.name),
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            &Uuid::new_v4().simple().to_string()[..8],
            extension_for(&compressed.mime_type, &request.file_name)
        );
        let segments = container_segments(&task);

        let outcome = self
            .policy
            .store(&segments, &file_name, &compressed.bytes, &compressed.mime_type)
            .await?;
        warnings.extend(outcome.warnings);

        // Primary fields stay null on a fallback-only write; the resync job
        // fills them once the primary catches up
        let stored = outcome
            .primary
            .as_ref()
            .or(outcome.fallback.as_ref())
            .ok_or_else(|| SiteError::Internal("Store returned no write".to_string()))?;

        let photo = Photo {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            primary_url: outcome.primary.as_ref().map(|w| w.reference_url.clone()),
            backend_file_id: outcome.primary.as_ref().and_then(|w| w.backend_file_id.clone()),
            local_path: stored.local_path.clone(),
            needs_sync: outcome.needs_sync,
            description: request.description,
            uploaded_by: request.uploaded_by,
            created_at: Utc::now(),
            size_bytes: stored.size_bytes as i64,
            mime_type: compressed.mime_type,
        };

        if let Err(e) = self.store.insert(&photo).await {
            warn!("Photo record insert failed, removing stored blob: {}", e);
            if let Err(cleanup) = self
                .policy
                .delete_blob(photo.backend_file_id.as_deref(), photo.local_path.as_deref())
                .await
            {
                warn!("Orphaned blob cleanup failed: {}", cleanup);
            }
            return Err(e);
        }

        info!(
            "Stored photo {} for task {} ({} bytes, needs_sync={})",
            photo.id, task.id, photo.size_bytes, photo.needs_sync
        );

        Ok(IngestResult { photo, warnings })
    }

    /// Photos for one task, newest first. The task must exist.
    pub async fn list_for_task(&self, task_id: &str) -> SiteResult<Vec<Photo>> {
        if self.tasks.get(task_id).await?.is_none() {
            return Err(SiteError::TaskNotFound(task_id.to_string()));
        }
        self.store.list_for_task(task_id).await
    }

    /// Update the description of one photo under its task. A photo id that
    /// exists under a different task is treated as absent.
    pub async fn update_description(
        &self,
        task_id: &str,
        id: &str,
        description: Option<String>,
    ) -> SiteResult<Photo> {
        validate_description(&description)?;

        let photo = self
            .store
            .get(id)
            .await?
            .filter(|p| p.task_id == task_id)
            .ok_or_else(|| SiteError::NotFound(format!("Photo {}", id)))?;

        self.store.update_description(id, description.as_deref()).await?;
        Ok(Photo {
            description,
            ..photo
        })
    }

    /// Delete a photo record and its stored bytes. Blob cleanup failures
    /// become warnings; the record always goes.
    pub async fn delete(&self, id: &str) -> SiteResult<Vec<String>> {
        let photo = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SiteError::NotFound(format!("Photo {}", id)))?;

        let mut warnings = Vec::new();
        if let Err(e) = self
            .policy
            .delete_blob(photo.backend_file_id.as_deref(), photo.local_path.as_deref())
            .await
        {
            warn!("Blob delete for photo {} failed: {}", id, e);
            warnings.push(format!("stored file could not be removed: {}", e));
        }

        self.store.delete(id).await?;
        Ok(warnings)
    }

    /// Best-effort blob cleanup for every photo under a task; records
    /// themselves go with the task row via cascade.
    pub async fn delete_blobs_for_task(&self, task_id: &str) -> SiteResult<Vec<String>> {
        let mut warnings = Vec::new();
        for photo in self.store.list_for_task(task_id).await? {
            if let Err(e) = self
                .policy
                .delete_blob(photo.backend_file_id.as_deref(), photo.local_path.as_deref())
                .await
            {
                warn!("Blob delete for photo {} failed: {}", photo.id, e);
                warnings.push(format!("photo {}: {}", photo.id, e));
            }
        }
        Ok(warnings)
    }

    /// Re-attempt primary writes for photos stored on the fallback.
    /// Returns the number of photos moved to the primary.
    pub async fn sync_pending(&self) -> SiteResult<usize> {
        let pending = self.store.list_needing_sync(SYNC_BATCH_SIZE).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        info!("Re-syncing {} photo(s) to {}", pending.len(), self.policy.primary_name());
        let mut synced = 0;

        for photo in pending {
            let Some(local_path) = photo.local_path.as_deref() else {
                warn!("Photo {} flagged for sync but has no local copy", photo.id);
                continue;
            };

            let bytes = match tokio::fs::read(self.uploads_dir.join(local_path)).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Local copy of photo {} unreadable: {}", photo.id, e);
                    continue;
                }
            };

            let Some(task) = self.tasks.get(&photo.task_id).await? else {
                continue;
            };
            let segments = container_segments(&task);
            let file_name = local_path.rsplit('/').next().unwrap_or(local_path);

            match self
                .policy
                .sync_to_primary(&segments, file_name, &bytes, &photo.mime_type)
                .await
            {
                Ok(write) => {
                    self.store
                        .mark_synced(&photo.id, &write.reference_url, write.backend_file_id.as_deref())
                        .await?;
                    synced += 1;
                }
                Err(e) => {
                    // Still down; the next run will try again
                    warn!("Re-sync of photo {} failed: {}", photo.id, e);
                }
            }
        }

        Ok(synced)
    }
}
