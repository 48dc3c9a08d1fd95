/// Storage policy coordinator
///
/// Decides where a photo's bytes land for the configured deployment mode:
/// a primary backend, an optional fallback taken when the primary is down,
/// and an optional backup that receives a best-effort second copy after the
/// primary write succeeds. The coordinator never retries across backends;
/// per-backend retry lives inside the adapters.
use crate::{
    blob_store::{BlobBackend, BlobWrite},
    error::{SiteError, SiteResult},
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StoragePolicy {
    primary: Arc<dyn BlobBackend>,
    fallback: Option<Arc<dyn BlobBackend>>,
    backup: Option<Arc<dyn BlobBackend>>,
}

/// Where a store ended up and what the caller should surface. Exactly one
/// of `primary` and `fallback` is set: a fallback write only happens after
/// the primary failed.
#[derive(Debug)]
pub struct StoreOutcome {
    pub primary: Option<BlobWrite>,
    pub fallback: Option<BlobWrite>,
    /// True when the bytes landed on the fallback and still owe the primary
    /// a copy
    pub needs_sync: bool,
    pub warnings: Vec<String>,
}

impl StoragePolicy {
    pub fn new(primary: Arc<dyn BlobBackend>) -> Self {
        Self {
            primary,
            fallback: None,
            backup: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn BlobBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_backup(mut self, backup: Arc<dyn BlobBackend>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    async fn write_to(
        backend: &Arc<dyn BlobBackend>,
        segments: &[String],
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> SiteResult<BlobWrite> {
        let container = backend.ensure_container(segments).await?;
        backend.write(&container, file_name, bytes, mime_type).await
    }

    /// Store bytes per policy: primary first, fallback on primary failure,
    /// then a best-effort backup copy when the primary write succeeded.
    pub async fn store(
        &self,
        segments: &[String],
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> SiteResult<StoreOutcome> {
        let mut warnings = Vec::new();

        let primary_err =
            match Self::write_to(&self.primary, segments, file_name, bytes, mime_type).await {
                Ok(write) => {
                    if let Some(backup) = &self.backup {
                        match Self::write_to(backup, segments, file_name, bytes, mime_type).await {
                            Ok(_) => {
                                info!("Backup copy of {} stored on {}", file_name, backup.name())
                            }
                            Err(e) => {
                                warn!("Backup copy of {} failed: {}", file_name, e);
                                warnings.push(format!(
                                    "backup copy to {} failed: {}",
                                    backup.name(),
                                    e
                                ));
                            }
                        }
                    }
                    return Ok(StoreOutcome {
                        primary: Some(write),
                        fallback: None,
                        needs_sync: false,
                        warnings,
                    });
                }
                Err(e) => e,
            };

        warn!(
            "Primary backend {} failed for {}: {}",
            self.primary.name(),
            file_name,
            primary_err
        );

        let Some(fallback) = &self.fallback else {
            return Err(SiteError::StorageUnavailable(format!(
                "{} backend failed: {}",
                self.primary.name(),
                primary_err
            )));
        };

        match Self::write_to(fallback, segments, file_name, bytes, mime_type).await {
            Ok(write) => {
                warnings.push(format!(
                    "{} unavailable, stored on {} pending re-sync",
                    self.primary.name(),
                    fallback.name()
                ));
                Ok(StoreOutcome {
                    primary: None,
                    fallback: Some(write),
                    needs_sync: true,
                    warnings,
                })
            }
            Err(fallback_err) => {
                warn!(
                    "Fallback backend {} also failed for {}: {}",
                    fallback.name(),
                    file_name,
                    fallback_err
                );
                Err(SiteError::StorageUnavailable(format!(
                    "all backends failed: {}: {}; {}: {}",
                    self.primary.name(),
                    primary_err,
                    fallback.name(),
                    fallback_err
                )))
            }
        }
    }

    /// Write directly to the primary; used when draining the re-sync queue
    pub async fn sync_to_primary(
        &self,
        segments: &[String],
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> SiteResult<BlobWrite> {
        Self::write_to(&self.primary, segments, file_name, bytes, mime_type).await
    }

    /// Delete every stored copy of a blob. Remote ids belong to the
    /// primary; local paths belong to whichever backend holds the disk
    /// copy. A resynced photo carries both and both copies must go.
    pub async fn delete_blob(
        &self,
        backend_file_id: Option<&str>,
        local_path: Option<&str>,
    ) -> SiteResult<bool> {
        let mut removed = false;
        if let Some(id) = backend_file_id {
            removed |= self.primary.delete(id).await?;
        }
        if let Some(path) = local_path {
            let disk = self.fallback.as_ref().unwrap_or(&self.primary);
            removed |= disk.delete(path).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::testing::MockBackend;
    use std::sync::atomic::Ordering;

    fn segments() -> Vec<String> {
        vec!["Site Photos".to_string(), "task-9".to_string()]
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Arc::new(MockBackend::new("s3"));
        let fallback = Arc::new(MockBackend::local("disk"));
        let policy = StoragePolicy::new(primary.clone()).with_fallback(fallback.clone());

        let outcome = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap();

        assert!(!outcome.needs_sync);
        assert!(outcome.warnings.is_empty());
        let write = outcome.primary.as_ref().unwrap();
        assert_eq!(write.reference_url, "mock://s3/Site Photos/task-9/a.jpg");
        assert!(outcome.fallback.is_none());
        assert_eq!(fallback.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_lands_on_fallback() {
        let primary = Arc::new(MockBackend::failing("s3"));
        let fallback = Arc::new(MockBackend::local("disk"));
        let policy = StoragePolicy::new(primary.clone()).with_fallback(fallback.clone());

        let outcome = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap();

        assert!(outcome.needs_sync);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("s3 unavailable"));
        // No primary write happened, so there is nothing to record for it
        assert!(outcome.primary.is_none());
        assert!(outcome.fallback.as_ref().unwrap().local_path.is_some());
        assert_eq!(fallback.write_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_backends_down_is_storage_unavailable() {
        let primary = Arc::new(MockBackend::failing("s3"));
        let fallback = Arc::new(MockBackend::failing("disk"));
        let policy = StoragePolicy::new(primary).with_fallback(fallback);

        let err = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, SiteError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_primary_only_failure_without_fallback() {
        let primary = Arc::new(MockBackend::failing("disk"));
        let policy = StoragePolicy::new(primary);

        let err = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, SiteError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_backup_copy_written_after_primary() {
        let primary = Arc::new(MockBackend::new("s3"));
        let backup = Arc::new(MockBackend::new("drive"));
        let policy = StoragePolicy::new(primary).with_backup(backup.clone());

        let outcome = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap();

        assert!(!outcome.needs_sync);
        assert!(outcome.warnings.is_empty());
        assert_eq!(backup.write_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backup_failure_is_only_a_warning() {
        let primary = Arc::new(MockBackend::new("s3"));
        let backup = Arc::new(MockBackend::failing("drive"));
        let policy = StoragePolicy::new(primary).with_backup(backup);

        let outcome = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap();

        assert!(!outcome.needs_sync);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("backup copy to drive failed"));
    }

    #[tokio::test]
    async fn test_backup_not_attempted_when_primary_fails() {
        let primary = Arc::new(MockBackend::failing("s3"));
        let fallback = Arc::new(MockBackend::local("disk"));
        let backup = Arc::new(MockBackend::new("drive"));
        let policy = StoragePolicy::new(primary)
            .with_fallback(fallback)
            .with_backup(backup.clone());

        let outcome = policy
            .store(&segments(), "a.jpg", b"bytes", "image/jpeg")
            .await
            .unwrap();

        assert!(outcome.needs_sync);
        assert_eq!(backup.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_routes_by_identifier() {
        let primary = Arc::new(MockBackend::new("s3"));
        let fallback = Arc::new(MockBackend::local("disk"));
        let policy = StoragePolicy::new(primary.clone()).with_fallback(fallback.clone());

        policy.delete_blob(Some("s3-id-a.jpg"), None).await.unwrap();
        assert_eq!(primary.delete_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.delete_calls.load(Ordering::SeqCst), 0);

        policy.delete_blob(None, Some("t1/a.jpg")).await.unwrap();
        assert_eq!(fallback.delete_calls.load(Ordering::SeqCst), 1);

        // Nothing recorded: nothing to do
        assert!(!policy.delete_blob(None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_both_copies_after_resync() {
        let primary = Arc::new(MockBackend::new("s3"));
        let fallback = Arc::new(MockBackend::local("disk"));
        let policy = StoragePolicy::new(primary.clone()).with_fallback(fallback.clone());

        // A resynced photo carries a primary id and a surviving local copy
        assert!(policy
            .delete_blob(Some("s3-id-a.jpg"), Some("t1/a.jpg"))
            .await
            .unwrap());

        assert_eq!(primary.delete_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.delete_calls.load(Ordering::SeqCst), 1);
    }
}
