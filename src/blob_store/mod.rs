/// Blob storage for site photos
///
/// A photo's bytes land on one or more backends (local disk, S3-compatible
/// object store, remote drive). Backends share one adapter trait; the
/// policy coordinator decides which backend is primary for a given
/// deployment and how failures cascade.
pub mod disk;
pub mod drive;
pub mod policy;
pub mod retry;
pub mod s3;

pub use policy::{StoragePolicy, StoreOutcome};

use crate::error::SiteResult;
use async_trait::async_trait;

/// Handle to a backend container (directory, key prefix or remote folder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle(pub String);

impl ContainerHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of writing one blob to one backend
#[derive(Debug, Clone)]
pub struct BlobWrite {
    /// Caller-fetchable reference URL
    pub reference_url: String,
    /// Backend-specific id used for later deletion, if the backend has one
    pub backend_file_id: Option<String>,
    /// Relative path on local storage; set only by the disk adapter
    pub local_path: Option<String>,
    pub size_bytes: usize,
}

/// Blob storage backend trait
///
/// Implementations store and delete photo bytes on one concrete target.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Short backend label for logs and warnings
    fn name(&self) -> &'static str;

    /// Idempotently create (or find) a nested container addressed by a
    /// sequence of human-readable names. Repeated calls with identical
    /// names must resolve to the same container.
    async fn ensure_container(&self, segments: &[String]) -> SiteResult<ContainerHandle>;

    /// Store bytes under the container and return a fetchable reference
    async fn write(
        &self,
        container: &ContainerHandle,
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> SiteResult<BlobWrite>;

    /// Best-effort delete. Returns false when the target is already absent.
    async fn delete(&self, backend_file_id: &str) -> SiteResult<bool>;
}

/// Test doubles shared by policy and service tests
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory backend with switchable failure and call counters
    pub struct MockBackend {
        pub label: &'static str,
        pub fail_writes: AtomicBool,
        pub container_calls: AtomicUsize,
        pub write_calls: AtomicUsize,
        pub delete_calls: AtomicUsize,
        /// When true, writes report a local path like the disk adapter
        pub acts_local: bool,
    }

    impl MockBackend {
        pub fn new(label: &'static str) -> Self {
            Self {
                label,
                fail_writes: AtomicBool::new(false),
                container_calls: AtomicUsize::new(0),
                write_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
                acts_local: false,
            }
        }

        pub fn local(label: &'static str) -> Self {
            Self {
                acts_local: true,
                ..Self::new(label)
            }
        }

        pub fn failing(label: &'static str) -> Self {
            let backend = Self::new(label);
            backend.fail_writes.store(true, Ordering::SeqCst);
            backend
        }

        pub fn total_calls(&self) -> usize {
            self.container_calls.load(Ordering::SeqCst)
                + self.write_calls.load(Ordering::SeqCst)
                + self.delete_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobBackend for MockBackend {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn ensure_container(&self, segments: &[String]) -> SiteResult<ContainerHandle> {
            self.container_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ContainerHandle(segments.join("/")))
        }

        async fn write(
            &self,
            container: &ContainerHandle,
            file_name: &str,
            bytes: &[u8],
            _mime_type: &str,
        ) -> SiteResult<BlobWrite> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(crate::error::SiteError::BlobStorage(format!(
                    "{} write refused",
                    self.label
                )));
            }

            let rel = format!("{}/{}", container.as_str(), file_name);
            Ok(BlobWrite {
                reference_url: format!("mock://{}/{}", self.label, rel),
                backend_file_id: if self.acts_local {
                    None
                } else {
                    Some(format!("{}-id-{}", self.label, file_name))
                },
                local_path: if self.acts_local { Some(rel) } else { None },
                size_bytes: bytes.len(),
            })
        }

        async fn delete(&self, _backend_file_id: &str) -> SiteResult<bool> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }
}
