/// Local-disk blob backend
///
/// Containers are directories under the uploads root; reference URLs point
/// at the static file handler mounted on /uploads.
use crate::{
    blob_store::{BlobBackend, BlobWrite, ContainerHandle},
    error::{SiteError, SiteResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

#[derive(Clone)]
pub struct DiskBackend {
    base_path: PathBuf,
    public_base_url: String,
}

impl DiskBackend {
    pub fn new(base_path: PathBuf, public_base_url: String) -> Self {
        Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Segments become directory names, so they must stay single-level
    fn validate_segment(segment: &str) -> SiteResult<()> {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains('/')
            || segment.contains('\\')
        {
            return Err(SiteError::BlobStorage(format!(
                "Invalid path segment: {:?}",
                segment
            )));
        }
        Ok(())
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        self.base_path.join(relative)
    }
}

#[async_trait]
impl BlobBackend for DiskBackend {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn ensure_container(&self, segments: &[String]) -> SiteResult<ContainerHandle> {
        for segment in segments {
            Self::validate_segment(segment)?;
        }

        let relative = segments.join("/");
        fs::create_dir_all(self.absolute(&relative))
            .await
            .map_err(|e| {
                SiteError::BlobStorage(format!("Failed to create upload directory: {}", e))
            })?;

        Ok(ContainerHandle(relative))
    }

    async fn write(
        &self,
        container: &ContainerHandle,
        file_name: &str,
        bytes: &[u8],
        _mime_type: &str,
    ) -> SiteResult<BlobWrite> {
        Self::validate_segment(file_name)?;

        let relative = format!("{}/{}", container.as_str(), file_name);
        fs::write(self.absolute(&relative), bytes)
            .await
            .map_err(|e| {
                SiteError::BlobStorage(format!("Failed to write {}: {}", relative, e))
            })?;

        Ok(BlobWrite {
            reference_url: format!("{}/uploads/{}", self.public_base_url, relative),
            backend_file_id: None,
            local_path: Some(relative),
            size_bytes: bytes.len(),
        })
    }

    /// The disk backend has no remote id; the stored relative path stands in
    async fn delete(&self, backend_file_id: &str) -> SiteResult<bool> {
        match fs::remove_file(self.absolute(backend_file_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SiteError::BlobStorage(format!(
                "Failed to delete {}: {}",
                backend_file_id, e
            ))),
        }
    }
}
