/// S3-compatible blob backend
///
/// Works against AWS S3 and S3-compatible providers (MinIO, Cloudflare R2,
/// DigitalOcean Spaces). Objects are publicly readable under the configured
/// public URL; the bucket policy is expected to allow that.
use crate::{
    blob_store::{BlobBackend, BlobWrite, ContainerHandle},
    config::S3Config,
    error::{SiteError, SiteResult},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct S3Backend {
    client: Arc<Client>,
    bucket: String,
    public_url: String,
    key_prefix: String,
}

impl S3Backend {
    pub async fn new(config: &S3Config) -> SiteResult<Self> {
        info!(
            "Initializing S3 blob storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "sitetrack",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            // Path-style addressing is required for MinIO and friends
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Arc::new(Client::from_conf(builder.build())),
            bucket: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            key_prefix: config.key_prefix.trim_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BlobBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    /// Object stores have no real folders; the container is a key prefix
    async fn ensure_container(&self, segments: &[String]) -> SiteResult<ContainerHandle> {
        let mut parts = Vec::with_capacity(segments.len() + 1);
        if !self.key_prefix.is_empty() {
            parts.push(self.key_prefix.clone());
        }
        parts.extend(segments.iter().cloned());
        Ok(ContainerHandle(parts.join("/")))
    }

    async fn write(
        &self,
        container: &ContainerHandle,
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> SiteResult<BlobWrite> {
        let key = format!("{}/{}", container.as_str(), file_name);
        let size_bytes = bytes.len();

        debug!(
            "Uploading {} to S3 bucket {} ({} bytes)",
            key, self.bucket, size_bytes
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| SiteError::BlobStorage(format!("S3 upload of {} failed: {}", key, e)))?;

        Ok(BlobWrite {
            reference_url: format!("{}/{}", self.public_url, key),
            backend_file_id: Some(key),
            local_path: None,
            size_bytes,
        })
    }

    async fn delete(&self, backend_file_id: &str) -> SiteResult<bool> {
        debug!("Deleting {} from S3 bucket {}", backend_file_id, self.bucket);

        // S3 DeleteObject succeeds for absent keys, so this is idempotent
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(backend_file_id)
            .send()
            .await
            .map_err(|e| {
                SiteError::BlobStorage(format!("S3 delete of {} failed: {}", backend_file_id, e))
            })?;

        Ok(true)
    }
}
