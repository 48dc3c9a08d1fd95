/// Application context and dependency injection
use crate::{
    blob_store::{disk::DiskBackend, drive::DriveBackend, s3::S3Backend, StoragePolicy},
    compress::CompressionConstraints,
    config::{ServerConfig, StorageMode},
    db,
    error::{SiteError, SiteResult},
    photos::{PhotoService, PhotoStore},
    tasks::TaskStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub tasks: TaskStore,
    pub photos: Arc<PhotoService>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> SiteResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database_path, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&pool).await?;

        let policy = Self::build_storage_policy(&config).await?;
        info!(
            "Storage mode {:?}, primary backend: {}",
            config.storage.mode,
            policy.primary_name()
        );

        let tasks = TaskStore::new(pool.clone());
        let constraints = CompressionConstraints {
            max_size_bytes: config.upload.compression_target_bytes,
            ..Default::default()
        };
        let photos = Arc::new(PhotoService::new(
            PhotoStore::new(pool.clone()),
            tasks.clone(),
            Arc::new(policy),
            constraints,
            config.upload.max_upload_bytes,
            config.storage.uploads_directory.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            tasks,
            photos,
        })
    }

    async fn ensure_directories(config: &ServerConfig) -> SiteResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        tokio::fs::create_dir_all(&config.storage.uploads_directory).await?;
        Ok(())
    }

    /// Wire up backends for the configured mode. The disk backend always
    /// exists: alone in local mode, as the fallback otherwise.
    async fn build_storage_policy(config: &ServerConfig) -> SiteResult<StoragePolicy> {
        let disk = Arc::new(DiskBackend::new(
            config.storage.uploads_directory.clone(),
            config.service.public_base_url.clone(),
        ));

        match config.storage.mode {
            StorageMode::Local => Ok(StoragePolicy::new(disk)),
            StorageMode::Cloud => {
                let s3 = Self::s3_backend(config).await?;
                Ok(StoragePolicy::new(s3).with_fallback(disk))
            }
            StorageMode::CloudBackup => {
                let s3 = Self::s3_backend(config).await?;
                let drive_config = config.storage.drive.as_ref().ok_or_else(|| {
                    SiteError::Internal("Drive configuration missing".to_string())
                })?;
                let drive = Arc::new(DriveBackend::new(drive_config)?);
                Ok(StoragePolicy::new(s3)
                    .with_fallback(disk)
                    .with_backup(drive))
            }
        }
    }

    async fn s3_backend(config: &ServerConfig) -> SiteResult<Arc<S3Backend>> {
        let s3_config = config
            .storage
            .s3
            .as_ref()
            .ok_or_else(|| SiteError::Internal("S3 configuration missing".to_string()))?;
        Ok(Arc::new(S3Backend::new(s3_config).await?))
    }
}
