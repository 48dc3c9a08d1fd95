/// Configuration management for the sitetrack service
use crate::error::{SiteError, SiteResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub jobs: JobConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL prepended to locally served upload paths
    pub public_base_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database_path: PathBuf,
    pub uploads_directory: PathBuf,
    pub mode: StorageMode,
    pub s3: Option<S3Config>,
    pub drive: Option<DriveConfig>,
}

/// Which backends receive new uploads, and in what role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Local disk only
    Local,
    /// Cloud object store primary, local disk fallback
    Cloud,
    /// Cloud primary, local fallback, remote drive best-effort backup copy
    CloudBackup,
}

impl StorageMode {
    pub fn parse(value: &str) -> SiteResult<Self> {
        match value {
            "local" => Ok(StorageMode::Local),
            "cloud" => Ok(StorageMode::Cloud),
            "cloud+backup" => Ok(StorageMode::CloudBackup),
            other => Err(SiteError::Validation(format!(
                "Unknown storage mode: {} (expected local, cloud or cloud+backup)",
                other
            ))),
        }
    }
}

/// S3-compatible object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base URL objects are publicly readable under
    pub public_url: String,
    pub key_prefix: String,
}

/// Remote drive (Drive-v3-style REST) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub api_base: String,
    pub upload_base: String,
    pub api_token: String,
    /// Display name of the top-level folder all uploads nest under
    pub root_folder_name: String,
    pub request_timeout_secs: u64,
}

/// Upload handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Pre-compression request ceiling in bytes
    pub max_upload_bytes: usize,
    /// Post-compression target size in bytes
    pub compression_target_bytes: usize,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub resync_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> SiteResult<Self> {
        dotenv::dotenv().ok();

        let hostname =
            env::var("SITETRACK_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("SITETRACK_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .map_err(|_| SiteError::Validation("Invalid port number".to_string()))?;
        let public_base_url = env::var("SITETRACK_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("SITETRACK_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database_path = env::var("SITETRACK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("sitetrack.sqlite"));
        let uploads_directory = env::var("SITETRACK_UPLOADS_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("uploads"));

        let mode = StorageMode::parse(
            &env::var("SITETRACK_STORAGE_MODE").unwrap_or_else(|_| "local".to_string()),
        )?;

        let s3 = if let Ok(bucket) = env::var("SITETRACK_S3_BUCKET") {
            Some(S3Config {
                bucket,
                region: env::var("SITETRACK_S3_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: env::var("SITETRACK_S3_ENDPOINT").ok(),
                access_key_id: env::var("SITETRACK_S3_ACCESS_KEY_ID")
                    .map_err(|_| SiteError::Validation("S3 access key required".to_string()))?,
                secret_access_key: env::var("SITETRACK_S3_SECRET_ACCESS_KEY")
                    .map_err(|_| SiteError::Validation("S3 secret key required".to_string()))?,
                public_url: env::var("SITETRACK_S3_PUBLIC_URL")
                    .map_err(|_| SiteError::Validation("S3 public URL required".to_string()))?,
                key_prefix: env::var("SITETRACK_S3_KEY_PREFIX")
                    .unwrap_or_else(|_| "photos".to_string()),
            })
        } else {
            None
        };

        let drive = if let Ok(api_token) = env::var("SITETRACK_DRIVE_API_TOKEN") {
            Some(DriveConfig {
                api_base: env::var("SITETRACK_DRIVE_API_BASE")
                    .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string()),
                upload_base: env::var("SITETRACK_DRIVE_UPLOAD_BASE").unwrap_or_else(|_| {
                    "https://www.googleapis.com/upload/drive/v3".to_string()
                }),
                api_token,
                root_folder_name: env::var("SITETRACK_DRIVE_ROOT_FOLDER")
                    .unwrap_or_else(|_| "Site Photos".to_string()),
                request_timeout_secs: env::var("SITETRACK_DRIVE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            })
        } else {
            None
        };

        let max_upload_bytes = env::var("SITETRACK_MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10 * 1024 * 1024);
        let compression_target_bytes = env::var("SITETRACK_COMPRESSION_TARGET_BYTES")
            .unwrap_or_else(|_| "2097152".to_string())
            .parse()
            .unwrap_or(2 * 1024 * 1024);

        let resync_interval_secs = env::var("SITETRACK_RESYNC_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_base_url,
            },
            storage: StorageConfig {
                data_directory,
                database_path,
                uploads_directory,
                mode,
                s3,
                drive,
            },
            upload: UploadConfig {
                max_upload_bytes,
                compression_target_bytes,
            },
            jobs: JobConfig {
                resync_interval_secs,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> SiteResult<()> {
        if self.service.hostname.is_empty() {
            return Err(SiteError::Validation("Hostname cannot be empty".to_string()));
        }

        match self.storage.mode {
            StorageMode::Local => {}
            StorageMode::Cloud => {
                if self.storage.s3.is_none() {
                    return Err(SiteError::Validation(
                        "Storage mode 'cloud' requires S3 configuration".to_string(),
                    ));
                }
            }
            StorageMode::CloudBackup => {
                if self.storage.s3.is_none() {
                    return Err(SiteError::Validation(
                        "Storage mode 'cloud+backup' requires S3 configuration".to_string(),
                    ));
                }
                if self.storage.drive.is_none() {
                    return Err(SiteError::Validation(
                        "Storage mode 'cloud+backup' requires drive configuration".to_string(),
                    ));
                }
            }
        }

        if self.upload.compression_target_bytes > self.upload.max_upload_bytes {
            return Err(SiteError::Validation(
                "Compression target cannot exceed the upload ceiling".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(mode: StorageMode) -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 3001,
                public_base_url: "http://127.0.0.1:3001".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database_path: "./data/sitetrack.sqlite".into(),
                uploads_directory: "./data/uploads".into(),
                mode,
                s3: None,
                drive: None,
            },
            upload: UploadConfig {
                max_upload_bytes: 10 * 1024 * 1024,
                compression_target_bytes: 2 * 1024 * 1024,
            },
            jobs: JobConfig {
                resync_interval_secs: 300,
            },
        }
    }

    #[test]
    fn test_parse_storage_mode() {
        assert_eq!(StorageMode::parse("local").unwrap(), StorageMode::Local);
        assert_eq!(StorageMode::parse("cloud").unwrap(), StorageMode::Cloud);
        assert_eq!(
            StorageMode::parse("cloud+backup").unwrap(),
            StorageMode::CloudBackup
        );
        assert!(StorageMode::parse("gdrive").is_err());
    }

    #[test]
    fn test_validate_local_mode_needs_no_credentials() {
        assert!(base_config(StorageMode::Local).validate().is_ok());
    }

    #[test]
    fn test_validate_cloud_mode_requires_s3() {
        let config = base_config(StorageMode::Cloud);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_target_above_ceiling() {
        let mut config = base_config(StorageMode::Local);
        config.upload.compression_target_bytes = config.upload.max_upload_bytes + 1;
        assert!(config.validate().is_err());
    }
}
