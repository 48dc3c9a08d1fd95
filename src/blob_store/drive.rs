/// Remote drive blob backend
///
/// Talks to a Google-Drive-v3-compatible REST API. Folders are looked up by
/// exact name within their parent before being created, and the lookup runs
/// again on every retry so a folder created by a concurrent upload is found
/// rather than duplicated. Transient failures (429, 5xx, connect/timeout)
/// are retried with bounded backoff.
use crate::{
    blob_store::{
        retry::{with_backoff, Attempt, BackoffPolicy},
        BlobBackend, BlobWrite, ContainerHandle,
    },
    config::DriveConfig,
    error::{SiteError, SiteResult},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const MULTIPART_BOUNDARY: &str = "sitetrack_upload_boundary";

#[derive(Clone)]
pub struct DriveBackend {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    api_token: String,
    root_folder_name: String,
    backoff: BackoffPolicy,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

impl DriveBackend {
    pub fn new(config: &DriveConfig) -> SiteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SiteError::Internal(format!("Drive client build failed: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            root_folder_name: config.root_folder_name.clone(),
            backoff: BackoffPolicy::default(),
        })
    }

    fn transient_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn classify_send_error(e: reqwest::Error) -> Attempt<reqwest::Response, SiteError> {
        if e.is_timeout() || e.is_connect() {
            Attempt::Again(SiteError::BlobStorage(format!("Drive request failed: {}", e)))
        } else {
            Attempt::Done(Err(SiteError::BlobStorage(format!(
                "Drive request failed: {}",
                e
            ))))
        }
    }

    /// Find a folder by exact name within `parent_id`, if it exists
    async fn find_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<String>, (SiteError, bool)> {
        let query = folder_query(name, parent_id);
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.api_token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("spaces", "drive"),
            ])
            .send()
            .await
            .map_err(|e| {
                let transient = e.is_timeout() || e.is_connect();
                (
                    SiteError::BlobStorage(format!("Drive folder lookup failed: {}", e)),
                    transient,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err((
                SiteError::BlobStorage(format!("Drive folder lookup failed: HTTP {}", status)),
                Self::transient_status(status),
            ));
        }

        let list: FileList = response.json().await.map_err(|e| {
            (
                SiteError::BlobStorage(format!("Drive folder lookup body invalid: {}", e)),
                false,
            )
        })?;

        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    /// Find or create one folder level, retrying transient failures.
    /// The lookup runs on every attempt so concurrent creations are found.
    async fn ensure_folder(&self, name: &str, parent_id: Option<&str>) -> SiteResult<String> {
        with_backoff("drive.ensure_folder", self.backoff, || async move {
            match self.find_folder(name, parent_id).await {
                Ok(Some(id)) => return Attempt::Done(Ok(id)),
                Ok(None) => {}
                Err((e, true)) => return Attempt::Again(e),
                Err((e, false)) => return Attempt::Done(Err(e)),
            }

            let mut body = serde_json::json!({
                "name": name,
                "mimeType": FOLDER_MIME,
            });
            if let Some(parent) = parent_id {
                body["parents"] = serde_json::json!([parent]);
            }

            let response = match self
                .http
                .post(format!("{}/files", self.api_base))
                .bearer_auth(&self.api_token)
                .query(&[("fields", "id")])
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => return Self::classify_send_error(e).map_response(),
            };

            let status = response.status();
            if !status.is_success() {
                let err =
                    SiteError::BlobStorage(format!("Drive folder create failed: HTTP {}", status));
                return if Self::transient_status(status) {
                    Attempt::Again(err)
                } else {
                    Attempt::Done(Err(err))
                };
            }

            match response.json::<DriveFile>().await {
                Ok(file) => {
                    debug!("Created drive folder {} ({})", name, file.id);
                    Attempt::Done(Ok(file.id))
                }
                Err(e) => Attempt::Done(Err(SiteError::BlobStorage(format!(
                    "Drive folder create body invalid: {}",
                    e
                )))),
            }
        })
        .await
    }

    /// Make the uploaded file readable by anyone with the link
    async fn share_publicly(&self, file_id: &str) -> SiteResult<()> {
        with_backoff("drive.share", self.backoff, || async move {
            let response = match self
                .http
                .post(format!("{}/files/{}/permissions", self.api_base, file_id))
                .bearer_auth(&self.api_token)
                .json(&serde_json::json!({"role": "reader", "type": "anyone"}))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => return Self::classify_send_error(e).map_unit(),
            };

            let status = response.status();
            if status.is_success() {
                Attempt::Done(Ok(()))
            } else {
                let err =
                    SiteError::BlobStorage(format!("Drive permission set failed: HTTP {}", status));
                if Self::transient_status(status) {
                    Attempt::Again(err)
                } else {
                    Attempt::Done(Err(err))
                }
            }
        })
        .await
    }
}

impl Attempt<reqwest::Response, SiteError> {
    fn map_response<T>(self) -> Attempt<T, SiteError> {
        match self {
            Attempt::Again(e) => Attempt::Again(e),
            Attempt::Done(Err(e)) => Attempt::Done(Err(e)),
            Attempt::Done(Ok(_)) => unreachable!("classify_send_error never returns Ok"),
        }
    }

    fn map_unit(self) -> Attempt<(), SiteError> {
        self.map_response()
    }
}

#[async_trait]
impl BlobBackend for DriveBackend {
    fn name(&self) -> &'static str {
        "drive"
    }

    /// Materialize the folder hierarchy root -> segments, level by level
    async fn ensure_container(&self, segments: &[String]) -> SiteResult<ContainerHandle> {
        let mut parent = self.ensure_folder(&self.root_folder_name, None).await?;
        for segment in segments {
            parent = self.ensure_folder(segment, Some(&parent)).await?;
        }
        Ok(ContainerHandle(parent))
    }

    async fn write(
        &self,
        container: &ContainerHandle,
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> SiteResult<BlobWrite> {
        let size_bytes = bytes.len();
        let body = build_multipart_body(file_name, container.as_str(), bytes, mime_type);

        let file: DriveFile = with_backoff("drive.upload", self.backoff, || {
            let body = body.clone();
            async move {
                let response = match self
                    .http
                    .post(format!("{}/files", self.upload_base))
                    .bearer_auth(&self.api_token)
                    .query(&[
                        ("uploadType", "multipart"),
                        ("fields", "id,webViewLink"),
                    ])
                    .header(
                        "Content-Type",
                        format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
                    )
                    .body(body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => return Self::classify_send_error(e).map_response(),
                };

                let status = response.status();
                if !status.is_success() {
                    let err =
                        SiteError::BlobStorage(format!("Drive upload failed: HTTP {}", status));
                    return if Self::transient_status(status) {
                        Attempt::Again(err)
                    } else {
                        Attempt::Done(Err(err))
                    };
                }

                match response.json::<DriveFile>().await {
                    Ok(file) => Attempt::Done(Ok(file)),
                    Err(e) => Attempt::Done(Err(SiteError::BlobStorage(format!(
                        "Drive upload body invalid: {}",
                        e
                    )))),
                }
            }
        })
        .await?;

        self.share_publicly(&file.id).await?;

        let reference_url = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));

        debug!("Uploaded {} to drive ({})", file_name, file.id);

        Ok(BlobWrite {
            reference_url,
            backend_file_id: Some(file.id),
            local_path: None,
            size_bytes,
        })
    }

    async fn delete(&self, backend_file_id: &str) -> SiteResult<bool> {
        with_backoff("drive.delete", self.backoff, || async move {
            let response = match self
                .http
                .delete(format!("{}/files/{}", self.api_base, backend_file_id))
                .bearer_auth(&self.api_token)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => return Self::classify_send_error(e).map_response(),
            };

            let status = response.status();
            if status.is_success() {
                Attempt::Done(Ok(true))
            } else if status == StatusCode::NOT_FOUND {
                Attempt::Done(Ok(false))
            } else if Self::transient_status(status) {
                Attempt::Again(SiteError::BlobStorage(format!(
                    "Drive delete failed: HTTP {}",
                    status
                )))
            } else {
                Attempt::Done(Err(SiteError::BlobStorage(format!(
                    "Drive delete failed: HTTP {}",
                    status
                ))))
            }
        })
        .await
    }
}

/// Build the files.list query matching one folder by exact name in a parent
fn folder_query(name: &str, parent_id: Option<&str>) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    match parent_id {
        Some(parent) => format!(
            "name='{}' and '{}' in parents and mimeType='{}' and trashed=false",
            escaped, parent, FOLDER_MIME
        ),
        None => format!(
            "name='{}' and mimeType='{}' and trashed=false",
            escaped, FOLDER_MIME
        ),
    }
}

/// Assemble a multipart/related upload body: JSON metadata part + media part
fn build_multipart_body(
    file_name: &str,
    parent_id: &str,
    bytes: &[u8],
    mime_type: &str,
) -> Vec<u8> {
    let metadata = serde_json::json!({
        "name": file_name,
        "parents": [parent_id],
    });

    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            meta = metadata,
            mime = mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--", MULTIPART_BOUNDARY).as_bytes());
    body
}
