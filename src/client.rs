//! Google Drive API client.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::credentials::Credential;
use crate::error::{DriveError, Result};
use crate::models::{FileListResponse, FileRecord, NewFile, SpaceListResponse};

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Resumable upload chunk size. Must be a multiple of 256 KiB.
const UPLOAD_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, parents)";

const SPACE_FIELDS: &str = "drives(id, name)";

/// Consecutive 308 responses without progress before an upload is abandoned.
const MAX_STALLED_CHUNKS: u32 = 3;

/// A single files.list page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Query in Drive search syntax, see [`crate::query`].
    pub query: String,
    pub page_token: Option<String>,
}

impl ListRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page_token: None,
        }
    }

    pub fn with_page_token(mut self, page_token: Option<String>) -> Self {
        self.page_token = page_token;
        self
    }
}

/// The remote files and spaces operations the service is built on.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Create a metadata-only record (e.g. a folder).
    async fn create_file(&self, metadata: &NewFile) -> Result<FileRecord>;

    /// Create a record whose content is read from a local file.
    async fn upload_file(&self, metadata: &NewFile, local_path: &Path) -> Result<FileRecord>;

    /// Fetch one page of files matching the request's query.
    async fn list_files(&self, request: &ListRequest) -> Result<FileListResponse>;

    /// List the shared spaces the user can access.
    async fn list_spaces(&self) -> Result<SpaceListResponse>;
}

/// `DriveApi` over HTTPS with a bearer token.
pub struct HttpDriveClient {
    access_token: String,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl HttpDriveClient {
    /// Create a client against the production endpoints.
    pub fn new(access_token: String) -> Self {
        Self::with_base_urls(access_token, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a client from an authenticated credential.
    pub fn from_credential(credential: &Credential) -> Result<Self> {
        let token = credential.access_token().ok_or_else(|| {
            DriveError::AuthenticationError("credential has no access token".to_string())
        })?;
        Ok(Self::new(token.to_string()))
    }

    /// Create a client against custom endpoints.
    pub fn with_base_urls(
        access_token: String,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            access_token,
            http: Client::new(),
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// Start a resumable upload session and return its URI.
    async fn start_upload_session(
        &self,
        metadata: &NewFile,
        mime_type: &str,
        file_size: u64,
    ) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(metadata)
            .send()
            .await?;

        let response = check_status(response).await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::ApiError {
                status: response.status().as_u16(),
                message: "No upload URL in response".to_string(),
            })
    }
}

#[async_trait]
impl DriveApi for HttpDriveClient {
    async fn create_file(&self, metadata: &NewFile) -> Result<FileRecord> {
        debug!("Creating {:?}", metadata.name);

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id")])
            .json(metadata)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn upload_file(&self, metadata: &NewFile, local_path: &Path) -> Result<FileRecord> {
        let file_size = tokio::fs::metadata(local_path)
            .await
            .map_err(|_| DriveError::FileNotFound(local_path.display().to_string()))?
            .len();
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let session = self
            .start_upload_session(metadata, &mime_type, file_size)
            .await?;
        debug!("Upload session started for {:?} ({} bytes)", local_path, file_size);

        let mut file = File::open(local_path).await?;
        let mut offset = 0u64;
        let mut stalled = 0u32;

        loop {
            let chunk_len = UPLOAD_CHUNK_SIZE.min(file_size - offset);
            let mut chunk = vec![0u8; chunk_len as usize];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk).await?;

            let content_range = if file_size == 0 {
                "bytes */0".to_string()
            } else {
                format!("bytes {}-{}/{}", offset, offset + chunk_len - 1, file_size)
            };

            let response = self
                .http
                .put(&session)
                .header(CONTENT_TYPE, &mime_type)
                .header(CONTENT_RANGE, content_range)
                .body(chunk)
                .send()
                .await?;

            match response.status().as_u16() {
                200 | 201 => return Ok(response.json().await?),
                308 => {
                    // The server reports what it has persisted as `Range: bytes=0-N`.
                    let persisted = response
                        .headers()
                        .get(RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.rsplit('-').next())
                        .and_then(|end| end.parse::<u64>().ok())
                        .map(|end| end + 1)
                        .unwrap_or(0);
                    debug!("Uploaded {}/{} bytes", persisted, file_size);

                    if persisted > offset {
                        stalled = 0;
                    } else {
                        stalled += 1;
                        if stalled >= MAX_STALLED_CHUNKS {
                            return Err(DriveError::ApiError {
                                status: 308,
                                message: format!(
                                    "upload made no progress after {} attempts at byte {}",
                                    stalled, persisted
                                ),
                            });
                        }
                    }
                    offset = persisted;

                    if offset >= file_size {
                        return Err(DriveError::ApiError {
                            status: 308,
                            message: "upload incomplete after sending all bytes".to_string(),
                        });
                    }
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(DriveError::from_api_body(status, body));
                }
            }
        }
    }

    async fn list_files(&self, request: &ListRequest) -> Result<FileListResponse> {
        let mut builder = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", request.query.as_str()),
                ("spaces", "drive"),
                ("fields", LIST_FIELDS),
            ]);

        if let Some(ref token) = request.page_token {
            builder = builder.query(&[("pageToken", token)]);
        }

        let response = check_status(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_spaces(&self) -> Result<SpaceListResponse> {
        let response = self
            .http
            .get(format!("{}/drives", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("fields", SPACE_FIELDS)])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

/// Pass successful responses through; turn anything else into `ApiError`.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DriveError::from_api_body(status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    // Tests are in tests/client_test.rs
}
