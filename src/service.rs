//! High-level Drive operations.
//!
//! Every operation logs failures at error level and returns them. Callers
//! that only care about success can use `unwrap_or_default()`, which yields
//! an empty id or an empty list on error.

use std::path::Path;

use tracing::{error, info};

use crate::auth::{AuthConfig, Authenticator};
use crate::client::{DriveApi, HttpDriveClient, ListRequest};
use crate::error::{DriveError, Result};
use crate::models::{FileRecord, NewFile, Space};
use crate::query;

/// Folder, upload, search and listing operations over a [`DriveApi`].
pub struct DriveService<C> {
    api: C,
}

impl DriveService<HttpDriveClient> {
    /// Authenticate and build a service against the real Drive API.
    pub async fn connect(config: AuthConfig) -> Result<Self> {
        let credential = Authenticator::new(config).authenticate().await?;
        Ok(Self::new(HttpDriveClient::from_credential(&credential)?))
    }
}

impl<C: DriveApi> DriveService<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }

    /// Create a folder in the root of the drive and return its ID.
    pub async fn create_folder(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return logged(Err(DriveError::InvalidArgument(
                "folder name must not be empty".to_string(),
            )));
        }

        let file = logged(self.api.create_file(&NewFile::folder(name)).await)?;
        info!("Folder ID: \"{}\".", file.id);
        Ok(file.id)
    }

    /// Upload a local file into a folder and return the new file's ID.
    ///
    /// The remote name is the local file's base name.
    pub async fn upload_to_folder<P: AsRef<Path>>(
        &self,
        folder_id: &str,
        file_path: P,
    ) -> Result<String> {
        let file_path = file_path.as_ref();
        let Some(name) = file_path.file_name().and_then(|n| n.to_str()) else {
            return logged(Err(DriveError::FileNotFound(
                file_path.display().to_string(),
            )));
        };

        let metadata = NewFile::in_folder(name, folder_id);
        let file = logged(self.api.upload_file(&metadata, file_path).await)?;
        info!("File ID: \"{}\".", file.id);
        Ok(file.id)
    }

    /// List every folder in the drive.
    pub async fn list_folders(&self) -> Result<Vec<FileRecord>> {
        let folders = logged(self.list_all(query::folders()).await)?;
        if folders.is_empty() {
            info!("No folders found.");
        }
        Ok(folders)
    }

    /// List the records whose parents include `folder_id`.
    pub async fn list_folder_contents(&self, folder_id: &str) -> Result<Vec<FileRecord>> {
        let items = logged(self.list_all(query::in_parents(folder_id)).await)?;
        if items.is_empty() {
            info!("No files found in the folder.");
        } else {
            info!("Files in folder:");
            for item in &items {
                info!("{}", item);
            }
        }
        Ok(items)
    }

    /// Find every file with exactly this MIME type.
    pub async fn search_file(&self, mime_type: &str) -> Result<Vec<FileRecord>> {
        let files = logged(self.list_all(query::mime_type_is(mime_type)).await)?;
        for file in &files {
            info!("Found file: {}, {}", file.name, file.id);
        }
        Ok(files)
    }

    /// List the shared spaces the user can access.
    pub async fn list_spaces(&self) -> Result<Vec<Space>> {
        let spaces = logged(self.api.list_spaces().await)?.spaces;
        if spaces.is_empty() {
            info!("No spaces found.");
        } else {
            info!("Spaces:");
            for space in &spaces {
                info!("{}", space);
            }
        }
        Ok(spaces)
    }

    /// Run a files query, following page tokens until the last page.
    async fn list_all(&self, query: String) -> Result<Vec<FileRecord>> {
        let mut all_files = Vec::new();
        let mut request = ListRequest::new(query);

        loop {
            let page = self.api.list_files(&request).await?;
            let next = page.continuation().map(str::to_string);
            all_files.extend(page.files);

            match next {
                Some(token) if request.page_token.as_deref() == Some(token.as_str()) => {
                    return Err(DriveError::ApiError {
                        status: 200,
                        message: format!("page token {:?} returned twice", token),
                    });
                }
                Some(token) => request = request.with_page_token(Some(token)),
                None => break,
            }
        }

        Ok(all_files)
    }
}

fn logged<T>(result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        error!("An error occurred: {}", e);
    }
    result
}
