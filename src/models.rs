//! Data models for Google Drive API requests and responses.

use serde::{Deserialize, Serialize};

/// MIME type Google Drive uses to mark a record as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder as returned by the Drive API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl FileRecord {
    /// Whether this record is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

impl std::fmt::Display for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Metadata body of a files.create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl NewFile {
    /// Folder metadata with no parent, so it lands in the root.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: Vec::new(),
        }
    }

    /// File metadata parented under a single folder.
    pub fn in_folder(name: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            parents: vec![folder_id.into()],
        }
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl FileListResponse {
    /// The continuation token, treating an empty string as "no more pages".
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// A shared space (Shared Drive) the user can access.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Response from the drives.list API endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceListResponse {
    #[serde(default, rename = "drives")]
    pub spaces: Vec<Space>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "Reports",
            "mimeType": "application/vnd.google-apps.folder",
            "parents": ["root0"]
        }"#;

        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abc123");
        assert_eq!(record.name, "Reports");
        assert!(record.is_folder());
        assert_eq!(record.parents, vec!["root0".to_string()]);
    }

    #[test]
    fn test_file_record_id_only() {
        let record: FileRecord = serde_json::from_str(r#"{"id": "xyz"}"#).unwrap();
        assert_eq!(record.id, "xyz");
        assert!(record.name.is_empty());
        assert!(!record.is_folder());
        assert!(record.parents.is_empty());
    }

    #[test]
    fn test_new_folder_has_no_parents_field() {
        let json = serde_json::to_value(NewFile::folder("test_folder")).unwrap();
        assert_eq!(json["name"], "test_folder");
        assert_eq!(json["mimeType"], FOLDER_MIME_TYPE);
        assert!(json.get("parents").is_none());
    }

    #[test]
    fn test_new_file_in_folder() {
        let json = serde_json::to_value(NewFile::in_folder("a.txt", "folder1")).unwrap();
        assert_eq!(json["parents"], serde_json::json!(["folder1"]));
        assert!(json.get("mimeType").is_none());
    }

    #[test]
    fn test_empty_page_token_is_not_a_continuation() {
        let response: FileListResponse =
            serde_json::from_str(r#"{"files": [], "nextPageToken": ""}"#).unwrap();
        assert_eq!(response.continuation(), None);
    }

    #[test]
    fn test_space_list_reads_drives_key() {
        let response: SpaceListResponse =
            serde_json::from_str(r#"{"drives": [{"id": "d1", "name": "Team"}]}"#).unwrap();
        assert_eq!(response.spaces.len(), 1);
        assert_eq!(format!("{}", response.spaces[0]), "Team (d1)");
    }
}
