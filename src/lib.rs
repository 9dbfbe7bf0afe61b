//! drive_service - A small wrapper around the Google Drive API.
//!
//! This library provides functionality to:
//! - Authenticate a user with the installed-app OAuth flow, persisting the token
//! - Create folders and upload files into them
//! - List folders, folder contents and shared spaces
//! - Search files by MIME type
//!
//! # Example
//!
//! ```no_run
//! use drive_service::{AuthConfig, DriveService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = DriveService::connect(AuthConfig::default()).await?;
//!
//!     for folder in service.list_folders().await? {
//!         println!("{}", folder);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
pub mod oauth;
pub mod query;
pub mod service;

// Re-exports for convenience
pub use auth::{AuthConfig, Authenticator};
pub use client::{DriveApi, HttpDriveClient, ListRequest};
pub use credentials::{ClientSecrets, Credential};
pub use error::{DriveError, Result};
pub use models::{FileRecord, NewFile, Space};
pub use service::DriveService;
