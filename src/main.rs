//! drive_service CLI - Work with folders and files in Google Drive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use drive_service::{AuthConfig, DriveService};

/// CLI tool for working with Google Drive.
#[derive(Parser)]
#[command(name = "drive_service")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the OAuth client secrets downloaded from the Cloud console.
    #[arg(long, env = "DRIVE_CLIENT_SECRETS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Path where the authorized user token is stored.
    #[arg(long, env = "DRIVE_TOKEN_FILE", default_value = "token.json")]
    token: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all folders (the default).
    Folders,

    /// Create a folder in the root of the drive.
    CreateFolder {
        /// Folder name.
        name: String,
    },

    /// Upload a file into a folder.
    Upload {
        /// Local file to upload.
        file: PathBuf,

        /// Destination folder ID.
        #[arg(long, short = 't')]
        to: String,
    },

    /// List the contents of a folder.
    Contents {
        /// Folder ID.
        folder_id: String,
    },

    /// Find files by MIME type (e.g. image/jpeg).
    Search {
        mime_type: String,
    },

    /// List shared spaces.
    Spaces,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = AuthConfig {
        client_secrets_path: cli.credentials,
        token_path: cli.token,
        ..AuthConfig::default()
    };

    let service = DriveService::connect(config)
        .await
        .context("Failed to authenticate with Google Drive")?;

    // Operation failures are already logged by the service; like an empty
    // result they end the command without a non-zero exit.
    match cli.command.unwrap_or(Commands::Folders) {
        Commands::Folders => {
            for folder in service.list_folders().await.unwrap_or_default() {
                info!("{}", folder);
            }
        }

        Commands::CreateFolder { name } => {
            service.create_folder(&name).await.unwrap_or_default();
        }

        Commands::Upload { file, to } => {
            service.upload_to_folder(&to, &file).await.unwrap_or_default();
        }

        Commands::Contents { folder_id } => {
            service
                .list_folder_contents(&folder_id)
                .await
                .unwrap_or_default();
        }

        Commands::Search { mime_type } => {
            let files = service.search_file(&mime_type).await.unwrap_or_default();
            info!("{} file(s) found", files.len());
        }

        Commands::Spaces => {
            service.list_spaces().await.unwrap_or_default();
        }
    }

    Ok(())
}
