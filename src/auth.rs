//! User authentication for the Google Drive API.
//!
//! A persisted credential is reused while it is valid, refreshed when it has
//! expired, and replaced through the interactive browser flow when it is
//! missing or cannot be refreshed.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::credentials::{ClientSecrets, Credential};
use crate::error::{DriveError, Result};
use crate::oauth;

/// Full read/write access to the user's Drive.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Where the client secrets and the user token live, and what to ask for.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client configuration downloaded from the Cloud console.
    pub client_secrets_path: PathBuf,
    /// Persisted user credential; created on first authorization.
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_secrets_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            scopes: vec![DRIVE_SCOPE.to_string()],
        }
    }
}

/// Produces a usable user credential.
pub struct Authenticator {
    config: AuthConfig,
    http: Client,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// Load, refresh, or obtain a credential.
    ///
    /// The token file is written only after a refresh or a new authorization;
    /// a still-valid stored credential is returned untouched.
    pub async fn authenticate(&self) -> Result<Credential> {
        if self.config.token_path.exists() {
            let mut credential = Credential::load(&self.config.token_path)?;

            if credential.is_valid() {
                debug!("Using stored credential from {:?}", self.config.token_path);
                return Ok(credential);
            }

            if credential.can_refresh() {
                info!("Refreshing expired access token");
                let response = oauth::refresh(&self.http, &credential).await?;
                credential.apply(response);
                self.persist(&credential)?;
                return Ok(credential);
            }

            warn!("Stored credential has expired and has no refresh token, re-authorizing");
        }

        let secrets = ClientSecrets::from_file(&self.config.client_secrets_path).map_err(|e| {
            DriveError::AuthenticationError(format!(
                "cannot load client secrets from {:?}: {}",
                self.config.client_secrets_path, e
            ))
        })?;

        let credential =
            oauth::run_interactive_flow(&self.http, &secrets, &self.config.scopes).await?;
        self.persist(&credential)?;
        Ok(credential)
    }

    fn persist(&self, credential: &Credential) -> Result<()> {
        credential.save(&self.config.token_path)?;
        info!("Saved credential to {:?}", self.config.token_path);
        Ok(())
    }
}
