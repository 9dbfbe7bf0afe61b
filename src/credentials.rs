//! On-disk credential formats: the OAuth client configuration downloaded from
//! the Google Cloud console (`credentials.json`) and the persisted user token
//! (`token.json`).

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};
use crate::models::TokenResponse;

/// Google OAuth2 authorization endpoint.
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth client configuration for an installed (desktop) application.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// `credentials.json` wraps the client in an `installed` or `web` object.
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read client secrets from a `credentials.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse client secrets from the console's JSON format.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)?;
        file.installed.or(file.web).ok_or_else(|| {
            DriveError::AuthenticationError(
                "client secrets contain neither an \"installed\" nor a \"web\" client".to_string(),
            )
        })
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// An authorized-user credential, stored in Google's `token.json` shape.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential from a token endpoint response.
    pub fn from_token_response(
        secrets: &ClientSecrets,
        scopes: &[String],
        response: TokenResponse,
    ) -> Self {
        let mut credential = Self {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: scopes.to_vec(),
            expiry: None,
        };
        credential.apply(response);
        credential
    }

    /// Load a credential from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the credential to disk, replacing whatever was there.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// The bearer token, if one has been issued.
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether the access token has passed (or is about to pass) its expiry.
    ///
    /// A credential without a recorded expiry never expires.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// Usable as-is: has an access token that has not expired.
    pub fn is_valid(&self) -> bool {
        self.token.is_some() && !self.is_expired()
    }

    /// Whether a refresh grant can be attempted.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Merge a token endpoint response into this credential.
    ///
    /// The refresh token and scopes are only replaced when the response
    /// carries new ones.
    pub fn apply(&mut self, response: TokenResponse) {
        self.token = Some(response.access_token);
        self.expiry = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs as i64));
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = response.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}
