//! OAuth 2.0 installed-application flow with PKCE.
//!
//! The user is sent to Google's consent page with a redirect back to a
//! listener bound on an ephemeral loopback port. The single callback request
//! carries the authorization code, which is exchanged for tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use url::Url;

use crate::credentials::{ClientSecrets, Credential};
use crate::error::{DriveError, Result};
use crate::models::TokenResponse;

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
<p>You may close this window.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>\
<p>Return to the terminal for details.</p></body></html>";

/// How long a callback connection may take to send its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// PKCE code verifier plus the CSRF `state` value for one authorization.
#[derive(Debug, Clone)]
pub struct Pkce {
    verifier: String,
    state: String,
}

impl Pkce {
    /// Generate a fresh random verifier and state.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);

        Self {
            verifier: URL_SAFE_NO_PAD.encode(verifier_bytes),
            state: URL_SAFE_NO_PAD.encode(state_bytes),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: BASE64URL(SHA256(verifier)).
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for Pkce {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the URL the user visits to grant access.
pub fn authorization_url(
    secrets: &ClientSecrets,
    scopes: &[String],
    redirect_uri: &str,
    pkce: &Pkce,
) -> Result<Url> {
    let mut url = Url::parse(&secrets.auth_uri)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", pkce.state())
        .append_pair("code_challenge", &pkce.challenge())
        .append_pair("code_challenge_method", "S256")
        .append_pair("access_type", "offline");
    Ok(url)
}

/// Loopback listener that receives the authorization redirect.
pub struct CallbackListener {
    listener: TcpListener,
    redirect_uri: String,
    read_timeout: Duration,
}

impl CallbackListener {
    /// Bind to an OS-assigned port on 127.0.0.1.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            redirect_uri: format!("http://localhost:{}/", port),
            read_timeout: REQUEST_READ_TIMEOUT,
        })
    }

    /// Override how long a single connection may stay silent.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the redirect and return the authorization code.
    ///
    /// Requests without `code` or `error` (a browser asking for a favicon,
    /// say) are answered with 404 and ignored. So are connections that close,
    /// stall past the read timeout, or send something unparseable.
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!("Callback connection from {}", peer);

            let target = match timeout(self.read_timeout, read_request_target(&mut stream)).await {
                Ok(Ok(target)) => target,
                Ok(Err(e)) => {
                    debug!("Ignoring callback connection from {}: {}", peer, e);
                    continue;
                }
                Err(_) => {
                    debug!("Callback connection from {} timed out", peer);
                    continue;
                }
            };
            let url = match Url::parse(&format!("http://localhost{}", target)) {
                Ok(url) => url,
                Err(e) => {
                    debug!("Ignoring callback request {:?}: {}", target, e);
                    continue;
                }
            };
            let param = |key: &str| {
                url.query_pairs()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.into_owned())
            };

            if let Some(error) = param("error") {
                respond(&mut stream, "200 OK", FAILURE_PAGE).await?;
                return Err(DriveError::AuthorizationDenied(error));
            }

            let Some(code) = param("code") else {
                if let Err(e) = respond(&mut stream, "404 Not Found", "").await {
                    debug!("Failed to answer {}: {}", peer, e);
                }
                continue;
            };

            if param("state").as_deref() != Some(expected_state) {
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await?;
                return Err(DriveError::AuthenticationError(
                    "state mismatch in authorization callback".to_string(),
                ));
            }

            if let Err(e) = respond(&mut stream, "200 OK", SUCCESS_PAGE).await {
                warn!("Could not send the confirmation page: {}", e);
            }
            return Ok(code);
        }
    }
}

/// Read the request line and headers, returning the request target.
async fn read_request_target(stream: &mut TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    loop {
        let mut header = String::new();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    request_line
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
        .ok_or_else(|| {
            DriveError::AuthenticationError(format!(
                "malformed callback request: {:?}",
                request_line.trim_end()
            ))
        })
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    http: &Client,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
    pkce: &Pkce,
) -> Result<TokenResponse> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
        ("code_verifier", pkce.verifier()),
    ];

    let response = http.post(&secrets.token_uri).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::AuthenticationError(format!(
            "code exchange failed with status {}: {}",
            status, body
        )));
    }

    Ok(response.json().await?)
}

/// Obtain a new access token with the credential's refresh token.
pub async fn refresh(http: &Client, credential: &Credential) -> Result<TokenResponse> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or_else(|| DriveError::TokenRefreshError("no refresh token".to_string()))?;

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", credential.client_id.as_str()),
        ("client_secret", credential.client_secret.as_str()),
    ];

    let response = http
        .post(&credential.token_uri)
        .form(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    Ok(response.json().await?)
}

/// Run the full interactive flow and return a fresh credential.
pub async fn run_interactive_flow(
    http: &Client,
    secrets: &ClientSecrets,
    scopes: &[String],
) -> Result<Credential> {
    let listener = CallbackListener::bind().await?;
    let redirect_uri = listener.redirect_uri().to_string();
    let pkce = Pkce::new();
    let url = authorization_url(secrets, scopes, &redirect_uri, &pkce)?;

    println!("Please visit this URL to authorize this application:\n{}", url);
    if let Err(e) = open::that(url.as_str()) {
        warn!("Could not open a browser: {}", e);
    }

    let code = listener.wait_for_code(pkce.state()).await?;
    info!("Authorization code received, exchanging for tokens");

    let response = exchange_code(http, secrets, &code, &redirect_uri, &pkce).await?;
    Ok(Credential::from_token_response(secrets, scopes, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "test_id".to_string(),
            client_secret: "test_secret".to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }

    async fn send(redirect_uri: &str, path_and_query: &str) -> String {
        let addr = redirect_uri
            .trim_start_matches("http://localhost:")
            .trim_end_matches('/');
        let mut stream = TcpStream::connect(format!("127.0.0.1:{}", addr))
            .await
            .unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n",
            path_and_query
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut status = String::new();
        reader.read_line(&mut status).await.unwrap();
        status
    }

    #[test]
    fn test_pkce_challenge_is_deterministic() {
        let pkce = Pkce::new();
        assert_eq!(pkce.challenge(), pkce.challenge());
        assert_ne!(pkce.challenge(), pkce.verifier());
        assert!(pkce.verifier().len() >= 43);
    }

    #[test]
    fn test_authorization_url() {
        let pkce = Pkce::new();
        let scopes = vec!["https://www.googleapis.com/auth/drive".to_string()];
        let url = authorization_url(&secrets(), &scopes, "http://localhost:5000/", &pkce).unwrap();
        let rendered = url.to_string();

        assert!(rendered.starts_with(DEFAULT_AUTH_URI));
        assert!(rendered.contains("client_id=test_id"));
        assert!(rendered.contains("access_type=offline"));
        assert!(rendered.contains("code_challenge_method=S256"));
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "state" && v == pkce.state()));
    }

    #[tokio::test]
    async fn test_callback_returns_code() {
        let listener = CallbackListener::bind().await.unwrap();
        let redirect_uri = listener.redirect_uri().to_string();

        let server = tokio::spawn(async move { listener.wait_for_code("xyz").await });

        let status = send(&redirect_uri, "/favicon.ico").await;
        assert!(status.contains("404"));

        let status = send(&redirect_uri, "/?state=xyz&code=4%2Fabc&scope=drive").await;
        assert!(status.contains("200"));

        let code = server.await.unwrap().unwrap();
        assert_eq!(code, "4/abc");
    }

    #[tokio::test]
    async fn test_callback_survives_empty_connection() {
        let listener = CallbackListener::bind().await.unwrap();
        let redirect_uri = listener.redirect_uri().to_string();
        let port = redirect_uri
            .trim_start_matches("http://localhost:")
            .trim_end_matches('/')
            .to_string();

        let server = tokio::spawn(async move { listener.wait_for_code("xyz").await });

        // A browser may open a spare connection and close it unused.
        drop(TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap());

        let status = send(&redirect_uri, "/?state=xyz&code=real").await;
        assert!(status.contains("200"));
        assert_eq!(server.await.unwrap().unwrap(), "real");
    }

    #[tokio::test]
    async fn test_callback_skips_silent_connection() {
        let listener = CallbackListener::bind()
            .await
            .unwrap()
            .with_read_timeout(Duration::from_millis(100));
        let redirect_uri = listener.redirect_uri().to_string();
        let port = redirect_uri
            .trim_start_matches("http://localhost:")
            .trim_end_matches('/')
            .to_string();

        let server = tokio::spawn(async move { listener.wait_for_code("xyz").await });

        let _idle = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();

        let status = send(&redirect_uri, "/?state=xyz&code=late").await;
        assert!(status.contains("200"));
        assert_eq!(server.await.unwrap().unwrap(), "late");
    }

    #[tokio::test]
    async fn test_callback_denied() {
        let listener = CallbackListener::bind().await.unwrap();
        let redirect_uri = listener.redirect_uri().to_string();

        let server = tokio::spawn(async move { listener.wait_for_code("xyz").await });
        send(&redirect_uri, "/?error=access_denied&state=xyz").await;

        let result = server.await.unwrap();
        assert!(matches!(result, Err(DriveError::AuthorizationDenied(e)) if e == "access_denied"));
    }

    #[tokio::test]
    async fn test_callback_state_mismatch() {
        let listener = CallbackListener::bind().await.unwrap();
        let redirect_uri = listener.redirect_uri().to_string();

        let server = tokio::spawn(async move { listener.wait_for_code("expected").await });
        send(&redirect_uri, "/?state=forged&code=abc").await;

        assert!(matches!(
            server.await.unwrap(),
            Err(DriveError::AuthenticationError(_))
        ));
    }
}
