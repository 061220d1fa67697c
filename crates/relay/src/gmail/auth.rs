//! Gmail OAuth2 authentication
//!
//! Installed-app authorization code flow with a cached, refreshable grant.
//! The browser redirect lands on a one-shot local listener.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Token cache filename in the config directory
const TOKEN_FILE: &str = "gmail-tokens.json";

/// Seconds before expiry at which a cached token is considered stale
const EXPIRY_MARGIN_SECS: i64 = 300;

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

/// Token cache contents
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Insert messages and list labels; nothing is read or modified
    const SCOPES: &'static [&'static str] = &[
        "https://www.googleapis.com/auth/gmail.insert",
        "https://www.googleapis.com/auth/gmail.labels",
    ];

    /// Ports tried for the local OAuth callback server
    const CALLBACK_PORTS: RangeInclusive<u16> = 8080..=8090;

    /// Create a new GmailAuth instance caching tokens in the config directory
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path =
            config::config_path(TOKEN_FILE).context("Could not determine config directory")?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    /// Create a new GmailAuth instance caching tokens at `token_path`
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    ///
    /// Runs unattended as long as the cached refresh token is accepted; only
    /// a missing or revoked grant falls back to the interactive browser flow.
    pub fn get_access_token(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let cached = self.load_token();

        if let Some(token) = &cached
            && token_is_fresh(token.expires_at, now)
        {
            return Ok(token.access_token.clone());
        }

        let refreshed = cached.and_then(|token| {
            let refresh_token = token.refresh_token?;
            self.refresh(&refresh_token)
                .inspect_err(|e| warn!("Token refresh failed, re-authenticating: {:#}", e))
                .ok()
        });

        let token = match refreshed {
            Some(token) => token,
            None => self.authorize_interactively()?,
        };
        self.store(&token)?;
        Ok(token.access_token)
    }

    /// Run the installed-app flow and return the issued grant
    fn authorize_interactively(&self) -> Result<StoredToken> {
        let (listener, port) = bind_callback_listener()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&Self::SCOPES.join(" ")),
        );

        // The operator has to act on this, so it goes to stdout as well as the log
        println!("Gmail authorization required. If no browser opens, visit:\n{}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        info!("Waiting for OAuth callback on port {}", port);
        let code = receive_authorization_code(&listener)?;

        let token = self.request_token(&[
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ])?;
        info!("Gmail authorization granted");
        Ok(token)
    }

    /// Exchange a refresh token for a new access token
    fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let mut token = self.request_token(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])?;
        // Google omits the refresh token on refresh
        token.refresh_token.get_or_insert_with(|| refresh_token.to_string());
        debug!("Refreshed Gmail access token");
        Ok(token)
    }

    /// POST a grant to the token endpoint
    fn request_token(&self, grant: &[(&str, &str)]) -> Result<StoredToken> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form(form)
            .context("Token request failed")?;
        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        Ok(StoredToken::issued(token, chrono::Utc::now().timestamp()))
    }

    /// Cached grant, if one is present and readable
    fn load_token(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.token_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    fn store(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.token_path, content)
            .with_context(|| format!("Failed to write token file: {}", self.token_path.display()))
    }
}

impl StoredToken {
    fn issued(response: TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_in.map(|secs| now + secs as i64),
        }
    }
}

/// Bind the first free port of the callback range
fn bind_callback_listener() -> Result<(TcpListener, u16)> {
    let ports = GmailAuth::CALLBACK_PORTS;
    ports
        .clone()
        .find_map(|port| {
            TcpListener::bind(("127.0.0.1", port))
                .ok()
                .map(|listener| (listener, port))
        })
        .with_context(|| {
            format!(
                "Could not bind to any port in range {}-{}",
                ports.start(),
                ports.end()
            )
        })
}

/// Accept one browser redirect and pull the authorization code out of it
fn receive_authorization_code(listener: &TcpListener) -> Result<String> {
    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read request")?;

    // GET /?code=AUTH_CODE&scope=... HTTP/1.1
    let code = callback_param(&request_line, "code");
    let (status, body) = match code {
        Some(_) => ("200 OK", "Gmail access granted to ews-gmail-relay. You can close this window."),
        None => ("400 Bad Request", "Authorization failed. Please try again."),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    stream.write_all(response.as_bytes()).ok();

    if let Some(err) = callback_param(&request_line, "error") {
        bail!("OAuth error: {}", err);
    }
    code.context("No authorization code received")
}

/// Whether a token expiring at `expires_at` is still usable at `now`
fn token_is_fresh(expires_at: Option<i64>, now: i64) -> bool {
    expires_at.is_some_and(|at| at > now + EXPIRY_MARGIN_SECS)
}

/// Extract a query parameter from the callback's HTTP request line
fn callback_param(request_line: &str, name: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split('?').nth(1)?;
    query.split('&').find_map(|param| {
        let mut parts = param.split('=');
        if parts.next() == Some(name) {
            parts.next().map(|s| s.to_string())
        } else {
            None
        }
    })
}
