//! Configuration loading for the relay
//!
//! Two inputs:
//! - the relay settings, a `.properties` file naming the Exchange endpoint,
//!   its credentials, the Gmail address and the labels to apply
//! - the Gmail OAuth client credentials, loaded from (in order of priority):
//!   1. an explicit JSON file (Google Cloud Console format)
//!   2. the same file in the config directory
//!   3. runtime environment variables

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::ews::EwsConnector;
use crate::models::EmailAddress;
use crate::relay::RelayOptions;

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Keys every relay config must define
const REQUIRED_KEYS: &[&str] = &[
    "ewsUrl",
    "ewsUsername",
    "ewsPassword",
    "gmailAddress",
    "gmailLabelIds",
];

/// Relay settings loaded from a `.properties` file
#[derive(Clone)]
pub struct RelayConfig {
    pub ews_url: String,
    pub ews_username: String,
    pub ews_password: String,
    pub gmail_address: EmailAddress,
    /// Comma-separated Gmail label IDs, possibly empty
    pub gmail_label_ids: String,
    /// Insert a diagnostic message into Gmail when EWS is unreachable
    pub report_errors_to_gmail: bool,
}

impl RelayConfig {
    /// Load and validate a `.properties` file
    pub fn load(path: &Path) -> Result<Self> {
        let props = config::load_properties_file(path)?;
        Self::from_properties(&props)
            .with_context(|| format!("Config is invalid: {}", path.display()))
    }

    /// Build a config from already parsed key/value pairs
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !props.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            bail!("Missing required keys: {}", missing.join(", "));
        }

        let get = |key: &str| props.get(key).cloned().unwrap_or_default();

        let ews_url = get("ewsUrl");
        Url::parse(&ews_url).with_context(|| format!("ewsUrl is not a valid URL: {}", ews_url))?;

        let gmail_address = EmailAddress::parse(&get("gmailAddress"))
            .context("gmailAddress does not contain an address")?;

        let report_errors_to_gmail = props
            .get("reportErrorsToGmail")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Ok(Self {
            ews_url,
            ews_username: get("ewsUsername"),
            ews_password: get("ewsPassword"),
            gmail_address,
            gmail_label_ids: get("gmailLabelIds"),
            report_errors_to_gmail,
        })
    }

    /// Relay options derived from this config
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            label_spec: Some(self.gmail_label_ids.clone()),
            report_errors_to: self
                .report_errors_to_gmail
                .then(|| self.gmail_address.clone()),
            ..RelayOptions::default()
        }
    }

    /// Connector for the configured Exchange inbox
    pub fn ews_connector(&self) -> EwsConnector {
        EwsConnector::new(&self.ews_url, &self.ews_username, &self.ews_password)
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("ews_url", &self.ews_url)
            .field("ews_username", &self.ews_username)
            .field("ews_password", &"***")
            .field("gmail_address", &self.gmail_address)
            .field("gmail_label_ids", &self.gmail_label_ids)
            .field("report_errors_to_gmail", &self.report_errors_to_gmail)
            .finish()
    }
}

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. `secret_file`, when given
    /// 2. JSON file (~/.config/ews-gmail-relay/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load(secret_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = secret_file {
            return Self::from_file(path);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Get the default credentials file path (~/.config/ews-gmail-relay/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}
