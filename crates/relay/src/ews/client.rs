//! Exchange Web Services HTTP client
//!
//! Speaks just enough EWS SOAP to drain an inbox: bind it, list a page,
//! load MIME content and flip read flags. Authenticates with HTTP basic
//! credentials. Uses synchronous HTTP (ureq) like the Gmail client.

use anyhow::{Context, Result, bail};
use base64::prelude::*;
use log::{debug, info};
use url::Url;

use super::soap::{self, FolderInfo};
use crate::mailbox::{SourceConnector, SourceMailbox};
use crate::models::{ItemId, SourceMessage};

/// Upper bound on a single response body; MIME content of large
/// messages arrives base64 encoded inside the SOAP envelope
const MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

/// EWS client bound to one endpoint and account
pub struct EwsClient {
    agent: ureq::Agent,
    endpoint: Url,
    authorization: String,
}

impl EwsClient {
    /// Create a new EWS client
    ///
    /// # Arguments
    /// * `endpoint` - Full URL of the EWS endpoint (…/EWS/Exchange.asmx)
    /// * `username` - Account name, optionally `DOMAIN\user`
    /// * `password` - Account password
    pub fn new(endpoint: &str, username: &str, password: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid EWS endpoint URL: {}", endpoint))?;

        // Error statuses still carry a SOAP body worth reading
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();

        let credentials = BASE64_STANDARD.encode(format!("{}:{}", username, password));

        Ok(Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint,
            authorization: format!("Basic {}", credentials),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one SOAP request and return the response body
    fn call(&self, operation: &str, body: String) -> Result<String> {
        debug!("EWS {} -> {}", operation, self.endpoint);

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("Authorization", &self.authorization)
            .send(body.as_str())
            .with_context(|| format!("Failed to send EWS {} request", operation))?;

        let status = response.status();
        let text = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_string()
            .with_context(|| format!("Failed to read EWS {} response", operation))?;

        if status.is_success() {
            return Ok(text);
        }

        // SOAP faults arrive with HTTP 500; prefer the fault text when present
        match soap::check_response(&text) {
            Err(e) => Err(e.context(format!(
                "EWS {} failed with HTTP {}",
                operation,
                status.as_u16()
            ))),
            Ok(()) => bail!("EWS {} failed with HTTP {}", operation, status.as_u16()),
        }
    }

    /// Bind the inbox and read its counters
    pub fn get_inbox(&self) -> Result<FolderInfo> {
        let xml = self.call("GetFolder", soap::get_inbox_request())?;
        soap::parse_get_folder(&xml).context("Failed to parse GetFolder response")
    }

    /// List the first `page_size` items of the inbox
    pub fn find_items(&self, page_size: usize) -> Result<Vec<SourceMessage>> {
        let xml = self.call("FindItem", soap::find_items_request(page_size, 0))?;
        soap::parse_find_item(&xml).context("Failed to parse FindItem response")
    }

    /// Load the raw MIME content of an item
    pub fn get_mime_content(&self, item: &ItemId) -> Result<Vec<u8>> {
        let xml = self.call("GetItem", soap::get_mime_content_request(item))?;
        soap::parse_get_item_mime(&xml).context("Failed to parse GetItem response")
    }

    /// Mark an item read
    pub fn mark_read(&self, item: &ItemId) -> Result<()> {
        let xml = self.call("UpdateItem", soap::mark_read_request(item))?;
        soap::parse_update_item(&xml).context("Failed to parse UpdateItem response")
    }
}

/// An authenticated session on an Exchange inbox
pub struct EwsInbox {
    client: EwsClient,
}

impl SourceMailbox for EwsInbox {
    fn list_unread(&self, page_size: usize) -> Result<Vec<SourceMessage>> {
        self.client.find_items(page_size)
    }

    fn fetch_body(&self, item: &SourceMessage) -> Result<Vec<u8>> {
        self.client.get_mime_content(&item.id)
    }

    fn mark_read(&self, item: &SourceMessage) -> Result<()> {
        self.client.mark_read(&item.id)
    }
}

/// Opens [`EwsInbox`] sessions from endpoint and credentials
#[derive(Clone)]
pub struct EwsConnector {
    endpoint: String,
    username: String,
    password: String,
}

impl EwsConnector {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for EwsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EwsConnector")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SourceConnector for EwsConnector {
    fn connect(&self) -> Result<Box<dyn SourceMailbox>> {
        let client = EwsClient::new(&self.endpoint, &self.username, &self.password)?;
        let inbox = client.get_inbox().context("Failed to bind Exchange inbox")?;

        info!(
            "Querying EWS at {} with username {}: total/unread messages = {}/{}",
            client.endpoint(),
            self.username,
            inbox.total_count,
            inbox.unread_count
        );

        Ok(Box::new(EwsInbox { client }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint() {
        let err = EwsClient::new("not a url", "user", "pass").err().unwrap();
        assert!(err.to_string().contains("Invalid EWS endpoint URL"));
    }

    #[test]
    fn test_basic_authorization_header() {
        let client = EwsClient::new(
            "https://mail.example.com/EWS/Exchange.asmx",
            "CORP\\jdoe",
            "secret",
        )
        .unwrap();
        assert_eq!(
            client.authorization,
            format!("Basic {}", BASE64_STANDARD.encode("CORP\\jdoe:secret"))
        );
        assert_eq!(client.endpoint().host_str(), Some("mail.example.com"));
    }

    #[test]
    fn test_connector_debug_hides_password() {
        let connector = EwsConnector::new("https://mail.example.com/EWS/Exchange.asmx", "jdoe", "hunter2");
        assert!(!format!("{:?}", connector).contains("hunter2"));
    }

    #[test]
    fn test_connect_refused_is_connection_error() {
        // Nothing listens on port 9 of localhost
        let connector = EwsConnector::new("http://127.0.0.1:9/EWS/Exchange.asmx", "jdoe", "pw");
        let err = connector.connect().err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to bind Exchange inbox"));
    }
}
