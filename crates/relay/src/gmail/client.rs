//! Gmail API HTTP client
//!
//! Inserts messages into, and lists labels of, one Gmail mailbox.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::de::DeserializeOwned;

use super::api::{ErrorResponse, InsertMessageRequest, InsertMessageResponse, ListLabelsResponse};
use super::{GmailAuth, normalize_label};
use crate::encode::EncodedMessage;
use crate::mailbox::DestinationMailbox;
use crate::models::{Label, LabelSet, MessageId};

/// Gmail API client bound to one mailbox
pub struct GmailClient {
    agent: ureq::Agent,
    auth: GmailAuth,
    user_id: String,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    ///
    /// # Arguments
    /// * `auth` - OAuth token provider
    /// * `user_id` - Mailbox address, or `me` for the authorized user
    pub fn new(auth: GmailAuth, user_id: impl Into<String>) -> Self {
        // Rejections carry a JSON reason; read it instead of failing on status
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            auth,
            user_id: user_id.into(),
        }
    }

    fn user_url(&self, path: &str) -> String {
        format!(
            "{}/users/{}/{}",
            Self::BASE_URL,
            urlencoding::encode(&self.user_id),
            path
        )
    }

    /// Insert a raw message into the mailbox
    ///
    /// Inserting bypasses scanning and classification, so the message lands
    /// exactly where `labels` put it.
    pub fn insert_message(
        &self,
        message: &EncodedMessage,
        labels: &LabelSet,
    ) -> Result<InsertMessageResponse> {
        let access_token = self.auth.get_access_token()?;

        let request = InsertMessageRequest {
            raw: message.as_str(),
            label_ids: labels.to_strings(),
        };

        debug!(
            "Inserting message ({} bytes encoded) with labels {:?}",
            request.raw.len(),
            request.label_ids
        );

        let response = self
            .agent
            .post(&self.user_url("messages"))
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request)
            .context("Failed to send insert message request")?;

        read_response(response, "insert message")
    }

    /// List all labels in the mailbox
    pub fn list_labels(&self) -> Result<Vec<Label>> {
        let access_token = self.auth.get_access_token()?;

        let response = self
            .agent
            .get(&self.user_url("labels"))
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list labels request")?;

        let labels: ListLabelsResponse = read_response(response, "list labels")?;

        Ok(labels
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(normalize_label)
            .collect())
    }
}

/// Decode a successful JSON body, or turn an error status into an error
/// carrying Gmail's reason
fn read_response<T: DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
    operation: &str,
) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {} response", operation));
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(api_error(status.as_u16(), &body).context(format!("Gmail {} failed", operation)))
}

fn api_error(status: u16, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) => match error.status {
            Some(reason) => anyhow!("HTTP {} {}: {}", status, reason, error.message),
            None => anyhow!("HTTP {}: {}", status, error.message),
        },
        Err(_) if body.trim().is_empty() => anyhow!("HTTP {}", status),
        Err(_) => anyhow!("HTTP {}: {}", status, body.trim()),
    }
}

impl DestinationMailbox for GmailClient {
    fn insert(&self, message: &EncodedMessage, labels: &LabelSet) -> Result<MessageId> {
        let inserted = self.insert_message(message, labels)?;
        Ok(MessageId::new(inserted.id))
    }
}
