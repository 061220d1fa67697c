//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow
//! - Gmail API client for inserting messages and listing labels
//! - Response normalization to domain models

mod auth;
mod client;
mod normalize;

pub use auth::GmailAuth;
pub use client::GmailClient;
pub use normalize::normalize_label;

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Body of `users.messages.insert`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct InsertMessageRequest<'a> {
        pub raw: &'a str,
        pub label_ids: Vec<String>,
    }

    /// Message resource returned by `users.messages.insert`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct InsertMessageResponse {
        pub id: String,
        pub thread_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<GmailLabel>>,
    }

    /// Error envelope returned with non-2xx statuses
    #[derive(Debug, Deserialize)]
    pub struct ErrorResponse {
        pub error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorDetail {
        pub code: Option<u16>,
        pub message: String,
        pub status: Option<String>,
    }

    /// Label resource
    #[derive(Debug, Deserialize)]
    pub struct GmailLabel {
        pub id: String,
        pub name: String,
        /// "system" or "user"
        #[serde(rename = "type")]
        pub label_type: Option<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;

    #[test]
    fn test_insert_request_json() {
        let request = InsertMessageRequest {
            raw: "RnJvbTo-_8=",
            label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["raw"], "RnJvbTo-_8=");
        assert_eq!(json["labelIds"][1], "UNREAD");
    }

    #[test]
    fn test_parse_insert_response() {
        let json = r#"{"id": "18c2f", "threadId": "18c2f", "labelIds": ["INBOX", "UNREAD"]}"#;
        let response: InsertMessageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, "18c2f");
        assert_eq!(response.label_ids.unwrap().len(), 2);
    }

    #[test]
    fn test_parse_labels_response() {
        let json = r#"{"labels": [
            {"id": "INBOX", "name": "INBOX", "type": "system"},
            {"id": "Label_1", "name": "Work", "type": "user"}
        ]}"#;
        let response: ListLabelsResponse = serde_json::from_str(json).unwrap();
        let labels = response.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[1].label_type.as_deref(), Some("user"));
    }

    #[test]
    fn test_parse_error_response() {
        let json = r#"{"error": {"code": 400, "message": "Invalid label: Label#1",
            "errors": [{"message": "Invalid label: Label#1", "domain": "global", "reason": "invalidArgument"}],
            "status": "INVALID_ARGUMENT"}}"#;
        let response: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, Some(400));
        assert_eq!(response.error.message, "Invalid label: Label#1");
        assert_eq!(response.error.status.as_deref(), Some("INVALID_ARGUMENT"));
    }

    #[test]
    fn test_parse_empty_labels_response() {
        let response: ListLabelsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.labels.is_none());
    }
}
