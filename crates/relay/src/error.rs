//! Relay error taxonomy
//!
//! Adapters report failures as `anyhow::Error`; the relay engine files
//! each one under the step that failed. Reasons are flattened to text so
//! outcomes stay cheap to clone and compare.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The source session could not be established or authenticated
    #[error("Cannot connect to source mailbox: {reason}")]
    Connection { reason: String },

    /// Listing the inbox, or fetching one item's content, failed
    #[error("Failed to fetch {item}: {reason}")]
    Fetch { item: String, reason: String },

    /// The destination refused or failed the insert; source left unread
    #[error("Failed to deliver {item}: {reason}")]
    Delivery { item: String, reason: String },

    /// Delivered, but the source read flag could not be set; the message
    /// will be delivered again on the next run
    #[error("Delivered {item} as {delivered_as} but failed to mark it read: {reason}")]
    Update {
        item: String,
        delivered_as: String,
        reason: String,
    },
}

impl RelayError {
    pub fn connection(err: &anyhow::Error) -> Self {
        Self::Connection {
            reason: format!("{:#}", err),
        }
    }

    pub fn fetch(item: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Fetch {
            item: item.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn delivery(item: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Delivery {
            item: item.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn update(
        item: impl Into<String>,
        delivered_as: impl Into<String>,
        err: &anyhow::Error,
    ) -> Self {
        Self::Update {
            item: item.into(),
            delivered_as: delivered_as.into(),
            reason: format!("{:#}", err),
        }
    }
}
