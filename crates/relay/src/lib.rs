//! Relay crate - moves unread Exchange mail into a Gmail inbox
//!
//! This crate provides:
//! - Domain models (SourceMessage, LabelSet, RelayOutcome)
//! - Exchange Web Services client for draining an inbox
//! - Gmail API client and OAuth authentication
//! - Mailbox trait abstractions with in-memory implementations
//! - The relay engine, which marks a source message read only after
//!   the destination has accepted it
//!
//! Everything is synchronous; one call to [`RelayEngine::relay_unread`]
//! processes at most one page of the source inbox.

pub mod config;
pub mod encode;
pub mod error;
pub mod ews;
pub mod gmail;
pub mod labels;
pub mod mailbox;
pub mod models;
pub mod relay;

pub use self::config::{GmailCredentials, RelayConfig};
pub use encode::{EncodedMessage, encode};
pub use error::RelayError;
pub use ews::{EwsClient, EwsConnector, EwsInbox};
pub use gmail::{GmailAuth, GmailClient};
pub use labels::compute_labels;
pub use mailbox::{
    DestinationMailbox, InMemoryDestinationMailbox, InMemorySourceMailbox, SourceConnector,
    SourceMailbox,
};
pub use models::{
    EmailAddress, ItemId, Label, LabelId, LabelSet, MessageId, RelayOutcome, RelayReport,
    RelayStats, SourceMessage,
};
pub use relay::{DEFAULT_PAGE_SIZE, RelayEngine, RelayOptions};
