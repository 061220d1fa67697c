//! Capability traits for the two mailboxes the relay talks to

use anyhow::Result;

use crate::encode::EncodedMessage;
use crate::models::{LabelSet, MessageId, SourceMessage};

/// The mailbox being drained (Exchange in production)
pub trait SourceMailbox {
    /// List the first page of the inbox view, at most `page_size` items
    ///
    /// Items carry their read flag so callers can skip the ones already
    /// read. Message bodies are not included.
    fn list_unread(&self, page_size: usize) -> Result<Vec<SourceMessage>>;

    /// Fetch the raw RFC 2822 content of one item
    fn fetch_body(&self, item: &SourceMessage) -> Result<Vec<u8>>;

    /// Set the item's read flag, resolving conflicts in our favour
    fn mark_read(&self, item: &SourceMessage) -> Result<()>;
}

/// Establishes an authenticated session with the source mailbox
///
/// Any error returned here is a connection-level failure.
pub trait SourceConnector {
    fn connect(&self) -> Result<Box<dyn SourceMailbox>>;
}

impl<F> SourceConnector for F
where
    F: Fn() -> Result<Box<dyn SourceMailbox>>,
{
    fn connect(&self) -> Result<Box<dyn SourceMailbox>> {
        self()
    }
}

/// The mailbox receiving relayed copies (Gmail in production)
pub trait DestinationMailbox {
    /// Insert one message into the inbox, unread, with the given labels
    ///
    /// Not idempotent: calling it twice creates two messages.
    fn insert(&self, message: &EncodedMessage, labels: &LabelSet) -> Result<MessageId>;
}
