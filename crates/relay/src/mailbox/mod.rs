//! Source and destination mailbox abstractions
//!
//! The relay engine only sees these traits, so it runs the same against
//! Exchange/Gmail and against the in-memory mailboxes used in tests.

mod memory;
mod traits;

pub use memory::{InMemoryDestinationMailbox, InMemorySourceMailbox, InsertedMessage, Journal};
pub use traits::{DestinationMailbox, SourceConnector, SourceMailbox};
