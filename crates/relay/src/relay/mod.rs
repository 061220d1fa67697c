//! Relay engine for moving mail from the source to the destination
//!
//! One invocation handles one page of the source inbox; running it again
//! picks up whatever is still unread.

mod diagnostic;
mod engine;

pub use diagnostic::{CONNECTION_FAILURE_SUBJECT, compose_connection_report};
pub use engine::{DEFAULT_PAGE_SIZE, RelayEngine, RelayOptions};
