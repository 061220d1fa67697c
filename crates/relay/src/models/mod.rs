//! Domain models for relay entities

mod label;
mod message;
mod outcome;
mod source;

pub use label::{Label, LabelId, LabelSet};
pub use message::{EmailAddress, MessageId};
pub use outcome::{RelayOutcome, RelayReport, RelayStats};
pub use source::{ItemId, SourceMessage};
