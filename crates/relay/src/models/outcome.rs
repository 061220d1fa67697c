//! Per-message and per-invocation relay results

use super::{ItemId, MessageId};
use crate::error::RelayError;

/// Result of relaying one source message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Inserted at the destination and marked read at the source
    Delivered { source: ItemId, destination: MessageId },
    /// Already read at the source, left untouched
    Skipped { source: ItemId },
    /// Some step failed; see the error for which one
    Failed { source: ItemId, error: RelayError },
}

impl RelayOutcome {
    pub fn source(&self) -> &ItemId {
        match self {
            Self::Delivered { source, .. }
            | Self::Skipped { source }
            | Self::Failed { source, .. } => source,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Everything one relay invocation did
#[derive(Debug, Clone, Default)]
pub struct RelayReport {
    /// Outcomes in source listing order
    pub outcomes: Vec<RelayOutcome>,
    /// Set when the source could not be reached or listed
    pub source_error: Option<RelayError>,
    /// Whether a diagnostic message was inserted at the destination
    pub diagnostic_sent: bool,
    /// Duration of the invocation
    pub duration_ms: u64,
}

/// Counters derived from a [`RelayReport`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayStats {
    /// Number of messages listed from the source
    pub messages_listed: usize,
    /// Number of messages inserted and marked read
    pub messages_delivered: usize,
    /// Number of messages skipped (already read)
    pub messages_skipped: usize,
    /// Number of messages that failed at some step
    pub errors: usize,
}

impl RelayReport {
    pub fn stats(&self) -> RelayStats {
        let mut stats = RelayStats {
            messages_listed: self.outcomes.len(),
            ..RelayStats::default()
        };
        for outcome in &self.outcomes {
            match outcome {
                RelayOutcome::Delivered { .. } => stats.messages_delivered += 1,
                RelayOutcome::Skipped { .. } => stats.messages_skipped += 1,
                RelayOutcome::Failed { .. } => stats.errors += 1,
            }
        }
        stats
    }
}
