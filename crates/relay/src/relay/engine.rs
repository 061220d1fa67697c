//! Relay engine: drains one page of unread source mail into the destination

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::time::Instant;

use super::diagnostic::compose_connection_report;
use crate::encode::encode;
use crate::error::RelayError;
use crate::labels::compute_labels;
use crate::mailbox::{DestinationMailbox, SourceConnector, SourceMailbox};
use crate::models::{EmailAddress, ItemId, MessageId, RelayOutcome, RelayReport, SourceMessage};

/// Items listed per invocation
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Options for a [`RelayEngine`]
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Comma-separated label IDs added to every inserted message
    pub label_spec: Option<String>,
    /// Maximum number of source items looked at per invocation
    pub page_size: usize,
    /// Where to report source connection failures; `None` only logs them
    pub report_errors_to: Option<EmailAddress>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            label_spec: None,
            page_size: DEFAULT_PAGE_SIZE,
            report_errors_to: None,
        }
    }
}

/// Relays unread source messages into a destination mailbox
///
/// Each unread item goes through fetch, encode, insert and mark-read in
/// that order. The read flag is only touched after the destination
/// acknowledged the insert, so an item that failed anywhere before that
/// stays unread and is picked up by the next invocation.
pub struct RelayEngine<'a> {
    destination: &'a dyn DestinationMailbox,
    options: RelayOptions,
}

impl<'a> RelayEngine<'a> {
    /// Create a new relay engine
    pub fn new(destination: &'a dyn DestinationMailbox, options: RelayOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    /// Relay one page of unread messages
    ///
    /// Never fails as a whole: connection and listing errors end up in
    /// [`RelayReport::source_error`], per-item errors in the outcomes.
    pub fn relay_unread(&self, connector: &dyn SourceConnector) -> RelayReport {
        let start = Instant::now();
        let mut report = RelayReport::default();

        let source = match connector.connect() {
            Ok(source) => source,
            Err(e) => {
                error!("Problem connecting to source mailbox: {:#}", e);
                report.diagnostic_sent = self.report_connection_failure(&e);
                report.source_error = Some(RelayError::connection(&e));
                report.duration_ms = start.elapsed().as_millis() as u64;
                return report;
            }
        };

        let items = match source.list_unread(self.options.page_size) {
            Ok(items) => items,
            Err(e) => {
                let err = RelayError::fetch("inbox listing", &e);
                error!("{}", err);
                report.source_error = Some(err);
                report.duration_ms = start.elapsed().as_millis() as u64;
                return report;
            }
        };

        debug!("Listed {} source items", items.len());

        for item in &items {
            report.outcomes.push(self.relay_one(source.as_ref(), item));
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        let stats = report.stats();
        info!(
            "Relay finished: {} listed, {} delivered, {} skipped, {} failed in {}ms",
            stats.messages_listed,
            stats.messages_delivered,
            stats.messages_skipped,
            stats.errors,
            report.duration_ms
        );

        report
    }

    /// Insert one raw RFC 2822 message without touching any source
    pub fn import_raw(&self, raw: &[u8]) -> Result<MessageId> {
        let id = self.deliver(raw)?;
        info!("Imported message as {}", id);
        Ok(id)
    }

    fn relay_one(&self, source: &dyn SourceMailbox, item: &SourceMessage) -> RelayOutcome {
        let id = item.id.clone();

        if item.is_read {
            debug!("Skipping {} (already read)", id);
            return RelayOutcome::Skipped { source: id };
        }

        let raw = match source.fetch_body(item) {
            Ok(raw) => raw,
            Err(e) => return failed(id.clone(), RelayError::fetch(id.as_str(), &e)),
        };

        let destination = match self.deliver(&raw) {
            Ok(destination) => destination,
            Err(e) => return failed(id.clone(), RelayError::delivery(id.as_str(), &e)),
        };

        if let Err(e) = source.mark_read(item) {
            return failed(
                id.clone(),
                RelayError::update(id.as_str(), destination.as_str(), &e),
            );
        }

        info!("Relayed {} as {} ({} bytes)", id, destination, raw.len());
        RelayOutcome::Delivered {
            source: id,
            destination,
        }
    }

    fn deliver(&self, raw: &[u8]) -> Result<MessageId> {
        let encoded = encode(raw);
        let labels = compute_labels(self.options.label_spec.as_deref());
        self.destination.insert(&encoded, &labels)
    }

    /// Returns whether a report was delivered
    fn report_connection_failure(&self, err: &anyhow::Error) -> bool {
        let Some(operator) = &self.options.report_errors_to else {
            return false;
        };

        let report = compose_connection_report(operator, err, Utc::now());
        match self.deliver(report.as_bytes()) {
            Ok(id) => {
                info!("Reported connection failure to {} as {}", operator.email, id);
                true
            }
            Err(e) => {
                error!("Failed to report connection failure: {:#}", e);
                false
            }
        }
    }
}

fn failed(source: ItemId, error: RelayError) -> RelayOutcome {
    match &error {
        // Already delivered: the next run will deliver it again
        RelayError::Update { .. } => warn!("{}", error),
        _ => error!("{}", error),
    }
    RelayOutcome::Failed { source, error }
}
