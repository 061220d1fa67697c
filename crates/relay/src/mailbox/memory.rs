//! In-memory mailbox implementations
//!
//! Used by the test suites to drive the relay engine without a network.
//! Failures can be injected per operation and a shared [`Journal`]
//! records the order in which the engine touched both mailboxes.

use anyhow::{Result, bail};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{DestinationMailbox, SourceConnector, SourceMailbox};
use crate::encode::EncodedMessage;
use crate::models::{ItemId, LabelSet, MessageId, SourceMessage};

/// Ordered log of mailbox calls, shareable between mailboxes
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// Snapshot of all recorded calls, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

struct StoredItem {
    message: SourceMessage,
    body: Vec<u8>,
}

#[derive(Default)]
struct SourceState {
    items: Vec<StoredItem>,
    connect_error: Option<String>,
    list_error: Option<String>,
    failing_fetches: HashSet<String>,
    failing_marks: HashSet<String>,
}

/// In-memory source inbox
///
/// Clones share state, so a test can keep one handle while the engine
/// owns the session returned by [`SourceConnector::connect`].
#[derive(Clone, Default)]
pub struct InMemorySourceMailbox {
    state: Arc<RwLock<SourceState>>,
    journal: Journal,
}

impl InMemorySourceMailbox {
    /// Create a new empty inbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty inbox that records its calls into `journal`
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SourceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SourceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message to the inbox view
    pub fn add_message(&self, id: &str, body: impl Into<Vec<u8>>, is_read: bool) {
        self.write().items.push(StoredItem {
            message: SourceMessage::new(ItemId::new(id), is_read),
            body: body.into(),
        });
    }

    /// Read flag of a message, `None` if it doesn't exist
    pub fn is_read(&self, id: &str) -> Option<bool> {
        self.read()
            .items
            .iter()
            .find(|item| item.message.id.as_str() == id)
            .map(|item| item.message.is_read)
    }

    /// Make every connection attempt fail with `reason`
    pub fn fail_connect(&self, reason: &str) {
        self.write().connect_error = Some(reason.to_string());
    }

    /// Make listing the inbox fail with `reason`
    pub fn fail_list(&self, reason: &str) {
        self.write().list_error = Some(reason.to_string());
    }

    /// Make fetching the body of `id` fail
    pub fn fail_fetch(&self, id: &str) {
        self.write().failing_fetches.insert(id.to_string());
    }

    /// Make marking `id` as read fail
    pub fn fail_mark_read(&self, id: &str) {
        self.write().failing_marks.insert(id.to_string());
    }
}

impl SourceConnector for InMemorySourceMailbox {
    fn connect(&self) -> Result<Box<dyn SourceMailbox>> {
        if let Some(reason) = &self.read().connect_error {
            bail!("{}", reason);
        }
        self.journal.record("connect");
        Ok(Box::new(self.clone()))
    }
}

impl SourceMailbox for InMemorySourceMailbox {
    fn list_unread(&self, page_size: usize) -> Result<Vec<SourceMessage>> {
        let state = self.read();
        if let Some(reason) = &state.list_error {
            bail!("{}", reason);
        }
        self.journal.record("list");
        Ok(state
            .items
            .iter()
            .take(page_size)
            .map(|item| item.message.clone())
            .collect())
    }

    fn fetch_body(&self, item: &SourceMessage) -> Result<Vec<u8>> {
        let state = self.read();
        let id = item.id.as_str();
        self.journal.record(format!("fetch {}", id));
        if state.failing_fetches.contains(id) {
            bail!("The specified object was not found in the store");
        }
        match state.items.iter().find(|stored| stored.message.id.as_str() == id) {
            Some(stored) => Ok(stored.body.clone()),
            None => bail!("No such item: {}", id),
        }
    }

    fn mark_read(&self, item: &SourceMessage) -> Result<()> {
        let mut state = self.write();
        let id = item.id.as_str();
        self.journal.record(format!("mark_read {}", id));
        if state.failing_marks.contains(id) {
            bail!("Update rejected for {}", id);
        }
        match state
            .items
            .iter_mut()
            .find(|stored| stored.message.id.as_str() == id)
        {
            Some(stored) => {
                stored.message.is_read = true;
                Ok(())
            }
            None => bail!("No such item: {}", id),
        }
    }
}

/// A message accepted by [`InMemoryDestinationMailbox`]
#[derive(Debug, Clone)]
pub struct InsertedMessage {
    pub id: MessageId,
    pub raw: EncodedMessage,
    pub labels: LabelSet,
}

#[derive(Default)]
struct DestinationState {
    inserted: Vec<InsertedMessage>,
    failing_calls: HashSet<usize>,
    calls: usize,
}

/// In-memory destination inbox
#[derive(Clone, Default)]
pub struct InMemoryDestinationMailbox {
    state: Arc<RwLock<DestinationState>>,
    journal: Journal,
}

impl InMemoryDestinationMailbox {
    /// Create a new empty inbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty inbox that records its calls into `journal`
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    /// Reject the `n`th insert call (1-based)
    pub fn fail_insert_call(&self, n: usize) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failing_calls
            .insert(n);
    }

    /// All accepted messages, in insertion order
    pub fn messages(&self) -> Vec<InsertedMessage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .inserted
            .clone()
    }
}

impl DestinationMailbox for InMemoryDestinationMailbox {
    fn insert(&self, message: &EncodedMessage, labels: &LabelSet) -> Result<MessageId> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.calls += 1;
        let call = state.calls;
        self.journal.record(format!("insert #{}", call));

        if state.failing_calls.contains(&call) {
            bail!("Invalid label: insert #{} rejected", call);
        }

        let id = MessageId::new(format!("msg-{}", state.inserted.len() + 1));
        state.inserted.push(InsertedMessage {
            id: id.clone(),
            raw: message.clone(),
            labels: labels.clone(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;

    #[test]
    fn test_source_list_respects_page_size() {
        let source = InMemorySourceMailbox::new();
        for i in 0..5 {
            source.add_message(&format!("m{}", i), "body", false);
        }
        let session = source.connect().unwrap();
        assert_eq!(session.list_unread(3).unwrap().len(), 3);
        assert_eq!(session.list_unread(100).unwrap().len(), 5);
    }

    #[test]
    fn test_source_mark_read_is_shared_between_clones() {
        let source = InMemorySourceMailbox::new();
        source.add_message("m1", "body", false);

        let session = source.connect().unwrap();
        let items = session.list_unread(10).unwrap();
        session.mark_read(&items[0]).unwrap();

        assert_eq!(source.is_read("m1"), Some(true));
        assert_eq!(source.is_read("missing"), None);
    }

    #[test]
    fn test_source_connect_failure() {
        let source = InMemorySourceMailbox::new();
        source.fail_connect("401 Unauthorized");
        let err = source.connect().err().unwrap();
        assert_eq!(err.to_string(), "401 Unauthorized");
    }

    #[test]
    fn test_destination_fails_selected_call() {
        let dest = InMemoryDestinationMailbox::new();
        dest.fail_insert_call(2);
        let labels = LabelSet::new();

        assert_eq!(dest.insert(&encode(b"a"), &labels).unwrap().as_str(), "msg-1");
        assert!(dest.insert(&encode(b"b"), &labels).is_err());
        assert_eq!(dest.insert(&encode(b"c"), &labels).unwrap().as_str(), "msg-2");
        assert_eq!(dest.messages().len(), 2);
    }

    #[test]
    fn test_journal_records_in_order() {
        let journal = Journal::new();
        let source = InMemorySourceMailbox::with_journal(journal.clone());
        let dest = InMemoryDestinationMailbox::with_journal(journal.clone());
        source.add_message("m1", "body", false);

        let session = source.connect().unwrap();
        let items = session.list_unread(10).unwrap();
        session.fetch_body(&items[0]).unwrap();
        dest.insert(&encode(b"body"), &LabelSet::new()).unwrap();
        session.mark_read(&items[0]).unwrap();

        assert_eq!(
            journal.entries(),
            vec!["connect", "list", "fetch m1", "insert #1", "mark_read m1"]
        );
    }
}
