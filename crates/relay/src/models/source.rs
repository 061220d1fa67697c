//! Source-side (Exchange) message model

use serde::{Deserialize, Serialize};

/// Opaque handle of an item in the source mailbox
///
/// The change key is the server's version stamp for the item. It is
/// carried along when present so updates address the version we read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    pub id: String,
    pub change_key: Option<String>,
}

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_key: None,
        }
    }

    pub fn with_change_key(id: impl Into<String>, change_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_key: Some(change_key.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// A message listed from the source inbox
///
/// Listing carries metadata only; the MIME content is fetched separately
/// and only for unread messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub id: ItemId,
    pub is_read: bool,
}

impl SourceMessage {
    pub fn new(id: ItemId, is_read: bool) -> Self {
        Self { id, is_read }
    }
}
