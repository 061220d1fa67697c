//! Gmail API response normalization
//!
//! Converts Gmail API responses to relay domain models.

use super::api::GmailLabel;
use crate::models::Label;

/// Normalize a Gmail API label
pub fn normalize_label(label: GmailLabel) -> Label {
    match label.label_type.as_deref() {
        Some("system") => Label::system(label.id, label.name),
        _ => Label::new(label.id, label.name),
    }
}
