//! Label policy for inserted messages

use crate::models::{LabelId, LabelSet};

/// Compute the labels for one inserted message
///
/// Always starts with `INBOX` and `UNREAD`, then appends every trimmed,
/// non-empty token of the comma-separated `spec`. Tokens are not
/// validated or deduplicated; the destination rejects bad ones on insert.
pub fn compute_labels(spec: Option<&str>) -> LabelSet {
    let mut labels = LabelSet::new();
    labels.push(LabelId::INBOX);
    labels.push(LabelId::UNREAD);

    if let Some(spec) = spec {
        spec.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .for_each(|token| labels.push(token));
    }

    labels
}
