//! Diagnostic messages written into the destination mailbox

use chrono::{DateTime, Utc};

use crate::models::EmailAddress;

pub const CONNECTION_FAILURE_SUBJECT: &str = "ews-gmail-proxy - Problem connecting to EWS";

const CONNECTION_FAILURE_TEXT: &str = "There was a problem connecting to Exchange Web Services";

/// Compose the RFC 2822 report sent when the source can't be reached
///
/// From and To are both the operator; the body ends with the error chain.
pub fn compose_connection_report(
    operator: &EmailAddress,
    error: &anyhow::Error,
    date: DateTime<Utc>,
) -> String {
    let address = operator.to_string();
    format!(
        "From: {address}\r\nTo: {address}\r\nDate: {date}\r\nSubject: {subject}\r\n\r\n{text}: {error:#}\r\n",
        date = date.to_rfc2822(),
        subject = CONNECTION_FAILURE_SUBJECT,
        text = CONNECTION_FAILURE_TEXT,
    )
}
