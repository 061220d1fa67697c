//! Exchange Web Services integration
//!
//! This module provides:
//! - SOAP request construction and response parsing
//! - A blocking EWS client and the inbox session built on it

mod client;
mod soap;

pub use client::{EwsClient, EwsConnector, EwsInbox};
pub use soap::FolderInfo;
