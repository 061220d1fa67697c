//! Configuration loading for the relay
//!
//! Provides utilities for locating the shared config directory
//! (~/.config/ews-gmail-relay/) and for loading JSON and `.properties`
//! configuration files.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod properties;

pub use properties::parse_properties;

/// Name of the config directory under the platform config root
const APP_DIR: &str = "ews-gmail-relay";

/// Initialize the config directory.
///
/// Creates ~/.config/ews-gmail-relay/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the config directory (~/.config/ews-gmail-relay/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON config file from the config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load a Java-style `.properties` file from an arbitrary path
pub fn load_properties_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Ok(parse_properties(&content))
}

/// Check if a config file exists in the config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("ews-gmail-relay"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("gmail-tokens.json");
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("ews-gmail-relay/gmail-tokens.json"));
    }

    #[test]
    fn test_load_properties_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# relay settings").unwrap();
        writeln!(file, "ewsUrl=https://mail.example.com/EWS/Exchange.asmx").unwrap();
        writeln!(file, "gmailLabelIds = Label_1, Label_2").unwrap();

        let props = load_properties_file(file.path()).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(
            props["ewsUrl"],
            "https://mail.example.com/EWS/Exchange.asmx"
        );
        assert_eq!(props["gmailLabelIds"], "Label_1, Label_2");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_properties_file(Path::new("/nonexistent/relay.properties")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "relay", "enabled": true}}"#).unwrap();

        let value: serde_json::Value = load_json_file(file.path()).unwrap();
        assert_eq!(value["name"], "relay");
        assert_eq!(value["enabled"], true);
    }
}
