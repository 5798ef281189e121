//! Store and autosave settings.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Settings of the session store and its autosave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the file store.
    pub storage_dir: PathBuf,
    /// Quiet period before a scheduled snapshot is written.
    pub debounce_ms: u64,
    /// Store values zstd-compressed (`<key>.json.zst`).
    pub compress: bool,
    pub default_session_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("agent-flow-data"),
            debounce_ms: 500,
            compress: false,
            default_session_name: "New Chat".to_owned(),
        }
    }
}

impl StoreConfig {
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn default_session_name(mut self, name: impl Into<String>) -> Self {
        self.default_session_name = name.into();
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"compress": true}"#).unwrap();
        assert!(config.compress);
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.default_session_name, "New Chat");
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::default()
            .storage_dir("/tmp/flows")
            .debounce_ms(50)
            .default_session_name("Scratch");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/flows"));
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert_eq!(config.default_session_name, "Scratch");
        assert!(!config.compress);
    }
}
