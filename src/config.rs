//! Feed configuration
//!
//! Every field has a default, so a partial `feed_config.json` is enough.

use crate::nostr::events::FeedFilter;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default relay (used whenever no valid relay is configured)
pub const DEFAULT_RELAY: &str = "wss://relay.damus.io";

/// Storage key holding the JSON list of relay addresses
pub const DEFAULT_STORAGE_KEY: &str = "nostr-relays";

/// Storage key of the optional config file
pub const CONFIG_KEY: &str = "feed_config.json";

/// Kind 1: short text note
pub const KIND_TEXT_NOTE: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub storage_key: String,
    pub default_relay: String,
    pub default_kinds: Vec<u16>,
    pub default_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_relay: DEFAULT_RELAY.to_string(),
            default_kinds: vec![KIND_TEXT_NOTE],
            default_limit: 50,
        }
    }
}

impl FeedConfig {
    /// Load `feed_config.json` from storage, falling back to defaults
    /// when it is missing or unreadable.
    pub fn load(storage: &dyn Storage) -> Self {
        if !storage.exists(CONFIG_KEY) {
            return Self::default();
        }

        let parsed = storage
            .read(CONFIG_KEY)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()));

        match parsed {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", CONFIG_KEY, e);
                Self::default()
            }
        }
    }

    /// Filter built from the configured default kinds and limit
    pub fn default_filter(&self) -> FeedFilter {
        FeedFilter::new()
            .kinds(self.default_kinds.clone())
            .limit(self.default_limit)
    }
}
