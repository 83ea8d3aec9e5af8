//! Relay addresses and the persisted relay list
//!
//! Addresses are validated once, when they enter the process: from user
//! input, from storage, or from configuration. Everything downstream can
//! rely on a [`RelayAddress`] being a `ws://` or `wss://` URL with a host.

use crate::error::{FeedError, Result};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// A validated real-time socket relay address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelayAddress(String);

impl RelayAddress {
    /// Validate an address. Surrounding whitespace is trimmed; the rest is
    /// kept verbatim.
    pub fn parse(input: &str) -> Result<Self> {
        let address = input.trim();
        if address.is_empty() {
            return Err(FeedError::invalid_address(input, "address is empty"));
        }

        let url = Url::parse(address)
            .map_err(|e| FeedError::invalid_address(input, format!("not a URL: {}", e)))?;

        match url.scheme() {
            "wss" | "ws" => {}
            other => {
                return Err(FeedError::invalid_address(
                    input,
                    format!("scheme must be wss or ws, got {}", other),
                ))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(FeedError::invalid_address(input, "missing host"));
        }

        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelayAddress {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RelayAddress> for String {
    fn from(address: RelayAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for RelayAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered set of relay addresses (insertion order, no duplicates)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySet {
    addresses: Vec<RelayAddress>,
}

impl RelaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding only `address`
    pub fn single(address: RelayAddress) -> Self {
        Self {
            addresses: vec![address],
        }
    }

    /// Build a set from raw strings, keeping the valid, unique entries in
    /// first-seen order. Returns the set and the rejected inputs.
    pub fn from_raw<I, S>(raw: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        let mut rejected = Vec::new();

        for entry in raw {
            let entry = entry.as_ref();
            match RelayAddress::parse(entry) {
                Ok(address) => {
                    set.insert(address);
                }
                Err(_) => rejected.push(entry.to_string()),
            }
        }

        (set, rejected)
    }

    /// Append an address. Returns false if it was already present.
    pub fn insert(&mut self, address: RelayAddress) -> bool {
        if self.contains(&address) {
            return false;
        }
        self.addresses.push(address);
        true
    }

    pub fn contains(&self, address: &RelayAddress) -> bool {
        self.addresses.iter().any(|a| a == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelayAddress> {
        self.addresses.iter()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }

    pub fn to_vec(&self) -> Vec<RelayAddress> {
        self.addresses.clone()
    }

    pub fn as_slice(&self) -> &[RelayAddress] {
        &self.addresses
    }

    fn to_strings(&self) -> Vec<&str> {
        self.addresses.iter().map(RelayAddress::as_str).collect()
    }
}

/// Persists a [`RelaySet`] under one storage key as a JSON string array
pub struct RelayStore<S: Storage> {
    storage: S,
    key: String,
}

impl<S: Storage> RelayStore<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_available()
    }

    /// Load the saved set. Missing, malformed, empty and all-invalid
    /// content all yield `None`.
    pub fn load(&self) -> Option<RelaySet> {
        if !self.storage.exists(&self.key) {
            debug!("No saved relays under {}", self.key);
            return None;
        }

        let bytes = match self.storage.read(&self.key) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read saved relays: {}", e);
                return None;
            }
        };

        let raw: Vec<String> = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ignoring malformed relay list under {}: {}", self.key, e);
                return None;
            }
        };

        let (set, rejected) = RelaySet::from_raw(&raw);
        if !rejected.is_empty() {
            warn!("Dropped {} invalid saved relay(s): {:?}", rejected.len(), rejected);
        }

        if set.is_empty() {
            info!("No valid relays in storage, using defaults");
            return None;
        }

        Some(set)
    }

    /// Load the saved set, or a set holding only `default`
    pub fn load_or(&self, default: &RelayAddress) -> RelaySet {
        self.load()
            .unwrap_or_else(|| RelaySet::single(default.clone()))
    }

    pub fn save(&self, relays: &RelaySet) -> Result<()> {
        let json = serde_json::to_vec(&relays.to_strings())?;
        self.storage
            .write(&self.key, &json)
            .map_err(|e| FeedError::Storage(e.to_string()))
    }

    /// Save, downgrading failures to a warning
    pub fn save_or_warn(&self, relays: &RelaySet) {
        if let Err(e) = self.save(relays) {
            warn!("Failed to save relays: {}", e);
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.storage
            .remove(&self.key)
            .map_err(|e| FeedError::Storage(e.to_string()))
    }
}
