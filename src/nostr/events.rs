//! Nostr event and filter value types
//!
//! Relays hand us loosely shaped JSON; these types pin the fields the feed
//! needs and validate them once on receipt.

use crate::error::{FeedError, Result};
use serde::{Deserialize, Serialize};

/// Event received from a relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: String,
    pub pubkey: String,
    pub kind: u16,
    pub content: String,
    pub created_at: u64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub sig: String,
}

impl FeedEvent {
    /// Check id, author and signature encodings
    pub fn validate(&self) -> Result<()> {
        check_hex(&self.id, 32, "id")?;
        check_hex(&self.pubkey, 32, "pubkey")?;
        if !self.sig.is_empty() {
            check_hex(&self.sig, 64, "sig")?;
        }
        if self.tags.iter().any(Vec::is_empty) {
            return Err(FeedError::InvalidEvent(format!(
                "event {} has an empty tag",
                self.id
            )));
        }
        Ok(())
    }

    /// First 8 characters of the author key
    pub fn short_author(&self) -> &str {
        prefix(&self.pubkey, 8)
    }

    /// First 16 characters of the event id
    pub fn short_id(&self) -> &str {
        prefix(&self.id, 16)
    }

    /// Content truncated to `max_chars` characters, with `...` appended
    /// when something was cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((end, _)) => format!("{}...", &self.content[..end]),
            None => self.content.clone(),
        }
    }
}

fn check_hex(value: &str, bytes: usize, field: &str) -> Result<()> {
    let decoded = hex::decode(value)
        .map_err(|e| FeedError::InvalidEvent(format!("{} is not hex: {}", field, e)))?;
    if decoded.len() != bytes {
        return Err(FeedError::InvalidEvent(format!(
            "{} must be {} bytes, got {}",
            field,
            bytes,
            decoded.len()
        )));
    }
    Ok(())
}

fn prefix(s: &str, chars: usize) -> &str {
    match s.char_indices().nth(chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Subscription filter sent to relays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFilter {
    pub kinds: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
}

impl FeedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest 50 text notes (kind 1)
    pub fn text_notes() -> Self {
        Self::new().kinds(vec![1]).limit(50)
    }

    pub fn kinds(mut self, kinds: Vec<u16>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether a relay's event actually satisfies this filter; relays are
    /// not trusted to apply it.
    pub fn matches(&self, event: &FeedEvent) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && self.since.map_or(true, |since| event.created_at >= since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeedEvent {
        FeedEvent {
            id: "a".repeat(64),
            pubkey: "b".repeat(64),
            kind: 1,
            content: "hello relay".to_string(),
            created_at: 1_700_000_000,
            tags: vec![
                vec!["p".to_string(), "c".repeat(64)],
                vec!["t".to_string(), "nostr".to_string()],
            ],
            sig: "d".repeat(128),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_event() {
        assert!(sample().validate().is_ok());

        let mut unsigned = sample();
        unsigned.sig.clear();
        assert!(unsigned.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut short_id = sample();
        short_id.id = "abcd".to_string();
        assert!(matches!(short_id.validate(), Err(FeedError::InvalidEvent(_))));

        let mut bad_pubkey = sample();
        bad_pubkey.pubkey = "z".repeat(64);
        assert!(bad_pubkey.validate().is_err());

        let mut empty_tag = sample();
        empty_tag.tags.push(vec![]);
        assert!(empty_tag.validate().is_err());
    }

    #[test]
    fn test_display_helpers() {
        let mut event = sample();
        assert_eq!(event.short_author(), "bbbbbbbb");
        assert_eq!(event.short_id(), "a".repeat(16));
        assert_eq!(event.preview(100), "hello relay");
        assert_eq!(event.preview(5), "hello...");

        event.content = "äöü".repeat(50);
        assert_eq!(event.preview(3), "äöü...");
    }

    #[test]
    fn test_filter_builder_and_matching() {
        let filter = FeedFilter::text_notes();
        assert_eq!(filter.kinds, vec![1]);
        assert_eq!(filter.limit, Some(50));
        assert!(filter.matches(&sample()));

        let mut reaction = sample();
        reaction.kind = 7;
        assert!(!filter.matches(&reaction));

        let recent = FeedFilter::new().since(1_800_000_000);
        assert!(!recent.matches(&sample()));
        assert!(FeedFilter::new().matches(&reaction));
    }
}
