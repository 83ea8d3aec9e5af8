//! Consumer-side feed helpers
//!
//! The manager delivers an event once per relay that forwards it. Consumers
//! either wrap their handler with [`dedup`] or collect into a [`FeedBuffer`].

use crate::nostr::events::FeedEvent;
use crate::relays::RelayAddress;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Wrap `handler` so each event id is forwarded only once
pub fn dedup<F>(mut handler: F) -> impl FnMut(&RelayAddress, FeedEvent) + Send + 'static
where
    F: FnMut(&RelayAddress, FeedEvent) + Send + 'static,
{
    let mut seen = HashSet::new();
    move |relay, event| {
        if seen.insert(event.id.clone()) {
            handler(relay, event);
        }
    }
}

/// Newest-first event list without duplicate ids
#[derive(Debug, Default)]
pub struct FeedBuffer {
    events: VecDeque<FeedEvent>,
    ids: HashSet<String>,
    capacity: Option<usize>,
}

impl FeedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer that drops its oldest entry once `capacity` is reached
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Put `event` at the front unless its id is already buffered.
    /// Returns true if it was inserted.
    pub fn insert(&mut self, event: FeedEvent) -> bool {
        if self.ids.contains(&event.id) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            while self.events.len() >= capacity {
                if let Some(oldest) = self.events.pop_back() {
                    self.ids.remove(&oldest.id);
                }
            }
        }

        self.ids.insert(event.id.clone());
        self.events.push_front(event);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Events, newest first
    pub fn events(&self) -> impl Iterator<Item = &FeedEvent> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&FeedEvent> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.ids.clear();
    }
}

pub type SharedFeed = Arc<Mutex<FeedBuffer>>;

/// Handler that inserts every event into `feed`
pub fn buffered(feed: SharedFeed) -> impl FnMut(&RelayAddress, FeedEvent) + Send + 'static {
    move |_relay, event| {
        if let Ok(mut buffer) = feed.lock() {
            buffer.insert(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> FeedEvent {
        FeedEvent {
            id: id.to_string(),
            pubkey: "b".repeat(64),
            kind: 1,
            content: format!("note {}", id),
            created_at: 1_700_000_000,
            tags: Vec::new(),
            sig: String::new(),
        }
    }

    fn relay(url: &str) -> RelayAddress {
        RelayAddress::parse(url).unwrap()
    }

    #[test]
    fn test_buffer_is_newest_first_and_unique() {
        let mut buffer = FeedBuffer::new();
        assert!(buffer.insert(event("e1")));
        assert!(buffer.insert(event("e2")));
        assert!(!buffer.insert(event("e1")));

        let ids: Vec<_> = buffer.events().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1"]);
        assert_eq!(buffer.latest().unwrap().id, "e2");
        assert!(buffer.contains("e1"));
    }

    #[test]
    fn test_buffer_capacity_drops_oldest() {
        let mut buffer = FeedBuffer::with_capacity(2);
        buffer.insert(event("e1"));
        buffer.insert(event("e2"));
        buffer.insert(event("e3"));

        assert_eq!(buffer.len(), 2);
        assert!(!buffer.contains("e1"));
        // An evicted id may come back
        assert!(buffer.insert(event("e1")));
    }

    #[test]
    fn test_buffer_clear() {
        let mut buffer = FeedBuffer::new();
        buffer.insert(event("e1"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.insert(event("e1")));
    }

    #[test]
    fn test_dedup_forwards_first_copy_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut handler = dedup(move |relay: &RelayAddress, event: FeedEvent| {
            sink.lock().unwrap().push((relay.to_string(), event.id));
        });

        handler(&relay("wss://a.example"), event("e1"));
        handler(&relay("wss://b.example"), event("e1"));
        handler(&relay("wss://b.example"), event("e2"));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("wss://a.example".to_string(), "e1".to_string()),
                ("wss://b.example".to_string(), "e2".to_string()),
            ]
        );
    }

    #[test]
    fn test_buffered_handler() {
        let feed: SharedFeed = Arc::default();
        let mut handler = buffered(Arc::clone(&feed));

        handler(&relay("wss://a.example"), event("e1"));
        handler(&relay("wss://b.example"), event("e1"));

        assert_eq!(feed.lock().unwrap().len(), 1);
    }
}
