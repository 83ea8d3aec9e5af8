//! Shared helpers for integration tests: a scripted relay transport and
//! event builders.

#![allow(dead_code)]

use async_trait::async_trait;
use nostr_feed::nostr::{FeedEvent, FeedFilter, InboundNotice, NoticeSender, RelayNotice, RelayTransport};
use nostr_feed::relays::RelayAddress;
use nostr_feed::storage::Storage;
use nostr_feed::{FeedError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    prepares: Vec<Vec<String>>,
    failing_opens: HashSet<String>,
    failing_closes: HashSet<String>,
    opens: Vec<String>,
    closes: Vec<(String, String)>,
    sinks: Vec<(RelayAddress, NoticeSender)>,
    shutdowns: usize,
    next_id: u64,
}

/// Relay transport that records calls and lets tests inject traffic
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_open(&self, relay: &str) {
        self.state.lock().unwrap().failing_opens.insert(relay.to_string());
    }

    pub fn fail_close(&self, relay: &str) {
        self.state.lock().unwrap().failing_closes.insert(relay.to_string());
    }

    pub fn prepares(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().prepares.clone()
    }

    /// Relays for which `open` was called, in call order
    pub fn opens(&self) -> Vec<String> {
        self.state.lock().unwrap().opens.clone()
    }

    /// (relay, subscription id) pairs passed to `close`
    pub fn closes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().closes.clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    /// Push a notice from `relay` to every subscription opened on it.
    /// Returns how many channels accepted it.
    pub fn emit(&self, relay: &str, notice: RelayNotice) -> usize {
        let state = self.state.lock().unwrap();
        state
            .sinks
            .iter()
            .filter(|(address, _)| address.as_str() == relay)
            .filter(|(address, sink)| {
                sink.send(InboundNotice {
                    relay: address.clone(),
                    notice: notice.clone(),
                })
                .is_ok()
            })
            .count()
    }

    pub fn emit_event(&self, relay: &str, event: FeedEvent) -> usize {
        self.emit(relay, RelayNotice::Event(event))
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn prepare(&self, relays: &[RelayAddress]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .prepares
            .push(relays.iter().map(|r| r.to_string()).collect());
        Ok(())
    }

    async fn open(
        &self,
        relay: &RelayAddress,
        _filter: &FeedFilter,
        sink: NoticeSender,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.opens.push(relay.to_string());

        if state.failing_opens.contains(relay.as_str()) {
            return Err(FeedError::RelayConnection {
                relay: relay.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        state.next_id += 1;
        let id = format!("sub-{}", state.next_id);
        state.sinks.push((relay.clone(), sink));
        Ok(id)
    }

    async fn close(&self, relay: &RelayAddress, subscription_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .closes
            .push((relay.to_string(), subscription_id.to_string()));

        if state.failing_closes.contains(relay.as_str()) {
            return Err(FeedError::RelayConnection {
                relay: relay.to_string(),
                reason: "socket already gone".to_string(),
            });
        }
        // Sinks are kept: a relay may still have frames in flight
        Ok(())
    }

    async fn shutdown(&self) {
        self.state.lock().unwrap().shutdowns += 1;
    }
}

/// Storage backend that is never available (no browser window)
pub struct UnavailableStorage;

impl Storage for UnavailableStorage {
    fn read(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("Key not found: {}", key)
    }

    fn write(&self, _key: &str, _data: &[u8]) -> anyhow::Result<()> {
        anyhow::bail!("localStorage not available")
    }

    fn remove(&self, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("localStorage not available")
    }

    fn exists(&self, _key: &str) -> bool {
        false
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Valid text note whose id is derived from `n`
pub fn text_note(n: u8) -> FeedEvent {
    FeedEvent {
        id: format!("{:064x}", n),
        pubkey: "ab".repeat(32),
        kind: 1,
        content: format!("note number {}", n),
        created_at: 1_700_000_000 + u64::from(n),
        tags: vec![vec!["t".to_string(), "test".to_string()]],
        sig: String::new(),
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Give the dispatcher a moment to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
