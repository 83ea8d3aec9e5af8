//! Relay feed manager
//!
//! Owns the relay list, opens one subscription per relay for a filter and
//! hands inbound events to a caller-supplied handler. Per-relay failures
//! never abort the whole operation; they are collected as [`RelayFailure`]
//! records on the returned [`SubscriptionHandle`].
//!
//! Lifecycle: [`RelayFeedManager::new`] -> [`initialize`] -> any number of
//! [`subscribe`] / [`disconnect`] -> [`shutdown`].
//!
//! [`initialize`]: RelayFeedManager::initialize
//! [`subscribe`]: RelayFeedManager::subscribe
//! [`disconnect`]: RelayFeedManager::disconnect
//! [`shutdown`]: RelayFeedManager::shutdown

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::nostr::events::{FeedEvent, FeedFilter};
use crate::nostr::transport::{NoticeReceiver, RelayNotice, RelayTransport};
use crate::relays::{RelayAddress, RelaySet, RelayStore};
use crate::storage::Storage;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A relay that could not be subscribed or unsubscribed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub relay: RelayAddress,
    pub reason: String,
}

impl RelayFailure {
    fn new(relay: &RelayAddress, error: FeedError) -> Self {
        let reason = match error {
            FeedError::RelayConnection { reason, .. } => reason,
            other => other.to_string(),
        };
        Self {
            relay: relay.clone(),
            reason,
        }
    }
}

impl From<RelayFailure> for FeedError {
    fn from(failure: RelayFailure) -> Self {
        FeedError::relay_connection(failure.relay, failure.reason)
    }
}

/// Per-relay subscription that was opened successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub relay: RelayAddress,
    pub subscription_id: String,
}

struct HandleInner {
    transport: Arc<dyn RelayTransport>,
    filter: FeedFilter,
    active: Vec<ActiveSubscription>,
    failures: Vec<RelayFailure>,
    cancelled: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Caller-held handle for the subscriptions opened by one `subscribe` call
///
/// Clones share state: cancelling any clone cancels all of them.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    pub fn filter(&self) -> &FeedFilter {
        &self.inner.filter
    }

    /// Relays whose subscription opened
    pub fn active(&self) -> &[ActiveSubscription] {
        &self.inner.active
    }

    /// Relays whose subscription failed to open
    pub fn failures(&self) -> &[RelayFailure] {
        &self.inner.failures
    }

    /// True when no relay accepted the subscription; such a handle never
    /// delivers events.
    pub fn is_dead(&self) -> bool {
        self.inner.active.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Close every per-relay subscription.
    ///
    /// Only the first call does any work; later calls return an empty list.
    /// A failing relay does not stop the others from being closed.
    pub async fn unsubscribe(&self) -> Vec<RelayFailure> {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        let closes = self.inner.active.iter().map(|sub| async move {
            self.inner
                .transport
                .close(&sub.relay, &sub.subscription_id)
                .await
                .map_err(|e| RelayFailure::new(&sub.relay, e))
        });

        let failures: Vec<RelayFailure> = join_all(closes)
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .collect();

        for failure in &failures {
            warn!(
                "Failed to close subscription on {}: {}",
                failure.relay, failure.reason
            );
        }

        let dispatcher = self
            .inner
            .dispatcher
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(task) = dispatcher {
            task.abort();
        }

        debug!(
            "Unsubscribed from {} relay(s), {} close failure(s)",
            self.inner.active.len(),
            failures.len()
        );
        failures
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("filter", &self.inner.filter)
            .field("active", &self.inner.active)
            .field("failures", &self.inner.failures)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Relay list owner and subscription front end
pub struct RelayFeedManager<S: Storage> {
    config: FeedConfig,
    default_relay: RelayAddress,
    store: RelayStore<S>,
    relays: RelaySet,
    transport: Arc<dyn RelayTransport>,
    initialized: bool,
    subscriptions: Vec<SubscriptionHandle>,
}

impl<S: Storage> RelayFeedManager<S> {
    /// Create a manager, loading any saved relay list.
    ///
    /// Fails only if the configured default relay is itself invalid.
    pub fn new(storage: S, transport: Arc<dyn RelayTransport>, config: FeedConfig) -> Result<Self> {
        let default_relay = RelayAddress::parse(&config.default_relay)?;
        let store = RelayStore::new(storage, config.storage_key.clone());
        let relays = if store.is_available() {
            store.load_or(&default_relay)
        } else {
            RelaySet::single(default_relay.clone())
        };

        Ok(Self {
            config,
            default_relay,
            store,
            relays,
            transport,
            initialized: false,
            subscriptions: Vec::new(),
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handles created by this manager and not yet cancelled
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions
            .iter()
            .filter(|handle| !handle.is_cancelled())
            .count()
    }

    /// Check the environment, reload and persist the relay list, and
    /// prepare the connection pool.
    ///
    /// Calling this again reinitializes: open subscriptions are closed and
    /// the pool is rebuilt.
    pub async fn initialize(&mut self) -> Result<()> {
        if !self.store.is_available() {
            return Err(FeedError::Environment(
                "local storage is not available".to_string(),
            ));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(FeedError::Environment(
                "relay connections need a Tokio runtime".to_string(),
            ));
        }

        if self.initialized {
            info!("Reinitializing relay feed manager");
            self.disconnect().await;
        }

        self.relays = self.store.load_or(&self.default_relay);
        self.store.save_or_warn(&self.relays);

        self.transport.prepare(self.relays.as_slice()).await?;
        self.initialized = true;

        info!(
            "Relay feed manager initialized with {} relay(s): {:?}",
            self.relays.len(),
            self.relays.iter().map(RelayAddress::as_str).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Add a relay and persist the list.
    ///
    /// Invalid and duplicate addresses leave the list unchanged; the error
    /// is returned and logged as a warning.
    pub fn add_relay(&mut self, address: &str) -> Result<RelayAddress> {
        let relay = match RelayAddress::parse(address) {
            Ok(relay) => relay,
            Err(e) => {
                warn!("Rejected relay address: {}", e);
                return Err(e);
            }
        };

        if !self.relays.insert(relay.clone()) {
            warn!("Relay already configured: {}", relay);
            return Err(FeedError::DuplicateAddress(relay.to_string()));
        }

        self.store.save_or_warn(&self.relays);
        info!("Added relay {}", relay);
        Ok(relay)
    }

    /// Owned copy of the relay list, in insertion order
    pub fn list_relays(&self) -> Vec<RelayAddress> {
        self.relays.to_vec()
    }

    /// Forget the saved relay list. The default relay is used again at the
    /// next `initialize` or `subscribe`.
    pub fn clear_relays(&mut self) -> Result<()> {
        self.store.clear()?;
        self.relays.clear();
        info!("Cleared saved relays");
        Ok(())
    }

    /// Open one subscription per relay for `filter`.
    ///
    /// `on_event` receives every valid event with the relay that sent it,
    /// as it arrives. The same event may arrive once per relay; wrap the
    /// handler with [`crate::feed::dedup`] to see each id once.
    pub async fn subscribe<F>(&mut self, filter: FeedFilter, on_event: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(&RelayAddress, FeedEvent) + Send + 'static,
    {
        if !self.initialized {
            return Err(FeedError::NotInitialized);
        }

        if self.relays.is_empty() {
            info!("No relays configured, falling back to {}", self.default_relay);
            self.relays = RelaySet::single(self.default_relay.clone());
            self.store.save_or_warn(&self.relays);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let relays = self.relays.to_vec();

        let opens = relays.iter().map(|relay| {
            let transport = Arc::clone(&self.transport);
            let filter = &filter;
            let tx = tx.clone();
            async move { (relay, transport.open(relay, filter, tx).await) }
        });

        let mut active = Vec::new();
        let mut failures = Vec::new();
        for (relay, outcome) in join_all(opens).await {
            match outcome {
                Ok(subscription_id) => {
                    debug!("Subscribed on {} ({})", relay, subscription_id);
                    active.push(ActiveSubscription {
                        relay: relay.clone(),
                        subscription_id,
                    });
                }
                Err(e) => {
                    warn!("Failed to create subscription for {}: {}", relay, e);
                    failures.push(RelayFailure::new(relay, e));
                }
            }
        }
        // Only transports hold senders from here on
        drop(tx);

        if active.is_empty() {
            error!(
                "No relay accepted the subscription ({} failure(s))",
                failures.len()
            );
        } else {
            info!(
                "Subscribed to kinds {:?} on {} of {} relay(s)",
                filter.kinds,
                active.len(),
                relays.len()
            );
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let dispatcher = tokio::spawn(dispatch(
            rx,
            filter.clone(),
            Arc::clone(&cancelled),
            on_event,
        ));

        let handle = SubscriptionHandle {
            inner: Arc::new(HandleInner {
                transport: Arc::clone(&self.transport),
                filter,
                active,
                failures,
                cancelled,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        };

        self.subscriptions.retain(|handle| !handle.is_cancelled());
        self.subscriptions.push(handle.clone());
        Ok(handle)
    }

    /// Close every subscription created by this manager. The relay list and
    /// the pool are kept.
    pub async fn disconnect(&mut self) -> Vec<RelayFailure> {
        let handles = std::mem::take(&mut self.subscriptions);
        let mut failures = Vec::new();
        for handle in &handles {
            failures.extend(handle.unsubscribe().await);
        }

        if !handles.is_empty() {
            info!("Disconnected {} subscription(s)", handles.len());
        }
        failures
    }

    /// Disconnect and tear down the pool. The manager must be initialized
    /// again before the next `subscribe`.
    pub async fn shutdown(&mut self) -> Vec<RelayFailure> {
        let failures = self.disconnect().await;
        self.transport.shutdown().await;
        self.initialized = false;
        failures
    }
}

/// Deliver notices to `on_event` until cancelled or every sender is gone.
/// Events that fail validation or fall outside `filter` are dropped.
async fn dispatch<F>(
    mut rx: NoticeReceiver,
    filter: FeedFilter,
    cancelled: Arc<AtomicBool>,
    mut on_event: F,
) where
    F: FnMut(&RelayAddress, FeedEvent) + Send + 'static,
{
    while let Some(inbound) = rx.recv().await {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }

        match inbound.notice {
            RelayNotice::Event(event) => match event.validate() {
                Ok(()) if filter.matches(&event) => on_event(&inbound.relay, event),
                Ok(()) => debug!(
                    "Dropping event {} of kind {} from {}: outside the filter",
                    event.short_id(),
                    event.kind,
                    inbound.relay
                ),
                Err(e) => debug!("Dropping event from {}: {}", inbound.relay, e),
            },
            RelayNotice::EndOfStoredEvents => {
                info!("End of stored events from {}", inbound.relay)
            }
            RelayNotice::Closed(reason) => {
                info!("Connection to {} closed: {}", inbound.relay, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nostr::transport::NoticeSender;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;

    /// Transport whose opens and closes always succeed
    struct AcceptingTransport;

    #[async_trait]
    impl RelayTransport for AcceptingTransport {
        async fn prepare(&self, _relays: &[RelayAddress]) -> Result<()> {
            Ok(())
        }

        async fn open(
            &self,
            _relay: &RelayAddress,
            _filter: &FeedFilter,
            _sink: NoticeSender,
        ) -> Result<String> {
            Ok("sub".to_string())
        }

        async fn close(&self, _relay: &RelayAddress, _subscription_id: &str) -> Result<()> {
            Ok(())
        }

        async fn shutdown(&self) {}
    }

    #[tokio::test]
    async fn test_cancelled_handles_are_not_retained() {
        let mut manager = RelayFeedManager::new(
            MemoryStorage::new(),
            Arc::new(AcceptingTransport),
            FeedConfig::default(),
        )
        .unwrap();
        manager.initialize().await.unwrap();

        for _ in 0..20 {
            let handle = manager
                .subscribe(FeedFilter::text_notes(), |_: &RelayAddress, _: FeedEvent| {})
                .await
                .unwrap();
            handle.unsubscribe().await;
        }
        assert!(manager.subscriptions.len() <= 1);
        assert_eq!(manager.active_subscriptions(), 0);

        let _live = manager
            .subscribe(FeedFilter::text_notes(), |_: &RelayAddress, _: FeedEvent| {})
            .await
            .unwrap();
        assert_eq!(manager.subscriptions.len(), 1);
        assert_eq!(manager.active_subscriptions(), 1);
    }

    #[test]
    fn test_relay_failure_keeps_reason() {
        let relay = RelayAddress::parse("wss://down.example").unwrap();
        let failure = RelayFailure::new(
            &relay,
            FeedError::relay_connection(&relay, "connection refused"),
        );
        assert_eq!(failure.reason, "connection refused");

        let error: FeedError = failure.into();
        assert_eq!(
            error.to_string(),
            "Relay connection error on wss://down.example: connection refused"
        );
    }

    #[test]
    fn test_relay_failure_from_other_errors() {
        let relay = RelayAddress::parse("wss://down.example").unwrap();
        let failure = RelayFailure::new(&relay, FeedError::NotInitialized);
        assert_eq!(failure.reason, "Relay feed manager not initialized");
    }
}
