//! Nostr client for relay communication
//!
//! Implements [`RelayTransport`] on top of `nostr-sdk`: one pool client,
//! one relay-scoped subscription per `open`, and a forwarder task per
//! subscription routing relay frames into the manager's channel.

use crate::error::{FeedError, Result};
use crate::nostr::events::{FeedEvent, FeedFilter};
use crate::nostr::transport::{InboundNotice, NoticeSender, RelayNotice, RelayTransport};
use crate::relays::RelayAddress;
use async_trait::async_trait;
use nostr_sdk::prelude::{
    Client, Event, Filter, Kind, RelayMessage, RelayPoolNotification, SubscriptionId, Timestamp,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// `nostr-sdk` backed relay transport
#[derive(Default)]
pub struct NostrTransport {
    client: RwLock<Option<Client>>,
    forwarders: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl NostrTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn current_client(&self) -> Result<Client> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(FeedError::NotInitialized)
    }

    fn abort_forwarders(&self) {
        if let Ok(mut forwarders) = self.forwarders.lock() {
            for (_, task) in forwarders.drain() {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl RelayTransport for NostrTransport {
    async fn prepare(&self, relays: &[RelayAddress]) -> Result<()> {
        let client = Client::default();

        for relay in relays {
            if let Err(e) = client.add_relay(relay.as_str()).await {
                warn!("Failed to add relay {}: {}", relay, e);
            }
        }
        client.connect().await;

        let previous = self.client.write().await.replace(client);
        if let Some(previous) = previous {
            self.abort_forwarders();
            previous.disconnect().await.ok();
            info!("Replaced relay pool");
        }

        Ok(())
    }

    async fn open(
        &self,
        relay: &RelayAddress,
        filter: &FeedFilter,
        sink: NoticeSender,
    ) -> Result<String> {
        let client = self.current_client().await?;

        client
            .add_relay(relay.as_str())
            .await
            .map_err(|e| FeedError::relay_connection(relay, e))?;
        client
            .connect_relay(relay.as_str())
            .await
            .map_err(|e| FeedError::relay_connection(relay, e))?;

        // Listen before sending REQ so the first stored events are not missed
        let notifications = client.notifications();
        let output = client
            .subscribe_to(vec![relay.as_str()], vec![to_nostr_filter(filter)], None)
            .await
            .map_err(|e| FeedError::relay_connection(relay, e))?;

        let subscription_id = output.val;
        let id = subscription_id.to_string();
        debug!("Opened subscription {} on {}", id, relay);

        let task = tokio::spawn(forward(notifications, subscription_id, relay.clone(), sink));
        if let Ok(mut forwarders) = self.forwarders.lock() {
            forwarders.insert(id.clone(), task);
        }

        Ok(id)
    }

    async fn close(&self, relay: &RelayAddress, subscription_id: &str) -> Result<()> {
        let task = self
            .forwarders
            .lock()
            .ok()
            .and_then(|mut forwarders| forwarders.remove(subscription_id));
        if let Some(task) = task {
            task.abort();
        }

        let client = self.current_client().await?;
        let handle = client
            .relay(relay.as_str())
            .await
            .map_err(|e| FeedError::relay_connection(relay, e))?;
        handle
            .unsubscribe(SubscriptionId::new(subscription_id))
            .await
            .map_err(|e| FeedError::relay_connection(relay, e))?;

        debug!("Closed subscription {} on {}", subscription_id, relay);
        Ok(())
    }

    async fn shutdown(&self) {
        self.abort_forwarders();
        if let Some(client) = self.client.write().await.take() {
            client.disconnect().await.ok();
            info!("Relay pool shut down");
        }
    }
}

/// Route pool notifications for one subscription into the manager channel
async fn forward(
    mut notifications: broadcast::Receiver<RelayPoolNotification>,
    subscription_id: SubscriptionId,
    relay: RelayAddress,
    sink: NoticeSender,
) {
    loop {
        let notification = match notifications.recv().await {
            Ok(notification) => notification,
            Err(RecvError::Lagged(count)) => {
                warn!("Notifications for {} lagged, dropped {} messages", relay, count);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        // `RelayPoolNotification::Event` only fires the first time the pool
        // sees an id, so every subscription reads the raw frames instead.
        let notice = match notification {
            RelayPoolNotification::Message {
                message:
                    RelayMessage::Event {
                        subscription_id: id,
                        event,
                    },
                ..
            } if id == subscription_id => RelayNotice::Event(to_feed_event(&event)),
            RelayPoolNotification::Message {
                message: RelayMessage::EndOfStoredEvents(id),
                ..
            } if id == subscription_id => RelayNotice::EndOfStoredEvents,
            RelayPoolNotification::Message {
                message:
                    RelayMessage::Closed {
                        subscription_id: id,
                        message,
                    },
                ..
            } if id == subscription_id => RelayNotice::Closed(message),
            RelayPoolNotification::Shutdown => {
                let _ = sink.send(InboundNotice {
                    relay: relay.clone(),
                    notice: RelayNotice::Closed("relay pool shut down".to_string()),
                });
                break;
            }
            _ => continue,
        };

        if sink
            .send(InboundNotice {
                relay: relay.clone(),
                notice,
            })
            .is_err()
        {
            break;
        }
    }
}

/// Convert a filter to its `nostr-sdk` form
pub fn to_nostr_filter(filter: &FeedFilter) -> Filter {
    let mut nostr_filter = Filter::new().kinds(filter.kinds.iter().copied().map(Kind::from));
    if let Some(limit) = filter.limit {
        nostr_filter = nostr_filter.limit(limit);
    }
    if let Some(since) = filter.since {
        nostr_filter = nostr_filter.since(Timestamp::from(since));
    }
    nostr_filter
}

/// Convert a `nostr-sdk` event to a [`FeedEvent`]
pub fn to_feed_event(event: &Event) -> FeedEvent {
    FeedEvent {
        id: event.id.to_hex(),
        pubkey: event.pubkey.to_hex(),
        kind: event.kind.as_u16(),
        content: event.content.clone(),
        created_at: event.created_at.as_u64(),
        tags: event
            .tags
            .iter()
            .map(|tag| tag.as_slice().to_vec())
            .collect(),
        sig: event.sig.to_string(),
    }
}
