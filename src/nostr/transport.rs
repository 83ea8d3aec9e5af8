//! Seam between the feed manager and the relay network

use crate::error::Result;
use crate::nostr::events::{FeedEvent, FeedFilter};
use crate::relays::RelayAddress;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound traffic for one subscription on one relay
#[derive(Debug, Clone, PartialEq)]
pub enum RelayNotice {
    Event(FeedEvent),
    /// The relay finished replaying stored events
    EndOfStoredEvents,
    /// The relay closed the subscription or the connection
    Closed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundNotice {
    pub relay: RelayAddress,
    pub notice: RelayNotice,
}

pub type NoticeSender = mpsc::UnboundedSender<InboundNotice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<InboundNotice>;

/// Relay connectivity used by [`RelayFeedManager`](crate::nostr::RelayFeedManager)
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// (Re)build the connection pool for `relays`
    async fn prepare(&self, relays: &[RelayAddress]) -> Result<()>;

    /// Open a subscription on a single relay. Inbound traffic goes to
    /// `sink` until the subscription is closed. Returns the subscription id.
    async fn open(
        &self,
        relay: &RelayAddress,
        filter: &FeedFilter,
        sink: NoticeSender,
    ) -> Result<String>;

    /// Close a subscription opened with [`open`](Self::open)
    async fn close(&self, relay: &RelayAddress, subscription_id: &str) -> Result<()>;

    /// Tear down the pool
    async fn shutdown(&self);
}
