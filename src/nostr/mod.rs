//! Nostr module for relay-based event feeds
//!
//! Provides:
//! - Event and filter types validated at the relay boundary
//! - The transport seam and its `nostr-sdk` implementation
//! - The relay feed manager and subscription handles

pub mod client;
pub mod events;
pub mod manager;
pub mod transport;

pub use client::NostrTransport;
pub use events::{FeedEvent, FeedFilter};
pub use manager::{ActiveSubscription, RelayFailure, RelayFeedManager, SubscriptionHandle};
pub use transport::{InboundNotice, NoticeReceiver, NoticeSender, RelayNotice, RelayTransport};
