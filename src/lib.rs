pub mod config;
pub mod error;
pub mod feed;
pub mod nostr;
pub mod notes;
pub mod relays;
pub mod storage;
pub mod wasm;

pub use config::{FeedConfig, DEFAULT_RELAY};
pub use error::{FeedError, Result};
pub use feed::{FeedBuffer, SharedFeed};
pub use nostr::{FeedEvent, FeedFilter, RelayFeedManager, SubscriptionHandle};
pub use relays::{RelayAddress, RelaySet, RelayStore};

// Re-export WASM functions
pub use wasm::*;
