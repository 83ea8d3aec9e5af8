//! Relay list and config persistence through the CLI's file storage

mod common;

use common::MockTransport;
use nostr_feed::config::CONFIG_KEY;
use nostr_feed::storage::{FileStorage, Storage};
use nostr_feed::{FeedConfig, RelayFeedManager};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

fn state_dir() -> PathBuf {
    std::env::temp_dir().join("nostr_feed_file_storage_tests")
}

fn fresh_storage() -> FileStorage {
    let dir = state_dir();
    let _ = fs::remove_dir_all(&dir);
    FileStorage::new(dir.to_str().unwrap()).unwrap()
}

fn reopen_storage() -> FileStorage {
    FileStorage::new(state_dir().to_str().unwrap()).unwrap()
}

#[test]
#[serial]
fn test_relays_survive_restart() {
    let storage = fresh_storage();
    let mut manager =
        RelayFeedManager::new(storage, MockTransport::new(), FeedConfig::default()).unwrap();
    manager.add_relay("wss://nos.lol").unwrap();
    manager.add_relay("ws://localhost:7777").unwrap();

    let on_disk = fs::read_to_string(state_dir().join("nostr-relays")).unwrap();
    assert_eq!(
        on_disk,
        r#"["wss://relay.damus.io","wss://nos.lol","ws://localhost:7777"]"#
    );

    let restarted =
        RelayFeedManager::new(reopen_storage(), MockTransport::new(), FeedConfig::default())
            .unwrap();
    assert_eq!(restarted.list_relays(), manager.list_relays());
}

#[test]
#[serial]
fn test_clear_removes_file() {
    let storage = fresh_storage();
    let mut manager =
        RelayFeedManager::new(storage, MockTransport::new(), FeedConfig::default()).unwrap();
    manager.add_relay("wss://nos.lol").unwrap();
    manager.clear_relays().unwrap();

    assert!(!state_dir().join("nostr-relays").exists());

    let restarted =
        RelayFeedManager::new(reopen_storage(), MockTransport::new(), FeedConfig::default())
            .unwrap();
    let relays: Vec<String> = restarted
        .list_relays()
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(relays, vec!["wss://relay.damus.io"]);
}

#[tokio::test]
#[serial]
async fn test_config_file_changes_key_and_default() {
    let storage = fresh_storage();
    storage
        .write(
            CONFIG_KEY,
            br#"{"storage_key":"my-relays","default_relay":"wss://relay.nostr.band"}"#,
        )
        .unwrap();

    let config = FeedConfig::load(&storage);
    let mut manager = RelayFeedManager::new(storage, MockTransport::new(), config).unwrap();
    manager.initialize().await.unwrap();

    let saved = fs::read_to_string(state_dir().join("my-relays")).unwrap();
    assert_eq!(saved, r#"["wss://relay.nostr.band"]"#);
    assert!(!state_dir().join("nostr-relays").exists());
}
