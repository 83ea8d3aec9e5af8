use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use nostr_feed::feed::{self, FeedBuffer, SharedFeed};
use nostr_feed::nostr::{FeedEvent, NostrTransport, RelayFeedManager};
use nostr_feed::relays::RelayAddress;
use nostr_feed::storage::FileStorage;
use nostr_feed::{FeedConfig, FeedError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nostr-feed")]
#[command(about = "Nostr relay feed - manage relays and follow event feeds", long_about = None)]
struct Cli {
    /// Directory holding the saved relay list and feed_config.json
    #[arg(long, global = true, default_value = ".nostr_feed_state")]
    state_dir: String,

    /// Relay used when no valid relay is saved (overrides feed_config.json)
    #[arg(long, global = true)]
    default_relay: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved relays
    RelaysList,

    /// Add a relay (ws:// or wss://)
    RelaysAdd {
        /// Relay URL
        #[arg(long)]
        url: String,
    },

    /// Forget saved relays (the default relay is used afterwards)
    RelaysClear,

    /// Subscribe to all saved relays and print incoming events
    Feed {
        /// Event kinds to request (repeatable, defaults to feed_config.json)
        #[arg(long = "kind")]
        kinds: Vec<u16>,

        /// Maximum number of stored events per relay
        #[arg(long)]
        limit: Option<usize>,

        /// How long to listen before unsubscribing
        #[arg(long, default_value = "30")]
        seconds: u64,

        /// Print events as JSON lines
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let storage = FileStorage::new(&cli.state_dir)
        .with_context(|| format!("Failed to open state directory {}", cli.state_dir))?;
    let mut config = FeedConfig::load(&storage);
    if let Some(default_relay) = cli.default_relay {
        config.default_relay = default_relay;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let transport = Arc::new(NostrTransport::new());
    let mut manager = RelayFeedManager::new(storage, transport, config)?;

    match cli.command {
        Commands::RelaysList => {
            print_relays(&manager.list_relays());
        }
        Commands::RelaysAdd { url } => match manager.add_relay(&url) {
            Ok(relay) => {
                println!("Added {}", relay);
                print_relays(&manager.list_relays());
            }
            Err(e @ FeedError::DuplicateAddress(_)) => println!("{}", e),
            Err(e) => return Err(e.into()),
        },
        Commands::RelaysClear => {
            manager.clear_relays()?;
            println!("Cleared saved relays");
        }
        Commands::Feed {
            kinds,
            limit,
            seconds,
            json,
        } => {
            let mut filter = manager.config().default_filter();
            if !kinds.is_empty() {
                filter = filter.kinds(kinds);
            }
            if let Some(limit) = limit {
                filter = filter.limit(limit);
            }

            runtime.block_on(async {
                manager.initialize().await?;

                let buffer: SharedFeed = Arc::new(Mutex::new(FeedBuffer::new()));
                let printer = feed::dedup({
                    let buffer = Arc::clone(&buffer);
                    move |relay: &RelayAddress, event: FeedEvent| {
                        print_event(relay, &event, json);
                        if let Ok(mut buffer) = buffer.lock() {
                            buffer.insert(event);
                        }
                    }
                });

                let handle = manager.subscribe(filter, printer).await?;
                if handle.is_dead() {
                    manager.shutdown().await;
                    bail!(
                        "No relay accepted the subscription: {}",
                        handle
                            .failures()
                            .iter()
                            .map(|f| format!("{} ({})", f.relay, f.reason))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }

                tokio::time::sleep(Duration::from_secs(seconds)).await;

                let mut failures = handle.unsubscribe().await;
                failures.extend(manager.shutdown().await);
                for failure in failures {
                    eprintln!("Failed to close {}: {}", failure.relay, failure.reason);
                }

                let received = buffer.lock().map(|b| b.len()).unwrap_or_default();
                eprintln!("Received {} unique event(s)", received);
                Ok::<(), anyhow::Error>(())
            })?;
        }
    }

    Ok(())
}

fn print_relays(relays: &[RelayAddress]) {
    for relay in relays {
        println!("{}", relay);
    }
}

fn print_event(relay: &RelayAddress, event: &FeedEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
        return;
    }

    println!(
        "[{}] {}... at {} via {}",
        event.short_id(),
        event.short_author(),
        format_timestamp(event.created_at),
        relay
    );
    println!("    {}", event.preview(100));
}

/// Local date and time for an event timestamp (seconds since the epoch)
fn format_timestamp(created_at: u64) -> String {
    i64::try_from(created_at)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| created_at.to_string())
}
