#![deny(dead_code)] // DO NOT REMOVE THIS EVER
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

mod utils;

use chatsync::{
    config::{default_config_path, load_config, save_config},
    DeleteOutcome, HttpRemote, MessageRef, Notice, SendOutcome, SyncEngine, SyncError, TombstoneStore,
};

/// Command line arguments for chatsync
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "chatsync: an offline-tolerant chat client.",
    long_about = "chatsync keeps a local view of one conversation and reconciles it with the message \
    service whenever the service is reachable. Deletions made offline are replayed later.\n\n\
    Commands once running:\n\
    /refresh      Check the service, replay pending deletions and refetch history\n\
    /list         Show the conversation\n\
    /delete N     Delete the N-th message shown by /list\n\
    /pending      Show deletions not yet confirmed by the server\n\
    /quit         Exit\n\
    Anything else is sent as a message."
)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL of the message service
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Local participant identity
    #[arg(long)]
    sender: Option<String>,

    /// Peer participant identity
    #[arg(long)]
    receiver: Option<String>,

    /// File holding pending deletions
    #[arg(long, value_name = "PATH")]
    tombstones: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Write the effective settings back to the config file before starting
    #[arg(long)]
    save_config: bool,
}

fn print_conversation(engine: &SyncEngine) {
    let identity = engine.identity();
    if engine.cache().is_empty() {
        println!("(no messages)");
        return;
    }
    for (position, message) in engine.cache().ordered().iter().enumerate() {
        let id = if message.is_provisional() {
            "unsent".to_string()
        } else {
            format!("#{}", message.id)
        };
        let who = if message.is_outgoing(identity) { ">>" } else { "<<" };
        println!("{:>3}. {} {} [{}] {}", position + 1, who, message.sender, id, message.text);
    }
}

fn drain_notices(notice_rx: &mut mpsc::Receiver<Notice>) {
    while let Ok(notice) = notice_rx.try_recv() {
        println!("! {}", notice);
    }
}

async fn handle_command(engine: &mut SyncEngine, line: &str) -> Result<bool> {
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["/quit"] | ["/exit"] => return Ok(false),
        ["/list"] => print_conversation(engine),
        ["/pending"] => println!("Pending deletions: {:?}", engine.pending_deletions()),
        ["/refresh"] => match engine.refresh().await {
            Ok(count) => {
                println!("Fetched {} message(s)", count);
                print_conversation(engine);
            }
            Err(SyncError::Offline) => println!("You are offline. Unable to refresh messages."),
            Err(e) => println!("Refresh failed: {}", e),
        },
        ["/delete", position] => {
            let key = position
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| engine.cache().key_at(index));
            match key {
                Some(key) => match engine.delete(MessageRef::Entry(key)).await? {
                    DeleteOutcome::LocalOnly => println!("Removed unsent message"),
                    DeleteOutcome::Confirmed(id) => println!("Deleted message #{}", id),
                    DeleteOutcome::Deferred(id) => println!("Deleted message #{} locally", id),
                },
                None => println!("No message at position {}", position),
            }
        }
        _ if line.starts_with('/') => println!("Unknown command: {}", line),
        _ => match engine.send(line).await {
            Ok(SendOutcome::Sent { id, reply, .. }) => {
                println!(">> [#{}] {}", id, line);
                if let Some(reply) = reply {
                    println!("<< {}", reply);
                }
            }
            Ok(SendOutcome::Failed { .. }) => println!(">> [unsent] {}", line),
            Err(e) => println!("Not sent: {}", e),
        },
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    utils::setup_logging(args.log_file.as_deref(), level)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = load_config(&config_path)?;
    config.apply_env();
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(sender) = args.sender {
        config.local_identity = sender;
    }
    if let Some(receiver) = args.receiver {
        config.peer_identity = receiver;
    }
    if let Some(path) = args.tombstones {
        config.tombstone_path = Some(path);
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if args.save_config {
        save_config(&config_path, &config)
            .with_context(|| format!("Failed to save config {}", config_path.display()))?;
        println!("Saved settings to {}", config_path.display());
    }

    let tombstone_path = config.tombstone_path()?;
    let tombstones = TombstoneStore::open(&tombstone_path)
        .with_context(|| format!("Failed to open tombstone store {}", tombstone_path.display()))?;
    let remote = HttpRemote::new(&config.server_url, config.request_timeout())?;
    info!("Using message service at {}", remote.base_url());

    let (mut engine, mut notice_rx) = SyncEngine::new(Arc::new(remote), tombstones, config.identity());

    let connectivity = engine.start().await?;
    println!("Connected as {} to {} ({:?})", config.local_identity, config.peer_identity, connectivity);
    print_conversation(&engine);
    drain_notices(&mut notice_rx);

    loop {
        let line = match tokio::task::spawn_blocking(utils::read_line).await?? {
            Some(line) => line,
            None => break,
        };
        if line.is_empty() {
            continue;
        }
        let keep_going = handle_command(&mut engine, &line).await?;
        drain_notices(&mut notice_rx);
        if !keep_going {
            break;
        }
    }

    info!("Exiting with {} pending deletion(s)", engine.pending_deletions().len());
    Ok(())
}
