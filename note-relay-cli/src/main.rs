//! CLI entry point for note-relay

mod client;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use note_relay_core::bus::{spawn_peer_connector, PeerListener, TopicBus};
use note_relay_core::config::{validate_config, Config, ConfigLoader};
use note_relay_core::logging::init_logging;
use note_relay_core::relay::{spawn_subscriber, RelayService};
use note_relay_core::store::MessageStore;
use note_relay_core::{Message, Origin};
use note_relay_manager::{bind_listener, serve, AppState};
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::client::{base_url_from_config, ApiClient};

#[derive(Parser)]
#[command(name = "note-relay")]
#[command(about = "Relay short notes between a local API and a remote peer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay: bus subscriber plus HTTP API
    Serve {
        /// Forward the outbound topic back to the inbound topic, acting as
        /// our own peer
        #[arg(long, conflicts_with_all = ["peer_listen", "peer_connect"])]
        loopback: bool,
        /// Accept peer connections on this address (overrides peer.listen)
        #[arg(long)]
        peer_listen: Option<String>,
        /// Dial this peer, e.g. ws://10.0.0.2:3100 (overrides peer.connect)
        #[arg(long)]
        peer_connect: Option<String>,
    },
    /// Publish a local message through a running relay
    Publish {
        /// Message body
        #[arg(short, long)]
        payload: String,
        /// Message id (generated by the server when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Note sent as a bare string
        #[arg(short, long, conflicts_with = "comment")]
        note: Option<String>,
        /// Note sent in structured form, {"comment": ...}
        #[arg(long)]
        comment: Option<String>,
        /// Relay base URL (defaults to the configured server address)
        #[arg(long)]
        url: Option<String>,
    },
    /// List messages held by a running relay
    List {
        /// Which side to list: local or remote
        #[arg(value_parser = parse_origin)]
        origin: Origin,
        /// Relay base URL (defaults to the configured server address)
        #[arg(long)]
        url: Option<String>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to config.json
    Init,
}

fn parse_origin(raw: &str) -> Result<Origin, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Serve {
            loopback,
            peer_listen,
            peer_connect,
        } => {
            let mut config = config_loader.load()?;
            if peer_listen.is_some() {
                config.peer.listen = peer_listen;
            }
            if peer_connect.is_some() {
                config.peer.connect = peer_connect;
            }
            validate_config(&config)?;

            let _guard = init_logging(&config.logging);
            info!("Starting relay");
            run_serve(config, loopback, tokio::signal::ctrl_c()).await?;
        }
        Commands::Publish {
            payload,
            id,
            note,
            comment,
            url,
        } => {
            tracing_subscriber::fmt::init();
            let url = resolve_url(url, &config_loader)?;
            let envelope = build_envelope(payload, id, note, comment);
            run_publish(url, &envelope).await?;
        }
        Commands::List { origin, url } => {
            tracing_subscriber::fmt::init();
            let url = resolve_url(url, &config_loader)?;
            run_list(url, origin).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = config_loader.load()?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommands::Init => {
                let config = config_loader.load()?;
                config_loader.save(&config)?;
                println!(
                    "{} {}",
                    style("Configuration written to").green(),
                    config_loader.config_dir().join("config.json").display()
                );
            }
        },
    }

    Ok(())
}

/// Run the relay until `shutdown` resolves or the HTTP server stops.
///
/// The HTTP and peer listeners are bound before anything is spawned, so
/// an address in use is reported straight away.
async fn run_serve<F>(config: Config, loopback: bool, shutdown: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let listener = bind_listener(&config.server.host, config.server.port).await?;
    let addr = listener.local_addr()?;

    let bus = TopicBus::new();
    let peer_listener = match &config.peer.listen {
        Some(listen) => Some(PeerListener::bind(listen, bus.clone(), &config.topics).await?),
        None => None,
    };

    println!("{}", style("Starting note relay...").bold().cyan());
    println!("Outbound topic: {}", config.topics.local_outbound);
    println!("Inbound topic: {}", config.topics.remote_inbound);
    println!("Capacity per origin: {}", config.store.capacity);

    let store = Arc::new(MessageStore::new(config.store.capacity));
    let relay = RelayService::new(store, Arc::new(bus.clone()), &config.topics);

    let subscription = bus.subscribe(&config.topics.remote_inbound).await;
    let mut handles = vec![spawn_subscriber(relay.clone(), subscription)];

    if loopback {
        println!("{}", style("Loopback enabled").yellow());
        handles.push(
            bus.bridge(&config.topics.local_outbound, &config.topics.remote_inbound)
                .await,
        );
    }
    if let Some(peer_listener) = peer_listener {
        println!("Accepting peers on ws://{}", peer_listener.local_addr()?);
        handles.push(peer_listener.spawn());
    }
    if let Some(url) = &config.peer.connect {
        println!("Connecting to peer {}", url);
        handles.push(spawn_peer_connector(
            url.clone(),
            bus.clone(),
            &config.topics,
            Duration::from_secs(config.peer.retry_secs),
        ));
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut server_handle = tokio::spawn(serve(AppState::new(relay), listener, shutdown_rx));

    println!(
        "\n{}",
        style(format!("Relay listening on http://{}. Press Ctrl+C to stop.", addr)).green()
    );

    tokio::pin!(shutdown);
    let outcome = tokio::select! {
        signal = &mut shutdown => {
            println!("\n{}", style("Shutting down...").yellow());
            let _ = shutdown_tx.send(());
            let server = server_outcome((&mut server_handle).await);
            signal.map_err(anyhow::Error::from).and(server)
        }
        server = &mut server_handle => {
            error!("HTTP server stopped unexpectedly");
            server_outcome(server)
        }
    };

    bus.close().await;
    for handle in handles {
        let _ = handle.await;
    }

    outcome?;
    println!("{}", style("Relay stopped.").green());
    Ok(())
}

fn server_outcome(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result.context("HTTP server failed"),
        Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
    }
}

/// Explicit `--url`, else the server address from configuration
fn resolve_url(url: Option<String>, config_loader: &ConfigLoader) -> Result<String> {
    match url {
        Some(url) => Ok(url),
        None => Ok(base_url_from_config(&config_loader.load()?)),
    }
}

fn build_envelope(
    payload: String,
    id: Option<String>,
    note: Option<String>,
    comment: Option<String>,
) -> Value {
    let mut envelope = json!({ "payload": payload });
    if let Some(id) = id {
        envelope["id"] = Value::String(id);
    }
    if let Some(note) = note {
        envelope["notes"] = Value::String(note);
    } else if let Some(comment) = comment {
        envelope["notes"] = json!({ "comment": comment });
    }
    envelope
}

async fn run_publish(url: String, envelope: &Value) -> Result<()> {
    let client = ApiClient::new(Some(url));
    let message = client.publish(envelope).await?;
    println!("{}", style("Published").green().bold());
    print_message(&message);
    Ok(())
}

async fn run_list(url: String, origin: Origin) -> Result<()> {
    let client = ApiClient::new(Some(url));
    let messages = client.list(origin).await?;

    println!(
        "{}",
        style(format!("{} messages ({})", origin, messages.len()))
            .bold()
            .cyan()
    );
    for message in &messages {
        print_message(message);
    }
    Ok(())
}

fn print_message(message: &Message) {
    let notes = message.notes.as_deref().unwrap_or("-");
    println!(
        "  {} {} {} {}",
        style(message.timestamp.to_rfc3339()).dim(),
        style(&message.id).cyan(),
        message.payload,
        style(notes).dim()
    );
}
