//! meshlink CLI
//!
//! Talks to a Meshtastic-compatible radio over its TCP stream interface.

mod config;
mod progress;

use anyhow::Context;
use clap::{Parser, Subcommand};
use meshlink_core::Session;
use meshlink_proto::{BROADCAST_ADDR, User, node_id_string, parse_node_id};
use meshlink_transport::StreamTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use config::Config;
use progress::{format_duration, format_node, format_position, with_spinner};

/// meshlink - request/response client for mesh radios
#[derive(Parser)]
#[command(name = "meshlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device address (host:port), overrides the configuration
    #[arg(short, long)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the attached device
    Info,

    /// List known nodes
    Nodes,

    /// Ping a node and report the round trip
    Ping {
        /// Node id (!hex, 0xhex or decimal)
        node: String,

        /// Number of pings
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Seconds to wait for each ack
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Show the owner of a node
    Owner {
        /// Node id
        node: String,
    },

    /// Set the owner of a node
    SetOwner {
        /// Node id
        node: String,

        /// Long name
        long_name: String,

        /// Short name (up to 4 characters)
        short_name: String,
    },

    /// Set the attached device's clock
    SetTime {
        /// Seconds since the Unix epoch (default: now)
        time: Option<u32>,
    },

    /// Show a channel slot of a node
    Channel {
        /// Node id
        node: String,

        /// Channel index
        #[arg(default_value_t = 0)]
        index: u32,
    },

    /// Show firmware metadata of a node
    Metadata {
        /// Node id
        node: String,
    },

    /// Show the LoRa settings of a node
    Lora {
        /// Node id
        node: String,
    },

    /// Reboot a node
    Reboot {
        /// Node id
        node: String,
    },

    /// Ask a node for its position
    Position {
        /// Node id
        node: String,
    },

    /// Ask a node for its device metrics
    Telemetry {
        /// Node id
        node: String,
    },

    /// Trace the route to a node
    Traceroute {
        /// Node id
        node: String,

        /// Seconds to wait for the reply
        #[arg(short, long, default_value_t = 60)]
        timeout: u64,
    },

    /// Send a text message
    Send {
        /// Message text
        text: String,

        /// Destination node id (default: broadcast)
        #[arg(long)]
        to: Option<String>,

        /// Channel index
        #[arg(long, default_value_t = 0)]
        channel: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    if let Some(device) = &cli.device {
        config.device.address = device.clone();
    }

    // Validate configuration
    config.validate()?;

    // Initialize logging
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let session = connect(&config).await?;
    let result = run(&session, cli.command).await;
    session.disconnect().await;
    result
}

/// Connect to the device and download its config
async fn connect(config: &Config) -> anyhow::Result<Session> {
    tracing::info!("Connecting to {}", config.device.address);
    let transport = StreamTransport::connect_tcp(config.device.address.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", config.device.address))?;

    let session = Session::new(Arc::new(transport), config.session_config());
    session.start().await?;
    with_spinner("Reading device config", session.configure()).await?;
    Ok(session)
}

fn node_arg(s: &str) -> anyhow::Result<u32> {
    parse_node_id(s).with_context(|| format!("Invalid node id: {s}"))
}

async fn run(session: &Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Info => show_info(session),
        Commands::Nodes => list_nodes(session),
        Commands::Ping {
            node,
            count,
            timeout,
        } => ping(session, node_arg(&node)?, count, timeout.map(Duration::from_secs)).await?,
        Commands::Owner { node } => {
            let node = node_arg(&node)?;
            let owner = with_spinner("Requesting owner", session.admin().get_owner(node)).await?;
            print_user(&owner);
        }
        Commands::SetOwner {
            node,
            long_name,
            short_name,
        } => {
            let node = node_arg(&node)?;
            if short_name.chars().count() > 4 {
                anyhow::bail!("Short name must be at most 4 characters");
            }
            let mut owner = session
                .directory()
                .node(node)
                .and_then(|n| n.user)
                .unwrap_or_else(|| User {
                    id: node_id_string(node),
                    ..Default::default()
                });
            owner.long_name = long_name;
            owner.short_name = short_name;
            with_spinner("Setting owner", session.admin().set_owner(node, owner)).await?;
            println!("Owner updated");
        }
        Commands::SetTime { time } => {
            let id = session.admin().set_time(time).await?;
            println!("Time set (packet {id})");
        }
        Commands::Channel { node, index } => {
            let node = node_arg(&node)?;
            let channel =
                with_spinner("Requesting channel", session.admin().get_channel(node, index)).await?;
            println!("Index: {}", channel.index);
            println!("Name:  {}", channel.name());
            println!("Role:  {:?}", channel.role());
        }
        Commands::Metadata { node } => {
            let node = node_arg(&node)?;
            let meta = with_spinner("Requesting metadata", session.admin().get_device_metadata(node))
                .await?;
            println!("Firmware:  {}", meta.firmware_version);
            println!("Hardware:  {}", meta.hw_model);
            println!("Wifi:      {}", meta.has_wifi);
            println!("Bluetooth: {}", meta.has_bluetooth);
            println!("Ethernet:  {}", meta.has_ethernet);
        }
        Commands::Lora { node } => {
            let node = node_arg(&node)?;
            let lora =
                with_spinner("Requesting LoRa config", session.admin().get_lora_config(node)).await?;
            println!("{lora:#?}");
        }
        Commands::Reboot { node } => {
            let node = node_arg(&node)?;
            with_spinner("Requesting reboot", session.admin().reboot(node)).await?;
            println!("Reboot scheduled");
        }
        Commands::Position { node } => {
            let node = node_arg(&node)?;
            let position = with_spinner("Requesting position", session.request_position(node)).await?;
            println!("{}", format_position(&position));
        }
        Commands::Telemetry { node } => {
            let node = node_arg(&node)?;
            let metrics =
                with_spinner("Requesting telemetry", session.request_device_metrics(node)).await?;
            println!("{metrics:#?}");
        }
        Commands::Traceroute { node, timeout } => {
            let node = node_arg(&node)?;
            let route = with_spinner(
                "Tracing route",
                session.trace_route(node, Some(Duration::from_secs(timeout))),
            )
            .await?;
            let hops = |path: &[u32]| {
                path.iter()
                    .map(|n| node_id_string(*n))
                    .collect::<Vec<_>>()
                    .join(" -> ")
            };
            println!("Towards: {}", hops(&route.route));
            println!("Back:    {}", hops(&route.route_back));
        }
        Commands::Send { text, to, channel } => {
            let destination = match to {
                Some(to) => node_arg(&to)?,
                None => BROADCAST_ADDR,
            };
            let id = session.send_text(destination, channel, &text).await?;
            println!("Sent (packet {id})");
        }
    }
    Ok(())
}

fn show_info(session: &Session) {
    let directory = session.directory();
    match directory.my_node() {
        Some(num) => println!("Node:     {}", node_id_string(num)),
        None => println!("Node:     unknown"),
    }
    if let Some(user) = directory.my_user() {
        println!("Owner:    {} ({})", user.long_name, user.short_name);
    }
    if let Some(meta) = directory.metadata() {
        println!("Firmware: {}", meta.firmware_version);
    }
    println!("Nodes:    {}", directory.nodes().len());
    for channel in directory.channels().iter().filter(|c| c.is_enabled()) {
        println!("Channel {}: {}", channel.index, channel.name());
    }
}

fn list_nodes(session: &Session) {
    let nodes = session.directory().nodes();
    if nodes.is_empty() {
        println!("No nodes known");
    }
    for node in &nodes {
        println!("{}", format_node(node));
    }
}

fn print_user(user: &User) {
    println!("Id:         {}", user.id);
    println!("Long name:  {}", user.long_name);
    println!("Short name: {}", user.short_name);
    println!("Licensed:   {}", user.is_licensed);
}

async fn ping(
    session: &Session,
    node: u32,
    count: u32,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let mut replies = 0;
    for seq in 1..=count.max(1) {
        match session.ping(node, timeout).await {
            Ok(result) => {
                replies += 1;
                println!(
                    "Ack from {}: seq={} time={} hops={}",
                    node_id_string(node),
                    seq,
                    format_duration(Duration::from_millis(result.duration_millis)),
                    result.hops_away
                );
            }
            Err(e) if e.is_retryable() => println!("seq={seq}: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    println!("{replies}/{} acked", count.max(1));
    Ok(())
}
