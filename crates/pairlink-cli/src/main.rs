//! Pairlink demo binary.
//!
//! Runs one device and one hub in the same process, connected by an
//! in-memory transport. The device pairs, sends each `--message`, optionally
//! rotates keys, then leaves. Every processed frame is written to the audit
//! log (JSON lines) or, without one, logged through `tracing`.
//!
//! # Usage
//!
//! ```bash
//! # Pair with a random identity and send one message
//! pairlink --message hello
//!
//! # Fixed identity, rotate after every two messages, keep an audit log
//! pairlink --identity 5 -m one -m two -m three --rotate-after 2 --audit-log audit.jsonl
//! ```

use std::{fs::File, num::NonZeroUsize, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use pairlink_core::{
    ChannelTransport, Device, DeviceConfig, DeviceLink, HubConfig, HubEndpoint, JsonLinesSink,
    RecordSink, SessionTable, SystemEnv, TracingSink,
};
use pairlink_crypto::{BLOCK_LEN, DEFAULT_PRIME_BITS};
use pairlink_proto::DeviceId;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Frames buffered between device and hub
const CHANNEL_CAPACITY: usize = 32;

/// Pairlink device/hub pairing demo
#[derive(Parser, Debug)]
#[command(name = "pairlink")]
#[command(about = "Pair a device with a hub and exchange encrypted messages")]
#[command(version)]
struct Args {
    /// Device identity (0-63). Random when omitted
    #[arg(short, long)]
    identity: Option<u8>,

    /// Bit width of the generated pseudoprimes
    #[arg(long, default_value_t = DEFAULT_PRIME_BITS)]
    prime_bits: u32,

    /// Message to send; repeat for several. Only the first 8 bytes travel
    #[arg(short, long, default_value = "hello")]
    message: Vec<String>,

    /// Rotate keys after every N messages
    #[arg(long)]
    rotate_after: Option<NonZeroUsize>,

    /// Write one JSON record per processed frame to this file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Hub receive timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Pairlink demo starting");

    let processed = run(args).await?;

    tracing::info!(processed, "hub processed all frames");

    Ok(())
}

/// Drive one full device session through a hub. Returns the number of
/// frames the hub received.
async fn run(args: Args) -> Result<usize, Box<dyn std::error::Error>> {
    let identity = args.identity.map(DeviceId::new).transpose()?;
    let device = Device::new(SystemEnv::new(), DeviceConfig { identity, prime_bits: args.prime_bits })?;

    let sink: Arc<dyn RecordSink> = match &args.audit_log {
        Some(path) => Arc::new(JsonLinesSink::new(File::create(path)?)),
        None => Arc::new(TracingSink),
    };

    let hub_config = HubConfig { receive_timeout: args.timeout_ms.map(Duration::from_millis) };
    let (device_side, hub_side) = ChannelTransport::pair(CHANNEL_CAPACITY);

    let mut hub = HubEndpoint::new(Arc::new(SessionTable::new()), hub_side, hub_config)
        .with_sink(Arc::clone(&sink));
    let hub_task = tokio::spawn(async move { hub.run().await });

    let mut link = DeviceLink::new(device, device_side).with_sink(sink);
    tracing::info!(device = %link.identity(), "device pairing");

    link.open_session().await?;

    for (index, text) in args.message.iter().enumerate() {
        if text.len() > BLOCK_LEN {
            tracing::warn!(len = text.len(), "message longer than one block, sending first 8 bytes");
        }
        link.send(text).await?;

        if args.rotate_after.is_some_and(|every| (index + 1) % every.get() == 0) {
            link.rotate_keys().await?;
        }
    }

    link.close_session().await?;

    // Dropping the link closes the transport and ends the hub loop
    drop(link);

    Ok(hub_task.await??)
}
