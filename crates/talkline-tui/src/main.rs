//! Talkline terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Pick a saved server or enter one interactively
//! talkline
//!
//! # Connect straight to a server over TLS
//! talkline --server chat.example.org:12345 --secure
//!
//! # Trust a private CA in addition to the built-in roots
//! talkline --ca-cert dev-ca.pem
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use talkline_client::{ClientConfig, Endpoint, Runtime, TrustPolicy};
use talkline_tui::{InputService, RuntimeError, TerminalPrompt, TerminalScreen, TerminalTrust};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Talkline chat client
#[derive(Parser, Debug)]
#[command(name = "talkline")]
#[command(about = "Terminal client for talkline chat servers")]
#[command(version)]
struct Args {
    /// Server to connect to as host:port, skipping the server menu
    #[arg(short, long)]
    server: Option<String>,

    /// Use TLS for --server
    #[arg(long, requires = "server")]
    secure: bool,

    /// Saved servers file
    #[arg(long, default_value = "saved_servers.txt")]
    servers_file: PathBuf,

    /// Saved usernames file
    #[arg(long, default_value = "saved_users.txt")]
    users_file: PathBuf,

    /// TCP connect timeout in seconds
    #[arg(long, default_value = "5")]
    connect_timeout_secs: u64,

    /// Additional trusted CA certificate (PEM format), may be repeated
    #[arg(long)]
    ca_cert: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let endpoint = args
        .server
        .as_deref()
        .map(|server| {
            Endpoint::parse_record(server).map(|mut endpoint| {
                endpoint.secure |= args.secure;
                endpoint
            })
        })
        .transpose()
        .map_err(RuntimeError::from)?;

    let config = ClientConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        servers_file: args.servers_file,
        users_file: args.users_file,
        extra_roots: args.ca_cert,
        ..ClientConfig::default()
    };

    let input = InputService::spawn().map_err(RuntimeError::from)?;
    let trust = TrustPolicy::new(TerminalTrust::new(input.clone()));
    let mut runtime = Runtime::new(config, TerminalPrompt::new(input), TerminalScreen, trust);
    if let Some(endpoint) = endpoint {
        runtime = runtime.with_endpoint(endpoint);
    }

    tracing::info!("Talkline client starting");

    // Errors are already shown to the user by the runtime.
    if let Err(e) = runtime.run().await {
        tracing::debug!("Client run ended with error: {}", e);
    }

    Ok(())
}
