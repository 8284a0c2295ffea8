//! Rewriting CORS Proxy
//!
//! An HTTP forward proxy for browser clients, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────┐
//!                              │                 REWRITE PROXY                     │
//!                              │                                                   │
//!     Browser Request          │  ┌─────────┐    ┌──────────┐    ┌──────────┐     │
//!     ─────────────────────────┼─▶│  http   │───▶│ handlers │───▶│  relay   │─────┼───▶ Target
//!     /proxy?url=...           │  │ server  │    │          │    │ (reqwest)│     │     Site
//!                              │  └─────────┘    └────┬─────┘    └────┬─────┘     │
//!                              │                      │               │           │
//!     Browser Response         │  ┌─────────┐    ┌────▼─────┐         │           │
//!     ◀────────────────────────┼──│  cors   │◀───│ rewrite  │◀────────┘           │
//!                              │  │ headers │    │ html/css │                     │
//!                              │  └─────────┘    └──────────┘                     │
//!                              │                                                   │
//!                              │  config · observability · lifecycle               │
//!                              └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use rewrite_proxy::config::resolve_config;
use rewrite_proxy::lifecycle::{self, signals, Shutdown};
use rewrite_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "rewrite-proxy")]
#[command(about = "HTTP forward proxy that rewrites HTML/CSS links back through itself", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides PORT and the config file).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.set_port(port);
    }

    logging::init_tracing(&config.observability);

    tracing::info!("rewrite-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.relay.request_timeout_secs,
        rewrite_enabled = config.rewrite.enabled,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    lifecycle::start(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
