//! # Site/Page Controller
//!
//! A Kubernetes controller that serves `Page` resources through nginx workloads
//! declared by `Site` resources.
//!
//! ## Overview
//!
//! 1. **Site reconcile** - ensures the Deployment, the two ConfigMaps, the Service and
//!    the Ingress of each Site, and reports the result in its `Available` condition
//! 2. **Page reconcile** - aggregates the Pages of a Site into its data ConfigMap,
//!    using a finalizer so deleted Pages leave the aggregate before they disappear
//!
//! ## Configuration
//!
//! - `INGRESS_DOMAIN` (required) - host of every Site's Ingress
//! - `INGRESS_CLASS` (default `nginx`) - ingress class of every Site's Ingress
//! - `METRICS_PORT` (default 8080) - probe and metrics port
//! - `RUST_LOG` - log filter

use anyhow::Result;
use clap::Parser;
use site_page_controller::config::ServerConfig;
use site_page_controller::constants::DEFAULT_LOG_FILTER;
use site_page_controller::runtime::{initialize, run_watch_loop, RuntimeOptions};

/// Command line flags; each falls back to its environment variable
#[derive(Debug, Parser)]
#[command(name = "site-page-controller", version, about)]
struct Cli {
    /// Port for /healthz, /readyz and /metrics
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// tracing filter directive
    #[arg(long, env = "RUST_LOG", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads its env fallbacks
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }
    let cli = Cli::parse();

    let mut server = ServerConfig::from_env();
    if let Some(port) = cli.metrics_port {
        server.metrics_port = port;
    }

    let init_result = initialize(RuntimeOptions {
        server,
        log_filter: cli.log_filter,
    })
    .await?;

    run_watch_loop(init_result.client, init_result.context, init_result.page_index).await?;

    Ok(())
}
