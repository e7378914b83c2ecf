//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, the probe/metrics server, the
//! Kubernetes client and the shared reconciler context.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::server::{start_server, ServerState};
use crate::controller::{
    AggregateCache, KubeClusterClient, PageDataProvider, PageReconciler, SiteReconciler,
};
use crate::observability;
use crate::crd::Page;
use crate::runtime::context::ControllerContext;
use anyhow::{Context, Result};
use kube::Client;
use kube_runtime::reflector::{self, store::Writer};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Startup options resolved from flags and environment
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub server: ServerConfig,
    /// `tracing` filter directive, e.g. `site_page_controller=debug`
    pub log_filter: String,
}

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconcilers, cancellation token and backoff state
    pub context: Arc<ControllerContext<KubeClusterClient>>,
    /// Feeds the Page store the cluster client reads from; driven by the watch loop
    pub page_index: Writer<Page>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails when the route configuration is missing, the HTTP server cannot start, or no
/// Kubernetes client can be built.
pub async fn initialize(options: RuntimeOptions) -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is selected by features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let filter = EnvFilter::try_new(&options.log_filter)
        .with_context(|| format!("Invalid log filter '{}'", options.log_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Site/Page Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = ControllerConfig::from_env().context("Failed to load controller configuration")?;
    info!(
        "External routes: domain={}, class={}",
        config.ingress_domain, config.ingress_class
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let port = options.server.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&options.server, &server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (page_store, page_index) = reflector::store::<Page>();
    let cluster = Arc::new(KubeClusterClient::new(client.clone(), page_store));
    let cache = Arc::new(AggregateCache::new());
    let sites = SiteReconciler::new(
        Arc::clone(&cluster),
        Arc::new(config),
        Arc::clone(&cache) as Arc<dyn PageDataProvider>,
    );
    let pages = PageReconciler::new(cluster, cache);
    let context = Arc::new(ControllerContext::new(
        sites,
        pages,
        CancellationToken::new(),
    ));

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        context,
        page_index,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    config: &ServerConfig,
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
