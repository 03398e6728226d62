//! Portal server binary

use anyhow::Context;
use clap::Parser;
use portal_server::{routes, telemetry, AppState, LogFormat, PortalConfig, StoreBackend};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// Benefits portal HTTP server
#[derive(Debug, Parser)]
#[command(name = "portal", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PORTAL_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Session store backend
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = PortalConfig::load(cli.config.as_deref())
        .and_then(PortalConfig::with_env)
        .context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config = config.with_bind(bind);
    }
    if let Some(store) = cli.store {
        config = config.with_store_backend(store);
    }
    if let Some(format) = cli.log_format {
        config = config.with_log_format(format);
    }

    telemetry::init(&config.logging).context("installing tracing subscriber")?;

    let state = AppState::from_config(&config)
        .await
        .context("wiring services")?;

    info!(
        version = portal_server::VERSION,
        bind = %config.server.bind,
        store = ?config.store.backend,
        "portal listening"
    );
    let (_, server) = warp::serve(routes(state, config.server.body_limit))
        .try_bind_with_graceful_shutdown(config.server.bind, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .context("binding listener")?;
    server.await;
    info!("portal stopped");
    Ok(())
}
