//! # ELPP Gateway Runtime
//!
//! The process entry point: parse the bind target, initialize logging,
//! load configuration, start the per-chain TAPOS refresh loops, and serve
//! the ingress until ctrl-c.
//!
//! ```text
//! elpp-gateway <interface-name|ip-address> <port>
//! ```
//!
//! An interface name binds to that interface's first IPv4 address; anything
//! else must parse as a literal IP address.

use std::net::IpAddr;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use elpp_gateway::{router, AppState, GatewayConfig};

/// Environment variable naming an optional JSON configuration file.
const CONFIG_ENV: &str = "ELPP_GATEWAY_CONFIG";

#[derive(Debug, Parser)]
#[command(name = "elpp-gateway", about = "ELPP uplink-to-blockchain gateway")]
struct Cli {
    /// Network interface name or literal IP address to bind.
    bind: String,
    /// TCP port to listen on.
    port: u16,
}

fn main() -> ExitCode {
    // Usage errors exit with code 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(1);
        }
    };

    let addr = match resolve_bind_addr(&cli.bind) {
        Some(addr) => addr,
        None => {
            eprintln!(
                "'{}' is neither a known network interface nor an IP address",
                cli.bind
            );
            return ExitCode::from(1);
        }
    };

    init_tracing();

    match run(addr, cli.port) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Resolve an interface name to its first IPv4 address, or fall back to
/// parsing a literal address.
fn resolve_bind_addr(bind: &str) -> Option<IpAddr> {
    if let Ok(interfaces) = if_addrs::get_if_addrs() {
        let first_v4 = interfaces
            .iter()
            .filter(|iface| iface.name == bind)
            .map(|iface| iface.ip())
            .find(IpAddr::is_ipv4);
        if let Some(addr) = first_v4 {
            return Some(addr);
        }
    }
    bind.parse().ok()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn run(addr: IpAddr, port: u16) -> Result<()> {
    let config = load_config()?;
    info!(
        elpp_port = config.elpp_port,
        chains = config.chains.len(),
        "configuration loaded"
    );

    let state = AppState::new(config).context("building gateway state")?;

    // Per-chain refresh loops; each polls immediately so dispatch has a
    // usable api_last as soon as possible.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    state.tapos.spawn_refresh_loops(shutdown_rx);

    let listener = tokio::net::TcpListener::bind((addr, port))
        .await
        .with_context(|| format!("binding {addr}:{port}"))?;
    info!(%addr, port, "ingress listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("serving ingress")?;

    let _ = shutdown_tx.send(true);
    info!("shutdown complete");
    Ok(())
}

fn load_config() -> Result<GatewayConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            info!(%path, "loading configuration file");
            GatewayConfig::from_file(&path).with_context(|| format!("loading {path}"))
        }
        Err(_) => {
            let config = GatewayConfig::default();
            config.validate().context("validating default config")?;
            Ok(config)
        }
    }
}
