use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use order_relay::config;
use order_relay::relay::server;
use order_relay::relay::RelayService;

#[derive(Debug, Parser)]
#[command(author, version, about = "Relay order submissions to the workflow webhook")]
struct Args {
    /// Path to YAML config file; built-in defaults apply when `config.yaml` is absent
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = config::load(args.config.as_deref())?;
    cfg.apply_env_overrides();
    config::validate(&cfg)?;

    let service = RelayService::new(cfg.relay_config())?;
    let app = server::router(service, &cfg.server.route, cfg.body_limit());

    let listener = tokio::net::TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
    info!(
        route = %cfg.server.route,
        max_image_mb = cfg.images.max_size_mb,
        "order relay starting"
    );
    server::serve(listener, app).await
}
