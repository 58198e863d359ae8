use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use cproxy_config::{DEFAULT_CONFIG_FILE, ProxyConfig};
use cproxy_core::{Master, control::send_admin_command};
use tracing::{info, warn};
use utils::init_tracing;

mod cli;

use cli::{Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --config must exist; the default file is optional.
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut cfg = ProxyConfig::load(&path, cli.config.is_some())
        .with_context(|| format!("reading {}", path.display()))?;
    cfg.apply_overrides(cli.port, cli.origin.as_deref());

    init_tracing(cfg.log().level());

    match cli.mode() {
        Mode::ClearCache => clear_cache(&cfg).await,
        Mode::Serve => serve(cfg).await,
    }
}

async fn serve(cfg: ProxyConfig) -> anyhow::Result<()> {
    let report = cfg.validate();
    for warning in report.warnings() {
        warn!(target: "cproxy::config", "{warning}");
    }
    if report.has_errors() {
        bail!(
            "invalid configuration ({} error(s))\n{}",
            report.errors().len(),
            report.format()
        );
    }

    let master = Master::new(cfg)?;
    master.run().await
}

/// Asks the instance listening on the configured port to drop its cache.
async fn clear_cache(cfg: &ProxyConfig) -> anyhow::Result<()> {
    let port = cfg.server().port();
    let path = cfg.server().clear_cache_path();

    let (status, body) = send_admin_command("127.0.0.1", port, &path)
        .await
        .with_context(|| format!("is cproxy running on port {port}?"))?;

    if !status.is_success() {
        bail!("proxy answered {status}: {}", body.trim());
    }

    info!(target: "cproxy::control", port, "Cache cleared");
    println!("{}", body.trim());
    Ok(())
}
