//! Webstash - browse cached copies of remote sites entirely offline.
//!
//! The binary loads every YAML site definition from the config directory,
//! spawns one independent caching-proxy instance per site, and serves the
//! aggregator page listing them. It runs in the foreground until terminated.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use webstash_core::SiteConfig;
use webstash_proxy::SiteServer;

mod navigate;

/// Webstash - local caching reverse proxy for offline browsing
#[derive(Parser, Debug)]
#[command(name = "webstash", version, about)]
struct Args {
    /// Directory scanned for *.yaml site definitions
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Address the aggregator page listens on
    #[arg(long, default_value = "127.0.0.1:8098")]
    navigate_addr: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Initialize console logging; `RUST_LOG` overrides the CLI level.
fn init_logging(args: &Args) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let sites = SiteConfig::load_dir(&args.config_dir)
        .with_context(|| format!("reading config directory {}", args.config_dir.display()))?;
    if sites.is_empty() {
        anyhow::bail!(
            "no site definitions found in {}",
            args.config_dir.display()
        );
    }
    info!("loaded {} site definition(s)", sites.len());

    // Each instance runs on its own task; a bind failure takes down only
    // that instance.
    for site in sites.clone() {
        let name = site.name.clone();
        match SiteServer::new(site) {
            Ok(server) => {
                tokio::spawn(async move {
                    if let Err(err) = server.run().await {
                        error!(site = %name, "instance terminated: {err}");
                    }
                });
            }
            Err(err) => error!(site = %name, "skipping instance: {err}"),
        }
    }

    navigate::serve(&args.navigate_addr, sites).await
}
