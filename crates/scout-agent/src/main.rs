//! # scout-agent
//!
//! Scout worker binary: loads settings, connects to the dispatcher and
//! serves fetch tasks until interrupted or rejected.

#![deny(unsafe_code)]

mod agent;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scout_settings::ScoutSettings;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Scout worker agent.
#[derive(Parser, Debug)]
#[command(name = "scout-agent", about = "Scout worker agent")]
struct Cli {
    /// Dispatcher WebSocket URL, e.g. `ws://dispatcher:8080/worker`.
    dispatcher_url: String,

    /// Settings file (defaults to `~/.scout/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Maximum concurrent tasks, 0 for unbounded (overrides settings).
    #[arg(long)]
    max_tasks: Option<usize>,

    /// Shutdown drain timeout in milliseconds (overrides settings).
    #[arg(long)]
    drain_timeout_ms: Option<u64>,
}

impl Cli {
    fn load_settings(&self) -> Result<ScoutSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(scout_settings::settings_path);
        let mut settings = scout_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut ScoutSettings) {
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(max) = self.max_tasks {
            settings.session.max_concurrent_tasks = max;
        }
        if let Some(ms) = self.drain_timeout_ms {
            settings.session.drain_timeout_ms = ms;
        }
    }

    fn dispatcher_url(&self) -> Result<Url> {
        let url = Url::parse(&self.dispatcher_url)
            .with_context(|| format!("Invalid dispatcher URL: {}", self.dispatcher_url))?;
        scout_worker::validate_dispatcher_url(&url)?;
        Ok(url)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    scout_core::logging::init_subscriber(&settings.logging.level);

    let url = cli.dispatcher_url()?;

    let interrupt = CancellationToken::new();
    drop(tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("interrupt received, shutting down"),
                Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl-c"),
            }
            interrupt.cancel();
        }
    }));

    tracing::info!(%url, version = env!("CARGO_PKG_VERSION"), "starting scout agent");
    agent::run(&url, &settings, &interrupt).await
}
