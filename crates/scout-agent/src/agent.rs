//! Reconnect loop around dispatcher sessions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use scout_settings::ScoutSettings;
use scout_worker::{
    ConnectError, Fetcher, ReqwestFetcher, Session, SessionConfig, SessionOutcome,
    connect_with_retry,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Serve the dispatcher at `url` until `interrupt` fires or registration is
/// refused.
///
/// A lost transport is followed by a fresh connection after the reconnect
/// interval. An interrupt during a session drains it before returning.
pub async fn run(url: &Url, settings: &ScoutSettings, interrupt: &CancellationToken) -> Result<()> {
    let interval = Duration::from_millis(settings.dispatcher.reconnect_interval_ms);
    let config = SessionConfig::from_settings(&settings.session);
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(ReqwestFetcher::new(&settings.fetch).context("Failed to build fetch client")?);

    loop {
        let transport = match connect_with_retry(url, interval, interrupt).await {
            Ok(transport) => transport,
            Err(ConnectError::Cancelled) => {
                info!("interrupted before connecting");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let session = Session::new(config.clone(), Arc::clone(&fetcher));
        let handle = session.shutdown_handle();
        let watcher = tokio::spawn({
            let interrupt = interrupt.clone();
            async move {
                interrupt.cancelled().await;
                handle.request_shutdown();
            }
        });

        let report = session.run(transport).await;
        watcher.abort();

        match report.outcome {
            SessionOutcome::Shutdown => return Ok(()),
            SessionOutcome::Rejected => bail!("dispatcher rejected registration"),
            SessionOutcome::TransportLost if interrupt.is_cancelled() => return Ok(()),
            SessionOutcome::TransportLost => {
                warn!(retry_in = ?interval, "connection to dispatcher lost");
                tokio::select! {
                    () = interrupt.cancelled() => return Ok(()),
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
