//! Connecting to the dispatcher.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

/// The dispatcher transport.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors from [`connect_with_retry`] and URL validation.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The URL is unusable as a dispatcher address.
    #[error("invalid dispatcher url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Cancelled before a connection was established.
    #[error("connect cancelled")]
    Cancelled,
}

/// Check that `url` is a plain `ws://` address with a host.
pub fn validate_dispatcher_url(url: &Url) -> Result<(), ConnectError> {
    let invalid = |reason: &str| ConnectError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_owned(),
    };
    if url.scheme() != "ws" {
        return Err(invalid("scheme must be ws"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

/// Connect to `url`, retrying every `interval` until it succeeds or `cancel`
/// fires.
///
/// The first attempt is immediate. Errors that retrying cannot fix (a bad
/// URL) are returned at once.
#[instrument(skip_all, fields(url = %url))]
pub async fn connect_with_retry(
    url: &Url,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<WsStream, ConnectError> {
    validate_dispatcher_url(url)?;

    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        let result = tokio::select! {
            () = cancel.cancelled() => return Err(ConnectError::Cancelled),
            result = connect_async(url.as_str()) => result,
        };

        match result {
            Ok((stream, _response)) => {
                info!(attempt, "connected to dispatcher");
                return Ok(stream);
            }
            Err(tungstenite::Error::Url(e)) => {
                return Err(ConnectError::InvalidUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!(attempt, error = %e, retry_in = ?interval, "connect failed");
            }
        }

        tokio::select! {
            () = cancel.cancelled() => return Err(ConnectError::Cancelled),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::net::TcpListener;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn accepts_ws() {
        assert!(validate_dispatcher_url(&url("ws://127.0.0.1:9000/worker")).is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        for s in ["wss://host/", "http://host/", "ftp://host/"] {
            assert_matches!(
                validate_dispatcher_url(&url(s)),
                Err(ConnectError::InvalidUrl { .. }),
                "{s}"
            );
        }
    }

    #[tokio::test]
    async fn invalid_url_fails_without_retrying() {
        let cancel = CancellationToken::new();
        let result =
            connect_with_retry(&url("http://host/"), Duration::from_secs(60), &cancel).await;
        assert_matches!(result, Err(ConnectError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn cancel_stops_retry_loop() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let cancel = CancellationToken::new();
        let target = url(&format!("ws://{addr}/"));
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { connect_with_retry(&target, Duration::from_secs(60), &cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(result, Err(ConnectError::Cancelled));
    }

    #[tokio::test]
    async fn connects_once_listener_appears() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            tokio_tungstenite::accept_async(tcp).await.unwrap()
        });

        let cancel = CancellationToken::new();
        let target = url(&format!("ws://{addr}/"));
        let stream = connect_with_retry(&target, Duration::from_millis(10), &cancel).await;
        assert!(stream.is_ok());
        drop(server.await.unwrap());
    }
}
