//! End-to-end tests: a real WebSocket dispatcher double talking to a
//! session over TCP, with HTTP targets served by wiremock or a raw socket.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use scout_core::{
    CorrelationId, Envelope, MessageKind, Payload, RegistrationOutcome, TaskRequest, TaskResult,
    TaskStatus, decode_envelope, encode_envelope, encode_message,
};
use scout_settings::FetchSettings;
use scout_worker::{
    ReqwestFetcher, Session, SessionConfig, SessionOutcome, SessionState, WriterExit,
    connect_with_retry,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

// ── Harness ─────────────────────────────────────────────────────────────────

type Dispatcher = WebSocketStream<TcpStream>;

async fn listen() -> (Url, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (Url::parse(&format!("ws://{addr}/worker")).unwrap(), listener)
}

async fn accept(listener: TcpListener) -> Dispatcher {
    let (tcp, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

fn config() -> SessionConfig {
    SessionConfig {
        close_grace: Duration::from_millis(50),
        drain_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

/// Connect a session to a fresh dispatcher double and start it.
async fn start(
    config: SessionConfig,
) -> (Dispatcher, scout_worker::ShutdownCoordinator, JoinHandle<scout_worker::SessionReport>) {
    let (url, listener) = listen().await;
    let server = tokio::spawn(accept(listener));

    let cancel = CancellationToken::new();
    let transport = connect_with_retry(&url, Duration::from_millis(50), &cancel)
        .await
        .unwrap();
    let fetcher = ReqwestFetcher::new(&FetchSettings::default()).unwrap();
    let session = Session::new(config, Arc::new(fetcher));
    let handle = session.shutdown_handle();
    let run = tokio::spawn(session.run(transport));

    (server.await.unwrap(), handle, run)
}

async fn send<T: Payload>(ws: &mut Dispatcher, id: i64, payload: &T) {
    let frame = encode_message(CorrelationId::new(id), payload).unwrap();
    ws.send(Message::Binary(frame)).await.unwrap();
}

async fn register(ws: &mut Dispatcher) {
    send(
        ws,
        0,
        &RegistrationOutcome {
            code: 0,
            description: "welcome".into(),
        },
    )
    .await;
}

/// Next binary envelope from the worker, skipping control frames.
async fn next_envelope(ws: &mut Dispatcher) -> Option<Envelope> {
    loop {
        let message = tokio::time::timeout(TIMEOUT, ws.next()).await.unwrap()?;
        match message.ok()? {
            Message::Binary(frame) => return Some(decode_envelope(&frame).unwrap()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
}

async fn next_result(ws: &mut Dispatcher) -> (i64, TaskResult) {
    let envelope = next_envelope(ws).await.expect("worker closed early");
    assert_eq!(envelope.kind, MessageKind::TaskResult);
    (envelope.correlation_id.get(), envelope.open().unwrap())
}

/// HTTP server that promises more body than it sends, then hangs up.
async fn truncating_target() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(tokio::spawn(async move {
        let (mut tcp, _) = listener.accept().await.unwrap();
        let mut buf = [0_u8; 1024];
        let _ = tcp.read(&mut buf).await.unwrap();
        tcp.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
            .await
            .unwrap();
        tcp.flush().await.unwrap();
    }));
    format!("http://{addr}/")
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_target_reports_access_failure() {
    let (mut ws, handle, run) = start(config()).await;
    register(&mut ws).await;
    send(&mut ws, 7, &TaskRequest::new("http://127.0.0.1:1/")).await;

    let (id, result) = next_result(&mut ws).await;
    assert_eq!(id, 7);
    assert_eq!(result.status, TaskStatus::FailedToAccessTarget);
    assert_eq!(result.description, "Failed to access url: http://127.0.0.1:1/");
    assert!(result.result.is_empty());

    handle.request_shutdown();
    assert!(next_envelope(&mut ws).await.is_none());
    let report = run.await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Shutdown);
}

#[tokio::test]
async fn successful_fetch_returns_body_regardless_of_status() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .mount(&target)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&target)
        .await;

    let (mut ws, handle, run) = start(config()).await;
    register(&mut ws).await;
    send(&mut ws, 1, &TaskRequest::new(format!("{}/ok", target.uri()))).await;
    send(&mut ws, 2, &TaskRequest::new(format!("{}/missing", target.uri()))).await;

    let mut results = vec![next_result(&mut ws).await, next_result(&mut ws).await];
    results.sort_by_key(|(id, _)| *id);

    assert_eq!(results[0].1.status, TaskStatus::Success);
    assert_eq!(&results[0].1.result[..], b"payload");
    assert_eq!(results[0].1.description, "OK");
    assert_eq!(results[1].1.status, TaskStatus::Success);
    assert_eq!(&results[1].1.result[..], b"gone");

    handle.request_shutdown();
    let _ = run.await.unwrap();
}

#[tokio::test]
async fn truncated_body_reports_read_failure() {
    let target = truncating_target().await;
    let (mut ws, handle, run) = start(config()).await;
    register(&mut ws).await;
    send(&mut ws, 3, &TaskRequest::new(target)).await;

    let (id, result) = next_result(&mut ws).await;
    assert_eq!(id, 3);
    assert_eq!(result.status, TaskStatus::FailedToReadResponse);
    assert_eq!(result.description, "Failed to read from http response");

    handle.request_shutdown();
    let _ = run.await.unwrap();
}

#[tokio::test]
async fn shutdown_delivers_in_flight_results_then_closes() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&target)
        .await;

    let (mut ws, handle, run) = start(config()).await;
    register(&mut ws).await;
    for id in 10..15 {
        send(&mut ws, id, &TaskRequest::new(target.uri())).await;
    }

    // Wait until the worker has read all requests before shutting down.
    let mut states = handle.subscribe_state();
    let _ = states.wait_for(|s| *s == SessionState::Active).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.request_shutdown();

    let mut ids = Vec::new();
    while let Some(envelope) = next_envelope(&mut ws).await {
        assert_eq!(envelope.kind, MessageKind::TaskResult);
        ids.push(envelope.correlation_id.get());
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![10, 11, 12, 13, 14]);

    let report = tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap();
    assert_eq!(report.outcome, SessionOutcome::Shutdown);
    assert!(report.tasks_drained);
    assert_eq!(report.writer, WriterExit::Closed);
    assert_eq!(handle.state(), SessionState::Closed);
}

#[tokio::test]
async fn rejection_ends_session() {
    let (mut ws, handle, run) = start(config()).await;
    send(
        &mut ws,
        0,
        &RegistrationOutcome {
            code: 4,
            description: "unknown worker".into(),
        },
    )
    .await;

    let report = tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap();
    assert_eq!(report.outcome, SessionOutcome::Rejected);
    assert!(handle.is_exiting());
}

#[tokio::test]
async fn dispatcher_hangup_is_transport_lost() {
    let (mut ws, _handle, run) = start(config()).await;
    register(&mut ws).await;
    drop(ws);

    let report = tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap();
    assert_eq!(report.outcome, SessionOutcome::TransportLost);
}

#[tokio::test]
async fn garbage_frames_do_not_end_session() {
    let (mut ws, handle, run) = start(config()).await;
    register(&mut ws).await;
    ws.send(Message::Binary(Bytes::from_static(&[0xde, 0xad]))).await.unwrap();
    ws.send(Message::Text("noise".into())).await.unwrap();
    let unknown = Envelope::new(MessageKind::Unknown(77), CorrelationId::new(1), Bytes::new());
    ws.send(Message::Binary(encode_envelope(&unknown).unwrap()))
        .await
        .unwrap();
    send(&mut ws, 5, &TaskRequest::new("http://127.0.0.1:1/")).await;

    let (id, _) = next_result(&mut ws).await;
    assert_eq!(id, 5);

    handle.request_shutdown();
    let report = run.await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Shutdown);
}
