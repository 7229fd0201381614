//! # scout-worker
//!
//! One connection session between a scout worker and its dispatcher.
//!
//! A [`Session`] splits the WebSocket transport into two loops:
//!
//! - the **reader** ([`reader::run_reader`]) decodes inbound envelopes and
//!   routes them ([`dispatch::route_frame`]); task requests pass through the
//!   [`AdmissionGate`] and run on the [`TaskExecutor`]
//! - the **writer** ([`writer::run_writer`]) is the only owner of the outbound
//!   half and drains the [`OutputQueue`]
//!
//! The [`ShutdownCoordinator`] disables reads, waits (bounded) for in-flight
//! tasks, and closes the connection with a close handshake.

#![deny(unsafe_code)]

pub mod config;
pub mod connect;
pub mod dispatch;
pub mod executor;
pub mod fetch;
pub mod gate;
pub mod queue;
pub mod reader;
pub mod session;
pub mod shutdown;
pub mod state;
pub mod writer;

pub use config::SessionConfig;
pub use connect::{ConnectError, WsStream, connect_with_retry, validate_dispatcher_url};
pub use executor::TaskExecutor;
pub use fetch::{FetchError, Fetcher, ReqwestFetcher};
pub use gate::AdmissionGate;
pub use queue::{Outbound, OutputQueue, QueueClosed};
pub use reader::ReaderExit;
pub use session::{Session, SessionOutcome, SessionReport};
pub use shutdown::ShutdownCoordinator;
pub use state::SessionState;
pub use writer::WriterExit;
