//! Message routing and channel-management core.
//!
//! Normalizes heterogeneous submissions into one canonical message shape,
//! materializes the channel topology they reference, persists them in
//! arrival order, and fans each accepted message out to the internal bus and
//! to live subscribers. See [`service::MessageService`] for the entry point.

pub mod cleanup;
pub mod error;
pub mod ingest;
pub mod materialize;
pub mod service;
pub mod sink;
pub mod title;

pub use {
    error::{Error, Result},
    ingest::{AgentReplyParams, ExternalMessageParams, SubmitMessageParams},
    service::{MessageService, meta, source},
    sink::{NullSink, RealtimeEvent, RealtimeSink},
    title::TitleGenerator,
};
