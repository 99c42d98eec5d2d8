//! HTTP and WebSocket surface for the switchboard routing core.
//!
//! The gateway owns connection state and fan-out; all message semantics live
//! in `switchboard-router`. The fan-out registry doubles as the router's
//! realtime sink, so a single mutation path drives both persistence and
//! client delivery.

pub mod fanout;
pub mod http;
pub mod server;
pub mod ws;

pub use {
    fanout::FanOut,
    server::{AppState, build_app, serve},
};
