//! Room-based chat relay over WebSockets.
//!
//! Clients join a named room and receive every message broadcast into it
//! until they disconnect. Each module focuses on one responsibility:
//!
//! - [`hub`] owns the room registry and serializes joins, leaves, fan-out
//!   and room creation through a single task.
//! - [`room`] and [`client`] are the membership types the hub stores.
//! - [`pump`] moves frames between a WebSocket and the hub.
//! - [`gateway`] exposes the HTTP routes and upgrades join requests.
//! - [`server`] binds everything to a listener; [`cli`] and [`config`]
//!   describe how it is started.
//! - [`message`] defines the JSON frame exchanged with clients.
//!
//! Unit tests sit next to the hub state machine; integration tests under
//! `tests/` drive a real server over HTTP and WebSockets.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod message;
pub mod pump;
pub mod room;
pub mod server;

pub use config::RelayConfig;
pub use error::RelayError;
