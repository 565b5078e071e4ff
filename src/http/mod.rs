//! HTTP server module.
//!
//! Plain HTTP with graceful shutdown on SIGTERM/SIGINT. A health sidecar
//! sits behind the orchestrator's network, so TLS termination is left to
//! the surrounding infrastructure.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
