//! pulsecheck: a dependency health probe aggregator.
//!
//! Runs an ordered, configured set of named dependency checks (database,
//! cache, search cluster, scheduler, external tools) and normalizes each
//! outcome into a uniform `{ok, detail}` record, folds them into one
//! aggregate verdict, and serves the verdicts as JSON over HTTP.
//!
//! The library surface is the probe contract ([`probe::Probe`],
//! [`probe::run_probe`], [`probe::HealthReport`]) plus the registry and
//! router; the binary in `main.rs` wires them to configuration and a
//! server.

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod probe;
pub mod routes;
pub mod state;
