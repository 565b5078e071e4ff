//! Dependency probes and the result contract they share.
//!
//! A probe is one bounded check of one external dependency: connect, do a
//! trivial round trip, close. Every outcome is normalized into a
//! [`ProbeResult`]: a broken dependency is reported as data, never as an
//! error that escapes the probe boundary. [`run_probe`] is that boundary:
//! it converts any failure (including a panic inside the check) into
//! `ok: false` with an `error` detail entry.
//!
//! Probes execute sequentially and each owns its connection or handle for
//! the duration of a single check; there is no pooling and no state shared
//! between checks. Each probe applies its own timeout so one unreachable
//! dependency cannot stall the whole report.

pub mod cache;
pub mod command;
pub mod database;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod search;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{AppConfig, ConfigError, ProbeConfig, ProbeKind};

pub use registry::{Endpoint, ProbeRegistry};
pub use report::HealthReport;

/// Diagnostic key/value pairs attached to a probe outcome.
///
/// Values are JSON scalars (string, number, boolean) such as a server
/// version, a round-trip flag, or an error message.
pub type Detail = serde_json::Map<String, serde_json::Value>;

/// Build a detail map from `(key, value)` pairs.
pub fn detail<const N: usize>(entries: [(&str, serde_json::Value); N]) -> Detail {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Why a probe check failed.
///
/// All variants are caught at the probe boundary and reported as result
/// data; none of them surfaces as an HTTP-level error.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The dependency could not be reached at all.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The dependency was reachable but rejected our credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Reachable and authenticated, but the round-trip check itself failed
    /// or returned unexpected data.
    #[error("protocol check failed: {0}")]
    Protocol(String),

    /// The dependency or a required artifact is not set up in this
    /// deployment (missing crontab, missing program).
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The per-probe deadline elapsed before the check completed.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Connection(err.to_string())
    }
}

/// Outcome of one dependency check.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    /// Dependency identifier; serialized as the report key, not as a field.
    #[serde(skip)]
    pub name: String,
    /// Whether the dependency is reachable and functional.
    pub ok: bool,
    /// Diagnostics; contains an `error` entry exactly when `ok` is false.
    #[serde(flatten)]
    pub detail: Detail,
}

impl ProbeResult {
    /// A successful check. Any `error` entry in the detail map is dropped:
    /// `ok == true` never carries one.
    pub fn success(name: impl Into<String>, mut detail: Detail) -> Self {
        detail.remove("error");
        Self {
            name: name.into(),
            ok: true,
            detail,
        }
    }

    /// A failed check with the failure cause as the `error` detail entry.
    pub fn failure(name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let mut detail = Detail::new();
        detail.insert(
            "error".to_string(),
            serde_json::Value::String(error.to_string()),
        );
        Self {
            name: name.into(),
            ok: false,
            detail,
        }
    }

    /// The `error` detail entry, present exactly when `ok` is false.
    pub fn error_message(&self) -> Option<&str> {
        self.detail.get("error").and_then(|v| v.as_str())
    }
}

/// A single bounded check of one external dependency.
///
/// Implementations perform their own I/O under their own timeout and map
/// client errors onto the [`ProbeError`] taxonomy.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Dependency identifier (report key and endpoint path segment).
    fn name(&self) -> &str;

    /// Perform the check, returning diagnostics on success.
    async fn check(&self) -> Result<Detail, ProbeError>;
}

/// Apply a probe's deadline to its I/O.
///
/// Probes wrap their check body in this rather than relying on client
/// library timeouts, which differ in coverage (connect vs. request vs.
/// response) across clients.
pub async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ProbeError>>,
) -> Result<T, ProbeError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(limit)),
    }
}

/// Run one named check and capture its outcome.
///
/// This is the recovery boundary: an `Err` from the operation becomes
/// `ok: false` with the error message as the `error` detail entry. No
/// failure propagates past this function.
pub async fn run_probe<F, Fut>(name: &str, op: F) -> ProbeResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Detail, ProbeError>>,
{
    match op().await {
        Ok(detail) => {
            tracing::debug!(probe = %name, "probe succeeded");
            ProbeResult::success(name, detail)
        }
        Err(err) => {
            tracing::warn!(probe = %name, error = %err, "probe failed");
            ProbeResult::failure(name, err)
        }
    }
}

/// Run a registered probe in its own task so a panic inside the check is
/// isolated and reported as a failed result rather than aborting sibling
/// probes or the request.
pub(crate) async fn run_probe_isolated(probe: Arc<dyn Probe>) -> ProbeResult {
    let name = probe.name().to_string();
    let handle = tokio::spawn(async move {
        let name = probe.name().to_string();
        run_probe(&name, move || async move { probe.check().await }).await
    });
    match handle.await {
        Ok(result) => result,
        Err(join_err) => {
            tracing::error!(probe = %name, error = %join_err, "probe task panicked");
            ProbeResult::failure(&name, format!("probe panicked: {}", join_err))
        }
    }
}

/// Build a probe from its configuration section.
pub fn build_probe(config: &ProbeConfig, app: &AppConfig) -> Result<Arc<dyn Probe>, ConfigError> {
    let timeout = config.timeout(&app.probes);
    let probe: Arc<dyn Probe> = match config.kind {
        ProbeKind::Database => Arc::new(database::DatabaseProbe::from_config(config, timeout)?),
        ProbeKind::Cache => Arc::new(cache::CacheProbe::from_config(config, timeout)?),
        ProbeKind::Search => Arc::new(search::SearchProbe::from_config(config, timeout)?),
        ProbeKind::Scheduler => Arc::new(scheduler::SchedulerProbe::from_config(config, timeout)?),
        ProbeKind::Command => Arc::new(command::CommandProbe::from_config(config, timeout)?),
    };
    Ok(probe)
}
