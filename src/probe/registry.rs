//! Ordered registry of configured probes and the endpoint table over them.
//!
//! The registry holds the probes in configuration order and resolves URL
//! paths to endpoints through an explicit table built once at startup,
//! rather than comparing path strings per request.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;

use crate::config::{AppConfig, ConfigError, STATUS_SINGLE_PROBE_FAILED};

use super::report::HealthReport;
use super::{build_probe, run_probe_isolated, Probe, ProbeResult};

/// Path for the aggregate report.
pub const AGGREGATE_PATH: &str = "/health";

/// What a URL path maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Run every configured probe and report the full verdict.
    Aggregate,
    /// Run exactly one probe, identified by its registry index.
    Single(usize),
    /// No configured endpoint matches.
    NotFound,
}

/// Ordered set of named probes plus the path table over them.
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
    endpoints: HashMap<String, Endpoint>,
}

impl ProbeRegistry {
    /// Build every configured probe and the endpoint table.
    ///
    /// Each probe gets a top-level path equal to its name; the aggregate
    /// lives at [`AGGREGATE_PATH`]. Name validity and uniqueness are
    /// enforced by config validation, so the table cannot collide.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut probes = Vec::with_capacity(config.probe.len());
        let mut endpoints = HashMap::new();
        endpoints.insert(AGGREGATE_PATH.to_string(), Endpoint::Aggregate);

        for probe_config in &config.probe {
            let index = probes.len();
            probes.push(build_probe(probe_config, config)?);
            endpoints.insert(format!("/{}", probe_config.name), Endpoint::Single(index));
        }

        Ok(Self { probes, endpoints })
    }

    /// Build a registry from already-constructed probes (used by tests and
    /// embedders that implement [`Probe`] directly).
    pub fn from_probes(probes: Vec<Arc<dyn Probe>>) -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert(AGGREGATE_PATH.to_string(), Endpoint::Aggregate);
        for (index, probe) in probes.iter().enumerate() {
            endpoints.insert(format!("/{}", probe.name()), Endpoint::Single(index));
        }
        Self { probes, endpoints }
    }

    /// Names of all registered probes, in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Resolve a URL path against the endpoint table.
    pub fn resolve(&self, path: &str) -> Endpoint {
        self.endpoints
            .get(path)
            .cloned()
            .unwrap_or(Endpoint::NotFound)
    }

    /// Run every probe sequentially, in registration order, and aggregate.
    ///
    /// Sequential execution keeps result ordering trivially deterministic;
    /// health endpoints are polled infrequently, so the summed latency is
    /// acceptable. A failing or panicking probe never aborts its siblings.
    pub async fn run_all(&self) -> HealthReport {
        let mut results = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            results.push(run_probe_isolated(probe.clone()).await);
        }
        HealthReport::aggregate(results)
    }

    /// Run the probe at a registry index.
    pub async fn run_one(&self, index: usize) -> Option<ProbeResult> {
        let probe = self.probes.get(index)?;
        Some(run_probe_isolated(probe.clone()).await)
    }

    /// Dispatch a path to its endpoint and produce `(body, status)`.
    ///
    /// The aggregate convention maps overall failure to 503; the
    /// single-probe convention maps its failure to 500; an unknown path is
    /// a 404 body naming the unmatched path.
    pub async fn route_health(&self, path: &str) -> (serde_json::Value, StatusCode) {
        match self.resolve(path) {
            Endpoint::Aggregate => {
                let report = self.run_all().await;
                let status = report.status_code();
                (serde_json::json!(report), status)
            }
            Endpoint::Single(index) => {
                // index comes from the endpoint table, so the probe exists
                match self.run_one(index).await {
                    Some(result) => {
                        let status = if result.ok {
                            StatusCode::OK
                        } else {
                            STATUS_SINGLE_PROBE_FAILED
                        };
                        (serde_json::json!(result), status)
                    }
                    None => not_found_body(path),
                }
            }
            Endpoint::NotFound => not_found_body(path),
        }
    }
}

fn not_found_body(path: &str) -> (serde_json::Value, StatusCode) {
    (
        serde_json::json!({ "error": "Not Found", "path": path }),
        StatusCode::NOT_FOUND,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{detail, Detail, ProbeError};
    use serde_json::json;

    struct FixedProbe {
        name: &'static str,
        outcome: Result<Detail, &'static str>,
    }

    impl FixedProbe {
        fn ok(name: &'static str) -> Arc<dyn Probe> {
            Arc::new(Self {
                name,
                outcome: Ok(Detail::new()),
            })
        }

        fn failing(name: &'static str, message: &'static str) -> Arc<dyn Probe> {
            Arc::new(Self {
                name,
                outcome: Err(message),
            })
        }
    }

    #[async_trait::async_trait]
    impl Probe for FixedProbe {
        fn name(&self) -> &str {
            self.name
        }
        async fn check(&self) -> Result<Detail, ProbeError> {
            match &self.outcome {
                Ok(d) => Ok(d.clone()),
                Err(message) => Err(ProbeError::Connection(message.to_string())),
            }
        }
    }

    /// A probe whose latency shrinks with registration order, so completion
    /// order would reverse registration order if execution were concurrent.
    struct SlowProbe {
        name: String,
        delay_ms: u64,
    }

    #[async_trait::async_trait]
    impl Probe for SlowProbe {
        fn name(&self) -> &str {
            &self.name
        }
        async fn check(&self) -> Result<Detail, ProbeError> {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            Ok(detail([("delay_ms", json!(self.delay_ms))]))
        }
    }

    #[test]
    fn resolve_builds_table_from_probe_names() {
        let registry =
            ProbeRegistry::from_probes(vec![FixedProbe::ok("database"), FixedProbe::ok("cache")]);
        assert_eq!(registry.resolve("/health"), Endpoint::Aggregate);
        assert_eq!(registry.resolve("/database"), Endpoint::Single(0));
        assert_eq!(registry.resolve("/cache"), Endpoint::Single(1));
        assert_eq!(registry.resolve("/unknown"), Endpoint::NotFound);
        assert_eq!(registry.resolve("/database/"), Endpoint::NotFound);
    }

    #[tokio::test]
    async fn run_all_aggregates_in_order() {
        let registry = ProbeRegistry::from_probes(vec![
            FixedProbe::ok("database"),
            FixedProbe::failing("cache", "connection refused"),
        ]);
        let report = registry.run_all().await;
        assert!(!report.overall);
        assert_eq!(report.results[0].name, "database");
        assert!(report.results[0].ok);
        assert_eq!(report.results[1].name, "cache");
        assert!(!report.results[1].ok);
        assert!(report.results[1]
            .error_message()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn result_order_is_independent_of_latency() {
        let probes: Vec<Arc<dyn Probe>> = (0..4)
            .map(|i| {
                Arc::new(SlowProbe {
                    name: format!("dep{}", i),
                    delay_ms: (4 - i) * 20,
                }) as Arc<dyn Probe>
            })
            .collect();
        let registry = ProbeRegistry::from_probes(probes);
        let report = registry.run_all().await;
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["dep0", "dep1", "dep2", "dep3"]);
    }

    #[tokio::test]
    async fn route_health_aggregate_conventions() {
        let healthy = ProbeRegistry::from_probes(vec![FixedProbe::ok("database")]);
        let (body, status) = healthy.route_health("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["ok"], true);

        let unhealthy = ProbeRegistry::from_probes(vec![
            FixedProbe::ok("database"),
            FixedProbe::failing("cache", "connection refused"),
        ]);
        let (body, status) = unhealthy.route_health("/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["cache"]["ok"], false);
    }

    #[tokio::test]
    async fn route_health_single_probe_conventions() {
        let registry = ProbeRegistry::from_probes(vec![
            FixedProbe::ok("database"),
            FixedProbe::failing("cache", "connection refused"),
        ]);

        let (body, status) = registry.route_health("/database").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        // single-probe failure is 500, not the aggregate's 503
        let (body, status) = registry.route_health("/cache").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn route_health_unknown_path_is_404_naming_path() {
        let registry = ProbeRegistry::from_probes(vec![FixedProbe::ok("database")]);
        let (body, status) = registry.route_health("/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["path"], "/unknown");
    }

    #[tokio::test]
    async fn empty_registry_aggregate_is_healthy() {
        let registry = ProbeRegistry::from_probes(Vec::new());
        let (body, status) = registry.route_health("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
