//! Aggregate health verdict over a set of probe results.

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::STATUS_AGGREGATE_UNHEALTHY;

use super::ProbeResult;

/// Conjunction of one probe set's outcomes.
///
/// Constructed fresh per request and immutable afterwards. Result order is
/// the order probes were supplied, which callers rely on for deterministic
/// output.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// True iff every constituent result has `ok == true`.
    pub overall: bool,
    /// Constituent results in probe supply order.
    pub results: Vec<ProbeResult>,
    /// When the report was computed.
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Fold a sequence of results into one verdict.
    ///
    /// An empty sequence is vacuously healthy. Aggregation itself has no
    /// failure modes.
    pub fn aggregate(results: Vec<ProbeResult>) -> Self {
        let overall = results.iter().all(|r| r.ok);
        Self {
            overall,
            results,
            generated_at: Utc::now(),
        }
    }

    /// HTTP status for the aggregate convention: 200 healthy, 503 otherwise.
    pub fn status_code(&self) -> StatusCode {
        if self.overall {
            StatusCode::OK
        } else {
            STATUS_AGGREGATE_UNHEALTHY
        }
    }

    /// The wire-level status word.
    pub fn status_word(&self) -> &'static str {
        if self.overall {
            "healthy"
        } else {
            "unhealthy"
        }
    }
}

// The aggregate body is a single flat object: the fixed `status` and
// `timestamp` fields followed by one entry per probe, keyed by probe name,
// in supply order. Serialized by hand because derive cannot key map entries
// by a field of the value.
impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len() + 2))?;
        map.serialize_entry("status", self.status_word())?;
        map.serialize_entry("timestamp", &self.generated_at.to_rfc3339())?;
        for result in &self.results {
            map.serialize_entry(&result.name, result)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{detail, Detail};
    use serde_json::json;

    fn ok_result(name: &str) -> ProbeResult {
        ProbeResult::success(name, Detail::new())
    }

    #[test]
    fn all_ok_yields_healthy_200() {
        let report = HealthReport::aggregate(vec![ok_result("database"), ok_result("cache")]);
        assert!(report.overall);
        assert_eq!(report.status_code(), StatusCode::OK);
        assert_eq!(report.status_word(), "healthy");
    }

    #[test]
    fn one_failure_yields_unhealthy_503() {
        let report = HealthReport::aggregate(vec![
            ok_result("database"),
            ProbeResult::failure("cache", "connection refused"),
        ]);
        assert!(!report.overall);
        assert_eq!(report.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status_word(), "unhealthy");
    }

    #[test]
    fn overall_is_conjunction_over_every_subset() {
        // aggregate(P).overall == true iff every element of P is ok
        for mask in 0u8..8 {
            let results: Vec<ProbeResult> = (0..3)
                .map(|i| {
                    let name = format!("dep{}", i);
                    if mask & (1 << i) != 0 {
                        ok_result(&name)
                    } else {
                        ProbeResult::failure(&name, "down")
                    }
                })
                .collect();
            let expected = mask == 0b111;
            let report = HealthReport::aggregate(results);
            assert_eq!(report.overall, expected, "mask {:#05b}", mask);
            assert_eq!(report.status_code() == StatusCode::OK, expected);
        }
    }

    #[test]
    fn empty_probe_set_is_vacuously_healthy() {
        let report = HealthReport::aggregate(Vec::new());
        assert!(report.overall);
        assert_eq!(report.status_code(), StatusCode::OK);
    }

    #[test]
    fn results_preserve_supply_order() {
        let report = HealthReport::aggregate(vec![
            ok_result("database"),
            ok_result("cache"),
            ok_result("search"),
        ]);
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["database", "cache", "search"]);
    }

    #[test]
    fn wire_body_keys_probes_by_name_in_order() {
        let report = HealthReport::aggregate(vec![
            ProbeResult::success("database", detail([("version", json!("8.0"))])),
            ProbeResult::failure("cache", "connection refused"),
        ]);
        let body = serde_json::to_string(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["status"], "unhealthy");
        assert!(value["timestamp"].is_string());
        assert_eq!(value["database"]["ok"], true);
        assert_eq!(value["database"]["version"], "8.0");
        assert_eq!(value["cache"]["ok"], false);
        assert_eq!(value["cache"]["error"], "connection refused");

        // supply order survives serialization
        let db_pos = body.find("\"database\"").unwrap();
        let cache_pos = body.find("\"cache\"").unwrap();
        assert!(db_pos < cache_pos);
    }
}
