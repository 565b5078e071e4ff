//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! probe timeouts, subprocess output capture, HTTP status code conventions,
//! logging format, and default paths. `AppConfig` is the root configuration
//! struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use http::StatusCode;

// =============================================================================
// Probe Timing Constants
// =============================================================================

/// Default per-probe timeout in seconds. Health endpoints are polled by
/// orchestrators with their own deadlines, so probes must stay short.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;

/// Upper bound accepted for a configured probe timeout, in seconds.
/// A probe slower than this stalls the whole report.
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 30;

/// TTL in seconds for the temporary key written by the cache round-trip probe.
pub const CACHE_PROBE_KEY_TTL_SECS: u64 = 10;

// =============================================================================
// Subprocess Probe Constants
// =============================================================================

/// Maximum bytes of subprocess stdout retained per probe run.
pub const COMMAND_OUTPUT_MAX_BYTES: usize = 4096;

/// Maximum characters of sanitized subprocess output reported in detail maps.
pub const COMMAND_DETAIL_MAX_CHARS: usize = 200;

// =============================================================================
// HTTP Status Code Conventions
// =============================================================================
// The aggregate endpoint reports overall failure as 503 Service Unavailable,
// while a per-dependency endpoint reports its single failure as 500. Both
// conventions are long-established for health endpoints and are kept as
// separate constants rather than unified.

/// Status code for an unhealthy aggregate report.
pub const STATUS_AGGREGATE_UNHEALTHY: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

/// Status code for a failed single-probe response.
pub const STATUS_SINGLE_PROBE_FAILED: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

// =============================================================================
// HTTP Response Headers
// =============================================================================

/// Cache-Control for health responses. Orchestrators and load balancers must
/// always see a fresh verdict.
pub const CACHE_CONTROL_HEALTH: &str = "no-store";

/// User-Agent sent by the search cluster-health probe.
pub const PROBE_USER_AGENT: &str = formatcp!("pulsecheck/{}", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "pulsecheck=debug";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Probe names that would collide with fixed fields of the aggregate body
/// or with fixed routes.
pub const RESERVED_PROBE_NAMES: &[&str] = &["status", "timestamp", "health"];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Global probe settings and defaults
    #[serde(default)]
    pub probes: ProbeSettings,
    /// Configured probes, in execution (and report) order
    #[serde(default, rename = "probe")]
    pub probe: Vec<ProbeConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

/// Global probe settings that apply to all probes unless overridden
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSettings {
    /// Per-probe timeout in seconds (can be overridden per-probe)
    #[serde(default = "ProbeSettings::default_timeout")]
    pub timeout_seconds: u64,
}

impl ProbeSettings {
    fn default_timeout() -> u64 {
        DEFAULT_PROBE_TIMEOUT_SECS
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: Self::default_timeout(),
        }
    }
}

/// The kind of check a configured probe performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// TCP connect to a relational database, optionally reading the server greeting
    Database,
    /// Redis set/get/del round trip
    Cache,
    /// HTTP cluster-health call against a search/index service
    Search,
    /// Crontab presence check
    Scheduler,
    /// External tool invocation with sanitized output capture
    Command,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeKind::Database => "database",
            ProbeKind::Cache => "cache",
            ProbeKind::Search => "search",
            ProbeKind::Scheduler => "scheduler",
            ProbeKind::Command => "command",
        };
        f.write_str(s)
    }
}

/// Which greeting the database probe expects after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseGreeting {
    /// Parse a MySQL handshake packet and extract the server version
    Mysql,
    /// Reachability only; the server is not expected to speak first
    /// (PostgreSQL and most others)
    #[default]
    None,
}

/// Configuration for a single probe.
///
/// Kind-specific fields are optional here and validated by
/// [`AppConfig::load`] so a misconfigured probe is rejected at startup
/// rather than reported as a runtime failure on every request.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Probe name (report key, endpoint path segment, logging)
    pub name: String,
    /// What this probe checks
    pub kind: ProbeKind,
    /// Timeout override in seconds (default: global `probes.timeout_seconds`)
    pub timeout_seconds: Option<u64>,

    // database
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub greeting: DatabaseGreeting,

    // cache / search
    pub url: Option<String>,

    // scheduler
    pub crontab: Option<String>,

    // command
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ProbeConfig {
    /// Get effective timeout (probe-specific or global default)
    pub fn timeout(&self, global: &ProbeSettings) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(global.timeout_seconds))
    }

    /// Validate that the fields required by this probe's kind are present.
    fn validate(&self) -> Result<(), ConfigError> {
        let missing = |field: &str| {
            ConfigError::Validation(format!(
                "probe '{}' (kind {}) is missing required field '{}'",
                self.name, self.kind, field
            ))
        };

        if self.name.is_empty() {
            return Err(ConfigError::Validation(
                "probe name must not be empty".to_string(),
            ));
        }
        if RESERVED_PROBE_NAMES.contains(&self.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "probe name '{}' is reserved",
                self.name
            )));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "probe name '{}' must be alphanumeric with '-' or '_'",
                self.name
            )));
        }
        if let Some(secs) = self.timeout_seconds {
            if secs == 0 || secs > MAX_PROBE_TIMEOUT_SECS {
                return Err(ConfigError::Validation(format!(
                    "probe '{}': timeout_seconds must be between 1 and {}",
                    self.name, MAX_PROBE_TIMEOUT_SECS
                )));
            }
        }

        match self.kind {
            ProbeKind::Database => {
                if self.host.is_none() {
                    return Err(missing("host"));
                }
                if self.port.is_none() {
                    return Err(missing("port"));
                }
            }
            ProbeKind::Cache | ProbeKind::Search => {
                if self.url.is_none() {
                    return Err(missing("url"));
                }
            }
            ProbeKind::Scheduler => {
                if self.crontab.is_none() {
                    return Err(missing("crontab"));
                }
            }
            ProbeKind::Command => {
                if self.program.is_none() {
                    return Err(missing("program"));
                }
            }
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all probe sections. An empty probe list is accepted: the
    /// aggregate over zero probes is vacuously healthy, which is the right
    /// behavior for a deployment with nothing to watch yet.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for probe in &self.probe {
            probe.validate()?;
            if !seen.insert(probe.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate probe name '{}'",
                    probe.name
                )));
            }
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "logging.format must be \"text\" or \"json\", got \"{}\"",
                    other
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = toml::from_str(toml_str).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    const BASE: &str = r#"
        [http]
        host = "127.0.0.1"
        port = 8080
    "#;

    #[test]
    fn empty_probe_list_is_accepted() {
        let config = parse(BASE).unwrap();
        assert!(config.probe.is_empty());
        assert_eq!(config.probes.timeout_seconds, DEFAULT_PROBE_TIMEOUT_SECS);
    }

    #[test]
    fn database_probe_requires_host_and_port() {
        let toml_str = format!(
            "{BASE}\n[[probe]]\nname = \"database\"\nkind = \"database\"\nport = 3306\n"
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("missing required field 'host'"));
    }

    #[test]
    fn cache_probe_requires_url() {
        let toml_str = format!("{BASE}\n[[probe]]\nname = \"cache\"\nkind = \"cache\"\n");
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("missing required field 'url'"));
    }

    #[test]
    fn duplicate_probe_names_rejected() {
        let toml_str = format!(
            "{BASE}\n\
             [[probe]]\nname = \"cache\"\nkind = \"cache\"\nurl = \"redis://localhost\"\n\
             [[probe]]\nname = \"cache\"\nkind = \"cache\"\nurl = \"redis://localhost\"\n"
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate probe name"));
    }

    #[test]
    fn reserved_probe_names_rejected() {
        for reserved in RESERVED_PROBE_NAMES {
            let toml_str = format!(
                "{BASE}\n[[probe]]\nname = \"{reserved}\"\nkind = \"cache\"\nurl = \"redis://localhost\"\n"
            );
            assert!(parse(&toml_str).is_err(), "'{reserved}' should be rejected");
        }
    }

    #[test]
    fn timeout_override_applies_per_probe() {
        let toml_str = format!(
            "{BASE}\n\
             [probes]\ntimeout_seconds = 3\n\
             [[probe]]\nname = \"search\"\nkind = \"search\"\nurl = \"http://localhost:9200/_cluster/health\"\ntimeout_seconds = 5\n\
             [[probe]]\nname = \"cache\"\nkind = \"cache\"\nurl = \"redis://localhost\"\n"
        );
        let config = parse(&toml_str).unwrap();
        assert_eq!(
            config.probe[0].timeout(&config.probes),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.probe[1].timeout(&config.probes),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let toml_str = format!(
            "{BASE}\n[[probe]]\nname = \"cache\"\nkind = \"cache\"\nurl = \"redis://localhost\"\ntimeout_seconds = 0\n"
        );
        assert!(parse(&toml_str).is_err());
    }

    #[test]
    fn probe_order_is_preserved() {
        let toml_str = format!(
            "{BASE}\n\
             [[probe]]\nname = \"database\"\nkind = \"database\"\nhost = \"mysql\"\nport = 3306\n\
             [[probe]]\nname = \"cache\"\nkind = \"cache\"\nurl = \"redis://localhost\"\n\
             [[probe]]\nname = \"search\"\nkind = \"search\"\nurl = \"http://localhost:9200/_cluster/health\"\n"
        );
        let config = parse(&toml_str).unwrap();
        let names: Vec<&str> = config.probe.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["database", "cache", "search"]);
    }

    #[test]
    fn invalid_log_format_rejected() {
        let toml_str = format!("{BASE}\n[logging]\nformat = \"xml\"\n");
        assert!(parse(&toml_str).is_err());
    }
}
