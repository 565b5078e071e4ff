//! Scheduler presence probe: reads the configured crontab file.
//!
//! A deployment that relies on cron-driven jobs wants the health report to
//! say whether any jobs are actually installed. Lines that are empty,
//! comments, or environment assignments are not jobs.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;

use crate::config::{ConfigError, ProbeConfig};

use super::{bounded, detail, Detail, Probe, ProbeError};

pub struct SchedulerProbe {
    name: String,
    crontab: PathBuf,
    timeout: Duration,
}

impl SchedulerProbe {
    pub fn from_config(config: &ProbeConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let crontab = config.crontab.clone().ok_or_else(|| {
            ConfigError::Validation(format!("probe '{}': no crontab path", config.name))
        })?;
        Ok(Self {
            name: config.name.clone(),
            crontab: PathBuf::from(crontab),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Probe for SchedulerProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<Detail, ProbeError> {
        bounded(self.timeout, async {
            let contents = match tokio::fs::read_to_string(&self.crontab).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ProbeError::NotConfigured(format!(
                        "no crontab at {}",
                        self.crontab.display()
                    )));
                }
                Err(e) => {
                    return Err(ProbeError::Connection(format!(
                        "reading {}: {}",
                        self.crontab.display(),
                        e
                    )));
                }
            };

            let jobs = count_jobs(&contents);
            Ok(detail([
                ("configured", json!(jobs > 0)),
                ("jobs", json!(jobs)),
            ]))
        })
        .await
    }
}

/// Count crontab lines that define a job.
fn count_jobs(contents: &str) -> usize {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !is_env_assignment(line))
        .count()
}

/// `NAME=value` lines set environment for jobs; they are not jobs.
fn is_env_assignment(line: &str) -> bool {
    match line.split_once('=') {
        Some((name, _)) => {
            let name = name.trim();
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
