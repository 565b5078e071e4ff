//! External tool probe: spawn a program and capture its version banner.
//!
//! Subprocess probes are a different animal from network probes: the
//! failure modes are a missing binary, a non-zero exit, or a hang, and the
//! output is untrusted text that goes straight into a JSON body. Output is
//! therefore reduced to the first line, stripped to printable characters,
//! and capped in length before it reaches the detail map.

use std::process::Stdio;
use std::time::Duration;

use serde_json::json;
use tokio::process::Command;

use crate::config::{
    ConfigError, ProbeConfig, COMMAND_DETAIL_MAX_CHARS, COMMAND_OUTPUT_MAX_BYTES,
};

use super::{bounded, detail, Detail, Probe, ProbeError};

pub struct CommandProbe {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProbe {
    pub fn from_config(config: &ProbeConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let program = config.program.clone().ok_or_else(|| {
            ConfigError::Validation(format!("probe '{}': no program", config.name))
        })?;
        Ok(Self {
            name: config.name.clone(),
            program,
            args: config.args.clone(),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Probe for CommandProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<Detail, ProbeError> {
        bounded(self.timeout, async {
            let output = Command::new(&self.program)
                .args(&self.args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => {
                        ProbeError::NotConfigured(format!("{}: not found", self.program))
                    }
                    std::io::ErrorKind::PermissionDenied => {
                        ProbeError::NotConfigured(format!("{}: permission denied", self.program))
                    }
                    _ => ProbeError::Protocol(format!("spawning {}: {}", self.program, e)),
                })?;

            if !output.status.success() {
                let stderr = sanitize_output(&output.stderr);
                return Err(ProbeError::Protocol(format!(
                    "{} exited with {}{}",
                    self.program,
                    output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    if stderr.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", stderr)
                    }
                )));
            }

            Ok(detail([("output", json!(sanitize_output(&output.stdout)))]))
        })
        .await
    }
}

/// First line of subprocess output, printable characters only, length-capped.
fn sanitize_output(raw: &[u8]) -> String {
    let capped = &raw[..raw.len().min(COMMAND_OUTPUT_MAX_BYTES)];
    let text = String::from_utf8_lossy(capped);
    let first_line = text.lines().next().unwrap_or("");
    first_line
        .chars()
        .filter(|c| !c.is_control())
        .take(COMMAND_DETAIL_MAX_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}
