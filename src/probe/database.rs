//! Relational database reachability probe.
//!
//! Opens a TCP connection to the configured host/port. For MySQL-family
//! servers, which speak first, the probe also reads the handshake greeting
//! and extracts the server version, a protocol-level round trip that needs
//! no credentials. For servers that expect the client to speak first
//! (PostgreSQL), `greeting = "none"` limits the check to reachability.

use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::config::{ConfigError, DatabaseGreeting, ProbeConfig};

use super::{bounded, detail, Detail, Probe, ProbeError};

/// Largest greeting payload we are willing to read. A real MySQL handshake
/// is well under 200 bytes.
const MAX_GREETING_BYTES: usize = 1024;

/// MySQL error code for rejected credentials / host access.
const ER_ACCESS_DENIED: u16 = 1045;

pub struct DatabaseProbe {
    name: String,
    host: String,
    port: u16,
    greeting: DatabaseGreeting,
    timeout: Duration,
}

impl DatabaseProbe {
    pub fn from_config(config: &ProbeConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| ConfigError::Validation(format!("probe '{}': no host", config.name)))?;
        let port = config
            .port
            .ok_or_else(|| ConfigError::Validation(format!("probe '{}': no port", config.name)))?;
        Ok(Self {
            name: config.name.clone(),
            host,
            port,
            greeting: config.greeting,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Probe for DatabaseProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<Detail, ProbeError> {
        let addr = format!("{}:{}", self.host, self.port);
        bounded(self.timeout, async {
            let mut stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| ProbeError::Connection(format!("{}: {}", addr, e)))?;

            let mut result = detail([("connected", json!(true))]);
            if self.greeting == DatabaseGreeting::Mysql {
                let version = read_mysql_greeting(&mut stream).await?;
                result.insert("version".to_string(), json!(version));
            }
            // connection dropped here; each check owns its own handle
            Ok(result)
        })
        .await
    }
}

/// Read one wire packet and extract the server version from the handshake.
async fn read_mysql_greeting(stream: &mut TcpStream) -> Result<String, ProbeError> {
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| ProbeError::Protocol(format!("reading greeting header: {}", e)))?;

    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    if len == 0 || len > MAX_GREETING_BYTES {
        return Err(ProbeError::Protocol(format!(
            "implausible greeting length {}",
            len
        )));
    }

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProbeError::Protocol(format!("reading greeting payload: {}", e)))?;

    parse_mysql_greeting(&payload)
}

/// Parse a server-initial packet payload: either a v10 handshake carrying a
/// nul-terminated version string, or an error packet (first byte 0xff).
fn parse_mysql_greeting(payload: &[u8]) -> Result<String, ProbeError> {
    match payload.first() {
        Some(0xff) => {
            if payload.len() < 3 {
                return Err(ProbeError::Protocol("truncated error packet".to_string()));
            }
            let code = u16::from_le_bytes([payload[1], payload[2]]);
            let mut message = &payload[3..];
            // skip the '#' + 5-byte sqlstate marker when present
            if message.first() == Some(&b'#') && message.len() >= 6 {
                message = &message[6..];
            }
            let message = String::from_utf8_lossy(message).into_owned();
            if code == ER_ACCESS_DENIED {
                Err(ProbeError::Auth(format!("server error {}: {}", code, message)))
            } else {
                Err(ProbeError::Protocol(format!(
                    "server error {}: {}",
                    code, message
                )))
            }
        }
        Some(10) => {
            let rest = &payload[1..];
            let end = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ProbeError::Protocol("unterminated version string".to_string()))?;
            Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
        }
        Some(other) => Err(ProbeError::Protocol(format!(
            "unsupported handshake protocol version {}",
            other
        ))),
        None => Err(ProbeError::Protocol("empty greeting".to_string())),
    }
}
