//! Search/index service probe: an HTTP cluster-health call.
//!
//! Issues a GET against an Elasticsearch/OpenSearch style cluster-health
//! URL and echoes the reported cluster `status` (green/yellow/red) into the
//! detail map. The HTTP client is built per check so no connection outlives
//! a single report.

use std::time::Duration;

use serde_json::json;

use crate::config::{ConfigError, ProbeConfig, PROBE_USER_AGENT};

use super::{bounded, detail, Detail, Probe, ProbeError};

pub struct SearchProbe {
    name: String,
    url: String,
    timeout: Duration,
}

impl SearchProbe {
    pub fn from_config(config: &ProbeConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| ConfigError::Validation(format!("probe '{}': no url", config.name)))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "probe '{}': url must be http(s), got '{}'",
                config.name, url
            )));
        }
        Ok(Self {
            name: config.name.clone(),
            url,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Probe for SearchProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<Detail, ProbeError> {
        bounded(self.timeout, async {
            let client = reqwest::Client::builder()
                .user_agent(PROBE_USER_AGENT)
                .timeout(self.timeout)
                .build()
                .map_err(|e| ProbeError::Protocol(format!("building http client: {}", e)))?;

            let response = client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, self.timeout))?;

            let http_status = response.status();
            if !http_status.is_success() {
                return Err(ProbeError::Protocol(format!(
                    "cluster health returned HTTP {}",
                    http_status.as_u16()
                )));
            }

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ProbeError::Protocol(format!("parsing cluster health: {}", e)))?;

            let cluster_status = body
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Ok(detail([("status", json!(cluster_status))]))
        })
        .await
    }
}

fn map_reqwest_error(err: reqwest::Error, limit: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout(limit)
    } else if err.is_connect() {
        ProbeError::Connection(err.to_string())
    } else {
        ProbeError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering the next request with a canned response.
    async fn serve_once(status_line: &'static str, body: &'static str) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        addr
    }

    fn probe_for(addr: std::net::SocketAddr) -> SearchProbe {
        SearchProbe {
            name: "search".to_string(),
            url: format!("http://{}/_cluster/health", addr),
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn healthy_cluster_reports_status() {
        let addr = serve_once("HTTP/1.1 200 OK", r#"{"status":"green","number_of_nodes":1}"#).await;
        let result = probe_for(addr).check().await.unwrap();
        assert_eq!(result["status"], "green");
    }

    #[tokio::test]
    async fn missing_status_field_reports_unknown() {
        let addr = serve_once("HTTP/1.1 200 OK", r#"{"cluster_name":"test"}"#).await;
        let result = probe_for(addr).check().await.unwrap();
        assert_eq!(result["status"], "unknown");
    }

    #[tokio::test]
    async fn http_error_status_is_a_protocol_failure() {
        let addr = serve_once("HTTP/1.1 500 Internal Server Error", "{}").await;
        let err = probe_for(addr).check().await.unwrap_err();
        assert!(matches!(err, ProbeError::Protocol(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn non_json_body_is_a_protocol_failure() {
        let addr = serve_once("HTTP/1.1 200 OK", "<html>oops</html>").await;
        let err = probe_for(addr).check().await.unwrap_err();
        assert!(matches!(err, ProbeError::Protocol(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = probe_for(addr).check().await.unwrap_err();
        assert!(matches!(err, ProbeError::Connection(_)));
    }

    #[test]
    fn non_http_url_is_a_startup_error() {
        let config = ProbeConfig {
            name: "search".to_string(),
            kind: crate::config::ProbeKind::Search,
            timeout_seconds: None,
            host: None,
            port: None,
            greeting: Default::default(),
            url: Some("opensearch:9200".to_string()),
            crontab: None,
            program: None,
            args: Vec::new(),
        };
        assert!(SearchProbe::from_config(&config, Duration::from_secs(2)).is_err());
    }
}
