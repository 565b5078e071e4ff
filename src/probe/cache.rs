//! Key-value cache probe: a Redis set/get/del round trip.
//!
//! Writes a unique short-lived key, reads it back, deletes it. The key
//! carries a UUID so concurrent reports against the same server never
//! collide, and a TTL so a crash between set and del leaves no garbage.

use std::time::Duration;

use redis::AsyncCommands;
use serde_json::json;
use uuid::Uuid;

use crate::config::{ConfigError, ProbeConfig, CACHE_PROBE_KEY_TTL_SECS};

use super::{bounded, detail, Detail, Probe, ProbeError};

#[derive(Debug)]
pub struct CacheProbe {
    name: String,
    client: redis::Client,
    timeout: Duration,
}

impl CacheProbe {
    pub fn from_config(config: &ProbeConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| ConfigError::Validation(format!("probe '{}': no url", config.name)))?;
        // parses the URL only; no connection is made until a check runs
        let client = redis::Client::open(url.as_str()).map_err(|e| {
            ConfigError::Validation(format!("probe '{}': invalid redis url: {}", config.name, e))
        })?;
        Ok(Self {
            name: config.name.clone(),
            client,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Probe for CacheProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<Detail, ProbeError> {
        bounded(self.timeout, async {
            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(map_redis_error)?;

            let key = format!("pulsecheck:{}", Uuid::new_v4());
            let _: () = conn
                .set_ex(&key, "ok", CACHE_PROBE_KEY_TTL_SECS)
                .await
                .map_err(map_redis_error)?;
            let value: Option<String> = conn.get(&key).await.map_err(map_redis_error)?;
            let _: () = conn.del(&key).await.map_err(map_redis_error)?;

            if value.as_deref() != Some("ok") {
                return Err(ProbeError::Protocol(format!(
                    "round trip returned {:?}, expected \"ok\"",
                    value
                )));
            }
            Ok(detail([("round_trip", json!(true))]))
        })
        .await
    }
}

fn map_redis_error(err: redis::RedisError) -> ProbeError {
    if err.kind() == redis::ErrorKind::AuthenticationFailed {
        ProbeError::Auth(err.to_string())
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        ProbeError::Connection(err.to_string())
    } else {
        ProbeError::Protocol(err.to_string())
    }
}
