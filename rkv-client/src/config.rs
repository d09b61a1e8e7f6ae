//! # Client Configuration
//!
//! Plain data describing endpoints and pool limits. Values are usually
//! deserialized from JSON by whatever wiring owns the application; the
//! executors only consume them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rkv_common::{RkvError, RkvResult};

/// Pool limits shared by the single and sharded executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// How long `acquire` blocks before failing with `PoolExhausted`.
    /// Zero fails immediately when the pool is at capacity.
    pub max_wait_ms: u64,
}

impl PoolConfig {
    /// Returns the acquisition wait as a `Duration`.
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_idle: 8,
            max_total: 16,
            max_wait_ms: 2_000,
        }
    }
}

/// One store node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Optional TCP connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Optional TCP read timeout.
    pub read_timeout_ms: Option<u64>,
    /// Optional TCP write timeout.
    pub write_timeout_ms: Option<u64>,
}

impl EndpointConfig {
    /// Creates an endpoint with no timeouts.
    pub fn new(addr: impl Into<String>) -> Self {
        EndpointConfig {
            addr: addr.into(),
            ..EndpointConfig::default()
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            addr: "127.0.0.1:6379".to_string(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

/// Full client configuration.
///
/// A single endpoint builds a `SingleExecutor`; several endpoints build a
/// `ShardedExecutor`, in which case `database` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub pool: PoolConfig,
    /// Logical database selected before every single-endpoint operation.
    pub database: u32,
}

impl ClientConfig {
    /// Parses a configuration document.
    pub fn from_json(raw: &str) -> RkvResult<Self> {
        serde_json::from_str(raw).map_err(|err| RkvError::Decode(err.to_string()))
    }

    /// Returns true when more than one endpoint is configured.
    pub fn is_sharded(&self) -> bool {
        self.endpoints.len() > 1
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoints: vec![EndpointConfig::default()],
            pool: PoolConfig::default(),
            database: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_document_with_defaults() {
        let config = ClientConfig::from_json(
            r#"{
                "endpoints": [{"addr": "10.0.0.1:6379", "read_timeout_ms": 500}],
                "pool": {"max_total": 30, "max_wait_ms": 100},
                "database": 3
            }"#,
        )
        .unwrap();

        assert_eq!(config.database, 3);
        assert_eq!(config.pool.max_total, 30);
        assert_eq!(config.pool.max_idle, 8);
        assert_eq!(config.pool.max_wait(), Duration::from_millis(100));
        assert_eq!(config.endpoints[0].read_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.endpoints[0].connect_timeout(), None);
        assert!(!config.is_sharded());
    }

    #[test]
    fn rejects_malformed_document() {
        let err = ClientConfig::from_json("{\"pool\": 5}").unwrap_err();
        assert!(matches!(err, RkvError::Decode(_)));
    }
}
