//! Client configuration and the GTM connection-string format.
//!
//! A coordinator configures its GTM link with a host, port, and its own
//! coordinator id. These are assembled into a connection string of the
//! form `host=<host> port=<port> coordinator_id=<id>`, which is what the
//! connection layer actually consumes.

use std::fmt;
use std::time::Duration;

/// Default GTM host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default GTM port.
pub const DEFAULT_PORT: u16 = 6666;

/// Configuration for one session's link to the GTM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtmConfig {
    /// GTM server host.
    pub host: String,
    /// GTM server port.
    pub port: u16,
    /// Id of the coordinator this session represents.
    pub coordinator_id: u32,
    /// Timeout for establishing the TCP connection and startup exchange.
    pub connect_timeout: Duration,
    /// Timeout for a single request/response round trip.
    pub response_timeout: Duration,
}

impl Default for GtmConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            coordinator_id: 1,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(20),
        }
    }
}

impl GtmConfig {
    /// Assemble the connection string the connection layer consumes.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} coordinator_id={}",
            self.host, self.port, self.coordinator_id
        )
    }

    /// Parse a connection string back into a configuration.
    ///
    /// Recognized options: `host`, `port`, `coordinator_id`. Unknown keys
    /// and malformed pairs are rejected rather than ignored. Timeouts are
    /// not part of the string and take their defaults.
    pub fn parse(conn_str: &str) -> Result<Self, ConfigError> {
        let mut config = GtmConfig::default();
        for pair in conn_str.split_whitespace() {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ConfigError::MalformedOption(pair.to_string()));
            };
            match key {
                "host" => config.host = value.to_string(),
                "port" => {
                    config.port = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?
                }
                "coordinator_id" => {
                    config.coordinator_id = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?
                }
                _ => return Err(ConfigError::UnknownOption(key.to_string())),
            }
        }
        Ok(config)
    }

    /// The `host:port` address to dial.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection-string parsing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MalformedOption(String),
    UnknownOption(String),
    InvalidValue(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MalformedOption(opt) => {
                write!(f, "malformed connection option: {}", opt)
            }
            ConfigError::UnknownOption(key) => {
                write!(f, "unknown connection option: {}", key)
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "invalid value for {}: {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_format() {
        let config = GtmConfig {
            host: "localhost".to_string(),
            port: 6666,
            coordinator_id: 1,
            ..GtmConfig::default()
        };
        assert_eq!(
            config.connection_string(),
            "host=localhost port=6666 coordinator_id=1"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let config = GtmConfig {
            host: "gtm.cluster.internal".to_string(),
            port: 7777,
            coordinator_id: 42,
            ..GtmConfig::default()
        };
        let parsed = GtmConfig::parse(&config.connection_string()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = GtmConfig::parse("").unwrap();
        assert_eq!(parsed.host, DEFAULT_HOST);
        assert_eq!(parsed.port, DEFAULT_PORT);
        assert_eq!(parsed.coordinator_id, 1);
    }

    #[test]
    fn test_parse_rejects_unknown_option() {
        let result = GtmConfig::parse("host=localhost sslmode=require");
        assert!(matches!(result, Err(ConfigError::UnknownOption(_))));
    }

    #[test]
    fn test_parse_rejects_malformed_pair() {
        let result = GtmConfig::parse("host");
        assert!(matches!(result, Err(ConfigError::MalformedOption(_))));
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        let result = GtmConfig::parse("port=not-a-port");
        assert!(matches!(result, Err(ConfigError::InvalidValue(..))));
    }
}
