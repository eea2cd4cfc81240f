//! xrelay configuration.
//!
//! YAML-based configuration loading with sensible defaults. A minimal (or
//! absent) config file just works; only specify what you need to change.
//!
//! # Example config
//!
//! ```yaml
//! TotalBufferSizeMB: 16
//! Concurrency: 8
//! Region: us-west-2
//! Socket:
//!   UDPAddress: "127.0.0.1:2000"
//!   TCPAddress: "127.0.0.1:2000"
//! Logging:
//!   LogLevel: info
//! Version: 2
//! ```
//!
//! The key names follow the original daemon's `cfg.yaml` format so
//! existing config files keep working.

mod error;
mod logging;
mod memory;
mod params;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use logging::LogConfig;
pub use memory::{effective_memory_limit_mb, pool_buffer_count, MIN_BUFFER_MEMORY_MB};
pub use params::ParameterConfig;

/// Supported config file format versions.
const SUPPORTED_VERSIONS: [i32; 2] = [1, 2];

/// Socket bind addresses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Address and port on which the daemon listens for UDP datagrams
    /// containing segment documents.
    #[serde(rename = "UDPAddress")]
    pub udp_address: String,

    /// Address and port of the signing proxy HTTP server.
    #[serde(rename = "TCPAddress")]
    pub tcp_address: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            udp_address: "127.0.0.1:2000".into(),
            tcp_address: "127.0.0.1:2000".into(),
        }
    }
}

/// Transport tuning for the signing proxy's upstream connections.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyServerConfig {
    /// Seconds an idle upstream connection is kept open.
    #[serde(rename = "IdleConnTimeout")]
    pub idle_conn_timeout_s: u64,

    /// Idle connections retained per upstream host.
    #[serde(rename = "MaxIdleConnsPerHost")]
    pub max_idle_conns_per_host: usize,

    /// Total idle connections retained. 0 means no limit.
    #[serde(rename = "MaxIdleConns")]
    pub max_idle_conns: usize,
}

impl Default for ProxyServerConfig {
    fn default() -> Self {
        Self {
            idle_conn_timeout_s: 30,
            max_idle_conns_per_host: 2,
            max_idle_conns: 0,
        }
    }
}

/// Daemon configuration, loaded from YAML and overridden by CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum buffer memory in MB (minimum 3). 0 means 1% of host memory.
    #[serde(rename = "TotalBufferSizeMB")]
    pub total_buffer_size_mb: u64,

    /// Number of concurrent upload calls to the backend.
    #[serde(rename = "Concurrency")]
    pub concurrency: usize,

    /// Backend endpoint override. Empty means resolve from region.
    #[serde(rename = "Endpoint")]
    pub endpoint: String,

    /// Region to send segments to.
    #[serde(rename = "Region")]
    pub region: String,

    /// Socket bind addresses.
    #[serde(rename = "Socket")]
    pub socket: SocketConfig,

    /// Proxy transport tuning.
    #[serde(rename = "ProxyServer")]
    pub proxy_server: ProxyServerConfig,

    /// Logging configuration.
    #[serde(rename = "Logging")]
    pub logging: LogConfig,

    /// Skip instance-metadata lookups (region, hostname, instance id).
    #[serde(rename = "LocalMode")]
    pub local_mode: bool,

    /// ARN of the AWS resource running the daemon, echoed in telemetry.
    #[serde(rename = "ResourceARN")]
    pub resource_arn: String,

    /// IAM role to assume when uploading to a different account.
    #[serde(rename = "RoleARN")]
    pub role_arn: String,

    /// Disable TLS certificate verification.
    #[serde(rename = "NoVerifySSL")]
    pub no_verify_ssl: bool,

    /// Outbound HTTP proxy for backend calls. Empty falls back to
    /// the HTTPS_PROXY environment variable.
    #[serde(rename = "ProxyAddress")]
    pub proxy_address: String,

    /// Config file format version.
    #[serde(rename = "Version")]
    pub version: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_buffer_size_mb: 0,
            concurrency: 8,
            endpoint: String::new(),
            region: String::new(),
            socket: SocketConfig::default(),
            proxy_server: ProxyServerConfig::default(),
            logging: LogConfig::default(),
            local_mode: false,
            resource_arn: String::new(),
            role_arn: String::new(),
            no_verify_ssl: false,
            proxy_address: String::new(),
            version: 1,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Validate the loaded configuration.
    fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(ConfigError::UnsupportedVersion {
                version: self.version,
                supported: &SUPPORTED_VERSIONS,
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid_value(
                "Concurrency",
                "must be at least 1",
            ));
        }
        for (field, addr) in [
            ("Socket.UDPAddress", &self.socket.udp_address),
            ("Socket.TCPAddress", &self.socket.tcp_address),
        ] {
            if addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::invalid_value(
                    field,
                    format!("'{addr}' is not a valid socket address"),
                ));
            }
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
