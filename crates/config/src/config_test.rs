//! Tests for configuration loading and validation.

use std::io::Write;

use crate::{Config, ConfigError};

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.total_buffer_size_mb, 0);
    assert_eq!(config.concurrency, 8);
    assert!(config.endpoint.is_empty());
    assert!(config.region.is_empty());
    assert_eq!(config.socket.udp_address, "127.0.0.1:2000");
    assert_eq!(config.socket.tcp_address, "127.0.0.1:2000");
    assert_eq!(config.proxy_server.idle_conn_timeout_s, 30);
    assert_eq!(config.proxy_server.max_idle_conns_per_host, 2);
    assert_eq!(config.proxy_server.max_idle_conns, 0);
    assert!(!config.local_mode);
    assert!(!config.no_verify_ssl);
    assert_eq!(config.version, 1);
}

#[test]
fn test_parse_empty_document() {
    let config: Config = "{}".parse().unwrap();
    assert_eq!(config.concurrency, 8);
}

#[test]
fn test_parse_full_document() {
    let yaml = r#"
TotalBufferSizeMB: 16
Concurrency: 4
Endpoint: "https://xray.example.test"
Region: eu-central-1
Socket:
  UDPAddress: "0.0.0.0:3000"
  TCPAddress: "0.0.0.0:3001"
ProxyServer:
  IdleConnTimeout: 60
  MaxIdleConnsPerHost: 4
  MaxIdleConns: 16
Logging:
  LogLevel: debug
  LogPath: /tmp/xrelay.log
  LogRotation: false
LocalMode: true
ResourceARN: "arn:aws:ec2:::instance/i-0"
RoleARN: "arn:aws:iam::123456789012:role/upload"
NoVerifySSL: true
ProxyAddress: "http://proxy.internal:3128"
Version: 2
"#;
    let config: Config = yaml.parse().unwrap();
    assert_eq!(config.total_buffer_size_mb, 16);
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.endpoint, "https://xray.example.test");
    assert_eq!(config.region, "eu-central-1");
    assert_eq!(config.socket.udp_address, "0.0.0.0:3000");
    assert_eq!(config.socket.tcp_address, "0.0.0.0:3001");
    assert_eq!(config.proxy_server.idle_conn_timeout_s, 60);
    assert_eq!(config.proxy_server.max_idle_conns_per_host, 4);
    assert_eq!(config.proxy_server.max_idle_conns, 16);
    assert_eq!(config.logging.log_level, "debug");
    assert!(config.local_mode);
    assert_eq!(config.resource_arn, "arn:aws:ec2:::instance/i-0");
    assert_eq!(config.role_arn, "arn:aws:iam::123456789012:role/upload");
    assert!(config.no_verify_ssl);
    assert_eq!(config.proxy_address, "http://proxy.internal:3128");
    assert_eq!(config.version, 2);
}

#[test]
fn test_unsupported_version_rejected() {
    let err = "Version: 7".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedVersion { version: 7, .. }));
}

#[test]
fn test_zero_concurrency_rejected() {
    let err = "Concurrency: 0".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_bad_bind_address_rejected() {
    let yaml = "Socket:\n  UDPAddress: \"not-an-address\"";
    let err = yaml.parse::<Config>().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Socket.UDPAddress"), "unexpected error: {text}");
}

#[test]
fn test_malformed_yaml_rejected() {
    let err = "Socket: [not a map".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Concurrency: 2\nRegion: us-east-1").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.concurrency, 2);
    assert_eq!(config.region, "us-east-1");
}

#[test]
fn test_from_missing_file() {
    let err = Config::from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
