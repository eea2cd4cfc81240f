//! Logging configuration.

use serde::Deserialize;

/// Logging configuration.
///
/// Rotation of the log file itself is handled outside the core pipeline;
/// the flag is carried so the wrapper can honour it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(rename = "LogLevel")]
    pub log_level: String,

    /// Log file path. Empty logs to stderr.
    #[serde(rename = "LogPath")]
    pub log_path: String,

    /// Rotate the log file once it grows past the size limit.
    #[serde(rename = "LogRotation")]
    pub log_rotation: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_path: String::new(),
            log_rotation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(config.log_path.is_empty());
        assert!(config.log_rotation);
    }

    #[test]
    fn test_deserialize() {
        let config: LogConfig =
            serde_yaml::from_str("LogLevel: debug\nLogPath: /var/log/xrelay.log\nLogRotation: false").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_path, "/var/log/xrelay.log");
        assert!(!config.log_rotation);
    }
}
