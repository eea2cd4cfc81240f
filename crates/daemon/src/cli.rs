//! Command-line flags.
//!
//! Every flag mirrors a config file field and overrides it when given.
//! `-v/--version` replaces clap's built-in `-V` to keep the original
//! daemon's flag surface.

use clap::Parser;

use xrelay_config::Config;

/// Trace segment relay daemon.
#[derive(Debug, Parser)]
#[command(name = "xrelayd", disable_version_flag = true)]
pub struct Cli {
    /// Overrides default UDP address (127.0.0.1:2000).
    #[arg(short = 'b', long = "bind", value_name = "ADDR")]
    pub bind: Option<String>,

    /// Overrides default TCP address (127.0.0.1:2000).
    #[arg(short = 't', long = "bind-tcp", value_name = "ADDR")]
    pub bind_tcp: Option<String>,

    /// Load a configuration file from the specified path.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Output logs to the specified file path.
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Log level, from most verbose to least: trace, debug, info, warn, error.
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Change the amount of memory in MB that buffers can use (minimum 3).
    #[arg(short = 'm', long = "buffer-memory", value_name = "MB")]
    pub buffer_memory: Option<u64>,

    /// Send segments to the service in a specific region.
    #[arg(short = 'n', long = "region", value_name = "REGION")]
    pub region: Option<String>,

    /// Amazon Resource Name (ARN) of the AWS resource running the daemon.
    #[arg(short = 'a', long = "resource-arn", value_name = "ARN")]
    pub resource_arn: Option<String>,

    /// Assume the specified IAM role to upload segments to a different account.
    #[arg(short = 'r', long = "role-arn", value_name = "ARN")]
    pub role_arn: Option<String>,

    /// Don't check for instance metadata.
    #[arg(short = 'o', long = "local-mode")]
    pub local_mode: bool,

    /// Upload segments to the service through a proxy.
    #[arg(short = 'p', long = "proxy-address", value_name = "URL")]
    pub proxy_address: Option<String>,

    /// Show the daemon version.
    #[arg(short = 'v', long = "version")]
    pub version: bool,
}

impl Cli {
    /// Apply flag overrides on top of a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.socket.udp_address = bind.clone();
        }
        if let Some(bind_tcp) = &self.bind_tcp {
            config.socket.tcp_address = bind_tcp.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.logging.log_path = log_file.clone();
        }
        if let Some(log_level) = &self.log_level {
            config.logging.log_level = log_level.clone();
        }
        if let Some(memory) = self.buffer_memory {
            config.total_buffer_size_mb = memory;
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(resource_arn) = &self.resource_arn {
            config.resource_arn = resource_arn.clone();
        }
        if let Some(role_arn) = &self.role_arn {
            config.role_arn = role_arn.clone();
        }
        if self.local_mode {
            config.local_mode = true;
        }
        if let Some(proxy_address) = &self.proxy_address {
            config.proxy_address = proxy_address.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("xrelayd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&[
            "-b", "0.0.0.0:3000", "-t", "0.0.0.0:3001", "-m", "16", "-n", "us-west-2", "-o",
        ]);
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:3000"));
        assert_eq!(cli.bind_tcp.as_deref(), Some("0.0.0.0:3001"));
        assert_eq!(cli.buffer_memory, Some(16));
        assert_eq!(cli.region.as_deref(), Some("us-west-2"));
        assert!(cli.local_mode);
    }

    #[test]
    fn test_long_flags() {
        let cli = parse(&[
            "--bind",
            "127.0.0.1:4000",
            "--config",
            "/etc/xrelay/cfg.yaml",
            "--log-file",
            "/var/log/xrelay.log",
            "--log-level",
            "debug",
            "--resource-arn",
            "arn:resource",
            "--role-arn",
            "arn:role",
            "--proxy-address",
            "http://proxy:3128",
        ]);
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1:4000"));
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/etc/xrelay/cfg.yaml"))
        );
        assert_eq!(cli.log_file.as_deref(), Some("/var/log/xrelay.log"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.resource_arn.as_deref(), Some("arn:resource"));
        assert_eq!(cli.role_arn.as_deref(), Some("arn:role"));
        assert_eq!(cli.proxy_address.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn test_version_flag() {
        assert!(parse(&["-v"]).version);
        assert!(parse(&["--version"]).version);
        assert!(!parse(&[]).version);
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let mut config = xrelay_config::Config::default();
        let cli = parse(&["-b", "0.0.0.0:9000", "-m", "8", "-n", "eu-west-1", "-o"]);
        cli.apply(&mut config);

        assert_eq!(config.socket.udp_address, "0.0.0.0:9000");
        assert_eq!(config.total_buffer_size_mb, 8);
        assert_eq!(config.region, "eu-west-1");
        assert!(config.local_mode);
        // Untouched fields keep their config values.
        assert_eq!(config.socket.tcp_address, "127.0.0.1:2000");
    }

    #[test]
    fn test_no_flags_changes_nothing() {
        let mut config = xrelay_config::Config::default();
        let before = format!("{config:?}");
        parse(&[]).apply(&mut config);
        assert_eq!(before, format!("{config:?}"));
    }
}
