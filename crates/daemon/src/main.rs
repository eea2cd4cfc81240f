//! xrelayd - trace segment relay daemon.
//!
//! ```bash
//! # Run with defaults (UDP and proxy on 127.0.0.1:2000)
//! xrelayd --region us-west-2
//!
//! # Run against a config file, overriding the bind address
//! xrelayd --config /etc/xrelay/cfg.yaml --bind 0.0.0.0:2000
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xrelay_config::{Config, ParameterConfig};
use xrelay_daemon::{app, cli::Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("xrelay daemon version: {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("xrelayd: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    cli.apply(&mut config);

    if let Err(e) = init_logging(&config.logging.log_level, &config.logging.log_path) {
        eprintln!("xrelayd: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("xrelayd: failed to build runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(app::run(config, ParameterConfig::default(), wait_for_signal()));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "fatal error");
            eprintln!("xrelayd: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::error!(error = %e, "unable to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received interrupt"),
            _ = term.recv() => tracing::info!("received terminate"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received interrupt");
    }
}

/// Initialise the tracing subscriber, to stderr or the configured file.
fn init_logging(level: &str, path: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {e}"))?;

    if path.is_empty() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_ansi(false).with_writer(Arc::new(file)))
            .with(filter)
            .init();
    }

    Ok(())
}
