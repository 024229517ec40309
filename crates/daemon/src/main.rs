// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bosd - build offload daemon
//!
//! Accepts heartbeats, admits and schedules build tasks under a load-aware
//! cap, and answers status queries over a Unix socket. Typically started by
//! a build tool's own CLI wrapper and not invoked directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use bos_core::LinuxLoadProbe;
use bos_daemon::{client, env, protocol, RequestServer, ServerConfig};

#[derive(Parser)]
#[command(name = "bosd", version, about = "Local build-offload daemon")]
struct Cli {
    /// Attempt to connect to a running daemon; exit 0 if reachable, 1 with
    /// a hint otherwise. Does not start a daemon.
    #[arg(long)]
    fail_if_not_running: bool,

    /// Exit once the accept timeout elapses with nothing pending.
    #[arg(long)]
    exit_on_idle: bool,

    /// Suppress terminal status output.
    #[arg(long)]
    quiet: bool,

    /// Client mode: poll and stream pending outputs for BUILD_ID until
    /// completion, then exit 0.
    #[arg(long, value_name = "BUILD_ID")]
    wait_for_build: Option<String>,
}

#[derive(Debug, Error)]
enum DaemonError {
    #[error("config error: {0}")]
    Config(#[from] env::ConfigError),
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let cli = Cli::parse();
    let socket_path = env::socket_path();

    if cli.fail_if_not_running {
        std::process::exit(client::check_if_running(&socket_path).await);
    }

    if let Some(build_id) = cli.wait_for_build {
        let code = client::wait_for_build(&socket_path, &build_id).await?;
        std::process::exit(code);
    }

    let log_dir = env::log_dir()?;
    let _log_guard = setup_logging(&log_dir)?;

    info!("starting build offload daemon");

    let config = ServerConfig {
        socket_path,
        exit_on_idle: cli.exit_on_idle,
        accept_timeout: env::exit_on_idle_after(),
        quiet: cli.quiet,
    };
    let probe = Arc::new(LinuxLoadProbe::new());
    let server = RequestServer::new(config, probe);

    match server.run().await {
        Ok(()) => {
            info!("daemon stopped");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            eprintln!("build offload daemon is already running.");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Set up file logging under `log_dir/bosd.log`, filterable via `RUST_LOG`
/// (defaults to `info`). Terminal status output is handled separately by
/// the Log Router and is independent of this tracing setup.
fn setup_logging(
    log_dir: &std::path::Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, "bosd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
