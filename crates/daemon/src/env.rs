// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default accept-timeout-before-idle-exit window, matching the 30s socket
/// accept timeout used for idle detection.
const DEFAULT_EXIT_ON_IDLE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot resolve a log directory: $HOME is not set")]
    NoStateDir,
}

/// Resolve the Unix socket path: `BOS_SOCKET_PATH` if set, else a fixed name
/// under the runtime directory.
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("BOS_SOCKET_PATH") {
        return PathBuf::from(path);
    }
    runtime_dir().join("bos-daemon.sock")
}

/// `$XDG_RUNTIME_DIR`, falling back to `$TMPDIR`, falling back to `/tmp`.
fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("TMPDIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/tmp")
}

/// Directory the daemon writes its own diagnostic log file into:
/// `$XDG_STATE_HOME/bos-daemon` or `~/.local/state/bos-daemon`.
pub fn log_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("bos-daemon"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/bos-daemon"))
}

/// Override for the 30s accept-timeout-before-idle-exit window, via
/// `BOS_EXIT_ON_IDLE_SECS`.
pub fn exit_on_idle_after() -> Duration {
    std::env::var("BOS_EXIT_ON_IDLE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_EXIT_ON_IDLE)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
