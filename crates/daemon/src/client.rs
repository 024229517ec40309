// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client Helpers (C7): short synchronous-style callers speaking the same
//! socket protocol as the Request Server, for use by the front-end build
//! tool's own CLI wrapper.

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::net::UnixStream;

use crate::protocol::{self, CLIENT_TIMEOUT, Request, Response};

/// Decoded `QUERY_BUILD` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStatus {
    pub build_id: String,
    pub completed_tasks: u64,
    pub pending_tasks: i64,
    pub pending_outputs: Vec<String>,
}

/// Send `QUERY_BUILD` for `build_id` and return the decoded reply. Socket
/// timeout is [`CLIENT_TIMEOUT`] (1s).
pub async fn query_build_info(
    socket_path: &Path,
    build_id: &str,
) -> Result<BuildStatus, protocol::ProtocolError> {
    let mut stream = UnixStream::connect(socket_path).await?;
    let request = Request::QueryBuild {
        build_id: build_id.to_string(),
    };
    let data = protocol::encode(&request)?;
    protocol::write_message(&mut stream, &data).await?;
    let bytes = tokio::time::timeout(CLIENT_TIMEOUT, protocol::read_message(&mut stream))
        .await
        .map_err(|_| protocol::ProtocolError::Timeout)??;
    match protocol::decode(&bytes)? {
        Response::QueryBuild {
            build_id,
            completed_tasks,
            pending_tasks,
            pending_outputs,
        } => Ok(BuildStatus {
            build_id,
            completed_tasks,
            pending_tasks,
            pending_outputs,
        }),
        Response::Heartbeat { .. } => Err(protocol::ProtocolError::UnexpectedResponse),
    }
}

/// Poll `query_build_info` at 1 Hz until `pending_tasks` reaches zero,
/// printing any buffered outputs on fresh lines and an overwritable
/// progress line with elapsed time and the pending count. Returns 0 on
/// success (mirrors a process exit code).
pub async fn wait_for_build(socket_path: &Path, build_id: &str) -> Result<i32, protocol::ProtocolError> {
    let start = Instant::now();
    loop {
        let status = query_build_info(socket_path, build_id).await?;
        for message in &status.pending_outputs {
            println!("\n{message}");
        }
        if status.pending_tasks == 0 {
            println!("\nAll tasks completed for build_id: {build_id}.");
            return Ok(0);
        }
        print!(
            "\rWaiting for {} tasks [{:.1}s]\x1b[K",
            status.pending_tasks,
            start.elapsed().as_secs_f64()
        );
        use std::io::Write;
        let _ = io::stdout().flush();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// `--fail-if-not-running`: attempt to connect to the daemon's socket.
/// Returns 0 if reachable, 1 with a user-facing hint otherwise.
pub async fn check_if_running(socket_path: &Path) -> i32 {
    match UnixStream::connect(socket_path).await {
        Ok(_) => 0,
        Err(_) => {
            println!(
                "Build offload daemon is not running.\nPlease run this command in a separate terminal:\n\n$ bosd\n"
            );
            1
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
