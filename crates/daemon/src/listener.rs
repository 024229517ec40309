// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Request Server: socket accept loop, message dispatch, idle timeout,
//! and the task table that de-duplicates work by identity key.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use bos_core::{LoadProbe, LogRouter, OutputQueue, Scheduler, Stats, Task, TaskConfig, TaskKey};

use crate::protocol::{self, ProtocolError, Request, Response, SERVER_IO_TIMEOUT};

/// Everything the Request Server needs that isn't owned by the shared
/// registries themselves.
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub exit_on_idle: bool,
    /// Socket accept timeout; also the idle-exit detection window
    /// (`BOS_EXIT_ON_IDLE_SECS`, default 30s).
    pub accept_timeout: Duration,
    pub quiet: bool,
}

/// Owns the Unix socket, the task table, and the three shared registries
/// (Stats, Output Queue, Log Router) that the Scheduler and every Task
/// reference.
pub struct RequestServer<P: LoadProbe> {
    config: ServerConfig,
    stats: Arc<Stats>,
    log_router: Arc<LogRouter>,
    output_queue: Arc<OutputQueue>,
    scheduler: Arc<Scheduler<P>>,
    // Mutated only from the accept loop; see `handle_add_task`.
    tasks: Mutex<HashMap<TaskKey, Arc<Task>>>,
}

impl<P: LoadProbe + 'static> RequestServer<P> {
    pub fn new(config: ServerConfig, load_probe: Arc<P>) -> Arc<Self> {
        let stats = Arc::new(Stats::new());
        let log_router = Arc::new(LogRouter::new(Arc::clone(&stats)));
        let output_queue = Arc::new(OutputQueue::new());
        let scheduler = Scheduler::new(
            Arc::clone(&stats),
            Arc::clone(&log_router),
            load_probe,
            config.quiet,
        );
        Arc::new(Self {
            config,
            stats,
            log_router,
            output_queue,
            scheduler,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    #[cfg(test)]
    pub(crate) fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Bind the socket and accept connections until idle-exit fires, a
    /// ctrl-c is received, or an unrecoverable bind error occurs. Always
    /// runs the shutdown sequence before returning, even on idle-exit.
    pub async fn run(self: &Arc<Self>) -> io::Result<()> {
        if let Some(parent) = self.config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = match UnixListener::bind(&self.config.socket_path) {
            Ok(listener) => listener,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                eprintln!("build offload daemon is already running.");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.log_router.log_line("READY", None, self.config.quiet);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                accepted = tokio::time::timeout(self.config.accept_timeout, listener.accept()) => {
                    match accepted {
                        Ok(Ok((stream, _))) => {
                            if let Err(e) = self.handle_connection(stream).await {
                                log_connection_error(e);
                            }
                        }
                        Ok(Err(e)) => warn!(error = %e, "accept error"),
                        Err(_elapsed) => {
                            if self.config.exit_on_idle && self.stats.num_pending_tasks(None) == 0 {
                                break;
                            }
                        }
                    }
                }
                _ = &mut ctrl_c => {
                    info!("received interrupt, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
        let _ = std::fs::remove_file(&self.config.socket_path);
        Ok(())
    }

    async fn handle_connection(self: &Arc<Self>, stream: UnixStream) -> Result<(), ProtocolError> {
        let (mut reader, mut writer) = stream.into_split();
        let request = protocol::read_request(&mut reader, SERVER_IO_TIMEOUT).await?;
        debug!(request = ?request, "received request");

        match request {
            Request::Heartbeat => {
                swallow_broken_pipe(
                    protocol::write_response(&mut writer, &Response::heartbeat_ok(), SERVER_IO_TIMEOUT)
                        .await,
                )
            }
            Request::AddTask {
                name,
                cwd,
                cmd,
                build_id,
                stamp_file,
                experimental,
                tty,
            } => {
                // The client does not await a reply; close immediately.
                drop(reader);
                drop(writer);
                self.handle_add_task(name, cwd, cmd, build_id, stamp_file, experimental, tty)
                    .await;
                Ok(())
            }
            Request::QueryBuild { build_id } => {
                let response = self.handle_query_build(&build_id);
                swallow_broken_pipe(
                    protocol::write_response(&mut writer, &response, SERVER_IO_TIMEOUT).await,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_add_task(
        self: &Arc<Self>,
        name: String,
        cwd: PathBuf,
        cmd: Vec<String>,
        build_id: String,
        stamp_file: Option<String>,
        experimental: bool,
        tty_path: Option<String>,
    ) {
        if let Err(e) = self.log_router.create_logfile(&build_id, &cwd) {
            warn!(build_id = %build_id, error = %e, "failed to create log file");
        }

        let tty = experimental
            .then(|| tty_path.as_deref())
            .flatten()
            .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());

        let key: TaskKey = (cwd.clone(), name.clone());
        let config = TaskConfig {
            name,
            cwd,
            argv: cmd,
            build_id,
            stamp_file: stamp_file.map(PathBuf::from),
            remote_print: experimental,
            quiet: self.config.quiet,
        };
        let task = Task::new(
            config,
            tty,
            Arc::clone(&self.stats),
            Arc::clone(&self.log_router),
            Arc::clone(&self.output_queue),
        );

        // Terminate any prior task under this identity key before the new
        // one takes its place in the table, per the replacement policy.
        let previous = self.tasks.lock().remove(&key);
        if let Some(prev) = previous {
            prev.terminate(true).await;
        }
        self.tasks.lock().insert(key, Arc::clone(&task));
        self.scheduler.add_task(task);
    }

    fn handle_query_build(&self, build_id: &str) -> Response {
        let pending_outputs = self.output_queue.get_pending_outputs(build_id);
        Response::QueryBuild {
            build_id: build_id.to_string(),
            completed_tasks: self.stats.num_completed_tasks(Some(build_id)),
            pending_tasks: self.stats.num_pending_tasks(Some(build_id)),
            pending_outputs,
        }
    }

    async fn shutdown(&self) {
        self.log_router
            .log_line("STOPPING SERVER...", None, self.config.quiet);
        self.scheduler.deactivate().await;

        let running: Vec<Arc<Task>> = self.tasks.lock().values().cloned().collect();
        for task in running {
            task.terminate(false).await;
        }

        self.output_queue.flush_messages();
        self.log_router.log_line("STOPPED", None, self.config.quiet);
    }
}

fn swallow_broken_pipe(result: Result<(), ProtocolError>) -> Result<(), ProtocolError> {
    match result {
        Err(ProtocolError::Io(ref e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => warn!("connection timed out waiting for a request"),
        other => warn!(error = %other, "connection error"),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
