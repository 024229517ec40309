// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single unit of work offloaded from the front-end build tool, and its
//! queued → running → finished/failed/terminated lifecycle.

use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::log_router::LogRouter;
use crate::output_queue::OutputQueue;
use crate::stats::Stats;
use crate::BUILD_SERVER_ENV_VAR;

/// Identity key a task is looked up and replaced by: working directory and name.
pub type TaskKey = (PathBuf, String);

/// A callback invoked once a task has fully completed, independent of its
/// outcome. Used by the Scheduler to try to admit the next queued task.
pub type CompletionHook = Arc<dyn Fn() + Send + Sync>;

/// The fields a Task is constructed from, supplied by the Request Server
/// from an `ADD_TASK` message.
pub struct TaskConfig {
    pub name: String,
    pub cwd: PathBuf,
    pub argv: Vec<String>,
    pub build_id: String,
    /// Path to the stamp file, relative to `cwd`.
    pub stamp_file: Option<PathBuf>,
    /// Whether a failure report should additionally be enqueued for later
    /// pickup by the client (the `experimental`/remote-print flag).
    pub remote_print: bool,
    /// Suppress terminal status output for this task's log lines.
    pub quiet: bool,
}

#[derive(Default)]
struct TaskState {
    terminated: bool,
    replaced: bool,
    completed: bool,
    pid: Option<u32>,
    supervisor: Option<JoinHandle<()>>,
}

/// One queued or running unit of work and its lifecycle state machine.
pub struct Task {
    name: String,
    cwd: PathBuf,
    argv: Vec<String>,
    build_id: String,
    stamp_file: Option<PathBuf>,
    remote_print: bool,
    quiet: bool,
    tty: Mutex<Option<File>>,
    state: Mutex<TaskState>,
    stats: Arc<Stats>,
    log_router: Arc<LogRouter>,
    output_queue: Arc<OutputQueue>,
}

impl Task {
    /// Construct a new, not-yet-started task.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TaskConfig,
        tty: Option<File>,
        stats: Arc<Stats>,
        log_router: Arc<LogRouter>,
        output_queue: Arc<OutputQueue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: config.name,
            cwd: config.cwd,
            argv: config.argv,
            build_id: config.build_id,
            stamp_file: config.stamp_file,
            remote_print: config.remote_print,
            quiet: config.quiet,
            tty: Mutex::new(tty),
            state: Mutex::new(TaskState::default()),
            stats,
            log_router,
            output_queue,
        })
    }

    /// Identity key under which this task is registered in the task table.
    pub fn key(&self) -> TaskKey {
        (self.cwd.clone(), self.name.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Launch the child process and its supervisor. Returns `1` if a
    /// process was started, `0` if the task had already been terminated
    /// (e.g. replaced before it got a chance to run).
    ///
    /// `on_complete` is invoked after this task reaches a terminal state,
    /// regardless of outcome.
    pub fn start(self: &Arc<Self>, on_complete: CompletionHook) -> u8 {
        // Held across the terminated check, the spawn, and the pid/supervisor
        // registration: a concurrent `terminate` must not observe a gap where
        // the task is neither latched as terminated nor has a process handle
        // to kill.
        let mut state = self.state.lock();
        if state.terminated {
            return 0;
        }

        self.stats.add_process(&self.build_id);
        self.log_router.log(
            &format!("STARTING {}", self.name),
            Some(&self.build_id),
            self.quiet,
        );

        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .current_dir(&self.cwd)
            .env(BUILD_SERVER_ENV_VAR, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        // SAFETY: the closure only calls async-signal-safe libc functions
        // (`nice`, `dup2`) and never touches the parent's heap or locks.
        // stderr is left at its default (inherited) and then dup2'd onto the
        // stdout pipe so the two streams are merged into one, preserving
        // interleaving for the failure report.
        unsafe {
            cmd.pre_exec(|| {
                libc::nice(19);
                if libc::dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(task = %self.name, error = %e, "failed to spawn task");
                self.stats.remove_process(&self.build_id);
                drop(state);
                let this = Arc::clone(self);
                let message = format!("failed to spawn {}: {e}", self.argv[0]);
                tokio::spawn(async move {
                    this.complete(message, Some(-1)).await;
                    on_complete();
                });
                return 1;
            }
        };

        state.pid = child.id();

        let stdout = child.stdout.take();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let merged = drain(stdout).await;

            let status = child.wait().await;
            this.stats.remove_process(&this.build_id);
            let rc = status.ok().and_then(|s| s.code());
            this.clone().complete(merged, rc).await;
            on_complete();
        });

        state.supervisor = Some(handle);

        1
    }

    /// Request termination. Idempotent: a second call is a no-op. Blocks
    /// (asynchronously) until the task's completion hook has run, so a
    /// caller replacing this task can rely on `_complete` having already
    /// fired by the time `terminate` returns.
    pub async fn terminate(self: &Arc<Self>, replaced: bool) {
        let (pid, supervisor) = {
            let mut state = self.state.lock();
            if state.terminated {
                return;
            }
            state.terminated = true;
            state.replaced = replaced;
            (state.pid.take(), state.supervisor.take())
        };

        match (pid, supervisor) {
            (Some(pid), Some(handle)) => {
                // SAFETY: `pid` is this task's own child, still alive or
                // already a zombie awaiting reap; signalling it is safe.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
                let _ = handle.await;
            }
            (_, Some(handle)) => {
                // Never started a process, but for some reason a supervisor
                // handle exists; join it defensively rather than orphan it.
                let _ = handle.await;
            }
            _ => {
                self.complete(String::new(), None).await;
            }
        }
    }

    /// Runs at most once: finalize stats, the stamp file, and status logging.
    async fn complete(self: Arc<Self>, stdout: String, return_code: Option<i32>) {
        let (terminated, replaced) = {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            (state.terminated, state.replaced)
        };

        self.stats.complete_task(&self.build_id);

        let status = if terminated {
            if !replaced {
                self.delete_stamp_file();
            }
            let _ = self.tty.lock().take();
            "TERMINATED"
        } else if !stdout.is_empty() || return_code.unwrap_or(0) != 0 {
            self.delete_stamp_file();
            let report = self.failure_report(return_code.unwrap_or(-1), &stdout);
            self.log_router
                .log_raw(&report, Some(&self.build_id), self.quiet);
            let tty = self.tty.lock().take();
            if self.remote_print {
                self.output_queue
                    .add_output(&self.build_id, report, tty);
            }
            "FAILED"
        } else {
            let _ = self.tty.lock().take();
            "FINISHED"
        };

        self.log_router.log(
            &format!("{status} {}", self.name),
            Some(&self.build_id),
            self.quiet,
        );
    }

    fn failure_report(&self, return_code: i32, stdout: &str) -> String {
        format!(
            "FAILED: {}\nReturn code: {}\nCMD: {}\nSTDOUT:\n{}",
            self.name,
            return_code,
            self.argv.join(" "),
            stdout
        )
    }

    fn delete_stamp_file(&self) {
        let Some(rel) = &self.stamp_file else {
            return;
        };
        let path = self.cwd.join(rel);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    task = %self.name,
                    path = %path.display(),
                    error = %e,
                    "failed to delete stamp file"
                );
            }
        }
    }
}

async fn drain<R: tokio::io::AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(mut s) = stream {
        let _ = s.read_to_string(&mut buf).await;
    }
    buf
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
