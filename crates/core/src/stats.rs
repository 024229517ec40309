// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate task counters, global and per build-id.

use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Counts {
    running: i64,
    completed: u64,
    total: u64,
}

/// Thread-safe registry of queued / running / completed task counts.
///
/// Tracks both global totals and per-build-id totals under a single mutex.
/// Each operation is individually consistent; no atomicity is promised
/// across separate calls.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    global: Counts,
    per_build: HashMap<String, Counts>,
}

impl Stats {
    /// Create an empty stats registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a task has been accepted into the queue for `build_id`.
    pub fn add_task(&self, build_id: &str) {
        let mut inner = self.inner.lock();
        inner.global.total += 1;
        inner.per_build.entry(build_id.to_string()).or_default().total += 1;
    }

    /// Record that a task's child process has started running.
    pub fn add_process(&self, build_id: &str) {
        let mut inner = self.inner.lock();
        inner.global.running += 1;
        inner.per_build.entry(build_id.to_string()).or_default().running += 1;
    }

    /// Record that a task's child process has stopped running.
    pub fn remove_process(&self, build_id: &str) {
        let mut inner = self.inner.lock();
        inner.global.running -= 1;
        inner.per_build.entry(build_id.to_string()).or_default().running -= 1;
    }

    /// Record that a task has reached a terminal state.
    pub fn complete_task(&self, build_id: &str) {
        let mut inner = self.inner.lock();
        inner.global.completed += 1;
        inner
            .per_build
            .entry(build_id.to_string())
            .or_default()
            .completed += 1;
    }

    /// True if no task's child process is currently running, globally.
    pub fn no_running_processes(&self) -> bool {
        self.inner.lock().global.running == 0
    }

    /// Current running-process count, globally.
    pub fn running_processes(&self) -> i64 {
        self.inner.lock().global.running
    }

    /// Number of tasks accepted but not yet completed.
    ///
    /// Global when `build_id` is `None`, scoped otherwise.
    pub fn num_pending_tasks(&self, build_id: Option<&str>) -> i64 {
        let inner = self.inner.lock();
        match build_id {
            Some(bid) => {
                let c = inner.per_build.get(bid);
                c.map(|c| c.total as i64 - c.completed as i64).unwrap_or(0)
            }
            None => inner.global.total as i64 - inner.global.completed as i64,
        }
    }

    /// Number of tasks that have reached a terminal state.
    ///
    /// Global when `build_id` is `None`, scoped otherwise.
    pub fn num_completed_tasks(&self, build_id: Option<&str>) -> u64 {
        let inner = self.inner.lock();
        match build_id {
            Some(bid) => inner.per_build.get(bid).map(|c| c.completed).unwrap_or(0),
            None => inner.global.completed,
        }
    }

    /// Format `"{running} process[es], {completed}/{total}"`, global or scoped.
    pub fn prefix(&self, build_id: Option<&str>) -> String {
        let inner = self.inner.lock();
        let (running, completed, total) = match build_id {
            Some(bid) => match inner.per_build.get(bid) {
                Some(c) => (c.running, c.completed, c.total),
                None => (0, 0, 0),
            },
            None => (inner.global.running, inner.global.completed, inner.global.total),
        };
        let word = if running == 1 { "process" } else { "processes" };
        format!("{running} {word}, {completed}/{total}")
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
