// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO admission queue that gates task launch on observed host load.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::load_probe::LoadProbe;
use crate::log_router::LogRouter;
use crate::stats::Stats;
use crate::task::Task;

/// At most this many tasks are admitted per `maybe_start_tasks` invocation,
/// to damp ramp-up under bursty completions.
const MAX_STARTS_PER_INVOCATION: u32 = 2;

/// Thread-safe FIFO of queued tasks with a load-aware admission heuristic.
pub struct Scheduler<P: LoadProbe> {
    queue: Mutex<VecDeque<Arc<Task>>>,
    deactivated: AtomicBool,
    stats: Arc<Stats>,
    log_router: Arc<LogRouter>,
    load_probe: Arc<P>,
    quiet: bool,
}

impl<P: LoadProbe + 'static> Scheduler<P> {
    pub fn new(
        stats: Arc<Stats>,
        log_router: Arc<LogRouter>,
        load_probe: Arc<P>,
        quiet: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            deactivated: AtomicBool::new(false),
            stats,
            log_router,
            load_probe,
            quiet,
        })
    }

    /// Enqueue `task`, record it in Stats, and attempt to admit it (and any
    /// other queued work) right away.
    pub fn add_task(self: &Arc<Self>, task: Arc<Task>) {
        debug_assert!(
            !self.deactivated.load(Ordering::SeqCst),
            "add_task called after deactivate"
        );
        self.stats.add_task(task.build_id());
        self.log_router.log(
            &format!("QUEUED {}", task.name()),
            Some(task.build_id()),
            self.quiet,
        );
        self.queue.lock().push_back(task);
        self.maybe_start_tasks();
    }

    /// Latch the scheduler closed and terminate every task still waiting in
    /// the queue. Running tasks are the Request Server's responsibility.
    pub async fn deactivate(&self) {
        self.deactivated.store(true, Ordering::SeqCst);
        let drained: Vec<Arc<Task>> = self.queue.lock().drain(..).collect();
        for task in drained {
            task.terminate(false).await;
        }
    }

    /// Admission heuristic: always start at least one task if nothing is
    /// currently running (progress guarantee); otherwise start up to
    /// [`MAX_STARTS_PER_INVOCATION`] more while the projected load stays
    /// under the CPU count.
    pub fn maybe_start_tasks(self: &Arc<Self>) {
        if self.deactivated.load(Ordering::SeqCst) {
            return;
        }

        let current_load = self.current_load();
        let cpu_count = self.load_probe.cpu_count() as f64;
        let mut num_started: u32 = 0;

        while num_started < MAX_STARTS_PER_INVOCATION
            && (self.stats.no_running_processes()
                || num_started as f64 + current_load < cpu_count)
        {
            let next = {
                let mut queue = self.queue.lock();
                queue.pop_front()
            };
            let Some(task) = next else {
                return;
            };
            let this = Arc::clone(self);
            num_started += task.start(Arc::new(move || this.maybe_start_tasks())) as u32;
        }
    }

    /// `max(running processes, 1-minute load average)`, as floats: a small
    /// transient dip in `running_processes` should not by itself let the
    /// heuristic oversubscribe a genuinely loaded host.
    fn current_load(&self) -> f64 {
        let running = self.load_probe.running_processes().unwrap_or(0) as f64;
        let load_avg = self.load_probe.load_average_1m().unwrap_or(0.0);
        running.max(load_avg)
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
