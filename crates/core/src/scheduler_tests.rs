// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::load_probe::FakeLoadProbe;
use crate::output_queue::OutputQueue;
use crate::task::TaskConfig;

fn task(cwd: &std::path::Path, name: &str, stats: &Arc<Stats>, log_router: &Arc<LogRouter>) -> Arc<Task> {
    task_with_argv(cwd, name, vec!["/bin/true"], stats, log_router)
}

fn task_with_argv(
    cwd: &std::path::Path,
    name: &str,
    argv: Vec<&str>,
    stats: &Arc<Stats>,
    log_router: &Arc<LogRouter>,
) -> Arc<Task> {
    let config = TaskConfig {
        name: name.to_string(),
        cwd: cwd.to_path_buf(),
        argv: argv.into_iter().map(str::to_string).collect(),
        build_id: "b1".to_string(),
        stamp_file: None,
        remote_print: false,
        quiet: true,
    };
    Task::new(
        config,
        None,
        Arc::clone(stats),
        Arc::clone(log_router),
        Arc::new(OutputQueue::new()),
    )
}

async fn wait_until<F: Fn() -> bool>(f: F) {
    for _ in 0..200 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn idle_host_always_admits_at_least_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let stats = Arc::new(Stats::new());
    let log_router = Arc::new(LogRouter::new(Arc::clone(&stats)));
    // Heavily loaded according to the probe, but nothing running yet.
    let probe = Arc::new(FakeLoadProbe::new(0, 99.0, 1));
    let scheduler = Scheduler::new(Arc::clone(&stats), Arc::clone(&log_router), probe, true);

    stats.add_task("b1");
    scheduler.add_task(task(dir.path(), "t1", &stats, &log_router));

    wait_until(|| stats.num_completed_tasks(Some("b1")) == 1).await;
    assert_eq!(scheduler.queue_len(), 0);
}

#[tokio::test]
async fn heavily_loaded_host_leaves_extra_tasks_queued() {
    let dir = tempfile::tempdir().unwrap();
    let stats = Arc::new(Stats::new());
    let log_router = Arc::new(LogRouter::new(Arc::clone(&stats)));
    let probe = Arc::new(FakeLoadProbe::new(0, 0.0, 1));
    let scheduler = Scheduler::new(Arc::clone(&stats), Arc::clone(&log_router), probe.clone(), true);

    // First task starts unconditionally (idle host); bump the probe's load
    // before the second is queued so it should not also start immediately.
    stats.add_task("b1");
    scheduler.add_task(task_with_argv(
        dir.path(),
        "slow",
        vec!["/bin/sleep", "2"],
        &stats,
        &log_router,
    ));
    probe.set_running(5);

    stats.add_task("b1");
    scheduler.add_task(task(dir.path(), "t2", &stats, &log_router));

    // The second task should still be queued: current load (5) plus
    // num_started (0) is not less than cpu_count (1), and a process is
    // already running so the idle guarantee does not apply.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(scheduler.queue_len(), 1);
}

#[tokio::test]
async fn deactivate_terminates_everything_still_queued() {
    let dir = tempfile::tempdir().unwrap();
    let stats = Arc::new(Stats::new());
    let log_router = Arc::new(LogRouter::new(Arc::clone(&stats)));
    // Fully loaded so nothing but the very first task is ever admitted.
    let probe = Arc::new(FakeLoadProbe::new(1000, 1000.0, 1));
    let scheduler = Scheduler::new(Arc::clone(&stats), Arc::clone(&log_router), probe, true);

    for name in ["t1", "t2", "t3"] {
        stats.add_task("b1");
        scheduler.add_task(task(dir.path(), name, &stats, &log_router));
    }
    assert!(scheduler.queue_len() >= 2);

    scheduler.deactivate().await;
    assert_eq!(scheduler.queue_len(), 0);
    assert_eq!(stats.num_pending_tasks(Some("b1")), 0);
}
