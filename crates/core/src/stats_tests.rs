// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn add_task_increments_global_and_scoped_totals() {
    let stats = Stats::new();
    stats.add_task("b1");
    stats.add_task("b1");
    stats.add_task("b2");

    assert_eq!(stats.num_pending_tasks(None), 3);
    assert_eq!(stats.num_pending_tasks(Some("b1")), 2);
    assert_eq!(stats.num_pending_tasks(Some("b2")), 1);
}

#[test]
fn process_lifecycle_tracks_running_count() {
    let stats = Stats::new();
    stats.add_task("b1");
    assert!(stats.no_running_processes());

    stats.add_process("b1");
    assert!(!stats.no_running_processes());
    assert_eq!(stats.running_processes(), 1);

    stats.remove_process("b1");
    assert!(stats.no_running_processes());
}

#[test]
fn complete_task_reduces_pending_and_increments_completed() {
    let stats = Stats::new();
    stats.add_task("b1");
    stats.add_task("b1");

    stats.complete_task("b1");
    assert_eq!(stats.num_pending_tasks(Some("b1")), 1);
    assert_eq!(stats.num_completed_tasks(Some("b1")), 1);
    assert_eq!(stats.num_completed_tasks(None), 1);
}

#[test]
fn prefix_uses_singular_process_for_one_running() {
    let stats = Stats::new();
    stats.add_task("b1");
    stats.add_process("b1");

    assert_eq!(stats.prefix(Some("b1")), "1 process, 0/1");
}

#[test]
fn prefix_uses_plural_processes_otherwise() {
    let stats = Stats::new();
    assert_eq!(stats.prefix(None), "0 processes, 0/0");

    stats.add_task("b1");
    stats.add_process("b1");
    stats.add_process("b1");
    assert_eq!(stats.prefix(None), "2 processes, 0/1");
}

#[test]
fn prefix_for_unknown_build_id_is_zeroed() {
    let stats = Stats::new();
    assert_eq!(stats.prefix(Some("nonexistent")), "0 processes, 0/0");
}

#[test]
fn per_build_and_global_counters_stay_independent() {
    let stats = Stats::new();
    stats.add_task("a");
    stats.add_task("b");
    stats.complete_task("a");

    assert_eq!(stats.num_pending_tasks(Some("a")), 0);
    assert_eq!(stats.num_pending_tasks(Some("b")), 1);
    assert_eq!(stats.num_pending_tasks(None), 1);
}
