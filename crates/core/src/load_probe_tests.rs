// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_probe_reports_what_it_was_told() {
    let probe = FakeLoadProbe::new(3, 1.5, 8);
    assert_eq!(probe.running_processes().unwrap(), 3);
    assert!((probe.load_average_1m().unwrap() - 1.5).abs() < 1e-9);
    assert_eq!(probe.cpu_count(), 8);
}

#[test]
fn fake_probe_readings_are_mutable_after_construction() {
    let probe = FakeLoadProbe::new(0, 0.0, 4);
    probe.set_running(2);
    probe.set_load_average_1m(3.25);
    assert_eq!(probe.running_processes().unwrap(), 2);
    assert!((probe.load_average_1m().unwrap() - 3.25).abs() < 1e-9);
}

#[test]
fn linux_probe_reads_real_proc_files() {
    let probe = LinuxLoadProbe::new();
    assert!(probe.cpu_count() >= 1);
    // /proc/stat and /proc/loadavg are expected to exist on any Linux CI host;
    // if the sandbox lacks /proc entirely, treat that as this test's problem,
    // not the probe's.
    let _ = probe.running_processes();
    let _ = probe.load_average_1m();
}
