// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstraction over host load signals, so the admission [`Scheduler`](crate::Scheduler)
//! can be exercised with deterministic numbers in tests.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

/// Current host load, as seen by the admission scheduler.
pub trait LoadProbe: Send + Sync {
    /// Number of processes the kernel currently reports as running
    /// (not merely runnable-but-sleeping).
    fn running_processes(&self) -> io::Result<u64>;

    /// One-minute load average.
    fn load_average_1m(&self) -> io::Result<f64>;

    /// Number of logical CPUs available to this process.
    fn cpu_count(&self) -> u64;
}

/// Reads `/proc/stat` and `/proc/loadavg`, as the original shell-level
/// build tool does.
#[derive(Debug, Default)]
pub struct LinuxLoadProbe {
    cpu_count: u64,
}

impl LinuxLoadProbe {
    /// Probe `std::thread::available_parallelism` once at construction time;
    /// it does not change for the life of the process.
    pub fn new() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get() as u64)
            .unwrap_or(1);
        Self { cpu_count }
    }
}

impl LoadProbe for LinuxLoadProbe {
    fn running_processes(&self) -> io::Result<u64> {
        let contents = fs::read_to_string("/proc/stat")?;
        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("procs_running") {
                if let Some(value) = rest.split_whitespace().next() {
                    if let Ok(n) = value.parse() {
                        return Ok(n);
                    }
                }
            }
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "procs_running not found in /proc/stat",
        ))
    }

    fn load_average_1m(&self) -> io::Result<f64> {
        let contents = fs::read_to_string("/proc/loadavg")?;
        contents
            .split_whitespace()
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc/loadavg"))
    }

    fn cpu_count(&self) -> u64 {
        self.cpu_count
    }
}

/// A `LoadProbe` with settable, fixed readings, for deterministic tests of
/// the Scheduler's admission heuristic.
pub struct FakeLoadProbe {
    running: AtomicU64,
    load_avg_milli: AtomicU64,
    cpus: u64,
}

impl FakeLoadProbe {
    pub fn new(running: u64, load_average_1m: f64, cpu_count: u64) -> Self {
        Self {
            running: AtomicU64::new(running),
            load_avg_milli: AtomicU64::new((load_average_1m * 1000.0) as u64),
            cpus: cpu_count,
        }
    }

    pub fn set_running(&self, running: u64) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn set_load_average_1m(&self, value: f64) {
        self.load_avg_milli.store((value * 1000.0) as u64, Ordering::SeqCst);
    }
}

impl LoadProbe for FakeLoadProbe {
    fn running_processes(&self) -> io::Result<u64> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    fn load_average_1m(&self) -> io::Result<f64> {
        Ok(self.load_avg_milli.load(Ordering::SeqCst) as f64 / 1000.0)
    }

    fn cpu_count(&self) -> u64 {
        self.cpus
    }
}

#[cfg(test)]
#[path = "load_probe_tests.rs"]
mod tests;
