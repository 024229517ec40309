// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-build-id buffer of formatted task output, pulled by QUERY_BUILD
//! responses and flushed to remote TTYs at shutdown.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;

use parking_lot::Mutex;

/// Banner written ahead of any messages flushed to a build's TTY at shutdown.
const SHUTDOWN_BANNER: &str =
    "build offload daemon shutting down with queued task outputs. Flushing now:";

#[derive(Default)]
struct OutputQueueInner {
    pending: HashMap<String, Vec<String>>,
    ttys: HashMap<String, File>,
}

/// Thread-safe buffer of output strings awaiting pickup by a client, plus
/// the remembered TTY sink (if any) for each build-id.
#[derive(Default)]
pub struct OutputQueue {
    inner: Mutex<OutputQueueInner>,
}

impl OutputQueue {
    /// Create an empty output queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` for `build_id`, remembering `tty` as its sink if given.
    pub fn add_output(&self, build_id: &str, text: String, tty: Option<File>) {
        let mut inner = self.inner.lock();
        inner
            .pending
            .entry(build_id.to_string())
            .or_default()
            .push(text);
        if let Some(tty) = tty {
            inner.ttys.insert(build_id.to_string(), tty);
        }
    }

    /// Atomically take and clear the pending outputs for `build_id`.
    pub fn get_pending_outputs(&self, build_id: &str) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner.pending.remove(build_id).unwrap_or_default()
    }

    /// Write a shutdown banner and every buffered message to each build's
    /// remembered TTY, then clear all state. Best-effort: a write failure
    /// for one build's TTY does not stop the others from flushing.
    pub fn flush_messages(&self) {
        let mut inner = self.inner.lock();
        let pending = std::mem::take(&mut inner.pending);
        for (build_id, messages) in pending {
            if messages.is_empty() {
                continue;
            }
            if let Some(tty) = inner.ttys.get_mut(&build_id) {
                let _ = writeln!(tty, "\n{SHUTDOWN_BANNER}");
                for message in &messages {
                    let _ = writeln!(tty, "{message}");
                }
            }
        }
        inner.ttys.clear();
    }
}

#[cfg(test)]
#[path = "output_queue_tests.rs"]
mod tests;
