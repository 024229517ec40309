// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rotating per-build log files plus the overwritable terminal status line.
//!
//! Every call to [`LogRouter::log`] is prefixed with a snapshot of the
//! [`Stats`] registry so a glance at the terminal (or a build's log file)
//! always shows current load alongside the message.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stats::Stats;

/// Number of rotated log files kept per output directory, `buildserver.log.0`
/// (newest) through `buildserver.log.{MAX_LOGFILES - 1}` (oldest).
const MAX_LOGFILES: usize = 6;

const LOGFILE_NAME: &str = "buildserver.log";
const HEADER_MARKER: &str = "build_id = ";

fn header_line(build_id: &str) -> String {
    format!("#### Start of log for build_id = {build_id} ####\n")
}

/// Pull the build-id out of a header line this router (or a prior run of
/// it) wrote, if `line` looks like one.
fn parse_header_build_id(line: &str) -> Option<&str> {
    let line = line.trim();
    if !line.starts_with("####") || !line.ends_with("####") {
        return None;
    }
    let idx = line.find(HEADER_MARKER)?;
    let rest = &line[idx + HEADER_MARKER.len()..];
    let id = rest.trim_end_matches('#').trim();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Routes status messages to a rotating log file per build and, unless
/// asked to stay quiet, to a single overwritable line on the terminal.
///
/// Open file handles are keyed by build-id, matching the client-visible
/// identity the Request Server and Client Helpers already key everything
/// else by; a build-id is only ever associated with one output directory
/// for the life of a daemon run.
pub struct LogRouter {
    stats: Arc<Stats>,
    open: Mutex<HashMap<String, File>>,
}

impl LogRouter {
    /// Create a router that prefixes every message with `stats`'s summary.
    pub fn new(stats: Arc<Stats>) -> Self {
        Self {
            stats,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure a log file is open for `build_id`, reusing one already open
    /// for this build-id, reattaching to a matching `buildserver.log.0` left
    /// by a prior daemon run under `outdir`, or rotating and creating fresh.
    pub fn create_logfile(&self, build_id: &str, outdir: &Path) -> io::Result<()> {
        if self.open.lock().contains_key(build_id) {
            return Ok(());
        }

        fs::create_dir_all(outdir)?;
        let path = outdir.join(format!("{LOGFILE_NAME}.0"));

        if let Some(existing_id) = read_header_build_id(&path) {
            if existing_id == build_id {
                let file = OpenOptions::new().append(true).open(&path)?;
                self.open.lock().insert(build_id.to_string(), file);
                return Ok(());
            }
        }

        rotate(outdir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(header_line(build_id).as_bytes())?;
        file.flush()?;
        self.open.lock().insert(build_id.to_string(), file);
        Ok(())
    }

    /// Drop the open handle for `build_id`, if any.
    pub fn close_logfile(&self, build_id: &str) {
        self.open.lock().remove(build_id);
    }

    /// Log `msg`, prefixed with the current Stats summary (scoped to
    /// `build_id` when given). Appended in full to the build's log file if
    /// one is open. Unless `quiet`, also written to the terminal on a
    /// single overwritable line, with `msg` (not the prefix) truncated to
    /// fit the terminal width.
    pub fn log(&self, msg: &str, build_id: Option<&str>, quiet: bool) {
        self.log_with_end(msg, build_id, quiet, "");
    }

    /// Like [`LogRouter::log`], but terminates the terminal line with a
    /// newline instead of leaving it overwritable. Used for the handful of
    /// messages (`STOPPING SERVER...`, `STOPPED`) that must survive the next
    /// status line rather than be clobbered by it.
    pub fn log_line(&self, msg: &str, build_id: Option<&str>, quiet: bool) {
        self.log_with_end(msg, build_id, quiet, "\n");
    }

    fn log_with_end(&self, msg: &str, build_id: Option<&str>, quiet: bool, end: &str) {
        let prefix = format!("[{}] ", self.stats.prefix(build_id));

        if let Some(build_id) = build_id {
            let mut open = self.open.lock();
            if let Some(file) = open.get_mut(build_id) {
                let _ = writeln!(file, "{prefix}{msg}");
                let _ = file.flush();
            }
        }

        if !quiet {
            write_terminal_line(&prefix, msg, end);
        }
    }

    /// Log `msg` verbatim, with no Stats prefix and no truncation, used for
    /// multi-line reports such as a task's failure dump.
    pub fn log_raw(&self, msg: &str, build_id: Option<&str>, quiet: bool) {
        if let Some(build_id) = build_id {
            let mut open = self.open.lock();
            if let Some(file) = open.get_mut(build_id) {
                let _ = writeln!(file, "{msg}");
                let _ = file.flush();
            }
        }
        if !quiet {
            println!("\n{msg}");
        }
    }
}

fn read_header_build_id(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut first_line = String::new();
    let mut buf = [0u8; 1];
    loop {
        let n = file.read(&mut buf).ok()?;
        if n == 0 || buf[0] == b'\n' {
            break;
        }
        first_line.push(buf[0] as char);
    }
    parse_header_build_id(&first_line).map(str::to_string)
}

fn rotate(outdir: &Path) -> io::Result<()> {
    for idx in (0..MAX_LOGFILES).rev() {
        let src = outdir.join(format!("{LOGFILE_NAME}.{idx}"));
        if src.exists() {
            let dst = outdir.join(format!("{LOGFILE_NAME}.{}", idx + 1));
            fs::rename(src, dst)?;
        }
    }
    Ok(())
}

/// Width of a terminal line reserved for the message after `prefix_len`
/// characters are spent on the Stats prefix.
fn message_budget(prefix_len: usize) -> usize {
    let width = terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(80);
    width.saturating_sub(prefix_len)
}

fn truncate_middle(line: &str, budget: usize) -> String {
    let total = line.chars().count();
    if total <= budget {
        return line.to_string();
    }
    if budget < 4 {
        return line.chars().take(budget).collect();
    }
    let head: String = line.chars().take(2).collect();
    let ellipsis = "...";
    let tail_len = budget - 2 - ellipsis.chars().count();
    let tail: String = line.chars().skip(total - tail_len).collect();
    format!("{head}{ellipsis}{tail}")
}

/// Write `prefix + msg` on a single overwritable terminal line, truncating
/// `msg` (not `prefix`) to whatever width remains after the prefix, then
/// emitting `end` (empty to stay overwritable, `"\n"` to commit the line).
fn write_terminal_line(prefix: &str, msg: &str, end: &str) {
    let budget = message_budget(prefix.chars().count());
    let fitted_msg = truncate_middle(msg, budget);
    print!("\r{prefix}{fitted_msg}\x1b[K{end}");
    let _ = io::stdout().flush();
}

#[cfg(test)]
#[path = "log_router_tests.rs"]
mod tests;
