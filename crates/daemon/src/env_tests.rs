// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

#[test]
#[serial]
fn socket_path_honors_explicit_override() {
    std::env::set_var("BOS_SOCKET_PATH", "/tmp/explicit.sock");
    assert_eq!(socket_path(), PathBuf::from("/tmp/explicit.sock"));
    std::env::remove_var("BOS_SOCKET_PATH");
}

#[test]
#[serial]
fn socket_path_falls_back_to_runtime_dir() {
    std::env::remove_var("BOS_SOCKET_PATH");
    std::env::set_var("XDG_RUNTIME_DIR", "/tmp/run/user/1000");
    assert_eq!(
        socket_path(),
        PathBuf::from("/tmp/run/user/1000/bos-daemon.sock")
    );
    std::env::remove_var("XDG_RUNTIME_DIR");
}

#[test]
#[serial]
fn log_dir_prefers_xdg_state_home() {
    std::env::set_var("XDG_STATE_HOME", "/tmp/state");
    assert_eq!(log_dir().unwrap(), PathBuf::from("/tmp/state/bos-daemon"));
    std::env::remove_var("XDG_STATE_HOME");
}

#[test]
#[serial]
fn exit_on_idle_after_defaults_to_thirty_seconds() {
    std::env::remove_var("BOS_EXIT_ON_IDLE_SECS");
    assert_eq!(exit_on_idle_after(), Duration::from_secs(30));
}

#[test]
#[serial]
fn exit_on_idle_after_honors_override() {
    std::env::set_var("BOS_EXIT_ON_IDLE_SECS", "5");
    assert_eq!(exit_on_idle_after(), Duration::from_secs(5));
    std::env::remove_var("BOS_EXIT_ON_IDLE_SECS");
}
