// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build offload daemon library: the IPC protocol, the Request Server, the
//! Config/Env resolution, and the Client Helpers, built on top of the
//! scheduling and lifecycle primitives in `bos-core`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod env;
pub mod listener;
pub mod protocol;

pub use client::{check_if_running, query_build_info, wait_for_build, BuildStatus};
pub use env::ConfigError;
pub use listener::{RequestServer, ServerConfig};
pub use protocol::{ProtocolError, Request, Response};
