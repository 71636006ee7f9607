// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test logging for the dfs workspace.
//!
//! Each test gets its own log file under `target/test-logs/<date>/`. A passing
//! test prints one line; a failing one prints the log path and its size.

extern crate self as dfs_test_utils;

pub mod guard;
pub mod logging;

pub use dfs_test_utils_macros::logged_test;
pub use guard::TestLoggerGuard;
pub use logging::{create_unique_test_log, TestLogError, TestLogger};
