// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RAII guard used by `#[logged_test]`.

use std::path::PathBuf;

use tracing::subscriber::DefaultGuard;

use crate::{TestLogError, TestLogger};

/// Finalizes a [`TestLogger`] exactly once.
///
/// While alive, the guard routes `tracing` events emitted on the current
/// thread into the test log. Dropping it without `finish_success` (for
/// example during a panic unwind) records a failure.
pub struct TestLoggerGuard {
    logger: Option<TestLogger>,
    log_path: PathBuf,
    completed: bool,
    _tracing: DefaultGuard,
}

impl TestLoggerGuard {
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        let logger = TestLogger::new(test_name)?;
        let log_path = logger.log_path().to_path_buf();

        let subscriber = tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(logger.tracing_writer()?))
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_thread_names(true)
            .finish();
        let tracing = tracing::subscriber::set_default(subscriber);

        Ok(Self {
            logger: Some(logger),
            log_path,
            completed: false,
            _tracing: tracing,
        })
    }

    pub fn logger(&mut self) -> &mut TestLogger {
        self.logger.as_mut().expect("TestLoggerGuard logger already finalized")
    }

    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        self.completed = true;
        match self.logger.take() {
            Some(logger) => logger.finish_success(),
            None => Ok(self.log_path.clone()),
        }
    }

    pub fn finish_failure<S: AsRef<str>>(mut self, message: S) -> Result<PathBuf, TestLogError> {
        self.completed = true;
        match self.logger.take() {
            Some(logger) => logger.finish_failure(message.as_ref()),
            None => Ok(self.log_path.clone()),
        }
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }
}

impl Drop for TestLoggerGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        if let Some(logger) = self.logger.take() {
            let reason = if std::thread::panicking() {
                "test panicked"
            } else {
                "test exited without calling finish_success()"
            };

            if let Err(err) = logger.finish_failure(reason) {
                eprintln!(
                    "failed to finalize TestLogger in Drop for {}: {}",
                    self.log_path.display(),
                    err
                );
            }
        }
    }
}
