// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TestLogError {
    #[error("Failed to create test log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write to test log file: {path}")]
    WriteError { path: PathBuf },

    #[error("Invalid test name: {name}")]
    InvalidTestName { name: String },
}

/// Append-only log file for one test.
pub struct TestLogger {
    log_path: PathBuf,
    writer: BufWriter<File>,
    test_name: String,
    start_time: DateTime<Utc>,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        validate_test_name(test_name)?;

        let log_path = create_unique_test_log(test_name);
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        let mut logger = Self {
            log_path,
            writer: BufWriter::new(file),
            test_name: test_name.to_string(),
            start_time: Utc::now(),
        };
        logger.write_header()?;

        Ok(logger)
    }

    /// Log a timestamped line
    pub fn log(&mut self, message: &str) -> Result<(), TestLogError> {
        let timestamp = Utc::now().format("%H:%M:%S%.3f");
        writeln!(self.writer, "[{}] {}", timestamp, message)
            .and_then(|_| self.writer.flush())
            .map_err(|_| TestLogError::WriteError {
                path: self.log_path.clone(),
            })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Second handle onto the log file, used as the `tracing` sink.
    pub(crate) fn tracing_writer(&self) -> Result<File, TestLogError> {
        Ok(OpenOptions::new().append(true).open(&self.log_path)?)
    }

    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        let elapsed = self.elapsed_secs();
        self.log(&format!("Test completed successfully in {:.3}s", elapsed))?;
        drop(self.writer);

        println!("✅ {} passed", self.test_name);
        Ok(self.log_path)
    }

    pub fn finish_failure(mut self, error_message: &str) -> Result<PathBuf, TestLogError> {
        let elapsed = self.elapsed_secs();
        self.log(&format!(
            "Test failed after {:.3}s: {}",
            elapsed, error_message
        ))?;
        drop(self.writer);

        match fs::metadata(&self.log_path) {
            Ok(metadata) => println!(
                "❌ {} failed - Log: {} ({} bytes)",
                self.test_name,
                self.log_path.display(),
                metadata.len()
            ),
            Err(_) => println!(
                "❌ {} failed - Log: {}",
                self.test_name,
                self.log_path.display()
            ),
        }
        Ok(self.log_path)
    }

    fn elapsed_secs(&self) -> f64 {
        Utc::now().signed_duration_since(self.start_time).num_milliseconds() as f64 / 1000.0
    }

    fn write_header(&mut self) -> Result<(), TestLogError> {
        writeln!(self.writer, "=== dfs test log ===")?;
        writeln!(self.writer, "Test: {}", self.test_name)?;
        writeln!(
            self.writer,
            "Started: {}",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(self.writer, "Process: {}", std::process::id())?;
        if let Some(thread_name) = std::thread::current().name() {
            writeln!(self.writer, "Thread: {}", thread_name)?;
        }
        writeln!(self.writer, "=== Log Output ===")?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Unique log path: `target/test-logs/YYYY-MM-DD/<name>-HH-MM-SS-<uuid>.log`
pub fn create_unique_test_log(test_name: &str) -> PathBuf {
    let now = Utc::now();
    let log_dir = find_workspace_root()
        .join("target")
        .join("test-logs")
        .join(now.format("%Y-%m-%d").to_string());

    fs::create_dir_all(&log_dir).unwrap_or_else(|e| {
        panic!(
            "Failed to create test log directory {}: {}",
            log_dir.display(),
            e
        );
    });

    log_dir.join(format!(
        "{}-{}-{}.log",
        sanitize_filename(test_name),
        now.format("%H-%M-%S"),
        Uuid::new_v4()
    ))
}

fn find_workspace_root() -> PathBuf {
    let current_dir = env::current_dir().expect("Failed to get current directory");

    current_dir
        .ancestors()
        .find(|dir| {
            fs::read_to_string(dir.join("Cargo.toml"))
                .map(|content| content.contains("[workspace]"))
                .unwrap_or(false)
        })
        .map(Path::to_path_buf)
        .unwrap_or(current_dir)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

fn validate_test_name(name: &str) -> Result<(), TestLogError> {
    if name.is_empty() || name.len() > 200 {
        return Err(TestLogError::InvalidTestName {
            name: name.to_string(),
        });
    }
    Ok(())
}
