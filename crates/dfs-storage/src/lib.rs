// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Storage server: serves one local directory through the `Storage` and
//! `Command` interfaces.

pub mod config;
pub mod files;
pub mod server;

pub use config::StorageConfig;
pub use files::LocalFiles;
pub use server::StorageServer;
