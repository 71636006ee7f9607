// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Naming server for the distributed filesystem.
//!
//! Keeps the directory tree with a reader/writer lock per path, and copies
//! files that are read often to additional storage servers.

pub mod config;
pub mod lock;
pub mod namespace;
pub mod registry;
pub mod replication;
pub mod server;
pub mod service;

pub use config::NamingConfig;
pub use registry::StorageHandle;
pub use server::NamingServer;
pub use service::NamingService;
