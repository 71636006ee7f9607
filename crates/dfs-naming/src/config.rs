// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Naming server configuration, loadable from TOML.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use dfs_proto::{REGISTRATION_PORT, SERVICE_PORT};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REPLICATION_THRESHOLD: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct NamingConfig {
    pub service_address: SocketAddr,
    pub registration_address: SocketAddr,
    /// Worker threads per skeleton
    pub pool_size: usize,
    /// Shared-lock releases on a file before another replica is made
    pub replication_threshold: u32,
    pub replication_workers: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            service_address: SocketAddr::from(([0, 0, 0, 0], SERVICE_PORT)),
            registration_address: SocketAddr::from(([0, 0, 0, 0], REGISTRATION_PORT)),
            // Lock requests park a worker until granted.
            pool_size: 64,
            replication_threshold: DEFAULT_REPLICATION_THRESHOLD,
            replication_workers: 2,
        }
    }
}

impl NamingConfig {
    /// Both interfaces on ephemeral loopback ports.
    pub fn loopback() -> Self {
        Self {
            service_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            registration_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid naming server configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.pool_size > 0, "pool-size must be positive");
        ensure!(self.replication_threshold > 0, "replication-threshold must be positive");
        ensure!(self.replication_workers > 0, "replication-workers must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_well_known_ports() {
        let config = NamingConfig::default();
        assert_eq!(config.service_address.port(), 6000);
        assert_eq!(config.registration_address.port(), 6001);
        assert_eq!(config.replication_threshold, 20);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NamingConfig::from_toml_str(
            r#"
            service-address = "127.0.0.1:7000"
            replication-threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.service_address, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.replication_threshold, 5);
        assert_eq!(config.registration_address.port(), 6001);
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_threshold() {
        assert!(NamingConfig::from_toml_str("replicas = 3").is_err());
        assert!(NamingConfig::from_toml_str("replication-threshold = 0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("naming.toml");
        std::fs::write(&path, "pool-size = 8\n").unwrap();
        assert_eq!(NamingConfig::load(&path).unwrap().pool_size, 8);
        assert!(NamingConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
