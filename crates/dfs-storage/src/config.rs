// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Storage server settings. A port of 0 picks an ephemeral port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory whose files are served
    pub root: PathBuf,
    /// Name under which clients and the naming server reach this server
    pub hostname: String,
    pub client_port: u16,
    pub command_port: u16,
    pub naming_host: String,
    pub pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            hostname: "127.0.0.1".to_string(),
            client_port: 0,
            command_port: 0,
            naming_host: "127.0.0.1".to_string(),
            pool_size: dfs_rmi::skeleton::DEFAULT_POOL_SIZE,
        }
    }
}

impl StorageConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid storage server configuration")?;
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
        ensure!(!self.hostname.is_empty(), "hostname must not be empty");
        ensure!(
            self.client_port == 0 || self.client_port != self.command_port,
            "client-port and command-port must differ"
        );
        Ok(())
    }
}
