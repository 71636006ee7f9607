// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Naming server executable.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dfs_logging::CliLoggingArgs;
use dfs_naming::{NamingConfig, NamingServer};
use tracing::info;

const COMPONENT: &str = "dfs-naming";

#[derive(Parser)]
#[command(name = "dfs-naming")]
#[command(about = "Naming server for the distributed filesystem")]
#[command(version, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address of the client service interface
    #[arg(long)]
    service_address: Option<SocketAddr>,

    /// Address of the storage registration interface
    #[arg(long)]
    registration_address: Option<SocketAddr>,

    /// Shared-lock releases on a file before it is replicated
    #[arg(long)]
    replication_threshold: Option<u32>,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

impl Cli {
    fn naming_config(&self) -> Result<NamingConfig> {
        let mut config = match &self.config {
            Some(path) => NamingConfig::load(path)?,
            None => NamingConfig::default(),
        };
        if let Some(address) = self.service_address {
            config.service_address = address;
        }
        if let Some(address) = self.registration_address {
            config.registration_address = address;
        }
        if let Some(threshold) = self.replication_threshold {
            config.replication_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.naming_config()?;
    cli.logging.init(COMPONENT)?;

    let server = NamingServer::new(&config).context("failed to create naming server")?;
    server.start().context("failed to start naming server")?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install signal handler")?;

    let _ = stop_rx.recv();
    info!(component = COMPONENT, "shutting down");
    server.stop();
    Ok(())
}
