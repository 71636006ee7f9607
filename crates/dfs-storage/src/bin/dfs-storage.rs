// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Storage server executable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dfs_logging::CliLoggingArgs;
use dfs_storage::{StorageConfig, StorageServer};
use tracing::info;

const COMPONENT: &str = "dfs-storage";

#[derive(Parser)]
#[command(name = "dfs-storage")]
#[command(about = "Storage server for the distributed filesystem")]
#[command(version, long_about = None)]
struct Cli {
    /// Directory to serve; overrides the configuration file
    root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hostname advertised to clients and the naming server
    #[arg(long)]
    hostname: Option<String>,

    /// Host running the naming server
    #[arg(long)]
    naming_host: Option<String>,

    #[arg(long)]
    client_port: Option<u16>,

    #[arg(long)]
    command_port: Option<u16>,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

impl Cli {
    fn storage_config(&self) -> Result<StorageConfig> {
        let mut config = match &self.config {
            Some(path) => StorageConfig::load(path)?,
            None => StorageConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(hostname) = &self.hostname {
            config.hostname = hostname.clone();
        }
        if let Some(naming_host) = &self.naming_host {
            config.naming_host = naming_host.clone();
        }
        if let Some(port) = self.client_port {
            config.client_port = port;
        }
        if let Some(port) = self.command_port {
            config.command_port = port;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.storage_config()?;
    cli.logging.init(COMPONENT)?;

    std::fs::create_dir_all(&config.root)
        .with_context(|| format!("cannot create {}", config.root.display()))?;
    let naming = dfs_proto::registration_stub(&config.naming_host)
        .context("cannot resolve naming server")?;

    let server = StorageServer::new(&config).context("failed to create storage server")?;
    server
        .start(&config.hostname, &naming)
        .context("failed to start storage server")?;

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
