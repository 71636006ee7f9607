// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::net::SocketAddr;
use std::sync::Arc;

use dfs_proto::{Command, Registration, Storage};
use dfs_rmi::{RpcResult, Skeleton, SkeletonConfig, Stub};
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::files::LocalFiles;

pub struct StorageServer {
    files: Arc<LocalFiles>,
    data: Skeleton<dyn Storage>,
    command: Skeleton<dyn Command>,
}

impl StorageServer {
    pub fn new(config: &StorageConfig) -> RpcResult<Self> {
        let files = Arc::new(LocalFiles::new(&config.root));
        let skeleton_config = |port: u16| {
            SkeletonConfig::at(SocketAddr::from(([0, 0, 0, 0], port))).pool_size(config.pool_size)
        };

        let as_storage: Arc<dyn Storage> = files.clone();
        let data = Skeleton::new(as_storage, skeleton_config(config.client_port))?;
        let as_command: Arc<dyn Command> = files.clone();
        let command = Skeleton::new(as_command, skeleton_config(config.command_port))?;
        Ok(Self {
            files,
            data,
            command,
        })
    }

    pub fn files(&self) -> &Arc<LocalFiles> {
        &self.files
    }

    /// Start serving and register with the naming server, advertising
    /// `hostname`. Files the naming server already knows are deleted locally.
    pub fn start(&self, hostname: &str, naming: &Stub<dyn Registration>) -> RpcResult<()> {
        self.data.start()?;
        if let Err(e) = self.command.start() {
            self.data.stop();
            return Err(e);
        }

        if let Err(e) = self.register(hostname, naming) {
            self.stop();
            return Err(e);
        }
        Ok(())
    }

    fn register(&self, hostname: &str, naming: &Stub<dyn Registration>) -> RpcResult<()> {
        let data = Stub::for_skeleton_at(&self.data, hostname)?;
        let command = Stub::for_skeleton_at(&self.command, hostname)?;
        let files = self.files.list()?;

        let duplicates = naming.register(&data, &command, &files)?;
        for duplicate in &duplicates {
            if let Err(e) = self.files.remove_and_prune(duplicate) {
                warn!(component = "storage", path = %duplicate, error = %e, "cannot remove duplicate");
            }
        }
        info!(
            component = "storage",
            root = %self.files.root().display(),
            data = %data.address(),
            command = %command.address(),
            files = files.len(),
            duplicates = duplicates.len(),
            "storage server registered"
        );
        Ok(())
    }

    pub fn stop(&self) {
        self.data.stop();
        self.command.stop();
    }

    /// Data stub reachable through `hostname`.
    pub fn data_stub(&self, hostname: &str) -> RpcResult<Stub<dyn Storage>> {
        Stub::for_skeleton_at(&self.data, hostname)
    }

    pub fn command_stub(&self, hostname: &str) -> RpcResult<Stub<dyn Command>> {
        Stub::for_skeleton_at(&self.command, hostname)
    }
}
