// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Naming service: the namespace, its locks and replica bookkeeping.
//!
//! Operations other than `lock`/`unlock` take no path locks themselves;
//! clients are expected to hold the appropriate lock around them.

use std::io;
use std::sync::Arc;

use dfs_proto::{Command, Path, Registration, Service, Storage};
use dfs_rmi::{CallerId, RpcError, RpcResult, Stub};
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};

use crate::config::NamingConfig;
use crate::namespace::{Insert, Namespace, PathEntry};
use crate::registry::{Registry, StorageHandle};
use crate::replication::Replicator;

fn not_found(path: &Path) -> RpcError {
    RpcError::NotFound(format!("{} does not exist", path))
}

pub struct NamingService {
    namespace: Arc<Namespace>,
    registry: Arc<Registry>,
    replicator: Replicator,
    replication_threshold: u32,
}

impl NamingService {
    pub fn new(config: &NamingConfig) -> io::Result<Self> {
        let namespace = Arc::new(Namespace::new());
        let registry = Arc::new(Registry::new());
        let replicator = Replicator::new(
            namespace.clone(),
            registry.clone(),
            config.replication_workers,
        )?;
        Ok(Self {
            namespace,
            registry,
            replicator,
            replication_threshold: config.replication_threshold,
        })
    }

    /// Replicas recorded for `path`, in address order.
    pub fn replicas(&self, path: &Path) -> Option<Vec<StorageHandle>> {
        self.namespace.get(path).map(|entry| entry.replicas())
    }

    pub fn registered(&self) -> Vec<StorageHandle> {
        self.registry.snapshot()
    }

    /// Resume replication after [`NamingService::shutdown`].
    pub fn start(&self) -> io::Result<()> {
        self.replicator.start()
    }

    /// Stop scheduling replication; queued copies are dropped.
    pub fn shutdown(&self) {
        self.replicator.shutdown();
    }

    fn ensure_servers(&self) -> RpcResult<()> {
        if self.registry.is_empty() {
            return Err(RpcError::IllegalState(
                "no storage servers are registered".to_string(),
            ));
        }
        Ok(())
    }

    /// Parent entry of `path`, which must exist and be a directory.
    fn parent_directory(&self, path: &Path) -> RpcResult<Option<Arc<PathEntry>>> {
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        match self.namespace.get(&parent) {
            Some(entry) if !entry.is_file() => Ok(Some(entry)),
            _ => Err(RpcError::NotFound(format!("parent of {} is not a directory", path))),
        }
    }

    /// A server hosting `parent`, else any registered server.
    fn choose_server(&self, parent: &PathEntry) -> RpcResult<StorageHandle> {
        let mut rng = rand::thread_rng();
        let local = parent.replicas();
        let chosen = match local.choose(&mut rng) {
            Some(server) => Some(server.clone()),
            None => self.registry.snapshot().choose(&mut rng).cloned(),
        };
        chosen.ok_or_else(|| RpcError::IllegalState("no storage servers are registered".to_string()))
    }

    /// Delete invalidated copies. They leave the replica set even when the
    /// command fails.
    fn invalidate(&self, entry: &PathEntry) {
        for stale in entry.retain_first_replica() {
            match stale.command.delete(entry.path()) {
                Ok(true) => debug!(path = %entry.path(), server = %stale, "stale replica deleted"),
                Ok(false) => warn!(path = %entry.path(), server = %stale, "stale replica was already gone"),
                Err(e) => warn!(path = %entry.path(), server = %stale, error = %e, "cannot delete stale replica"),
            }
        }
    }
}

impl Service for NamingService {
    #[instrument(skip_all, fields(component = "naming", operation = "lock", path = %path, exclusive = exclusive))]
    fn lock(&self, path: &Path, exclusive: bool) -> RpcResult<()> {
        let chain = self.namespace.chain(path).ok_or_else(|| not_found(path))?;
        let Some((target, ancestors)) = chain.split_last() else {
            return Err(not_found(path));
        };

        let caller = CallerId::current();
        for ancestor in ancestors {
            ancestor.lock().lock_shared(caller);
        }
        if exclusive {
            target.lock().lock_exclusive(caller);
            if target.is_file() {
                self.invalidate(target);
            }
        } else {
            target.lock().lock_shared(caller);
        }
        debug!("lock granted");
        Ok(())
    }

    #[instrument(skip_all, fields(component = "naming", operation = "unlock", path = %path, exclusive = exclusive))]
    fn unlock(&self, path: &Path, exclusive: bool) -> RpcResult<()> {
        let chain = self
            .namespace
            .chain(path)
            .ok_or_else(|| RpcError::IllegalArgument(format!("{} does not exist", path)))?;
        let Some((target, ancestors)) = chain.split_last() else {
            return Err(RpcError::IllegalArgument(format!("{} does not exist", path)));
        };

        let caller = CallerId::current();
        let released = if exclusive {
            target.lock().unlock_exclusive()
        } else {
            target.lock().unlock_shared(caller)
        };
        released.map_err(|e| RpcError::IllegalArgument(format!("{}: {}", path, e)))?;

        for ancestor in ancestors.iter().rev() {
            ancestor
                .lock()
                .unlock_shared(caller)
                .map_err(|e| RpcError::IllegalArgument(format!("{}: {}", ancestor.path(), e)))?;
        }

        if !exclusive && target.is_file() && target.record_read(self.replication_threshold) {
            self.replicator.schedule(target.clone());
        }
        Ok(())
    }

    fn is_directory(&self, path: &Path) -> RpcResult<bool> {
        let entry = self.namespace.get(path).ok_or_else(|| not_found(path))?;
        Ok(!entry.is_file())
    }

    fn list(&self, directory: &Path) -> RpcResult<Vec<String>> {
        match self.namespace.get(directory) {
            Some(entry) if !entry.is_file() => Ok(entry.children()),
            Some(_) => Err(RpcError::NotFound(format!("{} is not a directory", directory))),
            None => Err(not_found(directory)),
        }
    }

    #[instrument(skip_all, fields(component = "naming", operation = "create_file", path = %file))]
    fn create_file(&self, file: &Path) -> RpcResult<bool> {
        self.ensure_servers()?;
        let Some(parent) = self.parent_directory(file)? else {
            return Ok(false);
        };
        if self.namespace.get(file).is_some() {
            return Ok(false);
        }

        let server = self.choose_server(&parent)?;
        if !server.command.create(file)? {
            debug!(server = %server, "storage server refused create");
            return Ok(false);
        }

        match self.namespace.insert(file, true, Some(&server)) {
            Insert::Inserted => {
                info!(server = %server, "file created");
                Ok(true)
            }
            lost => {
                // Raced with another create or a delete of the parent.
                if let Err(e) = server.command.delete(file) {
                    warn!(server = %server, error = %e, "cannot remove unused copy");
                }
                match lost {
                    Insert::NoParent => Err(RpcError::NotFound(format!(
                        "parent of {} is not a directory",
                        file
                    ))),
                    _ => Ok(false),
                }
            }
        }
    }

    #[instrument(skip_all, fields(component = "naming", operation = "create_directory", path = %directory))]
    fn create_directory(&self, directory: &Path) -> RpcResult<bool> {
        self.ensure_servers()?;
        if self.parent_directory(directory)?.is_none() {
            return Ok(false);
        }
        match self.namespace.insert(directory, false, None) {
            Insert::Inserted => Ok(true),
            Insert::Exists => Ok(false),
            Insert::NoParent => Err(RpcError::NotFound(format!(
                "parent of {} is not a directory",
                directory
            ))),
        }
    }

    #[instrument(skip_all, fields(component = "naming", operation = "delete", path = %path))]
    fn delete(&self, path: &Path) -> RpcResult<bool> {
        if path.is_root() {
            return Err(RpcError::NotFound("the root cannot be deleted".to_string()));
        }
        let entry = self.namespace.get(path).ok_or_else(|| not_found(path))?;
        self.parent_directory(path)?;

        let replicas = entry.replicas();
        for server in &replicas {
            match server.command.delete(path) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(server = %server, "storage server refused delete");
                    return Ok(false);
                }
                Err(e) => {
                    warn!(server = %server, error = %e, "delete failed");
                    return Ok(false);
                }
            }
        }

        let Some(removed) = self.namespace.remove_subtree(path) else {
            return Err(not_found(path));
        };
        // Replication may have attached servers after the snapshot.
        for late in removed.replicas().iter().filter(|server| !replicas.contains(*server)) {
            if let Err(e) = late.command.delete(path) {
                warn!(server = %late, error = %e, "cannot delete late replica");
            }
        }
        info!(replicas = replicas.len(), "deleted");
        Ok(true)
    }

    fn get_storage(&self, file: &Path) -> RpcResult<Stub<dyn Storage>> {
        let entry = match self.namespace.get(file) {
            Some(entry) if entry.is_file() => entry,
            Some(_) => return Err(RpcError::NotFound(format!("{} is a directory", file))),
            None => return Err(not_found(file)),
        };
        entry
            .replicas()
            .choose(&mut rand::thread_rng())
            .map(|server| server.data.clone())
            .ok_or_else(|| RpcError::IllegalState(format!("{} has no replicas", file)))
    }
}

impl Registration for NamingService {
    #[instrument(skip_all, fields(component = "naming", operation = "register", server = %client.address()))]
    fn register(
        &self,
        client: &Stub<dyn Storage>,
        command: &Stub<dyn Command>,
        files: &[Path],
    ) -> RpcResult<Vec<Path>> {
        let handle = StorageHandle::new(client.clone(), command.clone());
        if !self.registry.insert(handle.clone()) {
            return Err(RpcError::IllegalState(format!(
                "storage server {} is already registered",
                client.address()
            )));
        }

        let duplicates = self.namespace.install_files(files, &handle);
        info!(
            files = files.len(),
            duplicates = duplicates.len(),
            "storage server registered"
        );
        Ok(duplicates)
    }
}
