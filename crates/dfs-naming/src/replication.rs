// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Background replication of frequently read files.

use std::io;
use std::sync::{Arc, Mutex};

use dfs_proto::Command;
use dfs_rmi::{CallerId, WorkerPool};
use tracing::{debug, info, warn};

use crate::namespace::{Namespace, PathEntry, SharedChainGuard};
use crate::registry::Registry;

const POOL_NAME: &str = "dfs-replication";

pub struct Replicator {
    namespace: Arc<Namespace>,
    registry: Arc<Registry>,
    workers: usize,
    pool: Mutex<Option<WorkerPool>>,
}

impl Replicator {
    pub fn new(namespace: Arc<Namespace>, registry: Arc<Registry>, workers: usize) -> io::Result<Self> {
        Ok(Self {
            namespace,
            registry,
            workers,
            pool: Mutex::new(Some(WorkerPool::new(POOL_NAME, workers)?)),
        })
    }

    /// Bring the worker pool back after [`Replicator::shutdown`]. Does nothing
    /// while the pool is running.
    pub fn start(&self) -> io::Result<()> {
        let mut pool = self.pool.lock().unwrap();
        if pool.is_none() {
            *pool = Some(WorkerPool::new(POOL_NAME, self.workers)?);
            debug!(component = "replication", workers = self.workers, "replication pool restarted");
        }
        Ok(())
    }

    /// Queue a copy of `entry` to one more storage server. Returns without
    /// waiting for the copy.
    pub fn schedule(&self, entry: Arc<PathEntry>) {
        let namespace = self.namespace.clone();
        let registry = self.registry.clone();
        let path = entry.path().clone();
        let queued = match self.pool.lock().unwrap().as_ref() {
            Some(pool) => pool.execute(move || CallerId::scope(|| replicate(&namespace, &registry, &entry))),
            None => false,
        };
        if queued {
            debug!(component = "replication", path = %path, "replication scheduled");
        } else {
            debug!(component = "replication", path = %path, "replication pool is shut down");
        }
    }

    /// Discard queued tasks; running copies finish on their own.
    pub fn shutdown(&self) {
        if let Some(mut pool) = self.pool.lock().unwrap().take() {
            pool.shutdown_now();
        }
    }
}

fn replicate(namespace: &Namespace, registry: &Registry, entry: &Arc<PathEntry>) {
    let path = entry.path();
    let chain = match namespace.chain(path) {
        Some(chain) if chain.last().is_some_and(|last| Arc::ptr_eq(last, entry)) => chain,
        _ => {
            debug!(component = "replication", path = %path, "file deleted before replication");
            return;
        }
    };
    let _locked = SharedChainGuard::acquire(chain);

    let holders = entry.replicas();
    let Some(source) = holders.first() else {
        warn!(component = "replication", path = %path, "file has no replica to copy from");
        return;
    };
    let Some(candidate) = registry
        .snapshot()
        .into_iter()
        .find(|server| !holders.contains(server))
    else {
        info!(component = "replication", path = %path, "every storage server already holds a copy");
        return;
    };

    match candidate.command.copy(path, &source.data) {
        Ok(true) => {
            if namespace.attach_replica(entry, &candidate) {
                info!(component = "replication", path = %path, server = %candidate, "replica added");
            } else {
                debug!(component = "replication", path = %path, server = %candidate, "file deleted during copy");
                if let Err(e) = candidate.command.delete(path) {
                    warn!(component = "replication", path = %path, server = %candidate, error = %e, "cannot remove orphaned copy");
                }
            }
        }
        Ok(false) => {
            warn!(component = "replication", path = %path, server = %candidate, "copy refused");
        }
        Err(e) => {
            warn!(component = "replication", path = %path, server = %candidate, error = %e, "copy failed");
        }
    }
}
