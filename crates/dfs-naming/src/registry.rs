// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Registered storage servers.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use dfs_proto::{Command, Storage};
use dfs_rmi::Stub;

/// The two stubs of one storage server. Identity is the data stub.
#[derive(Clone)]
pub struct StorageHandle {
    pub data: Stub<dyn Storage>,
    pub command: Stub<dyn Command>,
}

impl StorageHandle {
    pub fn new(data: Stub<dyn Storage>, command: Stub<dyn Command>) -> Self {
        Self { data, command }
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageHandle({})", self.data.address())
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data.address())
    }
}

impl PartialEq for StorageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for StorageHandle {}

impl PartialOrd for StorageHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorageHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.cmp(&other.data)
    }
}

impl Hash for StorageHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

/// Storage servers in address order. Entries are never removed.
#[derive(Default)]
pub struct Registry {
    servers: Mutex<BTreeSet<StorageHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a server with the same data stub is present.
    pub fn insert(&self, handle: StorageHandle) -> bool {
        self.servers.lock().unwrap().insert(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.lock().unwrap().is_empty()
    }

    pub fn snapshot(&self) -> Vec<StorageHandle> {
        self.servers.lock().unwrap().iter().cloned().collect()
    }
}
