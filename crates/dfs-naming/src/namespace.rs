// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The directory tree, stored as a map from path to entry.
//!
//! Parent and child links are path lookups. Lock order is the map lock
//! first, then an entry's own mutexes; neither is held across remote calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dfs_proto::Path;
use dfs_rmi::CallerId;

use crate::lock::PathLock;
use crate::registry::StorageHandle;

pub struct PathEntry {
    path: Path,
    is_file: bool,
    children: Mutex<BTreeSet<String>>,
    replicas: Mutex<BTreeSet<StorageHandle>>,
    lock: PathLock,
    reads: AtomicU32,
}

impl PathEntry {
    fn new(path: Path, is_file: bool) -> Self {
        Self {
            path,
            is_file,
            children: Mutex::default(),
            replicas: Mutex::default(),
            lock: PathLock::new(),
            reads: AtomicU32::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }

    pub fn lock(&self) -> &PathLock {
        &self.lock
    }

    pub fn children(&self) -> Vec<String> {
        self.children.lock().unwrap().iter().cloned().collect()
    }

    /// Servers holding this file, or content beneath this directory.
    pub fn replicas(&self) -> Vec<StorageHandle> {
        self.replicas.lock().unwrap().iter().cloned().collect()
    }

    fn add_replica(&self, handle: &StorageHandle) {
        self.replicas.lock().unwrap().insert(handle.clone());
    }

    /// Keep only the first replica in address order; returns the others.
    pub fn retain_first_replica(&self) -> Vec<StorageHandle> {
        let mut replicas = self.replicas.lock().unwrap();
        let mut stale: Vec<_> = std::mem::take(&mut *replicas).into_iter().collect();
        if !stale.is_empty() {
            replicas.insert(stale.remove(0));
        }
        stale
    }

    /// Count one completed read. True when this read reaches `threshold`,
    /// in which case the counter starts over.
    pub fn record_read(&self, threshold: u32) -> bool {
        let reads = self.reads.fetch_add(1, Ordering::AcqRel) + 1;
        reads >= threshold
            && self
                .reads
                .compare_exchange(reads, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }
}

/// Shared locks on a chain of entries, released in reverse on drop.
pub struct SharedChainGuard {
    entries: Vec<Arc<PathEntry>>,
    caller: CallerId,
}

impl SharedChainGuard {
    pub fn acquire(entries: Vec<Arc<PathEntry>>) -> Self {
        let caller = CallerId::current();
        for entry in &entries {
            entry.lock().lock_shared(caller);
        }
        Self { entries, caller }
    }
}

impl Drop for SharedChainGuard {
    fn drop(&mut self) {
        for entry in self.entries.iter().rev() {
            let _ = entry.lock().unlock_shared(self.caller);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Inserted,
    Exists,
    /// The parent is missing or is a file.
    NoParent,
}

pub struct Namespace {
    entries: RwLock<HashMap<Path, Arc<PathEntry>>>,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    pub fn new() -> Self {
        let root = Path::root();
        let mut entries = HashMap::new();
        entries.insert(root.clone(), Arc::new(PathEntry::new(root, false)));
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<PathEntry>> {
        self.entries.read().unwrap().get(path).cloned()
    }

    /// Entries from the root down to `path` inclusive; `None` if any is missing.
    pub fn chain(&self, path: &Path) -> Option<Vec<Arc<PathEntry>>> {
        let ancestors = path.ancestors();
        let entries = self.entries.read().unwrap();
        let chain = ancestors
            .iter()
            .chain(std::iter::once(path))
            .map(|p| entries.get(p).cloned())
            .collect();
        chain
    }

    /// Add a single entry under an existing directory. A file's `replica` is
    /// recorded on the file and on every ancestor.
    pub fn insert(&self, path: &Path, is_file: bool, replica: Option<&StorageHandle>) -> Insert {
        let (Some(parent_path), Some(name)) = (path.parent(), path.last()) else {
            return Insert::Exists;
        };

        let mut entries = self.entries.write().unwrap();
        match entries.get(&parent_path) {
            Some(parent) if !parent.is_file() => {}
            _ => return Insert::NoParent,
        }
        if entries.contains_key(path) {
            return Insert::Exists;
        }

        let entry = Arc::new(PathEntry::new(path.clone(), is_file));
        entries.insert(path.clone(), entry.clone());
        if let Some(parent) = entries.get(&parent_path) {
            parent.children.lock().unwrap().insert(name.to_string());
        }
        if let Some(replica) = replica {
            entry.add_replica(replica);
            for ancestor in path.ancestors() {
                if let Some(ancestor) = entries.get(&ancestor) {
                    ancestor.add_replica(replica);
                }
            }
        }
        Insert::Inserted
    }

    /// Install files hosted by `replica`, creating missing directories.
    /// Returns the paths that could not be installed: those already present
    /// and those beneath an existing file. The root is ignored.
    pub fn install_files(&self, files: &[Path], replica: &StorageHandle) -> Vec<Path> {
        let mut duplicates = Vec::new();
        let mut entries = self.entries.write().unwrap();

        for file in files.iter().filter(|file| !file.is_root()) {
            let ancestors = file.ancestors();
            let blocked = entries.contains_key(file)
                || ancestors
                    .iter()
                    .any(|a| entries.get(a).is_some_and(|entry| entry.is_file()));
            if blocked {
                duplicates.push(file.clone());
                continue;
            }

            for path in ancestors.iter().skip(1).chain(std::iter::once(file)) {
                let is_file = path == file;
                let entry = entries
                    .entry(path.clone())
                    .or_insert_with(|| Arc::new(PathEntry::new(path.clone(), is_file)))
                    .clone();
                if let (Some(parent), Some(name)) = (path.parent(), path.last()) {
                    if let Some(parent) = entries.get(&parent) {
                        parent.children.lock().unwrap().insert(name.to_string());
                    }
                }
                entry.add_replica(replica);
            }
            if let Some(root) = entries.get(&Path::root()) {
                root.add_replica(replica);
            }
        }
        duplicates
    }

    /// Remove `path` and everything beneath it, returning the removed entry.
    pub fn remove_subtree(&self, path: &Path) -> Option<Arc<PathEntry>> {
        let (Some(parent), Some(name)) = (path.parent(), path.last()) else {
            return None;
        };

        let mut entries = self.entries.write().unwrap();
        let removed = entries.remove(path)?;
        if !removed.is_file() {
            entries.retain(|p, _| !p.is_subpath_of(path));
        }
        if let Some(parent) = entries.get(&parent) {
            parent.children.lock().unwrap().remove(name);
        }
        Some(removed)
    }

    /// Record `replica` for `entry` and its ancestors if `entry` is still the
    /// one registered at its path.
    pub fn attach_replica(&self, entry: &Arc<PathEntry>, replica: &StorageHandle) -> bool {
        let entries = self.entries.read().unwrap();
        match entries.get(entry.path()) {
            Some(current) if Arc::ptr_eq(current, entry) => {}
            _ => return false,
        }
        entry.add_replica(replica);
        for ancestor in entry.path().ancestors() {
            if let Some(ancestor) = entries.get(&ancestor) {
                ancestor.add_replica(replica);
            }
        }
        true
    }
}
