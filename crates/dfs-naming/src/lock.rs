// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Reentrant reader/writer lock scoped to one path.
//!
//! Holders are identified by [`CallerId`]. Waiting writers take priority over
//! new readers. Release is counted per mode rather than tied to the
//! acquiring caller, because remote clients lock and unlock in separate
//! requests.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

use dfs_rmi::CallerId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("no shared lock is held")]
    SharedNotHeld,
    #[error("no exclusive lock is held")]
    ExclusiveNotHeld,
}

#[derive(Default)]
struct Holders {
    readers: HashMap<CallerId, u32>,
    writer: Option<(CallerId, u32)>,
    waiting_writers: usize,
}

impl Holders {
    fn holds_any(&self, caller: CallerId) -> bool {
        self.readers.contains_key(&caller) || self.writer.is_some_and(|(w, _)| w == caller)
    }

    fn can_share(&self, caller: CallerId) -> bool {
        self.holds_any(caller) || (self.writer.is_none() && self.waiting_writers == 0)
    }

    fn can_own(&self, caller: CallerId) -> bool {
        match self.writer {
            Some((writer, _)) => writer == caller,
            None => self.readers.keys().all(|reader| *reader == caller),
        }
    }
}

#[derive(Default)]
pub struct PathLock {
    holders: Mutex<Holders>,
    changed: Condvar,
}

impl PathLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_shared(&self, caller: CallerId) {
        let mut holders = self.holders.lock().unwrap();
        while !holders.can_share(caller) {
            holders = self.changed.wait(holders).unwrap();
        }
        *holders.readers.entry(caller).or_insert(0) += 1;
    }

    /// Granted when nobody else holds the lock; a sole reader upgrades.
    pub fn lock_exclusive(&self, caller: CallerId) {
        let mut holders = self.holders.lock().unwrap();
        holders.waiting_writers += 1;
        while !holders.can_own(caller) {
            holders = self.changed.wait(holders).unwrap();
        }
        holders.waiting_writers -= 1;
        let held = holders.writer.map_or(0, |(_, count)| count);
        holders.writer = Some((caller, held + 1));
    }

    /// Release one shared hold, preferring one taken by `caller`.
    pub fn unlock_shared(&self, caller: CallerId) -> Result<(), LockError> {
        let mut holders = self.holders.lock().unwrap();
        let reader = if holders.readers.contains_key(&caller) {
            caller
        } else {
            *holders.readers.keys().next().ok_or(LockError::SharedNotHeld)?
        };

        if let Some(count) = holders.readers.get_mut(&reader) {
            *count -= 1;
            if *count == 0 {
                holders.readers.remove(&reader);
            }
        }
        drop(holders);
        self.changed.notify_all();
        Ok(())
    }

    pub fn unlock_exclusive(&self) -> Result<(), LockError> {
        let mut holders = self.holders.lock().unwrap();
        let (_, count) = holders.writer.as_mut().ok_or(LockError::ExclusiveNotHeld)?;
        *count -= 1;
        if *count == 0 {
            holders.writer = None;
        }
        drop(holders);
        self.changed.notify_all();
        Ok(())
    }

    #[cfg(test)]
    fn snapshot(&self) -> (usize, bool, usize) {
        let holders = self.holders.lock().unwrap();
        (
            holders.readers.values().map(|c| *c as usize).sum(),
            holders.writer.is_some(),
            holders.waiting_writers,
        )
    }
}
