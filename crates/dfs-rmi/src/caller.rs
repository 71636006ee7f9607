// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Identity of the logical caller executing on the current thread.
//!
//! Worker threads are shared by unrelated requests, so the OS thread is not a
//! usable identity. The dispatcher runs each request inside
//! [`CallerId::scope`]; code running outside any scope gets one identity per
//! thread.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CALLER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SCOPED: Cell<Option<CallerId>> = const { Cell::new(None) };
    static THREAD: CallerId = CallerId::fresh();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(u64);

impl CallerId {
    fn fresh() -> Self {
        CallerId(NEXT_CALLER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn current() -> Self {
        SCOPED
            .with(Cell::get)
            .unwrap_or_else(|| THREAD.with(|id| *id))
    }

    /// Run `f` under a new identity, restoring the previous one afterwards.
    pub fn scope<R>(f: impl FnOnce() -> R) -> R {
        struct Restore(Option<CallerId>);

        impl Drop for Restore {
            fn drop(&mut self) {
                SCOPED.with(|scoped| scoped.set(self.0));
            }
        }

        let _restore = Restore(SCOPED.with(|scoped| scoped.replace(Some(CallerId::fresh()))));
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_identity_is_stable() {
        assert_eq!(CallerId::current(), CallerId::current());
        let other = std::thread::spawn(CallerId::current).join().unwrap();
        assert_ne!(other, CallerId::current());
    }

    #[test]
    fn test_scopes_nest_and_restore() {
        let outer = CallerId::current();
        CallerId::scope(|| {
            let first = CallerId::current();
            assert_ne!(first, outer);
            CallerId::scope(|| assert_ne!(CallerId::current(), first));
            assert_eq!(CallerId::current(), first);
        });
        assert_eq!(CallerId::current(), outer);
    }
}
