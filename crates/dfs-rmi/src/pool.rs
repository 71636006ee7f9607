// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-size thread pool fed through a crossbeam channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    name: String,
    sender: Option<Sender<Job>>,
    discard: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &str, size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let discard = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let discard = discard.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if discard.load(Ordering::Acquire) {
                            continue;
                        }
                        job();
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            discard,
            workers,
        })
    }

    /// Queue a job. Returns false once the pool has been shut down.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Stop accepting work and drop everything still queued. Jobs already
    /// running are left to finish on their own threads.
    pub fn shutdown_now(&mut self) {
        self.discard.store(true, Ordering::Release);
        if self.sender.take().is_some() {
            debug!(pool = %self.name, workers = self.workers.len(), "worker pool shut down");
        }
        self.workers.retain(|worker| !worker.is_finished());
    }

    /// Wait for the worker threads after [`WorkerPool::shutdown_now`].
    pub fn join(mut self) {
        self.shutdown_now();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!(pool = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, Mutex};
    use std::time::Duration;

    #[test]
    fn test_jobs_run_concurrently() {
        let pool = WorkerPool::new("test-pool", 3).unwrap();
        let barrier = Arc::new(Barrier::new(4));
        for _ in 0..3 {
            let barrier = barrier.clone();
            assert!(pool.execute(move || {
                barrier.wait();
            }));
        }
        // Deadlocks unless all three jobs are running at once.
        barrier.wait();
        pool.join();
    }

    #[test]
    fn test_shutdown_discards_queued_jobs() {
        let mut pool = WorkerPool::new("test-pool", 1).unwrap();
        let gate = Arc::new(Mutex::new(()));
        let ran = Arc::new(AtomicUsize::new(0));

        let held = gate.lock().unwrap();
        {
            let gate = gate.clone();
            let ran = ran.clone();
            pool.execute(move || {
                let _g = gate.lock().unwrap();
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        for _ in 0..5 {
            let ran = ran.clone();
            pool.execute(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        std::thread::sleep(Duration::from_millis(50));

        pool.shutdown_now();
        assert!(!pool.execute(|| {}));
        drop(held);
        pool.join();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
