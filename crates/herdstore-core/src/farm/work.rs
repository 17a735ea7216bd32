//! Worker pools for snapshot transfer.
//!
//! A [`WorkQueue`] runs task bodies on a pool of threads. Each task carries
//! a completion closure produced by its body; the queue [`Discipline`]
//! decides how completions are applied:
//!
//! - [`Discipline::Ordered`]: completions run on a dedicated thread, in
//!   submission order, regardless of which body finished first.
//! - [`Discipline::Dynamic`]: completions run on the worker that executed
//!   the body; order is unspecified.
//!
//! Failures do not stop the queue. A task that fails sets the shared
//! [`ErrorLatch`]; later tasks observe it and short-circuit to a no-op, so
//! the queue always drains and `wait` always returns.

use std::collections::BTreeMap;
use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::debug;

/// Completion-ordering contract of a [`WorkQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Completions are serialized in submission order.
    Ordered,
    /// Completions run as bodies finish; order is unspecified.
    Dynamic,
}

type Completion = Box<dyn FnOnce() + Send>;

struct Job {
    seq: u64,
    body: Box<dyn FnOnce() -> Completion + Send>,
}

/// A pool of worker threads with a completion-ordering discipline.
pub struct WorkQueue {
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    applier: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl WorkQueue {
    /// Spawns a queue named `name` with `nr_workers` threads
    /// (0 = one per available core).
    ///
    /// # Errors
    ///
    /// Returns an IO error if a thread cannot be spawned.
    pub fn new(name: &str, discipline: Discipline, nr_workers: usize) -> io::Result<Self> {
        let nr_workers = if nr_workers == 0 {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4)
        } else {
            nr_workers
        };

        let (job_tx, job_rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(nr_workers);
        let applier = match discipline {
            Discipline::Ordered => {
                let (done_tx, done_rx) = unbounded::<(u64, Completion)>();
                for i in 0..nr_workers {
                    let rx = job_rx.clone();
                    let tx = done_tx.clone();
                    let handle = thread::Builder::new()
                        .name(format!("{name}/{i}"))
                        .spawn(move || {
                            while let Ok(job) = rx.recv() {
                                let done = (job.body)();
                                if tx.send((job.seq, done)).is_err() {
                                    break;
                                }
                            }
                        })?;
                    workers.push(handle);
                }
                drop(done_tx);

                let handle = thread::Builder::new()
                    .name(format!("{name}/done"))
                    .spawn(move || {
                        let mut pending: BTreeMap<u64, Completion> = BTreeMap::new();
                        let mut next: u64 = 0;
                        while let Ok((seq, done)) = done_rx.recv() {
                            pending.insert(seq, done);
                            while let Some(done) = pending.remove(&next) {
                                done();
                                next += 1;
                            }
                        }
                        // Workers are gone; apply whatever is left in order.
                        for (_, done) in pending {
                            done();
                        }
                    })?;
                Some(handle)
            }
            Discipline::Dynamic => {
                for i in 0..nr_workers {
                    let rx = job_rx.clone();
                    let handle = thread::Builder::new()
                        .name(format!("{name}/{i}"))
                        .spawn(move || {
                            while let Ok(job) = rx.recv() {
                                let done = (job.body)();
                                done();
                            }
                        })?;
                    workers.push(handle);
                }
                None
            }
        };
        drop(job_rx);
        debug!(name, nr_workers, ?discipline, "work queue started");

        Ok(Self {
            job_tx: Some(job_tx),
            workers,
            applier,
            next_seq: 0,
        })
    }

    /// Submits a task. The body runs on a worker; the closure it returns is
    /// the task's completion, applied per the queue's discipline.
    pub fn queue<B, C>(&mut self, body: B)
    where
        B: FnOnce() -> C + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        let job = Job {
            seq,
            body: Box::new(move || Box::new(body()) as Completion),
        };
        if let Some(tx) = &self.job_tx {
            // Cannot fail while the workers hold the receiver.
            let _ = tx.send(job);
        }
    }

    /// Blocks until every submitted task's body and completion have run.
    pub fn wait(mut self) {
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.applier.take() {
            let _ = handle.join();
        }
    }
}

/// Single-shot shared error flag.
///
/// Any failing task sets it; every task checks it at entry and
/// short-circuits to a no-op once it has fired. The orchestrator reads it
/// after `wait` returns.
#[derive(Debug, Clone, Default)]
pub struct ErrorLatch {
    fired: Arc<AtomicBool>,
}

impl ErrorLatch {
    /// Creates an unfired latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the latch.
    pub fn set(&self) {
        self.fired.store(true, Ordering::Release);
    }

    /// True once any task has fired the latch.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Monotonic done/total progress counter.
#[derive(Debug)]
pub struct Progress {
    done: AtomicU64,
    total: u64,
}

impl Progress {
    /// Creates a counter expecting `total` completions.
    #[must_use]
    pub const fn new(total: u64) -> Self {
        Self {
            done: AtomicU64::new(0),
            total,
        }
    }

    /// Records one completion and returns the new count.
    pub fn tick(&self) -> u64 {
        let done = self.done.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(done, total = self.total, "progress");
        done
    }

    /// Completions recorded so far.
    #[must_use]
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Acquire)
    }

    /// Expected number of completions.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }
}
