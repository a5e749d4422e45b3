//! Asynchronous replication pool
//!
//! A fixed set of named worker threads fed through a zero-capacity channel.
//! Submitting blocks until a worker is free to take the task, so an unhealthy
//! minor region slows writers down instead of growing an unbounded queue.

use crate::outcome::WriteOutcome;
use anyhow::Context;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context as TaskContext, Poll};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, error, info, warn};

/// Default number of replication workers
pub const DEFAULT_POOL_SIZE: usize = 50;

const THREAD_PREFIX: &str = "write-minor-thread-";

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Bounded worker pool executing minor-region writes
pub struct AsyncReplicator {
    sender: Option<SyncSender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncReplicator {
    /// Spawn `size` workers
    pub fn new(size: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(size > 0, "replication pool needs at least one worker");

        let (sender, receiver) = mpsc::sync_channel::<Task>(0);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}{}", THREAD_PREFIX, id))
                .spawn(move || Self::run_worker(id, receiver))
                .with_context(|| format!("failed to spawn replication worker {}", id))?;
            workers.push(handle);
        }

        info!("Replication pool started with {} workers", size);

        Ok(AsyncReplicator {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Hand a task to a free worker, blocking until one takes it
    ///
    /// The returned handle resolves to the task's outcome. If the pool is shut
    /// down the task is dropped and the handle resolves to `Failed`.
    pub fn submit<T, F>(&self, task: F) -> PendingReplication<T>
    where
        T: Send + 'static,
        F: FnOnce() -> WriteOutcome<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Task = Box::new(move || {
            // Receiver may already be gone; nobody is waiting then
            let _ = tx.send(task());
        });

        match &self.sender {
            Some(sender) => {
                if sender.send(job).is_err() {
                    warn!("Replication pool has no workers left, task dropped");
                }
            }
            None => warn!("Replication pool is shut down, task dropped"),
        }

        PendingReplication { rx }
    }

    /// Stop accepting tasks and wait for in-flight ones to finish
    pub fn shutdown(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Replication worker exited abnormally");
            }
        }
        info!("Replication pool stopped");
    }

    fn run_worker(id: usize, receiver: Arc<Mutex<Receiver<Task>>>) {
        loop {
            // Hold the lock only while waiting, never while running a task
            let task = {
                let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                receiver.recv()
            };

            match task {
                Ok(task) => {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("Replication task panicked on worker {}", id);
                    }
                }
                Err(_) => {
                    debug!("Replication worker {} shutting down", id);
                    break;
                }
            }
        }
    }
}

impl Drop for AsyncReplicator {
    fn drop(&mut self) {
        // Workers exit once the channel closes; in-flight tasks run to completion
        self.sender.take();
    }
}

/// Handle to an in-flight minor-region write
///
/// Can be waited on from a thread (`wait`), polled (`try_outcome`) or awaited.
#[derive(Debug)]
pub struct PendingReplication<T> {
    rx: oneshot::Receiver<WriteOutcome<T>>,
}

impl<T> PendingReplication<T> {
    /// Block the current thread until the replication finishes
    ///
    /// Must not be called from inside an async runtime; `.await` the handle there.
    pub fn wait(self) -> WriteOutcome<T> {
        self.rx.blocking_recv().unwrap_or_else(|_| dropped())
    }

    /// The outcome if the replication has finished
    pub fn try_outcome(&mut self) -> Option<WriteOutcome<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(dropped()),
        }
    }
}

impl<T> Future for PendingReplication<T> {
    type Output = WriteOutcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| dropped()))
    }
}

fn dropped<T>() -> WriteOutcome<T> {
    WriteOutcome::Failed(anyhow::anyhow!(
        "replication task dropped before completing"
    ))
}
