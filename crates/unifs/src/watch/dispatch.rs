// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./dispatch_test.rs"]
mod dispatch_test;

/// Work items queued for the dispatcher worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// How many undelivered work items a dispatcher buffers before
/// producers start blocking.
const QUEUE_CAPACITY: usize = 16;

/// Delivers event callbacks on a dedicated background thread.
///
/// Producers enqueue closures and return immediately, blocking only
/// when the bounded queue is full. The worker delivers jobs in FIFO
/// order. Dropping the dispatcher stops the worker, joins it, and
/// silently discards anything not yet delivered.
pub struct EventDispatcher {
    tx: Mutex<Option<mpsc::SyncSender<Job>>>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel::<Job>(QUEUE_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        let worker_closed = Arc::clone(&closed);
        let worker = std::thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                if worker_closed.load(Ordering::Acquire) {
                    break;
                }
                job();
            }
            tracing::trace!("event dispatcher worker stopped");
        });
        Self {
            tx: Mutex::new(Some(tx)),
            closed,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue a job for delivery, blocking while the queue is full.
    pub fn dispatch(&self, job: Job) -> Result<()> {
        // the sender is cloned out so the queue lock is not held while
        // a full queue blocks this producer
        let tx = match &*self.tx.lock() {
            Some(tx) if !self.is_closed() => tx.clone(),
            _ => return Err(Error::Disposed("event dispatcher")),
        };
        tx.send(job)
            .map_err(|_| Error::Disposed("event dispatcher"))
    }

    /// Queue a job without ever blocking, dropping it if the queue is
    /// full. Used when dispatching from the worker thread itself, which
    /// must not wait on its own queue.
    pub fn try_dispatch(&self, job: Job) -> Result<()> {
        let tx = match &*self.tx.lock() {
            Some(tx) if !self.is_closed() => tx.clone(),
            _ => return Err(Error::Disposed("event dispatcher")),
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::TrySendError::Full(_)) => {
                tracing::warn!("event queue full, dropping re-dispatched job");
                Ok(())
            }
            Err(mpsc::TrySendError::Disconnected(_)) => Err(Error::Disposed("event dispatcher")),
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        // closing the channel wakes a worker blocked in recv and fails
        // any producer blocked in send
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.thread().id() == std::thread::current().id() {
                // dropped from within a callback; the worker cannot
                // join itself and will exit on its own
                return;
            }
            if worker.join().is_err() {
                tracing::error!("event dispatcher worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("closed", &self.is_closed())
            .finish()
    }
}
