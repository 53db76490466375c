// SPDX-License-Identifier: GPL-3.0-only

//! The host application's main execution context
//!
//! Completions that the camera API contract delivers "on the main thread"
//! are posted here by worker threads. The host binding drains the loop on
//! whichever thread plays that role.

use tokio::sync::mpsc;
use tracing::warn;

/// A unit of work to run on the main context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Posting side, cheap to clone into worker threads
#[derive(Clone, Debug)]
pub struct MainContext {
    tx: mpsc::UnboundedSender<Task>,
}

/// Draining side, owned by the main thread
#[derive(Debug)]
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Task>,
}

/// Create a connected context/loop pair
pub fn channel() -> (MainContext, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainContext { tx }, MainLoop { rx })
}

impl MainContext {
    /// Queue a task; returns false if the loop is gone
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if self.tx.send(Box::new(task)).is_err() {
            warn!("Main loop closed, dropping posted task");
            return false;
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl MainLoop {
    /// Run every task queued so far without waiting; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for and run the next task; false once every context is dropped
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Blocking variant of [`run_next`](Self::run_next) for non-async hosts
    pub fn blocking_run_next(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until every posting side is dropped
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}
