//! Executor queues that timer callbacks run on.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use log::{debug, error};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::callback::TimerCallback;

const GLOBAL_LABEL: &str = "global";

struct Job {
    callback: Arc<dyn TimerCallback>,
    done: oneshot::Sender<()>,
}

#[derive(Clone)]
enum Kind {
    Concurrent,
    Serial(mpsc::UnboundedSender<Job>),
}

/// An execution context for timer callbacks.
///
/// A concurrent queue spawns every callback as its own tokio task. A serial
/// queue runs callbacks one at a time in submission order, across every timer
/// bound to it. Either way, callbacks of a single timer never overlap.
///
/// Cloning a queue yields another handle to the same context.
#[derive(Clone)]
pub struct Queue {
    label: Arc<str>,
    runtime: Handle,
    kind: Kind,
}

impl Queue {
    /// The concurrent queue of the ambient tokio runtime.
    ///
    /// This is the default queue of every timer that is not given one. It lives
    /// as long as the runtime does and needs no teardown.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn global() -> Self {
        Self::concurrent(GLOBAL_LABEL, Handle::current())
    }

    /// A concurrent queue that spawns callbacks on `runtime`.
    pub fn concurrent(label: impl Into<Arc<str>>, runtime: Handle) -> Self {
        Queue {
            label: label.into(),
            runtime,
            kind: Kind::Concurrent,
        }
    }

    /// A serial queue on the ambient tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn serial(label: impl Into<Arc<str>>) -> Self {
        Self::serial_on(label, Handle::current())
    }

    /// A serial queue whose worker runs on `runtime`.
    ///
    /// The worker stops once every clone of the queue, including those held by
    /// timer sources, has been dropped.
    pub fn serial_on(label: impl Into<Arc<str>>, runtime: Handle) -> Self {
        let label = label.into();
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(serial_worker(Arc::clone(&label), runtime.clone(), rx));
        Queue {
            label,
            runtime,
            kind: Kind::Serial(tx),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_serial(&self) -> bool {
        matches!(self.kind, Kind::Serial(_))
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Runs `callback` on this queue and waits until it has finished.
    pub(crate) async fn run(&self, callback: Arc<dyn TimerCallback>) {
        match &self.kind {
            Kind::Concurrent => {
                let task = self.runtime.spawn(execute(Arc::clone(&self.label), callback));
                if let Err(e) = task.await {
                    report_join_error(&self.label, e);
                }
            }
            Kind::Serial(jobs) => {
                let (done, finished) = oneshot::channel();
                if jobs.send(Job { callback, done }).is_err() {
                    #[cfg(feature = "logging")]
                    error!("Serial queue '{}' is no longer running.", self.label);
                    return;
                }
                let _ = finished.await;
            }
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("label", &self.label)
            .field("serial", &self.is_serial())
            .finish()
    }
}

async fn serial_worker(label: Arc<str>, runtime: Handle, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        let task = runtime.spawn(execute(Arc::clone(&label), job.callback));
        if let Err(e) = task.await {
            report_join_error(&label, e);
        }
        let _ = job.done.send(());
    }
    #[cfg(feature = "logging")]
    debug!("Serial queue '{}' stopped.", label);
}

#[cfg_attr(not(feature = "logging"), allow(unused_variables))]
async fn execute(label: Arc<str>, callback: Arc<dyn TimerCallback>) {
    if let Err(e) = callback.execute().await {
        #[cfg(feature = "logging")]
        error!("Callback execution error on queue '{}': {}", label, e);
    }
}

#[cfg_attr(not(feature = "logging"), allow(unused_variables))]
fn report_join_error(label: &str, e: tokio::task::JoinError) {
    #[cfg(feature = "logging")]
    error!("Callback task on queue '{}' did not complete: {}", label, e);
}
