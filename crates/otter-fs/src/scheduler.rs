//! Cooperative single-queue scheduler for deferred operations.
//!
//! Deferred work is pushed to the back of one FIFO queue and run, one task at
//! a time, when the embedder turns the loop with [`Scheduler::run_next`] or
//! [`Scheduler::run_until_idle`]. A task always runs to completion.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::deferred::Deferred;
use crate::errors::{FsError, FsResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared FIFO of deferred tasks. Clones share the queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        self.queue.lock().push_back(Box::new(task));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the oldest task. Returns `false` when the queue was empty.
    pub fn run_next(&self) -> bool {
        // The lock is released before the task runs so it may enqueue more.
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks enqueued by the
    /// ones that ran. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "Scheduler idle");
        }
        ran
    }

    /// Schedule `op` and hand back a future of its result.
    pub fn defer<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> FsResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.enqueue(move || {
            // A dropped receiver means nobody is waiting for the result.
            let _ = tx.send(op());
        });
        Pending::waiting(rx)
    }

    /// Defer a validated operation, or settle at once with its validation
    /// failure.
    pub(crate) fn submit<T: Send + 'static>(&self, op: FsResult<Deferred<T>>) -> Pending<T> {
        match op {
            Ok(op) => self.defer(op),
            Err(err) => Pending::ready(Err(err)),
        }
    }

    /// Schedule `op` and pass its result to `callback` on the same turn.
    pub fn defer_callback<T, F, C>(&self, op: F, callback: C)
    where
        T: 'static,
        F: FnOnce() -> FsResult<T> + Send + 'static,
        C: FnOnce(FsResult<T>) + Send + 'static,
    {
        self.enqueue(move || callback(op()));
    }
}

enum State<T> {
    Waiting(oneshot::Receiver<FsResult<T>>),
    Ready(Option<FsResult<T>>),
}

/// The eventual result of a deferred operation.
///
/// Resolves once the scheduler has run the operation. Awaiting works on any
/// executor; nothing is polled in the background.
pub struct Pending<T> {
    state: State<T>,
}

impl<T> Pending<T> {
    fn waiting(rx: oneshot::Receiver<FsResult<T>>) -> Self {
        Self {
            state: State::Waiting(rx),
        }
    }

    /// Already settled, e.g. by a validation failure.
    pub fn ready(result: FsResult<T>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    /// Take the result without awaiting, if the operation has run.
    pub fn try_take(&mut self) -> Option<FsResult<T>> {
        match &mut self.state {
            State::Ready(result) => result.take(),
            State::Waiting(rx) => match rx.try_recv() {
                Ok(result) => Some(result),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(dropped())),
            },
        }
    }
}

// The result is never pinned in place.
impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = FsResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Ready(result) => {
                Poll::Ready(result.take().unwrap_or_else(|| Err(polled_twice())))
            }
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(dropped())),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Waiting(_) => "waiting",
            State::Ready(_) => "ready",
        };
        f.debug_struct("Pending").field("state", &state).finish()
    }
}

fn dropped() -> FsError {
    FsError::Internal("deferred operation was dropped before it ran".to_string())
}

fn polled_twice() -> FsError {
    FsError::Internal("deferred result was already taken".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn tasks_run_in_enqueue_order() {
        let scheduler = Scheduler::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            scheduler.enqueue(move || log.lock().unwrap().push(i));
        }
        assert_eq!(scheduler.pending(), 3);
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_enqueued_while_draining_also_run() {
        let scheduler = Scheduler::new();
        let inner = scheduler.clone();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let outer_log = Arc::clone(&log);
        scheduler.enqueue(move || {
            outer_log.lock().unwrap().push("outer");
            let log = Arc::clone(&outer_log);
            inner.enqueue(move || log.lock().unwrap().push("inner"));
        });
        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn pending_settles_only_after_the_turn() {
        let scheduler = Scheduler::new();
        let mut pending = scheduler.defer(|| Ok(7));
        assert!(pending.try_take().is_none());
        scheduler.run_until_idle();
        assert_eq!(pending.try_take(), Some(Ok(7)));
    }

    #[test]
    fn dropped_task_surfaces_an_internal_error() {
        let mut pending = {
            let scheduler = Scheduler::new();
            scheduler.defer(|| Ok(()))
        };
        let err = pending.try_take().expect("settled").unwrap_err();
        assert_eq!(err.code(), "ERR_INTERNAL_ASSERTION");
    }

    #[tokio::test]
    async fn pending_is_awaitable() {
        let scheduler = Scheduler::new();
        let pending = scheduler.defer(|| Ok("done"));
        scheduler.run_until_idle();
        assert_eq!(pending.await.unwrap(), "done");
        assert_eq!(Pending::ready(Ok(1)).await.unwrap(), 1);
    }
}
