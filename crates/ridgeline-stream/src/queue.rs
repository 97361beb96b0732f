//! Thread-pooled work queue delivering continuations to the control thread.
//!
//! Each submission pairs a task with a continuation. Workers run the task;
//! the continuation travels back over a channel and runs synchronously on
//! the control thread when [`WorkQueue::drain`] is called, in FIFO
//! completion order. No priority, no cancellation, no dedup: callers that
//! need at-most-one-in-flight semantics keep their own request flags.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};

/// A worker-side failure, delivered to the continuation instead of a value.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum TaskError {
    /// The task ran and returned an error.
    #[error("task failed: {0}")]
    Failed(String),

    /// The task panicked; the panic was caught so the result is not lost.
    #[error("task panicked: {0}")]
    Panicked(String),
}

type BoxedTask<C> = Box<dyn FnOnce() -> BoxedContinuation<C> + Send>;
type BoxedContinuation<C> = Box<dyn FnOnce(&mut C) + Send>;

/// A fixed pool of named worker threads plus a completion channel, generic
/// over the control-thread context `C` handed to continuations.
pub struct WorkQueue<C> {
    task_tx: Option<Sender<BoxedTask<C>>>,
    done_rx: Receiver<BoxedContinuation<C>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl<C: 'static> WorkQueue<C> {
    /// Spawn a queue with `worker_count` threads (at least one).
    pub fn new(worker_count: usize) -> Self {
        let (task_tx, task_rx) = unbounded::<BoxedTask<C>>();
        let (done_tx, done_rx) = unbounded::<BoxedContinuation<C>>();

        let mut workers = Vec::new();
        for i in 0..worker_count.max(1) {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("terrain-worker-{i}"))
                .spawn(move || {
                    while let Ok(task) = task_rx.recv() {
                        let continuation = task();
                        if done_tx.send(continuation).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn terrain worker thread");
            workers.push(handle);
        }

        Self {
            task_tx: Some(task_tx),
            done_rx,
            workers,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawn a queue sized for the machine: `num_cpus - 2`, minimum one,
    /// leaving headroom for the control thread and the host's render thread.
    pub fn with_default_workers() -> Self {
        let cpus = num_cpus::get().max(2);
        Self::new((cpus - 2).max(1))
    }

    /// Submit a task and the continuation that consumes its result.
    ///
    /// The task runs on a worker; panics are caught and delivered as
    /// [`TaskError::Panicked`]. Returns `false` if the pool has shut down.
    pub fn submit<T, F, K>(&self, task: F, continuation: K) -> bool
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
        K: FnOnce(&mut C, Result<T, TaskError>) + Send + 'static,
    {
        let Some(task_tx) = &self.task_tx else {
            return false;
        };
        let boxed: BoxedTask<C> = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task))
                .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(&payload))));
            Box::new(move |ctx: &mut C| continuation(ctx, result))
        });
        if task_tx.send(boxed).is_err() {
            return false;
        }
        self.pending.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Run every completed continuation on the calling thread, in FIFO
    /// completion order, and return how many ran. Call once per tick.
    pub fn drain(&self, ctx: &mut C) -> usize {
        let mut delivered = 0;
        while let Ok(continuation) = self.done_rx.try_recv() {
            continuation(ctx);
            self.pending.fetch_sub(1, Ordering::Relaxed);
            delivered += 1;
        }
        delivered
    }

    /// Number of submissions not yet delivered by [`drain`](Self::drain)
    /// (queued, executing, or completed-but-undelivered).
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Shut down the pool: close the task channel and join all workers.
    /// Undelivered continuations remain drainable afterwards.
    pub fn shutdown(&mut self) {
        self.task_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<C> Drop for WorkQueue<C> {
    fn drop(&mut self) {
        self.task_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Context collecting delivered values for inspection.
    #[derive(Default)]
    struct Collected {
        values: Vec<i32>,
        errors: Vec<TaskError>,
    }

    fn drain_until<C>(queue: &WorkQueue<C>, ctx: &mut C, expected: usize)
    where
        C: 'static,
    {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut delivered = 0;
        while delivered < expected {
            delivered += queue.drain(ctx);
            assert!(Instant::now() < deadline, "timed out waiting for results");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_result_reaches_continuation() {
        let queue = WorkQueue::new(2);
        let mut ctx = Collected::default();

        queue.submit(
            || Ok(7),
            |ctx: &mut Collected, result| ctx.values.push(result.unwrap()),
        );
        drain_until(&queue, &mut ctx, 1);
        assert_eq!(ctx.values, vec![7]);
    }

    #[test]
    fn test_all_submissions_delivered() {
        let queue = WorkQueue::new(4);
        let mut ctx = Collected::default();

        for i in 0..32 {
            queue.submit(
                move || Ok(i),
                |ctx: &mut Collected, result| ctx.values.push(result.unwrap()),
            );
        }
        drain_until(&queue, &mut ctx, 32);
        let mut got = ctx.values.clone();
        got.sort_unstable();
        assert_eq!(got, (0..32).collect::<Vec<_>>());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_single_worker_preserves_completion_order() {
        let queue = WorkQueue::new(1);
        let mut ctx = Collected::default();

        for i in 0..8 {
            queue.submit(
                move || Ok(i),
                |ctx: &mut Collected, result| ctx.values.push(result.unwrap()),
            );
        }
        drain_until(&queue, &mut ctx, 8);
        assert_eq!(
            ctx.values,
            (0..8).collect::<Vec<_>>(),
            "one worker completes in submission order, drain preserves it"
        );
    }

    #[test]
    fn test_task_error_propagates_to_continuation() {
        let queue = WorkQueue::new(1);
        let mut ctx = Collected::default();

        queue.submit(
            || Err::<i32, _>(TaskError::Failed("bad input".into())),
            |ctx: &mut Collected, result| ctx.errors.push(result.unwrap_err()),
        );
        drain_until(&queue, &mut ctx, 1);
        assert_eq!(ctx.errors, vec![TaskError::Failed("bad input".into())]);
    }

    #[test]
    fn test_panic_is_caught_and_delivered() {
        let queue = WorkQueue::new(1);
        let mut ctx = Collected::default();

        queue.submit(
            || -> Result<i32, TaskError> { panic!("boom") },
            |ctx: &mut Collected, result| ctx.errors.push(result.unwrap_err()),
        );
        // The worker must survive to run a second task.
        queue.submit(
            || Ok(1),
            |ctx: &mut Collected, result| ctx.values.push(result.unwrap()),
        );
        drain_until(&queue, &mut ctx, 2);
        assert_eq!(ctx.errors, vec![TaskError::Panicked("boom".into())]);
        assert_eq!(ctx.values, vec![1]);
    }

    #[test]
    fn test_pending_count_tracks_undelivered_work() {
        let queue: WorkQueue<Collected> = WorkQueue::new(1);
        assert_eq!(queue.pending_count(), 0);

        let mut ctx = Collected::default();
        for _ in 0..3 {
            queue.submit(|| Ok(0), |_: &mut Collected, _| {});
        }
        assert_eq!(queue.pending_count(), 3);
        drain_until(&queue, &mut ctx, 3);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let mut queue: WorkQueue<Collected> = WorkQueue::new(1);
        queue.shutdown();
        let accepted = queue.submit(|| Ok(0), |_: &mut Collected, _| {});
        assert!(!accepted);
    }
}
