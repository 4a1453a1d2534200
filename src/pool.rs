//! Fixed-size worker pool fed by a condition-variable guarded FIFO.
//!
//! The queue mutex protects the task FIFO, the per-worker status table, the
//! active-worker count and the *outstanding* count (submitted but not yet
//! finished). Two condition variables hang off it:
//!
//! - `work_available`: workers sleep here while the FIFO is empty;
//! - `progress`: the driver sleeps here; every finished task and every worker
//!   that goes idle signals it.
//!
//! Waiting for the pool to drain is a wait on `progress` until `outstanding`
//! reaches zero.

use crate::error::{TaskError, TaskFailureKind};
use crate::executor;
use crate::metrics::MetricsPipeline;
use crate::task::Task;
use crate::utils::{lock, wait, wait_timeout};
use anyhow::{Context, Result};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Lifecycle of one worker thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    Ready,
    Working,
    TerminateRequested,
}

pub(crate) struct QueueState {
    tasks: VecDeque<Task>,
    workers: Vec<WorkerStatus>,
    active: usize,
    outstanding: usize,
    completed: u64,
}

pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
    work_available: Condvar,
    progress: Condvar,
}

impl WorkQueue {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                workers: vec![WorkerStatus::Ready; workers],
                active: 0,
                outstanding: 0,
                completed: 0,
            }),
            work_available: Condvar::new(),
            progress: Condvar::new(),
        }
    }

    /// Take the queue lock. Submissions and progress waits go through the guard.
    pub(crate) fn lock(&self) -> QueueGuard<'_> {
        QueueGuard {
            queue: self,
            state: lock(&self.state),
        }
    }

    /// Block a worker until it gets a task or is told to terminate.
    fn next_task(&self, worker: usize) -> Option<Task> {
        let mut st = lock(&self.state);
        loop {
            if st.workers[worker] == WorkerStatus::TerminateRequested {
                return None;
            }
            if let Some(task) = st.tasks.pop_front() {
                st.workers[worker] = WorkerStatus::Working;
                st.active += 1;
                return Some(task);
            }
            if st.active == 0 {
                // nobody working and nothing queued: let the driver re-check
                self.progress.notify_all();
            }
            st = wait(&self.work_available, st);
        }
    }

    fn finish_task(&self, worker: usize) {
        let mut st = lock(&self.state);
        st.active -= 1;
        st.outstanding -= 1;
        st.completed += 1;
        if st.workers[worker] == WorkerStatus::Working {
            st.workers[worker] = WorkerStatus::Ready;
        }
        self.progress.notify_all();
    }
}

/// The queue lock, held by the driver across a scheduling pass.
pub(crate) struct QueueGuard<'a> {
    queue: &'a WorkQueue,
    state: MutexGuard<'a, QueueState>,
}

impl<'a> QueueGuard<'a> {
    /// Append a task and wake one worker.
    pub(crate) fn submit(&mut self, task: Task) {
        trace!(node = %task.node.id(), partition = task.partition, "task submitted");
        self.state.tasks.push_back(task);
        self.state.outstanding += 1;
        self.queue.work_available.notify_one();
    }

    /// Tasks submitted and not yet finished.
    pub(crate) fn outstanding(&self) -> usize {
        self.state.outstanding
    }

    /// Release the lock until a worker reports progress, then reacquire it.
    pub(crate) fn wait_progress(self) -> QueueGuard<'a> {
        let QueueGuard { queue, state } = self;
        QueueGuard {
            queue,
            state: wait(&queue.progress, state),
        }
    }

    /// Like [`wait_progress`](Self::wait_progress), but wake after `timeout`
    /// even if this pool reports nothing.
    pub(crate) fn wait_progress_timeout(self, timeout: Duration) -> QueueGuard<'a> {
        let QueueGuard { queue, state } = self;
        QueueGuard {
            queue,
            state: wait_timeout(&queue.progress, state, timeout),
        }
    }
}

pub(crate) struct ThreadPool {
    queue: Arc<WorkQueue>,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `workers` threads; each finished task's metric goes to `metrics`.
    pub(crate) fn start(workers: usize, metrics: Arc<MetricsPipeline>) -> Result<Self> {
        let queue = Arc::new(WorkQueue::new(workers));
        let mut pool = Self {
            queue,
            handles: Vec::with_capacity(workers),
        };
        for id in 0..workers {
            let queue = Arc::clone(&pool.queue);
            let metrics = Arc::clone(&metrics);
            let spawned = thread::Builder::new()
                .name(format!("minispark-worker-{id}"))
                .spawn(move || worker_loop(id, &queue, &metrics))
                .with_context(|| format!("failed to spawn worker {id}"));
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(e);
                }
            }
        }
        info!(workers, "thread pool started");
        Ok(pool)
    }

    pub(crate) fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub(crate) fn size(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn completed(&self) -> u64 {
        lock(&self.queue.state).completed
    }

    pub(crate) fn statuses(&self) -> Vec<WorkerStatus> {
        lock(&self.queue.state).workers.clone()
    }

    /// Block until every submitted task has finished.
    pub(crate) fn wait_idle(&self) {
        let mut st = lock(&self.queue.state);
        while st.outstanding > 0 {
            st = wait(&self.queue.progress, st);
        }
    }

    /// Ask every worker to exit, wake them all, and join them.
    ///
    /// Tasks still queued are dropped; drain with [`wait_idle`](Self::wait_idle) first.
    pub(crate) fn shutdown(&mut self) {
        {
            let mut st = lock(&self.queue.state);
            st.workers
                .iter_mut()
                .for_each(|w| *w = WorkerStatus::TerminateRequested);
            self.queue.work_available.notify_all();
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked outside a task");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
        }
    }
}

fn worker_loop(id: usize, queue: &WorkQueue, metrics: &MetricsPipeline) {
    while let Some(mut task) = queue.next_task(id) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor::execute(&task)));
        let cause = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(cause)) => Some(cause),
            Err(payload) => Some(TaskFailureKind::Panicked(panic_message(payload.as_ref()))),
        };
        let failure = cause.map(|cause| TaskError {
            node: task.node.id(),
            kind: task.node.kind(),
            partition: task.partition,
            cause,
        });
        match failure {
            Some(err) => {
                error!("{err}");
                task.node.record_failure(err);
            }
            None => debug!(
                worker = id,
                node = %task.node.id(),
                partition = task.partition,
                "task finished"
            ),
        }
        task.metric.finish();
        metrics.record(task.metric);
        queue.finish_task(id);
    }
    trace!(worker = id, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
