//! The worker pool: a bounded task queue fanned out to N workers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use super::command::SharedSettings;
use super::task::{Output, Task};
use super::worker::Worker;

/// Capacity of both the task queue and the output channel.
pub const CHANNEL_CAPACITY: usize = 1024;

/// What a force stop did: tasks removed from the queue before any worker
/// picked them up, and busy workers actually signalled.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopSummary {
    pub dropped_tasks: usize,
    pub stopped_workers: usize,
}

/// Bounded multi-producer multi-consumer task queue.
///
/// Pushing awaits a capacity permit; popping is woken by a notifier.
/// The queue can be drained from outside even while workers are parked
/// on `pop`, which is what a pool-level force stop relies on.
pub(crate) struct TaskQueue {
    items: Mutex<VecDeque<Task>>,
    capacity: Semaphore,
    consumers: Notify,
    closed: AtomicBool,
}

impl TaskQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: Semaphore::new(capacity),
            consumers: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) async fn push(&self, task: Task) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let permit = match self.capacity.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        // the permit is returned when the task leaves the queue
        permit.forget();
        self.items.lock().unwrap().push_back(task);
        self.consumers.notify_one();
    }

    pub(crate) async fn pop(&self) -> Option<Task> {
        loop {
            let notified = self.consumers.notified();
            if let Some(task) = self.items.lock().unwrap().pop_front() {
                self.capacity.add_permits(1);
                self.consumers.notify_one();
                return Some(task);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    fn drain(&self) -> usize {
        let mut items = self.items.lock().unwrap();
        let dropped = items.len();
        items.clear();
        self.capacity.add_permits(dropped);
        dropped
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.consumers.notify_waiters();
    }
}

pub(crate) struct WorkerHandle {
    pub(crate) stop_tx: mpsc::Sender<()>,
    pub(crate) busy: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A fixed-size pool of ssh/scp workers sharing one task queue and one
/// output channel.
pub struct Pool {
    queue: Arc<TaskQueue>,
    data_rx: mpsc::Receiver<Output>,
    workers: Vec<WorkerHandle>,
}

impl Pool {
    /// Create a pool of `size` workers. Must be called within a tokio
    /// runtime.
    pub fn new(size: usize, settings: SharedSettings) -> Self {
        let queue = Arc::new(TaskQueue::new(CHANNEL_CAPACITY));
        let (data_tx, data_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let workers = (0..size)
            .map(|id| {
                let (stop_tx, stop_rx) = mpsc::channel(1);
                let busy = Arc::new(AtomicBool::new(false));
                let worker = Worker::new(
                    id,
                    Arc::clone(&queue),
                    data_tx.clone(),
                    stop_rx,
                    Arc::clone(&busy),
                    settings.clone(),
                );
                WorkerHandle {
                    stop_tx,
                    busy,
                    handle: tokio::spawn(worker.run()),
                }
            })
            .collect();

        Self {
            queue,
            data_rx,
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// A cheap handle for submitting tasks concurrently with output
    /// consumption. Submission through the pool itself would deadlock
    /// once the host list outgrows the queue capacity.
    pub fn submitter(&self) -> Submitter {
        Submitter {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Receive the next output event.
    pub async fn recv(&mut self) -> Option<Output> {
        self.data_rx.recv().await
    }

    /// Remove all pending tasks and signal every busy worker to kill its
    /// child. Idle workers are not signalled.
    pub fn force_stop_all_tasks(&self) -> StopSummary {
        let dropped_tasks = self.queue.drain();
        let mut stopped_workers = 0;
        for worker in &self.workers {
            if worker.busy.load(Ordering::SeqCst) && worker.stop_tx.try_send(()).is_ok() {
                stopped_workers += 1;
            }
        }
        debug!(dropped_tasks, stopped_workers, "force stop");
        StopSummary {
            dropped_tasks,
            stopped_workers,
        }
    }

    /// Stop everything and let the workers shut down.
    pub fn close(&self) {
        self.force_stop_all_tasks();
        self.queue.close();
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.close();
        for worker in &self.workers {
            worker.handle.abort();
        }
    }
}

/// Clonable task-submission handle.
#[derive(Clone)]
pub struct Submitter {
    queue: Arc<TaskQueue>,
}

impl Submitter {
    pub async fn submit(&self, task: Task) {
        self.queue.push(task).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::task::RaiseType;

    fn task(host: &str) -> Task {
        Task::exec(host, "u", RaiseType::None, None, "true")
    }

    #[tokio::test]
    async fn test_queue_fifo() {
        let q = TaskQueue::new(8);
        q.push(task("a")).await;
        q.push(task("b")).await;
        assert_eq!(q.pop().await.unwrap().host, "a");
        assert_eq!(q.pop().await.unwrap().host, "b");
    }

    #[tokio::test]
    async fn test_queue_drain_frees_capacity() {
        let q = TaskQueue::new(2);
        q.push(task("a")).await;
        q.push(task("b")).await;
        assert_eq!(q.drain(), 2);
        // capacity is back: both pushes complete without blocking
        q.push(task("c")).await;
        q.push(task("d")).await;
        assert_eq!(q.drain(), 2);
    }

    #[tokio::test]
    async fn test_queue_close_wakes_poppers() {
        let q = Arc::new(TaskQueue::new(2));
        let popper = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await })
        };
        tokio::task::yield_now().await;
        q.close();
        assert!(popper.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queue_push_blocks_at_capacity() {
        let q = Arc::new(TaskQueue::new(1));
        q.push(task("a")).await;
        let blocked = {
            let q = Arc::clone(&q);
            tokio::spawn(async move {
                q.push(task("b")).await;
                true
            })
        };
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());
        assert_eq!(q.pop().await.unwrap().host, "a");
        assert!(blocked.await.unwrap());
    }

    #[tokio::test]
    async fn test_force_stop_on_idle_pool() {
        let settings = crate::remote::command::shared_settings(Default::default());
        let pool = Pool::new(4, settings);
        let summary = pool.force_stop_all_tasks();
        assert_eq!(summary.dropped_tasks, 0);
        assert_eq!(summary.stopped_workers, 0);
    }
}
