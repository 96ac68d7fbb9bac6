//! Dispatch queue that runs listener work off the caller's thread
//!
//! A queue is a bounded backlog drained by a fixed set of worker threads.
//! Synchronous mode pins the set to a single worker, so tasks run in exactly
//! the order they were enqueued. Asynchronous mode runs `workers` threads over
//! the same backlog and gives no ordering across them.
//!
//! A bounded backlog makes `enqueue` block while it is full. A capacity of
//! [`UNBOUNDED_CAPACITY`] (the default) never blocks. Bounded channels
//! allocate every slot up front, so capacities above [`MAX_BOUNDED_CAPACITY`]
//! are run unbounded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, never, select, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::DispatchError;

/// Capacity value meaning "never block"
pub const UNBOUNDED_CAPACITY: usize = 0;

/// Largest capacity backed by a preallocated bounded channel
pub const MAX_BOUNDED_CAPACITY: usize = 1 << 16;

/// Default backlog capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = UNBOUNDED_CAPACITY;

/// Default number of workers
pub const DEFAULT_QUEUE_WORKERS: usize = 1;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// One worker, strict enqueue order
    #[default]
    Synchronous,
    /// A pool of workers, no ordering across workers
    Asynchronous,
}

/// Dispatch queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,

    /// Worker threads (forced to 1 in synchronous mode)
    pub workers: usize,

    /// Maximum queued tasks before `enqueue` blocks (0 = unbounded)
    pub capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Synchronous,
            workers: DEFAULT_QUEUE_WORKERS,
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl DispatchConfig {
    pub fn synchronous() -> Self {
        Self::default()
    }

    pub fn asynchronous(workers: usize) -> Self {
        Self {
            mode: DispatchMode::Asynchronous,
            workers,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.capacity = UNBOUNDED_CAPACITY;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity != UNBOUNDED_CAPACITY
    }

    fn normalized(mut self) -> Self {
        if self.mode == DispatchMode::Synchronous {
            self.workers = 1;
        }
        self.workers = self.workers.max(1);
        if self.capacity > MAX_BOUNDED_CAPACITY {
            debug!(capacity = self.capacity, "DispatchConfig: capacity above bounded limit, running unbounded");
            self.capacity = UNBOUNDED_CAPACITY;
        }
        self
    }
}

struct WorkerSet {
    stop: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    /// Ask every worker to exit after its current task
    fn signal_stop(&self) {
        for _ in 0..self.handles.len() {
            let _ = self.stop.send(());
        }
    }

    fn join(self) {
        let current = thread::current().id();
        for handle in self.handles {
            if handle.thread().id() == current {
                // Called from inside a task; this worker exits once the task returns
                continue;
            }
            if handle.join().is_err() {
                warn!("DispatchQueue: worker exited with a panic");
            }
        }
    }
}

/// Task queue drained by worker threads
pub struct DispatchQueue {
    config: RwLock<DispatchConfig>,
    sender: RwLock<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
    workers: Mutex<Option<WorkerSet>>,
    discard: Arc<AtomicBool>,
}

impl DispatchQueue {
    /// Create a queue and start its workers
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        let config = config.normalized();
        debug!(?config, "DispatchQueue::new: called");

        let (sender, receiver) = if config.is_bounded() {
            bounded(config.capacity)
        } else {
            unbounded()
        };
        let queue = Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            workers: Mutex::new(None),
            discard: Arc::new(AtomicBool::new(false)),
            config: RwLock::new(config.clone()),
        };
        let workers = queue.spawn_workers(config.workers)?;
        *queue.lock_workers() = Some(workers);
        Ok(queue)
    }

    /// Queue a task, blocking while the backlog is full
    pub fn enqueue(&self, task: Task) -> Result<(), DispatchError> {
        let sender = self
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::Closed)?;
        sender.send(task).map_err(|_| DispatchError::Closed)
    }

    /// Switch to a single worker with strict ordering
    ///
    /// Running workers finish their current task and are replaced; queued
    /// tasks stay queued in order.
    pub fn use_synchronous_dispatch(&self) -> Result<(), DispatchError> {
        debug!("DispatchQueue::use_synchronous_dispatch: called");
        {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            config.mode = DispatchMode::Synchronous;
            config.workers = 1;
        }

        let mut workers = self.lock_workers();
        let Some(current) = workers.take() else {
            return Ok(());
        };
        current.signal_stop();
        current.join();
        *workers = Some(self.spawn_workers(1)?);
        Ok(())
    }

    /// Number of queued tasks not yet picked up by a worker
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn num_workers(&self) -> usize {
        self.config.read().unwrap_or_else(PoisonError::into_inner).workers
    }

    /// Backlog capacity, `None` when unbounded
    pub fn max_work_items(&self) -> Option<usize> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        config.is_bounded().then_some(config.capacity)
    }

    pub fn is_synchronous(&self) -> bool {
        self.config.read().unwrap_or_else(PoisonError::into_inner).mode == DispatchMode::Synchronous
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().unwrap_or_else(PoisonError::into_inner).is_some() && self.lock_workers().is_some()
    }

    /// Stop accepting tasks, discard the backlog and stop the workers
    pub fn close(&self) {
        debug!(backlog = self.len(), "DispatchQueue::close: called");
        self.discard.store(true, Ordering::Release);
        self.sender.write().unwrap_or_else(PoisonError::into_inner).take();

        let workers = self.lock_workers().take();
        if let Some(workers) = &workers {
            workers.signal_stop();
        }
        let discarded = self.receiver.try_iter().count();
        if discarded > 0 {
            debug!(discarded, "DispatchQueue::close: discarded backlog");
        }
        if let Some(workers) = workers {
            workers.join();
        }
    }

    /// Stop accepting tasks and block until the backlog has been processed
    pub fn drain(&self) {
        debug!(backlog = self.len(), "DispatchQueue::drain: called");
        self.sender.write().unwrap_or_else(PoisonError::into_inner).take();

        let workers = self.lock_workers().take();
        if let Some(workers) = workers {
            workers.join();
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Option<WorkerSet>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_workers(&self, count: usize) -> Result<WorkerSet, DispatchError> {
        let (stop, stop_rx) = unbounded();
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let tasks = self.receiver.clone();
            let stop_rx = stop_rx.clone();
            let discard = Arc::clone(&self.discard);
            let handle = thread::Builder::new()
                .name(format!("logbus-dispatch-{}", id))
                .spawn(move || worker_loop(id, tasks, stop_rx, discard))
                .map_err(DispatchError::Spawn)?;
            handles.push(handle);
        }

        Ok(WorkerSet { stop, handles })
    }
}

impl Drop for DispatchQueue {
    /// Disconnect without joining; workers finish the backlog and exit
    fn drop(&mut self) {
        self.sender.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(workers) = self.lock_workers().take() {
            drop(workers.stop);
        }
    }
}

fn worker_loop(id: usize, tasks: Receiver<Task>, stop: Receiver<()>, discard: Arc<AtomicBool>) {
    debug!(worker = id, "DispatchQueue: worker started");
    let idle = never::<()>();
    let mut watching_stop = true;

    loop {
        let stop_rx = if watching_stop { &stop } else { &idle };
        select! {
            recv(stop_rx) -> msg => {
                if msg.is_ok() {
                    break;
                }
                // Stop sender dropped with the queue; keep draining
                watching_stop = false;
            }
            recv(tasks) -> msg => match msg {
                Ok(task) => {
                    if discard.load(Ordering::Acquire) {
                        continue;
                    }
                    run_task(id, task);
                }
                Err(_) => break,
            },
        }
    }
    debug!(worker = id, "DispatchQueue: worker exiting");
}

fn run_task(worker: usize, task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!(worker, panic = %panic_message(payload.as_ref()), "DispatchQueue: task panicked");
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.mode, DispatchMode::Synchronous);
        assert_eq!(config.workers, 1);
        assert_eq!(config.capacity, UNBOUNDED_CAPACITY);
        assert!(!config.is_bounded());

        let queue = DispatchQueue::new(config).unwrap();
        assert_eq!(queue.max_work_items(), None);
        queue.drain();
    }

    #[test]
    fn test_synchronous_forces_one_worker() {
        let config = DispatchConfig {
            mode: DispatchMode::Synchronous,
            workers: 8,
            capacity: 16,
        };
        let queue = DispatchQueue::new(config).unwrap();
        assert_eq!(queue.num_workers(), 1);
        assert_eq!(queue.max_work_items(), Some(16));
        assert!(queue.is_synchronous());
        assert!(queue.is_running());
        queue.drain();
    }

    #[test]
    fn test_synchronous_preserves_order() {
        let queue = DispatchQueue::new(DispatchConfig::synchronous()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            queue
                .enqueue(Box::new(move || seen.lock().unwrap().push(i)))
                .unwrap();
        }
        queue.drain();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_asynchronous_runs_everything() {
        let queue = DispatchQueue::new(DispatchConfig::asynchronous(4)).unwrap();
        assert_eq!(queue.num_workers(), 4);
        assert!(!queue.is_synchronous());

        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..500 {
            let count = Arc::clone(&count);
            queue
                .enqueue(Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        queue.drain();
        assert_eq!(count.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let queue = DispatchQueue::new(DispatchConfig::synchronous()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        queue.enqueue(Box::new(|| panic!("listener blew up"))).unwrap();
        let after = Arc::clone(&count);
        queue
            .enqueue(Box::new(move || {
                after.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        queue.drain();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_enqueue_after_drain_fails() {
        let queue = DispatchQueue::new(DispatchConfig::synchronous()).unwrap();
        queue.drain();
        assert!(!queue.is_running());
        assert!(matches!(queue.enqueue(Box::new(|| {})), Err(DispatchError::Closed)));
    }

    #[test]
    fn test_close_discards_backlog() {
        let queue = DispatchQueue::new(DispatchConfig::synchronous().with_capacity(64)).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let ran = Arc::new(AtomicUsize::new(0));

        queue
            .enqueue(Box::new(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            }))
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            queue
                .enqueue(Box::new(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        assert_eq!(queue.len(), 10);

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            release_tx.send(()).unwrap();
        });
        queue.close();
        releaser.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 0);
        assert!(queue.enqueue(Box::new(|| {})).is_err());
    }

    #[test]
    fn test_full_backlog_blocks_producer() {
        let queue = Arc::new(DispatchQueue::new(DispatchConfig::synchronous().with_capacity(1)).unwrap());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        queue
            .enqueue(Box::new(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            }))
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        queue.enqueue(Box::new(|| {})).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let producer_queue = Arc::clone(&queue);
        let producer = thread::spawn(move || {
            producer_queue.enqueue(Box::new(|| {})).unwrap();
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
        release_tx.send(()).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
        queue.drain();
    }

    #[test]
    fn test_use_synchronous_dispatch_after_start() {
        let queue = DispatchQueue::new(DispatchConfig::asynchronous(4)).unwrap();
        queue.use_synchronous_dispatch().unwrap();
        assert_eq!(queue.num_workers(), 1);
        assert!(queue.is_synchronous());
        assert!(queue.is_running());

        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let seen = Arc::clone(&seen);
            queue
                .enqueue(Box::new(move || seen.lock().unwrap().push(i)))
                .unwrap();
        }
        queue.drain();
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_dropped_queue_finishes_backlog() {
        let (tx, rx) = mpsc::channel();
        {
            let queue = DispatchQueue::new(DispatchConfig::synchronous()).unwrap();
            for i in 0..5 {
                let tx = tx.clone();
                queue.enqueue(Box::new(move || tx.send(i).unwrap())).unwrap();
            }
        }
        let got: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_huge_capacity_runs_unbounded() {
        let queue = DispatchQueue::new(DispatchConfig::asynchronous(2).with_capacity(usize::MAX)).unwrap();
        assert_eq!(queue.max_work_items(), None);

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        for _ in 0..2 {
            let release_rx = Arc::clone(&release_rx);
            queue
                .enqueue(Box::new(move || {
                    let _ = release_rx.lock().unwrap().recv();
                }))
                .unwrap();
        }

        // Both workers are parked; a backlog far past any bounded limit still never blocks
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..(MAX_BOUNDED_CAPACITY + 100) {
            let ran = Arc::clone(&ran);
            queue
                .enqueue(Box::new(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        drop(release_tx);
        queue.drain();
        assert_eq!(ran.load(Ordering::SeqCst), MAX_BOUNDED_CAPACITY + 100);
    }

    #[test]
    fn test_capacity_at_limit_stays_bounded() {
        let queue = DispatchQueue::new(DispatchConfig::synchronous().with_capacity(MAX_BOUNDED_CAPACITY)).unwrap();
        assert_eq!(queue.max_work_items(), Some(MAX_BOUNDED_CAPACITY));
        queue.drain();

        let queue = DispatchQueue::new(DispatchConfig::synchronous().with_capacity(64).unbounded()).unwrap();
        assert_eq!(queue.max_work_items(), None);
        queue.drain();
    }
}
