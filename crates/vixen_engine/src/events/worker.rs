//! Worker bridge
//!
//! One dedicated thread executes user-supplied work off the render thread
//! and publishes each outcome back to the bus as a worker-result message.
//! Results are delivered when the render thread next calls
//! [`MessageBus::process`](crate::events::MessageBus::process).

use crate::events::bus::MessageBus;
use crate::events::message::{Message, MessagePayload, WorkerResult};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// Identifier assigned to a submitted work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(pub u64);

/// Result published when a work thunk returns an error
#[derive(Debug)]
pub struct WorkerFailed {
    /// Identifier of the failed work item
    pub work_id: u64,
    /// Sender id supplied at submission
    pub sender: u32,
    /// Error returned by the thunk
    pub error: String,
}

impl WorkerResult for WorkerFailed {
    fn work_id(&self) -> u64 {
        self.work_id
    }

    fn sender(&self) -> u32 {
        self.sender
    }

    fn success(&self) -> bool {
        false
    }

    fn error(&self) -> Option<&str> {
        Some(&self.error)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type WorkThunk = Box<dyn FnOnce(WorkId) -> Result<Box<dyn WorkerResult>, String> + Send>;

struct WorkItem {
    id: WorkId,
    sender: u32,
    thunk: WorkThunk,
}

struct WorkerShared {
    queue: Mutex<VecDeque<WorkItem>>,
    available: Condvar,
    shutdown: AtomicBool,
}

/// Dedicated worker thread publishing results to the bus
///
/// Shutdown is cooperative and draining: on drop the bridge sets the
/// shutdown flag, wakes the worker, and joins; work queued at that point
/// still runs, so every submitted item produces exactly one result.
pub struct WorkerBridge {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
    next_id: AtomicU64,
}

impl WorkerBridge {
    /// Spawn the worker thread publishing to `bus`
    pub fn new(bus: Arc<MessageBus>) -> Self {
        let shared = Arc::new(WorkerShared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("vixen-worker".to_string())
            .spawn(move || Self::worker_loop(&worker_shared, &bus))
            .expect("failed to spawn worker thread");

        Self {
            shared,
            handle: Some(handle),
            next_id: AtomicU64::new(1),
        }
    }

    /// Enqueue a work thunk; the assigned id is passed into the thunk
    ///
    /// On success the returned result is published as-is; on error a
    /// [`WorkerFailed`] result is published in its place.
    pub fn submit_work<F>(&self, sender: u32, thunk: F) -> WorkId
    where
        F: FnOnce(WorkId) -> Result<Box<dyn WorkerResult>, String> + Send + 'static,
    {
        let id = WorkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let item = WorkItem { id, sender, thunk: Box::new(thunk) };
        {
            let mut queue = self.shared.queue.lock().expect("worker queue lock poisoned");
            queue.push_back(item);
        }
        self.shared.available.notify_one();
        id
    }

    /// Number of work items not yet picked up
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().expect("worker queue lock poisoned").len()
    }

    fn worker_loop(shared: &WorkerShared, bus: &MessageBus) {
        loop {
            let item = {
                let mut queue = shared.queue.lock().expect("worker queue lock poisoned");
                loop {
                    if let Some(item) = queue.pop_front() {
                        break Some(item);
                    }
                    if shared.shutdown.load(Ordering::Acquire) {
                        break None;
                    }
                    queue = shared
                        .available
                        .wait(queue)
                        .expect("worker queue lock poisoned");
                }
            };

            let Some(item) = item else {
                // Shutdown requested and the queue is drained.
                return;
            };

            let WorkItem { id, sender, thunk } = item;
            let result: Arc<dyn WorkerResult> = match thunk(id) {
                Ok(result) => {
                    if !result.success() {
                        log::debug!(
                            "work {id:?} completed unsuccessfully: {:?}",
                            result.error()
                        );
                    }
                    Arc::from(result)
                }
                Err(error) => {
                    log::warn!("work {id:?} failed: {error}");
                    Arc::new(WorkerFailed { work_id: id.0, sender, error })
                }
            };

            bus.publish(Message::new(sender, MessagePayload::WorkerResult(result)));
        }
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::bus::MessageFilter;
    use crate::events::message::MessageType;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Debug)]
    struct Computed {
        work_id: u64,
        value: i32,
    }

    impl WorkerResult for Computed {
        fn work_id(&self) -> u64 {
            self.work_id
        }

        fn sender(&self) -> u32 {
            1
        }

        fn success(&self) -> bool {
            true
        }

        fn error(&self) -> Option<&str> {
            None
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn wait_for(bus: &MessageBus, check: impl Fn() -> bool) {
        for _ in 0..200 {
            bus.process();
            if check() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("worker result never delivered");
    }

    #[test]
    fn result_round_trip() {
        let bus = Arc::new(MessageBus::new());
        let bridge = WorkerBridge::new(Arc::clone(&bus));

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        bus.subscribe_worker_result::<Computed, _>(move |result| {
            sink.lock().unwrap().push((result.work_id, result.value));
        });

        let id = bridge.submit_work(1, |work| {
            Ok(Box::new(Computed { work_id: work.0, value: 42 }) as Box<dyn WorkerResult>)
        });

        wait_for(&bus, || !received.lock().unwrap().is_empty());
        let results = received.lock().unwrap();
        assert_eq!(results.as_slice(), &[(id.0, 42)]);
    }

    #[test]
    fn thunk_error_publishes_failure_result() {
        let bus = Arc::new(MessageBus::new());
        let bridge = WorkerBridge::new(Arc::clone(&bus));

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        bus.subscribe_worker_result::<WorkerFailed, _>(move |result| {
            sink.lock().unwrap().push(result.error.clone());
        });

        bridge.submit_work(9, |_| Err("missing input".to_string()));

        wait_for(&bus, || !received.lock().unwrap().is_empty());
        assert_eq!(received.lock().unwrap().as_slice(), &["missing input".to_string()]);
    }

    #[test]
    fn shutdown_drains_queued_work() {
        let bus = Arc::new(MessageBus::new());
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&delivered);
        bus.subscribe(MessageFilter::Type(MessageType::WorkerResult), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        {
            let bridge = WorkerBridge::new(Arc::clone(&bus));
            for i in 0..8 {
                bridge.submit_work(1, move |work| {
                    Ok(Box::new(Computed { work_id: work.0, value: i }) as Box<dyn WorkerResult>)
                });
            }
            // Dropping the bridge joins the worker after the queue drains.
        }

        bus.process();
        assert_eq!(delivered.load(Ordering::SeqCst), 8);
    }
}
