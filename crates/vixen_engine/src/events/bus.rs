//! Message bus
//!
//! Thread-safe pub/sub with an async queue drained by [`MessageBus::process`]
//! once per frame on the render thread, plus same-thread immediate
//! dispatch. Three independent locks guard the queue, the subscription
//! list, and the statistics table; no lock is held while a handler runs.

use crate::events::message::{Message, MessageCategory, MessageType, WorkerResult};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Identifies a subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Which messages a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFilter {
    /// Every message
    All,
    /// Only messages with this exact type tag
    Type(MessageType),
    /// Only messages whose categories intersect this set
    Category(MessageCategory),
}

impl MessageFilter {
    fn matches(self, message: &Message) -> bool {
        match self {
            Self::All => true,
            Self::Type(ty) => message.message_type() == ty,
            Self::Category(set) => message.header.categories.intersects(set),
        }
    }
}

type Handler = dyn Fn(&Message) -> bool + Send + Sync;

struct Subscription {
    id: SubscriptionId,
    filter: MessageFilter,
    handler: Box<Handler>,
}

/// Bus statistics
///
/// Counters are eventually consistent with the queue: per-type totals are
/// updated under the stats lock after dispatch releases the queue lock, so
/// a concurrent reader may briefly see a queue size that does not match the
/// totals.
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Messages accepted by `publish`
    pub published: u64,
    /// Messages dispatched by `process`
    pub processed: u64,
    /// Messages dispatched by `publish_immediate`
    pub immediate: u64,
    /// Dispatched messages per type tag
    pub per_type: HashMap<MessageType, u64>,
    /// Queue depth at the time `stats` was called
    pub queued: usize,
}

/// Publish/subscribe message bus
///
/// `publish` is callable from any thread; `process` is expected to run on
/// the render thread, one caller at a time per bus.
pub struct MessageBus {
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
    queue: Mutex<VecDeque<Message>>,
    stats: Mutex<BusStats>,
    next_subscription: AtomicU64,
    next_sequence: AtomicU64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            stats: Mutex::new(BusStats::default()),
            next_subscription: AtomicU64::new(1),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Subscribe a handler to messages matching `filter`
    ///
    /// The handler's returned flag is advisory: every matching subscriber
    /// always receives the message, and a `true` return is only logged.
    pub fn subscribe<F>(&self, filter: MessageFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription { id, filter, handler: Box::new(handler) });
        self.subscriptions
            .lock()
            .expect("subscription lock poisoned")
            .push(subscription);
        log::debug!("subscribed {id:?} with filter {filter:?}");
        id
    }

    /// Subscribe to worker results of a concrete type
    ///
    /// Results whose payload is not `T` are ignored by this subscription.
    pub fn subscribe_worker_result<T, F>(&self, handler: F) -> SubscriptionId
    where
        T: WorkerResult + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(MessageFilter::Type(MessageType::WorkerResult), move |message| {
            if let crate::events::MessagePayload::WorkerResult(result) = &message.payload {
                if let Some(typed) = result.as_any().downcast_ref::<T>() {
                    handler(typed);
                    return true;
                }
            }
            false
        })
    }

    /// Remove a subscription; unknown ids are silently ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        subscriptions.retain(|s| s.id != id);
    }

    /// Enqueue a message for the next `process` call
    pub fn publish(&self, mut message: Message) {
        message.header.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            queue.push_back(message);
        }
        let mut stats = self.stats.lock().expect("stats lock poisoned");
        stats.published += 1;
    }

    /// Dispatch a message on the calling thread, before returning
    ///
    /// Not ordered with respect to queued messages.
    pub fn publish_immediate(&self, mut message: Message) {
        message.header.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let message_type = message.message_type();
        self.dispatch(&message);
        let mut stats = self.stats.lock().expect("stats lock poisoned");
        stats.immediate += 1;
        *stats.per_type.entry(message_type).or_insert(0) += 1;
    }

    /// Drain the queue and dispatch every message in FIFO publish order
    ///
    /// The queue is swapped out under a short critical section; dispatch
    /// runs outside the queue lock, so handlers may publish.
    pub fn process(&self) {
        let drained: VecDeque<Message> = {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            std::mem::take(&mut *queue)
        };

        if drained.is_empty() {
            return;
        }

        let mut per_type: HashMap<MessageType, u64> = HashMap::new();
        let count = drained.len() as u64;
        for message in &drained {
            self.dispatch(message);
            *per_type.entry(message.message_type()).or_insert(0) += 1;
        }

        let mut stats = self.stats.lock().expect("stats lock poisoned");
        stats.processed += count;
        for (ty, n) in per_type {
            *stats.per_type.entry(ty).or_insert(0) += n;
        }
    }

    /// Drop every queued message without dispatching
    pub fn clear_queue(&self) {
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        let dropped = queue.len();
        queue.clear();
        if dropped > 0 {
            log::debug!("cleared {dropped} queued messages");
        }
    }

    /// Snapshot the statistics counters
    pub fn stats(&self) -> BusStats {
        let queued = self.queue.lock().expect("queue lock poisoned").len();
        let mut stats = self.stats.lock().expect("stats lock poisoned").clone();
        stats.queued = queued;
        stats
    }

    /// Zero the statistics counters
    pub fn reset_stats(&self) {
        let mut stats = self.stats.lock().expect("stats lock poisoned");
        *stats = BusStats::default();
    }

    /// Invoke every matching subscriber with the message
    ///
    /// Iterates a snapshot of the subscription list taken under the lock,
    /// so handlers may subscribe or unsubscribe reentrantly. Handler panics
    /// are caught and logged; they never poison the bus.
    fn dispatch(&self, message: &Message) {
        let snapshot: Vec<Arc<Subscription>> = {
            let subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
            subscriptions.clone()
        };

        let mut delivered = 0_u32;
        for subscription in &snapshot {
            if !subscription.filter.matches(message) {
                continue;
            }
            delivered += 1;
            match catch_unwind(AssertUnwindSafe(|| (subscription.handler)(message))) {
                Ok(handled) => {
                    if handled {
                        log::trace!(
                            "{:?} reported {:?} handled",
                            subscription.id,
                            message.message_type()
                        );
                    }
                }
                Err(_) => {
                    log::error!(
                        "handler {:?} panicked on {:?}; continuing dispatch",
                        subscription.id,
                        message.message_type()
                    );
                }
            }
        }

        if delivered == 0 {
            log::trace!("no subscriber for {:?}; message dropped", message.message_type());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::message::MessagePayload;
    use std::sync::atomic::AtomicUsize;

    fn resized(width: u32) -> Message {
        Message::new(0, MessagePayload::WindowResized { new_width: width, new_height: 1080 })
    }

    #[test]
    fn queued_message_delivered_once_then_unsubscribed() {
        let bus = MessageBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let id = bus.subscribe(MessageFilter::Type(MessageType::WindowResized), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        bus.publish(resized(800));
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        bus.unsubscribe(id);
        bus.publish(resized(800));
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn process_preserves_publish_order() {
        let bus = MessageBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&order);
        bus.subscribe(MessageFilter::All, move |message| {
            if let MessagePayload::WindowResized { new_width, .. } = message.payload {
                sink.lock().unwrap().push(new_width);
            }
            false
        });

        for width in [100, 200, 300] {
            bus.publish(resized(width));
        }
        bus.process();
        assert_eq!(*order.lock().unwrap(), vec![100, 200, 300]);
    }

    #[test]
    fn immediate_dispatch_bypasses_queue() {
        let bus = MessageBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        bus.subscribe(MessageFilter::All, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        bus.publish(resized(640));
        bus.publish_immediate(resized(800));
        // Immediate delivery happened before any process call.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn category_filter_selects_by_bitflags() {
        let bus = MessageBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        bus.subscribe(MessageFilter::Category(MessageCategory::SYNC), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        bus.publish(resized(1));
        bus.publish(Message::new(
            0,
            MessagePayload::DeviceSyncCompleted { device_count: 2, duration_ms: 3 },
        ));
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_unknown_id_is_ignored() {
        let bus = MessageBus::new();
        let id = bus.subscribe(MessageFilter::All, |_| false);
        bus.unsubscribe(id);
        bus.unsubscribe(id); // repeat is a no-op
    }

    #[test]
    fn handler_panic_does_not_poison_the_bus() {
        let bus = MessageBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        bus.subscribe(MessageFilter::All, |_| panic!("handler failure"));
        let counter = Arc::clone(&seen);
        bus.subscribe(MessageFilter::All, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        bus.publish(resized(1));
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // The bus still works after the panic.
        bus.publish(resized(2));
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stats_are_monotonic_until_reset() {
        let bus = MessageBus::new();
        bus.subscribe(MessageFilter::All, |_| false);

        bus.publish(resized(1));
        bus.publish(resized(2));
        let before = bus.stats();
        assert_eq!(before.published, 2);
        assert_eq!(before.queued, 2);
        assert_eq!(before.processed, 0);

        bus.process();
        let after = bus.stats();
        assert_eq!(after.processed, 2);
        assert_eq!(after.queued, 0);
        assert_eq!(after.per_type.get(&MessageType::WindowResized), Some(&2));

        bus.reset_stats();
        let reset = bus.stats();
        assert_eq!(reset.published, 0);
        assert_eq!(reset.processed, 0);
        assert!(reset.per_type.is_empty());
    }

    #[test]
    fn clear_queue_drops_without_dispatch() {
        let bus = MessageBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        bus.subscribe(MessageFilter::All, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        bus.publish(resized(1));
        bus.clear_queue();
        bus.process();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
