//! Event system - publish/subscribe message fabric
//!
//! Carries invalidation cascades (window resize, shader reload, device
//! sync) between subsystems and delivers worker-thread results back to the
//! render thread. Supports queued delivery drained once per frame by
//! [`MessageBus::process`] and immediate same-thread dispatch.

mod bus;
mod message;
mod worker;

pub use bus::{BusStats, MessageBus, MessageFilter, SubscriptionId};
pub use message::{
    DeviceSyncScope, Message, MessageCategory, MessageHeader, MessagePayload, MessageType,
    PauseAction, PauseReason, WorkerResult,
};
pub use worker::{WorkId, WorkerBridge, WorkerFailed};
