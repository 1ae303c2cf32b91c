//! Message types carried by the bus
//!
//! The message set is closed: every payload the core emits or consumes is
//! a variant of [`MessagePayload`], tagged by [`MessageType`] and a fixed
//! set of category bitflags used only for subscriber filtering.

use crate::gpu::DeviceId;
use bitflags::bitflags;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

bitflags! {
    /// Coarse message categories for subscriber filtering
    ///
    /// Categories are fixed per message type; they never affect dispatch
    /// order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageCategory: u32 {
        /// Windowing events
        const WINDOW = 1 << 0;
        /// Rendering lifecycle events
        const RENDER = 1 << 1;
        /// Resource and cache events
        const RESOURCE = 1 << 2;
        /// Device synchronization events
        const SYNC = 1 << 3;
        /// Worker-thread results
        const WORKER = 1 << 4;
    }
}

/// Stable tag identifying a message's payload variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Window framebuffer dimensions changed
    WindowResized,
    /// A shader source file changed on disk
    ShaderReloaded,
    /// A subsystem asked for device synchronization before the next frame
    DeviceSyncRequested,
    /// Device synchronization finished
    DeviceSyncCompleted,
    /// Rendering suspension started or ended
    RenderPause,
    /// A cleanup pass was requested
    CleanupRequested,
    /// A cleanup pass finished
    CleanupCompleted,
    /// A worker-bridge result
    WorkerResult,
}

impl MessageType {
    /// Category bitflags fixed for this message type
    pub const fn categories(self) -> MessageCategory {
        match self {
            Self::WindowResized => MessageCategory::WINDOW,
            Self::ShaderReloaded => MessageCategory::RESOURCE,
            Self::DeviceSyncRequested | Self::DeviceSyncCompleted => MessageCategory::SYNC,
            Self::RenderPause => MessageCategory::RENDER,
            Self::CleanupRequested | Self::CleanupCompleted => MessageCategory::RESOURCE,
            Self::WorkerResult => MessageCategory::WORKER,
        }
    }
}

/// Which devices a sync request covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSyncScope {
    /// Every device known to the facade
    AllDevices,
    /// Devices bound to the named graph nodes
    ForNodes(Vec<String>),
    /// An explicit device list
    ForDevices(Vec<DeviceId>),
}

/// Why rendering is being paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// The swapchain is being recreated
    SwapchainRecreation,
    /// Resources are being reallocated
    ResourceReallocation,
}

/// Whether a pause is starting or ending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    /// Suspend rendering after the current frame
    PauseStart,
    /// Resume rendering
    PauseEnd,
}

/// Result published by the worker bridge
///
/// User-defined result types implement this; the payload travels through
/// the bus type-erased and subscribers downcast via [`WorkerResult::as_any`].
pub trait WorkerResult: Send + Sync + std::fmt::Debug {
    /// Identifier assigned by the bridge at submission
    fn work_id(&self) -> u64;
    /// Sender id supplied at submission
    fn sender(&self) -> u32;
    /// Whether the work succeeded
    fn success(&self) -> bool;
    /// Error description when `success` is false
    fn error(&self) -> Option<&str>;
    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// Type-specific message payload
#[derive(Debug, Clone)]
pub enum MessagePayload {
    /// Window framebuffer dimensions changed
    WindowResized {
        /// New width in pixels
        new_width: u32,
        /// New height in pixels
        new_height: u32,
    },
    /// A shader source file changed on disk
    ShaderReloaded {
        /// Path of the changed source file
        path: String,
    },
    /// A subsystem asked for device synchronization before the next frame
    DeviceSyncRequested {
        /// Devices to synchronize
        scope: DeviceSyncScope,
        /// Free-form reason for logging
        reason: String,
    },
    /// Device synchronization finished
    DeviceSyncCompleted {
        /// Number of devices waited on
        device_count: usize,
        /// Wall-clock wait duration
        duration_ms: u64,
    },
    /// Rendering suspension started or ended
    RenderPause {
        /// Why rendering is paused
        reason: PauseReason,
        /// Pause start or end
        action: PauseAction,
    },
    /// A cleanup pass was requested
    CleanupRequested {
        /// Correlates the completion message
        request_id: u32,
    },
    /// A cleanup pass finished
    CleanupCompleted {
        /// Number of cachers cleaned
        cleaned: u32,
    },
    /// A worker-bridge result
    WorkerResult(Arc<dyn WorkerResult>),
}

impl MessagePayload {
    /// Tag of this payload variant
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::WindowResized { .. } => MessageType::WindowResized,
            Self::ShaderReloaded { .. } => MessageType::ShaderReloaded,
            Self::DeviceSyncRequested { .. } => MessageType::DeviceSyncRequested,
            Self::DeviceSyncCompleted { .. } => MessageType::DeviceSyncCompleted,
            Self::RenderPause { .. } => MessageType::RenderPause,
            Self::CleanupRequested { .. } => MessageType::CleanupRequested,
            Self::CleanupCompleted { .. } => MessageType::CleanupCompleted,
            Self::WorkerResult(_) => MessageType::WorkerResult,
        }
    }
}

/// Message header shared by every payload
#[derive(Debug, Clone)]
pub struct MessageHeader {
    /// Payload tag
    pub message_type: MessageType,
    /// Sender-chosen identifier
    pub sender: u32,
    /// Creation timestamp
    pub timestamp: Instant,
    /// Category bitflags, fixed per type
    pub categories: MessageCategory,
    /// Bus-assigned publish sequence, zero until published
    pub sequence: u64,
}

/// A message owned by the bus from publish until dispatch completes
#[derive(Debug, Clone)]
pub struct Message {
    /// Header
    pub header: MessageHeader,
    /// Payload
    pub payload: MessagePayload,
}

impl Message {
    /// Create a message from a sender id and payload
    pub fn new(sender: u32, payload: MessagePayload) -> Self {
        let message_type = payload.message_type();
        Self {
            header: MessageHeader {
                message_type,
                sender,
                timestamp: Instant::now(),
                categories: message_type.categories(),
                sequence: 0,
            },
            payload,
        }
    }

    /// Tag of this message
    pub const fn message_type(&self) -> MessageType {
        self.header.message_type
    }
}
