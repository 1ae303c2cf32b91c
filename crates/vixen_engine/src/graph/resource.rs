//! Node resources
//!
//! A [`NodeResource`] is the type-erased carrier that flows along
//! connections: a GPU handle or CPU-side bundle plus its element type tag
//! and a small descriptor (name, intent). The producing node is the sole
//! owner of the underlying GPU object; consumers receive clones of the
//! carrier, which are cheap (handles are `Copy`, bundles are `Arc`).

use crate::gpu::{DeviceId, PresentOutcome, WindowId};
use crate::graph::slot::ElementType;
use ash::vk;
use std::sync::Arc;

/// Window reference plus current framebuffer extent
#[derive(Debug, Clone, Copy)]
pub struct WindowRef {
    /// Host window id
    pub window: WindowId,
    /// Current framebuffer extent
    pub extent: vk::Extent2D,
}

/// Swapchain with its image set, produced by the swapchain node
#[derive(Debug)]
pub struct SwapchainState {
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Surface format in use
    pub format: vk::Format,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Images owned by the swapchain
    pub images: Vec<vk::Image>,
    /// One view per image
    pub views: Vec<vk::ImageView>,
}

/// Per-frame synchronization bundle
#[derive(Debug, Clone, Copy)]
pub struct FrameSyncSet {
    /// Signaled when the acquired image is ready
    pub image_available: vk::Semaphore,
    /// Signaled when rendering to the image finished
    pub render_finished: vk::Semaphore,
    /// Signaled when the frame's submission retired
    pub in_flight: vk::Fence,
}

/// Command pool with its allocated primary buffers
#[derive(Debug)]
pub struct CommandBufferSet {
    /// Pool the buffers were allocated from
    pub pool: vk::CommandPool,
    /// Primary command buffers, one per in-flight frame
    pub buffers: Vec<vk::CommandBuffer>,
}

/// Framebuffers for every swapchain image
#[derive(Debug)]
pub struct FramebufferSet {
    /// One framebuffer per swapchain image
    pub framebuffers: Vec<vk::Framebuffer>,
    /// Extent the framebuffers were created with
    pub extent: vk::Extent2D,
}

/// The value carried by a node resource
#[derive(Debug, Clone)]
pub enum ResourceValue {
    /// Logical device
    Device(DeviceId),
    /// Window handle and extent
    Window(WindowRef),
    /// Swapchain bundle
    Swapchain(Arc<SwapchainState>),
    /// Acquired swapchain image index
    ImageIndex(u32),
    /// Semaphore
    Semaphore(vk::Semaphore),
    /// Fence
    Fence(vk::Fence),
    /// Per-frame synchronization bundle
    FrameSync(Arc<FrameSyncSet>),
    /// Command pool with buffers
    CommandPool(Arc<CommandBufferSet>),
    /// Render pass
    RenderPass(vk::RenderPass),
    /// Framebuffer set
    Framebuffers(Arc<FramebufferSet>),
    /// Pipeline
    Pipeline(vk::Pipeline),
    /// Presentation result
    PresentResult(PresentOutcome),
}

impl ResourceValue {
    /// Element type tag of this value
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Device(_) => ElementType::Device,
            Self::Window(_) => ElementType::Window,
            Self::Swapchain(_) => ElementType::Swapchain,
            Self::ImageIndex(_) => ElementType::ImageIndex,
            Self::Semaphore(_) => ElementType::Semaphore,
            Self::Fence(_) => ElementType::Fence,
            Self::FrameSync(_) => ElementType::FrameSync,
            Self::CommandPool(_) => ElementType::CommandPool,
            Self::RenderPass(_) => ElementType::RenderPass,
            Self::Framebuffers(_) => ElementType::Framebuffer,
            Self::Pipeline(_) => ElementType::Pipeline,
            Self::PresentResult(_) => ElementType::PresentResult,
        }
    }
}

/// Type-erased resource produced by a node output slot
#[derive(Debug, Clone)]
pub struct NodeResource {
    /// Resource name, usually the producing slot name
    pub name: String,
    /// What the resource is for, free-form
    pub intent: String,
    /// Carried value
    pub value: ResourceValue,
}

impl NodeResource {
    /// Create a resource carrier
    pub fn new(name: &str, intent: &str, value: ResourceValue) -> Self {
        Self {
            name: name.to_string(),
            intent: intent.to_string(),
            value,
        }
    }

    /// Element type tag of the carried value
    pub const fn element_type(&self) -> ElementType {
        self.value.element_type()
    }

    /// The device value, if that is the variant
    pub const fn as_device(&self) -> Option<DeviceId> {
        match &self.value {
            ResourceValue::Device(id) => Some(*id),
            _ => None,
        }
    }

    /// The window value, if that is the variant
    pub const fn as_window(&self) -> Option<WindowRef> {
        match &self.value {
            ResourceValue::Window(w) => Some(*w),
            _ => None,
        }
    }

    /// The swapchain bundle, if that is the variant
    pub fn as_swapchain(&self) -> Option<&Arc<SwapchainState>> {
        match &self.value {
            ResourceValue::Swapchain(s) => Some(s),
            _ => None,
        }
    }

    /// The image index, if that is the variant
    pub const fn as_image_index(&self) -> Option<u32> {
        match &self.value {
            ResourceValue::ImageIndex(i) => Some(*i),
            _ => None,
        }
    }

    /// The semaphore, if that is the variant
    pub const fn as_semaphore(&self) -> Option<vk::Semaphore> {
        match &self.value {
            ResourceValue::Semaphore(s) => Some(*s),
            _ => None,
        }
    }

    /// The frame-sync bundle, if that is the variant
    pub fn as_frame_sync(&self) -> Option<&Arc<FrameSyncSet>> {
        match &self.value {
            ResourceValue::FrameSync(s) => Some(s),
            _ => None,
        }
    }

    /// The command buffer set, if that is the variant
    pub fn as_command_pool(&self) -> Option<&Arc<CommandBufferSet>> {
        match &self.value {
            ResourceValue::CommandPool(c) => Some(c),
            _ => None,
        }
    }

    /// The render pass, if that is the variant
    pub const fn as_render_pass(&self) -> Option<vk::RenderPass> {
        match &self.value {
            ResourceValue::RenderPass(r) => Some(*r),
            _ => None,
        }
    }

    /// The framebuffer set, if that is the variant
    pub fn as_framebuffers(&self) -> Option<&Arc<FramebufferSet>> {
        match &self.value {
            ResourceValue::Framebuffers(f) => Some(f),
            _ => None,
        }
    }

    /// The present result, if that is the variant
    pub const fn as_present_result(&self) -> Option<PresentOutcome> {
        match &self.value {
            ResourceValue::PresentResult(p) => Some(*p),
            _ => None,
        }
    }
}
