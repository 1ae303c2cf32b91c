//! Built-in node types
//!
//! The canonical present pipeline: device and window sources, swapchain
//! acquire, per-frame sync, command pool, render pass, framebuffers,
//! geometry record-and-submit, and present. Each node owns the GPU objects
//! it creates; shareable objects go through the cache registry instead.

mod command_pool;
mod device;
mod frame_sync;
mod framebuffer;
mod geometry;
mod present;
mod render_pass;
mod swapchain;
mod window;

pub use command_pool::CommandPoolNode;
pub use device::DeviceNode;
pub use frame_sync::FrameSyncNode;
pub use framebuffer::FramebufferNode;
pub use geometry::GeometryRenderNode;
pub use present::PresentNode;
pub use render_pass::RenderPassNode;
pub use swapchain::SwapchainNode;
pub use window::WindowNode;

use crate::graph::node_type::NodeTypeRegistry;
use crate::graph::GraphError;

/// Register every built-in node type
pub fn register_builtin_types(registry: &mut NodeTypeRegistry) -> Result<(), GraphError> {
    registry.register(device::node_type())?;
    registry.register(window::node_type())?;
    registry.register(frame_sync::node_type())?;
    registry.register(swapchain::node_type())?;
    registry.register(command_pool::node_type())?;
    registry.register(render_pass::node_type())?;
    registry.register(framebuffer::node_type())?;
    registry.register(geometry::node_type())?;
    registry.register(present::node_type())?;
    Ok(())
}
