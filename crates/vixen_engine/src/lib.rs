//! # Vixen Engine
//!
//! A Vulkan render-graph engine core with three tightly coupled
//! subsystems:
//!
//! - **Render graph**: a directed, type-checked graph of rendering nodes
//!   compiled into a topological execution schedule and executed once per
//!   frame (acquire, record, submit, present).
//! - **Resource cache**: per-device and device-independent caches that
//!   deduplicate expensive GPU objects by a content hash of their creation
//!   parameters, with polymorphic cleanup.
//! - **Message bus**: thread-safe pub/sub carrying invalidation cascades
//!   (window resize, shader reload, device sync) and worker-thread
//!   results.
//!
//! The host supplies three capabilities: a [`gpu::GpuFacade`] over its
//! Vulkan layer, a [`gpu::ShaderBytecodeProvider`], and a
//! [`gpu::ImageDataProvider`]. The core performs no Vulkan calls itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vixen_engine::prelude::*;
//!
//! fn run(
//!     facade: Arc<dyn GpuFacade>,
//!     shaders: Arc<dyn ShaderBytecodeProvider>,
//!     images: Arc<dyn ImageDataProvider>,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::new(EngineConfig::default(), facade, shaders, images)?;
//!
//!     {
//!         let mut graph = engine.executor().graph();
//!         let dev = graph.add_node("Device", "dev")?;
//!         let win = graph.add_node("Window", "win")?;
//!         let sync = graph.add_node("FrameSync", "sync")?;
//!         let swap = graph.add_node("Swapchain", "swap")?;
//!         graph.connect(dev, 0, sync, 0)?;
//!         graph.connect(dev, 0, swap, 0)?;
//!         graph.connect(win, 0, swap, 1)?;
//!         graph.connect(sync, 0, swap, 2)?;
//!         // ... command pool, render pass, framebuffer, geometry, present
//!     }
//!
//!     loop {
//!         match engine.pump() {
//!             Ok(_) => {}
//!             Err(FrameError::OutOfDate) => continue, // rebuilt next frame
//!             Err(e) => return Err(e.into()),
//!         }
//!     }
//! }
//! ```

// Core engine modules
pub mod config;
pub mod events;
pub mod foundation;
pub mod gpu;
pub mod graph;
pub mod resources;

mod engine;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError};

#[cfg(test)]
mod tests;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineError};
    pub use crate::events::{
        Message, MessageBus, MessageFilter, MessagePayload, MessageType, WorkerBridge,
        WorkerResult,
    };
    pub use crate::gpu::{
        DeviceId, GpuFacade, ImageDataProvider, ShaderBytecodeProvider, WindowId,
    };
    pub use crate::graph::{
        ElementType, FrameError, FrameExecutor, FrameOutcome, GraphError, NodeHandle, NodeState,
        ParameterValue, RenderGraph, RenderNode,
    };
    pub use crate::resources::{CacheRegistry, ResourceError, ResourceTag};
}
