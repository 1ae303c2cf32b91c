//! Window node
//!
//! Exposes the host window handle and its current framebuffer extent.
//! Resize invalidation arrives through the bus; the executor marks window
//! and swapchain nodes dirty, and recompiling this node re-reads the
//! extent from the facade.

use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::{NodeResource, ResourceValue, WindowRef};
use crate::graph::slot::ElementType;
use std::sync::Arc;

const OUT_WINDOW: usize = 0;

/// Build the `Window` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("Window")
        .output("window", ElementType::Window)
        .parameter("width", ParameterValue::U32(1280), false)
        .parameter("height", ParameterValue::U32(720), false)
        .build(|| Box::new(WindowNode))
}

/// Node behavior exposing the host window
pub struct WindowNode;

impl RenderNode for WindowNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let window = ctx.services.facade.primary_window();
        // The facade extent is authoritative; the width/height parameters
        // are creation hints for hosts that size the window from the graph.
        let extent = ctx.services.facade.window_extent(window);
        log::debug!(
            "node '{}' window extent {}x{}",
            ctx.instance_name,
            extent.width,
            extent.height
        );
        outputs.set(
            OUT_WINDOW,
            NodeResource::new("window", "render target surface", ResourceValue::Window(WindowRef { window, extent })),
        );
        Ok(())
    }
}
