//! Present node
//!
//! Terminal member of the canonical triple: consumes the swapchain, the
//! acquired image index, and one or more render-complete semaphores, and
//! outputs the presentation result code the executor aggregates. Any
//! pipeline that renders to a swapchain must end in one of these.

use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::resource::{NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use ash::vk;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const IN_SWAPCHAIN: usize = 1;
const IN_IMAGE_INDEX: usize = 2;
const IN_WAIT: usize = 3;
const OUT_RESULT: usize = 0;

/// Build the `Present` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("Present")
        .input("device", ElementType::Device)
        .input("swapchain", ElementType::Swapchain)
        .input("image_index", ElementType::ImageIndex)
        .variadic_input("wait", ElementType::Semaphore, 1)
        .output("result", ElementType::PresentResult)
        .build(|| Box::new(PresentNode))
}

/// Node behavior presenting the acquired image
pub struct PresentNode;

impl RenderNode for PresentNode {
    fn compile(
        &mut self,
        _ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        // Presentation is purely per-frame work.
        outputs.unset(OUT_RESULT);
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let swapchain = ctx
            .require_input(IN_SWAPCHAIN)?
            .as_swapchain()
            .ok_or(NodeError::MissingInput { slot: IN_SWAPCHAIN })?
            .clone();
        let image_index = ctx
            .require_input(IN_IMAGE_INDEX)?
            .as_image_index()
            .ok_or(NodeError::MissingInput { slot: IN_IMAGE_INDEX })?;

        let waits: Vec<vk::Semaphore> = ctx
            .inputs_at(IN_WAIT)
            .iter()
            .filter_map(NodeResource::as_semaphore)
            .collect();
        if waits.is_empty() {
            return Err(NodeError::MissingInput { slot: IN_WAIT });
        }

        let outcome = ctx
            .services
            .facade
            .present(device, swapchain.swapchain, image_index, &waits)?;

        // Out-of-date is a result, not a node failure; the executor reads
        // it from this output and aborts the frame accordingly.
        outputs.set(
            OUT_RESULT,
            NodeResource::new("result", "presentation outcome", ResourceValue::PresentResult(outcome)),
        );
        Ok(())
    }
}
