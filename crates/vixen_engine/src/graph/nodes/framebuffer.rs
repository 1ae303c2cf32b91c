//! Framebuffer node
//!
//! Owns one framebuffer per swapchain image view, bound to the upstream
//! render pass. Recreated whenever the swapchain or render pass recompiles.

use crate::gpu::{DeviceId, FramebufferDesc};
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::resource::{FramebufferSet, NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const IN_RENDER_PASS: usize = 1;
const IN_SWAPCHAIN: usize = 2;
const OUT_FRAMEBUFFERS: usize = 0;

/// Build the `Framebuffer` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("Framebuffer")
        .input("device", ElementType::Device)
        .input("render_pass", ElementType::RenderPass)
        .input("swapchain", ElementType::Swapchain)
        .output("framebuffers", ElementType::Framebuffer)
        .build(|| Box::new(FramebufferNode::default()))
}

/// Node behavior owning the per-image framebuffers
#[derive(Default)]
pub struct FramebufferNode {
    created: Option<(DeviceId, Vec<ash::vk::Framebuffer>)>,
}

impl FramebufferNode {
    fn destroy_existing(&mut self, ctx: &NodeContext<'_>) {
        if let Some((device, framebuffers)) = self.created.take() {
            for framebuffer in framebuffers {
                ctx.services.facade.destroy_framebuffer(device, framebuffer);
            }
        }
    }
}

impl RenderNode for FramebufferNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let render_pass = ctx
            .require_input(IN_RENDER_PASS)?
            .as_render_pass()
            .ok_or(NodeError::MissingInput { slot: IN_RENDER_PASS })?;
        let swapchain = ctx
            .require_input(IN_SWAPCHAIN)?
            .as_swapchain()
            .ok_or(NodeError::MissingInput { slot: IN_SWAPCHAIN })?
            .clone();

        self.destroy_existing(ctx);

        let facade = &ctx.services.facade;
        let mut framebuffers = Vec::with_capacity(swapchain.views.len());
        for &view in &swapchain.views {
            let desc = FramebufferDesc {
                render_pass,
                attachments: vec![view],
                extent: swapchain.extent,
            };
            match facade.create_framebuffer(device, &desc) {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(e) => {
                    for &framebuffer in &framebuffers {
                        facade.destroy_framebuffer(device, framebuffer);
                    }
                    return Err(e.into());
                }
            }
        }

        self.created = Some((device, framebuffers.clone()));
        outputs.set(
            OUT_FRAMEBUFFERS,
            NodeResource::new(
                "framebuffers",
                "per-image render targets",
                ResourceValue::Framebuffers(Arc::new(FramebufferSet {
                    framebuffers,
                    extent: swapchain.extent,
                })),
            ),
        );
        Ok(())
    }

    fn cleanup(&mut self, ctx: &NodeContext<'_>) {
        self.destroy_existing(ctx);
    }
}
