//! Render pass node
//!
//! Builds the single-subpass render pass matching the swapchain's color
//! format, through the render-pass cacher so graphs sharing attachment
//! state share the GPU object. The cache owns destruction; this node only
//! drops its shared reference on cleanup.

use crate::gpu::{AttachmentDesc, RenderPassDesc};
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::{NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use crate::resources::{CachedRenderPass, RenderPassCache, ResourceTag};
use ash::vk;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const IN_SWAPCHAIN: usize = 1;
const OUT_RENDER_PASS: usize = 0;

/// Build the `RenderPass` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("RenderPass")
        .input("device", ElementType::Device)
        .input("swapchain", ElementType::Swapchain)
        .output("render_pass", ElementType::RenderPass)
        .parameter("load_op", ParameterValue::LoadOp(vk::AttachmentLoadOp::CLEAR), false)
        .parameter("store_op", ParameterValue::StoreOp(vk::AttachmentStoreOp::STORE), false)
        .parameter(
            "final_layout",
            ParameterValue::ImageLayout(vk::ImageLayout::PRESENT_SRC_KHR),
            false,
        )
        // UNDEFINED means no depth attachment.
        .parameter("depth_format", ParameterValue::DepthFormat(vk::Format::UNDEFINED), false)
        .build(|| Box::new(RenderPassNode::default()))
}

/// Node behavior resolving a render pass through the cache
#[derive(Default)]
pub struct RenderPassNode {
    shared: Option<Arc<CachedRenderPass>>,
}

impl RenderNode for RenderPassNode {
    fn compile(
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

        let load_op = ctx
            .param("load_op")
            .and_then(ParameterValue::as_load_op)
            .unwrap_or(vk::AttachmentLoadOp::CLEAR);
        let store_op = ctx
            .param("store_op")
            .and_then(ParameterValue::as_store_op)
            .unwrap_or(vk::AttachmentStoreOp::STORE);
        let final_layout = ctx
            .param("final_layout")
            .and_then(ParameterValue::as_image_layout)
            .unwrap_or(vk::ImageLayout::PRESENT_SRC_KHR);
        let depth_format = ctx
            .param("depth_format")
            .and_then(ParameterValue::as_depth_format)
            .unwrap_or(vk::Format::UNDEFINED);

        let desc = RenderPassDesc {
            color: AttachmentDesc {
                format: swapchain.format,
                load_op,
                store_op,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout,
            },
            depth: (depth_format != vk::Format::UNDEFINED).then_some(AttachmentDesc {
                format: depth_format,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }),
        };

        let cache = ctx
            .services
            .registry
            .get::<RenderPassCache>(ResourceTag::RenderPass, Some(device))?;
        let cached = cache.get_or_create(&desc)?;
        outputs.set(
            OUT_RENDER_PASS,
            NodeResource::new("render_pass", "attachment layout contract", ResourceValue::RenderPass(cached.render_pass)),
        );
        self.shared = Some(cached);
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &NodeContext<'_>) {
        // Cache-owned; dropping the reference is enough.
        self.shared = None;
    }
}
