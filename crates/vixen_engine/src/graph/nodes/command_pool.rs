//! Command pool node
//!
//! Owns a command pool and its primary buffers for the device's graphics
//! queue family. The executor never supplies command buffers; recording
//! nodes consume this node's output slot instead.

use crate::gpu::DeviceId;
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::{CommandBufferSet, NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const OUT_COMMANDS: usize = 0;

/// Build the `CommandPool` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("CommandPool")
        .input("device", ElementType::Device)
        .output("commands", ElementType::CommandPool)
        .parameter("buffer_count", ParameterValue::U32(3), false)
        .build(|| Box::new(CommandPoolNode::default()))
}

/// Node behavior owning a command pool and its buffers
#[derive(Default)]
pub struct CommandPoolNode {
    created: Option<(DeviceId, Arc<CommandBufferSet>)>,
}

impl RenderNode for CommandPoolNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let count = ctx
            .param("buffer_count")
            .and_then(ParameterValue::as_u32)
            .unwrap_or(3)
            .max(1);

        if let Some((device, set)) = self.created.take() {
            // Destroying the pool frees its buffers with it.
            ctx.services.facade.destroy_command_pool(device, set.pool);
        }

        let facade = &ctx.services.facade;
        let pool = facade.create_command_pool(device)?;
        let buffers = match facade.allocate_command_buffers(device, pool, count) {
            Ok(buffers) => buffers,
            Err(e) => {
                facade.destroy_command_pool(device, pool);
                return Err(e.into());
            }
        };

        let set = Arc::new(CommandBufferSet { pool, buffers });
        self.created = Some((device, Arc::clone(&set)));
        outputs.set(
            OUT_COMMANDS,
            NodeResource::new("commands", "per-frame recording buffers", ResourceValue::CommandPool(set)),
        );
        Ok(())
    }

    fn cleanup(&mut self, ctx: &NodeContext<'_>) {
        if let Some((device, set)) = self.created.take() {
            ctx.services.facade.destroy_command_pool(device, set.pool);
        }
    }
}
