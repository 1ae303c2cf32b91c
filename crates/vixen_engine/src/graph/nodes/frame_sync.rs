//! Frame synchronization node
//!
//! Owns the per-frame semaphores and in-flight fence the canonical
//! acquire/record/present triple hands between each other.

use crate::gpu::DeviceId;
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::resource::{FrameSyncSet, NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const OUT_SYNC: usize = 0;

/// Build the `FrameSync` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("FrameSync")
        .input("device", ElementType::Device)
        .output("frame_sync", ElementType::FrameSync)
        .build(|| Box::new(FrameSyncNode::default()))
}

/// Node behavior owning the frame synchronization objects
#[derive(Default)]
pub struct FrameSyncNode {
    created: Option<(DeviceId, FrameSyncSet)>,
}

impl RenderNode for FrameSyncNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let facade = &ctx.services.facade;

        let image_available = facade.create_semaphore(device)?;
        let render_finished = match facade.create_semaphore(device) {
            Ok(s) => s,
            Err(e) => {
                facade.destroy_semaphore(device, image_available);
                return Err(e.into());
            }
        };
        // The fence starts signaled so the first frame's wait passes.
        let in_flight = match facade.create_fence(device, true) {
            Ok(f) => f,
            Err(e) => {
                facade.destroy_semaphore(device, image_available);
                facade.destroy_semaphore(device, render_finished);
                return Err(e.into());
            }
        };

        let set = FrameSyncSet { image_available, render_finished, in_flight };
        self.created = Some((device, set));
        outputs.set(
            OUT_SYNC,
            NodeResource::new("frame_sync", "per-frame sync objects", ResourceValue::FrameSync(Arc::new(set))),
        );
        Ok(())
    }

    fn cleanup(&mut self, ctx: &NodeContext<'_>) {
        if let Some((device, set)) = self.created.take() {
            let facade = &ctx.services.facade;
            facade.destroy_semaphore(device, set.image_available);
            facade.destroy_semaphore(device, set.render_finished);
            facade.destroy_fence(device, set.in_flight);
        }
    }
}
