//! Device node
//!
//! Binds one of the host's logical devices into the graph. Device nodes
//! are the sources of device-affinity propagation: every downstream node
//! inherits its device from the nearest upstream device node.

use crate::gpu::DeviceId;
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::{NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use std::sync::Arc;

const OUT_DEVICE: usize = 0;

/// Build the `Device` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("Device")
        .output("device", ElementType::Device)
        .parameter("device_index", ParameterValue::U32(0), false)
        .build(|| Box::new(DeviceNode))
}

/// Node behavior exposing a host device
pub struct DeviceNode;

impl DeviceNode {
    fn lookup(&self, ctx: &NodeContext<'_>) -> Option<DeviceId> {
        let index = ctx
            .param("device_index")
            .and_then(ParameterValue::as_u32)
            .unwrap_or(0);
        ctx.services.facade.devices().get(index as usize).copied()
    }
}

impl RenderNode for DeviceNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = self.lookup(ctx).ok_or_else(|| {
            NodeError::InvalidParameter("device_index is out of range".to_string())
        })?;
        log::debug!("node '{}' bound to {device}", ctx.instance_name);
        outputs.set(
            OUT_DEVICE,
            NodeResource::new("device", "affinity source", ResourceValue::Device(device)),
        );
        Ok(())
    }

    fn device_source(&self, ctx: &NodeContext<'_>) -> Option<DeviceId> {
        self.lookup(ctx)
    }
}
