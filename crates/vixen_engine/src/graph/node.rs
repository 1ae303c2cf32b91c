//! Node instances and the node behavior contract
//!
//! A [`NodeInstance`] pairs static type information with concrete
//! parameter values, a state machine, and the boxed [`RenderNode`]
//! behavior that owns the node's GPU objects. The graph is the only owner
//! of instances; node types are borrowed through an `Arc`.

use crate::events::MessageBus;
use crate::gpu::{DeviceId, GpuError, GpuFacade};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::{ParameterDescriptor, ParameterSet, ParameterValue};
use crate::graph::resource::NodeResource;
use crate::graph::GraphError;
use crate::resources::{CacheRegistry, ResourceError};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by node compile and execute phases
#[derive(Error, Debug)]
pub enum NodeError {
    /// A facade operation failed
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// A cache operation failed
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// An input slot carried no value when the node needed one
    #[error("input slot {slot} has no value")]
    MissingInput {
        /// Offending input slot index
        slot: usize,
    },

    /// A parameter value was semantically invalid for this node
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The swapchain no longer matches the surface
    #[error("swapchain out of date")]
    SwapchainOutOfDate,

    /// Any other node-specific failure
    #[error("{0}")]
    Other(String),
}

/// Services shared by every node phase
pub struct GraphContext {
    /// GPU-API facade
    pub facade: Arc<dyn GpuFacade>,
    /// Resource cache registry
    pub registry: Arc<CacheRegistry>,
    /// Message bus
    pub bus: Arc<MessageBus>,
}

/// Per-call context handed to a node phase
pub struct NodeContext<'a> {
    /// Shared services
    pub services: &'a GraphContext,
    /// Device the node is bound to, when affinity has been propagated
    pub device: Option<DeviceId>,
    /// Instance name, for logging
    pub instance_name: &'a str,
    descriptors: &'a [ParameterDescriptor],
    values: &'a ParameterSet,
    inputs: &'a [Vec<NodeResource>],
}

impl<'a> NodeContext<'a> {
    /// Read a parameter, falling back to its default
    pub fn param(&self, name: &str) -> Option<&'a ParameterValue> {
        self.values.get(self.descriptors, name)
    }

    /// All resources connected into an input slot, in connection order
    pub fn inputs_at(&self, slot: usize) -> &'a [NodeResource] {
        self.inputs.get(slot).map_or(&[], Vec::as_slice)
    }

    /// The single resource of an input slot, if present
    pub fn input(&self, slot: usize) -> Option<&'a NodeResource> {
        self.inputs_at(slot).first()
    }

    /// The single resource of an input slot, or `MissingInput`
    pub fn require_input(&self, slot: usize) -> Result<&'a NodeResource, NodeError> {
        self.input(slot).ok_or(NodeError::MissingInput { slot })
    }

    /// The device bound to the node, or `MissingInput` on slot zero
    ///
    /// Convention: nodes that need a device take it on input slot 0.
    pub fn require_device(&self, slot: usize) -> Result<DeviceId, NodeError> {
        self.require_input(slot)?
            .as_device()
            .ok_or(NodeError::MissingInput { slot })
    }
}

/// Output slot values of one node
#[derive(Debug, Default)]
pub struct NodeOutputs {
    slots: Vec<Option<NodeResource>>,
}

impl NodeOutputs {
    /// Create with one empty slot per output descriptor
    pub fn with_slots(count: usize) -> Self {
        Self { slots: (0..count).map(|_| None).collect() }
    }

    /// Set an output slot's value
    pub fn set(&mut self, slot: usize, resource: NodeResource) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(resource);
        } else {
            log::error!("output slot {slot} out of range; value dropped");
        }
    }

    /// Drop an output slot's value
    pub fn unset(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = None;
        }
    }

    /// Read an output slot
    pub fn get(&self, slot: usize) -> Option<&NodeResource> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Iterate over present values
    pub fn iter(&self) -> impl Iterator<Item = &NodeResource> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Drop every value
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

/// Behavior of one node type
///
/// Implementations own their GPU objects outright: `compile` creates them
/// (directly or through the cache registry), `execute` records and submits
/// per-frame work, `cleanup` destroys whatever the node itself created.
/// The executor never supplies command buffers; nodes that record own
/// their pools and buffers, or consume them from an upstream node's slot.
///
/// Behaviors are `Send` so the graph can sit behind a shared lock reached
/// from bus subscriptions.
pub trait RenderNode: Send {
    /// Create compile-time resources and publish initial outputs
    fn compile(&mut self, ctx: &NodeContext<'_>, outputs: &mut NodeOutputs)
        -> Result<(), NodeError>;

    /// Perform per-frame work and refresh per-frame outputs
    fn execute(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let _ = (ctx, outputs);
        Ok(())
    }

    /// Destroy resources created in `compile`; must be idempotent
    fn cleanup(&mut self, ctx: &NodeContext<'_>) {
        let _ = ctx;
    }

    /// Device this node introduces into the graph, for affinity sources
    fn device_source(&self, ctx: &NodeContext<'_>) -> Option<DeviceId> {
        let _ = ctx;
        None
    }

    /// Shader source paths this node's pipelines were built from
    ///
    /// Used to target shader-reload invalidation.
    fn shader_paths(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Lifecycle state of a node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Just instantiated
    Created,
    /// Structure and parameters validated
    Ready,
    /// Compile-time resources exist
    Compiled,
    /// Execute is running
    Executing,
    /// Executed this frame
    Complete,
    /// Failed; terminal until explicitly reset
    Error,
    /// Marked for recompile before the next frame
    Dirty,
}

impl NodeState {
    /// Whether `self → to` is a legal transition
    pub fn can_transition(self, to: Self) -> bool {
        use NodeState::{Compiled, Complete, Created, Dirty, Error, Executing, Ready};
        match (self, to) {
            // Error is reachable from anywhere and only leaves via reset.
            (_, Error) => true,
            (Error, Created) => true,
            (Error, _) => false,
            (Created, Ready)
            | (Ready, Compiled)
            | (Compiled, Executing)
            | (Executing, Complete)
            | (Complete, Compiled)
            | (Dirty, Ready)
            | (Ready | Compiled | Complete | Executing, Dirty)
            | (Compiled | Complete | Dirty, Created) => true,
            _ => false,
        }
    }
}

/// A node instance owned by exactly one graph
pub struct NodeInstance {
    name: String,
    node_type: Arc<NodeType>,
    behavior: Box<dyn RenderNode>,
    params: ParameterSet,
    state: NodeState,
    enabled: bool,
    device: Option<DeviceId>,
    outputs: NodeOutputs,
}

impl NodeInstance {
    /// Instantiate from a node type; begins in [`NodeState::Created`]
    pub(crate) fn new(node_type: Arc<NodeType>, name: String) -> Self {
        let behavior = node_type.make_behavior();
        let outputs = NodeOutputs::with_slots(node_type.outputs().len());
        Self {
            name,
            node_type,
            behavior,
            params: ParameterSet::new(),
            state: NodeState::Created,
            enabled: true,
            device: None,
            outputs,
        }
    }

    /// Instance name, unique within the graph
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static node type
    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.node_type
    }

    /// Current lifecycle state
    pub const fn state(&self) -> NodeState {
        self.state
    }

    /// Device the node is bound to after affinity propagation
    pub const fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Whether the executor runs this node
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current output values
    pub fn outputs(&self) -> &NodeOutputs {
        &self.outputs
    }

    /// Shader source paths reported by the behavior
    pub fn shader_paths(&self) -> Vec<String> {
        self.behavior.shader_paths()
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_device(&mut self, device: Option<DeviceId>) {
        self.device = device;
    }

    /// Transition the state machine, rejecting illegal edges
    pub(crate) fn set_state(&mut self, to: NodeState) {
        if self.state == to {
            return;
        }
        if self.state.can_transition(to) {
            log::trace!("node '{}': {:?} -> {to:?}", self.name, self.state);
            self.state = to;
        } else {
            log::warn!(
                "node '{}': illegal transition {:?} -> {to:?} ignored",
                self.name,
                self.state
            );
        }
    }

    /// Reset an errored node back to [`NodeState::Created`]
    pub(crate) fn reset(&mut self) {
        self.set_state(NodeState::Created);
        self.outputs.clear();
    }

    /// Set a parameter, validating against the type's descriptors
    pub(crate) fn set_parameter(
        &mut self,
        name: &str,
        value: ParameterValue,
    ) -> Result<(), GraphError> {
        self.params
            .set(self.node_type.parameters(), &self.name, name, value)
    }

    /// Verify required parameters are present
    pub(crate) fn validate_parameters(&self) -> Result<(), GraphError> {
        self.params
            .validate_required(self.node_type.parameters(), &self.name)
    }

    /// Device id this node introduces, if it is an affinity source
    pub(crate) fn device_source(
        &self,
        services: &GraphContext,
        inputs: &[Vec<NodeResource>],
    ) -> Option<DeviceId> {
        let ctx = self.context(services, inputs);
        self.behavior.device_source(&ctx)
    }

    /// Run the behavior's compile phase
    pub(crate) fn run_compile(
        &mut self,
        services: &GraphContext,
        inputs: &[Vec<NodeResource>],
    ) -> Result<(), NodeError> {
        let ctx = NodeContext {
            services,
            device: self.device,
            instance_name: &self.name,
            descriptors: self.node_type.parameters(),
            values: &self.params,
            inputs,
        };
        self.behavior.compile(&ctx, &mut self.outputs)
    }

    /// Run the behavior's execute phase
    pub(crate) fn run_execute(
        &mut self,
        services: &GraphContext,
        inputs: &[Vec<NodeResource>],
    ) -> Result<(), NodeError> {
        let ctx = NodeContext {
            services,
            device: self.device,
            instance_name: &self.name,
            descriptors: self.node_type.parameters(),
            values: &self.params,
            inputs,
        };
        self.behavior.execute(&ctx, &mut self.outputs)
    }

    /// Run the behavior's cleanup and drop outputs
    pub(crate) fn run_cleanup(&mut self, services: &GraphContext) {
        let ctx = NodeContext {
            services,
            device: self.device,
            instance_name: &self.name,
            descriptors: self.node_type.parameters(),
            values: &self.params,
            inputs: &[],
        };
        self.behavior.cleanup(&ctx);
        self.outputs.clear();
    }

    fn context<'a>(
        &'a self,
        services: &'a GraphContext,
        inputs: &'a [Vec<NodeResource>],
    ) -> NodeContext<'a> {
        NodeContext {
            services,
            device: self.device,
            instance_name: &self.name,
            descriptors: self.node_type.parameters(),
            values: &self.params,
            inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_lifecycle_transitions() {
        use NodeState::*;
        let cycle = [
            (Created, Ready),
            (Ready, Compiled),
            (Compiled, Executing),
            (Executing, Complete),
            (Complete, Compiled),
            (Compiled, Dirty),
            (Dirty, Ready),
        ];
        for (from, to) in cycle {
            assert!(from.can_transition(to), "{from:?} -> {to:?} should be legal");
        }
    }

    #[test]
    fn error_is_terminal_until_reset() {
        use NodeState::*;
        for from in [Created, Ready, Compiled, Executing, Complete, Dirty] {
            assert!(from.can_transition(Error));
        }
        assert!(!Error.can_transition(Compiled));
        assert!(!Error.can_transition(Dirty));
        assert!(Error.can_transition(Created));
    }

    #[test]
    fn illegal_transitions_rejected() {
        use NodeState::*;
        assert!(!Created.can_transition(Executing));
        assert!(!Created.can_transition(Complete));
        assert!(!Dirty.can_transition(Executing));
        assert!(!Complete.can_transition(Executing));
    }
}
