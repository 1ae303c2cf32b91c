//! Render graph
//!
//! A directed, type-checked graph of rendering nodes. Node types describe
//! slots and parameters at registration time; the graph owns node
//! instances and typed connections, validates structure, compiles to a
//! topological execution order, and executes once per frame under the
//! [`FrameExecutor`].

pub mod executor;
pub mod graph;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod parameter;
pub mod resource;
pub mod slot;

pub use executor::{FrameError, FrameExecutor, FrameOutcome};
pub use graph::{Connection, NodeHandle, RenderGraph};
pub use node::{GraphContext, NodeContext, NodeError, NodeInstance, NodeOutputs, NodeState, RenderNode};
pub use node_type::{NodeType, NodeTypeBuilder, NodeTypeRegistry};
pub use parameter::{ParameterDescriptor, ParameterSet, ParameterType, ParameterValue};
pub use resource::{
    CommandBufferSet, FrameSyncSet, FramebufferSet, NodeResource, ResourceValue, SwapchainState,
    WindowRef,
};
pub use slot::{ElementType, SlotArity, SlotDescriptor};

use thiserror::Error;

/// Structural and configuration errors surfaced by the graph
///
/// Validation and configuration failures abort the offending call and
/// leave the graph in its pre-call state.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The named node type is not registered
    #[error("unknown node type '{name}'")]
    UnknownType {
        /// Requested type name
        name: String,
    },

    /// A node type with this name is already registered
    #[error("node type '{name}' already registered")]
    DuplicateType {
        /// Conflicting type name
        name: String,
    },

    /// A node instance with this name already exists in the graph
    #[error("node instance '{name}' already exists")]
    DuplicateInstance {
        /// Conflicting instance name
        name: String,
    },

    /// The node handle does not refer to a live node of this graph
    #[error("node handle is stale or belongs to another graph")]
    InvalidHandle,

    /// A slot index is outside the node type's slot list
    #[error("{} slot {slot} out of range for node '{node}'", if *.is_input { "input" } else { "output" })]
    SlotOutOfRange {
        /// Node instance name
        node: String,
        /// Offending slot index
        slot: usize,
        /// Whether the index addressed the input list
        is_input: bool,
    },

    /// Source and destination slot element types differ
    #[error("cannot connect '{src}' ({src_element}) to '{dst}' ({dst_element})")]
    TypeMismatch {
        /// Source instance name
        src: String,
        /// Source slot element type
        src_element: ElementType,
        /// Destination instance name
        dst: String,
        /// Destination slot element type
        dst_element: ElementType,
    },

    /// The destination input is single-arity and already connected
    #[error("input slot {slot} of '{node}' is already connected")]
    InputAlreadyConnected {
        /// Destination instance name
        node: String,
        /// Destination slot index
        slot: usize,
    },

    /// The connection would create a directed cycle
    #[error("connection from '{src}' to '{dst}' would create a cycle")]
    WouldCycle {
        /// Source instance name
        src: String,
        /// Destination instance name
        dst: String,
    },

    /// A non-nullable input has no inbound connection
    #[error("required input slot '{slot}' of '{node}' is unconnected")]
    UnconnectedRequiredInput {
        /// Node instance name
        node: String,
        /// Slot name
        slot: String,
    },

    /// A variadic input has fewer connections than its minimum
    #[error("variadic input '{slot}' of '{node}' has {got} connections, needs at least {min}")]
    VariadicUnderflow {
        /// Node instance name
        node: String,
        /// Slot name
        slot: String,
        /// Required minimum
        min: usize,
        /// Actual inbound count
        got: usize,
    },

    /// A parameter value's variant does not match the declared type
    #[error("parameter '{name}' expects {expected:?}, got {got:?}")]
    ParameterTypeMismatch {
        /// Parameter name
        name: String,
        /// Declared type
        expected: ParameterType,
        /// Supplied variant
        got: ParameterType,
    },

    /// A required parameter was never set
    #[error("required parameter '{name}' of '{node}' is unset")]
    ParameterMissing {
        /// Node instance name
        node: String,
        /// Parameter name
        name: String,
    },

    /// The node type declares no such parameter
    #[error("node '{node}' has no parameter '{name}'")]
    UnknownParameter {
        /// Node instance name
        node: String,
        /// Parameter name
        name: String,
    },

    /// A parameter value is of the right type but semantically invalid
    #[error("invalid value for parameter '{name}' of '{node}': {reason}")]
    InvalidParameterValue {
        /// Node instance name
        node: String,
        /// Parameter name
        name: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A node's compile phase failed; the node is now in the error state
    #[error("node '{node}' failed to compile: {cause}")]
    NodeCompileFailed {
        /// Node instance name
        node: String,
        /// Underlying failure
        cause: String,
    },
}
