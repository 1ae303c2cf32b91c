//! Graph topology and compilation
//!
//! The graph owns node instances (slotmap storage, registration order
//! preserved) and typed connections. Compilation runs fixed phases:
//! structural validation, topological ordering (Kahn's algorithm with
//! registration-order tie-break), device-affinity propagation, and the
//! per-node compile pass in execution order. Teardown walks the execution
//! order in reverse.

use crate::graph::node::{GraphContext, NodeInstance, NodeState};
use crate::graph::node_type::NodeTypeRegistry;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::NodeResource;
use crate::graph::slot::SlotArity;
use crate::graph::GraphError;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

slotmap::new_key_type! {
    /// Stable handle to a node instance within one graph
    pub struct NodeHandle;
}

/// A directed, typed edge from an output slot to an input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Source node
    pub src: NodeHandle,
    /// Source output slot index
    pub src_slot: usize,
    /// Destination node
    pub dst: NodeHandle,
    /// Destination input slot index
    pub dst_slot: usize,
}

/// The render graph: node instances, connections, execution order
pub struct RenderGraph {
    types: Arc<NodeTypeRegistry>,
    nodes: SlotMap<NodeHandle, NodeInstance>,
    registration: Vec<NodeHandle>,
    names: HashMap<String, NodeHandle>,
    connections: Vec<Connection>,
    execution_order: Vec<NodeHandle>,
    compiled: bool,
    destroyed: bool,
}

impl RenderGraph {
    /// Create an empty graph over the given type registry
    pub fn new(types: Arc<NodeTypeRegistry>) -> Self {
        Self {
            types,
            nodes: SlotMap::with_key(),
            registration: Vec::new(),
            names: HashMap::new(),
            connections: Vec::new(),
            execution_order: Vec::new(),
            compiled: false,
            destroyed: false,
        }
    }

    /// Node type registry this graph instantiates from
    pub fn types(&self) -> &Arc<NodeTypeRegistry> {
        &self.types
    }

    /// Add a node instance of a registered type
    pub fn add_node(&mut self, type_name: &str, instance_name: &str) -> Result<NodeHandle, GraphError> {
        if self.names.contains_key(instance_name) {
            return Err(GraphError::DuplicateInstance { name: instance_name.to_string() });
        }
        let node_type = self
            .types
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownType { name: type_name.to_string() })?
            .clone();

        let instance = node_type.instantiate(instance_name);
        let handle = self.nodes.insert(instance);
        self.registration.push(handle);
        self.names.insert(instance_name.to_string(), handle);
        log::debug!("added node '{instance_name}' of type '{type_name}'");
        Ok(handle)
    }

    /// Connect a source output slot to a destination input slot
    ///
    /// Fails without modifying the graph on slot, type, arity or cycle
    /// violations. Duplicate connections into a variadic input are
    /// permitted and keep call order.
    pub fn connect(
        &mut self,
        src: NodeHandle,
        src_slot: usize,
        dst: NodeHandle,
        dst_slot: usize,
    ) -> Result<(), GraphError> {
        let src_node = self.nodes.get(src).ok_or(GraphError::InvalidHandle)?;
        let dst_node = self.nodes.get(dst).ok_or(GraphError::InvalidHandle)?;

        let src_desc = src_node.node_type().outputs().get(src_slot).ok_or_else(|| {
            GraphError::SlotOutOfRange {
                node: src_node.name().to_string(),
                slot: src_slot,
                is_input: false,
            }
        })?;
        let dst_desc = dst_node.node_type().inputs().get(dst_slot).ok_or_else(|| {
            GraphError::SlotOutOfRange {
                node: dst_node.name().to_string(),
                slot: dst_slot,
                is_input: true,
            }
        })?;

        if src_desc.element != dst_desc.element {
            return Err(GraphError::TypeMismatch {
                src: src_node.name().to_string(),
                src_element: src_desc.element,
                dst: dst_node.name().to_string(),
                dst_element: dst_desc.element,
            });
        }

        if matches!(dst_desc.arity, SlotArity::Single)
            && self.connections.iter().any(|c| c.dst == dst && c.dst_slot == dst_slot)
        {
            return Err(GraphError::InputAlreadyConnected {
                node: dst_node.name().to_string(),
                slot: dst_slot,
            });
        }

        // A self-loop, or any path dst ->* src, would close a cycle.
        if src == dst || self.reachable(dst, src) {
            return Err(GraphError::WouldCycle {
                src: src_node.name().to_string(),
                dst: dst_node.name().to_string(),
            });
        }

        self.connections.push(Connection { src, src_slot, dst, dst_slot });
        Ok(())
    }

    /// Set a node parameter, validating against the type's descriptors
    pub fn set_parameter(
        &mut self,
        handle: NodeHandle,
        name: &str,
        value: ParameterValue,
    ) -> Result<(), GraphError> {
        self.nodes
            .get_mut(handle)
            .ok_or(GraphError::InvalidHandle)?
            .set_parameter(name, value)
    }

    /// Enable or disable a node for frame execution
    pub fn set_enabled(&mut self, handle: NodeHandle, enabled: bool) -> Result<(), GraphError> {
        self.nodes
            .get_mut(handle)
            .ok_or(GraphError::InvalidHandle)?
            .set_enabled(enabled);
        Ok(())
    }

    /// Mark a node and every transitive dependent dirty
    ///
    /// Dirty nodes are recompiled by the next `compile` (the executor
    /// triggers one before the next frame). Does not block.
    pub fn mark_dirty(&mut self, handle: NodeHandle) -> Result<(), GraphError> {
        if !self.nodes.contains_key(handle) {
            return Err(GraphError::InvalidHandle);
        }
        let affected = self.downstream_of(handle);
        for key in affected {
            let node = &mut self.nodes[key];
            if node.state().can_transition(NodeState::Dirty) {
                node.set_state(NodeState::Dirty);
            }
        }
        Ok(())
    }

    /// Reset an errored node back to the created state
    pub fn reset_node(&mut self, handle: NodeHandle) -> Result<(), GraphError> {
        self.nodes
            .get_mut(handle)
            .ok_or(GraphError::InvalidHandle)?
            .reset();
        Ok(())
    }

    /// Whether any node is marked dirty
    pub fn has_dirty(&self) -> bool {
        self.nodes.values().any(|n| n.state() == NodeState::Dirty)
    }

    /// Whether a compile pass would build anything
    ///
    /// True while any node is dirty or has never been compiled (freshly
    /// added, or reset out of the error state).
    pub fn needs_compile(&self) -> bool {
        self.nodes
            .values()
            .any(|n| matches!(n.state(), NodeState::Dirty | NodeState::Created))
    }

    /// Whether a successful compile has run
    pub const fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// The compiled execution order
    pub fn execution_order(&self) -> &[NodeHandle] {
        &self.execution_order
    }

    /// Look up a node handle by instance name
    pub fn handle_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).copied()
    }

    /// Borrow a node instance
    pub fn node(&self, handle: NodeHandle) -> Option<&NodeInstance> {
        self.nodes.get(handle)
    }

    /// Current state of a node
    pub fn node_state(&self, handle: NodeHandle) -> Option<NodeState> {
        self.nodes.get(handle).map(NodeInstance::state)
    }

    /// Number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Compile the graph: validate, order, propagate affinity, build nodes
    ///
    /// Safe to call on a compiled graph; only dirty or new nodes rebuild.
    /// Validation failures abort before any state changes; a node compile
    /// failure puts that node into the error state and aborts, leaving the
    /// rest untouched.
    pub fn compile(&mut self, ctx: &GraphContext) -> Result<(), GraphError> {
        // Phase 1: structural validation, no mutation.
        self.validate()?;

        // Phase 2: execution order.
        let order = self.topological_order()?;

        // Remember which nodes need a rebuild before transitioning states.
        let dirty: HashSet<NodeHandle> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.state() == NodeState::Dirty)
            .map(|(k, _)| k)
            .collect();

        for &key in &order {
            let state = self.nodes[key].state();
            if matches!(state, NodeState::Created | NodeState::Dirty) {
                self.nodes[key].set_state(NodeState::Ready);
            }
        }

        // Phase 3: device affinity, sources first then inheritance.
        for &key in &order {
            let inputs = self.gather_inputs(key);
            let source = self.nodes[key].device_source(ctx, &inputs);
            if let Some(device) = source {
                self.nodes[key].set_device(Some(device));
            } else if self.nodes[key].device().is_none() {
                let inherited = self
                    .connections
                    .iter()
                    .filter(|c| c.dst == key)
                    .find_map(|c| self.nodes[c.src].device());
                self.nodes[key].set_device(inherited);
            }
        }

        // Retiring a dirty node's resources must not race in-flight GPU
        // work; wait for idle on every device touched by the rebuild.
        let mut rebuild_devices: Vec<_> =
            dirty.iter().filter_map(|&k| self.nodes[k].device()).collect();
        rebuild_devices.sort_unstable();
        rebuild_devices.dedup();
        for device in rebuild_devices {
            if let Err(e) = ctx.facade.wait_idle(device) {
                log::error!("wait_idle failed before recompile on {device}: {e}");
            }
        }

        // Phase 4: per-node resource build in execution order.
        for &key in &order {
            let state = self.nodes[key].state();
            match state {
                NodeState::Ready => {}
                // Untouched, already built, or awaiting explicit reset.
                _ => continue,
            }

            if dirty.contains(&key) {
                // Recompile replaces the node's resources wholesale.
                self.nodes[key].run_cleanup(ctx);
            }

            let inputs = self.gather_inputs(key);
            let name = self.nodes[key].name().to_string();
            match self.nodes[key].run_compile(ctx, &inputs) {
                Ok(()) => self.nodes[key].set_state(NodeState::Compiled),
                Err(e) => {
                    self.nodes[key].set_state(NodeState::Error);
                    return Err(GraphError::NodeCompileFailed { node: name, cause: e.to_string() });
                }
            }
        }

        self.execution_order = order;
        self.compiled = true;
        log::debug!(
            "graph compiled: {} nodes, {} connections",
            self.nodes.len(),
            self.connections.len()
        );
        Ok(())
    }

    /// Tear the graph down: wait for idle, clean up in reverse order
    ///
    /// Each node's cleanup runs exactly once; repeated calls are no-ops.
    pub fn destroy(&mut self, ctx: &GraphContext) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let mut devices: Vec<_> = self.nodes.values().filter_map(NodeInstance::device).collect();
        devices.sort_unstable();
        devices.dedup();
        for device in devices {
            if let Err(e) = ctx.facade.wait_idle(device) {
                log::error!("wait_idle failed during graph teardown: {e}");
            }
        }

        let order: Vec<NodeHandle> = if self.execution_order.is_empty() {
            self.registration.clone()
        } else {
            self.execution_order.clone()
        };
        for &key in order.iter().rev() {
            if let Some(node) = self.nodes.get_mut(key) {
                log::trace!("cleaning up node '{}'", node.name());
                node.run_cleanup(ctx);
                node.set_state(NodeState::Created);
            }
        }
        self.compiled = false;
        self.execution_order.clear();
    }

    /// Gather the resources connected into each input slot of a node
    ///
    /// Consumers receive clones of the carriers; the producing node keeps
    /// sole ownership of the underlying objects.
    pub(crate) fn gather_inputs(&self, handle: NodeHandle) -> Vec<Vec<NodeResource>> {
        let slot_count = self.nodes[handle].node_type().inputs().len();
        let mut inputs: Vec<Vec<NodeResource>> = (0..slot_count).map(|_| Vec::new()).collect();
        for connection in &self.connections {
            if connection.dst != handle {
                continue;
            }
            if let Some(resource) = self.nodes[connection.src].outputs().get(connection.src_slot) {
                inputs[connection.dst_slot].push(resource.clone());
            }
        }
        inputs
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(handle)
    }

    /// Handles of nodes whose state matches the predicate, registration order
    pub(crate) fn nodes_where(&self, predicate: impl Fn(&NodeInstance) -> bool) -> Vec<NodeHandle> {
        self.registration
            .iter()
            .copied()
            .filter(|&k| self.nodes.get(k).is_some_and(&predicate))
            .collect()
    }

    fn validate(&self) -> Result<(), GraphError> {
        for &key in &self.registration {
            let node = &self.nodes[key];
            for (slot, desc) in node.node_type().inputs().iter().enumerate() {
                let inbound = self
                    .connections
                    .iter()
                    .filter(|c| c.dst == key && c.dst_slot == slot)
                    .count();
                match desc.arity {
                    SlotArity::Single => {
                        if inbound == 0 && !desc.nullable {
                            return Err(GraphError::UnconnectedRequiredInput {
                                node: node.name().to_string(),
                                slot: desc.name.clone(),
                            });
                        }
                    }
                    SlotArity::Variadic { min } => {
                        if inbound < min {
                            return Err(GraphError::VariadicUnderflow {
                                node: node.name().to_string(),
                                slot: desc.name.clone(),
                                min,
                                got: inbound,
                            });
                        }
                    }
                }
            }
            node.validate_parameters()?;
        }
        Ok(())
    }

    /// Kahn's algorithm; ties broken by registration order
    fn topological_order(&self) -> Result<Vec<NodeHandle>, GraphError> {
        let mut indegree: SecondaryMap<NodeHandle, usize> = SecondaryMap::new();
        for &key in &self.registration {
            indegree.insert(key, 0);
        }
        for connection in &self.connections {
            indegree[connection.dst] += 1;
        }

        let mut order = Vec::with_capacity(self.registration.len());
        let mut emitted: HashSet<NodeHandle> = HashSet::new();

        while order.len() < self.registration.len() {
            let next = self
                .registration
                .iter()
                .copied()
                .find(|&k| !emitted.contains(&k) && indegree[k] == 0);

            let Some(key) = next else {
                // Everything remaining sits on a cycle.
                let remaining = self
                    .registration
                    .iter()
                    .copied()
                    .find(|k| !emitted.contains(k))
                    .map(|k| self.nodes[k].name().to_string())
                    .unwrap_or_default();
                return Err(GraphError::WouldCycle { src: remaining.clone(), dst: remaining });
            };

            emitted.insert(key);
            order.push(key);
            for connection in &self.connections {
                if connection.src == key {
                    indegree[connection.dst] -= 1;
                }
            }
        }

        Ok(order)
    }

    /// Whether `to` is reachable from `from` along existing connections
    fn reachable(&self, from: NodeHandle, to: NodeHandle) -> bool {
        let mut stack = vec![from];
        let mut visited: HashSet<NodeHandle> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for connection in &self.connections {
                if connection.src == current {
                    stack.push(connection.dst);
                }
            }
        }
        false
    }

    /// A node plus every transitive dependent, breadth-first
    fn downstream_of(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut result = Vec::new();
        let mut visited: HashSet<NodeHandle> = HashSet::new();
        let mut queue = std::collections::VecDeque::from([handle]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            for connection in &self.connections {
                if connection.src == current {
                    queue.push_back(connection.dst);
                }
            }
        }
        result
    }
}
