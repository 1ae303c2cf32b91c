//! Node types and the type registry
//!
//! A [`NodeType`] is the static, shared description of a node kind: its
//! slots, its parameters, and a factory producing fresh behavior. Types
//! are registered once under their name and borrowed by every instance.

use crate::graph::node::{NodeInstance, RenderNode};
use crate::graph::parameter::{ParameterDescriptor, ParameterValue};
use crate::graph::slot::{ElementType, SlotDescriptor};
use crate::graph::GraphError;
use std::collections::HashMap;
use std::sync::Arc;

type BehaviorFactory = Box<dyn Fn() -> Box<dyn RenderNode> + Send + Sync>;

/// Static description of a node kind
pub struct NodeType {
    name: String,
    inputs: Vec<SlotDescriptor>,
    outputs: Vec<SlotDescriptor>,
    parameters: Vec<ParameterDescriptor>,
    factory: BehaviorFactory,
}

impl NodeType {
    /// Start building a node type
    pub fn builder(name: &str) -> NodeTypeBuilder {
        NodeTypeBuilder {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input slot descriptors
    pub fn inputs(&self) -> &[SlotDescriptor] {
        &self.inputs
    }

    /// Output slot descriptors
    pub fn outputs(&self) -> &[SlotDescriptor] {
        &self.outputs
    }

    /// Parameter descriptors
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Index of the named output slot
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// Index of the named input slot
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    /// Produce a new instance in the created state
    pub fn instantiate(self: &Arc<Self>, instance_name: &str) -> NodeInstance {
        NodeInstance::new(Arc::clone(self), instance_name.to_string())
    }

    pub(crate) fn make_behavior(&self) -> Box<dyn RenderNode> {
        (self.factory)()
    }
}

impl std::fmt::Debug for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builder for [`NodeType`]
pub struct NodeTypeBuilder {
    name: String,
    inputs: Vec<SlotDescriptor>,
    outputs: Vec<SlotDescriptor>,
    parameters: Vec<ParameterDescriptor>,
}

impl NodeTypeBuilder {
    /// Add a required single input slot
    #[must_use]
    pub fn input(mut self, name: &str, element: ElementType) -> Self {
        self.inputs.push(SlotDescriptor::single(name, element, false));
        self
    }

    /// Add an optional single input slot
    #[must_use]
    pub fn nullable_input(mut self, name: &str, element: ElementType) -> Self {
        self.inputs.push(SlotDescriptor::single(name, element, true));
        self
    }

    /// Add a variadic input slot with a minimum connection count
    #[must_use]
    pub fn variadic_input(mut self, name: &str, element: ElementType, min: usize) -> Self {
        self.inputs.push(SlotDescriptor::variadic(name, element, min));
        self
    }

    /// Add an output slot
    #[must_use]
    pub fn output(mut self, name: &str, element: ElementType) -> Self {
        self.outputs.push(SlotDescriptor::single(name, element, true));
        self
    }

    /// Add a parameter; the declared type is the default's variant
    #[must_use]
    pub fn parameter(mut self, name: &str, default: ParameterValue, required: bool) -> Self {
        self.parameters.push(ParameterDescriptor::new(name, default, required));
        self
    }

    /// Finish with the behavior factory
    pub fn build<F>(self, factory: F) -> Arc<NodeType>
    where
        F: Fn() -> Box<dyn RenderNode> + Send + Sync + 'static,
    {
        Arc::new(NodeType {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            parameters: self.parameters,
            factory: Box::new(factory),
        })
    }
}

/// Registry of node types by name
#[derive(Default)]
pub struct NodeTypeRegistry {
    types: HashMap<String, Arc<NodeType>>,
}

impl NodeTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under its name
    pub fn register(&mut self, node_type: Arc<NodeType>) -> Result<(), GraphError> {
        let name = node_type.name().to_string();
        if self.types.contains_key(&name) {
            return Err(GraphError::DuplicateType { name });
        }
        log::debug!("registered node type '{name}'");
        self.types.insert(name, node_type);
        Ok(())
    }

    /// Look up a type by name
    pub fn get(&self, name: &str) -> Option<&Arc<NodeType>> {
        self.types.get(name)
    }

    /// Registered type names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
