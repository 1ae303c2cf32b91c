//! Shader-bytecode provider contract
//!
//! The engine consumes compiled SPIR-V plus reflection metadata; compiling
//! shader source is the host's concern. Reflection carries everything the
//! pipeline cachers need to build layouts, plus a content hash of the
//! descriptor interface so a hot-reload that preserves the interface can
//! skip layout rebuilds.

use crate::foundation::hash::content_hash;
use crate::gpu::facade::PushConstantRangeDesc;
use ash::vk;
use std::sync::Arc;
use thiserror::Error;

/// Shader compilation failure reported by the provider
#[derive(Error, Debug, Clone)]
#[error("shader '{path}' failed to compile: {message}")]
pub struct ShaderProviderError {
    /// Source path that failed
    pub path: String,
    /// Provider-specific diagnostic
    pub message: String,
}

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
    /// Compute stage
    Compute,
}

impl ShaderStage {
    /// Corresponding Vulkan stage flag
    pub const fn flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

/// One reflected descriptor binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorBindingReflection {
    /// Binding index within the set
    pub binding: u32,
    /// Descriptor type
    pub ty: vk::DescriptorType,
    /// Array element count
    pub count: u32,
    /// Stages that access the binding
    pub stages: vk::ShaderStageFlags,
    /// Name in the shader source
    pub name: String,
}

/// One reflected descriptor set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetReflection {
    /// Set index
    pub set: u32,
    /// Bindings within the set, binding-index order
    pub bindings: Vec<DescriptorBindingReflection>,
}

/// One reflected vertex input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInputReflection {
    /// Shader input location
    pub location: u32,
    /// Attribute format
    pub format: vk::Format,
}

/// Reflection metadata for a compiled shader
#[derive(Debug, Clone, Default)]
pub struct ShaderReflection {
    /// Descriptor sets, set-index order
    pub descriptor_sets: Vec<DescriptorSetReflection>,
    /// Push constant ranges
    pub push_constants: Vec<PushConstantRangeDesc>,
    /// Vertex inputs (vertex stage only)
    pub vertex_inputs: Vec<VertexInputReflection>,
    /// Content hash over the descriptor interface
    pub interface_hash: u64,
}

impl ShaderReflection {
    /// Compute the descriptor-interface hash from sets and push constants
    ///
    /// Two reflections with equal interface hashes bind identically, so a
    /// reload between them does not invalidate pipeline layouts.
    pub fn compute_interface_hash(&mut self) {
        self.interface_hash = content_hash(&(&self.descriptor_sets, &self.push_constants));
    }
}

/// A compiled shader with its reflection
#[derive(Debug, Clone)]
pub struct ShaderArtifact {
    /// SPIR-V words
    pub words: Arc<Vec<u32>>,
    /// Reflection metadata
    pub reflection: ShaderReflection,
}

/// Shader-bytecode provider implemented by the host
pub trait ShaderBytecodeProvider: Send + Sync {
    /// Produce compiled SPIR-V and reflection for the given sources
    fn produce(
        &self,
        source_paths: &[String],
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<ShaderArtifact, ShaderProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_hash_tracks_descriptor_layout() {
        let binding = DescriptorBindingReflection {
            binding: 0,
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            count: 1,
            stages: vk::ShaderStageFlags::VERTEX,
            name: "camera".to_string(),
        };

        let mut a = ShaderReflection {
            descriptor_sets: vec![DescriptorSetReflection { set: 0, bindings: vec![binding.clone()] }],
            ..ShaderReflection::default()
        };
        a.compute_interface_hash();

        // A rename changes the hash; vertex inputs do not take part.
        let mut b = a.clone();
        b.vertex_inputs.push(VertexInputReflection {
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
        });
        b.compute_interface_hash();
        assert_eq!(a.interface_hash, b.interface_hash);

        let mut c = a.clone();
        c.descriptor_sets[0].bindings[0].name = "view".to_string();
        c.compute_interface_hash();
        assert_ne!(a.interface_hash, c.interface_hash);
    }
}
