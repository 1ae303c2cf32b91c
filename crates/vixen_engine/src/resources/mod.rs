//! Typed resource cache
//!
//! Expensive GPU objects (shader modules, pipelines, layouts, render
//! passes, textures) are deduplicated by a 64-bit content hash of their
//! creation parameters. Each resource kind has its own cacher; the
//! [`CacheRegistry`] partitions cachers into per-device and
//! device-independent sets and drives their polymorphic cleanup.

mod cacher;
mod caches;
mod registry;

pub use cacher::{CacheStats, ResourceCacher, TypedCache};
pub use caches::{
    CachedDescriptorSetLayout, CachedPipeline, CachedPipelineLayout, CachedRenderPass,
    CachedSampler, CachedShaderModule, CachedTexture, ComputePipelineCache, ComputePipelineKey,
    DescriptorSetLayoutCache, DescriptorSetLayoutKey, GraphicsPipelineCache, PipelineLayoutCache,
    RenderPassCache, SamplerCache, ShaderBytecodeCache, ShaderModuleCache, ShaderModuleKey,
    ShaderSourceKey, TextureCache, TextureKey,
};
pub use registry::{CacheRegistry, RegistryStats};

use thiserror::Error;

/// Canonical identifier for a cached resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceTag {
    /// Compiled SPIR-V plus reflection (device-independent)
    ShaderBytecode,
    /// Shader modules
    ShaderModule,
    /// Descriptor set layouts
    DescriptorSetLayout,
    /// Pipeline layouts
    PipelineLayout,
    /// Graphics pipelines
    GraphicsPipeline,
    /// Compute pipelines
    ComputePipeline,
    /// Render passes
    RenderPass,
    /// Samplers
    Sampler,
    /// Textures (image + view + upload)
    Texture,
}

impl std::fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ShaderBytecode => "shader-bytecode",
            Self::ShaderModule => "shader-module",
            Self::DescriptorSetLayout => "descriptor-set-layout",
            Self::PipelineLayout => "pipeline-layout",
            Self::GraphicsPipeline => "graphics-pipeline",
            Self::ComputePipeline => "compute-pipeline",
            Self::RenderPass => "render-pass",
            Self::Sampler => "sampler",
            Self::Texture => "texture",
        };
        f.write_str(name)
    }
}

/// Resource cache errors
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A cacher for this kind already exists in the targeted slot
    #[error("cacher for {tag} already registered{}", slot_suffix(.device))]
    AlreadyRegistered {
        /// Resource kind
        tag: ResourceTag,
        /// Device slot, `None` for the global map
        device: Option<crate::gpu::DeviceId>,
    },

    /// No cacher of this kind is registered in the targeted slot
    #[error("no cacher registered for {tag}{}", slot_suffix(.device))]
    NotRegistered {
        /// Resource kind
        tag: ResourceTag,
        /// Device slot, `None` for the global map
        device: Option<crate::gpu::DeviceId>,
    },

    /// The kind is device-dependent but no device was given
    #[error("cacher for {tag} is device-dependent; a device is required")]
    DeviceRequired {
        /// Resource kind
        tag: ResourceTag,
    },

    /// Creating the underlying resource failed
    ///
    /// No partial entry remains in the cache; intermediates are released
    /// before the error is returned.
    #[error("failed to create {kind} resource: {cause}")]
    CreationFailed {
        /// Resource kind
        kind: ResourceTag,
        /// Underlying failure
        cause: String,
    },
}

fn slot_suffix(device: &Option<crate::gpu::DeviceId>) -> String {
    device.map_or_else(String::new, |d| format!(" for {d}"))
}
