//! Concrete resource cachers
//!
//! One cacher per resource kind. Device-dependent cachers hold their
//! device id and destroy native handles through the facade on `cleanup`;
//! the shader-bytecode cacher is device-independent and holds no GPU
//! handles at all. Every key type hashes exactly the fields that change
//! the created object.

use crate::gpu::{
    DeviceId, GpuFacade, GraphicsPipelineDesc, ImageDesc, ImageViewDesc, PipelineLayoutDesc,
    RenderPassDesc, SamplerDesc, ShaderArtifact, ShaderBytecodeProvider, ShaderStage,
    ShaderStageDesc,
};
use crate::gpu::{DescriptorBindingReflection, ImageDataProvider};
use crate::resources::cacher::{CacheStats, ResourceCacher, TypedCache};
use crate::resources::{ResourceError, ResourceTag};
use ash::vk;
use std::any::Any;
use std::sync::Arc;

fn creation_failed(kind: ResourceTag) -> impl Fn(crate::gpu::GpuError) -> ResourceError {
    move |e| ResourceError::CreationFailed { kind, cause: e.to_string() }
}

// --- shader bytecode (device-independent) ---

/// Key for compiled shader bytecode: sources, entry point and stage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSourceKey {
    /// Source file paths, in include order
    pub paths: Vec<String>,
    /// Entry point name
    pub entry: String,
    /// Pipeline stage
    pub stage: ShaderStage,
}

/// Device-independent cache of compiled SPIR-V plus reflection
pub struct ShaderBytecodeCache {
    provider: Arc<dyn ShaderBytecodeProvider>,
    cache: TypedCache<ShaderSourceKey, ShaderArtifact>,
}

impl ShaderBytecodeCache {
    /// Create a cache backed by the host's shader compiler
    pub fn new(provider: Arc<dyn ShaderBytecodeProvider>) -> Self {
        Self { provider, cache: TypedCache::new() }
    }

    /// Return the compiled artifact, compiling on a miss
    pub fn get_or_create(
        &self,
        paths: &[String],
        entry: &str,
        stage: ShaderStage,
    ) -> Result<Arc<ShaderArtifact>, ResourceError> {
        let key = ShaderSourceKey {
            paths: paths.to_vec(),
            entry: entry.to_string(),
            stage,
        };
        self.cache.get_or_create(&key, |k| {
            self.provider
                .produce(&k.paths, &k.entry, k.stage)
                .map_err(|e| ResourceError::CreationFailed {
                    kind: ResourceTag::ShaderBytecode,
                    cause: e.to_string(),
                })
        })
    }

    /// Drop every artifact whose source set contains `path`
    ///
    /// Returns the number of evicted entries. Called on shader reload so
    /// the next compile of a dependent pipeline re-requests bytecode.
    pub fn evict_path(&self, path: &str) -> usize {
        let evicted = self.cache.evict_where(|key| key.paths.iter().any(|p| p == path));
        if !evicted.is_empty() {
            log::debug!("evicted {} bytecode entries for '{path}'", evicted.len());
        }
        evicted.len()
    }
}

impl ResourceCacher for ShaderBytecodeCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::ShaderBytecode
    }

    fn name(&self) -> &str {
        "shader-bytecode"
    }

    fn cleanup(&self) {
        // No native handles; draining the map is the whole cleanup.
        self.cache.drain();
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- shader modules ---

/// Key for a shader module: the SPIR-V words
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderModuleKey {
    /// SPIR-V words
    pub words: Arc<Vec<u32>>,
}

/// A cached shader module with its device back-reference
#[derive(Debug)]
pub struct CachedShaderModule {
    /// Owning device
    pub device: DeviceId,
    /// Module handle
    pub module: vk::ShaderModule,
}

/// Per-device cache of shader modules keyed by bytecode content
pub struct ShaderModuleCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<ShaderModuleKey, CachedShaderModule>,
}

impl ShaderModuleCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached module for the bytecode, creating on a miss
    pub fn get_or_create(
        &self,
        words: Arc<Vec<u32>>,
    ) -> Result<Arc<CachedShaderModule>, ResourceError> {
        let device = self.device;
        self.cache.get_or_create(&ShaderModuleKey { words }, |k| {
            self.facade
                .create_shader_module(device, &k.words)
                .map(|module| CachedShaderModule { device, module })
                .map_err(creation_failed(ResourceTag::ShaderModule))
        })
    }
}

impl ResourceCacher for ShaderModuleCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::ShaderModule
    }

    fn name(&self) -> &str {
        "shader-module"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_shader_module(entry.device, entry.module);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- descriptor set layouts ---

/// Key for a descriptor set layout: its reflected bindings
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutKey {
    /// Bindings, binding-index order
    pub bindings: Vec<DescriptorBindingReflection>,
}

/// A cached descriptor set layout
#[derive(Debug)]
pub struct CachedDescriptorSetLayout {
    /// Owning device
    pub device: DeviceId,
    /// Layout handle
    pub layout: vk::DescriptorSetLayout,
}

/// Per-device cache of descriptor set layouts keyed by binding reflection
pub struct DescriptorSetLayoutCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<DescriptorSetLayoutKey, CachedDescriptorSetLayout>,
}

impl DescriptorSetLayoutCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached layout for the bindings, creating on a miss
    pub fn get_or_create(
        &self,
        bindings: &[DescriptorBindingReflection],
    ) -> Result<Arc<CachedDescriptorSetLayout>, ResourceError> {
        let device = self.device;
        let key = DescriptorSetLayoutKey { bindings: bindings.to_vec() };
        self.cache.get_or_create(&key, |k| {
            self.facade
                .create_descriptor_set_layout(device, &k.bindings)
                .map(|layout| CachedDescriptorSetLayout { device, layout })
                .map_err(creation_failed(ResourceTag::DescriptorSetLayout))
        })
    }
}

impl ResourceCacher for DescriptorSetLayoutCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::DescriptorSetLayout
    }

    fn name(&self) -> &str {
        "descriptor-set-layout"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_descriptor_set_layout(entry.device, entry.layout);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- pipeline layouts ---

/// A cached pipeline layout
#[derive(Debug)]
pub struct CachedPipelineLayout {
    /// Owning device
    pub device: DeviceId,
    /// Layout handle
    pub layout: vk::PipelineLayout,
}

/// Per-device cache of pipeline layouts
///
/// Keyed by the full [`PipelineLayoutDesc`]: set layouts in set order plus
/// push-constant ranges.
pub struct PipelineLayoutCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<PipelineLayoutDesc, CachedPipelineLayout>,
}

impl PipelineLayoutCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached layout for the description, creating on a miss
    pub fn get_or_create(
        &self,
        desc: &PipelineLayoutDesc,
    ) -> Result<Arc<CachedPipelineLayout>, ResourceError> {
        let device = self.device;
        self.cache.get_or_create(desc, |k| {
            self.facade
                .create_pipeline_layout(device, k)
                .map(|layout| CachedPipelineLayout { device, layout })
                .map_err(creation_failed(ResourceTag::PipelineLayout))
        })
    }
}

impl ResourceCacher for PipelineLayoutCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::PipelineLayout
    }

    fn name(&self) -> &str {
        "pipeline-layout"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_pipeline_layout(entry.device, entry.layout);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- graphics pipelines ---

/// A cached pipeline
#[derive(Debug)]
pub struct CachedPipeline {
    /// Owning device
    pub device: DeviceId,
    /// Pipeline handle
    pub pipeline: vk::Pipeline,
}

/// Per-device cache of graphics pipelines
///
/// The key is the complete [`GraphicsPipelineDesc`]; any field that would
/// produce a different GPU object (layout, stage modules, vertex layout,
/// raster/depth/blend state, render pass, subpass) distinguishes entries.
pub struct GraphicsPipelineCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<GraphicsPipelineDesc, CachedPipeline>,
}

impl GraphicsPipelineCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached pipeline for the description, creating on a miss
    pub fn get_or_create(
        &self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Arc<CachedPipeline>, ResourceError> {
        let device = self.device;
        self.cache.get_or_create(desc, |k| {
            self.facade
                .create_graphics_pipeline(device, k)
                .map(|pipeline| CachedPipeline { device, pipeline })
                .map_err(creation_failed(ResourceTag::GraphicsPipeline))
        })
    }
}

impl ResourceCacher for GraphicsPipelineCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::GraphicsPipeline
    }

    fn name(&self) -> &str {
        "graphics-pipeline"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_pipeline(entry.device, entry.pipeline);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- compute pipelines ---

/// Key for a compute pipeline: layout plus the compute stage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineKey {
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
    /// Compute stage description
    pub stage: ShaderStageDesc,
}

/// Per-device cache of compute pipelines
pub struct ComputePipelineCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<ComputePipelineKey, CachedPipeline>,
}

impl ComputePipelineCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached pipeline for the key, creating on a miss
    pub fn get_or_create(
        &self,
        key: &ComputePipelineKey,
    ) -> Result<Arc<CachedPipeline>, ResourceError> {
        let device = self.device;
        self.cache.get_or_create(key, |k| {
            self.facade
                .create_compute_pipeline(device, k.layout, &k.stage)
                .map(|pipeline| CachedPipeline { device, pipeline })
                .map_err(creation_failed(ResourceTag::ComputePipeline))
        })
    }
}

impl ResourceCacher for ComputePipelineCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::ComputePipeline
    }

    fn name(&self) -> &str {
        "compute-pipeline"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_pipeline(entry.device, entry.pipeline);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- render passes ---

/// A cached render pass
#[derive(Debug)]
pub struct CachedRenderPass {
    /// Owning device
    pub device: DeviceId,
    /// Render pass handle
    pub render_pass: vk::RenderPass,
}

/// Per-device cache of render passes keyed by attachment description
pub struct RenderPassCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<RenderPassDesc, CachedRenderPass>,
}

impl RenderPassCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached render pass for the description, creating on a miss
    pub fn get_or_create(
        &self,
        desc: &RenderPassDesc,
    ) -> Result<Arc<CachedRenderPass>, ResourceError> {
        let device = self.device;
        self.cache.get_or_create(desc, |k| {
            self.facade
                .create_render_pass(device, k)
                .map(|render_pass| CachedRenderPass { device, render_pass })
                .map_err(creation_failed(ResourceTag::RenderPass))
        })
    }
}

impl ResourceCacher for RenderPassCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::RenderPass
    }

    fn name(&self) -> &str {
        "render-pass"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_render_pass(entry.device, entry.render_pass);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- samplers ---

/// A cached sampler
#[derive(Debug)]
pub struct CachedSampler {
    /// Owning device
    pub device: DeviceId,
    /// Sampler handle
    pub sampler: vk::Sampler,
}

/// Per-device cache of samplers keyed by filter/address state
pub struct SamplerCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    cache: TypedCache<SamplerDesc, CachedSampler>,
}

impl SamplerCache {
    /// Create a cache for `device`
    pub fn new(device: DeviceId, facade: Arc<dyn GpuFacade>) -> Self {
        Self { device, facade, cache: TypedCache::new() }
    }

    /// Return the cached sampler for the description, creating on a miss
    pub fn get_or_create(&self, desc: &SamplerDesc) -> Result<Arc<CachedSampler>, ResourceError> {
        let device = self.device;
        self.cache.get_or_create(desc, |k| {
            self.facade
                .create_sampler(device, k)
                .map(|sampler| CachedSampler { device, sampler })
                .map_err(creation_failed(ResourceTag::Sampler))
        })
    }
}

impl ResourceCacher for SamplerCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::Sampler
    }

    fn name(&self) -> &str {
        "sampler"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_sampler(entry.device, entry.sampler);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// --- textures ---

/// Key for a texture: its source path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    /// Image file path
    pub path: String,
}

/// A cached texture: image, view and dimensions
#[derive(Debug)]
pub struct CachedTexture {
    /// Owning device
    pub device: DeviceId,
    /// Image handle
    pub image: vk::Image,
    /// Sampled view over the image
    pub view: vk::ImageView,
    /// Texel extent
    pub extent: vk::Extent2D,
    /// Mip level count
    pub mip_levels: u32,
}

/// Per-device cache of textures loaded through the image-data provider
pub struct TextureCache {
    device: DeviceId,
    facade: Arc<dyn GpuFacade>,
    provider: Arc<dyn ImageDataProvider>,
    cache: TypedCache<TextureKey, CachedTexture>,
}

impl TextureCache {
    /// Create a cache for `device` backed by the host's image loader
    pub fn new(
        device: DeviceId,
        facade: Arc<dyn GpuFacade>,
        provider: Arc<dyn ImageDataProvider>,
    ) -> Self {
        Self { device, facade, provider, cache: TypedCache::new() }
    }

    /// Return the cached texture for `path`, loading and uploading on a miss
    pub fn get_or_create(&self, path: &str) -> Result<Arc<CachedTexture>, ResourceError> {
        let device = self.device;
        let key = TextureKey { path: path.to_string() };
        self.cache.get_or_create(&key, |k| {
            let failed = creation_failed(ResourceTag::Texture);
            let data = self.provider.load(&k.path).map_err(|e| {
                ResourceError::CreationFailed { kind: ResourceTag::Texture, cause: e.to_string() }
            })?;

            let desc = ImageDesc {
                extent: vk::Extent2D { width: data.width, height: data.height },
                format: data.format,
                usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
                mip_levels: data.mip_count,
            };
            let image = self.facade.create_image(device, &desc).map_err(&failed)?;

            // Partial construction releases intermediates before returning.
            if let Err(e) = self.facade.upload_image_data(device, image, &desc, &data.bytes) {
                self.facade.destroy_image(device, image);
                return Err(failed(e));
            }

            let view_desc = ImageViewDesc {
                image,
                format: data.format,
                aspect: vk::ImageAspectFlags::COLOR,
                mip_levels: data.mip_count,
            };
            let view = match self.facade.create_image_view(device, &view_desc) {
                Ok(view) => view,
                Err(e) => {
                    self.facade.destroy_image(device, image);
                    return Err(failed(e));
                }
            };

            Ok(CachedTexture { device, image, view, extent: desc.extent, mip_levels: data.mip_count })
        })
    }
}

impl ResourceCacher for TextureCache {
    fn tag(&self) -> ResourceTag {
        ResourceTag::Texture
    }

    fn name(&self) -> &str {
        "texture"
    }

    fn cleanup(&self) {
        for entry in self.cache.drain() {
            self.facade.destroy_image_view(entry.device, entry.view);
            self.facade.destroy_image(entry.device, entry.image);
        }
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
