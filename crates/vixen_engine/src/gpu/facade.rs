//! GPU-API facade
//!
//! Capability contract the host implements over its Vulkan layer. The
//! operation set mirrors what the built-in node types and cachers need:
//! swapchain lifecycle, object create/destroy pairs, command recording
//! verbs, queue submission and presentation. All handles are `ash::vk`
//! types; descriptor structs below carry only hash-friendly state so they
//! can double as cache-key components.

use ash::vk;
use thiserror::Error;

/// Opaque identifier for a logical device owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u64);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Opaque identifier for a window owned by the host
///
/// The host's windowing layer keeps the raw OS handle; the engine core
/// only routes this id back into `create_swapchain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// A facade operation failure with the Vulkan result code
#[derive(Error, Debug, Clone)]
#[error("GPU operation '{op}' failed: {code:?}")]
pub struct GpuError {
    /// Name of the facade operation that failed
    pub op: &'static str,
    /// Raw Vulkan result code reported by the host
    pub code: vk::Result,
}

impl GpuError {
    /// Create an error for the named operation
    pub const fn new(op: &'static str, code: vk::Result) -> Self {
        Self { op, code }
    }

    /// Whether this error indicates a lost device
    pub fn is_device_lost(&self) -> bool {
        self.code == vk::Result::ERROR_DEVICE_LOST
    }
}

/// Result type for facade operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Swapchain creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainDesc {
    /// Requested image extent (clamped by the host to surface limits)
    pub extent: vk::Extent2D,
    /// Requested surface format
    pub format: vk::Format,
    /// Requested presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Minimum image count
    pub image_count: u32,
}

/// A created swapchain with its image list
#[derive(Debug, Clone)]
pub struct SwapchainBundle {
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Images owned by the swapchain
    pub images: Vec<vk::Image>,
    /// Actual format chosen by the host
    pub format: vk::Format,
    /// Actual extent chosen by the host
    pub extent: vk::Extent2D,
}

/// Outcome of a swapchain image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired
    Acquired {
        /// Index of the acquired image
        index: u32,
        /// The swapchain no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The swapchain is out of date and must be recreated
    OutOfDate,
}

/// Outcome of a queue presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was presented
    Presented,
    /// Presented, but the swapchain no longer matches the surface
    Suboptimal,
    /// The swapchain is out of date and must be recreated
    OutOfDate,
}

/// Push constant range description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRangeDesc {
    /// Shader stages that read the range
    pub stages: vk::ShaderStageFlags,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

/// Pipeline layout creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PipelineLayoutDesc {
    /// Descriptor set layouts, set index order
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Push constant ranges
    pub push_constant_ranges: Vec<PushConstantRangeDesc>,
}

/// One programmable stage of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStageDesc {
    /// Stage flag (vertex, fragment, compute)
    pub stage: vk::ShaderStageFlags,
    /// Compiled shader module
    pub module: vk::ShaderModule,
    /// Entry point name
    pub entry: String,
}

/// Vertex buffer binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBindingDesc {
    /// Binding index
    pub binding: u32,
    /// Stride in bytes
    pub stride: u32,
    /// Per-vertex or per-instance rate
    pub input_rate: vk::VertexInputRate,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDesc {
    /// Shader input location
    pub location: u32,
    /// Source binding
    pub binding: u32,
    /// Attribute format
    pub format: vk::Format,
    /// Offset within the binding stride
    pub offset: u32,
}

/// Rasterization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterStateDesc {
    /// Face culling mode
    pub cull_mode: vk::CullModeFlags,
    /// Winding order treated as front-facing
    pub front_face: vk::FrontFace,
    /// Fill or wireframe
    pub polygon_mode: vk::PolygonMode,
}

impl Default for RasterStateDesc {
    fn default() -> Self {
        Self {
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            polygon_mode: vk::PolygonMode::FILL,
        }
    }
}

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStateDesc {
    /// Enable depth testing
    pub test: bool,
    /// Enable depth writes
    pub write: bool,
    /// Comparison operator
    pub compare: vk::CompareOp,
}

impl Default for DepthStateDesc {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            compare: vk::CompareOp::LESS,
        }
    }
}

/// Color blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendStateDesc {
    /// Standard source-alpha blending on the color attachment
    pub alpha_blending: bool,
}

/// Graphics pipeline creation parameters
///
/// Every field here produces a different GPU object when changed, so the
/// struct is the cache key for pipeline deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineDesc {
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
    /// Programmable stages
    pub stages: Vec<ShaderStageDesc>,
    /// Vertex buffer bindings
    pub vertex_bindings: Vec<VertexBindingDesc>,
    /// Vertex attributes
    pub vertex_attributes: Vec<VertexAttributeDesc>,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Rasterization state
    pub raster: RasterStateDesc,
    /// Depth state
    pub depth: DepthStateDesc,
    /// Blend state
    pub blend: BlendStateDesc,
    /// Compatible render pass
    pub render_pass: vk::RenderPass,
    /// Subpass index within the render pass
    pub subpass: u32,
}

/// A single attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    /// Attachment format
    pub format: vk::Format,
    /// Load operation at pass begin
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation at pass end
    pub store_op: vk::AttachmentStoreOp,
    /// Layout before the pass
    pub initial_layout: vk::ImageLayout,
    /// Layout after the pass
    pub final_layout: vk::ImageLayout,
}

/// Render pass creation parameters (single subpass)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    /// Color attachment
    pub color: AttachmentDesc,
    /// Optional depth attachment
    pub depth: Option<AttachmentDesc>,
}

/// Framebuffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferDesc {
    /// Compatible render pass
    pub render_pass: vk::RenderPass,
    /// Attachment image views, attachment order
    pub attachments: Vec<vk::ImageView>,
    /// Framebuffer extent
    pub extent: vk::Extent2D,
}

/// Image creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    /// Image extent
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Mip level count
    pub mip_levels: u32,
}

/// Image view creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageViewDesc {
    /// Source image
    pub image: vk::Image,
    /// View format
    pub format: vk::Format,
    /// Aspect (color or depth)
    pub aspect: vk::ImageAspectFlags,
    /// Mip level count
    pub mip_levels: u32,
}

/// Buffer creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Usage flags
    pub usage: vk::BufferUsageFlags,
}

/// Sampler creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Magnification filter
    pub mag_filter: vk::Filter,
    /// Minification filter
    pub min_filter: vk::Filter,
    /// Address mode for all coordinates
    pub address_mode: vk::SamplerAddressMode,
    /// Mipmap interpolation mode
    pub mipmap_mode: vk::SamplerMipmapMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        }
    }
}

/// Descriptor pool creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorPoolDesc {
    /// Maximum number of sets
    pub max_sets: u32,
    /// Pool sizes per descriptor type
    pub sizes: Vec<(vk::DescriptorType, u32)>,
}

/// A single descriptor set write
#[derive(Debug, Clone)]
pub enum DescriptorSetUpdate {
    /// Bind a uniform buffer range
    UniformBuffer {
        /// Destination binding
        binding: u32,
        /// Buffer handle
        buffer: vk::Buffer,
        /// Offset in bytes
        offset: u64,
        /// Range in bytes
        range: u64,
    },
    /// Bind a sampled image with its sampler
    CombinedImageSampler {
        /// Destination binding
        binding: u32,
        /// Image view handle
        view: vk::ImageView,
        /// Sampler handle
        sampler: vk::Sampler,
        /// Image layout at sampling time
        layout: vk::ImageLayout,
    },
}

/// Queue submission parameters
#[derive(Debug, Clone, Default)]
pub struct SubmitDesc<'a> {
    /// Command buffers to execute
    pub command_buffers: &'a [vk::CommandBuffer],
    /// Semaphores to wait on, with the stage each wait applies to
    pub wait_semaphores: &'a [(vk::Semaphore, vk::PipelineStageFlags)],
    /// Semaphores to signal on completion
    pub signal_semaphores: &'a [vk::Semaphore],
    /// Fence to signal on completion
    pub fence: Option<vk::Fence>,
}

/// Render pass begin parameters
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBeginDesc {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Target framebuffer
    pub framebuffer: vk::Framebuffer,
    /// Render area extent
    pub extent: vk::Extent2D,
    /// Clear color for the color attachment
    pub clear_color: [f32; 4],
    /// Clear value for the depth attachment
    pub clear_depth: f32,
}

/// GPU-API facade implemented by the host
///
/// Implementations are responsible for correct unsafe Vulkan usage; the
/// engine core calls these operations by contract only. All operations
/// must be callable from the render thread; `wait_idle` and the cache
/// destroy operations may additionally be called during teardown.
pub trait GpuFacade: Send + Sync {
    // --- devices and windowing ---

    /// Logical devices available to the engine, in host order
    fn devices(&self) -> Vec<DeviceId>;

    /// Block until the device is idle
    fn wait_idle(&self, device: DeviceId) -> GpuResult<()>;

    /// The window the engine renders to
    fn primary_window(&self) -> WindowId;

    /// Current framebuffer extent of a window
    fn window_extent(&self, window: WindowId) -> vk::Extent2D;

    // --- swapchain ---

    /// Create a swapchain for the window
    fn create_swapchain(
        &self,
        device: DeviceId,
        window: WindowId,
        desc: &SwapchainDesc,
    ) -> GpuResult<SwapchainBundle>;

    /// Destroy a swapchain
    fn destroy_swapchain(&self, device: DeviceId, swapchain: vk::SwapchainKHR);

    /// Acquire the next swapchain image, signaling `signal` when ready
    fn acquire_next_image(
        &self,
        device: DeviceId,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> GpuResult<AcquireOutcome>;

    /// Present an image on the device's present queue
    fn present(
        &self,
        device: DeviceId,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> GpuResult<PresentOutcome>;

    // --- object creation / destruction ---

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, device: DeviceId, code: &[u32]) -> GpuResult<vk::ShaderModule>;
    /// Destroy a shader module
    fn destroy_shader_module(&self, device: DeviceId, module: vk::ShaderModule);

    /// Create a pipeline layout
    fn create_pipeline_layout(
        &self,
        device: DeviceId,
        desc: &PipelineLayoutDesc,
    ) -> GpuResult<vk::PipelineLayout>;
    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, device: DeviceId, layout: vk::PipelineLayout);

    /// Create a graphics pipeline
    fn create_graphics_pipeline(
        &self,
        device: DeviceId,
        desc: &GraphicsPipelineDesc,
    ) -> GpuResult<vk::Pipeline>;
    /// Create a compute pipeline
    fn create_compute_pipeline(
        &self,
        device: DeviceId,
        layout: vk::PipelineLayout,
        stage: &ShaderStageDesc,
    ) -> GpuResult<vk::Pipeline>;
    /// Destroy a pipeline
    fn destroy_pipeline(&self, device: DeviceId, pipeline: vk::Pipeline);

    /// Create a render pass
    fn create_render_pass(&self, device: DeviceId, desc: &RenderPassDesc)
        -> GpuResult<vk::RenderPass>;
    /// Destroy a render pass
    fn destroy_render_pass(&self, device: DeviceId, render_pass: vk::RenderPass);

    /// Create a framebuffer
    fn create_framebuffer(
        &self,
        device: DeviceId,
        desc: &FramebufferDesc,
    ) -> GpuResult<vk::Framebuffer>;
    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, device: DeviceId, framebuffer: vk::Framebuffer);

    /// Create a descriptor set layout from binding reflection
    fn create_descriptor_set_layout(
        &self,
        device: DeviceId,
        bindings: &[crate::gpu::shader::DescriptorBindingReflection],
    ) -> GpuResult<vk::DescriptorSetLayout>;
    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, device: DeviceId, layout: vk::DescriptorSetLayout);

    /// Create a descriptor pool
    fn create_descriptor_pool(
        &self,
        device: DeviceId,
        desc: &DescriptorPoolDesc,
    ) -> GpuResult<vk::DescriptorPool>;
    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, device: DeviceId, pool: vk::DescriptorPool);

    /// Allocate descriptor sets from a pool
    fn allocate_descriptor_sets(
        &self,
        device: DeviceId,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> GpuResult<Vec<vk::DescriptorSet>>;
    /// Write updates into a descriptor set
    fn update_descriptor_set(
        &self,
        device: DeviceId,
        set: vk::DescriptorSet,
        updates: &[DescriptorSetUpdate],
    ) -> GpuResult<()>;

    /// Create a command pool for the device's graphics queue family
    fn create_command_pool(&self, device: DeviceId) -> GpuResult<vk::CommandPool>;
    /// Destroy a command pool and its buffers
    fn destroy_command_pool(&self, device: DeviceId, pool: vk::CommandPool);
    /// Allocate primary command buffers from a pool
    fn allocate_command_buffers(
        &self,
        device: DeviceId,
        pool: vk::CommandPool,
        count: u32,
    ) -> GpuResult<Vec<vk::CommandBuffer>>;

    /// Create a semaphore
    fn create_semaphore(&self, device: DeviceId) -> GpuResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&self, device: DeviceId, semaphore: vk::Semaphore);

    /// Create a fence, optionally pre-signaled
    fn create_fence(&self, device: DeviceId, signaled: bool) -> GpuResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&self, device: DeviceId, fence: vk::Fence);
    /// Wait for a fence with a timeout in nanoseconds
    fn wait_for_fence(&self, device: DeviceId, fence: vk::Fence, timeout_ns: u64) -> GpuResult<()>;
    /// Reset a fence to unsignaled
    fn reset_fence(&self, device: DeviceId, fence: vk::Fence) -> GpuResult<()>;

    /// Create an image with backing memory
    fn create_image(&self, device: DeviceId, desc: &ImageDesc) -> GpuResult<vk::Image>;
    /// Destroy an image and its backing memory
    fn destroy_image(&self, device: DeviceId, image: vk::Image);

    /// Create an image view
    fn create_image_view(&self, device: DeviceId, desc: &ImageViewDesc)
        -> GpuResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&self, device: DeviceId, view: vk::ImageView);

    /// Create a buffer with backing memory
    fn create_buffer(&self, device: DeviceId, desc: &BufferDesc) -> GpuResult<vk::Buffer>;
    /// Destroy a buffer and its backing memory
    fn destroy_buffer(&self, device: DeviceId, buffer: vk::Buffer);

    /// Create a sampler
    fn create_sampler(&self, device: DeviceId, desc: &SamplerDesc) -> GpuResult<vk::Sampler>;
    /// Destroy a sampler
    fn destroy_sampler(&self, device: DeviceId, sampler: vk::Sampler);

    /// Upload raw bytes into an image through a staging transfer
    fn upload_image_data(
        &self,
        device: DeviceId,
        image: vk::Image,
        desc: &ImageDesc,
        bytes: &[u8],
    ) -> GpuResult<()>;

    // --- command recording ---

    /// Begin recording a command buffer
    fn begin_command_buffer(&self, device: DeviceId, cmd: vk::CommandBuffer) -> GpuResult<()>;
    /// End recording a command buffer
    fn end_command_buffer(&self, device: DeviceId, cmd: vk::CommandBuffer) -> GpuResult<()>;

    /// Begin a render pass
    fn cmd_begin_render_pass(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        desc: &RenderPassBeginDesc,
    );
    /// End the current render pass
    fn cmd_end_render_pass(&self, device: DeviceId, cmd: vk::CommandBuffer);
    /// Bind a pipeline
    fn cmd_bind_pipeline(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );
    /// Bind vertex buffers starting at binding zero
    fn cmd_bind_vertex_buffers(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        buffers: &[vk::Buffer],
    );
    /// Bind an index buffer
    fn cmd_bind_index_buffer(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        index_type: vk::IndexType,
    );
    /// Bind descriptor sets starting at set zero
    fn cmd_bind_descriptor_sets(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    );
    /// Draw unindexed vertices
    fn cmd_draw(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
    );
    /// Draw indexed vertices
    fn cmd_draw_indexed(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
    );
    /// Dispatch a compute grid
    fn cmd_dispatch(&self, device: DeviceId, cmd: vk::CommandBuffer, groups: [u32; 3]);
    /// Copy between buffers
    fn cmd_copy_buffer(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: u64,
    );
    /// Copy a buffer into an image
    fn cmd_copy_buffer_to_image(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        extent: vk::Extent2D,
    );
    /// Record a full pipeline barrier
    fn cmd_pipeline_barrier(
        &self,
        device: DeviceId,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    );

    /// Submit command buffers to the device's graphics queue
    fn submit(&self, device: DeviceId, desc: &SubmitDesc<'_>) -> GpuResult<()>;
}
