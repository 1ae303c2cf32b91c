//! Mock GPU facade and providers
//!
//! A scriptable, handle-minting facade that records every operation so
//! tests can assert creation counts, destruction, and call ordering
//! without a GPU. Acquire and present outcomes can be queued to drive
//! out-of-date paths.

use crate::gpu::{
    AcquireOutcome, BufferDesc, DescriptorBindingReflection, DescriptorPoolDesc,
    DescriptorSetUpdate, DeviceId, FramebufferDesc, GpuError, GpuFacade, GpuResult,
    GraphicsPipelineDesc, ImageData, ImageDataProvider, ImageDesc, ImageProviderError,
    ImageViewDesc, PipelineLayoutDesc, PresentOutcome, RenderPassBeginDesc, RenderPassDesc,
    SamplerDesc, ShaderArtifact, ShaderBytecodeProvider, ShaderProviderError, ShaderReflection,
    ShaderStage, ShaderStageDesc, SubmitDesc, SwapchainBundle, SwapchainDesc, WindowId,
};
use ash::vk;
use ash::vk::Handle;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scriptable facade recording every operation
pub struct MockGpu {
    devices: Vec<DeviceId>,
    extent: Mutex<vk::Extent2D>,
    next_handle: AtomicU64,
    created: Mutex<HashMap<&'static str, u32>>,
    destroyed: Mutex<Vec<u64>>,
    events: Mutex<Vec<&'static str>>,
    acquire_queue: Mutex<VecDeque<AcquireOutcome>>,
    present_queue: Mutex<VecDeque<PresentOutcome>>,
    acquire_counter: AtomicU64,
    image_count: u32,
    fail_op: Mutex<Option<&'static str>>,
}

impl MockGpu {
    /// Create a mock exposing `device_count` devices
    pub fn new(device_count: u64) -> Self {
        Self {
            devices: (0..device_count).map(DeviceId).collect(),
            extent: Mutex::new(vk::Extent2D { width: 1280, height: 720 }),
            next_handle: AtomicU64::new(1),
            created: Mutex::new(HashMap::new()),
            destroyed: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            acquire_queue: Mutex::new(VecDeque::new()),
            present_queue: Mutex::new(VecDeque::new()),
            acquire_counter: AtomicU64::new(0),
            image_count: 3,
            fail_op: Mutex::new(None),
        }
    }

    /// Change the reported window extent
    pub fn set_extent(&self, width: u32, height: u32) {
        *self.extent.lock().unwrap() = vk::Extent2D { width, height };
    }

    /// Queue the outcome of the next acquire
    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.acquire_queue.lock().unwrap().push_back(outcome);
    }

    /// Queue the outcome of the next present
    pub fn script_present(&self, outcome: PresentOutcome) {
        self.present_queue.lock().unwrap().push_back(outcome);
    }

    /// Make the next call of the named create operation fail
    pub fn fail_next(&self, op: &'static str) {
        *self.fail_op.lock().unwrap() = Some(op);
    }

    /// How many times the named create operation ran
    pub fn created_count(&self, op: &'static str) -> u32 {
        self.created.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Whether the raw handle was passed to a destroy operation
    pub fn was_destroyed(&self, raw: u64) -> bool {
        self.destroyed.lock().unwrap().contains(&raw)
    }

    /// Number of destroy calls so far
    pub fn destroyed_count(&self) -> usize {
        self.destroyed.lock().unwrap().len()
    }

    /// Snapshot of the ordered operation log
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str) {
        self.events.lock().unwrap().push(op);
    }

    fn maybe_fail(&self, op: &'static str) -> GpuResult<()> {
        let mut fail = self.fail_op.lock().unwrap();
        if *fail == Some(op) {
            *fail = None;
            return Err(GpuError::new(op, vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        }
        Ok(())
    }

    fn mint<T: Handle>(&self, op: &'static str) -> GpuResult<T> {
        self.maybe_fail(op)?;
        self.record(op);
        *self.created.lock().unwrap().entry(op).or_insert(0) += 1;
        Ok(T::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn retire<T: Handle>(&self, handle: T) {
        self.destroyed.lock().unwrap().push(handle.as_raw());
    }
}

impl GpuFacade for MockGpu {
    fn devices(&self) -> Vec<DeviceId> {
        self.devices.clone()
    }

    fn wait_idle(&self, _device: DeviceId) -> GpuResult<()> {
        self.record("wait_idle");
        Ok(())
    }

    fn primary_window(&self) -> WindowId {
        WindowId(1)
    }

    fn window_extent(&self, _window: WindowId) -> vk::Extent2D {
        *self.extent.lock().unwrap()
    }

    fn create_swapchain(
        &self,
        _device: DeviceId,
        _window: WindowId,
        desc: &SwapchainDesc,
    ) -> GpuResult<SwapchainBundle> {
        self.maybe_fail("create_swapchain")?;
        self.record("create_swapchain");
        *self.created.lock().unwrap().entry("create_swapchain").or_insert(0) += 1;
        let swapchain =
            vk::SwapchainKHR::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let images = (0..self.image_count)
            .map(|_| vk::Image::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
            .collect();
        Ok(SwapchainBundle {
            swapchain,
            images,
            format: desc.format,
            extent: desc.extent,
        })
    }

    fn destroy_swapchain(&self, _device: DeviceId, swapchain: vk::SwapchainKHR) {
        self.record("destroy_swapchain");
        self.retire(swapchain);
    }

    fn acquire_next_image(
        &self,
        _device: DeviceId,
        _swapchain: vk::SwapchainKHR,
        _signal: vk::Semaphore,
    ) -> GpuResult<AcquireOutcome> {
        self.record("acquire");
        if let Some(outcome) = self.acquire_queue.lock().unwrap().pop_front() {
            return Ok(outcome);
        }
        let index =
            u32::try_from(self.acquire_counter.fetch_add(1, Ordering::Relaxed)).unwrap_or(0)
                % self.image_count;
        Ok(AcquireOutcome::Acquired { index, suboptimal: false })
    }

    fn present(
        &self,
        _device: DeviceId,
        _swapchain: vk::SwapchainKHR,
        _image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> GpuResult<PresentOutcome> {
        assert!(!wait_semaphores.is_empty(), "present must wait on render completion");
        self.record("present");
        Ok(self
            .present_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn create_shader_module(&self, _device: DeviceId, _code: &[u32]) -> GpuResult<vk::ShaderModule> {
        self.mint("create_shader_module")
    }

    fn destroy_shader_module(&self, _device: DeviceId, module: vk::ShaderModule) {
        self.record("destroy_shader_module");
        self.retire(module);
    }

    fn create_pipeline_layout(
        &self,
        _device: DeviceId,
        _desc: &PipelineLayoutDesc,
    ) -> GpuResult<vk::PipelineLayout> {
        self.mint("create_pipeline_layout")
    }

    fn destroy_pipeline_layout(&self, _device: DeviceId, layout: vk::PipelineLayout) {
        self.record("destroy_pipeline_layout");
        self.retire(layout);
    }

    fn create_graphics_pipeline(
        &self,
        _device: DeviceId,
        _desc: &GraphicsPipelineDesc,
    ) -> GpuResult<vk::Pipeline> {
        self.mint("create_graphics_pipeline")
    }

    fn create_compute_pipeline(
        &self,
        _device: DeviceId,
        _layout: vk::PipelineLayout,
        _stage: &ShaderStageDesc,
    ) -> GpuResult<vk::Pipeline> {
        self.mint("create_compute_pipeline")
    }

    fn destroy_pipeline(&self, _device: DeviceId, pipeline: vk::Pipeline) {
        self.record("destroy_pipeline");
        self.retire(pipeline);
    }

    fn create_render_pass(
        &self,
        _device: DeviceId,
        _desc: &RenderPassDesc,
    ) -> GpuResult<vk::RenderPass> {
        self.mint("create_render_pass")
    }

    fn destroy_render_pass(&self, _device: DeviceId, render_pass: vk::RenderPass) {
        self.record("destroy_render_pass");
        self.retire(render_pass);
    }

    fn create_framebuffer(
        &self,
        _device: DeviceId,
        _desc: &FramebufferDesc,
    ) -> GpuResult<vk::Framebuffer> {
        self.mint("create_framebuffer")
    }

    fn destroy_framebuffer(&self, _device: DeviceId, framebuffer: vk::Framebuffer) {
        self.record("destroy_framebuffer");
        self.retire(framebuffer);
    }

    fn create_descriptor_set_layout(
        &self,
        _device: DeviceId,
        _bindings: &[DescriptorBindingReflection],
    ) -> GpuResult<vk::DescriptorSetLayout> {
        self.mint("create_descriptor_set_layout")
    }

    fn destroy_descriptor_set_layout(&self, _device: DeviceId, layout: vk::DescriptorSetLayout) {
        self.record("destroy_descriptor_set_layout");
        self.retire(layout);
    }

    fn create_descriptor_pool(
        &self,
        _device: DeviceId,
        _desc: &DescriptorPoolDesc,
    ) -> GpuResult<vk::DescriptorPool> {
        self.mint("create_descriptor_pool")
    }

    fn destroy_descriptor_pool(&self, _device: DeviceId, pool: vk::DescriptorPool) {
        self.record("destroy_descriptor_pool");
        self.retire(pool);
    }

    fn allocate_descriptor_sets(
        &self,
        _device: DeviceId,
        _pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> GpuResult<Vec<vk::DescriptorSet>> {
        self.record("allocate_descriptor_sets");
        Ok(layouts
            .iter()
            .map(|_| vk::DescriptorSet::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
            .collect())
    }

    fn update_descriptor_set(
        &self,
        _device: DeviceId,
        _set: vk::DescriptorSet,
        _updates: &[DescriptorSetUpdate],
    ) -> GpuResult<()> {
        self.record("update_descriptor_set");
        Ok(())
    }

    fn create_command_pool(&self, _device: DeviceId) -> GpuResult<vk::CommandPool> {
        self.mint("create_command_pool")
    }

    fn destroy_command_pool(&self, _device: DeviceId, pool: vk::CommandPool) {
        self.record("destroy_command_pool");
        self.retire(pool);
    }

    fn allocate_command_buffers(
        &self,
        _device: DeviceId,
        _pool: vk::CommandPool,
        count: u32,
    ) -> GpuResult<Vec<vk::CommandBuffer>> {
        self.record("allocate_command_buffers");
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
            .collect())
    }

    fn create_semaphore(&self, _device: DeviceId) -> GpuResult<vk::Semaphore> {
        self.mint("create_semaphore")
    }

    fn destroy_semaphore(&self, _device: DeviceId, semaphore: vk::Semaphore) {
        self.record("destroy_semaphore");
        self.retire(semaphore);
    }

    fn create_fence(&self, _device: DeviceId, _signaled: bool) -> GpuResult<vk::Fence> {
        self.mint("create_fence")
    }

    fn destroy_fence(&self, _device: DeviceId, fence: vk::Fence) {
        self.record("destroy_fence");
        self.retire(fence);
    }

    fn wait_for_fence(
        &self,
        _device: DeviceId,
        _fence: vk::Fence,
        _timeout_ns: u64,
    ) -> GpuResult<()> {
        self.record("wait_fence");
        Ok(())
    }

    fn reset_fence(&self, _device: DeviceId, _fence: vk::Fence) -> GpuResult<()> {
        self.record("reset_fence");
        Ok(())
    }

    fn create_image(&self, _device: DeviceId, _desc: &ImageDesc) -> GpuResult<vk::Image> {
        self.mint("create_image")
    }

    fn destroy_image(&self, _device: DeviceId, image: vk::Image) {
        self.record("destroy_image");
        self.retire(image);
    }

    fn create_image_view(
        &self,
        _device: DeviceId,
        _desc: &ImageViewDesc,
    ) -> GpuResult<vk::ImageView> {
        self.mint("create_image_view")
    }

    fn destroy_image_view(&self, _device: DeviceId, view: vk::ImageView) {
        self.record("destroy_image_view");
        self.retire(view);
    }

    fn create_buffer(&self, _device: DeviceId, _desc: &BufferDesc) -> GpuResult<vk::Buffer> {
        self.mint("create_buffer")
    }

    fn destroy_buffer(&self, _device: DeviceId, buffer: vk::Buffer) {
        self.record("destroy_buffer");
        self.retire(buffer);
    }

    fn create_sampler(&self, _device: DeviceId, _desc: &SamplerDesc) -> GpuResult<vk::Sampler> {
        self.mint("create_sampler")
    }

    fn destroy_sampler(&self, _device: DeviceId, sampler: vk::Sampler) {
        self.record("destroy_sampler");
        self.retire(sampler);
    }

    fn upload_image_data(
        &self,
        _device: DeviceId,
        _image: vk::Image,
        _desc: &ImageDesc,
        _bytes: &[u8],
    ) -> GpuResult<()> {
        self.record("upload_image_data");
        Ok(())
    }

    fn begin_command_buffer(&self, _device: DeviceId, _cmd: vk::CommandBuffer) -> GpuResult<()> {
        self.maybe_fail("begin_cmd")?;
        self.record("begin_cmd");
        Ok(())
    }

    fn end_command_buffer(&self, _device: DeviceId, _cmd: vk::CommandBuffer) -> GpuResult<()> {
        self.record("end_cmd");
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _desc: &RenderPassBeginDesc,
    ) {
        self.record("begin_render_pass");
    }

    fn cmd_end_render_pass(&self, _device: DeviceId, _cmd: vk::CommandBuffer) {
        self.record("end_render_pass");
    }

    fn cmd_bind_pipeline(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _pipeline: vk::Pipeline,
    ) {
        self.record("bind_pipeline");
    }

    fn cmd_bind_vertex_buffers(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _buffers: &[vk::Buffer],
    ) {
        self.record("bind_vertex_buffers");
    }

    fn cmd_bind_index_buffer(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _buffer: vk::Buffer,
        _index_type: vk::IndexType,
    ) {
        self.record("bind_index_buffer");
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        _sets: &[vk::DescriptorSet],
    ) {
        self.record("bind_descriptor_sets");
    }

    fn cmd_draw(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _vertex_count: u32,
        _instance_count: u32,
    ) {
        self.record("draw");
    }

    fn cmd_draw_indexed(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _index_count: u32,
        _instance_count: u32,
    ) {
        self.record("draw_indexed");
    }

    fn cmd_dispatch(&self, _device: DeviceId, _cmd: vk::CommandBuffer, _groups: [u32; 3]) {
        self.record("dispatch");
    }

    fn cmd_copy_buffer(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _src: vk::Buffer,
        _dst: vk::Buffer,
        _size: u64,
    ) {
        self.record("copy_buffer");
    }

    fn cmd_copy_buffer_to_image(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _src: vk::Buffer,
        _dst: vk::Image,
        _extent: vk::Extent2D,
    ) {
        self.record("copy_buffer_to_image");
    }

    fn cmd_pipeline_barrier(
        &self,
        _device: DeviceId,
        _cmd: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
    ) {
        self.record("pipeline_barrier");
    }

    fn submit(&self, _device: DeviceId, desc: &SubmitDesc<'_>) -> GpuResult<()> {
        self.maybe_fail("submit")?;
        assert!(!desc.command_buffers.is_empty(), "submission without command buffers");
        self.record("submit");
        Ok(())
    }
}

/// Shader provider returning fake SPIR-V with empty reflection
#[derive(Default)]
pub struct MockShaderCompiler {
    produced: AtomicUsize,
}

impl MockShaderCompiler {
    /// How many compilations actually ran
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }
}

impl ShaderBytecodeProvider for MockShaderCompiler {
    fn produce(
        &self,
        source_paths: &[String],
        _entry_point: &str,
        stage: ShaderStage,
    ) -> Result<ShaderArtifact, ShaderProviderError> {
        self.produced.fetch_add(1, Ordering::SeqCst);
        // Distinct bytecode per source set and stage so module caching
        // distinguishes shaders.
        let tag = crate::foundation::hash::content_hash(&(source_paths, stage.flags().as_raw()));
        #[allow(clippy::cast_possible_truncation)]
        let words = Arc::new(vec![0x0723_0203_u32, tag as u32, (tag >> 32) as u32]);

        let mut reflection = ShaderReflection::default();
        reflection.compute_interface_hash();
        Ok(ShaderArtifact { words, reflection })
    }
}

/// Image provider returning a 2x2 RGBA checker
pub struct MockImageLoader;

impl ImageDataProvider for MockImageLoader {
    fn load(&self, path: &str) -> Result<ImageData, ImageProviderError> {
        if path.is_empty() {
            return Err(ImageProviderError {
                path: path.to_string(),
                message: "empty path".to_string(),
            });
        }
        Ok(ImageData {
            width: 2,
            height: 2,
            mip_count: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            bytes: vec![0xFF; 16],
        })
    }
}
