//! Geometry render node
//!
//! The record-and-submit member of the canonical triple. Compile resolves
//! the full pipeline chain through the cache registry (bytecode → modules
//! → descriptor set layouts → pipeline layout → graphics pipeline);
//! execute records the draw into its upstream command pool's buffer,
//! submits waiting on the acquire semaphore, and outputs the
//! render-complete semaphore it signals.

use crate::gpu::{
    DescriptorBindingReflection, GraphicsPipelineDesc, PipelineLayoutDesc, RenderPassBeginDesc,
    ShaderReflection, ShaderStage, ShaderStageDesc, SubmitDesc, VertexAttributeDesc,
    VertexBindingDesc,
};
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::{NodeResource, ResourceValue};
use crate::graph::slot::ElementType;
use crate::resources::{
    CachedDescriptorSetLayout, CachedPipeline, CachedPipelineLayout, CachedShaderModule,
    DescriptorSetLayoutCache, GraphicsPipelineCache, PipelineLayoutCache, ResourceTag,
    ShaderBytecodeCache, ShaderModuleCache,
};
use ash::vk;
use nalgebra::Vector4;
use std::collections::BTreeMap;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const IN_RENDER_PASS: usize = 1;
const IN_FRAMEBUFFERS: usize = 2;
const IN_COMMANDS: usize = 3;
const IN_SYNC: usize = 4;
const IN_IMAGE_INDEX: usize = 5;
const IN_IMAGE_AVAILABLE: usize = 6;
const OUT_RENDER_FINISHED: usize = 0;

/// Build the `GeometryRender` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("GeometryRender")
        .input("device", ElementType::Device)
        .input("render_pass", ElementType::RenderPass)
        .input("framebuffers", ElementType::Framebuffer)
        .input("commands", ElementType::CommandPool)
        .input("frame_sync", ElementType::FrameSync)
        .input("image_index", ElementType::ImageIndex)
        .input("image_available", ElementType::Semaphore)
        .output("render_finished", ElementType::Semaphore)
        .parameter(
            "vertex_shader",
            ParameterValue::String("shaders/fullscreen.vert".to_string()),
            false,
        )
        .parameter(
            "fragment_shader",
            ParameterValue::String("shaders/fullscreen.frag".to_string()),
            false,
        )
        .parameter("vertex_count", ParameterValue::U32(3), false)
        .parameter(
            "clear_color",
            ParameterValue::Vec4(Vector4::new(0.0, 0.0, 0.0, 1.0)),
            false,
        )
        .build(|| Box::new(GeometryRenderNode::default()))
}

/// Node behavior building and driving the draw pipeline
#[derive(Default)]
pub struct GeometryRenderNode {
    // Shared references keep the cache entries alive while this node uses
    // them; the cachers own destruction.
    modules: Vec<Arc<CachedShaderModule>>,
    set_layouts: Vec<Arc<CachedDescriptorSetLayout>>,
    layout: Option<Arc<CachedPipelineLayout>>,
    pipeline: Option<Arc<CachedPipeline>>,
    shader_paths: Vec<String>,
}

/// Bytes per texel for the vertex input formats reflection can report
fn format_size(format: vk::Format) -> u32 {
    match format {
        vk::Format::R32_SFLOAT | vk::Format::R32_SINT | vk::Format::R32_UINT => 4,
        vk::Format::R32G32_SFLOAT => 8,
        vk::Format::R32G32B32_SFLOAT => 12,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => 16,
    }
}

/// Merge the descriptor interfaces of several stages, set-major
fn merge_descriptor_sets(
    reflections: &[&ShaderReflection],
) -> Vec<(u32, Vec<DescriptorBindingReflection>)> {
    let mut merged: BTreeMap<u32, BTreeMap<u32, DescriptorBindingReflection>> = BTreeMap::new();
    for reflection in reflections {
        for set in &reflection.descriptor_sets {
            let slot = merged.entry(set.set).or_default();
            for binding in &set.bindings {
                slot.entry(binding.binding)
                    .and_modify(|existing| existing.stages |= binding.stages)
                    .or_insert_with(|| binding.clone());
            }
        }
    }
    merged
        .into_iter()
        .map(|(set, bindings)| (set, bindings.into_values().collect()))
        .collect()
}

impl RenderNode for GeometryRenderNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let render_pass = ctx
            .require_input(IN_RENDER_PASS)?
            .as_render_pass()
            .ok_or(NodeError::MissingInput { slot: IN_RENDER_PASS })?;

        let vertex_path = ctx
            .param("vertex_shader")
            .and_then(ParameterValue::as_str)
            .unwrap_or_default()
            .to_string();
        let fragment_path = ctx
            .param("fragment_shader")
            .and_then(ParameterValue::as_str)
            .unwrap_or_default()
            .to_string();

        let registry = &ctx.services.registry;
        let bytecode = registry.get::<ShaderBytecodeCache>(ResourceTag::ShaderBytecode, None)?;
        let modules = registry.get::<ShaderModuleCache>(ResourceTag::ShaderModule, Some(device))?;
        let set_layouts =
            registry.get::<DescriptorSetLayoutCache>(ResourceTag::DescriptorSetLayout, Some(device))?;
        let layouts = registry.get::<PipelineLayoutCache>(ResourceTag::PipelineLayout, Some(device))?;
        let pipelines =
            registry.get::<GraphicsPipelineCache>(ResourceTag::GraphicsPipeline, Some(device))?;

        let vert =
            bytecode.get_or_create(std::slice::from_ref(&vertex_path), "main", ShaderStage::Vertex)?;
        let frag = bytecode.get_or_create(
            std::slice::from_ref(&fragment_path),
            "main",
            ShaderStage::Fragment,
        )?;

        let vert_module = modules.get_or_create(Arc::clone(&vert.words))?;
        let frag_module = modules.get_or_create(Arc::clone(&frag.words))?;

        let merged = merge_descriptor_sets(&[&vert.reflection, &frag.reflection]);
        let mut cached_set_layouts = Vec::with_capacity(merged.len());
        for (_, bindings) in &merged {
            cached_set_layouts.push(set_layouts.get_or_create(bindings)?);
        }

        let mut push_constant_ranges = vert.reflection.push_constants.clone();
        for range in &frag.reflection.push_constants {
            if !push_constant_ranges.contains(range) {
                push_constant_ranges.push(*range);
            }
        }

        let layout_desc = PipelineLayoutDesc {
            set_layouts: cached_set_layouts.iter().map(|l| l.layout).collect(),
            push_constant_ranges,
        };
        let layout = layouts.get_or_create(&layout_desc)?;

        // One interleaved binding built from the vertex-stage reflection;
        // an input-less shader (index-generated geometry) yields none.
        let mut vertex_attributes = Vec::new();
        let mut stride = 0_u32;
        let mut inputs = vert.reflection.vertex_inputs.clone();
        inputs.sort_by_key(|i| i.location);
        for input in &inputs {
            vertex_attributes.push(VertexAttributeDesc {
                location: input.location,
                binding: 0,
                format: input.format,
                offset: stride,
            });
            stride += format_size(input.format);
        }
        let vertex_bindings = if vertex_attributes.is_empty() {
            Vec::new()
        } else {
            vec![VertexBindingDesc { binding: 0, stride, input_rate: vk::VertexInputRate::VERTEX }]
        };

        let pipeline_desc = GraphicsPipelineDesc {
            layout: layout.layout,
            stages: vec![
                ShaderStageDesc {
                    stage: vk::ShaderStageFlags::VERTEX,
                    module: vert_module.module,
                    entry: "main".to_string(),
                },
                ShaderStageDesc {
                    stage: vk::ShaderStageFlags::FRAGMENT,
                    module: frag_module.module,
                    entry: "main".to_string(),
                },
            ],
            vertex_bindings,
            vertex_attributes,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            raster: crate::gpu::RasterStateDesc::default(),
            depth: crate::gpu::DepthStateDesc { test: false, write: false, compare: vk::CompareOp::LESS },
            blend: crate::gpu::BlendStateDesc::default(),
            render_pass,
            subpass: 0,
        };
        let pipeline = pipelines.get_or_create(&pipeline_desc)?;

        log::debug!(
            "node '{}': pipeline ready ({} descriptor sets)",
            ctx.instance_name,
            merged.len()
        );

        self.modules = vec![vert_module, frag_module];
        self.set_layouts = cached_set_layouts;
        self.layout = Some(layout);
        self.pipeline = Some(pipeline);
        self.shader_paths = vec![vertex_path, fragment_path];
        outputs.unset(OUT_RENDER_FINISHED);
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let render_pass = ctx
            .require_input(IN_RENDER_PASS)?
            .as_render_pass()
            .ok_or(NodeError::MissingInput { slot: IN_RENDER_PASS })?;
        let framebuffers = ctx
            .require_input(IN_FRAMEBUFFERS)?
            .as_framebuffers()
            .ok_or(NodeError::MissingInput { slot: IN_FRAMEBUFFERS })?
            .clone();
        let commands = ctx
            .require_input(IN_COMMANDS)?
            .as_command_pool()
            .ok_or(NodeError::MissingInput { slot: IN_COMMANDS })?
            .clone();
        let sync = ctx
            .require_input(IN_SYNC)?
            .as_frame_sync()
            .ok_or(NodeError::MissingInput { slot: IN_SYNC })?
            .clone();
        let image_index = ctx
            .require_input(IN_IMAGE_INDEX)?
            .as_image_index()
            .ok_or(NodeError::MissingInput { slot: IN_IMAGE_INDEX })?;
        let image_available = ctx
            .require_input(IN_IMAGE_AVAILABLE)?
            .as_semaphore()
            .ok_or(NodeError::MissingInput { slot: IN_IMAGE_AVAILABLE })?;

        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| NodeError::Other("pipeline not compiled".to_string()))?;

        let clear = ctx
            .param("clear_color")
            .and_then(ParameterValue::as_vec4)
            .unwrap_or_else(|| Vector4::new(0.0, 0.0, 0.0, 1.0));
        let vertex_count = ctx
            .param("vertex_count")
            .and_then(ParameterValue::as_u32)
            .unwrap_or(3);

        let framebuffer = framebuffers
            .framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| NodeError::Other(format!("no framebuffer for image {image_index}")))?;
        let cmd = commands
            .buffers
            .get(image_index as usize % commands.buffers.len().max(1))
            .copied()
            .ok_or_else(|| NodeError::Other("command pool has no buffers".to_string()))?;

        let facade = &ctx.services.facade;
        facade.begin_command_buffer(device, cmd)?;
        facade.cmd_begin_render_pass(
            device,
            cmd,
            &RenderPassBeginDesc {
                render_pass,
                framebuffer,
                extent: framebuffers.extent,
                clear_color: [clear.x, clear.y, clear.z, clear.w],
                clear_depth: 1.0,
            },
        );
        facade.cmd_bind_pipeline(device, cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        facade.cmd_draw(device, cmd, vertex_count, 1);
        facade.cmd_end_render_pass(device, cmd);
        facade.end_command_buffer(device, cmd)?;

        // The submission signals render_finished; per the semaphore
        // contract it must be in flight before this returns.
        facade.submit(
            device,
            &SubmitDesc {
                command_buffers: &[cmd],
                wait_semaphores: &[(
                    image_available,
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                )],
                signal_semaphores: &[sync.render_finished],
                fence: Some(sync.in_flight),
            },
        )?;

        outputs.set(
            OUT_RENDER_FINISHED,
            NodeResource::new(
                "render_finished",
                "present wait semaphore",
                ResourceValue::Semaphore(sync.render_finished),
            ),
        );
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &NodeContext<'_>) {
        // Everything the node holds is cache-owned.
        self.modules.clear();
        self.set_layouts.clear();
        self.layout = None;
        self.pipeline = None;
        self.shader_paths.clear();
    }

    fn shader_paths(&self) -> Vec<String> {
        self.shader_paths.clone()
    }
}
