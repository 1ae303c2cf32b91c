//! Swapchain node
//!
//! Creates the swapchain at compile time and acquires an image every
//! frame. Per the canonical triple, the acquire outputs are the image
//! index and the image-available semaphore; the geometry node waits on
//! them, and present consumes the index again.

use crate::gpu::{AcquireOutcome, DeviceId, ImageViewDesc, SwapchainDesc};
use crate::graph::node::{NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::NodeType;
use crate::graph::parameter::ParameterValue;
use crate::graph::resource::{NodeResource, ResourceValue, SwapchainState};
use crate::graph::slot::ElementType;
use ash::vk;
use std::sync::Arc;

const IN_DEVICE: usize = 0;
const IN_WINDOW: usize = 1;
const IN_SYNC: usize = 2;
const OUT_SWAPCHAIN: usize = 0;
const OUT_IMAGE_INDEX: usize = 1;
const OUT_IMAGE_AVAILABLE: usize = 2;

/// Build the `Swapchain` node type
pub fn node_type() -> Arc<NodeType> {
    NodeType::builder("Swapchain")
        .input("device", ElementType::Device)
        .input("window", ElementType::Window)
        .input("frame_sync", ElementType::FrameSync)
        .output("swapchain", ElementType::Swapchain)
        .output("image_index", ElementType::ImageIndex)
        .output("image_available", ElementType::Semaphore)
        .parameter("image_count", ParameterValue::U32(3), false)
        .parameter("present_mode", ParameterValue::String("fifo".to_string()), false)
        .build(|| Box::new(SwapchainNode::default()))
}

/// Node behavior owning the swapchain and its image views
#[derive(Default)]
pub struct SwapchainNode {
    created: Option<(DeviceId, Arc<SwapchainState>)>,
}

impl SwapchainNode {
    fn destroy_existing(&mut self, ctx: &NodeContext<'_>) {
        if let Some((device, state)) = self.created.take() {
            let facade = &ctx.services.facade;
            for &view in &state.views {
                facade.destroy_image_view(device, view);
            }
            facade.destroy_swapchain(device, state.swapchain);
        }
    }

    fn parse_present_mode(ctx: &NodeContext<'_>) -> Result<vk::PresentModeKHR, NodeError> {
        let mode = ctx
            .param("present_mode")
            .and_then(ParameterValue::as_str)
            .unwrap_or("fifo");
        match mode {
            "fifo" => Ok(vk::PresentModeKHR::FIFO),
            "mailbox" => Ok(vk::PresentModeKHR::MAILBOX),
            "immediate" => Ok(vk::PresentModeKHR::IMMEDIATE),
            other => Err(NodeError::InvalidParameter(format!(
                "unknown present_mode '{other}'"
            ))),
        }
    }
}

impl RenderNode for SwapchainNode {
    fn compile(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let device = ctx.require_device(IN_DEVICE)?;
        let window = ctx
            .require_input(IN_WINDOW)?
            .as_window()
            .ok_or(NodeError::MissingInput { slot: IN_WINDOW })?;
        let present_mode = Self::parse_present_mode(ctx)?;
        let image_count = ctx
            .param("image_count")
            .and_then(ParameterValue::as_u32)
            .unwrap_or(3);

        self.destroy_existing(ctx);

        let facade = &ctx.services.facade;
        let desc = SwapchainDesc {
            extent: window.extent,
            format: vk::Format::B8G8R8A8_SRGB,
            present_mode,
            image_count,
        };
        let bundle = facade.create_swapchain(device, window.window, &desc)?;

        let mut views = Vec::with_capacity(bundle.images.len());
        for &image in &bundle.images {
            let view_desc = ImageViewDesc {
                image,
                format: bundle.format,
                aspect: vk::ImageAspectFlags::COLOR,
                mip_levels: 1,
            };
            match facade.create_image_view(device, &view_desc) {
                Ok(view) => views.push(view),
                Err(e) => {
                    for &view in &views {
                        facade.destroy_image_view(device, view);
                    }
                    facade.destroy_swapchain(device, bundle.swapchain);
                    return Err(e.into());
                }
            }
        }

        log::info!(
            "node '{}': swapchain {}x{} with {} images",
            ctx.instance_name,
            bundle.extent.width,
            bundle.extent.height,
            bundle.images.len()
        );

        let state = Arc::new(SwapchainState {
            swapchain: bundle.swapchain,
            format: bundle.format,
            extent: bundle.extent,
            images: bundle.images,
            views,
        });
        self.created = Some((device, Arc::clone(&state)));

        outputs.set(
            OUT_SWAPCHAIN,
            NodeResource::new("swapchain", "presentation target", ResourceValue::Swapchain(state)),
        );
        // Per-frame outputs from a previous incarnation are stale.
        outputs.unset(OUT_IMAGE_INDEX);
        outputs.unset(OUT_IMAGE_AVAILABLE);
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        let sync = ctx
            .require_input(IN_SYNC)?
            .as_frame_sync()
            .ok_or(NodeError::MissingInput { slot: IN_SYNC })?
            .clone();
        let (device, state) = self
            .created
            .as_ref()
            .map(|(d, s)| (*d, Arc::clone(s)))
            .ok_or_else(|| NodeError::Other("swapchain not compiled".to_string()))?;

        let facade = &ctx.services.facade;
        // Throttle to the previous submission before reusing its objects.
        facade.wait_for_fence(device, sync.in_flight, u64::MAX)?;
        facade.reset_fence(device, sync.in_flight)?;

        match facade.acquire_next_image(device, state.swapchain, sync.image_available)? {
            AcquireOutcome::Acquired { index, suboptimal } => {
                if suboptimal {
                    log::debug!("acquire reported suboptimal swapchain");
                }
                outputs.set(
                    OUT_IMAGE_INDEX,
                    NodeResource::new("image_index", "acquired image", ResourceValue::ImageIndex(index)),
                );
                outputs.set(
                    OUT_IMAGE_AVAILABLE,
                    NodeResource::new(
                        "image_available",
                        "acquire wait semaphore",
                        ResourceValue::Semaphore(sync.image_available),
                    ),
                );
                Ok(())
            }
            AcquireOutcome::OutOfDate => Err(NodeError::SwapchainOutOfDate),
        }
    }

    fn cleanup(&mut self, ctx: &NodeContext<'_>) {
        self.destroy_existing(ctx);
    }
}
