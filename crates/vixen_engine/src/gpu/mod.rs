//! GPU capability contracts
//!
//! The engine core never calls the Vulkan API itself. Everything it needs
//! from the host is expressed as three capability traits: the
//! [`GpuFacade`] (object creation, destruction, recording, submission,
//! presentation), the [`ShaderBytecodeProvider`] (compiled SPIR-V plus
//! reflection), and the [`ImageDataProvider`] (decoded texel data).
//! Handle and enum types come from `ash::vk` so facade implementations map
//! straight onto the driver.

pub mod facade;
pub mod image;
pub mod shader;

pub use facade::{
    AcquireOutcome, AttachmentDesc, BlendStateDesc, BufferDesc, DepthStateDesc, DescriptorPoolDesc,
    DescriptorSetUpdate, DeviceId, FramebufferDesc, GpuError, GpuFacade, GpuResult,
    GraphicsPipelineDesc, ImageDesc, ImageViewDesc, PipelineLayoutDesc, PresentOutcome,
    PushConstantRangeDesc, RasterStateDesc, RenderPassBeginDesc, RenderPassDesc, SamplerDesc,
    ShaderStageDesc, SubmitDesc, SwapchainBundle, SwapchainDesc, VertexAttributeDesc,
    VertexBindingDesc, WindowId,
};
pub use image::{ImageData, ImageDataProvider, ImageProviderError};
pub use shader::{
    DescriptorBindingReflection, DescriptorSetReflection, ShaderArtifact, ShaderBytecodeProvider,
    ShaderProviderError, ShaderReflection, ShaderStage, VertexInputReflection,
};
