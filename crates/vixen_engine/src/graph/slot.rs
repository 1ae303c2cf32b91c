//! Slot descriptors and element type tags
//!
//! Every input and output port of a node carries an [`ElementType`] tag
//! drawn from a closed set. Tag equality is the whole connection rule:
//! an output may feed an input exactly when their tags are equal (a single
//! output may also feed one slot of a same-typed variadic input).

/// Closed set of element types carried by slots and node resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Logical device
    Device,
    /// Window handle and extent
    Window,
    /// Swapchain with its image set
    Swapchain,
    /// Command pool with its allocated buffers
    CommandPool,
    /// A single command buffer
    CommandBuffer,
    /// Generic image
    Image,
    /// Image view
    ImageView,
    /// Depth image
    DepthImage,
    /// Vertex buffer
    VertexBuffer,
    /// Index buffer
    IndexBuffer,
    /// Uniform buffer
    UniformBuffer,
    /// Sampled texture
    Texture,
    /// Graphics or compute pipeline
    Pipeline,
    /// Pipeline layout
    PipelineLayout,
    /// Render pass
    RenderPass,
    /// Framebuffer set
    Framebuffer,
    /// Descriptor set
    DescriptorSet,
    /// Semaphore
    Semaphore,
    /// Fence
    Fence,
    /// Per-frame synchronization bundle
    FrameSync,
    /// Acquired swapchain image index
    ImageIndex,
    /// Presentation result code
    PresentResult,
    /// 32-bit signed scalar
    I32,
    /// 32-bit unsigned scalar
    U32,
    /// 32-bit float scalar
    F32,
    /// 64-bit float scalar
    F64,
    /// Boolean scalar
    Bool,
    /// String value
    String,
    /// Two-component float vector
    Vec2,
    /// Three-component float vector
    Vec3,
    /// Four-component float vector
    Vec4,
    /// 4x4 float matrix
    Mat4,
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// How many connections an input slot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotArity {
    /// Exactly zero or one connection
    Single,
    /// Any number of same-typed connections, at least `min`
    Variadic {
        /// Minimum inbound connection count required to compile
        min: usize,
    },
}

/// Description of one input or output port
#[derive(Debug, Clone)]
pub struct SlotDescriptor {
    /// Slot name, unique within the node type's slot list
    pub name: String,
    /// Element type carried by the slot
    pub element: ElementType,
    /// Whether the slot may remain unconnected (inputs) or absent (outputs)
    pub nullable: bool,
    /// Arity, `Single` for outputs
    pub arity: SlotArity,
}

impl SlotDescriptor {
    /// Describe a single-arity slot
    pub fn single(name: &str, element: ElementType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            element,
            nullable,
            arity: SlotArity::Single,
        }
    }

    /// Describe a variadic input slot with a minimum connection count
    pub fn variadic(name: &str, element: ElementType, min: usize) -> Self {
        Self {
            name: name.to_string(),
            element,
            // A variadic slot with min 0 is trivially satisfiable.
            nullable: min == 0,
            arity: SlotArity::Variadic { min },
        }
    }

    /// Whether the slot accepts multiple connections
    pub const fn is_variadic(&self) -> bool {
        matches!(self.arity, SlotArity::Variadic { .. })
    }
}
