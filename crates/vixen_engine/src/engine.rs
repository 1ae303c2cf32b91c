//! Engine composition root
//!
//! Owns the message bus, the cache registry, the worker bridge, and the
//! frame executor, and wires them together without any global state. The
//! bus and registry are shared into subsystems by `Arc`; the host supplies
//! the GPU facade and the shader/image providers.

use crate::config::EngineConfig;
use crate::events::{Message, MessageBus, MessagePayload, WorkerBridge};
use crate::gpu::{GpuFacade, ImageDataProvider, ShaderBytecodeProvider};
use crate::graph::nodes::register_builtin_types;
use crate::graph::{FrameError, FrameExecutor, FrameOutcome, GraphContext, GraphError, NodeTypeRegistry, RenderGraph};
use crate::resources::{
    CacheRegistry, ComputePipelineCache, DescriptorSetLayoutCache, GraphicsPipelineCache,
    PipelineLayoutCache, RenderPassCache, ResourceError, SamplerCache, ShaderBytecodeCache,
    ShaderModuleCache, TextureCache,
};
use std::sync::Arc;
use thiserror::Error;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// A subsystem failed to initialize
    #[error("engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Graph construction or compilation error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Cache registration error
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// The engine: bus, caches, worker, and the frame executor
pub struct Engine {
    bus: Arc<MessageBus>,
    registry: Arc<CacheRegistry>,
    worker: Option<WorkerBridge>,
    executor: FrameExecutor,
    facade: Arc<dyn GpuFacade>,
    config: EngineConfig,
    shut_down: bool,
}

impl Engine {
    /// Sender id used for messages the engine publishes
    const SENDER: u32 = 0xE1;

    /// Build the engine over the host's capability implementations
    ///
    /// Registers the standard cacher set for every facade device (pipeline
    /// caches first, so cleanup retires pipelines before the layouts and
    /// modules they were built from) and the built-in node types.
    pub fn new(
        config: EngineConfig,
        facade: Arc<dyn GpuFacade>,
        shaders: Arc<dyn ShaderBytecodeProvider>,
        images: Arc<dyn ImageDataProvider>,
    ) -> Result<Self, EngineError> {
        log::info!("initializing engine '{}'", config.app_name);

        let bus = Arc::new(MessageBus::new());
        let registry = Arc::new(CacheRegistry::new());

        registry.register_cacher(None, Arc::new(ShaderBytecodeCache::new(shaders)))?;

        for device in facade.devices() {
            let slot = Some(device);
            registry.register_cacher(
                slot,
                Arc::new(GraphicsPipelineCache::new(device, Arc::clone(&facade))),
            )?;
            registry.register_cacher(
                slot,
                Arc::new(ComputePipelineCache::new(device, Arc::clone(&facade))),
            )?;
            registry.register_cacher(
                slot,
                Arc::new(PipelineLayoutCache::new(device, Arc::clone(&facade))),
            )?;
            registry.register_cacher(
                slot,
                Arc::new(DescriptorSetLayoutCache::new(device, Arc::clone(&facade))),
            )?;
            registry.register_cacher(
                slot,
                Arc::new(ShaderModuleCache::new(device, Arc::clone(&facade))),
            )?;
            registry
                .register_cacher(slot, Arc::new(RenderPassCache::new(device, Arc::clone(&facade))))?;
            registry
                .register_cacher(slot, Arc::new(SamplerCache::new(device, Arc::clone(&facade))))?;
            registry.register_cacher(
                slot,
                Arc::new(TextureCache::new(device, Arc::clone(&facade), Arc::clone(&images))),
            )?;
        }

        let mut types = NodeTypeRegistry::new();
        register_builtin_types(&mut types)?;
        let graph = RenderGraph::new(Arc::new(types));

        let ctx = GraphContext {
            facade: Arc::clone(&facade),
            registry: Arc::clone(&registry),
            bus: Arc::clone(&bus),
        };
        let executor = FrameExecutor::new(graph, ctx);

        let worker = config.worker.enabled.then(|| WorkerBridge::new(Arc::clone(&bus)));

        Ok(Self {
            bus,
            registry,
            worker,
            executor,
            facade,
            config,
            shut_down: false,
        })
    }

    /// The message bus
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// The cache registry
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    /// The worker bridge, when enabled
    pub fn worker(&self) -> Option<&WorkerBridge> {
        self.worker.as_ref()
    }

    /// The frame executor
    pub fn executor(&self) -> &FrameExecutor {
        &self.executor
    }

    /// Mutable access to the frame executor
    pub fn executor_mut(&mut self) -> &mut FrameExecutor {
        &mut self.executor
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One engine tick: drain the bus, then render a frame
    ///
    /// Must be called from the render thread once per frame.
    pub fn pump(&mut self) -> Result<FrameOutcome, FrameError> {
        self.bus.process();
        self.executor.render_frame()
    }

    /// Orderly shutdown: drain the worker, tear down the graph, clean caches
    ///
    /// Runs once; later calls (including the one from `Drop`) are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        log::info!("engine '{}' shutting down", self.config.app_name);

        // Dropping the bridge drains queued work and joins the thread.
        self.worker = None;
        self.bus.process();

        self.executor.destroy();

        let mut cleaned = 0_usize;
        for device in self.facade.devices() {
            cleaned += self.registry.clear_device_caches(device);
        }
        cleaned += self.registry.cleanup_global_caches();

        self.bus.publish(Message::new(
            Self::SENDER,
            MessagePayload::CleanupCompleted { cleaned: u32::try_from(cleaned).unwrap_or(u32::MAX) },
        ));
        self.bus.process();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
