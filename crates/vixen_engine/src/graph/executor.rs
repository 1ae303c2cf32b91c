//! Frame executor
//!
//! Per-frame orchestration over a compiled graph. The graph sits behind a
//! shared lock so bus subscriptions can apply invalidation cascades
//! (resize, shader reload) the moment they are dispatched; when dispatch
//! happens mid-frame the handlers fall back to a mailbox the executor
//! drains at the top of the next `render_frame`. Node `execute` calls run
//! in strict topological order; the aggregate outcome is read from the
//! present node's result output.

use crate::events::{
    DeviceSyncScope, Message, MessageFilter, MessagePayload, MessageType, SubscriptionId,
};
use crate::gpu::{DeviceId, PresentOutcome};
use crate::graph::graph::{NodeHandle, RenderGraph};
use crate::graph::node::{GraphContext, NodeError, NodeState};
use crate::graph::slot::ElementType;
use crate::graph::GraphError;
use crate::resources::{CacheRegistry, ResourceTag, ShaderBytecodeCache};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;

/// Successful frame outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The graph executed and (if a present node exists) presented
    Rendered,
    /// Rendering is paused; the frame was skipped without touching nodes
    Skipped,
}

/// Frame failures returned by `render_frame`
#[derive(Error, Debug)]
pub enum FrameError {
    /// Recompiling the dirty subgraph failed
    #[error("frame aborted, compile failed: {0}")]
    CompileFailed(#[from] GraphError),

    /// The swapchain no longer matches the surface; rebuild and retry
    #[error("swapchain out of date")]
    OutOfDate,

    /// The device was lost; the graph must be torn down
    #[error("device lost")]
    DeviceLost,

    /// A node failed during execution and is now in the error state
    #[error("node '{node}' failed during execution: {cause}")]
    NodeExecutionFailed {
        /// Offending node instance name
        node: String,
        /// Underlying failure
        cause: String,
    },
}

/// Signals deferred to the render thread between frames
#[derive(Default)]
struct SignalState {
    paused: bool,
    resized: Option<(u32, u32)>,
    shader_reloads: Vec<String>,
    sync_requests: Vec<DeviceSyncScope>,
}

/// Executes a render graph once per `render_frame` call
///
/// `render_frame` must be called from the render thread; the bus may be
/// fed from any thread.
pub struct FrameExecutor {
    graph: Arc<Mutex<RenderGraph>>,
    ctx: GraphContext,
    signals: Arc<Mutex<SignalState>>,
    subscriptions: Vec<SubscriptionId>,
    sender: u32,
}

/// Mark every node producing a window or swapchain output dirty
fn invalidate_surface_nodes(graph: &mut RenderGraph) {
    let surface_nodes = graph.nodes_where(|node| {
        node.node_type()
            .outputs()
            .iter()
            .any(|slot| matches!(slot.element, ElementType::Window | ElementType::Swapchain))
    });
    for handle in surface_nodes {
        let _ = graph.mark_dirty(handle);
    }
}

/// Evict reload-affected bytecode and dirty the nodes that use it
fn invalidate_shader_users(graph: &mut RenderGraph, registry: &CacheRegistry, path: &str) {
    if let Ok(bytecode) = registry.get::<ShaderBytecodeCache>(ResourceTag::ShaderBytecode, None) {
        bytecode.evict_path(path);
    }

    let affected = graph.nodes_where(|node| node.shader_paths().iter().any(|p| p == path));
    if affected.is_empty() {
        log::debug!("shader reload '{path}' matched no nodes");
    }
    for handle in affected {
        let _ = graph.mark_dirty(handle);
    }
}

impl FrameExecutor {
    /// Sender id used for messages the executor publishes
    const DEFAULT_SENDER: u32 = 0xE0;

    /// Wrap a graph and install the executor's bus subscriptions
    pub fn new(graph: RenderGraph, ctx: GraphContext) -> Self {
        let graph = Arc::new(Mutex::new(graph));
        let signals = Arc::new(Mutex::new(SignalState::default()));
        let mut subscriptions = Vec::new();

        let shared = Arc::clone(&graph);
        let sink = Arc::clone(&signals);
        subscriptions.push(ctx.bus.subscribe(
            MessageFilter::Type(MessageType::WindowResized),
            move |message| {
                if let MessagePayload::WindowResized { new_width, new_height } = &message.payload {
                    log::info!("window resized to {new_width}x{new_height}; invalidating surface nodes");
                    // Mid-frame dispatch cannot take the graph lock; defer.
                    if let Ok(mut graph) = shared.try_lock() {
                        invalidate_surface_nodes(&mut graph);
                    } else {
                        sink.lock().expect("signal lock poisoned").resized =
                            Some((*new_width, *new_height));
                    }
                }
                true
            },
        ));

        let shared = Arc::clone(&graph);
        let sink = Arc::clone(&signals);
        let registry = Arc::clone(&ctx.registry);
        subscriptions.push(ctx.bus.subscribe(
            MessageFilter::Type(MessageType::ShaderReloaded),
            move |message| {
                if let MessagePayload::ShaderReloaded { path } = &message.payload {
                    if let Ok(mut graph) = shared.try_lock() {
                        invalidate_shader_users(&mut graph, &registry, path);
                    } else {
                        sink.lock()
                            .expect("signal lock poisoned")
                            .shader_reloads
                            .push(path.clone());
                    }
                }
                true
            },
        ));

        let sink = Arc::clone(&signals);
        subscriptions.push(ctx.bus.subscribe(
            MessageFilter::Type(MessageType::RenderPause),
            move |message| {
                if let MessagePayload::RenderPause { reason, action } = &message.payload {
                    let paused = matches!(action, crate::events::PauseAction::PauseStart);
                    log::info!("render pause {action:?} ({reason:?})");
                    sink.lock().expect("signal lock poisoned").paused = paused;
                }
                true
            },
        ));

        let sink = Arc::clone(&signals);
        subscriptions.push(ctx.bus.subscribe(
            MessageFilter::Type(MessageType::DeviceSyncRequested),
            move |message| {
                if let MessagePayload::DeviceSyncRequested { scope, reason } = &message.payload {
                    log::debug!("device sync requested: {reason}");
                    sink.lock()
                        .expect("signal lock poisoned")
                        .sync_requests
                        .push(scope.clone());
                }
                true
            },
        ));

        Self {
            graph,
            ctx,
            signals,
            subscriptions,
            sender: Self::DEFAULT_SENDER,
        }
    }

    /// Lock the graph for construction, queries, or invalidation
    pub fn graph(&self) -> MutexGuard<'_, RenderGraph> {
        self.graph.lock().expect("graph lock poisoned")
    }

    /// Shared services (facade, registry, bus)
    pub fn context(&self) -> &GraphContext {
        &self.ctx
    }

    /// Whether rendering is currently suspended
    pub fn is_paused(&self) -> bool {
        self.signals.lock().expect("signal lock poisoned").paused
    }

    /// Compile the graph outside the frame protocol
    pub fn compile(&self) -> Result<(), GraphError> {
        self.graph().compile(&self.ctx)
    }

    /// Execute one frame
    ///
    /// Protocol: drain deferred signals (device sync runs before any node
    /// work), skip when paused, recompile the dirty subgraph, then execute
    /// nodes in topological order and aggregate the present result.
    pub fn render_frame(&mut self) -> Result<FrameOutcome, FrameError> {
        let (paused, resized, reloads, syncs) = {
            let mut signals = self.signals.lock().expect("signal lock poisoned");
            (
                signals.paused,
                signals.resized.take(),
                std::mem::take(&mut signals.shader_reloads),
                std::mem::take(&mut signals.sync_requests),
            )
        };

        for scope in syncs {
            self.run_device_sync(&scope);
        }

        if resized.is_some() || !reloads.is_empty() {
            let mut graph = self.graph();
            if resized.is_some() {
                invalidate_surface_nodes(&mut graph);
            }
            for path in &reloads {
                invalidate_shader_users(&mut graph, &self.ctx.registry, path);
            }
        }

        if paused {
            log::trace!("render paused; skipping frame");
            return Ok(FrameOutcome::Skipped);
        }

        let mut graph = self.graph.lock().expect("graph lock poisoned");

        if !graph.is_compiled() || graph.needs_compile() {
            graph.compile(&self.ctx)?;
        }

        let order: Vec<NodeHandle> = graph.execution_order().to_vec();

        // Last frame's completions become executable again.
        for &key in &order {
            if graph.node_state(key) == Some(NodeState::Complete) {
                if let Some(node) = graph.node_mut(key) {
                    node.set_state(NodeState::Compiled);
                }
            }
        }

        for &key in &order {
            let Some(node) = graph.node(key) else { continue };
            if node.state() != NodeState::Compiled || !node.is_enabled() {
                continue;
            }
            let name = node.name().to_string();

            if let Some(node) = graph.node_mut(key) {
                node.set_state(NodeState::Executing);
            }
            let inputs = graph.gather_inputs(key);
            let result = graph
                .node_mut(key)
                .map_or(Ok(()), |node| node.run_execute(&self.ctx, &inputs));

            match result {
                Ok(()) => {
                    if let Some(node) = graph.node_mut(key) {
                        node.set_state(NodeState::Complete);
                    }
                }
                Err(NodeError::SwapchainOutOfDate) => {
                    log::info!("node '{name}' reported out-of-date swapchain");
                    if let Some(node) = graph.node_mut(key) {
                        node.set_state(NodeState::Dirty);
                    }
                    let _ = graph.mark_dirty(key);
                    return Err(FrameError::OutOfDate);
                }
                Err(NodeError::Gpu(e)) if e.is_device_lost() => {
                    if let Some(node) = graph.node_mut(key) {
                        node.set_state(NodeState::Error);
                    }
                    return Err(FrameError::DeviceLost);
                }
                Err(e) => {
                    if let Some(node) = graph.node_mut(key) {
                        node.set_state(NodeState::Error);
                    }
                    return Err(FrameError::NodeExecutionFailed { node: name, cause: e.to_string() });
                }
            }
        }

        // Aggregate the present result.
        let mut out_of_date_at: Option<NodeHandle> = None;
        let mut suboptimal = false;
        for &key in &order {
            let Some(node) = graph.node(key) else { continue };
            for resource in node.outputs().iter() {
                match resource.as_present_result() {
                    Some(PresentOutcome::OutOfDate) => out_of_date_at = Some(key),
                    Some(PresentOutcome::Suboptimal) => suboptimal = true,
                    _ => {}
                }
            }
        }
        if let Some(key) = out_of_date_at {
            let _ = graph.mark_dirty(key);
            return Err(FrameError::OutOfDate);
        }
        if suboptimal {
            log::debug!("present reported suboptimal swapchain");
        }

        Ok(FrameOutcome::Rendered)
    }

    /// Tear down the graph and remove the executor's subscriptions
    pub fn destroy(&mut self) {
        self.graph().destroy(&self.ctx);
        for id in self.subscriptions.drain(..) {
            self.ctx.bus.unsubscribe(id);
        }
    }

    /// Wait for idle on the scoped devices and publish completion
    fn run_device_sync(&self, scope: &DeviceSyncScope) {
        let devices: Vec<DeviceId> = match scope {
            DeviceSyncScope::AllDevices => self.ctx.facade.devices(),
            DeviceSyncScope::ForDevices(list) => list.clone(),
            DeviceSyncScope::ForNodes(names) => {
                let graph = self.graph();
                let mut devices: Vec<DeviceId> = names
                    .iter()
                    .filter_map(|name| graph.handle_by_name(name))
                    .filter_map(|handle| graph.node(handle).and_then(|n| n.device()))
                    .collect();
                devices.sort_unstable();
                devices.dedup();
                devices
            }
        };

        let started = Instant::now();
        for &device in &devices {
            if let Err(e) = self.ctx.facade.wait_idle(device) {
                log::error!("device sync wait_idle failed on {device}: {e}");
            }
        }
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        // Immediate publish so completion is observable before any frame
        // work that follows the sync.
        self.ctx.bus.publish_immediate(Message::new(
            self.sender,
            MessagePayload::DeviceSyncCompleted { device_count: devices.len(), duration_ms },
        ));
    }
}
