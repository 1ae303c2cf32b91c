//! End-to-end scenarios over the mock facade
//!
//! Covers the canonical present pipeline, cache concurrency and cleanup,
//! invalidation cascades, cycle rejection, the worker round trip, and
//! device-sync ordering.

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::events::{
    DeviceSyncScope, Message, MessageFilter, MessagePayload, MessageType, PauseAction, PauseReason,
    WorkerResult,
};
use crate::foundation::logging;
use crate::gpu::{AcquireOutcome, GpuFacade, PipelineLayoutDesc, PresentOutcome};
use crate::graph::node::{GraphContext, NodeContext, NodeError, NodeOutputs, RenderNode};
use crate::graph::node_type::{NodeType, NodeTypeRegistry};
use crate::graph::{
    ElementType, FrameError, FrameOutcome, GraphError, NodeHandle, NodeState, RenderGraph,
};
use crate::resources::{CacheRegistry, PipelineLayoutCache, ResourceCacher, ResourceError, ResourceTag};
use crate::tests::mock::{MockGpu, MockImageLoader, MockShaderCompiler};
use ash::vk::Handle;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

fn test_engine() -> (Engine, Arc<MockGpu>, Arc<MockShaderCompiler>) {
    logging::init_for_tests();
    let gpu = Arc::new(MockGpu::new(1));
    let shaders = Arc::new(MockShaderCompiler::default());
    let engine = Engine::new(
        EngineConfig::default(),
        Arc::clone(&gpu) as Arc<dyn GpuFacade>,
        Arc::clone(&shaders) as _,
        Arc::new(MockImageLoader) as _,
    )
    .expect("engine construction");
    (engine, gpu, shaders)
}

struct PresentPipeline {
    dev: NodeHandle,
    sync: NodeHandle,
    swap: NodeHandle,
    cmd: NodeHandle,
    rp: NodeHandle,
    fb: NodeHandle,
    geo: NodeHandle,
    pres: NodeHandle,
}

/// Wire the canonical minimal present pipeline
fn build_present_pipeline(graph: &mut RenderGraph) -> PresentPipeline {
    let dev = graph.add_node("Device", "dev").unwrap();
    let win = graph.add_node("Window", "win").unwrap();
    let sync = graph.add_node("FrameSync", "sync").unwrap();
    let swap = graph.add_node("Swapchain", "swap").unwrap();
    let cmd = graph.add_node("CommandPool", "cmd").unwrap();
    let rp = graph.add_node("RenderPass", "rp").unwrap();
    let fb = graph.add_node("Framebuffer", "fb").unwrap();
    let geo = graph.add_node("GeometryRender", "geo").unwrap();
    let pres = graph.add_node("Present", "pres").unwrap();

    graph.connect(dev, 0, sync, 0).unwrap();
    graph.connect(dev, 0, swap, 0).unwrap();
    graph.connect(win, 0, swap, 1).unwrap();
    graph.connect(sync, 0, swap, 2).unwrap();
    graph.connect(dev, 0, cmd, 0).unwrap();
    graph.connect(dev, 0, rp, 0).unwrap();
    graph.connect(swap, 0, rp, 1).unwrap();
    graph.connect(dev, 0, fb, 0).unwrap();
    graph.connect(rp, 0, fb, 1).unwrap();
    graph.connect(swap, 0, fb, 2).unwrap();
    graph.connect(dev, 0, geo, 0).unwrap();
    graph.connect(rp, 0, geo, 1).unwrap();
    graph.connect(fb, 0, geo, 2).unwrap();
    graph.connect(cmd, 0, geo, 3).unwrap();
    graph.connect(sync, 0, geo, 4).unwrap();
    graph.connect(swap, 1, geo, 5).unwrap();
    graph.connect(swap, 2, geo, 6).unwrap();
    graph.connect(dev, 0, pres, 0).unwrap();
    graph.connect(swap, 0, pres, 1).unwrap();
    graph.connect(swap, 1, pres, 2).unwrap();
    graph.connect(geo, 0, pres, 3).unwrap();

    PresentPipeline { dev, sync, swap, cmd, rp, fb, geo, pres }
}

fn position(order: &[NodeHandle], handle: NodeHandle) -> usize {
    order.iter().position(|&k| k == handle).expect("node missing from execution order")
}

// A minimal pass-through node type for pure topology tests.
struct Passthrough;

impl RenderNode for Passthrough {
    fn compile(
        &mut self,
        _ctx: &NodeContext<'_>,
        outputs: &mut NodeOutputs,
    ) -> Result<(), NodeError> {
        outputs.set(
            0,
            crate::graph::resource::NodeResource::new(
                "out",
                "test signal",
                crate::graph::resource::ResourceValue::Semaphore(ash::vk::Semaphore::from_raw(1)),
            ),
        );
        Ok(())
    }
}

fn passthrough_types() -> Arc<NodeTypeRegistry> {
    let mut types = NodeTypeRegistry::new();
    types
        .register(
            NodeType::builder("Passthrough")
                .nullable_input("in", ElementType::Semaphore)
                .output("out", ElementType::Semaphore)
                .build(|| Box::new(Passthrough)),
        )
        .unwrap();
    types
        .register(
            NodeType::builder("Collector")
                .variadic_input("in", ElementType::Semaphore, 0)
                .output("out", ElementType::Semaphore)
                .build(|| Box::new(Passthrough)),
        )
        .unwrap();
    Arc::new(types)
}

fn bare_context(gpu: &Arc<MockGpu>) -> GraphContext {
    GraphContext {
        facade: Arc::clone(gpu) as Arc<dyn GpuFacade>,
        registry: Arc::new(CacheRegistry::new()),
        bus: Arc::new(crate::events::MessageBus::new()),
    }
}

#[test]
fn s1_minimal_present_pipeline() {
    let (mut engine, gpu, _) = test_engine();
    let p = {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph)
    };

    engine.executor().compile().unwrap();

    {
        let graph = engine.executor().graph();
        let order = graph.execution_order().to_vec();
        assert!(position(&order, p.dev) < position(&order, p.swap));
        assert!(position(&order, p.sync) < position(&order, p.swap));
        assert!(position(&order, p.swap) < position(&order, p.fb));
        assert!(position(&order, p.fb) < position(&order, p.geo));
        assert!(position(&order, p.geo) < position(&order, p.pres));
        for &key in &order {
            assert_eq!(graph.node_state(key), Some(NodeState::Compiled));
        }
    }

    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);

    {
        let graph = engine.executor().graph();
        assert_eq!(graph.node_state(p.geo), Some(NodeState::Complete));
        assert_eq!(graph.node_state(p.pres), Some(NodeState::Complete));
    }

    // Acquire happens before the submission, which happens before present.
    let events = gpu.events();
    let acquire = events.iter().position(|&e| e == "acquire").unwrap();
    let submit = events.iter().position(|&e| e == "submit").unwrap();
    let present = events.iter().position(|&e| e == "present").unwrap();
    assert!(acquire < submit && submit < present);
}

#[test]
fn s2_cache_hit_and_cleanup() {
    logging::init_for_tests();
    let gpu = Arc::new(MockGpu::new(1));
    let device = gpu.devices()[0];
    let registry = CacheRegistry::new();
    let cacher = Arc::new(PipelineLayoutCache::new(
        device,
        Arc::clone(&gpu) as Arc<dyn GpuFacade>,
    ));
    registry.register_cacher(Some(device), Arc::clone(&cacher) as _).unwrap();

    let desc = PipelineLayoutDesc::default();
    let barrier = Arc::new(Barrier::new(2));
    let (first, second) = std::thread::scope(|scope| {
        let a = scope.spawn(|| {
            barrier.wait();
            cacher.get_or_create(&desc).unwrap()
        });
        let b = scope.spawn(|| {
            barrier.wait();
            cacher.get_or_create(&desc).unwrap()
        });
        (a.join().unwrap(), b.join().unwrap())
    });

    // Exactly one underlying create; both callers share the wrapper.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(gpu.created_count("create_pipeline_layout"), 1);
    let stats = cacher.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));

    let raw = first.layout.as_raw();
    assert_eq!(registry.clear_device_caches(device), 1);
    assert!(gpu.was_destroyed(raw));
    assert_eq!(cacher.stats().entries, 0);

    // The device slot is gone; the same kind can be registered again.
    assert!(matches!(
        registry.get_cacher(ResourceTag::PipelineLayout, Some(device)),
        Err(ResourceError::NotRegistered { .. })
    ));
    registry
        .register_cacher(
            Some(device),
            Arc::new(PipelineLayoutCache::new(device, Arc::clone(&gpu) as _)) as _,
        )
        .unwrap();
}

#[test]
fn s3_window_resize_cascade() {
    let (mut engine, gpu, _) = test_engine();
    let p = {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph)
    };
    engine.executor().compile().unwrap();
    engine.pump().unwrap();

    gpu.set_extent(1920, 1080);
    engine.bus().publish(Message::new(
        1,
        MessagePayload::WindowResized { new_width: 1920, new_height: 1080 },
    ));
    engine.bus().process();

    {
        let graph = engine.executor().graph();
        // The swapchain node and every transitive dependent are dirty.
        for handle in [p.swap, p.rp, p.fb, p.geo, p.pres] {
            assert_eq!(graph.node_state(handle), Some(NodeState::Dirty));
        }
        // Pure upstream nodes are untouched.
        assert_eq!(graph.node_state(p.dev), Some(NodeState::Complete));
        assert_eq!(graph.node_state(p.cmd), Some(NodeState::Complete));
    }

    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
    assert_eq!(gpu.created_count("create_swapchain"), 2);
    let graph = engine.executor().graph();
    assert_eq!(graph.node_state(p.swap), Some(NodeState::Complete));
    assert_eq!(graph.node_state(p.pres), Some(NodeState::Complete));
}

#[test]
fn s4_cycle_detection() {
    logging::init_for_tests();
    let gpu = Arc::new(MockGpu::new(1));
    let ctx = bare_context(&gpu);
    let mut graph = RenderGraph::new(passthrough_types());

    let a = graph.add_node("Passthrough", "a").unwrap();
    let b = graph.add_node("Passthrough", "b").unwrap();
    graph.connect(a, 0, b, 0).unwrap();
    graph.compile(&ctx).unwrap();
    let order_before = graph.execution_order().to_vec();

    let err = graph.connect(b, 0, a, 0).unwrap_err();
    assert!(matches!(err, GraphError::WouldCycle { .. }));

    // Self-loops are cycles too.
    let err = graph.connect(a, 0, a, 0).unwrap_err();
    assert!(matches!(err, GraphError::WouldCycle { .. }));

    // The previously successful compile result is still valid.
    graph.compile(&ctx).unwrap();
    assert_eq!(graph.execution_order(), order_before.as_slice());
}

#[derive(Debug)]
struct Computed {
    work_id: u64,
    value: i32,
}

impl WorkerResult for Computed {
    fn work_id(&self) -> u64 {
        self.work_id
    }

    fn sender(&self) -> u32 {
        7
    }

    fn success(&self) -> bool {
        true
    }

    fn error(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn s5_worker_round_trip() {
    let (engine, _, _) = test_engine();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    engine.bus().subscribe_worker_result::<Computed, _>(move |result| {
        sink.lock().unwrap().push((result.value, result.success()));
    });

    let worker = engine.worker().expect("worker enabled by default");
    worker.submit_work(7, |work| {
        Ok(Box::new(Computed { work_id: work.0, value: 42 }) as Box<dyn WorkerResult>)
    });

    for _ in 0..200 {
        engine.bus().process();
        if !received.lock().unwrap().is_empty() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    assert_eq!(received.lock().unwrap().as_slice(), &[(42, true)]);
}

#[test]
fn s6_device_sync_ordering() {
    let (mut engine, gpu, _) = test_engine();
    {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph);
    }
    engine.executor().compile().unwrap();

    // Record, at completion-delivery time, how many submissions had run.
    let completion: Arc<Mutex<Option<(usize, u64)>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&completion);
    let gpu_probe = Arc::clone(&gpu);
    engine.bus().subscribe(
        MessageFilter::Type(MessageType::DeviceSyncCompleted),
        move |message| {
            if let MessagePayload::DeviceSyncCompleted { duration_ms, .. } = &message.payload {
                let submits = gpu_probe.events().iter().filter(|&&e| e == "submit").count();
                *sink.lock().unwrap() = Some((submits, *duration_ms));
            }
            true
        },
    );

    engine.bus().publish_immediate(Message::new(
        1,
        MessagePayload::DeviceSyncRequested {
            scope: DeviceSyncScope::AllDevices,
            reason: "test".to_string(),
        },
    ));

    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);

    // Completion was observed before this frame recorded or submitted.
    let (submits_at_completion, duration_ms) = completion.lock().unwrap().expect("sync completed");
    assert_eq!(submits_at_completion, 0);
    let _ = duration_ms; // duration is unsigned; presence is the assertion

    let events = gpu.events();
    let wait = events.iter().position(|&e| e == "wait_idle").unwrap();
    let begin = events.iter().position(|&e| e == "begin_cmd").unwrap();
    assert!(wait < begin, "frame recording must start after wait_idle");
}

#[test]
fn execution_order_breaks_ties_by_registration() {
    logging::init_for_tests();
    let gpu = Arc::new(MockGpu::new(1));
    let ctx = bare_context(&gpu);
    let mut graph = RenderGraph::new(passthrough_types());

    let a = graph.add_node("Passthrough", "a").unwrap();
    let b = graph.add_node("Passthrough", "b").unwrap();
    let c = graph.add_node("Passthrough", "c").unwrap();
    graph.compile(&ctx).unwrap();
    assert_eq!(graph.execution_order(), &[a, b, c]);

    // An edge c -> a reorders only what the edge requires.
    graph.connect(c, 0, a, 0).unwrap();
    graph.compile(&ctx).unwrap();
    assert_eq!(graph.execution_order(), &[b, c, a]);
}

#[test]
fn permuted_registration_respects_the_same_edges() {
    logging::init_for_tests();
    let gpu = Arc::new(MockGpu::new(1));
    let ctx = bare_context(&gpu);

    let build = |names: &[&str]| {
        let mut graph = RenderGraph::new(passthrough_types());
        for name in names {
            graph.add_node("Passthrough", name).unwrap();
        }
        let x = graph.handle_by_name("x").unwrap();
        let y = graph.handle_by_name("y").unwrap();
        let z = graph.handle_by_name("z").unwrap();
        graph.connect(x, 0, y, 0).unwrap();
        graph.connect(y, 0, z, 0).unwrap();
        graph.compile(&ctx).unwrap();
        let order = graph.execution_order().to_vec();
        assert!(position(&order, x) < position(&order, y));
        assert!(position(&order, y) < position(&order, z));
    };

    build(&["x", "y", "z"]);
    build(&["z", "y", "x"]);
    build(&["y", "x", "z"]);
}

#[test]
fn variadic_input_keeps_connection_order() {
    logging::init_for_tests();
    let gpu = Arc::new(MockGpu::new(1));
    let ctx = bare_context(&gpu);
    let mut graph = RenderGraph::new(passthrough_types());

    let a = graph.add_node("Passthrough", "a").unwrap();
    let b = graph.add_node("Passthrough", "b").unwrap();
    let collector = graph.add_node("Collector", "collector").unwrap();

    // Duplicate edges into a variadic input are permitted.
    graph.connect(a, 0, collector, 0).unwrap();
    graph.connect(b, 0, collector, 0).unwrap();
    graph.connect(a, 0, collector, 0).unwrap();
    graph.compile(&ctx).unwrap();

    let inputs = graph.gather_inputs(collector);
    assert_eq!(inputs[0].len(), 3);
}

#[test]
fn structural_validation_errors() {
    let (engine, _, _) = test_engine();
    let mut graph = engine.executor().graph();

    assert!(matches!(
        graph.add_node("NoSuchType", "n"),
        Err(GraphError::UnknownType { .. })
    ));

    let dev = graph.add_node("Device", "dev").unwrap();
    assert!(matches!(
        graph.add_node("Device", "dev"),
        Err(GraphError::DuplicateInstance { .. })
    ));

    let win = graph.add_node("Window", "win").unwrap();
    let swap = graph.add_node("Swapchain", "swap").unwrap();

    // Window output into the device slot is a type mismatch.
    assert!(matches!(
        graph.connect(win, 0, swap, 0),
        Err(GraphError::TypeMismatch { .. })
    ));

    // Slot indices are validated on both ends.
    assert!(matches!(
        graph.connect(dev, 9, swap, 0),
        Err(GraphError::SlotOutOfRange { is_input: false, .. })
    ));
    assert!(matches!(
        graph.connect(dev, 0, swap, 9),
        Err(GraphError::SlotOutOfRange { is_input: true, .. })
    ));

    // A non-variadic input takes exactly one connection.
    graph.connect(win, 0, swap, 1).unwrap();
    assert!(matches!(
        graph.connect(win, 0, swap, 1),
        Err(GraphError::InputAlreadyConnected { .. })
    ));
}

#[test]
fn unconnected_required_input_fails_compile() {
    let (engine, _, _) = test_engine();
    let mut graph = engine.executor().graph();
    let dev = graph.add_node("Device", "dev").unwrap();
    let swap = graph.add_node("Swapchain", "swap").unwrap();
    graph.connect(dev, 0, swap, 0).unwrap();
    // window and frame_sync stay unconnected

    let err = graph.compile(engine.executor().context()).unwrap_err();
    assert!(matches!(err, GraphError::UnconnectedRequiredInput { .. }));
    // Validation aborted before any state change.
    assert_eq!(graph.node_state(dev), Some(NodeState::Created));
}

#[test]
fn variadic_underflow_fails_compile() {
    // A pipeline without the geo -> pres edge underflows the present
    // node's variadic wait minimum of one.
    let (engine, _, _) = test_engine();
    let mut graph = engine.executor().graph();
    let dev = graph.add_node("Device", "dev").unwrap();
    let win = graph.add_node("Window", "win").unwrap();
    let sync = graph.add_node("FrameSync", "sync").unwrap();
    let swap = graph.add_node("Swapchain", "swap").unwrap();
    let pres = graph.add_node("Present", "pres").unwrap();
    graph.connect(dev, 0, sync, 0).unwrap();
    graph.connect(dev, 0, swap, 0).unwrap();
    graph.connect(win, 0, swap, 1).unwrap();
    graph.connect(sync, 0, swap, 2).unwrap();
    graph.connect(dev, 0, pres, 0).unwrap();
    graph.connect(swap, 0, pres, 1).unwrap();
    graph.connect(swap, 1, pres, 2).unwrap();

    let err = graph.compile(engine.executor().context()).unwrap_err();
    assert!(matches!(
        err,
        GraphError::VariadicUnderflow { min: 1, got: 0, .. }
    ));
}

#[test]
fn empty_graph_compiles_and_renders() {
    let (mut engine, _, _) = test_engine();
    engine.executor().compile().unwrap();
    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
}

#[test]
fn mark_dirty_then_compile_matches_fresh_state() {
    let (mut engine, _, _) = test_engine();
    let p = {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph)
    };
    engine.executor().compile().unwrap();
    let order_fresh = engine.executor().graph().execution_order().to_vec();
    engine.pump().unwrap();

    {
        let mut graph = engine.executor().graph();
        graph.mark_dirty(p.swap).unwrap();
        assert!(graph.has_dirty());
    }
    engine.executor().compile().unwrap();

    let graph = engine.executor().graph();
    assert_eq!(graph.execution_order(), order_fresh.as_slice());
    for &key in &order_fresh {
        assert_eq!(graph.node_state(key), Some(NodeState::Compiled));
    }
}

#[test]
fn render_pause_skips_frames() {
    let (mut engine, gpu, _) = test_engine();
    {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph);
    }
    engine.executor().compile().unwrap();

    engine.bus().publish(Message::new(
        1,
        MessagePayload::RenderPause {
            reason: PauseReason::SwapchainRecreation,
            action: PauseAction::PauseStart,
        },
    ));
    assert_eq!(engine.pump().unwrap(), FrameOutcome::Skipped);
    assert_eq!(gpu.events().iter().filter(|&&e| e == "present").count(), 0);

    engine.bus().publish(Message::new(
        1,
        MessagePayload::RenderPause {
            reason: PauseReason::SwapchainRecreation,
            action: PauseAction::PauseEnd,
        },
    ));
    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
    assert_eq!(gpu.events().iter().filter(|&&e| e == "present").count(), 1);
}

#[test]
fn out_of_date_acquire_rebuilds_swapchain() {
    let (mut engine, gpu, _) = test_engine();
    {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph);
    }
    engine.executor().compile().unwrap();

    gpu.script_acquire(AcquireOutcome::OutOfDate);
    assert!(matches!(engine.pump(), Err(FrameError::OutOfDate)));

    // The swapchain node marked itself dirty; the next frame rebuilds it.
    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
    assert_eq!(gpu.created_count("create_swapchain"), 2);
}

#[test]
fn out_of_date_present_result_aborts_frame() {
    let (mut engine, gpu, _) = test_engine();
    {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph);
    }
    engine.executor().compile().unwrap();

    gpu.script_present(PresentOutcome::OutOfDate);
    assert!(matches!(engine.pump(), Err(FrameError::OutOfDate)));
    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
}

#[test]
fn shader_reload_invalidates_matching_pipelines() {
    let (mut engine, _, shaders) = test_engine();
    let p = {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph)
    };
    engine.executor().compile().unwrap();
    engine.pump().unwrap();
    let produced_before = shaders.produced();

    engine.bus().publish(Message::new(
        1,
        MessagePayload::ShaderReloaded { path: "shaders/fullscreen.frag".to_string() },
    ));
    engine.bus().process();

    {
        let graph = engine.executor().graph();
        assert_eq!(graph.node_state(p.geo), Some(NodeState::Dirty));
        // Unrelated nodes keep their state.
        assert_eq!(graph.node_state(p.swap), Some(NodeState::Complete));
    }

    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
    // The evicted fragment bytecode recompiled; the vertex stage hit the cache.
    assert_eq!(shaders.produced(), produced_before + 1);
}

#[test]
fn execution_failure_sets_error_until_reset() {
    let (mut engine, gpu, _) = test_engine();
    let p = {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph)
    };
    engine.executor().compile().unwrap();

    gpu.fail_next("begin_cmd");
    match engine.pump() {
        Err(FrameError::NodeExecutionFailed { node, .. }) => assert_eq!(node, "geo"),
        other => panic!("expected node execution failure, got {other:?}"),
    }
    assert_eq!(engine.executor().graph().node_state(p.geo), Some(NodeState::Error));

    // Error is terminal until the node is explicitly reset.
    engine.executor().graph().reset_node(p.geo).unwrap();
    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
    assert_eq!(engine.executor().graph().node_state(p.geo), Some(NodeState::Complete));
}

#[test]
fn disabled_node_is_skipped() {
    let (mut engine, gpu, _) = test_engine();
    let p = {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph)
    };
    engine.executor().compile().unwrap();
    engine.executor().graph().set_enabled(p.pres, false).unwrap();

    assert_eq!(engine.pump().unwrap(), FrameOutcome::Rendered);
    assert_eq!(gpu.events().iter().filter(|&&e| e == "present").count(), 0);
}

#[test]
fn shutdown_cleans_devices_and_publishes_completion() {
    let (mut engine, gpu, _) = test_engine();
    {
        let mut graph = engine.executor().graph();
        build_present_pipeline(&mut graph);
    }
    engine.executor().compile().unwrap();
    engine.pump().unwrap();

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    engine.bus().subscribe(
        MessageFilter::Type(MessageType::CleanupCompleted),
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        },
    );

    engine.shutdown();

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    // Cached pipeline objects were destroyed through their cachers.
    assert!(gpu.events().iter().any(|&e| e == "destroy_pipeline"));
    assert!(gpu.events().iter().any(|&e| e == "destroy_render_pass"));
    // Node-owned objects went through graph teardown.
    assert!(gpu.events().iter().any(|&e| e == "destroy_swapchain"));
    assert!(gpu.events().iter().any(|&e| e == "destroy_command_pool"));
    assert_eq!(engine.registry().stats().cachers, 0);
}
