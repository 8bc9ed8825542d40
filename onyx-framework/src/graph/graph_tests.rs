use super::*;
use onyx_api::*;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

//
// A device double that hands out numbered handles and tallies every call, so
// tests can assert exactly which GPU work a graph would have issued.
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordedTransition {
    resource: u64,
    src_state: OnyxResourceState,
    dst_state: OnyxResourceState,
}

#[derive(Default)]
struct TestDeviceInner {
    next_raw: AtomicU64,
    textures_created: AtomicU32,
    textures_destroyed: AtomicU32,
    buffers_created: AtomicU32,
    buffers_destroyed: AtomicU32,
    views_created: AtomicU32,
    views_destroyed: AtomicU32,
    render_passes_begun: AtomicU32,
    barrier_batches: Mutex<Vec<Vec<RecordedTransition>>>,
}

#[derive(Clone, Default)]
struct TestDevice {
    inner: Arc<TestDeviceInner>,
}

impl TestDevice {
    fn next_raw(&self) -> u64 {
        self.inner.next_raw.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn textures_created(&self) -> u32 {
        self.inner.textures_created.load(Ordering::Relaxed)
    }

    fn textures_destroyed(&self) -> u32 {
        self.inner.textures_destroyed.load(Ordering::Relaxed)
    }

    fn views_created(&self) -> u32 {
        self.inner.views_created.load(Ordering::Relaxed)
    }

    fn views_destroyed(&self) -> u32 {
        self.inner.views_destroyed.load(Ordering::Relaxed)
    }

    fn render_passes_begun(&self) -> u32 {
        self.inner.render_passes_begun.load(Ordering::Relaxed)
    }

    fn transitions(&self) -> Vec<RecordedTransition> {
        self.inner
            .barrier_batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .copied()
            .collect()
    }

    fn barrier_batch_count(&self) -> usize {
        self.inner.barrier_batches.lock().unwrap().len()
    }
}

impl OnyxDevice for TestDevice {
    fn create_texture(
        &self,
        def: &OnyxTextureDef,
    ) -> OnyxResult<OnyxTexture> {
        self.inner.textures_created.fetch_add(1, Ordering::Relaxed);
        Ok(OnyxTexture::new(self.next_raw(), def.clone()))
    }

    fn destroy_texture(
        &self,
        _texture: &OnyxTexture,
    ) {
        self.inner
            .textures_destroyed
            .fetch_add(1, Ordering::Relaxed);
    }

    fn create_buffer(
        &self,
        def: &OnyxBufferDef,
    ) -> OnyxResult<OnyxBuffer> {
        self.inner.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(OnyxBuffer::new(self.next_raw(), def.clone()))
    }

    fn destroy_buffer(
        &self,
        _buffer: &OnyxBuffer,
    ) {
        self.inner.buffers_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    fn create_texture_view(
        &self,
        _texture: &OnyxTexture,
        _view_type: OnyxDescriptorType,
        _view_def: &OnyxTextureViewDef,
    ) -> OnyxResult<OnyxDescriptor> {
        self.inner.views_created.fetch_add(1, Ordering::Relaxed);
        Ok(OnyxDescriptor::new(self.next_raw()))
    }

    fn create_buffer_view(
        &self,
        _buffer: &OnyxBuffer,
        _view_type: OnyxDescriptorType,
        _view_def: &OnyxBufferViewDef,
    ) -> OnyxResult<OnyxDescriptor> {
        self.inner.views_created.fetch_add(1, Ordering::Relaxed);
        Ok(OnyxDescriptor::new(self.next_raw()))
    }

    fn destroy_view(
        &self,
        _view: OnyxDescriptor,
    ) {
        self.inner.views_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    fn new_command_list(&self) -> OnyxResult<OnyxCommandList> {
        Ok(OnyxCommandList::new(self.next_raw()))
    }

    fn cmd_resource_barrier(
        &self,
        _command_list: &OnyxCommandList,
        buffer_barriers: &[OnyxBufferBarrier<'_>],
        texture_barriers: &[OnyxTextureBarrier<'_>],
    ) -> OnyxResult<()> {
        let mut batch = Vec::with_capacity(buffer_barriers.len() + texture_barriers.len());
        for barrier in buffer_barriers {
            batch.push(RecordedTransition {
                resource: barrier.buffer.raw(),
                src_state: barrier.src_state,
                dst_state: barrier.dst_state,
            });
        }
        for barrier in texture_barriers {
            batch.push(RecordedTransition {
                resource: barrier.texture.raw(),
                src_state: barrier.src_state,
                dst_state: barrier.dst_state,
            });
        }
        self.inner.barrier_batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _command_list: &OnyxCommandList,
        render_pass_def: &OnyxRenderPassDef,
    ) -> OnyxResult<()> {
        assert!(
            render_pass_def.width > 0 && render_pass_def.height > 0,
            "render pass with zero-sized viewport"
        );
        self.inner
            .render_passes_begun
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn cmd_end_render_pass(
        &self,
        _command_list: &OnyxCommandList,
    ) -> OnyxResult<()> {
        Ok(())
    }

    fn cmd_set_viewport(
        &self,
        _command_list: &OnyxCommandList,
        _width: u32,
        _height: u32,
    ) -> OnyxResult<()> {
        Ok(())
    }
}

fn init_log() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

fn test_device() -> (TestDevice, RenderGraphResourcePool) {
    let device = TestDevice::default();
    let pool = RenderGraphResourcePool::new(Arc::new(device.clone()));
    (device, pool)
}

fn color_target_def(
    width: u32,
    height: u32,
    format: OnyxFormat,
) -> OnyxTextureDef {
    OnyxTextureDef {
        extents: OnyxExtents3D {
            width,
            height,
            depth: 1,
        },
        format,
        clear_value: Some(OnyxClearValue::Color(OnyxColorClearValue([0.0; 4]))),
        ..Default::default()
    }
}

fn depth_target_def(
    width: u32,
    height: u32,
) -> OnyxTextureDef {
    OnyxTextureDef {
        extents: OnyxExtents3D {
            width,
            height,
            depth: 1,
        },
        format: OnyxFormat::D32_SFLOAT,
        clear_value: Some(OnyxClearValue::DepthStencil(OnyxDepthStencilClearValue {
            depth: 1.0,
            stencil: 0,
        })),
        ..Default::default()
    }
}

fn backbuffer_texture(device: &TestDevice) -> OnyxTexture {
    device
        .create_texture(&OnyxTextureDef {
            extents: OnyxExtents3D {
                width: 900,
                height: 600,
                depth: 1,
            },
            format: OnyxFormat::B8G8R8A8_UNORM,
            resource_type: OnyxResourceType::RENDER_TARGET_COLOR,
            initial_state: OnyxResourceState::PRESENT,
            ..Default::default()
        })
        .unwrap()
}

fn noop_setup(
    _data: &mut (),
    _builder: &mut RenderGraphBuilder,
) {
}

fn noop_execute(
    _data: &(),
    _context: &RenderGraphContext,
    _command_list: &OnyxCommandList,
) -> OnyxResult<()> {
    Ok(())
}

struct FrameConfig {
    width: u32,
    height: u32,
}

#[test]
fn graph_smoketest() {
    init_log();
    let (device, pool) = test_device();
    let backbuffer = backbuffer_texture(&device);
    let pass_runs = Arc::new(AtomicU32::new(0));

    {
        let mut graph = RenderGraph::new(pool.clone());
        graph.blackboard_mut().add(FrameConfig {
            width: 900,
            height: 600,
        });
        graph.import_texture("backbuffer", &backbuffer);

        #[derive(Default)]
        struct DepthPrepassData {
            depth: RenderGraphDepthStencilId,
        }
        let runs = pass_runs.clone();
        graph.add_pass(
            "depth_prepass",
            |data: &mut DepthPrepassData, builder: &mut RenderGraphBuilder| {
                let config = builder.blackboard().get::<FrameConfig>();
                let (width, height) = (config.width, config.height);
                builder.create_texture("depth", depth_target_def(width, height));
                data.depth = builder.write_depth_stencil(
                    "depth",
                    OnyxLoadOp::Clear,
                    OnyxStoreOp::Store,
                    Default::default(),
                );
                builder.set_viewport(width, height);
            },
            move |data, context, _command_list| {
                let _ = context.depth_stencil(data.depth);
                runs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            RenderGraphPassType::Graphics,
            RenderGraphPassFlags::empty(),
        );

        #[derive(Default)]
        struct GBufferData {
            albedo: RenderGraphRenderTargetId,
            normal: RenderGraphRenderTargetId,
        }
        let runs = pass_runs.clone();
        graph.add_pass(
            "gbuffer",
            |data: &mut GBufferData, builder: &mut RenderGraphBuilder| {
                builder.create_texture(
                    "gbuffer_albedo",
                    color_target_def(900, 600, OnyxFormat::R8G8B8A8_UNORM),
                );
                builder.create_texture(
                    "gbuffer_normal",
                    color_target_def(900, 600, OnyxFormat::R16G16B16A16_SFLOAT),
                );
                data.albedo = builder.write_render_target(
                    "gbuffer_albedo",
                    OnyxLoadOp::Clear,
                    OnyxStoreOp::Store,
                    Default::default(),
                );
                data.normal = builder.write_render_target(
                    "gbuffer_normal",
                    OnyxLoadOp::Clear,
                    OnyxStoreOp::Store,
                    Default::default(),
                );
                builder.read_depth_stencil("depth", Default::default());
                builder.set_viewport(900, 600);
            },
            move |data, context, _command_list| {
                assert!(context.render_target(data.albedo) != OnyxDescriptor::default());
                assert!(context.render_target(data.normal) != OnyxDescriptor::default());
                runs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            RenderGraphPassType::Graphics,
            RenderGraphPassFlags::empty(),
        );

        #[derive(Default)]
        struct LightingData {
            albedo: RenderGraphTextureReadOnlyId,
            normal: RenderGraphTextureReadOnlyId,
            output: RenderGraphTextureReadWriteId,
        }
        let runs = pass_runs.clone();
        graph.add_pass(
            "deferred_lighting",
            |data: &mut LightingData, builder: &mut RenderGraphBuilder| {
                data.albedo = builder.read_texture(
                    "gbuffer_albedo",
                    RenderGraphReadAccess::NonPixelShader,
                    Default::default(),
                );
                data.normal = builder.read_texture(
                    "gbuffer_normal",
                    RenderGraphReadAccess::NonPixelShader,
                    Default::default(),
                );
                builder.create_texture(
                    "hdr_output",
                    color_target_def(900, 600, OnyxFormat::R16G16B16A16_SFLOAT),
                );
                data.output = builder.write_texture("hdr_output", Default::default());
            },
            move |data, context, _command_list| {
                let _ = context.read_only_texture(data.albedo);
                let _ = context.read_only_texture(data.normal);
                let _ = context.read_write_texture(data.output);
                runs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::empty(),
        );

        #[derive(Default)]
        struct TonemapData {
            hdr: RenderGraphTextureReadOnlyId,
            target: RenderGraphRenderTargetId,
        }
        let runs = pass_runs.clone();
        graph.add_pass(
            "tonemap",
            |data: &mut TonemapData, builder: &mut RenderGraphBuilder| {
                data.hdr = builder.read_texture(
                    "hdr_output",
                    RenderGraphReadAccess::PixelShader,
                    Default::default(),
                );
                data.target = builder.write_render_target(
                    "backbuffer",
                    OnyxLoadOp::DontCare,
                    OnyxStoreOp::Store,
                    Default::default(),
                );
                builder.set_viewport(900, 600);
            },
            move |data, context, _command_list| {
                let _ = context.read_only_texture(data.hdr);
                let _ = context.render_target(data.target);
                runs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            RenderGraphPassType::Graphics,
            RenderGraphPassFlags::empty(),
        );

        graph.build().unwrap();

        // Every pass feeds the next, so each lands in its own level
        assert_eq!(graph.topologically_sorted_passes, vec![0, 1, 2, 3]);
        assert_eq!(graph.dependency_levels.len(), 4);
        assert!(graph.passes.iter().all(|pass| !pass.is_culled()));

        graph.execute().unwrap();

        assert_eq!(pass_runs.load(Ordering::Relaxed), 4);
        // depth, two gbuffer targets, hdr output; the backbuffer was imported
        assert_eq!(device.textures_created(), 1 + 4);
        assert_eq!(device.render_passes_begun(), 3);

        // The imported backbuffer enters the frame in PRESENT and is left in
        // RENDER_TARGET; consuming it further is the caller's business
        assert!(device.transitions().contains(&RecordedTransition {
            resource: backbuffer.raw(),
            src_state: OnyxResourceState::PRESENT,
            dst_state: OnyxResourceState::RENDER_TARGET,
        }));
    }

    // Dropping the graph frees every view it realized
    assert_eq!(device.views_created(), device.views_destroyed());
}

//
// Scheduling properties
//

#[test]
fn reader_is_ordered_after_writer() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "producer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("scene", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("scene", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "consumer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "scene",
                RenderGraphReadAccess::NonPixelShader,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();

    assert_eq!(graph.adjacency_lists[0], vec![1]);
    let order = &graph.topologically_sorted_passes;
    let producer = order.iter().position(|&p| p == 0).unwrap();
    let consumer = order.iter().position(|&p| p == 1).unwrap();
    assert!(producer < consumer);

    // The write hazard forces the consumer into a later level
    assert_eq!(graph.dependency_levels.len(), 2);
    assert_eq!(graph.dependency_levels[0].passes, vec![0]);
    assert_eq!(graph.dependency_levels[1].passes, vec![1]);
}

#[test]
fn independent_passes_share_a_level() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "left",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("left_target", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("left_target", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "right",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("right_target", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("right_target", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();

    assert_eq!(graph.dependency_levels.len(), 1);
    assert_eq!(graph.dependency_levels[0].passes, vec![0, 1]);
}

#[test]
fn no_intra_level_hazards() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    // A diamond plus an unrelated side chain exercises the grouping rule
    graph.add_pass(
        "base",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("base_out", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("base_out", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    for (name, out_name) in [("fork_a", "fork_a_out"), ("fork_b", "fork_b_out")] {
        graph.add_pass(
            name,
            move |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.read_texture(
                    "base_out",
                    RenderGraphReadAccess::NonPixelShader,
                    Default::default(),
                );
                builder.create_texture(
                    out_name,
                    color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM),
                );
                builder.write_texture(out_name, Default::default());
            },
            noop_execute,
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::empty(),
        );
    }
    graph.add_pass(
        "join",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "fork_a_out",
                RenderGraphReadAccess::NonPixelShader,
                Default::default(),
            );
            builder.read_texture(
                "fork_b_out",
                RenderGraphReadAccess::NonPixelShader,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "side_chain",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("side_out", color_target_def(32, 32, OnyxFormat::R32_SFLOAT));
            builder.write_texture("side_out", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();

    // The two forks are independent and share a level
    let fork_level = graph
        .dependency_levels
        .iter()
        .position(|level| level.passes.contains(&1))
        .unwrap();
    assert!(graph.dependency_levels[fork_level].passes.contains(&2));

    // For any two passes within one level, neither's writes intersect the
    // other's reads or writes
    for level in &graph.dependency_levels {
        for &a in &level.passes {
            for &b in &level.passes {
                if a == b {
                    continue;
                }
                let pass_a = &graph.passes[a];
                let pass_b = &graph.passes[b];
                for id in pass_a.texture_writes.iter().chain(&pass_a.texture_creates) {
                    assert!(!pass_b.texture_writes.contains(id));
                    assert!(!pass_b.texture_creates.contains(id));
                    assert!(!pass_b.texture_reads.contains(id));
                }
            }
        }
    }
}

#[test]
fn cycle_is_impossible_by_construction() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    // Mutual read/write of two resources still resolves forward: edges only
    // ever point from earlier to later declarations
    graph.add_pass(
        "ping",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("a", color_target_def(8, 8, OnyxFormat::R32_SFLOAT));
            builder.create_texture("b", color_target_def(8, 8, OnyxFormat::R32_SFLOAT));
            builder.write_texture("a", Default::default());
            builder.read_texture("b", RenderGraphReadAccess::NonPixelShader, Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "pong",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.write_texture("b", Default::default());
            builder.read_texture("a", RenderGraphReadAccess::NonPixelShader, Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    assert!(graph.build().is_ok());
}

//
// Version tracking
//

#[test]
fn versions_increase_monotonically_and_match_writers() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "create_and_write",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("history", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("history", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "first_reader",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "history",
                RenderGraphReadAccess::NonPixelShader,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "second_writer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.write_texture("history", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "second_reader",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "history",
                RenderGraphReadAccess::NonPixelShader,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();

    let id = graph.texture_name_map["history"];

    // Creation produced v0, the creating pass's write v1, the later write v2
    assert_eq!(graph.passes[0].texture_write_versions[&id], 1);
    assert_eq!(graph.passes[2].texture_write_versions[&id], 2);
    assert_eq!(graph.textures[id.index()].version, 2);

    // Each reader observes exactly the version its resolved writer produced
    assert_eq!(
        graph.passes[1].texture_read_versions[&id],
        graph.passes[0].texture_write_versions[&id]
    );
    assert_eq!(
        graph.passes[3].texture_read_versions[&id],
        graph.passes[2].texture_write_versions[&id]
    );

    // Two reads across all passes
    assert_eq!(graph.textures[id.index()].ref_count, 2);
}

//
// Culling
//

#[test]
fn unconsumed_pass_is_culled_with_no_gpu_commands() {
    init_log();
    let (device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "orphan",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("unused", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("unused", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();
    assert!(graph.passes[0].is_culled());

    graph.execute().unwrap();
    assert_eq!(device.textures_created(), 0);
    assert_eq!(device.barrier_batch_count(), 0);
    assert_eq!(device.render_passes_begun(), 0);
}

#[test]
fn empty_pass_is_culled() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "idle",
        noop_setup,
        noop_execute,
        RenderGraphPassType::Graphics,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();
    assert!(graph.passes[0].is_culled());
}

#[test]
fn two_writers_without_readers_are_both_culled() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "first_writer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("scratch", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("scratch", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "second_writer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.write_texture("scratch", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();
    assert!(graph.passes[0].is_culled());
    assert!(graph.passes[1].is_culled());
}

#[test]
fn writing_an_imported_resource_pins_the_chain() {
    init_log();
    let (device, pool) = test_device();
    let backbuffer = backbuffer_texture(&device);
    let ran = Arc::new(AtomicU32::new(0));

    let mut graph = RenderGraph::new(pool);
    graph.import_texture("backbuffer", &backbuffer);

    graph.add_pass(
        "offscreen",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("color", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("color", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    let runs = ran.clone();
    graph.add_pass(
        "present_blit",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "color",
                RenderGraphReadAccess::NonPixelShader,
                Default::default(),
            );
            builder.write_texture("backbuffer", Default::default());
        },
        move |_: &(), _context, _command_list| {
            runs.fetch_add(1, Ordering::Relaxed);
            Ok(())
        },
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();

    // Nothing reads the blit's output, but it writes an imported resource —
    // it survives, and keeps its upstream producer alive
    assert!(!graph.passes[1].is_culled());
    assert!(!graph.passes[0].is_culled());

    graph.execute().unwrap();
    assert_eq!(ran.load(Ordering::Relaxed), 1);
}

#[test]
fn pinned_writer_keeps_the_creating_pass_alive() {
    init_log();
    let (device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "creator",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("feedback", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("feedback", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    // Nothing reads "feedback", but this writer must not run against a
    // resource whose creating pass was culled away
    graph.add_pass(
        "accumulate",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.write_texture("feedback", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::FORCE_NO_CULL,
    );

    graph.build().unwrap();
    assert!(!graph.passes[0].is_culled());
    assert!(!graph.passes[1].is_culled());

    graph.execute().unwrap();
    assert_eq!(device.textures_created(), 1);
}

#[test]
fn buffer_chain_schedules_and_transitions() {
    init_log();
    let (device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    #[derive(Default)]
    struct CullData {
        args: RenderGraphBufferReadWriteId,
    }
    graph.add_pass(
        "gpu_cull",
        |data: &mut CullData, builder: &mut RenderGraphBuilder| {
            builder.create_buffer(
                "draw_args",
                OnyxBufferDef {
                    size: 4 * 1024,
                    resource_type: OnyxResourceType::INDIRECT_BUFFER,
                    ..Default::default()
                },
            );
            data.args = builder.write_buffer("draw_args", Default::default());
        },
        |data, context, _command_list| {
            let _ = context.read_write_buffer(data.args);
            Ok(())
        },
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "draw_indirect",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_indirect_args_buffer("draw_args");
        },
        noop_execute,
        RenderGraphPassType::Graphics,
        RenderGraphPassFlags::FORCE_NO_CULL,
    );

    graph.build().unwrap();
    assert_eq!(graph.dependency_levels.len(), 2);

    graph.execute().unwrap();

    let id = graph.buffer_name_map["draw_args"];
    let raw = graph.buffers[id.index()].resource.as_ref().unwrap().raw();
    let transitions = device.transitions();

    // Fresh buffers start in COMMON; written as UAV, consumed as indirect
    // arguments, then restored for pooling
    assert!(transitions.contains(&RecordedTransition {
        resource: raw,
        src_state: OnyxResourceState::COMMON,
        dst_state: OnyxResourceState::UNORDERED_ACCESS,
    }));
    assert!(transitions.contains(&RecordedTransition {
        resource: raw,
        src_state: OnyxResourceState::UNORDERED_ACCESS,
        dst_state: OnyxResourceState::INDIRECT_ARGUMENT,
    }));
    assert!(transitions.contains(&RecordedTransition {
        resource: raw,
        src_state: OnyxResourceState::INDIRECT_ARGUMENT,
        dst_state: OnyxResourceState::COMMON,
    }));
}

#[test]
fn duplicate_declaration_is_reported() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    for name in ["first_declarer", "second_declarer"] {
        graph.add_pass(
            name,
            |_: &mut (), builder: &mut RenderGraphBuilder| {
                if !builder.is_texture_declared("contested") {
                    builder.create_texture(
                        "contested",
                        color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM),
                    );
                }
                // Skipping the is_texture_declared check is the caller error
                builder.create_texture("always", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            },
            noop_execute,
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::empty(),
        );
    }

    assert_eq!(
        graph.build().unwrap_err(),
        RenderGraphError::Declaration(vec![DeclarationError::DuplicateResource { name: "always" }])
    );
}

#[test]
fn rebuilding_identical_declarations_is_deterministic() {
    init_log();

    fn build_graph(pool: &RenderGraphResourcePool) -> RenderGraph {
        let mut graph = RenderGraph::new(pool.clone());
        graph.add_pass(
            "producer",
            |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.create_texture("a", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
                builder.write_texture("a", Default::default());
            },
            noop_execute,
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::empty(),
        );
        graph.add_pass(
            "orphan",
            |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.create_texture("b", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
                builder.write_texture("b", Default::default());
            },
            noop_execute,
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::empty(),
        );
        graph.add_pass(
            "consumer",
            |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.read_texture(
                    "a",
                    RenderGraphReadAccess::NonPixelShader,
                    Default::default(),
                );
            },
            noop_execute,
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::FORCE_NO_CULL,
        );
        graph.build().unwrap();
        graph
    }

    let (_device, pool) = test_device();
    let first = build_graph(&pool);
    let second = build_graph(&pool);

    assert_eq!(
        first.topologically_sorted_passes,
        second.topologically_sorted_passes
    );
    let levels_of = |graph: &RenderGraph| {
        graph
            .dependency_levels
            .iter()
            .map(|level| level.passes.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(levels_of(&first), levels_of(&second));
    let culled_of = |graph: &RenderGraph| {
        graph
            .passes
            .iter()
            .map(|pass| pass.is_culled())
            .collect::<Vec<_>>()
    };
    assert_eq!(culled_of(&first), culled_of(&second));
}

//
// Barrier synthesis
//

#[test]
fn barriers_track_states_across_levels() {
    init_log();
    let (device, pool) = test_device();
    let backbuffer = backbuffer_texture(&device);

    let mut graph = RenderGraph::new(pool);
    graph.import_texture("backbuffer", &backbuffer);

    graph.add_pass(
        "draw_scene",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("scene", color_target_def(900, 600, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_render_target(
                "scene",
                OnyxLoadOp::Clear,
                OnyxStoreOp::Store,
                Default::default(),
            );
            builder.set_viewport(900, 600);
        },
        noop_execute,
        RenderGraphPassType::Graphics,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "composite",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "scene",
                RenderGraphReadAccess::PixelShader,
                Default::default(),
            );
            builder.write_render_target(
                "backbuffer",
                OnyxLoadOp::DontCare,
                OnyxStoreOp::Store,
                Default::default(),
            );
            builder.set_viewport(900, 600);
        },
        noop_execute,
        RenderGraphPassType::Graphics,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();
    graph.execute().unwrap();

    let scene_id = graph.texture_name_map["scene"];
    let scene_raw = graph.textures[scene_id.index()].resource.as_ref().unwrap().raw();
    let transitions = device.transitions();

    // Written as a render target in level 0, read in the pixel shader in
    // level 1, then restored for reuse when its lifetime ends
    assert!(transitions.contains(&RecordedTransition {
        resource: scene_raw,
        src_state: OnyxResourceState::RENDER_TARGET,
        dst_state: OnyxResourceState::PIXEL_SHADER_RESOURCE,
    }));
    assert!(transitions.contains(&RecordedTransition {
        resource: scene_raw,
        src_state: OnyxResourceState::PIXEL_SHADER_RESOURCE,
        dst_state: OnyxResourceState::RENDER_TARGET,
    }));

    // Its creation needed no barrier: a fresh render target already starts in
    // the state its first use requires
    assert!(!transitions.iter().any(|t| t.resource == scene_raw
        && t.dst_state == OnyxResourceState::RENDER_TARGET
        && t.src_state != OnyxResourceState::PIXEL_SHADER_RESOURCE));
}

#[test]
fn reads_in_different_stages_merge_states() {
    init_log();
    let (device, pool) = test_device();

    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "produce",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("shared", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("shared", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    // Two consumers in the same level, one sampling per stage kind
    for (name, access) in [
        ("pixel_consumer", RenderGraphReadAccess::PixelShader),
        ("compute_consumer", RenderGraphReadAccess::NonPixelShader),
    ] {
        graph.add_pass(
            name,
            move |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.read_texture("shared", access, Default::default());
            },
            noop_execute,
            RenderGraphPassType::Graphics,
            RenderGraphPassFlags::FORCE_NO_CULL,
        );
    }

    graph.build().unwrap();
    graph.execute().unwrap();

    let shared_id = graph.texture_name_map["shared"];
    let shared_raw = graph.textures[shared_id.index()]
        .resource
        .as_ref()
        .unwrap()
        .raw();

    // Both consumers share a level; the resource must be in the union of
    // their required states when it runs
    assert!(device.transitions().contains(&RecordedTransition {
        resource: shared_raw,
        src_state: OnyxResourceState::UNORDERED_ACCESS,
        dst_state: OnyxResourceState::SHADER_RESOURCE,
    }));
}

//
// Declaration errors
//

#[test]
fn copy_pass_rejects_shader_access() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "producer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("staging", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_texture("staging", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "bad_copy",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "staging",
                RenderGraphReadAccess::PixelShader,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Copy,
        RenderGraphPassFlags::empty(),
    );

    let error = graph.build().unwrap_err();
    match error {
        RenderGraphError::Declaration(errors) => {
            assert_eq!(
                errors,
                vec![DeclarationError::ShaderAccessInCopyPass {
                    pass: "bad_copy",
                    name: "staging",
                }]
            );
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn copy_pass_copy_paths_are_legal() {
    init_log();
    let (device, pool) = test_device();
    let backbuffer = backbuffer_texture(&device);

    let mut graph = RenderGraph::new(pool);
    graph.import_texture("backbuffer", &backbuffer);

    graph.add_pass(
        "produce",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("blit_src", color_target_def(900, 600, OnyxFormat::B8G8R8A8_UNORM));
            builder.write_texture("blit_src", Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );
    graph.add_pass(
        "blit_to_backbuffer",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_copy_src_texture("blit_src");
            builder.write_copy_dst_texture("backbuffer");
        },
        noop_execute,
        RenderGraphPassType::Copy,
        RenderGraphPassFlags::empty(),
    );

    graph.build().unwrap();
    graph.execute().unwrap();

    let src_id = graph.texture_name_map["blit_src"];
    let src_raw = graph.textures[src_id.index()].resource.as_ref().unwrap().raw();
    assert!(device.transitions().contains(&RecordedTransition {
        resource: src_raw,
        src_state: OnyxResourceState::UNORDERED_ACCESS,
        dst_state: OnyxResourceState::COPY_SRC,
    }));
    assert!(device.transitions().contains(&RecordedTransition {
        resource: backbuffer.raw(),
        src_state: OnyxResourceState::PRESENT,
        dst_state: OnyxResourceState::COPY_DST,
    }));
}

#[test]
fn unknown_resource_is_reported() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "dangling",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture(
                "never_declared",
                RenderGraphReadAccess::AllShader,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    let error = graph.build().unwrap_err();
    assert_eq!(
        error,
        RenderGraphError::Declaration(vec![DeclarationError::UnknownResource {
            pass: "dangling",
            name: "never_declared",
        }])
    );
}

#[test]
fn build_collects_every_violation() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "broken",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.read_texture("missing_a", RenderGraphReadAccess::AllShader, Default::default());
            builder.read_texture("missing_b", RenderGraphReadAccess::AllShader, Default::default());
        },
        noop_execute,
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::empty(),
    );

    match graph.build().unwrap_err() {
        RenderGraphError::Declaration(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn missing_viewport_is_reported() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    graph.add_pass(
        "no_viewport",
        |_: &mut (), builder: &mut RenderGraphBuilder| {
            builder.create_texture("target", color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM));
            builder.write_render_target(
                "target",
                OnyxLoadOp::Clear,
                OnyxStoreOp::Store,
                Default::default(),
            );
        },
        noop_execute,
        RenderGraphPassType::Graphics,
        RenderGraphPassFlags::empty(),
    );

    assert_eq!(
        graph.build().unwrap_err(),
        RenderGraphError::Declaration(vec![DeclarationError::MissingViewport {
            pass: "no_viewport"
        }])
    );
}

#[test]
fn execute_before_build_is_an_error() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);
    assert!(graph.execute().is_err());
}

//
// Scratch allocations
//

#[test]
fn scratch_allocations_are_aligned_and_stable() {
    init_log();
    let (_device, pool) = test_device();
    let mut graph = RenderGraph::new(pool);

    #[derive(Default)]
    struct PassData {
        per_draw: RenderGraphAllocationId,
        lights: RenderGraphAllocationId,
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_pass = seen.clone();
    graph.add_pass(
        "upload",
        |data: &mut PassData, builder: &mut RenderGraphBuilder| {
            data.per_draw = builder.declare_allocation("per_draw_constants", 24, 256);
            data.lights = builder.declare_allocation("light_list", 4096, 256);
        },
        move |data, context, _command_list| {
            seen_in_pass
                .lock()
                .unwrap()
                .extend([context.allocation(data.per_draw), context.allocation(data.lights)]);
            Ok(())
        },
        RenderGraphPassType::Compute,
        RenderGraphPassFlags::FORCE_NO_CULL,
    );

    graph.build().unwrap();
    graph.execute().unwrap();

    let allocations = seen.lock().unwrap().clone();
    assert_eq!(
        allocations,
        vec![
            RenderGraphAllocation { offset: 0, size: 24 },
            RenderGraphAllocation {
                offset: 256,
                size: 4096
            },
        ]
    );
}

//
// Blackboard
//

#[test]
fn blackboard_stores_one_value_per_type() {
    struct CameraData {
        view_projection: [f32; 16],
    }

    let mut blackboard = RenderGraphBlackboard::new();
    assert!(blackboard.try_get::<CameraData>().is_none());

    blackboard.add(CameraData {
        view_projection: [1.0; 16],
    });
    assert_eq!(blackboard.get::<CameraData>().view_projection[0], 1.0);

    blackboard.clear();
    assert!(blackboard.try_get::<CameraData>().is_none());
}

#[test]
#[should_panic(expected = "already contains an entry")]
fn blackboard_rejects_duplicate_types() {
    let mut blackboard = RenderGraphBlackboard::new();
    blackboard.add(7u32);
    blackboard.add(8u32);
}

//
// Resource pool
//

#[test]
fn pool_reuses_a_released_compatible_texture() {
    init_log();
    let (device, pool) = test_device();

    let def = color_target_def(128, 128, OnyxFormat::R8G8B8A8_UNORM);
    let first = pool.allocate_texture(&def).unwrap();
    pool.release_texture(&first);

    let second = pool.allocate_texture(&def).unwrap();
    assert_eq!(first, second);
    assert_eq!(device.textures_created(), 1);
}

#[test]
fn pool_compatibility_allows_bind_flag_superset() {
    init_log();
    let (device, pool) = test_device();

    let mut rich = color_target_def(128, 128, OnyxFormat::R8G8B8A8_UNORM);
    rich.resource_type = OnyxResourceType::TEXTURE | OnyxResourceType::TEXTURE_READ_WRITE;
    let first = pool.allocate_texture(&rich).unwrap();
    pool.release_texture(&first);

    let mut narrow = rich.clone();
    narrow.resource_type = OnyxResourceType::TEXTURE;
    let second = pool.allocate_texture(&narrow).unwrap();
    assert_eq!(first, second);

    // The reverse does not hold: asking for more usage than the pooled
    // texture has forces a fresh allocation
    pool.release_texture(&second);
    let mut wider = rich.clone();
    wider.resource_type =
        OnyxResourceType::TEXTURE | OnyxResourceType::TEXTURE_READ_WRITE | OnyxResourceType::RENDER_TARGET_COLOR;
    let third = pool.allocate_texture(&wider).unwrap();
    assert_ne!(first, third);
    assert_eq!(device.textures_created(), 2);
}

#[test]
fn pool_evicts_after_grace_period() {
    init_log();
    let (device, pool) = test_device();

    let def = color_target_def(64, 64, OnyxFormat::R8G8B8A8_UNORM);
    let first = pool.allocate_texture(&def).unwrap();
    pool.release_texture(&first);

    // Four frames of inactivity are tolerated
    for _ in 0..4 {
        pool.tick();
    }
    assert_eq!(device.textures_destroyed(), 0);

    // The fifth evicts
    pool.tick();
    assert_eq!(device.textures_destroyed(), 1);

    // A new request must produce a brand-new physical texture
    let second = pool.allocate_texture(&def).unwrap();
    assert_ne!(first, second);
    assert_eq!(device.textures_created(), 2);
}

#[test]
fn pool_keeps_entries_used_within_grace_period() {
    init_log();
    let (device, pool) = test_device();

    let def = OnyxBufferDef {
        size: 1024,
        resource_type: OnyxResourceType::BUFFER_READ_WRITE,
        ..Default::default()
    };
    let first = pool.allocate_buffer(&def).unwrap();
    pool.release_buffer(&first);

    pool.tick();
    pool.tick();

    let second = pool.allocate_buffer(&def).unwrap();
    assert_eq!(first, second);
    assert_eq!(device.inner.buffers_created.load(Ordering::Relaxed), 1);
}

#[test]
fn transients_return_to_the_pool_between_frames() {
    init_log();
    let (device, pool) = test_device();
    let backbuffer = backbuffer_texture(&device);

    for _ in 0..3 {
        let mut graph = RenderGraph::new(pool.clone());
        graph.import_texture("backbuffer", &backbuffer);
        graph.add_pass(
            "draw",
            |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.create_texture("color", color_target_def(900, 600, OnyxFormat::B8G8R8A8_UNORM));
                builder.write_texture("color", Default::default());
            },
            noop_execute,
            RenderGraphPassType::Compute,
            RenderGraphPassFlags::empty(),
        );
        graph.add_pass(
            "resolve",
            |_: &mut (), builder: &mut RenderGraphBuilder| {
                builder.read_copy_src_texture("color");
                builder.write_copy_dst_texture("backbuffer");
            },
            noop_execute,
            RenderGraphPassType::Copy,
            RenderGraphPassFlags::empty(),
        );
        graph.build().unwrap();
        graph.execute().unwrap();
    }

    // One physical transient serves all three frames; only the backbuffer
    // import added another device texture
    assert_eq!(device.textures_created(), 1 + 1);
}
