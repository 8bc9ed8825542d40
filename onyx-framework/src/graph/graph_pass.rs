use super::graph_context::RenderGraphContext;
use super::graph_resource::{
    RenderGraphBufferId, RenderGraphDepthStencilId, RenderGraphRenderTargetId,
    RenderGraphTextureId,
};
use fnv::{FnvHashMap, FnvHashSet};
use onyx_api::{OnyxCommandList, OnyxLoadOp, OnyxResourceState, OnyxResult, OnyxStoreOp};

/// What kind of work a pass records. Determines which builder calls are legal
/// and whether an automatic render pass is set up around execution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderGraphPassType {
    Graphics,
    Compute,
    Copy,
}

bitflags::bitflags! {
    #[derive(Default)]
    pub struct RenderGraphPassFlags: u32 {
        /// The pass survives culling even if nothing consumes its outputs.
        /// Set automatically for passes that write imported resources.
        const FORCE_NO_CULL = 0x1;
        /// Don't wrap execution of a Graphics pass in a render pass derived
        /// from its declared attachments; the pass does its own setup.
        const SKIP_AUTO_RENDER_PASS = 0x2;
        /// Allow UAV writes inside the automatic render pass.
        const ALLOW_UAV_WRITES = 0x4;
    }
}

pub(super) type RenderGraphPassExecuteFn =
    Box<dyn Fn(&RenderGraphContext<'_>, &OnyxCommandList) -> OnyxResult<()> + Send + Sync>;

/// A render target binding declared by a pass. Order of declaration dictates
/// binding slot order.
#[derive(Clone, Copy, Debug)]
pub(super) struct RenderTargetInfo {
    pub handle: RenderGraphRenderTargetId,
    pub load_op: OnyxLoadOp,
    pub store_op: OnyxStoreOp,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DepthStencilInfo {
    pub handle: RenderGraphDepthStencilId,
    pub depth_load_op: OnyxLoadOp,
    pub depth_store_op: OnyxStoreOp,
    pub readonly: bool,
}

//
// A pass records everything its setup callback declared: the resources it
// creates/reads/writes, the state each resource must be in when the pass
// runs, attachment bindings, and the boxed execute callback. Fully populated
// synchronously during `add_pass`, immutable afterwards except for the
// fields `build()` fills in (destroys, culled).
//
pub(super) struct RenderGraphPass {
    pub id: usize,
    pub name: &'static str,
    pub pass_type: RenderGraphPassType,
    pub flags: RenderGraphPassFlags,
    /// Set by culling; a culled pass keeps its slot in the topological
    /// structure but records no commands.
    pub culled: bool,

    pub texture_creates: FnvHashSet<RenderGraphTextureId>,
    pub texture_reads: FnvHashSet<RenderGraphTextureId>,
    pub texture_writes: FnvHashSet<RenderGraphTextureId>,
    pub texture_destroys: FnvHashSet<RenderGraphTextureId>,
    pub texture_state_map: FnvHashMap<RenderGraphTextureId, OnyxResourceState>,
    pub texture_read_versions: FnvHashMap<RenderGraphTextureId, u32>,
    pub texture_write_versions: FnvHashMap<RenderGraphTextureId, u32>,

    pub buffer_creates: FnvHashSet<RenderGraphBufferId>,
    pub buffer_reads: FnvHashSet<RenderGraphBufferId>,
    pub buffer_writes: FnvHashSet<RenderGraphBufferId>,
    pub buffer_destroys: FnvHashSet<RenderGraphBufferId>,
    pub buffer_state_map: FnvHashMap<RenderGraphBufferId, OnyxResourceState>,
    pub buffer_read_versions: FnvHashMap<RenderGraphBufferId, u32>,
    pub buffer_write_versions: FnvHashMap<RenderGraphBufferId, u32>,

    pub render_targets: Vec<RenderTargetInfo>,
    pub depth_stencil: Option<DepthStencilInfo>,
    pub viewport_width: u32,
    pub viewport_height: u32,

    pub execute: Option<RenderGraphPassExecuteFn>,
}

impl RenderGraphPass {
    pub fn new(
        id: usize,
        name: &'static str,
        pass_type: RenderGraphPassType,
        flags: RenderGraphPassFlags,
    ) -> Self {
        RenderGraphPass {
            id,
            name,
            pass_type,
            flags,
            culled: false,
            texture_creates: Default::default(),
            texture_reads: Default::default(),
            texture_writes: Default::default(),
            texture_destroys: Default::default(),
            texture_state_map: Default::default(),
            texture_read_versions: Default::default(),
            texture_write_versions: Default::default(),
            buffer_creates: Default::default(),
            buffer_reads: Default::default(),
            buffer_writes: Default::default(),
            buffer_destroys: Default::default(),
            buffer_state_map: Default::default(),
            buffer_read_versions: Default::default(),
            buffer_write_versions: Default::default(),
            render_targets: Default::default(),
            depth_stencil: None,
            viewport_width: 0,
            viewport_height: 0,
            execute: None,
        }
    }

    pub fn can_be_culled(&self) -> bool {
        !self.flags.contains(RenderGraphPassFlags::FORCE_NO_CULL)
    }

    pub fn is_culled(&self) -> bool {
        self.culled
    }

    pub fn skip_auto_render_pass(&self) -> bool {
        self.flags
            .contains(RenderGraphPassFlags::SKIP_AUTO_RENDER_PASS)
    }

    pub fn allow_uav_writes(&self) -> bool {
        self.flags.contains(RenderGraphPassFlags::ALLOW_UAV_WRITES)
    }

    /// Merge a required state for a texture this pass touches. Two accesses of
    /// the same resource within one pass require the union of both states.
    pub fn require_texture_state(
        &mut self,
        id: RenderGraphTextureId,
        state: OnyxResourceState,
    ) {
        *self
            .texture_state_map
            .entry(id)
            .or_insert(OnyxResourceState::UNDEFINED) |= state;
    }

    pub fn require_buffer_state(
        &mut self,
        id: RenderGraphBufferId,
        state: OnyxResourceState,
    ) {
        *self
            .buffer_state_map
            .entry(id)
            .or_insert(OnyxResourceState::UNDEFINED) |= state;
    }
}
