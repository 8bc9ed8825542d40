use super::graph_blackboard::RenderGraphBlackboard;
use super::graph_builder::RenderGraphBuilder;
use super::graph_context::RenderGraphContext;
use super::graph_pass::{RenderGraphPass, RenderGraphPassFlags, RenderGraphPassType};
use super::graph_resource::*;
use super::graph_resource_pool::RenderGraphResourcePool;
use super::RenderGraphResourceName;
use fnv::{FnvHashMap, FnvHashSet};
use onyx_api::{
    OnyxBuffer, OnyxBufferBarrier, OnyxClearValue, OnyxCommandList, OnyxColorAttachment,
    OnyxDepthStencilAttachment, OnyxDescriptor, OnyxDescriptorType, OnyxDeviceContext, OnyxError,
    OnyxRenderPassDef, OnyxResourceState, OnyxResult, OnyxTexture, OnyxTextureBarrier,
    OnyxTextureViewDef,
};

/// A contract violation recorded during pass setup. Collected rather than
/// asserted so one `build()` call reports every problem in the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    /// Two passes declared a resource or allocation with the same name
    DuplicateResource { name: RenderGraphResourceName },
    /// A pass referenced a name no earlier pass declared or imported
    UnknownResource {
        pass: &'static str,
        name: RenderGraphResourceName,
    },
    /// A Copy pass used a shader-read/write or attachment builder call
    ShaderAccessInCopyPass {
        pass: &'static str,
        name: RenderGraphResourceName,
    },
    /// A pass bound two depth/stencil targets
    DepthStencilAlreadySet { pass: &'static str },
    /// A Graphics pass with attachments never called `set_viewport`
    MissingViewport { pass: &'static str },
}

impl core::fmt::Display for DeclarationError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match self {
            DeclarationError::DuplicateResource { name } => {
                write!(fmt, "resource {:?} declared more than once", name)
            }
            DeclarationError::UnknownResource { pass, name } => {
                write!(fmt, "pass {:?} references undeclared resource {:?}", pass, name)
            }
            DeclarationError::ShaderAccessInCopyPass { pass, name } => write!(
                fmt,
                "copy pass {:?} declared a shader or attachment access of {:?}",
                pass, name
            ),
            DeclarationError::DepthStencilAlreadySet { pass } => {
                write!(fmt, "pass {:?} bound more than one depth/stencil target", pass)
            }
            DeclarationError::MissingViewport { pass } => write!(
                fmt,
                "graphics pass {:?} has attachments but no viewport",
                pass
            ),
        }
    }
}

/// Why `build()` failed. The graph is not executable after an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderGraphError {
    /// Every declaration contract violated during pass setup
    Declaration(Vec<DeclarationError>),
    /// The pass dependencies form a cycle; the passes involved, in order
    Cycle { passes: Vec<&'static str> },
}

impl core::fmt::Display for RenderGraphError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match self {
            RenderGraphError::Declaration(errors) => {
                write!(fmt, "{} declaration error(s):", errors.len())?;
                for error in errors {
                    write!(fmt, " [{}]", error)?;
                }
                Ok(())
            }
            RenderGraphError::Cycle { passes } => {
                write!(fmt, "pass dependency cycle: {}", passes.join(" -> "))
            }
        }
    }
}

impl std::error::Error for RenderGraphError {}

//
// A maximal run of passes with no data hazard between them. Everything in one
// level may be issued together; levels execute strictly in order. Reads and
// writes are aggregated while grouping; creates, destroys and required states
// are aggregated after culling so culled passes contribute nothing.
//
#[derive(Default)]
pub(super) struct DependencyLevel {
    pub passes: Vec<usize>,

    pub texture_creates: FnvHashSet<RenderGraphTextureId>,
    pub texture_reads: FnvHashSet<RenderGraphTextureId>,
    pub texture_writes: FnvHashSet<RenderGraphTextureId>,
    pub texture_destroys: FnvHashSet<RenderGraphTextureId>,
    pub texture_state_map: FnvHashMap<RenderGraphTextureId, OnyxResourceState>,

    pub buffer_creates: FnvHashSet<RenderGraphBufferId>,
    pub buffer_reads: FnvHashSet<RenderGraphBufferId>,
    pub buffer_writes: FnvHashSet<RenderGraphBufferId>,
    pub buffer_destroys: FnvHashSet<RenderGraphBufferId>,
    pub buffer_state_map: FnvHashMap<RenderGraphBufferId, OnyxResourceState>,
}

impl DependencyLevel {
    /// True if adding `pass` to this level would introduce a read/write
    /// hazard. Creation counts as a write here: a created resource must not
    /// be touched by anything else in the same level.
    fn has_hazard_with(
        &self,
        pass: &RenderGraphPass,
    ) -> bool {
        for id in pass.texture_writes.iter().chain(&pass.texture_creates) {
            if self.texture_writes.contains(id) || self.texture_reads.contains(id) {
                return true;
            }
        }
        for id in &pass.texture_reads {
            if self.texture_writes.contains(id) {
                return true;
            }
        }
        for id in pass.buffer_writes.iter().chain(&pass.buffer_creates) {
            if self.buffer_writes.contains(id) || self.buffer_reads.contains(id) {
                return true;
            }
        }
        for id in &pass.buffer_reads {
            if self.buffer_writes.contains(id) {
                return true;
            }
        }
        false
    }

    fn add_pass(
        &mut self,
        pass: &RenderGraphPass,
    ) {
        self.passes.push(pass.id);
        self.texture_reads.extend(pass.texture_reads.iter().copied());
        self.texture_writes.extend(pass.texture_writes.iter().copied());
        self.texture_writes.extend(pass.texture_creates.iter().copied());
        self.buffer_reads.extend(pass.buffer_reads.iter().copied());
        self.buffer_writes.extend(pass.buffer_writes.iter().copied());
        self.buffer_writes.extend(pass.buffer_creates.iter().copied());
    }

    /// Fold a surviving pass's allocation events and required states into the
    /// level. Multiple passes in one level may read the same resource in
    /// different shader stages, so states merge by union; conflicting
    /// write/read combinations were excluded by the hazard rule.
    fn setup(
        &mut self,
        pass: &RenderGraphPass,
    ) {
        self.texture_creates
            .extend(pass.texture_creates.iter().copied());
        self.texture_destroys
            .extend(pass.texture_destroys.iter().copied());
        for (&id, &state) in &pass.texture_state_map {
            *self
                .texture_state_map
                .entry(id)
                .or_insert(OnyxResourceState::UNDEFINED) |= state;
        }
        self.buffer_creates
            .extend(pass.buffer_creates.iter().copied());
        self.buffer_destroys
            .extend(pass.buffer_destroys.iter().copied());
        for (&id, &state) in &pass.buffer_state_map {
            *self
                .buffer_state_map
                .entry(id)
                .or_insert(OnyxResourceState::UNDEFINED) |= state;
        }
    }
}

/// A frame-scoped scheduler for GPU work.
///
/// Passes are added with [`add_pass`](Self::add_pass); each declares its
/// resource usage through a [`RenderGraphBuilder`] in its setup callback.
/// [`build`](Self::build) derives execution order, groups independent passes
/// into dependency levels, culls unconsumed work and computes resource
/// lifetimes. [`execute`](Self::execute) then walks the levels, leases
/// transient resources from the pool, records the state-transition barriers
/// between levels and invokes each surviving pass's execute callback.
///
/// A graph instance runs one frame: `add_pass* -> build -> execute`.
pub struct RenderGraph {
    device: OnyxDeviceContext,
    pool: RenderGraphResourcePool,
    blackboard: RenderGraphBlackboard,

    pub(super) passes: Vec<RenderGraphPass>,
    pub(super) textures: Vec<RenderGraphTextureResource>,
    pub(super) buffers: Vec<RenderGraphBufferResource>,

    pub(super) texture_name_map: FnvHashMap<RenderGraphResourceName, RenderGraphTextureId>,
    pub(super) buffer_name_map: FnvHashMap<RenderGraphResourceName, RenderGraphBufferId>,

    pub(super) texture_view_descs:
        FnvHashMap<RenderGraphTextureId, Vec<(OnyxTextureViewDef, OnyxDescriptorType)>>,
    texture_views: FnvHashMap<RenderGraphTextureId, Vec<OnyxDescriptor>>,
    pub(super) buffer_view_descs:
        FnvHashMap<RenderGraphBufferId, Vec<(onyx_api::OnyxBufferViewDef, OnyxDescriptorType)>>,
    buffer_views: FnvHashMap<RenderGraphBufferId, Vec<OnyxDescriptor>>,

    pub(super) allocation_name_map: FnvHashMap<RenderGraphResourceName, RenderGraphAllocationId>,
    pub(super) allocation_descs: Vec<RenderGraphAllocationDesc>,
    pub(super) allocations: Vec<RenderGraphAllocation>,

    pub(super) adjacency_lists: Vec<Vec<usize>>,
    pub(super) topologically_sorted_passes: Vec<usize>,
    pub(super) dependency_levels: Vec<DependencyLevel>,

    pub(super) declaration_errors: Vec<DeclarationError>,
    built: bool,
}

impl RenderGraph {
    pub fn new(pool: RenderGraphResourcePool) -> Self {
        RenderGraph {
            device: pool.device(),
            pool,
            blackboard: RenderGraphBlackboard::new(),
            passes: Vec::default(),
            textures: Vec::default(),
            buffers: Vec::default(),
            texture_name_map: Default::default(),
            buffer_name_map: Default::default(),
            texture_view_descs: Default::default(),
            texture_views: Default::default(),
            buffer_view_descs: Default::default(),
            buffer_views: Default::default(),
            allocation_name_map: Default::default(),
            allocation_descs: Vec::default(),
            allocations: Vec::default(),
            adjacency_lists: Vec::default(),
            topologically_sorted_passes: Vec::default(),
            dependency_levels: Vec::default(),
            declaration_errors: Vec::default(),
            built: false,
        }
    }

    pub fn device(&self) -> &OnyxDeviceContext {
        &self.device
    }

    pub fn blackboard(&self) -> &RenderGraphBlackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut RenderGraphBlackboard {
        &mut self.blackboard
    }

    /// Register a pass. The setup callback runs immediately and declares all
    /// resource usage through the builder — no GPU work is allowed there. The
    /// execute callback is stored and invoked during [`execute`](Self::execute)
    /// with the data the setup callback filled in.
    pub fn add_pass<D, SetupFnT, ExecuteFnT>(
        &mut self,
        name: &'static str,
        setup_fn: SetupFnT,
        execute_fn: ExecuteFnT,
        pass_type: RenderGraphPassType,
        flags: RenderGraphPassFlags,
    ) where
        D: Default + Send + Sync + 'static,
        SetupFnT: FnOnce(&mut D, &mut RenderGraphBuilder<'_>),
        ExecuteFnT: Fn(&D, &RenderGraphContext<'_>, &OnyxCommandList) -> OnyxResult<()>
            + 'static
            + Send
            + Sync,
    {
        let pass_index = self.passes.len();
        self.passes
            .push(RenderGraphPass::new(pass_index, name, pass_type, flags));

        let mut data = D::default();
        {
            let mut builder = RenderGraphBuilder::new(self, pass_index);
            setup_fn(&mut data, &mut builder);
        }

        self.passes[pass_index].execute = Some(Box::new(
            move |context: &RenderGraphContext<'_>, command_list: &OnyxCommandList| {
                execute_fn(&data, context, command_list)
            },
        ));
    }

    /// Register an externally-owned texture so passes can reference it by
    /// name. The graph tracks its state within this frame but never pools,
    /// restores, or culls it; its final state is the caller's to consume.
    pub fn import_texture(
        &mut self,
        name: RenderGraphResourceName,
        texture: &OnyxTexture,
    ) -> RenderGraphTextureId {
        if let Some(&existing) = self.texture_name_map.get(name) {
            self.declaration_errors
                .push(DeclarationError::DuplicateResource { name });
            return existing;
        }

        let id = RenderGraphTextureId::new(self.textures.len());
        log::trace!("import texture {:?} {:?}", id, name);
        self.textures
            .push(RenderGraphTextureResource::new_imported(name, texture));
        self.texture_name_map.insert(name, id);
        id
    }

    pub fn import_buffer(
        &mut self,
        name: RenderGraphResourceName,
        buffer: &OnyxBuffer,
    ) -> RenderGraphBufferId {
        if let Some(&existing) = self.buffer_name_map.get(name) {
            self.declaration_errors
                .push(DeclarationError::DuplicateResource { name });
            return existing;
        }

        let id = RenderGraphBufferId::new(self.buffers.len());
        log::trace!("import buffer {:?} {:?}", id, name);
        self.buffers
            .push(RenderGraphBufferResource::new_imported(name, buffer));
        self.buffer_name_map.insert(name, id);
        id
    }

    /// Analyze the declared passes: dependency edges, topological order,
    /// dependency levels, culling and resource lifetimes. Reports every
    /// declaration contract violation collected during setup; the graph is
    /// only executable if this returns Ok.
    pub fn build(&mut self) -> Result<(), RenderGraphError> {
        profiling::scope!("render graph build");

        self.validate_viewports();
        if !self.declaration_errors.is_empty() {
            return Err(RenderGraphError::Declaration(std::mem::take(
                &mut self.declaration_errors,
            )));
        }

        self.build_adjacency_lists();
        self.topological_sort()?;
        self.build_dependency_levels();
        self.cull_passes();
        self.calculate_resource_lifetimes();
        self.setup_dependency_levels();
        self.built = true;
        Ok(())
    }

    /// Walk the dependency levels in order, recording barriers and invoking
    /// each surviving pass's execute callback.
    pub fn execute(&mut self) -> OnyxResult<()> {
        if !self.built {
            return Err(OnyxError::from("render graph executed before build()"));
        }
        profiling::scope!("render graph execute");

        self.pool.tick();
        self.resolve_allocations();

        // Imported resources never pass through the pool, so their views are
        // realized up front.
        for index in 0..self.textures.len() {
            if self.textures[index].imported {
                self.create_texture_views(RenderGraphTextureId::new(index))?;
            }
        }
        for index in 0..self.buffers.len() {
            if self.buffers[index].imported {
                self.create_buffer_views(RenderGraphBufferId::new(index))?;
            }
        }

        #[cfg(feature = "multithreaded")]
        return self.execute_multithreaded();

        #[cfg(not(feature = "multithreaded"))]
        self.execute_singlethreaded()
    }

    fn validate_viewports(&mut self) {
        let mut errors = Vec::default();
        for pass in &self.passes {
            if pass.pass_type == RenderGraphPassType::Graphics
                && !pass.skip_auto_render_pass()
                && (!pass.render_targets.is_empty() || pass.depth_stencil.is_some())
                && (pass.viewport_width == 0 || pass.viewport_height == 0)
            {
                errors.push(DeclarationError::MissingViewport { pass: pass.name });
            }
        }
        self.declaration_errors.extend(errors);
    }

    fn passes_depend(
        earlier: &RenderGraphPass,
        later: &RenderGraphPass,
    ) -> bool {
        // read-after-write
        if later.texture_reads.iter().any(|id| {
            earlier.texture_writes.contains(id) || earlier.texture_creates.contains(id)
        }) || later.buffer_reads.iter().any(|id| {
            earlier.buffer_writes.contains(id) || earlier.buffer_creates.contains(id)
        }) {
            return true;
        }

        // write-after-write and write-after-read
        later.texture_writes.iter().any(|id| {
            earlier.texture_writes.contains(id)
                || earlier.texture_creates.contains(id)
                || earlier.texture_reads.contains(id)
        }) || later.buffer_writes.iter().any(|id| {
            earlier.buffer_writes.contains(id)
                || earlier.buffer_creates.contains(id)
                || earlier.buffer_reads.contains(id)
        })
    }

    #[profiling::function]
    fn build_adjacency_lists(&mut self) {
        let pass_count = self.passes.len();
        let mut adjacency_lists = vec![Vec::default(); pass_count];
        for i in 0..pass_count {
            for j in (i + 1)..pass_count {
                if Self::passes_depend(&self.passes[i], &self.passes[j]) {
                    log::trace!(
                        "edge {} -> {}",
                        self.passes[i].name,
                        self.passes[j].name
                    );
                    adjacency_lists[i].push(j);
                }
            }
        }
        self.adjacency_lists = adjacency_lists;
    }

    // https://en.wikipedia.org/wiki/Topological_sorting#Depth-first_search
    #[profiling::function]
    fn topological_sort(&mut self) -> Result<(), RenderGraphError> {
        let pass_count = self.passes.len();
        let mut visited = vec![false; pass_count];
        let mut visiting = vec![false; pass_count];
        let mut visiting_stack = Vec::default();
        let mut post_order = Vec::with_capacity(pass_count);

        // Roots are taken in reverse declaration order so that independent
        // passes come out in declaration order after the final reversal —
        // required for reproducible frame captures.
        for i in (0..pass_count).rev() {
            if !visited[i] {
                self.depth_first_search(
                    i,
                    &mut visited,
                    &mut visiting,
                    &mut visiting_stack,
                    &mut post_order,
                )?;
            }
        }

        post_order.reverse();
        self.topologically_sorted_passes = post_order;
        Ok(())
    }

    fn depth_first_search(
        &self,
        pass_index: usize,
        visited: &mut Vec<bool>,
        visiting: &mut Vec<bool>,
        visiting_stack: &mut Vec<usize>,
        post_order: &mut Vec<usize>,
    ) -> Result<(), RenderGraphError> {
        visiting[pass_index] = true;
        visiting_stack.push(pass_index);

        for &child in &self.adjacency_lists[pass_index] {
            // A child being visited higher up the stack means the graph has a
            // cycle; report the passes that form it.
            if visiting[child] {
                log::warn!("Found cycle in graph");
                let mut passes: Vec<&'static str> = visiting_stack
                    .iter()
                    .skip_while(|&&p| p != child)
                    .map(|&p| self.passes[p].name)
                    .collect();
                passes.push(self.passes[child].name);
                return Err(RenderGraphError::Cycle { passes });
            }
            if !visited[child] {
                self.depth_first_search(child, visited, visiting, visiting_stack, post_order)?;
            }
        }

        visiting_stack.pop();
        visiting[pass_index] = false;
        visited[pass_index] = true;
        post_order.push(pass_index);
        Ok(())
    }

    /// Greedily merge consecutive passes of the topological order into
    /// dependency levels; a new level starts the moment a data hazard would
    /// otherwise be introduced.
    #[profiling::function]
    fn build_dependency_levels(&mut self) {
        let mut levels: Vec<DependencyLevel> = Vec::default();
        for &pass_index in &self.topologically_sorted_passes {
            let pass = &self.passes[pass_index];
            let needs_new_level = match levels.last() {
                None => true,
                Some(level) => level.has_hazard_with(pass),
            };
            if needs_new_level {
                levels.push(DependencyLevel::default());
            }
            levels.last_mut().unwrap().add_pass(pass);
        }

        log::trace!(
            "{} passes in {} dependency levels",
            self.passes.len(),
            levels.len()
        );
        self.dependency_levels = levels;
    }

    /// A pass is live if it cannot be culled, or if a live pass observes a
    /// version of a resource it helped produce. Everything else is culled —
    /// softly: the pass keeps its slot everywhere, execution skips it.
    #[profiling::function]
    fn cull_passes(&mut self) {
        for pass in &self.passes {
            for id in &pass.texture_reads {
                self.textures[id.index()].ref_count += 1;
            }
            for id in &pass.buffer_reads {
                self.buffers[id.index()].ref_count += 1;
            }
        }

        let pass_count = self.passes.len();
        let mut live = vec![false; pass_count];
        let mut stack: Vec<usize> = (0..pass_count)
            .filter(|&i| !self.passes[i].can_be_culled())
            .collect();

        while let Some(i) = stack.pop() {
            if live[i] {
                continue;
            }
            live[i] = true;

            // A reader of version v depends on every writer that produced a
            // version <= v: the producing writer directly, and the writers it
            // layered on top of, down to the creating pass.
            let pass = &self.passes[i];
            for (&id, &version) in &pass.texture_read_versions {
                for j in 0..pass_count {
                    if live[j] {
                        continue;
                    }
                    if let Some(&write_version) = self.passes[j].texture_write_versions.get(&id) {
                        if write_version <= version {
                            stack.push(j);
                        }
                    }
                }
            }
            for (&id, &version) in &pass.buffer_read_versions {
                for j in 0..pass_count {
                    if live[j] {
                        continue;
                    }
                    if let Some(&write_version) = self.passes[j].buffer_write_versions.get(&id) {
                        if write_version <= version {
                            stack.push(j);
                        }
                    }
                }
            }

            // A writer of version v layers on top of every earlier version;
            // the earlier writers (and the creating pass) must still run so
            // the resource exists and holds the expected contents.
            for (&id, &version) in &pass.texture_write_versions {
                for j in 0..pass_count {
                    if live[j] {
                        continue;
                    }
                    if let Some(&write_version) = self.passes[j].texture_write_versions.get(&id) {
                        if write_version < version {
                            stack.push(j);
                        }
                    }
                }
            }
            for (&id, &version) in &pass.buffer_write_versions {
                for j in 0..pass_count {
                    if live[j] {
                        continue;
                    }
                    if let Some(&write_version) = self.passes[j].buffer_write_versions.get(&id) {
                        if write_version < version {
                            stack.push(j);
                        }
                    }
                }
            }
        }

        for (i, pass) in self.passes.iter_mut().enumerate() {
            pass.culled = !live[i];
            if pass.culled {
                log::trace!("culled pass {}", pass.name);
            }
        }

        for resource in &self.textures {
            if resource.ref_count == 0 && !resource.imported {
                log::trace!("texture {:?} has no consumers", resource.name);
            }
        }
        for resource in &self.buffers {
            if resource.ref_count == 0 && !resource.imported {
                log::trace!("buffer {:?} has no consumers", resource.name);
            }
        }
    }

    /// Resource lifetime is [creating pass, last consuming pass] over the
    /// topological order. The last consumer is tagged with the destroy so the
    /// resource returns to the pool as soon as its level finishes, making it
    /// reusable by a later-declared compatible resource within this frame.
    #[profiling::function]
    fn calculate_resource_lifetimes(&mut self) {
        for &pass_index in &self.topologically_sorted_passes {
            let pass = &self.passes[pass_index];
            if pass.is_culled() {
                continue;
            }
            for id in pass
                .texture_creates
                .iter()
                .chain(&pass.texture_reads)
                .chain(&pass.texture_writes)
            {
                self.textures[id.index()].last_used_by = Some(pass_index);
            }
            for id in pass
                .buffer_creates
                .iter()
                .chain(&pass.buffer_reads)
                .chain(&pass.buffer_writes)
            {
                self.buffers[id.index()].last_used_by = Some(pass_index);
            }
        }

        for index in 0..self.textures.len() {
            let resource = &self.textures[index];
            // Imported resources are left exactly as the last pass declared
            if resource.imported {
                continue;
            }
            if let Some(last) = resource.last_used_by {
                self.passes[last]
                    .texture_destroys
                    .insert(RenderGraphTextureId::new(index));
            }
        }
        for index in 0..self.buffers.len() {
            let resource = &self.buffers[index];
            if resource.imported {
                continue;
            }
            if let Some(last) = resource.last_used_by {
                self.passes[last]
                    .buffer_destroys
                    .insert(RenderGraphBufferId::new(index));
            }
        }
    }

    fn setup_dependency_levels(&mut self) {
        let mut levels = std::mem::take(&mut self.dependency_levels);
        for level in &mut levels {
            let pass_indices = level.passes.clone();
            for pass_index in pass_indices {
                let pass = &self.passes[pass_index];
                if !pass.is_culled() {
                    level.setup(pass);
                }
            }
        }
        self.dependency_levels = levels;
    }

    pub(super) fn find_or_add_texture_view(
        &mut self,
        id: RenderGraphTextureId,
        view_desc: OnyxTextureViewDef,
        view_type: OnyxDescriptorType,
    ) -> usize {
        let views = self.texture_view_descs.entry(id).or_default();
        if let Some(position) = views
            .iter()
            .position(|&(desc, ty)| desc == view_desc && ty == view_type)
        {
            return position;
        }
        views.push((view_desc, view_type));
        views.len() - 1
    }

    pub(super) fn find_or_add_buffer_view(
        &mut self,
        id: RenderGraphBufferId,
        view_desc: onyx_api::OnyxBufferViewDef,
        view_type: OnyxDescriptorType,
    ) -> usize {
        let views = self.buffer_view_descs.entry(id).or_default();
        if let Some(position) = views
            .iter()
            .position(|&(desc, ty)| desc == view_desc && ty == view_type)
        {
            return position;
        }
        views.push((view_desc, view_type));
        views.len() - 1
    }

    pub(super) fn texture_view(
        &self,
        id: RenderGraphTextureId,
        view_index: usize,
    ) -> OnyxDescriptor {
        match self
            .texture_views
            .get(&id)
            .and_then(|views| views.get(view_index))
        {
            Some(&view) => view,
            None => panic!(
                "view {} of texture {:?} was not realized",
                view_index,
                self.textures[id.index()].name
            ),
        }
    }

    pub(super) fn buffer_view(
        &self,
        id: RenderGraphBufferId,
        view_index: usize,
    ) -> OnyxDescriptor {
        match self
            .buffer_views
            .get(&id)
            .and_then(|views| views.get(view_index))
        {
            Some(&view) => view,
            None => panic!(
                "view {} of buffer {:?} was not realized",
                view_index,
                self.buffers[id.index()].name
            ),
        }
    }

    fn create_texture_views(
        &mut self,
        id: RenderGraphTextureId,
    ) -> OnyxResult<()> {
        let descs = match self.texture_view_descs.get(&id) {
            Some(descs) => descs.clone(),
            None => return Ok(()),
        };
        if self
            .texture_views
            .get(&id)
            .map_or(false, |views| views.len() == descs.len())
        {
            return Ok(());
        }

        let texture = self.textures[id.index()]
            .resource
            .clone()
            .expect("texture must be realized before views are created");
        let mut views = Vec::with_capacity(descs.len());
        for (view_desc, view_type) in &descs {
            views.push(
                self.device
                    .create_texture_view(&texture, *view_type, view_desc)?,
            );
        }
        self.texture_views.insert(id, views);
        Ok(())
    }

    fn create_buffer_views(
        &mut self,
        id: RenderGraphBufferId,
    ) -> OnyxResult<()> {
        let descs = match self.buffer_view_descs.get(&id) {
            Some(descs) => descs.clone(),
            None => return Ok(()),
        };
        if self
            .buffer_views
            .get(&id)
            .map_or(false, |views| views.len() == descs.len())
        {
            return Ok(());
        }

        let buffer = self.buffers[id.index()]
            .resource
            .clone()
            .expect("buffer must be realized before views are created");
        let mut views = Vec::with_capacity(descs.len());
        for (view_desc, view_type) in &descs {
            views.push(
                self.device
                    .create_buffer_view(&buffer, *view_type, view_desc)?,
            );
        }
        self.buffer_views.insert(id, views);
        Ok(())
    }

    /// Lay out the frame's scratch allocations as a single linear span.
    fn resolve_allocations(&mut self) {
        let mut offset = 0u64;
        self.allocations.clear();
        for desc in &self.allocation_descs {
            let alignment = desc.alignment.max(1);
            offset = (offset + alignment - 1) / alignment * alignment;
            self.allocations.push(RenderGraphAllocation {
                offset,
                size: desc.size,
            });
            offset += desc.size;
        }
    }

    #[cfg(not(feature = "multithreaded"))]
    fn execute_singlethreaded(&mut self) -> OnyxResult<()> {
        let command_list = self.device.new_command_list()?;
        for level_index in 0..self.dependency_levels.len() {
            self.realize_level_resources(level_index)?;
            self.record_level_barriers(level_index, &command_list)?;

            let pass_indices = self.dependency_levels[level_index].passes.clone();
            for pass_index in pass_indices {
                if self.passes[pass_index].is_culled() {
                    continue;
                }
                self.run_pass(pass_index, &command_list)?;
            }

            self.retire_level_resources(level_index, &command_list)?;
        }
        Ok(())
    }

    /// One command list per pass; each level's passes are independent by
    /// construction, so intra-level order does not matter. Levels are still
    /// strictly sequential — the next level may depend on resource states
    /// this one establishes.
    #[cfg(feature = "multithreaded")]
    fn execute_multithreaded(&mut self) -> OnyxResult<()> {
        for level_index in 0..self.dependency_levels.len() {
            self.realize_level_resources(level_index)?;

            let pass_indices: Vec<usize> = self.dependency_levels[level_index]
                .passes
                .iter()
                .copied()
                .filter(|&i| !self.passes[i].is_culled())
                .collect();
            let mut command_lists = Vec::with_capacity(pass_indices.len());
            for _ in &pass_indices {
                command_lists.push(self.device.new_command_list()?);
            }
            let barrier_list = match command_lists.first() {
                Some(list) => list.clone(),
                None => self.device.new_command_list()?,
            };
            self.record_level_barriers(level_index, &barrier_list)?;

            let graph = &*self;
            std::thread::scope(|scope| -> OnyxResult<()> {
                let mut workers = Vec::with_capacity(pass_indices.len());
                for (&pass_index, command_list) in pass_indices.iter().zip(&command_lists) {
                    workers.push(scope.spawn(move || graph.run_pass(pass_index, command_list)));
                }
                for worker in workers {
                    worker
                        .join()
                        .map_err(|_| OnyxError::from("render graph worker panicked"))??;
                }
                Ok(())
            })?;

            self.retire_level_resources(level_index, &barrier_list)?;
        }
        Ok(())
    }

    /// Lease this level's created resources from the pool and realize their
    /// declared views. Pool creation failure is fatal for the frame.
    fn realize_level_resources(
        &mut self,
        level_index: usize,
    ) -> OnyxResult<()> {
        let texture_creates: Vec<_> = self.dependency_levels[level_index]
            .texture_creates
            .iter()
            .copied()
            .collect();
        for id in texture_creates {
            let resource = self.pool.allocate_texture(&self.textures[id.index()].desc)?;
            self.textures[id.index()].resource = Some(resource);
            self.create_texture_views(id)?;
        }

        let buffer_creates: Vec<_> = self.dependency_levels[level_index]
            .buffer_creates
            .iter()
            .copied()
            .collect();
        for id in buffer_creates {
            let resource = self.pool.allocate_buffer(&self.buffers[id.index()].desc)?;
            self.buffers[id.index()].resource = Some(resource);
            self.create_buffer_views(id)?;
        }
        Ok(())
    }

    /// Synthesize the minimal transitions bringing every resource this level
    /// touches into its required state. The previous state is the most recent
    /// one recorded by an earlier level; failing that, the resource's initial
    /// state (textures) or COMMON (buffers). No-op transitions are elided.
    fn record_level_barriers(
        &self,
        level_index: usize,
        command_list: &OnyxCommandList,
    ) -> OnyxResult<()> {
        let level = &self.dependency_levels[level_index];

        let mut texture_barriers = Vec::default();
        for (&id, &state) in &level.texture_state_map {
            debug_assert!(state.is_valid_combination());
            let resource = &self.textures[id.index()];
            let texture = resource
                .resource
                .as_ref()
                .expect("state-tracked texture must be realized");

            let src_state = if level.texture_creates.contains(&id) {
                let initial = resource.desc.initial_state;
                // A fresh resource already covering the wanted state needs no
                // transition
                if initial.contains(state) {
                    continue;
                }
                initial
            } else {
                let mut previous = None;
                for earlier in self.dependency_levels[..level_index].iter().rev() {
                    if let Some(&s) = earlier.texture_state_map.get(&id) {
                        previous = Some(s);
                        break;
                    }
                }
                let src_state = previous.unwrap_or(resource.desc.initial_state);
                if src_state == state {
                    continue;
                }
                src_state
            };
            texture_barriers.push(OnyxTextureBarrier::state_transition(
                texture, src_state, state,
            ));
        }

        let mut buffer_barriers = Vec::default();
        for (&id, &state) in &level.buffer_state_map {
            debug_assert!(state.is_valid_combination());
            let resource = &self.buffers[id.index()];
            let buffer = resource
                .resource
                .as_ref()
                .expect("state-tracked buffer must be realized");

            let src_state = if level.buffer_creates.contains(&id) {
                OnyxResourceState::COMMON
            } else {
                let mut previous = None;
                for earlier in self.dependency_levels[..level_index].iter().rev() {
                    if let Some(&s) = earlier.buffer_state_map.get(&id) {
                        previous = Some(s);
                        break;
                    }
                }
                previous.unwrap_or(OnyxResourceState::COMMON)
            };
            if src_state == state {
                continue;
            }
            buffer_barriers.push(OnyxBufferBarrier::state_transition(buffer, src_state, state));
        }

        if !texture_barriers.is_empty() || !buffer_barriers.is_empty() {
            self.device
                .cmd_resource_barrier(command_list, &buffer_barriers, &texture_barriers)?;
        }
        Ok(())
    }

    fn run_pass(
        &self,
        pass_index: usize,
        command_list: &OnyxCommandList,
    ) -> OnyxResult<()> {
        let pass = &self.passes[pass_index];
        let Some(execute) = pass.execute.as_ref() else {
            return Ok(());
        };
        let context = RenderGraphContext::new(self, pass);

        let auto_render_pass = pass.pass_type == RenderGraphPassType::Graphics
            && !pass.skip_auto_render_pass()
            && (!pass.render_targets.is_empty() || pass.depth_stencil.is_some());
        if auto_render_pass {
            let render_pass_def = self.auto_render_pass_def(pass);
            self.device
                .cmd_begin_render_pass(command_list, &render_pass_def)?;
            self.device.cmd_set_viewport(
                command_list,
                pass.viewport_width,
                pass.viewport_height,
            )?;
            let result = execute(&context, command_list);
            self.device.cmd_end_render_pass(command_list)?;
            result
        } else {
            execute(&context, command_list)
        }
    }

    fn auto_render_pass_def(
        &self,
        pass: &RenderGraphPass,
    ) -> OnyxRenderPassDef {
        let mut def = OnyxRenderPassDef {
            width: pass.viewport_width,
            height: pass.viewport_height,
            allow_uav_writes: pass.allow_uav_writes(),
            ..Default::default()
        };

        for info in &pass.render_targets {
            let id = info.handle.resource_id();
            let resource = &self.textures[id.index()];
            let clear_value = match resource.desc.clear_value {
                Some(OnyxClearValue::Color(color)) => color,
                _ => Default::default(),
            };
            def.color_attachments.push(OnyxColorAttachment {
                descriptor: self.texture_view(id, info.handle.view_index()),
                load_op: info.load_op,
                store_op: info.store_op,
                clear_value,
            });
        }

        if let Some(info) = &pass.depth_stencil {
            let id = info.handle.resource_id();
            let resource = &self.textures[id.index()];
            let clear_value = match resource.desc.clear_value {
                Some(OnyxClearValue::DepthStencil(value)) => value,
                _ => Default::default(),
            };
            def.depth_stencil_attachment = Some(OnyxDepthStencilAttachment {
                descriptor: self.texture_view(id, info.handle.view_index()),
                depth_load_op: info.depth_load_op,
                depth_store_op: info.depth_store_op,
                clear_value,
                readonly: info.readonly,
            });
        }

        def
    }

    /// Return resources whose lifetime ends at this level to the pool, after
    /// transitioning them back to their initial state so reuse starts from a
    /// known baseline. Imported resources never appear in destroy sets.
    fn retire_level_resources(
        &self,
        level_index: usize,
        command_list: &OnyxCommandList,
    ) -> OnyxResult<()> {
        let level = &self.dependency_levels[level_index];

        let mut texture_barriers = Vec::default();
        let mut released_textures = Vec::default();
        for &id in &level.texture_destroys {
            let resource = &self.textures[id.index()];
            let texture = resource
                .resource
                .as_ref()
                .expect("destroyed texture must have been realized");
            if let Some(&state) = level.texture_state_map.get(&id) {
                let initial = resource.desc.initial_state;
                if state != initial {
                    texture_barriers.push(OnyxTextureBarrier::state_transition(
                        texture, state, initial,
                    ));
                }
            }
            released_textures.push(texture.clone());
        }

        let mut buffer_barriers = Vec::default();
        let mut released_buffers = Vec::default();
        for &id in &level.buffer_destroys {
            let resource = &self.buffers[id.index()];
            let buffer = resource
                .resource
                .as_ref()
                .expect("destroyed buffer must have been realized");
            if let Some(&state) = level.buffer_state_map.get(&id) {
                if state != OnyxResourceState::COMMON {
                    buffer_barriers.push(OnyxBufferBarrier::state_transition(
                        buffer,
                        state,
                        OnyxResourceState::COMMON,
                    ));
                }
            }
            released_buffers.push(buffer.clone());
        }

        if !texture_barriers.is_empty() || !buffer_barriers.is_empty() {
            self.device
                .cmd_resource_barrier(command_list, &buffer_barriers, &texture_barriers)?;
        }

        for texture in &released_textures {
            self.pool.release_texture(texture);
        }
        for buffer in &released_buffers {
            self.pool.release_buffer(buffer);
        }
        Ok(())
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        for views in self.texture_views.values() {
            for &view in views {
                self.device.destroy_view(view);
            }
        }
        for views in self.buffer_views.values() {
            for &view in views {
                self.device.destroy_view(view);
            }
        }
    }
}
