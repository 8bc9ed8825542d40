use super::graph_blackboard::RenderGraphBlackboard;
use super::graph_pass::{DepthStencilInfo, RenderGraphPassFlags, RenderGraphPassType, RenderTargetInfo};
use super::graph_resource::*;
use super::render_graph::{DeclarationError, RenderGraph};
use super::RenderGraphResourceName;
use onyx_api::{
    OnyxBufferDef, OnyxBufferViewDef, OnyxDescriptorType, OnyxLoadOp, OnyxResourceState,
    OnyxResourceType, OnyxStoreOp, OnyxTextureDef, OnyxTextureViewDef,
};

/// Which shader stages read a resource. Maps to the required resource state;
/// reading in two different stages within one pass requires the union.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderGraphReadAccess {
    PixelShader,
    NonPixelShader,
    AllShader,
}

/// The fluent API a pass uses during its setup callback to declare all
/// resource usage up front. No GPU work happens here; the builder only
/// mutates the owning pass's declaration sets and the graph's resource
/// bookkeeping.
///
/// Contract violations (unknown names, duplicate declarations, shader-state
/// calls on a Copy pass) are recorded and reported together by
/// [`RenderGraph::build`]; builder calls themselves never panic.
pub struct RenderGraphBuilder<'graph> {
    graph: &'graph mut RenderGraph,
    pass_index: usize,
}

impl<'graph> RenderGraphBuilder<'graph> {
    pub(super) fn new(
        graph: &'graph mut RenderGraph,
        pass_index: usize,
    ) -> Self {
        RenderGraphBuilder { graph, pass_index }
    }

    fn pass_name(&self) -> &'static str {
        self.graph.passes[self.pass_index].name
    }

    fn pass_type(&self) -> RenderGraphPassType {
        self.graph.passes[self.pass_index].pass_type
    }

    /// Copy passes may only use the copy-src/copy-dst paths; shader and
    /// attachment accesses require states a copy queue cannot express.
    fn check_not_copy_pass(
        &mut self,
        name: RenderGraphResourceName,
    ) -> bool {
        if self.pass_type() == RenderGraphPassType::Copy {
            let pass = self.pass_name();
            self.graph
                .declaration_errors
                .push(DeclarationError::ShaderAccessInCopyPass { pass, name });
            return false;
        }
        true
    }

    fn resolve_texture(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphTextureId {
        match self.graph.texture_name_map.get(name) {
            Some(&id) => id,
            None => {
                let pass = self.pass_name();
                self.graph
                    .declaration_errors
                    .push(DeclarationError::UnknownResource { pass, name });
                RenderGraphTextureId::INVALID
            }
        }
    }

    fn resolve_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferId {
        match self.graph.buffer_name_map.get(name) {
            Some(&id) => id,
            None => {
                let pass = self.pass_name();
                self.graph
                    .declaration_errors
                    .push(DeclarationError::UnknownResource { pass, name });
                RenderGraphBufferId::INVALID
            }
        }
    }

    fn register_texture_read(
        &mut self,
        id: RenderGraphTextureId,
        state: OnyxResourceState,
    ) {
        let version = self.graph.textures[id.index()].version;
        let pass = &mut self.graph.passes[self.pass_index];
        pass.require_texture_state(id, state);
        pass.texture_reads.insert(id);
        pass.texture_read_versions.insert(id, version);
    }

    /// Every write produces a new version of the resource; that is what
    /// orders later readers against this pass. Writing an imported resource
    /// is externally observable, so the pass is pinned against culling.
    fn register_texture_write(
        &mut self,
        id: RenderGraphTextureId,
        state: OnyxResourceState,
    ) {
        let resource = &mut self.graph.textures[id.index()];
        resource.version += 1;
        let version = resource.version;
        let imported = resource.imported;
        let pass = &mut self.graph.passes[self.pass_index];
        pass.require_texture_state(id, state);
        pass.texture_writes.insert(id);
        pass.texture_write_versions.insert(id, version);
        if imported {
            pass.flags |= RenderGraphPassFlags::FORCE_NO_CULL;
        }
    }

    fn register_buffer_read(
        &mut self,
        id: RenderGraphBufferId,
        state: OnyxResourceState,
    ) {
        let version = self.graph.buffers[id.index()].version;
        let pass = &mut self.graph.passes[self.pass_index];
        pass.require_buffer_state(id, state);
        pass.buffer_reads.insert(id);
        pass.buffer_read_versions.insert(id, version);
    }

    fn register_buffer_write(
        &mut self,
        id: RenderGraphBufferId,
        state: OnyxResourceState,
    ) {
        let resource = &mut self.graph.buffers[id.index()];
        resource.version += 1;
        let version = resource.version;
        let imported = resource.imported;
        let pass = &mut self.graph.passes[self.pass_index];
        pass.require_buffer_state(id, state);
        pass.buffer_writes.insert(id);
        pass.buffer_write_versions.insert(id, version);
        if imported {
            pass.flags |= RenderGraphPassFlags::FORCE_NO_CULL;
        }
    }

    fn shader_read_state(
        &self,
        read_access: RenderGraphReadAccess,
    ) -> OnyxResourceState {
        match self.pass_type() {
            RenderGraphPassType::Graphics => match read_access {
                RenderGraphReadAccess::PixelShader => OnyxResourceState::PIXEL_SHADER_RESOURCE,
                RenderGraphReadAccess::NonPixelShader => {
                    OnyxResourceState::NON_PIXEL_SHADER_RESOURCE
                }
                RenderGraphReadAccess::AllShader => OnyxResourceState::SHADER_RESOURCE,
            },
            // Compute work only has non-pixel stages
            _ => OnyxResourceState::NON_PIXEL_SHADER_RESOURCE,
        }
    }

    pub fn is_texture_declared(
        &self,
        name: RenderGraphResourceName,
    ) -> bool {
        self.graph.texture_name_map.contains_key(name)
    }

    pub fn is_buffer_declared(
        &self,
        name: RenderGraphResourceName,
    ) -> bool {
        self.graph.buffer_name_map.contains_key(name)
    }

    pub fn texture_desc(
        &self,
        name: RenderGraphResourceName,
    ) -> Option<&OnyxTextureDef> {
        let id = *self.graph.texture_name_map.get(name)?;
        Some(&self.graph.textures[id.index()].desc)
    }

    pub fn buffer_desc(
        &self,
        name: RenderGraphResourceName,
    ) -> Option<&OnyxBufferDef> {
        let id = *self.graph.buffer_name_map.get(name)?;
        Some(&self.graph.buffers[id.index()].desc)
    }

    pub fn blackboard(&self) -> &RenderGraphBlackboard {
        self.graph.blackboard()
    }

    /// Declare a new transient texture. The resource is allocated from the
    /// pool just before the first dependency level that touches it runs.
    pub fn create_texture(
        &mut self,
        name: RenderGraphResourceName,
        desc: OnyxTextureDef,
    ) -> RenderGraphTextureId {
        if let Some(&existing) = self.graph.texture_name_map.get(name) {
            self.graph
                .declaration_errors
                .push(DeclarationError::DuplicateResource { name });
            return existing;
        }

        let id = RenderGraphTextureId::new(self.graph.textures.len());
        log::trace!("pass {}: create texture {:?} {:?}", self.pass_name(), id, name);
        self.graph
            .textures
            .push(RenderGraphTextureResource::new_transient(name, desc));
        self.graph.texture_name_map.insert(name, id);
        let pass = &mut self.graph.passes[self.pass_index];
        pass.texture_creates.insert(id);
        pass.texture_write_versions.insert(id, 0);
        id
    }

    /// Declare a new transient buffer.
    pub fn create_buffer(
        &mut self,
        name: RenderGraphResourceName,
        desc: OnyxBufferDef,
    ) -> RenderGraphBufferId {
        if let Some(&existing) = self.graph.buffer_name_map.get(name) {
            self.graph
                .declaration_errors
                .push(DeclarationError::DuplicateResource { name });
            return existing;
        }

        let id = RenderGraphBufferId::new(self.graph.buffers.len());
        log::trace!("pass {}: create buffer {:?} {:?}", self.pass_name(), id, name);
        self.graph
            .buffers
            .push(RenderGraphBufferResource::new_transient(name, desc));
        self.graph.buffer_name_map.insert(name, id);
        let pass = &mut self.graph.passes[self.pass_index];
        pass.buffer_creates.insert(id);
        pass.buffer_write_versions.insert(id, 0);
        id
    }

    /// Register a shader-visible read of a texture.
    pub fn read_texture(
        &mut self,
        name: RenderGraphResourceName,
        read_access: RenderGraphReadAccess,
        view_desc: OnyxTextureViewDef,
    ) -> RenderGraphTextureReadOnlyId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphTextureReadOnlyId::INVALID;
        }
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphTextureReadOnlyId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        resource.desc.resource_type |= OnyxResourceType::TEXTURE;
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::SHADER_RESOURCE;
        }

        let state = self.shader_read_state(read_access);
        self.register_texture_read(id, state);
        let view_index =
            self.graph
                .find_or_add_texture_view(id, view_desc, OnyxDescriptorType::ShaderResource);
        RenderGraphTextureReadOnlyId::new(view_index, id)
    }

    /// Register an unordered-access write of a texture.
    pub fn write_texture(
        &mut self,
        name: RenderGraphResourceName,
        view_desc: OnyxTextureViewDef,
    ) -> RenderGraphTextureReadWriteId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphTextureReadWriteId::INVALID;
        }
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphTextureReadWriteId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        resource.desc.resource_type |= OnyxResourceType::TEXTURE_READ_WRITE;
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::UNORDERED_ACCESS;
        }

        self.register_texture_write(id, OnyxResourceState::UNORDERED_ACCESS);
        let view_index =
            self.graph
                .find_or_add_texture_view(id, view_desc, OnyxDescriptorType::UnorderedAccess);
        RenderGraphTextureReadWriteId::new(view_index, id)
    }

    /// Bind a texture as the next color render target of this pass.
    /// Declaration order dictates binding slot order.
    pub fn write_render_target(
        &mut self,
        name: RenderGraphResourceName,
        load_op: OnyxLoadOp,
        store_op: OnyxStoreOp,
        view_desc: OnyxTextureViewDef,
    ) -> RenderGraphRenderTargetId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphRenderTargetId::INVALID;
        }
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphRenderTargetId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        resource.desc.resource_type |= OnyxResourceType::RENDER_TARGET_COLOR;
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::RENDER_TARGET;
        }

        self.register_texture_write(id, OnyxResourceState::RENDER_TARGET);
        let view_index =
            self.graph
                .find_or_add_texture_view(id, view_desc, OnyxDescriptorType::RenderTarget);
        let handle = RenderGraphRenderTargetId::new(view_index, id);
        self.graph.passes[self.pass_index]
            .render_targets
            .push(RenderTargetInfo {
                handle,
                load_op,
                store_op,
            });
        handle
    }

    /// Bind a texture as this pass's writable depth/stencil target.
    pub fn write_depth_stencil(
        &mut self,
        name: RenderGraphResourceName,
        load_op: OnyxLoadOp,
        store_op: OnyxStoreOp,
        view_desc: OnyxTextureViewDef,
    ) -> RenderGraphDepthStencilId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphDepthStencilId::INVALID;
        }
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphDepthStencilId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        resource.desc.resource_type |= OnyxResourceType::RENDER_TARGET_DEPTH_STENCIL;
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::DEPTH_WRITE;
        }

        self.register_texture_write(id, OnyxResourceState::DEPTH_WRITE);
        let view_index =
            self.graph
                .find_or_add_texture_view(id, view_desc, OnyxDescriptorType::DepthStencil);
        let handle = RenderGraphDepthStencilId::new(view_index, id);
        if self.graph.passes[self.pass_index].depth_stencil.is_some() {
            let pass = self.pass_name();
            self.graph
                .declaration_errors
                .push(DeclarationError::DepthStencilAlreadySet { pass });
            return handle;
        }
        self.graph.passes[self.pass_index].depth_stencil = Some(DepthStencilInfo {
            handle,
            depth_load_op: load_op,
            depth_store_op: store_op,
            readonly: false,
        });
        handle
    }

    /// Bind a texture as a read-only depth/stencil target (depth testing
    /// without depth writes).
    pub fn read_depth_stencil(
        &mut self,
        name: RenderGraphResourceName,
        view_desc: OnyxTextureViewDef,
    ) -> RenderGraphDepthStencilId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphDepthStencilId::INVALID;
        }
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphDepthStencilId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        resource.desc.resource_type |= OnyxResourceType::RENDER_TARGET_DEPTH_STENCIL;
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::DEPTH_WRITE;
        }

        self.register_texture_read(id, OnyxResourceState::DEPTH_READ);
        let view_index =
            self.graph
                .find_or_add_texture_view(id, view_desc, OnyxDescriptorType::DepthStencil);
        let handle = RenderGraphDepthStencilId::new(view_index, id);
        if self.graph.passes[self.pass_index].depth_stencil.is_some() {
            let pass = self.pass_name();
            self.graph
                .declaration_errors
                .push(DeclarationError::DepthStencilAlreadySet { pass });
            return handle;
        }
        self.graph.passes[self.pass_index].depth_stencil = Some(DepthStencilInfo {
            handle,
            depth_load_op: OnyxLoadOp::Load,
            depth_store_op: OnyxStoreOp::Store,
            readonly: true,
        });
        handle
    }

    /// Register a shader-visible read of a buffer.
    pub fn read_buffer(
        &mut self,
        name: RenderGraphResourceName,
        read_access: RenderGraphReadAccess,
        view_desc: OnyxBufferViewDef,
    ) -> RenderGraphBufferReadOnlyId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphBufferReadOnlyId::INVALID;
        }
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferReadOnlyId::INVALID;
        }

        self.graph.buffers[id.index()].desc.resource_type |= OnyxResourceType::BUFFER;
        let state = self.shader_read_state(read_access);
        self.register_buffer_read(id, state);
        let view_index =
            self.graph
                .find_or_add_buffer_view(id, view_desc, OnyxDescriptorType::ShaderResource);
        RenderGraphBufferReadOnlyId::new(view_index, id)
    }

    /// Register an unordered-access write of a buffer.
    pub fn write_buffer(
        &mut self,
        name: RenderGraphResourceName,
        view_desc: OnyxBufferViewDef,
    ) -> RenderGraphBufferReadWriteId {
        if !self.check_not_copy_pass(name) {
            return RenderGraphBufferReadWriteId::INVALID;
        }
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferReadWriteId::INVALID;
        }

        self.graph.buffers[id.index()].desc.resource_type |= OnyxResourceType::BUFFER_READ_WRITE;
        self.register_buffer_write(id, OnyxResourceState::UNORDERED_ACCESS);
        let view_index =
            self.graph
                .find_or_add_buffer_view(id, view_desc, OnyxDescriptorType::UnorderedAccess);
        RenderGraphBufferReadWriteId::new(view_index, id)
    }

    /// Read a texture as the source of a copy. Legal in any pass type; the
    /// normal path for a Copy pass.
    pub fn read_copy_src_texture(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphTextureCopySrcId {
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphTextureId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::COPY_SRC;
        }
        self.register_texture_read(id, OnyxResourceState::COPY_SRC);
        id
    }

    /// Write a texture as the destination of a copy.
    pub fn write_copy_dst_texture(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphTextureCopyDstId {
        let id = self.resolve_texture(name);
        if !id.is_valid() {
            return RenderGraphTextureId::INVALID;
        }

        let resource = &mut self.graph.textures[id.index()];
        if !resource.imported && resource.desc.initial_state == OnyxResourceState::COMMON {
            resource.desc.initial_state = OnyxResourceState::COPY_DST;
        }
        self.register_texture_write(id, OnyxResourceState::COPY_DST);
        id
    }

    pub fn read_copy_src_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferCopySrcId {
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferId::INVALID;
        }
        self.register_buffer_read(id, OnyxResourceState::COPY_SRC);
        id
    }

    pub fn write_copy_dst_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferCopyDstId {
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferId::INVALID;
        }
        self.register_buffer_write(id, OnyxResourceState::COPY_DST);
        id
    }

    /// Read a buffer as the argument source of an indirect draw/dispatch.
    pub fn read_indirect_args_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferIndirectArgsId {
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferId::INVALID;
        }
        self.graph.buffers[id.index()].desc.resource_type |= OnyxResourceType::INDIRECT_BUFFER;
        self.register_buffer_read(id, OnyxResourceState::INDIRECT_ARGUMENT);
        id
    }

    pub fn read_vertex_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferVertexId {
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferId::INVALID;
        }
        self.graph.buffers[id.index()].desc.resource_type |= OnyxResourceType::VERTEX_BUFFER;
        self.register_buffer_read(id, OnyxResourceState::VERTEX_AND_CONSTANT_BUFFER);
        id
    }

    pub fn read_index_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferIndexId {
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferId::INVALID;
        }
        self.graph.buffers[id.index()].desc.resource_type |= OnyxResourceType::INDEX_BUFFER;
        self.register_buffer_read(id, OnyxResourceState::INDEX_BUFFER);
        id
    }

    pub fn read_constant_buffer(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphBufferConstantId {
        let id = self.resolve_buffer(name);
        if !id.is_valid() {
            return RenderGraphBufferId::INVALID;
        }
        self.graph.buffers[id.index()].desc.resource_type |= OnyxResourceType::UNIFORM_BUFFER;
        self.register_buffer_read(id, OnyxResourceState::VERTEX_AND_CONSTANT_BUFFER);
        id
    }

    /// Declare a named scratch upload allocation scoped to this frame.
    /// Scratch space does not participate in state tracking or pooling, only
    /// in lifetime bookkeeping.
    pub fn declare_allocation(
        &mut self,
        name: RenderGraphResourceName,
        size: u64,
        alignment: u64,
    ) -> RenderGraphAllocationId {
        if let Some(&existing) = self.graph.allocation_name_map.get(name) {
            self.graph
                .declaration_errors
                .push(DeclarationError::DuplicateResource { name });
            return existing;
        }

        let id = RenderGraphAllocationId::new(self.graph.allocation_descs.len());
        self.graph
            .allocation_descs
            .push(RenderGraphAllocationDesc { size, alignment });
        self.graph.allocation_name_map.insert(name, id);
        id
    }

    /// Reference a scratch allocation another pass declared.
    pub fn use_allocation(
        &mut self,
        name: RenderGraphResourceName,
    ) -> RenderGraphAllocationId {
        match self.graph.allocation_name_map.get(name) {
            Some(&id) => id,
            None => {
                let pass = self.pass_name();
                self.graph
                    .declaration_errors
                    .push(DeclarationError::UnknownResource { pass, name });
                RenderGraphAllocationId::INVALID
            }
        }
    }

    /// Record the rasterizer viewport for this pass. Applied automatically
    /// before the execute callback runs.
    pub fn set_viewport(
        &mut self,
        width: u32,
        height: u32,
    ) {
        let pass = &mut self.graph.passes[self.pass_index];
        pass.viewport_width = width;
        pass.viewport_height = height;
    }
}
