use super::graph_blackboard::RenderGraphBlackboard;
use super::graph_pass::RenderGraphPass;
use super::graph_resource::*;
use super::render_graph::RenderGraph;
use onyx_api::{OnyxBuffer, OnyxDescriptor, OnyxTexture};

/// The accessor handed to every pass's execute callback. Resolves the ids the
/// pass collected during setup into physical resources and view descriptors.
///
/// Declaring resources is impossible here — the context is read-only. Asking
/// for a resource the graph never realized (a culled transient, or an id from
/// a different graph) is a programmer error and panics.
pub struct RenderGraphContext<'graph> {
    graph: &'graph RenderGraph,
    pass: &'graph RenderGraphPass,
}

impl<'graph> RenderGraphContext<'graph> {
    pub(super) fn new(
        graph: &'graph RenderGraph,
        pass: &'graph RenderGraphPass,
    ) -> Self {
        RenderGraphContext { graph, pass }
    }

    pub fn pass_name(&self) -> &'static str {
        self.pass.name
    }

    pub fn blackboard(&self) -> &RenderGraphBlackboard {
        self.graph.blackboard()
    }

    pub fn texture(
        &self,
        id: RenderGraphTextureId,
    ) -> &OnyxTexture {
        let resource = &self.graph.textures[id.index()];
        match resource.resource.as_ref() {
            Some(texture) => texture,
            None => panic!(
                "texture {:?} was not realized for pass {}",
                resource.name, self.pass.name
            ),
        }
    }

    pub fn buffer(
        &self,
        id: RenderGraphBufferId,
    ) -> &OnyxBuffer {
        let resource = &self.graph.buffers[id.index()];
        match resource.resource.as_ref() {
            Some(buffer) => buffer,
            None => panic!(
                "buffer {:?} was not realized for pass {}",
                resource.name, self.pass.name
            ),
        }
    }

    pub fn copy_src_texture(
        &self,
        id: RenderGraphTextureCopySrcId,
    ) -> &OnyxTexture {
        self.texture(id)
    }

    pub fn copy_dst_texture(
        &self,
        id: RenderGraphTextureCopyDstId,
    ) -> &OnyxTexture {
        self.texture(id)
    }

    pub fn copy_src_buffer(
        &self,
        id: RenderGraphBufferCopySrcId,
    ) -> &OnyxBuffer {
        self.buffer(id)
    }

    pub fn copy_dst_buffer(
        &self,
        id: RenderGraphBufferCopyDstId,
    ) -> &OnyxBuffer {
        self.buffer(id)
    }

    pub fn indirect_args_buffer(
        &self,
        id: RenderGraphBufferIndirectArgsId,
    ) -> &OnyxBuffer {
        self.buffer(id)
    }

    pub fn vertex_buffer(
        &self,
        id: RenderGraphBufferVertexId,
    ) -> &OnyxBuffer {
        self.buffer(id)
    }

    pub fn index_buffer(
        &self,
        id: RenderGraphBufferIndexId,
    ) -> &OnyxBuffer {
        self.buffer(id)
    }

    pub fn constant_buffer(
        &self,
        id: RenderGraphBufferConstantId,
    ) -> &OnyxBuffer {
        self.buffer(id)
    }

    pub fn read_only_texture(
        &self,
        id: RenderGraphTextureReadOnlyId,
    ) -> OnyxDescriptor {
        self.graph.texture_view(id.resource_id(), id.view_index())
    }

    pub fn read_write_texture(
        &self,
        id: RenderGraphTextureReadWriteId,
    ) -> OnyxDescriptor {
        self.graph.texture_view(id.resource_id(), id.view_index())
    }

    pub fn render_target(
        &self,
        id: RenderGraphRenderTargetId,
    ) -> OnyxDescriptor {
        self.graph.texture_view(id.resource_id(), id.view_index())
    }

    pub fn depth_stencil(
        &self,
        id: RenderGraphDepthStencilId,
    ) -> OnyxDescriptor {
        self.graph.texture_view(id.resource_id(), id.view_index())
    }

    pub fn read_only_buffer(
        &self,
        id: RenderGraphBufferReadOnlyId,
    ) -> OnyxDescriptor {
        self.graph.buffer_view(id.resource_id(), id.view_index())
    }

    pub fn read_write_buffer(
        &self,
        id: RenderGraphBufferReadWriteId,
    ) -> OnyxDescriptor {
        self.graph.buffer_view(id.resource_id(), id.view_index())
    }

    /// Resolve a scratch allocation declared during setup.
    pub fn allocation(
        &self,
        id: RenderGraphAllocationId,
    ) -> RenderGraphAllocation {
        self.graph.allocations[id.index()]
    }
}
