mod graph_resource;
pub use graph_resource::RenderGraphAllocation;
pub use graph_resource::RenderGraphAllocationId;
pub use graph_resource::RenderGraphBufferCopyDstId;
pub use graph_resource::RenderGraphBufferCopySrcId;
pub use graph_resource::RenderGraphBufferId;
pub use graph_resource::RenderGraphBufferIndexId;
pub use graph_resource::RenderGraphBufferIndirectArgsId;
pub use graph_resource::RenderGraphBufferConstantId;
pub use graph_resource::RenderGraphBufferReadOnlyId;
pub use graph_resource::RenderGraphBufferReadWriteId;
pub use graph_resource::RenderGraphBufferVertexId;
pub use graph_resource::RenderGraphDepthStencilId;
pub use graph_resource::RenderGraphRenderTargetId;
pub use graph_resource::RenderGraphTextureCopyDstId;
pub use graph_resource::RenderGraphTextureCopySrcId;
pub use graph_resource::RenderGraphTextureId;
pub use graph_resource::RenderGraphTextureReadOnlyId;
pub use graph_resource::RenderGraphTextureReadWriteId;

mod graph_pass;
pub use graph_pass::RenderGraphPassFlags;
pub use graph_pass::RenderGraphPassType;

mod graph_blackboard;
pub use graph_blackboard::BlackboardEntry;
pub use graph_blackboard::RenderGraphBlackboard;

mod graph_resource_pool;
pub use graph_resource_pool::RenderGraphResourcePool;

mod graph_builder;
pub use graph_builder::RenderGraphBuilder;
pub use graph_builder::RenderGraphReadAccess;

mod graph_context;
pub use graph_context::RenderGraphContext;

mod render_graph;
pub use render_graph::DeclarationError;
pub use render_graph::RenderGraph;
pub use render_graph::RenderGraphError;

#[cfg(test)]
mod graph_tests;

/// Resources and scratch allocations are declared and referenced by name.
pub type RenderGraphResourceName = &'static str;
