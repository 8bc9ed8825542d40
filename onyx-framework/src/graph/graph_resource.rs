use super::RenderGraphResourceName;
use onyx_api::{OnyxBuffer, OnyxBufferDef, OnyxTexture, OnyxTextureDef};

const INVALID_RESOURCE_ID: u32 = u32::MAX;
const INVALID_VIEW_ID: u64 = u64::MAX;

//
// Resource ids
//
// One id per logical texture/buffer declared for the lifetime of one graph.
// Ids are never reused within a graph instance; the all-ones value is the
// invalid sentinel.
//

/// Identifies a logical texture within one render graph instance
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RenderGraphTextureId(pub(super) u32);

/// Identifies a logical buffer within one render graph instance
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RenderGraphBufferId(pub(super) u32);

impl RenderGraphTextureId {
    pub const INVALID: Self = RenderGraphTextureId(INVALID_RESOURCE_ID);

    pub(super) fn new(index: usize) -> Self {
        RenderGraphTextureId(index as u32)
    }

    pub fn is_valid(self) -> bool {
        self.0 != INVALID_RESOURCE_ID
    }

    pub(super) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for RenderGraphTextureId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl RenderGraphBufferId {
    pub const INVALID: Self = RenderGraphBufferId(INVALID_RESOURCE_ID);

    pub(super) fn new(index: usize) -> Self {
        RenderGraphBufferId(index as u32)
    }

    pub fn is_valid(self) -> bool {
        self.0 != INVALID_RESOURCE_ID
    }

    pub(super) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for RenderGraphBufferId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Copy accesses bind the whole resource, not a view of it, so the copy ids
/// are plain resource ids.
pub type RenderGraphTextureCopySrcId = RenderGraphTextureId;
pub type RenderGraphTextureCopyDstId = RenderGraphTextureId;
pub type RenderGraphBufferCopySrcId = RenderGraphBufferId;
pub type RenderGraphBufferCopyDstId = RenderGraphBufferId;
pub type RenderGraphBufferIndirectArgsId = RenderGraphBufferId;
pub type RenderGraphBufferVertexId = RenderGraphBufferId;
pub type RenderGraphBufferIndexId = RenderGraphBufferId;
pub type RenderGraphBufferConstantId = RenderGraphBufferId;

//
// View ids
//
// A view id packs (view_index << 32 | resource_id) so it decomposes in O(1).
// Each struct is its own type so an SRV of a texture cannot be passed where a
// UAV of a buffer is expected.
//

macro_rules! declare_texture_view_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub struct $name(u64);

        impl $name {
            pub const INVALID: Self = $name(INVALID_VIEW_ID);

            pub(super) fn new(
                view_index: usize,
                resource: RenderGraphTextureId,
            ) -> Self {
                $name(((view_index as u64) << 32) | resource.0 as u64)
            }

            pub fn is_valid(self) -> bool {
                self.0 != INVALID_VIEW_ID
            }

            pub fn view_index(self) -> usize {
                (self.0 >> 32) as usize
            }

            pub fn resource_id(self) -> RenderGraphTextureId {
                RenderGraphTextureId(self.0 as u32)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

macro_rules! declare_buffer_view_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub struct $name(u64);

        impl $name {
            pub const INVALID: Self = $name(INVALID_VIEW_ID);

            pub(super) fn new(
                view_index: usize,
                resource: RenderGraphBufferId,
            ) -> Self {
                $name(((view_index as u64) << 32) | resource.0 as u64)
            }

            pub fn is_valid(self) -> bool {
                self.0 != INVALID_VIEW_ID
            }

            pub fn view_index(self) -> usize {
                (self.0 >> 32) as usize
            }

            pub fn resource_id(self) -> RenderGraphBufferId {
                RenderGraphBufferId(self.0 as u32)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

declare_texture_view_id!(
    RenderGraphTextureReadOnlyId,
    "An SRV of a texture, returned by `read_texture`"
);
declare_texture_view_id!(
    RenderGraphTextureReadWriteId,
    "A UAV of a texture, returned by `write_texture`"
);
declare_texture_view_id!(
    RenderGraphRenderTargetId,
    "An RTV of a texture, returned by `write_render_target`"
);
declare_texture_view_id!(
    RenderGraphDepthStencilId,
    "A DSV of a texture, returned by `write_depth_stencil`/`read_depth_stencil`"
);
declare_buffer_view_id!(
    RenderGraphBufferReadOnlyId,
    "An SRV of a buffer, returned by `read_buffer`"
);
declare_buffer_view_id!(
    RenderGraphBufferReadWriteId,
    "A UAV of a buffer, returned by `write_buffer`"
);

//
// Scratch allocations
//

/// Identifies a per-frame scratch upload allocation declared by a pass
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct RenderGraphAllocationId(pub(super) u32);

impl RenderGraphAllocationId {
    pub const INVALID: Self = RenderGraphAllocationId(INVALID_RESOURCE_ID);

    pub(super) fn new(index: usize) -> Self {
        RenderGraphAllocationId(index as u32)
    }

    pub fn is_valid(self) -> bool {
        self.0 != INVALID_RESOURCE_ID
    }

    pub(super) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resolved scratch allocation: a byte range in the frame's upload space.
/// Valid only for the frame the owning graph executes in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderGraphAllocation {
    pub offset: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct RenderGraphAllocationDesc {
    pub size: u64,
    pub alignment: u64,
}

//
// Resource records
//
// One record per declared texture/buffer, alive for the whole graph build.
// Records are never removed; culling only stops them being realized.
//

pub(super) struct RenderGraphTextureResource {
    pub name: RenderGraphResourceName,
    pub imported: bool,
    /// Bumped on every write. Readers observe the version current at
    /// declaration time, which orders them against the producing writer.
    pub version: u32,
    /// Number of declared reads across all passes
    pub ref_count: u32,
    pub desc: OnyxTextureDef,
    pub resource: Option<OnyxTexture>,
    /// Pass index of the topologically last non-culled user
    pub last_used_by: Option<usize>,
}

impl RenderGraphTextureResource {
    pub fn new_transient(
        name: RenderGraphResourceName,
        desc: OnyxTextureDef,
    ) -> Self {
        RenderGraphTextureResource {
            name,
            imported: false,
            version: 0,
            ref_count: 0,
            desc,
            resource: None,
            last_used_by: None,
        }
    }

    pub fn new_imported(
        name: RenderGraphResourceName,
        texture: &OnyxTexture,
    ) -> Self {
        RenderGraphTextureResource {
            name,
            imported: true,
            version: 0,
            ref_count: 0,
            desc: texture.texture_def().clone(),
            resource: Some(texture.clone()),
            last_used_by: None,
        }
    }
}

pub(super) struct RenderGraphBufferResource {
    pub name: RenderGraphResourceName,
    pub imported: bool,
    pub version: u32,
    pub ref_count: u32,
    pub desc: OnyxBufferDef,
    pub resource: Option<OnyxBuffer>,
    pub last_used_by: Option<usize>,
}

impl RenderGraphBufferResource {
    pub fn new_transient(
        name: RenderGraphResourceName,
        desc: OnyxBufferDef,
    ) -> Self {
        RenderGraphBufferResource {
            name,
            imported: false,
            version: 0,
            ref_count: 0,
            desc,
            resource: None,
            last_used_by: None,
        }
    }

    pub fn new_imported(
        name: RenderGraphResourceName,
        buffer: &OnyxBuffer,
    ) -> Self {
        RenderGraphBufferResource {
            name,
            imported: true,
            version: 0,
            ref_count: 0,
            desc: buffer.buffer_def().clone(),
            resource: Some(buffer.clone()),
            last_used_by: None,
        }
    }
}
