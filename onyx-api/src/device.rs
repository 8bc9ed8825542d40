use crate::{
    OnyxBufferBarrier, OnyxBufferDef, OnyxBufferViewDef, OnyxDescriptorType, OnyxRenderPassDef,
    OnyxResult, OnyxTextureBarrier, OnyxTextureDef, OnyxTextureViewDef,
};
use std::sync::Arc;

/// An opaque handle to a GPU texture. Two handles are equal iff they refer to
/// the same physical resource, regardless of how similar their definitions are.
#[derive(Clone, Debug)]
pub struct OnyxTexture {
    raw: u64,
    def: OnyxTextureDef,
}

impl OnyxTexture {
    pub fn new(
        raw: u64,
        def: OnyxTextureDef,
    ) -> Self {
        OnyxTexture { raw, def }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    pub fn texture_def(&self) -> &OnyxTextureDef {
        &self.def
    }
}

impl PartialEq for OnyxTexture {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.raw == other.raw
    }
}

impl Eq for OnyxTexture {}

/// An opaque handle to a GPU buffer. Equality is physical identity, like
/// [`OnyxTexture`].
#[derive(Clone, Debug)]
pub struct OnyxBuffer {
    raw: u64,
    def: OnyxBufferDef,
}

impl OnyxBuffer {
    pub fn new(
        raw: u64,
        def: OnyxBufferDef,
    ) -> Self {
        OnyxBuffer { raw, def }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    pub fn buffer_def(&self) -> &OnyxBufferDef {
        &self.def
    }
}

impl PartialEq for OnyxBuffer {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.raw == other.raw
    }
}

impl Eq for OnyxBuffer {}

/// An opaque handle to a command list commands are recorded into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnyxCommandList {
    raw: u64,
}

impl OnyxCommandList {
    pub fn new(raw: u64) -> Self {
        OnyxCommandList { raw }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }
}

/// An opaque CPU descriptor handle for a resource view (SRV/UAV/RTV/DSV).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct OnyxDescriptor {
    raw: u64,
}

impl OnyxDescriptor {
    pub fn new(raw: u64) -> Self {
        OnyxDescriptor { raw }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }
}

/// The device surface the rest of the stack is written against.
///
/// Implementations own resource memory and command recording; callers never
/// see backend objects, only the opaque handles above. All methods take
/// `&self` — an implementation is expected to be internally synchronized to
/// the extent its backend requires.
pub trait OnyxDevice: Send + Sync {
    fn create_texture(
        &self,
        def: &OnyxTextureDef,
    ) -> OnyxResult<OnyxTexture>;

    fn destroy_texture(
        &self,
        texture: &OnyxTexture,
    );

    fn create_buffer(
        &self,
        def: &OnyxBufferDef,
    ) -> OnyxResult<OnyxBuffer>;

    fn destroy_buffer(
        &self,
        buffer: &OnyxBuffer,
    );

    fn create_texture_view(
        &self,
        texture: &OnyxTexture,
        view_type: OnyxDescriptorType,
        view_def: &OnyxTextureViewDef,
    ) -> OnyxResult<OnyxDescriptor>;

    fn create_buffer_view(
        &self,
        buffer: &OnyxBuffer,
        view_type: OnyxDescriptorType,
        view_def: &OnyxBufferViewDef,
    ) -> OnyxResult<OnyxDescriptor>;

    fn destroy_view(
        &self,
        view: OnyxDescriptor,
    );

    fn new_command_list(&self) -> OnyxResult<OnyxCommandList>;

    /// Record a batch of resource state transitions. Batching matters: a
    /// backend submits all of them as one API call.
    fn cmd_resource_barrier(
        &self,
        command_list: &OnyxCommandList,
        buffer_barriers: &[OnyxBufferBarrier<'_>],
        texture_barriers: &[OnyxTextureBarrier<'_>],
    ) -> OnyxResult<()>;

    fn cmd_begin_render_pass(
        &self,
        command_list: &OnyxCommandList,
        render_pass_def: &OnyxRenderPassDef,
    ) -> OnyxResult<()>;

    fn cmd_end_render_pass(
        &self,
        command_list: &OnyxCommandList,
    ) -> OnyxResult<()>;

    fn cmd_set_viewport(
        &self,
        command_list: &OnyxCommandList,
        width: u32,
        height: u32,
    ) -> OnyxResult<()>;
}

pub type OnyxDeviceContext = Arc<dyn OnyxDevice>;
