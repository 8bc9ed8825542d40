use crate::{OnyxBuffer, OnyxDescriptor, OnyxTexture};

bitflags::bitflags! {
    /// The current state of a resource. When an operation is performed that references a resource,
    /// it must be in the correct state. Resources are moved between states using barriers.
    pub struct OnyxResourceState: u32 {
        const UNDEFINED = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        /// Similar to vulkan's COLOR_ATTACHMENT_OPTIMAL image layout
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        /// Similar to vulkan's DEPTH_STENCIL_ATTACHMENT_OPTIMAL image layout
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        /// Similar to vulkan's SHADER_READ_ONLY_OPTIMAL image layout
        const SHADER_RESOURCE = 0x40 | 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        /// Similar to vulkan's TRANSFER_DST_OPTIMAL image layout
        const COPY_DST = 0x400;
        /// Similar to vulkan's TRANSFER_SRC_OPTIMAL image layout
        const COPY_SRC = 0x800;
        const GENERIC_READ = (((((0x1 | 0x2) | 0x40) | 0x80) | 0x200) | 0x800);
        /// Similar to vulkan's PRESENT_SRC_KHR image layout
        const PRESENT = 0x1000;
        /// Similar to vulkan's COMMON image layout
        const COMMON = 0x2000;
    }
}

impl Default for OnyxResourceState {
    fn default() -> Self {
        OnyxResourceState::COMMON
    }
}

impl OnyxResourceState {
    /// A state combination is only legal if write states are exclusive: a
    /// resource cannot be a render target, depth target, UAV, or copy
    /// destination at the same time as anything else.
    pub fn is_valid_combination(self) -> bool {
        let write_states = OnyxResourceState::RENDER_TARGET
            | OnyxResourceState::UNORDERED_ACCESS
            | OnyxResourceState::DEPTH_WRITE
            | OnyxResourceState::COPY_DST;
        if self.intersects(write_states) {
            return (self & write_states) == self && (self & write_states).bits().count_ones() == 1;
        }
        true
    }
}

bitflags::bitflags! {
    /// Indicates how a resource will be used. In some cases, multiple flags are allowed.
    #[derive(Default)]
    pub struct OnyxResourceType: u32 {
        const UNDEFINED = 0;
        /// Similar to DX12 SRV and vulkan SAMPLED image usage flag
        const TEXTURE = 1<<0;
        /// Similar to DX12 UAV and vulkan STORAGE image usage flag
        const TEXTURE_READ_WRITE = 1<<1;
        /// Similar to DX12 SRV and vulkan STORAGE_BUFFER descriptor type
        const BUFFER = 1<<2;
        /// Similar to DX12 UAV and vulkan STORAGE_BUFFER descriptor type
        const BUFFER_READ_WRITE = 1<<3;
        const UNIFORM_BUFFER = 1<<4;
        const VERTEX_BUFFER = 1<<5;
        const INDEX_BUFFER = 1<<6;
        const INDIRECT_BUFFER = 1<<7;
        /// A structured buffer with a fixed element stride
        const STRUCTURED_BUFFER = 1<<8;
        /// A byte-address buffer
        const RAW_BUFFER = 1<<9;
        /// Backing storage for a ray tracing acceleration structure
        const ACCELERATION_STRUCTURE = 1<<10;
        /// A color attachment in a renderpass
        const RENDER_TARGET_COLOR = 1<<11;
        /// A depth/stencil attachment in a renderpass
        const RENDER_TARGET_DEPTH_STENCIL = 1<<12;
    }
}

impl OnyxResourceType {
    pub fn is_render_target(self) -> bool {
        self.intersects(
            OnyxResourceType::RENDER_TARGET_COLOR | OnyxResourceType::RENDER_TARGET_DEPTH_STENCIL,
        )
    }

    pub fn is_texture(self) -> bool {
        self.intersects(OnyxResourceType::TEXTURE | OnyxResourceType::TEXTURE_READ_WRITE)
    }
}

/// A 2d size for windows, textures, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OnyxExtents2D {
    pub width: u32,
    pub height: u32,
}

/// A 3d size for windows, textures, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OnyxExtents3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl OnyxExtents3D {
    pub fn to_2d(self) -> OnyxExtents2D {
        OnyxExtents2D {
            width: self.width,
            height: self.height,
        }
    }
}

/// Number of MSAA samples to use. 1xMSAA and 4xMSAA are most broadly supported
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OnyxSampleCount {
    SampleCount1,
    SampleCount2,
    SampleCount4,
    SampleCount8,
    SampleCount16,
}

impl Default for OnyxSampleCount {
    fn default() -> Self {
        OnyxSampleCount::SampleCount1
    }
}

/// Texel formats the abstraction understands. A backend maps these onto its
/// native format enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum OnyxFormat {
    UNDEFINED,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    R16G16_SFLOAT,
    R32_SFLOAT,
    R32_UINT,
    R11G11B10_UFLOAT,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
}

impl Default for OnyxFormat {
    fn default() -> Self {
        OnyxFormat::UNDEFINED
    }
}

impl OnyxFormat {
    pub fn has_depth(self) -> bool {
        matches!(
            self,
            OnyxFormat::D32_SFLOAT | OnyxFormat::D24_UNORM_S8_UINT
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, OnyxFormat::D24_UNORM_S8_UINT)
    }
}

/// Determines what happens to the contents of an attachment when a render pass begins
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum OnyxLoadOp {
    DontCare,
    Load,
    Clear,
}

impl Default for OnyxLoadOp {
    fn default() -> Self {
        OnyxLoadOp::DontCare
    }
}

/// Determines if the contents of an attachment are persisted when a render pass completes
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum OnyxStoreOp {
    /// Do not store the image, leaving the contents of it undefined
    DontCare,

    /// Persist the image's content after a render pass completes
    Store,
}

impl Default for OnyxStoreOp {
    fn default() -> Self {
        OnyxStoreOp::Store
    }
}

/// A clear value for color attachments
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OnyxColorClearValue(pub [f32; 4]);

/// A clear value for depth/stencil attachments. One or both values may be used
/// depending on the format of the attached image
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OnyxDepthStencilClearValue {
    pub depth: f32,
    pub stencil: u32,
}

impl Default for OnyxDepthStencilClearValue {
    fn default() -> Self {
        OnyxDepthStencilClearValue {
            depth: 0.0,
            stencil: 0,
        }
    }
}

/// The default clear contents a texture definition may carry. The automatic
/// render pass setup uses it when an attachment is loaded with
/// [`OnyxLoadOp::Clear`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OnyxClearValue {
    Color(OnyxColorClearValue),
    DepthStencil(OnyxDepthStencilClearValue),
}

/// Which kind of view a descriptor refers to. SRV/UAV/RTV/DSV in DX12 terms.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OnyxDescriptorType {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
}

/// A memory barrier for buffers. Transitions a buffer between resource states.
pub struct OnyxBufferBarrier<'a> {
    pub buffer: &'a OnyxBuffer,
    pub src_state: OnyxResourceState,
    pub dst_state: OnyxResourceState,
}

/// A memory barrier for textures. Transitions a texture between resource states.
pub struct OnyxTextureBarrier<'a> {
    pub texture: &'a OnyxTexture,
    pub src_state: OnyxResourceState,
    pub dst_state: OnyxResourceState,
}

impl<'a> OnyxTextureBarrier<'a> {
    /// Creates a simple state transition
    pub fn state_transition(
        texture: &'a OnyxTexture,
        src_state: OnyxResourceState,
        dst_state: OnyxResourceState,
    ) -> OnyxTextureBarrier<'a> {
        OnyxTextureBarrier {
            texture,
            src_state,
            dst_state,
        }
    }
}

impl<'a> OnyxBufferBarrier<'a> {
    /// Creates a simple state transition
    pub fn state_transition(
        buffer: &'a OnyxBuffer,
        src_state: OnyxResourceState,
        dst_state: OnyxResourceState,
    ) -> OnyxBufferBarrier<'a> {
        OnyxBufferBarrier {
            buffer,
            src_state,
            dst_state,
        }
    }
}

/// A color attachment bound for the duration of a render pass
#[derive(Clone, Debug)]
pub struct OnyxColorAttachment {
    pub descriptor: OnyxDescriptor,
    pub load_op: OnyxLoadOp,
    pub store_op: OnyxStoreOp,
    pub clear_value: OnyxColorClearValue,
}

/// A depth/stencil attachment bound for the duration of a render pass
#[derive(Clone, Debug)]
pub struct OnyxDepthStencilAttachment {
    pub descriptor: OnyxDescriptor,
    pub depth_load_op: OnyxLoadOp,
    pub depth_store_op: OnyxStoreOp,
    pub clear_value: OnyxDepthStencilClearValue,
    pub readonly: bool,
}

/// Everything a backend needs to begin a render pass: the attachment list in
/// binding-slot order, the optional depth target, and the raster dimensions.
#[derive(Clone, Debug, Default)]
pub struct OnyxRenderPassDef {
    pub color_attachments: Vec<OnyxColorAttachment>,
    pub depth_stencil_attachment: Option<OnyxDepthStencilAttachment>,
    pub width: u32,
    pub height: u32,
    pub allow_uav_writes: bool,
}

impl Default for OnyxDepthStencilAttachment {
    fn default() -> Self {
        OnyxDepthStencilAttachment {
            descriptor: OnyxDescriptor::default(),
            depth_load_op: Default::default(),
            depth_store_op: Default::default(),
            clear_value: Default::default(),
            readonly: false,
        }
    }
}
