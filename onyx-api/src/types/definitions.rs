use crate::{
    OnyxClearValue, OnyxExtents3D, OnyxFormat, OnyxResourceState, OnyxResourceType,
    OnyxSampleCount,
};

/// Used to create an [`OnyxTexture`](crate::OnyxTexture)
#[derive(Clone, Debug, PartialEq)]
pub struct OnyxTextureDef {
    pub extents: OnyxExtents3D,
    // Corresponds to number of vulkan layers and dx12 array size. Generally
    // should be 1, except set to 6 for cubemaps
    pub array_length: u32,
    pub mip_count: u32,
    pub sample_count: OnyxSampleCount,
    pub format: OnyxFormat,
    pub resource_type: OnyxResourceType,
    /// The state the texture is created in, and the state a transient copy of
    /// it is returned to when its frame-local lifetime ends.
    pub initial_state: OnyxResourceState,
    /// Default clear contents for attachment load-op clears.
    pub clear_value: Option<OnyxClearValue>,
}

impl Default for OnyxTextureDef {
    fn default() -> Self {
        OnyxTextureDef {
            extents: OnyxExtents3D {
                width: 0,
                height: 0,
                depth: 1,
            },
            array_length: 1,
            mip_count: 1,
            sample_count: OnyxSampleCount::SampleCount1,
            format: OnyxFormat::UNDEFINED,
            resource_type: OnyxResourceType::TEXTURE,
            initial_state: OnyxResourceState::COMMON,
            clear_value: None,
        }
    }
}

impl OnyxTextureDef {
    pub fn verify(&self) {
        assert!(self.extents.width > 0);
        assert!(self.extents.height > 0);
        assert!(self.extents.depth > 0);
        assert!(self.array_length > 0);
        assert!(self.mip_count > 0);
        assert_ne!(self.format, OnyxFormat::UNDEFINED);
    }

    /// Whether a pooled texture created with `self` can stand in for a request
    /// asking for `other`. Dimensions, format, mips, layers and sample count
    /// must match exactly; bind flags only need to cover what the request
    /// asks for, so a texture created with extra usage bits remains reusable.
    pub fn is_compatible_with(
        &self,
        other: &OnyxTextureDef,
    ) -> bool {
        self.extents == other.extents
            && self.array_length == other.array_length
            && self.mip_count == other.mip_count
            && self.sample_count == other.sample_count
            && self.format == other.format
            && self.resource_type.contains(other.resource_type)
    }
}

/// Used to create an [`OnyxBuffer`](crate::OnyxBuffer)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OnyxBufferDef {
    pub size: u64,
    pub alignment: u32, // May be 0
    pub resource_type: OnyxResourceType,
    /// Element stride for structured buffers, 0 otherwise
    pub element_stride: u32,
}

impl Default for OnyxBufferDef {
    fn default() -> Self {
        OnyxBufferDef {
            size: 0,
            alignment: 0,
            resource_type: OnyxResourceType::BUFFER,
            element_stride: 0,
        }
    }
}

impl OnyxBufferDef {
    pub fn verify(&self) {
        assert_ne!(self.size, 0);
        if self
            .resource_type
            .contains(OnyxResourceType::STRUCTURED_BUFFER)
        {
            assert_ne!(self.element_stride, 0);
        }
    }
}

/// Selects the subresource range a texture view covers. The default covers
/// every mip and every array slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OnyxTextureViewDef {
    pub first_mip: u32,
    /// 0 means "all remaining mips"
    pub mip_count: u32,
    pub first_slice: u32,
    /// 0 means "all remaining slices"
    pub slice_count: u32,
}

/// Selects the byte range a buffer view covers. The default covers the whole
/// buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OnyxBufferViewDef {
    pub offset: u64,
    /// 0 means "to the end of the buffer"
    pub size: u64,
}
