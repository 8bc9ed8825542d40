//! Cross-frame cache of physical GPU resources.
//!
//! Creating and destroying textures every frame is far too expensive, so the
//! graph leases transient resources from this pool and returns them when
//! their frame-local lifetime ends. A returned resource can be handed out
//! again to any later request with a compatible description. Entries that sit
//! unused past a grace period are destroyed so description churn (resolution
//! changes, toggled features) does not grow memory without bound.
//!
//! The pool is the one object shared across graph instances. Sharing is by
//! cloning (`Arc` internally); every operation takes the lock for just that
//! call.

use onyx_api::{
    OnyxBuffer, OnyxBufferDef, OnyxDeviceContext, OnyxResult, OnyxTexture, OnyxTextureDef,
};
use std::sync::{Arc, Mutex};

/// How many frames an inactive entry survives before eviction
const POOL_EVICTION_GRACE_FRAMES: u64 = 4;

struct PooledTexture {
    texture: OnyxTexture,
    last_used_frame: u64,
    active: bool,
}

struct PooledBuffer {
    buffer: OnyxBuffer,
    last_used_frame: u64,
    active: bool,
}

struct RenderGraphResourcePoolInner {
    device: OnyxDeviceContext,
    frame_index: u64,
    textures: Vec<PooledTexture>,
    buffers: Vec<PooledBuffer>,
}

#[derive(Clone)]
pub struct RenderGraphResourcePool {
    inner: Arc<Mutex<RenderGraphResourcePoolInner>>,
}

impl RenderGraphResourcePool {
    pub fn new(device: OnyxDeviceContext) -> Self {
        RenderGraphResourcePool {
            inner: Arc::new(Mutex::new(RenderGraphResourcePoolInner {
                device,
                frame_index: 0,
                textures: Vec::default(),
                buffers: Vec::default(),
            })),
        }
    }

    pub fn device(&self) -> OnyxDeviceContext {
        self.inner.lock().unwrap().device.clone()
    }

    /// Lease a texture compatible with `def`. Reuses the first inactive
    /// compatible entry; otherwise creates a new physical texture. Creation
    /// failure is fatal for the frame and propagated to the caller.
    pub fn allocate_texture(
        &self,
        def: &OnyxTextureDef,
    ) -> OnyxResult<OnyxTexture> {
        let inner = &mut *self.inner.lock().unwrap();
        let frame_index = inner.frame_index;
        for entry in &mut inner.textures {
            if !entry.active && entry.texture.texture_def().is_compatible_with(def) {
                entry.active = true;
                entry.last_used_frame = frame_index;
                log::trace!("pool: reuse texture {}", entry.texture.raw());
                return Ok(entry.texture.clone());
            }
        }

        let texture = inner.device.create_texture(def)?;
        log::trace!("pool: miss, created texture {}", texture.raw());
        inner.textures.push(PooledTexture {
            texture: texture.clone(),
            last_used_frame: frame_index,
            active: true,
        });
        Ok(texture)
    }

    /// Return a leased texture to the pool. A no-op for handles the pool does
    /// not hold active — releasing twice is harmless.
    pub fn release_texture(
        &self,
        texture: &OnyxTexture,
    ) {
        let inner = &mut *self.inner.lock().unwrap();
        for entry in &mut inner.textures {
            if entry.active && entry.texture == *texture {
                entry.active = false;
            }
        }
    }

    /// Lease a buffer whose description matches `def` exactly.
    pub fn allocate_buffer(
        &self,
        def: &OnyxBufferDef,
    ) -> OnyxResult<OnyxBuffer> {
        let inner = &mut *self.inner.lock().unwrap();
        let frame_index = inner.frame_index;
        for entry in &mut inner.buffers {
            if !entry.active && entry.buffer.buffer_def() == def {
                entry.active = true;
                entry.last_used_frame = frame_index;
                log::trace!("pool: reuse buffer {}", entry.buffer.raw());
                return Ok(entry.buffer.clone());
            }
        }

        let buffer = inner.device.create_buffer(def)?;
        log::trace!("pool: miss, created buffer {}", buffer.raw());
        inner.buffers.push(PooledBuffer {
            buffer: buffer.clone(),
            last_used_frame: frame_index,
            active: true,
        });
        Ok(buffer)
    }

    pub fn release_buffer(
        &self,
        buffer: &OnyxBuffer,
    ) {
        let inner = &mut *self.inner.lock().unwrap();
        for entry in &mut inner.buffers {
            if entry.active && entry.buffer == *buffer {
                entry.active = false;
            }
        }
    }

    /// Advance the frame counter and evict entries that have been inactive
    /// for longer than the grace period. Called once per graph execution.
    pub fn tick(&self) {
        let inner = &mut *self.inner.lock().unwrap();
        inner.frame_index += 1;
        let frame_index = inner.frame_index;

        let device = inner.device.clone();
        inner.textures.retain(|entry| {
            let keep =
                entry.active || entry.last_used_frame + POOL_EVICTION_GRACE_FRAMES >= frame_index;
            if !keep {
                log::trace!("pool: evict texture {}", entry.texture.raw());
                device.destroy_texture(&entry.texture);
            }
            keep
        });
        inner.buffers.retain(|entry| {
            let keep =
                entry.active || entry.last_used_frame + POOL_EVICTION_GRACE_FRAMES >= frame_index;
            if !keep {
                log::trace!("pool: evict buffer {}", entry.buffer.raw());
                device.destroy_buffer(&entry.buffer);
            }
            keep
        });
    }
}

impl Drop for RenderGraphResourcePoolInner {
    fn drop(&mut self) {
        for entry in &self.textures {
            self.device.destroy_texture(&entry.texture);
        }
        for entry in &self.buffers {
            self.device.destroy_buffer(&entry.buffer);
        }
    }
}
