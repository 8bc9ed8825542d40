//! Backend-agnostic GPU device abstraction.
//!
//! This crate defines the value types and the device surface that the higher
//! level crates are written against: resource states and bind flags, texture
//! and buffer definitions, barrier records, and the object-safe [`OnyxDevice`]
//! trait. No backend lives here; a concrete device (or a test double)
//! implements the trait and is handed to consumers as an
//! [`OnyxDeviceContext`].

mod error;
pub use error::OnyxError;
pub use error::OnyxResult;

mod types;
pub use types::*;

mod device;
pub use device::OnyxBuffer;
pub use device::OnyxCommandList;
pub use device::OnyxDescriptor;
pub use device::OnyxDevice;
pub use device::OnyxDeviceContext;
pub use device::OnyxTexture;
