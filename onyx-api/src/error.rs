use std::sync::Arc;

pub type OnyxResult<T> = Result<T, OnyxError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
#[derive(Debug, Clone)]
pub enum OnyxError {
    StringError(String),
    IoError(Arc<std::io::Error>),
    /// The device could not satisfy an allocation request. Fatal for the frame
    /// that triggered it; whether to retry at a lower resolution or terminate
    /// is a policy decision for the caller that owns the device.
    OutOfDeviceMemory,
    /// The device was lost or removed. Everything created from it is invalid.
    DeviceLost,
}

impl std::error::Error for OnyxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            OnyxError::StringError(_) => None,
            OnyxError::IoError(ref e) => Some(&**e),
            OnyxError::OutOfDeviceMemory => None,
            OnyxError::DeviceLost => None,
        }
    }
}

impl core::fmt::Display for OnyxError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            OnyxError::StringError(ref e) => e.fmt(fmt),
            OnyxError::IoError(ref e) => e.fmt(fmt),
            OnyxError::OutOfDeviceMemory => write!(fmt, "out of device memory"),
            OnyxError::DeviceLost => write!(fmt, "device lost"),
        }
    }
}

impl From<&str> for OnyxError {
    fn from(str: &str) -> Self {
        OnyxError::StringError(str.to_string())
    }
}

impl From<String> for OnyxError {
    fn from(string: String) -> Self {
        OnyxError::StringError(string)
    }
}

impl From<std::io::Error> for OnyxError {
    fn from(error: std::io::Error) -> Self {
        OnyxError::IoError(Arc::new(error))
    }
}
