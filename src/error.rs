//! Error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("precision exceeded: {0}")]
    PrecisionExceeded(String),

    #[error("No GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("kernel build failed: {0}")]
    KernelBuild(String),

    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),

    #[error("malformed bookmark: {0}")]
    Bookmark(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_region(message: impl Into<String>) -> Self {
        Error::InvalidRegion(message.into())
    }

    pub(crate) fn precision_exceeded(message: impl Into<String>) -> Self {
        Error::PrecisionExceeded(message.into())
    }
}
