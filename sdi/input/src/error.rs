use std::collections::TryReserveError;

use sdi_decode::DecodeError;
use thiserror::Error;

/**
    An error reported by a capture driver call.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/**
    A lookup key is absent from a finite mapping table.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key} has no entry in the {table} table")]
pub struct NotFound {
    pub table: &'static str,
    pub key: String,
}

/**
    Errors from opening a capture session.

    Every variant carries the cause as text, so the error can cross thread
    boundaries and be logged after the session has released its handles.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("capture device {index} not found: {cause}")]
    DeviceNotFound { index: usize, cause: String },

    #[error("unsupported capture device: {0}")]
    UnsupportedDevice(String),

    #[error("unsupported connector: {0}")]
    UnsupportedConnector(String),

    #[error("unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported display mode: {0}")]
    UnsupportedMode(String),

    #[error("failed to enable capture: {0}")]
    EnableFailed(String),

    #[error("failed to start streaming: {0}")]
    StartFailed(String),

    #[error("capture session is already open")]
    AlreadyOpen,
}

/**
    Errors from turning one driver delivery into a pipeline frame.

    These never leave the frame callback; they are logged and the frame is
    dropped.
*/
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("could not allocate {bytes} byte audio buffer: {source}")]
    Allocation {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("audio packet holds {len} bytes, expected {expected}")]
    TruncatedPayload { len: usize, expected: usize },

    #[error("could not decode video frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not read frame time: {0}")]
    Timestamp(#[from] DriverError),
}
