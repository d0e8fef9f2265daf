use std::collections::TryReserveError;

use sdi_types::PixelFormat;
use thiserror::Error;

/**
    Errors from decoding a single raw frame.
*/
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("row stride {stride} is smaller than the {min} bytes a {width} pixel row needs")]
    StrideTooSmall {
        stride: usize,
        min: usize,
        width: u32,
    },

    #[error("frame buffer holds {len} bytes, expected at least {needed}")]
    Truncated { len: usize, needed: usize },

    #[error("could not allocate output image: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("pixel format {0:?} is not supported here")]
    UnsupportedFormat(PixelFormat),
}
