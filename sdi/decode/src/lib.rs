/*!
    Raw capture sample decoding for the SDI capture crate family.

    Capture hardware delivers video in a packed wire format. This crate turns
    one raw frame buffer into a [`PlanarImage`] that downstream filters and
    encoders can consume.
*/

use sdi_types::{PixelFormat, PlanarImage};

mod error;
pub mod v210;

pub use self::error::DecodeError;
pub use self::v210::V210Decoder;

/**
    A raw video buffer as delivered by a capture device.

    The buffer is borrowed from the driver and only valid for the duration of
    the frame-arrived callback.
*/
#[derive(Clone, Copy, Debug)]
pub struct RawVideo<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including padding.
    pub stride: usize,
}

/**
    Converts raw device buffers into planar images.

    Implementations are called concurrently from driver threads, so decoding
    must not depend on mutable state carried between calls.
*/
pub trait FrameDecoder: Send + Sync {
    /**
        The pixel format of every image this decoder produces.
    */
    fn output_format(&self) -> PixelFormat;

    fn decode(&self, raw: &RawVideo<'_>) -> Result<PlanarImage, DecodeError>;
}
