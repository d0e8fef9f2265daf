/*!
    Pixel and sample format types.
*/

/**
    Planar pixel formats produced by the capture decoders.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:2, 10 bits per component in 16-bit storage
    Yuv422p10,
}

impl PixelFormat {
    /**
        Returns the number of significant bits per component.
    */
    pub const fn bit_depth(self) -> u32 {
        match self {
            Self::Yuv422p10 => 10,
        }
    }

    /**
        Returns the number of planes.
    */
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv422p10 => 3,
        }
    }

    /**
        Returns the width in samples of plane `index` for an image `width`
        pixels wide.
    */
    pub const fn plane_width(self, index: usize, width: u32) -> u32 {
        match (self, index) {
            (Self::Yuv422p10, 0) => width,
            (Self::Yuv422p10, _) => width.div_ceil(2),
        }
    }
}

/**
    Audio sample formats.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SampleFormat {
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
}

impl SampleFormat {
    /**
        Returns the number of bytes per sample.
    */
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::S32 => 4,
        }
    }
}

/**
    Audio channel layout.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ChannelLayout {
    /// Single channel
    Mono,
    /// Left and right channels
    Stereo,
    /// 5.1 surround (FL, FR, FC, LFE, BL, BR)
    Surround5_1,
    /// 7.1 surround (FL, FR, FC, LFE, BL, BR, SL, SR)
    Surround7_1,
}

impl ChannelLayout {
    /**
        Returns the number of channels.
    */
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround5_1 => 6,
            Self::Surround7_1 => 8,
        }
    }
}
