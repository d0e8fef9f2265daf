/*!
    Stream descriptions reported by capture probes.
*/

use crate::{ChannelLayout, PixelFormat, Rational, SampleFormat};

/**
    Geometry and timing derived from a confirmed device display mode.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NegotiatedGeometry {
    pub width: u32,
    pub height: u32,
    /// Frame duration: `num` time units of `1/den` seconds.
    pub timebase: Rational,
    pub interlaced: bool,
    /// Top field first. Only meaningful when `interlaced` is set.
    pub tff: bool,
}

impl NegotiatedGeometry {
    /**
        Returns the frame rate in frames per second.
    */
    pub fn fps(&self) -> f64 {
        self.timebase.invert().to_f64()
    }
}

/**
    Kind of elementary stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamKind {
    Video,
    Audio,
}

/**
    Coding of a stream as delivered by the input.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamFormat {
    /// Raw decoded video
    Uncompressed,
    /// Linear PCM audio
    Pcm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoStreamParams {
    pub geometry: NegotiatedGeometry,
    pub pixel_format: PixelFormat,
    /// Sample aspect ratio. Left at 1:1; the encoder side chooses the real one.
    pub sar: Rational,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioStreamParams {
    pub channel_layout: ChannelLayout,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
}

/**
    One stream a probed device can produce.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamDescriptor {
    pub stream_id: u32,
    pub format: StreamFormat,
    pub params: StreamParams,
}

/**
    Kind-specific stream parameters.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamParams {
    Video(VideoStreamParams),
    Audio(AudioStreamParams),
}

impl StreamDescriptor {
    pub fn kind(&self) -> StreamKind {
        match self.params {
            StreamParams::Video(_) => StreamKind::Video,
            StreamParams::Audio(_) => StreamKind::Audio,
        }
    }

    pub fn video(&self) -> Option<&VideoStreamParams> {
        match &self.params {
            StreamParams::Video(params) => Some(params),
            StreamParams::Audio(_) => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioStreamParams> {
        match &self.params {
            StreamParams::Audio(params) => Some(params),
            StreamParams::Video(_) => None,
        }
    }
}

/**
    A capture device and the streams it was found to produce.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    pub card_index: usize,
    pub model_name: String,
    pub streams: Vec<StreamDescriptor>,
}

impl DiscoveredDevice {
    pub fn stream(&self, kind: StreamKind) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.kind() == kind)
    }
}
