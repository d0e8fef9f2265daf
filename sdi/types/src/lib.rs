/*!
    Shared types for the SDI capture crate family.

    This crate defines the vocabulary that crosses crate boundaries: timestamps,
    formats, abstract input selections, decoded images and the frames handed to
    downstream queues. It has no dependency on any capture hardware SDK.
*/

mod connection;
mod error;
mod format;
mod frame;
mod stream;
mod time;

pub use self::connection::{AudioConnection, Connector, VideoConnection, VideoFormat};
pub use self::error::ParseError;
pub use self::format::{ChannelLayout, PixelFormat, SampleFormat};
pub use self::frame::{AudioSamples, Payload, PipelineFrame, PlanarImage, Plane, ReleaseHook};
pub use self::stream::{
    AudioStreamParams, DiscoveredDevice, NegotiatedGeometry, StreamDescriptor, StreamFormat,
    StreamKind, StreamParams, VideoStreamParams,
};
pub use self::time::{CLOCK_90KHZ, Pts, Rational};
