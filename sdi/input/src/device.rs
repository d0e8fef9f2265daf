/*!
    The capture driver surface a session talks to.

    Each trait object stands for one driver-owned handle. Dropping the box
    releases the handle, so a session releases everything it acquired simply by
    dropping its fields in the right order.
*/

use crate::callback::CallbackHandle;
use crate::error::DriverError;
use crate::native::{
    AudioSampleType, DisplayModeId, FieldDominance, FourCc, FrameFlags, VideoInputFlags,
};

/**
    Entry point into a capture driver.
*/
pub trait DeviceDriver: Send + Sync {
    /**
        Enumerate every installed capture device, in driver order.
    */
    fn devices(&self) -> Result<Vec<Box<dyn Device>>, DriverError>;
}

/**
    One capture card.
*/
pub trait Device: Send {
    fn model_name(&self) -> Result<String, DriverError>;

    /// Query the card's input capability. Fails on output-only hardware.
    fn input(&self) -> Result<Box<dyn DeviceInput>, DriverError>;

    fn configuration(&self) -> Result<Box<dyn DeviceConfiguration>, DriverError>;
}

/**
    Card configuration. Integer parameters are keyed by four-character code.
*/
pub trait DeviceConfiguration: Send {
    fn set_int(&mut self, id: FourCc, value: i64) -> Result<(), DriverError>;
}

/**
    The input side of a capture card.
*/
pub trait DeviceInput: Send {
    fn display_modes(&self) -> Result<Vec<Box<dyn DisplayMode>>, DriverError>;

    fn enable_video_input(
        &mut self,
        mode: DisplayModeId,
        pixel_format: FourCc,
        flags: VideoInputFlags,
    ) -> Result<(), DriverError>;

    fn enable_audio_input(
        &mut self,
        sample_rate: u32,
        sample_type: AudioSampleType,
        channels: u32,
    ) -> Result<(), DriverError>;

    /**
        Register the frame callback. The driver keeps the handle (and so its
        reference) until it is replaced or the input is released.
    */
    fn set_callback(&mut self, callback: Option<CallbackHandle>) -> Result<(), DriverError>;

    fn start_streams(&mut self) -> Result<(), DriverError>;

    fn stop_streams(&mut self) -> Result<(), DriverError>;
}

/**
    One display mode a card's input supports.
*/
pub trait DisplayMode {
    fn id(&self) -> DisplayModeId;

    fn name(&self) -> String;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /**
        Returns `(frame_duration, time_scale)`: one frame lasts
        `frame_duration / time_scale` seconds.
    */
    fn frame_rate(&self) -> Result<(i64, i64), DriverError>;

    fn field_dominance(&self) -> FieldDominance;
}

/**
    A video frame delivered to the callback. Only valid for the duration of
    the callback.
*/
pub trait VideoInputFrame {
    fn flags(&self) -> FrameFlags;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn row_bytes(&self) -> usize;

    fn bytes(&self) -> &[u8];

    /// Returns `(stream_time, frame_duration)` expressed in `time_scale` units.
    fn stream_time(&self, time_scale: i64) -> Result<(i64, i64), DriverError>;
}

/**
    An audio packet delivered to the callback, interleaved at the sample type
    and channel count the input was enabled with.
*/
pub trait AudioInputPacket {
    fn sample_frame_count(&self) -> u32;

    fn bytes(&self) -> &[u8];

    fn packet_time(&self, time_scale: i64) -> Result<i64, DriverError>;
}
