/*!
    Capture device sessions for the SDI capture crate family.

    A [`CaptureSession`] opens one card through a [`DeviceDriver`], selects
    its connectors, negotiates the requested video format and starts
    streaming. Frames arrive on driver threads at a [`CaptureCallback`],
    which copies audio, decodes video and hands both to [`FrameSink`]s as
    [`PipelineFrame`](sdi_types::PipelineFrame)s.

    [`probe_device`] performs a short open to discover a card's streams and
    records them in a [`DeviceRegistry`].
*/

mod callback;
mod capture;
mod device;
mod error;
pub mod native;
mod probe;
mod registry;
mod session;
mod sink;
mod stats;
pub mod tables;

#[cfg(any(test, feature = "test-source"))]
pub mod test_source;

pub use self::callback::{CallbackHandle, CaptureCallback, CaptureTargets, Ingest, StreamSettings};
pub use self::capture::{CaptureReport, StopSignal, run_capture};
pub use self::device::{
    AudioInputPacket, Device, DeviceConfiguration, DeviceDriver, DeviceInput, DisplayMode,
    VideoInputFrame,
};
pub use self::error::{DriverError, FrameError, NotFound, OpenError};
pub use self::probe::{
    DeviceSummary, ModeSummary, PROBE_AUDIO_CHANNELS, PROBE_VIDEO_FORMAT, ProbeRequest,
    list_devices, probe_device,
};
pub use self::registry::{DeviceList, DeviceRegistry};
pub use self::session::{CaptureRequest, CaptureSession, field_order};
pub use self::sink::FrameSink;
pub use self::stats::{CaptureStats, StatsSnapshot};
