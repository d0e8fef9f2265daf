/*!
    Device discovery: probing a card's streams and listing installed cards.
*/

use sdi_types::{
    AudioConnection, AudioStreamParams, ChannelLayout, DiscoveredDevice, PixelFormat, Rational,
    SampleFormat, StreamDescriptor, StreamFormat, StreamParams, VideoConnection, VideoFormat,
    VideoStreamParams,
};
use tracing::{debug, info, warn};

use crate::callback::Ingest;
use crate::device::DeviceDriver;
use crate::error::{DriverError, OpenError};
use crate::native::{AUDIO_SAMPLE_RATE_48K, DisplayModeId, FieldDominance};
use crate::registry::DeviceRegistry;
use crate::session::{CaptureRequest, CaptureSession};

/// Format a probe opens the card with.
pub const PROBE_VIDEO_FORMAT: VideoFormat = VideoFormat::Ntsc;
/// Audio channel count a probe opens the card with.
pub const PROBE_AUDIO_CHANNELS: u16 = 2;

/**
    Which card to probe and through which connectors.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub card_index: usize,
    pub video_connection: VideoConnection,
    pub audio_connection: AudioConnection,
    /// Pixel format the capture decoder will produce.
    pub pixel_format: PixelFormat,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            card_index: 0,
            video_connection: VideoConnection::Sdi,
            audio_connection: AudioConnection::Embedded,
            pixel_format: PixelFormat::Yuv422p10,
        }
    }
}

/**
    Open the card briefly with fixed defaults, then register one video and
    one audio stream for it.

    The card is not asked what it is actually receiving: the descriptors
    describe the probe format, and the audio stream is always stereo 32-bit
    48 kHz PCM.
*/
pub fn probe_device(
    driver: &dyn DeviceDriver,
    registry: &dyn DeviceRegistry,
    request: &ProbeRequest,
) -> Result<DiscoveredDevice, OpenError> {
    let mut session = CaptureSession::new(CaptureRequest {
        card_index: request.card_index,
        video_connection: request.video_connection,
        audio_connection: request.audio_connection,
        video_format: PROBE_VIDEO_FORMAT,
        audio_channels: PROBE_AUDIO_CHANNELS,
        ..CaptureRequest::default()
    });
    let geometry = session.open(driver, Ingest::Probe)?;
    session.close();
    let model_name = session.model_name().unwrap_or_default().to_string();

    let video_stream = registry.next_stream_id();
    let audio_stream = registry.next_stream_id();

    let video = StreamDescriptor {
        stream_id: video_stream,
        format: StreamFormat::Uncompressed,
        params: StreamParams::Video(VideoStreamParams {
            geometry,
            pixel_format: request.pixel_format,
            sar: Rational::new(1, 1),
        }),
    };
    let audio = StreamDescriptor {
        stream_id: audio_stream,
        format: StreamFormat::Pcm,
        params: StreamParams::Audio(AudioStreamParams {
            channel_layout: ChannelLayout::Stereo,
            sample_format: SampleFormat::S32,
            sample_rate: AUDIO_SAMPLE_RATE_48K,
        }),
    };

    let device = DiscoveredDevice {
        card_index: request.card_index,
        model_name,
        streams: vec![video, audio],
    };
    info!(
        card = device.card_index,
        model = %device.model_name,
        video_stream,
        audio_stream,
        "probed capture card"
    );
    registry.register(device.clone());
    Ok(device)
}

/**
    A display mode as reported by a card.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeSummary {
    pub id: DisplayModeId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// `None` when the card could not report the frame rate.
    pub timebase: Option<Rational>,
    pub field_dominance: FieldDominance,
}

/**
    One installed card and the display modes its input offers.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSummary {
    pub index: usize,
    pub model_name: Option<String>,
    /// Empty for cards without an input.
    pub modes: Vec<ModeSummary>,
}

/**
    Enumerate installed cards without configuring any of them.

    Per-card failures are logged and leave that card's fields empty; only a
    failed enumeration is an error.
*/
pub fn list_devices(driver: &dyn DeviceDriver) -> Result<Vec<DeviceSummary>, DriverError> {
    let devices = driver.devices()?;
    debug!(count = devices.len(), "enumerated capture cards");

    let mut summaries = Vec::with_capacity(devices.len());
    for (index, device) in devices.into_iter().enumerate() {
        let model_name = device
            .model_name()
            .inspect_err(|e| warn!(card = index, error = %e, "could not read model name"))
            .ok();

        let modes = match device.input().and_then(|input| input.display_modes()) {
            Ok(modes) => modes
                .into_iter()
                .map(|mode| ModeSummary {
                    id: mode.id(),
                    name: mode.name(),
                    width: mode.width(),
                    height: mode.height(),
                    timebase: mode
                        .frame_rate()
                        .ok()
                        .and_then(|(d, s)| {
                            Some(Rational::new(d.try_into().ok()?, s.try_into().ok()?))
                        })
                        .map(Rational::reduced),
                    field_dominance: mode.field_dominance(),
                })
                .collect(),
            Err(e) => {
                debug!(card = index, error = %e, "card has no usable input");
                Vec::new()
            }
        };

        summaries.push(DeviceSummary {
            index,
            model_name,
            modes,
        });
    }
    Ok(summaries)
}
