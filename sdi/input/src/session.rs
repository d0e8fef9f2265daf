/*!
    Opening and closing one capture card.
*/

use std::sync::Arc;

use sdi_types::{
    AudioConnection, Connector, NegotiatedGeometry, Rational, VideoConnection, VideoFormat,
};
use tracing::{debug, error, info, warn};

use crate::callback::{CallbackHandle, CaptureCallback, Ingest, StreamSettings};
use crate::device::{Device, DeviceConfiguration, DeviceDriver, DeviceInput};
use crate::error::OpenError;
use crate::native::{
    AUDIO_SAMPLE_RATE_48K, AudioSampleType, CONFIG_AUDIO_INPUT_CONNECTION,
    CONFIG_VIDEO_INPUT_CONNECTION, DisplayModeId, FieldDominance, PIXEL_FORMAT_10BIT_YUV,
    VideoInputFlags,
};
use crate::stats::CaptureStats;
use crate::tables;

/**
    What to open and how to tag the streams it produces.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub card_index: usize,
    pub video_connection: VideoConnection,
    pub audio_connection: AudioConnection,
    pub video_format: VideoFormat,
    pub audio_channels: u16,
    pub video_stream_id: u32,
    pub audio_stream_id: u32,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        let streams = StreamSettings::default();
        Self {
            card_index: 0,
            video_connection: VideoConnection::Sdi,
            audio_connection: AudioConnection::Embedded,
            video_format: VideoFormat::Ntsc,
            audio_channels: streams.audio_channels,
            video_stream_id: streams.video_stream_id,
            audio_stream_id: streams.audio_stream_id,
        }
    }
}

impl CaptureRequest {
    fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            audio_channels: self.audio_channels,
            video_stream_id: self.video_stream_id,
            audio_stream_id: self.audio_stream_id,
        }
    }
}

/**
    Maps a display mode's field dominance to `(interlaced, top_field_first)`.
*/
pub fn field_order(dominance: FieldDominance) -> (bool, bool) {
    match dominance {
        FieldDominance::Progressive | FieldDominance::Unknown => (false, false),
        FieldDominance::ProgressiveSegmented | FieldDominance::UpperFieldFirst => (true, true),
        FieldDominance::LowerFieldFirst => (true, false),
    }
}

/**
    A capture card opened for input.

    The session owns the device, input and configuration handles and one
    reference to the frame callback. [`close`](Self::close) stops streaming
    and releases them in order; dropping the session closes it.
*/
pub struct CaptureSession {
    request: CaptureRequest,
    device: Option<Box<dyn Device>>,
    input: Option<Box<dyn DeviceInput>>,
    config: Option<Box<dyn DeviceConfiguration>>,
    callback: Option<CallbackHandle>,
    streaming: bool,
    model_name: Option<String>,
    geometry: Option<NegotiatedGeometry>,
    stats: Arc<CaptureStats>,
}

impl CaptureSession {
    pub fn new(request: CaptureRequest) -> Self {
        Self {
            request,
            device: None,
            input: None,
            config: None,
            callback: None,
            streaming: false,
            model_name: None,
            geometry: None,
            stats: Arc::new(CaptureStats::new()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.streaming
    }

    pub fn geometry(&self) -> Option<NegotiatedGeometry> {
        self.geometry
    }

    /// Model name of the opened card, kept after close.
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }

    /**
        Open the requested card, negotiate its format and start streaming.

        On failure everything acquired so far is released before the error is
        returned.
    */
    pub fn open(
        &mut self,
        driver: &dyn DeviceDriver,
        ingest: Ingest,
    ) -> Result<NegotiatedGeometry, OpenError> {
        if self.device.is_some() || self.streaming {
            return Err(OpenError::AlreadyOpen);
        }

        match self.negotiate(driver, ingest) {
            Ok(geometry) => {
                info!(
                    card = self.request.card_index,
                    format = %self.request.video_format,
                    width = geometry.width,
                    height = geometry.height,
                    timebase = %geometry.timebase,
                    interlaced = geometry.interlaced,
                    tff = geometry.tff,
                    "capture started"
                );
                self.geometry = Some(geometry);
                Ok(geometry)
            }
            Err(e) => {
                error!(card = self.request.card_index, error = %e, "could not open capture card");
                self.close();
                Err(e)
            }
        }
    }

    fn negotiate(
        &mut self,
        driver: &dyn DeviceDriver,
        ingest: Ingest,
    ) -> Result<NegotiatedGeometry, OpenError> {
        let index = self.request.card_index;

        let mut devices = driver.devices().map_err(|e| OpenError::DeviceNotFound {
            index,
            cause: e.to_string(),
        })?;
        if index >= devices.len() {
            return Err(OpenError::DeviceNotFound {
                index,
                cause: format!("{} capture devices present", devices.len()),
            });
        }
        let device = self.device.insert(devices.swap_remove(index));
        drop(devices);

        let model = device
            .model_name()
            .map_err(|e| OpenError::UnsupportedDevice(format!("could not read model name: {e}")))?;
        info!(card = index, model = %model, "opened capture card");
        self.model_name = Some(model);

        let input = self.input.insert(
            device
                .input()
                .map_err(|e| OpenError::UnsupportedDevice(format!("card has no input: {e}")))?,
        );
        let config = self.config.insert(device.configuration().map_err(|e| {
            OpenError::UnsupportedDevice(format!("card has no configuration interface: {e}"))
        })?);

        for (connector, id) in [
            (
                Connector::Video(self.request.video_connection),
                CONFIG_VIDEO_INPUT_CONNECTION,
            ),
            (
                Connector::Audio(self.request.audio_connection),
                CONFIG_AUDIO_INPUT_CONNECTION,
            ),
        ] {
            let native = tables::resolve_connector(connector)
                .map_err(|e| OpenError::UnsupportedConnector(e.to_string()))?;
            config.set_int(id, native.into()).map_err(|e| {
                OpenError::UnsupportedConnector(format!("could not select {connector}: {e}"))
            })?;
            debug!(%connector, native, "input connection selected");
        }

        let (mode_id, nominal) = tables::resolve_video_format(self.request.video_format)
            .map_err(|e| OpenError::UnsupportedFormat(e.to_string()))?;

        let geometry = match_display_mode(&**input, mode_id)?;
        if geometry.timebase != nominal {
            warn!(
                mode = %mode_id,
                device = %geometry.timebase,
                nominal = %nominal,
                "display mode timebase differs from the nominal one"
            );
        }

        input
            .enable_video_input(mode_id, PIXEL_FORMAT_10BIT_YUV, VideoInputFlags::DEFAULT)
            .map_err(|e| OpenError::EnableFailed(format!("could not enable video input: {e}")))?;
        input
            .enable_audio_input(
                AUDIO_SAMPLE_RATE_48K,
                AudioSampleType::Int32,
                self.request.audio_channels.into(),
            )
            .map_err(|e| OpenError::EnableFailed(format!("could not enable audio input: {e}")))?;

        let callback = self.callback.insert(CallbackHandle::new(CaptureCallback::new(
            ingest,
            self.request.stream_settings(),
            Arc::clone(&self.stats),
        )));
        input
            .set_callback(Some(callback.clone()))
            .map_err(|e| OpenError::StartFailed(format!("could not register callback: {e}")))?;
        input
            .start_streams()
            .map_err(|e| OpenError::StartFailed(format!("could not start streams: {e}")))?;
        self.streaming = true;

        Ok(geometry)
    }

    /**
        Stop streaming and release every handle the session holds. Safe to
        call on a session that is not open.
    */
    pub fn close(&mut self) {
        if self.streaming {
            if let Some(input) = self.input.as_mut() {
                if let Err(e) = input.stop_streams() {
                    warn!(card = self.request.card_index, error = %e, "could not stop streams");
                }
            }
            self.streaming = false;
        }

        let held = self.device.is_some();
        drop(self.config.take());
        drop(self.input.take());
        drop(self.device.take());
        drop(self.callback.take());
        self.geometry = None;

        if held {
            debug!(card = self.request.card_index, "capture card closed");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/**
    Walk every display mode the input offers and capture the geometry of the
    one whose id matches. All modes are visited; the last match wins.
*/
fn match_display_mode(
    input: &dyn DeviceInput,
    wanted: DisplayModeId,
) -> Result<NegotiatedGeometry, OpenError> {
    let modes = input
        .display_modes()
        .map_err(|e| OpenError::UnsupportedMode(format!("could not list display modes: {e}")))?;

    let mut found = None;
    for mode in modes {
        let (frame_duration, time_scale) = mode.frame_rate().map_err(|e| {
            OpenError::UnsupportedMode(format!("could not read frame rate of {}: {e}", mode.id()))
        })?;
        if mode.id() != wanted {
            continue;
        }

        let (interlaced, tff) = field_order(mode.field_dominance());
        found = Some(NegotiatedGeometry {
            width: mode.width(),
            height: mode.height(),
            timebase: timebase(frame_duration, time_scale)?,
            interlaced,
            tff,
        });
    }

    found.ok_or_else(|| {
        OpenError::UnsupportedMode(format!("card does not offer display mode {wanted}"))
    })
}

fn timebase(frame_duration: i64, time_scale: i64) -> Result<Rational, OpenError> {
    let num = i32::try_from(frame_duration);
    let den = i32::try_from(time_scale);
    match (num, den) {
        (Ok(num), Ok(den)) if num > 0 && den > 0 => Ok(Rational::new(num, den).reduced()),
        _ => Err(OpenError::UnsupportedMode(format!(
            "invalid frame rate {frame_duration}/{time_scale}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use sdi_decode::V210Decoder;
    use sdi_types::Pts;

    use super::*;
    use crate::callback::CaptureTargets;
    use crate::native::{FourCc, mode};
    use crate::test_source::{
        CollectSink, Event, FailPoint, Resource, TestAudioPacket, TestCard, TestDriver, TestMode,
        TestVideoFrame,
    };

    fn driver() -> TestDriver {
        TestDriver::new().with_card(TestCard::new("Test Card").with_modes(TestMode::standard()))
    }

    fn request(format: VideoFormat) -> CaptureRequest {
        CaptureRequest {
            video_format: format,
            ..CaptureRequest::default()
        }
    }

    fn balanced(card: &TestCard) -> bool {
        let journal = card.journal();
        let count = |event: Event| journal.iter().filter(|e| **e == event).count();
        card.outstanding().is_empty()
            && [
                Resource::Device,
                Resource::Input,
                Resource::Configuration,
                Resource::DisplayMode,
            ]
            .into_iter()
            .all(|r| count(Event::Acquired(r)) == count(Event::Released(r)))
    }

    #[test]
    fn field_dominance_mapping() {
        assert_eq!(field_order(FieldDominance::Progressive), (false, false));
        assert_eq!(field_order(FieldDominance::ProgressiveSegmented), (true, true));
        assert_eq!(field_order(FieldDominance::UpperFieldFirst), (true, true));
        assert_eq!(field_order(FieldDominance::LowerFieldFirst), (true, false));
        assert_eq!(field_order(FieldDominance::Unknown), (false, false));
    }

    #[test]
    fn opens_1080p25() {
        let driver = driver();
        let card = driver.card(0).unwrap();
        let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));

        let geometry = session.open(&driver, Ingest::Probe).unwrap();

        assert_eq!(
            geometry,
            NegotiatedGeometry {
                width: 1920,
                height: 1080,
                timebase: Rational::new(1, 25),
                interlaced: false,
                tff: false,
            }
        );
        assert!(session.is_open());
        assert_eq!(session.model_name(), Some("Test Card"));
        assert!(card.is_streaming());
        // One reference held by the session, one by the driver.
        assert_eq!(card.callback_refs(), Some(2));

        let journal = card.journal();
        assert!(journal.contains(&Event::ConfigSet(CONFIG_VIDEO_INPUT_CONNECTION, 1)));
        assert!(journal.contains(&Event::ConfigSet(CONFIG_AUDIO_INPUT_CONNECTION, 1)));
        assert!(journal.contains(&Event::VideoEnabled(mode::HD1080P25)));
        assert!(journal.contains(&Event::AudioEnabled {
            sample_rate: 48_000,
            channels: 2
        }));
        assert_eq!(journal.last(), Some(&Event::StreamsStarted));
    }

    #[test]
    fn close_releases_in_order() {
        let driver = driver();
        let card = driver.card(0).unwrap();
        let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));
        session.open(&driver, Ingest::Probe).unwrap();
        let opened = card.journal().len();

        session.close();

        assert_eq!(
            card.journal()[opened..],
            [
                Event::StreamsStopped,
                Event::Released(Resource::Configuration),
                Event::Released(Resource::Input),
                Event::Released(Resource::Device),
            ]
        );
        assert!(!session.is_open());
        assert!(!card.is_streaming());
        assert_eq!(card.callback_refs(), None);
        assert!(balanced(card));

        session.close();
        assert_eq!(card.journal().len(), opened + 4);
    }

    #[test]
    fn drop_closes_session() {
        let driver = driver();
        let card = driver.card(0).unwrap();
        {
            let mut session = CaptureSession::new(request(VideoFormat::Pal));
            session.open(&driver, Ingest::Probe).unwrap();
        }
        assert!(!card.is_streaming());
        assert!(balanced(card));
    }

    #[test]
    fn interlaced_modes_report_field_order() {
        let driver = driver();

        let mut session = CaptureSession::new(request(VideoFormat::Ntsc));
        let ntsc = session.open(&driver, Ingest::Probe).unwrap();
        session.close();
        assert_eq!((ntsc.width, ntsc.height), (720, 486));
        assert_eq!(ntsc.timebase, Rational::new(1001, 30000));
        assert_eq!((ntsc.interlaced, ntsc.tff), (true, false));

        let mut session = CaptureSession::new(request(VideoFormat::Hd1080i50));
        let hd = session.open(&driver, Ingest::Probe).unwrap();
        assert_eq!(hd.timebase, Rational::new(1, 25));
        assert_eq!((hd.interlaced, hd.tff), (true, true));
    }

    #[test]
    fn last_matching_mode_wins() {
        let driver = TestDriver::new().with_card(
            TestCard::new("Card")
                .with_mode(TestMode::new(
                    mode::HD1080P25,
                    "first",
                    (1920, 1080),
                    (1000, 25000),
                    FieldDominance::Progressive,
                ))
                .with_mode(TestMode::new(
                    mode::HD1080P25,
                    "second",
                    (1920, 1088),
                    (1000, 25000),
                    FieldDominance::ProgressiveSegmented,
                )),
        );
        let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));

        let geometry = session.open(&driver, Ingest::Probe).unwrap();

        assert_eq!(geometry.height, 1088);
        assert_eq!((geometry.interlaced, geometry.tff), (true, true));
    }

    #[test]
    fn missing_mode_is_unsupported() {
        let driver = TestDriver::new().with_card(TestCard::new("Card").with_mode(TestMode::new(
            mode::PAL,
            "PAL",
            (720, 576),
            (1000, 25000),
            FieldDominance::UpperFieldFirst,
        )));
        let card = driver.card(0).unwrap();
        let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));

        let err = session.open(&driver, Ingest::Probe).unwrap_err();

        assert!(matches!(err, OpenError::UnsupportedMode(_)), "{err}");
        assert!(!session.is_open());
        assert!(balanced(card));
    }

    #[test]
    fn unmapped_format_is_unsupported() {
        let driver = driver();
        let mut session = CaptureSession::new(request(VideoFormat::Uhd2160p25));

        let err = session.open(&driver, Ingest::Probe).unwrap_err();

        assert!(matches!(err, OpenError::UnsupportedFormat(_)), "{err}");
        assert!(balanced(driver.card(0).unwrap()));
    }

    #[test]
    fn missing_device() {
        let mut session = CaptureSession::new(CaptureRequest {
            card_index: 3,
            ..CaptureRequest::default()
        });
        let err = session.open(&driver(), Ingest::Probe).unwrap_err();
        assert!(matches!(err, OpenError::DeviceNotFound { index: 3, .. }));

        let mut session = CaptureSession::new(CaptureRequest::default());
        let err = session.open(&TestDriver::unavailable(), Ingest::Probe).unwrap_err();
        assert!(matches!(err, OpenError::DeviceNotFound { index: 0, .. }));
    }

    #[test]
    fn unselected_cards_are_released() {
        let driver = driver().with_card(TestCard::new("Second").with_modes(TestMode::standard()));
        let mut session = CaptureSession::new(CaptureRequest {
            card_index: 1,
            ..CaptureRequest::default()
        });

        session.open(&driver, Ingest::Probe).unwrap();

        let first = driver.card(0).unwrap();
        assert!(first.outstanding().is_empty());
        assert_eq!(session.model_name(), Some("Second"));
    }

    #[test]
    fn failure_at_each_step_releases_everything() {
        for &point in FailPoint::ALL {
            let driver = TestDriver::new().with_card(
                TestCard::new("Card")
                    .with_modes(TestMode::standard())
                    .fail_at(point),
            );
            let card = driver.card(0).unwrap();
            let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));

            let err = session.open(&driver, Ingest::Probe).unwrap_err();

            let expected = match point {
                FailPoint::ModelName | FailPoint::Input | FailPoint::Configuration => {
                    matches!(err, OpenError::UnsupportedDevice(_))
                }
                FailPoint::VideoConnection | FailPoint::AudioConnection => {
                    matches!(err, OpenError::UnsupportedConnector(_))
                }
                FailPoint::DisplayModes | FailPoint::FrameRate => {
                    matches!(err, OpenError::UnsupportedMode(_))
                }
                FailPoint::EnableVideo | FailPoint::EnableAudio => {
                    matches!(err, OpenError::EnableFailed(_))
                }
                FailPoint::SetCallback | FailPoint::StartStreams => {
                    matches!(err, OpenError::StartFailed(_))
                }
            };
            assert!(expected, "{point:?} gave {err}");
            assert!(!session.is_open(), "{point:?}");
            assert!(!card.is_streaming(), "{point:?}");
            assert_eq!(card.callback_refs(), None, "{point:?}");
            assert!(balanced(card), "{point:?}: {:?}", card.journal());
            assert!(!card.journal().contains(&Event::StreamsStopped), "{point:?}");
        }
    }

    #[test]
    fn open_twice_is_rejected() {
        let driver = driver();
        let mut session = CaptureSession::new(request(VideoFormat::Pal));
        session.open(&driver, Ingest::Probe).unwrap();

        let err = session.open(&driver, Ingest::Probe).unwrap_err();

        assert_eq!(err, OpenError::AlreadyOpen);
        assert!(session.is_open());
    }

    #[test]
    fn reopen_after_close() {
        let driver = driver();
        let mut session = CaptureSession::new(request(VideoFormat::Pal));
        session.open(&driver, Ingest::Probe).unwrap();
        session.close();

        assert!(session.open(&driver, Ingest::Probe).is_ok());
    }

    #[test]
    fn deliveries_reach_sinks() {
        let driver = driver();
        let card = driver.card(0).unwrap();
        let audio_sink = Arc::new(CollectSink::new());
        let video_sink = Arc::new(CollectSink::new());
        let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));
        session
            .open(
                &driver,
                Ingest::Capture(CaptureTargets {
                    decoder: Arc::new(V210Decoder::new()),
                    audio_sink: audio_sink.clone(),
                    video_sink: video_sink.clone(),
                }),
            )
            .unwrap();

        let video = TestVideoFrame::bars(1920, 1080, 25, 1000, 25000);
        let audio = TestAudioPacket::ramp(1920, 2, 48_000, 48_000);
        assert!(card.deliver(Some(&video), Some(&audio)));
        assert!(card.deliver(Some(&TestVideoFrame::no_signal(1920, 1080)), None));

        let video_frames = video_sink.take();
        let audio_frames = audio_sink.take();
        assert_eq!(video_frames.len(), 1);
        assert_eq!(audio_frames.len(), 1);
        assert_eq!(video_frames[0].pts, Pts(90_000));
        assert_eq!(audio_frames[0].pts, Pts(90_000));

        let stats = session.stats().snapshot();
        assert_eq!(stats.video_frames, 1);
        assert_eq!(stats.audio_frames, 1);
        assert_eq!(stats.no_signal, 1);
        assert_eq!(stats.in_flight, 2);

        drop(video_frames);
        drop(audio_frames);
        assert_eq!(session.stats().snapshot().in_flight, 0);
    }

    #[test]
    fn format_change_is_counted_only() {
        let driver = driver();
        let card = driver.card(0).unwrap();
        let mut session = CaptureSession::new(request(VideoFormat::Hd1080p25));
        let geometry = session.open(&driver, Ingest::Probe).unwrap();

        assert!(card.change_format(
            mode::HD1080I50,
            crate::native::FormatChangedEvents::DISPLAY_MODE_CHANGED
        ));
        assert!(!card.change_format(FourCc::new(b"none"), Default::default()));

        assert_eq!(session.stats().snapshot().format_changes, 1);
        assert_eq!(session.geometry(), Some(geometry));
    }
}
