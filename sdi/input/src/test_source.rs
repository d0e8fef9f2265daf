/*!
    A simulated capture driver.

    Cards are configured up front with a model name, the display modes they
    offer and optionally one driver call that fails. Every handle the card
    hands out is journaled when acquired and when released, so callers can
    check that a session gives back exactly what it took.

    A free-running card spawns a generator thread when streaming starts and
    delivers colour bars with a matching audio ramp at the enabled mode's
    frame rate.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use sdi_decode::v210;
use sdi_types::{PipelineFrame, PixelFormat, PlanarImage};
use tracing::{debug, warn};

use crate::callback::CallbackHandle;
use crate::device::{
    AudioInputPacket, Device, DeviceConfiguration, DeviceDriver, DeviceInput, DisplayMode,
    VideoInputFrame,
};
use crate::error::DriverError;
use crate::native::{
    AUDIO_SAMPLE_RATE_48K, AudioSampleType, CONFIG_AUDIO_INPUT_CONNECTION,
    CONFIG_VIDEO_INPUT_CONNECTION, DetectedSignalFlags, DisplayModeId, FieldDominance,
    FormatChangedEvents, FourCc, FrameFlags, PIXEL_FORMAT_10BIT_YUV, VideoInputFlags, mode,
};
use crate::sink::FrameSink;

/**
    The driver call a [`TestCard`] fails.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    ModelName,
    Input,
    Configuration,
    VideoConnection,
    AudioConnection,
    DisplayModes,
    FrameRate,
    EnableVideo,
    EnableAudio,
    SetCallback,
    StartStreams,
}

impl FailPoint {
    pub const ALL: &'static [Self] = &[
        Self::ModelName,
        Self::Input,
        Self::Configuration,
        Self::VideoConnection,
        Self::AudioConnection,
        Self::DisplayModes,
        Self::FrameRate,
        Self::EnableVideo,
        Self::EnableAudio,
        Self::SetCallback,
        Self::StartStreams,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Device,
    Input,
    Configuration,
    DisplayMode,
}

/**
    One journal entry.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Acquired(Resource),
    Released(Resource),
    ConfigSet(FourCc, i64),
    VideoEnabled(DisplayModeId),
    AudioEnabled { sample_rate: u32, channels: u32 },
    CallbackSet,
    CallbackCleared,
    StreamsStarted,
    StreamsStopped,
}

/**
    A display mode offered by a [`TestCard`].
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestMode {
    pub id: DisplayModeId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame_duration: i64,
    pub time_scale: i64,
    pub field_dominance: FieldDominance,
}

impl TestMode {
    pub fn new(
        id: DisplayModeId,
        name: impl Into<String>,
        (width, height): (u32, u32),
        (frame_duration, time_scale): (i64, i64),
        field_dominance: FieldDominance,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            width,
            height,
            frame_duration,
            time_scale,
            field_dominance,
        }
    }

    /**
        The modes a typical SDI capture card offers, reported the way the
        hardware reports them.
    */
    pub fn standard() -> Vec<Self> {
        use FieldDominance::{LowerFieldFirst, Progressive, UpperFieldFirst};

        const SD_NTSC: (u32, u32) = (720, 486);
        const SD_PAL: (u32, u32) = (720, 576);
        const HD720: (u32, u32) = (1280, 720);
        const HD1080: (u32, u32) = (1920, 1080);
        const DCI2K: (u32, u32) = (2048, 1080);

        vec![
            Self::new(mode::NTSC, "NTSC", SD_NTSC, (1001, 30000), LowerFieldFirst),
            Self::new(mode::PAL, "PAL", SD_PAL, (1000, 25000), UpperFieldFirst),
            Self::new(mode::HD720P50, "720p50", HD720, (1000, 50000), Progressive),
            Self::new(mode::HD720P5994, "720p59.94", HD720, (1001, 60000), Progressive),
            Self::new(mode::HD720P60, "720p60", HD720, (1000, 60000), Progressive),
            Self::new(mode::HD1080I50, "1080i50", HD1080, (1000, 25000), UpperFieldFirst),
            Self::new(mode::HD1080I5994, "1080i59.94", HD1080, (1001, 30000), UpperFieldFirst),
            Self::new(mode::HD1080I6000, "1080i60", HD1080, (1000, 30000), UpperFieldFirst),
            Self::new(mode::HD1080P2398, "1080p23.98", HD1080, (1001, 24000), Progressive),
            Self::new(mode::HD1080P24, "1080p24", HD1080, (1000, 24000), Progressive),
            Self::new(mode::HD1080P25, "1080p25", HD1080, (1000, 25000), Progressive),
            Self::new(mode::HD1080P2997, "1080p29.97", HD1080, (1001, 30000), Progressive),
            Self::new(mode::HD1080P30, "1080p30", HD1080, (1000, 30000), Progressive),
            Self::new(mode::HD1080P50, "1080p50", HD1080, (1000, 50000), Progressive),
            Self::new(mode::HD1080P5994, "1080p59.94", HD1080, (1001, 60000), Progressive),
            Self::new(mode::HD1080P6000, "1080p60", HD1080, (1000, 60000), Progressive),
            Self::new(mode::DCI2K2398, "2K DCI 23.98", DCI2K, (1001, 24000), Progressive),
            Self::new(mode::DCI2K24, "2K DCI 24", DCI2K, (1000, 24000), Progressive),
            Self::new(mode::DCI2K25, "2K DCI 25", DCI2K, (1000, 25000), Progressive),
        ]
    }
}

#[derive(Default)]
struct CardState {
    journal: Vec<Event>,
    callback: Option<CallbackHandle>,
    video_mode: Option<DisplayModeId>,
    audio_channels: u32,
}

/**
    One simulated capture card.
*/
pub struct TestCard {
    model_name: String,
    modes: Vec<TestMode>,
    fail_at: Option<FailPoint>,
    free_run: bool,
    state: Mutex<CardState>,
    streaming: AtomicBool,
    generator: Mutex<Option<JoinHandle<()>>>,
}

impl TestCard {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            modes: Vec::new(),
            fail_at: None,
            free_run: false,
            state: Mutex::new(CardState::default()),
            streaming: AtomicBool::new(false),
            generator: Mutex::new(None),
        }
    }

    pub fn with_mode(mut self, mode: TestMode) -> Self {
        self.modes.push(mode);
        self
    }

    pub fn with_modes(mut self, modes: impl IntoIterator<Item = TestMode>) -> Self {
        self.modes.extend(modes);
        self
    }

    pub fn fail_at(mut self, point: FailPoint) -> Self {
        self.fail_at = Some(point);
        self
    }

    /// Deliver generated frames from a background thread while streaming.
    pub fn free_running(mut self) -> Self {
        self.free_run = true;
        self
    }

    pub fn journal(&self) -> Vec<Event> {
        self.state.lock().journal.clone()
    }

    /**
        Handles acquired and not yet released, one entry per handle.
    */
    pub fn outstanding(&self) -> Vec<Resource> {
        let state = self.state.lock();
        let mut held = Vec::new();
        for event in &state.journal {
            match event {
                Event::Acquired(r) => held.push(*r),
                Event::Released(r) => {
                    if let Some(pos) = held.iter().position(|h| h == r) {
                        held.remove(pos);
                    }
                }
                _ => {}
            }
        }
        held
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Reference count of the registered callback, if any.
    pub fn callback_refs(&self) -> Option<u32> {
        self.state.lock().callback.as_ref().map(CallbackHandle::ref_count)
    }

    /**
        Deliver one frame pair to the registered callback. Returns `false`
        when the card is not streaming.

        The card holds its own reference to the callback for the duration of
        the delivery, the way a driver does.
    */
    pub fn deliver(&self, video: Option<&TestVideoFrame>, audio: Option<&TestAudioPacket>) -> bool {
        if !self.is_streaming() {
            return false;
        }
        let Some(callback) = self.state.lock().callback.clone() else {
            return false;
        };
        callback.video_input_frame_arrived(
            video.map(|v| v as &dyn VideoInputFrame),
            audio.map(|a| a as &dyn AudioInputPacket),
        );
        true
    }

    /**
        Notify the registered callback that the input switched to `mode_id`.
    */
    pub fn change_format(
        self: &Arc<Self>,
        mode_id: DisplayModeId,
        events: FormatChangedEvents,
    ) -> bool {
        let Some(mode) = self.modes.iter().find(|m| m.id == mode_id).cloned() else {
            return false;
        };
        let Some(callback) = self.state.lock().callback.clone() else {
            return false;
        };
        let mode = TestDisplayMode::new(Arc::clone(self), mode);
        callback.video_input_format_changed(events, &mode, DetectedSignalFlags::YCBCR422);
        true
    }

    fn record(&self, event: Event) {
        self.state.lock().journal.push(event);
    }

    fn check(&self, point: FailPoint) -> Result<(), DriverError> {
        if self.fail_at == Some(point) {
            return Err(DriverError::new(format!("simulated {point:?} failure")));
        }
        Ok(())
    }

    fn stop_generator(&self) {
        self.streaming.store(false, Ordering::Release);
        let generator = self.generator.lock().take();
        if let Some(handle) = generator {
            if handle.join().is_err() {
                warn!(model = %self.model_name, "test source generator panicked");
            }
        }
    }
}

/**
    A simulated driver holding any number of cards.
*/
#[derive(Default)]
pub struct TestDriver {
    cards: Vec<Arc<TestCard>>,
    unavailable: bool,
}

impl TestDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose enumeration fails, as when no driver is installed.
    pub fn unavailable() -> Self {
        Self {
            cards: Vec::new(),
            unavailable: true,
        }
    }

    /// One free-running card offering every standard mode.
    pub fn standard() -> Self {
        Self::new().with_card(
            TestCard::new("Test Source")
                .with_modes(TestMode::standard())
                .free_running(),
        )
    }

    pub fn with_card(mut self, card: TestCard) -> Self {
        self.cards.push(Arc::new(card));
        self
    }

    pub fn card(&self, index: usize) -> Option<&Arc<TestCard>> {
        self.cards.get(index)
    }
}

impl DeviceDriver for TestDriver {
    fn devices(&self) -> Result<Vec<Box<dyn Device>>, DriverError> {
        if self.unavailable {
            return Err(DriverError::new("capture driver is not installed"));
        }
        Ok(self
            .cards
            .iter()
            .map(|card| Box::new(TestDevice::new(Arc::clone(card))) as Box<dyn Device>)
            .collect())
    }
}

struct TestDevice {
    card: Arc<TestCard>,
}

impl TestDevice {
    fn new(card: Arc<TestCard>) -> Self {
        card.record(Event::Acquired(Resource::Device));
        Self { card }
    }
}

impl Drop for TestDevice {
    fn drop(&mut self) {
        self.card.record(Event::Released(Resource::Device));
    }
}

impl Device for TestDevice {
    fn model_name(&self) -> Result<String, DriverError> {
        self.card.check(FailPoint::ModelName)?;
        Ok(self.card.model_name.clone())
    }

    fn input(&self) -> Result<Box<dyn DeviceInput>, DriverError> {
        self.card.check(FailPoint::Input)?;
        Ok(Box::new(TestInput::new(Arc::clone(&self.card))))
    }

    fn configuration(&self) -> Result<Box<dyn DeviceConfiguration>, DriverError> {
        self.card.check(FailPoint::Configuration)?;
        Ok(Box::new(TestConfiguration::new(Arc::clone(&self.card))))
    }
}

struct TestConfiguration {
    card: Arc<TestCard>,
}

impl TestConfiguration {
    fn new(card: Arc<TestCard>) -> Self {
        card.record(Event::Acquired(Resource::Configuration));
        Self { card }
    }
}

impl Drop for TestConfiguration {
    fn drop(&mut self) {
        self.card.record(Event::Released(Resource::Configuration));
    }
}

impl DeviceConfiguration for TestConfiguration {
    fn set_int(&mut self, id: FourCc, value: i64) -> Result<(), DriverError> {
        if id == CONFIG_VIDEO_INPUT_CONNECTION {
            self.card.check(FailPoint::VideoConnection)?;
        } else if id == CONFIG_AUDIO_INPUT_CONNECTION {
            self.card.check(FailPoint::AudioConnection)?;
        }
        self.card.record(Event::ConfigSet(id, value));
        Ok(())
    }
}

struct TestDisplayMode {
    card: Arc<TestCard>,
    mode: TestMode,
}

impl TestDisplayMode {
    fn new(card: Arc<TestCard>, mode: TestMode) -> Self {
        card.record(Event::Acquired(Resource::DisplayMode));
        Self { card, mode }
    }
}

impl Drop for TestDisplayMode {
    fn drop(&mut self) {
        self.card.record(Event::Released(Resource::DisplayMode));
    }
}

impl DisplayMode for TestDisplayMode {
    fn id(&self) -> DisplayModeId {
        self.mode.id
    }

    fn name(&self) -> String {
        self.mode.name.clone()
    }

    fn width(&self) -> u32 {
        self.mode.width
    }

    fn height(&self) -> u32 {
        self.mode.height
    }

    fn frame_rate(&self) -> Result<(i64, i64), DriverError> {
        self.card.check(FailPoint::FrameRate)?;
        Ok((self.mode.frame_duration, self.mode.time_scale))
    }

    fn field_dominance(&self) -> FieldDominance {
        self.mode.field_dominance
    }
}

struct TestInput {
    card: Arc<TestCard>,
}

impl TestInput {
    fn new(card: Arc<TestCard>) -> Self {
        card.record(Event::Acquired(Resource::Input));
        Self { card }
    }
}

impl Drop for TestInput {
    fn drop(&mut self) {
        self.card.stop_generator();
        let callback = self.card.state.lock().callback.take();
        drop(callback);
        self.card.record(Event::Released(Resource::Input));
    }
}

impl DeviceInput for TestInput {
    fn display_modes(&self) -> Result<Vec<Box<dyn DisplayMode>>, DriverError> {
        self.card.check(FailPoint::DisplayModes)?;
        Ok(self
            .card
            .modes
            .iter()
            .map(|m| {
                Box::new(TestDisplayMode::new(Arc::clone(&self.card), m.clone()))
                    as Box<dyn DisplayMode>
            })
            .collect())
    }

    fn enable_video_input(
        &mut self,
        mode: DisplayModeId,
        pixel_format: FourCc,
        _flags: VideoInputFlags,
    ) -> Result<(), DriverError> {
        self.card.check(FailPoint::EnableVideo)?;
        if pixel_format != PIXEL_FORMAT_10BIT_YUV {
            return Err(DriverError::new(format!("pixel format {pixel_format} not supported")));
        }
        if !self.card.modes.iter().any(|m| m.id == mode) {
            return Err(DriverError::new(format!("display mode {mode} not supported")));
        }
        let mut state = self.card.state.lock();
        state.video_mode = Some(mode);
        state.journal.push(Event::VideoEnabled(mode));
        Ok(())
    }

    fn enable_audio_input(
        &mut self,
        sample_rate: u32,
        sample_type: AudioSampleType,
        channels: u32,
    ) -> Result<(), DriverError> {
        self.card.check(FailPoint::EnableAudio)?;
        if sample_rate != AUDIO_SAMPLE_RATE_48K || sample_type != AudioSampleType::Int32 {
            return Err(DriverError::new("only 48 kHz 32-bit audio is simulated"));
        }
        let mut state = self.card.state.lock();
        state.audio_channels = channels;
        state.journal.push(Event::AudioEnabled {
            sample_rate,
            channels,
        });
        Ok(())
    }

    fn set_callback(&mut self, callback: Option<CallbackHandle>) -> Result<(), DriverError> {
        self.card.check(FailPoint::SetCallback)?;
        let event = if callback.is_some() {
            Event::CallbackSet
        } else {
            Event::CallbackCleared
        };
        let previous = {
            let mut state = self.card.state.lock();
            state.journal.push(event);
            std::mem::replace(&mut state.callback, callback)
        };
        drop(previous);
        Ok(())
    }

    fn start_streams(&mut self) -> Result<(), DriverError> {
        self.card.check(FailPoint::StartStreams)?;
        let (mode_id, channels) = {
            let state = self.card.state.lock();
            (state.video_mode, state.audio_channels)
        };
        let Some(mode) = mode_id.and_then(|id| self.card.modes.iter().find(|m| m.id == id).cloned())
        else {
            return Err(DriverError::new("video input is not enabled"));
        };

        self.card.streaming.store(true, Ordering::Release);
        self.card.record(Event::StreamsStarted);

        if self.card.free_run {
            let card = Arc::clone(&self.card);
            let handle = thread::Builder::new()
                .name("test-source".into())
                .spawn(move || generate(card, mode, channels))
                .map_err(|e| DriverError::new(format!("could not spawn generator: {e}")))?;
            *self.card.generator.lock() = Some(handle);
        }
        Ok(())
    }

    fn stop_streams(&mut self) -> Result<(), DriverError> {
        self.card.stop_generator();
        self.card.record(Event::StreamsStopped);
        Ok(())
    }
}

fn generate(card: Arc<TestCard>, mode: TestMode, channels: u32) {
    let period = Duration::from_secs_f64(mode.frame_duration as f64 / mode.time_scale as f64);
    let rate = AUDIO_SAMPLE_RATE_48K as i64;
    let sample_at = |index: i64| index * rate * mode.frame_duration / mode.time_scale;
    let bars = TestVideoFrame::bars(
        mode.width,
        mode.height,
        0,
        mode.frame_duration,
        mode.time_scale,
    );

    debug!(mode = %mode.id, "test source generator started");
    let mut index = 0i64;
    while card.is_streaming() {
        let mut video = bars.clone();
        video.stream_time = index * mode.frame_duration;

        let first = sample_at(index);
        let count = (sample_at(index + 1) - first) as u32;
        let audio = TestAudioPacket::ramp(count, channels, first, rate);

        card.deliver(Some(&video), Some(&audio));
        index += 1;
        thread::sleep(period);
    }
    debug!(frames = index, "test source generator stopped");
}

/**
    A video frame as a driver would deliver it.
*/
#[derive(Clone, Debug)]
pub struct TestVideoFrame {
    pub flags: FrameFlags,
    pub width: u32,
    pub height: u32,
    pub row_bytes: usize,
    pub data: Vec<u8>,
    pub stream_time: i64,
    pub frame_duration: i64,
    pub time_scale: i64,
}

// 75% colour bars as 10-bit (Y, Cb, Cr).
const BARS: [(u16, u16, u16); 8] = [
    (721, 512, 512),
    (646, 176, 567),
    (525, 625, 176),
    (450, 289, 231),
    (335, 735, 793),
    (260, 399, 848),
    (139, 848, 457),
    (64, 512, 512),
];

impl TestVideoFrame {
    pub fn new(
        width: u32,
        height: u32,
        row_bytes: usize,
        data: Vec<u8>,
        stream_time: i64,
        frame_duration: i64,
        time_scale: i64,
    ) -> Self {
        Self {
            flags: FrameFlags::NONE,
            width,
            height,
            row_bytes,
            data,
            stream_time,
            frame_duration,
            time_scale,
        }
    }

    /**
        Frame `index` of a colour bar signal, packed as v210.
    */
    pub fn bars(width: u32, height: u32, index: i64, frame_duration: i64, time_scale: i64) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let stride = v210::min_stride(width);
        let data = bar_image(width, height)
            .and_then(|image| v210::pack(&image, stride).ok())
            .unwrap_or_default();
        Self::new(
            width,
            height,
            stride,
            data,
            index * frame_duration,
            frame_duration,
            time_scale,
        )
    }

    /// A frame flagged as having no input signal.
    pub fn no_signal(width: u32, height: u32) -> Self {
        let stride = v210::min_stride(width);
        Self {
            flags: FrameFlags::HAS_NO_INPUT_SOURCE,
            ..Self::new(width, height, stride, vec![0; stride * height as usize], 0, 1, 25)
        }
    }
}

fn bar_image(width: u32, height: u32) -> Option<PlanarImage> {
    let mut image = PlanarImage::try_alloc(PixelFormat::Yuv422p10, width, height).ok()?;
    let bar = |x: usize, w: usize| BARS[(x * BARS.len() / w).min(BARS.len() - 1)];
    let w = width as usize;
    for y in 0..height as usize {
        for (x, v) in image.planes[0].row_mut(y).iter_mut().enumerate() {
            *v = bar(x, w).0;
        }
        for (x, v) in image.planes[1].row_mut(y).iter_mut().enumerate() {
            *v = bar(x * 2, w).1;
        }
        for (x, v) in image.planes[2].row_mut(y).iter_mut().enumerate() {
            *v = bar(x * 2, w).2;
        }
    }
    Some(image)
}

fn rescale(value: i64, from: i64, to: i64) -> i64 {
    if from == to || from == 0 {
        return value;
    }
    (value as i128 * to as i128 / from as i128) as i64
}

impl VideoInputFrame for TestVideoFrame {
    fn flags(&self) -> FrameFlags {
        self.flags
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn stream_time(&self, time_scale: i64) -> Result<(i64, i64), DriverError> {
        Ok((
            rescale(self.stream_time, self.time_scale, time_scale),
            rescale(self.frame_duration, self.time_scale, time_scale),
        ))
    }
}

/**
    An interleaved 32-bit audio packet.
*/
#[derive(Clone, Debug)]
pub struct TestAudioPacket {
    pub sample_frames: u32,
    pub data: Vec<u8>,
    pub packet_time: i64,
    pub time_scale: i64,
}

impl TestAudioPacket {
    /**
        `sample_frames` frames of `channels` channels, where each sample holds
        its running index scaled into the upper bits.
    */
    pub fn ramp(sample_frames: u32, channels: u32, packet_time: i64, time_scale: i64) -> Self {
        let samples = sample_frames as usize * channels as usize;
        let data = (0..samples)
            .flat_map(|i| ((i as i32) << 8).to_le_bytes())
            .collect();
        Self {
            sample_frames,
            data,
            packet_time,
            time_scale,
        }
    }
}

impl AudioInputPacket for TestAudioPacket {
    fn sample_frame_count(&self) -> u32 {
        self.sample_frames
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn packet_time(&self, time_scale: i64) -> Result<i64, DriverError> {
        Ok(rescale(self.packet_time, self.time_scale, time_scale))
    }
}

/**
    A sink that keeps every frame it receives.
*/
#[derive(Default)]
pub struct CollectSink {
    frames: Mutex<Vec<PipelineFrame>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<PipelineFrame> {
        std::mem::take(&mut *self.frames.lock())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

impl FrameSink for CollectSink {
    fn enqueue(&self, frame: PipelineFrame) -> bool {
        self.frames.lock().push(frame);
        true
    }
}
