/*!
    The driver-facing frame callback and its shared reference count.
*/

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering, fence};

use sdi_decode::{FrameDecoder, RawVideo};
use sdi_types::{AudioSamples, ChannelLayout, PipelineFrame, Pts, SampleFormat};
use tracing::{debug, error, trace, warn};

use crate::device::{AudioInputPacket, DisplayMode, VideoInputFrame};
use crate::error::FrameError;
use crate::native::{DetectedSignalFlags, FormatChangedEvents, FrameFlags};
use crate::sink::FrameSink;
use crate::stats::CaptureStats;

/**
    Where captured frames go.
*/
#[derive(Clone)]
pub struct CaptureTargets {
    pub decoder: Arc<dyn FrameDecoder>,
    pub audio_sink: Arc<dyn FrameSink>,
    pub video_sink: Arc<dyn FrameSink>,
}

/**
    What a session does with deliveries.
*/
#[derive(Clone)]
pub enum Ingest {
    /// Deliveries are ignored; the session only negotiates the format.
    Probe,
    Capture(CaptureTargets),
}

impl fmt::Debug for Ingest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => f.write_str("Probe"),
            Self::Capture(_) => f.write_str("Capture"),
        }
    }
}

/**
    Stream tagging applied to every frame a callback produces.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSettings {
    pub audio_channels: u16,
    pub video_stream_id: u32,
    pub audio_stream_id: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            audio_channels: 2,
            video_stream_id: 0,
            audio_stream_id: 1,
        }
    }
}

/**
    Receives format-change notifications and frame deliveries from driver
    threads.

    Every delivery is handled independently: there is no state carried from
    one call to the next apart from the atomic counters in [`CaptureStats`].
*/
pub struct CaptureCallback {
    ingest: Ingest,
    settings: StreamSettings,
    stats: Arc<CaptureStats>,
}

impl CaptureCallback {
    pub fn new(ingest: Ingest, settings: StreamSettings, stats: Arc<CaptureStats>) -> Self {
        Self {
            ingest,
            settings,
            stats,
        }
    }

    /**
        The input signal changed. Logged and counted; the session keeps the
        format it negotiated.
    */
    pub fn video_input_format_changed(
        &self,
        events: FormatChangedEvents,
        mode: &dyn DisplayMode,
        signal: DetectedSignalFlags,
    ) {
        self.stats.record_format_change();
        warn!(
            events = events.0,
            signal = signal.0,
            mode = %mode.id(),
            name = %mode.name(),
            "video input format changed"
        );
    }

    /**
        Handle one delivery. Audio is processed before video; either may be
        absent.
    */
    pub fn video_input_frame_arrived(
        &self,
        video: Option<&dyn VideoInputFrame>,
        audio: Option<&dyn AudioInputPacket>,
    ) {
        let targets = match &self.ingest {
            Ingest::Probe => return,
            Ingest::Capture(targets) => targets,
        };

        if let Some(packet) = audio {
            match self.audio_frame(packet) {
                Ok(frame) => {
                    self.stats.record_audio();
                    self.hand_off(&*targets.audio_sink, frame);
                }
                Err(e) => {
                    self.stats.record_dropped();
                    error!(error = %e, "dropping audio packet");
                }
            }
        }

        let Some(frame) = video else {
            return;
        };
        if frame.flags().contains(FrameFlags::HAS_NO_INPUT_SOURCE) {
            self.stats.record_no_signal();
            debug!("no input signal detected");
            return;
        }

        match self.video_frame(frame, &*targets.decoder) {
            Ok(frame) => {
                self.stats.record_video();
                self.hand_off(&*targets.video_sink, frame);
            }
            Err(e) => {
                self.stats.record_dropped();
                error!(error = %e, "dropping video frame");
            }
        }
    }

    fn audio_frame(&self, packet: &dyn AudioInputPacket) -> Result<PipelineFrame, FrameError> {
        let channels = self.settings.audio_channels;
        let sample_count = packet.sample_frame_count();
        let len = sample_count as usize * channels as usize;
        let bytes = len * SampleFormat::S32.bytes_per_sample();

        let payload = packet.bytes();
        if payload.len() < bytes {
            return Err(FrameError::TruncatedPayload {
                len: payload.len(),
                expected: bytes,
            });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|source| FrameError::Allocation { bytes, source })?;
        data.resize(len, 0i32);
        bytemuck::cast_slice_mut::<i32, u8>(&mut data).copy_from_slice(&payload[..bytes]);

        let pts = Pts::rescale(packet.packet_time(Pts::TIME_SCALE)?, Pts::TIME_SCALE);
        let samples = AudioSamples {
            data,
            sample_count,
            channels,
            layout: ChannelLayout::Stereo,
            format: SampleFormat::S32,
        };
        Ok(self.track(PipelineFrame::audio(
            self.settings.audio_stream_id,
            pts,
            samples,
        )))
    }

    fn video_frame(
        &self,
        frame: &dyn VideoInputFrame,
        decoder: &dyn FrameDecoder,
    ) -> Result<PipelineFrame, FrameError> {
        let (time, _duration) = frame.stream_time(Pts::TIME_SCALE)?;
        let raw = RawVideo {
            data: frame.bytes(),
            width: frame.width(),
            height: frame.height(),
            stride: frame.row_bytes(),
        };
        let image = decoder.decode(&raw)?;
        Ok(self.track(PipelineFrame::video(
            self.settings.video_stream_id,
            Pts::rescale(time, Pts::TIME_SCALE),
            image,
        )))
    }

    fn track(&self, frame: PipelineFrame) -> PipelineFrame {
        self.stats.frame_issued();
        let stats = Arc::clone(&self.stats);
        frame.with_release(move || stats.frame_released())
    }

    fn hand_off(&self, sink: &dyn FrameSink, frame: PipelineFrame) {
        let stream_id = frame.stream_id;
        let pts = frame.pts;
        if sink.enqueue(frame) {
            trace!(stream_id, pts = pts.0, "frame queued");
        } else {
            self.stats.record_dropped();
            debug!(stream_id, pts = pts.0, "sink rejected frame");
        }
    }
}

struct Shared {
    refs: AtomicU32,
    callback: CaptureCallback,
}

/**
    One counted reference to a [`CaptureCallback`].

    The first handle is created with a count of 1. Every [`acquire`] or clone
    adds a reference; every [`release`] or drop removes one. The callback is
    destroyed exactly once, by whichever release brings the count to zero,
    regardless of which thread performs it.

    [`acquire`]: CallbackHandle::acquire
    [`release`]: CallbackHandle::release
*/
pub struct CallbackHandle {
    ptr: NonNull<Shared>,
    _marker: PhantomData<Shared>,
}

// SAFETY: the shared state is only reached through `&`, the count is atomic
// and `CaptureCallback` is `Send + Sync`.
unsafe impl Send for CallbackHandle {}
unsafe impl Sync for CallbackHandle {}

impl CallbackHandle {
    pub fn new(callback: CaptureCallback) -> Self {
        let shared = Box::new(Shared {
            refs: AtomicU32::new(1),
            callback,
        });
        Self {
            ptr: NonNull::from(Box::leak(shared)),
            _marker: PhantomData,
        }
    }

    fn shared(&self) -> &Shared {
        // SAFETY: this handle owns a reference, so the allocation is live.
        unsafe { self.ptr.as_ref() }
    }

    /**
        Take another reference. Returns the new handle and the count after
        the increment.
    */
    pub fn acquire(&self) -> (Self, u32) {
        let previous = self.shared().refs.fetch_add(1, Ordering::Relaxed);
        if previous == u32::MAX {
            std::process::abort();
        }
        let handle = Self {
            ptr: self.ptr,
            _marker: PhantomData,
        };
        (handle, previous + 1)
    }

    /**
        Give up this reference. Returns the count after the decrement; at
        zero the callback has been destroyed.
    */
    pub fn release(self) -> u32 {
        let mut this = ManuallyDrop::new(self);
        this.release_ref()
    }

    pub fn ref_count(&self) -> u32 {
        self.shared().refs.load(Ordering::Acquire)
    }

    fn release_ref(&mut self) -> u32 {
        let previous = self.shared().refs.fetch_sub(1, Ordering::Release);
        if previous != 1 {
            return previous - 1;
        }
        fence(Ordering::Acquire);
        // SAFETY: the count reached zero, so no other handle can reach the
        // allocation; it came from `Box::leak` in `new`.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        debug!("capture callback destroyed");
        0
    }
}

impl Clone for CallbackHandle {
    fn clone(&self) -> Self {
        self.acquire().0
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        self.release_ref();
    }
}

impl Deref for CallbackHandle {
    type Target = CaptureCallback;

    fn deref(&self) -> &CaptureCallback {
        &self.shared().callback
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("refs", &self.ref_count())
            .field("ingest", &self.shared().callback.ingest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use sdi_decode::{V210Decoder, v210};
    use sdi_types::{PixelFormat, PlanarImage};

    use super::*;
    use crate::test_source::{CollectSink, TestAudioPacket, TestVideoFrame};

    struct DropCounter(Arc<AtomicUsize>);

    impl FrameSink for DropCounter {
        fn enqueue(&self, _frame: PipelineFrame) -> bool {
            true
        }
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn capture(audio: Arc<dyn FrameSink>, video: Arc<dyn FrameSink>) -> Ingest {
        Ingest::Capture(CaptureTargets {
            decoder: Arc::new(V210Decoder::new()),
            audio_sink: audio,
            video_sink: video,
        })
    }

    fn callback(ingest: Ingest) -> CaptureCallback {
        CaptureCallback::new(ingest, StreamSettings::default(), Arc::new(CaptureStats::new()))
    }

    #[test]
    fn count_starts_at_one() {
        let handle = CallbackHandle::new(callback(Ingest::Probe));
        assert_eq!(handle.ref_count(), 1);
        let (second, count) = handle.acquire();
        assert_eq!(count, 2);
        assert_eq!(second.release(), 1);
        assert_eq!(handle.release(), 0);
    }

    #[test]
    fn concurrent_references_destroy_exactly_once() {
        const THREADS: usize = 16;

        let destroyed = Arc::new(AtomicUsize::new(0));
        let sink: Arc<dyn FrameSink> = Arc::new(DropCounter(Arc::clone(&destroyed)));
        let handle = CallbackHandle::new(callback(capture(Arc::clone(&sink), sink)));

        let acquired: Vec<CallbackHandle> = thread::scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| s.spawn(|| handle.acquire().0))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert_eq!(handle.ref_count(), THREADS as u32 + 1);

        let remaining: Vec<u32> = thread::scope(|s| {
            let workers: Vec<_> = acquired
                .into_iter()
                .map(|h| s.spawn(move || h.release()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(remaining.iter().all(|&n| n >= 1));
        assert_eq!(handle.ref_count(), 1);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        assert_eq!(handle.release(), 0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probe_mode_ignores_deliveries() {
        let stats = Arc::new(CaptureStats::new());
        let cb = CaptureCallback::new(Ingest::Probe, StreamSettings::default(), Arc::clone(&stats));
        let audio = TestAudioPacket::ramp(1920, 2, 0, 48_000);

        cb.video_input_frame_arrived(None, Some(&audio));

        assert_eq!(stats.snapshot(), crate::stats::StatsSnapshot::default());
    }

    #[test]
    fn audio_packet_is_copied_with_90khz_pts() {
        let audio_sink = Arc::new(CollectSink::new());
        let video_sink = Arc::new(CollectSink::new());
        let cb = callback(capture(audio_sink.clone(), video_sink.clone()));

        // 1920 samples of stereo, stamped one second in at 48 kHz.
        let packet = TestAudioPacket::ramp(1920, 2, 48_000, 48_000);
        cb.video_input_frame_arrived(None, Some(&packet));

        let frames = audio_sink.take();
        assert_eq!(frames.len(), 1);
        assert!(video_sink.is_empty());

        let frame = &frames[0];
        assert_eq!(frame.stream_id, 1);
        assert_eq!(frame.pts, Pts(90_000));
        let samples = frame.as_audio().unwrap();
        assert_eq!(samples.sample_count, 1920);
        assert_eq!(samples.len_bytes(), 1920 * 2 * 4);
        assert_eq!(samples.layout, ChannelLayout::Stereo);
        assert_eq!(samples.format, SampleFormat::S32);
        assert_eq!(samples.as_bytes(), packet.bytes());
    }

    #[test]
    fn multichannel_audio_is_tagged_stereo() {
        let audio_sink = Arc::new(CollectSink::new());
        let settings = StreamSettings {
            audio_channels: 8,
            ..StreamSettings::default()
        };
        let cb = CaptureCallback::new(
            capture(audio_sink.clone(), Arc::new(CollectSink::new())),
            settings,
            Arc::new(CaptureStats::new()),
        );

        let packet = TestAudioPacket::ramp(10, 8, 0, 48_000);
        cb.video_input_frame_arrived(None, Some(&packet));

        let frames = audio_sink.take();
        let samples = frames[0].as_audio().unwrap();
        assert_eq!(samples.channels, 8);
        assert_eq!(samples.len_bytes(), 10 * 8 * 4);
        assert_eq!(samples.layout, ChannelLayout::Stereo);
    }

    #[test]
    fn short_audio_buffer_is_dropped() {
        let audio_sink = Arc::new(CollectSink::new());
        let stats = Arc::new(CaptureStats::new());
        let cb = CaptureCallback::new(
            capture(audio_sink.clone(), Arc::new(CollectSink::new())),
            StreamSettings::default(),
            Arc::clone(&stats),
        );

        let mut packet = TestAudioPacket::ramp(1920, 2, 0, 48_000);
        packet.data.truncate(100);
        cb.video_input_frame_arrived(None, Some(&packet));

        assert!(audio_sink.is_empty());
        assert_eq!(stats.snapshot().dropped, 1);
    }

    #[test]
    fn no_signal_video_is_skipped() {
        let video_sink = Arc::new(CollectSink::new());
        let stats = Arc::new(CaptureStats::new());
        let cb = CaptureCallback::new(
            capture(Arc::new(CollectSink::new()), video_sink.clone()),
            StreamSettings::default(),
            Arc::clone(&stats),
        );

        let frame = TestVideoFrame::no_signal(1920, 1080);
        cb.video_input_frame_arrived(Some(&frame), None);

        assert!(video_sink.is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.no_signal, 1);
        assert_eq!(snapshot.dropped, 0);
    }

    #[test]
    fn video_frame_is_decoded_and_tagged() {
        let video_sink = Arc::new(CollectSink::new());
        let stats = Arc::new(CaptureStats::new());
        let cb = CaptureCallback::new(
            capture(Arc::new(CollectSink::new()), video_sink.clone()),
            StreamSettings::default(),
            Arc::clone(&stats),
        );

        let mut image = PlanarImage::try_alloc(PixelFormat::Yuv422p10, 12, 2).unwrap();
        image.planes[0].data.fill(940);
        image.planes[1].data.fill(512);
        image.planes[2].data.fill(64);
        let data = v210::pack(&image, v210::min_stride(12)).unwrap();
        // Frame 50 of a 1/25 stream is two seconds in.
        let frame = TestVideoFrame::new(12, 2, v210::min_stride(12), data, 50, 1, 25);

        cb.video_input_frame_arrived(Some(&frame), None);

        let frames = video_sink.take();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.stream_id, 0);
        assert_eq!(frame.pts, Pts(180_000));
        let decoded = frame.as_video().unwrap();
        assert_eq!(decoded.format, PixelFormat::Yuv422p10);
        assert_eq!((decoded.width, decoded.height), (12, 2));
        assert_eq!(decoded.planes, image.planes);
        assert_eq!(stats.snapshot().in_flight, 1);

        drop(frames);
        assert_eq!(stats.snapshot().in_flight, 0);
    }

    #[test]
    fn undecodable_video_is_dropped() {
        let video_sink = Arc::new(CollectSink::new());
        let stats = Arc::new(CaptureStats::new());
        let cb = CaptureCallback::new(
            capture(Arc::new(CollectSink::new()), video_sink.clone()),
            StreamSettings::default(),
            Arc::clone(&stats),
        );

        let frame = TestVideoFrame::new(1920, 1080, 5120, vec![0; 64], 0, 1, 25);
        cb.video_input_frame_arrived(Some(&frame), None);

        assert!(video_sink.is_empty());
        assert_eq!(stats.snapshot().dropped, 1);
    }

    #[test]
    fn audio_is_processed_before_video() {
        struct Order(parking_lot::Mutex<Vec<u32>>);
        impl FrameSink for Order {
            fn enqueue(&self, frame: PipelineFrame) -> bool {
                self.0.lock().push(frame.stream_id);
                true
            }
        }

        let order = Arc::new(Order(parking_lot::Mutex::new(Vec::new())));
        let cb = callback(capture(order.clone(), order.clone()));
        let audio = TestAudioPacket::ramp(4, 2, 0, 48_000);
        let video = TestVideoFrame::bars(48, 2, 0, 1, 25);

        cb.video_input_frame_arrived(Some(&video), Some(&audio));

        assert_eq!(*order.0.lock(), vec![1, 0]);
    }
}
