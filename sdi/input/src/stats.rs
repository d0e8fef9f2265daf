use std::sync::atomic::{AtomicU64, Ordering};

/**
    Counters updated from driver threads while a session streams.
*/
#[derive(Debug, Default)]
pub struct CaptureStats {
    audio_frames: AtomicU64,
    video_frames: AtomicU64,
    no_signal: AtomicU64,
    dropped: AtomicU64,
    format_changes: AtomicU64,
    in_flight: AtomicU64,
}

/**
    A point-in-time copy of [`CaptureStats`].
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub audio_frames: u64,
    pub video_frames: u64,
    /// Video deliveries flagged as having no input signal.
    pub no_signal: u64,
    /// Deliveries dropped after an allocation, decode or sink failure.
    pub dropped: u64,
    pub format_changes: u64,
    /// Frames handed to a sink and not yet released.
    pub in_flight: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            audio_frames: self.audio_frames.load(Ordering::Relaxed),
            video_frames: self.video_frames.load(Ordering::Relaxed),
            no_signal: self.no_signal.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            format_changes: self.format_changes.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }

    pub(crate) fn record_audio(&self) {
        self.audio_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_video(&self) {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_no_signal(&self) {
        self.no_signal.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_format_change(&self) {
        self.format_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_issued(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn frame_released(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
