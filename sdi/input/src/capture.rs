/*!
    Running a capture session until told to stop.
*/

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use sdi_types::NegotiatedGeometry;
use tracing::info;

use crate::callback::{CaptureTargets, Ingest};
use crate::device::DeviceDriver;
use crate::error::OpenError;
use crate::session::{CaptureRequest, CaptureSession};
use crate::stats::StatsSnapshot;

/**
    A one-shot, cloneable stop request.
*/
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (stopped, cvar) = &*self.inner;
        *stopped.lock() = true;
        cvar.notify_all();
    }

    /// Block until [`stop`](Self::stop) is called.
    pub fn wait(&self) {
        let (stopped, cvar) = &*self.inner;
        let mut stopped = stopped.lock();
        while !*stopped {
            cvar.wait(&mut stopped);
        }
    }
}

/**
    Outcome of a completed capture run.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureReport {
    pub geometry: NegotiatedGeometry,
    pub stats: StatsSnapshot,
}

/**
    Open a capture session, stream until `stop` fires, then close it.

    Blocks the calling thread for the whole run; frames are delivered to the
    sinks in `targets` from driver threads meanwhile.
*/
pub fn run_capture(
    driver: &dyn DeviceDriver,
    request: CaptureRequest,
    targets: CaptureTargets,
    stop: &StopSignal,
) -> Result<CaptureReport, OpenError> {
    let card = request.card_index;
    let mut session = CaptureSession::new(request);
    let geometry = session.open(driver, Ingest::Capture(targets))?;

    stop.wait();
    info!(card, "stopping capture");
    session.close();

    let stats = session.stats().snapshot();
    info!(
        card,
        video_frames = stats.video_frames,
        audio_frames = stats.audio_frames,
        no_signal = stats.no_signal,
        dropped = stats.dropped,
        format_changes = stats.format_changes,
        "capture finished"
    );
    Ok(CaptureReport { geometry, stats })
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use sdi_decode::V210Decoder;
    use sdi_types::{Rational, VideoFormat};

    use super::*;
    use crate::test_source::{CollectSink, TestCard, TestDriver, TestMode};

    #[test]
    fn stop_signal_wakes_waiters() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            thread::spawn(move || stop.wait())
        };
        stop.stop();
        waiter.join().unwrap();

        // Already stopped: returns at once.
        stop.wait();
    }

    #[test]
    fn free_running_capture_delivers_until_stopped() {
        let driver = TestDriver::new().with_card(
            TestCard::new("Test Source")
                .with_modes(TestMode::standard())
                .free_running(),
        );
        let audio = Arc::new(CollectSink::new());
        let video = Arc::new(CollectSink::new());
        let targets = CaptureTargets {
            decoder: Arc::new(V210Decoder::new()),
            audio_sink: audio.clone(),
            video_sink: video.clone(),
        };
        let request = CaptureRequest {
            video_format: VideoFormat::Hd720p50,
            ..CaptureRequest::default()
        };
        let stop = StopSignal::new();

        let report = thread::scope(|s| {
            let run = s.spawn(|| run_capture(&driver, request, targets, &stop));
            while video.len() < 3 {
                thread::sleep(Duration::from_millis(5));
            }
            stop.stop();
            run.join().unwrap()
        })
        .unwrap();

        assert_eq!(report.geometry.timebase, Rational::new(1, 50));
        assert!(report.stats.video_frames >= 3);
        assert_eq!(report.stats.video_frames as usize, video.len());
        assert_eq!(report.stats.audio_frames as usize, audio.len());

        // 50 fps at 48 kHz is 960 samples a frame.
        let frames = audio.take();
        assert!(frames.iter().all(|f| f.as_audio().unwrap().sample_count == 960));
        assert!(driver.card(0).unwrap().outstanding().is_empty());
    }

    #[test]
    fn open_failure_is_returned_without_waiting() {
        let driver = TestDriver::new();
        let sink = Arc::new(CollectSink::new());
        let targets = CaptureTargets {
            decoder: Arc::new(V210Decoder::new()),
            audio_sink: sink.clone(),
            video_sink: sink,
        };

        let err = run_capture(&driver, CaptureRequest::default(), targets, &StopSignal::new())
            .unwrap_err();

        assert!(matches!(err, OpenError::DeviceNotFound { .. }));
    }
}
