use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use sdi_types::{Payload, PipelineFrame, Pts};
use tracing::{debug, trace, warn};

use crate::queue::FrameQueue;

/**
    What a worker saw over its lifetime.
*/
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub frames: u64,
    pub bytes: u64,
    pub first_pts: Option<Pts>,
    pub last_pts: Option<Pts>,
    /// Frames whose pts did not advance past the previous frame's.
    pub out_of_order: u64,
}

impl WorkerReport {
    fn record(&mut self, frame: &PipelineFrame) {
        if let Some(last) = self.last_pts {
            if frame.pts <= last {
                self.out_of_order += 1;
            }
        }
        self.first_pts.get_or_insert(frame.pts);
        self.last_pts = Some(frame.pts);
        self.frames += 1;
        self.bytes += payload_bytes(&frame.payload) as u64;
    }

    /// Seconds between the first and last frame.
    pub fn span_secs(&self) -> f64 {
        match (self.first_pts, self.last_pts) {
            (Some(first), Some(last)) => Pts(last.0 - first.0).as_secs_f64(),
            _ => 0.0,
        }
    }
}

fn payload_bytes(payload: &Payload) -> usize {
    match payload {
        Payload::Video(image) => image.planes.iter().map(|p| p.data.len() * 2).sum(),
        Payload::Audio(samples) => samples.len_bytes(),
    }
}

/**
    Start a thread that drains `queue` until it is closed, releasing every
    frame it takes.
*/
pub fn spawn(name: &'static str, queue: Arc<FrameQueue>) -> Result<JoinHandle<WorkerReport>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || consume(name, &queue))
        .with_context(|| format!("Failed to spawn {name} worker"))
}

pub fn consume(name: &str, queue: &FrameQueue) -> WorkerReport {
    let mut report = WorkerReport::default();

    while let Some(frame) = queue.pop() {
        if report.last_pts.is_some_and(|last| frame.pts <= last) {
            warn!(worker = name, stream = frame.stream_id, pts = frame.pts.0, "pts went backwards");
        }
        report.record(&frame);
        trace!(worker = name, stream = frame.stream_id, pts = frame.pts.0, "frame consumed");
        frame.release();
    }

    debug!(worker = name, frames = report.frames, "worker finished");
    report
}

#[cfg(test)]
mod tests {
    use sdi_types::{AudioSamples, ChannelLayout, PixelFormat, PlanarImage, SampleFormat};

    use super::*;

    fn audio(pts: i64) -> PipelineFrame {
        PipelineFrame::audio(
            1,
            Pts(pts),
            AudioSamples {
                data: vec![0; 8],
                sample_count: 4,
                channels: 2,
                layout: ChannelLayout::Stereo,
                format: SampleFormat::S32,
            },
        )
    }

    #[test]
    fn drains_until_closed() {
        let queue = Arc::new(FrameQueue::new(8));
        for pts in [0, 1800, 900, 3600] {
            assert!(queue.try_push(audio(pts)));
        }
        queue.close();

        let report = spawn("test", Arc::clone(&queue)).unwrap().join().unwrap();

        assert_eq!(report.frames, 4);
        assert_eq!(report.bytes, 4 * 32);
        assert_eq!(report.first_pts, Some(Pts(0)));
        assert_eq!(report.last_pts, Some(Pts(3600)));
        assert_eq!(report.out_of_order, 1);
        assert_eq!(report.span_secs(), 0.04);
        assert!(queue.is_empty());
    }

    #[test]
    fn counts_video_plane_bytes() {
        let image = PlanarImage::try_alloc(PixelFormat::Yuv422p10, 4, 2).unwrap();
        let frame = PipelineFrame::video(0, Pts(0), image);
        // 4x2 luma plus two 2x2 chroma planes, two bytes a sample.
        assert_eq!(payload_bytes(&frame.payload), (8 + 4 + 4) * 2);
    }
}
