/*!
    Decoded images and the frames handed to downstream queues.
*/

use std::collections::TryReserveError;
use std::fmt;

use crate::{ChannelLayout, PixelFormat, Pts, SampleFormat};

/**
    Callback run exactly once when the owner of a frame is done with it.
*/
pub type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

/**
    One plane of a planar image.

    Samples are stored in 16-bit containers; `stride` is counted in samples,
    not bytes, and is at least the plane width.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u16>,
    pub stride: usize,
}

impl Plane {
    /**
        Returns row `y` of the plane, including any padding up to the stride.
    */
    pub fn row(&self, y: usize) -> &[u16] {
        &self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        &mut self.data[y * self.stride..(y + 1) * self.stride]
    }
}

/**
    A decoded planar image.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanarImage {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: Vec<Plane>,
}

impl PlanarImage {
    /**
        Allocate a zeroed image with tightly packed planes.

        Allocation is fallible so that a capture callback can drop a single
        frame instead of aborting the process.
    */
    pub fn try_alloc(
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, TryReserveError> {
        let mut planes = Vec::new();
        planes.try_reserve_exact(format.plane_count())?;

        for index in 0..format.plane_count() {
            let stride = format.plane_width(index, width) as usize;
            let len = stride * height as usize;
            let mut data = Vec::new();
            data.try_reserve_exact(len)?;
            data.resize(len, 0);
            planes.push(Plane { data, stride });
        }

        Ok(Self {
            format,
            width,
            height,
            planes,
        })
    }

    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }
}

/**
    Interleaved PCM samples for one capture interval.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioSamples {
    /// Interleaved samples, `sample_count * channels` long.
    pub data: Vec<i32>,
    /// Number of sample frames (samples per channel).
    pub sample_count: u32,
    /// Number of interleaved channels in `data`.
    pub channels: u16,
    pub layout: ChannelLayout,
    pub format: SampleFormat,
}

impl AudioSamples {
    /**
        Returns the samples as raw native-endian bytes.
    */
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /**
        Returns the payload length in bytes.
    */
    pub fn len_bytes(&self) -> usize {
        self.data.len() * self.format.bytes_per_sample()
    }
}

/**
    Frame payload.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Video(PlanarImage),
    Audio(AudioSamples),
}

/**
    A time-stamped frame handed to exactly one downstream queue.

    The queue that receives the frame becomes its sole owner. The optional
    release hook runs exactly once: when [`PipelineFrame::release`] is called,
    or when the frame is dropped, whichever comes first.
*/
pub struct PipelineFrame {
    pub stream_id: u32,
    /// Presentation timestamp in 90 kHz ticks.
    pub pts: Pts,
    pub payload: Payload,
    release: Option<ReleaseHook>,
}

impl PipelineFrame {
    pub fn video(stream_id: u32, pts: Pts, image: PlanarImage) -> Self {
        Self {
            stream_id,
            pts,
            payload: Payload::Video(image),
            release: None,
        }
    }

    pub fn audio(stream_id: u32, pts: Pts, samples: AudioSamples) -> Self {
        Self {
            stream_id,
            pts,
            payload: Payload::Audio(samples),
            release: None,
        }
    }

    /**
        Attach a release hook, replacing (and running) any previous one.
    */
    pub fn with_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        if let Some(previous) = self.release.replace(Box::new(hook)) {
            previous();
        }
        self
    }

    pub fn is_video(&self) -> bool {
        matches!(self.payload, Payload::Video(_))
    }

    pub fn as_video(&self) -> Option<&PlanarImage> {
        match &self.payload {
            Payload::Video(image) => Some(image),
            Payload::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioSamples> {
        match &self.payload {
            Payload::Audio(samples) => Some(samples),
            Payload::Video(_) => None,
        }
    }

    /**
        Signal that the consumer is done with the frame.
    */
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PipelineFrame {
    fn drop(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl fmt::Debug for PipelineFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineFrame")
            .field("stream_id", &self.stream_id)
            .field("pts", &self.pts)
            .field("payload", &self.payload)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn stereo(samples: Vec<i32>) -> AudioSamples {
        AudioSamples {
            sample_count: (samples.len() / 2) as u32,
            data: samples,
            channels: 2,
            layout: ChannelLayout::Stereo,
            format: SampleFormat::S32,
        }
    }

    #[test]
    fn try_alloc_sizes_planes() {
        let image = PlanarImage::try_alloc(PixelFormat::Yuv422p10, 720, 486).unwrap();
        assert_eq!(image.planes.len(), 3);
        assert_eq!(image.planes[0].stride, 720);
        assert_eq!(image.planes[1].stride, 360);
        assert_eq!(image.planes[2].data.len(), 360 * 486);
        assert_eq!(image.plane(0).unwrap().row(485).len(), 720);
    }

    #[test]
    fn audio_bytes_are_four_per_sample() {
        let samples = stereo(vec![1, -1, 2, -2]);
        assert_eq!(samples.len_bytes(), 16);
        assert_eq!(samples.as_bytes().len(), 16);
        assert_eq!(&samples.as_bytes()[..4], &1i32.to_ne_bytes());
    }

    #[test]
    fn release_runs_hook_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        let frame = PipelineFrame::audio(1, Pts(0), stereo(vec![0, 0]))
            .with_release(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });

        frame.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_runs_hook_when_not_released() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let hook_count = Arc::clone(&count);
            let _frame = PipelineFrame::audio(1, Pts(0), stereo(vec![0, 0]))
                .with_release(move || {
                    hook_count.fetch_add(1, Ordering::SeqCst);
                });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_accessors() {
        let image = PlanarImage::try_alloc(PixelFormat::Yuv422p10, 2, 2).unwrap();
        let frame = PipelineFrame::video(0, Pts(3_600), image);
        assert!(frame.is_video());
        assert!(frame.as_audio().is_none());
        assert_eq!(frame.as_video().unwrap().width, 2);
    }
}
