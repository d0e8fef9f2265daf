use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sdi_decode::V210Decoder;
use sdi_input::{
    CaptureRequest, CaptureTargets, DeviceDriver, StopSignal, StreamSettings, run_capture,
};
use sdi_types::VideoFormat;
use tokio::signal;
use tracing::{error, info};

use super::InputArgs;
use crate::config::IngestConfig;
use crate::queue::FrameQueue;
use crate::worker::{self, WorkerReport};

#[derive(Parser, Debug)]
pub struct CaptureCommand {
    #[command(flatten)]
    pub input: InputArgs,

    /// Video format to capture, e.g. pal, ntsc, 720p50, 1080i59.94, 1080p25
    #[arg(short = 'f', long)]
    pub video_format: Option<VideoFormat>,

    /// Number of audio channels to capture
    #[arg(long)]
    pub audio_channels: Option<u16>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    pub duration: Option<u64>,
}

impl CaptureCommand {
    fn request(&self, config: &IngestConfig) -> CaptureRequest {
        let streams = StreamSettings::default();
        CaptureRequest {
            card_index: self.input.card(config),
            video_connection: self.input.video_connection(config),
            audio_connection: self.input.audio_connection(config),
            video_format: self
                .video_format
                .or(config.video_format)
                .unwrap_or(VideoFormat::Ntsc),
            audio_channels: self
                .audio_channels
                .or(config.audio_channels)
                .unwrap_or(streams.audio_channels),
            video_stream_id: streams.video_stream_id,
            audio_stream_id: streams.audio_stream_id,
        }
    }

    pub async fn run(self, driver: Arc<dyn DeviceDriver>, config: &IngestConfig) -> Result<()> {
        let request = self.request(config);
        let card = request.card_index;
        info!(
            card,
            format = %request.video_format,
            video = %request.video_connection,
            audio = %request.audio_connection,
            channels = request.audio_channels,
            "starting capture"
        );

        // Downstream queues and their consumers
        let video_queue = Arc::new(FrameQueue::new(config.queues.video));
        let audio_queue = Arc::new(FrameQueue::new(config.queues.audio));
        let video_worker = worker::spawn("filter", Arc::clone(&video_queue))?;
        let audio_worker = worker::spawn("encode", Arc::clone(&audio_queue))?;

        let targets = CaptureTargets {
            decoder: Arc::new(V210Decoder::new()),
            audio_sink: audio_queue.clone(),
            video_sink: video_queue.clone(),
        };

        let stop = StopSignal::new();
        let mut capture = {
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || run_capture(&*driver, request, targets, &stop))
        };

        let finished = tokio::select! {
            result = &mut capture => Some(result),
            _ = shutdown(self.duration.map(Duration::from_secs)) => None,
        };
        let result = match finished {
            Some(result) => result,
            None => {
                stop.stop();
                capture.await
            }
        };

        video_queue.close();
        audio_queue.close();
        let video = join_worker(video_worker)?;
        let audio = join_worker(audio_worker)?;

        let report = result
            .context("Capture task failed")?
            .with_context(|| format!("Failed to capture from card {card}"))?;

        let g = report.geometry;
        println!(
            "Captured {}x{} @ {:.2} fps{}",
            g.width,
            g.height,
            g.fps(),
            if g.interlaced { " interlaced" } else { "" }
        );
        println!(
            "  Video: {} frames, {:.1} s, {} out of order, {} dropped at queue",
            video.frames,
            video.span_secs(),
            video.out_of_order,
            video_queue.overflows()
        );
        println!(
            "  Audio: {} packets, {} bytes, {} dropped at queue",
            audio.frames,
            audio.bytes,
            audio_queue.overflows()
        );
        println!(
            "  Signal: {} no-signal frames, {} format changes, {} frames dropped",
            report.stats.no_signal, report.stats.format_changes, report.stats.dropped
        );
        Ok(())
    }
}

/**
    Resolves on Ctrl-C, or when `duration` elapses if one is given.
*/
async fn shutdown(duration: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("interrupted");
    };

    match duration {
        Some(duration) => tokio::select! {
            _ = ctrl_c => {}
            _ = tokio::time::sleep(duration) => info!("capture duration elapsed"),
        },
        None => ctrl_c.await,
    }
}

fn join_worker(handle: std::thread::JoinHandle<WorkerReport>) -> Result<WorkerReport> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Worker thread panicked"))
}
