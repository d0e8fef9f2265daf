use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sdi_decode::{FrameDecoder, V210Decoder};
use sdi_input::{DeviceDriver, DeviceList, OpenError, ProbeRequest, probe_device};
use sdi_types::{DiscoveredDevice, StreamParams};

use super::InputArgs;
use crate::config::IngestConfig;

#[derive(Parser, Debug)]
pub struct ProbeCommand {
    #[command(flatten)]
    pub input: InputArgs,
}

impl ProbeCommand {
    pub async fn run(self, driver: Arc<dyn DeviceDriver>, config: &IngestConfig) -> Result<()> {
        let request = ProbeRequest {
            card_index: self.input.card(config),
            video_connection: self.input.video_connection(config),
            audio_connection: self.input.audio_connection(config),
            pixel_format: V210Decoder::new().output_format(),
        };
        let card = request.card_index;
        let registry = DeviceList::new();

        let devices = tokio::task::spawn_blocking(move || {
            probe_device(&*driver, &registry, &request)?;
            Ok::<_, OpenError>(registry.devices())
        })
        .await
        .context("Probe task failed")?
        .with_context(|| format!("Failed to probe card {card}"))?;

        for device in &devices {
            print_device(device);
        }
        Ok(())
    }
}

fn print_device(device: &DiscoveredDevice) {
    println!("Card {}: {}", device.card_index, device.model_name);
    for stream in &device.streams {
        match &stream.params {
            StreamParams::Video(video) => {
                let g = video.geometry;
                let scan = match (g.interlaced, g.tff) {
                    (false, _) => "progressive",
                    (true, true) => "interlaced, top field first",
                    (true, false) => "interlaced, bottom field first",
                };
                println!(
                    "  Stream {}: video {:?} {}x{} @ {:.2} fps ({}), {:?}, SAR {}",
                    stream.stream_id,
                    stream.format,
                    g.width,
                    g.height,
                    g.fps(),
                    scan,
                    video.pixel_format,
                    video.sar
                );
            }
            StreamParams::Audio(audio) => {
                println!(
                    "  Stream {}: audio {:?} {} Hz {:?} {:?}",
                    stream.stream_id,
                    stream.format,
                    audio.sample_rate,
                    audio.channel_layout,
                    audio.sample_format
                );
            }
        }
    }
}
