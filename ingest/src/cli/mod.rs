use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use sdi_input::DeviceDriver;
use sdi_input::test_source::TestDriver;
use sdi_types::{AudioConnection, VideoConnection};

use crate::config::IngestConfig;

mod capture;
mod devices;
mod probe;

pub use capture::CaptureCommand;
pub use devices::DevicesCommand;
pub use probe::ProbeCommand;

#[derive(Parser, Debug)]
#[command(name = "sdi-ingest")]
#[command(about = "Capture uncompressed audio and video from SDI capture cards")]
pub struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in simulated capture card instead of hardware
    #[arg(long, global = true)]
    pub test_source: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List installed capture cards and their display modes
    Devices(DevicesCommand),
    /// Discover the streams a card provides
    Probe(ProbeCommand),
    /// Capture from a card until interrupted
    Capture(CaptureCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => IngestConfig::load(path)?,
            None => IngestConfig::default(),
        };
        let driver = driver(self.test_source)?;

        match self.command {
            Command::Devices(cmd) => cmd.run(driver).await,
            Command::Probe(cmd) => cmd.run(driver, &config).await,
            Command::Capture(cmd) => cmd.run(driver, &config).await,
        }
    }
}

fn driver(test_source: bool) -> Result<Arc<dyn DeviceDriver>> {
    if test_source {
        return Ok(Arc::new(TestDriver::standard()));
    }
    bail!("No hardware capture driver is linked into this build; run with --test-source")
}

/**
    Card and connector selection shared by the subcommands that open a card.
*/
#[derive(clap::Args, Debug, Default)]
pub struct InputArgs {
    /// Capture card index, in driver enumeration order
    #[arg(long)]
    pub card: Option<usize>,

    /// Video input connection (sdi, hdmi, optical-sdi, component, composite, s-video)
    #[arg(long)]
    pub video_connection: Option<VideoConnection>,

    /// Audio input connection (embedded, aes-ebu, analogue)
    #[arg(long)]
    pub audio_connection: Option<AudioConnection>,
}

impl InputArgs {
    pub fn card(&self, config: &IngestConfig) -> usize {
        self.card.or(config.card).unwrap_or(0)
    }

    pub fn video_connection(&self, config: &IngestConfig) -> VideoConnection {
        self.video_connection
            .or(config.video_connection)
            .unwrap_or(VideoConnection::Sdi)
    }

    pub fn audio_connection(&self, config: &IngestConfig) -> AudioConnection {
        self.audio_connection
            .or(config.audio_connection)
            .unwrap_or(AudioConnection::Embedded)
    }
}
