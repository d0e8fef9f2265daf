use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sdi_input::{DeviceDriver, list_devices};

#[derive(Parser, Debug)]
pub struct DevicesCommand;

impl DevicesCommand {
    pub async fn run(self, driver: Arc<dyn DeviceDriver>) -> Result<()> {
        let devices = tokio::task::spawn_blocking(move || list_devices(&*driver))
            .await
            .context("Device listing task failed")?
            .context("Failed to enumerate capture cards")?;

        if devices.is_empty() {
            println!("No capture cards found");
            return Ok(());
        }

        for device in devices {
            let model = device.model_name.as_deref().unwrap_or("<unknown model>");
            println!("Card {}: {}", device.index, model);
            if device.modes.is_empty() {
                println!("  (no input modes)");
            }
            for mode in &device.modes {
                let rate = mode
                    .timebase
                    .map(|tb| format!("{:.2} fps", tb.invert().to_f64()))
                    .unwrap_or_else(|| "unknown rate".to_string());
                println!(
                    "  [{}] {:<14} {}x{} {} {:?}",
                    mode.id, mode.name, mode.width, mode.height, rate, mode.field_dominance
                );
            }
        }
        Ok(())
    }
}
