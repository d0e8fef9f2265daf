use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod queue;
mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("sdi=info".parse()?),
        )
        .init();

    cli::Args::parse().run().await
}
