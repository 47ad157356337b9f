//! Builds an attention U-Net from a JSON configuration, runs a zero tensor
//! through it and logs the resulting shapes and parameter count.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attention_unet::AttentionUNetConfig;
use attention_unet_demos::{
    backend::{create_device, SelectedBackend, BACKEND_NAME},
    init_logging,
};
use burn::prelude::*;
use clap::Parser;

#[derive(Parser)]
#[command(name = "summary")]
#[command(about = "Build an attention U-Net and report its input and output shapes")]
struct Args {
    /// Model configuration file (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Batch size of the sample input
    #[arg(short, long, default_value_t = 1)]
    batch_size: usize,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = AttentionUNetConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let device = create_device();
    tracing::info!(
        backend = BACKEND_NAME,
        config = %args.config.display(),
        "building model"
    );

    let model = config
        .init::<SelectedBackend>(&device)
        .context("failed to build model")?;
    let [channels, height, width] = model.input_shape();
    tracing::info!(
        channels,
        height,
        width,
        levels = config.levels(),
        parameters = model.num_params(),
        "model built"
    );

    let input =
        Tensor::<SelectedBackend, 4>::zeros([args.batch_size, channels, height, width], &device);
    let outputs = model.forward(input).context("forward pass failed")?;
    for (index, output) in outputs.into_vec().iter().enumerate() {
        tracing::info!(index, shape = ?output.dims(), "output");
    }

    Ok(())
}
