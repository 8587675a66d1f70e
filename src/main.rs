// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "watermark-camera")]
#[command(about = "Camera recorder with a live watermark overlay")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record watermarked video from a camera
    Record {
        /// PipeWire camera target (serial or node name; default camera if omitted)
        #[arg(short, long)]
        device: Option<String>,

        /// Recording duration in seconds (Ctrl-C stops earlier)
        #[arg(long, default_value = "10")]
        duration: u64,

        /// Recorded video width
        #[arg(long)]
        width: Option<u32>,

        /// Recorded video height
        #[arg(long)]
        height: Option<u32>,

        /// Screen rotation in degrees applied to the camera layer
        #[arg(long, default_value = "0")]
        rotation: f32,

        /// Orientation hint baked into the recorded file
        #[arg(long, default_value = "0")]
        orientation: i32,

        /// Output file path (default: ~/Videos/watermark-camera/REC_TIMESTAMP.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available H.264 encoders
    Encoders,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=watermark_camera=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    match args.command {
        Some(Commands::Record {
            device,
            duration,
            width,
            height,
            rotation,
            orientation,
            output,
        }) => cli::record(cli::RecordArgs {
            device,
            duration,
            width,
            height,
            rotation,
            orientation,
            output,
        }),
        Some(Commands::Encoders) => cli::list_encoders(),
        None => cli::record(cli::RecordArgs::default()),
    }
}
