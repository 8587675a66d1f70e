// SPDX-License-Identifier: GPL-3.0-only

//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{info, warn};
use watermark_camera::config::Config;
use watermark_camera::producers::camera::CameraProducer;
use watermark_camera::producers::overlay::OverlayProducer;
use watermark_camera::recording::gst_sink::GstRecorderSink;
use watermark_camera::render::host::SourceHandles;
use watermark_camera::render::{SurfaceHost, WgpuBackend};
use watermark_camera::{recording, storage};

#[derive(Default)]
pub struct RecordArgs {
    pub device: Option<String>,
    pub duration: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotation: f32,
    pub orientation: i32,
    pub output: Option<PathBuf>,
}

/// Record a watermarked video for a fixed duration (or until Ctrl-C).
pub fn record(args: RecordArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let width = args.width.unwrap_or(config.record_width);
    let height = args.height.unwrap_or(config.record_height);
    let duration = if args.duration == 0 { 10 } else { args.duration };
    let output = match args.output {
        Some(path) => path,
        None => storage::video_output_path()?,
    };

    let gpu = WgpuBackend::new(config.strict_gpu_error_checking)?;
    let sink = Box::new(GstRecorderSink::new(config.bitrate_preset));

    // The render thread hands the producer notifiers back once the GPU
    // context exists
    let (sources_tx, sources_rx) = mpsc::channel::<SourceHandles>();
    let host = SurfaceHost::spawn(
        gpu,
        sink,
        Box::new(move |sources| {
            let _ = sources_tx.send(sources);
        }),
    );
    let handle = host.handle();

    // Headless preview target at the recording size
    handle.on_surface_created(width, height);
    handle.set_camera_format(width, height);
    handle.set_screen_rotation(args.rotation);
    handle.set_mirror_camera(config.mirror_preview);

    let sources = sources_rx
        .recv_timeout(Duration::from_secs(10))
        .map_err(|_| "render context did not become ready")?;

    let camera = CameraProducer::start(
        args.device
            .as_deref()
            .or(config.last_camera_target.as_deref()),
        width,
        height,
        watermark_camera::constants::recording::FRAMERATE,
        sources.camera,
    )?;
    let mut overlay = OverlayProducer::start(
        width,
        height,
        Duration::from_millis(config.overlay_refresh_ms),
        sources.overlay,
    );

    if !handle.start_recording(output.clone(), width, height, args.orientation) {
        camera.stop();
        overlay.stop();
        host.join();
        return Err("failed to start recording".into());
    }
    info!(path = %output.display(), duration, "Recording");
    println!("Recording to {} for up to {}s (Ctrl-C to stop)", output.display(), duration);

    // Sleep in slices so Ctrl-C stops within a tenth of a second
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
    let mut remaining = Duration::from_secs(duration);
    let slice = Duration::from_millis(100);
    while remaining > Duration::ZERO && !interrupted.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining -= step;
    }

    if !handle.stop_recording() {
        warn!("Recorder reported stop failure");
    }
    camera.stop();
    overlay.stop();
    handle.on_surface_destroyed();
    host.join();

    println!("Saved {}", output.display());
    Ok(())
}

/// List available H.264 encoder elements.
pub fn list_encoders() -> Result<(), Box<dyn std::error::Error>> {
    let encoders = recording::encoder::enumerate_encoders();
    if encoders.is_empty() {
        println!("No H.264 encoders found");
        return Ok(());
    }
    println!("Available H.264 encoders (preference order):");
    for info in encoders {
        let kind = if info.is_hardware { "hardware" } else { "software" };
        println!("  {:16} {} [{}]", info.element_name, info.display_name, kind);
    }
    Ok(())
}
