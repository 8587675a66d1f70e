// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for recorded video files

use std::path::PathBuf;
use tracing::debug;

/// Directory where recordings are written (`~/Videos/watermark-camera`)
pub fn videos_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("watermark-camera")
}

/// Generate a timestamped output path for a new recording.
///
/// Creates the directory if needed.
pub fn video_output_path() -> std::io::Result<PathBuf> {
    let dir = videos_dir();
    std::fs::create_dir_all(&dir)?;
    let filename = format!("REC_{}.mp4", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);
    debug!(path = ?path, "Generated recording output path");
    Ok(path)
}
