// SPDX-License-Identifier: MPL-2.0

//! Watermark Camera - composites a live watermark over a camera preview and
//! records the result
//!
//! The core is the real-time compositing pipeline: two asynchronously
//! updating texture sources (camera frames, watermark repaints) merged by a
//! GPU compositor into an onscreen preview target and, while recording, an
//! offscreen target feeding a video encoder.
//!
//! # Architecture
//!
//! - [`render`]: texture sources, compositor, surface host, GPU backends
//! - [`producers`]: camera capture pipeline and watermark repaint timer
//! - [`recording`]: recording session state and the GStreamer encoder sink
//! - [`config`]: user configuration handling
//! - [`storage`]: output file placement

pub mod config;
pub mod constants;
pub mod errors;
pub mod producers;
pub mod recording;
pub mod render;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use constants::BitratePreset;
pub use errors::{AppError, AppResult};
pub use recording::{RecordingSession, RecordingSink};
pub use render::{HostHandle, SurfaceHost};
