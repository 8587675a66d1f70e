// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};

/// Video encoder bitrate presets
///
/// The target bitrate scales with the recording resolution so users only pick
/// a quality/file-size trade-off, not a raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Get bitrate in kbps for a given resolution
    pub fn bitrate_kbps(&self, width: u32, height: u32) -> u32 {
        // Recording happens in portrait or landscape; tier by the long edge.
        let long_edge = width.max(height);
        match (long_edge, self) {
            (w, BitratePreset::Low) if w >= 1920 => 4_000,
            (w, BitratePreset::Medium) if w >= 1920 => 8_000,
            (w, BitratePreset::High) if w >= 1920 => 16_000,
            (w, BitratePreset::Low) if w >= 1280 => 2_500,
            (w, BitratePreset::Medium) if w >= 1280 => 5_000,
            (w, BitratePreset::High) if w >= 1280 => 10_000,
            (_, BitratePreset::Low) => 1_000,
            (_, BitratePreset::Medium) => 2_000,
            (_, BitratePreset::High) => 4_000,
        }
    }
}

/// Recording geometry constants
pub mod recording {
    /// Default recorded video size (portrait)
    pub const DEFAULT_WIDTH: u32 = 720;
    pub const DEFAULT_HEIGHT: u32 = 1280;

    /// Encoder surface ceiling on the long edge
    pub const MAX_LONG_EDGE: u32 = 2280;
    /// Encoder surface ceiling on the short edge
    pub const MAX_SHORT_EDGE: u32 = 1080;

    /// Recorded video framerate
    pub const FRAMERATE: u32 = 30;
}

/// Capture pipeline constants
pub mod pipeline {
    /// Maximum appsink buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Capture pixel format delivered to the texture source
    ///
    /// RGBA is 4 bytes/pixel and uploads to the GPU without conversion.
    pub const OUTPUT_FORMAT: &str = "RGBA";
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Default watermark overlay repaint period
    pub const OVERLAY_REFRESH: Duration = Duration::from_millis(1000);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Recording pipeline state-change timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Grace period for the muxer to commit duration metadata on stop
    pub const STOP_EOS_GRACE: Duration = Duration::from_millis(500);
}
