// SPDX-License-Identifier: MPL-2.0

//! H.264 encoder selection for the recording pipeline
//!
//! Hardware encoders are preferred over software fallbacks. Selection only
//! probes element availability; the encoder element itself is configured
//! from the bitrate preset at pipeline build time.

use crate::constants::BitratePreset;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info};

/// Known H.264 encoder elements in preference order (hardware first)
const ENCODER_PREFERENCE: [(&str, &str, bool); 7] = [
    ("vah264enc", "VA-API H.264 (HW)", true),
    ("vaapih264enc", "VA-API H.264 (HW, legacy)", true),
    ("nvh264enc", "NVIDIA H.264 (HW)", true),
    ("qsvh264enc", "Intel QSV H.264 (HW)", true),
    ("v4l2h264enc", "V4L2 H.264 (HW)", true),
    ("x264enc", "x264 H.264 (SW)", false),
    ("openh264enc", "OpenH264 H.264 (SW)", false),
];

/// An available encoder element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    /// GStreamer element name
    pub element_name: &'static str,
    /// Human-readable name for the CLI listing
    pub display_name: &'static str,
    pub is_hardware: bool,
}

/// Enumerate H.264 encoders present on this system, in preference order
pub fn enumerate_encoders() -> Vec<EncoderInfo> {
    let _ = gst::init();
    ENCODER_PREFERENCE
        .iter()
        .filter(|(element_name, _, _)| gst::ElementFactory::find(element_name).is_some())
        .map(|&(element_name, display_name, is_hardware)| EncoderInfo {
            element_name,
            display_name,
            is_hardware,
        })
        .collect()
}

/// Create and configure the best available H.264 encoder.
///
/// The bitrate is derived from the recording resolution through the preset's
/// tiers.
pub fn create_encoder(
    preset: BitratePreset,
    width: u32,
    height: u32,
) -> Result<gst::Element, String> {
    let available = enumerate_encoders();
    let info = available
        .first()
        .ok_or_else(|| "no H.264 encoder element found".to_string())?;

    let encoder = gst::ElementFactory::make(info.element_name)
        .build()
        .map_err(|e| format!("failed to create {}: {}", info.element_name, e))?;

    let bitrate_kbps = preset.bitrate_kbps(width, height);
    configure_encoder(&encoder, info.element_name, bitrate_kbps);

    info!(
        encoder = info.element_name,
        hardware = info.is_hardware,
        bitrate_kbps,
        "Selected H.264 encoder"
    );
    Ok(encoder)
}

fn configure_encoder(encoder: &gst::Element, element_name: &str, bitrate_kbps: u32) {
    match element_name {
        "x264enc" => {
            encoder.set_property("bitrate", bitrate_kbps);
            // Low-latency settings; the source is a live render loop
            encoder.set_property_from_str("speed-preset", "veryfast");
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property("key-int-max", 60u32);
        }
        "openh264enc" => {
            // openh264enc takes bits per second
            encoder.set_property("bitrate", bitrate_kbps * 1000);
        }
        "nvh264enc" | "qsvh264enc" | "vah264enc" | "vaapih264enc" => {
            encoder.set_property("bitrate", bitrate_kbps);
        }
        other => {
            debug!(encoder = other, "No bitrate configuration for encoder");
        }
    }
}
