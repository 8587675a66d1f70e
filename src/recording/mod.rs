// SPDX-License-Identifier: MPL-2.0

//! Recording session state and the encoder sink contract
//!
//! The render side treats the encoder as an opaque sink: it initializes a
//! session, starts and stops it, and pushes composited recording-pass frames
//! into it. Everything behind that contract (pipeline construction, encoder
//! selection, muxing) lives in [`gst_sink`] and [`encoder`].

pub mod encoder;
pub mod gst_sink;

use crate::constants::recording;
use crate::errors::{IllegalSessionState, RecorderInitError};
use std::path::{Path, PathBuf};

/// One recording session from initialize to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation in degrees baked into the recorded video
    pub orientation_hint: i32,
    pub active: bool,
}

/// Encoder sink contract consumed by the surface host.
///
/// Start and stop failures follow an asymmetric protocol: `start` reports
/// failure as a boolean and leaves state unchanged so the control layer can
/// retry, while `stop` on an encoder failure still releases the session
/// resources unconditionally.
pub trait RecordingSink: Send {
    /// Configure the encoder for a new session.
    ///
    /// Fails if the dimensions cannot be encoded or a session is already
    /// configured; the caller must stop the active session first.
    fn initialize(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> Result<(), RecorderInitError>;

    /// Begin encoding. Returns false on failure, leaving state unchanged.
    fn start(&mut self) -> bool;

    /// Stop encoding and commit the file.
    ///
    /// Fails with [`IllegalSessionState`] when no session is recording.
    fn stop(&mut self) -> Result<PathBuf, IllegalSessionState>;

    /// Feed one composited recording-pass frame (tightly packed RGBA)
    fn push_frame(&mut self, rgba: &[u8], width: u32, height: u32);
}

/// Clamp requested recording dimensions to the encoder surface ceiling.
///
/// Oversized requests are scaled aspect-preserving into the ceiling box for
/// their orientation: the requested aspect is compared against the box aspect
/// to pick which edge pins to its ceiling, and the other edge follows from
/// the requested aspect. Dimensions are forced even for the encoder.
pub fn clamp_recording_size(width: u32, height: u32) -> (u32, u32) {
    let (max_w, max_h) = if width > height {
        (recording::MAX_LONG_EDGE, recording::MAX_SHORT_EDGE)
    } else {
        (recording::MAX_SHORT_EDGE, recording::MAX_LONG_EDGE)
    };
    let (mut w, mut h) = (width, height);
    if w > max_w || h > max_h {
        let aspect = height as f32 / width as f32;
        let box_aspect = max_h as f32 / max_w as f32;
        if aspect > box_aspect {
            h = max_h;
            w = (h as f32 / aspect).floor() as u32;
        } else {
            w = max_w;
            h = (w as f32 * aspect).floor() as u32;
        }
    }
    (w & !1, h & !1)
}
