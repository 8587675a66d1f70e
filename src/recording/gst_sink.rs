// SPDX-License-Identifier: MPL-2.0

//! GStreamer recorder sink
//!
//! Encodes composited recording-pass frames into an MP4 file:
//! appsrc (RGBA, live) -> videoconvert -> [videoflip] -> H.264 encoder ->
//! h264parse -> mp4mux -> filesink. The orientation hint is applied as an
//! actual videoflip stage so the recorded pixels are rotated, not merely
//! tagged.

use super::{RecordingSession, RecordingSink, encoder};
use crate::constants::{BitratePreset, recording, timing};
use crate::errors::{IllegalSessionState, RecorderInitError};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub struct GstRecorderSink {
    preset: BitratePreset,
    framerate: u32,
    pipeline: Option<gst::Pipeline>,
    appsrc: Option<AppSrc>,
    session: Option<RecordingSession>,
    frames_pushed: u64,
}

impl GstRecorderSink {
    pub fn new(preset: BitratePreset) -> Self {
        Self {
            preset,
            framerate: recording::FRAMERATE,
            pipeline: None,
            appsrc: None,
            session: None,
            frames_pushed: 0,
        }
    }

    /// videoflip method for a clockwise orientation hint, if any
    fn flip_method(orientation_hint: i32) -> Option<&'static str> {
        match orientation_hint.rem_euclid(360) {
            0 => None,
            90 => Some("clockwise"),
            180 => Some("rotate-180"),
            270 => Some("counterclockwise"),
            other => {
                warn!(orientation = other, "Unsupported orientation hint, recording unrotated");
                None
            }
        }
    }

    fn build_pipeline(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> Result<(gst::Pipeline, AppSrc), RecorderInitError> {
        gst::init().map_err(|e| {
            RecorderInitError::PipelineSetup(format!("GStreamer init failed: {}", e))
        })?;

        let pipeline = gst::Pipeline::new();

        let appsrc = gst::ElementFactory::make("appsrc")
            .name("recorder_src")
            .build()
            .map_err(|e| RecorderInitError::PipelineSetup(format!("appsrc: {}", e)))?
            .downcast::<AppSrc>()
            .map_err(|_| RecorderInitError::PipelineSetup("appsrc downcast failed".into()))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGBA")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gst::Fraction::new(self.framerate as i32, 1))
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(true);

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| RecorderInitError::PipelineSetup(format!("videoconvert: {}", e)))?;

        let videoflip = match Self::flip_method(orientation_hint) {
            Some(method) => {
                let flip = gst::ElementFactory::make("videoflip")
                    .build()
                    .map_err(|e| RecorderInitError::PipelineSetup(format!("videoflip: {}", e)))?;
                flip.set_property_from_str("method", method);
                Some(flip)
            }
            None => None,
        };

        let video_encoder = encoder::create_encoder(self.preset, width, height)
            .map_err(RecorderInitError::EncoderNotAvailable)?;

        let parser = gst::ElementFactory::make("h264parse")
            .build()
            .map_err(|e| RecorderInitError::PipelineSetup(format!("h264parse: {}", e)))?;

        let muxer = gst::ElementFactory::make("mp4mux")
            .build()
            .map_err(|e| RecorderInitError::PipelineSetup(format!("mp4mux: {}", e)))?;

        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().as_ref())
            .build()
            .map_err(|e| RecorderInitError::PipelineSetup(format!("filesink: {}", e)))?;

        let mut elements: Vec<&gst::Element> = vec![appsrc.upcast_ref(), &videoconvert];
        if let Some(ref flip) = videoflip {
            elements.push(flip);
        }
        elements.extend_from_slice(&[&video_encoder, &parser, &muxer, &filesink]);

        pipeline
            .add_many(&elements)
            .map_err(|e| RecorderInitError::PipelineSetup(format!("add elements: {}", e)))?;
        gst::Element::link_many(&elements)
            .map_err(|e| RecorderInitError::PipelineSetup(format!("link elements: {}", e)))?;

        Ok((pipeline, appsrc))
    }

    /// Best-effort teardown of all session resources
    fn release_resources(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                warn!(error = %e, "Failed to null recording pipeline during release");
            }
        }
        self.appsrc = None;
        self.session = None;
        self.frames_pushed = 0;
    }
}

impl RecordingSink for GstRecorderSink {
    fn initialize(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> Result<(), RecorderInitError> {
        if self.session.is_some() {
            return Err(RecorderInitError::SessionActive);
        }
        if width == 0 || height == 0 {
            return Err(RecorderInitError::UnsupportedSize { width, height });
        }

        info!(
            path = %path.display(),
            width,
            height,
            orientation_hint,
            "Initializing recorder sink"
        );

        let (pipeline, appsrc) = self.build_pipeline(path, width, height, orientation_hint)?;
        self.pipeline = Some(pipeline);
        self.appsrc = Some(appsrc);
        self.session = Some(RecordingSession {
            output_path: path.to_path_buf(),
            width,
            height,
            orientation_hint,
            active: false,
        });
        Ok(())
    }

    fn start(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            warn!("start called without an initialized session");
            return false;
        };
        if session.active {
            warn!("start called while already recording");
            return false;
        }
        let Some(pipeline) = self.pipeline.as_ref() else {
            return false;
        };

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            error!(error = %e, "Failed to start recording pipeline");
            return false;
        }

        // Wait for the state change so encoder misconfiguration surfaces now
        let (result, _state, _pending) =
            pipeline.state(gst::ClockTime::from_seconds(timing::START_TIMEOUT_SECS));
        if result.is_err() {
            error!("Recording pipeline failed to reach Playing state");
            let _ = pipeline.set_state(gst::State::Null);
            return false;
        }

        session.active = true;
        info!(path = %session.output_path.display(), "Recording started");
        true
    }

    fn stop(&mut self) -> Result<PathBuf, IllegalSessionState> {
        let recording = self.session.as_ref().is_some_and(|s| s.active);
        if !recording {
            // A session that never started still holds pipeline resources
            self.release_resources();
            return Err(IllegalSessionState("cannot stop, not recording".into()));
        }
        let path = self
            .session
            .as_ref()
            .map(|s| s.output_path.clone())
            .unwrap_or_default();

        // EOS first so mp4mux commits the moov atom, then release everything
        // whether or not the encoder cooperated
        if let Some(appsrc) = self.appsrc.as_ref() {
            if let Err(e) = appsrc.end_of_stream() {
                warn!(error = %e, "Failed to send EOS to recorder");
            }
        }
        std::thread::sleep(timing::STOP_EOS_GRACE);
        let frames = self.frames_pushed;
        self.release_resources();

        info!(path = %path.display(), frames, "Recording stopped");
        Ok(path)
    }

    fn push_frame(&mut self, rgba: &[u8], width: u32, height: u32) {
        let active = self.session.as_ref().is_some_and(|s| s.active);
        if !active {
            return;
        }
        let Some(appsrc) = self.appsrc.as_ref() else {
            return;
        };

        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            warn!(
                got = rgba.len(),
                expected, width, height, "Dropping recording frame with unexpected size"
            );
            return;
        }

        let mut buffer = match gst::Buffer::with_size(expected) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(error = %e, "Failed to allocate recording buffer");
                return;
            }
        };
        {
            let buffer_ref = match buffer.get_mut() {
                Some(r) => r,
                None => return,
            };
            let mut map = match buffer_ref.map_writable() {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "Failed to map recording buffer");
                    return;
                }
            };
            map.copy_from_slice(rgba);
        }

        match appsrc.push_buffer(buffer) {
            Ok(_) => {
                self.frames_pushed += 1;
                if self.frames_pushed % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(frames = self.frames_pushed, "Recording frames pushed");
                }
            }
            Err(e) => {
                warn!(error = ?e, "Failed to push recording frame");
            }
        }
    }
}

impl Drop for GstRecorderSink {
    fn drop(&mut self) {
        self.release_resources();
    }
}
