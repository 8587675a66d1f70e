// SPDX-License-Identifier: MPL-2.0

//! PipeWire camera capture feeding the camera texture source
//!
//! pipewiresrc [target-object] -> videoconvert -> capsfilter (RGBA) ->
//! appsink. The appsink callback runs on the GStreamer streaming thread; it
//! only wraps the sample into a [`FramePayload`] and hands it to the
//! notifier, never touching GPU state.

use crate::constants::pipeline;
use crate::errors::CameraError;
use crate::render::matrix::Mat4;
use crate::render::texture_source::{FrameNotifier, FramePayload};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Live camera capture pipeline.
pub struct CameraProducer {
    pipeline: gst::Pipeline,
    appsink: AppSink,
}

impl CameraProducer {
    /// Build and start the capture pipeline.
    ///
    /// `target_object` selects a PipeWire node (serial or node name); when
    /// empty PipeWire picks the default camera.
    pub fn start(
        target_object: Option<&str>,
        width: u32,
        height: u32,
        framerate: u32,
        notifier: FrameNotifier,
    ) -> Result<Self, CameraError> {
        gst::init()
            .map_err(|e| CameraError::InitializationFailed(format!("GStreamer init: {}", e)))?;

        info!(target = ?target_object, width, height, framerate, "Starting camera producer");

        let pipeline = gst::Pipeline::new();

        let mut source_builder =
            gst::ElementFactory::make("pipewiresrc").property("do-timestamp", true);
        if let Some(target) = target_object {
            if !target.is_empty() {
                source_builder = source_builder.property("target-object", target);
            }
        }
        let source = source_builder
            .build()
            .map_err(|e| CameraError::InitializationFailed(format!("pipewiresrc: {}", e)))?;

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| CameraError::InitializationFailed(format!("videoconvert: {}", e)))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", pipeline::OUTPUT_FORMAT)
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gst::Fraction::new(framerate as i32, 1))
            .build();
        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property("caps", &caps)
            .build()
            .map_err(|e| CameraError::InitializationFailed(format!("capsfilter: {}", e)))?;

        let appsink = gst::ElementFactory::make("appsink")
            .build()
            .map_err(|e| CameraError::InitializationFailed(format!("appsink: {}", e)))?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::InitializationFailed("appsink downcast failed".into()))?;

        // Low latency: tiny queue, drop stale frames instead of stalling
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let elements = [
            &source,
            &videoconvert,
            &capsfilter,
            appsink.upcast_ref::<gst::Element>(),
        ];
        pipeline
            .add_many(elements)
            .map_err(|e| CameraError::InitializationFailed(format!("add elements: {}", e)))?;
        gst::Element::link_many(elements)
            .map_err(|e| CameraError::InitializationFailed(format!("link elements: {}", e)))?;

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

                    let sample = appsink.pull_sample().map_err(|e| {
                        if frame_num % 30 == 0 {
                            error!(frame = frame_num, error = ?e, "Failed to pull sample");
                        }
                        gst::FlowError::Eos
                    })?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                    let video_info =
                        VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|e| {
                        if frame_num % 30 == 0 {
                            error!(frame = frame_num, error = ?e, "Failed to map buffer");
                        }
                        gst::FlowError::Error
                    })?;

                    let stride = video_info.stride()[0] as u32;
                    let data: Arc<[u8]> = Arc::from(map.as_slice());
                    notifier.notify_new_frame(FramePayload {
                        data,
                        width: video_info.width(),
                        height: video_info.height(),
                        stride,
                        // RGBA buffers arrive row-major top-down; no
                        // coordinate correction needed
                        transform: Mat4::IDENTITY,
                    });

                    if frame_num % 300 == 0 {
                        debug!(
                            frame = frame_num,
                            width = video_info.width(),
                            height = video_info.height(),
                            stride,
                            "Camera frames flowing"
                        );
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| CameraError::InitializationFailed(format!("set Playing: {}", e)))?;

        Ok(Self { pipeline, appsink })
    }

    /// Stop capture and detach the callback
    pub fn stop(&self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!(error = %e, "Failed to stop camera pipeline");
        }
    }
}

impl Drop for CameraProducer {
    fn drop(&mut self) {
        self.stop();
    }
}
