// SPDX-License-Identifier: MPL-2.0

//! Integration tests for compositing order and MVP math

mod common;

use common::{CaptureGpu, GpuOp};
use std::sync::Arc;
use watermark_camera::render::compositor::Compositor;
use watermark_camera::render::matrix::Mat4;
use watermark_camera::render::shader::ShaderPipeline;
use watermark_camera::render::texture_source::{FramePayload, Layer, TextureSource};

fn frame(width: u32, height: u32) -> FramePayload {
    FramePayload {
        data: Arc::from(vec![0u8; (width * height * 4) as usize].into_boxed_slice()),
        width,
        height,
        stride: width * 4,
        transform: Mat4::IDENTITY,
    }
}

fn compositor_with_frames(gpu: &mut CaptureGpu) -> Compositor {
    let shader = ShaderPipeline::compile_default(gpu).unwrap();
    let (camera, camera_notifier) = TextureSource::new(Layer::Camera, Arc::new(|| {}));
    let (overlay, overlay_notifier) = TextureSource::new(Layer::Overlay, Arc::new(|| {}));
    camera_notifier.notify_new_frame(frame(960, 1280));
    overlay_notifier.notify_new_frame(frame(720, 1280));
    Compositor::new(shader, camera, overlay)
}

#[test]
fn test_camera_layer_drawn_before_overlay() {
    let mut gpu = CaptureGpu::new();
    let ops = gpu.ops();
    let mut compositor = compositor_with_frames(&mut gpu);

    compositor.draw(&mut gpu).unwrap();

    let binds: Vec<u32> = ops
        .lock()
        .unwrap()
        .iter()
        .filter_map(|op| match op {
            GpuOp::BindTexture { unit, .. } => Some(*unit),
            _ => None,
        })
        .collect();
    // Camera on unit 0 first, overlay on unit 1 second, every draw
    assert_eq!(binds, vec![0, 1]);

    let draws = ops
        .lock()
        .unwrap()
        .iter()
        .filter(|op| matches!(op, GpuOp::DrawQuad))
        .count();
    assert_eq!(draws, 2);
}

#[test]
fn test_layers_without_frames_are_skipped() {
    let mut gpu = CaptureGpu::new();
    let ops = gpu.ops();
    let shader = ShaderPipeline::compile_default(&mut gpu).unwrap();
    let (camera, _camera_notifier) = TextureSource::new(Layer::Camera, Arc::new(|| {}));
    let (overlay, _overlay_notifier) = TextureSource::new(Layer::Overlay, Arc::new(|| {}));
    let mut compositor = Compositor::new(shader, camera, overlay);

    compositor.draw(&mut gpu).unwrap();

    let draws = ops
        .lock()
        .unwrap()
        .iter()
        .filter(|op| matches!(op, GpuOp::DrawQuad))
        .count();
    assert_eq!(draws, 0);
}

#[test]
fn test_aspect_ratio_bounded_and_symmetric() {
    let mut gpu = CaptureGpu::new();
    let mut compositor = compositor_with_frames(&mut gpu);

    // 720x1280 screen against a 960x1280 sensor: 0.5625 / 0.75 = 0.75
    compositor.set_screen_size(720, 1280);
    compositor.set_preview_size(960, 1280);
    assert!((compositor.aspect_ratio() - 0.75).abs() < 1e-6);

    // Swapping which surface is narrower gives the same ratio
    compositor.set_screen_size(960, 1280);
    compositor.set_preview_size(720, 1280);
    assert!((compositor.aspect_ratio() - 0.75).abs() < 1e-6);

    for (sw, sh, pw, ph) in [(1, 1000, 1000, 1), (1080, 1920, 1920, 1080), (640, 480, 640, 480)] {
        compositor.set_screen_size(sw, sh);
        compositor.set_preview_size(pw, ph);
        let aspect = compositor.aspect_ratio();
        assert!(aspect > 0.0 && aspect <= 1.0, "aspect {} out of range", aspect);
    }
}

#[test]
fn test_camera_mvp_letterboxes_horizontal_extent() {
    let mut gpu = CaptureGpu::new();
    let mut compositor = compositor_with_frames(&mut gpu);
    compositor.set_screen_size(720, 1280);
    compositor.set_preview_size(960, 1280);
    compositor.set_screen_rotation(0.0);

    // The quad's horizontal half-extent lands at x = 1/aspect scaled back to
    // clip space: ortho(-0.75, 0.75) maps x = 0.75 to clip 1.0
    let mvp = compositor.camera_mvp();
    let (x, _) = mvp.transform_point(0.75, 0.0);
    assert!((x - 1.0).abs() < 1e-6);
}

#[test]
fn test_overlay_mvp_is_full_frame_regardless_of_rotation() {
    let mut gpu = CaptureGpu::new();
    let mut compositor = compositor_with_frames(&mut gpu);
    compositor.set_screen_rotation(90.0);

    let mvp = compositor.overlay_mvp();
    let (x, y) = mvp.transform_point(1.0, 1.0);
    assert!((x - 1.0).abs() < 1e-6);
    assert!((y - 1.0).abs() < 1e-6);
}

#[test]
fn test_rotation_affects_camera_layer_only() {
    let mut gpu = CaptureGpu::new();
    let mut compositor = compositor_with_frames(&mut gpu);
    compositor.set_screen_size(100, 100);
    compositor.set_preview_size(100, 100);

    let before = compositor.camera_mvp();
    compositor.set_screen_rotation(-90.0);
    let after = compositor.camera_mvp();
    assert_ne!(before, after);
    assert_eq!(compositor.overlay_mvp(), compositor.overlay_mvp());
}

#[test]
fn test_draw_consumes_pending_updates() {
    let mut gpu = CaptureGpu::new();
    let mut compositor = compositor_with_frames(&mut gpu);

    compositor.draw(&mut gpu).unwrap();
    assert_eq!(compositor.camera_source().pending_updates(), 0);
    assert_eq!(compositor.overlay_source().pending_updates(), 0);
}

#[test]
fn test_release_then_draw_is_safe() {
    let mut gpu = CaptureGpu::new();
    let ops = gpu.ops();
    let mut compositor = compositor_with_frames(&mut gpu);

    compositor.draw(&mut gpu).unwrap();
    compositor.release(&mut gpu);
    let ops_after_release = ops.lock().unwrap().len();

    compositor.draw(&mut gpu).unwrap();
    // Only the program selection runs; released layers draw nothing
    let draws_after = ops.lock().unwrap()[ops_after_release..]
        .iter()
        .filter(|op| matches!(op, GpuOp::DrawQuad))
        .count();
    assert_eq!(draws_after, 0);
}
