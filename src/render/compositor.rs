// SPDX-License-Identifier: MPL-2.0

//! Layer compositor
//!
//! Merges the camera and watermark texture sources into whichever render
//! target is current. Draw order is fixed: camera first, watermark second,
//! so the watermark always composites on top. Each layer consumes its
//! pending producer frames, uploads its own MVP and sampling transform, and
//! draws the shared unit quad with premultiplied-alpha blending.
//!
//! Not reentrant; binds global GPU state and must only run on the render
//! thread.

use crate::errors::GraphicsError;
use crate::render::gpu::Gpu;
use crate::render::matrix::{Mat4, letterbox_aspect, normalized_aspect};
use crate::render::shader::ShaderPipeline;
use crate::render::texture_source::TextureSource;

/// Shared unit-quad geometry, constant across all draws.
pub mod geometry {
    /// Quad corner positions: top left, top right, bottom left, bottom right
    pub const VERTEX_POSITIONS: [f32; 8] = [
        -1.0, 1.0, //
        1.0, 1.0, //
        -1.0, -1.0, //
        1.0, -1.0,
    ];

    /// Texture coordinates matching the corner order above
    pub const TEX_COORDINATES: [f32; 8] = [
        0.0, 0.0, //
        1.0, 0.0, //
        0.0, 1.0, //
        1.0, 1.0,
    ];

    /// Two triangles covering the quad
    pub const DRAW_ORDER: [u16; 6] = [0, 1, 2, 1, 3, 2];
}

/// Texture unit assignments, fixed per layer
const CAMERA_TEXTURE_UNIT: u32 = 0;
const OVERLAY_TEXTURE_UNIT: u32 = 1;

/// Composites the camera and watermark layers into the current render target.
pub struct Compositor {
    shader: ShaderPipeline,
    camera: TextureSource,
    overlay: TextureSource,
    screen_size: (u32, u32),
    preview_size: (u32, u32),
    screen_rotation_degrees: f32,
    mirror_camera: bool,
}

impl Compositor {
    pub fn new(shader: ShaderPipeline, camera: TextureSource, overlay: TextureSource) -> Self {
        Self {
            shader,
            camera,
            overlay,
            screen_size: (1, 1),
            preview_size: (1, 1),
            screen_rotation_degrees: 0.0,
            mirror_camera: false,
        }
    }

    /// Size of the onscreen preview surface
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen_size = (width.max(1), height.max(1));
    }

    /// Size of the camera sensor's preview buffers
    pub fn set_preview_size(&mut self, width: u32, height: u32) {
        self.preview_size = (width.max(1), height.max(1));
    }

    /// Device rotation applied to the camera layer only
    pub fn set_screen_rotation(&mut self, degrees: f32) {
        self.screen_rotation_degrees = degrees;
    }

    /// Mirror the camera layer horizontally (selfie preview)
    pub fn set_mirror_camera(&mut self, mirror: bool) {
        self.mirror_camera = mirror;
    }

    /// Letterboxing ratio between the screen and camera preview aspects,
    /// always in (0, 1].
    pub fn aspect_ratio(&self) -> f32 {
        let screen = normalized_aspect(self.screen_size.0, self.screen_size.1);
        let preview = normalized_aspect(self.preview_size.0, self.preview_size.1);
        letterbox_aspect(screen, preview)
    }

    /// Camera layer MVP: screen rotation over an orthographic projection
    /// widened to the letterboxing aspect, so the feed keeps its true aspect
    /// inside the screen.
    pub fn camera_mvp(&self) -> Mat4 {
        let aspect = self.aspect_ratio();
        let ortho = Mat4::orthographic(-aspect, aspect, -1.0, 1.0, -1.0, 1.0);
        let mvp = Mat4::rotation_z(self.screen_rotation_degrees).multiply(&ortho);
        if self.mirror_camera {
            Mat4::scale(-1.0, 1.0).multiply(&mvp)
        } else {
            mvp
        }
    }

    /// Watermark layer MVP: identity orthographic, full frame, axis aligned,
    /// independent of device rotation.
    pub fn overlay_mvp(&self) -> Mat4 {
        Mat4::orthographic(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0)
    }

    /// Draw both layers into the current render target.
    ///
    /// Consumes every pending update on each source before sampling it, then
    /// issues one blended quad per layer.
    pub fn draw(&mut self, gpu: &mut dyn Gpu) -> Result<(), GraphicsError> {
        gpu.use_program(self.shader.bindings().program)?;

        let camera_mvp = self.camera_mvp();
        let overlay_mvp = self.overlay_mvp();
        Self::draw_layer(gpu, &self.shader, &mut self.camera, CAMERA_TEXTURE_UNIT, &camera_mvp)?;
        Self::draw_layer(gpu, &self.shader, &mut self.overlay, OVERLAY_TEXTURE_UNIT, &overlay_mvp)?;
        Ok(())
    }

    fn draw_layer(
        gpu: &mut dyn Gpu,
        shader: &ShaderPipeline,
        source: &mut TextureSource,
        unit: u32,
        mvp: &Mat4,
    ) -> Result<(), GraphicsError> {
        source.consume_pending(gpu)?;

        // Nothing to draw until the producer has delivered a first frame
        let Some(texture) = source.texture() else {
            return Ok(());
        };

        let bindings = shader.bindings();
        gpu.set_matrix(bindings.texture_transform, source.transform())?;
        gpu.set_matrix(bindings.mvp_matrix, mvp)?;
        gpu.bind_texture(unit, texture)?;
        gpu.draw_quad()?;
        Ok(())
    }

    /// Release both texture sources; must run before the render context is
    /// destroyed.
    pub fn release(&mut self, gpu: &mut dyn Gpu) {
        self.camera.release(gpu);
        self.overlay.release(gpu);
    }

    pub fn camera_source(&self) -> &TextureSource {
        &self.camera
    }

    pub fn overlay_source(&self) -> &TextureSource {
        &self.overlay
    }
}
