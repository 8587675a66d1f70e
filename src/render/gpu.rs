// SPDX-License-Identifier: MPL-2.0

//! GPU backend abstraction for the compositing pipeline
//!
//! All context-global GPU state (current program, bound textures, current
//! render target) goes through this trait instead of an ambient context, so
//! the compositor and surface host can be driven against a capturing mock in
//! tests while production uses the wgpu backend.

use crate::errors::{GraphicsError, ShaderCompileError};
use crate::render::matrix::Mat4;

/// Opaque GPU texture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Opaque render target handle (onscreen preview or offscreen recording)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub u64);

/// Opaque shader program handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramId(pub u64);

/// Uniform location within a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation(pub u32);

/// Attribute/uniform location table, computed once after link and immutable
/// for the lifetime of the program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramBindings {
    pub program: ProgramId,
    /// Vertex position attribute slot
    pub position: u32,
    /// Texture coordinate attribute slot
    pub tex_coordinate: u32,
    /// Model-view-projection matrix uniform
    pub mvp_matrix: UniformLocation,
    /// Per-frame sampling transform uniform
    pub texture_transform: UniformLocation,
    /// Texture unit selector uniform
    pub sampler_unit: UniformLocation,
}

/// GPU operations needed by the compositor and surface host.
///
/// Exactly one implementor instance exists per render context lifetime, and
/// it is only ever used from the render thread. Every operation returns
/// `GraphicsError` on failure; whether failures are actually detected is up
/// to the backend's strict-checking flag (see [`Gpu::strict_error_checking`]).
pub trait Gpu {
    /// Compile and link the textured-quad program from two text assets.
    ///
    /// Fails with the compiler log on a malformed shader. Recompilation after
    /// context loss requires a fresh pipeline, not in-place patching.
    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramBindings, ShaderCompileError>;

    /// Create a GPU-sampleable RGBA texture
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GraphicsError>;

    /// Destroy a texture; must only be called while the owning context lives
    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), GraphicsError>;

    /// Accept one producer frame into a texture (one "accept" operation).
    ///
    /// `stride` is the producer's row stride in bytes; rows may carry padding
    /// beyond `width * 4`.
    fn accept_frame(
        &mut self,
        texture: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<(), GraphicsError>;

    /// Create an offscreen render target at the given size
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, GraphicsError>;

    /// Destroy a render target
    fn destroy_target(&mut self, target: TargetId) -> Result<(), GraphicsError>;

    /// Make a target current for subsequent draws
    fn make_current(&mut self, target: TargetId) -> Result<(), GraphicsError>;

    /// Set the viewport for subsequent draws
    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), GraphicsError>;

    /// Select the active program
    fn use_program(&mut self, program: ProgramId) -> Result<(), GraphicsError>;

    /// Upload a 4x4 matrix uniform
    fn set_matrix(&mut self, location: UniformLocation, matrix: &Mat4)
    -> Result<(), GraphicsError>;

    /// Bind a texture to a texture unit and point the sampler uniform at it
    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<(), GraphicsError>;

    /// Draw the shared unit quad with premultiplied-alpha blending
    /// (ONE, ONE_MINUS_SRC_ALPHA) using the currently bound state
    fn draw_quad(&mut self) -> Result<(), GraphicsError>;

    /// Present all draws issued against a target since its last present
    fn present(&mut self, target: TargetId) -> Result<(), GraphicsError>;

    /// Read a presented target back as tightly packed RGBA bytes.
    ///
    /// Used to route recording-pass frames into the encoder sink.
    fn read_back(&mut self, target: TargetId) -> Result<Vec<u8>, GraphicsError>;

    /// Whether this backend validates every operation.
    ///
    /// With checking off, failures are not inspected and draws proceed
    /// optimistically; tests force strict mode to make errors deterministic.
    fn strict_error_checking(&self) -> bool;
}
