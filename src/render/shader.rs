// SPDX-License-Identifier: MPL-2.0

//! Compositing shader pipeline
//!
//! One textured-quad program shared by both layers, compiled once per render
//! context. The vertex and fragment stages ship as two WGSL text assets that
//! are concatenated into a single module at compile time.

use crate::errors::ShaderCompileError;
use crate::render::gpu::{Gpu, ProgramBindings};

/// Vertex stage source asset
pub const VERTEX_SHADER: &str = include_str!("../shaders/composite.vert.wgsl");
/// Fragment stage source asset
pub const FRAGMENT_SHADER: &str = include_str!("../shaders/composite.frag.wgsl");

/// Compiled compositing program with its fixed binding table.
///
/// Immutable after creation. Context loss requires building a fresh instance
/// against the new context; there is no in-place recompilation.
#[derive(Debug, Clone, Copy)]
pub struct ShaderPipeline {
    bindings: ProgramBindings,
}

impl ShaderPipeline {
    /// Compile and link the program from the two stage sources.
    ///
    /// On compile or link failure the error carries the full compiler log so
    /// broken shader edits are diagnosable from the test output.
    pub fn compile(
        gpu: &mut dyn Gpu,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, ShaderCompileError> {
        let bindings = gpu.compile_program(vertex_src, fragment_src)?;
        Ok(Self { bindings })
    }

    /// Compile the shipped shader assets
    pub fn compile_default(gpu: &mut dyn Gpu) -> Result<Self, ShaderCompileError> {
        Self::compile(gpu, VERTEX_SHADER, FRAGMENT_SHADER)
    }

    pub fn bindings(&self) -> &ProgramBindings {
        &self.bindings
    }
}
