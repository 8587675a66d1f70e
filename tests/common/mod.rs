// SPDX-License-Identifier: MPL-2.0

//! Shared test doubles: a capturing GPU backend and a scriptable recorder
//! sink. Both record every call so tests can assert on exact operation
//! sequences.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use watermark_camera::errors::{GraphicsError, IllegalSessionState, RecorderInitError, ShaderCompileError};
use watermark_camera::recording::RecordingSink;
use watermark_camera::render::gpu::{
    Gpu, ProgramBindings, ProgramId, TargetId, TextureId, UniformLocation,
};
use watermark_camera::render::matrix::Mat4;

#[derive(Debug, Clone, PartialEq)]
pub enum GpuOp {
    CompileProgram,
    CreateTexture { id: u64, width: u32, height: u32 },
    DestroyTexture { id: u64 },
    AcceptFrame { texture: u64, width: u32, height: u32 },
    CreateTarget { id: u64, width: u32, height: u32 },
    DestroyTarget { id: u64 },
    MakeCurrent { target: u64 },
    SetViewport { width: u32, height: u32 },
    UseProgram,
    SetMatrix { location: u32, matrix: Mat4 },
    BindTexture { unit: u32, texture: u64 },
    DrawQuad,
    Present { target: u64 },
    ReadBack { target: u64 },
}

pub type OpLog = Arc<Mutex<Vec<GpuOp>>>;

/// Strict-mode GPU backend that records operations instead of drawing.
pub struct CaptureGpu {
    ops: OpLog,
    next_id: u64,
    textures: Vec<u64>,
    targets: Vec<(u64, u32, u32)>,
    pub fail_create_target: bool,
    /// Shared toggle so tests can force compile failures after the backend
    /// has moved into a host core
    pub fail_compile: Arc<AtomicBool>,
}

impl CaptureGpu {
    pub fn new() -> Self {
        Self {
            ops: Arc::new(Mutex::new(Vec::new())),
            next_id: 1,
            textures: Vec::new(),
            targets: Vec::new(),
            fail_create_target: false,
            fail_compile: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared handle to the recorded operation log
    pub fn ops(&self) -> OpLog {
        Arc::clone(&self.ops)
    }

    fn log(&self, op: GpuOp) {
        self.ops.lock().unwrap().push(op);
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Gpu for CaptureGpu {
    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramBindings, ShaderCompileError> {
        if vertex_src.is_empty() || fragment_src.is_empty() {
            return Err(ShaderCompileError {
                stage: "compile",
                log: "empty shader source".into(),
            });
        }
        if self.fail_compile.load(Ordering::SeqCst) {
            return Err(ShaderCompileError {
                stage: "compile",
                log: "forced compile failure".into(),
            });
        }
        self.log(GpuOp::CompileProgram);
        Ok(ProgramBindings {
            program: ProgramId(1),
            position: 0,
            tex_coordinate: 1,
            mvp_matrix: UniformLocation(0),
            texture_transform: UniformLocation(1),
            sampler_unit: UniformLocation(2),
        })
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GraphicsError> {
        let id = self.alloc_id();
        self.textures.push(id);
        self.log(GpuOp::CreateTexture { id, width, height });
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), GraphicsError> {
        if !self.textures.contains(&texture.0) {
            return Err(GraphicsError::new("destroy texture", "unknown texture"));
        }
        self.textures.retain(|&id| id != texture.0);
        self.log(GpuOp::DestroyTexture { id: texture.0 });
        Ok(())
    }

    fn accept_frame(
        &mut self,
        texture: TextureId,
        _data: &[u8],
        width: u32,
        height: u32,
        _stride: u32,
    ) -> Result<(), GraphicsError> {
        if !self.textures.contains(&texture.0) {
            return Err(GraphicsError::new("accept frame", "unknown texture"));
        }
        self.log(GpuOp::AcceptFrame {
            texture: texture.0,
            width,
            height,
        });
        Ok(())
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, GraphicsError> {
        if self.fail_create_target {
            return Err(GraphicsError::new("create target", "forced failure"));
        }
        let id = self.alloc_id();
        self.targets.push((id, width, height));
        self.log(GpuOp::CreateTarget { id, width, height });
        Ok(TargetId(id))
    }

    fn destroy_target(&mut self, target: TargetId) -> Result<(), GraphicsError> {
        if !self.targets.iter().any(|&(id, _, _)| id == target.0) {
            return Err(GraphicsError::new("destroy target", "unknown target"));
        }
        self.targets.retain(|&(id, _, _)| id != target.0);
        self.log(GpuOp::DestroyTarget { id: target.0 });
        Ok(())
    }

    fn make_current(&mut self, target: TargetId) -> Result<(), GraphicsError> {
        if !self.targets.iter().any(|&(id, _, _)| id == target.0) {
            return Err(GraphicsError::new("make current", "unknown target"));
        }
        self.log(GpuOp::MakeCurrent { target: target.0 });
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        self.log(GpuOp::SetViewport { width, height });
        Ok(())
    }

    fn use_program(&mut self, _program: ProgramId) -> Result<(), GraphicsError> {
        self.log(GpuOp::UseProgram);
        Ok(())
    }

    fn set_matrix(
        &mut self,
        location: UniformLocation,
        matrix: &Mat4,
    ) -> Result<(), GraphicsError> {
        self.log(GpuOp::SetMatrix {
            location: location.0,
            matrix: *matrix,
        });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<(), GraphicsError> {
        if !self.textures.contains(&texture.0) {
            return Err(GraphicsError::new("bind texture", "unknown texture"));
        }
        self.log(GpuOp::BindTexture {
            unit,
            texture: texture.0,
        });
        Ok(())
    }

    fn draw_quad(&mut self) -> Result<(), GraphicsError> {
        self.log(GpuOp::DrawQuad);
        Ok(())
    }

    fn present(&mut self, target: TargetId) -> Result<(), GraphicsError> {
        if !self.targets.iter().any(|&(id, _, _)| id == target.0) {
            return Err(GraphicsError::new("present", "unknown target"));
        }
        self.log(GpuOp::Present { target: target.0 });
        Ok(())
    }

    fn read_back(&mut self, target: TargetId) -> Result<Vec<u8>, GraphicsError> {
        let Some(&(id, width, height)) = self
            .targets
            .iter()
            .find(|&&(id, _, _)| id == target.0)
        else {
            return Err(GraphicsError::new("read back", "unknown target"));
        };
        self.log(GpuOp::ReadBack { target: id });
        Ok(vec![0u8; (width * height * 4) as usize])
    }

    fn strict_error_checking(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Initialize { path: PathBuf, width: u32, height: u32, orientation_hint: i32 },
    Start,
    Stop,
    PushFrame { width: u32, height: u32, bytes: usize },
}

pub type SinkLog = Arc<Mutex<Vec<SinkCall>>>;

/// Recorder sink double implementing the session protocol in memory.
pub struct MockSink {
    calls: SinkLog,
    session_path: Option<PathBuf>,
    recording: bool,
    pub fail_start: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            session_path: None,
            recording: false,
            fail_start: false,
        }
    }

    pub fn calls(&self) -> SinkLog {
        Arc::clone(&self.calls)
    }
}

impl RecordingSink for MockSink {
    fn initialize(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> Result<(), RecorderInitError> {
        if self.session_path.is_some() {
            return Err(RecorderInitError::SessionActive);
        }
        if width == 0 || height == 0 {
            return Err(RecorderInitError::UnsupportedSize { width, height });
        }
        self.calls.lock().unwrap().push(SinkCall::Initialize {
            path: path.to_path_buf(),
            width,
            height,
            orientation_hint,
        });
        self.session_path = Some(path.to_path_buf());
        Ok(())
    }

    fn start(&mut self) -> bool {
        if self.fail_start || self.session_path.is_none() || self.recording {
            return false;
        }
        self.calls.lock().unwrap().push(SinkCall::Start);
        self.recording = true;
        true
    }

    fn stop(&mut self) -> Result<PathBuf, IllegalSessionState> {
        if !self.recording {
            // Release whatever half-configured state exists anyway
            self.session_path = None;
            return Err(IllegalSessionState("not recording".into()));
        }
        self.calls.lock().unwrap().push(SinkCall::Stop);
        self.recording = false;
        Ok(self.session_path.take().unwrap_or_default())
    }

    fn push_frame(&mut self, rgba: &[u8], width: u32, height: u32) {
        self.calls.lock().unwrap().push(SinkCall::PushFrame {
            width,
            height,
            bytes: rgba.len(),
        });
    }
}
