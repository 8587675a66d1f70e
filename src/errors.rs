// SPDX-License-Identifier: MPL-2.0

//! Error types for the watermark camera pipeline

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// GPU call failure
    Graphics(GraphicsError),
    /// Shader compile/link failure
    Shader(ShaderCompileError),
    /// Recorder configuration rejected
    RecorderInit(RecorderInitError),
    /// Recording control-protocol misuse
    Session(IllegalSessionState),
    /// Camera producer setup failure
    Camera(CameraError),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// A GPU operation failed.
///
/// Only raised when strict error checking is enabled on the backend; with
/// checking disabled the failing operation is not inspected at all.
#[derive(Debug, Clone)]
pub struct GraphicsError {
    /// Name of the failing operation (e.g. "bind camera texture")
    pub operation: &'static str,
    /// Driver/validation detail for the failure
    pub detail: String,
}

impl GraphicsError {
    pub fn new(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            detail: detail.into(),
        }
    }
}

/// Shader compilation or linking failed; carries the compiler log.
#[derive(Debug, Clone)]
pub struct ShaderCompileError {
    /// Which stage failed ("vertex", "fragment" or "link")
    pub stage: &'static str,
    /// Full compiler/validator log
    pub log: String,
}

/// The encoder rejected the requested recording configuration.
#[derive(Debug, Clone)]
pub enum RecorderInitError {
    /// Requested dimensions cannot be encoded (e.g. 0x0)
    UnsupportedSize { width: u32, height: u32 },
    /// No usable H.264 encoder on this system
    EncoderNotAvailable(String),
    /// Pipeline element creation or linking failed
    PipelineSetup(String),
    /// A session is already configured; stop it first
    SessionActive,
}

/// Recording control protocol misuse (e.g. stop without start).
#[derive(Debug, Clone)]
pub struct IllegalSessionState(pub String);

/// Camera producer errors (out of core scope, reported upstream)
#[derive(Debug, Clone)]
pub enum CameraError {
    /// Capture pipeline could not be constructed
    InitializationFailed(String),
    /// Capture pipeline failed while running
    PipelineError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Graphics(e) => write!(f, "Graphics error: {}", e),
            AppError::Shader(e) => write!(f, "Shader error: {}", e),
            AppError::RecorderInit(e) => write!(f, "Recorder init error: {}", e),
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.detail)
    }
}

impl fmt::Display for ShaderCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shader stage failed:\n{}", self.stage, self.log)
    }
}

impl fmt::Display for RecorderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderInitError::UnsupportedSize { width, height } => {
                write!(f, "unsupported recording size {}x{}", width, height)
            }
            RecorderInitError::EncoderNotAvailable(msg) => {
                write!(f, "no usable encoder: {}", msg)
            }
            RecorderInitError::PipelineSetup(msg) => write!(f, "pipeline setup failed: {}", msg),
            RecorderInitError::SessionActive => {
                write!(f, "a recording session is already configured")
            }
        }
    }
}

impl fmt::Display for IllegalSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal session state: {}", self.0)
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::InitializationFailed(msg) => write!(f, "initialization failed: {}", msg),
            CameraError::PipelineError(msg) => write!(f, "pipeline error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for ShaderCompileError {}
impl std::error::Error for RecorderInitError {}
impl std::error::Error for IllegalSessionState {}
impl std::error::Error for CameraError {}

// Conversions from sub-errors to AppError
impl From<GraphicsError> for AppError {
    fn from(err: GraphicsError) -> Self {
        AppError::Graphics(err)
    }
}

impl From<ShaderCompileError> for AppError {
    fn from(err: ShaderCompileError) -> Self {
        AppError::Shader(err)
    }
}

impl From<RecorderInitError> for AppError {
    fn from(err: RecorderInitError) -> Self {
        AppError::RecorderInit(err)
    }
}

impl From<IllegalSessionState> for AppError {
    fn from(err: IllegalSessionState) -> Self {
        AppError::Session(err)
    }
}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}
