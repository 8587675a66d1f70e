// SPDX-License-Identifier: MPL-2.0

//! Real-time compositing pipeline: texture sources, shader pipeline,
//! compositor, surface host, and the GPU backends behind them.

pub mod compositor;
pub mod gpu;
pub mod host;
pub mod matrix;
pub mod shader;
pub mod texture_source;
pub mod wgpu_backend;

pub use compositor::Compositor;
pub use gpu::Gpu;
pub use host::{HostCore, HostEvent, HostHandle, HostState, SourceHandles, SurfaceHost};
pub use shader::ShaderPipeline;
pub use texture_source::{FrameNotifier, FramePayload, Layer, TextureSource};
pub use wgpu_backend::WgpuBackend;
