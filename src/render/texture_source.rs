// SPDX-License-Identifier: MPL-2.0

//! Asynchronously updated texture sources
//!
//! A [`TextureSource`] wraps a GPU texture that an external producer (camera
//! pipeline, watermark repaint timer) feeds from its own thread through a
//! [`FrameNotifier`]. The producer side only enqueues; the render thread
//! consumes every pending frame before sampling. Skipping accepted frames
//! would desynchronize the producer's buffer bookkeeping, so a consume always
//! drains the whole queue.

use crate::errors::GraphicsError;
use crate::render::gpu::{Gpu, TextureId};
use crate::render::matrix::Mat4;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Which compositing layer a source feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Camera,
    Overlay,
}

/// One producer frame: shared pixel data plus layout metadata and the
/// sampling transform valid for this frame.
#[derive(Debug, Clone)]
pub struct FramePayload {
    /// RGBA pixel data (shared, never copied between threads)
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes; rows may carry padding beyond `width * 4`
    pub stride: u32,
    /// Texture-coordinate correction for producer buffer layout quirks
    pub transform: Mat4,
}

struct SourceState {
    queue: VecDeque<FramePayload>,
    /// Latest transform recorded at notification time, readable without
    /// waiting for the next consume
    transform: Mat4,
    detached: bool,
}

struct SourceShared {
    state: Mutex<SourceState>,
}

/// Producer-side handle: non-blocking, clonable, safe to call from any
/// thread. Never touches GPU state; it only enqueues and wakes the render
/// thread.
#[derive(Clone)]
pub struct FrameNotifier {
    shared: Arc<SourceShared>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl FrameNotifier {
    /// Record a new frame from the producer thread.
    ///
    /// Increments the pending count by exactly one and records the frame's
    /// sampling transform. Dropped silently once the source is released.
    pub fn notify_new_frame(&self, frame: FramePayload) {
        let mut state = match self.shared.state.lock() {
            Ok(state) => state,
            Err(_) => return,
        };
        if state.detached {
            return;
        }
        state.transform = frame.transform;
        state.queue.push_back(frame);
        drop(state);
        (self.wake)();
    }
}

impl std::fmt::Debug for FrameNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameNotifier").finish_non_exhaustive()
    }
}

/// Render-thread side of a texture source.
///
/// Owns the GPU texture and the last-consumed sampling transform. All
/// methods taking a [`Gpu`] must run on the render thread.
pub struct TextureSource {
    layer: Layer,
    shared: Arc<SourceShared>,
    texture: Option<TextureId>,
    size: (u32, u32),
    transform: Mat4,
    released: bool,
}

impl TextureSource {
    /// Create a source and its producer handle.
    ///
    /// `wake` is invoked once per notification to wake the render loop.
    pub fn new(layer: Layer, wake: Arc<dyn Fn() + Send + Sync>) -> (Self, FrameNotifier) {
        let shared = Arc::new(SourceShared {
            state: Mutex::new(SourceState {
                queue: VecDeque::new(),
                transform: Mat4::IDENTITY,
                detached: false,
            }),
        });
        let notifier = FrameNotifier {
            shared: Arc::clone(&shared),
            wake,
        };
        let source = Self {
            layer,
            shared,
            texture: None,
            size: (0, 0),
            transform: Mat4::IDENTITY,
            released: false,
        };
        (source, notifier)
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Create the backing texture sized for the producer
    pub fn allocate(&mut self, gpu: &mut dyn Gpu, width: u32, height: u32) -> Result<(), GraphicsError> {
        if let Some(texture) = self.texture.take() {
            gpu.destroy_texture(texture)?;
        }
        self.texture = Some(gpu.create_texture(width, height)?);
        self.size = (width, height);
        debug!(layer = ?self.layer, width, height, "Allocated texture source");
        Ok(())
    }

    /// Number of producer notifications not yet consumed
    pub fn pending_updates(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| state.queue.len())
            .unwrap_or(0)
    }

    /// Apply every pending producer frame to the GPU texture.
    ///
    /// Exactly one accept operation per outstanding notification; the pending
    /// count is zero afterwards. Reallocates the texture when the producer
    /// dimensions change. After release this is a silent no-op.
    pub fn consume_pending(&mut self, gpu: &mut dyn Gpu) -> Result<usize, GraphicsError> {
        if self.released {
            return Ok(0);
        }
        let frames: Vec<FramePayload> = {
            let mut state = match self.shared.state.lock() {
                Ok(state) => state,
                Err(_) => return Ok(0),
            };
            state.queue.drain(..).collect()
        };
        let consumed = frames.len();
        for frame in frames {
            if self.texture.is_none() || self.size != (frame.width, frame.height) {
                self.allocate(gpu, frame.width, frame.height)?;
            }
            let Some(texture) = self.texture else {
                continue;
            };
            gpu.accept_frame(texture, &frame.data, frame.width, frame.height, frame.stride)?;
            self.transform = frame.transform;
        }
        Ok(consumed)
    }

    /// Sampling transform of the last consumed frame; identity before the
    /// first consume
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Detach the producer and free the texture.
    ///
    /// Safe only while the owning render context is current; later notify
    /// calls are dropped and later consumes are no-ops.
    pub fn release(&mut self, gpu: &mut dyn Gpu) {
        if self.released {
            return;
        }
        if let Ok(mut state) = self.shared.state.lock() {
            state.detached = true;
            state.queue.clear();
        }
        if let Some(texture) = self.texture.take() {
            if let Err(e) = gpu.destroy_texture(texture) {
                warn!(layer = ?self.layer, error = %e, "Failed to destroy texture on release");
            }
        }
        self.released = true;
        debug!(layer = ?self.layer, "Released texture source");
    }
}

impl std::fmt::Debug for TextureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureSource")
            .field("layer", &self.layer)
            .field("texture", &self.texture)
            .field("size", &self.size)
            .field("released", &self.released)
            .finish()
    }
}
