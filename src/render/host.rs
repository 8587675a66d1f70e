// SPDX-License-Identifier: MPL-2.0

//! Render-thread surface host
//!
//! One dedicated thread owns the GPU context and executes every draw,
//! consume, and surface-lifecycle operation. It is fed by a message queue
//! from the other threads: producer wake-ups from the camera callback and
//! the watermark timer, and control messages from the UI thread. All
//! notifications accumulated since the last tick are drained before the next
//! draw, so a burst of producer frames still costs one tick.
//!
//! Every tick renders the composite to the onscreen preview target;  while a
//! recording session is active the same tick renders it a second time at the
//! recording resolution and feeds the result to the encoder sink. The two
//! passes are strictly sequential because both share the one GPU context.

use crate::errors::GraphicsError;
use crate::recording::{RecordingSession, RecordingSink, clamp_recording_size};
use crate::render::compositor::Compositor;
use crate::render::gpu::{Gpu, TargetId};
use crate::render::shader::ShaderPipeline;
use crate::render::texture_source::{FrameNotifier, Layer, TextureSource};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Host surface lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Uninitialized,
    ContextReady,
    SurfaceBound,
    Destroyed,
}

/// Messages delivered to the render thread.
#[derive(Debug)]
pub enum HostEvent {
    SurfaceCreated { width: u32, height: u32 },
    SurfaceChanged { width: u32, height: u32 },
    SurfaceDestroyed,
    /// A producer signalled a new frame; payloads travel through the texture
    /// source queues, this only wakes the loop
    FrameAvailable(Layer),
    SetCameraFormat { width: u32, height: u32 },
    SetScreenRotation { degrees: f32 },
    SetMirrorCamera { mirror: bool },
    StartRecording {
        path: PathBuf,
        width: u32,
        height: u32,
        orientation_hint: i32,
        reply: oneshot::Sender<bool>,
    },
    StopRecording { reply: oneshot::Sender<bool> },
    Shutdown,
}

/// Producer handles delivered to the controller once the context is ready
pub struct SourceHandles {
    pub camera: FrameNotifier,
    pub overlay: FrameNotifier,
}

/// Callback fired once the GPU context and shader pipeline exist
pub type ReadyCallback = Box<dyn FnOnce(SourceHandles) + Send>;

/// Render-loop wake-up invoked by producer notifications
pub type WakeFn = Arc<dyn Fn(Layer) + Send + Sync>;

/// One render destination for a tick
#[derive(Debug, Clone, Copy)]
struct RenderPass {
    target: TargetId,
    width: u32,
    height: u32,
    /// Read the result back and feed it to the recording sink
    feed_sink: bool,
}

struct ActiveRecording {
    session: RecordingSession,
    target: TargetId,
}

/// Single-threaded host core, generic over the GPU backend so tests can
/// drive it synchronously against a capturing mock.
pub struct HostCore<G: Gpu> {
    gpu: G,
    sink: Box<dyn RecordingSink>,
    state: HostState,
    on_ready: Option<ReadyCallback>,
    wake: WakeFn,
    compositor: Option<Compositor>,
    onscreen: Option<TargetId>,
    screen_size: (u32, u32),
    recording: Option<ActiveRecording>,
    needs_draw: bool,
}

impl<G: Gpu> HostCore<G> {
    pub fn new(gpu: G, sink: Box<dyn RecordingSink>, on_ready: ReadyCallback, wake: WakeFn) -> Self {
        Self {
            gpu,
            sink,
            state: HostState::Uninitialized,
            on_ready: Some(on_ready),
            wake,
            compositor: None,
            onscreen: None,
            screen_size: (0, 0),
            recording: None,
            needs_draw: false,
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }

    /// Whether a recording session is active right now
    pub fn recording_active(&self) -> bool {
        self.recording.as_ref().is_some_and(|r| r.session.active)
    }

    /// Handle one control event. Frame wake-ups only mark the tick flag;
    /// [`Self::tick_if_needed`] performs the coalesced draw afterwards.
    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::SurfaceCreated { width, height } => {
                if let Err(e) = self.surface_created(width, height) {
                    error!(error = %e, "Surface creation failed");
                }
            }
            HostEvent::SurfaceChanged { width, height } => self.surface_changed(width, height),
            HostEvent::SurfaceDestroyed => self.surface_destroyed(),
            HostEvent::FrameAvailable(_layer) => {
                self.needs_draw = true;
            }
            HostEvent::SetCameraFormat { width, height } => {
                if let Some(compositor) = self.compositor.as_mut() {
                    compositor.set_preview_size(width, height);
                }
            }
            HostEvent::SetScreenRotation { degrees } => {
                if let Some(compositor) = self.compositor.as_mut() {
                    compositor.set_screen_rotation(degrees);
                }
            }
            HostEvent::SetMirrorCamera { mirror } => {
                if let Some(compositor) = self.compositor.as_mut() {
                    compositor.set_mirror_camera(mirror);
                }
            }
            HostEvent::StartRecording {
                path,
                width,
                height,
                orientation_hint,
                reply,
            } => {
                let started = self.start_recording(path, width, height, orientation_hint);
                let _ = reply.send(started);
            }
            HostEvent::StopRecording { reply } => {
                let stopped = self.stop_recording();
                let _ = reply.send(stopped);
            }
            HostEvent::Shutdown => {
                self.surface_destroyed();
            }
        }
    }

    /// Draw once if any frame notification arrived since the last tick
    pub fn tick_if_needed(&mut self) {
        if !self.needs_draw {
            return;
        }
        self.needs_draw = false;
        if self.state != HostState::SurfaceBound {
            return;
        }
        if let Err(e) = self.tick() {
            if self.gpu.strict_error_checking() {
                // Strict-mode GPU failures are fatal to the render session
                error!(error = %e, "GPU error during tick, tearing down");
                self.surface_destroyed();
            } else {
                warn!(error = %e, "GPU error during tick");
            }
        }
    }

    fn surface_created(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if self.state == HostState::Destroyed || self.state == HostState::SurfaceBound {
            warn!(state = ?self.state, "Ignoring surface creation in current state");
            return Ok(());
        }

        // A retry after a failed shader compile still holds the old target
        if let Some(stale) = self.onscreen.take() {
            let _ = self.gpu.destroy_target(stale);
        }
        let onscreen = self.gpu.create_target(width, height)?;
        self.onscreen = Some(onscreen);
        self.screen_size = (width, height);
        self.state = HostState::ContextReady;

        let shader = match ShaderPipeline::compile_default(&mut self.gpu) {
            Ok(shader) => shader,
            Err(e) => {
                error!(log = %e, "Shader compilation failed");
                return Err(GraphicsError::new("compile shader program", e.log));
            }
        };

        // Texture sources exist only once a texture id space exists
        let camera_wake = Arc::clone(&self.wake);
        let overlay_wake = Arc::clone(&self.wake);
        let (camera, camera_notifier) =
            TextureSource::new(Layer::Camera, Arc::new(move || camera_wake(Layer::Camera)));
        let (overlay, overlay_notifier) =
            TextureSource::new(Layer::Overlay, Arc::new(move || overlay_wake(Layer::Overlay)));
        let mut compositor = Compositor::new(shader, camera, overlay);
        compositor.set_screen_size(width, height);
        self.compositor = Some(compositor);
        self.state = HostState::SurfaceBound;

        info!(width, height, "Render context ready");
        if let Some(on_ready) = self.on_ready.take() {
            on_ready(SourceHandles {
                camera: camera_notifier,
                overlay: overlay_notifier,
            });
        }
        Ok(())
    }

    fn surface_changed(&mut self, width: u32, height: u32) {
        // Viewport-only change; the context survives
        self.screen_size = (width, height);
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.set_screen_size(width, height);
        }
        debug!(width, height, "Surface resized");
    }

    fn surface_destroyed(&mut self) {
        if self.state == HostState::Destroyed {
            return;
        }
        // Producers must be detached before the context goes away
        if let Some(mut compositor) = self.compositor.take() {
            compositor.release(&mut self.gpu);
        }
        if let Some(rec) = self.recording.take() {
            if rec.session.active {
                if let Err(e) = self.sink.stop() {
                    warn!(error = %e, "Recorder stop during teardown failed");
                }
            }
            let _ = self.gpu.destroy_target(rec.target);
        }
        if let Some(onscreen) = self.onscreen.take() {
            let _ = self.gpu.destroy_target(onscreen);
        }
        self.state = HostState::Destroyed;
        info!("Render context destroyed");
    }

    /// Targets to render this tick: preview always, recording while active.
    fn passes_for_tick(&self) -> Vec<RenderPass> {
        let mut passes = Vec::with_capacity(2);
        if let Some(onscreen) = self.onscreen {
            passes.push(RenderPass {
                target: onscreen,
                width: self.screen_size.0,
                height: self.screen_size.1,
                feed_sink: false,
            });
        }
        // Session snapshot taken here, once per tick; a stop arriving
        // mid-tick takes effect at the next tick boundary
        if let Some(rec) = self.recording.as_ref() {
            if rec.session.active {
                passes.push(RenderPass {
                    target: rec.target,
                    width: rec.session.width,
                    height: rec.session.height,
                    feed_sink: true,
                });
            }
        }
        passes
    }

    fn tick(&mut self) -> Result<(), GraphicsError> {
        let passes = self.passes_for_tick();
        let two_pass = passes.len() > 1;
        for pass in &passes {
            self.gpu.make_current(pass.target)?;
            self.gpu.set_viewport(pass.width, pass.height)?;
            if let Some(compositor) = self.compositor.as_mut() {
                compositor.draw(&mut self.gpu)?;
            }
            self.gpu.present(pass.target)?;
            if pass.feed_sink {
                let rgba = self.gpu.read_back(pass.target)?;
                self.sink.push_frame(&rgba, pass.width, pass.height);
            }
        }
        // Restore onscreen state after the recording pass
        if two_pass {
            if let Some(onscreen) = self.onscreen {
                self.gpu.make_current(onscreen)?;
                self.gpu.set_viewport(self.screen_size.0, self.screen_size.1)?;
            }
        }
        Ok(())
    }

    fn start_recording(
        &mut self,
        path: PathBuf,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> bool {
        if self.state != HostState::SurfaceBound {
            warn!("Cannot start recording without a bound surface");
            return false;
        }
        if self.recording.is_some() {
            warn!("Recording already active");
            return false;
        }

        let (width, height) = clamp_recording_size(width, height);
        if let Err(e) = self.sink.initialize(&path, width, height, orientation_hint) {
            warn!(error = %e, "Recorder initialization failed");
            return false;
        }

        let target = match self.gpu.create_target(width, height) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Failed to create recording target");
                let _ = self.sink.stop();
                return false;
            }
        };

        if !self.sink.start() {
            warn!("Recorder failed to start");
            let _ = self.gpu.destroy_target(target);
            let _ = self.sink.stop();
            return false;
        }

        info!(path = %path.display(), width, height, "Recording session active");
        self.recording = Some(ActiveRecording {
            session: RecordingSession {
                output_path: path,
                width,
                height,
                orientation_hint,
                active: true,
            },
            target,
        });
        true
    }

    fn stop_recording(&mut self) -> bool {
        let Some(rec) = self.recording.take() else {
            debug!("Stop requested while not recording");
            return false;
        };
        // Target goes first so no further pass can draw into it
        let _ = self.gpu.destroy_target(rec.target);
        match self.sink.stop() {
            Ok(path) => {
                info!(path = %path.display(), "Recording session stopped");
                true
            }
            Err(e) => {
                // Resources are already released on the sink side
                warn!(error = %e, "Recorder stop failed");
                false
            }
        }
    }
}

/// Control handle for the render thread, clonable across the UI and
/// producer threads.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostHandle {
    pub fn on_surface_created(&self, width: u32, height: u32) {
        let _ = self.tx.send(HostEvent::SurfaceCreated { width, height });
    }

    pub fn on_surface_changed(&self, width: u32, height: u32) {
        let _ = self.tx.send(HostEvent::SurfaceChanged { width, height });
    }

    pub fn on_surface_destroyed(&self) {
        let _ = self.tx.send(HostEvent::SurfaceDestroyed);
    }

    pub fn set_camera_format(&self, width: u32, height: u32) {
        let _ = self.tx.send(HostEvent::SetCameraFormat { width, height });
    }

    pub fn set_screen_rotation(&self, degrees: f32) {
        let _ = self.tx.send(HostEvent::SetScreenRotation { degrees });
    }

    pub fn set_mirror_camera(&self, mirror: bool) {
        let _ = self.tx.send(HostEvent::SetMirrorCamera { mirror });
    }

    /// Start a recording session. Blocks the calling thread until the render
    /// thread replies; returns false without altering state on any failure.
    pub fn start_recording(
        &self,
        path: PathBuf,
        width: u32,
        height: u32,
        orientation_hint: i32,
    ) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(HostEvent::StartRecording {
                path,
                width,
                height,
                orientation_hint,
                reply,
            })
            .is_err()
        {
            return false;
        }
        rx.blocking_recv().unwrap_or(false)
    }

    /// Stop the active recording session; false when none is active
    pub fn stop_recording(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HostEvent::StopRecording { reply }).is_err() {
            return false;
        }
        rx.blocking_recv().unwrap_or(false)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(HostEvent::Shutdown);
    }
}

/// Render thread wrapper around [`HostCore`].
pub struct SurfaceHost {
    handle: HostHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SurfaceHost {
    /// Spawn the render thread.
    ///
    /// `on_ready` fires on the render thread once the context and shader
    /// pipeline exist, handing over both producer notifiers.
    pub fn spawn<G: Gpu + Send + 'static>(
        gpu: G,
        sink: Box<dyn RecordingSink>,
        on_ready: ReadyCallback,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<HostEvent>();
        let handle = HostHandle { tx: tx.clone() };

        // Producer wake-ups are ordinary events in the same queue
        let wake_tx = tx;
        let wake: WakeFn = Arc::new(move |layer| {
            let _ = wake_tx.send(HostEvent::FrameAvailable(layer));
        });

        let thread = std::thread::spawn(move || {
            let mut core = HostCore::new(gpu, sink, on_ready, wake);
            'run: while let Some(first) = rx.blocking_recv() {
                let shutdown = matches!(first, HostEvent::Shutdown);
                core.handle_event(first);
                if shutdown {
                    break 'run;
                }
                // Drain everything queued since the last tick so a burst
                // of notifications coalesces into one draw
                while let Ok(event) = rx.try_recv() {
                    let shutdown = matches!(event, HostEvent::Shutdown);
                    core.handle_event(event);
                    if shutdown {
                        break 'run;
                    }
                }
                core.tick_if_needed();
            }
            debug!("Render thread exiting");
        });

        Self {
            handle,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Request shutdown and join the render thread
    pub fn join(mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SurfaceHost {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
