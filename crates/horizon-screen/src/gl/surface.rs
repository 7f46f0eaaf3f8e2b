//! EGL surfaces: per-window surfaces that follow the window size, and
//! offscreen surfaces.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use horizon_screen_core::native::egl::{ConfigId, EglApi, SurfaceId};
use horizon_screen_core::{ScreenApi, Size, Usage, WindowHandle, WindowProperty};
use parking_lot::Mutex;

use super::SurfaceFormat;
use crate::buffer::{BufferAllocation, BufferRequest};
use crate::error::CheckNative;
use crate::logging::targets;

struct LiveSurface {
    surface: Option<SurfaceId>,
    buffers: BufferAllocation,
}

/// The EGL side of a GL-backed window.
///
/// Geometry changes only record the requested buffer size and raise a flag;
/// the EGL surface is recreated lazily on the next
/// [`GlContext::make_current`](super::GlContext::make_current).
pub struct GlWindowSurface {
    egl: Arc<dyn EglApi>,
    api: Arc<dyn ScreenApi>,
    window: WindowHandle,
    format: SurfaceFormat,
    alpha_buffer_size: i32,
    buffer_count: usize,
    requested_size: Mutex<Size>,
    new_surface_requested: AtomicBool,
    live: Mutex<LiveSurface>,
}

impl GlWindowSurface {
    pub(crate) fn new(
        egl: Arc<dyn EglApi>,
        api: Arc<dyn ScreenApi>,
        window: WindowHandle,
        format: SurfaceFormat,
        initial_size: Size,
        buffer_count: usize,
    ) -> Self {
        Self {
            egl,
            api,
            window,
            alpha_buffer_size: format.alpha_size,
            format,
            buffer_count,
            requested_size: Mutex::new(initial_size),
            new_surface_requested: AtomicBool::new(true),
            live: Mutex::new(LiveSurface {
                surface: None,
                buffers: BufferAllocation::default(),
            }),
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn format(&self) -> &SurfaceFormat {
        &self.format
    }

    pub fn requested_size(&self) -> Size {
        *self.requested_size.lock()
    }

    /// The live EGL surface, if one has been created.
    pub fn surface(&self) -> Option<SurfaceId> {
        self.live.lock().surface
    }

    pub fn is_new_surface_requested(&self) -> bool {
        self.new_surface_requested.load(Ordering::Acquire)
    }

    /// Record a new window size. The surface follows on next use.
    pub(crate) fn request_size(&self, size: Size) {
        let mut requested = self.requested_size.lock();
        if *requested == size {
            return;
        }
        *requested = size;
        self.new_surface_requested.store(true, Ordering::Release);
        tracing::trace!(target: targets::GL, window = %self.window, %size, "new surface requested");
    }

    /// Return a surface matching the requested size, recreating it if needed.
    pub(crate) fn ensure_surface(&self, config: ConfigId) -> Option<SurfaceId> {
        if self
            .new_surface_requested
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Held until the surface exists, so a concurrent resize lands
            // either before or after this recreation, never in the middle.
            let requested = self.requested_size.lock();
            let mut live = self.live.lock();

            if live.buffers.size() != Some(requested.non_empty()) || live.surface.is_none() {
                if let Some(old) = live.surface.take() {
                    self.destroy_surface(old);
                }
                self.create_surface(&mut live, *requested, config);
            } else {
                tracing::trace!(
                    target: targets::GL,
                    window = %self.window,
                    "size returned to the live surface size, keeping it"
                );
            }
        }
        self.live.lock().surface
    }

    fn create_surface(&self, live: &mut LiveSurface, size: Size, config: ConfigId) {
        self.api
            .set_window_property(self.window, WindowProperty::Usage(Usage::OpenGlEs2))
            .or_fatal("failed to set window usage");

        if size.is_empty() {
            tracing::warn!(
                target: targets::GL,
                window = %self.window,
                "refusing to create an empty EGL surface; give the window a size before making a context current"
            );
            return;
        }

        live.buffers.apply(
            self.api.as_ref(),
            self.window,
            &BufferRequest {
                size,
                format: self.format.pixel_format(),
                alpha_buffer_size: self.alpha_buffer_size,
                count: self.buffer_count,
            },
        );

        match self.egl.create_window_surface(config, self.window) {
            Ok(surface) => {
                tracing::debug!(target: targets::GL, window = %self.window, %surface, %size, "EGL window surface created");
                live.surface = Some(surface);
            }
            Err(err) => {
                tracing::warn!(target: targets::GL, window = %self.window, %err, "failed to create EGL window surface");
            }
        }
    }

    fn destroy_surface(&self, surface: SurfaceId) {
        // Unbind first: destroying a bound surface is deferred by EGL.
        if self.egl.current().draw == Some(surface) {
            self.egl
                .make_current(None, None)
                .or_warn("failed to release current EGL surface");
        }
        self.egl
            .destroy_surface(surface)
            .or_warn("failed to destroy EGL surface");
        tracing::debug!(target: targets::GL, window = %self.window, %surface, "EGL window surface destroyed");
    }
}

impl Drop for GlWindowSurface {
    fn drop(&mut self) {
        if let Some(surface) = self.live.get_mut().surface.take() {
            self.destroy_surface(surface);
        }
    }
}

impl std::fmt::Debug for GlWindowSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlWindowSurface")
            .field("window", &self.window)
            .field("requested_size", &self.requested_size())
            .field("surface", &self.surface())
            .finish_non_exhaustive()
    }
}

/// A surface for rendering without a window.
pub struct OffscreenSurface {
    egl: Arc<dyn EglApi>,
    kind: OffscreenKind,
    size: Size,
    format: SurfaceFormat,
}

/// How an offscreen surface is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenKind {
    Pbuffer(SurfaceId),
    /// No drawable at all; contexts bind without a surface.
    Surfaceless,
}

impl OffscreenSurface {
    pub(crate) fn pbuffer(
        egl: Arc<dyn EglApi>,
        surface: SurfaceId,
        size: Size,
        format: SurfaceFormat,
    ) -> Self {
        Self {
            egl,
            kind: OffscreenKind::Pbuffer(surface),
            size,
            format,
        }
    }

    pub(crate) fn surfaceless(egl: Arc<dyn EglApi>, size: Size, format: SurfaceFormat) -> Self {
        Self {
            egl,
            kind: OffscreenKind::Surfaceless,
            size,
            format,
        }
    }

    pub fn kind(&self) -> OffscreenKind {
        self.kind
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> &SurfaceFormat {
        &self.format
    }

    /// The EGL surface to bind, `None` for a surfaceless binding.
    pub fn surface(&self) -> Option<SurfaceId> {
        match self.kind {
            OffscreenKind::Pbuffer(surface) => Some(surface),
            OffscreenKind::Surfaceless => None,
        }
    }
}

impl Drop for OffscreenSurface {
    fn drop(&mut self) {
        if let OffscreenKind::Pbuffer(surface) = self.kind {
            if self.egl.current().draw == Some(surface) {
                self.egl
                    .make_current(None, None)
                    .or_warn("failed to release current pbuffer");
            }
            self.egl
                .destroy_surface(surface)
                .or_warn("failed to destroy pbuffer surface");
        }
    }
}

impl std::fmt::Debug for OffscreenSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffscreenSurface")
            .field("kind", &self.kind)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
