//! The integration entry point.
//!
//! [`Integration`] wires a compositor ([`ScreenApi`]) and optionally an EGL
//! driver ([`EglApi`]) into a [`WindowSystem`], starts the event pump, and
//! exposes the operations the toolkit drives: window management, raster
//! posting, GL binding and event dispatch.
//!
//! ```
//! use std::sync::Arc;
//!
//! use horizon_screen::{Integration, IntegrationOptions, WindowRequest};
//! use horizon_screen_core::Rect;
//! use horizon_screen_core::headless::HeadlessScreen;
//!
//! let native = Arc::new(HeadlessScreen::new());
//! let mut integration = Integration::new(native, None, IntegrationOptions::default()).unwrap();
//! let window = integration
//!     .create_window(WindowRequest::raster(Rect::new(0, 0, 320, 240)).visible(true))
//!     .unwrap();
//! assert!(integration.system().is_effectively_visible(window));
//! integration.shutdown();
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use horizon_screen_core::native::egl::{
    ConfigId, ContextId, EglApi, SURFACELESS_CONTEXT_EXTENSION, SurfaceKind,
};
use horizon_screen_core::{Rect, Region, ScreenApi, Size};

use crate::buffer::Buffer;
use crate::error::{ScreenError, ScreenResult};
use crate::event_handler::ScreenEventHandler;
use crate::event_thread::EventThread;
use crate::events::WindowSystemEvent;
use crate::gl::{ContextSettings, GlContext, OffscreenSurface, SurfaceFormat, SurfaceTarget};
use crate::logging::targets;
use crate::options::IntegrationOptions;
use crate::screen::ScreenId;
use crate::system::WindowSystem;
use crate::window::{WindowId, WindowRequest, WindowState};

/// The platform integration for one compositor connection.
pub struct Integration {
    event_thread: EventThread,
    handler: ScreenEventHandler,
    system: WindowSystem,
    egl: Option<Arc<dyn EglApi>>,
}

impl Integration {
    /// Connect to the compositor, start the event pump and create a screen
    /// for the primary display and every attached secondary display.
    pub fn new(
        native: Arc<dyn ScreenApi>,
        egl: Option<Arc<dyn EglApi>>,
        options: IntegrationOptions,
    ) -> ScreenResult<Self> {
        let system = WindowSystem::new(native.clone(), egl.clone(), options);
        let options = system.options().clone();
        let event_thread = EventThread::spawn(
            native.clone(),
            system.registry().clone(),
            options.event_channel_capacity,
        );

        let mut this = Self {
            event_thread,
            handler: ScreenEventHandler::new(options.focus_loss_debounce()),
            system,
            egl,
        };

        let displays = native.displays()?;
        if displays.is_empty() {
            return Err(ScreenError::NoDisplays);
        }
        for (index, handle) in displays.into_iter().enumerate() {
            let primary = index == 0;
            if !primary {
                let info = native.display_info(handle)?;
                if !info.attached || info.size.is_empty() {
                    tracing::debug!(target: targets::INTEGRATION, display = %handle, "skipping inactive display");
                    continue;
                }
            }
            this.system.add_screen(handle, primary)?;
        }

        tracing::debug!(
            target: targets::INTEGRATION,
            screens = this.system.screen_ids().count(),
            egl = this.egl.is_some(),
            "integration ready"
        );
        Ok(this)
    }

    pub fn system(&self) -> &WindowSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut WindowSystem {
        &mut self.system
    }

    pub fn options(&self) -> &IntegrationOptions {
        self.system.options()
    }

    pub fn primary_screen(&self) -> Option<ScreenId> {
        self.system.primary_screen()
    }

    pub fn event_handler(&self) -> &ScreenEventHandler {
        &self.handler
    }

    pub fn event_thread(&self) -> &EventThread {
        &self.event_thread
    }

    // =========================================================================
    // Windows
    // =========================================================================

    pub fn create_window(&mut self, request: WindowRequest) -> ScreenResult<WindowId> {
        self.system.create_window(request)
    }

    /// Destroy a window and its subtree.
    pub fn destroy_window(&mut self, id: WindowId) -> ScreenResult<()> {
        let mut subtree = vec![id];
        let mut index = 0;
        while let Some(&window) = subtree.get(index) {
            if let Some(w) = self.system.window(window) {
                subtree.extend_from_slice(w.children());
            }
            index += 1;
        }
        self.system.destroy_window(id)?;
        for window in subtree {
            self.handler.forget_window(window);
        }
        Ok(())
    }

    pub fn set_geometry(&mut self, id: WindowId, rect: Rect) -> ScreenResult<()> {
        self.system.set_geometry(id, rect)
    }

    pub fn set_visible(&mut self, id: WindowId, visible: bool) -> ScreenResult<()> {
        self.system.set_visible(id, visible)
    }

    pub fn set_opacity(&mut self, id: WindowId, level: f64) -> ScreenResult<()> {
        self.system.set_opacity(id, level)
    }

    pub fn set_window_state(&mut self, id: WindowId, state: WindowState) -> ScreenResult<()> {
        self.system.set_window_state(id, state)
    }

    pub fn raise(&mut self, id: WindowId) -> ScreenResult<()> {
        self.system.raise(id)
    }

    pub fn lower(&mut self, id: WindowId) -> ScreenResult<()> {
        self.system.lower(id)
    }

    pub fn set_parent(&mut self, id: WindowId, parent: Option<WindowId>) -> ScreenResult<()> {
        self.system.set_parent(id, parent)
    }

    pub fn request_activate_window(&mut self, id: WindowId) -> ScreenResult<()> {
        self.system.request_activate_window(id)
    }

    pub fn set_screen_rotation(&mut self, screen: ScreenId, rotation: i32) -> ScreenResult<()> {
        self.system.set_screen_rotation(screen, rotation)
    }

    pub fn set_keyboard_height(&mut self, screen: ScreenId, height: i32) -> ScreenResult<()> {
        self.system.set_keyboard_height(screen, height)
    }

    // =========================================================================
    // Raster windows
    // =========================================================================

    pub fn render_buffer(&mut self, id: WindowId) -> ScreenResult<&Buffer> {
        self.system.render_buffer(id)
    }

    pub fn scroll(&mut self, id: WindowId, area: Region, dx: i32, dy: i32) -> ScreenResult<bool> {
        self.system.scroll(id, area, dx, dy)
    }

    pub fn post(&mut self, id: WindowId, dirty: &Region) -> ScreenResult<bool> {
        self.system.post(id, dirty)
    }

    // =========================================================================
    // GL
    // =========================================================================

    fn egl(&self) -> ScreenResult<&Arc<dyn EglApi>> {
        self.egl.as_ref().ok_or(ScreenError::NoEgl)
    }

    fn screen_depth(&self) -> u32 {
        self.system
            .primary_screen()
            .and_then(|id| self.system.screen(id))
            .map_or(self.options().display_depth, |s| s.depth())
    }

    /// Settings every context created here uses.
    pub fn context_settings(&self) -> ContextSettings {
        let options = self.options();
        ContextSettings {
            screen_depth: self.screen_depth(),
            swap_interval_override: options.swap_interval_override,
            allow_surfaceless: options.surfaceless_egl_context,
        }
    }

    /// Create a context. Check [`GlContext::is_valid`] on the result.
    pub fn create_gl_context(
        &self,
        format: SurfaceFormat,
        share: Option<&GlContext>,
    ) -> ScreenResult<GlContext> {
        let egl = self.egl()?.clone();
        Ok(GlContext::new(egl, format, share, &self.context_settings()))
    }

    /// Wrap a context created outside this integration.
    pub fn adopt_gl_context(&self, context: ContextId, config: ConfigId) -> ScreenResult<GlContext> {
        let egl = self.egl()?.clone();
        Ok(GlContext::adopt(egl, context, config, &self.context_settings()))
    }

    /// Create a surface for rendering without a window.
    ///
    /// Uses a surfaceless binding when enabled and supported by the driver,
    /// a pbuffer otherwise.
    pub fn create_offscreen_surface(
        &self,
        format: SurfaceFormat,
        size: Size,
    ) -> ScreenResult<OffscreenSurface> {
        let egl = self.egl()?.clone();
        let format = format.resolve(self.screen_depth());

        if self.options().surfaceless_egl_context
            && egl.has_extension(SURFACELESS_CONTEXT_EXTENSION)
        {
            tracing::trace!(target: targets::GL, %size, "surfaceless offscreen surface");
            return Ok(OffscreenSurface::surfaceless(egl, size, format));
        }

        let config = egl
            .choose_config(&format.config_request(SurfaceKind::Pbuffer))?
            .ok_or(ScreenError::NoConfig)?;
        let surface = egl.create_pbuffer_surface(config, size.non_empty())?;
        tracing::debug!(target: targets::GL, %surface, %size, "pbuffer created");
        Ok(OffscreenSurface::pbuffer(egl, surface, size, format))
    }

    /// Bind `context` to a GL window, recreating its surface if the window
    /// was resized.
    pub fn make_current(&self, context: &mut GlContext, window: WindowId) -> ScreenResult<bool> {
        let surface = self.system.gl_surface(window)?;
        Ok(context.make_current(SurfaceTarget::Window(&surface)))
    }

    pub fn make_current_offscreen(&self, context: &mut GlContext, surface: &OffscreenSurface) -> bool {
        context.make_current(SurfaceTarget::Offscreen(surface))
    }

    pub fn done_current(&self, context: &mut GlContext) {
        context.done_current();
    }

    pub fn swap_buffers(&self, context: &mut GlContext, window: WindowId) -> ScreenResult<bool> {
        let surface = self.system.gl_surface(window)?;
        Ok(context.swap_buffers(SurfaceTarget::Window(&surface)))
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Handle every message the pump has delivered so far, then any expired
    /// timers. Returns the number of native events handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.event_thread.try_recv() {
            self.handler.handle(&mut self.system, message, Instant::now());
            handled += 1;
        }
        self.handler.fire_timers(&mut self.system, Instant::now());
        handled
    }

    /// Wait up to `timeout` for native events or a timer, then process
    /// everything pending.
    pub fn dispatch(&mut self, timeout: Duration) -> usize {
        let now = Instant::now();
        let wait = self
            .handler
            .time_until_next_timer(now)
            .map_or(timeout, |until| until.min(timeout));

        let mut handled = 0;
        if let Some(message) = self.event_thread.recv_timeout(wait) {
            self.handler.handle(&mut self.system, message, Instant::now());
            handled += 1;
        }
        handled + self.process_events()
    }

    /// Drain the toolkit events produced so far.
    pub fn take_events(&mut self) -> Vec<WindowSystemEvent> {
        self.system.take_events()
    }

    /// Stop the event pump. Windows stay alive until the integration drops.
    pub fn shutdown(&mut self) {
        self.event_thread.shutdown();
    }
}

impl Drop for Integration {
    fn drop(&mut self) {
        self.event_thread.shutdown();
        self.system.clear();
        tracing::debug!(target: targets::INTEGRATION, "integration torn down");
    }
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("system", &self.system)
            .field("event_thread", &self.event_thread)
            .field("egl", &self.egl.is_some())
            .finish()
    }
}
