use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;

use super::HeadlessScreen;
use crate::error::{NativeError, NativeResult};
use crate::geometry::Size;
use crate::native::ScreenApi;
use crate::native::WindowHandle;
use crate::native::egl::{
    ConfigAttributes, ConfigId, ConfigRequest, ContextAttributes, ContextId, CurrentBinding,
    DONT_CARE, EglApi, SURFACELESS_CONTEXT_EXTENSION, SurfaceId,
};

// EGL error codes
const EGL_BAD_MATCH: i32 = 0x3009;
const EGL_BAD_SURFACE: i32 = 0x300D;
const EGL_BAD_ALLOC: i32 = 0x3003;

/// Call counters for the headless EGL driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EglStats {
    pub make_current_calls: usize,
    pub contexts_created: usize,
    pub contexts_destroyed: usize,
    pub surfaces_created: usize,
    pub surfaces_destroyed: usize,
    pub swaps: usize,
    /// Every interval passed to `swap_interval`, in order.
    pub swap_intervals: Vec<i32>,
}

enum SurfaceBacking {
    Window(WindowHandle),
    Pbuffer(Size),
}

struct EglState {
    next_id: u64,
    contexts: HashMap<ContextId, ConfigId>,
    surfaces: HashMap<SurfaceId, SurfaceBacking>,
    bindings: HashMap<ThreadId, CurrentBinding>,
    stats: EglStats,
    fail_context_creation: bool,
}

/// An in-memory EGL driver bound to a [`HeadlessScreen`].
///
/// Offers two configs: RGBA8888 with depth/stencil and RGB565. Window
/// surfaces report the native window's buffer size.
pub struct HeadlessEgl {
    screen: Arc<HeadlessScreen>,
    configs: Vec<(ConfigId, ConfigAttributes)>,
    surfaceless: bool,
    state: Mutex<EglState>,
}

impl HeadlessEgl {
    pub fn new(screen: Arc<HeadlessScreen>) -> Self {
        Self::with_surfaceless(screen, true)
    }

    /// A driver that does or does not advertise surfaceless contexts.
    pub fn with_surfaceless(screen: Arc<HeadlessScreen>, surfaceless: bool) -> Self {
        let configs = vec![
            (
                ConfigId::from_raw(1),
                ConfigAttributes {
                    red: 8,
                    green: 8,
                    blue: 8,
                    alpha: 8,
                    depth: 24,
                    stencil: 8,
                    samples: 0,
                },
            ),
            (
                ConfigId::from_raw(2),
                ConfigAttributes {
                    red: 5,
                    green: 6,
                    blue: 5,
                    alpha: 0,
                    depth: 16,
                    stencil: 0,
                    samples: 0,
                },
            ),
        ];
        Self {
            screen,
            configs,
            surfaceless,
            state: Mutex::new(EglState {
                next_id: 0x100,
                contexts: HashMap::new(),
                surfaces: HashMap::new(),
                bindings: HashMap::new(),
                stats: EglStats::default(),
                fail_context_creation: false,
            }),
        }
    }

    /// Make every subsequent `create_context` fail.
    pub fn fail_context_creation(&self, fail: bool) {
        self.state.lock().fail_context_creation = fail;
    }

    pub fn stats(&self) -> EglStats {
        self.state.lock().stats.clone()
    }

    pub fn live_surfaces(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    pub fn live_contexts(&self) -> usize {
        self.state.lock().contexts.len()
    }

    fn matches(request: i32, actual: i32) -> bool {
        request == DONT_CARE || request == actual
    }
}

impl EglApi for HeadlessEgl {
    fn has_extension(&self, name: &str) -> bool {
        self.surfaceless && name == SURFACELESS_CONTEXT_EXTENSION
    }

    fn choose_config(&self, request: &ConfigRequest) -> NativeResult<Option<ConfigId>> {
        Ok(self
            .configs
            .iter()
            .find(|(_, a)| {
                Self::matches(request.red, a.red)
                    && Self::matches(request.green, a.green)
                    && Self::matches(request.blue, a.blue)
                    && (request.alpha == DONT_CARE || a.alpha >= request.alpha)
                    && (request.depth == DONT_CARE || a.depth >= request.depth)
                    && (request.stencil == DONT_CARE || a.stencil >= request.stencil)
            })
            .map(|(id, _)| *id))
    }

    fn config_attributes(&self, config: ConfigId) -> NativeResult<ConfigAttributes> {
        self.configs
            .iter()
            .find(|(id, _)| *id == config)
            .map(|(_, a)| *a)
            .ok_or(NativeError::InvalidHandle)
    }

    fn create_context(
        &self,
        config: ConfigId,
        share: Option<ContextId>,
        _attributes: &ContextAttributes,
    ) -> NativeResult<ContextId> {
        self.config_attributes(config)?;
        let mut state = self.state.lock();
        if state.fail_context_creation {
            return Err(NativeError::call("eglCreateContext", EGL_BAD_ALLOC));
        }
        if let Some(share) = share {
            if !state.contexts.contains_key(&share) {
                return Err(NativeError::call("eglCreateContext", EGL_BAD_MATCH));
            }
        }
        state.next_id += 1;
        let id = ContextId::from_raw(state.next_id);
        state.contexts.insert(id, config);
        state.stats.contexts_created += 1;
        Ok(id)
    }

    fn destroy_context(&self, context: ContextId) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.contexts.remove(&context).ok_or(NativeError::InvalidHandle)?;
        state.stats.contexts_destroyed += 1;
        Ok(())
    }

    fn create_window_surface(
        &self,
        config: ConfigId,
        window: WindowHandle,
    ) -> NativeResult<SurfaceId> {
        self.config_attributes(config)?;
        self.screen.window_info(window)?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SurfaceId::from_raw(state.next_id);
        state.surfaces.insert(id, SurfaceBacking::Window(window));
        state.stats.surfaces_created += 1;
        Ok(id)
    }

    fn create_pbuffer_surface(&self, config: ConfigId, size: Size) -> NativeResult<SurfaceId> {
        self.config_attributes(config)?;
        if size.is_empty() {
            return Err(NativeError::BadArgument("empty pbuffer"));
        }
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SurfaceId::from_raw(state.next_id);
        state.surfaces.insert(id, SurfaceBacking::Pbuffer(size));
        state.stats.surfaces_created += 1;
        Ok(id)
    }

    fn destroy_surface(&self, surface: SurfaceId) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.surfaces.remove(&surface).ok_or(NativeError::InvalidHandle)?;
        state.stats.surfaces_destroyed += 1;
        Ok(())
    }

    fn query_surface_size(&self, surface: SurfaceId) -> NativeResult<Size> {
        let window = match self.state.lock().surfaces.get(&surface) {
            Some(SurfaceBacking::Pbuffer(size)) => return Ok(*size),
            Some(SurfaceBacking::Window(window)) => *window,
            None => return Err(NativeError::call("eglQuerySurface", EGL_BAD_SURFACE)),
        };
        self.screen
            .window_snapshot(window)
            .map(|w| w.buffer_size)
            .ok_or(NativeError::InvalidHandle)
    }

    fn make_current(
        &self,
        surface: Option<SurfaceId>,
        context: Option<ContextId>,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.stats.make_current_calls += 1;
        if let Some(context) = context {
            if !state.contexts.contains_key(&context) {
                return Err(NativeError::InvalidHandle);
            }
            match surface {
                Some(s) if !state.surfaces.contains_key(&s) => {
                    return Err(NativeError::call("eglMakeCurrent", EGL_BAD_SURFACE));
                }
                None if !self.surfaceless => {
                    return Err(NativeError::call("eglMakeCurrent", EGL_BAD_MATCH));
                }
                _ => {}
            }
        } else if surface.is_some() {
            return Err(NativeError::call("eglMakeCurrent", EGL_BAD_MATCH));
        }
        state.bindings.insert(
            std::thread::current().id(),
            CurrentBinding {
                context,
                draw: surface,
            },
        );
        Ok(())
    }

    fn current(&self) -> CurrentBinding {
        self.state
            .lock()
            .bindings
            .get(&std::thread::current().id())
            .copied()
            .unwrap_or_default()
    }

    fn swap_interval(&self, interval: i32) -> NativeResult<()> {
        self.state.lock().stats.swap_intervals.push(interval);
        Ok(())
    }

    fn swap_buffers(&self, surface: SurfaceId) -> NativeResult<()> {
        let mut state = self.state.lock();
        if !state.surfaces.contains_key(&surface) {
            return Err(NativeError::call("eglSwapBuffers", EGL_BAD_SURFACE));
        }
        state.stats.swaps += 1;
        Ok(())
    }
}

static_assertions::assert_impl_all!(HeadlessEgl: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::egl::SurfaceKind;

    #[test]
    fn test_choose_rgb565() {
        let egl = HeadlessEgl::new(Arc::new(HeadlessScreen::new()));
        let request = ConfigRequest {
            red: 5,
            green: 6,
            blue: 5,
            surface: SurfaceKind::Pbuffer,
            ..Default::default()
        };
        let config = egl.choose_config(&request).unwrap().unwrap();
        assert_eq!(egl.config_attributes(config).unwrap().green, 6);
    }

    #[test]
    fn test_binding_is_per_thread() {
        let egl = Arc::new(HeadlessEgl::new(Arc::new(HeadlessScreen::new())));
        let config = egl.choose_config(&ConfigRequest::default()).unwrap().unwrap();
        let ctx = egl
            .create_context(config, None, &ContextAttributes::default())
            .unwrap();
        egl.make_current(None, Some(ctx)).unwrap();
        assert_eq!(egl.current().context, Some(ctx));

        let other = egl.clone();
        let seen = std::thread::spawn(move || other.current()).join().unwrap();
        assert_eq!(seen, CurrentBinding::default());
    }

    #[test]
    fn test_surfaceless_needs_extension() {
        let egl = HeadlessEgl::with_surfaceless(Arc::new(HeadlessScreen::new()), false);
        let config = egl.choose_config(&ConfigRequest::default()).unwrap().unwrap();
        let ctx = egl
            .create_context(config, None, &ContextAttributes::default())
            .unwrap();
        assert!(!egl.has_extension(SURFACELESS_CONTEXT_EXTENSION));
        assert!(egl.make_current(None, Some(ctx)).is_err());
    }
}
