//! The EGL driver boundary.
//!
//! Only what the context binder needs: config selection, contexts, window
//! and pbuffer surfaces, per-thread binding, swap control.

use std::fmt;

use super::WindowHandle;
use crate::error::NativeResult;
use crate::geometry::Size;

macro_rules! egl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

egl_handle!(
    /// A framebuffer configuration.
    ConfigId
);
egl_handle!(
    /// A rendering context.
    ContextId
);
egl_handle!(
    /// A drawable surface.
    SurfaceId
);

/// Name of the extension that allows binding a context without a surface.
pub const SURFACELESS_CONTEXT_EXTENSION: &str = "EGL_KHR_surfaceless_context";

/// Value meaning "no preference" in a config request.
pub const DONT_CARE: i32 = -1;

/// Kind of drawable a config must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Window,
    Pbuffer,
}

/// Requested framebuffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRequest {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub alpha: i32,
    pub depth: i32,
    pub stencil: i32,
    pub samples: i32,
    pub surface: SurfaceKind,
}

impl Default for ConfigRequest {
    fn default() -> Self {
        Self {
            red: DONT_CARE,
            green: DONT_CARE,
            blue: DONT_CARE,
            alpha: DONT_CARE,
            depth: DONT_CARE,
            stencil: DONT_CARE,
            samples: DONT_CARE,
            surface: SurfaceKind::Window,
        }
    }
}

/// Attributes read back from a chosen config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigAttributes {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub alpha: i32,
    pub depth: i32,
    pub stencil: i32,
    pub samples: i32,
}

/// Context creation attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAttributes {
    pub major_version: i32,
    pub minor_version: i32,
    pub debug: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            major_version: 2,
            minor_version: 0,
            debug: false,
        }
    }
}

/// What is bound on the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentBinding {
    pub context: Option<ContextId>,
    pub draw: Option<SurfaceId>,
}

/// The EGL driver.
///
/// Binding state is per thread, as in EGL: [`current`](Self::current)
/// reports what [`make_current`](Self::make_current) last bound on the
/// calling thread.
pub trait EglApi: Send + Sync {
    fn has_extension(&self, name: &str) -> bool;
    fn choose_config(&self, request: &ConfigRequest) -> NativeResult<Option<ConfigId>>;
    fn config_attributes(&self, config: ConfigId) -> NativeResult<ConfigAttributes>;

    fn create_context(
        &self,
        config: ConfigId,
        share: Option<ContextId>,
        attributes: &ContextAttributes,
    ) -> NativeResult<ContextId>;
    fn destroy_context(&self, context: ContextId) -> NativeResult<()>;

    fn create_window_surface(&self, config: ConfigId, window: WindowHandle)
    -> NativeResult<SurfaceId>;
    fn create_pbuffer_surface(&self, config: ConfigId, size: Size) -> NativeResult<SurfaceId>;
    fn destroy_surface(&self, surface: SurfaceId) -> NativeResult<()>;
    fn query_surface_size(&self, surface: SurfaceId) -> NativeResult<Size>;

    /// Bind `context` and `surface` on the calling thread. `None` for both
    /// releases the current binding; `None` for the surface alone is a
    /// surfaceless binding.
    fn make_current(&self, surface: Option<SurfaceId>, context: Option<ContextId>)
    -> NativeResult<()>;
    fn current(&self) -> CurrentBinding;

    fn swap_interval(&self, interval: i32) -> NativeResult<()>;
    fn swap_buffers(&self, surface: SurfaceId) -> NativeResult<()>;
}
