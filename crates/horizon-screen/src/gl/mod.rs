//! EGL context and surface binding.
//!
//! A [`GlContext`] moves through `Uninitialized -> Current -> Done`. Window
//! surfaces ([`GlWindowSurface`]) are recreated lazily when their window
//! has been resized, and a context binding that is already current on the
//! calling thread is not rebound.

mod context;
mod format;
mod surface;

pub use context::{Binding, ContextSettings, ContextState, GlContext, SurfaceTarget};
pub use format::SurfaceFormat;
pub use surface::{GlWindowSurface, OffscreenKind, OffscreenSurface};
