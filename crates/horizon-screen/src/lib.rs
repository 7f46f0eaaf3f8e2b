//! Horizon Screen: native windowing integration for compositor-based
//! embedded displays.
//!
//! This crate maps toolkit windows onto native compositor windows. It keeps
//! a per-screen window hierarchy with deterministic z-order, manages
//! double-buffered raster surfaces and EGL surfaces that follow window
//! resizes, and pumps the compositor's blocking event queue on a dedicated
//! thread, translating native events into [`WindowSystemEvent`]s on the
//! owning thread.
//!
//! The compositor and EGL driver sit behind the traits in
//! [`horizon_screen_core`]; its `headless` backend runs everything
//! in-process.
//!
//! # Threading
//!
//! All window, screen, buffer and GL state belongs to the thread that
//! created the [`Integration`]. The only other thread is the event pump,
//! which shares nothing but the [`WindowRegistry`].

pub mod buffer;
pub mod error;
pub mod event_handler;
pub mod event_thread;
pub mod events;
pub mod gl;
pub mod integration;
pub mod logging;
pub mod options;
pub mod registry;
pub mod screen;
pub mod system;
pub mod window;

pub use buffer::{Buffer, ImageFormat, ImageView};
pub use error::{CheckNative, ScreenError, ScreenResult};
pub use event_handler::{MAX_TOUCH_POINTS, ScreenEventHandler};
pub use event_thread::{EventThread, PumpMessage, RunState};
pub use events::{
    KeyEventKind, KeyboardModifiers, MouseButtons, ScreenOrientation, TouchEventKind, TouchPoint,
    TouchPointState, WindowSystemEvent,
};
pub use gl::{
    Binding, ContextSettings, ContextState, GlContext, GlWindowSurface, OffscreenKind,
    OffscreenSurface, SurfaceFormat, SurfaceTarget,
};
pub use integration::Integration;
pub use logging::WindowTreeDebug;
pub use options::IntegrationOptions;
pub use registry::WindowRegistry;
pub use screen::{Screen, ScreenId};
pub use system::WindowSystem;
pub use window::{
    GroupMembership, RasterSurface, SurfaceRequest, Window, WindowId, WindowRequest, WindowState,
    WindowSurface, WindowType,
};
