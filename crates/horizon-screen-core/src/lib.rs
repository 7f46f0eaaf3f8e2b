//! Native compositor boundary for Horizon Screen.
//!
//! This crate defines what the integration layer needs from the operating
//! system: the [`ScreenApi`] compositor interface, the [`EglApi`] driver
//! interface, owning handle wrappers, integer geometry, and the small
//! runtime utilities (timers, thread affinity, logging targets) shared by
//! the integration.
//!
//! With the `headless` feature (on by default) it also provides an
//! in-process compositor and EGL driver for tests and hosts without a real
//! display server.
//!
//! [`EglApi`]: native::egl::EglApi

pub mod error;
pub mod geometry;
#[cfg(feature = "headless")]
pub mod headless;
pub mod logging;
pub mod native;
pub mod thread_check;
pub mod timer;

pub use error::{NativeError, NativeResult};
pub use geometry::{Point, PointF, Rect, Region, Size};
pub use native::handle::{NativeWindow, Ownership};
pub use native::{
    BufferHandle, BufferInfo, DisplayHandle, DisplayInfo, GroupName, NativeEvent, NativeMessage,
    NativeWindowInfo, NativeWindowType, PixelFormat, Pulse, ScreenApi, Sensitivity, Transparency,
    Usage, WindowHandle, WindowProperty,
};
pub use thread_check::ThreadAffinity;
pub use timer::{TimerId, TimerManager};
