//! The native compositor boundary.
//!
//! [`ScreenApi`] is the narrow interface the integration consumes from the
//! operating system's screen-compositing service: windows and their
//! property sets, window groups, render buffers, posting, displays and the
//! blocking event queue. [`egl::EglApi`] is the matching interface to the
//! EGL driver.
//!
//! Handles are plain copyable ids. Ownership is expressed one level up by
//! [`handle::NativeWindow`], which destroys the native window on drop unless
//! it was adopted.

pub mod egl;
mod event;
pub mod handle;

use std::fmt;

pub use event::{
    KeyFlags, ManagerEventKind, NativeEvent, NativeMessage, PropertyChange, Pulse, TouchKind,
    MAX_TOUCH_PRESSURE, NATIVE_BUTTON_COUNT,
};

use crate::error::NativeResult;
use crate::geometry::{Point, Rect, Size};

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw native value.
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw native value.
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

native_handle!(
    /// A native compositor window.
    WindowHandle
);
native_handle!(
    /// A physical or virtual display known to the compositor.
    DisplayHandle
);
native_handle!(
    /// One render buffer attached to a native window.
    BufferHandle
);

/// Name of a compositor window group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupName(String);

impl GroupName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pixel formats understood by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgbx4444,
    Rgba4444,
    Rgbx5551,
    Rgba5551,
    Rgb565,
    Rgbx8888,
    Rgba8888,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgbx4444 | Self::Rgba4444 | Self::Rgbx5551 | Self::Rgba5551 | Self::Rgb565 => 2,
            Self::Rgbx8888 | Self::Rgba8888 => 4,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba4444 | Self::Rgba5551 | Self::Rgba8888)
    }

    /// Bits per pixel as reported for a display depth.
    pub const fn depth(self) -> u32 {
        match self {
            Self::Rgbx8888 | Self::Rgba8888 => 32,
            _ => 16,
        }
    }
}

/// How the compositor blends a window with what is beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transparency {
    /// Opaque: the window's alpha channel is ignored.
    None,
    /// Source-over blending.
    SourceOver,
    /// The window is not composited at all, but still counts as visible.
    Discard,
}

/// Native window class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeWindowType {
    /// A top-level window owned by an application.
    Application,
    /// A window embedded in another window's group.
    Child,
}

/// Input sensitivity of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensitivity {
    /// Receives input everywhere and may take focus.
    Always,
    /// Receives input where its content is non-transparent.
    Test,
    /// Receives pointer input but never keyboard focus.
    NoFocus,
}

/// Intended buffer usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    /// CPU read/write for raster painting.
    Raster,
    /// OpenGL ES 2 rendering.
    OpenGlEs2,
}

/// A settable native window property.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowProperty {
    Position(Point),
    Size(Size),
    SourceSize(Size),
    BufferSize(Size),
    Format(PixelFormat),
    Transparency(Transparency),
    SwapInterval(i32),
    ZOrder(i32),
    Visible(bool),
    GlobalAlpha(i32),
    Rotation(i32),
    Sensitivity(Sensitivity),
    Usage(Usage),
    Display(DisplayHandle),
    IdString(String),
}

impl WindowProperty {
    /// Short name used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Position(_) => "position",
            Self::Size(_) => "size",
            Self::SourceSize(_) => "source size",
            Self::BufferSize(_) => "buffer size",
            Self::Format(_) => "format",
            Self::Transparency(_) => "transparency",
            Self::SwapInterval(_) => "swap interval",
            Self::ZOrder(_) => "z-order",
            Self::Visible(_) => "visible",
            Self::GlobalAlpha(_) => "global alpha",
            Self::Rotation(_) => "rotation",
            Self::Sensitivity(_) => "sensitivity",
            Self::Usage(_) => "usage",
            Self::Display(_) => "display",
            Self::IdString(_) => "id string",
        }
    }
}

/// Static and dynamic information about a display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: DisplayHandle,
    /// Size in pixels at the current rotation.
    pub size: Size,
    /// Size in millimetres. Zero when the driver does not know.
    pub physical_size: Size,
    /// Rotation in degrees, one of 0, 90, 180, 270.
    pub rotation: i32,
    pub attached: bool,
    /// Refresh rate of the current mode in Hz, if reported.
    pub refresh_rate: Option<u32>,
}

/// Queried state of a native window.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeWindowInfo {
    pub position: Point,
    pub size: Size,
    pub display: Option<DisplayHandle>,
    pub id_string: Option<String>,
    pub focused: bool,
    pub visible: bool,
    pub buffer_count: usize,
}

/// Layout of a render buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: Size,
    /// Bytes per row.
    pub stride: usize,
    pub format: PixelFormat,
}

/// The operating system's screen-compositing service.
///
/// Everything except [`receive`](Self::receive) is called from the owning
/// thread. `receive` blocks on the event pump thread until an event or a
/// pulse arrives; pulses travel through the same FIFO as events.
pub trait ScreenApi: Send + Sync {
    /// Displays currently known to the compositor, primary first.
    fn displays(&self) -> NativeResult<Vec<DisplayHandle>>;
    fn display_info(&self, display: DisplayHandle) -> NativeResult<DisplayInfo>;

    fn create_window(&self, kind: NativeWindowType) -> NativeResult<WindowHandle>;
    fn destroy_window(&self, window: WindowHandle) -> NativeResult<()>;
    fn set_window_property(&self, window: WindowHandle, value: WindowProperty)
    -> NativeResult<()>;
    fn window_info(&self, window: WindowHandle) -> NativeResult<NativeWindowInfo>;

    /// Create a group owned by `window` and return its name.
    fn create_window_group(&self, window: WindowHandle) -> NativeResult<GroupName>;
    fn join_window_group(&self, window: WindowHandle, group: &GroupName) -> NativeResult<()>;
    fn leave_window_group(&self, window: WindowHandle) -> NativeResult<()>;
    /// Give focus, within the group owned by `owner`, to `target`.
    fn set_group_focus(&self, owner: WindowHandle, target: WindowHandle) -> NativeResult<()>;

    fn create_window_buffers(&self, window: WindowHandle, count: usize) -> NativeResult<()>;
    fn destroy_window_buffers(&self, window: WindowHandle) -> NativeResult<()>;
    fn render_buffers(&self, window: WindowHandle) -> NativeResult<Vec<BufferHandle>>;
    fn buffer_info(&self, buffer: BufferHandle) -> NativeResult<BufferInfo>;
    /// Run `f` with the buffer's mapped pixel memory.
    fn with_buffer_memory(
        &self,
        buffer: BufferHandle,
        f: &mut dyn FnMut(&mut [u8]),
    ) -> NativeResult<()>;
    /// Queue a copy of `src_rect` in `src` to `dst_rect` in `dst`.
    fn blit(
        &self,
        dst: BufferHandle,
        src: BufferHandle,
        src_rect: Rect,
        dst_rect: Rect,
    ) -> NativeResult<()>;
    /// Wait for queued blits to complete.
    fn flush_blits(&self) -> NativeResult<()>;
    fn post_window(
        &self,
        window: WindowHandle,
        buffer: BufferHandle,
        dirty: &[Rect],
    ) -> NativeResult<()>;
    /// Apply all pending property changes atomically.
    fn flush_context(&self) -> NativeResult<()>;

    /// Block until the next event or pulse.
    fn receive(&self) -> NativeResult<NativeMessage>;
    /// Enqueue a pulse behind any pending events.
    fn send_pulse(&self, pulse: Pulse) -> NativeResult<()>;
}
