//! Window-system events delivered to the toolkit.
//!
//! These are produced on the owning thread, by the window system itself
//! (geometry, expose, screen changes) and by the event handler (input,
//! activation, close requests), and drained in FIFO order with
//! [`Integration::take_events`](crate::Integration::take_events).

use horizon_screen_core::{Point, PointF, Rect};

use crate::screen::ScreenId;
use crate::window::WindowId;

/// Pressed mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseButtons(u32);

impl MouseButtons {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1 << 0);
    pub const RIGHT: Self = Self(1 << 1);
    pub const MIDDLE: Self = Self(1 << 2);
    pub const BACK: Self = Self(1 << 3);
    pub const FORWARD: Self = Self(1 << 4);
    pub const EXTRA_3: Self = Self(1 << 5);
    pub const EXTRA_4: Self = Self(1 << 6);
    pub const EXTRA_5: Self = Self(1 << 7);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for MouseButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for MouseButtons {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Keyboard modifiers held during a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct KeyboardModifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    /// The key is on the numeric keypad.
    pub keypad: bool,
}

impl KeyboardModifiers {
    pub const NONE: Self = Self {
        shift: false,
        control: false,
        alt: false,
        keypad: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.control || self.alt || self.keypad
    }
}

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    Press,
    Release,
}

/// Phase of a touch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchEventKind {
    Begin,
    Update,
    End,
}

/// State of one point in a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchPointState {
    Pressed,
    Moved,
    Stationary,
    Released,
}

/// One contact in a multi-touch event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Hardware touch id.
    pub id: i32,
    pub state: TouchPointState,
    /// Position relative to the screen, each axis in `0.0..=1.0`.
    pub normal_position: PointF,
    /// Contact area in global coordinates.
    pub area: Rect,
    /// Pressure in `0.0..=1.0`.
    pub pressure: f64,
}

/// Orientation of a screen's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenOrientation {
    Landscape,
    Portrait,
    InvertedLandscape,
    InvertedPortrait,
}

/// An event for the toolkit.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSystemEvent {
    /// The window's geometry changed.
    GeometryChanged { window: WindowId, geometry: Rect },
    /// Part of the window needs repainting.
    Expose { window: WindowId, region: Rect },
    /// The pointer entered the window.
    Enter {
        window: WindowId,
        local: Point,
        global: Point,
    },
    /// The pointer left the window.
    Leave { window: WindowId },
    Mouse {
        window: WindowId,
        local: Point,
        global: Point,
        buttons: MouseButtons,
        timestamp: u64,
    },
    Wheel {
        window: WindowId,
        local: Point,
        global: Point,
        /// Scrolled amount, horizontal and vertical.
        angle_delta: Point,
        timestamp: u64,
    },
    Key {
        /// The focused window, if any.
        window: Option<WindowId>,
        kind: KeyEventKind,
        /// Key cap, with ASCII letters upper-cased.
        key: u32,
        /// Symbol, when the compositor provided a valid one.
        sym: Option<u32>,
        scan: Option<u32>,
        modifiers: KeyboardModifiers,
        /// Text produced by the key.
        text: Option<char>,
        auto_repeat: bool,
    },
    Touch {
        window: WindowId,
        kind: TouchEventKind,
        points: Vec<TouchPoint>,
        timestamp: u64,
    },
    /// Keyboard focus moved to a window, or away from all of them.
    WindowActivated { window: Option<WindowId> },
    /// The compositor or window manager asks the window to close.
    CloseRequested { window: WindowId },
    ScreenOrientationChanged {
        screen: ScreenId,
        orientation: ScreenOrientation,
    },
    ScreenGeometryChanged {
        screen: ScreenId,
        geometry: Rect,
        available: Rect,
    },
    ScreenAvailableGeometryChanged { screen: ScreenId, available: Rect },
    ScreenAdded { screen: ScreenId },
    ScreenRemoved { screen: ScreenId },
}

impl WindowSystemEvent {
    /// The window the event is addressed to, if any.
    pub fn window(&self) -> Option<WindowId> {
        match self {
            Self::GeometryChanged { window, .. }
            | Self::Expose { window, .. }
            | Self::Enter { window, .. }
            | Self::Leave { window }
            | Self::Mouse { window, .. }
            | Self::Wheel { window, .. }
            | Self::Touch { window, .. }
            | Self::CloseRequested { window } => Some(*window),
            Self::Key { window, .. } | Self::WindowActivated { window } => *window,
            Self::ScreenOrientationChanged { .. }
            | Self::ScreenGeometryChanged { .. }
            | Self::ScreenAvailableGeometryChanged { .. }
            | Self::ScreenAdded { .. }
            | Self::ScreenRemoved { .. } => None,
        }
    }
}
