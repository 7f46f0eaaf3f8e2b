use super::{DisplayHandle, WindowHandle};
use crate::geometry::{Point, Size};

/// Number of pointer buttons reported in the native button mask.
pub const NATIVE_BUTTON_COUNT: u32 = 8;

/// Maximum pressure value reported by the touch driver.
pub const MAX_TOUCH_PRESSURE: i32 = 255;

/// Raw keyboard event flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyFlags(u32);

impl KeyFlags {
    pub const KEY_DOWN: Self = Self(0x01);
    pub const KEY_REPEAT: Self = Self(0x02);
    pub const SCAN_VALID: Self = Self(0x20);
    pub const SYM_VALID: Self = Self(0x40);
    pub const CAP_VALID: Self = Self(0x80);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for KeyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Phase of a native touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchKind {
    Press,
    Move,
    Release,
}

/// Which window property changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyChange {
    Focus,
    Size,
    Position,
    Other(i32),
}

/// Subtype of a window-manager event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerEventKind {
    /// The manager asks the window to close.
    Close,
    Other(i32),
}

/// An event read from the compositor's queue.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Pointer {
        window: WindowHandle,
        /// Bit mask of pressed buttons, bit 0 is the left button.
        buttons: u32,
        /// Position on the display.
        position: Point,
        /// Position inside the window.
        source_position: Point,
        wheel: i32,
        timestamp: u64,
    },
    Keyboard {
        window: Option<WindowHandle>,
        flags: KeyFlags,
        sym: u32,
        modifiers: u32,
        scan: u32,
        cap: u32,
    },
    Touch {
        kind: TouchKind,
        window: WindowHandle,
        touch_id: i32,
        position: Point,
        source_position: Point,
        /// Contact size in pixels.
        size: Size,
        pressure: i32,
        timestamp: u64,
    },
    /// A window was created, possibly by another process.
    Create { window: WindowHandle },
    /// A window was closed, possibly by another process.
    Close { window: WindowHandle },
    /// A display was attached or detached.
    Display {
        display: DisplayHandle,
        attached: bool,
    },
    Property {
        window: WindowHandle,
        property: PropertyChange,
    },
    Manager {
        window: WindowHandle,
        kind: ManagerEventKind,
    },
    /// An event type this layer does not understand.
    Unknown(i32),
}

impl NativeEvent {
    /// The window this event targets, if any.
    pub fn window(&self) -> Option<WindowHandle> {
        match self {
            Self::Pointer { window, .. }
            | Self::Touch { window, .. }
            | Self::Create { window }
            | Self::Close { window }
            | Self::Property { window, .. }
            | Self::Manager { window, .. } => Some(*window),
            Self::Keyboard { window, .. } => *window,
            Self::Display { .. } | Self::Unknown(_) => None,
        }
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Pointer { .. } => "pointer",
            Self::Keyboard { .. } => "keyboard",
            Self::Touch { .. } => "touch",
            Self::Create { .. } => "create",
            Self::Close { .. } => "close",
            Self::Display { .. } => "display",
            Self::Property { .. } => "property",
            Self::Manager { .. } => "manager",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Out-of-band message sent through the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pulse {
    /// Stop the event pump.
    Shutdown,
    /// Application-defined wake-up.
    User(i32),
}

/// What the blocking receive call returns.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeMessage {
    Event(NativeEvent),
    Pulse(Pulse),
}
