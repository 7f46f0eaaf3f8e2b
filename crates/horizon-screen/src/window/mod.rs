//! Windows: nodes in the per-screen tree of native surfaces.
//!
//! A [`Window`] is the shared record for every kind of surface. What backs
//! it is a closed set of variants ([`WindowSurface`]): raster windows own
//! double-buffered native render buffers, GL windows own an EGL surface
//! that is recreated on resize, and foreign windows wrap a native handle
//! created elsewhere.
//!
//! Windows live in the [`WindowSystem`](crate::WindowSystem) arena and are
//! addressed by [`WindowId`]. Operations that touch more than one window
//! (hierarchy, visibility, geometry, buffers) are methods on the window
//! system, split across the submodules here.

mod geometry;
mod hierarchy;
mod raster;

use std::sync::Arc;

use horizon_screen_core::{
    GroupName, NativeWindow, Rect, Sensitivity, WindowHandle,
};
use slotmap::new_key_type;

pub use raster::RasterSurface;

use crate::gl::{GlWindowSurface, SurfaceFormat};
use crate::screen::ScreenId;

new_key_type! {
    /// Identifies a window in the window system.
    pub struct WindowId;
}

/// The role of a window, which affects stacking and focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Dialog,
    /// Menus and drop-downs; shown without taking focus.
    Popup,
    /// Shown without taking focus.
    ToolTip,
    /// Always stacked below every other top-level window.
    Desktop,
}

impl WindowType {
    /// Windows of this type are shown without being activated.
    pub fn shows_without_activating(self) -> bool {
        matches!(self, Self::Popup | Self::ToolTip)
    }
}

/// Window state as requested by the toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    FullScreen,
}

/// Membership in a parent's compositor group.
///
/// Joining is deferred until a window is first shown, so "never decided"
/// and "explicitly in no group" are different states.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GroupMembership {
    /// No group decision has been made yet.
    #[default]
    Unset,
    /// Explicitly not in any parent group.
    Detached,
    /// Member of the named group.
    Joined(GroupName),
}

impl GroupMembership {
    pub fn group(&self) -> Option<&GroupName> {
        match self {
            Self::Joined(name) => Some(name),
            Self::Unset | Self::Detached => None,
        }
    }
}

/// What backs a window.
pub enum WindowSurface {
    Raster(RasterSurface),
    Gl(Arc<GlWindowSurface>),
    /// A native window created outside this process or toolkit.
    Foreign,
}

impl WindowSurface {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Raster(_) => "raster",
            Self::Gl(_) => "gl",
            Self::Foreign => "foreign",
        }
    }
}

/// The kind of surface requested for a new window.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceRequest {
    Raster,
    Gl(SurfaceFormat),
    /// Wrap an existing native window without taking ownership.
    Foreign(WindowHandle),
}

/// Parameters for creating a window.
#[derive(Debug, Clone)]
pub struct WindowRequest {
    /// Screen for top-level windows. Children always use their parent's.
    pub screen: Option<ScreenId>,
    pub parent: Option<WindowId>,
    pub window_type: WindowType,
    pub accepts_focus: bool,
    pub geometry: Rect,
    pub state: WindowState,
    pub opacity: f64,
    pub visible: bool,
    pub surface: SurfaceRequest,
    /// Requested alpha channel depth in bits, or -1 for no preference.
    pub alpha_buffer_size: i32,
    /// Join this group instead of the one implied by the hierarchy.
    pub initial_group: Option<GroupName>,
    /// Native id string, visible to other compositor clients.
    pub window_id: Option<String>,
    /// Id string of the media renderer window to stack above this one.
    pub media_overlay_name: Option<String>,
}

impl Default for WindowRequest {
    fn default() -> Self {
        Self {
            screen: None,
            parent: None,
            window_type: WindowType::Normal,
            accepts_focus: true,
            geometry: Rect::default(),
            state: WindowState::Normal,
            opacity: 1.0,
            visible: false,
            surface: SurfaceRequest::Raster,
            alpha_buffer_size: -1,
            initial_group: None,
            window_id: None,
            media_overlay_name: None,
        }
    }
}

impl WindowRequest {
    /// A raster window with the given geometry.
    pub fn raster(geometry: Rect) -> Self {
        Self {
            geometry,
            ..Default::default()
        }
    }

    /// A GL window with the given geometry and format.
    pub fn gl(geometry: Rect, format: SurfaceFormat) -> Self {
        Self {
            geometry,
            surface: SurfaceRequest::Gl(format),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: WindowId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_screen(mut self, screen: ScreenId) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn with_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// A window record.
pub struct Window {
    // Fields drop in declaration order: the surface (EGL surface, buffer
    // wrappers) and the media overlay go before the native window.
    pub(crate) surface: WindowSurface,
    pub(crate) media_overlay: Option<NativeWindow>,
    pub(crate) native: NativeWindow,

    pub(crate) screen: ScreenId,
    pub(crate) parent: Option<WindowId>,
    pub(crate) children: Vec<WindowId>,
    pub(crate) window_type: WindowType,
    pub(crate) accepts_focus: bool,
    pub(crate) is_root: bool,

    pub(crate) geometry: Rect,
    pub(crate) visible: bool,
    pub(crate) exposed: bool,
    pub(crate) state: WindowState,
    pub(crate) unmaximized_geometry: Option<Rect>,
    pub(crate) opacity: f64,
    pub(crate) zorder: i32,

    pub(crate) group_name: Option<GroupName>,
    pub(crate) parent_group: GroupMembership,
    pub(crate) media_overlay_name: Option<String>,
    pub(crate) sensitivity: Sensitivity,
    pub(crate) first_activate_handled: bool,
    pub(crate) alpha_buffer_size: i32,
}

impl Window {
    #[inline]
    pub fn handle(&self) -> WindowHandle {
        self.native.handle()
    }

    pub fn screen(&self) -> ScreenId {
        self.screen
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn children(&self) -> &[WindowId] {
        &self.children
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self.surface, WindowSurface::Foreign)
    }

    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    /// The visibility flag set by the toolkit, ignoring ancestors.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Visible and not covered by a window-delegate exposure change.
    pub fn is_exposed(&self) -> bool {
        self.visible && self.exposed
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn zorder(&self) -> i32 {
        self.zorder
    }

    /// Name of the group this window owns, which its children join.
    pub fn group_name(&self) -> Option<&GroupName> {
        self.group_name.as_ref()
    }

    pub fn parent_group(&self) -> &GroupMembership {
        &self.parent_group
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    /// Handle of the media renderer window stacked above this one.
    pub fn media_overlay(&self) -> Option<WindowHandle> {
        self.media_overlay.as_ref().map(NativeWindow::handle)
    }

    pub fn media_overlay_name(&self) -> Option<&str> {
        self.media_overlay_name.as_deref()
    }

    pub fn surface(&self) -> &WindowSurface {
        &self.surface
    }

    pub(crate) fn raster_mut(&mut self) -> Option<&mut RasterSurface> {
        match &mut self.surface {
            WindowSurface::Raster(raster) => Some(raster),
            _ => None,
        }
    }

    /// Whether activation must flip the input sensitivity first.
    pub(crate) fn activates_on_request_only(&self) -> bool {
        self.window_type.shows_without_activating() && self.accepts_focus
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("handle", &self.native.handle())
            .field("surface", &self.surface.kind_name())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("geometry", &self.geometry)
            .field("visible", &self.visible)
            .field("zorder", &self.zorder)
            .finish_non_exhaustive()
    }
}
