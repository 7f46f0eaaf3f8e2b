//! The window system: screens, windows and the events they produce.
//!
//! [`WindowSystem`] owns every [`Screen`] and [`Window`] in slot-map arenas.
//! Parent/child links are ids into the window arena, so the tree can be
//! walked and rewired without shared ownership. All methods run on the
//! owning thread; the only state shared with the event pump is the
//! [`WindowRegistry`].

use std::collections::VecDeque;
use std::sync::Arc;

use horizon_screen_core::native::egl::EglApi;
use horizon_screen_core::{
    DisplayHandle, NativeWindow, NativeWindowType, Point, Rect, ScreenApi, Sensitivity,
    ThreadAffinity, Usage, WindowHandle, WindowProperty,
};
use slotmap::SlotMap;

use crate::error::{CheckNative, ScreenError, ScreenResult};
use crate::events::WindowSystemEvent;
use crate::gl::GlWindowSurface;
use crate::logging::{WindowTreeDebug, targets};
use crate::options::IntegrationOptions;
use crate::registry::WindowRegistry;
use crate::screen::{Screen, ScreenId};
use crate::window::{
    GroupMembership, RasterSurface, SurfaceRequest, Window, WindowId, WindowRequest,
    WindowState, WindowSurface, WindowType,
};

/// Owner of all screens and windows.
pub struct WindowSystem {
    pub(crate) native: Arc<dyn ScreenApi>,
    egl: Option<Arc<dyn EglApi>>,
    pub(crate) options: IntegrationOptions,
    pub(crate) screens: SlotMap<ScreenId, Screen>,
    screen_order: Vec<ScreenId>,
    pub(crate) windows: SlotMap<WindowId, Window>,
    registry: WindowRegistry,
    pub(crate) focus_window: Option<WindowId>,
    events: VecDeque<WindowSystemEvent>,
    affinity: ThreadAffinity,
}

impl WindowSystem {
    /// Create an empty window system. Screens are added with
    /// [`add_screen`](Self::add_screen).
    pub fn new(
        native: Arc<dyn ScreenApi>,
        egl: Option<Arc<dyn EglApi>>,
        options: IntegrationOptions,
    ) -> Self {
        Self {
            native,
            egl,
            options: options.normalized(),
            screens: SlotMap::with_key(),
            screen_order: Vec::new(),
            windows: SlotMap::with_key(),
            registry: WindowRegistry::new(),
            focus_window: None,
            events: VecDeque::new(),
            affinity: ThreadAffinity::current(),
        }
    }

    pub fn options(&self) -> &IntegrationOptions {
        &self.options
    }

    pub fn native(&self) -> &Arc<dyn ScreenApi> {
        &self.native
    }

    /// The handle lookup shared with the event pump.
    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    // =========================================================================
    // Screens
    // =========================================================================

    /// Create a screen for `display`. Adding a known display returns the
    /// existing screen.
    pub fn add_screen(&mut self, display: DisplayHandle, primary: bool) -> ScreenResult<ScreenId> {
        self.affinity.debug_assert_same_thread();
        if let Some(existing) = self.screen_for_display(display) {
            return Ok(existing);
        }

        let info = self.native.display_info(display)?;
        let screen_display = info.id;
        let screen = Screen::new(&info, primary, &self.options);
        let geometry = screen.geometry();
        let id = self.screens.insert(screen);
        if primary {
            self.screen_order.insert(0, id);
        } else {
            self.screen_order.push(id);
        }

        tracing::debug!(target: targets::SCREEN, display = %screen_display, primary, %geometry, "screen added");
        self.push_event(WindowSystemEvent::ScreenAdded { screen: id });
        Ok(id)
    }

    /// Remove a screen, moving its windows to the primary screen.
    ///
    /// The primary screen is never removed; returns `Ok(false)` for it.
    pub fn remove_screen(&mut self, id: ScreenId) -> ScreenResult<bool> {
        self.affinity.debug_assert_same_thread();
        let screen = self.screens.get(id).ok_or(ScreenError::InvalidScreen)?;
        if screen.is_primary() {
            tracing::warn!(target: targets::SCREEN, display = %screen.display(), "not removing the primary screen");
            return Ok(false);
        }

        let mut windows: Vec<WindowId> = screen.root.into_iter().collect();
        windows.extend_from_slice(&screen.top_levels);
        let target = self.primary_screen().filter(|&primary| primary != id);

        for window in windows {
            match target {
                Some(primary) => self.set_screen(window, primary),
                None => self.destroy_window(window)?,
            }
        }

        if let Some(screen) = self.screens.remove(id) {
            tracing::debug!(target: targets::SCREEN, display = %screen.display(), "screen removed");
        }
        self.screen_order.retain(|&s| s != id);
        self.push_event(WindowSystemEvent::ScreenRemoved { screen: id });
        Ok(true)
    }

    pub fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.get(id)
    }

    /// Screens with the primary first.
    pub fn screen_ids(&self) -> impl Iterator<Item = ScreenId> + '_ {
        self.screen_order.iter().copied()
    }

    pub fn primary_screen(&self) -> Option<ScreenId> {
        self.screen_order
            .iter()
            .copied()
            .find(|&id| self.screens.get(id).is_some_and(Screen::is_primary))
            .or_else(|| self.screen_order.first().copied())
    }

    pub fn screen_for_display(&self, display: DisplayHandle) -> Option<ScreenId> {
        self.screens
            .iter()
            .find(|(_, screen)| screen.display() == display)
            .map(|(id, _)| id)
    }

    /// Recompute z-order on `screen`: the root at 0, top-level subtrees
    /// from 1 upwards, then a gap, then foreign overlays.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn update_hierarchy(&mut self, screen: ScreenId) {
        let Some(s) = self.screens.get(screen) else {
            return;
        };
        let root = s.root;
        let top_levels = s.top_levels.clone();

        let mut zorder = 1;
        if let Some(root) = root {
            if let Some(window) = self.windows.get_mut(root) {
                window.zorder = 0;
                window.native.set(WindowProperty::ZOrder(0)).or_warn("failed to set window z-order");
            }
            let children = self.windows.get(root).map(|w| w.children.clone()).unwrap_or_default();
            for child in children {
                self.update_zorder(child, &mut zorder);
            }
        }
        for window in top_levels {
            self.update_zorder(window, &mut zorder);
        }

        zorder += 1;
        if let Some(s) = self.screens.get(screen) {
            for overlay in &s.overlays {
                // Overlays may already be gone; their close event follows.
                if let Err(err) = overlay.set(WindowProperty::ZOrder(zorder)) {
                    tracing::trace!(target: targets::SCREEN, overlay = %overlay.handle(), %err, "stale overlay");
                }
                zorder += 1;
            }
        }

        self.flush();
    }

    /// Assign z-order depth first: the window, its media overlay, then its
    /// children.
    fn update_zorder(&mut self, id: WindowId, zorder: &mut i32) {
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        window.zorder = *zorder;
        window
            .native
            .set(WindowProperty::ZOrder(*zorder))
            .or_warn("failed to set window z-order");
        *zorder += 1;

        if let Some(overlay) = &window.media_overlay {
            overlay
                .set(WindowProperty::ZOrder(*zorder))
                .or_warn("failed to set media overlay z-order");
            *zorder += 1;
        }

        let children = window.children.clone();
        for child in children {
            self.update_zorder(child, zorder);
        }
    }

    /// Handle a display rotation.
    pub fn set_screen_rotation(&mut self, id: ScreenId, rotation: i32) -> ScreenResult<()> {
        self.affinity.debug_assert_same_thread();
        let screen = self.screens.get_mut(id).ok_or(ScreenError::InvalidScreen)?;
        let previous_geometry = screen.geometry();
        let Some(orthogonal) = screen.apply_rotation(rotation) else {
            return Ok(());
        };
        let geometry = screen.geometry();
        let primary = screen.is_primary();
        let root = screen.root;
        tracing::debug!(target: targets::SCREEN, rotation, orthogonal, %geometry, "screen rotated");

        if let Some(root) = root {
            self.set_rotation(root, rotation)?;
        }

        if orthogonal {
            if let Some(root) = root {
                self.set_geometry(root, geometry)?;
            }
            if primary {
                self.relayout_top_levels(id, previous_geometry)?;
            }
        } else {
            self.flush();
        }

        if primary
            && let Some(screen) = self.screens.get(id)
        {
            let (orientation, available) = (screen.orientation(), screen.available_geometry());
            self.push_event(WindowSystemEvent::ScreenOrientationChanged {
                screen: id,
                orientation,
            });
            self.push_event(WindowSystemEvent::ScreenGeometryChanged {
                screen: id,
                geometry,
                available,
            });
        }
        self.flush();
        Ok(())
    }

    /// Refit top-level windows after an orthogonal rotation.
    fn relayout_top_levels(&mut self, id: ScreenId, previous: Rect) -> ScreenResult<()> {
        let screen = self.screens.get(id).ok_or(ScreenError::InvalidScreen)?;
        let bounds = screen.geometry();
        let top_levels = screen.top_levels.clone();

        for window in top_levels {
            let Some(w) = self.windows.get(window) else {
                continue;
            };
            match w.state {
                WindowState::Maximized | WindowState::FullScreen => {
                    if w.visible {
                        self.apply_window_state(window)?;
                    }
                }
                _ => {
                    let geometry = refit(w.geometry, previous, bounds);
                    if geometry != w.geometry {
                        self.set_geometry(window, geometry)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Report the on-screen keyboard height for `id`.
    pub fn set_keyboard_height(&mut self, id: ScreenId, height: i32) -> ScreenResult<()> {
        let screen = self.screens.get_mut(id).ok_or(ScreenError::InvalidScreen)?;
        if !screen.set_keyboard_height(height) {
            return Ok(());
        }
        let available = screen.available_geometry();
        tracing::debug!(target: targets::SCREEN, height, %available, "keyboard height changed");
        self.push_event(WindowSystemEvent::ScreenAvailableGeometryChanged {
            screen: id,
            available,
        });
        Ok(())
    }

    /// The topmost visible top-level window on `screen` containing `point`.
    pub fn top_level_at(&self, screen: ScreenId, point: Point) -> Option<WindowId> {
        let screen = self.screens.get(screen)?;
        if !screen.contains_point(point) {
            return None;
        }
        screen
            .top_levels
            .iter()
            .rev()
            .chain(screen.root.iter())
            .copied()
            .find(|&id| {
                self.windows
                    .get(id)
                    .is_some_and(|w| w.visible && w.geometry.contains_point(point))
            })
    }

    /// A window was created by another client.
    ///
    /// A window whose id string matches a window's media overlay name is
    /// stacked directly above that window; any other foreign window on a
    /// known display joins the screen's overlay band.
    pub fn foreign_window_created(&mut self, handle: WindowHandle) {
        if self.registry.lookup(handle).is_some() {
            return;
        }
        let Some(info) = self
            .native
            .window_info(handle)
            .or_warn("failed to query foreign window")
        else {
            return;
        };
        let Some(screen) = info.display.and_then(|d| self.screen_for_display(d)) else {
            tracing::trace!(target: targets::SCREEN, %handle, "foreign window on an unknown display");
            return;
        };

        let owner = info.id_string.as_deref().and_then(|name| {
            self.windows
                .iter()
                .find(|(_, w)| w.screen == screen && w.media_overlay_name.as_deref() == Some(name))
                .map(|(id, _)| id)
        });

        let adopted = NativeWindow::adopted(self.native.clone(), handle);
        match owner {
            Some(owner) => {
                tracing::debug!(target: targets::SCREEN, %handle, "media overlay attached");
                if let Some(window) = self.windows.get_mut(owner) {
                    window.media_overlay = Some(adopted);
                }
            }
            None => {
                tracing::debug!(target: targets::SCREEN, %handle, "overlay window added");
                if let Some(s) = self.screens.get_mut(screen) {
                    s.add_overlay(adopted);
                }
            }
        }
        self.update_hierarchy(screen);
    }

    /// A foreign window was closed. Returns `true` if it was tracked.
    pub fn foreign_window_closed(&mut self, handle: WindowHandle) -> bool {
        let owner = self
            .windows
            .iter()
            .find(|(_, w)| w.media_overlay() == Some(handle))
            .map(|(id, w)| (id, w.screen));
        if let Some((owner, screen)) = owner {
            if let Some(window) = self.windows.get_mut(owner) {
                window.media_overlay = None;
            }
            self.update_hierarchy(screen);
            return true;
        }

        let screen = self
            .screens
            .iter_mut()
            .find_map(|(id, s)| s.remove_overlay(handle).then_some(id));
        match screen {
            Some(screen) => {
                tracing::debug!(target: targets::SCREEN, %handle, "overlay window removed");
                self.update_hierarchy(screen);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Windows
    // =========================================================================

    /// Create a window.
    ///
    /// # Panics
    ///
    /// Panics if the compositor cannot create the native window or its group.
    #[tracing::instrument(level = "trace", skip(self, request), fields(surface = ?request.surface))]
    pub fn create_window(&mut self, request: WindowRequest) -> ScreenResult<WindowId> {
        self.affinity.debug_assert_same_thread();

        let screen_id = match request.parent {
            Some(parent) => self.windows.get(parent).ok_or(ScreenError::InvalidWindow)?.screen,
            None => request
                .screen
                .or_else(|| self.primary_screen())
                .ok_or(ScreenError::InvalidScreen)?,
        };
        let screen = self.screens.get(screen_id).ok_or(ScreenError::InvalidScreen)?;
        let (display, depth, screen_geometry) = (screen.display(), screen.depth(), screen.geometry());

        let foreign = matches!(request.surface, SurfaceRequest::Foreign(_));
        let is_root = self.options.root_window
            && screen.root.is_none()
            && request.parent.is_none()
            && !foreign;
        let top_level_kind = is_root || (!self.options.root_window && request.parent.is_none());
        let egl = match request.surface {
            SurfaceRequest::Gl(_) => Some(self.egl.clone().ok_or(ScreenError::NoEgl)?),
            _ => None,
        };

        let native = match request.surface {
            SurfaceRequest::Foreign(handle) => NativeWindow::adopted(self.native.clone(), handle),
            _ => {
                let kind = if top_level_kind {
                    NativeWindowType::Application
                } else {
                    NativeWindowType::Child
                };
                let handle = self.native.create_window(kind).or_fatal("failed to create window");
                NativeWindow::owned(self.native.clone(), handle)
            }
        };
        let handle = native.handle();

        let group_name = (!foreign).then(|| {
            self.native
                .create_window_group(handle)
                .or_fatal("failed to create window group")
        });

        if let Some(window_id) = &request.window_id {
            native
                .set(WindowProperty::IdString(window_id.clone()))
                .or_warn("failed to set window id");
        }

        let sensitivity = if request.window_type.shows_without_activating() || !request.accepts_focus {
            native
                .set(WindowProperty::Sensitivity(Sensitivity::NoFocus))
                .or_warn("failed to set window sensitivity");
            Sensitivity::NoFocus
        } else {
            Sensitivity::Always
        };

        if !foreign {
            native
                .set(WindowProperty::Visible(false))
                .or_warn("failed to set window visibility");
        }
        if request.parent.is_none() {
            native
                .set(WindowProperty::Display(display))
                .or_warn("failed to set window display");
        }

        let surface = match (&request.surface, egl) {
            (SurfaceRequest::Gl(format), Some(egl)) => {
                let size = if is_root && self.options.fullscreen_application {
                    screen_geometry.size()
                } else {
                    request.geometry.size()
                };
                WindowSurface::Gl(Arc::new(GlWindowSurface::new(
                    egl,
                    self.native.clone(),
                    handle,
                    format.resolve(depth),
                    size,
                    self.options.buffer_count,
                )))
            }
            (SurfaceRequest::Foreign(_), _) => WindowSurface::Foreign,
            _ => {
                if request.window_type != WindowType::Desktop {
                    native
                        .set(WindowProperty::Usage(Usage::Raster))
                        .or_fatal("failed to set window usage");
                }
                WindowSurface::Raster(RasterSurface::new(self.native.clone(), handle))
            }
        };

        let id = self.windows.insert(Window {
            surface,
            media_overlay: None,
            native,
            screen: screen_id,
            parent: None,
            children: Vec::new(),
            window_type: request.window_type,
            accepts_focus: request.accepts_focus,
            is_root,
            geometry: Rect::default(),
            visible: false,
            exposed: true,
            state: WindowState::Normal,
            unmaximized_geometry: None,
            opacity: 1.0,
            zorder: 0,
            group_name,
            parent_group: GroupMembership::Unset,
            media_overlay_name: request.media_overlay_name.clone(),
            sensitivity,
            first_activate_handled: false,
            alpha_buffer_size: request.alpha_buffer_size,
        });
        self.registry.insert(handle, id);

        if is_root {
            if let Some(screen) = self.screens.get_mut(screen_id) {
                screen.root = Some(id);
            }
        } else if let Some(parent) = request.parent {
            if let Some(p) = self.windows.get_mut(parent) {
                p.children.push(id);
            }
            if let Some(w) = self.windows.get_mut(id) {
                w.parent = Some(parent);
            }
        } else if let Some(screen) = self.screens.get_mut(screen_id) {
            screen.add_window(id, request.window_type == WindowType::Desktop);
        }

        if let Some(group) = request.initial_group {
            self.join_window_group(id, Some(group))?;
        }

        tracing::debug!(
            target: targets::WINDOW,
            ?id,
            %handle,
            is_root,
            geometry = %request.geometry,
            "window created"
        );

        self.set_geometry(id, request.geometry)?;
        self.set_window_state(id, request.state)?;
        self.set_opacity(id, request.opacity)?;
        self.update_hierarchy(screen_id);
        if request.visible {
            self.set_visible(id, true)?;
        }
        Ok(id)
    }

    /// Destroy a window and its descendants, deepest first.
    pub fn destroy_window(&mut self, id: WindowId) -> ScreenResult<()> {
        self.affinity.debug_assert_same_thread();
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        let screen = window.screen;

        let children = window.children.clone();
        for child in children.into_iter().rev() {
            self.destroy_window(child)?;
        }

        self.unlink(id);
        if let Some(s) = self.screens.get_mut(screen)
            && s.root == Some(id)
        {
            s.root = None;
        }
        if self.focus_window == Some(id) {
            self.focus_window = None;
        }
        if let Some(window) = self.windows.remove(id) {
            self.registry.remove(window.handle());
            tracing::debug!(target: targets::WINDOW, ?id, handle = %window.handle(), "window destroyed");
            // Dropping releases the surface, then the native window.
            drop(window);
        }
        self.update_hierarchy(screen);
        Ok(())
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn contains_window(&self, id: WindowId) -> bool {
        self.windows.contains_key(id)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn window_for_handle(&self, handle: WindowHandle) -> Option<WindowId> {
        self.registry.lookup(handle)
    }

    /// The GL surface of a GL-backed window.
    pub fn gl_surface(&self, id: WindowId) -> ScreenResult<Arc<GlWindowSurface>> {
        match &self.windows.get(id).ok_or(ScreenError::InvalidWindow)?.surface {
            WindowSurface::Gl(surface) => Ok(surface.clone()),
            _ => Err(ScreenError::NotGl),
        }
    }

    /// The window holding keyboard focus, as last reported by the compositor.
    pub fn focus_window(&self) -> Option<WindowId> {
        self.focus_window
    }

    /// Record a focus change and notify the toolkit.
    pub(crate) fn activate(&mut self, window: Option<WindowId>) {
        if self.focus_window == window {
            return;
        }
        self.focus_window = window;
        self.push_event(WindowSystemEvent::WindowActivated { window });
    }

    // =========================================================================
    // Events and diagnostics
    // =========================================================================

    pub(crate) fn push_event(&mut self, event: WindowSystemEvent) {
        tracing::trace!(target: targets::EVENTS, ?event, "queued");
        self.events.push_back(event);
    }

    /// Drain queued toolkit events in FIFO order.
    pub fn take_events(&mut self) -> Vec<WindowSystemEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Render the window tree of every screen.
    pub fn dump_tree(&self) -> String {
        WindowTreeDebug::new().format_all(self)
    }

    pub(crate) fn flush(&self) {
        self.native
            .flush_context()
            .or_warn("failed to flush screen context");
    }

    /// Destroy every window, then every screen.
    pub fn clear(&mut self) {
        let screens: Vec<ScreenId> = self.screen_order.clone();
        for screen in &screens {
            let Some(s) = self.screens.get(*screen) else {
                continue;
            };
            let mut windows = s.top_levels.clone();
            windows.reverse();
            windows.extend(s.root);
            for window in windows {
                if let Err(err) = self.destroy_window(window) {
                    tracing::trace!(target: targets::WINDOW, %err, "window already gone");
                }
            }
        }
        // Windows whose screen went away without them.
        let leftover: Vec<WindowId> = self.windows.keys().collect();
        for window in leftover {
            if self.windows.contains_key(window) {
                let _ = self.destroy_window(window);
            }
        }
        self.screens.clear();
        self.screen_order.clear();
        self.focus_window = None;
    }
}

impl Drop for WindowSystem {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for WindowSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowSystem")
            .field("screens", &self.screens.len())
            .field("windows", &self.windows.len())
            .field("focus_window", &self.focus_window)
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

/// Move `geometry` to the same relative position in `bounds` as it had in
/// `previous`, nudge it back inside, and shrink it if it still does not fit.
pub(crate) fn refit(geometry: Rect, previous: Rect, bounds: Rect) -> Rect {
    if previous.is_empty() {
        return geometry;
    }
    let center = geometry.center();
    let relative_x = f64::from(center.x) / f64::from(previous.width);
    let relative_y = f64::from(center.y) / f64::from(previous.height);
    let mut rect = geometry.with_center(Point::new(
        (relative_x * f64::from(bounds.width)) as i32,
        (relative_y * f64::from(bounds.height)) as i32,
    ));

    if !bounds.contains_rect(&rect) {
        let screen_center = bounds.center();
        let mut center = rect.center();
        if rect.x < bounds.x {
            center.x = (center.x + (bounds.x - rect.x)).min(screen_center.x);
        }
        if rect.y < bounds.y {
            center.y = (center.y + (bounds.y - rect.y)).min(screen_center.y);
        }
        if rect.right() > bounds.right() {
            center.x = (center.x - (rect.right() - bounds.right())).max(screen_center.x);
        }
        if rect.bottom() > bounds.bottom() {
            center.y = (center.y - (rect.bottom() - bounds.bottom())).max(screen_center.y);
        }
        rect = rect.with_center(center);
    }

    if !bounds.contains_rect(&rect) {
        rect = rect.with_size(rect.size().scaled_to_fit(bounds.size()));
        let mut center = rect.center();
        if rect.x < bounds.x {
            center.x = bounds.center().x;
        }
        if rect.y < bounds.y {
            center.y = bounds.center().y;
        }
        rect = rect.with_center(center);
    }
    rect
}
