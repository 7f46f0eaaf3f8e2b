//! Parent/child links, stacking, visibility, groups and activation.

use horizon_screen_core::{GroupName, Rect, Sensitivity, WindowProperty};

use super::{GroupMembership, WindowId, WindowType};
use crate::error::{CheckNative, ScreenError, ScreenResult};
use crate::events::WindowSystemEvent;
use crate::logging::targets;
use crate::screen::ScreenId;
use crate::system::WindowSystem;

impl WindowSystem {
    /// Move `id` under `parent`, or make it a top-level window with `None`.
    ///
    /// The window joins the new parent's group. A window made top-level
    /// leaves its group. Effective visibility is recomputed for the new
    /// subtree.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn set_parent(&mut self, id: WindowId, parent: Option<WindowId>) -> ScreenResult<()> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        if window.is_root {
            return Err(ScreenError::RootReparent);
        }
        if window.parent == parent {
            return Ok(());
        }
        let old_screen = window.screen;
        let is_desktop = window.window_type == WindowType::Desktop;

        if let Some(parent) = parent {
            if !self.windows.contains_key(parent) {
                return Err(ScreenError::InvalidWindow);
            }
            if parent == id || self.is_ancestor(id, parent) {
                return Err(ScreenError::CircularParentage);
            }
        }

        self.unlink(id);
        let screen = match parent {
            Some(parent) => {
                let p = self.windows.get_mut(parent).ok_or(ScreenError::InvalidWindow)?;
                p.children.push(id);
                let screen = p.screen;
                if let Some(window) = self.windows.get_mut(id) {
                    window.parent = Some(parent);
                }
                screen
            }
            None => {
                if let Some(s) = self.screens.get_mut(old_screen) {
                    s.add_window(id, is_desktop);
                }
                old_screen
            }
        };

        let group = parent
            .and_then(|p| self.windows.get(p))
            .and_then(|p| p.group_name.clone());
        self.join_window_group(id, group)?;
        self.assign_screen(id, screen);
        let top = self.top_ancestor(id);
        self.update_visibility(top, true);

        tracing::debug!(target: targets::WINDOW, ?id, ?parent, "window reparented");
        self.update_hierarchy(screen);
        if screen != old_screen {
            self.update_hierarchy(old_screen);
        }
        Ok(())
    }

    /// Move a top-level window and its subtree to another screen.
    pub(crate) fn set_screen(&mut self, id: WindowId, screen: ScreenId) {
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        let old = window.screen;
        if old == screen || window.parent.is_some() {
            return;
        }
        let is_desktop = window.window_type == WindowType::Desktop;
        // A root window becomes an ordinary top-level on its new screen.
        window.is_root = false;

        if let Some(s) = self.screens.get_mut(old) {
            if s.root == Some(id) {
                s.root = None;
            } else {
                s.remove_window(id);
            }
        }
        if let Some(s) = self.screens.get_mut(screen) {
            s.add_window(id, is_desktop);
        }
        self.assign_screen(id, screen);
        tracing::debug!(target: targets::WINDOW, ?id, "window moved to another screen");

        self.update_hierarchy(old);
        self.update_hierarchy(screen);
    }

    /// Record `screen` on the subtree; top-level windows also move natively.
    fn assign_screen(&mut self, id: WindowId, screen: ScreenId) {
        let Some(display) = self.screens.get(screen).map(|s| s.display()) else {
            return;
        };
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        window.screen = screen;
        if window.parent.is_none() && !window.is_foreign() {
            window
                .native
                .set(WindowProperty::Display(display))
                .or_warn("failed to set window display");
        }
        let children = window.children.clone();
        for child in children {
            self.assign_screen(child, screen);
        }
    }

    /// Detach `id` from its parent or from its screen's top-level list.
    pub(crate) fn unlink(&mut self, id: WindowId) {
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        let screen = window.screen;
        match window.parent.take() {
            Some(parent) => {
                if let Some(p) = self.windows.get_mut(parent) {
                    p.children.retain(|&c| c != id);
                }
            }
            None => {
                if let Some(s) = self.screens.get_mut(screen) {
                    s.remove_window(id);
                }
            }
        }
    }

    /// The group a window joins on first show: its parent's, or else the
    /// root window's on `screen`.
    fn group_for(
        &self,
        id: WindowId,
        parent: Option<WindowId>,
        screen: ScreenId,
    ) -> Option<GroupName> {
        let owner = parent.or_else(|| {
            self.screens
                .get(screen)
                .and_then(|s| s.root)
                .filter(|&root| root != id)
        })?;
        self.windows.get(owner)?.group_name.clone()
    }

    /// Whether `ancestor` is above `id` in the tree.
    pub fn is_ancestor(&self, ancestor: WindowId, id: WindowId) -> bool {
        let mut current = self.windows.get(id).and_then(|w| w.parent);
        while let Some(window) = current {
            if window == ancestor {
                return true;
            }
            current = self.windows.get(window).and_then(|w| w.parent);
        }
        false
    }

    fn top_ancestor(&self, id: WindowId) -> WindowId {
        let mut top = id;
        while let Some(parent) = self.windows.get(top).and_then(|w| w.parent) {
            top = parent;
        }
        top
    }

    /// Join `group`, or leave any group with `None`.
    pub fn join_window_group(&mut self, id: WindowId, group: Option<GroupName>) -> ScreenResult<()> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        let membership = match group {
            Some(group) => GroupMembership::Joined(group),
            None => GroupMembership::Detached,
        };
        if window.parent_group == membership {
            return Ok(());
        }

        let handle = window.handle();
        match &membership {
            GroupMembership::Joined(group) => {
                self.native
                    .join_window_group(handle, group)
                    .or_warn("failed to join window group");
            }
            _ => {
                if matches!(window.parent_group, GroupMembership::Joined(_)) {
                    self.native
                        .leave_window_group(handle)
                        .or_warn("failed to leave window group");
                }
            }
        }
        tracing::trace!(target: targets::WINDOW, ?id, ?membership, "group membership changed");
        window.parent_group = membership;
        self.flush();
        Ok(())
    }

    /// Raise a window above its siblings.
    pub fn raise(&mut self, id: WindowId) -> ScreenResult<()> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        if window.window_type == WindowType::Desktop {
            return Ok(());
        }
        let screen = window.screen;
        match window.parent {
            Some(parent) => {
                if let Some(p) = self.windows.get_mut(parent) {
                    p.children.retain(|&c| c != id);
                    p.children.push(id);
                }
            }
            None => {
                if let Some(s) = self.screens.get_mut(screen) {
                    s.raise_window(id);
                }
            }
        }
        self.update_hierarchy(screen);
        Ok(())
    }

    /// Lower a window below its siblings, but never below a desktop window.
    pub fn lower(&mut self, id: WindowId) -> ScreenResult<()> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        if window.window_type == WindowType::Desktop {
            return Ok(());
        }
        let screen = window.screen;
        match window.parent {
            Some(parent) => {
                if let Some(p) = self.windows.get_mut(parent) {
                    p.children.retain(|&c| c != id);
                    p.children.insert(0, id);
                }
            }
            None => {
                let desktops = self.screens.get(screen).map_or(0, |s| {
                    s.top_levels
                        .iter()
                        .filter(|&&w| {
                            self.windows
                                .get(w)
                                .is_some_and(|w| w.window_type == WindowType::Desktop)
                        })
                        .count()
                });
                if let Some(s) = self.screens.get_mut(screen) {
                    s.lower_window(id, desktops);
                }
            }
        }
        self.update_hierarchy(screen);
        Ok(())
    }

    /// Show or hide a window.
    ///
    /// The first show joins the parent's group (or the root window's). A
    /// window is only shown natively while every ancestor is visible too.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn set_visible(&mut self, id: WindowId, visible: bool) -> ScreenResult<()> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        if window.window_type == WindowType::Desktop || window.visible == visible {
            return Ok(());
        }

        if visible && window.parent_group == GroupMembership::Unset && window.group_name.is_some() {
            let group = self.group_for(id, window.parent, window.screen);
            self.join_window_group(id, group)?;
        }

        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        window.visible = visible;
        let local = Rect::from_size(window.geometry.size());
        tracing::debug!(target: targets::WINDOW, ?id, visible, "visibility changed");

        let top = self.top_ancestor(id);
        self.update_visibility(top, true);
        self.push_event(WindowSystemEvent::Expose {
            window: id,
            region: if visible { local } else { Rect::default() },
        });

        if visible {
            self.apply_window_state(id)?;
        } else if let Some(window) = self.windows.get_mut(id) {
            if window.activates_on_request_only() && window.sensitivity == Sensitivity::Test {
                window
                    .native
                    .set(WindowProperty::Sensitivity(Sensitivity::NoFocus))
                    .or_warn("failed to reset window sensitivity");
                window.sensitivity = Sensitivity::NoFocus;
            }
            window.first_activate_handled = false;
        }
        self.flush();
        Ok(())
    }

    /// Push effective visibility down the subtree.
    fn update_visibility(&mut self, id: WindowId, parent_visible: bool) {
        let Some(window) = self.windows.get(id) else {
            return;
        };
        let effective = window.visible && parent_visible;
        window
            .native
            .set(WindowProperty::Visible(effective))
            .or_warn("failed to set window visibility");
        let children = window.children.clone();
        for child in children {
            self.update_visibility(child, effective);
        }
    }

    /// Whether the window and every ancestor are visible.
    pub fn is_effectively_visible(&self, id: WindowId) -> bool {
        let mut current = Some(id);
        while let Some(window) = current.and_then(|id| self.windows.get(id)) {
            if !window.visible {
                return false;
            }
            current = window.parent;
        }
        current.is_none() && self.windows.contains_key(id)
    }

    /// Ask the compositor to focus `id`.
    ///
    /// Focus is granted group by group, so every window on the path from
    /// the current focus holder (or the top of the tree) down to `id` is
    /// focused inside its owner's group in turn.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn request_activate_window(&mut self, id: WindowId) -> ScreenResult<()> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        if self.focus_window == Some(id) || !window.accepts_focus || window.group_name.is_none() {
            return Ok(());
        }

        if window.activates_on_request_only() && !window.first_activate_handled {
            window
                .native
                .set(WindowProperty::Sensitivity(Sensitivity::Test))
                .or_warn("failed to set window sensitivity");
            window.sensitivity = Sensitivity::Test;
            window.first_activate_handled = true;
        }
        let handle = window.handle();
        let is_root = window.is_root;

        let focus_below = self.focus_window.is_some_and(|focus| self.is_ancestor(id, focus));
        if is_root || focus_below {
            self.native
                .set_group_focus(handle, handle)
                .or_warn("failed to focus window");
        } else {
            let chain = self.focus_chain(id);
            for pair in chain.windows(2) {
                let (Some(owner), Some(target)) =
                    (self.windows.get(pair[0]), self.windows.get(pair[1]))
                else {
                    continue;
                };
                self.native
                    .set_group_focus(owner.handle(), target.handle())
                    .or_warn("failed to focus window in group");
            }
            self.native
                .set_group_focus(handle, handle)
                .or_warn("failed to focus window");
        }
        tracing::trace!(target: targets::WINDOW, ?id, "activation requested");
        self.flush();
        Ok(())
    }

    /// Windows from the outermost group owner down to `id`.
    fn focus_chain(&self, id: WindowId) -> Vec<WindowId> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            let Some(window) = self.windows.get(current) else {
                break;
            };
            match window.parent {
                Some(parent) => {
                    chain.push(parent);
                    if self.focus_window == Some(parent) {
                        break;
                    }
                    current = parent;
                }
                None => {
                    let root = self
                        .screens
                        .get(window.screen)
                        .and_then(|s| s.root)
                        .filter(|&root| root != current);
                    if let Some(root) = root {
                        let root_group = self.windows.get(root).and_then(|r| r.group_name.as_ref());
                        if root_group.is_some() && window.parent_group.group() == root_group {
                            chain.push(root);
                        }
                    }
                    break;
                }
            }
        }
        chain.reverse();
        chain
    }
}
