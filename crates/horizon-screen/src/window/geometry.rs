//! Geometry, window state, opacity and exposure.

use horizon_screen_core::{Point, Rect, Size, WindowProperty};

use super::{WindowId, WindowState, WindowSurface, WindowType};
use crate::error::{CheckNative, ScreenError, ScreenResult};
use crate::events::WindowSystemEvent;
use crate::logging::targets;
use crate::system::WindowSystem;

impl WindowSystem {
    /// Move and resize a window.
    ///
    /// A full-screen application's root window always takes the whole
    /// screen, whatever `rect` says.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn set_geometry(&mut self, id: WindowId, rect: Rect) -> ScreenResult<()> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        let screen = self.screens.get(window.screen).ok_or(ScreenError::InvalidScreen)?;
        let rect = if window.is_root && self.options.fullscreen_application {
            screen.geometry()
        } else {
            rect
        };

        if let WindowSurface::Gl(surface) = &window.surface {
            surface.request_size(rect.size());
        }

        if window.window_type != WindowType::Desktop && !window.is_foreign() {
            let native = &window.native;
            native
                .set(WindowProperty::Position(rect.origin()))
                .or_warn("failed to set window position");
            native
                .set(WindowProperty::Size(rect.size()))
                .or_warn("failed to set window size");
            native
                .set(WindowProperty::SourceSize(rect.size()))
                .or_warn("failed to set window source size");
            self.flush();
        }

        let is_raster = matches!(window.surface, WindowSurface::Raster(_))
            && window.window_type != WindowType::Desktop;
        // Children are painted into their top-level's buffers; their own
        // stay minimal.
        let buffer_size = if window.parent.is_none() {
            rect.size()
        } else {
            Size::ZERO
        };

        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        window.geometry = rect;
        let exposed = window.is_exposed();
        tracing::trace!(target: targets::WINDOW, ?id, %rect, "geometry changed");

        if is_raster {
            self.set_buffer_size(id, buffer_size)?;
        }
        self.push_event(WindowSystemEvent::GeometryChanged {
            window: id,
            geometry: rect,
        });
        if exposed {
            self.push_event(WindowSystemEvent::Expose {
                window: id,
                region: Rect::from_size(rect.size()),
            });
        }
        Ok(())
    }

    /// Change the window state. Takes effect now if the window is visible,
    /// otherwise when it is next shown.
    pub fn set_window_state(&mut self, id: WindowId, state: WindowState) -> ScreenResult<()> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        if window.state == state {
            return Ok(());
        }
        if window.state == WindowState::Normal
            && matches!(state, WindowState::Maximized | WindowState::FullScreen)
        {
            window.unmaximized_geometry = Some(window.geometry);
        }
        tracing::debug!(target: targets::WINDOW, ?id, from = ?window.state, to = ?state, "window state changed");
        window.state = state;

        if window.visible {
            self.apply_window_state(id)?;
        }
        Ok(())
    }

    pub(crate) fn apply_window_state(&mut self, id: WindowId) -> ScreenResult<()> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        let screen = self.screens.get(window.screen).ok_or(ScreenError::InvalidScreen)?;

        let geometry = match window.state {
            WindowState::Maximized => Some(screen.available_geometry()),
            WindowState::FullScreen => Some(screen.geometry()),
            WindowState::Normal => window.unmaximized_geometry.take(),
            WindowState::Minimized => {
                tracing::warn!(target: targets::WINDOW, ?id, "minimized windows are not supported");
                Some(
                    window
                        .unmaximized_geometry
                        .take()
                        .unwrap_or_else(|| screen.geometry()),
                )
            }
        };
        match geometry {
            Some(geometry) => self.set_geometry(id, geometry),
            None => Ok(()),
        }
    }

    /// Set the global alpha from an opacity in `0.0..=1.0`.
    pub fn set_opacity(&mut self, id: WindowId, level: f64) -> ScreenResult<()> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        let alpha = (level * 255.0).round().clamp(0.0, 255.0) as i32;
        window
            .native
            .set(WindowProperty::GlobalAlpha(alpha))
            .or_warn("failed to set window opacity");
        window.opacity = level.clamp(0.0, 1.0);
        self.flush();
        Ok(())
    }

    /// Record an exposure change reported by a window delegate.
    pub fn set_exposed(&mut self, id: WindowId, exposed: bool) -> ScreenResult<()> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        window.exposed = exposed;
        let region = if exposed {
            Rect::from_size(window.geometry.size())
        } else {
            Rect::default()
        };
        self.push_event(WindowSystemEvent::Expose { window: id, region });
        Ok(())
    }

    /// Adopt a geometry the compositor reports for the window, without
    /// writing it back.
    pub(crate) fn native_geometry_changed(&mut self, id: WindowId, rect: Rect) {
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        if window.geometry == rect {
            return;
        }
        if let WindowSurface::Gl(surface) = &window.surface {
            surface.request_size(rect.size());
        }
        window.geometry = rect;
        self.push_event(WindowSystemEvent::GeometryChanged {
            window: id,
            geometry: rect,
        });
    }

    /// Translate a window-local point to screen coordinates.
    pub fn map_to_global(&self, id: WindowId, local: Point) -> Point {
        let mut point = local;
        let mut current = Some(id);
        while let Some(window) = current.and_then(|id| self.windows.get(id)) {
            point = point.offset(window.geometry.x, window.geometry.y);
            current = window.parent;
        }
        point
    }

    /// Rotate a window's content, in degrees.
    pub fn set_rotation(&mut self, id: WindowId, rotation: i32) -> ScreenResult<()> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        window
            .native
            .set(WindowProperty::Rotation(rotation))
            .or_warn("failed to set window rotation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use horizon_screen_core::headless::HeadlessScreen;
    use horizon_screen_core::{Rect, ScreenApi, Transparency};

    use crate::options::IntegrationOptions;
    use crate::system::WindowSystem;
    use crate::window::{WindowRequest, WindowState};

    fn system() -> (Arc<HeadlessScreen>, WindowSystem) {
        let native = Arc::new(HeadlessScreen::new());
        let display = native.displays().unwrap()[0];
        let mut system = WindowSystem::new(native.clone(), None, IntegrationOptions::default());
        system.add_screen(display, true).unwrap();
        (native, system)
    }

    #[test]
    fn test_geometry_reaches_compositor() {
        let (native, mut system) = system();
        let id = system.create_window(WindowRequest::raster(Rect::new(10, 20, 300, 200))).unwrap();
        let snapshot = native.window_snapshot(system.window(id).unwrap().handle()).unwrap();
        assert_eq!(snapshot.position.x, 10);
        assert_eq!(snapshot.size.width, 300);
        assert_eq!(snapshot.buffer_size.height, 200);
        assert_eq!(snapshot.buffers.len(), 2);
    }

    #[test]
    fn test_child_buffer_is_minimal() {
        let (native, mut system) = system();
        let parent = system.create_window(WindowRequest::raster(Rect::new(0, 0, 300, 200))).unwrap();
        let child = system
            .create_window(WindowRequest::raster(Rect::new(5, 5, 50, 50)).with_parent(parent))
            .unwrap();
        let snapshot = native.window_snapshot(system.window(child).unwrap().handle()).unwrap();
        assert_eq!(snapshot.buffer_size, horizon_screen_core::Size::new(1, 1));
        assert_eq!(snapshot.transparency, Transparency::Discard);
    }

    #[test]
    fn test_maximize_and_restore() {
        let (_native, mut system) = system();
        let id = system
            .create_window(WindowRequest::raster(Rect::new(10, 10, 100, 100)).visible(true))
            .unwrap();
        let screen = system.primary_screen().unwrap();
        system.set_keyboard_height(screen, 100).unwrap();

        system.set_window_state(id, WindowState::Maximized).unwrap();
        assert_eq!(system.window(id).unwrap().geometry(), Rect::new(0, 0, 1024, 668));

        system.set_window_state(id, WindowState::Normal).unwrap();
        assert_eq!(system.window(id).unwrap().geometry(), Rect::new(10, 10, 100, 100));
    }

    #[test]
    fn test_hidden_window_defers_state() {
        let (_native, mut system) = system();
        let id = system.create_window(WindowRequest::raster(Rect::new(10, 10, 100, 100))).unwrap();
        system.set_window_state(id, WindowState::FullScreen).unwrap();
        assert_eq!(system.window(id).unwrap().geometry(), Rect::new(10, 10, 100, 100));

        system.set_visible(id, true).unwrap();
        assert_eq!(system.window(id).unwrap().geometry(), Rect::new(0, 0, 1024, 768));
    }

    #[test]
    fn test_opacity_clamps() {
        let (native, mut system) = system();
        let id = system.create_window(WindowRequest::raster(Rect::new(0, 0, 10, 10))).unwrap();
        system.set_opacity(id, 0.5).unwrap();
        let handle = system.window(id).unwrap().handle();
        assert_eq!(native.window_snapshot(handle).unwrap().global_alpha, 128);
        system.set_opacity(id, 3.0).unwrap();
        assert_eq!(native.window_snapshot(handle).unwrap().global_alpha, 255);
    }
}
