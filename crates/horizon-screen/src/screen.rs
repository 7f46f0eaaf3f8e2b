//! Screens: one per display.
//!
//! A [`Screen`] caches a display's geometry and rotation and owns the
//! stacking order of its top-level windows, with the root window (if any)
//! at the bottom and foreign overlay windows in a band above everything.
//! Operations that have to touch windows as well live on
//! [`WindowSystem`](crate::WindowSystem).

use horizon_screen_core::{
    DisplayHandle, DisplayInfo, NativeWindow, PixelFormat, Point, Rect, Size, WindowHandle,
};
use slotmap::new_key_type;

use crate::events::ScreenOrientation;
use crate::logging::targets;
use crate::options::IntegrationOptions;
use crate::window::WindowId;

new_key_type! {
    /// Identifies a screen in the window system.
    pub struct ScreenId;
}

const DEFAULT_REFRESH_RATE: u32 = 60;

/// Whether two rotations differ by 90 or 270 degrees.
pub fn is_orthogonal(a: i32, b: i32) -> bool {
    (a - b) % 180 != 0
}

/// State of one display.
#[derive(Debug)]
pub struct Screen {
    display: DisplayHandle,
    primary: bool,
    initial_geometry: Rect,
    current_geometry: Rect,
    initial_physical_size: Size,
    current_physical_size: Size,
    initial_rotation: i32,
    current_rotation: i32,
    native_orientation: ScreenOrientation,
    depth: u32,
    keyboard_height: i32,
    refresh_rate: u32,
    pub(crate) root: Option<WindowId>,
    pub(crate) top_levels: Vec<WindowId>,
    pub(crate) overlays: Vec<NativeWindow>,
}

impl Screen {
    pub(crate) fn new(info: &DisplayInfo, primary: bool, options: &IntegrationOptions) -> Self {
        let geometry = Rect::from_size(info.size);

        // Drivers report the physical size in the native orientation.
        let mut physical = info.physical_size;
        if physical.is_empty() {
            physical = options.fallback_physical_size();
            tracing::warn!(
                target: targets::SCREEN,
                display = %info.id,
                size = %physical,
                "display has no physical size, using fallback"
            );
        }
        let native_orientation = if physical.width >= physical.height {
            ScreenOrientation::Landscape
        } else {
            ScreenOrientation::Portrait
        };
        let physical = if is_orthogonal(0, info.rotation) {
            physical.transposed()
        } else {
            physical
        };

        let refresh_rate = match info.refresh_rate {
            Some(rate) if rate > 0 => rate,
            _ => {
                tracing::warn!(
                    target: targets::SCREEN,
                    display = %info.id,
                    "display mode has no refresh rate, assuming {DEFAULT_REFRESH_RATE} Hz"
                );
                DEFAULT_REFRESH_RATE
            }
        };

        Self {
            display: info.id,
            primary,
            initial_geometry: geometry,
            current_geometry: geometry,
            initial_physical_size: physical,
            current_physical_size: physical,
            initial_rotation: info.rotation,
            current_rotation: info.rotation,
            native_orientation,
            depth: options.display_depth,
            keyboard_height: 0,
            refresh_rate,
            root: None,
            top_levels: Vec::new(),
            overlays: Vec::new(),
        }
    }

    pub fn display(&self) -> DisplayHandle {
        self.display
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn geometry(&self) -> Rect {
        self.current_geometry
    }

    /// Geometry minus the area covered by the on-screen keyboard.
    pub fn available_geometry(&self) -> Rect {
        let g = self.current_geometry;
        Rect::new(g.x, g.y, g.width, g.height - self.keyboard_height)
    }

    /// Physical size in millimetres, following the current rotation.
    pub fn physical_size(&self) -> Size {
        self.current_physical_size
    }

    pub fn rotation(&self) -> i32 {
        self.current_rotation
    }

    pub fn native_orientation(&self) -> ScreenOrientation {
        self.native_orientation
    }

    /// Orientation of the content at the current rotation.
    pub fn orientation(&self) -> ScreenOrientation {
        use ScreenOrientation::*;
        let rotation = self.current_rotation.rem_euclid(360);
        match (self.native_orientation, rotation) {
            (Landscape, 0) => Landscape,
            (Landscape, 90) => Portrait,
            (Landscape, 180) => InvertedLandscape,
            (Landscape, _) => InvertedPortrait,
            (_, 0) => Portrait,
            (_, 90) => Landscape,
            (_, 180) => InvertedPortrait,
            (_, _) => InvertedLandscape,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Pixel format for raster windows on this screen.
    pub fn native_format(&self) -> PixelFormat {
        if self.depth == 32 {
            PixelFormat::Rgba8888
        } else {
            PixelFormat::Rgb565
        }
    }

    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    pub fn keyboard_height(&self) -> i32 {
        self.keyboard_height
    }

    pub fn root_window(&self) -> Option<WindowId> {
        self.root
    }

    /// Top-level windows from bottom to top.
    pub fn top_levels(&self) -> &[WindowId] {
        &self.top_levels
    }

    pub fn overlay_handles(&self) -> impl Iterator<Item = WindowHandle> + '_ {
        self.overlays.iter().map(NativeWindow::handle)
    }

    /// Record a new rotation. Returns `None` if unchanged, otherwise whether
    /// the change is orthogonal to the previous rotation.
    pub(crate) fn apply_rotation(&mut self, rotation: i32) -> Option<bool> {
        if rotation == self.current_rotation {
            return None;
        }
        let orthogonal = is_orthogonal(self.current_rotation, rotation);
        self.current_rotation = rotation;

        // Always derived from the power-on values so repeated rotation cannot drift.
        if is_orthogonal(self.initial_rotation, rotation) {
            self.current_geometry = Rect::from_size(self.initial_geometry.size().transposed());
            self.current_physical_size = self.initial_physical_size.transposed();
        } else {
            self.current_geometry = Rect::from_size(self.initial_geometry.size());
            self.current_physical_size = self.initial_physical_size;
        }
        Some(orthogonal)
    }

    /// Returns `false` if the height is unchanged.
    pub(crate) fn set_keyboard_height(&mut self, height: i32) -> bool {
        if height == self.keyboard_height {
            return false;
        }
        self.keyboard_height = height;
        true
    }

    /// Add a top-level window. Desktop windows go below everything else.
    pub(crate) fn add_window(&mut self, id: WindowId, is_desktop: bool) -> bool {
        if self.top_levels.contains(&id) {
            return false;
        }
        if is_desktop {
            self.top_levels.insert(0, id);
        } else {
            self.top_levels.push(id);
        }
        true
    }

    pub(crate) fn remove_window(&mut self, id: WindowId) -> bool {
        let before = self.top_levels.len();
        self.top_levels.retain(|&w| w != id);
        before != self.top_levels.len()
    }

    pub(crate) fn raise_window(&mut self, id: WindowId) -> bool {
        if !self.remove_window(id) {
            return false;
        }
        self.top_levels.push(id);
        true
    }

    /// Move a window to the bottom, but above any desktop windows.
    pub(crate) fn lower_window(&mut self, id: WindowId, desktop_count: usize) -> bool {
        if !self.remove_window(id) {
            return false;
        }
        let at = desktop_count.min(self.top_levels.len());
        self.top_levels.insert(at, id);
        true
    }

    pub(crate) fn add_overlay(&mut self, overlay: NativeWindow) -> bool {
        if self.overlays.iter().any(|o| o.handle() == overlay.handle()) {
            return false;
        }
        self.overlays.push(overlay);
        true
    }

    pub(crate) fn remove_overlay(&mut self, handle: WindowHandle) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|o| o.handle() != handle);
        before != self.overlays.len()
    }

    pub(crate) fn contains_point(&self, point: Point) -> bool {
        self.current_geometry.contains_point(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn screen(size: Size, physical: Size, rotation: i32) -> Screen {
        let info = DisplayInfo {
            id: DisplayHandle::from_raw(1),
            size,
            physical_size: physical,
            rotation,
            attached: true,
            refresh_rate: None,
        };
        Screen::new(&info, true, &IntegrationOptions::default())
    }

    #[test]
    fn test_orthogonal() {
        assert!(is_orthogonal(0, 90));
        assert!(is_orthogonal(90, 0));
        assert!(is_orthogonal(0, 270));
        assert!(!is_orthogonal(0, 180));
        assert!(!is_orthogonal(90, 270));
    }

    #[test]
    fn test_rotation_swaps_and_restores() {
        let mut s = screen(Size::new(1024, 768), Size::new(200, 150), 0);
        assert_eq!(s.apply_rotation(90), Some(true));
        assert_eq!(s.geometry().size(), Size::new(768, 1024));
        assert_eq!(s.physical_size(), Size::new(150, 200));
        assert_eq!(s.orientation(), ScreenOrientation::Portrait);

        assert_eq!(s.apply_rotation(180), Some(true));
        assert_eq!(s.geometry().size(), Size::new(1024, 768));
        assert_eq!(s.orientation(), ScreenOrientation::InvertedLandscape);

        assert_eq!(s.apply_rotation(180), None);
        assert_eq!(s.apply_rotation(0), Some(false));
        assert_eq!(s.geometry().size(), Size::new(1024, 768));
    }

    #[test]
    fn test_defaults_for_missing_driver_values() {
        let s = screen(Size::new(800, 480), Size::ZERO, 0);
        assert_eq!(s.physical_size(), Size::new(150, 90));
        assert_eq!(s.refresh_rate(), 60);
        assert_eq!(s.native_orientation(), ScreenOrientation::Landscape);
        assert_eq!(s.native_format(), PixelFormat::Rgba8888);
    }

    #[test]
    fn test_portrait_native_orientation() {
        let s = screen(Size::new(480, 800), Size::new(60, 100), 0);
        assert_eq!(s.orientation(), ScreenOrientation::Portrait);
    }

    #[test]
    fn test_keyboard_height_shrinks_available() {
        let mut s = screen(Size::new(1024, 768), Size::new(200, 150), 0);
        assert!(s.set_keyboard_height(300));
        assert!(!s.set_keyboard_height(300));
        assert_eq!(s.available_geometry(), Rect::new(0, 0, 1024, 468));
        assert_eq!(s.geometry().height, 768);
    }

    #[test]
    fn test_desktop_stays_at_bottom() {
        let mut ids: SlotMap<WindowId, ()> = SlotMap::with_key();
        let (a, b, desktop) = (ids.insert(()), ids.insert(()), ids.insert(()));
        let mut s = screen(Size::new(100, 100), Size::new(10, 10), 0);
        s.add_window(a, false);
        s.add_window(b, false);
        s.add_window(desktop, true);
        assert_eq!(s.top_levels(), &[desktop, a, b]);

        s.lower_window(b, 1);
        assert_eq!(s.top_levels(), &[desktop, b, a]);
        s.raise_window(b);
        assert_eq!(s.top_levels(), &[desktop, a, b]);
        assert!(!s.add_window(a, false));
        assert!(s.remove_window(a));
        assert!(!s.remove_window(a));
    }
}
