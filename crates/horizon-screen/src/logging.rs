//! Logging targets and window tree dumps.
//!
//! Filter output per subsystem with the targets below, for example
//! `RUST_LOG=horizon_screen::events=trace,horizon_screen=info`.

use std::fmt::Write;

pub use horizon_screen_core::logging::{TreeFormatOptions, TreeStyle};

use crate::screen::ScreenId;
use crate::system::WindowSystem;
use crate::window::WindowId;

/// Target names for log filtering.
pub mod targets {
    /// Window creation, hierarchy and state.
    pub const WINDOW: &str = "horizon_screen::window";
    /// Screen discovery, rotation and stacking.
    pub const SCREEN: &str = "horizon_screen::screen";
    /// Render buffers and posting.
    pub const BUFFER: &str = "horizon_screen::buffer";
    /// The event pump thread.
    pub const EVENT_THREAD: &str = "horizon_screen::event_thread";
    /// Native event translation.
    pub const EVENTS: &str = "horizon_screen::events";
    /// EGL contexts and surfaces.
    pub const GL: &str = "horizon_screen::gl";
    /// Integration setup and configuration.
    pub const INTEGRATION: &str = "horizon_screen::integration";
    /// Native call failures.
    pub const NATIVE: &str = "horizon_screen::native";
}

/// Renders the window tree of every screen as text.
#[derive(Debug, Clone, Default)]
pub struct WindowTreeDebug {
    options: TreeFormatOptions,
}

impl WindowTreeDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format every screen with its root, top-level windows and overlays.
    pub fn format_all(&self, system: &WindowSystem) -> String {
        let mut output = String::new();
        writeln!(output, "Window Tree ({} windows):", system.window_count())
            .expect("write to String");

        let screens: Vec<ScreenId> = system.screen_ids().collect();
        if screens.is_empty() {
            writeln!(output, "  (no screens)").expect("write to String");
        }
        for id in screens {
            self.format_screen_into(system, id, &mut output);
        }
        output
    }

    /// Format one window and its descendants.
    pub fn format_subtree(&self, system: &WindowSystem, root: WindowId) -> String {
        let mut output = String::new();
        self.format_window_into(system, root, 0, true, &mut output);
        output
    }

    fn format_screen_into(&self, system: &WindowSystem, id: ScreenId, output: &mut String) {
        let Some(screen) = system.screen(id) else {
            return;
        };
        write!(output, "screen {}", screen.display()).expect("write to String");
        if screen.is_primary() {
            output.push_str(" (primary)");
        }
        if self.options.show_geometry {
            write!(output, " {} rot={}", screen.geometry(), screen.rotation())
                .expect("write to String");
        }
        output.push('\n');

        let mut nodes: Vec<WindowId> = screen.root_window().into_iter().collect();
        nodes.extend_from_slice(screen.top_levels());
        let overlays: Vec<_> = screen.overlay_handles().collect();

        for (i, &window) in nodes.iter().enumerate() {
            let is_last = i + 1 == nodes.len() && overlays.is_empty();
            self.format_window_into(system, window, 1, is_last, output);
        }
        for (i, handle) in overlays.iter().enumerate() {
            output.push_str(&self.options.prefix(1, i + 1 == overlays.len()));
            writeln!(output, "overlay {handle}").expect("write to String");
        }
    }

    fn format_window_into(
        &self,
        system: &WindowSystem,
        id: WindowId,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) {
        if let Some(max) = self.options.max_depth
            && depth > max
        {
            return;
        }
        let Some(window) = system.window(id) else {
            return;
        };

        output.push_str(&self.options.prefix(depth, is_last));
        write!(output, "{}", window.surface().kind_name()).expect("write to String");
        if window.is_root() {
            output.push_str(" (root)");
        }
        if self.options.show_handles {
            write!(output, " [{}]", window.handle()).expect("write to String");
        }
        if self.options.show_geometry {
            write!(
                output,
                " {} z={}{}",
                window.geometry(),
                window.zorder(),
                if window.is_visible() { "" } else { " hidden" }
            )
            .expect("write to String");
        }
        output.push('\n');

        if let Some(overlay) = window.media_overlay() {
            output.push_str(&self.options.prefix(depth + 1, window.children().is_empty()));
            writeln!(output, "media overlay {overlay}").expect("write to String");
        }

        let children = window.children();
        for (i, &child) in children.iter().enumerate() {
            self.format_window_into(system, child, depth + 1, i + 1 == children.len(), output);
        }
    }
}
