//! Logging facilities shared by the screen integration crates.
//!
//! Everything is instrumented with `tracing`. Install a subscriber in the
//! host application to see output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_screen=debug,horizon_screen_core=info")
//!     .init();
//! ```
//!
//! The tree formatting helpers here back the window tree dump in
//! `horizon-screen`.

/// Target names for log filtering.
pub mod targets {
    /// Native compositor call failures and diagnostics.
    pub const NATIVE: &str = "horizon_screen_core::native";
    /// In-process headless compositor.
    pub const HEADLESS: &str = "horizon_screen_core::headless";
    /// One-shot timers.
    pub const TIMER: &str = "horizon_screen_core::timer";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Show native handles next to each node.
    pub show_handles: bool,
    /// Show geometry and visibility.
    pub show_geometry: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_handles: true,
            show_geometry: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Names only.
    pub fn minimal() -> Self {
        Self {
            show_handles: false,
            show_geometry: false,
            ..Default::default()
        }
    }

    /// Build the line prefix for a node at `depth`.
    pub fn prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix
    }
}
