//! Integration configuration.
//!
//! Options come from three layers, each overriding the one before:
//!
//! 1. A TOML document ([`IntegrationOptions::from_toml_str`]).
//! 2. The platform argument list ([`IntegrationOptions::apply_args`]).
//! 3. The environment ([`IntegrationOptions::apply_env`]).
//!
//! ```
//! use horizon_screen::IntegrationOptions;
//!
//! let mut options = IntegrationOptions::from_toml_str("root-window = true").unwrap();
//! options.apply_args(["no-fullscreen"]);
//! assert!(options.root_window);
//! assert!(!options.fullscreen_application);
//! ```

use std::path::Path;
use std::time::Duration;

use horizon_screen_core::Size;
use serde::Deserialize;

use crate::error::ScreenResult;
use crate::logging::targets;

/// Environment variable with the fallback physical display size, `w,h` in millimetres.
pub const PHYSICAL_SIZE_ENV: &str = "HORIZON_SCREEN_PHYSICAL_SIZE";
/// Environment variable with the display depth, 16 or 32.
pub const DISPLAY_DEPTH_ENV: &str = "HORIZON_SCREEN_DISPLAY_DEPTH";
/// Environment variable overriding every surface's swap interval.
pub const SWAP_INTERVAL_ENV: &str = "HORIZON_SCREEN_SWAP_INTERVAL";

const DEFAULT_PHYSICAL_SIZE: [i32; 2] = [150, 90];

/// Options controlling the integration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IntegrationOptions {
    /// The root window always covers the whole screen.
    pub fullscreen_application: bool,
    /// Create a root window per screen and put top-level windows in its group.
    pub root_window: bool,
    /// Flush the compositor context after every post.
    pub always_flush_screen_context: bool,
    /// Use surfaceless EGL contexts for offscreen surfaces when the driver supports it.
    pub surfaceless_egl_context: bool,
    /// Render buffers per raster window.
    pub buffer_count: usize,
    /// Delay before a focus loss is reported, in milliseconds.
    pub focus_loss_debounce_ms: u64,
    /// Capacity of the channel from the event pump to the owning thread.
    pub event_channel_capacity: usize,
    /// Display depth in bits, 16 or 32.
    pub display_depth: u32,
    /// Physical size used when a display reports none, in millimetres.
    pub fallback_physical_size: [i32; 2],
    /// Swap interval that overrides every surface's own.
    pub swap_interval_override: Option<i32>,
    /// Capability flags passed when opening the compositor context.
    pub context_capabilities: Option<i64>,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            fullscreen_application: true,
            root_window: false,
            always_flush_screen_context: false,
            surfaceless_egl_context: true,
            buffer_count: 2,
            focus_loss_debounce_ms: 50,
            event_channel_capacity: 256,
            display_depth: 32,
            fallback_physical_size: DEFAULT_PHYSICAL_SIZE,
            swap_interval_override: None,
            context_capabilities: None,
        }
    }
}

impl IntegrationOptions {
    /// Parse options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> ScreenResult<Self> {
        let options: Self = toml::from_str(source)?;
        Ok(options.normalized())
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ScreenResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Defaults overridden by a platform argument list.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        options.apply_args(args);
        options
    }

    /// Apply platform arguments such as `no-fullscreen` or `rootwindow`.
    pub fn apply_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref().trim();
            match arg {
                "no-fullscreen" => self.fullscreen_application = false,
                "rootwindow" => self.root_window = true,
                "flush-screen-context" => self.always_flush_screen_context = true,
                "disable-EGL_KHR_surfaceless_context" => self.surfaceless_egl_context = false,
                _ => {
                    if let Some(value) = arg.strip_prefix("screen-context-capabilities=") {
                        match parse_int_auto_base(value) {
                            Some(caps) => self.context_capabilities = Some(caps),
                            None => tracing::warn!(
                                target: targets::INTEGRATION,
                                value,
                                "ignoring malformed screen-context-capabilities"
                            ),
                        }
                    } else {
                        tracing::trace!(target: targets::INTEGRATION, arg, "unknown platform argument");
                    }
                }
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(PHYSICAL_SIZE_ENV) {
            self.fallback_physical_size = match parse_physical_size(&value) {
                Some(size) => size,
                None => {
                    tracing::warn!(
                        target: targets::INTEGRATION,
                        value,
                        "{PHYSICAL_SIZE_ENV} must be `width,height` in millimetres, using 150x90"
                    );
                    DEFAULT_PHYSICAL_SIZE
                }
            };
        }
        if let Some(value) = lookup(DISPLAY_DEPTH_ENV) {
            self.display_depth = value.trim().parse().unwrap_or(32);
        }
        if let Some(value) = lookup(SWAP_INTERVAL_ENV) {
            match value.trim().parse() {
                Ok(interval) => self.swap_interval_override = Some(interval),
                Err(_) => tracing::warn!(
                    target: targets::INTEGRATION,
                    value,
                    "ignoring malformed {SWAP_INTERVAL_ENV}"
                ),
            }
        }
        *self = std::mem::take(self).normalized();
    }

    pub fn focus_loss_debounce(&self) -> Duration {
        Duration::from_millis(self.focus_loss_debounce_ms)
    }

    pub fn fallback_physical_size(&self) -> Size {
        Size::new(self.fallback_physical_size[0], self.fallback_physical_size[1])
    }

    pub(crate) fn normalized(mut self) -> Self {
        if self.display_depth != 16 && self.display_depth != 32 {
            self.display_depth = 32;
        }
        self.buffer_count = self.buffer_count.max(1);
        self.event_channel_capacity = self.event_channel_capacity.max(1);
        self
    }
}

fn parse_physical_size(value: &str) -> Option<[i32; 2]> {
    let (w, h) = value.split_once(',')?;
    let w: i32 = w.trim().parse().ok()?;
    let h: i32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some([w, h])
}

/// Parse an integer with a `0x` (hex), `0` (octal) or no (decimal) prefix.
fn parse_int_auto_base(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}
