//! Error types for the screen integration.
//!
//! Native call failures are split by consequence. Resource creation that
//! fails leaves a handle the rest of the system would use as if it were
//! valid, so it terminates via [`CheckNative::or_fatal`]. Property updates
//! on a valid handle degrade to a logged warning via
//! [`CheckNative::or_warn`] and the caller keeps its previous state.

use horizon_screen_core::{NativeError, NativeResult, PixelFormat};
use thiserror::Error;

use crate::logging::targets;

/// Errors returned to callers of the integration.
#[derive(Error, Debug)]
pub enum ScreenError {
    /// The window id does not name a live window.
    #[error("invalid window id")]
    InvalidWindow,

    /// The screen id does not name a live screen.
    #[error("invalid screen id")]
    InvalidScreen,

    /// The screen's root window cannot be reparented.
    #[error("the root window cannot be reparented")]
    RootReparent,

    /// The requested parent is the window itself or one of its descendants.
    #[error("a window cannot become its own ancestor")]
    CircularParentage,

    /// The operation needs a raster-backed window.
    #[error("window is not raster backed")]
    NotRaster,

    /// The operation needs a GL-backed window.
    #[error("window is not GL backed")]
    NotGl,

    /// The window's buffers have not been allocated yet.
    #[error("window has no render buffers")]
    NoBuffers,

    /// The pixel format has no image representation.
    #[error("unsupported buffer format {0:?}")]
    UnsupportedFormat(PixelFormat),

    /// The compositor reported no displays.
    #[error("no displays reported by the compositor")]
    NoDisplays,

    /// GL windows were requested but no EGL driver is configured.
    #[error("no EGL driver available")]
    NoEgl,

    /// No EGL config matches the requested surface format.
    #[error("no EGL config matches the requested format")]
    NoConfig,

    /// A native call failed.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for integration operations.
pub type ScreenResult<T> = Result<T, ScreenError>;

/// Failure policy for native results.
pub trait CheckNative<T> {
    /// Unwrap a resource-creation result, terminating on failure.
    ///
    /// # Panics
    ///
    /// Panics with a diagnostic naming `what` when the call failed.
    fn or_fatal(self, what: &str) -> T;

    /// Log a failed property call and continue without its result.
    fn or_warn(self, what: &str) -> Option<T>;
}

impl<T> CheckNative<T> for NativeResult<T> {
    #[track_caller]
    fn or_fatal(self, what: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(target: targets::NATIVE, %err, "{what}");
                panic!("{what}: {err}");
            }
        }
    }

    fn or_warn(self, what: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(target: targets::NATIVE, %err, "{what}");
                None
            }
        }
    }
}
