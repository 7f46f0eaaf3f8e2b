//! Owning wrappers around native handles.

use std::fmt;
use std::sync::Arc;

use super::{ScreenApi, WindowHandle, WindowProperty};
use crate::error::NativeResult;
use crate::logging::targets;

/// Whether dropping a wrapper destroys the native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by us and destroyed on drop.
    Owned,
    /// Created elsewhere; drop leaves it alone.
    Adopted,
}

/// A native window with a known lifetime.
///
/// Owned windows are destroyed exactly once, on drop. Adopted windows (for
/// example overlay windows created by a media renderer in another process)
/// are only referenced.
pub struct NativeWindow {
    api: Arc<dyn ScreenApi>,
    handle: WindowHandle,
    ownership: Ownership,
}

impl NativeWindow {
    /// Take ownership of a freshly created native window.
    pub fn owned(api: Arc<dyn ScreenApi>, handle: WindowHandle) -> Self {
        Self {
            api,
            handle,
            ownership: Ownership::Owned,
        }
    }

    /// Reference a native window created by someone else.
    pub fn adopted(api: Arc<dyn ScreenApi>, handle: WindowHandle) -> Self {
        Self {
            api,
            handle,
            ownership: Ownership::Adopted,
        }
    }

    #[inline]
    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    pub fn api(&self) -> &Arc<dyn ScreenApi> {
        &self.api
    }

    /// Set a property on this window.
    pub fn set(&self, value: WindowProperty) -> NativeResult<()> {
        self.api.set_window_property(self.handle, value)
    }
}

impl fmt::Debug for NativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWindow")
            .field("handle", &self.handle)
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        if self.ownership != Ownership::Owned {
            return;
        }
        match self.api.destroy_window(self.handle) {
            Ok(()) => {
                tracing::trace!(target: targets::NATIVE, handle = %self.handle, "native window destroyed");
            }
            Err(err) => {
                tracing::warn!(target: targets::NATIVE, handle = %self.handle, %err, "failed to destroy native window");
            }
        }
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::headless::HeadlessScreen;
    use crate::native::NativeWindowType;

    #[test]
    fn test_owned_window_destroyed_on_drop() {
        let screen = Arc::new(HeadlessScreen::new());
        let handle = screen.create_window(NativeWindowType::Application).unwrap();
        let window = NativeWindow::owned(screen.clone(), handle);
        assert!(screen.window_snapshot(handle).is_some());
        drop(window);
        assert!(screen.window_snapshot(handle).is_none());
    }

    #[test]
    fn test_adopted_window_survives_drop() {
        let screen = Arc::new(HeadlessScreen::new());
        let handle = screen.create_window(NativeWindowType::Application).unwrap();
        drop(NativeWindow::adopted(screen.clone(), handle));
        assert!(screen.window_snapshot(handle).is_some());
    }
}
