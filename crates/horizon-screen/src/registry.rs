//! Native handle to window lookup, shared with the event pump thread.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_screen_core::WindowHandle;
use parking_lot::Mutex;

use crate::window::WindowId;

/// Maps native window handles to the windows that own them.
///
/// Written on the owning thread when windows are created and destroyed,
/// read by the event pump to tag events with their target window.
#[derive(Debug, Clone, Default)]
pub struct WindowRegistry {
    inner: Arc<Mutex<HashMap<WindowHandle, WindowId>>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: WindowHandle, window: WindowId) {
        self.inner.lock().insert(handle, window);
    }

    pub fn remove(&self, handle: WindowHandle) -> Option<WindowId> {
        self.inner.lock().remove(&handle)
    }

    pub fn lookup(&self, handle: WindowHandle) -> Option<WindowId> {
        self.inner.lock().get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

static_assertions::assert_impl_all!(WindowRegistry: Send, Sync);
