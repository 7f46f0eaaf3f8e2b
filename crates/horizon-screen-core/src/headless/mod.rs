//! In-process compositor and EGL driver.
//!
//! These implement [`ScreenApi`](crate::native::ScreenApi) and
//! [`EglApi`](crate::native::egl::EglApi) entirely in memory. Render
//! buffers are byte vectors, the event queue is a FIFO guarded by a
//! condition variable, and every call that matters to the integration's
//! invariants is counted so tests can assert on it.

mod egl;
mod screen;

pub use egl::{EglStats, HeadlessEgl};
pub use screen::{HeadlessScreen, HeadlessStats, HeadlessWindow, PostRecord};
