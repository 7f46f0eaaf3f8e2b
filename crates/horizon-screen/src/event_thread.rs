//! The event pump thread.
//!
//! The compositor's `receive` call blocks, so a dedicated thread reads
//! native messages and forwards them to the owning thread over a bounded
//! channel. Events keep their FIFO order. The pump tags each event with the
//! window it targets using the shared [`WindowRegistry`], but never touches
//! window state itself.
//!
//! Shutdown sends a [`Pulse::Shutdown`] through the compositor queue, so it
//! is seen after every event queued before it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use horizon_screen_core::{NativeError, NativeEvent, NativeMessage, Pulse, ScreenApi};
use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use crate::error::CheckNative;
use crate::logging::targets;
use crate::registry::WindowRegistry;
use crate::window::WindowId;

const THREAD_NAME: &str = "horizon-screen-events";

/// Lifecycle of the pump thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RunState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// A native event on its way to the owning thread.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpMessage {
    pub event: NativeEvent,
    /// The window the event's handle belonged to when it was read.
    pub target: Option<WindowId>,
}

assert_impl_all!(PumpMessage: Send);

/// Owner of the event pump thread and the receiving end of its channel.
pub struct EventThread {
    api: Arc<dyn ScreenApi>,
    receiver: Receiver<PumpMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<AtomicU8>,
}

impl EventThread {
    /// Start the pump.
    ///
    /// # Panics
    ///
    /// Panics if the thread cannot be spawned.
    pub fn spawn(api: Arc<dyn ScreenApi>, registry: WindowRegistry, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        let state = Arc::new(AtomicU8::new(RunState::Running as u8));

        let thread_api = api.clone();
        let thread_state = state.clone();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                pump(thread_api.as_ref(), &registry, &sender);
                thread_state.store(RunState::Stopped as u8, Ordering::Release);
                tracing::debug!(target: targets::EVENT_THREAD, "event thread stopped");
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(target: targets::EVENT_THREAD, %err, "failed to spawn event thread");
                panic!("failed to spawn event thread: {err}");
            }
        };
        tracing::debug!(target: targets::EVENT_THREAD, capacity, "event thread started");

        Self {
            api,
            receiver,
            handle: Mutex::new(Some(handle)),
            state,
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Messages waiting on the owning side.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    pub fn try_recv(&self) -> Option<PumpMessage> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PumpMessage> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop the pump and wait for it.
    ///
    /// Messages still in flight are discarded, which also unblocks a pump
    /// stuck on a full channel. Calling this twice is harmless.
    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.state.compare_exchange(
            RunState::Running as u8,
            RunState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.api
            .send_pulse(Pulse::Shutdown)
            .or_warn("failed to send shutdown pulse");

        let mut discarded = 0usize;
        loop {
            match self.receiver.recv_timeout(Duration::from_millis(10)) {
                Ok(_) => discarded += 1,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if handle.is_finished() {
                        break;
                    }
                }
            }
        }
        if discarded > 0 {
            tracing::debug!(target: targets::EVENT_THREAD, discarded, "dropped events at shutdown");
        }

        if handle.join().is_err() {
            tracing::error!(target: targets::EVENT_THREAD, "event thread panicked");
        }
        self.state.store(RunState::Stopped as u8, Ordering::Release);
    }
}

impl Drop for EventThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for EventThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventThread")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn pump(api: &dyn ScreenApi, registry: &WindowRegistry, sender: &Sender<PumpMessage>) {
    loop {
        match api.receive() {
            Ok(NativeMessage::Event(event)) => {
                let target = event.window().and_then(|handle| registry.lookup(handle));
                tracing::trace!(target: targets::EVENT_THREAD, kind = event.kind_name(), ?target, "native event");
                if sender.send(PumpMessage { event, target }).is_err() {
                    tracing::debug!(target: targets::EVENT_THREAD, "owning side gone");
                    return;
                }
            }
            Ok(NativeMessage::Pulse(Pulse::Shutdown)) => {
                tracing::debug!(target: targets::EVENT_THREAD, "shutdown pulse received");
                return;
            }
            Ok(NativeMessage::Pulse(Pulse::User(code))) => {
                tracing::trace!(target: targets::EVENT_THREAD, code, "user pulse");
            }
            Err(NativeError::Disconnected) => {
                tracing::error!(target: targets::EVENT_THREAD, "compositor connection lost");
                return;
            }
            Err(err) => {
                tracing::warn!(target: targets::EVENT_THREAD, %err, "failed to read native event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_screen_core::DisplayHandle;
    use horizon_screen_core::headless::HeadlessScreen;

    fn display_event(raw: u64) -> NativeEvent {
        NativeEvent::Display {
            display: DisplayHandle::from_raw(raw),
            attached: true,
        }
    }

    #[test]
    fn test_events_arrive_in_order() {
        let native = Arc::new(HeadlessScreen::new());
        let thread = EventThread::spawn(native.clone(), WindowRegistry::new(), 8);
        for raw in 1..=3 {
            native.push_event(display_event(raw));
        }

        let received: Vec<_> = (0..3)
            .filter_map(|_| thread.recv_timeout(Duration::from_secs(5)))
            .map(|m| m.event)
            .collect();
        assert_eq!(received, vec![display_event(1), display_event(2), display_event(3)]);
        thread.shutdown();
        assert_eq!(thread.state(), RunState::Stopped);
    }

    #[test]
    fn test_shutdown_with_full_channel() {
        let native = Arc::new(HeadlessScreen::new());
        let thread = EventThread::spawn(native.clone(), WindowRegistry::new(), 1);
        for raw in 0..64 {
            native.push_event(display_event(raw));
        }
        thread.shutdown();
        assert_eq!(thread.state(), RunState::Stopped);
        assert!(thread.try_recv().is_none());
    }

    #[test]
    fn test_shutdown_twice() {
        let native = Arc::new(HeadlessScreen::new());
        let thread = EventThread::spawn(native, WindowRegistry::new(), 4);
        thread.shutdown();
        thread.shutdown();
        assert!(!thread.is_running());
    }
}
