//! One-shot timers driven by the owning thread.
//!
//! The event handler uses these for the focus-loss debounce: a focus-lost
//! notification arms a short timer, and a focus-gained notification that
//! arrives before it expires cancels it. Nothing here spawns threads; the
//! owner polls [`TimerManager::take_expired`] from its own loop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a timer.
    pub struct TimerId;
}

#[derive(Debug)]
struct TimerData {
    fire_at: Instant,
}

/// An entry in the timer queue (min-heap by fire time).
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    id: TimerId,
    fire_at: Instant,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other.fire_at.cmp(&self.fire_at)
    }
}

/// Owns all pending one-shot timers for a thread.
#[derive(Debug, Default)]
pub struct TimerManager {
    timers: SlotMap<TimerId, TimerData>,
    queue: BinaryHeap<QueueEntry>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a one-shot timer that fires `duration` from now.
    pub fn start_one_shot(&mut self, duration: Duration) -> TimerId {
        self.start_one_shot_at(Instant::now(), duration)
    }

    /// Start a one-shot timer relative to an explicit `now`.
    pub fn start_one_shot_at(&mut self, now: Instant, duration: Duration) -> TimerId {
        let fire_at = now + duration;
        let id = self.timers.insert(TimerData { fire_at });
        self.queue.push(QueueEntry { id, fire_at });
        tracing::trace!(target: targets::TIMER, ?id, ?duration, "timer armed");
        id
    }

    /// Cancel a timer. Returns `false` if it already fired or was stopped.
    pub fn stop(&mut self, id: TimerId) -> bool {
        let removed = self.timers.remove(id).is_some();
        if removed {
            tracing::trace!(target: targets::TIMER, ?id, "timer stopped");
        }
        removed
    }

    /// Check if a timer is still pending.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    /// The earliest pending fire time, if any.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.queue.peek().map(|entry| entry.fire_at)
    }

    /// Time left until the next timer fires, saturating at zero.
    pub fn time_until_next(&mut self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return every timer whose deadline is at or before `now`.
    #[tracing::instrument(skip(self), target = "horizon_screen_core::timer", level = "trace")]
    pub fn take_expired(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();
        while let Some(entry) = self.queue.peek().copied() {
            if entry.fire_at > now {
                break;
            }
            self.queue.pop();
            if self.timers.get(entry.id).is_some_and(|t| t.fire_at == entry.fire_at) {
                self.timers.remove(entry.id);
                tracing::trace!(target: targets::TIMER, id = ?entry.id, "timer fired");
                fired.push(entry.id);
            }
        }
        fired
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    fn discard_stale(&mut self) {
        while let Some(entry) = self.queue.peek() {
            if self.timers.contains_key(entry.id) {
                break;
            }
            self.queue.pop();
        }
    }
}
