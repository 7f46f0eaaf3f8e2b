//! Translation of native events into window-system events.
//!
//! Runs on the owning thread, one [`PumpMessage`] at a time and in arrival
//! order. Events for handles that are not (or no longer) registered belong
//! to foreign windows; they are routed to overlay tracking or dropped.

use std::time::{Duration, Instant};

use horizon_screen_core::native::{
    KeyFlags, MAX_TOUCH_PRESSURE, ManagerEventKind, NATIVE_BUTTON_COUNT, NativeEvent,
    PropertyChange, TouchKind,
};
use horizon_screen_core::{
    DisplayHandle, Point, PointF, Rect, Size, TimerId, TimerManager, WindowHandle,
};

use crate::error::CheckNative;
use crate::event_thread::PumpMessage;
use crate::events::{
    KeyEventKind, KeyboardModifiers, MouseButtons, TouchEventKind, TouchPoint, TouchPointState,
    WindowSystemEvent,
};
use crate::logging::targets;
use crate::system::WindowSystem;
use crate::window::WindowId;

/// Number of simultaneous touch contacts tracked.
pub const MAX_TOUCH_POINTS: usize = 10;

/// Sym value the compositor uses for "no symbol".
const INVALID_SYM: u32 = 0xFFFF_FFFF;

const MOD_SHIFT: u32 = 0x1;
const MOD_CTRL: u32 = 0x2;
const MOD_ALT: u32 = 0x4;

/// Wheel clicks to angle delta.
const WHEEL_SCALE: i32 = -10;

/// Native button bits in mask order.
const BUTTON_MAP: [MouseButtons; NATIVE_BUTTON_COUNT as usize] = [
    MouseButtons::LEFT,
    MouseButtons::MIDDLE,
    MouseButtons::RIGHT,
    MouseButtons::BACK,
    MouseButtons::FORWARD,
    MouseButtons::EXTRA_3,
    MouseButtons::EXTRA_4,
    MouseButtons::EXTRA_5,
];

fn map_buttons(mask: u32) -> MouseButtons {
    BUTTON_MAP
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .fold(MouseButtons::NONE, |acc, (_, &button)| acc | button)
}

fn is_keypad_cap(cap: u32) -> bool {
    matches!(cap, 0xF08D | 0xF0AA..=0xF0B9 | 0xF0BD)
}

struct PendingFocusLoss {
    timer: TimerId,
    window: WindowId,
}

/// Stateful translator from native events to [`WindowSystemEvent`]s.
pub struct ScreenEventHandler {
    hovered: Option<WindowId>,
    last_position: Point,
    last_buttons: MouseButtons,
    touch_points: [Option<TouchPoint>; MAX_TOUCH_POINTS],
    timers: TimerManager,
    focus_loss: Option<PendingFocusLoss>,
    focus_loss_debounce: Duration,
}

impl ScreenEventHandler {
    pub fn new(focus_loss_debounce: Duration) -> Self {
        Self {
            hovered: None,
            last_position: Point::ZERO,
            last_buttons: MouseButtons::NONE,
            touch_points: [None; MAX_TOUCH_POINTS],
            timers: TimerManager::new(),
            focus_loss: None,
            focus_loss_debounce,
        }
    }

    /// The window the pointer was last seen over.
    pub fn hovered(&self) -> Option<WindowId> {
        self.hovered
    }

    /// Number of touch contacts currently down.
    pub fn active_touch_points(&self) -> usize {
        self.touch_points.iter().flatten().count()
    }

    /// Time until the next pending timer, if any.
    pub fn time_until_next_timer(&mut self, now: Instant) -> Option<Duration> {
        self.timers.time_until_next(now)
    }

    pub fn has_pending_focus_loss(&self) -> bool {
        self.focus_loss.is_some()
    }

    /// Handle one message from the pump.
    pub fn handle(&mut self, system: &mut WindowSystem, message: PumpMessage, now: Instant) {
        let PumpMessage { event, target } = message;
        // The registry may have changed since the pump looked the handle up.
        let target = target.filter(|&id| system.contains_window(id)).or_else(|| {
            event
                .window()
                .and_then(|handle| system.window_for_handle(handle))
        });
        tracing::trace!(target: targets::EVENTS, kind = event.kind_name(), ?target, "handling native event");

        match event {
            NativeEvent::Pointer {
                buttons,
                position,
                source_position,
                wheel,
                timestamp,
                ..
            } => {
                match target {
                    Some(window) => {
                        self.pointer(system, window, buttons, position, source_position, wheel, timestamp);
                    }
                    // Over a window we do not own, such as an overlay.
                    None => self.leave(system),
                }
            }
            NativeEvent::Keyboard {
                flags,
                sym,
                modifiers,
                scan,
                cap,
                ..
            } => self.keyboard(system, flags, sym, modifiers, scan, cap),
            NativeEvent::Touch {
                kind,
                touch_id,
                position,
                source_position,
                size,
                pressure,
                timestamp,
                ..
            } => {
                let Some(window) = target else {
                    if touch_id == 0 {
                        self.leave(system);
                    }
                    return;
                };
                let contact = Contact {
                    kind,
                    touch_id,
                    position,
                    source_position,
                    size,
                    pressure,
                    timestamp,
                };
                self.touch(system, window, contact);
            }
            NativeEvent::Create { window } => {
                if target.is_none() {
                    system.foreign_window_created(window);
                }
            }
            NativeEvent::Close { window } => self.close(system, target, window),
            NativeEvent::Display { display, attached } => self.display(system, display, attached),
            NativeEvent::Property { window, property } => {
                if let Some(id) = target {
                    self.property(system, id, window, property, now);
                }
            }
            NativeEvent::Manager { kind, .. } => match (kind, target) {
                (ManagerEventKind::Close, Some(window)) => {
                    system.push_event(WindowSystemEvent::CloseRequested { window });
                }
                (kind, _) => {
                    tracing::trace!(target: targets::EVENTS, ?kind, "ignoring manager event");
                }
            },
            NativeEvent::Unknown(code) => {
                tracing::trace!(target: targets::EVENTS, code, "ignoring unknown event");
            }
        }
    }

    /// Fire expired timers. A focus loss that was not contradicted in time
    /// is reported now.
    pub fn fire_timers(&mut self, system: &mut WindowSystem, now: Instant) {
        for timer in self.timers.take_expired(now) {
            let Some(pending) = self.focus_loss.take_if(|p| p.timer == timer) else {
                continue;
            };
            if system.focus_window() == Some(pending.window) {
                tracing::debug!(target: targets::EVENTS, window = ?pending.window, "focus lost");
                system.activate(None);
            }
        }
    }

    /// Forget per-window state for a destroyed window.
    pub fn forget_window(&mut self, window: WindowId) {
        if self.hovered == Some(window) {
            self.hovered = None;
        }
        if let Some(pending) = self.focus_loss.take_if(|p| p.window == window) {
            self.timers.stop(pending.timer);
        }
    }

    fn enter(&mut self, system: &mut WindowSystem, window: WindowId, local: Point, global: Point) {
        if self.hovered == Some(window) {
            return;
        }
        self.leave(system);
        system.push_event(WindowSystemEvent::Enter {
            window,
            local,
            global,
        });
        self.hovered = Some(window);
    }

    fn leave(&mut self, system: &mut WindowSystem) {
        if let Some(previous) = self.hovered.take()
            && system.contains_window(previous)
        {
            system.push_event(WindowSystemEvent::Leave { window: previous });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn pointer(
        &mut self,
        system: &mut WindowSystem,
        window: WindowId,
        buttons: u32,
        position: Point,
        source_position: Point,
        wheel: i32,
        timestamp: u64,
    ) {
        self.enter(system, window, source_position, position);

        let buttons = map_buttons(buttons);
        if position != self.last_position || buttons != self.last_buttons {
            self.last_position = position;
            self.last_buttons = buttons;
            system.push_event(WindowSystemEvent::Mouse {
                window,
                local: source_position,
                global: position,
                buttons,
                timestamp,
            });
        }

        if wheel != 0 {
            system.push_event(WindowSystemEvent::Wheel {
                window,
                local: source_position,
                global: position,
                angle_delta: Point::new(0, wheel * WHEEL_SCALE),
                timestamp,
            });
        }
    }

    fn keyboard(
        &mut self,
        system: &mut WindowSystem,
        flags: KeyFlags,
        sym: u32,
        modifiers: u32,
        scan: u32,
        cap: u32,
    ) {
        if !flags.contains(KeyFlags::CAP_VALID) {
            tracing::trace!(target: targets::EVENTS, flags = flags.bits(), "dropping key without a cap");
            return;
        }
        let flags = if sym == INVALID_SYM {
            flags.without(KeyFlags::SYM_VALID)
        } else {
            flags
        };

        let modifiers = KeyboardModifiers {
            shift: modifiers & MOD_SHIFT != 0,
            control: modifiers & MOD_CTRL != 0,
            alt: modifiers & MOD_ALT != 0,
            keypad: is_keypad_cap(cap),
        };
        let key = char::from_u32(cap)
            .filter(char::is_ascii_lowercase)
            .map_or(cap, |c| u32::from(c.to_ascii_uppercase()));
        let sym = flags.contains(KeyFlags::SYM_VALID).then_some(sym);
        let text = sym
            .and_then(char::from_u32)
            .filter(|c| !c.is_control() && !('\u{F000}'..='\u{F8FF}').contains(c));

        system.push_event(WindowSystemEvent::Key {
            window: system.focus_window(),
            kind: if flags.contains(KeyFlags::KEY_DOWN) {
                KeyEventKind::Press
            } else {
                KeyEventKind::Release
            },
            key,
            sym,
            scan: flags.contains(KeyFlags::SCAN_VALID).then_some(scan),
            modifiers,
            text,
            auto_repeat: flags.contains(KeyFlags::KEY_REPEAT),
        });
    }

    fn touch(&mut self, system: &mut WindowSystem, window: WindowId, contact: Contact) {
        let Ok(slot) = usize::try_from(contact.touch_id) else {
            tracing::warn!(target: targets::EVENTS, id = contact.touch_id, "negative touch id");
            return;
        };
        if slot >= MAX_TOUCH_POINTS {
            tracing::warn!(target: targets::EVENTS, id = contact.touch_id, "touch id out of range");
            return;
        }

        let Some(screen) = system
            .window(window)
            .and_then(|w| system.screen(w.screen()))
            .map(|s| s.geometry())
        else {
            return;
        };

        // Primary contact doubles as the mouse.
        if slot == 0 {
            let buttons = if contact.kind == TouchKind::Release {
                MouseButtons::NONE
            } else {
                MouseButtons::LEFT
            };
            self.pointer_from_touch(system, window, &contact, buttons);
        }

        let others_active = self
            .touch_points
            .iter()
            .enumerate()
            .any(|(i, p)| i != slot && p.is_some());
        let (state, kind) = match contact.kind {
            TouchKind::Press if !others_active => (TouchPointState::Pressed, TouchEventKind::Begin),
            TouchKind::Press => (TouchPointState::Pressed, TouchEventKind::Update),
            TouchKind::Move => (TouchPointState::Moved, TouchEventKind::Update),
            TouchKind::Release if !others_active => (TouchPointState::Released, TouchEventKind::End),
            TouchKind::Release => (TouchPointState::Released, TouchEventKind::Update),
        };

        let center = system.map_to_global(window, contact.source_position);
        let area = Rect::from_size(contact.size).with_center(center);
        let normal_position = PointF::new(
            normalize(contact.position.x, screen.width),
            normalize(contact.position.y, screen.height),
        );
        let pressure =
            (f64::from(contact.pressure) / f64::from(MAX_TOUCH_PRESSURE)).clamp(0.0, 1.0);

        for point in self.touch_points.iter_mut().flatten() {
            point.state = TouchPointState::Stationary;
        }
        self.touch_points[slot] = Some(TouchPoint {
            id: contact.touch_id,
            state,
            normal_position,
            area,
            pressure,
        });

        let points: Vec<TouchPoint> = self.touch_points.iter().flatten().copied().collect();
        system.push_event(WindowSystemEvent::Touch {
            window,
            kind,
            points,
            timestamp: contact.timestamp,
        });

        if contact.kind == TouchKind::Release {
            self.touch_points[slot] = None;
        }
    }

    fn pointer_from_touch(
        &mut self,
        system: &mut WindowSystem,
        window: WindowId,
        contact: &Contact,
        buttons: MouseButtons,
    ) {
        self.enter(system, window, contact.source_position, contact.position);
        self.last_position = contact.position;
        self.last_buttons = buttons;
        system.push_event(WindowSystemEvent::Mouse {
            window,
            local: contact.source_position,
            global: contact.position,
            buttons,
            timestamp: contact.timestamp,
        });
    }

    fn close(&mut self, system: &mut WindowSystem, target: Option<WindowId>, handle: WindowHandle) {
        match target {
            Some(window) => {
                tracing::debug!(target: targets::EVENTS, ?window, "native window closed");
                system.push_event(WindowSystemEvent::CloseRequested { window });
            }
            None => {
                if !system.foreign_window_closed(handle) {
                    tracing::trace!(target: targets::EVENTS, %handle, "close for an unknown window");
                }
            }
        }
    }

    fn display(&mut self, system: &mut WindowSystem, handle: DisplayHandle, attached: bool) {
        let known = system.screen_for_display(handle);
        match (attached, known) {
            (true, None) => {
                let Some(info) = system
                    .native()
                    .display_info(handle)
                    .or_warn("failed to query attached display")
                else {
                    return;
                };
                if info.size.is_empty() {
                    tracing::trace!(target: targets::EVENTS, display = %handle, "ignoring display without a mode");
                    return;
                }
                tracing::debug!(target: targets::EVENTS, display = %handle, "display attached");
                if let Err(err) = system.add_screen(handle, false) {
                    tracing::warn!(target: targets::EVENTS, display = %handle, %err, "failed to add screen");
                }
            }
            (false, Some(screen)) => {
                tracing::debug!(target: targets::EVENTS, display = %handle, "display detached");
                if let Err(err) = system.remove_screen(screen) {
                    tracing::warn!(target: targets::EVENTS, display = %handle, %err, "failed to remove screen");
                }
            }
            // A repeated notification for a display already in that state.
            _ => {}
        }
    }

    fn property(
        &mut self,
        system: &mut WindowSystem,
        window: WindowId,
        handle: WindowHandle,
        property: PropertyChange,
        now: Instant,
    ) {
        if let PropertyChange::Other(code) = property {
            tracing::trace!(target: targets::EVENTS, code, "ignoring property change");
            return;
        }
        let Some(info) = system
            .native()
            .window_info(handle)
            .or_warn("failed to query window")
        else {
            return;
        };

        match property {
            PropertyChange::Focus if info.focused => {
                // Any gain supersedes a pending loss, whichever window it was for.
                if let Some(pending) = self.focus_loss.take() {
                    self.timers.stop(pending.timer);
                    tracing::trace!(target: targets::EVENTS, window = ?pending.window, "focus loss cancelled");
                }
                system.activate(Some(window));
            }
            PropertyChange::Focus => {
                if system.focus_window() == Some(window) {
                    if let Some(pending) = self.focus_loss.take() {
                        self.timers.stop(pending.timer);
                    }
                    let timer = self.timers.start_one_shot_at(now, self.focus_loss_debounce);
                    self.focus_loss = Some(PendingFocusLoss { timer, window });
                }
            }
            PropertyChange::Size | PropertyChange::Position => {
                let Some(current) = system.window(window).map(|w| w.geometry()) else {
                    return;
                };
                let rect = match property {
                    PropertyChange::Size => current.with_size(info.size),
                    _ => Rect::from_origin_size(info.position, current.size()),
                };
                system.native_geometry_changed(window, rect);
            }
            PropertyChange::Other(_) => {}
        }
    }
}

impl std::fmt::Debug for ScreenEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenEventHandler")
            .field("hovered", &self.hovered)
            .field("active_touch_points", &self.active_touch_points())
            .field("pending_focus_loss", &self.focus_loss.is_some())
            .finish_non_exhaustive()
    }
}

struct Contact {
    kind: TouchKind,
    touch_id: i32,
    position: Point,
    source_position: Point,
    size: Size,
    pressure: i32,
    timestamp: u64,
}

fn normalize(value: i32, extent: i32) -> f64 {
    if extent <= 1 {
        return 0.0;
    }
    (f64::from(value) / f64::from(extent - 1)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use horizon_screen_core::ScreenApi;
    use horizon_screen_core::headless::HeadlessScreen;

    use super::*;
    use crate::options::IntegrationOptions;
    use crate::window::WindowRequest;

    fn setup() -> (Arc<HeadlessScreen>, WindowSystem, ScreenEventHandler, WindowId) {
        let native = Arc::new(HeadlessScreen::new());
        let display = native.displays().unwrap()[0];
        let mut system = WindowSystem::new(native.clone(), None, IntegrationOptions::default());
        system.add_screen(display, true).unwrap();
        let window = system
            .create_window(WindowRequest::raster(Rect::new(100, 100, 200, 200)).visible(true))
            .unwrap();
        system.take_events();
        let handler = ScreenEventHandler::new(Duration::from_millis(50));
        (native, system, handler, window)
    }

    fn message(system: &WindowSystem, event: NativeEvent) -> PumpMessage {
        let target = event.window().and_then(|h| system.window_for_handle(h));
        PumpMessage { event, target }
    }

    fn pointer(handle: WindowHandle, buttons: u32, x: i32, wheel: i32) -> NativeEvent {
        NativeEvent::Pointer {
            window: handle,
            buttons,
            position: Point::new(x, 150),
            source_position: Point::new(x - 100, 50),
            wheel,
            timestamp: 1,
        }
    }

    #[test]
    fn test_button_mapping() {
        assert_eq!(map_buttons(0b1), MouseButtons::LEFT);
        assert_eq!(map_buttons(0b10), MouseButtons::MIDDLE);
        assert_eq!(map_buttons(0b100), MouseButtons::RIGHT);
        assert_eq!(map_buttons(0x80), MouseButtons::EXTRA_5);
        assert_eq!(map_buttons(0x300), MouseButtons::NONE);
    }

    #[test]
    fn test_mouse_only_on_change() {
        let (_native, mut system, mut handler, window) = setup();
        let handle = system.window(window).unwrap().handle();
        let now = Instant::now();

        for event in [pointer(handle, 0, 150, 0), pointer(handle, 0, 150, 0), pointer(handle, 1, 150, 0)] {
            let message = message(&system, event);
            handler.handle(&mut system, message, now);
        }
        let events = system.take_events();
        assert!(matches!(events[0], WindowSystemEvent::Enter { .. }));
        let mice = events
            .iter()
            .filter(|e| matches!(e, WindowSystemEvent::Mouse { .. }))
            .count();
        assert_eq!(mice, 2);
    }

    #[test]
    fn test_pointer_over_foreign_window_leaves() {
        let (native, mut system, mut handler, window) = setup();
        let handle = system.window(window).unwrap().handle();
        let foreign = native.create_foreign_window(native.displays().unwrap()[0], None);
        let now = Instant::now();

        let msg = message(&system, pointer(handle, 0, 150, 0));
        handler.handle(&mut system, msg, now);
        system.take_events();

        let msg = message(&system, pointer(foreign, 0, 400, 0));
        handler.handle(&mut system, msg, now);
        assert_eq!(system.take_events(), vec![WindowSystemEvent::Leave { window }]);
        assert_eq!(handler.hovered(), None);

        // Coming back is a fresh enter.
        let msg = message(&system, pointer(handle, 0, 150, 0));
        handler.handle(&mut system, msg, now);
        assert!(matches!(system.take_events()[0], WindowSystemEvent::Enter { .. }));
    }

    #[test]
    fn test_wheel_is_scaled() {
        let (_native, mut system, mut handler, window) = setup();
        let handle = system.window(window).unwrap().handle();
        let message = message(&system, pointer(handle, 0, 150, 2));
        handler.handle(&mut system, message, Instant::now());

        let wheel = system.take_events().into_iter().find_map(|e| match e {
            WindowSystemEvent::Wheel { angle_delta, .. } => Some(angle_delta),
            _ => None,
        });
        assert_eq!(wheel, Some(Point::new(0, -20)));
    }

    #[test]
    fn test_key_without_cap_dropped() {
        let (_native, mut system, mut handler, _window) = setup();
        let event = NativeEvent::Keyboard {
            window: None,
            flags: KeyFlags::KEY_DOWN,
            sym: 'a' as u32,
            modifiers: 0,
            scan: 30,
            cap: 'a' as u32,
        };
        handler.handle(&mut system, PumpMessage { event, target: None }, Instant::now());
        assert!(system.take_events().is_empty());
    }

    #[test]
    fn test_key_translation() {
        let (_native, mut system, mut handler, _window) = setup();
        let event = NativeEvent::Keyboard {
            window: None,
            flags: KeyFlags::KEY_DOWN | KeyFlags::CAP_VALID | KeyFlags::SYM_VALID,
            sym: INVALID_SYM,
            modifiers: MOD_SHIFT | MOD_CTRL,
            scan: 30,
            cap: 'q' as u32,
        };
        handler.handle(&mut system, PumpMessage { event, target: None }, Instant::now());

        let events = system.take_events();
        let WindowSystemEvent::Key {
            kind,
            key,
            sym,
            scan,
            modifiers,
            text,
            ..
        } = &events[0]
        else {
            panic!("expected a key event, got {events:?}");
        };
        assert_eq!(*kind, KeyEventKind::Press);
        assert_eq!(*key, 'Q' as u32);
        assert_eq!(*sym, None);
        assert_eq!(*scan, None);
        assert!(modifiers.shift && modifiers.control && !modifiers.alt);
        assert_eq!(*text, None);
    }

    #[test]
    fn test_keypad_modifier() {
        assert!(is_keypad_cap(0xF0AB));
        assert!(!is_keypad_cap('+' as u32));
    }

    #[test]
    fn test_manager_close_requests_close() {
        let (_native, mut system, mut handler, window) = setup();
        let handle = system.window(window).unwrap().handle();
        let event = NativeEvent::Manager {
            window: handle,
            kind: ManagerEventKind::Close,
        };
        let message = message(&system, event);
        handler.handle(&mut system, message, Instant::now());
        assert_eq!(
            system.take_events(),
            vec![WindowSystemEvent::CloseRequested { window }]
        );
    }

    #[test]
    fn test_unknown_event_dropped() {
        let (_native, mut system, mut handler, _window) = setup();
        handler.handle(
            &mut system,
            PumpMessage {
                event: NativeEvent::Unknown(99),
                target: None,
            },
            Instant::now(),
        );
        assert!(system.take_events().is_empty());
    }

    #[test]
    fn test_normalize_edges() {
        assert_eq!(normalize(0, 1024), 0.0);
        assert_eq!(normalize(1023, 1024), 1.0);
        assert_eq!(normalize(5000, 1024), 1.0);
    }
}
