//! Native event translation, focus debouncing and the event pump.

use std::sync::Arc;
use std::time::{Duration, Instant};

use horizon_screen::{
    Integration, IntegrationOptions, MouseButtons, PumpMessage, RunState, ScreenEventHandler,
    TouchEventKind, TouchPointState, WindowId, WindowRequest, WindowSystem, WindowSystemEvent,
};
use horizon_screen_core::headless::HeadlessScreen;
use horizon_screen_core::native::{MAX_TOUCH_PRESSURE, PropertyChange, TouchKind};
use horizon_screen_core::{NativeEvent, Point, Rect, ScreenApi, Size, WindowHandle};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (Arc<HeadlessScreen>, WindowSystem, WindowId) {
    let native = Arc::new(HeadlessScreen::new());
    let display = native.displays().unwrap()[0];
    let mut system = WindowSystem::new(native.clone(), None, IntegrationOptions::default());
    system.add_screen(display, true).unwrap();
    let window = system
        .create_window(WindowRequest::raster(Rect::new(100, 100, 200, 200)).visible(true))
        .unwrap();
    system.take_events();
    (native, system, window)
}

fn deliver(handler: &mut ScreenEventHandler, system: &mut WindowSystem, event: NativeEvent, now: Instant) {
    let target = event.window().and_then(|h| system.window_for_handle(h));
    handler.handle(system, PumpMessage { event, target }, now);
}

fn focus(window: WindowHandle) -> NativeEvent {
    NativeEvent::Property {
        window,
        property: PropertyChange::Focus,
    }
}

fn touch(window: WindowHandle, kind: TouchKind, touch_id: i32, x: i32) -> NativeEvent {
    NativeEvent::Touch {
        kind,
        window,
        touch_id,
        position: Point::new(x, 150),
        source_position: Point::new(x - 100, 50),
        size: Size::new(4, 4),
        pressure: MAX_TOUCH_PRESSURE,
        timestamp: 7,
    }
}

/// Pump until `done` matches one of the events seen so far.
fn pump_until(
    integration: &mut Integration,
    done: impl Fn(&WindowSystemEvent) -> bool,
) -> Vec<WindowSystemEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        integration.dispatch(Duration::from_millis(20));
        seen.extend(integration.take_events());
        if seen.iter().any(&done) {
            return seen;
        }
    }
    panic!("timed out waiting for event, saw {seen:?}");
}

#[test]
fn test_focus_loss_is_debounced() {
    let (native, mut system, window) = setup();
    let handle = system.window(window).unwrap().handle();
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));
    let t0 = Instant::now();

    native.set_focused(handle, true);
    deliver(&mut handler, &mut system, focus(handle), t0);
    assert_eq!(
        system.take_events(),
        vec![WindowSystemEvent::WindowActivated {
            window: Some(window)
        }]
    );

    // Lost and regained within the debounce: nothing reported.
    native.set_focused(handle, false);
    deliver(&mut handler, &mut system, focus(handle), t0 + Duration::from_millis(10));
    assert!(handler.has_pending_focus_loss());
    handler.fire_timers(&mut system, t0 + Duration::from_millis(30));
    native.set_focused(handle, true);
    deliver(&mut handler, &mut system, focus(handle), t0 + Duration::from_millis(40));
    assert!(!handler.has_pending_focus_loss());
    handler.fire_timers(&mut system, t0 + Duration::from_millis(200));
    assert!(system.take_events().is_empty());
    assert_eq!(system.focus_window(), Some(window));

    // Lost for good.
    native.set_focused(handle, false);
    deliver(&mut handler, &mut system, focus(handle), t0 + Duration::from_millis(300));
    assert_eq!(
        handler.time_until_next_timer(t0 + Duration::from_millis(300)),
        Some(Duration::from_millis(50))
    );
    handler.fire_timers(&mut system, t0 + Duration::from_millis(360));
    assert_eq!(
        system.take_events(),
        vec![WindowSystemEvent::WindowActivated { window: None }]
    );
    assert_eq!(system.focus_window(), None);
}

#[test]
fn test_focus_moving_on_then_lost_is_reported() {
    let (native, mut system, a) = setup();
    let b = system
        .create_window(WindowRequest::raster(Rect::new(400, 100, 100, 100)).visible(true))
        .unwrap();
    system.take_events();
    let (handle_a, handle_b) = (
        system.window(a).unwrap().handle(),
        system.window(b).unwrap().handle(),
    );
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));
    let t0 = Instant::now();

    native.set_focused(handle_a, true);
    deliver(&mut handler, &mut system, focus(handle_a), t0);
    native.set_focused(handle_a, false);
    deliver(&mut handler, &mut system, focus(handle_a), t0);
    native.set_focused(handle_b, true);
    deliver(&mut handler, &mut system, focus(handle_b), t0 + Duration::from_millis(5));
    assert!(!handler.has_pending_focus_loss());
    assert_eq!(system.focus_window(), Some(b));

    native.set_focused(handle_b, false);
    deliver(&mut handler, &mut system, focus(handle_b), t0 + Duration::from_millis(10));
    assert!(handler.has_pending_focus_loss());
    handler.fire_timers(&mut system, t0 + Duration::from_secs(5));

    assert_eq!(system.focus_window(), None);
    assert_eq!(
        system.take_events().last(),
        Some(&WindowSystemEvent::WindowActivated { window: None })
    );
}

#[test]
fn test_destroyed_window_cancels_focus_loss() {
    let (native, mut system, window) = setup();
    let handle = system.window(window).unwrap().handle();
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));
    let t0 = Instant::now();

    native.set_focused(handle, true);
    deliver(&mut handler, &mut system, focus(handle), t0);
    native.set_focused(handle, false);
    deliver(&mut handler, &mut system, focus(handle), t0);
    assert!(handler.has_pending_focus_loss());

    handler.forget_window(window);
    assert!(!handler.has_pending_focus_loss());
    assert_eq!(handler.time_until_next_timer(t0), None);
}

#[test]
fn test_multi_touch_sequence() {
    let (_native, mut system, window) = setup();
    let handle = system.window(window).unwrap().handle();
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));
    let now = Instant::now();

    let touches = |system: &mut WindowSystem| -> Vec<(TouchEventKind, Vec<TouchPointState>)> {
        system
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                WindowSystemEvent::Touch { kind, points, .. } => {
                    Some((kind, points.iter().map(|p| p.state).collect()))
                }
                _ => None,
            })
            .collect()
    };

    deliver(&mut handler, &mut system, touch(handle, TouchKind::Press, 0, 150), now);
    let events = system.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        WindowSystemEvent::Mouse { buttons, .. } if *buttons == MouseButtons::LEFT
    )));
    let Some(WindowSystemEvent::Touch {
        kind,
        points,
        timestamp,
        ..
    }) = events.iter().find(|e| matches!(e, WindowSystemEvent::Touch { .. }))
    else {
        panic!("no touch event in {events:?}");
    };
    assert_eq!(*kind, TouchEventKind::Begin);
    assert_eq!(*timestamp, 7);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].area.center(), Point::new(150, 150));
    assert_eq!(points[0].pressure, 1.0);

    deliver(&mut handler, &mut system, touch(handle, TouchKind::Press, 1, 200), now);
    assert_eq!(
        touches(&mut system),
        vec![(
            TouchEventKind::Update,
            vec![TouchPointState::Stationary, TouchPointState::Pressed]
        )]
    );

    deliver(&mut handler, &mut system, touch(handle, TouchKind::Release, 1, 200), now);
    assert_eq!(
        touches(&mut system),
        vec![(
            TouchEventKind::Update,
            vec![TouchPointState::Stationary, TouchPointState::Released]
        )]
    );
    assert_eq!(handler.active_touch_points(), 1);

    deliver(&mut handler, &mut system, touch(handle, TouchKind::Release, 0, 150), now);
    assert_eq!(
        touches(&mut system),
        vec![(TouchEventKind::End, vec![TouchPointState::Released])]
    );
    assert_eq!(handler.active_touch_points(), 0);
}

#[test]
fn test_out_of_range_touch_is_dropped() {
    let (_native, mut system, window) = setup();
    let handle = system.window(window).unwrap().handle();
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));

    deliver(&mut handler, &mut system, touch(handle, TouchKind::Press, 10, 150), Instant::now());
    deliver(&mut handler, &mut system, touch(handle, TouchKind::Press, -1, 150), Instant::now());
    assert!(system.take_events().is_empty());
    assert_eq!(handler.active_touch_points(), 0);
}

#[test]
fn test_native_size_change_is_adopted() {
    let (native, mut system, window) = setup();
    let handle = system.window(window).unwrap().handle();
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));

    native
        .set_window_property(
            handle,
            horizon_screen_core::WindowProperty::Size(Size::new(320, 240)),
        )
        .unwrap();
    let event = NativeEvent::Property {
        window: handle,
        property: PropertyChange::Size,
    };
    deliver(&mut handler, &mut system, event, Instant::now());
    assert_eq!(system.window(window).unwrap().geometry(), Rect::new(100, 100, 320, 240));
    assert_eq!(
        system.take_events(),
        vec![WindowSystemEvent::GeometryChanged {
            window,
            geometry: Rect::new(100, 100, 320, 240)
        }]
    );
}

#[test]
fn test_pump_delivers_pointer_events() {
    init_tracing();
    let native = Arc::new(HeadlessScreen::new());
    let mut integration =
        Integration::new(native.clone(), None, IntegrationOptions::default()).unwrap();
    let window = integration
        .create_window(WindowRequest::raster(Rect::new(0, 0, 100, 100)).visible(true))
        .unwrap();
    let handle = integration.system().window(window).unwrap().handle();
    integration.take_events();

    native.push_event(NativeEvent::Pointer {
        window: handle,
        buttons: 1,
        position: Point::new(10, 10),
        source_position: Point::new(10, 10),
        wheel: 0,
        timestamp: 3,
    });
    let events = pump_until(&mut integration, |e| {
        matches!(e, WindowSystemEvent::Mouse { .. })
    });
    assert!(matches!(events[0], WindowSystemEvent::Enter { window: w, .. } if w == window));
    assert_eq!(integration.event_handler().hovered(), Some(window));
}

#[test]
fn test_pump_reports_close_requests() {
    let native = Arc::new(HeadlessScreen::new());
    let mut integration =
        Integration::new(native.clone(), None, IntegrationOptions::default()).unwrap();
    let window = integration
        .create_window(WindowRequest::raster(Rect::new(0, 0, 100, 100)))
        .unwrap();
    let handle = integration.system().window(window).unwrap().handle();

    native.push_event(NativeEvent::Close { window: handle });
    pump_until(&mut integration, |e| {
        *e == WindowSystemEvent::CloseRequested { window }
    });
    assert!(integration.system().contains_window(window));
}

#[test]
fn test_display_hotplug_adds_and_removes_screens() {
    init_tracing();
    let native = Arc::new(HeadlessScreen::new());
    let secondary = native.add_display(Size::new(800, 480), false);
    let mut integration =
        Integration::new(native.clone(), None, IntegrationOptions::default()).unwrap();
    let primary = integration.primary_screen().unwrap();
    assert_eq!(integration.system().screen_ids().count(), 1);

    native.set_display_attached(secondary, true);
    let events = pump_until(&mut integration, |e| {
        matches!(e, WindowSystemEvent::ScreenAdded { .. })
    });
    let Some(&WindowSystemEvent::ScreenAdded { screen }) = events
        .iter()
        .find(|e| matches!(e, WindowSystemEvent::ScreenAdded { .. }))
    else {
        unreachable!();
    };
    assert_eq!(integration.system().screen_for_display(secondary), Some(screen));

    let window = integration
        .create_window(WindowRequest::raster(Rect::new(0, 0, 50, 50)).with_screen(screen))
        .unwrap();
    assert_eq!(integration.system().window(window).unwrap().screen(), screen);

    native.set_display_attached(secondary, false);
    pump_until(&mut integration, |e| {
        *e == WindowSystemEvent::ScreenRemoved { screen }
    });
    assert_eq!(integration.system().screen_for_display(secondary), None);
    assert_eq!(integration.system().window(window).unwrap().screen(), primary);
}

#[test]
fn test_display_without_a_mode_is_ignored() {
    let (native, mut system, _window) = setup();
    let mut handler = ScreenEventHandler::new(Duration::from_millis(50));
    let empty = native.add_display(Size::new(0, 0), true);

    let event = NativeEvent::Display {
        display: empty,
        attached: true,
    };
    deliver(&mut handler, &mut system, event, Instant::now());
    assert_eq!(system.screen_ids().count(), 1);
    assert_eq!(system.screen_for_display(empty), None);
    assert!(system.take_events().is_empty());
}

#[test]
fn test_foreign_window_becomes_overlay() {
    let native = Arc::new(HeadlessScreen::new());
    let display = native.displays().unwrap()[0];
    let mut integration =
        Integration::new(native.clone(), None, IntegrationOptions::default()).unwrap();
    let screen = integration.primary_screen().unwrap();

    let overlay = native.create_foreign_window(display, Some("keyboard"));
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        integration.dispatch(Duration::from_millis(20));
        let s = integration.system().screen(screen).unwrap();
        if s.overlay_handles().any(|h| h == overlay) {
            break;
        }
    }
    let s = integration.system().screen(screen).unwrap();
    assert!(s.overlay_handles().any(|h| h == overlay));

    native.close_foreign_window(overlay);
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        integration.dispatch(Duration::from_millis(20));
        let s = integration.system().screen(screen).unwrap();
        if s.overlay_handles().next().is_none() {
            return;
        }
    }
    panic!("overlay was not removed");
}

#[test]
fn test_shutdown_under_load() {
    init_tracing();
    let native = Arc::new(HeadlessScreen::new());
    let options = IntegrationOptions {
        event_channel_capacity: 1,
        ..Default::default()
    };
    let mut integration = Integration::new(native.clone(), None, options).unwrap();
    for code in 0..500 {
        native.push_event(NativeEvent::Unknown(code));
    }

    integration.shutdown();
    assert_eq!(integration.event_thread().state(), RunState::Stopped);
    assert_eq!(integration.process_events(), 0);
    integration.shutdown();
}
