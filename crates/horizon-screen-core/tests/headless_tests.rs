//! The headless compositor used across threads, the way the event pump uses it.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use horizon_screen_core::headless::{HeadlessEgl, HeadlessScreen};
use horizon_screen_core::native::egl::{ConfigRequest, EglApi};
use horizon_screen_core::{
    NativeEvent, NativeMessage, NativeWindow, NativeWindowType, Pulse, ScreenApi, Size,
    TimerManager,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_receive_blocks_until_event() {
    init_tracing();
    let screen = Arc::new(HeadlessScreen::new());
    let reader = {
        let screen = screen.clone();
        thread::spawn(move || {
            let mut seen = Vec::new();
            loop {
                match screen.receive().unwrap() {
                    NativeMessage::Pulse(Pulse::Shutdown) => return seen,
                    message => seen.push(message),
                }
            }
        })
    };

    screen.push_event(NativeEvent::Unknown(1));
    screen.send_pulse(Pulse::User(2)).unwrap();
    screen.send_pulse(Pulse::Shutdown).unwrap();

    let seen = reader.join().unwrap();
    assert_eq!(
        seen,
        vec![
            NativeMessage::Event(NativeEvent::Unknown(1)),
            NativeMessage::Pulse(Pulse::User(2)),
        ]
    );
}

#[test]
fn test_hotplug_queues_display_events() {
    let screen = HeadlessScreen::new();
    let display = screen.add_display(Size::new(640, 480), false);
    assert_eq!(screen.pending_messages(), 0);
    assert_eq!(screen.displays().unwrap().len(), 2);

    screen.set_display_attached(display, true);
    assert_eq!(
        screen.receive().unwrap(),
        NativeMessage::Event(NativeEvent::Display {
            display,
            attached: true
        })
    );
    assert!(screen.display_info(display).unwrap().attached);
}

#[test]
fn test_owned_windows_are_destroyed_on_drop() {
    let screen = Arc::new(HeadlessScreen::new());
    let owned = screen.create_window(NativeWindowType::Application).unwrap();
    let foreign = screen.create_foreign_window(screen.displays().unwrap()[0], None);

    drop(NativeWindow::owned(screen.clone(), owned));
    drop(NativeWindow::adopted(screen.clone(), foreign));

    assert!(screen.window_snapshot(owned).is_none());
    assert!(screen.window_snapshot(foreign).is_some());
    assert_eq!(screen.stats().windows_destroyed, 1);
}

#[test]
fn test_egl_surfaces_need_live_windows() {
    let screen = Arc::new(HeadlessScreen::new());
    let egl = HeadlessEgl::new(screen.clone());
    let window = screen.create_window(NativeWindowType::Application).unwrap();
    screen.destroy_window(window).unwrap();

    let config = egl.choose_config(&ConfigRequest::default()).unwrap().unwrap();
    assert!(egl.create_window_surface(config, window).is_err());
    assert_eq!(egl.live_surfaces(), 0);
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let mut timers = TimerManager::new();
    let now = Instant::now();
    let late = timers.start_one_shot_at(now, Duration::from_millis(30));
    let early = timers.start_one_shot_at(now, Duration::from_millis(10));

    assert_eq!(
        timers.take_expired(now + Duration::from_millis(40)),
        vec![early, late]
    );
    assert_eq!(timers.active_count(), 0);
}
