//! Raster window buffers: allocation, posting and scrolling.

use std::sync::Arc;

use horizon_screen::{Buffer, IntegrationOptions, ScreenError, WindowId, WindowRequest, WindowSystem};
use horizon_screen_core::headless::HeadlessScreen;
use horizon_screen_core::{Rect, Region, ScreenApi, Size, Transparency};

const RED: u32 = 0xff00_00ff;

fn setup() -> (Arc<HeadlessScreen>, WindowSystem) {
    let native = Arc::new(HeadlessScreen::new());
    let display = native.displays().unwrap()[0];
    let mut system = WindowSystem::new(native.clone(), None, IntegrationOptions::default());
    system.add_screen(display, true).unwrap();
    (native, system)
}

fn raster(system: &mut WindowSystem, rect: Rect) -> WindowId {
    system
        .create_window(WindowRequest::raster(rect).visible(true))
        .unwrap()
}

#[test]
fn test_buffers_follow_size_not_position() {
    let (native, mut system) = setup();
    let id = raster(&mut system, Rect::new(0, 0, 100, 100));
    assert_eq!(native.stats().buffers_created, 2);

    system.set_geometry(id, Rect::new(50, 50, 100, 100)).unwrap();
    assert_eq!(native.stats().buffers_created, 2);
    assert!(!system.set_buffer_size(id, Size::new(100, 100)).unwrap());

    system.set_geometry(id, Rect::new(50, 50, 200, 100)).unwrap();
    let stats = native.stats();
    assert_eq!(stats.buffers_created, 4);
    assert_eq!(stats.buffers_destroyed, 2);
}

#[test]
fn test_empty_size_allocates_discarded_pixel() {
    let (native, mut system) = setup();
    let id = raster(&mut system, Rect::new(0, 0, 100, 100));
    assert!(system.set_buffer_size(id, Size::ZERO).unwrap());

    let snapshot = native.window_snapshot(system.window(id).unwrap().handle()).unwrap();
    assert_eq!(snapshot.buffer_size, Size::new(1, 1));
    assert_eq!(snapshot.transparency, Transparency::Discard);
    assert!(!system.set_buffer_size(id, Size::ZERO).unwrap());
}

#[test]
#[should_panic(expected = "invalid buffer count")]
fn test_wrong_buffer_count_is_fatal() {
    let (native, mut system) = setup();
    native.force_buffer_count(Some(3));
    raster(&mut system, Rect::new(0, 0, 10, 10));
}

#[test]
fn test_post_preserves_previous_frame() {
    let (native, mut system) = setup();
    let id = raster(&mut system, Rect::new(0, 0, 64, 64));
    let handle = system.window(id).unwrap().handle();

    let first = system.render_buffer(id).unwrap();
    let first_handle = first.handle();
    first.paint(|view| view.set_pixel(5, 5, RED)).unwrap();
    assert!(system.post(id, &Region::from(Rect::new(0, 0, 10, 10))).unwrap());

    let second_handle = system.render_buffer(id).unwrap().handle();
    assert_ne!(second_handle, first_handle);
    assert!(system.post(id, &Region::from(Rect::new(20, 20, 10, 10))).unwrap());

    // The first frame's damage was copied forward into the second buffer.
    let snapshot = native.window_snapshot(handle).unwrap();
    let last = snapshot.posts.last().unwrap();
    assert_eq!(last.buffer, second_handle);
    assert_eq!(last.dirty, vec![Rect::new(0, 0, 30, 30)]);
    let second = Buffer::new(native.clone(), second_handle);
    assert_eq!(second.paint(|view| view.pixel(5, 5)).unwrap(), Some(RED));

    assert_eq!(system.render_buffer(id).unwrap().handle(), first_handle);
    assert_eq!(native.stats().posts, 2);
    assert!(native.stats().blits >= 1);
}

#[test]
fn test_post_without_damage_does_nothing() {
    let (native, mut system) = setup();
    let id = raster(&mut system, Rect::new(0, 0, 64, 64));
    system.render_buffer(id).unwrap();
    assert!(!system.post(id, &Region::new()).unwrap());
    assert_eq!(native.stats().posts, 0);
}

#[test]
fn test_overlapping_scroll_is_refused() {
    let (_native, mut system) = setup();
    let id = raster(&mut system, Rect::new(0, 0, 64, 64));
    system.render_buffer(id).unwrap();

    let area = Region::from(Rect::new(0, 0, 32, 32));
    assert!(system.scroll(id, area.clone(), 0, 4).unwrap());
    assert!(system.scroll(id, area, 0, 4).unwrap());
    assert!(!system.scroll(id, Region::from(Rect::new(16, 16, 32, 32)), 0, 4).unwrap());
    assert!(system.scroll(id, Region::from(Rect::new(40, 40, 8, 8)), 1, 0).unwrap());
}

#[test]
fn test_raster_window_has_no_gl_surface() {
    let (_native, mut system) = setup();
    let id = raster(&mut system, Rect::new(0, 0, 10, 10));
    assert!(matches!(system.gl_surface(id), Err(ScreenError::NotGl)));
}

#[test]
fn test_flush_after_post_when_configured() {
    let native = Arc::new(HeadlessScreen::new());
    let display = native.displays().unwrap()[0];
    let options = IntegrationOptions {
        always_flush_screen_context: true,
        ..Default::default()
    };
    let mut system = WindowSystem::new(native.clone(), None, options);
    system.add_screen(display, true).unwrap();
    let id = raster(&mut system, Rect::new(0, 0, 16, 16));

    system.render_buffer(id).unwrap();
    let before = native.stats().context_flushes;
    assert!(system.post(id, &Region::from(Rect::new(0, 0, 16, 16))).unwrap());
    assert!(native.stats().context_flushes > before);
}
