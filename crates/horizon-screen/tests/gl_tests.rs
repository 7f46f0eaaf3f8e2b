//! GL windows, contexts and offscreen surfaces on the headless EGL driver.

use std::sync::Arc;

use horizon_screen::{
    Binding, ContextState, Integration, IntegrationOptions, OffscreenKind, ScreenError,
    SurfaceFormat, WindowId, WindowRequest,
};
use horizon_screen_core::headless::{HeadlessEgl, HeadlessScreen};
use horizon_screen_core::{Rect, Size, Usage};

fn setup(surfaceless: bool, options: IntegrationOptions) -> (Arc<HeadlessScreen>, Arc<HeadlessEgl>, Integration) {
    let native = Arc::new(HeadlessScreen::new());
    let egl = Arc::new(HeadlessEgl::with_surfaceless(native.clone(), surfaceless));
    let integration = Integration::new(native.clone(), Some(egl.clone()), options).unwrap();
    (native, egl, integration)
}

fn gl_window(integration: &mut Integration, rect: Rect) -> WindowId {
    integration
        .create_window(WindowRequest::gl(rect, SurfaceFormat::default()).visible(true))
        .unwrap()
}

#[test]
fn test_surface_is_created_on_first_bind() {
    let (native, egl, mut integration) = setup(true, IntegrationOptions::default());
    let window = gl_window(&mut integration, Rect::new(0, 0, 320, 240));
    let handle = integration.system().window(window).unwrap().handle();
    assert_eq!(egl.stats().surfaces_created, 0);

    let mut context = integration
        .create_gl_context(SurfaceFormat::default(), None)
        .unwrap();
    assert!(context.is_valid());
    assert!(integration.make_current(&mut context, window).unwrap());

    let surface = integration.system().gl_surface(window).unwrap().surface().unwrap();
    assert_eq!(context.state(), ContextState::Current(Binding::Surface(surface)));
    assert_eq!(egl.stats().surfaces_created, 1);
    let snapshot = native.window_snapshot(handle).unwrap();
    assert_eq!(snapshot.usage, Some(Usage::OpenGlEs2));
    assert_eq!(snapshot.buffer_size, Size::new(320, 240));

    assert!(integration.swap_buffers(&mut context, window).unwrap());
    assert_eq!(egl.stats().swaps, 1);
}

#[test]
fn test_resize_recreates_surface_lazily() {
    let (native, egl, mut integration) = setup(true, IntegrationOptions::default());
    let window = gl_window(&mut integration, Rect::new(0, 0, 320, 240));
    let handle = integration.system().window(window).unwrap().handle();
    let mut context = integration
        .create_gl_context(SurfaceFormat::default(), None)
        .unwrap();
    assert!(integration.make_current(&mut context, window).unwrap());

    integration.set_geometry(window, Rect::new(0, 0, 640, 480)).unwrap();
    assert_eq!(egl.stats().surfaces_created, 1);
    assert!(integration.system().gl_surface(window).unwrap().is_new_surface_requested());

    assert!(integration.make_current(&mut context, window).unwrap());
    let stats = egl.stats();
    assert_eq!(stats.surfaces_created, 2);
    assert_eq!(stats.surfaces_destroyed, 1);
    assert_eq!(native.window_snapshot(handle).unwrap().buffer_size, Size::new(640, 480));
    assert_eq!(stats.swap_intervals, vec![1]);

    // Back to the size the live surface already has: nothing to do.
    integration.set_geometry(window, Rect::new(0, 0, 100, 100)).unwrap();
    integration.set_geometry(window, Rect::new(0, 0, 640, 480)).unwrap();
    assert!(integration.make_current(&mut context, window).unwrap());
    assert_eq!(egl.stats().surfaces_created, 2);
}

#[test]
fn test_swap_interval_override_wins() {
    let options = IntegrationOptions {
        swap_interval_override: Some(0),
        ..Default::default()
    };
    let (_native, egl, mut integration) = setup(true, options);
    let window = gl_window(&mut integration, Rect::new(0, 0, 64, 64));
    let mut context = integration
        .create_gl_context(SurfaceFormat::default(), None)
        .unwrap();

    assert!(integration.make_current(&mut context, window).unwrap());
    integration.done_current(&mut context);
    assert!(integration.make_current(&mut context, window).unwrap());
    assert_eq!(egl.stats().swap_intervals, vec![0]);
}

#[test]
fn test_destroying_window_releases_surface() {
    let (_native, egl, mut integration) = setup(true, IntegrationOptions::default());
    let window = gl_window(&mut integration, Rect::new(0, 0, 64, 64));
    let mut context = integration
        .create_gl_context(SurfaceFormat::default(), None)
        .unwrap();
    assert!(integration.make_current(&mut context, window).unwrap());
    assert_eq!(egl.live_surfaces(), 1);

    integration.destroy_window(window).unwrap();
    assert_eq!(egl.live_surfaces(), 0);
    assert!(matches!(
        integration.make_current(&mut context, window),
        Err(ScreenError::InvalidWindow)
    ));
}

#[test]
fn test_offscreen_prefers_surfaceless() {
    let (_native, egl, integration) = setup(true, IntegrationOptions::default());
    let offscreen = integration
        .create_offscreen_surface(SurfaceFormat::default(), Size::new(16, 16))
        .unwrap();
    assert_eq!(offscreen.kind(), OffscreenKind::Surfaceless);
    assert_eq!(egl.live_surfaces(), 0);

    let mut context = integration
        .create_gl_context(SurfaceFormat::default(), None)
        .unwrap();
    assert!(integration.make_current_offscreen(&mut context, &offscreen));
    assert_eq!(context.state(), ContextState::Current(Binding::Surfaceless));
}

#[test]
fn test_offscreen_falls_back_to_pbuffer() {
    let (_native, egl, integration) = setup(false, IntegrationOptions::default());
    let offscreen = integration
        .create_offscreen_surface(SurfaceFormat::default(), Size::new(16, 16))
        .unwrap();
    assert!(matches!(offscreen.kind(), OffscreenKind::Pbuffer(_)));
    assert_eq!(egl.live_surfaces(), 1);

    drop(offscreen);
    assert_eq!(egl.live_surfaces(), 0);
}

#[test]
fn test_surfaceless_can_be_disabled() {
    let options = IntegrationOptions::from_args(["disable-EGL_KHR_surfaceless_context"]);
    let (_native, _egl, integration) = setup(true, options);
    let offscreen = integration
        .create_offscreen_surface(SurfaceFormat::default(), Size::new(16, 16))
        .unwrap();
    assert!(matches!(offscreen.kind(), OffscreenKind::Pbuffer(_)));
}

#[test]
fn test_context_creation_failure_is_reported_as_invalid() {
    let (_native, egl, integration) = setup(true, IntegrationOptions::default());
    egl.fail_context_creation(true);
    let context = integration
        .create_gl_context(SurfaceFormat::default(), None)
        .unwrap();
    assert!(!context.is_valid());
}

#[test]
fn test_gl_needs_egl() {
    let native = Arc::new(HeadlessScreen::new());
    let mut integration = Integration::new(native, None, IntegrationOptions::default()).unwrap();
    assert!(matches!(
        integration.create_window(WindowRequest::gl(Rect::new(0, 0, 8, 8), SurfaceFormat::default())),
        Err(ScreenError::NoEgl)
    ));
    assert!(matches!(
        integration.create_gl_context(SurfaceFormat::default(), None),
        Err(ScreenError::NoEgl)
    ));
}
