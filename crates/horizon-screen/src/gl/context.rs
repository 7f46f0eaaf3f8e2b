//! GL contexts and their binding state.

use std::sync::Arc;

use horizon_screen_core::native::egl::{
    ConfigId, ContextAttributes, ContextId, EglApi, SURFACELESS_CONTEXT_EXTENSION, SurfaceId,
    SurfaceKind,
};
use horizon_screen_core::{Ownership, Size};

use super::{GlWindowSurface, OffscreenSurface, SurfaceFormat};
use crate::error::CheckNative;
use crate::logging::targets;

/// Settings applied to every context an integration creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSettings {
    /// Depth of the primary screen, used to resolve "don't care" formats.
    pub screen_depth: u32,
    /// Overrides the swap interval requested by surfaces.
    pub swap_interval_override: Option<i32>,
    /// Probe capabilities with a surfaceless binding when the driver allows.
    pub allow_surfaceless: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            screen_depth: 32,
            swap_interval_override: None,
            allow_surfaceless: true,
        }
    }
}

/// What a context is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Surfaceless,
    Surface(SurfaceId),
}

/// Binding state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    #[default]
    Uninitialized,
    Current(Binding),
    /// Released with [`GlContext::done_current`].
    Done,
}

/// A surface a context can be made current against.
#[derive(Debug, Clone, Copy)]
pub enum SurfaceTarget<'a> {
    Window(&'a GlWindowSurface),
    Offscreen(&'a OffscreenSurface),
}

impl SurfaceTarget<'_> {
    fn swap_interval(&self) -> i32 {
        match self {
            Self::Window(surface) => surface.format().swap_interval,
            Self::Offscreen(surface) => surface.format().swap_interval,
        }
    }
}

/// An EGL context.
///
/// Creation failures are not fatal: the context is left invalid and every
/// binding attempt fails. Check [`is_valid`](Self::is_valid).
pub struct GlContext {
    egl: Arc<dyn EglApi>,
    context: Option<ContextId>,
    ownership: Ownership,
    config: Option<ConfigId>,
    format: SurfaceFormat,
    state: ContextState,
    applied_swap_interval: Option<i32>,
    swap_interval_override: Option<i32>,
}

impl GlContext {
    /// Create a context for `format`, sharing objects with `share`.
    pub fn new(
        egl: Arc<dyn EglApi>,
        format: SurfaceFormat,
        share: Option<&GlContext>,
        settings: &ContextSettings,
    ) -> Self {
        let resolved = format.resolve(settings.screen_depth);
        let mut this = Self {
            egl,
            context: None,
            ownership: Ownership::Owned,
            config: None,
            format: resolved,
            state: ContextState::Uninitialized,
            applied_swap_interval: None,
            swap_interval_override: settings.swap_interval_override,
        };

        let config = match this
            .egl
            .choose_config(&resolved.config_request(SurfaceKind::Window))
        {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::warn!(target: targets::GL, ?resolved, "no EGL config matches the requested format");
                return this;
            }
            Err(err) => {
                tracing::warn!(target: targets::GL, %err, "failed to choose EGL config");
                return this;
            }
        };
        this.config = Some(config);

        let attributes = ContextAttributes {
            major_version: resolved.major_version,
            minor_version: resolved.minor_version,
            debug: false,
        };
        match this
            .egl
            .create_context(config, share.and_then(|s| s.context), &attributes)
        {
            Ok(context) => {
                tracing::debug!(target: targets::GL, %context, %config, "EGL context created");
                this.context = Some(context);
            }
            Err(err) => {
                tracing::warn!(target: targets::GL, %err, "failed to create EGL context");
                return this;
            }
        }

        if let Some(attributes) = this
            .egl
            .config_attributes(config)
            .or_warn("failed to read EGL config attributes")
        {
            this.format = resolved.with_config(&attributes);
        }
        this.probe(settings.allow_surfaceless);
        this
    }

    /// Wrap a context created elsewhere. It is never destroyed here.
    pub fn adopt(
        egl: Arc<dyn EglApi>,
        context: ContextId,
        config: ConfigId,
        settings: &ContextSettings,
    ) -> Self {
        let format = egl
            .config_attributes(config)
            .or_warn("failed to read EGL config attributes")
            .map(|attributes| SurfaceFormat::default().with_config(&attributes))
            .unwrap_or_default();
        tracing::debug!(target: targets::GL, %context, "EGL context adopted");
        Self {
            egl,
            context: Some(context),
            ownership: Ownership::Adopted,
            config: Some(config),
            format,
            state: ContextState::Uninitialized,
            applied_swap_interval: None,
            swap_interval_override: settings.swap_interval_override,
        }
    }

    /// Bind the context briefly to check the driver accepts it, without a
    /// throwaway pbuffer when surfaceless binding is available.
    fn probe(&mut self, allow_surfaceless: bool) {
        let (Some(context), Some(config)) = (self.context, self.config) else {
            return;
        };
        let previous = self.egl.current();

        let pbuffer = if allow_surfaceless && self.egl.has_extension(SURFACELESS_CONTEXT_EXTENSION) {
            None
        } else {
            match self.egl.create_pbuffer_surface(config, Size::new(1, 1)) {
                Ok(surface) => Some(surface),
                Err(err) => {
                    tracing::warn!(target: targets::GL, %err, "failed to create probe pbuffer");
                    return;
                }
            }
        };

        if let Err(err) = self.egl.make_current(pbuffer, Some(context)) {
            tracing::warn!(target: targets::GL, %err, "context could not be made current");
        }
        self.egl
            .make_current(previous.draw, previous.context)
            .or_warn("failed to restore previous EGL binding");
        if let Some(surface) = pbuffer {
            self.egl
                .destroy_surface(surface)
                .or_warn("failed to destroy probe pbuffer");
        }
        tracing::trace!(target: targets::GL, surfaceless = pbuffer.is_none(), "context probed");
    }

    pub fn is_valid(&self) -> bool {
        self.context.is_some()
    }

    pub fn context_id(&self) -> Option<ContextId> {
        self.context
    }

    pub fn config(&self) -> Option<ConfigId> {
        self.config
    }

    /// Format read back from the chosen config.
    pub fn format(&self) -> &SurfaceFormat {
        &self.format
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Bind the context to `target` on the calling thread.
    pub fn make_current(&mut self, target: SurfaceTarget<'_>) -> bool {
        let (Some(context), Some(config)) = (self.context, self.config) else {
            tracing::warn!(target: targets::GL, "make_current on an invalid context");
            return false;
        };

        let surface = match target {
            SurfaceTarget::Window(window) => match window.ensure_surface(config) {
                Some(surface) => Some(surface),
                None => {
                    tracing::warn!(target: targets::GL, window = %window.window(), "window has no EGL surface");
                    return false;
                }
            },
            SurfaceTarget::Offscreen(offscreen) => offscreen.surface(),
        };
        let binding = surface.map_or(Binding::Surfaceless, Binding::Surface);

        let current = self.egl.current();
        if current.context == Some(context) && current.draw == surface {
            self.state = ContextState::Current(binding);
            return true;
        }

        if let Err(err) = self.egl.make_current(surface, Some(context)) {
            tracing::warn!(target: targets::GL, %err, "eglMakeCurrent failed");
            return false;
        }
        self.state = ContextState::Current(binding);

        let interval = self
            .swap_interval_override
            .unwrap_or_else(|| target.swap_interval());
        // Surfaceless bindings have no drawable to apply an interval to.
        if interval >= 0 && surface.is_some() && self.applied_swap_interval != Some(interval) {
            self.applied_swap_interval = Some(interval);
            self.egl
                .swap_interval(interval)
                .or_warn("failed to set swap interval");
        }
        true
    }

    /// Release the binding without destroying anything.
    pub fn done_current(&mut self) {
        if self.context.is_some() && self.egl.current().context == self.context {
            self.egl
                .make_current(None, None)
                .or_warn("failed to release EGL context");
        }
        self.state = ContextState::Done;
    }

    /// Present the back buffer of a window surface.
    ///
    /// Returns `false` for surfaceless bindings, where there is nothing to
    /// present.
    pub fn swap_buffers(&mut self, target: SurfaceTarget<'_>) -> bool {
        let surface = match target {
            SurfaceTarget::Window(window) => window.surface(),
            SurfaceTarget::Offscreen(offscreen) => offscreen.surface(),
        };
        let Some(surface) = surface else {
            tracing::trace!(target: targets::GL, "swap skipped on surfaceless binding");
            return false;
        };
        self.egl
            .swap_buffers(surface)
            .or_warn("eglSwapBuffers failed")
            .is_some()
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        if self.egl.current().context == Some(context) {
            self.egl
                .make_current(None, None)
                .or_warn("failed to release EGL context");
        }
        if self.ownership == Ownership::Owned {
            self.egl
                .destroy_context(context)
                .or_warn("failed to destroy EGL context");
            tracing::debug!(target: targets::GL, %context, "EGL context destroyed");
        }
    }
}

impl std::fmt::Debug for GlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlContext")
            .field("context", &self.context)
            .field("ownership", &self.ownership)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_screen_core::headless::{HeadlessEgl, HeadlessScreen};

    fn egl(surfaceless: bool) -> Arc<HeadlessEgl> {
        Arc::new(HeadlessEgl::with_surfaceless(
            Arc::new(HeadlessScreen::new()),
            surfaceless,
        ))
    }

    #[test]
    fn test_format_read_back_from_config() {
        let egl = egl(true);
        let ctx = GlContext::new(egl.clone(), SurfaceFormat::default(), None, &ContextSettings::default());
        assert!(ctx.is_valid());
        assert_eq!(ctx.format().depth_size, 24);
        assert_eq!(ctx.format().stencil_size, 8);
        assert_eq!(ctx.state(), ContextState::Uninitialized);
    }

    #[test]
    fn test_probe_without_surfaceless_uses_pbuffer() {
        let egl = egl(false);
        let _ctx = GlContext::new(egl.clone(), SurfaceFormat::default(), None, &ContextSettings::default());
        let stats = egl.stats();
        assert_eq!(stats.surfaces_created, 1);
        assert_eq!(stats.surfaces_destroyed, 1);

        let egl = self::egl(true);
        let _ctx = GlContext::new(egl.clone(), SurfaceFormat::default(), None, &ContextSettings::default());
        assert_eq!(egl.stats().surfaces_created, 0);
    }

    #[test]
    fn test_creation_failure_leaves_invalid_context() {
        let egl = egl(true);
        egl.fail_context_creation(true);
        let mut ctx = GlContext::new(egl.clone(), SurfaceFormat::default(), None, &ContextSettings::default());
        assert!(!ctx.is_valid());

        let offscreen = OffscreenSurface::surfaceless(egl.clone(), Size::new(1, 1), SurfaceFormat::default());
        assert!(!ctx.make_current(SurfaceTarget::Offscreen(&offscreen)));
    }

    #[test]
    fn test_adopted_context_is_not_destroyed() {
        let egl = egl(true);
        let config = egl
            .choose_config(&SurfaceFormat::default().config_request(SurfaceKind::Window))
            .unwrap()
            .unwrap();
        let raw = egl
            .create_context(config, None, &ContextAttributes::default())
            .unwrap();
        let ctx = GlContext::adopt(egl.clone(), raw, config, &ContextSettings::default());
        assert_eq!(ctx.ownership(), Ownership::Adopted);
        drop(ctx);
        assert_eq!(egl.live_contexts(), 1);
        assert_eq!(egl.stats().contexts_destroyed, 0);
    }

    #[test]
    fn test_surfaceless_binding_skips_swap_interval_and_swap() {
        let egl = egl(true);
        let mut ctx = GlContext::new(egl.clone(), SurfaceFormat::default(), None, &ContextSettings::default());
        let offscreen = OffscreenSurface::surfaceless(egl.clone(), Size::new(4, 4), SurfaceFormat::default());

        assert!(ctx.make_current(SurfaceTarget::Offscreen(&offscreen)));
        assert_eq!(ctx.state(), ContextState::Current(Binding::Surfaceless));
        assert!(egl.stats().swap_intervals.is_empty());
        assert!(!ctx.swap_buffers(SurfaceTarget::Offscreen(&offscreen)));

        ctx.done_current();
        assert_eq!(ctx.state(), ContextState::Done);
        assert_eq!(egl.current().context, None);
    }
}
