//! Raster windows: double-buffered native render buffers.
//!
//! Two buffers alternate. The previous buffer always holds the complete
//! image last posted; the current one starts with the image from two posts
//! ago plus whatever the toolkit painted since. Before posting, the parts
//! of the previous frame that were neither repainted nor scrolled are
//! copied forward so the current buffer is complete again.

use std::sync::Arc;

use horizon_screen_core::{Rect, Region, ScreenApi, Size, WindowHandle};

use super::WindowId;
use crate::buffer::{Buffer, BufferAllocation, BufferRequest};
use crate::error::{CheckNative, ScreenError, ScreenResult};
use crate::logging::targets;
use crate::system::WindowSystem;

#[derive(Debug, Clone, PartialEq)]
struct ScrollOp {
    area: Region,
    dx: i32,
    dy: i32,
}

/// Buffers and posting state of a raster window.
pub struct RasterSurface {
    api: Arc<dyn ScreenApi>,
    window: WindowHandle,
    allocation: BufferAllocation,
    buffers: Vec<Buffer>,
    current: Option<usize>,
    previous: Option<usize>,
    previous_dirty: Region,
    scrolled: Region,
    scroll_ops: Vec<ScrollOp>,
}

impl RasterSurface {
    pub(crate) fn new(api: Arc<dyn ScreenApi>, window: WindowHandle) -> Self {
        Self {
            api,
            window,
            allocation: BufferAllocation::default(),
            buffers: Vec::new(),
            current: None,
            previous: None,
            previous_dirty: Region::new(),
            scrolled: Region::new(),
            scroll_ops: Vec::new(),
        }
    }

    /// Size of the allocated buffers, if any.
    pub fn buffer_size(&self) -> Option<Size> {
        self.allocation.size()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.previous
    }

    pub fn pending_scrolls(&self) -> usize {
        self.scroll_ops.len()
    }

    /// Returns `true` if the buffers were reallocated.
    pub(crate) fn set_buffer_size(&mut self, request: &BufferRequest) -> bool {
        if !self.allocation.apply(self.api.as_ref(), self.window, request) {
            return false;
        }
        self.reset_buffers();
        true
    }

    /// Forget wrapped buffers; they are fetched again on next use.
    pub(crate) fn reset_buffers(&mut self) {
        self.buffers.clear();
        self.current = None;
        self.previous = None;
        self.previous_dirty = Region::new();
        self.scrolled = Region::new();
        self.scroll_ops.clear();
    }

    /// The buffer to paint the next frame into.
    ///
    /// # Panics
    ///
    /// Panics if the compositor cannot hand out the buffers it created.
    pub fn render_buffer(&mut self) -> ScreenResult<&Buffer> {
        if self.allocation.size().is_none() {
            return Err(ScreenError::NoBuffers);
        }

        if self.current.is_none() {
            let handles = self
                .api
                .render_buffers(self.window)
                .or_fatal("failed to query window buffers");
            if handles.is_empty() {
                tracing::error!(target: targets::BUFFER, window = %self.window, "compositor returned no render buffers");
                panic!("window {} has no render buffers", self.window);
            }

            self.buffers = handles
                .into_iter()
                .map(|handle| Buffer::new(self.api.clone(), handle))
                .collect();
            for buffer in &self.buffers {
                if let Err(err) = buffer.clear() {
                    tracing::warn!(target: targets::BUFFER, buffer = %buffer.handle(), %err, "failed to clear window buffer");
                }
            }
            self.api.flush_blits().or_warn("failed to flush blits");

            self.current = Some(0);
            self.previous = None;
        }

        let index = self.current.unwrap_or_default();
        self.buffers.get(index).ok_or(ScreenError::NoBuffers)
    }

    /// Queue a scroll of `area` by `(dx, dy)`.
    ///
    /// A scroll of an identical area accumulates into the pending one. A
    /// scroll that overlaps a pending one without matching it is refused;
    /// the caller must repaint instead.
    pub fn scroll(&mut self, area: Region, dx: i32, dy: i32) -> bool {
        for op in &mut self.scroll_ops {
            if op.area == area {
                op.dx += dx;
                op.dy += dy;
                return true;
            }
            if area.rects().iter().any(|rect| op.area.intersects(rect)) {
                tracing::trace!(target: targets::BUFFER, window = %self.window, "overlapping scroll refused");
                return false;
            }
        }
        self.scroll_ops.push(ScrollOp { area, dx, dy });
        true
    }

    /// Copy `region` of the previous buffer into the current one, shifted.
    fn blit_previous_to_current(&self, region: &Region, dx: i32, dy: i32) {
        let (Some(current), Some(previous)) = (self.current, self.previous) else {
            return;
        };
        let (Some(dst), Some(src)) = (self.buffers.get(current), self.buffers.get(previous)) else {
            return;
        };
        for rect in region.rects() {
            let Some(rect) = rect.intersection(&dst.rect()) else {
                continue;
            };
            self.api
                .blit(dst.handle(), src.handle(), rect, rect.translated(dx, dy))
                .or_warn("failed to blit buffers");
        }
    }

    /// Post the current buffer with `dirty` as the newly painted region.
    ///
    /// Returns `false` when there was nothing to post.
    #[tracing::instrument(level = "trace", skip_all, fields(window = %self.window))]
    pub(crate) fn post(&mut self, dirty: &Region, always_flush: bool) -> bool {
        let ops = std::mem::take(&mut self.scroll_ops);
        for op in &ops {
            self.blit_previous_to_current(&op.area, op.dx, op.dy);
            self.scrolled = self.scrolled.united(&op.area);
        }
        if !ops.is_empty() {
            self.api.flush_blits().or_warn("failed to flush blits");
        }

        let Some(current) = self.current else {
            return false;
        };
        if dirty.is_empty() && self.scrolled.is_empty() {
            return false;
        }
        let Some(buffer) = self.buffers.get(current).map(Buffer::handle) else {
            return false;
        };

        let preserve = self
            .previous_dirty
            .subtracted(dirty)
            .subtracted(&self.scrolled);
        self.blit_previous_to_current(&preserve, 0, 0);

        let modified = preserve.united(dirty).united(&self.scrolled);
        let bounds: Rect = modified.bounding_rect();
        if self
            .api
            .post_window(self.window, buffer, &[bounds])
            .or_warn("failed to post window")
            .is_none()
        {
            return false;
        }

        self.previous = Some(current);
        self.current = Some((current + 1) % self.buffers.len());
        self.previous_dirty = dirty.clone();
        self.scrolled = Region::new();

        if always_flush {
            self.api
                .flush_context()
                .or_warn("failed to flush screen context");
        }
        tracing::trace!(target: targets::BUFFER, %bounds, "window posted");
        true
    }
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("window", &self.window)
            .field("buffer_size", &self.allocation.size())
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("pending_scrolls", &self.scroll_ops.len())
            .finish_non_exhaustive()
    }
}

impl WindowSystem {
    /// Resize a raster window's buffers. Returns `true` if they were reallocated.
    pub fn set_buffer_size(&mut self, id: WindowId, size: Size) -> ScreenResult<bool> {
        let window = self.windows.get(id).ok_or(ScreenError::InvalidWindow)?;
        let format = self
            .screens
            .get(window.screen)
            .ok_or(ScreenError::InvalidScreen)?
            .native_format();
        let request = BufferRequest {
            size,
            format,
            alpha_buffer_size: window.alpha_buffer_size,
            count: self.options.buffer_count,
        };
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        let raster = window.raster_mut().ok_or(ScreenError::NotRaster)?;
        Ok(raster.set_buffer_size(&request))
    }

    /// The buffer the toolkit should paint the next frame of `id` into.
    pub fn render_buffer(&mut self, id: WindowId) -> ScreenResult<&Buffer> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        window
            .raster_mut()
            .ok_or(ScreenError::NotRaster)?
            .render_buffer()
    }

    /// Queue a scroll. `Ok(false)` means the caller must repaint the area.
    pub fn scroll(&mut self, id: WindowId, area: Region, dx: i32, dy: i32) -> ScreenResult<bool> {
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        Ok(window
            .raster_mut()
            .ok_or(ScreenError::NotRaster)?
            .scroll(area, dx, dy))
    }

    /// Apply pending scrolls and post the painted region of `id`.
    pub fn post(&mut self, id: WindowId, dirty: &Region) -> ScreenResult<bool> {
        let always_flush = self.options.always_flush_screen_context;
        let window = self.windows.get_mut(id).ok_or(ScreenError::InvalidWindow)?;
        Ok(window
            .raster_mut()
            .ok_or(ScreenError::NotRaster)?
            .post(dirty, always_flush))
    }
}
