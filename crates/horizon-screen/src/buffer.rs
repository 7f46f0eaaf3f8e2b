//! Render buffers and CPU views over their pixels.

use std::sync::Arc;

use horizon_screen_core::{
    BufferHandle, NativeError, PixelFormat, Rect, ScreenApi, Size, Transparency, WindowHandle,
    WindowProperty,
};

use crate::error::{CheckNative, ScreenError, ScreenResult};
use crate::logging::targets;

/// In-memory layout of a buffer's pixels, as a painter sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Rgb444,
    Argb4444Premultiplied,
    Rgb555,
    Rgb16,
    Rgb32,
    Argb32Premultiplied,
}

impl ImageFormat {
    /// Map a native pixel format. Formats without an image layout are rejected.
    pub fn from_pixel_format(format: PixelFormat) -> ScreenResult<Self> {
        match format {
            PixelFormat::Rgbx4444 => Ok(Self::Rgb444),
            PixelFormat::Rgba4444 => Ok(Self::Argb4444Premultiplied),
            PixelFormat::Rgbx5551 => Ok(Self::Rgb555),
            PixelFormat::Rgb565 => Ok(Self::Rgb16),
            PixelFormat::Rgbx8888 => Ok(Self::Rgb32),
            PixelFormat::Rgba8888 => Ok(Self::Argb32Premultiplied),
            PixelFormat::Rgba5551 => Err(ScreenError::UnsupportedFormat(format)),
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb32 | Self::Argb32Premultiplied => 4,
            _ => 2,
        }
    }
}

/// One native render buffer.
///
/// A `Buffer` is only handed out while the window's buffers are alive;
/// resizing destroys and recreates them and drops every `Buffer` first.
pub struct Buffer {
    api: Arc<dyn ScreenApi>,
    handle: BufferHandle,
    size: Size,
    stride: usize,
    format: ImageFormat,
}

impl Buffer {
    /// Wrap a native buffer, querying its layout.
    ///
    /// # Panics
    ///
    /// Panics if the layout cannot be queried or the format has no image
    /// representation: painting into it would corrupt memory.
    pub fn new(api: Arc<dyn ScreenApi>, handle: BufferHandle) -> Self {
        let info = api.buffer_info(handle).or_fatal("failed to query buffer layout");
        let format = match ImageFormat::from_pixel_format(info.format) {
            Ok(format) => format,
            Err(err) => {
                tracing::error!(target: targets::BUFFER, buffer = %handle, %err, "unsupported buffer format");
                panic!("unsupported buffer format {:?}", info.format);
            }
        };
        tracing::trace!(target: targets::BUFFER, buffer = %handle, size = %info.size, ?format, "buffer wrapped");
        Self {
            api,
            handle,
            size: info.size,
            stride: info.stride,
            format,
        }
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_size(self.size)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Run `f` with a view over the buffer's pixels.
    pub fn paint<R>(&self, f: impl FnOnce(&mut ImageView<'_>) -> R) -> ScreenResult<R> {
        let mut f = Some(f);
        let mut result = None;
        let (size, stride, format) = (self.size, self.stride, self.format);
        self.api.with_buffer_memory(self.handle, &mut |bytes: &mut [u8]| {
            if let Some(f) = f.take() {
                let mut view = ImageView {
                    bytes,
                    size,
                    stride,
                    format,
                };
                result = Some(f(&mut view));
            }
        })?;
        result.ok_or(ScreenError::Native(NativeError::InvalidHandle))
    }

    /// Clear the whole buffer to transparent black.
    pub fn clear(&self) -> ScreenResult<()> {
        self.paint(|view| view.fill(0))
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .finish()
    }
}

/// Parameters for (re)allocating a window's native buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferRequest {
    pub size: Size,
    pub format: PixelFormat,
    /// Requested alpha depth in bits; `<= 0` means opaque.
    pub alpha_buffer_size: i32,
    pub count: usize,
}

/// What has been allocated natively for one window.
#[derive(Debug, Default)]
pub(crate) struct BufferAllocation {
    size: Option<Size>,
    format: Option<PixelFormat>,
}

impl BufferAllocation {
    pub fn size(&self) -> Option<Size> {
        self.size
    }

    /// Bring the native buffers in line with `request`.
    ///
    /// Returns `false` without touching the compositor when the clamped size
    /// and format already match. Empty sizes allocate 1x1 buffers that are
    /// never composited, so the window still counts as visible for its
    /// children.
    pub fn apply(
        &mut self,
        api: &dyn ScreenApi,
        window: WindowHandle,
        request: &BufferRequest,
    ) -> bool {
        let size = request.size.non_empty();
        if self.size == Some(size) && self.format == Some(request.format) {
            return false;
        }

        api.set_window_property(window, WindowProperty::Format(request.format))
            .or_fatal("failed to set window format");
        if self.size.is_some() {
            api.destroy_window_buffers(window)
                .or_fatal("failed to destroy window buffers");
        }
        api.set_window_property(window, WindowProperty::BufferSize(size))
            .or_warn("failed to set window buffer size");
        api.create_window_buffers(window, request.count)
            .or_fatal("failed to create window buffers");

        let created = api
            .window_info(window)
            .or_fatal("failed to query render buffer count")
            .buffer_count;
        if created != request.count {
            tracing::error!(
                target: targets::BUFFER,
                %window,
                expected = request.count,
                created,
                "compositor created the wrong number of buffers"
            );
            panic!("invalid buffer count: expected {}, got {created}", request.count);
        }

        let transparency = if size != request.size {
            Transparency::Discard
        } else if request.alpha_buffer_size > 0 {
            Transparency::SourceOver
        } else {
            Transparency::None
        };
        api.set_window_property(window, WindowProperty::Transparency(transparency))
            .or_warn("failed to set window transparency");
        api.set_window_property(window, WindowProperty::SwapInterval(1))
            .or_warn("failed to set window swap interval");

        tracing::debug!(
            target: targets::BUFFER,
            %window,
            %size,
            format = ?request.format,
            ?transparency,
            "window buffers allocated"
        );
        self.size = Some(size);
        self.format = Some(request.format);
        true
    }
}

/// A mutable view over a buffer's pixel memory.
pub struct ImageView<'a> {
    bytes: &'a mut [u8],
    size: Size,
    stride: usize,
    format: ImageFormat,
}

impl ImageView<'_> {
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &*self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }

    /// The bytes of row `y`, without trailing padding.
    pub fn row_mut(&mut self, y: i32) -> Option<&mut [u8]> {
        if y < 0 || y >= self.size.height {
            return None;
        }
        let start = y as usize * self.stride;
        let len = self.size.width as usize * self.format.bytes_per_pixel();
        self.bytes.get_mut(start..start + len)
    }

    /// Read a pixel, zero-extended to 32 bits.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        let offset = self.offset(x, y)?;
        let bpp = self.format.bytes_per_pixel();
        let bytes = self.bytes.get(offset..offset + bpp)?;
        Some(match bpp {
            4 => bytemuck::pod_read_unaligned::<u32>(bytes),
            _ => u32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
        })
    }

    /// Write a pixel, truncating to the format's width.
    pub fn set_pixel(&mut self, x: i32, y: i32, value: u32) -> bool {
        let Some(offset) = self.offset(x, y) else {
            return false;
        };
        let bpp = self.format.bytes_per_pixel();
        let Some(dst) = self.bytes.get_mut(offset..offset + bpp) else {
            return false;
        };
        match bpp {
            4 => dst.copy_from_slice(bytemuck::bytes_of(&value)),
            _ => dst.copy_from_slice(bytemuck::bytes_of(&(value as u16))),
        }
        true
    }

    /// Fill every pixel with `value`.
    pub fn fill(&mut self, value: u32) {
        let height = self.size.height;
        let bpp = self.format.bytes_per_pixel();
        for y in 0..height {
            let Some(row) = self.row_mut(y) else { continue };
            match bpp {
                4 => {
                    if let Ok(pixels) = bytemuck::try_cast_slice_mut::<u8, u32>(&mut *row) {
                        pixels.fill(value);
                    } else {
                        // unaligned mapping
                        row.chunks_exact_mut(4)
                            .for_each(|px| px.copy_from_slice(bytemuck::bytes_of(&value)));
                    }
                }
                _ => {
                    let value = value as u16;
                    row.chunks_exact_mut(2)
                        .for_each(|px| px.copy_from_slice(bytemuck::bytes_of(&value)));
                }
            }
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if !Rect::from_size(self.size).contains_point((x, y).into()) {
            return None;
        }
        Some(y as usize * self.stride + x as usize * self.format.bytes_per_pixel())
    }
}
