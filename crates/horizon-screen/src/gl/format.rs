//! Requested and resolved GL surface formats.

use horizon_screen_core::native::egl::{ConfigAttributes, ConfigRequest, DONT_CARE, SurfaceKind};
use horizon_screen_core::PixelFormat;

/// A GL surface format as requested by the toolkit.
///
/// Sizes of `-1` mean "no preference".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub red_size: i32,
    pub green_size: i32,
    pub blue_size: i32,
    pub alpha_size: i32,
    pub depth_size: i32,
    pub stencil_size: i32,
    pub samples: i32,
    /// Requested swap interval; negative leaves the driver default.
    pub swap_interval: i32,
    pub major_version: i32,
    pub minor_version: i32,
}

impl Default for SurfaceFormat {
    fn default() -> Self {
        Self {
            red_size: DONT_CARE,
            green_size: DONT_CARE,
            blue_size: DONT_CARE,
            alpha_size: DONT_CARE,
            depth_size: DONT_CARE,
            stencil_size: DONT_CARE,
            samples: DONT_CARE,
            swap_interval: 1,
            major_version: 2,
            minor_version: 0,
        }
    }
}

impl SurfaceFormat {
    /// Snap the colour channels to one of the two supported layouts.
    ///
    /// With no colour preference at all the screen depth decides; otherwise
    /// anything that fits in 5-6-5 without alpha gets RGB565 and everything
    /// else RGBA8888.
    pub fn resolve(mut self, screen_depth: u32) -> Self {
        let all_dont_care = [self.red_size, self.green_size, self.blue_size, self.alpha_size]
            .iter()
            .all(|&size| size == DONT_CARE);

        let rgb565 = if all_dont_care {
            screen_depth != 32
        } else {
            self.alpha_size <= 0
                && self.red_size <= 5
                && self.green_size <= 6
                && self.blue_size <= 5
        };

        (self.red_size, self.green_size, self.blue_size, self.alpha_size) = if rgb565 {
            (5, 6, 5, 0)
        } else {
            (8, 8, 8, 8)
        };
        self
    }

    /// Native pixel format for a resolved format.
    pub fn pixel_format(&self) -> PixelFormat {
        if self.red_size == 5 && self.green_size == 6 && self.blue_size == 5 && self.alpha_size <= 0
        {
            PixelFormat::Rgb565
        } else {
            PixelFormat::Rgba8888
        }
    }

    pub fn config_request(&self, surface: SurfaceKind) -> ConfigRequest {
        ConfigRequest {
            red: self.red_size,
            green: self.green_size,
            blue: self.blue_size,
            alpha: self.alpha_size,
            depth: self.depth_size,
            stencil: self.stencil_size,
            samples: self.samples,
            surface,
        }
    }

    /// Replace buffer sizes with what the chosen config actually provides.
    pub fn with_config(mut self, attributes: &ConfigAttributes) -> Self {
        self.red_size = attributes.red;
        self.green_size = attributes.green;
        self.blue_size = attributes.blue;
        self.alpha_size = attributes.alpha;
        self.depth_size = attributes.depth;
        self.stencil_size = attributes.stencil;
        self.samples = attributes.samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dont_care_follows_screen_depth() {
        let format = SurfaceFormat::default();
        let deep = format.resolve(32);
        assert_eq!((deep.red_size, deep.alpha_size), (8, 8));
        assert_eq!(deep.pixel_format(), PixelFormat::Rgba8888);

        let shallow = format.resolve(16);
        assert_eq!(
            (shallow.red_size, shallow.green_size, shallow.blue_size, shallow.alpha_size),
            (5, 6, 5, 0)
        );
        assert_eq!(shallow.pixel_format(), PixelFormat::Rgb565);
    }

    #[test]
    fn test_small_request_snaps_to_565() {
        let format = SurfaceFormat {
            red_size: 4,
            green_size: 4,
            blue_size: 4,
            alpha_size: 0,
            ..Default::default()
        };
        assert_eq!(format.resolve(32).pixel_format(), PixelFormat::Rgb565);
    }

    #[test]
    fn test_alpha_request_snaps_to_8888() {
        let format = SurfaceFormat {
            alpha_size: 1,
            ..Default::default()
        };
        let resolved = format.resolve(16);
        assert_eq!((resolved.red_size, resolved.alpha_size), (8, 8));
    }

    #[test]
    fn test_config_request_carries_sizes() {
        let format = SurfaceFormat {
            depth_size: 24,
            ..Default::default()
        }
        .resolve(32);
        let request = format.config_request(SurfaceKind::Pbuffer);
        assert_eq!(request.depth, 24);
        assert_eq!(request.stencil, DONT_CARE);
        assert_eq!(request.surface, SurfaceKind::Pbuffer);
    }
}
