//! Raster image sources

use crate::geometry::IRect;
use crate::id::ResourceId;
use crate::{GeometryError, Result};

/// Native pixel layout of a raster image
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// An immutable raster image
///
/// Pixels are tightly packed rows, top row first. The identity is assigned at
/// construction; texture caches key on it.
#[derive(Clone, Debug)]
pub struct RasterImage {
    id: ResourceId,
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GeometryError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(GeometryError::InvalidImageData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            id: ResourceId::next(),
            width,
            height,
            format,
            pixels,
        })
    }

    /// Build an RGBA image from a per-pixel function
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Result<Self> {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, PixelFormat::Rgba8, pixels)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn bounds(&self) -> IRect {
        IRect::from_size(self.width, self.height)
    }

    /// Check that `rect` lies inside the image
    pub fn check_subrect(&self, rect: IRect) -> Result<IRect> {
        if rect.is_empty() || !self.bounds().contains_rect(&rect) {
            return Err(GeometryError::SubRectOutOfBounds(rect));
        }
        Ok(rect)
    }

    /// RGBA value of one pixel, `None` outside the image
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.pixels[i..i + bpp];
        Some(match self.format {
            PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
            PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
            PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
            PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_buffer() {
        let err = RasterImage::new(2, 2, PixelFormat::Rgb8, vec![0; 11]).unwrap_err();
        assert_eq!(
            err,
            GeometryError::InvalidImageData {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn test_rgba_at_swizzles() {
        let img = RasterImage::new(1, 1, PixelFormat::Bgra8, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(img.rgba_at(0, 0), Some([3, 2, 1, 4]));
        assert_eq!(img.rgba_at(1, 0), None);
    }

    #[test]
    fn test_check_subrect() {
        let img = RasterImage::from_fn(4, 3, |_, _| [0, 0, 0, 255]).unwrap();
        assert!(img.check_subrect(IRect::new(1, 1, 3, 2)).is_ok());
        assert!(img.check_subrect(IRect::new(2, 0, 3, 1)).is_err());
        assert!(img.check_subrect(IRect::new(0, 0, 0, 1)).is_err());
    }
}
