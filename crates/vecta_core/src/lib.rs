//! Vecta core types
//!
//! The vocabulary shared by every layer of the Vecta rendering engine:
//!
//! - **Geometry**: points, rectangles, integer pixel rectangles
//! - **Transforms**: 2D affine matrices and their scale decomposition
//! - **Paths**: multi-contour move/line/quad/cubic/close sequences with a fill rule
//! - **Strokes**: width, caps, joins, miter limit and dash patterns
//! - **Paints**: solid colors, gradients, image paints and composite modes
//! - **Images**: raster pixel sources in a handful of formats
//! - **Fonts**: glyph sources and sized font instances
//!
//! Every object that can key a GPU-side cache (paths, strokes, images, fonts)
//! carries a [`ResourceId`] assigned at construction. Caches key on that
//! identity, never on structural equality.

pub mod color;
pub mod font;
pub mod geometry;
pub mod id;
pub mod image;
pub mod paint;
pub mod path;
pub mod stroke;
pub mod transform;

pub use color::Color;
pub use font::{Font, FontFace, GlyphBitmap, GlyphId, GlyphSource};
pub use geometry::{IRect, Point, Rect, Size};
pub use id::ResourceId;
pub use image::{PixelFormat, RasterImage};
pub use paint::{Composite, GradientStop, ImagePaint, LinearGradient, Paint, RadialGradient};
pub use path::{FillRule, Path, PathBuilder, PathCommand};
pub use stroke::{DashPattern, LineCap, LineJoin, StrokeStyle};
pub use transform::{Affine2D, TransformKind};

use thiserror::Error;

/// Errors raised while constructing core values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    InvalidImageData { expected: usize, actual: usize },

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid dash pattern: {0}")]
    InvalidDash(String),

    #[error("sub-rectangle {0:?} lies outside the image")]
    SubRectOutOfBounds(IRect),
}

pub type Result<T> = std::result::Result<T, GeometryError>;
