//! Drawing-context state
//!
//! A host may drive several logical drawing contexts through one engine.
//! Each keeps a [`ContextState`] and hands it to
//! [`crate::RenderEngine::activate`] before drawing; the engine copies it and
//! re-establishes transform, composite and clip on the device.

use vecta_core::{Affine2D, Composite, Font, Paint, Path, Rect, StrokeStyle};
use vecta_text::RenderingHints;

/// A clip region in user space
#[derive(Clone, Debug)]
pub enum ClipShape {
    Rect(Rect),
    Path(Path),
}

/// One established clip region with the device transform it was set under
#[derive(Clone, Debug)]
pub struct ClipEntry {
    /// Set when the region is a rectangle, enabling scissor or plane clipping
    pub rect: Option<Rect>,
    /// Outline written into the stencil when the rectangle paths cannot be used
    pub path: Path,
    pub transform: Affine2D,
}

impl ClipEntry {
    pub fn new(shape: ClipShape, transform: Affine2D) -> Self {
        match shape {
            ClipShape::Rect(rect) => Self {
                rect: Some(rect),
                path: Path::rect(rect),
                transform,
            },
            ClipShape::Path(path) => Self {
                rect: None,
                path,
                transform,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ContextState {
    /// User to logical-pixel transform
    pub transform: Affine2D,
    /// Logical to device pixels (HiDPI factor)
    pub scale_factor: f32,
    pub stroke: StrokeStyle,
    pub paint: Paint,
    pub composite: Composite,
    pub font: Option<Font>,
    pub hints: RenderingHints,
    /// Clip regions intersected together, outermost first
    pub clip: Vec<ClipEntry>,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            transform: Affine2D::IDENTITY,
            scale_factor: 1.0,
            stroke: StrokeStyle::default(),
            paint: Paint::default(),
            composite: Composite::default(),
            font: None,
            hints: RenderingHints::default(),
            clip: Vec::new(),
        }
    }
}

impl ContextState {
    pub fn new() -> Self {
        Self::default()
    }

    /// User space to device pixels
    pub fn device_transform(&self) -> Affine2D {
        self.transform
            .then(&Affine2D::uniform_scale(self.scale_factor))
    }

    /// Uniform device scale of the current transform
    pub fn device_scale(&self) -> f32 {
        self.device_transform().scale_factor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_scale_includes_scale_factor() {
        let state = ContextState {
            transform: Affine2D::scale(3.0, 3.0),
            scale_factor: 2.0,
            ..Default::default()
        };
        assert!((state.device_scale() - 6.0).abs() < 1e-5);
        let p = state
            .device_transform()
            .transform_point(vecta_core::Point::new(1.0, 1.0));
        assert_eq!((p.x, p.y), (6.0, 6.0));
    }

    #[test]
    fn test_rect_clip_keeps_rect() {
        let entry = ClipEntry::new(
            ClipShape::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)),
            Affine2D::IDENTITY,
        );
        assert!(entry.rect.is_some());
        assert_eq!(entry.path.contour_count(), 1);
    }
}
