//! Paints and composite modes

use std::sync::Arc;

use crate::color::Color;
use crate::geometry::{Point, Rect};
use crate::image::RasterImage;

/// A gradient stop
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f32, // 0.0 to 1.0
    pub color: Color,
}

/// Sample a sorted stop list at `t` with pad extend
fn sample_stops(stops: &[GradientStop], t: f32) -> Color {
    let Some(first) = stops.first() else {
        return Color::TRANSPARENT;
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            if span <= f32::EPSILON {
                return b.color;
            }
            return a.color.lerp(b.color, (t - a.offset) / span);
        }
    }
    stops.last().map(|s| s.color).unwrap_or(first.color)
}

/// Linear gradient between two points
#[derive(Clone, Debug, PartialEq)]
pub struct LinearGradient {
    pub start: Point,
    pub end: Point,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    /// Create a simple linear gradient between two colors
    pub fn simple(start: Point, end: Point, from: Color, to: Color) -> Self {
        Self {
            start,
            end,
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: from,
                },
                GradientStop {
                    offset: 1.0,
                    color: to,
                },
            ],
        }
    }

    /// Color at a user-space position (pad extend)
    pub fn color_at(&self, p: Point) -> Color {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let len2 = dx * dx + dy * dy;
        let t = if len2 <= f32::EPSILON {
            0.0
        } else {
            ((p.x - self.start.x) * dx + (p.y - self.start.y) * dy) / len2
        };
        sample_stops(&self.stops, t)
    }
}

/// Radial gradient around a center
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGradient {
    pub center: Point,
    pub radius: f32,
    pub stops: Vec<GradientStop>,
}

impl RadialGradient {
    /// Create a simple radial gradient between two colors
    pub fn simple(center: Point, radius: f32, from: Color, to: Color) -> Self {
        Self {
            center,
            radius,
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: from,
                },
                GradientStop {
                    offset: 1.0,
                    color: to,
                },
            ],
        }
    }

    /// The color halfway along the gradient
    pub fn mid_color(&self) -> Color {
        sample_stops(&self.stops, 0.5)
    }
}

/// A repeating image paint anchored to a user-space rect
#[derive(Clone, Debug)]
pub struct ImagePaint {
    pub image: Arc<RasterImage>,
    /// One repetition of the image covers this rect
    pub anchor: Rect,
}

/// What fills the covered pixels of a draw
#[derive(Clone, Debug)]
pub enum Paint {
    Solid(Color),
    LinearGradient(LinearGradient),
    RadialGradient(RadialGradient),
    Image(ImagePaint),
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid(Color::BLACK)
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

impl Paint {
    pub fn is_solid(&self) -> bool {
        matches!(self, Paint::Solid(_))
    }
}

/// How drawn pixels combine with the destination
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Composite {
    #[default]
    SrcOver,
    Src,
    Clear,
    Add,
    Xor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_gradient_pads() {
        let g = LinearGradient::simple(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Color::BLACK,
            Color::WHITE,
        );
        assert_eq!(g.color_at(Point::new(-5.0, 3.0)), Color::BLACK);
        assert_eq!(g.color_at(Point::new(50.0, 0.0)), Color::WHITE);
        let mid = g.color_at(Point::new(5.0, 7.0));
        assert!((mid.r - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_radial_mid_color() {
        let g = RadialGradient::simple(Point::ZERO, 4.0, Color::RED, Color::BLUE);
        let mid = g.mid_color();
        assert!((mid.r - 0.5).abs() < 1e-5 && (mid.b - 0.5).abs() < 1e-5);
    }
}
