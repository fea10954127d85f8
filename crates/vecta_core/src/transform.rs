//! 2D affine transforms
//!
//! Matrices follow the `[a c e; b d f; 0 0 1]` convention:
//! `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.

use crate::geometry::{Point, Rect};

/// Structural class of a transform, used to pick cheap paths
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
    Identity,
    /// Translation only
    Translate,
    /// Axis-aligned scale (plus translation)
    Scale,
    /// Unit diagonal with off-diagonal terms (plus translation)
    Shear,
    /// Anything else (rotation, mixed scale and shear)
    General,
}

/// A 2D affine transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2D {
    pub const IDENTITY: Affine2D = Affine2D {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translate(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn uniform_scale(s: f32) -> Self {
        Self::scale(s, s)
    }

    /// Rotation by `radians`, clockwise on a y-down surface
    pub fn rotate(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    pub const fn shear(shx: f32, shy: f32) -> Self {
        Self::new(1.0, shy, shx, 1.0, 0.0, 0.0)
    }

    /// Apply `self` first, then `next`
    pub fn then(&self, next: &Affine2D) -> Affine2D {
        Affine2D {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            e: next.a * self.e + next.c * self.f + next.e,
            f: next.b * self.e + next.d * self.f + next.f,
        }
    }

    /// Apply `local` first, then `self` (post-multiply, as a matrix stack push does)
    pub fn pre(&self, local: &Affine2D) -> Affine2D {
        local.then(self)
    }

    pub fn transform_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn transform_vector(&self, v: Point) -> Point {
        Point::new(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn inverse(&self) -> Option<Affine2D> {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine2D {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    pub fn kind(&self) -> TransformKind {
        let no_offdiag = self.b == 0.0 && self.c == 0.0;
        let unit_diag = self.a == 1.0 && self.d == 1.0;
        let no_translate = self.e == 0.0 && self.f == 0.0;
        match (no_offdiag, unit_diag) {
            (true, true) if no_translate => TransformKind::Identity,
            (true, true) => TransformKind::Translate,
            (true, false) => TransformKind::Scale,
            (false, true) => TransformKind::Shear,
            (false, false) => TransformKind::General,
        }
    }

    /// Effective uniform scale, used to pick flattening tolerance
    ///
    /// Pure scales use the larger axis factor; shears use the longer
    /// transformed basis vector; general transforms measure the length of a
    /// transformed unit diagonal.
    pub fn scale_factor(&self) -> f32 {
        match self.kind() {
            TransformKind::Identity | TransformKind::Translate => 1.0,
            TransformKind::Scale => self.a.abs().max(self.d.abs()),
            TransformKind::Shear => {
                let x = self.transform_vector(Point::new(1.0, 0.0));
                let y = self.transform_vector(Point::new(0.0, 1.0));
                x.distance(Point::ZERO).max(y.distance(Point::ZERO))
            }
            TransformKind::General => {
                let unit = std::f32::consts::FRAC_1_SQRT_2;
                self.transform_vector(Point::new(unit, unit))
                    .distance(Point::ZERO)
            }
        }
    }

    /// Rotation, uniform or non-uniform scale and translation, no shear
    pub fn is_similarity(&self) -> bool {
        // Columns must be orthogonal
        (self.a * self.c + self.b * self.d).abs() <= 1e-5
    }

    /// Whether rectangles stay axis-aligned rectangles (no rotation except
    /// multiples of 90 degrees, no shear)
    pub fn preserves_axes(&self) -> bool {
        (self.b == 0.0 && self.c == 0.0) || (self.a == 0.0 && self.d == 0.0)
    }

    /// Bounding box of a transformed rect
    pub fn transform_rect_bounds(&self, rect: &Rect) -> Rect {
        Rect::bounding(rect.corners().map(|p| self.transform_point(p))).unwrap_or_default()
    }

    pub fn to_array(&self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}
