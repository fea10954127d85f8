//! Paint and composite application
//!
//! Solid paint is mirrored color state. Linear gradients become per-vertex
//! colors on the final geometry, image paints become generated texture
//! coordinates into a repeating texture. Radial gradients have no device
//! path and are approximated by their mid color.

use vecta_core::{Color, Composite, LinearGradient, Paint, Point, Rect};
use vecta_gpu::{
    BlendMode, Capability, Device, GeometryBuffer, Gpu, LogicOp, TextureCache, TextureWrap,
};

pub(crate) fn apply_composite<D: Device>(gpu: &mut Gpu<D>, composite: Composite) {
    let mode = match composite {
        Composite::Xor => {
            gpu.disable(Capability::Blend);
            gpu.set_logic_op(LogicOp::Xor);
            gpu.enable(Capability::ColorLogicOp);
            return;
        }
        Composite::SrcOver => BlendMode::SrcOver,
        Composite::Src => BlendMode::Src,
        Composite::Clear => BlendMode::Clear,
        Composite::Add => BlendMode::Add,
    };
    gpu.disable(Capability::ColorLogicOp);
    gpu.set_blend_mode(mode);
    gpu.enable(Capability::Blend);
}

/// Single color standing in for `paint` where only flat color is possible
pub(crate) fn flat_color(paint: &Paint, at: Point) -> Color {
    match paint {
        Paint::Solid(color) => *color,
        Paint::LinearGradient(gradient) => gradient.color_at(at),
        Paint::RadialGradient(gradient) => gradient.mid_color(),
        Paint::Image(_) => Color::WHITE,
    }
}

fn with_gradient(buffer: &GeometryBuffer, gradient: &LinearGradient) -> GeometryBuffer {
    let colors = buffer
        .positions()
        .iter()
        .map(|&[x, y]| gradient.color_at(Point::new(x, y)).to_array())
        .collect();
    let mut out = buffer.clone();
    out.set_colors(colors);
    out
}

/// Texture coordinates mapping `anchor` onto one image repetition
fn with_pattern(buffer: &GeometryBuffer, anchor: Rect) -> GeometryBuffer {
    let w = if anchor.width.abs() > f32::EPSILON { anchor.width } else { 1.0 };
    let h = if anchor.height.abs() > f32::EPSILON { anchor.height } else { 1.0 };
    let coords = buffer
        .positions()
        .iter()
        .map(|&[x, y]| [(x - anchor.x) / w, (y - anchor.y) / h])
        .collect();
    let mut out = buffer.clone();
    out.set_tex_coords(coords);
    out
}

/// Draw user-space geometry with `paint`
///
/// The caller has set the transform and composite.
pub(crate) fn paint_geometry<D: Device>(
    gpu: &mut Gpu<D>,
    textures: &mut TextureCache,
    paint: &Paint,
    geometry: &[GeometryBuffer],
) {
    match paint {
        Paint::Solid(color) => {
            gpu.disable(Capability::Texture2D);
            gpu.set_color(color.to_array());
            for buffer in geometry {
                gpu.draw(buffer);
            }
        }
        Paint::LinearGradient(gradient) => {
            gpu.disable(Capability::Texture2D);
            for buffer in geometry {
                gpu.draw(&with_gradient(buffer, gradient));
            }
        }
        Paint::RadialGradient(gradient) => {
            tracing::warn!("radial gradient approximated by its mid color");
            gpu.disable(Capability::Texture2D);
            gpu.set_color(gradient.mid_color().to_array());
            for buffer in geometry {
                gpu.draw(buffer);
            }
        }
        Paint::Image(pattern) => {
            let Some(texture) = textures.find_texture(gpu, &pattern.image, None, true, true)
            else {
                tracing::warn!("image paint skipped: no texture for {}", pattern.image.id());
                return;
            };
            gpu.bind_texture(Some(texture.texture));
            gpu.set_texture_wrap(TextureWrap::Repeat);
            gpu.enable(Capability::Texture2D);
            gpu.set_color([1.0; 4]);
            for buffer in geometry {
                gpu.draw(&with_pattern(buffer, pattern.anchor));
            }
            gpu.disable(Capability::Texture2D);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecta_gpu::Topology;

    fn tri() -> GeometryBuffer {
        GeometryBuffer::from_points(
            Topology::Triangles,
            [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
        )
    }

    #[test]
    fn test_gradient_colors_per_vertex() {
        let g = LinearGradient::simple(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Color::BLACK,
            Color::WHITE,
        );
        let out = with_gradient(&tri(), &g);
        assert_eq!(out.color_count(), 3);
        assert_eq!(out.color(0), Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(out.color(1), Some([1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_pattern_coords_relative_to_anchor() {
        let out = with_pattern(&tri(), Rect::new(0.0, 0.0, 5.0, 20.0));
        assert_eq!(out.tex_coord(2), Some([2.0, 0.5]));
    }

    #[test]
    fn test_flat_color_fallbacks() {
        let radial = Paint::RadialGradient(vecta_core::RadialGradient::simple(
            Point::new(0.0, 0.0),
            1.0,
            Color::BLACK,
            Color::WHITE,
        ));
        let mid = flat_color(&radial, Point::new(0.0, 0.0));
        assert!((mid.r - 0.5).abs() < 1e-5);
        assert_eq!(flat_color(&Paint::Solid(Color::RED), Point::new(0.0, 0.0)), Color::RED);
    }
}
