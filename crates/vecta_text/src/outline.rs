//! Glyph outline tessellation shared by the outline strategies

use vecta_core::{Affine2D, GlyphId, GlyphSource};
use vecta_gpu::flatten::flatten_path;
use vecta_gpu::{
    Contour, Device, GeometryBuffer, GeometryCollector, Gpu, ListId, Tessellator,
};

/// Triangles for `glyph` at `pixel_size`, baseline at the origin, y down
///
/// Empty glyphs (spaces) and failed sweeps yield no buffers.
pub fn glyph_geometry(
    tessellator: &mut Tessellator,
    source: &dyn GlyphSource,
    glyph: GlyphId,
    pixel_size: f32,
    tolerance: f32,
) -> Vec<GeometryBuffer> {
    let Some(outline) = source.outline(glyph) else {
        return Vec::new();
    };
    let s = pixel_size / source.units_per_em().max(1) as f32;
    let path = outline.transformed(&Affine2D::scale(s, -s));
    let contours: Vec<Contour> = flatten_path(&path, tolerance)
        .iter()
        .map(Contour::from_polyline)
        .collect();
    let mut collector = GeometryCollector::new();
    match tessellator.tessellate(&contours, path.fill_rule(), &mut collector) {
        Ok(_) => vec![collector.finish()],
        Err(_) => Vec::new(),
    }
}

/// Compile geometry into a list, `None` when empty or compilation failed
pub fn compile<D: Device>(gpu: &mut Gpu<D>, geometry: &[GeometryBuffer]) -> Option<ListId> {
    if geometry.is_empty() {
        return None;
    }
    match gpu.compile_list(geometry) {
        Ok(list) => Some(list),
        Err(e) => {
            tracing::warn!("glyph kept without a draw list: {}", e);
            None
        }
    }
}

/// Replay a list, or the raw geometry when there is none
pub fn replay<D: Device>(gpu: &mut Gpu<D>, list: Option<ListId>, geometry: &[GeometryBuffer]) {
    match list {
        Some(list) => gpu.call_list(list),
        None => {
            for buffer in geometry {
                gpu.draw(buffer);
            }
        }
    }
}
