//! Stroke geometry
//!
//! Wide strokes are expanded into triangles with lyon's stroke tessellator
//! after flattening and dashing; hairlines become device line primitives.

use lyon::lyon_tessellation::{
    BuffersBuilder, LineCap as LyonCap, LineJoin as LyonJoin, StrokeOptions, StrokeTessellator,
    StrokeVertex, VertexBuffers,
};
use lyon::math::point;
use lyon::path::Path as LyonPath;
use vecta_core::{LineCap, LineJoin, Path, StrokeStyle};

use crate::device::Topology;
use crate::flatten::{apply_dash, flatten_path, Polyline};
use crate::geometry::GeometryBuffer;
use crate::tessellator::TessellationError;

/// lyon rejects miter limits below one
const MIN_MITER_LIMIT: f32 = 1.0;

fn options_for(style: &StrokeStyle, tolerance: f32) -> StrokeOptions {
    StrokeOptions::default()
        .with_line_width(style.width())
        .with_tolerance(tolerance.max(1e-4))
        .with_line_cap(match style.cap() {
            LineCap::Butt => LyonCap::Butt,
            LineCap::Round => LyonCap::Round,
            LineCap::Square => LyonCap::Square,
        })
        .with_line_join(match style.join() {
            LineJoin::Miter => LyonJoin::Miter,
            LineJoin::Round => LyonJoin::Round,
            LineJoin::Bevel => LyonJoin::Bevel,
        })
        .with_miter_limit(style.miter_limit().max(MIN_MITER_LIMIT))
}

/// Flattened, dashed contours of `path` as seen by the stroker
pub fn stroke_polylines(path: &Path, style: &StrokeStyle, tolerance: f32) -> Vec<Polyline> {
    let lines = flatten_path(path, tolerance);
    match style.dash() {
        Some(dash) => apply_dash(&lines, dash),
        None => lines,
    }
}

/// Expand polylines into a triangle list covering the stroke
pub fn stroke_lines(
    lines: &[Polyline],
    style: &StrokeStyle,
    tolerance: f32,
) -> Result<GeometryBuffer, TessellationError> {
    let mut builder = LyonPath::builder();
    let mut any = false;
    for line in lines {
        let points = if line.closed { line.ring() } else { &line.points[..] };
        let Some((first, rest)) = points.split_first() else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        any = true;
        builder.begin(point(first.x, first.y));
        for p in rest {
            builder.line_to(point(p.x, p.y));
        }
        builder.end(line.closed);
    }
    if !any {
        return Err(TessellationError::EmptyInput);
    }
    let path = builder.build();

    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = StrokeTessellator::new();
    let result = tessellator.tessellate_path(
        &path,
        &options_for(style, tolerance),
        &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| {
            vertex.position().to_array()
        }),
    );
    if let Err(e) = result {
        tracing::warn!("stroke tessellation failed: {:?}", e);
        return Err(TessellationError::Sweep(format!("{e:?}")));
    }

    let mut buffer = GeometryBuffer::with_capacity(Topology::Triangles, geometry.indices.len());
    for tri in geometry.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| geometry.vertices[i as usize]);
        let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
        let ordered = if area < 0.0 { [a, c, b] } else { [a, b, c] };
        for p in ordered {
            buffer.push(vecta_core::Point::new(p[0], p[1]));
        }
    }
    Ok(buffer)
}

/// Flatten, dash and expand a stroke in one go
pub fn stroke_path(
    path: &Path,
    style: &StrokeStyle,
    tolerance: f32,
) -> Result<GeometryBuffer, TessellationError> {
    stroke_lines(&stroke_polylines(path, style, tolerance), style, tolerance)
}

/// Device line primitives for a hairline stroke, one buffer per contour
pub fn hairline_geometry(lines: &[Polyline]) -> Vec<GeometryBuffer> {
    lines
        .iter()
        .filter(|l| l.points.len() > 1)
        .map(|l| {
            if l.closed {
                GeometryBuffer::from_points(Topology::LineLoop, l.ring().iter().copied())
            } else {
                GeometryBuffer::from_points(Topology::LineStrip, l.points.iter().copied())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecta_core::{DashPattern, Point, Rect};

    #[test]
    fn test_stroke_line_area() {
        let path = Path::line(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let buffer = stroke_path(&path, &StrokeStyle::new(2.0), 0.1).unwrap();
        assert_eq!(buffer.topology(), Topology::Triangles);
        assert!((buffer.covered_area() - 20.0).abs() < 1e-3);
        for tri in buffer.triangles() {
            assert!(buffer.signed_area(tri) >= 0.0);
        }
    }

    #[test]
    fn test_square_cap_extends() {
        let path = Path::line(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let style = StrokeStyle::new(2.0).with_cap(LineCap::Square);
        let buffer = stroke_path(&path, &style, 0.1).unwrap();
        assert!((buffer.covered_area() - 24.0).abs() < 1e-3);
    }

    #[test]
    fn test_dashed_stroke_covers_less() {
        let path = Path::line(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let dash = DashPattern::new(&[2.0, 3.0], 0.0).unwrap();
        let style = StrokeStyle::new(2.0).with_dash(Some(dash));
        let buffer = stroke_path(&path, &style, 0.1).unwrap();
        // two 2-unit dashes, butt caps
        assert!((buffer.covered_area() - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_hairline_topologies() {
        let rect = Path::rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        let lines = stroke_polylines(&rect, &StrokeStyle::new(1.0), 0.1);
        let buffers = hairline_geometry(&lines);
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].topology(), Topology::LineLoop);
        assert_eq!(buffers[0].segments().len(), 4);

        let line = Path::line(Point::ZERO, Point::new(3.0, 3.0));
        let buffers = hairline_geometry(&stroke_polylines(&line, &StrokeStyle::new(1.0), 0.1));
        assert_eq!(buffers[0].topology(), Topology::LineStrip);
    }
}
