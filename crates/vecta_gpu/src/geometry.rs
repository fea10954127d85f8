//! Geometry buffers
//!
//! The common currency between tessellator output, cached geometry and device
//! draw calls: a topology tag, flat positions and optional parallel color and
//! texture-coordinate arrays.

use vecta_core::{Point, Rect};

use crate::device::Topology;

/// Vertex positions plus optional per-vertex attributes
///
/// Attribute arrays may be shorter or longer than the position array; readers
/// only ever see the first `min(vertex_count, attribute_len)` entries.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryBuffer {
    topology: Topology,
    positions: Vec<[f32; 2]>,
    colors: Option<Vec<[f32; 4]>>,
    tex_coords: Option<Vec<[f32; 2]>>,
}

impl GeometryBuffer {
    pub fn new(topology: Topology) -> Self {
        Self::with_capacity(topology, 0)
    }

    pub fn with_capacity(topology: Topology, capacity: usize) -> Self {
        Self {
            topology,
            positions: Vec::with_capacity(capacity),
            colors: None,
            tex_coords: None,
        }
    }

    pub fn from_points(topology: Topology, points: impl IntoIterator<Item = Point>) -> Self {
        Self {
            topology,
            positions: points.into_iter().map(Point::to_array).collect(),
            colors: None,
            tex_coords: None,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn push(&mut self, p: Point) {
        self.positions.push(p.to_array());
    }

    pub fn positions(&self) -> &[[f32; 2]] {
        &self.positions
    }

    /// Position data as raw bytes for upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, index: usize) -> Option<Point> {
        self.positions.get(index).map(|p| Point::new(p[0], p[1]))
    }

    pub fn set_colors(&mut self, colors: Vec<[f32; 4]>) {
        self.colors = Some(colors);
    }

    pub fn clear_colors(&mut self) {
        self.colors = None;
    }

    /// Number of usable per-vertex colors
    pub fn color_count(&self) -> usize {
        self.colors
            .as_ref()
            .map_or(0, |c| c.len().min(self.positions.len()))
    }

    pub fn has_colors(&self) -> bool {
        self.color_count() > 0
    }

    pub fn color(&self, index: usize) -> Option<[f32; 4]> {
        if index >= self.color_count() {
            return None;
        }
        self.colors.as_ref().and_then(|c| c.get(index).copied())
    }

    pub fn set_tex_coords(&mut self, tex_coords: Vec<[f32; 2]>) {
        self.tex_coords = Some(tex_coords);
    }

    pub fn tex_coord_count(&self) -> usize {
        self.tex_coords
            .as_ref()
            .map_or(0, |t| t.len().min(self.positions.len()))
    }

    pub fn tex_coord(&self, index: usize) -> Option<[f32; 2]> {
        if index >= self.tex_coord_count() {
            return None;
        }
        self.tex_coords.as_ref().and_then(|t| t.get(index).copied())
    }

    /// Vertex index triples for triangle topologies, empty otherwise
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let n = self.positions.len();
        match self.topology {
            Topology::Triangles => (0..n / 3).map(|i| [3 * i, 3 * i + 1, 3 * i + 2]).collect(),
            Topology::TriangleStrip => (0..n.saturating_sub(2))
                .map(|i| {
                    if i % 2 == 0 {
                        [i, i + 1, i + 2]
                    } else {
                        [i + 1, i, i + 2]
                    }
                })
                .collect(),
            Topology::TriangleFan | Topology::Polygon => {
                (1..n.saturating_sub(1)).map(|i| [0, i, i + 1]).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Line segments for line topologies, empty otherwise
    pub fn segments(&self) -> Vec<[usize; 2]> {
        let n = self.positions.len();
        match self.topology {
            Topology::Lines => (0..n / 2).map(|i| [2 * i, 2 * i + 1]).collect(),
            Topology::LineStrip => (0..n.saturating_sub(1)).map(|i| [i, i + 1]).collect(),
            Topology::LineLoop if n >= 2 => {
                let mut segs: Vec<[usize; 2]> = (0..n - 1).map(|i| [i, i + 1]).collect();
                segs.push([n - 1, 0]);
                segs
            }
            _ => Vec::new(),
        }
    }

    /// Sum of absolute triangle areas
    pub fn covered_area(&self) -> f32 {
        self.triangles()
            .iter()
            .map(|t| self.signed_area(*t).abs())
            .sum()
    }

    /// Signed area of one triangle, positive for counter-clockwise in y-up
    pub fn signed_area(&self, tri: [usize; 3]) -> f32 {
        let [a, b, c] = tri.map(|i| self.positions[i]);
        0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.positions.iter().map(|p| Point::new(p[0], p[1])))
    }

    /// Copy with every position offset by `(dx, dy)`
    pub fn translated(&self, dx: f32, dy: f32) -> GeometryBuffer {
        let mut out = self.clone();
        for p in &mut out.positions {
            p[0] += dx;
            p[1] += dy;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_count_never_exceeds_vertices() {
        let mut g = GeometryBuffer::from_points(
            Topology::Triangles,
            [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
        );
        g.set_colors(vec![[1.0; 4]; 5]);
        assert_eq!(g.color_count(), 3);
        assert!(g.color(3).is_none());

        g.set_colors(vec![[0.5; 4]]);
        assert_eq!(g.color_count(), 1);
        assert_eq!(g.color(0), Some([0.5; 4]));
        assert!(g.color(1).is_none());
    }

    #[test]
    fn test_fan_triangles_and_area() {
        let g = GeometryBuffer::from_points(
            Topology::Polygon,
            [
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 2.0),
            ],
        );
        assert_eq!(g.triangles(), vec![[0, 1, 2], [0, 2, 3]]);
        assert!((g.covered_area() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_line_loop_segments() {
        let g = GeometryBuffer::from_points(
            Topology::LineLoop,
            [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
        );
        assert_eq!(g.segments(), vec![[0, 1], [1, 2], [2, 0]]);
    }

    #[test]
    fn test_position_bytes() {
        let g = GeometryBuffer::from_points(Topology::Points, [Point::new(1.0, 2.0)]);
        assert_eq!(g.position_bytes().len(), 8);
    }
}
