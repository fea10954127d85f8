//! Polygon tessellation
//!
//! A thin layer over lyon's sweep-line fill tessellator. Input is already
//! flattened into contours so the caller owns the tolerance; output is
//! reported vertex by vertex through a [`TessellationVisitor`], with a
//! `combine` hook whenever the sweep synthesizes a vertex at an
//! intersection.

use lyon::math::point;
use lyon::path::{EndpointId, Path as LyonPath};
use lyon::tessellation::{
    FillGeometryBuilder, FillOptions, FillRule as LyonFillRule, FillTessellator, FillVertex,
    GeometryBuilder, GeometryBuilderError, VertexId, VertexSource,
};
use thiserror::Error;
use vecta_core::{FillRule, Path, Point};

use crate::device::Topology;
use crate::flatten::{flatten_path, Polyline};
use crate::geometry::GeometryBuffer;

/// Triangles below this area are dropped as degenerate
const MIN_TRIANGLE_AREA: f32 = 1e-7;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TessellationError {
    #[error("sweep failed: {0}")]
    Sweep(String),

    #[error("no contour with at least three vertices")]
    EmptyInput,
}

/// A vertex plus four floats of caller data (typically a color)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TessVertex {
    pub position: Point,
    pub data: [f32; 4],
}

impl TessVertex {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            data: [0.0; 4],
        }
    }
}

/// One flattened contour; open contours are closed implicitly
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contour {
    pub vertices: Vec<TessVertex>,
    pub closed: bool,
}

impl Contour {
    pub fn from_points(points: impl IntoIterator<Item = Point>, closed: bool) -> Self {
        Self {
            vertices: points.into_iter().map(TessVertex::new).collect(),
            closed,
        }
    }

    pub fn from_polyline(line: &Polyline) -> Self {
        Self::from_points(line.ring().iter().copied(), line.closed)
    }
}

/// Receives tessellation output
pub trait TessellationVisitor {
    fn begin(&mut self, topology: Topology);

    fn add_vertex(&mut self, position: Point, data: [f32; 4]);

    /// Data for a vertex created at a self-intersection. `sources` holds the
    /// data of the original vertices and their interpolation weights.
    fn combine(&mut self, _position: Point, sources: &[([f32; 4], f32)]) -> [f32; 4] {
        let mut out = [0.0; 4];
        if sources.is_empty() {
            return out;
        }
        for (data, _) in sources {
            for (o, d) in out.iter_mut().zip(data) {
                *o += d;
            }
        }
        let n = sources.len() as f32;
        out.map(|v| v / n)
    }

    fn end(&mut self);

    /// Called instead of emitting anything for a polygon that cannot be
    /// tessellated
    fn error(&mut self, error: &TessellationError) {
        tracing::warn!("skipping polygon: {}", error);
    }
}

/// Collects tessellation output into a triangle-list [`GeometryBuffer`]
#[derive(Debug)]
pub struct GeometryCollector {
    buffer: GeometryBuffer,
    data: Vec<[f32; 4]>,
    keep_data: bool,
}

impl GeometryCollector {
    pub fn new() -> Self {
        Self {
            buffer: GeometryBuffer::new(Topology::Triangles),
            data: Vec::new(),
            keep_data: false,
        }
    }

    /// Keep vertex data as the per-vertex color array
    pub fn with_colors() -> Self {
        Self {
            keep_data: true,
            ..Self::new()
        }
    }

    pub fn finish(mut self) -> GeometryBuffer {
        if self.keep_data {
            self.buffer.set_colors(self.data);
        }
        self.buffer
    }
}

impl Default for GeometryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TessellationVisitor for GeometryCollector {
    fn begin(&mut self, topology: Topology) {
        debug_assert_eq!(topology, Topology::Triangles);
    }

    fn add_vertex(&mut self, position: Point, data: [f32; 4]) {
        self.buffer.push(position);
        if self.keep_data {
            self.data.push(data);
        }
    }

    fn end(&mut self) {}
}

/// Indexed output of one sweep, later de-indexed into the visitor
struct SweepOutput<'a> {
    endpoint_data: &'a [[f32; 4]],
    visitor: &'a mut dyn TessellationVisitor,
    vertices: Vec<(Point, [f32; 4])>,
    triangles: Vec<[u32; 3]>,
}

impl GeometryBuilder for SweepOutput<'_> {
    fn begin_geometry(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
    }

    fn add_triangle(&mut self, a: VertexId, b: VertexId, c: VertexId) {
        self.triangles.push([a.0, b.0, c.0]);
    }

    fn abort_geometry(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
    }
}

impl FillGeometryBuilder for SweepOutput<'_> {
    fn add_fill_vertex(&mut self, vertex: FillVertex) -> Result<VertexId, GeometryBuilderError> {
        let pos = vertex.position();
        let position = Point::new(pos.x, pos.y);
        let endpoint_data = self.endpoint_data;
        let lookup = |id: EndpointId| endpoint_data.get(id.0 as usize).copied().unwrap_or_default();

        let mut sources: smallvec::SmallVec<[([f32; 4], f32); 4]> = smallvec::SmallVec::new();
        let mut synthesized = false;
        for source in vertex.sources() {
            match source {
                VertexSource::Endpoint { id } => sources.push((lookup(id), 1.0)),
                VertexSource::Edge { from, to, t } => {
                    synthesized = true;
                    sources.push((lookup(from), 1.0 - t));
                    sources.push((lookup(to), t));
                }
            }
        }

        let data = if synthesized {
            self.visitor.combine(position, &sources)
        } else {
            sources.first().map(|s| s.0).unwrap_or_default()
        };

        let id = self.vertices.len();
        if id >= u32::MAX as usize {
            return Err(GeometryBuilderError::TooManyVertices);
        }
        self.vertices.push((position, data));
        Ok(VertexId(id as u32))
    }
}

/// Sweep-based fill tessellator
pub struct Tessellator {
    fill: FillTessellator,
    invocations: u64,
}

impl Default for Tessellator {
    fn default() -> Self {
        Self::new()
    }
}

impl Tessellator {
    pub fn new() -> Self {
        Self {
            fill: FillTessellator::new(),
            invocations: 0,
        }
    }

    /// Number of sweeps run so far
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Triangulate the interior of `contours` under `rule`
    ///
    /// Emits one `begin(Triangles)` .. `end()` group and returns the number
    /// of triangles emitted. Triangles are oriented with positive signed area.
    pub fn tessellate(
        &mut self,
        contours: &[Contour],
        rule: FillRule,
        visitor: &mut dyn TessellationVisitor,
    ) -> Result<usize, TessellationError> {
        self.invocations += 1;

        let mut builder = LyonPath::builder();
        let mut endpoint_data: Vec<[f32; 4]> = Vec::new();
        let mut usable = 0;
        for contour in contours {
            if contour.vertices.len() < 3 {
                continue;
            }
            usable += 1;
            let mut vertices = contour.vertices.iter();
            if let Some(first) = vertices.next() {
                let id = builder.begin(point(first.position.x, first.position.y));
                record(&mut endpoint_data, id, first.data);
            }
            for v in vertices {
                let id = builder.line_to(point(v.position.x, v.position.y));
                record(&mut endpoint_data, id, v.data);
            }
            builder.end(true);
        }

        if usable == 0 {
            let err = TessellationError::EmptyInput;
            visitor.error(&err);
            return Err(err);
        }

        let path = builder.build();
        let options = FillOptions::default().with_fill_rule(match rule {
            FillRule::NonZero => LyonFillRule::NonZero,
            FillRule::EvenOdd => LyonFillRule::EvenOdd,
        });

        let mut output = SweepOutput {
            endpoint_data: &endpoint_data,
            visitor,
            vertices: Vec::new(),
            triangles: Vec::new(),
        };
        if let Err(e) = self.fill.tessellate_path(&path, &options, &mut output) {
            let err = TessellationError::Sweep(format!("{e:?}"));
            output.visitor.error(&err);
            return Err(err);
        }

        let SweepOutput {
            visitor,
            vertices,
            triangles,
            ..
        } = output;
        visitor.begin(Topology::Triangles);
        let mut emitted = 0;
        for [a, b, c] in triangles {
            let (pa, da) = vertices[a as usize];
            let (mut pb, mut db) = vertices[b as usize];
            let (mut pc, mut dc) = vertices[c as usize];
            let area = 0.5 * ((pb.x - pa.x) * (pc.y - pa.y) - (pc.x - pa.x) * (pb.y - pa.y));
            if area.abs() < MIN_TRIANGLE_AREA {
                continue;
            }
            if area < 0.0 {
                std::mem::swap(&mut pb, &mut pc);
                std::mem::swap(&mut db, &mut dc);
            }
            visitor.add_vertex(pa, da);
            visitor.add_vertex(pb, db);
            visitor.add_vertex(pc, dc);
            emitted += 1;
        }
        visitor.end();
        Ok(emitted)
    }

    /// Flatten `path` at `tolerance` and triangulate it into a buffer
    pub fn fill_path(
        &mut self,
        path: &Path,
        tolerance: f32,
    ) -> Result<GeometryBuffer, TessellationError> {
        let contours: Vec<Contour> = flatten_path(path, tolerance)
            .iter()
            .map(Contour::from_polyline)
            .collect();
        let mut collector = GeometryCollector::new();
        self.tessellate(&contours, path.fill_rule(), &mut collector)?;
        Ok(collector.finish())
    }
}

fn record(data: &mut Vec<[f32; 4]>, id: EndpointId, value: [f32; 4]) {
    let index = id.0 as usize;
    if data.len() <= index {
        data.resize(index + 1, [0.0; 4]);
    }
    data[index] = value;
}
