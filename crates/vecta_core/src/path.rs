//! Path building and representation

use smallvec::SmallVec;

use crate::geometry::{Point, Rect};
use crate::id::ResourceId;
use crate::transform::Affine2D;

/// Cubic Bezier control distance for a quarter circle
const KAPPA: f32 = 0.552_284_8;

/// Rule deciding which regions of a self-overlapping path are interior
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Path command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo {
        control: Point,
        end: Point,
    },
    CubicTo {
        control1: Point,
        control2: Point,
        end: Point,
    },
    Close,
}

impl PathCommand {
    fn points(&self) -> SmallVec<[Point; 3]> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => SmallVec::from_slice(&[p]),
            PathCommand::QuadTo { control, end } => SmallVec::from_slice(&[control, end]),
            PathCommand::CubicTo {
                control1,
                control2,
                end,
            } => SmallVec::from_slice(&[control1, control2, end]),
            PathCommand::Close => SmallVec::new(),
        }
    }

    fn map(&self, t: &Affine2D) -> PathCommand {
        match *self {
            PathCommand::MoveTo(p) => PathCommand::MoveTo(t.transform_point(p)),
            PathCommand::LineTo(p) => PathCommand::LineTo(t.transform_point(p)),
            PathCommand::QuadTo { control, end } => PathCommand::QuadTo {
                control: t.transform_point(control),
                end: t.transform_point(end),
            },
            PathCommand::CubicTo {
                control1,
                control2,
                end,
            } => PathCommand::CubicTo {
                control1: t.transform_point(control1),
                control2: t.transform_point(control2),
                end: t.transform_point(end),
            },
            PathCommand::Close => PathCommand::Close,
        }
    }
}

/// An immutable 2D path composed of commands
///
/// The identity is assigned when the path is built. Paths cannot be edited
/// afterwards, so clones share the identity and may share cached geometry.
#[derive(Clone, Debug)]
pub struct Path {
    id: ResourceId,
    commands: SmallVec<[PathCommand; 16]>,
    fill_rule: FillRule,
}

impl Default for Path {
    fn default() -> Self {
        Self::from_commands(std::iter::empty(), FillRule::NonZero)
    }
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_commands(
        commands: impl IntoIterator<Item = PathCommand>,
        fill_rule: FillRule,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            commands: commands.into_iter().collect(),
            fill_rule,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    /// Same geometry with a different fill rule (new identity)
    pub fn with_fill_rule(&self, fill_rule: FillRule) -> Path {
        Path::from_commands(self.commands.iter().copied(), fill_rule)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of contours (each `MoveTo` starts one)
    pub fn contour_count(&self) -> usize {
        let mut count = 0;
        let mut open = false;
        for cmd in &self.commands {
            match cmd {
                PathCommand::MoveTo(_) => {
                    count += 1;
                    open = true;
                }
                PathCommand::Close => open = false,
                _ if !open => {
                    count += 1;
                    open = true;
                }
                _ => {}
            }
        }
        count
    }

    /// A single straight segment: `MoveTo` followed by one `LineTo`
    pub fn as_line(&self) -> Option<(Point, Point)> {
        match self.commands.as_slice() {
            [PathCommand::MoveTo(a), PathCommand::LineTo(b)] => Some((*a, *b)),
            _ => None,
        }
    }

    /// Bounds of all points including curve control points
    pub fn control_bounds(&self) -> Option<Rect> {
        Rect::bounding(self.commands.iter().flat_map(|c| c.points()))
    }

    /// Transformed copy (new identity)
    pub fn transformed(&self, t: &Affine2D) -> Path {
        Path::from_commands(self.commands.iter().map(|c| c.map(t)), self.fill_rule)
    }

    pub fn rect(rect: Rect) -> Path {
        PathBuilder::new()
            .move_to(rect.x, rect.y)
            .line_to(rect.max_x(), rect.y)
            .line_to(rect.max_x(), rect.max_y())
            .line_to(rect.x, rect.max_y())
            .close()
            .build()
    }

    pub fn ellipse(center: Point, rx: f32, ry: f32) -> Path {
        let (cx, cy) = (center.x, center.y);
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);
        PathBuilder::new()
            .move_to(cx + rx, cy)
            .cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry)
            .cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy)
            .cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry)
            .cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy)
            .close()
            .build()
    }

    pub fn circle(center: Point, radius: f32) -> Path {
        Self::ellipse(center, radius, radius)
    }

    pub fn line(from: Point, to: Point) -> Path {
        PathBuilder::new()
            .move_to(from.x, from.y)
            .line_to(to.x, to.y)
            .build()
    }

    /// Closed polygon through `points`
    pub fn polygon(points: &[Point]) -> Path {
        let mut builder = PathBuilder::new();
        for (i, p) in points.iter().enumerate() {
            builder = if i == 0 {
                builder.move_to(p.x, p.y)
            } else {
                builder.line_to(p.x, p.y)
            };
        }
        if !points.is_empty() {
            builder = builder.close();
        }
        builder.build()
    }
}

/// Builder for constructing paths
pub struct PathBuilder {
    commands: SmallVec<[PathCommand; 16]>,
    fill_rule: FillRule,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self {
            commands: SmallVec::new(),
            fill_rule: FillRule::NonZero,
        }
    }

    pub fn fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = fill_rule;
        self
    }

    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.commands.push(PathCommand::MoveTo(Point::new(x, y)));
        self
    }

    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.commands.push(PathCommand::LineTo(Point::new(x, y)));
        self
    }

    pub fn quad_to(mut self, cx: f32, cy: f32, x: f32, y: f32) -> Self {
        self.commands.push(PathCommand::QuadTo {
            control: Point::new(cx, cy),
            end: Point::new(x, y),
        });
        self
    }

    pub fn cubic_to(mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> Self {
        self.commands.push(PathCommand::CubicTo {
            control1: Point::new(c1x, c1y),
            control2: Point::new(c2x, c2y),
            end: Point::new(x, y),
        });
        self
    }

    pub fn close(mut self) -> Self {
        self.commands.push(PathCommand::Close);
        self
    }

    /// Append a raw command (used by outline readers)
    pub fn push(&mut self, command: PathCommand) {
        self.commands.push(command);
    }

    pub fn build(self) -> Path {
        Path {
            id: ResourceId::next(),
            commands: self.commands,
            fill_rule: self.fill_rule,
        }
    }
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new()
    }
}
