//! Curve flattening and dashing
//!
//! Paths are reduced to polylines before tessellation so the caller controls
//! the flattening tolerance. Tolerance is expressed in path units; callers
//! divide their screen-space tolerance by the current scale.

use lyon::geom::{CubicBezierSegment, QuadraticBezierSegment};
use lyon::math::point;
use vecta_core::{DashPattern, Path, PathCommand, Point};

/// A flattened contour
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point>,
    /// Whether the contour was explicitly closed
    pub closed: bool,
}

impl Polyline {
    /// Points with the duplicate closing point removed
    pub fn ring(&self) -> &[Point] {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) if self.points.len() > 1 && a == b => {
                &self.points[..self.points.len() - 1]
            }
            _ => &self.points,
        }
    }

    pub fn length(&self) -> f32 {
        let mut len: f32 = self.points.windows(2).map(|w| w[0].distance(w[1])).sum();
        if self.closed {
            if let (Some(a), Some(b)) = (self.points.first(), self.points.last()) {
                len += b.distance(*a);
            }
        }
        len
    }
}

fn to_lyon(p: Point) -> lyon::math::Point {
    point(p.x, p.y)
}

/// Flatten every contour of `path` into line segments
pub fn flatten_path(path: &Path, tolerance: f32) -> Vec<Polyline> {
    let tolerance = tolerance.max(1e-4);
    let mut contours = Vec::new();
    let mut current = Polyline::default();
    let mut pen = Point::ZERO;
    let mut start = Point::ZERO;

    let finish = |current: &mut Polyline, closed: bool, contours: &mut Vec<Polyline>| {
        if current.points.len() > 1 {
            current.closed = closed;
            contours.push(std::mem::take(current));
        } else {
            current.points.clear();
        }
    };

    for cmd in path.commands() {
        match *cmd {
            PathCommand::MoveTo(p) => {
                finish(&mut current, false, &mut contours);
                current.points.push(p);
                pen = p;
                start = p;
            }
            PathCommand::LineTo(p) => {
                if current.points.is_empty() {
                    current.points.push(pen);
                }
                current.points.push(p);
                pen = p;
            }
            PathCommand::QuadTo { control, end } => {
                if current.points.is_empty() {
                    current.points.push(pen);
                }
                let segment = QuadraticBezierSegment {
                    from: to_lyon(pen),
                    ctrl: to_lyon(control),
                    to: to_lyon(end),
                };
                current
                    .points
                    .extend(segment.flattened(tolerance).map(|p| Point::new(p.x, p.y)));
                pen = end;
            }
            PathCommand::CubicTo {
                control1,
                control2,
                end,
            } => {
                if current.points.is_empty() {
                    current.points.push(pen);
                }
                let segment = CubicBezierSegment {
                    from: to_lyon(pen),
                    ctrl1: to_lyon(control1),
                    ctrl2: to_lyon(control2),
                    to: to_lyon(end),
                };
                current
                    .points
                    .extend(segment.flattened(tolerance).map(|p| Point::new(p.x, p.y)));
                pen = end;
            }
            PathCommand::Close => {
                finish(&mut current, true, &mut contours);
                pen = start;
            }
        }
    }
    finish(&mut current, false, &mut contours);
    contours
}

/// Split polylines into open dash segments
///
/// Closed contours are walked including their closing edge. The phase may be
/// larger than the pattern period or negative.
pub fn apply_dash(polylines: &[Polyline], dash: &DashPattern) -> Vec<Polyline> {
    let intervals = dash.intervals();
    let period = dash.period();
    let mut out = Vec::new();
    if period <= 0.0 {
        return out;
    }

    for line in polylines {
        let mut points = line.points.clone();
        if line.closed {
            if let Some(first) = points.first().copied() {
                if points.last() != Some(&first) {
                    points.push(first);
                }
            }
        }

        // Position inside the pattern at the start of this contour
        let mut phase = dash.phase().rem_euclid(period);
        let mut index = 0;
        while phase >= intervals[index] {
            phase -= intervals[index];
            index = (index + 1) % intervals.len();
        }
        let mut remaining = intervals[index] - phase;
        let mut on = index % 2 == 0;
        let mut current: Vec<Point> = Vec::new();
        if on {
            if let Some(p) = points.first() {
                current.push(*p);
            }
        }

        for w in points.windows(2) {
            let (mut a, b) = (w[0], w[1]);
            let mut seg_len = a.distance(b);
            while seg_len > 0.0 {
                if remaining > seg_len {
                    remaining -= seg_len;
                    if on {
                        current.push(b);
                    }
                    break;
                }
                let split = a.lerp(b, remaining / seg_len);
                if on {
                    current.push(split);
                    if current.len() > 1 {
                        out.push(Polyline {
                            points: std::mem::take(&mut current),
                            closed: false,
                        });
                    }
                    current.clear();
                } else {
                    current.clear();
                    current.push(split);
                }
                seg_len -= remaining;
                a = split;
                index = (index + 1) % intervals.len();
                remaining = intervals[index];
                on = !on;
            }
        }
        if on && current.len() > 1 {
            out.push(Polyline {
                points: current,
                closed: false,
            });
        }
    }
    out
}
