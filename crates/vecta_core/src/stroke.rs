//! Stroke styles

use smallvec::SmallVec;

use crate::id::ResourceId;
use crate::{GeometryError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Alternating on/off lengths plus a starting phase
#[derive(Clone, Debug, PartialEq)]
pub struct DashPattern {
    intervals: SmallVec<[f32; 4]>,
    phase: f32,
}

impl DashPattern {
    /// Validate and build a dash pattern
    ///
    /// Odd-length interval lists are repeated once so that on/off pairs line
    /// up, the same way canvas APIs treat them.
    pub fn new(intervals: &[f32], phase: f32) -> Result<Self> {
        if intervals.is_empty() {
            return Err(GeometryError::InvalidDash("no intervals".into()));
        }
        if intervals.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(GeometryError::InvalidDash(
                "intervals must be finite and non-negative".into(),
            ));
        }
        if intervals.iter().sum::<f32>() <= 0.0 {
            return Err(GeometryError::InvalidDash("pattern length is zero".into()));
        }
        if !phase.is_finite() {
            return Err(GeometryError::InvalidDash("phase must be finite".into()));
        }
        let mut list: SmallVec<[f32; 4]> = SmallVec::from_slice(intervals);
        if list.len() % 2 == 1 {
            list.extend_from_slice(intervals);
        }
        Ok(Self {
            intervals: list,
            phase,
        })
    }

    pub fn intervals(&self) -> &[f32] {
        &self.intervals
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Total length of one on/off cycle
    pub fn period(&self) -> f32 {
        self.intervals.iter().sum()
    }
}

/// Stroke style
///
/// Immutable once built: every `with_*` call returns a style with a fresh
/// identity, so cached stroke geometry is never reused for a different style.
#[derive(Clone, Debug)]
pub struct StrokeStyle {
    id: ResourceId,
    width: f32,
    cap: LineCap,
    join: LineJoin,
    miter_limit: f32,
    dash: Option<DashPattern>,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl StrokeStyle {
    pub fn new(width: f32) -> Self {
        Self {
            id: ResourceId::next(),
            width: width.max(0.0),
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
        }
    }

    fn rebuilt(mut self) -> Self {
        self.id = ResourceId::next();
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width.max(0.0);
        self.rebuilt()
    }

    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self.rebuilt()
    }

    pub fn with_join(mut self, join: LineJoin) -> Self {
        self.join = join;
        self.rebuilt()
    }

    pub fn with_miter_limit(mut self, miter_limit: f32) -> Self {
        self.miter_limit = miter_limit.max(1.0);
        self.rebuilt()
    }

    pub fn with_dash(mut self, dash: Option<DashPattern>) -> Self {
        self.dash = dash;
        self.rebuilt()
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn cap(&self) -> LineCap {
        self.cap
    }

    pub fn join(&self) -> LineJoin {
        self.join
    }

    pub fn miter_limit(&self) -> f32 {
        self.miter_limit
    }

    pub fn dash(&self) -> Option<&DashPattern> {
        self.dash.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_changes_identity() {
        let a = StrokeStyle::new(2.0);
        let b = a.clone().with_cap(LineCap::Round);
        assert_ne!(a.id(), b.id());
        assert_eq!(b.width(), 2.0);
        assert_eq!(b.cap(), LineCap::Round);
    }

    #[test]
    fn test_dash_validation() {
        assert!(DashPattern::new(&[], 0.0).is_err());
        assert!(DashPattern::new(&[1.0, -1.0], 0.0).is_err());
        assert!(DashPattern::new(&[0.0, 0.0], 0.0).is_err());

        let odd = DashPattern::new(&[3.0], 1.0).unwrap();
        assert_eq!(odd.intervals(), &[3.0, 3.0]);
        assert_eq!(odd.period(), 6.0);
    }
}
