//! Shape geometry cache
//!
//! Every path draw goes through here. Per call it picks one of three routes:
//!
//! 1. a fast path that skips tessellation (convex polygons, hairlines)
//! 2. a precompiled draw list, when the caller declared the shape immutable
//! 3. a fresh tessellation, for shapes that may change between calls
//!
//! Cached entries are keyed by path identity and remember the stroke style
//! identity and scale they were built for. A different style, or a scale more
//! than twice as fine, rebuilds the entry. Superseded draw lists are retired
//! and only deleted at the next [`ShapeCache::flush_retired`], so a list that
//! was already issued this frame is never freed mid-frame.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use vecta_core::{Path, ResourceId, StrokeStyle};

use crate::device::{Device, ListId, Topology};
use crate::flatten::flatten_path;
use crate::geometry::GeometryBuffer;
use crate::gpu::Gpu;
use crate::stroke::{hairline_geometry, stroke_lines, stroke_polylines};
use crate::tessellator::{Contour, GeometryCollector, Tessellator};

/// Scale growth that makes a cached flattening too coarse
const SCALE_DRIFT: f32 = 2.0;

/// Default screen-space flattening tolerance, in device pixels
pub const DEFAULT_TOLERANCE: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ShapeKind {
    Fill,
    Stroke,
    /// Stroke expanded to triangles for per-vertex paint
    StrokeOutline,
}

struct ShapeEntry {
    list: Option<ListId>,
    geometry: Arc<[GeometryBuffer]>,
    style: Option<ResourceId>,
    scale: f32,
    hairline: bool,
}

/// Shape cache counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShapeCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Sweeps and stroke expansions performed
    pub tessellations: u64,
    /// Draws served without tessellation
    pub fast_paths: u64,
    pub entries: usize,
    /// Lists waiting for the next flush
    pub retired: usize,
}

pub struct ShapeCache {
    base_tolerance: f32,
    scale: f32,
    tolerance: f32,
    tessellator: Tessellator,
    entries: FxHashMap<(ResourceId, ShapeKind), ShapeEntry>,
    retired: Vec<ListId>,
    stats: ShapeCacheStats,
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

/// Geometry built for one request, before caching
struct Built {
    geometry: Vec<GeometryBuffer>,
    hairline: bool,
}

impl ShapeCache {
    /// `base_tolerance` is the flattening error allowed in device pixels
    pub fn new(base_tolerance: f32) -> Self {
        let base_tolerance = base_tolerance.max(1e-3);
        Self {
            base_tolerance,
            scale: 1.0,
            tolerance: base_tolerance,
            tessellator: Tessellator::new(),
            entries: FxHashMap::default(),
            retired: Vec::new(),
            stats: ShapeCacheStats::default(),
        }
    }

    pub fn stats(&self) -> ShapeCacheStats {
        ShapeCacheStats {
            entries: self.entries.len(),
            retired: self.retired.len(),
            ..self.stats
        }
    }

    pub fn tessellator(&self) -> &Tessellator {
        &self.tessellator
    }

    /// Path-space flattening tolerance for the given device scale
    ///
    /// Recomputed only when the scale changes.
    pub fn tolerance(&mut self, scale: f32) -> f32 {
        let scale = if scale.is_finite() && scale > 1e-6 { scale } else { 1.0 };
        if scale != self.scale {
            self.scale = scale;
            self.tolerance = self.base_tolerance / scale;
            tracing::trace!("flattening tolerance {} at scale {}", self.tolerance, scale);
        }
        self.tolerance
    }

    /// Fill `path`
    pub fn fill<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        path: &Path,
        scale: f32,
        immutable: bool,
        convex_hint: bool,
    ) {
        if path.is_empty() {
            return;
        }
        if immutable {
            self.replay(gpu, path, None, ShapeKind::Fill, scale, convex_hint);
        } else {
            let built = self.build(path, None, ShapeKind::Fill, scale, convex_hint);
            issue(gpu, &built.geometry);
        }
    }

    /// Stroke `path` with `style`
    pub fn draw<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        path: &Path,
        style: &StrokeStyle,
        scale: f32,
        immutable: bool,
        convex_hint: bool,
    ) {
        if path.is_empty() || style.width() < 0.0 {
            return;
        }
        if is_hairline(style, scale) {
            gpu.set_line_width(style.width() * scale);
        }
        if immutable {
            self.replay(gpu, path, Some(style), ShapeKind::Stroke, scale, convex_hint);
        } else {
            let built = self.build(path, Some(style), ShapeKind::Stroke, scale, convex_hint);
            issue(gpu, &built.geometry);
        }
    }

    /// Triangle geometry of the filled interior, for paints that need
    /// per-vertex attributes
    pub fn fill_geometry(
        &mut self,
        path: &Path,
        scale: f32,
        immutable: bool,
        convex_hint: bool,
    ) -> Arc<[GeometryBuffer]> {
        self.geometry(path, None, ShapeKind::Fill, scale, immutable, convex_hint)
    }

    /// Triangle geometry of the stroke outline, never hairline lines
    pub fn stroke_geometry(
        &mut self,
        path: &Path,
        style: &StrokeStyle,
        scale: f32,
        immutable: bool,
    ) -> Arc<[GeometryBuffer]> {
        self.geometry(path, Some(style), ShapeKind::StrokeOutline, scale, immutable, false)
    }

    fn geometry(
        &mut self,
        path: &Path,
        style: Option<&StrokeStyle>,
        kind: ShapeKind,
        scale: f32,
        immutable: bool,
        convex_hint: bool,
    ) -> Arc<[GeometryBuffer]> {
        if path.is_empty() {
            return Arc::from(Vec::new());
        }
        if !immutable {
            return self.build(path, style, kind, scale, convex_hint).geometry.into();
        }
        let key = (path.id(), kind);
        if let Some(entry) = self.valid_entry(key, style, scale) {
            let geometry = entry.geometry.clone();
            self.stats.hits += 1;
            return geometry;
        }
        self.stats.misses += 1;
        let built = self.build(path, style, kind, scale, convex_hint);
        let geometry: Arc<[GeometryBuffer]> = built.geometry.into();
        self.insert(
            key,
            ShapeEntry {
                list: None,
                geometry: geometry.clone(),
                style: style.map(StrokeStyle::id),
                scale,
                hairline: built.hairline,
            },
        );
        geometry
    }

    fn valid_entry(
        &mut self,
        key: (ResourceId, ShapeKind),
        style: Option<&StrokeStyle>,
        scale: f32,
    ) -> Option<&ShapeEntry> {
        let style_id = style.map(StrokeStyle::id);
        let stale = match self.entries.get(&key) {
            None => return None,
            Some(entry) => {
                entry.style != style_id
                    || scale > entry.scale * SCALE_DRIFT
                    || (key.1 == ShapeKind::Stroke
                        && style.is_some_and(|s| is_hairline(s, scale) != entry.hairline))
            }
        };
        if stale {
            if let Some(old) = self.entries.remove(&key) {
                tracing::debug!(
                    "shape {} rebuilt (style {:?} -> {:?}, scale {} -> {})",
                    key.0,
                    old.style,
                    style_id,
                    old.scale,
                    scale
                );
                self.retired.extend(old.list);
            }
            return None;
        }
        self.entries.get(&key)
    }

    fn insert(&mut self, key: (ResourceId, ShapeKind), entry: ShapeEntry) {
        if let Some(old) = self.entries.insert(key, entry) {
            self.retired.extend(old.list);
        }
    }

    /// Immutable route: replay a cached list, compiling it on first use
    fn replay<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        path: &Path,
        style: Option<&StrokeStyle>,
        kind: ShapeKind,
        scale: f32,
        convex_hint: bool,
    ) {
        let key = (path.id(), kind);
        if let Some(entry) = self.valid_entry(key, style, scale) {
            let (list, geometry) = (entry.list, entry.geometry.clone());
            self.stats.hits += 1;
            match list {
                Some(list) => gpu.call_list(list),
                None => issue(gpu, &geometry),
            }
            return;
        }

        self.stats.misses += 1;
        let built = self.build(path, style, kind, scale, convex_hint);
        let list = if built.geometry.is_empty() {
            None
        } else {
            match gpu.compile_list(&built.geometry) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("caching shape {} without a draw list: {}", path.id(), e);
                    None
                }
            }
        };
        let geometry: Arc<[GeometryBuffer]> = built.geometry.into();
        match list {
            Some(list) => gpu.call_list(list),
            None => issue(gpu, &geometry),
        }
        self.insert(
            key,
            ShapeEntry {
                list,
                geometry,
                style: style.map(StrokeStyle::id),
                scale,
                hairline: built.hairline,
            },
        );
    }

    /// Produce geometry without touching the cache
    fn build(
        &mut self,
        path: &Path,
        style: Option<&StrokeStyle>,
        kind: ShapeKind,
        scale: f32,
        convex_hint: bool,
    ) -> Built {
        let tolerance = self.tolerance(scale);
        match (kind, style) {
            (ShapeKind::Fill, _) | (_, None) => {
                let lines = flatten_path(path, tolerance);
                if convex_hint {
                    self.stats.fast_paths += 1;
                    let geometry = lines
                        .iter()
                        .filter(|l| l.ring().len() >= 3)
                        .map(|l| {
                            GeometryBuffer::from_points(Topology::Polygon, l.ring().iter().copied())
                        })
                        .collect();
                    return Built {
                        geometry,
                        hairline: false,
                    };
                }
                self.stats.tessellations += 1;
                let contours: Vec<Contour> = lines.iter().map(Contour::from_polyline).collect();
                let mut collector = GeometryCollector::new();
                let geometry = match self
                    .tessellator
                    .tessellate(&contours, path.fill_rule(), &mut collector)
                {
                    Ok(_) => vec![collector.finish()],
                    // The visitor already logged; skip this polygon
                    Err(_) => Vec::new(),
                };
                Built {
                    geometry,
                    hairline: false,
                }
            }
            (kind, Some(style)) => {
                let lines = stroke_polylines(path, style, tolerance);
                if kind == ShapeKind::Stroke && is_hairline(style, scale) {
                    self.stats.fast_paths += 1;
                    return Built {
                        geometry: hairline_geometry(&lines),
                        hairline: true,
                    };
                }
                self.stats.tessellations += 1;
                let geometry = match stroke_lines(&lines, style, tolerance) {
                    Ok(buffer) => vec![buffer],
                    Err(e) => {
                        tracing::warn!("skipping stroke of {}: {}", path.id(), e);
                        Vec::new()
                    }
                };
                Built {
                    geometry,
                    hairline: false,
                }
            }
        }
    }

    /// Forget entries for released paths or stroke styles
    pub fn release(&mut self, ids: &[ResourceId]) -> usize {
        let before = self.entries.len();
        let retired = &mut self.retired;
        self.entries.retain(|(path, _), entry| {
            let dead =
                ids.contains(path) || entry.style.is_some_and(|s| ids.contains(&s));
            if dead {
                retired.extend(entry.list);
            }
            !dead
        });
        before - self.entries.len()
    }

    /// Delete lists retired since the last flush
    pub fn flush_retired<D: Device>(&mut self, gpu: &mut Gpu<D>) -> usize {
        let n = self.retired.len();
        for list in self.retired.drain(..) {
            gpu.delete_list(list);
        }
        n
    }

    /// Retire every entry; lists are deleted at the next flush
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            self.retired.extend(entry.list);
        }
    }
}

/// Strokes no wider than one device pixel are drawn as device lines
pub fn is_hairline(style: &StrokeStyle, scale: f32) -> bool {
    style.dash().is_none() && style.width() * scale <= 1.0
}

fn issue<D: Device>(gpu: &mut Gpu<D>, geometry: &[GeometryBuffer]) {
    for buffer in geometry {
        gpu.draw(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use vecta_core::{Point, Rect};

    fn gpu() -> Gpu<HeadlessDevice> {
        let mut gpu = Gpu::new(HeadlessDevice::new(64, 64));
        gpu.set_color([1.0; 4]);
        gpu
    }

    fn star() -> Path {
        let points: Vec<Point> = (0..10)
            .map(|i| {
                let r = if i % 2 == 0 { 20.0 } else { 8.0 };
                let a = i as f32 * std::f32::consts::PI / 5.0;
                Point::new(32.0 + r * a.cos(), 32.0 + r * a.sin())
            })
            .collect();
        Path::polygon(&points)
    }

    #[test]
    fn test_immutable_fill_tessellates_once() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let path = star();
        cache.fill(&mut gpu, &path, 1.0, true, false);
        cache.fill(&mut gpu, &path, 1.0, true, false);
        assert_eq!(cache.tessellator().invocations(), 1);
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(gpu.device().counters().list_compiles, 1);
        assert_eq!(gpu.device().counters().list_calls, 2);
    }

    #[test]
    fn test_mutable_fill_tessellates_every_call() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let path = star();
        cache.fill(&mut gpu, &path, 1.0, false, false);
        cache.fill(&mut gpu, &path, 1.0, false, false);
        assert_eq!(cache.tessellator().invocations(), 2);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(gpu.device().counters().draws, 2);
    }

    #[test]
    fn test_convex_fast_path() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let path = Path::rect(Rect::new(2.0, 2.0, 10.0, 10.0));
        cache.fill(&mut gpu, &path, 1.0, false, true);
        assert_eq!(cache.tessellator().invocations(), 0);
        assert_eq!(cache.stats().fast_paths, 1);
        assert_eq!(gpu.device().count_pixels(|p| p[3] == 255), 100);
    }

    #[test]
    fn test_style_change_rebuilds_and_retires() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let path = Path::rect(Rect::new(8.0, 8.0, 20.0, 20.0));
        let thick = StrokeStyle::new(4.0);
        cache.draw(&mut gpu, &path, &thick, 1.0, true, false);
        cache.draw(&mut gpu, &path, &thick, 1.0, true, false);
        assert_eq!(cache.stats().tessellations, 1);

        let thicker = thick.clone().with_width(6.0);
        cache.draw(&mut gpu, &path, &thicker, 1.0, true, false);
        assert_eq!(cache.stats().tessellations, 2);
        assert_eq!(cache.stats().retired, 1);
        assert_eq!(gpu.device().counters().list_deletes, 0);
        assert_eq!(cache.flush_retired(&mut gpu), 1);
        assert_eq!(gpu.device().counters().list_deletes, 1);
    }

    #[test]
    fn test_scale_drift_refresh() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let path = Path::circle(Point::new(0.0, 0.0), 10.0);
        cache.fill(&mut gpu, &path, 1.0, true, false);
        cache.fill(&mut gpu, &path, 1.9, true, false);
        assert_eq!(cache.tessellator().invocations(), 1);
        // Coarser is fine
        cache.fill(&mut gpu, &path, 0.5, true, false);
        assert_eq!(cache.tessellator().invocations(), 1);
        cache.fill(&mut gpu, &path, 2.5, true, false);
        assert_eq!(cache.tessellator().invocations(), 2);
    }

    #[test]
    fn test_tolerance_tracks_scale() {
        let mut cache = ShapeCache::new(0.5);
        assert_eq!(cache.tolerance(1.0), 0.5);
        assert_eq!(cache.tolerance(4.0), 0.125);
        assert_eq!(cache.tolerance(0.0), 0.5);
    }

    #[test]
    fn test_hairline_uses_lines() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let path = Path::rect(Rect::new(4.0, 4.0, 10.0, 10.0));
        cache.draw(&mut gpu, &path, &StrokeStyle::new(0.5), 1.0, false, false);
        assert_eq!(cache.stats().fast_paths, 1);
        assert_eq!(cache.stats().tessellations, 0);
        let width = gpu.state().get(crate::device::StateAttr::LineWidth).map(f32::from_bits);
        assert_eq!(width, Some(1.0));
        assert!(gpu.device().count_pixels(|p| p[3] == 255) > 30);
    }

    #[test]
    fn test_release_retires_lists() {
        let mut gpu = gpu();
        let mut cache = ShapeCache::default();
        let a = star();
        let b = Path::rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        cache.fill(&mut gpu, &a, 1.0, true, false);
        cache.fill(&mut gpu, &b, 1.0, true, false);
        assert_eq!(cache.release(&[a.id()]), 1);
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.flush_retired(&mut gpu), 1);
        assert_eq!(gpu.device().live_lists(), 1);
    }

    #[test]
    fn test_stroke_geometry_is_triangles() {
        let mut cache = ShapeCache::default();
        let path = Path::line(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let style = StrokeStyle::new(0.5);
        let geometry = cache.stroke_geometry(&path, &style, 1.0, true);
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].topology(), Topology::Triangles);
        let again = cache.stroke_geometry(&path, &style, 1.0, true);
        assert!(Arc::ptr_eq(&geometry, &again));
    }

    #[test]
    fn test_thin_stroke_outline_stays_cached() {
        let mut cache = ShapeCache::default();
        let path = Path::rect(Rect::new(2.0, 2.0, 12.0, 12.0));
        let style = StrokeStyle::new(0.5);
        for _ in 0..3 {
            cache.stroke_geometry(&path, &style, 1.0, true);
        }
        let stats = cache.stats();
        assert_eq!(stats.tessellations, 1);
        assert_eq!((stats.hits, stats.misses), (2, 1));
        assert_eq!(stats.retired, 0);
    }
}
