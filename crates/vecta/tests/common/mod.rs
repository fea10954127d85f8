//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use vecta::types::{FontFace, GlyphBitmap, GlyphId, GlyphSource, Path, Point, Rect};
use vecta::gpu::{DeviceLimits, HeadlessDevice};
use vecta::{EngineConfig, RenderEngine};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine(width: u32, height: u32) -> RenderEngine<HeadlessDevice> {
    engine_with_limits(width, height, DeviceLimits::default())
}

pub fn engine_with_limits(
    width: u32,
    height: u32,
    limits: DeviceLimits,
) -> RenderEngine<HeadlessDevice> {
    init_tracing();
    let config = EngineConfig {
        state_audit: true,
        ..Default::default()
    };
    match RenderEngine::new(HeadlessDevice::with_limits(width, height, limits), config) {
        Ok(engine) => engine,
        Err(e) => panic!("engine construction failed: {e}"),
    }
}

/// Pixels with non-zero alpha
pub fn lit(engine: &RenderEngine<HeadlessDevice>) -> usize {
    engine.device().count_pixels(|p| p[3] > 0)
}

/// Deterministic generator for reproducible "random" inputs
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Simple star-shaped polygon around `center`
///
/// Angles are jittered within equal sectors so consecutive vertices are
/// always less than half a turn apart.
pub fn star_polygon(rng: &mut Lcg, center: Point, vertices: usize) -> Vec<Point> {
    let n = vertices.max(5);
    (0..n)
        .map(|i| {
            let a = (i as f32 + 0.8 * rng.next_f32()) / n as f32 * std::f32::consts::TAU;
            let r = 10.0 + rng.next_f32() * 40.0;
            Point::new(center.x + r * a.cos(), center.y + r * a.sin())
        })
        .collect()
}

/// Shoelace area
pub fn polygon_area(points: &[Point]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (p, q) = (points[i], points[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f32>()
        .abs()
        * 0.5
}

/// Every printable character is a 400x700 unit box; space is empty
pub struct BoxFont;

impl GlyphSource for BoxFont {
    fn units_per_em(&self) -> u16 {
        1000
    }

    fn glyph_index(&self, c: char) -> Option<GlyphId> {
        (c.is_ascii_graphic() || c == ' ').then_some(GlyphId(c as u16))
    }

    fn advance(&self, _glyph: GlyphId) -> f32 {
        600.0
    }

    fn outline(&self, glyph: GlyphId) -> Option<Path> {
        (glyph.0 != ' ' as u16).then(|| Path::rect(Rect::new(100.0, 0.0, 400.0, 700.0)))
    }

    fn rasterize(&self, glyph: GlyphId, pixel_size: f32) -> Option<GlyphBitmap> {
        if glyph.0 == ' ' as u16 {
            return Some(GlyphBitmap::default());
        }
        let width = (pixel_size * 0.4).round() as u32;
        let height = (pixel_size * 0.7).round() as u32;
        Some(GlyphBitmap {
            width,
            height,
            left: (pixel_size * 0.1).round() as i32,
            top: height as i32,
            coverage: vec![255; (width * height) as usize],
        })
    }
}

pub fn box_face() -> FontFace {
    FontFace::new(Arc::new(BoxFont))
}
