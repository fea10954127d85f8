//! TrueType/OpenType glyph source
//!
//! Outlines and metrics come from `ttf-parser`; atlas bitmaps are rendered
//! with swash. The face is re-parsed on each query, which is cheap: parsing
//! only reads table offsets.

use std::sync::{Arc, Mutex};

use swash::scale::{Render, ScaleContext, Source};
use swash::zeno::Format;
use vecta_core::{GlyphBitmap, GlyphId, GlyphSource, Path, PathBuilder, PathCommand, Point};

use crate::{Result, TextError};

pub struct TtfFace {
    data: Arc<Vec<u8>>,
    index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    family: String,
    scale_context: Mutex<ScaleContext>,
}

impl TtfFace {
    /// Parse face `index` of a font file or collection
    pub fn from_bytes(data: Vec<u8>, index: u32) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, index)
            .map_err(|e| TextError::FontParse(format!("{:?}", e)))?;
        let family = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
            .find_map(|name| name.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();
        tracing::debug!("loaded face '{}' ({} units/em)", family, units_per_em);

        Ok(Self {
            data: Arc::new(data),
            index,
            units_per_em,
            ascender,
            descender,
            family,
            scale_context: Mutex::new(ScaleContext::new()),
        })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())
            .map_err(|e| TextError::FontParse(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_bytes(data, 0)
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.index).ok()
    }

    /// Glyph for `c`, or an error when the face has none
    pub fn require_glyph(&self, c: char) -> Result<GlyphId> {
        self.glyph_index(c).ok_or(TextError::GlyphNotFound(c))
    }
}

/// Collects ttf-parser outline callbacks into a path
struct OutlineSink {
    builder: PathBuilder,
}

impl ttf_parser::OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.push(PathCommand::MoveTo(Point::new(x, y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.push(PathCommand::LineTo(Point::new(x, y)));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.push(PathCommand::QuadTo {
            control: Point::new(x1, y1),
            end: Point::new(x, y),
        });
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.push(PathCommand::CubicTo {
            control1: Point::new(x1, y1),
            control2: Point::new(x2, y2),
            end: Point::new(x, y),
        });
    }

    fn close(&mut self) {
        self.builder.push(PathCommand::Close);
    }
}

impl GlyphSource for TtfFace {
    fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    fn glyph_index(&self, c: char) -> Option<GlyphId> {
        self.face()?.glyph_index(c).map(|g| GlyphId(g.0))
    }

    fn advance(&self, glyph: GlyphId) -> f32 {
        self.face()
            .and_then(|face| face.glyph_hor_advance(ttf_parser::GlyphId(glyph.0)))
            .unwrap_or(0) as f32
    }

    fn outline(&self, glyph: GlyphId) -> Option<Path> {
        let face = self.face()?;
        let mut sink = OutlineSink {
            builder: PathBuilder::new(),
        };
        face.outline_glyph(ttf_parser::GlyphId(glyph.0), &mut sink)?;
        let path = sink.builder.build();
        (!path.is_empty()).then_some(path)
    }

    fn rasterize(&self, glyph: GlyphId, pixel_size: f32) -> Option<GlyphBitmap> {
        let font = swash::FontRef::from_index(&self.data, self.index as usize)?;
        let mut context = self.scale_context.lock().unwrap_or_else(|e| e.into_inner());
        let mut scaler = context.builder(font).size(pixel_size).build();

        let mut render = Render::new(&[Source::Outline]);
        render.format(Format::Alpha);
        match render.render(&mut scaler, glyph.0) {
            Some(img) => Some(GlyphBitmap {
                width: img.placement.width,
                height: img.placement.height,
                left: img.placement.left,
                top: img.placement.top,
                coverage: img.data,
            }),
            // No outline (space): an empty bitmap, still placeable
            None => Some(GlyphBitmap::default()),
        }
    }

    fn ascent(&self) -> f32 {
        self.ascender as f32
    }

    fn descent(&self) -> f32 {
        self.descender as f32
    }

    fn family_name(&self) -> &str {
        &self.family
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        let err = TtfFace::from_bytes(vec![0, 1, 2, 3], 0).err().unwrap();
        assert!(matches!(err, TextError::FontParse(_)));
    }

    const MONO: &[u8] = include_bytes!("../tests/fonts/DejaVuSansMono.ttf");

    fn mono() -> TtfFace {
        TtfFace::from_bytes(MONO.to_vec(), 0).unwrap()
    }

    #[test]
    fn test_metrics() {
        let face = mono();
        assert_eq!(face.units_per_em(), 2048);
        assert_eq!(face.family_name(), "DejaVu Sans Mono");
        assert!(face.ascent() > 0.0);
        assert!(face.descent() < 0.0);

        let a = face.require_glyph('A').unwrap();
        let i = face.require_glyph('i').unwrap();
        assert_ne!(a, i);
        assert!(face.advance(a) > 0.0);
        // Monospaced
        assert_eq!(face.advance(a), face.advance(i));
        assert!(matches!(
            face.require_glyph('\u{4e00}'),
            Err(TextError::GlyphNotFound('\u{4e00}'))
        ));
    }

    #[test]
    fn test_outline_is_y_up() {
        let face = mono();
        let cap = face.outline(face.require_glyph('A').unwrap()).unwrap();
        let bounds = cap.control_bounds().unwrap();
        assert!(bounds.y.abs() <= 1.0, "A sits on the baseline: {bounds:?}");
        assert!(bounds.max_y() > 1000.0 && bounds.max_y() <= face.ascent());

        let g = face.outline(face.require_glyph('g').unwrap()).unwrap();
        let bounds = g.control_bounds().unwrap();
        assert!(bounds.y < 0.0 && bounds.y >= face.descent());
        assert!(g.contour_count() >= 2);

        assert!(face.outline(face.require_glyph(' ').unwrap()).is_none());
    }

    #[test]
    fn test_rasterize_placement() {
        let face = mono();
        let cap = face
            .rasterize(face.require_glyph('A').unwrap(), 32.0)
            .unwrap();
        assert!(cap.width > 0 && cap.height > 0);
        assert_eq!(cap.coverage.len(), (cap.width * cap.height) as usize);
        assert!(cap.coverage.iter().any(|&c| c > 200));
        // Top edge above the baseline, bottom edge near it
        assert!(cap.top > 16 && cap.top <= 32, "top {}", cap.top);
        assert!((cap.top - cap.height as i32).abs() <= 1);

        let g = face
            .rasterize(face.require_glyph('g').unwrap(), 32.0)
            .unwrap();
        assert!(g.top - (g.height as i32) < 0, "descender below the baseline");

        let space = face
            .rasterize(face.require_glyph(' ').unwrap(), 32.0)
            .unwrap();
        assert_eq!(space.width * space.height, 0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TtfFace::from_file("/nonexistent/font.ttf"),
            Err(TextError::FontParse(_))
        ));
    }
}
