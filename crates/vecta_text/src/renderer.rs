//! Font rendering dispatcher
//!
//! [`FontRenderer`] lays out a run, picks a strategy from the rendering
//! hints and hands every glyph to that strategy's cache. Each strategy keeps
//! its own cache, so switching back and forth never invalidates anything.

use vecta_core::{Font, GlyphId, Point, ResourceId};
use vecta_gpu::{Device, Gpu, Tessellator};

use crate::atlas::{AtlasCache, AtlasStats};
use crate::exact::ExactOutlineCache;
use crate::rough::{RoughCacheStats, RoughOutlineCache, SizeBuckets};
use crate::strategy::{select_strategy, FontStrategy, RenderingHints, StrategyHint};

/// A glyph with its baseline offset from the run origin, in user units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionedGlyph {
    pub glyph: GlyphId,
    pub offset: Point,
}

/// Text to draw: characters laid out with font advances, or pre-positioned
/// glyphs
#[derive(Clone, Copy, Debug)]
pub enum TextRun<'a> {
    Text(&'a str),
    Glyphs(&'a [PositionedGlyph]),
}

impl<'a> From<&'a str> for TextRun<'a> {
    fn from(text: &'a str) -> Self {
        TextRun::Text(text)
    }
}

impl<'a> From<&'a [PositionedGlyph]> for TextRun<'a> {
    fn from(glyphs: &'a [PositionedGlyph]) -> Self {
        TextRun::Glyphs(glyphs)
    }
}

/// Lay out `text` on one baseline per line using horizontal advances
///
/// Characters the face does not map use glyph 0.
pub fn layout_text(font: &Font, text: &str) -> Vec<PositionedGlyph> {
    let source = font.face().source();
    let line_height = (source.ascent() - source.descent()) * font.scale();
    let mut glyphs = Vec::with_capacity(text.len());
    let mut pen = Point::new(0.0, 0.0);
    for c in text.chars() {
        if c == '\n' {
            pen = Point::new(0.0, pen.y + line_height);
            continue;
        }
        let glyph = source.glyph_index(c).unwrap_or_else(|| {
            tracing::trace!("no glyph for {:?}, using .notdef", c);
            GlyphId(0)
        });
        glyphs.push(PositionedGlyph { glyph, offset: pen });
        pen.x += font.advance(glyph);
    }
    glyphs
}

pub struct FontRenderer {
    hints: RenderingHints,
    tessellator: Tessellator,
    tolerance: f32,
    exact: ExactOutlineCache,
    rough: RoughOutlineCache,
    atlas: AtlasCache,
    last_strategy: Option<FontStrategy>,
}

impl FontRenderer {
    /// `tolerance` is the flattening tolerance in device pixels
    pub fn new(
        tolerance: f32,
        buckets: SizeBuckets,
        rough_capacity: usize,
        atlas_max_px: f32,
    ) -> Self {
        Self {
            hints: RenderingHints::default(),
            tessellator: Tessellator::new(),
            tolerance,
            exact: ExactOutlineCache::new(),
            rough: RoughOutlineCache::new(buckets, rough_capacity),
            atlas: AtlasCache::new(atlas_max_px),
            last_strategy: None,
        }
    }

    pub fn hints(&self) -> RenderingHints {
        self.hints
    }

    pub fn set_hints(&mut self, hints: RenderingHints) {
        self.hints = hints;
    }

    pub fn set_strategy(&mut self, strategy: StrategyHint) {
        self.hints.strategy = strategy;
    }

    /// Strategy used by the most recent draw
    pub fn last_strategy(&self) -> Option<FontStrategy> {
        self.last_strategy
    }

    pub fn exact_cache(&self) -> &ExactOutlineCache {
        &self.exact
    }

    pub fn rough_cache(&self) -> &RoughOutlineCache {
        &self.rough
    }

    pub fn rough_cache_mut(&mut self) -> &mut RoughOutlineCache {
        &mut self.rough
    }

    pub fn rough_stats(&self) -> RoughCacheStats {
        self.rough.stats()
    }

    pub fn atlas_stats(&self) -> AtlasStats {
        self.atlas.stats()
    }

    /// Glyph tessellations performed so far
    pub fn tessellations(&self) -> u64 {
        self.tessellator.invocations()
    }

    /// Strategy a draw of `font` at device `scale` would use
    pub fn strategy_for<D: Device>(&self, gpu: &Gpu<D>, font: &Font, scale: f32) -> FontStrategy {
        let fits = self
            .atlas
            .fits(font.size() * scale, gpu.limits().max_texture_size);
        select_strategy(&self.hints, fits)
    }

    /// Draw a run with its origin at `origin` (user space)
    ///
    /// The caller has set the color and transform; `scale` is the device
    /// scale factor of that transform.
    pub fn draw_text<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        font: &Font,
        run: TextRun<'_>,
        origin: Point,
        scale: f32,
    ) -> FontStrategy {
        let laid_out;
        let glyphs = match run {
            TextRun::Text(text) => {
                laid_out = layout_text(font, text);
                &laid_out[..]
            }
            TextRun::Glyphs(glyphs) => glyphs,
        };
        let strategy = self.strategy_for(gpu, font, scale);
        if self.last_strategy != Some(strategy) {
            tracing::debug!("font strategy {:?} -> {:?}", self.last_strategy, strategy);
            self.last_strategy = Some(strategy);
        }

        let pens = glyphs.iter().map(|g| {
            (
                g.glyph,
                Point::new(origin.x + g.offset.x, origin.y + g.offset.y),
            )
        });
        match strategy {
            FontStrategy::TextureAtlas => {
                let placed: Vec<_> = pens.collect();
                let face = font.face();
                let leftover = match self
                    .atlas
                    .draw_glyphs(gpu, face, font.size() * scale, &placed, scale)
                {
                    Ok(leftover) => leftover,
                    Err(e) => {
                        tracing::warn!("atlas draw failed, using outlines: {}", e);
                        placed
                    }
                };
                for (glyph, pen) in leftover {
                    self.exact.draw_glyph(
                        gpu,
                        &mut self.tessellator,
                        font,
                        glyph,
                        pen,
                        scale,
                        self.tolerance,
                    );
                }
            }
            FontStrategy::ExactOutline => {
                for (glyph, pen) in pens {
                    self.exact.draw_glyph(
                        gpu,
                        &mut self.tessellator,
                        font,
                        glyph,
                        pen,
                        scale,
                        self.tolerance,
                    );
                }
            }
            FontStrategy::RoughOutline => {
                for (glyph, pen) in pens {
                    self.rough.draw_glyph(
                        gpu,
                        &mut self.tessellator,
                        font.face(),
                        glyph,
                        font.size(),
                        pen,
                        scale,
                        self.tolerance,
                    );
                }
            }
        }
        strategy
    }

    /// Empty the rough-outline cache
    pub fn reset_rough_outline_cache(&mut self) {
        self.rough.reset();
    }

    /// Forget everything cached for released fonts or faces
    pub fn release(&mut self, ids: &[ResourceId]) {
        self.exact.release(ids);
        self.rough.release(ids);
        self.atlas.release(ids);
    }

    /// Delete retired draw lists and atlas textures; returns how many of each
    pub fn flush_retired<D: Device>(&mut self, gpu: &mut Gpu<D>) -> (usize, usize) {
        let lists: Vec<_> = self
            .exact
            .take_retired()
            .into_iter()
            .chain(self.rough.take_retired())
            .collect();
        let textures = self.atlas.take_retired();
        let counts = (lists.len(), textures.len());
        for list in lists {
            gpu.delete_list(list);
        }
        for texture in textures {
            gpu.delete_texture(texture);
        }
        if counts != (0, 0) {
            tracing::debug!(
                "deleted {} glyph lists, {} atlas pages",
                counts.0,
                counts.1
            );
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use vecta_core::{FontFace, GlyphBitmap, GlyphSource, Path, Rect};
    use vecta_gpu::HeadlessDevice;

    /// Every printable character is a filled box; space is empty
    struct BoxFont;

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
            let w = (pixel_size * 0.4).round() as u32;
            let h = (pixel_size * 0.7).round() as u32;
            Some(GlyphBitmap {
                width: w,
                height: h,
                left: (pixel_size * 0.1).round() as i32,
                top: h as i32,
                coverage: vec![255; (w * h) as usize],
            })
        }
    }

    fn setup() -> (Gpu<HeadlessDevice>, FontRenderer, Font) {
        let mut gpu = Gpu::new(HeadlessDevice::new(200, 100));
        gpu.set_transform(&vecta_core::Affine2D::IDENTITY);
        gpu.set_color([1.0; 4]);
        let renderer = FontRenderer::new(0.25, SizeBuckets::default(), 64, 48.0);
        let font = Font::new(FontFace::new(Arc::new(BoxFont)), 20.0);
        (gpu, renderer, font)
    }

    fn lit(gpu: &Gpu<HeadlessDevice>) -> usize {
        gpu.device().count_pixels(|p| p[3] > 127)
    }

    #[test]
    fn test_layout_advances() {
        let font = Font::new(FontFace::new(Arc::new(BoxFont)), 10.0);
        let glyphs = layout_text(&font, "ab\nc");
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[1].offset, Point::new(6.0, 0.0));
        assert_eq!(glyphs[2].offset, Point::new(0.0, 10.0));
    }

    #[test]
    fn test_exact_outline_caches_per_glyph() {
        let (mut gpu, mut renderer, font) = setup();
        let s = renderer.draw_text(&mut gpu, &font, "AA A".into(), Point::new(10.0, 50.0), 1.0);
        assert_eq!(s, FontStrategy::ExactOutline);
        // One tessellation for 'A'; the space has no outline
        assert_eq!(renderer.tessellations(), 1);
        assert_eq!(renderer.exact_cache().hits(), 2);
        // Each box is 8x14 px
        assert_eq!(lit(&gpu), 3 * 8 * 14);
    }

    #[test]
    fn test_atlas_strategy_in_fast_mode() {
        let (mut gpu, mut renderer, font) = setup();
        renderer.set_hints(RenderingHints {
            strategy: StrategyHint::Auto,
            fast_shapes: true,
        });
        let s = renderer.draw_text(&mut gpu, &font, "AB".into(), Point::new(10.0, 50.0), 1.0);
        assert_eq!(s, FontStrategy::TextureAtlas);
        assert_eq!(renderer.atlas_stats().rasterized, 2);
        assert_eq!(renderer.atlas_stats().pages, 1);
        assert_eq!(lit(&gpu), 2 * 8 * 14);
        assert_eq!(renderer.tessellations(), 0);

        // Too large for the atlas: exact outlines
        let big = font.with_size(80.0);
        let s = renderer.draw_text(&mut gpu, &big, "A".into(), Point::new(0.0, 90.0), 1.0);
        assert_eq!(s, FontStrategy::ExactOutline);
    }

    #[test]
    fn test_rough_outline_shares_buckets() {
        let (mut gpu, mut renderer, font) = setup();
        renderer.set_strategy(StrategyHint::RoughOutline);
        renderer.draw_text(&mut gpu, &font.with_size(10.0), "A".into(), Point::new(0.0, 20.0), 1.0);
        renderer.draw_text(&mut gpu, &font.with_size(10.3), "A".into(), Point::new(0.0, 40.0), 1.0);
        assert_eq!(renderer.rough_stats().misses, 1);
        assert_eq!(renderer.rough_stats().hits, 1);
        renderer.draw_text(&mut gpu, &font.with_size(12.5), "A".into(), Point::new(0.0, 60.0), 1.0);
        assert_eq!(renderer.rough_stats().misses, 2);

        renderer.reset_rough_outline_cache();
        assert_eq!(renderer.rough_stats().entries, 0);
        let before = gpu.device().live_lists();
        assert_eq!(renderer.flush_retired(&mut gpu), (2, 0));
        assert_eq!(gpu.device().live_lists(), before - 2);
    }

    #[test]
    fn test_release_retires_until_flush() {
        let (mut gpu, mut renderer, font) = setup();
        renderer.draw_text(&mut gpu, &font, "AB".into(), Point::new(0.0, 50.0), 1.0);
        assert_eq!(gpu.device().live_lists(), 2);
        renderer.release(&[font.face().id()]);
        assert_eq!(renderer.exact_cache().len(), 0);
        assert_eq!(gpu.device().live_lists(), 2);
        renderer.flush_retired(&mut gpu);
        assert_eq!(gpu.device().live_lists(), 0);
    }
}
