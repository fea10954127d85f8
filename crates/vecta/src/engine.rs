//! The render engine
//!
//! [`RenderEngine`] owns the device (through [`Gpu`]) and every cache. Hosts
//! activate a context state, issue draws and call
//! [`RenderEngine::flush_pending_deletions`] once per frame.

use std::sync::Arc;

use vecta_core::{
    Affine2D, Composite, FontFace, IRect, Paint, Path, Point, RasterImage, Rect, ResourceId,
    StrokeStyle,
};
use vecta_gpu::{
    CachedTexture, Capability, ClipCompositor, ClipMechanism, DeletionQueue, Device,
    GeometryBuffer, Gpu, ShapeCache, ShapeCacheStats, StateStats, TextureCache,
    TextureCacheStats, TextureWrap, Topology,
};
use vecta_text::{
    FontRenderer, FontStrategy, RenderingHints, RoughCacheStats, SizeBuckets, StrategyHint,
    TextRun, TtfFace,
};

use crate::config::EngineConfig;
use crate::context::{ClipEntry, ClipShape, ContextState};
use crate::error::{EngineError, Result};
use crate::paint::{apply_composite, flat_color, paint_geometry};

/// Resources freed by one [`RenderEngine::flush_pending_deletions`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Identities drained from the deletion queue
    pub released: usize,
    pub lists_deleted: usize,
    pub textures_deleted: usize,
}

pub struct RenderEngine<D: Device> {
    gpu: Gpu<D>,
    config: EngineConfig,
    shapes: ShapeCache,
    textures: TextureCache,
    clip: ClipCompositor,
    fonts: FontRenderer,
    deletions: DeletionQueue,
    state: ContextState,
    frame: u64,
}

impl<D: Device> RenderEngine<D> {
    pub fn new(device: D, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut gpu = Gpu::new(device);
        gpu.set_audit(config.state_audit);

        let buckets =
            SizeBuckets::new(config.rough_min_px, config.rough_max_px, config.rough_ratio);
        let mut fonts = FontRenderer::new(
            config.tolerance,
            buckets,
            config.rough_cache_capacity,
            config.atlas_max_px,
        );
        let state = ContextState {
            hints: RenderingHints {
                fast_shapes: config.fast_shapes,
                ..Default::default()
            },
            ..Default::default()
        };
        fonts.set_hints(state.hints);
        gpu.set_transform(&state.device_transform());
        tracing::info!("render engine ready ({} stencil bits)", gpu.limits().stencil_bits);

        Ok(Self {
            gpu,
            shapes: ShapeCache::new(config.tolerance),
            textures: TextureCache::new(),
            clip: ClipCompositor::new(),
            fonts,
            deletions: DeletionQueue::new(),
            state,
            frame: 0,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gpu(&self) -> &Gpu<D> {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut Gpu<D> {
        &mut self.gpu
    }

    pub fn device(&self) -> &D {
        self.gpu.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.gpu.device_mut()
    }

    pub fn into_device(self) -> D {
        self.gpu.into_device()
    }

    /// Frames flushed so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ------------------------------------------------------------------
    // Context state
    // ------------------------------------------------------------------

    /// The active context state
    pub fn context(&self) -> &ContextState {
        &self.state
    }

    /// Make `state` current: transform, composite, hints and clip are
    /// re-established on the device
    pub fn activate(&mut self, state: &ContextState) {
        self.state = state.clone();
        self.fonts.set_hints(self.state.hints);
        self.gpu.set_transform(&self.state.device_transform());
        apply_composite(&mut self.gpu, self.state.composite);
        self.apply_clip();
    }

    pub fn set_transform(&mut self, transform: Affine2D) {
        self.state.transform = transform;
    }

    pub fn set_scale_factor(&mut self, scale_factor: f32) {
        self.state.scale_factor = scale_factor.max(f32::EPSILON);
    }

    pub fn set_paint(&mut self, paint: impl Into<Paint>) {
        self.state.paint = paint.into();
    }

    pub fn set_stroke(&mut self, stroke: StrokeStyle) {
        self.state.stroke = stroke;
    }

    pub fn set_composite(&mut self, composite: Composite) {
        self.state.composite = composite;
    }

    pub fn set_font(&mut self, font: Option<vecta_core::Font>) {
        self.state.font = font;
    }

    pub fn set_rendering_hints(&mut self, hints: RenderingHints) {
        self.state.hints = hints;
        self.fonts.set_hints(hints);
    }

    pub fn set_font_strategy(&mut self, strategy: StrategyHint) {
        self.state.hints.strategy = strategy;
        self.fonts.set_strategy(strategy);
    }

    /// Transform, composite and scale for the next draw
    fn prepare_draw(&mut self) -> f32 {
        self.gpu.set_transform(&self.state.device_transform());
        apply_composite(&mut self.gpu, self.state.composite);
        self.state.device_scale()
    }

    // ------------------------------------------------------------------
    // Shapes
    // ------------------------------------------------------------------

    /// Fill `path` with the current paint
    pub fn fill(&mut self, path: &Path, immutable: bool, convex_hint: bool) {
        let scale = self.prepare_draw();
        match &self.state.paint {
            Paint::Solid(color) => {
                self.gpu.disable(Capability::Texture2D);
                self.gpu.set_color(color.to_array());
                self.shapes
                    .fill(&mut self.gpu, path, scale, immutable, convex_hint);
            }
            paint => {
                let geometry = self.shapes.fill_geometry(path, scale, immutable, convex_hint);
                paint_geometry(&mut self.gpu, &mut self.textures, paint, &geometry);
            }
        }
    }

    /// Stroke `path` with the current stroke style and paint
    ///
    /// Non-solid paints fill the stroke outline so every fragment gets its
    /// own paint value.
    pub fn draw(&mut self, path: &Path, immutable: bool, convex_hint: bool) {
        let scale = self.prepare_draw();
        match &self.state.paint {
            Paint::Solid(color) => {
                self.gpu.disable(Capability::Texture2D);
                self.gpu.set_color(color.to_array());
                self.shapes.draw(
                    &mut self.gpu,
                    path,
                    &self.state.stroke,
                    scale,
                    immutable,
                    convex_hint,
                );
            }
            paint => {
                let geometry =
                    self.shapes.stroke_geometry(path, &self.state.stroke, scale, immutable);
                paint_geometry(&mut self.gpu, &mut self.textures, paint, &geometry);
            }
        }
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Draw `image` (or its `subrect`) into `dest` in user space
    ///
    /// Sources larger than the device's maximum texture size are split into
    /// tiles, each drawn through this same method.
    pub fn draw_image(
        &mut self,
        image: &RasterImage,
        subrect: Option<IRect>,
        dest: Rect,
        immutable: bool,
    ) {
        let source = match image.check_subrect(subrect.unwrap_or_else(|| image.bounds())) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("image draw skipped: {}", e);
                return;
            }
        };
        let max = self.gpu.limits().max_texture_size;
        if source.width > max || source.height > max {
            let tiles = vecta_gpu::tile_image_draw(source, dest, max);
            tracing::debug!("image {} drawn as {} tiles", image.id(), tiles.len());
            for tile in tiles {
                self.draw_image(image, Some(tile.source), tile.dest, immutable);
            }
            return;
        }

        let Some(texture) = self
            .textures
            .find_texture(&mut self.gpu, image, Some(source), immutable, false)
        else {
            tracing::warn!("image draw skipped: no texture for {}", image.id());
            return;
        };
        self.prepare_draw();
        self.draw_textured_quad(texture, dest);
    }

    fn draw_textured_quad(&mut self, texture: CachedTexture, dest: Rect) {
        let mut quad = GeometryBuffer::from_points(Topology::TriangleFan, dest.corners());
        quad.set_tex_coords(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        self.gpu.bind_texture(Some(texture.texture));
        self.gpu.set_texture_wrap(TextureWrap::Clamp);
        self.gpu.enable(Capability::Texture2D);
        let alpha = match &self.state.paint {
            Paint::Solid(color) => color.a,
            _ => 1.0,
        };
        self.gpu.set_color([1.0, 1.0, 1.0, alpha]);
        self.gpu.draw(&quad);
        self.gpu.disable(Capability::Texture2D);
    }

    /// Stage `image` as a texture ahead of drawing it
    pub fn upload_image(&mut self, image: &RasterImage, immutable: bool) -> Result<CachedTexture> {
        self.textures
            .find_texture(&mut self.gpu, image, None, immutable, false)
            .ok_or(EngineError::TextureUnavailable {
                width: image.width(),
                height: image.height(),
            })
    }

    /// Evict every texture staged from `image` right away
    pub fn remove_texture(&mut self, image: &RasterImage) -> usize {
        self.textures.remove_texture(&mut self.gpu, image.id())
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// Parse a TrueType/OpenType font into a face
    pub fn load_font(&self, data: Vec<u8>) -> Result<FontFace> {
        let face = TtfFace::from_bytes(data, 0)?;
        Ok(FontFace::new(Arc::new(face)))
    }

    /// Draw text with the current font, baseline origin at `origin`
    ///
    /// Returns the strategy used, or `None` when no font is set.
    pub fn draw_text<'a>(
        &mut self,
        run: impl Into<TextRun<'a>>,
        origin: Point,
    ) -> Option<FontStrategy> {
        let Some(font) = self.state.font.clone() else {
            tracing::warn!("draw_text without a font");
            return None;
        };
        let scale = self.prepare_draw();
        if !self.state.paint.is_solid() {
            tracing::debug!("text paint approximated by a flat color");
        }
        self.gpu
            .set_color(flat_color(&self.state.paint, origin).to_array());
        self.gpu.disable(Capability::Texture2D);
        Some(
            self.fonts
                .draw_text(&mut self.gpu, &font, run.into(), origin, scale),
        )
    }

    pub fn font_renderer(&self) -> &FontRenderer {
        &self.fonts
    }

    pub fn font_renderer_mut(&mut self) -> &mut FontRenderer {
        &mut self.fonts
    }

    /// Drop every rough-outline glyph; lists are deleted at the next flush
    pub fn reset_rough_outline_cache(&mut self) {
        self.fonts.reset_rough_outline_cache();
    }

    // ------------------------------------------------------------------
    // Clipping
    // ------------------------------------------------------------------

    /// Replace the clip with `shape` (under the current transform), or
    /// remove all clipping
    pub fn set_clip(&mut self, shape: Option<ClipShape>) {
        self.state.clip.clear();
        if let Some(shape) = shape {
            self.state
                .clip
                .push(ClipEntry::new(shape, self.state.device_transform()));
        }
        self.apply_clip();
    }

    /// Intersect the clip with `shape`
    pub fn push_clip(&mut self, shape: ClipShape) {
        self.state
            .clip
            .push(ClipEntry::new(shape, self.state.device_transform()));
        self.apply_clip();
    }

    /// Undo the most recent [`Self::push_clip`]
    pub fn pop_clip(&mut self) {
        if self.state.clip.pop().is_none() {
            tracing::warn!("pop_clip with an empty clip stack");
        }
        self.apply_clip();
    }

    pub fn clip_mechanism(&self) -> ClipMechanism {
        self.clip.mechanism()
    }

    /// Establish the context's clip on the device
    ///
    /// A lone rectangle uses scissor or clip planes; anything else writes one
    /// stencil bit per region and requires all of them.
    fn apply_clip(&mut self) {
        if self.state.clip.is_empty() {
            self.clip.reset(&mut self.gpu);
            return;
        }
        if let [entry] = &self.state.clip[..] {
            if let Some(rect) = entry.rect {
                let transform = entry.transform;
                if self.clip.clip_rect(&mut self.gpu, rect, &transform) {
                    return;
                }
            }
        }

        let bits = self.gpu.limits().stencil_bits.min(32) as usize;
        if self.state.clip.len() > bits {
            tracing::warn!(
                "{} clip regions exceed {} stencil bits; innermost ignored",
                self.state.clip.len(),
                bits
            );
        }
        self.gpu.disable(Capability::Texture2D);
        let mut mask = 0u32;
        for (i, entry) in self.state.clip.iter().take(bits).enumerate() {
            let bit = 1u32 << i;
            // Whole-plane clear: bits left over from an earlier region must go
            self.clip.begin_write_plane(&mut self.gpu, bit, None);
            self.gpu.set_transform(&entry.transform);
            let scale = entry.transform.scale_factor();
            // Rectangle outlines get a fresh identity per entry: draw uncached
            let rect = entry.rect.is_some();
            self.shapes.fill(&mut self.gpu, &entry.path, scale, !rect, rect);
            self.clip.end_write_plane(&mut self.gpu);
            mask |= bit;
        }
        self.clip.enable_clipping(&mut self.gpu, mask);
        self.gpu.set_transform(&self.state.device_transform());
    }

    // ------------------------------------------------------------------
    // Resource lifetime
    // ------------------------------------------------------------------

    /// Handle for releasing resources from any thread
    pub fn deletion_queue(&self) -> DeletionQueue {
        self.deletions.clone()
    }

    /// Queue the GPU resources of a destroyed path, style, image or font
    pub fn release(&self, id: ResourceId) {
        self.deletions.release(id);
    }

    /// Apply queued releases; call once per frame, before drawing
    ///
    /// The queue is drained under its lock, then device deletions run with
    /// the lock released.
    pub fn flush_pending_deletions(&mut self) -> FlushReport {
        let ids = self.deletions.drain();
        let mut report = FlushReport {
            released: ids.len(),
            ..Default::default()
        };
        if !ids.is_empty() {
            self.shapes.release(&ids);
            self.fonts.release(&ids);
            report.textures_deleted += self.textures.release(&mut self.gpu, &ids);
        }
        report.lists_deleted += self.shapes.flush_retired(&mut self.gpu);
        let (lists, textures) = self.fonts.flush_retired(&mut self.gpu);
        report.lists_deleted += lists;
        report.textures_deleted += textures;
        self.frame += 1;
        if report != FlushReport::default() {
            tracing::debug!("frame {}: {:?}", self.frame, report);
        }
        report
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn shape_stats(&self) -> ShapeCacheStats {
        self.shapes.stats()
    }

    pub fn texture_stats(&self) -> TextureCacheStats {
        self.textures.stats()
    }

    pub fn rough_stats(&self) -> RoughCacheStats {
        self.fonts.rough_stats()
    }

    pub fn state_stats(&self) -> StateStats {
        self.gpu.stats()
    }

    /// Fill and stroke tessellations performed for shapes
    pub fn shape_tessellations(&self) -> u64 {
        self.shapes.stats().tessellations
    }
}
