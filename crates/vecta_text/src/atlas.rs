//! Glyph texture atlas
//!
//! One alpha texture per (face, device pixel size), laid out as a fixed grid
//! of cells. Glyph bitmaps are rasterized by the glyph source on first use and
//! uploaded into the next free cell. A run draws as a single textured
//! triangle list.

use rustc_hash::FxHashMap;
use vecta_core::{FontFace, GlyphId, IRect, Point, ResourceId};
use vecta_gpu::{
    BlendMode, Capability, Device, GeometryBuffer, Gpu, TextureDesc, TextureFormat, TextureId,
    TextureWrap, Topology,
};

use crate::{Result, TextError};

/// Cells per atlas row and column
const GRID: u32 = 16;
const PADDING: u32 = 1;

#[derive(Clone, Copy, Debug)]
struct AtlasSlot {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    left: i32,
    top: i32,
}

struct AtlasPage {
    texture: TextureId,
    side: u32,
    cell: u32,
    next_cell: u32,
    /// `None` marks glyphs with no coverage (spaces)
    slots: FxHashMap<GlyphId, Option<AtlasSlot>>,
}

impl AtlasPage {
    fn allocate(&mut self) -> Option<(u32, u32)> {
        if self.next_cell >= GRID * GRID {
            return None;
        }
        let i = self.next_cell;
        self.next_cell += 1;
        Some(((i % GRID) * self.cell + PADDING, (i / GRID) * self.cell + PADDING))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AtlasStats {
    pub pages: usize,
    pub glyphs: usize,
    pub rasterized: u64,
    pub hits: u64,
}

pub struct AtlasCache {
    max_pixel_size: f32,
    pages: FxHashMap<(ResourceId, u32), AtlasPage>,
    retired: Vec<TextureId>,
    stats: AtlasStats,
}

/// Atlas sizes are quantized to quarter pixels
fn quantize(pixel_size: f32) -> u32 {
    (pixel_size * 4.0).round().max(1.0) as u32
}

fn cell_size(pixel_size: f32) -> u32 {
    (pixel_size * 1.5).ceil() as u32 + 2 * PADDING
}

impl AtlasCache {
    pub fn new(max_pixel_size: f32) -> Self {
        Self {
            max_pixel_size,
            pages: FxHashMap::default(),
            retired: Vec::new(),
            stats: AtlasStats::default(),
        }
    }

    pub fn max_pixel_size(&self) -> f32 {
        self.max_pixel_size
    }

    pub fn stats(&self) -> AtlasStats {
        AtlasStats {
            pages: self.pages.len(),
            glyphs: self.pages.values().map(|p| p.slots.len()).sum(),
            ..self.stats
        }
    }

    /// Whether a page for `pixel_size` fits within the size limits
    pub fn fits(&self, pixel_size: f32, max_texture_size: u32) -> bool {
        pixel_size > 0.0
            && pixel_size <= self.max_pixel_size
            && cell_size(pixel_size) * GRID <= max_texture_size
    }

    fn page<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        face: &FontFace,
        pixel_size: f32,
    ) -> Result<&mut AtlasPage> {
        let key = (face.id(), quantize(pixel_size));
        if !self.pages.contains_key(&key) {
            let cell = cell_size(pixel_size);
            let side = cell * GRID;
            let desc = TextureDesc {
                width: side,
                height: side,
                format: TextureFormat::Alpha8,
            };
            let texture = gpu.create_texture(&desc, &vec![0; (side * side) as usize])?;
            tracing::debug!(
                "atlas page {}x{} for face {} at {}px",
                side,
                side,
                face.id(),
                pixel_size
            );
            self.pages.insert(
                key,
                AtlasPage {
                    texture,
                    side,
                    cell,
                    next_cell: 0,
                    slots: FxHashMap::default(),
                },
            );
        }
        self.pages.get_mut(&key).ok_or(TextError::AtlasFull)
    }

    /// Draw positioned glyphs of `face` rasterized at device size `pixel_size`
    ///
    /// `pens` are baseline origins in user space and `scale` maps user units
    /// to device pixels. Returns the glyphs that could not be placed in the
    /// atlas (no bitmap from the source, or the page is full); the caller
    /// draws those with another strategy.
    pub fn draw_glyphs<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        face: &FontFace,
        pixel_size: f32,
        glyphs: &[(GlyphId, Point)],
        scale: f32,
    ) -> Result<Vec<(GlyphId, Point)>> {
        let page = self.page(gpu, face, pixel_size)?;
        let mut fallback = Vec::new();
        let mut quads = Vec::with_capacity(glyphs.len());
        let mut rasterized = 0;
        let mut hits = 0;

        for &(glyph, pen) in glyphs {
            let slot = match page.slots.get(&glyph) {
                Some(slot) => {
                    hits += 1;
                    *slot
                }
                None => {
                    let Some(bitmap) = face.source().rasterize(glyph, pixel_size) else {
                        fallback.push((glyph, pen));
                        continue;
                    };
                    rasterized += 1;
                    let slot = if bitmap.width == 0 || bitmap.height == 0 {
                        None
                    } else if bitmap.width + 2 * PADDING > page.cell
                        || bitmap.height + 2 * PADDING > page.cell
                    {
                        fallback.push((glyph, pen));
                        continue;
                    } else {
                        let Some((x, y)) = page.allocate() else {
                            fallback.push((glyph, pen));
                            continue;
                        };
                        let region = IRect::new(x as i32, y as i32, bitmap.width, bitmap.height);
                        gpu.update_texture(page.texture, region, &bitmap.coverage)?;
                        Some(AtlasSlot {
                            x,
                            y,
                            width: bitmap.width,
                            height: bitmap.height,
                            left: bitmap.left,
                            top: bitmap.top,
                        })
                    };
                    page.slots.insert(glyph, slot);
                    slot
                }
            };
            if let Some(slot) = slot {
                quads.push((slot, pen));
            }
        }

        if !quads.is_empty() {
            let texture = page.texture;
            let geometry = quad_geometry(&quads, page.side as f32, scale);
            gpu.bind_texture(Some(texture));
            gpu.set_texture_wrap(TextureWrap::Clamp);
            gpu.enable(Capability::Texture2D);
            gpu.enable(Capability::Blend);
            gpu.set_blend_mode(BlendMode::SrcOver);
            gpu.draw(&geometry);
            gpu.disable(Capability::Texture2D);
        }

        self.stats.rasterized += rasterized;
        self.stats.hits += hits;
        Ok(fallback)
    }

    /// Drop pages of released faces
    pub fn release(&mut self, ids: &[ResourceId]) {
        let retired = &mut self.retired;
        self.pages.retain(|(face, _), page| {
            let dead = ids.contains(face);
            if dead {
                retired.push(page.texture);
            }
            !dead
        });
    }

    /// Retire every page
    pub fn clear(&mut self) {
        self.retired
            .extend(self.pages.drain().map(|(_, page)| page.texture));
    }

    /// Textures waiting for deletion
    pub fn take_retired(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.retired)
    }
}

fn quad_geometry(quads: &[(AtlasSlot, Point)], side: f32, scale: f32) -> GeometryBuffer {
    let inv = 1.0 / scale.max(1e-6);
    let mut geometry = GeometryBuffer::with_capacity(Topology::Triangles, quads.len() * 6);
    let mut uvs = Vec::with_capacity(quads.len() * 6);
    for (slot, pen) in quads {
        let x0 = pen.x + slot.left as f32 * inv;
        let y0 = pen.y - slot.top as f32 * inv;
        let x1 = x0 + slot.width as f32 * inv;
        let y1 = y0 + slot.height as f32 * inv;
        let u0 = slot.x as f32 / side;
        let v0 = slot.y as f32 / side;
        let u1 = (slot.x + slot.width) as f32 / side;
        let v1 = (slot.y + slot.height) as f32 / side;
        let corners = [
            (Point::new(x0, y0), [u0, v0]),
            (Point::new(x1, y0), [u1, v0]),
            (Point::new(x1, y1), [u1, v1]),
            (Point::new(x0, y1), [u0, v1]),
        ];
        for i in [0, 1, 2, 0, 2, 3] {
            geometry.push(corners[i].0);
            uvs.push(corners[i].1);
        }
    }
    geometry.set_tex_coords(uvs);
    geometry
}
