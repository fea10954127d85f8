//! Image to texture mapping
//!
//! Entries are keyed by (image identity, source sub-rectangle), so several
//! regions of one image can live side by side. Pixels are staged either
//! directly from the image or through a scratch canvas that normalizes the
//! format and, for repeating paints, grows the texture to power-of-two size.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rustc_hash::FxHashMap;
use vecta_core::{IRect, PixelFormat, RasterImage, ResourceId};

use crate::device::{Device, TextureDesc, TextureFormat, TextureId};
use crate::gpu::Gpu;

/// A texture handed out by the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedTexture {
    pub texture: TextureId,
    /// Texture dimensions
    pub width: u32,
    pub height: u32,
    /// Source region the texture was staged from
    pub source: IRect,
    /// Content was stretched to a power-of-two size for wrap addressing
    pub normalized: bool,
}

struct TextureEntry {
    texture: CachedTexture,
}

/// Cache performance counters
#[derive(Debug, Default, Clone)]
pub struct TextureCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub uploads: u64,
    /// Allocation failures reported to callers
    pub failures: u64,
    pub live_textures: usize,
    /// Estimated texture memory (RGBA8)
    pub memory_bytes: u64,
}

impl TextureCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
pub struct TextureCache {
    entries: FxHashMap<(ResourceId, IRect), TextureEntry>,
    stats: TextureCacheStats,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> TextureCacheStats {
        let mut stats = self.stats.clone();
        stats.live_textures = self.entries.len();
        stats.memory_bytes = self
            .entries
            .values()
            .map(|e| e.texture.width as u64 * e.texture.height as u64 * 4)
            .sum();
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Texture for `image` (or its `subrect`), staging it if needed
    ///
    /// Returns `None` when the region is invalid, exceeds the device's
    /// maximum texture size (the caller tiles instead) or the device cannot
    /// allocate it.
    pub fn find_texture<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        image: &RasterImage,
        subrect: Option<IRect>,
        immutable: bool,
        repeating: bool,
    ) -> Option<CachedTexture> {
        let source = match image.check_subrect(subrect.unwrap_or_else(|| image.bounds())) {
            Ok(rect) => rect,
            Err(e) => {
                tracing::warn!("image draw skipped: {}", e);
                return None;
            }
        };
        let key = (image.id(), source);
        let (width, height) = target_size(source, repeating, gpu.limits().npot_textures);
        let max = gpu.limits().max_texture_size;
        if width > max || height > max {
            tracing::warn!(
                "texture {}x{} exceeds device maximum {}; draw must be tiled",
                width,
                height,
                max
            );
            self.stats.failures += 1;
            return None;
        }

        if let Some(entry) = self.entries.get(&key) {
            let shape_ok = entry.texture.width == width && entry.texture.height == height;
            if shape_ok && (immutable || (repeating && entry.texture.normalized)) {
                self.stats.hits += 1;
                return Some(entry.texture);
            }
        }
        self.stats.misses += 1;

        let pixels = stage_pixels(image, source, width, height);
        let normalized = (width, height) != (source.width, source.height);

        // Same shape: refresh in place
        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.texture.width == width && entry.texture.height == height {
                let region = IRect::from_size(width, height);
                match gpu.update_texture(entry.texture.texture, region, &pixels) {
                    Ok(()) => {
                        self.stats.uploads += 1;
                        entry.texture.normalized = normalized;
                        return Some(entry.texture);
                    }
                    Err(e) => tracing::warn!("texture refresh failed: {}", e),
                }
            }
        }
        if let Some(stale) = self.entries.remove(&key) {
            gpu.delete_texture(stale.texture.texture);
        }

        let desc = TextureDesc {
            width,
            height,
            format: TextureFormat::Rgba8,
        };
        let texture = match gpu.create_texture(&desc, &pixels) {
            Ok(texture) => texture,
            Err(e) => {
                tracing::warn!("texture allocation failed: {}", e);
                self.stats.failures += 1;
                return None;
            }
        };
        self.stats.uploads += 1;
        tracing::debug!(
            "staged texture {}x{} for image {} region {:?} (normalized={})",
            width,
            height,
            image.id(),
            source,
            normalized
        );

        let cached = CachedTexture {
            texture,
            width,
            height,
            source,
            normalized,
        };
        self.entries.insert(
            key,
            TextureEntry { texture: cached },
        );
        Some(cached)
    }

    /// Drop every texture staged from `image`
    pub fn remove_texture<D: Device>(&mut self, gpu: &mut Gpu<D>, image: ResourceId) -> usize {
        let keys: Vec<_> = self
            .entries
            .keys()
            .filter(|(id, _)| *id == image)
            .copied()
            .collect();
        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                gpu.delete_texture(entry.texture.texture);
            }
        }
        keys.len()
    }

    /// Delete textures of all released images
    pub fn release<D: Device>(&mut self, gpu: &mut Gpu<D>, ids: &[ResourceId]) -> usize {
        ids.iter().map(|id| self.remove_texture(gpu, *id)).sum()
    }

    /// Delete everything
    pub fn clear<D: Device>(&mut self, gpu: &mut Gpu<D>) {
        for (_, entry) in self.entries.drain() {
            gpu.delete_texture(entry.texture.texture);
        }
    }
}

fn target_size(source: IRect, repeating: bool, npot: bool) -> (u32, u32) {
    if repeating && !npot {
        (
            source.width.next_power_of_two(),
            source.height.next_power_of_two(),
        )
    } else {
        (source.width, source.height)
    }
}

/// RGBA8 pixels of `source` scaled to `width`x`height`
fn stage_pixels(image: &RasterImage, source: IRect, width: u32, height: u32) -> Vec<u8> {
    let direct = image.format() == PixelFormat::Rgba8
        && source == image.bounds()
        && (width, height) == (image.width(), image.height());
    if direct {
        return image.pixels().to_vec();
    }

    let canvas = RgbaImage::from_fn(source.width, source.height, |x, y| {
        let px = image
            .rgba_at(source.x as u32 + x, source.y as u32 + y)
            .unwrap_or([0, 0, 0, 0]);
        Rgba(px)
    });
    if (width, height) == (source.width, source.height) {
        canvas.into_raw()
    } else {
        imageops::resize(&canvas, width, height, FilterType::Nearest).into_raw()
    }
}
