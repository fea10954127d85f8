//! Rough-outline glyph cache
//!
//! Glyphs are tessellated at the smallest bucket size at or above the
//! requested device size and uniformly scaled down when drawn. Nearby sizes
//! share a bucket, so smooth zooming re-tessellates only when crossing a
//! bucket boundary. Entries live in a fixed-capacity LRU; evicted draw lists
//! are retired and deleted at the next flush.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use vecta_core::{Affine2D, FontFace, GlyphId, Point, ResourceId};
use vecta_gpu::{Device, GeometryBuffer, Gpu, ListId, Tessellator};

use crate::outline::{compile, glyph_geometry, replay};

/// Geometric sequence of candidate pixel sizes
#[derive(Clone, Debug, PartialEq)]
pub struct SizeBuckets {
    sizes: Vec<f32>,
}

impl SizeBuckets {
    /// Sizes `min, min*ratio, min*ratio^2, ...` up to and including `max`
    pub fn new(min: f32, max: f32, ratio: f32) -> Self {
        let min = min.max(0.5);
        let max = max.max(min);
        let ratio = ratio.max(1.01);
        let mut sizes = Vec::new();
        let mut size = min;
        while size < max {
            sizes.push(size);
            size *= ratio;
        }
        sizes.push(max);
        Self { sizes }
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    /// Index and size of the bucket serving `size`
    ///
    /// Sizes beyond the largest bucket use the largest bucket.
    pub fn bucket_for(&self, size: f32) -> (usize, f32) {
        let index = self
            .sizes
            .iter()
            .position(|b| *b >= size)
            .unwrap_or(self.sizes.len() - 1);
        (index, self.sizes[index])
    }
}

impl Default for SizeBuckets {
    fn default() -> Self {
        Self::new(4.0, 512.0, 1.2)
    }
}

/// A cached bucket tessellation
#[derive(Clone, Debug)]
pub struct RoughGlyph {
    pub list: Option<ListId>,
    pub geometry: Arc<[GeometryBuffer]>,
    pub bucket_size: f32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoughCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

pub struct RoughOutlineCache {
    buckets: SizeBuckets,
    entries: LruCache<(ResourceId, GlyphId, usize), RoughGlyph>,
    retired: Vec<ListId>,
    stats: RoughCacheStats,
}

impl RoughOutlineCache {
    pub fn new(buckets: SizeBuckets, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            buckets,
            entries: LruCache::new(capacity),
            retired: Vec::new(),
            stats: RoughCacheStats::default(),
        }
    }

    pub fn buckets(&self) -> &SizeBuckets {
        &self.buckets
    }

    pub fn stats(&self) -> RoughCacheStats {
        RoughCacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Cached geometry for `glyph` at device size `size`, tessellating the
    /// bucket on a miss
    pub fn lookup<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        tessellator: &mut Tessellator,
        face: &FontFace,
        glyph: GlyphId,
        size: f32,
        tolerance: f32,
    ) -> RoughGlyph {
        let (index, bucket_size) = self.buckets.bucket_for(size);
        let key = (face.id(), glyph, index);
        if let Some(hit) = self.entries.get(&key) {
            self.stats.hits += 1;
            return hit.clone();
        }

        self.stats.misses += 1;
        let geometry = glyph_geometry(tessellator, face.source(), glyph, bucket_size, tolerance);
        let entry = RoughGlyph {
            list: compile(gpu, &geometry),
            geometry: geometry.into(),
            bucket_size,
        };
        if let Some((evicted_key, evicted)) = self.entries.push(key, entry.clone()) {
            if evicted_key != key {
                self.stats.evictions += 1;
                tracing::debug!(
                    "rough glyph {:?} of {} evicted (bucket {})",
                    evicted_key.1,
                    evicted_key.0,
                    evicted.bucket_size
                );
            }
            self.retired.extend(evicted.list);
        }
        entry
    }

    /// Draw `glyph` of `face` at user size `size` with its baseline at `pen`
    ///
    /// The bucket is chosen from the device size `size * scale`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_glyph<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        tessellator: &mut Tessellator,
        face: &FontFace,
        glyph: GlyphId,
        size: f32,
        pen: Point,
        scale: f32,
        tolerance: f32,
    ) {
        let rough = self.lookup(gpu, tessellator, face, glyph, size * scale, tolerance);
        let k = size / rough.bucket_size;
        let local = Affine2D::uniform_scale(k).then(&Affine2D::translate(pen.x, pen.y));
        gpu.push_transform(&local);
        replay(gpu, rough.list, &rough.geometry);
        gpu.pop_transform();
    }

    /// Drop every entry; their lists are retired
    pub fn reset(&mut self) {
        while let Some((_, entry)) = self.entries.pop_lru() {
            self.retired.extend(entry.list);
        }
        tracing::debug!("rough outline cache reset");
    }

    /// Drop entries of released faces
    pub fn release(&mut self, ids: &[ResourceId]) {
        let dead: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| ids.contains(&k.0))
            .map(|(k, _)| *k)
            .collect();
        for key in dead {
            if let Some(entry) = self.entries.pop(&key) {
                self.retired.extend(entry.list);
            }
        }
    }

    pub fn take_retired(&mut self) -> Vec<ListId> {
        std::mem::take(&mut self.retired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_sequence() {
        let buckets = SizeBuckets::default();
        let sizes = buckets.sizes();
        assert_eq!(sizes[0], 4.0);
        assert_eq!(*sizes.last().unwrap(), 512.0);
        for w in sizes.windows(2) {
            assert!(w[1] > w[0]);
            assert!(w[1] / w[0] <= 1.2 + 1e-4);
        }
    }

    #[test]
    fn test_bucket_for_rounds_up() {
        let buckets = SizeBuckets::default();
        let (a, size_a) = buckets.bucket_for(10.0);
        let (b, _) = buckets.bucket_for(10.3);
        assert_eq!(a, b);
        assert!((size_a - 11.943936).abs() < 1e-3);
        let (c, size_c) = buckets.bucket_for(size_a + 0.01);
        assert_eq!(c, a + 1);
        assert!(size_c > size_a);
        // Exactly on a bucket stays in it
        assert_eq!(buckets.bucket_for(size_a).0, a);
        // Beyond the top uses the top
        assert_eq!(buckets.bucket_for(4000.0).1, 512.0);
        assert_eq!(buckets.bucket_for(1.0).1, 4.0);
    }
}
