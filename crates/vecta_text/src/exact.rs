//! Exact-outline glyph cache
//!
//! One precompiled draw list per (font, glyph). The font identity pins face
//! and size, so a different font state is simply a different key. An entry
//! built at a device scale more than twice as coarse as the current one is
//! re-tessellated, the same rule the shape cache uses.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use vecta_core::{Affine2D, Font, GlyphId, Point, ResourceId};
use vecta_gpu::{Device, GeometryBuffer, Gpu, ListId, Tessellator};

use crate::outline::{compile, glyph_geometry, replay};

const SCALE_DRIFT: f32 = 2.0;

struct ExactEntry {
    list: Option<ListId>,
    geometry: Arc<[GeometryBuffer]>,
    face: ResourceId,
    scale: f32,
}

#[derive(Default)]
pub struct ExactOutlineCache {
    entries: FxHashMap<(ResourceId, GlyphId), ExactEntry>,
    retired: Vec<ListId>,
    hits: u64,
    misses: u64,
}

impl ExactOutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Draw one glyph with its baseline origin at `pen`
    ///
    /// `scale` is the device scale and `tolerance` the device-space flattening
    /// tolerance.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_glyph<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        tessellator: &mut Tessellator,
        font: &Font,
        glyph: GlyphId,
        pen: Point,
        scale: f32,
        tolerance: f32,
    ) {
        let key = (font.id(), glyph);
        let stale = self
            .entries
            .get(&key)
            .is_some_and(|e| scale > e.scale * SCALE_DRIFT);
        if stale {
            if let Some(old) = self.entries.remove(&key) {
                self.retired.extend(old.list);
            }
        }

        let translate = Affine2D::translate(pen.x, pen.y);
        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            gpu.push_transform(&translate);
            replay(gpu, entry.list, &entry.geometry);
            gpu.pop_transform();
            return;
        }

        self.misses += 1;
        let geometry = glyph_geometry(
            tessellator,
            font.face().source(),
            glyph,
            font.size(),
            tolerance / scale.max(1e-6),
        );
        let list = compile(gpu, &geometry);
        gpu.push_transform(&translate);
        replay(gpu, list, &geometry);
        gpu.pop_transform();
        self.entries.insert(
            key,
            ExactEntry {
                list,
                geometry: geometry.into(),
                face: font.face().id(),
                scale,
            },
        );
    }

    /// Drop entries of released fonts or faces
    pub fn release(&mut self, ids: &[ResourceId]) {
        let retired = &mut self.retired;
        self.entries.retain(|(font, _), entry| {
            let dead = ids.contains(font) || ids.contains(&entry.face);
            if dead {
                retired.extend(entry.list);
            }
            !dead
        });
    }

    /// Lists waiting for deletion
    pub fn take_retired(&mut self) -> Vec<ListId> {
        std::mem::take(&mut self.retired)
    }
}
