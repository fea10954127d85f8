//! The GPU choke point
//!
//! [`Gpu`] owns the device and the state mirror. Every state mutation in the
//! engine goes through it; redundant changes never reach the device. With the
//! audit flag on, each elision is checked against the device's actual value
//! and a mismatch is fatal.

use vecta_core::{Affine2D, IRect};

use crate::device::{
    BlendMode, Capability, Device, DeviceLimits, ListId, LogicOp, StateAttr, StencilFunc,
    StencilOp, TextureDesc, TextureId, TextureWrap,
};
use crate::geometry::GeometryBuffer;
use crate::state_cache::StateCache;
use crate::Result;

/// Counters for state deduplication
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StateStats {
    /// `set_state`/`set_color`/`set_transform` invocations
    pub requests: u64,
    /// Requests that reached the device
    pub device_calls: u64,
    /// Requests elided because the mirror already held the value
    pub elided: u64,
}

pub struct Gpu<D: Device> {
    device: D,
    limits: DeviceLimits,
    cache: StateCache,
    transform: Option<Affine2D>,
    transform_stack: Vec<Option<Affine2D>>,
    audit: bool,
    stats: StateStats,
}

impl<D: Device> Gpu<D> {
    /// Wrap a device, querying its constraints once
    pub fn new(device: D) -> Self {
        let limits = device.limits();
        tracing::info!(
            "device limits: texture={}, stencil={}, planes={}, lines={:?}, npot={}",
            limits.max_texture_size,
            limits.stencil_bits,
            limits.max_clip_planes,
            limits.line_width_range,
            limits.npot_textures
        );
        Self {
            device,
            limits,
            cache: StateCache::new(),
            transform: None,
            transform_stack: Vec::new(),
            audit: false,
            stats: StateStats::default(),
        }
    }

    /// Verify every elided change against the device (fatal on mismatch)
    pub fn set_audit(&mut self, audit: bool) {
        self.audit = audit;
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Direct device access for hosts; the mirror is reset since it can no
    /// longer be trusted
    pub fn device_mut(&mut self) -> &mut D {
        self.invalidate();
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn state(&self) -> &StateCache {
        &self.cache
    }

    pub fn stats(&self) -> StateStats {
        self.stats
    }

    /// Forget all mirrored state
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
        self.transform = None;
        self.transform_stack.clear();
    }

    fn audit_attr(&self, attr: StateAttr) {
        if let Some(mirrored) = self.cache.get(attr) {
            let actual = self.device.query_state(attr);
            if actual != mirrored {
                tracing::error!(
                    "GPU state desync on {:?}: mirror={}, device={}",
                    attr,
                    mirrored,
                    actual
                );
                panic!(
                    "GPU state desync on {attr:?}: mirror holds {mirrored}, device holds {actual}"
                );
            }
        }
    }

    /// Set an attribute, returning whether the device was touched
    pub fn set_state(&mut self, attr: StateAttr, value: u32) -> bool {
        self.stats.requests += 1;
        if self.audit {
            self.audit_attr(attr);
        }
        if self.cache.set_state(attr, value) {
            self.device.apply_state(attr, value);
            self.stats.device_calls += 1;
            true
        } else {
            self.stats.elided += 1;
            false
        }
    }

    pub fn enable(&mut self, cap: Capability) -> bool {
        self.set_state(StateAttr::Capability(cap), 1)
    }

    pub fn disable(&mut self, cap: Capability) -> bool {
        self.set_state(StateAttr::Capability(cap), 0)
    }

    pub fn set_enabled(&mut self, cap: Capability, enabled: bool) -> bool {
        self.set_state(StateAttr::Capability(cap), enabled as u32)
    }

    pub fn set_color(&mut self, rgba: [f32; 4]) -> bool {
        self.stats.requests += 1;
        if self.cache.set_color(rgba) {
            self.device.set_color(rgba);
            self.stats.device_calls += 1;
            true
        } else {
            self.stats.elided += 1;
            false
        }
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) -> bool {
        self.set_state(StateAttr::BlendMode, mode.raw())
    }

    pub fn set_logic_op(&mut self, op: LogicOp) -> bool {
        self.set_state(StateAttr::LogicOp, op.raw())
    }

    pub fn set_stencil_func(&mut self, func: StencilFunc, reference: u32, mask: u32) {
        self.set_state(StateAttr::StencilFunc, func.raw());
        self.set_state(StateAttr::StencilRef, reference);
        self.set_state(StateAttr::StencilFuncMask, mask);
    }

    pub fn set_stencil_op(&mut self, op: StencilOp) -> bool {
        self.set_state(StateAttr::StencilOp, op.raw())
    }

    pub fn set_stencil_write_mask(&mut self, mask: u32) -> bool {
        self.set_state(StateAttr::StencilWriteMask, mask)
    }

    pub fn set_color_write(&mut self, enabled: bool) -> bool {
        self.set_state(StateAttr::ColorWriteMask, if enabled { 0xF } else { 0 })
    }

    pub fn set_depth_write(&mut self, enabled: bool) -> bool {
        self.set_state(StateAttr::DepthWriteMask, enabled as u32)
    }

    pub fn bind_texture(&mut self, texture: Option<TextureId>) -> bool {
        self.set_state(StateAttr::BoundTexture, texture.map_or(0, TextureId::raw))
    }

    pub fn set_texture_wrap(&mut self, wrap: TextureWrap) -> bool {
        self.set_state(StateAttr::TextureWrap, wrap.raw())
    }

    /// Set the line width in device pixels, clamped and snapped to what the
    /// device supports
    pub fn set_line_width(&mut self, width: f32) -> bool {
        let (min, max) = self.limits.line_width_range;
        let mut w = width.clamp(min, max);
        let step = self.limits.line_width_granularity;
        if step > 0.0 {
            w = ((w - min) / step).round() * step + min;
        }
        self.set_state(StateAttr::LineWidth, w.min(max).to_bits())
    }

    pub fn set_transform(&mut self, transform: &Affine2D) -> bool {
        self.stats.requests += 1;
        if self.transform.as_ref() == Some(transform) {
            self.stats.elided += 1;
            return false;
        }
        self.device.set_transform(transform);
        self.transform = Some(*transform);
        self.stats.device_calls += 1;
        true
    }

    /// Current device transform if known
    pub fn transform(&self) -> Option<Affine2D> {
        self.transform
    }

    pub fn push_transform(&mut self, local: &Affine2D) {
        self.transform_stack.push(self.transform);
        self.transform = self.transform.map(|t| t.pre(local));
        self.device.push_transform(local);
    }

    pub fn pop_transform(&mut self) {
        self.transform = self.transform_stack.pop().flatten();
        self.device.pop_transform();
    }

    pub fn set_scissor(&mut self, rect: IRect) {
        self.device.set_scissor(rect);
    }

    pub fn set_clip_plane(&mut self, index: u8, equation: [f32; 3]) {
        self.device.set_clip_plane(index, equation);
    }

    pub fn clear_stencil(&mut self, mask: u32, bounds: Option<IRect>) {
        self.device.clear_stencil(mask, bounds);
    }

    pub fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId> {
        let result = self.device.create_texture(desc, pixels);
        self.cache.forget(StateAttr::BoundTexture);
        result
    }

    pub fn update_texture(
        &mut self,
        texture: TextureId,
        region: IRect,
        pixels: &[u8],
    ) -> Result<()> {
        let result = self.device.update_texture(texture, region, pixels);
        self.cache.forget(StateAttr::BoundTexture);
        result
    }

    pub fn delete_texture(&mut self, texture: TextureId) {
        if self.cache.get(StateAttr::BoundTexture) == Some(texture.raw()) {
            self.cache.forget(StateAttr::BoundTexture);
        }
        self.device.delete_texture(texture);
    }

    pub fn draw(&mut self, geometry: &GeometryBuffer) {
        if !geometry.is_empty() {
            self.device.draw(geometry);
        }
    }

    pub fn compile_list(&mut self, geometry: &[GeometryBuffer]) -> Result<ListId> {
        self.device.compile_list(geometry)
    }

    pub fn call_list(&mut self, list: ListId) {
        self.device.call_list(list);
    }

    pub fn delete_list(&mut self, list: ListId) {
        self.device.delete_list(list);
    }
}
