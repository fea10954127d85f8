//! In-memory reference device
//!
//! [`HeadlessDevice`] implements [`Device`] without any GPU. It counts every
//! call by kind and rasterizes into an RGBA8 framebuffer with an 8-bit
//! stencil so tests and tooling can observe exactly what the engine issued.
//! Sampling is nearest-neighbour at pixel centers; it is a measuring tool,
//! not a renderer.

use rustc_hash::FxHashMap;
use std::num::NonZeroU32;
use vecta_core::{Affine2D, IRect, Point};

use crate::device::{
    BlendMode, Capability, Device, DeviceError, DeviceLimits, ListId, LogicOp, StateAttr,
    StencilFunc, StencilOp, TextureDesc, TextureFormat, TextureId, TextureWrap,
};
use crate::geometry::GeometryBuffer;

/// Per-kind call counts
#[derive(Clone, Debug, Default)]
pub struct DeviceCounters {
    state_changes: FxHashMap<StateAttr, u64>,
    pub color_changes: u64,
    pub transform_sets: u64,
    pub transform_pushes: u64,
    pub draws: u64,
    pub vertices: u64,
    pub texture_creates: u64,
    pub texture_updates: u64,
    pub texture_deletes: u64,
    pub list_compiles: u64,
    pub list_calls: u64,
    pub list_deletes: u64,
    pub scissor_sets: u64,
    pub clip_plane_sets: u64,
    pub stencil_clears: u64,
}

impl DeviceCounters {
    /// `apply_state` calls for one attribute
    pub fn state_changes_for(&self, attr: StateAttr) -> u64 {
        self.state_changes.get(&attr).copied().unwrap_or(0)
    }

    /// `apply_state` calls across all attributes
    pub fn state_changes(&self) -> u64 {
        self.state_changes.values().sum()
    }
}

struct Texture {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<u8>,
}

impl Texture {
    /// Nearest texel at normalized coordinates, as RGBA in 0..1
    fn sample(&self, uv: [f32; 2], wrap: TextureWrap) -> [f32; 4] {
        let coord = |t: f32, size: u32| -> usize {
            let texel = (t * size as f32).floor() as i64;
            let texel = match wrap {
                TextureWrap::Repeat => texel.rem_euclid(size as i64),
                TextureWrap::Clamp => texel.clamp(0, size as i64 - 1),
            };
            texel as usize
        };
        let x = coord(uv[0], self.width);
        let y = coord(uv[1], self.height);
        let bpp = self.format.bytes_per_pixel();
        let i = (y * self.width as usize + x) * bpp;
        match self.format {
            TextureFormat::Rgba8 => {
                let p = &self.pixels[i..i + 4];
                [p[0], p[1], p[2], p[3]].map(|v| v as f32 / 255.0)
            }
            TextureFormat::Alpha8 => [1.0, 1.0, 1.0, self.pixels[i] as f32 / 255.0],
        }
    }
}

/// Device stand-in that rasterizes in memory
pub struct HeadlessDevice {
    width: u32,
    height: u32,
    limits: DeviceLimits,
    framebuffer: Vec<[u8; 4]>,
    stencil: Vec<u8>,
    state: FxHashMap<StateAttr, u32>,
    color: [f32; 4],
    transform: Affine2D,
    transform_stack: Vec<Affine2D>,
    scissor: IRect,
    clip_planes: FxHashMap<u8, [f32; 3]>,
    textures: FxHashMap<u32, Texture>,
    lists: FxHashMap<u32, Vec<GeometryBuffer>>,
    next_handle: u32,
    fail_allocations: bool,
    counters: DeviceCounters,
}

impl HeadlessDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_limits(width, height, DeviceLimits::default())
    }

    pub fn with_limits(width: u32, height: u32, limits: DeviceLimits) -> Self {
        let n = (width * height) as usize;
        Self {
            width,
            height,
            limits,
            framebuffer: vec![[0, 0, 0, 0]; n],
            stencil: vec![0; n],
            state: FxHashMap::default(),
            color: [0.0, 0.0, 0.0, 1.0],
            transform: Affine2D::IDENTITY,
            transform_stack: Vec::new(),
            scissor: IRect::from_size(width, height),
            clip_planes: FxHashMap::default(),
            textures: FxHashMap::default(),
            lists: FxHashMap::default(),
            next_handle: 1,
            fail_allocations: false,
            counters: DeviceCounters::default(),
        }
    }

    /// Make every subsequent texture allocation fail
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    pub fn counters(&self) -> &DeviceCounters {
        &self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = DeviceCounters::default();
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the framebuffer, leaving the stencil alone
    pub fn clear(&mut self, rgba: [u8; 4]) {
        self.framebuffer.fill(rgba);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.framebuffer[(y * self.width + x) as usize]
    }

    pub fn stencil_at(&self, x: u32, y: u32) -> u8 {
        self.stencil[(y * self.width + x) as usize]
    }

    /// Number of pixels for which `pred` holds
    pub fn count_pixels(&self, pred: impl Fn([u8; 4]) -> bool) -> usize {
        self.framebuffer.iter().filter(|p| pred(**p)).count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_lists(&self) -> usize {
        self.lists.len()
    }

    pub fn has_texture(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture.raw())
    }

    pub fn has_list(&self, list: ListId) -> bool {
        self.lists.contains_key(&list.0.get())
    }

    /// Size of a live texture
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(&texture.raw())
            .map(|t| (t.width, t.height))
    }

    fn next_handle(&mut self) -> NonZeroU32 {
        let raw = self.next_handle;
        self.next_handle += 1;
        NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN)
    }

    fn value(&self, attr: StateAttr) -> u32 {
        self.state
            .get(&attr)
            .copied()
            .unwrap_or_else(|| default_state(attr))
    }

    fn enabled(&self, cap: Capability) -> bool {
        self.value(StateAttr::Capability(cap)) != 0
    }

    fn rasterize(&mut self, geometry: &GeometryBuffer) {
        let device: Vec<Point> = geometry
            .positions()
            .iter()
            .map(|p| self.transform.transform_point(Point::new(p[0], p[1])))
            .collect();

        for tri in geometry.triangles() {
            self.fill_triangle(geometry, &device, tri, tri);
        }

        if !geometry.segments().is_empty() {
            let half = f32::from_bits(self.value(StateAttr::LineWidth)).max(1.0) * 0.5;
            for [i, j] in geometry.segments() {
                let (a, b) = (device[i], device[j]);
                let len = a.distance(b);
                if len <= f32::EPSILON {
                    continue;
                }
                let n = Point::new(-(b.y - a.y) / len * half, (b.x - a.x) / len * half);
                let quad = [
                    Point::new(a.x + n.x, a.y + n.y),
                    Point::new(b.x + n.x, b.y + n.y),
                    Point::new(b.x - n.x, b.y - n.y),
                    Point::new(a.x - n.x, a.y - n.y),
                ];
                let attrs = [i, j, j, i];
                self.fill_triangle(geometry, &quad, [0, 1, 2], [attrs[0], attrs[1], attrs[2]]);
                self.fill_triangle(geometry, &quad, [0, 2, 3], [attrs[0], attrs[2], attrs[3]]);
            }
        }

        if geometry.topology() == crate::device::Topology::Points {
            for (i, p) in device.iter().enumerate() {
                let (x, y) = (p.x.floor() as i64, p.y.floor() as i64);
                if x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64 {
                    self.shade(geometry, x as u32, y as u32, [i, i, i], [1.0, 0.0, 0.0]);
                }
            }
        }
    }

    /// Rasterize one triangle given device-space corners `pos[corner]` and
    /// the geometry vertices supplying attributes
    fn fill_triangle(
        &mut self,
        geometry: &GeometryBuffer,
        pos: &[Point],
        corner: [usize; 3],
        attr: [usize; 3],
    ) {
        let [a, mut b, mut c] = corner.map(|i| pos[i]);
        let mut attr = attr;
        let mut area = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
        if area.abs() <= f32::EPSILON {
            return;
        }
        if area < 0.0 {
            std::mem::swap(&mut b, &mut c);
            attr.swap(1, 2);
            area = -area;
        }
        let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as i64;
        let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as i64;
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min(self.width as i64 - 1);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min(self.height as i64 - 1);

        let edge = |p: Point, q: Point, x: f32, y: f32| {
            (q.x - p.x) * (y - p.y) - (x - p.x) * (q.y - p.y)
        };
        // A shared edge runs in opposite directions in its two triangles, so
        // exactly one of them owns the samples lying on it
        let owns = |p: Point, q: Point| q.y > p.y || (q.y == p.y && q.x > p.x);
        let own = [owns(b, c), owns(c, a), owns(a, b)];
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
                let w = [
                    edge(b, c, px, py) / area,
                    edge(c, a, px, py) / area,
                    edge(a, b, px, py) / area,
                ];
                let inside = (0..3).all(|k| w[k] > 0.0 || (w[k] == 0.0 && own[k]));
                if inside {
                    self.shade(geometry, x as u32, y as u32, attr, w);
                }
            }
        }
    }

    fn passes_clip(&self, x: u32, y: u32) -> bool {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        if self.enabled(Capability::ScissorTest) {
            let s = self.scissor;
            if (x as i64) < s.x as i64
                || (y as i64) < s.y as i64
                || x as i64 >= s.max_x()
                || y as i64 >= s.max_y()
            {
                return false;
            }
        }
        for (index, eq) in &self.clip_planes {
            let outside = eq[0] * px + eq[1] * py + eq[2] < 0.0;
            if outside && self.enabled(Capability::ClipPlane(*index)) {
                return false;
            }
        }
        true
    }

    /// Stencil test and update for one fragment
    fn stencil(&mut self, idx: usize) -> bool {
        if !self.enabled(Capability::StencilTest) {
            return true;
        }
        let reference = self.value(StateAttr::StencilRef);
        let mask = self.value(StateAttr::StencilFuncMask);
        let stored = self.stencil[idx] as u32;
        let pass = match StencilFunc::from_raw(self.value(StateAttr::StencilFunc)) {
            Some(StencilFunc::Never) => false,
            Some(StencilFunc::Equal) => (reference & mask) == (stored & mask),
            Some(StencilFunc::NotEqual) => (reference & mask) != (stored & mask),
            Some(StencilFunc::Always) | None => true,
        };
        if pass {
            let write = self.value(StateAttr::StencilWriteMask);
            let updated = match StencilOp::from_raw(self.value(StateAttr::StencilOp)) {
                Some(StencilOp::Replace) => reference,
                Some(StencilOp::Zero) => 0,
                Some(StencilOp::Invert) => !stored,
                Some(StencilOp::Keep) | None => stored,
            };
            self.stencil[idx] = ((stored & !write) | (updated & write)) as u8;
        }
        pass
    }

    fn shade(
        &mut self,
        geometry: &GeometryBuffer,
        x: u32,
        y: u32,
        attr: [usize; 3],
        weights: [f32; 3],
    ) {
        if !self.passes_clip(x, y) {
            return;
        }
        let idx = (y * self.width + x) as usize;
        if !self.stencil(idx) {
            return;
        }

        let mut src = match attr.map(|i| geometry.color(i)) {
            [Some(c0), Some(c1), Some(c2)] => {
                let mut c = [0.0; 4];
                for k in 0..4 {
                    c[k] = c0[k] * weights[0] + c1[k] * weights[1] + c2[k] * weights[2];
                }
                c
            }
            _ => self.color,
        };

        if self.enabled(Capability::Texture2D) {
            let bound = self.value(StateAttr::BoundTexture);
            let uv = match attr.map(|i| geometry.tex_coord(i)) {
                [Some(t0), Some(t1), Some(t2)] => Some([
                    t0[0] * weights[0] + t1[0] * weights[1] + t2[0] * weights[2],
                    t0[1] * weights[0] + t1[1] * weights[1] + t2[1] * weights[2],
                ]),
                _ => None,
            };
            let wrap = TextureWrap::from_raw(self.value(StateAttr::TextureWrap))
                .unwrap_or(TextureWrap::Clamp);
            if let (Some(texture), Some(uv)) = (self.textures.get(&bound), uv) {
                let texel = texture.sample(uv, wrap);
                for k in 0..4 {
                    src[k] *= texel[k];
                }
            }
        }

        let write_mask = self.value(StateAttr::ColorWriteMask);
        if write_mask == 0 {
            return;
        }
        let dst = self.framebuffer[idx].map(|v| v as f32 / 255.0);
        let out: [u8; 4] = if self.enabled(Capability::ColorLogicOp)
            && LogicOp::from_raw(self.value(StateAttr::LogicOp)) == Some(LogicOp::Xor)
        {
            let s = to_bytes(src);
            let d = self.framebuffer[idx];
            [s[0] ^ d[0], s[1] ^ d[1], s[2] ^ d[2], s[3] ^ d[3]]
        } else if self.enabled(Capability::Blend) {
            let mode = BlendMode::from_raw(self.value(StateAttr::BlendMode))
                .unwrap_or(BlendMode::SrcOver);
            let a = src[3];
            let mut o = [0.0; 4];
            for k in 0..4 {
                o[k] = match mode {
                    BlendMode::SrcOver => src[k] * a + dst[k] * (1.0 - a),
                    BlendMode::Src => src[k],
                    BlendMode::Clear => 0.0,
                    BlendMode::Add => (src[k] * a + dst[k]).min(1.0),
                };
            }
            // Alpha channel composites as plain source-over coverage
            if mode == BlendMode::SrcOver {
                o[3] = a + dst[3] * (1.0 - a);
            }
            to_bytes(o)
        } else {
            to_bytes(src)
        };

        let current = self.framebuffer[idx];
        let mut merged = current;
        for k in 0..4 {
            if write_mask & (1 << k) != 0 {
                merged[k] = out[k];
            }
        }
        self.framebuffer[idx] = merged;
    }
}

fn to_bytes(c: [f32; 4]) -> [u8; 4] {
    c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Device reset values, mirroring a freshly created fixed-function context
fn default_state(attr: StateAttr) -> u32 {
    match attr {
        StateAttr::Capability(_) => 0,
        StateAttr::BlendMode => BlendMode::SrcOver.raw(),
        StateAttr::LogicOp => LogicOp::Copy.raw(),
        StateAttr::StencilFunc => StencilFunc::Always.raw(),
        StateAttr::StencilRef => 0,
        StateAttr::StencilFuncMask => 0xFF,
        StateAttr::StencilOp => StencilOp::Keep.raw(),
        StateAttr::StencilWriteMask => 0xFF,
        StateAttr::ColorWriteMask => 0xF,
        StateAttr::DepthWriteMask => 1,
        StateAttr::BoundTexture => 0,
        StateAttr::TextureWrap => TextureWrap::Clamp.raw(),
        StateAttr::LineWidth => 1.0f32.to_bits(),
    }
}

impl Device for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn apply_state(&mut self, attr: StateAttr, value: u32) {
        *self.counters.state_changes.entry(attr).or_default() += 1;
        self.state.insert(attr, value);
    }

    fn query_state(&self, attr: StateAttr) -> u32 {
        self.value(attr)
    }

    fn set_color(&mut self, rgba: [f32; 4]) {
        self.counters.color_changes += 1;
        self.color = rgba;
    }

    fn set_transform(&mut self, transform: &Affine2D) {
        self.counters.transform_sets += 1;
        self.transform = *transform;
    }

    fn push_transform(&mut self, local: &Affine2D) {
        self.counters.transform_pushes += 1;
        self.transform_stack.push(self.transform);
        self.transform = self.transform.pre(local);
    }

    fn pop_transform(&mut self) {
        if let Some(t) = self.transform_stack.pop() {
            self.transform = t;
        }
    }

    fn set_scissor(&mut self, rect: IRect) {
        self.counters.scissor_sets += 1;
        self.scissor = rect;
    }

    fn set_clip_plane(&mut self, index: u8, equation: [f32; 3]) {
        self.counters.clip_plane_sets += 1;
        self.clip_planes.insert(index, equation);
    }

    fn clear_stencil(&mut self, mask: u32, bounds: Option<IRect>) {
        self.counters.stencil_clears += 1;
        let keep = !(mask as u8);
        let full = IRect::from_size(self.width, self.height);
        let region = bounds.unwrap_or(full);
        let x0 = region.x.max(0) as u32;
        let y0 = region.y.max(0) as u32;
        let x1 = region.max_x().min(self.width as i64).max(0) as u32;
        let y1 = region.max_y().min(self.height as i64).max(0) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                self.stencil[(y * self.width + x) as usize] &= keep;
            }
        }
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<TextureId, DeviceError> {
        let max = self.limits.max_texture_size;
        if self.fail_allocations
            || desc.width == 0
            || desc.height == 0
            || desc.width > max
            || desc.height > max
        {
            return Err(DeviceError::TextureAllocation {
                width: desc.width,
                height: desc.height,
            });
        }
        let expected = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(DeviceError::InvalidTextureUpdate {
                region: IRect::from_size(desc.width, desc.height),
                width: desc.width,
                height: desc.height,
            });
        }
        self.counters.texture_creates += 1;
        let handle = self.next_handle();
        self.textures.insert(
            handle.get(),
            Texture {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                pixels: pixels.to_vec(),
            },
        );
        // Creation binds the new texture
        self.state.insert(StateAttr::BoundTexture, handle.get());
        Ok(TextureId(handle))
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        region: IRect,
        pixels: &[u8],
    ) -> Result<(), DeviceError> {
        let tex = self
            .textures
            .get_mut(&texture.raw())
            .ok_or(DeviceError::UnknownTexture(texture))?;
        let bpp = tex.format.bytes_per_pixel();
        let fits = IRect::from_size(tex.width, tex.height).contains_rect(&region)
            && pixels.len() == region.width as usize * region.height as usize * bpp;
        if !fits {
            return Err(DeviceError::InvalidTextureUpdate {
                region,
                width: tex.width,
                height: tex.height,
            });
        }
        let row = region.width as usize * bpp;
        for r in 0..region.height as usize {
            let dst = ((region.y as usize + r) * tex.width as usize + region.x as usize) * bpp;
            tex.pixels[dst..dst + row].copy_from_slice(&pixels[r * row..(r + 1) * row]);
        }
        self.counters.texture_updates += 1;
        self.state.insert(StateAttr::BoundTexture, texture.raw());
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture.raw()).is_some() {
            self.counters.texture_deletes += 1;
        }
        if self.value(StateAttr::BoundTexture) == texture.raw() {
            self.state.insert(StateAttr::BoundTexture, 0);
        }
    }

    fn draw(&mut self, geometry: &GeometryBuffer) {
        self.counters.draws += 1;
        self.counters.vertices += geometry.vertex_count() as u64;
        self.rasterize(geometry);
    }

    fn compile_list(&mut self, geometry: &[GeometryBuffer]) -> Result<ListId, DeviceError> {
        self.counters.list_compiles += 1;
        let handle = self.next_handle();
        self.lists.insert(handle.get(), geometry.to_vec());
        Ok(ListId(handle))
    }

    fn call_list(&mut self, list: ListId) {
        self.counters.list_calls += 1;
        if let Some(buffers) = self.lists.remove(&list.0.get()) {
            for buffer in &buffers {
                self.rasterize(buffer);
            }
            self.lists.insert(list.0.get(), buffers);
        }
    }

    fn delete_list(&mut self, list: ListId) {
        if self.lists.remove(&list.0.get()).is_some() {
            self.counters.list_deletes += 1;
        }
    }
}
