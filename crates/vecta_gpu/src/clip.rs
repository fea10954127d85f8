//! Clip compositing
//!
//! Three mechanisms, at most one active at a time:
//!
//! - scissor for rectangles whose transform keeps them axis aligned
//! - four half-space clip planes for rectangles under any other transform
//! - stencil bit-planes for arbitrary shapes; each clip region owns one bit
//!   and enabling a mask requires every bit in it (AND composition)

use vecta_core::{Affine2D, IRect, Rect};

use crate::device::{Capability, Device, StencilFunc, StencilOp};
use crate::gpu::Gpu;

/// Planes used by the rectangle half-space path
const RECT_PLANES: u8 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipMechanism {
    #[default]
    None,
    Scissor,
    Planes,
    Stencil,
}

#[derive(Debug, Default)]
pub struct ClipCompositor {
    mechanism: ClipMechanism,
    /// Stencil bits currently required to pass
    active_mask: u32,
    /// Plane being written, between `begin_write_plane` and `end_write_plane`
    writing: Option<u32>,
}

impl ClipCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mechanism(&self) -> ClipMechanism {
        self.mechanism
    }

    pub fn active_mask(&self) -> u32 {
        self.active_mask
    }

    pub fn is_writing(&self) -> bool {
        self.writing.is_some()
    }

    /// Turn off the active mechanism if it differs from `next`
    fn switch_to<D: Device>(&mut self, gpu: &mut Gpu<D>, next: ClipMechanism) {
        if self.mechanism == next {
            return;
        }
        match self.mechanism {
            ClipMechanism::None => {}
            ClipMechanism::Scissor => {
                gpu.disable(Capability::ScissorTest);
            }
            ClipMechanism::Planes => {
                for i in 0..RECT_PLANES {
                    gpu.disable(Capability::ClipPlane(i));
                }
            }
            ClipMechanism::Stencil => {
                gpu.disable(Capability::StencilTest);
                self.active_mask = 0;
            }
        }
        tracing::trace!("clip mechanism {:?} -> {:?}", self.mechanism, next);
        self.mechanism = next;
    }

    /// Disable all clipping
    pub fn reset<D: Device>(&mut self, gpu: &mut Gpu<D>) {
        if self.writing.is_some() {
            self.end_write_plane(gpu);
        }
        self.switch_to(gpu, ClipMechanism::None);
    }

    /// Clip to `rect` in user space under `transform` without the stencil
    ///
    /// Returns `false` when the device has too few clip planes for a
    /// non-axis-aligned rectangle; the caller must write a stencil plane.
    pub fn clip_rect<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        rect: Rect,
        transform: &Affine2D,
    ) -> bool {
        if transform.preserves_axes() {
            let bounds = transform.transform_rect_bounds(&rect);
            let x0 = bounds.x.round();
            let y0 = bounds.y.round();
            let x1 = bounds.max_x().round().max(x0);
            let y1 = bounds.max_y().round().max(y0);
            self.switch_to(gpu, ClipMechanism::Scissor);
            gpu.set_scissor(IRect::new(
                x0 as i32,
                y0 as i32,
                (x1 - x0) as u32,
                (y1 - y0) as u32,
            ));
            gpu.enable(Capability::ScissorTest);
            return true;
        }

        if transform.is_similarity() {
            tracing::trace!("rotated clip rect {:?} needs clip planes", rect);
        } else {
            tracing::trace!("sheared clip rect {:?} needs clip planes", rect);
        }
        if gpu.limits().max_clip_planes < RECT_PLANES {
            return false;
        }
        let corners = rect.corners().map(|p| transform.transform_point(p));
        let twice_area: f32 = (0..4)
            .map(|i| {
                let (p, q) = (corners[i], corners[(i + 1) % 4]);
                p.x * q.y - q.x * p.y
            })
            .sum();
        let s = if twice_area < 0.0 { -1.0 } else { 1.0 };

        self.switch_to(gpu, ClipMechanism::Planes);
        for i in 0..4 {
            let (p, q) = (corners[i], corners[(i + 1) % 4]);
            let (dx, dy) = (q.x - p.x, q.y - p.y);
            let equation = [-s * dy, s * dx, s * (dy * p.x - dx * p.y)];
            gpu.set_clip_plane(i as u8, equation);
            gpu.enable(Capability::ClipPlane(i as u8));
        }
        true
    }

    /// Start writing the stencil plane(s) in `mask`
    ///
    /// Color and depth writes are off until [`Self::end_write_plane`]; the
    /// plane is cleared (only inside `bounds` when given) and whatever is
    /// drawn next marks exactly the pixels it covers.
    pub fn begin_write_plane<D: Device>(
        &mut self,
        gpu: &mut Gpu<D>,
        mask: u32,
        bounds: Option<IRect>,
    ) {
        self.switch_to(gpu, ClipMechanism::Stencil);
        gpu.enable(Capability::StencilTest);
        gpu.set_color_write(false);
        gpu.set_depth_write(false);
        gpu.clear_stencil(mask, bounds);
        // Writing a plane must not be restricted by the plane itself
        self.active_mask &= !mask;
        gpu.set_stencil_func(StencilFunc::Always, mask, mask);
        gpu.set_stencil_op(StencilOp::Replace);
        gpu.set_stencil_write_mask(mask);
        self.writing = Some(mask);
    }

    pub fn end_write_plane<D: Device>(&mut self, gpu: &mut Gpu<D>) {
        if self.writing.take().is_none() {
            tracing::warn!("end_write_plane without begin_write_plane");
            return;
        }
        gpu.set_color_write(true);
        gpu.set_depth_write(true);
        gpu.set_stencil_op(StencilOp::Keep);
        gpu.set_stencil_write_mask(0);
        self.apply_stencil_test(gpu);
    }

    /// Require every bit of `mask` (in addition to already enabled planes)
    pub fn enable_clipping<D: Device>(&mut self, gpu: &mut Gpu<D>, mask: u32) {
        self.switch_to(gpu, ClipMechanism::Stencil);
        self.active_mask |= mask;
        self.apply_stencil_test(gpu);
    }

    pub fn disable_clipping<D: Device>(&mut self, gpu: &mut Gpu<D>, mask: u32) {
        if self.mechanism != ClipMechanism::Stencil {
            return;
        }
        self.active_mask &= !mask;
        self.apply_stencil_test(gpu);
    }

    fn apply_stencil_test<D: Device>(&mut self, gpu: &mut Gpu<D>) {
        if self.active_mask == 0 {
            if self.writing.is_none() {
                gpu.disable(Capability::StencilTest);
            }
            return;
        }
        gpu.enable(Capability::StencilTest);
        gpu.set_stencil_func(StencilFunc::Equal, self.active_mask, self.active_mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Topology;
    use crate::geometry::GeometryBuffer;
    use crate::headless::HeadlessDevice;

    fn quad(rect: Rect) -> GeometryBuffer {
        GeometryBuffer::from_points(Topology::TriangleFan, rect.corners())
    }

    fn lit(gpu: &Gpu<HeadlessDevice>) -> usize {
        gpu.device().count_pixels(|p| p[3] == 255)
    }

    #[test]
    fn test_scissor_for_axis_aligned() {
        let mut gpu = Gpu::new(HeadlessDevice::new(32, 32));
        let mut clip = ClipCompositor::new();
        gpu.set_color([1.0; 4]);
        let t = Affine2D::scale(2.0, 2.0);
        assert!(clip.clip_rect(&mut gpu, Rect::new(1.0, 1.0, 4.0, 3.0), &t));
        assert_eq!(clip.mechanism(), ClipMechanism::Scissor);
        gpu.draw(&quad(Rect::new(0.0, 0.0, 32.0, 32.0)));
        assert_eq!(lit(&gpu), 8 * 6);
    }

    #[test]
    fn test_planes_for_rotation() {
        let mut gpu = Gpu::new(HeadlessDevice::new(64, 64));
        let mut clip = ClipCompositor::new();
        gpu.set_color([1.0; 4]);
        let t = Affine2D::rotate(std::f32::consts::FRAC_PI_4)
            .then(&Affine2D::translate(32.0, 32.0));
        assert!(clip.clip_rect(&mut gpu, Rect::new(-10.0, -10.0, 20.0, 20.0), &t));
        assert_eq!(clip.mechanism(), ClipMechanism::Planes);
        gpu.draw(&quad(Rect::new(0.0, 0.0, 64.0, 64.0)));
        let n = lit(&gpu) as f32;
        assert!((n - 400.0).abs() <= 20.0, "covered {n}");

        // Switching to scissor turns the planes off
        clip.clip_rect(&mut gpu, Rect::new(0.0, 0.0, 64.0, 64.0), &Affine2D::IDENTITY);
        assert_eq!(gpu.state().is_enabled(Capability::ClipPlane(0)), Some(false));
    }

    #[test]
    fn test_too_few_planes_defers_to_stencil() {
        let limits = crate::device::DeviceLimits {
            max_clip_planes: 2,
            ..Default::default()
        };
        let mut gpu = Gpu::new(HeadlessDevice::with_limits(8, 8, limits));
        let mut clip = ClipCompositor::new();
        assert!(!clip.clip_rect(&mut gpu, Rect::new(0.0, 0.0, 4.0, 4.0), &Affine2D::rotate(0.3)));
        assert_eq!(clip.mechanism(), ClipMechanism::None);
    }

    #[test]
    fn test_stencil_planes_intersect() {
        let mut gpu = Gpu::new(HeadlessDevice::new(20, 20));
        let mut clip = ClipCompositor::new();
        gpu.set_color([1.0; 4]);

        clip.begin_write_plane(&mut gpu, 0b01, None);
        gpu.draw(&quad(Rect::new(0.0, 0.0, 10.0, 20.0)));
        clip.end_write_plane(&mut gpu);
        assert_eq!(lit(&gpu), 0);

        clip.begin_write_plane(&mut gpu, 0b10, None);
        gpu.draw(&GeometryBuffer::from_points(
            Topology::TriangleFan,
            Rect::new(5.0, 0.0, 15.0, 10.0).corners(),
        ));
        clip.end_write_plane(&mut gpu);

        clip.enable_clipping(&mut gpu, 0b11);
        gpu.draw(&quad(Rect::new(0.0, 0.0, 20.0, 20.0)));
        assert_eq!(lit(&gpu), 5 * 10);

        // Dropping one plane widens the visible region
        gpu.device_mut().clear([0, 0, 0, 0]);
        clip.disable_clipping(&mut gpu, 0b10);
        gpu.draw(&quad(Rect::new(0.0, 0.0, 20.0, 20.0)));
        assert_eq!(lit(&gpu), 10 * 20);

        clip.reset(&mut gpu);
        assert_eq!(gpu.state().is_enabled(Capability::StencilTest), Some(false));
    }
}
