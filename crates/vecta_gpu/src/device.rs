//! Device boundary
//!
//! The engine drives a fixed-function style device through [`Device`]. Only
//! [`crate::gpu::Gpu`] holds one; every other component talks to the `Gpu`
//! so that state changes are mirrored and deduplicated.

use std::num::NonZeroU32;

use thiserror::Error;
use vecta_core::{Affine2D, IRect};

use crate::geometry::GeometryBuffer;

/// Device errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("texture allocation failed for {width}x{height}")]
    TextureAllocation { width: u32, height: u32 },

    #[error("texture {0:?} does not exist")]
    UnknownTexture(TextureId),

    #[error("texture update {region:?} does not fit a {width}x{height} texture")]
    InvalidTextureUpdate {
        region: IRect,
        width: u32,
        height: u32,
    },

    #[error("draw list compilation failed: {0}")]
    ListCompilation(String),
}

/// A device texture handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub NonZeroU32);

impl TextureId {
    /// Raw value as mirrored by the state cache (0 means "nothing bound")
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// A precompiled draw list handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListId(pub NonZeroU32);

/// Primitive topology of a vertex stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    /// A convex polygon, rasterized like a fan
    Polygon,
}

impl Topology {
    pub fn is_triangles(self) -> bool {
        matches!(
            self,
            Topology::Triangles
                | Topology::TriangleStrip
                | Topology::TriangleFan
                | Topology::Polygon
        )
    }
}

/// Boolean device features
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    Texture2D,
    StencilTest,
    ScissorTest,
    ClipPlane(u8),
    LineSmooth,
    Multisample,
    ColorLogicOp,
}

/// Mirrored device attributes
///
/// Values are raw `u32`s: enums use their `raw()` encoding, booleans are
/// `0`/`1`, line width is the `f32` bit pattern and textures use
/// [`TextureId::raw`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateAttr {
    Capability(Capability),
    BlendMode,
    LogicOp,
    StencilFunc,
    StencilRef,
    StencilFuncMask,
    StencilOp,
    StencilWriteMask,
    ColorWriteMask,
    DepthWriteMask,
    BoundTexture,
    TextureWrap,
    LineWidth,
}

macro_rules! raw_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn raw(self) -> u32 {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $(v if v == $value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

raw_enum!(
    /// Fixed blend equations
    BlendMode {
        SrcOver = 1,
        Src = 2,
        Clear = 3,
        Add = 4,
    }
);

raw_enum!(
    /// Color logic operations
    LogicOp {
        Copy = 1,
        Xor = 2,
    }
);

raw_enum!(
    /// Stencil comparison: passes when `(ref & mask) <op> (stencil & mask)`
    StencilFunc {
        Always = 1,
        Never = 2,
        Equal = 3,
        NotEqual = 4,
    }
);

raw_enum!(
    /// Stencil update applied to passing fragments
    StencilOp {
        Keep = 1,
        Replace = 2,
        Zero = 3,
        Invert = 4,
    }
);

raw_enum!(
    /// Texture coordinate addressing
    TextureWrap {
        Clamp = 1,
        Repeat = 2,
    }
);

/// Texel layout of a device texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    /// Single coverage channel, modulates the current color
    Alpha8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::Alpha8 => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Constraints queried once when the engine is created
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceLimits {
    pub max_texture_size: u32,
    pub line_width_range: (f32, f32),
    pub line_width_granularity: f32,
    pub stencil_bits: u8,
    pub max_clip_planes: u8,
    pub multisample: bool,
    /// Native support for non-power-of-two repeating textures
    pub npot_textures: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            line_width_range: (1.0, 10.0),
            line_width_granularity: 0.125,
            stencil_bits: 8,
            max_clip_planes: 6,
            multisample: false,
            npot_textures: false,
        }
    }
}

/// The physical device context
///
/// Implementations are driven from a single render thread. Texture creation
/// and update may disturb the bound texture; callers must treat it as unknown
/// afterwards.
pub trait Device {
    fn limits(&self) -> DeviceLimits;

    /// Apply one attribute value (see [`StateAttr`] for encodings)
    fn apply_state(&mut self, attr: StateAttr, value: u32);

    /// Read back the actual attribute value (used by state audits)
    fn query_state(&self, attr: StateAttr) -> u32;

    fn set_color(&mut self, rgba: [f32; 4]);

    /// Replace the current transform
    fn set_transform(&mut self, transform: &Affine2D);

    /// Save the current transform and pre-multiply `local` onto it
    fn push_transform(&mut self, local: &Affine2D);

    fn pop_transform(&mut self);

    /// Scissor box in device pixels (effective while `ScissorTest` is enabled)
    fn set_scissor(&mut self, rect: IRect);

    /// Half-space `a*x + b*y + c >= 0` in device pixels
    fn set_clip_plane(&mut self, index: u8, equation: [f32; 3]);

    /// Zero the stencil bits in `mask`, optionally only inside `bounds`
    fn clear_stencil(&mut self, mask: u32, bounds: Option<IRect>);

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<TextureId, DeviceError>;

    fn update_texture(
        &mut self,
        texture: TextureId,
        region: IRect,
        pixels: &[u8],
    ) -> Result<(), DeviceError>;

    fn delete_texture(&mut self, texture: TextureId);

    fn draw(&mut self, geometry: &GeometryBuffer);

    /// Retain geometry as a replayable draw list
    fn compile_list(&mut self, geometry: &[GeometryBuffer]) -> Result<ListId, DeviceError>;

    fn call_list(&mut self, list: ListId);

    fn delete_list(&mut self, list: ListId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        for mode in [BlendMode::SrcOver, BlendMode::Src, BlendMode::Clear, BlendMode::Add] {
            assert_eq!(BlendMode::from_raw(mode.raw()), Some(mode));
        }
        assert_eq!(StencilFunc::from_raw(0), None);
    }
}
