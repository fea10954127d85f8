//! Vecta GPU layer
//!
//! Everything between a normalized draw request and the physical device:
//!
//! - [`device`]: the device boundary trait and device constraints
//! - [`gpu`]: the state-deduplicating choke point every device call goes through
//! - [`tessellator`] / [`flatten`] / [`stroke`]: path to triangle conversion
//! - [`shape_cache`]: fast paths and precompiled draw lists for shapes
//! - [`texture_cache`] / [`tiling`]: image to texture mapping, oversized images
//! - [`clip`]: scissor, clip-plane and stencil clipping
//! - [`deletion`]: cross-thread deferred resource release
//! - [`headless`]: an in-memory reference device for tests and tooling

pub mod clip;
pub mod deletion;
pub mod device;
pub mod flatten;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub mod shape_cache;
pub mod state_cache;
pub mod stroke;
pub mod tessellator;
pub mod texture_cache;
pub mod tiling;

pub use clip::{ClipCompositor, ClipMechanism};
pub use deletion::DeletionQueue;
pub use device::{
    BlendMode, Capability, Device, DeviceError, DeviceLimits, ListId, LogicOp, StateAttr,
    StencilFunc, StencilOp, TextureDesc, TextureFormat, TextureId, TextureWrap, Topology,
};
pub use geometry::GeometryBuffer;
pub use gpu::{Gpu, StateStats};
pub use headless::{DeviceCounters, HeadlessDevice};
pub use shape_cache::{ShapeCache, ShapeCacheStats};
pub use state_cache::StateCache;
pub use tessellator::{
    Contour, GeometryCollector, TessVertex, TessellationError, TessellationVisitor, Tessellator,
};
pub use texture_cache::{CachedTexture, TextureCache, TextureCacheStats};
pub use tiling::{tile_image_draw, ImageTile};

pub type Result<T> = std::result::Result<T, DeviceError>;
