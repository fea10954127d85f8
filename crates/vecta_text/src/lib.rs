//! Vecta text rendering
//!
//! Glyphs are drawn with one of three strategies, chosen per draw call:
//!
//! - **TextureAtlas**: coverage bitmaps packed into an alpha texture per
//!   (face, pixel size); cheapest when a size stays fixed
//! - **ExactOutline**: each glyph outline tessellated once per font and
//!   replayed from a precompiled draw list
//! - **RoughOutline**: outlines tessellated at the next bucket size in a
//!   geometric sequence and scaled down, memoized in a bounded LRU; suited
//!   to continuously rescaled text
//!
//! Each strategy owns its cache. Switching strategies leaves the other caches
//! untouched.

pub mod atlas;
pub mod exact;
pub mod outline;
pub mod renderer;
pub mod rough;
pub mod strategy;
pub mod ttf;

pub use atlas::{AtlasCache, AtlasStats};
pub use exact::ExactOutlineCache;
pub use renderer::{layout_text, FontRenderer, PositionedGlyph, TextRun};
pub use rough::{RoughCacheStats, RoughGlyph, RoughOutlineCache, SizeBuckets};
pub use strategy::{select_strategy, FontStrategy, RenderingHints, StrategyHint};
pub use ttf::TtfFace;

use thiserror::Error;
use vecta_gpu::DeviceError;

/// Text rendering errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to parse font: {0}")]
    FontParse(String),

    #[error("Glyph not found for codepoint: {0}")]
    GlyphNotFound(char),

    #[error("Atlas is full, cannot allocate glyph")]
    AtlasFull,

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

pub type Result<T> = std::result::Result<T, TextError>;
