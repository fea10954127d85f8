//! Font sources and sized font instances
//!
//! The engine never parses font files itself at this layer. Anything that can
//! map characters to glyphs, report advances and hand out outlines implements
//! [`GlyphSource`]; a [`FontFace`] gives such a source an identity, and a
//! [`Font`] pins a face to a size.

use std::fmt;
use std::sync::Arc;

use crate::id::ResourceId;
use crate::path::Path;

/// Glyph index within a face
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u16);

/// A coverage bitmap for one glyph
#[derive(Clone, Debug, Default)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the left edge, in pixels
    pub left: i32,
    /// Offset from the baseline up to the top edge, in pixels
    pub top: i32,
    /// One coverage byte per pixel, rows top first
    pub coverage: Vec<u8>,
}

/// Source of glyph metrics and outlines, in font units (y up)
pub trait GlyphSource: Send + Sync {
    fn units_per_em(&self) -> u16;

    fn glyph_index(&self, c: char) -> Option<GlyphId>;

    /// Horizontal advance in font units
    fn advance(&self, glyph: GlyphId) -> f32;

    /// Outline in font units with y pointing up, `None` for empty glyphs
    fn outline(&self, glyph: GlyphId) -> Option<Path>;

    /// Rasterize a glyph at `pixel_size` for atlas use
    fn rasterize(&self, _glyph: GlyphId, _pixel_size: f32) -> Option<GlyphBitmap> {
        None
    }

    /// Ascender in font units
    fn ascent(&self) -> f32 {
        self.units_per_em() as f32 * 0.8
    }

    /// Descender in font units (negative below the baseline)
    fn descent(&self) -> f32 {
        -(self.units_per_em() as f32 * 0.2)
    }

    fn family_name(&self) -> &str {
        "unknown"
    }
}

/// A glyph source with an identity
///
/// Faces are handles: clones share the source and the identity.
#[derive(Clone)]
pub struct FontFace {
    id: ResourceId,
    source: Arc<dyn GlyphSource>,
}

impl FontFace {
    pub fn new(source: Arc<dyn GlyphSource>) -> Self {
        Self {
            id: ResourceId::next(),
            source,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn source(&self) -> &dyn GlyphSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("id", &self.id)
            .field("family", &self.source.family_name())
            .finish()
    }
}

/// A face at a specific size
#[derive(Clone, Debug)]
pub struct Font {
    id: ResourceId,
    face: FontFace,
    size: f32,
}

impl Font {
    pub fn new(face: FontFace, size: f32) -> Self {
        Self {
            id: ResourceId::next(),
            face,
            size: size.max(0.0),
        }
    }

    /// Same face at another size (new identity)
    pub fn with_size(&self, size: f32) -> Self {
        Self::new(self.face.clone(), size)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Font units to user units
    pub fn scale(&self) -> f32 {
        self.size / self.face.source().units_per_em().max(1) as f32
    }

    /// Advance of a glyph in user units
    pub fn advance(&self, glyph: GlyphId) -> f32 {
        self.face.source().advance(glyph) * self.scale()
    }
}
