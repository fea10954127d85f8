//! Strategy selection

/// Glyph rendering strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontStrategy {
    TextureAtlas,
    ExactOutline,
    RoughOutline,
}

/// Host preference for glyph rendering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StrategyHint {
    /// Atlas in fast-shapes mode when it fits, exact outlines otherwise
    #[default]
    Auto,
    TextureAtlas,
    ExactOutline,
    /// Size-bucketed outlines for animated or continuously zoomed text
    RoughOutline,
}

/// Rendering-quality hints settable by the host
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderingHints {
    pub strategy: StrategyHint,
    /// Favor speed over fidelity (atlas text, convex fast paths)
    pub fast_shapes: bool,
}

/// Pick the strategy for one draw
///
/// `atlas_fits` is whether the atlas can hold the font at the requested
/// device size. An atlas request that does not fit falls back to exact
/// outlines.
pub fn select_strategy(hints: &RenderingHints, atlas_fits: bool) -> FontStrategy {
    match hints.strategy {
        StrategyHint::RoughOutline => FontStrategy::RoughOutline,
        StrategyHint::ExactOutline => FontStrategy::ExactOutline,
        StrategyHint::TextureAtlas if atlas_fits => FontStrategy::TextureAtlas,
        StrategyHint::Auto if hints.fast_shapes && atlas_fits => FontStrategy::TextureAtlas,
        StrategyHint::TextureAtlas | StrategyHint::Auto => FontStrategy::ExactOutline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_table() {
        let auto = RenderingHints::default();
        assert_eq!(select_strategy(&auto, true), FontStrategy::ExactOutline);

        let fast = RenderingHints {
            fast_shapes: true,
            ..auto
        };
        assert_eq!(select_strategy(&fast, true), FontStrategy::TextureAtlas);
        assert_eq!(select_strategy(&fast, false), FontStrategy::ExactOutline);

        let rough = RenderingHints {
            strategy: StrategyHint::RoughOutline,
            fast_shapes: true,
        };
        assert_eq!(select_strategy(&rough, true), FontStrategy::RoughOutline);

        let atlas = RenderingHints {
            strategy: StrategyHint::TextureAtlas,
            fast_shapes: false,
        };
        assert_eq!(select_strategy(&atlas, true), FontStrategy::TextureAtlas);
        assert_eq!(select_strategy(&atlas, false), FontStrategy::ExactOutline);
    }
}
