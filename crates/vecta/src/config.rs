//! Engine configuration
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable                      | Field                  |
//! |-------------------------------|------------------------|
//! | `VECTA_TOLERANCE`             | `tolerance`            |
//! | `VECTA_ROUGH_CACHE_CAPACITY`  | `rough_cache_capacity` |
//! | `VECTA_ROUGH_RATIO`           | `rough_ratio`          |
//! | `VECTA_STATE_AUDIT`           | `state_audit`          |
//! | `VECTA_ATLAS_MAX_PX`          | `atlas_max_px`         |

use crate::error::{EngineError, Result};

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
}

fn env_f32(name: &str) -> Option<f32> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_bool(&v))
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration for creating a [`crate::RenderEngine`]
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Curve flattening tolerance in device pixels
    pub tolerance: f32,
    /// Maximum rough-outline glyph entries before LRU eviction
    pub rough_cache_capacity: usize,
    /// Smallest rough-outline bucket, in pixels
    pub rough_min_px: f32,
    /// Largest rough-outline bucket, in pixels
    pub rough_max_px: f32,
    /// Growth ratio between consecutive buckets
    pub rough_ratio: f32,
    /// Largest device pixel size rendered through the glyph atlas
    pub atlas_max_px: f32,
    /// Verify every elided state change against the device (panics on desync)
    pub state_audit: bool,
    /// Initial fast-shapes hint
    pub fast_shapes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: vecta_gpu::shape_cache::DEFAULT_TOLERANCE,
            rough_cache_capacity: 512,
            rough_min_px: 4.0,
            rough_max_px: 512.0,
            rough_ratio: 1.2,
            atlas_max_px: 48.0,
            state_audit: false,
            fast_shapes: false,
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `VECTA_*` overrides, clamped to usable ranges
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(tolerance) = env_f32("VECTA_TOLERANCE") {
            self.tolerance = tolerance.clamp(0.01, 16.0);
        }
        if let Some(capacity) = env_usize("VECTA_ROUGH_CACHE_CAPACITY") {
            self.rough_cache_capacity = capacity.clamp(1, 1 << 20);
        }
        if let Some(ratio) = env_f32("VECTA_ROUGH_RATIO") {
            self.rough_ratio = ratio.clamp(1.01, 4.0);
        }
        if let Some(audit) = env_bool("VECTA_STATE_AUDIT") {
            self.state_audit = audit;
        }
        if let Some(px) = env_f32("VECTA_ATLAS_MAX_PX") {
            self.atlas_max_px = px.clamp(0.0, 256.0);
        }
        tracing::info!(
            "engine config: tolerance={}px, rough={} ({}..{}px x{}), atlas<={}px, audit={}",
            self.tolerance,
            self.rough_cache_capacity,
            self.rough_min_px,
            self.rough_max_px,
            self.rough_ratio,
            self.atlas_max_px,
            self.state_audit
        );
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            return Err(EngineError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.rough_ratio.is_nan() || self.rough_ratio <= 1.0 {
            return Err(EngineError::Config(format!(
                "rough bucket ratio must exceed 1, got {}",
                self.rough_ratio
            )));
        }
        if self.rough_min_px.is_nan()
            || self.rough_min_px <= 0.0
            || self.rough_max_px < self.rough_min_px
        {
            return Err(EngineError::Config(format!(
                "invalid rough bucket range {}..{}",
                self.rough_min_px, self.rough_max_px
            )));
        }
        if self.rough_cache_capacity == 0 {
            return Err(EngineError::Config("rough cache capacity is zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rough_ratio, 1.2);
        assert_eq!(config.tolerance, 0.25);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_ratio = EngineConfig {
            rough_ratio: 1.0,
            ..Default::default()
        };
        assert!(matches!(bad_ratio.validate(), Err(EngineError::Config(_))));

        let bad_tolerance = EngineConfig {
            tolerance: f32::NAN,
            ..Default::default()
        };
        assert!(bad_tolerance.validate().is_err());

        let bad_range = EngineConfig {
            rough_min_px: 64.0,
            rough_max_px: 8.0,
            ..Default::default()
        };
        assert!(bad_range.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
