//! Mirror of device state
//!
//! Each attribute is either known (the last value set through this mirror) or
//! unknown. Unknown attributes always report a change so the real device call
//! is issued.

use rustc_hash::FxHashMap;

use crate::device::{Capability, StateAttr};

#[derive(Debug, Default)]
pub struct StateCache {
    values: FxHashMap<StateAttr, u32>,
    /// Last color, kept out of the map since it changes on nearly every draw
    color: Option<[f32; 4]>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `attr`, returning whether it differs from the mirror
    ///
    /// The mirror holds `value` afterwards either way.
    pub fn set_state(&mut self, attr: StateAttr, value: u32) -> bool {
        self.values.insert(attr, value) != Some(value)
    }

    pub fn enable(&mut self, cap: Capability) -> bool {
        self.set_state(StateAttr::Capability(cap), 1)
    }

    pub fn disable(&mut self, cap: Capability) -> bool {
        self.set_state(StateAttr::Capability(cap), 0)
    }

    /// Mirrored value, `None` when unknown
    pub fn get(&self, attr: StateAttr) -> Option<u32> {
        self.values.get(&attr).copied()
    }

    pub fn is_enabled(&self, cap: Capability) -> Option<bool> {
        self.get(StateAttr::Capability(cap)).map(|v| v != 0)
    }

    pub fn set_color(&mut self, rgba: [f32; 4]) -> bool {
        if self.color == Some(rgba) {
            return false;
        }
        self.color = Some(rgba);
        true
    }

    pub fn color(&self) -> Option<[f32; 4]> {
        self.color
    }

    /// Mark one attribute unknown
    pub fn forget(&mut self, attr: StateAttr) {
        self.values.remove(&attr);
    }

    /// Mark everything unknown
    pub fn invalidate(&mut self) {
        self.values.clear();
        self.color = None;
    }

    pub fn known_count(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_only_on_transition() {
        let mut cache = StateCache::new();
        let attr = StateAttr::StencilWriteMask;
        let sequence = [1, 1, 2, 2, 2, 1, 1, 3];
        let changes = sequence
            .iter()
            .filter(|v| cache.set_state(attr, **v))
            .count();
        // unknown -> 1, 1 -> 2, 2 -> 1, 1 -> 3
        assert_eq!(changes, 4);
        assert_eq!(cache.get(attr), Some(3));
    }

    #[test]
    fn test_enable_disable_sugar() {
        let mut cache = StateCache::new();
        assert!(cache.enable(Capability::Blend));
        assert!(!cache.enable(Capability::Blend));
        assert!(cache.disable(Capability::Blend));
        assert_eq!(cache.is_enabled(Capability::Blend), Some(false));
    }

    #[test]
    fn test_forget_and_invalidate() {
        let mut cache = StateCache::new();
        cache.set_state(StateAttr::BoundTexture, 4);
        cache.forget(StateAttr::BoundTexture);
        assert!(cache.set_state(StateAttr::BoundTexture, 4));

        assert!(cache.set_color([1.0, 0.0, 0.0, 1.0]));
        assert!(!cache.set_color([1.0, 0.0, 0.0, 1.0]));
        cache.invalidate();
        assert!(cache.set_color([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(cache.known_count(), 0);
    }
}
