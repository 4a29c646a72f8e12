use std::collections::HashSet;

/// Key codes used by the default bindings. Values follow the Qt key code
/// table so persisted bindings stay stable across frontends.
pub mod keys {
    pub const A: u32 = 65;
    pub const D: u32 = 68;
    pub const K: u32 = 75;
    pub const L: u32 = 76;
    pub const S: u32 = 83;
    pub const W: u32 = 87;
    pub const ESCAPE: u32 = 0x0100_0000;
    pub const RETURN: u32 = 0x0100_0004;
    pub const SHIFT: u32 = 0x0100_0020;
}

/// Keys currently held down. Written only from the UI event loop.
#[derive(Debug, Default, Clone)]
pub struct KeyboardHeldSet {
    held: HashSet<u32>,
}

impl KeyboardHeldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` for auto-repeat presses of an already held key.
    pub fn press(&mut self, key: u32) -> bool {
        self.held.insert(key)
    }

    pub fn release(&mut self, key: u32) -> bool {
        self.held.remove(&key)
    }

    pub fn is_held(&self, key: u32) -> bool {
        self.held.contains(&key)
    }

    /// Forget everything, e.g. when the window loses focus and release
    /// events will never arrive.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_release() {
        let mut set = KeyboardHeldSet::new();
        assert!(set.press(keys::W));
        assert!(!set.press(keys::W));
        assert!(set.is_held(keys::W));
        assert!(set.release(keys::W));
        assert!(!set.release(keys::W));
        assert!(set.is_empty());
    }
}
