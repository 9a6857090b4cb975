//! Output Latch

/// Parallel frame register updated when select deasserts
///
/// The latch is armed by the first serial clock edge of a frame and fires on
/// the following deassertion of select. A selection without clock edges never
/// arms it, so glitches on select leave the register untouched.
#[derive(Debug, Clone, Default)]
pub struct OutputLatch {
    armed: bool,
    value: u32,
    captures: u64,
}

impl OutputLatch {
    /// Create a cleared latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the latch (serial clock edge while selected)
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Whether an edge has been seen since select asserted
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Select deasserted: capture `frame` if armed
    ///
    /// Returns whether a latch event happened.
    pub fn deselect(&mut self, frame: u32) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        self.value = frame;
        self.captures += 1;
        true
    }

    /// Last latched frame
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Number of latch events since creation
    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// External reset
    pub fn reset(&mut self) {
        self.armed = false;
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glitch_leaves_value() {
        let mut latch = OutputLatch::new();
        latch.arm();
        assert!(latch.deselect(0x10_BEEF));
        assert!(!latch.deselect(0x12_3456));
        assert_eq!(latch.value(), 0x10_BEEF);
        assert_eq!(latch.captures(), 1);
    }
}
