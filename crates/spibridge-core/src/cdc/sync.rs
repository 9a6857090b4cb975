//! Multi-stage register synchronizer

use crate::error::{Error, Result};

/// Maximum number of register stages in a [`Synchronizer`]
pub const MAX_SYNC_STAGES: usize = 4;

/// A chain of registers clocked by the destination context
///
/// The source value enters stage 0 on each destination clock and becomes
/// visible at the output after `depth` clocks. Depth 0 passes the source
/// value straight through.
#[derive(Debug, Clone)]
pub struct Synchronizer<T> {
    stages: [T; MAX_SYNC_STAGES],
    depth: usize,
}

impl<T: Copy + Default> Synchronizer<T> {
    /// Create a synchronizer with `depth` stages
    pub fn new(depth: usize) -> Result<Self> {
        if depth > MAX_SYNC_STAGES {
            return Err(Error::InvalidSyncDepth(depth));
        }
        Ok(Self {
            stages: [T::default(); MAX_SYNC_STAGES],
            depth,
        })
    }

    /// Number of register stages
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Clock the chain once, sampling `input` into the first stage
    pub fn clock(&mut self, input: T) {
        if self.depth == 0 {
            return;
        }
        for i in (1..self.depth).rev() {
            self.stages[i] = self.stages[i - 1];
        }
        self.stages[0] = input;
    }

    /// Synchronized value (`input` is only used when the depth is 0)
    pub fn output(&self, input: T) -> T {
        if self.depth == 0 {
            input
        } else {
            self.stages[self.depth - 1]
        }
    }

    /// Return every stage to its reset value
    pub fn reset(&mut self) {
        self.stages = [T::default(); MAX_SYNC_STAGES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_stage_latency() {
        let mut sync = Synchronizer::<bool>::new(2).unwrap();
        sync.clock(true);
        assert!(!sync.output(true));
        sync.clock(true);
        assert!(sync.output(true));
    }

    #[test]
    fn test_zero_depth_passes_through() {
        let sync = Synchronizer::<u8>::new(0).unwrap();
        assert_eq!(sync.output(5), 5);
    }

    #[test]
    fn test_depth_limit() {
        assert_eq!(
            Synchronizer::<bool>::new(MAX_SYNC_STAGES + 1).unwrap_err(),
            Error::InvalidSyncDepth(MAX_SYNC_STAGES + 1)
        );
    }
}
