use serde::{Deserialize, Serialize};

/// Wait states after an access decoded in the logical map.
pub const LOGICAL_WAIT_STATES: u8 = 2;

/// The physical bus is multiplexed, which costs one more wait state.
pub const PHYSICAL_WAIT_STATES: u8 = 3;

/// Wait state counter feeding the CPU READY line.
///
/// Ready -> (access) -> Waiting(n) -> (n qualifying clock edges) -> Ready
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct WaitStates {
    count: u8,
    ready: bool,
}

impl Default for WaitStates {
    fn default() -> Self {
        Self {
            count: 0,
            ready: true,
        }
    }
}

impl WaitStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to Ready with an empty counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Loads the counter and pulls READY low.
    pub fn start(&mut self, count: u8) {
        self.count = count;
        self.ready = false;
    }

    /// Feeds one clock edge. Returns true when this edge drained the counter
    /// and READY must be asserted again.
    pub fn clock(&mut self, asserted: bool) -> bool {
        if !asserted || self.count == 0 {
            return false;
        }

        self.count -= 1;
        if self.count == 0 {
            self.ready = true;
            return true;
        }
        false
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}
