//! Millisecond clocks for the scheduler
//!
//! `InstantClock` measures real time (native and WASM via `instant`).
//! `ManualClock` is advanced by hand and shared between clones.

use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: instant::Instant,
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: instant::Instant::now(),
        }
    }
}

impl Clock for InstantClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(40);
        handle.advance(2);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn test_instant_clock_is_monotonic() {
        let clock = InstantClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
