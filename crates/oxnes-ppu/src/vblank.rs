//! VBlank event ledger.
//!
//! Instead of a stored VBlank status bit, the PPU keeps master-cycle
//! timestamps of the events that define it: flag set (241,1), span end
//! (261,1), $2002 reads, and the set-cycle read race. Everything the rest of
//! the machine needs is derived by comparing timestamps:
//!
//! - the *active* span drives the NMI line,
//! - the *visible* flag is what a $2002 read returns in bit 7,
//! - a read landing on the exact set cycle suppresses both for the span.
//!
//! Decoupling the readable bit from the NMI line means a $2002 read cannot
//! spuriously cancel a latched NMI, while the race still suppresses it the
//! way hardware does.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Timestamp log for VBlank flag behavior. All cycles are master cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VBlankLedger {
    last_set_cycle: u64,
    last_clear_cycle: u64,
    last_read_cycle: u64,
    last_race_cycle: u64,
}

impl VBlankLedger {
    /// Ledger with no recorded events.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_set_cycle: 0,
            last_clear_cycle: 0,
            last_read_cycle: 0,
            last_race_cycle: 0,
        }
    }

    /// Record the VBlank flag set (scanline 241, dot 1).
    pub fn record_vblank_set(&mut self, cycle: u64) {
        self.last_set_cycle = cycle;
    }

    /// Record the end of the VBlank span (scanline 261, dot 1); this is
    /// also the clear moment.
    pub fn record_vblank_span_end(&mut self, cycle: u64) {
        self.last_clear_cycle = cycle;
    }

    /// Record a CPU read of $2002.
    pub fn record_status_read(&mut self, cycle: u64) {
        self.last_read_cycle = cycle;
    }

    /// Record a read that landed on the exact set cycle.
    pub fn record_race(&mut self, cycle: u64) {
        self.last_race_cycle = cycle;
    }

    /// VBlank span is active (set more recently than cleared).
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.last_set_cycle > self.last_clear_cycle
    }

    /// A read raced the current span's set cycle.
    #[inline]
    #[must_use]
    pub fn has_race(&self) -> bool {
        self.last_race_cycle >= self.last_set_cycle
    }

    /// The flag is visible on the bus: active, not raced, and not yet read
    /// this span.
    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_active() && !self.has_race() && self.last_set_cycle > self.last_read_cycle
    }

    /// Cycle of the most recent flag set.
    #[must_use]
    pub fn last_set_cycle(&self) -> u64 {
        self.last_set_cycle
    }

    /// Cycle of the most recent $2002 read.
    #[must_use]
    pub fn last_read_cycle(&self) -> u64 {
        self.last_read_cycle
    }

    /// Forget everything (power-on / reset).
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_inactive() {
        let ledger = VBlankLedger::new();
        assert!(!ledger.is_active());
        assert!(!ledger.is_visible());
    }

    #[test]
    fn test_set_then_clear() {
        let mut ledger = VBlankLedger::new();
        ledger.record_vblank_set(100);
        assert!(ledger.is_active());
        assert!(ledger.is_visible());

        ledger.record_vblank_span_end(200);
        assert!(!ledger.is_active());
        assert!(!ledger.is_visible());
    }

    #[test]
    fn test_read_consumes_visibility_not_activity() {
        let mut ledger = VBlankLedger::new();
        ledger.record_vblank_set(100);
        ledger.record_status_read(150);
        assert!(ledger.is_active());
        assert!(!ledger.is_visible());
    }

    #[test]
    fn test_next_span_restores_visibility() {
        let mut ledger = VBlankLedger::new();
        ledger.record_vblank_set(100);
        ledger.record_status_read(150);
        ledger.record_vblank_span_end(200);
        ledger.record_vblank_set(300);
        assert!(ledger.is_visible());
    }

    #[test]
    fn test_race_suppresses_span() {
        let mut ledger = VBlankLedger::new();
        ledger.record_vblank_set(100);
        ledger.record_race(100);
        ledger.record_status_read(100);
        assert!(ledger.is_active());
        assert!(ledger.has_race());
        assert!(!ledger.is_visible());
    }

    #[test]
    fn test_race_expires_with_next_set() {
        let mut ledger = VBlankLedger::new();
        ledger.record_vblank_set(100);
        ledger.record_race(100);
        ledger.record_vblank_span_end(200);
        ledger.record_vblank_set(300);
        assert!(!ledger.has_race());
        assert!(ledger.is_visible());
    }
}
