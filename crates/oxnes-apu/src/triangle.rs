//! Triangle channel.

use crate::length_counter::LengthCounter;
use crate::timer::Timer;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 32-step triangle wave: 15 down to 0, then 0 up to 15.
const SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11,
    12, 13, 14, 15,
];

/// Triangle channel with linear counter gating.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    length_counter: LengthCounter,
    timer: Timer,
    sequencer: u8,
    linear_counter: u8,
    linear_reload_value: u8,
    linear_reload: bool,
    /// Control flag: halts length and keeps reloading the linear counter.
    control: bool,
}

impl Triangle {
    /// Create a silent triangle channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            length_counter: LengthCounter::new(),
            timer: Timer::new(),
            sequencer: 0,
            linear_counter: 0,
            linear_reload_value: 0,
            linear_reload: false,
            control: false,
        }
    }

    /// $4008: control flag + linear counter reload value.
    pub fn write_linear_counter(&mut self, value: u8) {
        self.control = value & 0x80 != 0;
        self.linear_reload_value = value & 0x7F;
        self.length_counter.set_halt(self.control);
    }

    /// $400A: timer low.
    pub fn write_timer_lo(&mut self, value: u8) {
        self.timer.set_period_lo(value);
    }

    /// $400B: length load + timer high; flags a linear counter reload.
    pub fn write_timer_hi(&mut self, value: u8) {
        self.timer.set_period_hi(value);
        self.length_counter.load(value >> 3);
        self.linear_reload = true;
    }

    /// $4015 channel enable bit.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.length_counter.set_enabled(enabled);
    }

    /// Length counter still counting?
    #[must_use]
    pub fn active(&self) -> bool {
        self.length_counter.active()
    }

    /// Timer clock, every CPU cycle (the triangle timer runs at CPU rate).
    /// The sequencer only advances while both gates are open; ultrasonic
    /// periods (< 2) freeze it rather than popping the output to zero.
    pub fn clock_timer(&mut self) {
        if self.timer.clock()
            && self.length_counter.active()
            && self.linear_counter > 0
            && self.timer.period() >= 2
        {
            self.sequencer = (self.sequencer + 1) & 0x1F;
        }
    }

    /// Quarter-frame linear counter clock.
    pub fn clock_linear_counter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    /// Half-frame length clock.
    pub fn clock_length(&mut self) {
        self.length_counter.clock();
    }

    /// Current output (0-15). The triangle has no volume control; it either
    /// plays the sequence or holds its last level.
    #[must_use]
    pub fn output(&self) -> u8 {
        SEQUENCE[self.sequencer as usize]
    }

    /// Length counter value (for $4015 and the debugger).
    #[must_use]
    pub fn length_counter_value(&self) -> u8 {
        self.length_counter.value()
    }
}

impl Default for Triangle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_triangle() -> Triangle {
        let mut tri = Triangle::new();
        tri.set_enabled(true);
        tri.write_linear_counter(0x7F);
        tri.write_timer_lo(0x40);
        tri.write_timer_hi(0x00); // length index 0 = 10
        tri.clock_linear_counter(); // reload linear counter
        tri
    }

    #[test]
    fn test_sequence_shape() {
        assert_eq!(SEQUENCE[0], 15);
        assert_eq!(SEQUENCE[15], 0);
        assert_eq!(SEQUENCE[16], 0);
        assert_eq!(SEQUENCE[31], 15);
    }

    #[test]
    fn test_sequencer_advances_when_gated_open(){
        let mut tri = playing_triangle();
        let start = tri.sequencer;
        tri.clock_timer(); // first clock fires
        assert_eq!(tri.sequencer, (start + 1) & 0x1F);
    }

    #[test]
    fn test_linear_counter_gates_sequencer() {
        let mut tri = playing_triangle();
        tri.linear_counter = 0;
        let start = tri.sequencer;
        tri.clock_timer();
        assert_eq!(tri.sequencer, start);
    }

    #[test]
    fn test_ultrasonic_period_freezes() {
        let mut tri = playing_triangle();
        tri.write_timer_lo(0x01);
        tri.write_timer_hi(0x00);
        tri.clock_linear_counter();
        let start = tri.sequencer;
        for _ in 0..10 {
            tri.clock_timer();
        }
        assert_eq!(tri.sequencer, start);
    }

    #[test]
    fn test_linear_counter_reload_and_count() {
        let mut tri = Triangle::new();
        tri.write_linear_counter(0x05);
        tri.write_timer_hi(0x00); // sets reload flag
        tri.clock_linear_counter();
        assert_eq!(tri.linear_counter, 5);
        // Control clear: reload flag dropped, counter counts down
        tri.clock_linear_counter();
        assert_eq!(tri.linear_counter, 4);
    }

    #[test]
    fn test_control_keeps_reloading() {
        let mut tri = Triangle::new();
        tri.write_linear_counter(0x85); // control set, value 5
        tri.write_timer_hi(0x00);
        tri.clock_linear_counter();
        tri.clock_linear_counter();
        assert_eq!(tri.linear_counter, 5); // reload flag never cleared
    }
}
