//! DMC (delta modulation channel).
//!
//! Plays 1-bit delta-encoded samples fetched from CPU memory. The channel
//! itself never touches the bus: when its sample buffer empties it raises a
//! fetch request (`needs_sample`), the core's DMC DMA engine stalls the CPU,
//! reads the byte, and hands it back via `complete_fetch`.

use crate::Region;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// DMC rate table for NTSC (CPU cycles per timer tick).
const RATE_NTSC: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// DMC rate table for PAL (CPU cycles per timer tick).
const RATE_PAL: [u16; 16] = [
    398, 354, 316, 298, 276, 236, 210, 198, 176, 148, 132, 118, 98, 78, 66, 50,
];

/// Delta modulation channel.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dmc {
    // Configuration
    irq_enabled: bool,
    loop_enabled: bool,
    rate_index: u8,

    // Sample playback registers
    sample_address: u8,
    sample_length: u8,
    current_address: u16,
    bytes_remaining: u16,

    // Output unit
    sample_buffer: u8,
    sample_buffer_empty: bool,
    shift_register: u8,
    bits_remaining: u8,
    output_level: u8,
    silence: bool,

    // Timer
    timer_period: u16,
    timer_counter: u16,
    rate_table: [u16; 16],

    irq_flag: bool,
    /// Fetch requested but not yet serviced by the DMA engine.
    fetch_pending: bool,
}

impl Dmc {
    /// Create a silent DMC for the given region's rate table.
    #[must_use]
    pub fn new(region: Region) -> Self {
        let rate_table = match region {
            Region::Ntsc => RATE_NTSC,
            Region::Pal => RATE_PAL,
        };
        let period = rate_table[0];
        Self {
            irq_enabled: false,
            loop_enabled: false,
            rate_index: 0,
            sample_address: 0,
            sample_length: 0,
            current_address: 0xC000,
            bytes_remaining: 0,
            sample_buffer: 0,
            sample_buffer_empty: true,
            shift_register: 0,
            bits_remaining: 8,
            output_level: 0,
            silence: true,
            timer_period: period,
            timer_counter: period,
            rate_table,
            irq_flag: false,
            fetch_pending: false,
        }
    }

    /// $4010: `IL-- RRRR` (IRQ enable, loop, rate index).
    pub fn write_ctrl(&mut self, value: u8) {
        self.irq_enabled = value & 0x80 != 0;
        self.loop_enabled = value & 0x40 != 0;
        self.rate_index = value & 0x0F;
        self.timer_period = self.rate_table[self.rate_index as usize];
        if !self.irq_enabled {
            self.irq_flag = false;
        }
    }

    /// $4011: direct load of the 7-bit output level.
    pub fn write_direct_load(&mut self, value: u8) {
        self.output_level = value & 0x7F;
    }

    /// $4012: sample address = $C000 + value * $40.
    pub fn write_sample_address(&mut self, value: u8) {
        self.sample_address = value;
    }

    /// $4013: sample length = value * $10 + 1 bytes.
    pub fn write_sample_length(&mut self, value: u8) {
        self.sample_length = value;
    }

    /// $4015 DMC bit: enable restarts an exhausted sample, disable stops it.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.bytes_remaining == 0 {
                self.restart_sample();
            }
        } else {
            self.bytes_remaining = 0;
            self.fetch_pending = false;
        }
    }

    fn restart_sample(&mut self) {
        self.current_address = 0xC000 | (u16::from(self.sample_address) << 6);
        self.bytes_remaining = (u16::from(self.sample_length) << 4) | 1;
    }

    /// Timer clock (every other CPU cycle).
    pub fn clock_timer(&mut self) {
        if self.timer_counter == 0 {
            self.timer_counter = self.timer_period;
            self.clock_output();
        } else {
            self.timer_counter -= 1;
        }

        // Raise the fetch request as soon as the buffer drains
        if self.sample_buffer_empty && self.bytes_remaining > 0 {
            self.fetch_pending = true;
        }
    }

    /// One output-unit step: consume a delta bit or hold in silence.
    fn clock_output(&mut self) {
        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
            self.shift_register >>= 1;
        }

        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            if self.sample_buffer_empty {
                self.silence = true;
            } else {
                self.silence = false;
                self.shift_register = self.sample_buffer;
                self.sample_buffer_empty = true;
            }
        }
    }

    /// True when the DMA engine should fetch a sample byte.
    #[must_use]
    pub fn needs_sample(&self) -> bool {
        self.fetch_pending
    }

    /// Address of the pending sample fetch.
    #[must_use]
    pub fn sample_address(&self) -> u16 {
        self.current_address
    }

    /// Deliver a fetched sample byte; advances the address with the
    /// $FFFF -> $8000 wrap and handles sample completion (loop or IRQ).
    pub fn complete_fetch(&mut self, value: u8) {
        self.fetch_pending = false;
        self.sample_buffer = value;
        self.sample_buffer_empty = false;

        self.current_address = if self.current_address == 0xFFFF {
            0x8000
        } else {
            self.current_address + 1
        };

        self.bytes_remaining = self.bytes_remaining.saturating_sub(1);
        if self.bytes_remaining == 0 {
            if self.loop_enabled {
                self.restart_sample();
            } else if self.irq_enabled {
                self.irq_flag = true;
            }
        }
    }

    /// Current 7-bit output level.
    #[must_use]
    pub fn output(&self) -> u8 {
        self.output_level
    }

    /// Bytes remaining > 0 (for the $4015 status read).
    #[must_use]
    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    /// Bytes left in the current sample.
    #[must_use]
    pub fn bytes_remaining(&self) -> u16 {
        self.bytes_remaining
    }

    /// DMC IRQ flag.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.irq_flag
    }

    /// Clear the DMC IRQ flag ($4015 write side effect).
    pub fn clear_irq(&mut self) {
        self.irq_flag = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_tables() {
        assert_eq!(Dmc::new(Region::Ntsc).rate_table[0], 428);
        assert_eq!(Dmc::new(Region::Pal).rate_table[0], 398);
    }

    #[test]
    fn test_direct_load_masks_bit7() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_direct_load(0xFF);
        assert_eq!(dmc.output(), 0x7F);
    }

    #[test]
    fn test_enable_restarts_sample() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_sample_address(0x01);
        dmc.write_sample_length(0x02);
        dmc.set_enabled(true);
        assert_eq!(dmc.sample_address(), 0xC040);
        assert_eq!(dmc.bytes_remaining(), 0x21);
    }

    #[test]
    fn test_disable_halts() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_sample_length(0x02);
        dmc.set_enabled(true);
        dmc.set_enabled(false);
        assert_eq!(dmc.bytes_remaining(), 0);
        assert!(!dmc.needs_sample());
    }

    #[test]
    fn test_fetch_request_cycle() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_sample_length(0x00); // 1 byte
        dmc.set_enabled(true);
        dmc.clock_timer();
        assert!(dmc.needs_sample());

        dmc.complete_fetch(0xFF);
        assert!(!dmc.needs_sample());
        assert_eq!(dmc.bytes_remaining(), 0);
    }

    #[test]
    fn test_address_wraps_to_8000() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.current_address = 0xFFFF;
        dmc.bytes_remaining = 2;
        dmc.complete_fetch(0x00);
        assert_eq!(dmc.sample_address(), 0x8000);
    }

    #[test]
    fn test_irq_on_completion() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_ctrl(0x80); // IRQ enabled
        dmc.write_sample_length(0x00);
        dmc.set_enabled(true);
        dmc.complete_fetch(0x00);
        assert!(dmc.irq_pending());
        dmc.clear_irq();
        assert!(!dmc.irq_pending());
    }

    #[test]
    fn test_loop_restarts_without_irq() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_ctrl(0x40); // loop
        dmc.write_sample_address(0x00);
        dmc.write_sample_length(0x00);
        dmc.set_enabled(true);
        dmc.complete_fetch(0x00);
        assert!(!dmc.irq_pending());
        assert_eq!(dmc.bytes_remaining(), 1);
        assert_eq!(dmc.sample_address(), 0xC000);
    }

    #[test]
    fn test_delta_output_steps() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_ctrl(0x0F); // fastest rate
        dmc.write_direct_load(64);
        dmc.sample_buffer = 0xFF; // all increments
        dmc.sample_buffer_empty = false;
        dmc.bits_remaining = 1; // next output clock loads the buffer

        // Enough clocks for the initial (slow) timer load plus 9 output steps
        for _ in 0..2000 {
            dmc.clock_timer();
        }
        assert_eq!(dmc.output(), 64 + 16);
    }

    #[test]
    fn test_output_clamps() {
        let mut dmc = Dmc::new(Region::Ntsc);
        dmc.write_direct_load(127);
        dmc.silence = false;
        dmc.shift_register = 0xFF;
        dmc.bits_remaining = 8;
        dmc.clock_output();
        assert_eq!(dmc.output(), 127);

        dmc.write_direct_load(0);
        dmc.shift_register = 0x00;
        dmc.silence = false;
        dmc.bits_remaining = 8;
        dmc.clock_output();
        assert_eq!(dmc.output(), 0);
    }
}
