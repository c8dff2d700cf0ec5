//! APU register file and mixer.
//!
//! The 2A03 APU: two pulse channels, triangle, noise, DMC, and the frame
//! counter. The APU is clocked once per CPU cycle; pulse/noise/DMC timers
//! divide that by two, the triangle timer runs at full CPU rate.

use crate::dmc::Dmc;
use crate::frame_counter::{FrameCounter, FrameEvent};
use crate::noise::Noise;
use crate::pulse::Pulse;
use crate::sweep::PulseChannel;
use crate::triangle::Triangle;
use crate::Region;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pulse mixer lookup: `95.52 / (8128 / (p1 + p2) + 100)`.
#[allow(clippy::cast_precision_loss)] // Table index fits in f32 mantissa
const PULSE_TABLE: [f32; 31] = {
    let mut table = [0.0f32; 31];
    let mut i = 1;
    while i < 31 {
        table[i] = 95.52 / (8128.0 / (i as f32) + 100.0);
        i += 1;
    }
    table
};

/// Triangle/noise/DMC mixer lookup:
/// `163.67 / (24329 / (3*t + 2*n + d) + 100)`.
#[allow(clippy::cast_precision_loss)] // Table index fits in f32 mantissa
const TND_TABLE: [f32; 203] = {
    let mut table = [0.0f32; 203];
    let mut i = 1;
    while i < 203 {
        table[i] = 163.67 / (24329.0 / (i as f32) + 100.0);
        i += 1;
    }
    table
};

/// The audio processing unit.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Apu {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_counter: FrameCounter,
    region: Region,
    cycle: u64,
}

impl Apu {
    /// Create an APU for the given region.
    #[must_use]
    pub fn new(region: Region) -> Self {
        Self {
            pulse1: Pulse::new(PulseChannel::One),
            pulse2: Pulse::new(PulseChannel::Two),
            triangle: Triangle::new(),
            noise: Noise::new(region),
            dmc: Dmc::new(region),
            frame_counter: FrameCounter::new(),
            region,
            cycle: 0,
        }
    }

    /// Reset to power-on state (region preserved).
    pub fn reset(&mut self) {
        *self = Self::new(self.region);
    }

    /// Write an APU register ($4000-$4013, $4015, $4017).
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000 => self.pulse1.write_ctrl(value),
            0x4001 => self.pulse1.write_sweep(value),
            0x4002 => self.pulse1.write_timer_lo(value),
            0x4003 => self.pulse1.write_timer_hi(value),

            0x4004 => self.pulse2.write_ctrl(value),
            0x4005 => self.pulse2.write_sweep(value),
            0x4006 => self.pulse2.write_timer_lo(value),
            0x4007 => self.pulse2.write_timer_hi(value),

            0x4008 => self.triangle.write_linear_counter(value),
            0x400A => self.triangle.write_timer_lo(value),
            0x400B => self.triangle.write_timer_hi(value),

            0x400C => self.noise.write_ctrl(value),
            0x400E => self.noise.write_period(value),
            0x400F => self.noise.write_length(value),

            0x4010 => self.dmc.write_ctrl(value),
            0x4011 => self.dmc.write_direct_load(value),
            0x4012 => self.dmc.write_sample_address(value),
            0x4013 => self.dmc.write_sample_length(value),

            // $4015: channel enables; also clears the DMC IRQ
            0x4015 => {
                log::trace!("APU channel enable mask: {value:02X}");
                self.pulse1.set_enabled(value & 0x01 != 0);
                self.pulse2.set_enabled(value & 0x02 != 0);
                self.triangle.set_enabled(value & 0x04 != 0);
                self.noise.set_enabled(value & 0x08 != 0);
                self.dmc.set_enabled(value & 0x10 != 0);
                self.dmc.clear_irq();
            }

            0x4017 => self.frame_counter.write(value),

            _ => {}
        }
    }

    /// $4015 read: channel length states + IRQ flags. Clears the frame IRQ
    /// (but not the DMC IRQ).
    pub fn read_status(&mut self) -> u8 {
        let status = self.peek_status();
        self.frame_counter.clear_irq();
        status
    }

    /// $4015 without side effects (debugger peek).
    #[must_use]
    pub fn peek_status(&self) -> u8 {
        let mut status = 0u8;
        if self.pulse1.active() {
            status |= 0x01;
        }
        if self.pulse2.active() {
            status |= 0x02;
        }
        if self.triangle.active() {
            status |= 0x04;
        }
        if self.noise.active() {
            status |= 0x08;
        }
        if self.dmc.active() {
            status |= 0x10;
        }
        if self.frame_counter.irq_pending() {
            status |= 0x40;
        }
        if self.dmc.irq_pending() {
            status |= 0x80;
        }
        status
    }

    /// Clock the APU by one CPU cycle.
    pub fn clock(&mut self) {
        self.triangle.clock_timer();

        if self.cycle % 2 == 1 {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
            self.noise.clock_timer();
            self.dmc.clock_timer();
        }

        let events = self.frame_counter.clock();
        for event in events.iter().flatten() {
            match event {
                FrameEvent::QuarterFrame => {
                    self.pulse1.clock_envelope();
                    self.pulse2.clock_envelope();
                    self.triangle.clock_linear_counter();
                    self.noise.clock_envelope();
                }
                FrameEvent::HalfFrame => {
                    self.pulse1.clock_length();
                    self.pulse2.clock_length();
                    self.pulse1.clock_sweep();
                    self.pulse2.clock_sweep();
                    self.triangle.clock_length();
                    self.noise.clock_length();
                }
            }
        }

        self.cycle = self.cycle.wrapping_add(1);
    }

    /// Instantaneous mixer output in [0, 1]. The caller resamples at its
    /// own rate.
    #[must_use]
    pub fn mix(&self) -> f32 {
        let pulse1 = u16::from(self.pulse1.output());
        let pulse2 = u16::from(self.pulse2.output());
        let triangle = u16::from(self.triangle.output());
        let noise = u16::from(self.noise.output());
        let dmc = u16::from(self.dmc.output());

        let pulse_out = PULSE_TABLE[(pulse1 + pulse2) as usize];
        let tnd_index = 3 * triangle + 2 * noise + dmc;
        let tnd_out = TND_TABLE[tnd_index.min(202) as usize];

        pulse_out + tnd_out
    }

    /// True when the DMC wants a sample byte fetched.
    #[must_use]
    pub fn dmc_needs_sample(&self) -> bool {
        self.dmc.needs_sample()
    }

    /// Address of the pending DMC fetch.
    #[must_use]
    pub fn dmc_sample_address(&self) -> u16 {
        self.dmc.sample_address()
    }

    /// Deliver a DMC sample byte fetched by the DMA engine.
    pub fn dmc_complete_fetch(&mut self, value: u8) {
        self.dmc.complete_fetch(value);
    }

    /// Frame IRQ flag.
    #[must_use]
    pub fn frame_irq_pending(&self) -> bool {
        self.frame_counter.irq_pending()
    }

    /// DMC IRQ flag.
    #[must_use]
    pub fn dmc_irq_pending(&self) -> bool {
        self.dmc.irq_pending()
    }

    /// Either IRQ source asserted.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.frame_irq_pending() || self.dmc_irq_pending()
    }

    /// APU cycle counter.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycle
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new(Region::Ntsc)
    }
}
