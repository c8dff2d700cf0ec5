//! APU frame counter.
//!
//! Clocks envelopes, linear counters, length counters, and sweeps at
//! quarter- and half-frame boundaries. Two modes, selected by $4017:
//!
//! - 4-step: quarter frames at ~240 Hz; sets the frame IRQ at the end of the
//!   sequence unless inhibited.
//! - 5-step: ~192 Hz spacing, no IRQ, and an immediate quarter+half clock
//!   when the mode is written.
//!
//! A $4017 write takes effect 3 or 4 CPU cycles later depending on write
//! parity, which several timing test ROMs depend on.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Frame counter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameCounterMode {
    /// 4-step sequence (14915 APU cycles), frame IRQ capable.
    #[default]
    FourStep,
    /// 5-step sequence (18641 APU cycles), no IRQ.
    FiveStep,
}

/// Events produced by a frame counter clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Clock envelopes and the triangle linear counter.
    QuarterFrame,
    /// Clock length counters and sweeps.
    HalfFrame,
}

/// Frame counter state. Cycle counts are in CPU cycles.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameCounter {
    cycle: u16,
    mode: FrameCounterMode,
    irq_inhibit: bool,
    irq_pending: bool,
    reset_delay: u8,
    pending_mode: Option<FrameCounterMode>,
}

/// 4-step mode event cycles (NTSC, CPU cycles).
const FOUR_STEP_CYCLES: [u16; 4] = [7457, 14913, 22371, 29829];

/// 5-step mode event cycles (NTSC, CPU cycles).
const FIVE_STEP_CYCLES: [u16; 5] = [7457, 14913, 22371, 29829, 37281];

impl FrameCounter {
    /// Create a frame counter in 4-step mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle: 0,
            mode: FrameCounterMode::FourStep,
            irq_inhibit: false,
            irq_pending: false,
            reset_delay: 0,
            pending_mode: None,
        }
    }

    /// $4017 write: `MI-- ----`.
    pub fn write(&mut self, value: u8) {
        self.irq_inhibit = value & 0x40 != 0;
        if self.irq_inhibit {
            self.irq_pending = false;
        }

        let mode = if value & 0x80 != 0 {
            FrameCounterMode::FiveStep
        } else {
            FrameCounterMode::FourStep
        };
        self.pending_mode = Some(mode);
        self.reset_delay = if self.cycle % 2 == 0 { 4 } else { 3 };
    }

    /// CPU-cycle clock. Returns the events firing on this cycle.
    pub fn clock(&mut self) -> [Option<FrameEvent>; 2] {
        let mut events = [None; 2];

        if self.reset_delay > 0 {
            self.reset_delay -= 1;
            if self.reset_delay == 0 {
                if let Some(mode) = self.pending_mode.take() {
                    self.mode = mode;
                    self.cycle = 0;
                    if self.mode == FrameCounterMode::FiveStep {
                        // Immediate quarter + half clock on 5-step entry
                        events[0] = Some(FrameEvent::QuarterFrame);
                        events[1] = Some(FrameEvent::HalfFrame);
                        return events;
                    }
                }
            }
        }

        self.cycle += 1;

        match self.mode {
            FrameCounterMode::FourStep => {
                match self.cycle {
                    c if c == FOUR_STEP_CYCLES[0] => {
                        events[0] = Some(FrameEvent::QuarterFrame);
                    }
                    c if c == FOUR_STEP_CYCLES[1] => {
                        events[0] = Some(FrameEvent::QuarterFrame);
                        events[1] = Some(FrameEvent::HalfFrame);
                    }
                    c if c == FOUR_STEP_CYCLES[2] => {
                        events[0] = Some(FrameEvent::QuarterFrame);
                    }
                    c if c == FOUR_STEP_CYCLES[3] => {
                        events[0] = Some(FrameEvent::QuarterFrame);
                        events[1] = Some(FrameEvent::HalfFrame);
                        if !self.irq_inhibit {
                            self.irq_pending = true;
                        }
                        self.cycle = 0;
                    }
                    _ => {}
                }
            }
            FrameCounterMode::FiveStep => match self.cycle {
                c if c == FIVE_STEP_CYCLES[0] => {
                    events[0] = Some(FrameEvent::QuarterFrame);
                }
                c if c == FIVE_STEP_CYCLES[1] => {
                    events[0] = Some(FrameEvent::QuarterFrame);
                    events[1] = Some(FrameEvent::HalfFrame);
                }
                c if c == FIVE_STEP_CYCLES[2] => {
                    events[0] = Some(FrameEvent::QuarterFrame);
                }
                c if c == FIVE_STEP_CYCLES[4] => {
                    events[0] = Some(FrameEvent::QuarterFrame);
                    events[1] = Some(FrameEvent::HalfFrame);
                    self.cycle = 0;
                }
                _ => {}
            },
        }

        events
    }

    /// Frame IRQ flag.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    /// Clear the frame IRQ ($4015 read side effect).
    pub fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> FrameCounterMode {
        self.mode
    }

    /// Current cycle within the sequence.
    #[must_use]
    pub fn cycle(&self) -> u16 {
        self.cycle
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}
