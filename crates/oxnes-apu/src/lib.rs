//! Cycle-accurate 2A03 APU emulation.
//!
//! The APU is clocked once per CPU cycle by the orchestrating core. It never
//! touches the memory bus itself: DMC sample fetches are surfaced as
//! requests ([`Apu::dmc_needs_sample`]) that the core's DMA engine services
//! while stalling the CPU.
//!
//! Audio leaves through [`Apu::mix`], an instantaneous non-linear mixer
//! output in `[0, 1]`; resampling to an output rate is the caller's job.

mod apu;
mod dmc;
mod envelope;
mod frame_counter;
mod length_counter;
mod noise;
mod pulse;
mod sweep;
mod timer;
mod triangle;

pub use apu::Apu;
pub use dmc::Dmc;
pub use envelope::Envelope;
pub use frame_counter::{FrameCounter, FrameCounterMode, FrameEvent};
pub use length_counter::LengthCounter;
pub use noise::Noise;
pub use pulse::Pulse;
pub use sweep::{PulseChannel, Sweep};
pub use timer::Timer;
pub use triangle::Triangle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Console region; selects the DMC and noise rate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Region {
    /// NTSC (North America, Japan).
    #[default]
    Ntsc,
    /// PAL (Europe, Australia).
    Pal,
}
