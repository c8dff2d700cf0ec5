//! Core configuration.
//!
//! The configuration is borrowed immutably at construction; only static
//! fields are read. Region-derived timing constants come from the console
//! variant.

use crate::clock::DEFAULT_POWER_ON_PHASE;
use oxnes_apu::Region;
use oxnes_ppu::{SCANLINES_PER_FRAME, SCANLINES_PER_FRAME_PAL};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Console hardware variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConsoleVariant {
    /// NTSC front-loader (NES-001).
    #[default]
    NesNtscFront,
    /// NTSC top-loader (NES-101).
    NesNtscTop,
    /// PAL NES.
    NesPal,
    /// Famicom.
    Famicom,
    /// AV Famicom.
    FamicomAv,
}

impl ConsoleVariant {
    /// APU/DMC region for this variant.
    #[must_use]
    pub fn region(self) -> Region {
        match self {
            Self::NesPal => Region::Pal,
            _ => Region::Ntsc,
        }
    }

    /// Scanlines per frame for this variant.
    #[must_use]
    pub fn scanlines_per_frame(self) -> u16 {
        match self {
            Self::NesPal => SCANLINES_PER_FRAME_PAL,
            _ => SCANLINES_PER_FRAME,
        }
    }
}

/// Emulation accuracy request.
///
/// `Reference` is the documented-hardware mode (all dummy reads, the
/// BRK-vs-IRQ B-flag distinction). `Performance` is advisory: the core may
/// skip work that has no architecturally visible effect, and currently
/// treats both the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Accuracy {
    /// Hardware-documented behavior throughout.
    #[default]
    Reference,
    /// Allow shortcuts without visible effects (advisory).
    Performance,
}

/// PPU silicon revision (advisory; defaults per console variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PpuVariant {
    /// Ricoh 2C02 (NTSC).
    #[default]
    Rp2c02,
    /// Ricoh 2C07 (PAL).
    Rp2c07,
}

/// CPU silicon revision (advisory; defaults per console variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CpuVariant {
    /// Ricoh 2A03 (NTSC).
    #[default]
    Rp2a03,
    /// Ricoh 2A07 (PAL).
    Rp2a07,
}

/// Lockout chip population (advisory; Famicom boards have none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CicVariant {
    /// CIC lockout chip present (NES consoles).
    #[default]
    Present,
    /// No lockout chip (Famicom, AV Famicom).
    Absent,
}

/// Static configuration consumed by [`crate::Console::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoreConfig {
    /// Console hardware variant.
    pub variant: ConsoleVariant,
    /// Accuracy request.
    pub accuracy: Accuracy,
    /// PPU revision override.
    pub ppu_variant: PpuVariant,
    /// CPU revision override.
    pub cpu_variant: CpuVariant,
    /// Lockout chip override.
    pub cic_variant: CicVariant,
    /// Master clock value at power-on (CPU/PPU phase alignment).
    pub initial_clock_phase: u64,
}

impl CoreConfig {
    /// Configuration for a console variant with per-variant defaults.
    #[must_use]
    pub fn for_variant(variant: ConsoleVariant) -> Self {
        let (ppu_variant, cpu_variant) = match variant {
            ConsoleVariant::NesPal => (PpuVariant::Rp2c07, CpuVariant::Rp2a07),
            _ => (PpuVariant::Rp2c02, CpuVariant::Rp2a03),
        };
        let cic_variant = match variant {
            ConsoleVariant::Famicom | ConsoleVariant::FamicomAv => CicVariant::Absent,
            _ => CicVariant::Present,
        };
        Self {
            variant,
            accuracy: Accuracy::Reference,
            ppu_variant,
            cpu_variant,
            cic_variant,
            initial_clock_phase: DEFAULT_POWER_ON_PHASE,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::for_variant(ConsoleVariant::NesNtscFront)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.variant, ConsoleVariant::NesNtscFront);
        assert_eq!(config.accuracy, Accuracy::Reference);
        assert_eq!(config.initial_clock_phase, 2);
    }

    #[test]
    fn test_pal_variant_constants() {
        let config = CoreConfig::for_variant(ConsoleVariant::NesPal);
        assert_eq!(config.variant.region(), Region::Pal);
        assert_eq!(config.variant.scanlines_per_frame(), 312);
        assert_eq!(config.ppu_variant, PpuVariant::Rp2c07);
    }

    #[test]
    fn test_famicom_has_no_cic() {
        let config = CoreConfig::for_variant(ConsoleVariant::Famicom);
        assert_eq!(config.cic_variant, CicVariant::Absent);
        let config = CoreConfig::for_variant(ConsoleVariant::NesNtscFront);
        assert_eq!(config.cic_variant, CicVariant::Present);
    }

    #[test]
    fn test_ntsc_variants_share_region() {
        for variant in [
            ConsoleVariant::NesNtscFront,
            ConsoleVariant::NesNtscTop,
            ConsoleVariant::Famicom,
            ConsoleVariant::FamicomAv,
        ] {
            assert_eq!(variant.region(), Region::Ntsc);
            assert_eq!(variant.scanlines_per_frame(), 262);
        }
    }
}
