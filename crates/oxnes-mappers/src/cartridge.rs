//! Tagged cartridge type.
//!
//! The core owns exactly one `Cartridge` value at a time; loading moves it in,
//! unloading drops it. Dispatch is an exhaustive match over concrete mapper
//! types so the per-cycle mapper calls stay monomorphic.

use crate::mapper::{Mapper, Mirroring};
use crate::mmc3::Mmc3;
use crate::nrom::Nrom;

/// Cartridge construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartridgeError {
    /// The mapper id is not implemented.
    #[error("unsupported mapper: {0}")]
    UnsupportedMapper(u16),
    /// PRG-ROM buffer has an invalid size for the mapper.
    #[error("mapper {mapper}: invalid PRG-ROM size ({bytes} bytes)")]
    PrgRomSize {
        /// Mapper id the buffer was offered to.
        mapper: u16,
        /// Offending buffer length.
        bytes: usize,
    },
    /// CHR buffer has an invalid size for the mapper.
    #[error("mapper {mapper}: invalid CHR size ({bytes} bytes)")]
    ChrSize {
        /// Mapper id the buffer was offered to.
        mapper: u16,
        /// Offending buffer length.
        bytes: usize,
    },
}

/// A loaded cartridge: one variant per supported mapper.
#[derive(Debug, Clone)]
pub enum Cartridge {
    /// Mapper 0.
    Nrom(Nrom),
    /// Mapper 4.
    Mmc3(Mmc3),
}

impl Cartridge {
    /// Construct a cartridge for a mapper id from raw PRG/CHR buffers.
    ///
    /// # Errors
    ///
    /// Returns [`CartridgeError::UnsupportedMapper`] for unknown ids and the
    /// mapper's own geometry errors otherwise.
    pub fn with_mapper_id(
        mapper: u16,
        prg_rom: Vec<u8>,
        chr: Vec<u8>,
        mirroring: Mirroring,
    ) -> Result<Self, CartridgeError> {
        let cart = match mapper {
            0 => Self::Nrom(Nrom::new(prg_rom, chr, mirroring)?),
            4 => Self::Mmc3(Mmc3::new(prg_rom, chr, mirroring)?),
            n => return Err(CartridgeError::UnsupportedMapper(n)),
        };
        log::debug!(
            "cartridge created: {} (mapper {})",
            cart.mapper_name(),
            cart.mapper_number()
        );
        Ok(cart)
    }

    /// Read a byte from the CPU side ($4020-$FFFF).
    #[inline]
    #[must_use]
    pub fn cpu_read(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.cpu_read(addr),
            Self::Mmc3(m) => m.cpu_read(addr),
        }
    }

    /// Write a byte to the CPU side ($4020-$FFFF).
    #[inline]
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match self {
            Self::Nrom(m) => m.cpu_write(addr, value),
            Self::Mmc3(m) => m.cpu_write(addr, value),
        }
    }

    /// Read a byte from the PPU side ($0000-$1FFF).
    #[inline]
    #[must_use]
    pub fn ppu_read(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.ppu_read(addr),
            Self::Mmc3(m) => m.ppu_read(addr),
        }
    }

    /// Write a byte to the PPU side ($0000-$1FFF).
    #[inline]
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        match self {
            Self::Nrom(m) => m.ppu_write(addr, value),
            Self::Mmc3(m) => m.ppu_write(addr, value),
        }
    }

    /// Current nametable mirroring.
    #[inline]
    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        match self {
            Self::Nrom(m) => m.mirroring(),
            Self::Mmc3(m) => m.mirroring(),
        }
    }

    /// Per-CPU-tick IRQ poll; true asserts the mapper IRQ line.
    #[inline]
    pub fn tick_irq(&mut self) -> bool {
        match self {
            Self::Nrom(m) => m.tick_irq(),
            Self::Mmc3(m) => m.tick_irq(),
        }
    }

    /// PPU A12 0 -> 1 edge notification.
    #[inline]
    pub fn ppu_a12_rising(&mut self) {
        match self {
            Self::Nrom(m) => m.ppu_a12_rising(),
            Self::Mmc3(m) => m.ppu_a12_rising(),
        }
    }

    /// iNES mapper id.
    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        match self {
            Self::Nrom(m) => m.mapper_number(),
            Self::Mmc3(m) => m.mapper_number(),
        }
    }

    /// Mapper name.
    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        match self {
            Self::Nrom(m) => m.mapper_name(),
            Self::Mmc3(m) => m.mapper_name(),
        }
    }

    /// Reset mapper state.
    pub fn reset(&mut self) {
        match self {
            Self::Nrom(m) => m.reset(),
            Self::Mmc3(m) => m.reset(),
        }
    }
}

impl From<Nrom> for Cartridge {
    fn from(mapper: Nrom) -> Self {
        Self::Nrom(mapper)
    }
}

impl From<Mmc3> for Cartridge {
    fn from(mapper: Mmc3) -> Self {
        Self::Mmc3(mapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_nrom() {
        let cart =
            Cartridge::with_mapper_id(0, vec![0; 32 * 1024], vec![0; 8 * 1024], Mirroring::Vertical)
                .unwrap();
        assert_eq!(cart.mapper_number(), 0);
        assert_eq!(cart.mapper_name(), "NROM");
    }

    #[test]
    fn test_factory_mmc3() {
        let cart =
            Cartridge::with_mapper_id(4, vec![0; 32 * 1024], vec![0; 8 * 1024], Mirroring::Vertical)
                .unwrap();
        assert_eq!(cart.mapper_number(), 4);
        assert_eq!(cart.mapper_name(), "MMC3");
    }

    #[test]
    fn test_factory_unsupported() {
        let result = Cartridge::with_mapper_id(99, vec![0; 32 * 1024], Vec::new(), Mirroring::Vertical);
        assert_eq!(result.unwrap_err(), CartridgeError::UnsupportedMapper(99));
    }

    #[test]
    fn test_dispatch_round_trip() {
        let mut cart =
            Cartridge::with_mapper_id(0, vec![0; 16 * 1024], Vec::new(), Mirroring::Horizontal)
                .unwrap();
        cart.cpu_write(0x6000, 0x5A);
        assert_eq!(cart.cpu_read(0x6000), 0x5A);
        cart.ppu_write(0x0100, 0xA5);
        assert_eq!(cart.ppu_read(0x0100), 0xA5);
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
        assert!(!cart.tick_irq());
    }
}
