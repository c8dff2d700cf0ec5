//! Mapper 0: NROM.
//!
//! No bank switching. 16KB PRG-ROM (mirrored to fill the 32KB window) or
//! 32KB PRG-ROM, 8KB CHR-ROM or CHR-RAM, fixed mirroring, plus an 8KB
//! PRG-RAM window at $6000-$7FFF (present on the Family Basic board and
//! harmless elsewhere).
//!
//! ```text
//! CPU:
//! $6000-$7FFF: 8KB PRG-RAM
//! $8000-$BFFF: first 16KB of PRG-ROM
//! $C000-$FFFF: last 16KB of PRG-ROM (mirror of the first on NROM-128)
//!
//! PPU:
//! $0000-$1FFF: 8KB CHR-ROM/RAM
//! ```

use crate::cartridge::CartridgeError;
use crate::mapper::{Mapper, Mirroring};

const PRG_RAM_SIZE: usize = 8 * 1024;
const CHR_SIZE: usize = 8 * 1024;

/// NROM mapper (mapper 0).
#[derive(Debug, Clone)]
pub struct Nrom {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    prg_ram: Vec<u8>,
    mirroring: Mirroring,
    /// True when `chr` is writable CHR-RAM rather than CHR-ROM.
    chr_is_ram: bool,
}

impl Nrom {
    /// Create an NROM cartridge from raw PRG-ROM and CHR data.
    ///
    /// An empty `chr` buffer selects 8KB of CHR-RAM.
    ///
    /// # Errors
    ///
    /// Returns [`CartridgeError::PrgRomSize`] unless the PRG-ROM is exactly
    /// 16KB or 32KB, and [`CartridgeError::ChrSize`] unless CHR is exactly
    /// 8KB (or empty for CHR-RAM).
    pub fn new(prg_rom: Vec<u8>, chr: Vec<u8>, mirroring: Mirroring) -> Result<Self, CartridgeError> {
        if prg_rom.len() != 16 * 1024 && prg_rom.len() != 32 * 1024 {
            return Err(CartridgeError::PrgRomSize {
                mapper: 0,
                bytes: prg_rom.len(),
            });
        }

        let chr_is_ram = chr.is_empty();
        if !chr_is_ram && chr.len() != CHR_SIZE {
            return Err(CartridgeError::ChrSize {
                mapper: 0,
                bytes: chr.len(),
            });
        }

        let chr = if chr_is_ram { vec![0; CHR_SIZE] } else { chr };

        Ok(Self {
            prg_rom,
            chr,
            prg_ram: vec![0; PRG_RAM_SIZE],
            mirroring,
            chr_is_ram,
        })
    }

    /// PRG-ROM size in bytes.
    #[must_use]
    pub fn prg_size(&self) -> usize {
        self.prg_rom.len()
    }

    /// True when the cartridge carries CHR-RAM instead of CHR-ROM.
    #[must_use]
    pub fn has_chr_ram(&self) -> bool {
        self.chr_is_ram
    }
}

impl Mapper for Nrom {
    fn cpu_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => {
                let offset = (addr - 0x8000) as usize;
                // NROM-128 mirrors its 16KB across the whole window
                let offset = if self.prg_rom.len() == 16 * 1024 {
                    offset & 0x3FFF
                } else {
                    offset
                };
                self.prg_rom[offset]
            }
            // $4020-$5FFF is unpopulated on NROM boards
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if let 0x6000..=0x7FFF = addr {
            self.prg_ram[(addr - 0x6000) as usize] = value;
        }
        // PRG-ROM writes are ignored; NROM has no registers
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        debug_assert!(addr <= 0x1FFF, "invalid CHR address: ${addr:04X}");
        self.chr[(addr as usize) & (CHR_SIZE - 1)]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        debug_assert!(addr <= 0x1FFF, "invalid CHR address: ${addr:04X}");
        if self.chr_is_ram {
            self.chr[(addr as usize) & (CHR_SIZE - 1)] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        0
    }

    fn mapper_name(&self) -> &'static str {
        "NROM"
    }
}
