//! Mapper 4: MMC3.
//!
//! Fine-grained PRG (8KB) and CHR (1KB/2KB) banking, mirroring control,
//! PRG-RAM with write protection, and the scanline IRQ counter clocked by
//! PPU A12 rising edges.
//!
//! Bank configuration:
//! - 8 bank registers (R0-R7) selected via the bank select register ($8000)
//! - PRG mode bit swaps the $8000/$C000 banks
//! - CHR A12 inversion swaps the pattern-table halves

use crate::cartridge::CartridgeError;
use crate::mapper::{Mapper, Mirroring};

const PRG_BANK_SIZE: usize = 8 * 1024;
const CHR_BANK_SIZE: usize = 1024;
const PRG_RAM_SIZE: usize = 8 * 1024;

/// MMC3 mapper (mapper 4).
#[derive(Debug, Clone)]
pub struct Mmc3 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    prg_ram: Vec<u8>,
    chr_is_ram: bool,
    /// Number of 8KB PRG-ROM banks.
    prg_banks: usize,
    /// Number of 1KB CHR banks.
    chr_banks: usize,

    // Bank select register ($8000)
    bank_select: u8,
    prg_mode: bool,
    chr_inversion: bool,

    // Bank registers R0-R7
    chr_bank_2k: [u8; 2],
    chr_bank_1k: [u8; 4],
    prg_bank: [u8; 2],

    mirroring: Mirroring,
    prg_ram_protect: bool,
    prg_ram_enabled: bool,

    // IRQ counter
    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
    /// Filter counter: ignores A12 edges arriving back-to-back.
    a12_filter: u8,
}

impl Mmc3 {
    /// Create an MMC3 cartridge from raw PRG-ROM and CHR data.
    ///
    /// An empty `chr` buffer selects 8KB of CHR-RAM.
    ///
    /// # Errors
    ///
    /// Returns [`CartridgeError::PrgRomSize`] if the PRG-ROM is not a
    /// non-zero multiple of 8KB, or [`CartridgeError::ChrSize`] if CHR is
    /// present but not a non-zero multiple of 1KB.
    pub fn new(prg_rom: Vec<u8>, chr: Vec<u8>, mirroring: Mirroring) -> Result<Self, CartridgeError> {
        if prg_rom.is_empty() || prg_rom.len() % PRG_BANK_SIZE != 0 {
            return Err(CartridgeError::PrgRomSize {
                mapper: 4,
                bytes: prg_rom.len(),
            });
        }

        let chr_is_ram = chr.is_empty();
        if !chr_is_ram && chr.len() % CHR_BANK_SIZE != 0 {
            return Err(CartridgeError::ChrSize {
                mapper: 4,
                bytes: chr.len(),
            });
        }
        let chr = if chr_is_ram { vec![0; 8 * 1024] } else { chr };

        let prg_banks = prg_rom.len() / PRG_BANK_SIZE;
        let chr_banks = chr.len() / CHR_BANK_SIZE;

        let mut mmc3 = Self {
            prg_rom,
            chr,
            prg_ram: vec![0; PRG_RAM_SIZE],
            chr_is_ram,
            prg_banks,
            chr_banks,
            bank_select: 0,
            prg_mode: false,
            chr_inversion: false,
            chr_bank_2k: [0; 2],
            chr_bank_1k: [0; 4],
            prg_bank: [0; 2],
            mirroring,
            prg_ram_protect: false,
            prg_ram_enabled: true,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            a12_filter: 0,
        };
        mmc3.reset();
        Ok(mmc3)
    }

    /// PRG-ROM offset for a CPU address in $8000-$FFFF.
    fn prg_addr(&self, addr: u16) -> usize {
        let bank = match addr {
            0x8000..=0x9FFF => {
                if self.prg_mode {
                    self.prg_banks.saturating_sub(2)
                } else {
                    self.prg_bank[0] as usize
                }
            }
            0xA000..=0xBFFF => self.prg_bank[1] as usize,
            0xC000..=0xDFFF => {
                if self.prg_mode {
                    self.prg_bank[0] as usize
                } else {
                    self.prg_banks.saturating_sub(2)
                }
            }
            _ => self.prg_banks.saturating_sub(1), // $E000-$FFFF fixed last
        };

        let bank = bank % self.prg_banks.max(1);
        bank * PRG_BANK_SIZE + (addr & 0x1FFF) as usize
    }

    /// CHR offset for a PPU address in $0000-$1FFF.
    fn chr_addr(&self, addr: u16) -> usize {
        let addr = addr & 0x1FFF;

        // With inversion the 2KB banks cover $1000-$1FFF instead of $0000-$0FFF.
        let region = if self.chr_inversion { addr ^ 0x1000 } else { addr };

        let (bank, offset) = match region {
            0x0000..=0x07FF => ((self.chr_bank_2k[0] & 0xFE) as usize, (addr & 0x07FF) as usize),
            0x0800..=0x0FFF => ((self.chr_bank_2k[1] & 0xFE) as usize, (addr & 0x07FF) as usize),
            _ => {
                let slot = ((region - 0x1000) / 0x400) as usize;
                (self.chr_bank_1k[slot] as usize, (addr & 0x03FF) as usize)
            }
        };

        (bank % self.chr_banks.max(1)) * CHR_BANK_SIZE + offset
    }

    /// Clock the IRQ counter (A12 rising edge).
    fn clock_irq(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    /// Current IRQ counter value (debugger display).
    #[must_use]
    pub fn irq_counter(&self) -> u8 {
        self.irq_counter
    }
}

impl Mapper for Mmc3 {
    fn cpu_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled {
                    self.prg_ram[(addr - 0x6000) as usize]
                } else {
                    0
                }
            }
            0x8000..=0xFFFF => {
                let offset = self.prg_addr(addr);
                self.prg_rom.get(offset).copied().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled && !self.prg_ram_protect {
                    self.prg_ram[(addr - 0x6000) as usize] = value;
                }
            }
            0x8000..=0x9FFF => {
                if addr & 1 == 0 {
                    // Bank select ($8000)
                    self.bank_select = value & 0x07;
                    self.prg_mode = value & 0x40 != 0;
                    self.chr_inversion = value & 0x80 != 0;
                } else {
                    // Bank data ($8001)
                    match self.bank_select {
                        0 | 1 => self.chr_bank_2k[self.bank_select as usize] = value,
                        2..=5 => self.chr_bank_1k[(self.bank_select - 2) as usize] = value,
                        6 | 7 => self.prg_bank[(self.bank_select - 6) as usize] = value & 0x3F,
                        _ => {}
                    }
                }
            }
            0xA000..=0xBFFF => {
                if addr & 1 == 0 {
                    // Mirroring ($A000); ignored on four-screen boards
                    if self.mirroring != Mirroring::FourScreen {
                        self.mirroring = if value & 1 != 0 {
                            Mirroring::Horizontal
                        } else {
                            Mirroring::Vertical
                        };
                    }
                } else {
                    // PRG-RAM protect ($A001)
                    self.prg_ram_enabled = value & 0x80 != 0;
                    self.prg_ram_protect = value & 0x40 != 0;
                }
            }
            0xC000..=0xDFFF => {
                if addr & 1 == 0 {
                    // IRQ latch ($C000)
                    self.irq_latch = value;
                } else {
                    // IRQ reload ($C001)
                    self.irq_counter = 0;
                    self.irq_reload = true;
                }
            }
            0xE000..=0xFFFF => {
                if addr & 1 == 0 {
                    // IRQ disable + acknowledge ($E000)
                    self.irq_enabled = false;
                    self.irq_pending = false;
                } else {
                    // IRQ enable ($E001)
                    self.irq_enabled = true;
                }
            }
            _ => {
                log::warn!("MMC3 write to unmapped ${addr:04X} = ${value:02X}");
            }
        }
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        let offset = self.chr_addr(addr);
        self.chr.get(offset).copied().unwrap_or(0)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let offset = self.chr_addr(addr);
            if let Some(byte) = self.chr.get_mut(offset) {
                *byte = value;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn tick_irq(&mut self) -> bool {
        if self.a12_filter > 0 {
            self.a12_filter -= 1;
        }
        self.irq_pending
    }

    fn ppu_a12_rising(&mut self) {
        if self.a12_filter == 0 {
            self.clock_irq();
        }
        self.a12_filter = 2;
    }

    fn mapper_number(&self) -> u16 {
        4
    }

    fn mapper_name(&self) -> &'static str {
        "MMC3"
    }

    fn reset(&mut self) {
        self.bank_select = 0;
        self.prg_mode = false;
        self.chr_inversion = false;
        self.chr_bank_2k = [0, 2];
        self.chr_bank_1k = [4, 5, 6, 7];
        self.prg_bank = [0, 1];
        self.prg_ram_protect = false;
        self.prg_ram_enabled = true;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.a12_filter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mmc3() -> Mmc3 {
        // 4 x 8KB PRG banks, each filled with its bank index
        let mut prg = vec![0u8; 4 * PRG_BANK_SIZE];
        for (i, byte) in prg.iter_mut().enumerate() {
            *byte = (i / PRG_BANK_SIZE) as u8;
        }
        // 8 x 1KB CHR banks, each filled with its bank index
        let mut chr = vec![0u8; 8 * CHR_BANK_SIZE];
        for (i, byte) in chr.iter_mut().enumerate() {
            *byte = (i / CHR_BANK_SIZE) as u8;
        }
        Mmc3::new(prg, chr, Mirroring::Vertical).unwrap()
    }

    #[test]
    fn test_fixed_last_bank() {
        let mmc3 = mmc3();
        // $E000-$FFFF always maps the last bank
        assert_eq!(mmc3.cpu_read(0xE000), 3);
        assert_eq!(mmc3.cpu_read(0xFFFF), 3);
    }

    #[test]
    fn test_prg_mode_swap() {
        let mut mmc3 = mmc3();
        // R6 = bank 1
        mmc3.cpu_write(0x8000, 6);
        mmc3.cpu_write(0x8001, 1);

        // Mode 0: $8000 = R6, $C000 = second-to-last
        assert_eq!(mmc3.cpu_read(0x8000), 1);
        assert_eq!(mmc3.cpu_read(0xC000), 2);

        // Mode 1: swapped
        mmc3.cpu_write(0x8000, 6 | 0x40);
        assert_eq!(mmc3.cpu_read(0x8000), 2);
        assert_eq!(mmc3.cpu_read(0xC000), 1);
    }

    #[test]
    fn test_chr_banking() {
        let mut mmc3 = mmc3();
        // R2 (1KB at $1000) = bank 3
        mmc3.cpu_write(0x8000, 2);
        mmc3.cpu_write(0x8001, 3);
        assert_eq!(mmc3.ppu_read(0x1000), 3);
    }

    #[test]
    fn test_chr_inversion() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0x8000, 2);
        mmc3.cpu_write(0x8001, 3);
        // Invert: R2 now covers $0000
        mmc3.cpu_write(0x8000, 2 | 0x80);
        assert_eq!(mmc3.ppu_read(0x0000), 3);
    }

    #[test]
    fn test_mirroring_control() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0xA000, 1);
        assert_eq!(mmc3.mirroring(), Mirroring::Horizontal);
        mmc3.cpu_write(0xA000, 0);
        assert_eq!(mmc3.mirroring(), Mirroring::Vertical);
    }

    #[test]
    fn test_prg_ram_protect() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0x6000, 0x42);
        assert_eq!(mmc3.cpu_read(0x6000), 0x42);

        // Write-protect
        mmc3.cpu_write(0xA001, 0x80 | 0x40);
        mmc3.cpu_write(0x6000, 0x99);
        assert_eq!(mmc3.cpu_read(0x6000), 0x42);
    }

    #[test]
    fn test_irq_counts_down_on_a12() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0xC000, 3); // latch = 3
        mmc3.cpu_write(0xC001, 0); // reload
        mmc3.cpu_write(0xE001, 0); // enable

        // First edge reloads to 3, then 2, 1, 0 -> pending
        for edge in 0..4 {
            assert!(!mmc3.tick_irq(), "fired early at edge {edge}");
            mmc3.ppu_a12_rising();
            mmc3.a12_filter = 0;
        }
        assert!(mmc3.tick_irq());
    }

    #[test]
    fn test_irq_acknowledge_stops_refire() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0xC000, 0);
        mmc3.cpu_write(0xC001, 0);
        mmc3.cpu_write(0xE001, 0);

        mmc3.ppu_a12_rising();
        assert!(mmc3.tick_irq());

        // $E000 acknowledges and disables
        mmc3.cpu_write(0xE000, 0);
        assert!(!mmc3.tick_irq());
        mmc3.a12_filter = 0;
        mmc3.ppu_a12_rising();
        assert!(!mmc3.tick_irq());
    }

    #[test]
    fn test_a12_filter_suppresses_rapid_edges() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0xC000, 1);
        mmc3.cpu_write(0xC001, 0);
        mmc3.cpu_write(0xE001, 0);

        // Two edges with no intervening ticks: second is filtered
        mmc3.ppu_a12_rising(); // reload to 1
        mmc3.ppu_a12_rising(); // filtered
        assert!(!mmc3.irq_pending);
    }

    #[test]
    fn test_reset_preserves_ram() {
        let mut mmc3 = mmc3();
        mmc3.cpu_write(0x6000, 0x55);
        mmc3.reset();
        assert_eq!(mmc3.cpu_read(0x6000), 0x55);
        assert_eq!(mmc3.irq_counter(), 0);
    }

    #[test]
    fn test_bad_geometry_rejected() {
        assert!(matches!(
            Mmc3::new(vec![0; 100], Vec::new(), Mirroring::Vertical),
            Err(CartridgeError::PrgRomSize { .. })
        ));
        assert!(matches!(
            Mmc3::new(vec![0; PRG_BANK_SIZE], vec![0; 100], Mirroring::Vertical),
            Err(CartridgeError::ChrSize { .. })
        ));
    }
}
