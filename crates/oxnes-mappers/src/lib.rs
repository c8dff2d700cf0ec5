//! NES cartridge mapper contract and implementations.
//!
//! The emulation core talks to the cartridge through a small capability set:
//! CPU-side reads/writes ($4020-$FFFF), PPU-side reads/writes ($0000-$1FFF),
//! nametable mirroring, and the two IRQ-related hooks (`tick_irq`, driven once
//! per CPU cycle, and `ppu_a12_rising`, driven on PPU address line A12 edges).
//!
//! Cartridges are expressed as a tagged [`Cartridge`] enum over concrete
//! mapper types and dispatched with an exhaustive match, so mapper calls stay
//! inlineable on the hot path. Adding a mapper adds a variant.
//!
//! ROM *file* parsing is out of scope: mappers are constructed from raw
//! PRG-ROM/CHR buffers plus a declared mirroring mode.

mod cartridge;
mod mapper;
mod mmc3;
mod nrom;

pub use cartridge::{Cartridge, CartridgeError};
pub use mapper::{Mapper, Mirroring};
pub use mmc3::Mmc3;
pub use nrom::Nrom;

/// List of mapper ids the [`Cartridge::with_mapper_id`] factory accepts.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[0, 4]
}
