//! Cycle-accurate Ricoh 2C02 PPU emulation.
//!
//! The PPU renders 256x240 pixels on a 341x262 dot grid (341x312 on PAL).
//! It is driven one dot per master tick by the orchestrating core, in two
//! phases: the clock advance (which owns the odd-frame skip) and the dot's
//! render work. VBlank state is kept as a timestamp ledger rather than a
//! stored flag, which separates the $2002-readable bit from the NMI line
//! and makes the set-cycle read race explicit.
//!
//! CHR (pattern table) access reaches the cartridge through the [`PpuBus`]
//! trait; nametable CIRAM and palette RAM are internal, with mirroring
//! declared by the cartridge.

mod background;
mod oam;
mod palette;
mod ppu;
mod registers;
mod scroll;
mod sprites;
mod timing;
mod vblank;
mod vram;

pub use background::Background;
pub use oam::{Oam, SecondaryOam, Sprite, SpriteAttributes};
pub use palette::NES_PALETTE;
pub use ppu::{Ppu, PpuBus, FRAME_HEIGHT, FRAME_SIZE, FRAME_WIDTH, WARMUP_CPU_CYCLES};
pub use registers::{PpuCtrl, PpuMask};
pub use scroll::Scroll;
pub use sprites::{sprite_pattern_addr, SpritePixel, SpriteUnit};
pub use timing::{
    Timing, DOTS_PER_SCANLINE, PRE_RENDER_SCANLINE, SCANLINES_PER_FRAME, SCANLINES_PER_FRAME_PAL,
};
pub use vblank::VBlankLedger;
pub use vram::Vram;
