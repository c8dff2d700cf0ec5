//! PPUCTRL and PPUMASK register definitions.
//!
//! PPUSTATUS has no stored register here: bit 7 is derived from the
//! [`crate::VBlankLedger`], bits 6/5 are the sprite flags the render
//! pipeline sets, bits 4-0 are open bus.

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL ($2000) - write only.
    ///
    /// ```text
    /// 7  bit  0
    /// ---- ----
    /// VPHB SINN
    /// |||| ||++- Base nametable address (0-3)
    /// |||| |+--- VRAM increment (0: +1, 1: +32)
    /// |||| +---- Sprite pattern table (8x8 mode)
    /// |||+------ Background pattern table
    /// ||+------- Sprite size (0: 8x8, 1: 8x16)
    /// |+-------- Master/slave (unused on NES)
    /// +--------- NMI enable at VBlank
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PpuCtrl: u8 {
        /// Nametable select X.
        const NAMETABLE_X = 0b0000_0001;
        /// Nametable select Y.
        const NAMETABLE_Y = 0b0000_0010;
        /// VRAM address increment select.
        const VRAM_INCREMENT = 0b0000_0100;
        /// Sprite pattern table select (8x8 sprites).
        const SPRITE_TABLE = 0b0000_1000;
        /// Background pattern table select.
        const BG_TABLE = 0b0001_0000;
        /// 8x16 sprite mode.
        const SPRITE_SIZE = 0b0010_0000;
        /// Master/slave select (unused).
        const MASTER_SLAVE = 0b0100_0000;
        /// Generate NMI at VBlank start.
        const NMI_ENABLE = 0b1000_0000;
    }
}

impl PpuCtrl {
    /// VRAM address increment per $2007 access (1 or 32).
    #[inline]
    #[must_use]
    pub fn vram_increment(self) -> u16 {
        if self.contains(Self::VRAM_INCREMENT) {
            32
        } else {
            1
        }
    }

    /// Sprite pattern table base for 8x8 sprites ($0000 or $1000).
    #[inline]
    #[must_use]
    pub fn sprite_table_addr(self) -> u16 {
        if self.contains(Self::SPRITE_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Background pattern table base ($0000 or $1000).
    #[inline]
    #[must_use]
    pub fn bg_table_addr(self) -> u16 {
        if self.contains(Self::BG_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite height in pixels (8 or 16).
    #[inline]
    #[must_use]
    pub fn sprite_height(self) -> u16 {
        if self.contains(Self::SPRITE_SIZE) {
            16
        } else {
            8
        }
    }

    /// NMI output enabled?
    #[inline]
    #[must_use]
    pub fn nmi_enabled(self) -> bool {
        self.contains(Self::NMI_ENABLE)
    }
}

bitflags! {
    /// PPUMASK ($2001) - write only.
    ///
    /// ```text
    /// 7  bit  0
    /// ---- ----
    /// BGRs bMmG
    /// |||| |||+- Greyscale
    /// |||| ||+-- Show background in leftmost 8 pixels
    /// |||| |+--- Show sprites in leftmost 8 pixels
    /// |||| +---- Show background
    /// |||+------ Show sprites
    /// ||+------- Emphasize red
    /// |+-------- Emphasize green
    /// +--------- Emphasize blue
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PpuMask: u8 {
        /// Greyscale mode.
        const GREYSCALE = 0b0000_0001;
        /// Show background in the left 8 pixels.
        const SHOW_BG_LEFT = 0b0000_0010;
        /// Show sprites in the left 8 pixels.
        const SHOW_SPRITES_LEFT = 0b0000_0100;
        /// Background rendering enable.
        const SHOW_BG = 0b0000_1000;
        /// Sprite rendering enable.
        const SHOW_SPRITES = 0b0001_0000;
        /// Red emphasis.
        const EMPHASIZE_RED = 0b0010_0000;
        /// Green emphasis.
        const EMPHASIZE_GREEN = 0b0100_0000;
        /// Blue emphasis.
        const EMPHASIZE_BLUE = 0b1000_0000;
    }
}

impl PpuMask {
    /// Rendering enabled (background or sprites)?
    #[inline]
    #[must_use]
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Self::SHOW_BG | Self::SHOW_SPRITES)
    }

    /// Background enabled?
    #[inline]
    #[must_use]
    pub fn show_background(self) -> bool {
        self.contains(Self::SHOW_BG)
    }

    /// Sprites enabled?
    #[inline]
    #[must_use]
    pub fn show_sprites(self) -> bool {
        self.contains(Self::SHOW_SPRITES)
    }

    /// Background visible in the left 8 pixels?
    #[inline]
    #[must_use]
    pub fn show_bg_left(self) -> bool {
        self.contains(Self::SHOW_BG_LEFT)
    }

    /// Sprites visible in the left 8 pixels?
    #[inline]
    #[must_use]
    pub fn show_sprites_left(self) -> bool {
        self.contains(Self::SHOW_SPRITES_LEFT)
    }
}
