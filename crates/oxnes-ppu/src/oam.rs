//! Object attribute memory (primary and secondary OAM).
//!
//! Sprite format (4 bytes per sprite):
//!
//! ```text
//! Byte 0: Y position (top minus 1)
//! Byte 1: Tile index (8x16 mode: bit 0 selects the pattern table)
//! Byte 2: Attributes
//!   76543210
//!   |||   ++- Palette (4-7)
//!   ||+------ Priority (1: behind background)
//!   |+------- Flip horizontally
//!   +-------- Flip vertically
//! Byte 3: X position
//! ```

use bitflags::bitflags;

bitflags! {
    /// Sprite attribute byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpriteAttributes: u8 {
        /// Palette select bit 0.
        const PALETTE_0 = 0b0000_0001;
        /// Palette select bit 1.
        const PALETTE_1 = 0b0000_0010;
        /// Behind-background priority.
        const PRIORITY = 0b0010_0000;
        /// Horizontal flip.
        const FLIP_HORIZONTAL = 0b0100_0000;
        /// Vertical flip.
        const FLIP_VERTICAL = 0b1000_0000;
    }
}

impl SpriteAttributes {
    /// Sprite palette number (4-7).
    #[inline]
    #[must_use]
    pub fn palette(self) -> u8 {
        (self.bits() & 0x03) + 4
    }

    /// Sprite renders behind opaque background?
    #[inline]
    #[must_use]
    pub fn behind_background(self) -> bool {
        self.contains(Self::PRIORITY)
    }

    /// Horizontally flipped?
    #[inline]
    #[must_use]
    pub fn flip_horizontal(self) -> bool {
        self.contains(Self::FLIP_HORIZONTAL)
    }

    /// Vertically flipped?
    #[inline]
    #[must_use]
    pub fn flip_vertical(self) -> bool {
        self.contains(Self::FLIP_VERTICAL)
    }
}

/// Decoded sprite entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sprite {
    /// Y position (top of sprite minus 1).
    pub y: u8,
    /// Tile index.
    pub tile: u8,
    /// Attribute byte.
    pub attributes: SpriteAttributes,
    /// X position.
    pub x: u8,
}

impl Sprite {
    /// Decode 4 OAM bytes.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            y: bytes[0],
            tile: bytes[1],
            attributes: SpriteAttributes::from_bits_truncate(bytes[2]),
            x: bytes[3],
        }
    }

    /// True when the sprite covers `scanline` for the given height.
    #[inline]
    #[must_use]
    pub fn on_scanline(&self, scanline: u16, height: u16) -> bool {
        let y = u16::from(self.y);
        scanline >= y && scanline < y + height
    }
}

/// Primary OAM: 64 sprites, 256 bytes, plus the OAMADDR register.
#[derive(Debug, Clone)]
pub struct Oam {
    data: [u8; 256],
    addr: u8,
}

impl Oam {
    /// OAM filled with $FF (power-on pattern) and OAMADDR 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [0xFF; 256],
            addr: 0,
        }
    }

    /// OAMADDR write ($2003).
    #[inline]
    pub fn set_addr(&mut self, addr: u8) {
        self.addr = addr;
    }

    /// Current OAMADDR.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// OAMDATA read ($2004): no address increment. Attribute bytes mask
    /// bits 2-4 (absent in silicon); the caller merges open bus there.
    #[must_use]
    pub fn read(&self) -> u8 {
        let value = self.data[self.addr as usize];
        if self.addr % 4 == 2 {
            value & 0xE3
        } else {
            value
        }
    }

    /// OAMDATA write ($2004): stores and increments OAMADDR with wrap.
    pub fn write(&mut self, value: u8) {
        self.data[self.addr as usize] = value;
        self.addr = self.addr.wrapping_add(1);
    }

    /// True when the current address points at an attribute byte.
    #[inline]
    #[must_use]
    pub fn at_attribute_byte(&self) -> bool {
        self.addr % 4 == 2
    }

    /// Decode sprite `index` (0-63).
    #[must_use]
    pub fn sprite(&self, index: u8) -> Sprite {
        let offset = usize::from(index) * 4;
        Sprite::from_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Raw bytes (sprite evaluation).
    #[must_use]
    pub fn bytes(&self) -> &[u8; 256] {
        &self.data
    }

    /// Power-on fill.
    pub fn reset(&mut self) {
        self.data.fill(0xFF);
        self.addr = 0;
    }
}

impl Default for Oam {
    fn default() -> Self {
        Self::new()
    }
}

/// Secondary OAM: the up-to-8 sprites selected for the next scanline,
/// tagged with their primary-OAM source indices.
#[derive(Debug, Clone)]
pub struct SecondaryOam {
    data: [u8; 32],
    /// Primary OAM index (0-63) each filled slot came from.
    source: [u8; 8],
    count: u8,
}

impl SecondaryOam {
    /// Empty secondary OAM.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [0xFF; 32],
            source: [0xFF; 8],
            count: 0,
        }
    }

    /// Clear to $FF (dots 1-64 of each visible scanline).
    pub fn clear(&mut self) {
        self.data.fill(0xFF);
        self.source.fill(0xFF);
        self.count = 0;
    }

    /// Copy a sprite in, remembering its source index. Returns false when
    /// all 8 slots are taken.
    pub fn push(&mut self, source_index: u8, bytes: [u8; 4]) -> bool {
        if self.count >= 8 {
            return false;
        }
        let offset = usize::from(self.count) * 4;
        self.data[offset..offset + 4].copy_from_slice(&bytes);
        self.source[self.count as usize] = source_index;
        self.count += 1;
        true
    }

    /// Number of sprites selected (0-8).
    #[inline]
    #[must_use]
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Decode slot `slot` (0-7), if filled.
    #[must_use]
    pub fn sprite(&self, slot: u8) -> Option<Sprite> {
        if slot >= self.count {
            return None;
        }
        let offset = usize::from(slot) * 4;
        Some(Sprite::from_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    /// Primary OAM index slot `slot` came from ($FF when empty).
    #[inline]
    #[must_use]
    pub fn source_index(&self, slot: u8) -> u8 {
        self.source[usize::from(slot.min(7))]
    }

    /// Sprite 0 landed in some slot this scanline?
    #[must_use]
    pub fn contains_sprite_zero(&self) -> bool {
        self.source[..usize::from(self.count)].contains(&0)
    }
}

impl Default for SecondaryOam {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oam_powers_on_to_ff() {
        let oam = Oam::new();
        assert_eq!(oam.read(), 0xFF);
    }

    #[test]
    fn test_oam_write_increments_addr() {
        let mut oam = Oam::new();
        oam.set_addr(0xFE);
        oam.write(0x11);
        oam.write(0x22);
        oam.write(0x33); // wraps to 0
        assert_eq!(oam.addr(), 0x01);
        oam.set_addr(0x00);
        assert_eq!(oam.read(), 0x33);
    }

    #[test]
    fn test_oam_read_does_not_increment() {
        let mut oam = Oam::new();
        oam.set_addr(0x10);
        let _ = oam.read();
        assert_eq!(oam.addr(), 0x10);
    }

    #[test]
    fn test_attribute_byte_masking() {
        let mut oam = Oam::new();
        oam.set_addr(0x02);
        oam.write(0xFF);
        oam.set_addr(0x02);
        assert_eq!(oam.read(), 0xE3);
        assert!(oam.at_attribute_byte());
    }

    #[test]
    fn test_sprite_decode() {
        let mut oam = Oam::new();
        oam.set_addr(0x04);
        for byte in [60, 0x21, 0xC2, 100] {
            oam.write(byte);
        }
        let sprite = oam.sprite(1);
        assert_eq!(sprite.y, 60);
        assert_eq!(sprite.tile, 0x21);
        assert_eq!(sprite.x, 100);
        assert!(sprite.attributes.flip_vertical());
        assert!(sprite.attributes.flip_horizontal());
        assert_eq!(sprite.attributes.palette(), 6);
    }

    #[test]
    fn test_sprite_scanline_coverage() {
        let sprite = Sprite::from_bytes([60, 0, 0, 0]);
        assert!(!sprite.on_scanline(59, 8));
        assert!(sprite.on_scanline(60, 8));
        assert!(sprite.on_scanline(67, 8));
        assert!(!sprite.on_scanline(68, 8));
        assert!(sprite.on_scanline(75, 16));
    }

    #[test]
    fn test_secondary_oam_capacity() {
        let mut soam = SecondaryOam::new();
        for i in 0..8 {
            assert!(soam.push(i, [0, 0, 0, 0]));
        }
        assert!(!soam.push(8, [0, 0, 0, 0]));
        assert_eq!(soam.count(), 8);
    }

    #[test]
    fn test_secondary_oam_source_tracking() {
        let mut soam = SecondaryOam::new();
        soam.push(5, [1, 2, 3, 4]);
        soam.push(0, [5, 6, 7, 8]);
        assert_eq!(soam.source_index(0), 5);
        assert_eq!(soam.source_index(1), 0);
        assert!(soam.contains_sprite_zero());

        soam.clear();
        assert!(!soam.contains_sprite_zero());
        assert_eq!(soam.count(), 0);
    }
}
