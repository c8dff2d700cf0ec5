//! Property tests for the scroll register file and the dot clock.

use oxnes_ppu::{Scroll, Timing, DOTS_PER_SCANLINE, SCANLINES_PER_FRAME};
use proptest::prelude::*;

proptest! {
    /// v and t stay within 15 bits and x within 3 bits under any write
    /// sequence.
    #[test]
    fn scroll_registers_stay_in_range(writes in prop::collection::vec((0u8..4, any::<u8>()), 0..64)) {
        let mut scroll = Scroll::new();
        for (kind, value) in writes {
            match kind {
                0 => scroll.write_ctrl(value),
                1 => scroll.write_scroll(value),
                2 => scroll.write_addr(value),
                _ => scroll.increment_vram(u16::from(value)),
            }
            prop_assert!(scroll.vram_addr() <= 0x7FFF);
            prop_assert!(scroll.temp_addr() <= 0x7FFF);
            prop_assert!(scroll.fine_x() <= 7);
        }
    }

    /// Coarse X increment cycles through all 64 columns of the two
    /// horizontal nametables.
    #[test]
    fn increment_x_is_periodic(start in 0u16..0x7FFF) {
        let mut scroll = Scroll::new();
        scroll.set_vram_addr(start);
        let origin = scroll.vram_addr();
        for _ in 0..64 {
            scroll.increment_x();
        }
        prop_assert_eq!(scroll.vram_addr(), origin);
    }

    /// The clock position always stays inside the dot/scanline grid.
    #[test]
    fn clock_position_stays_on_grid(ticks in 0u32..200_000, rendering: bool) {
        let mut timing = Timing::new();
        for _ in 0..ticks % 95_000 {
            timing.advance(rendering);
            prop_assert!(timing.dot() < DOTS_PER_SCANLINE);
            prop_assert!(timing.scanline() < SCANLINES_PER_FRAME);
        }
    }
}
