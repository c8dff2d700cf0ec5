//! Property tests for the orchestrated tick loop.

use oxnes_core::{Console, CoreConfig, MASTER_CYCLES_PER_CPU};
use proptest::prelude::*;

fn console() -> Console {
    let config = CoreConfig::default();
    let mut nes = Console::new(&config);
    nes.install_test_ram();
    for addr in 0x8000u16..0x8080 {
        nes.bus_write(addr, 0xEA);
    }
    nes.bus_write(0x8080, 0x4C); // JMP $8000
    nes.bus_write(0x8081, 0x00);
    nes.bus_write(0x8082, 0x80);
    nes.bus_write(0xFFFC, 0x00);
    nes.bus_write(0xFFFD, 0x80);
    nes.power_on();
    nes
}

proptest! {
    /// The master clock advances by exactly one per tick and the CPU cycle
    /// count stays the exact /3 derivation.
    #[test]
    fn master_clock_strictly_increases(ticks in 1u32..2000) {
        let mut nes = console();
        let mut previous = nes.master_cycles();
        for _ in 0..ticks {
            nes.tick();
            let current = nes.master_cycles();
            prop_assert_eq!(current, previous + 1);
            prop_assert_eq!(nes.cpu_cycles(), current / MASTER_CYCLES_PER_CPU);
            previous = current;
        }
    }

    /// The PPU position stays on the dot/scanline grid for any run length
    /// and controller input.
    #[test]
    fn ppu_position_stays_on_grid(ticks in 1u32..5000, buttons: u8) {
        let mut nes = console();
        nes.set_controller_buttons(0, buttons);
        for _ in 0..ticks {
            nes.tick();
            prop_assert!(nes.ppu().dot() <= 340);
            prop_assert!(nes.ppu().scanline() <= 261);
        }
    }

    /// Identical input sequences produce identical machines.
    #[test]
    fn short_runs_are_deterministic(ticks in 1u32..3000, buttons: u8) {
        let run = |ticks: u32, buttons: u8| {
            let mut nes = console();
            nes.set_controller_buttons(0, buttons);
            for _ in 0..ticks {
                nes.tick();
            }
            (
                nes.cpu().regs.pc,
                nes.cpu().cycles(),
                nes.master_cycles(),
                nes.ppu().scanline(),
                nes.ppu().dot(),
            )
        };
        prop_assert_eq!(run(ticks, buttons), run(ticks, buttons));
    }
}
