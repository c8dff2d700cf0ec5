//! Console orchestrator.
//!
//! [`Console::tick`] is the single scheduling primitive: one master cycle
//! per call, in a fixed order:
//!
//! 1. debugger halt check (instruction boundaries only)
//! 2. PPU clock advance (odd-frame skip lives inside the PPU clock)
//! 3. timing step derivation (`cpu_tick` every third master cycle)
//! 4. on CPU ticks: APU, DMA, signal wiring (RDY / IRQ / NMI), one CPU
//!    microstep, then the mapper IRQ poll for the *next* cycle
//! 5. one PPU dot of rendering, VBlank ledger recording, A12 forwarding
//! 6. master clock advance
//!
//! Nothing in here blocks, allocates, or fails; `tick` has no error path.

use crate::bus::{CpuBus, TestRam};
use crate::clock::MasterClock;
use crate::config::CoreConfig;
use crate::debug::Debugger;
use crate::dma::Dma;
use crate::ram::POWER_ON_RAM;

use oxnes_apu::Apu;
use oxnes_cpu::Cpu;
use oxnes_mappers::{Cartridge, Mirroring};
use oxnes_ppu::{Ppu, Timing, FRAME_SIZE};

/// Tick cap for [`Console::emulate_frame`]: comfortably above the 89,342
/// master cycles of a full frame, so a wedged configuration returns instead
/// of spinning.
pub const FRAME_TICK_CAP: u32 = 110_000;

/// Per-tick scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingStep {
    /// The CPU (and APU/DMA) run on this master cycle.
    pub cpu_tick: bool,
}

/// The synchronous emulation core.
pub struct Console {
    clock: MasterClock,
    cpu: Cpu,
    bus: CpuBus,
    dma: Dma,
    debugger: Debugger,
    config: CoreConfig,
    /// Mapper IRQ level sampled after the previous CPU tick.
    mapper_irq_level: bool,
    frame_complete: bool,
    debug_break_occurred: bool,
}

impl Console {
    /// Build a core from a borrowed configuration. The console starts
    /// without a cartridge; call [`Console::power_on`] before ticking.
    #[must_use]
    pub fn new(config: &CoreConfig) -> Self {
        let timing = Timing::with_scanlines(config.variant.scanlines_per_frame());
        let ppu = Ppu::with_timing(Mirroring::Horizontal, timing);
        let apu = Apu::new(config.variant.region());

        Self {
            clock: MasterClock::with_phase(config.initial_clock_phase),
            cpu: Cpu::new(),
            bus: CpuBus::new(ppu, apu),
            dma: Dma::new(),
            debugger: Debugger::new(),
            config: *config,
            mapper_irq_level: false,
            frame_complete: false,
            debug_break_occurred: false,
        }
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    /// Move a cartridge in; the previous one (if any) is dropped. The PPU
    /// takes its mirroring from the new cartridge.
    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        log::debug!(
            "loading cartridge: {} (mapper {})",
            cartridge.mapper_name(),
            cartridge.mapper_number()
        );
        self.bus.ppu.set_mirroring(cartridge.mirroring());
        self.bus.cartridge = Some(cartridge);
    }

    /// Remove and return the loaded cartridge.
    pub fn remove_cartridge(&mut self) -> Option<Cartridge> {
        self.bus.cartridge.take()
    }

    /// Install test RAM backing $6000-$FFFF for cartridge-less operation.
    pub fn install_test_ram(&mut self) {
        self.bus.test_ram = Some(TestRam::new());
    }

    /// Cold boot: deterministic RAM pattern, PPU warmup pending, CPU reset
    /// vector fetched, master clock back at its configured phase.
    pub fn power_on(&mut self) {
        self.clock.reset();
        self.bus.ram = POWER_ON_RAM;
        self.bus.open_bus.reset();
        self.bus.ppu.power_on();
        self.bus.apu.reset();
        for controller in &mut self.bus.controllers {
            controller.reset();
        }
        self.dma.reset();
        if let Some(cartridge) = self.bus.cartridge.as_mut() {
            cartridge.reset();
        }
        self.mapper_irq_level = false;
        self.frame_complete = false;
        self.debug_break_occurred = false;

        self.cpu = Cpu::new();
        self.bus.set_now(self.clock.master_cycles());
        self.cpu.reset(&mut self.bus);
    }

    /// Warm reset: RAM and cartridge state survive, the PPU skips its
    /// warmup window, the CPU re-fetches the reset vector.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.bus.open_bus.reset();
        self.bus.ppu.reset();
        self.bus.apu.reset();
        for controller in &mut self.bus.controllers {
            controller.reset();
        }
        self.dma.reset();
        self.mapper_irq_level = false;
        self.frame_complete = false;
        self.debug_break_occurred = false;

        self.bus.set_now(self.clock.master_cycles());
        self.cpu.reset(&mut self.bus);
    }

    // =====================================================================
    // The tick
    // =====================================================================

    /// Advance the console by one master cycle.
    pub fn tick(&mut self) {
        // 1. Debugger gate, at instruction boundaries only
        if self.debugger.is_enabled() && self.cpu.at_instruction_boundary() {
            let halt = self.debugger.check_instruction(
                self.cpu.regs.pc,
                self.cpu.regs.sp,
                self.bus.ppu.scanline(),
                self.bus.ppu.frame(),
            );
            if halt {
                self.debug_break_occurred = true;
                return;
            }
        }

        let now = self.clock.master_cycles();
        self.bus.set_now(now);

        // 2. PPU clock advance
        self.bus.ppu_clock_advance();

        // 3. Timing step
        let step = TimingStep {
            cpu_tick: self.clock.is_cpu_tick(),
        };

        // 4. CPU slice
        if step.cpu_tick {
            let cpu_cycle = self.clock.cpu_cycles();

            self.bus.apu.clock();

            if let Some(page) = self.bus.take_oam_dma_request() {
                self.dma.begin_oam(page, cpu_cycle);
            }
            // The CPU stalls on every cycle the DMA engines own, including
            // the one where a transfer finishes (engine state goes inactive
            // during the step) and the one where a DMC fetch begins (it
            // goes active during the step)
            let dma_before = self.dma.rdy_line();
            self.dma.step(&mut self.bus, cpu_cycle);
            let stall = dma_before || self.dma.rdy_line();

            // Signal wiring: RDY from DMA, IRQ from APU + mapper, NMI from
            // the PPU's ledger-derived line
            self.cpu.set_rdy_line(stall);
            self.cpu
                .set_irq_line(self.bus.apu.irq_pending() || self.mapper_irq_level);
            self.cpu.set_nmi_line(self.bus.ppu.nmi_line());

            let was_halted = self.cpu.is_halted();
            self.cpu.tick(&mut self.bus);
            if !was_halted && self.cpu.is_halted() {
                self.debugger.notify_jam(self.cpu.regs.pc);
            }

            if let Some((addr, value, is_write)) = self.bus.take_last_access() {
                self.debugger.notify_memory_access(addr, value, is_write);
            }

            // Mapper IRQ poll; the level asserts from the next cycle
            self.mapper_irq_level = self.bus.tick_mapper_irq();
        }

        // 5. PPU dot
        self.bus.ppu_render_dot(now);
        if self.bus.ppu.frame_complete() {
            self.bus.ppu.clear_frame_complete();
            self.frame_complete = true;
            self.debugger.notify_frame_complete();
        }

        // 6. Master clock
        self.clock.advance();
    }

    // =====================================================================
    // Convenience helpers (cap their loops rather than hang)
    // =====================================================================

    /// Run until the current frame completes. Returns false if the cap was
    /// hit or a debugger break occurred first.
    pub fn emulate_frame(&mut self) -> bool {
        self.frame_complete = false;
        for _ in 0..FRAME_TICK_CAP {
            self.tick();
            if self.debug_break_occurred {
                return false;
            }
            if self.frame_complete {
                return true;
            }
        }
        false
    }

    /// Run until the CPU has executed `cycles` more cycles. Returns false
    /// if the cap was hit first.
    pub fn emulate_cpu_cycles(&mut self, cycles: u64) -> bool {
        let target = self.cpu.cycles() + cycles;
        let cap = cycles.saturating_mul(3).saturating_add(16);
        for _ in 0..cap {
            self.tick();
            if self.debug_break_occurred {
                return false;
            }
            if self.cpu.cycles() >= target {
                return true;
            }
        }
        false
    }

    // =====================================================================
    // External surface
    // =====================================================================

    /// Set a controller's button byte (A, B, Select, Start, Up, Down,
    /// Left, Right from bit 0 up).
    pub fn set_controller_buttons(&mut self, port: usize, buttons: u8) {
        if let Some(controller) = self.bus.controllers.get_mut(port) {
            controller.set_buttons(buttons);
        }
    }

    /// Override DMC sample fetches (`None` restores internal bus reads).
    pub fn set_dmc_sample_hook(&mut self, hook: Option<fn(u16) -> u8>) {
        self.bus.dmc_sample_hook = hook;
    }

    /// Instantaneous APU mixer output in [0, 1].
    #[must_use]
    pub fn apu_mix(&self) -> f32 {
        self.bus.apu.mix()
    }

    /// Frame-completed flag (set on the last dot of the pre-render line).
    #[must_use]
    pub fn frame_complete(&self) -> bool {
        self.frame_complete
    }

    /// Acknowledge the completed frame.
    pub fn clear_frame_complete(&mut self) {
        self.frame_complete = false;
    }

    /// The 256x240 ARGB framebuffer.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu.framebuffer()
    }

    /// Copy the frame into a caller-supplied 61,440-pixel slice.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not exactly [`FRAME_SIZE`] pixels.
    pub fn copy_framebuffer_into(&self, target: &mut [u32]) {
        assert_eq!(target.len(), FRAME_SIZE, "framebuffer slice size");
        target.copy_from_slice(self.bus.ppu.framebuffer());
    }

    /// Read memory without side effects.
    #[must_use]
    pub fn peek_memory(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Bus read with hardware side effects (test harnesses, debugger
    /// "poke" paths). Timestamped with the current master cycle.
    pub fn bus_read(&mut self, addr: u16) -> u8 {
        self.bus.set_now(self.clock.master_cycles());
        self.bus.read(addr)
    }

    /// Bus write with hardware side effects.
    pub fn bus_write(&mut self, addr: u16, value: u8) {
        self.bus.set_now(self.clock.master_cycles());
        self.bus.write(addr, value);
    }

    /// Direct bus access.
    #[must_use]
    pub fn bus(&self) -> &CpuBus {
        &self.bus
    }

    /// Direct mutable bus access (test harnesses).
    pub fn bus_mut(&mut self) -> &mut CpuBus {
        &mut self.bus
    }

    /// A debugger break fired; the caller decides whether to keep ticking.
    #[must_use]
    pub fn debug_break_occurred(&self) -> bool {
        self.debug_break_occurred
    }

    /// Acknowledge the debugger break and resume.
    pub fn debug_resume(&mut self) {
        self.debug_break_occurred = false;
        self.debugger.resume();
    }

    /// CPU view (registers, halt state).
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// PPU view (position, ledger, flags).
    #[must_use]
    pub fn ppu(&self) -> &Ppu {
        &self.bus.ppu
    }

    /// APU view.
    #[must_use]
    pub fn apu(&self) -> &Apu {
        &self.bus.apu
    }

    /// DMA engines (interaction ledger).
    #[must_use]
    pub fn dma(&self) -> &Dma {
        &self.dma
    }

    /// Debugger access.
    #[must_use]
    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    /// Mutable debugger access (breakpoints, step modes).
    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Master cycle counter.
    #[must_use]
    pub fn master_cycles(&self) -> u64 {
        self.clock.master_cycles()
    }

    /// Derived CPU cycle counter.
    #[must_use]
    pub fn cpu_cycles(&self) -> u64 {
        self.clock.cpu_cycles()
    }

    /// Loaded mapper id, if a cartridge is present.
    #[must_use]
    pub fn mapper_number(&self) -> Option<u16> {
        self.bus.cartridge.as_ref().map(Cartridge::mapper_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleVariant;

    fn console_with_test_ram() -> Console {
        let config = CoreConfig::default();
        let mut console = Console::new(&config);
        console.install_test_ram();
        // NOP slide with the reset vector at $8000
        for addr in 0x8000u16..0x8100 {
            console.bus_write(addr, 0xEA);
        }
        console.bus_write(0xFFFC, 0x00);
        console.bus_write(0xFFFD, 0x80);
        console.power_on();
        console
    }

    #[test]
    fn test_power_on_state() {
        let console = console_with_test_ram();
        assert_eq!(console.cpu().regs.pc, 0x8000);
        assert_eq!(console.cpu().regs.sp, 0xFD);
        assert_eq!(console.master_cycles(), 2);
        assert!(!console.ppu().warmup_complete());
    }

    #[test]
    fn test_warm_reset_skips_warmup() {
        let mut console = console_with_test_ram();
        console.reset();
        assert!(console.ppu().warmup_complete());
    }

    #[test]
    fn test_master_clock_increments_per_tick() {
        let mut console = console_with_test_ram();
        let start = console.master_cycles();
        for i in 1..=100u64 {
            console.tick();
            assert_eq!(console.master_cycles(), start + i);
        }
    }

    #[test]
    fn test_cpu_runs_every_third_tick() {
        let mut console = console_with_test_ram();
        let start_cpu = console.cpu().cycles();
        for _ in 0..300 {
            console.tick();
        }
        let executed = console.cpu().cycles() - start_cpu;
        assert_eq!(executed, 100);
    }

    #[test]
    fn test_emulate_frame_completes() {
        let mut console = console_with_test_ram();
        assert!(console.emulate_frame());
        assert!(console.frame_complete());
        console.clear_frame_complete();
        assert!(console.emulate_frame());
    }

    #[test]
    fn test_emulate_cpu_cycles() {
        let mut console = console_with_test_ram();
        let before = console.cpu().cycles();
        assert!(console.emulate_cpu_cycles(100));
        assert!(console.cpu().cycles() >= before + 100);
    }

    #[test]
    fn test_determinism_across_cold_boots() {
        let run = || {
            let mut console = console_with_test_ram();
            for _ in 0..50_000 {
                console.tick();
            }
            (
                console.cpu().regs.pc,
                console.cpu().regs.sp,
                console.cpu().cycles(),
                console.master_cycles(),
                console.peek_memory(0x0000),
                console.ppu().scanline(),
                console.ppu().dot(),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_controller_input_reaches_bus() {
        let mut console = console_with_test_ram();
        console.set_controller_buttons(0, 0x01);
        console.bus_write(0x4016, 1);
        console.bus_write(0x4016, 0);
        assert_eq!(console.bus_read(0x4016) & 1, 1);
    }

    #[test]
    fn test_debugger_breakpoint_halts_tick() {
        let mut console = console_with_test_ram();
        console.debugger_mut().set_enabled(true);
        console.debugger_mut().add_breakpoint(0x8002);

        // Run until the break fires
        for _ in 0..100 {
            console.tick();
            if console.debug_break_occurred() {
                break;
            }
        }
        assert!(console.debug_break_occurred());
        assert_eq!(console.cpu().regs.pc, 0x8002);

        // Ticking while broken is a no-op
        let cycles = console.master_cycles();
        console.tick();
        assert_eq!(console.master_cycles(), cycles);

        console.debug_resume();
        console.tick();
        assert!(console.master_cycles() > cycles);
    }

    #[test]
    fn test_peek_memory_has_no_side_effects() {
        let console = console_with_test_ram();
        let a = console.peek_memory(0x2002);
        let b = console.peek_memory(0x2002);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cartridge_lifecycle() {
        let mut console = console_with_test_ram();
        assert_eq!(console.mapper_number(), None);

        let cart = Cartridge::with_mapper_id(
            0,
            vec![0xEA; 0x8000],
            vec![0; 0x2000],
            Mirroring::Vertical,
        )
        .unwrap();
        console.load_cartridge(cart);
        assert_eq!(console.mapper_number(), Some(0));

        let cart = console.remove_cartridge();
        assert!(cart.is_some());
        assert_eq!(console.mapper_number(), None);
    }

    #[test]
    fn test_pal_console_frame_is_longer() {
        let config = CoreConfig::for_variant(ConsoleVariant::NesPal);
        let mut console = Console::new(&config);
        console.install_test_ram();
        console.bus_write(0xFFFC, 0x00);
        console.bus_write(0xFFFD, 0x80);
        console.bus_write(0x8000, 0xEA);
        console.power_on();

        let start = console.master_cycles();
        assert!(console.emulate_frame());
        let frame_len = console.master_cycles() - start;
        assert!(frame_len > 341u64 * 300, "PAL frame only {frame_len} cycles");
    }

    #[test]
    fn test_framebuffer_copy() {
        let console = console_with_test_ram();
        let mut target = vec![0u32; FRAME_SIZE];
        console.copy_framebuffer_into(&mut target);
        assert_eq!(&target[..], console.framebuffer());
    }
}
