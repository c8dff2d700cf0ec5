//! The PPU proper: register file, per-dot pipeline, and signal outputs.
//!
//! The orchestrating core drives the PPU twice per master tick: once to
//! advance the dot clock ([`Ppu::clock_advance`], which owns the odd-frame
//! skip) and once to perform the dot's work ([`Ppu::render_dot`]). Register
//! accesses carry the current master cycle so VBlank events, $2002 reads,
//! and the set-cycle race land in the [`VBlankLedger`] with comparable
//! timestamps.
//!
//! # Signals
//!
//! - `nmi_line()`: level output, `vblank active && !race && NMI enabled`.
//!   The CPU edge-detects it; re-enabling NMI mid-VBlank produces a fresh
//!   edge, while a $2002 read does not cancel an already latched one.
//! - `take_a12_rising()`: one-shot flag for the cartridge's IRQ counter,
//!   set whenever the PPU address bus's A12 transitions 0 -> 1.
//! - `frame_complete()`: set on the last dot of the pre-render scanline.

use crate::background::Background;
use crate::oam::{Oam, SecondaryOam};
use crate::palette::NES_PALETTE;
use crate::registers::{PpuCtrl, PpuMask};
use crate::scroll::Scroll;
use crate::sprites::{sprite_pattern_addr, SpriteUnit};
use crate::timing::Timing;
use crate::vblank::VBlankLedger;
use crate::vram::Vram;

use oxnes_mappers::Mirroring;

/// Frame width in pixels.
pub const FRAME_WIDTH: usize = 256;
/// Frame height in pixels.
pub const FRAME_HEIGHT: usize = 240;
/// Pixels per frame.
pub const FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// CPU cycles before the PPU accepts $2000/$2001 writes after power-on.
pub const WARMUP_CPU_CYCLES: u64 = 29_658;

/// Open-bus decay horizon, in frames (roughly one second).
const OPEN_BUS_DECAY_FRAMES: u8 = 60;

/// Pattern-table (CHR) access for the PPU; implemented by the core over the
/// cartridge.
pub trait PpuBus {
    /// Read CHR space ($0000-$1FFF).
    fn read_chr(&mut self, addr: u16) -> u8;
    /// Write CHR space ($0000-$1FFF); only CHR-RAM carts react.
    fn write_chr(&mut self, addr: u16, value: u8);
}

/// The Ricoh 2C02.
pub struct Ppu {
    // Registers
    ctrl: PpuCtrl,
    mask: PpuMask,
    sprite_zero_hit: bool,
    sprite_overflow: bool,

    // Internal registers and memory
    scroll: Scroll,
    vram: Vram,
    oam: Oam,
    secondary_oam: SecondaryOam,

    // Render pipeline
    background: Background,
    sprite_unit: SpriteUnit,
    /// Pattern low byte latched between sprite fetch steps.
    sprite_pattern_lo: u8,

    // Timing and VBlank bookkeeping
    timing: Timing,
    ledger: VBlankLedger,
    frame_complete: bool,

    // $2007 read buffer
    read_buffer: u8,

    // PPU-side open bus latch with frame-counted decay
    open_bus: u8,
    open_bus_decay: u8,

    // A12 edge detection for mapper IRQ counters
    last_a12: bool,
    a12_rising: bool,

    // Power-up state
    warmup_complete: bool,
    /// Sticky: rendering was enabled at least once this frame.
    rendering_was_enabled: bool,

    framebuffer: Vec<u32>,
}

impl Ppu {
    /// Create an NTSC PPU with the given nametable mirroring.
    #[must_use]
    pub fn new(mirroring: Mirroring) -> Self {
        Self::with_timing(mirroring, Timing::new())
    }

    /// Create a PPU with a region-specific clock.
    #[must_use]
    pub fn with_timing(mirroring: Mirroring, timing: Timing) -> Self {
        Self {
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            sprite_zero_hit: false,
            sprite_overflow: false,
            scroll: Scroll::new(),
            vram: Vram::new(mirroring),
            oam: Oam::new(),
            secondary_oam: SecondaryOam::new(),
            background: Background::new(),
            sprite_unit: SpriteUnit::new(),
            sprite_pattern_lo: 0,
            timing,
            ledger: VBlankLedger::new(),
            frame_complete: false,
            read_buffer: 0,
            open_bus: 0,
            open_bus_decay: 0,
            last_a12: false,
            a12_rising: false,
            warmup_complete: false,
            rendering_was_enabled: false,
            framebuffer: vec![0; FRAME_SIZE],
        }
    }

    // =====================================================================
    // Signals and accessors
    // =====================================================================

    /// NMI line level for the CPU.
    #[must_use]
    pub fn nmi_line(&self) -> bool {
        self.ledger.is_active() && !self.ledger.has_race() && self.ctrl.nmi_enabled()
    }

    /// One-shot A12 rising-edge flag for the mapper.
    pub fn take_a12_rising(&mut self) -> bool {
        core::mem::take(&mut self.a12_rising)
    }

    /// Frame completed on the last dot of the pre-render scanline.
    #[must_use]
    pub fn frame_complete(&self) -> bool {
        self.frame_complete
    }

    /// Acknowledge the completed frame.
    pub fn clear_frame_complete(&mut self) {
        self.frame_complete = false;
    }

    /// Rendered frame, 256x240 ARGB pixels.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// Current scanline.
    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.timing.scanline()
    }

    /// Current dot.
    #[must_use]
    pub fn dot(&self) -> u16 {
        self.timing.dot()
    }

    /// Frame counter.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.timing.frame()
    }

    /// VBlank ledger (timestamps and derivations).
    #[must_use]
    pub fn vblank_ledger(&self) -> &VBlankLedger {
        &self.ledger
    }

    /// Rendering enabled in PPUMASK?
    #[must_use]
    pub fn rendering_enabled(&self) -> bool {
        self.mask.rendering_enabled()
    }

    /// Rendering was enabled at least once during the current frame.
    #[must_use]
    pub fn rendering_was_enabled(&self) -> bool {
        self.rendering_was_enabled
    }

    /// Sprite 0 hit flag.
    #[must_use]
    pub fn sprite_zero_hit(&self) -> bool {
        self.sprite_zero_hit
    }

    /// Warmup window passed (or skipped by a warm reset)?
    #[must_use]
    pub fn warmup_complete(&self) -> bool {
        self.warmup_complete
    }

    /// OAMADDR (for DMA wrap behavior checks).
    #[must_use]
    pub fn oam_addr(&self) -> u8 {
        self.oam.addr()
    }

    /// Change nametable mirroring (cartridge load / mapper control).
    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.vram.set_mirroring(mirroring);
    }

    // =====================================================================
    // Reset
    // =====================================================================

    /// Cold power-on: everything cleared, warmup pending.
    pub fn power_on(&mut self) {
        self.reset_common();
        self.oam.reset();
        self.vram.reset();
        self.warmup_complete = false;
        log::debug!("PPU cold power-on, warmup pending");
    }

    /// Warm reset: memory survives, warmup treated as already complete.
    pub fn reset(&mut self) {
        self.reset_common();
        self.warmup_complete = true;
        log::debug!("PPU warm reset");
    }

    fn reset_common(&mut self) {
        self.ctrl = PpuCtrl::empty();
        self.mask = PpuMask::empty();
        self.sprite_zero_hit = false;
        self.sprite_overflow = false;
        self.scroll = Scroll::new();
        self.secondary_oam.clear();
        self.background.reset();
        self.sprite_unit.reset();
        self.sprite_pattern_lo = 0;
        self.timing.reset();
        self.ledger.reset();
        self.frame_complete = false;
        self.read_buffer = 0;
        self.open_bus = 0;
        self.open_bus_decay = 0;
        self.last_a12 = false;
        self.a12_rising = false;
        self.rendering_was_enabled = false;
    }

    // =====================================================================
    // Open bus and A12 plumbing
    // =====================================================================

    fn refresh_open_bus(&mut self, value: u8) {
        self.open_bus = value;
        self.open_bus_decay = OPEN_BUS_DECAY_FRAMES;
    }

    /// Track a 14-bit address appearing on the PPU address bus.
    fn track_a12(&mut self, addr: u16) {
        let high = addr & 0x1000 != 0;
        if high && !self.last_a12 {
            self.a12_rising = true;
        }
        self.last_a12 = high;
    }

    fn chr_read(&mut self, bus: &mut impl PpuBus, addr: u16) -> u8 {
        self.track_a12(addr);
        bus.read_chr(addr & 0x1FFF)
    }

    // =====================================================================
    // Register file ($2000-$2007)
    // =====================================================================

    /// CPU read of a PPU register. `now` is the current master cycle.
    pub fn read_register(&mut self, addr: u16, now: u64, bus: &mut impl PpuBus) -> u8 {
        match addr & 0x07 {
            // Write-only registers return the decaying open bus
            0 | 1 | 3 | 5 | 6 => self.open_bus,

            // $2002: PPUSTATUS
            2 => {
                // A read on the exact set cycle races the flag: it reads 0
                // and suppresses the NMI for this span.
                if self.ledger.is_active() && now == self.ledger.last_set_cycle() {
                    self.ledger.record_race(now);
                }

                let mut status = self.open_bus & 0x1F;
                if self.ledger.is_visible() {
                    status |= 0x80;
                }
                if self.sprite_zero_hit {
                    status |= 0x40;
                }
                if self.sprite_overflow {
                    status |= 0x20;
                }

                self.ledger.record_status_read(now);
                self.scroll.reset_toggle();

                // Only bits 7-5 are driven; the decay counter is left alone
                // so bits 4-0 keep decaying.
                self.open_bus = status;
                status
            }

            // $2004: OAMDATA
            4 => {
                let raw = self.oam.read();
                // Attribute bytes drive only bits 7-5 and 1-0
                let value = if self.oam.at_attribute_byte() {
                    raw | (self.open_bus & 0x1C)
                } else {
                    raw
                };
                self.refresh_open_bus(value);
                value
            }

            // $2007: PPUDATA (buffered except palette)
            _ => {
                let addr = self.scroll.vram_addr() & 0x3FFF;

                let value = if addr >= 0x3F00 {
                    // Palette reads are immediate; bits 7-6 come from open
                    // bus. The buffer refills from the nametable underneath.
                    self.read_buffer = self.vram.read_nametable(addr - 0x1000);
                    (self.vram.read_palette(addr) & 0x3F) | (self.open_bus & 0xC0)
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = if addr < 0x2000 {
                        self.chr_read(bus, addr)
                    } else {
                        self.vram.read_nametable(addr)
                    };
                    buffered
                };

                self.scroll.increment_vram(self.ctrl.vram_increment());
                self.track_a12(self.scroll.vram_addr() & 0x3FFF);
                self.refresh_open_bus(value);
                value
            }
        }
    }

    /// CPU write of a PPU register. `now` is the current master cycle.
    pub fn write_register(&mut self, addr: u16, value: u8, now: u64, bus: &mut impl PpuBus) {
        self.refresh_open_bus(value);
        if !self.warmup_complete && now / 3 >= WARMUP_CPU_CYCLES {
            self.warmup_complete = true;
        }

        match addr & 0x07 {
            // $2000: PPUCTRL (ignored until warmup completes)
            0 => {
                if !self.warmup_complete {
                    return;
                }
                self.ctrl = PpuCtrl::from_bits_truncate(value);
                self.scroll.write_ctrl(value);
            }

            // $2001: PPUMASK (ignored until warmup completes)
            1 => {
                if !self.warmup_complete {
                    return;
                }
                self.mask = PpuMask::from_bits_truncate(value);
            }

            // $2002: read-only
            2 => {}

            // $2003: OAMADDR
            3 => self.oam.set_addr(value),

            // $2004: OAMDATA (auto-increments OAMADDR)
            4 => self.oam.write(value),

            // $2005: PPUSCROLL
            5 => self.scroll.write_scroll(value),

            // $2006: PPUADDR; the second write moves v, which shows up on
            // the address bus
            6 => {
                self.scroll.write_addr(value);
                if !self.scroll.write_toggle() {
                    self.track_a12(self.scroll.vram_addr() & 0x3FFF);
                }
            }

            // $2007: PPUDATA
            _ => {
                let addr = self.scroll.vram_addr() & 0x3FFF;
                if addr < 0x2000 {
                    self.track_a12(addr);
                    bus.write_chr(addr, value);
                } else if addr < 0x3F00 {
                    self.vram.write_nametable(addr, value);
                } else {
                    self.vram.write_palette(addr, value);
                }
                self.scroll.increment_vram(self.ctrl.vram_increment());
                self.track_a12(self.scroll.vram_addr() & 0x3FFF);
            }
        }
    }

    /// Register read with zero side effects (debugger).
    #[must_use]
    pub fn peek_register(&self, addr: u16) -> u8 {
        match addr & 0x07 {
            2 => {
                let mut status = self.open_bus & 0x1F;
                if self.ledger.is_visible() {
                    status |= 0x80;
                }
                if self.sprite_zero_hit {
                    status |= 0x40;
                }
                if self.sprite_overflow {
                    status |= 0x20;
                }
                status
            }
            4 => self.oam.read(),
            7 => self.read_buffer,
            _ => self.open_bus,
        }
    }

    // =====================================================================
    // Per-tick pipeline
    // =====================================================================

    /// Advance the dot clock (orchestrator step before the CPU slice).
    /// Owns the odd-frame skip; sets `frame_complete` on wrap.
    pub fn clock_advance(&mut self) {
        if self.timing.advance(self.mask.rendering_enabled()) {
            self.frame_complete = true;
            self.rendering_was_enabled = false;
            // Open bus decays after ~60 frames without refresh
            if self.open_bus_decay > 0 {
                self.open_bus_decay -= 1;
                if self.open_bus_decay == 0 {
                    self.open_bus = 0;
                }
            }
        }
    }

    /// Perform the current dot's work. `now` is the master cycle of this
    /// tick (the timestamp recorded for VBlank events).
    pub fn render_dot(&mut self, now: u64, bus: &mut impl PpuBus) {
        if !self.warmup_complete && now / 3 >= WARMUP_CPU_CYCLES {
            self.warmup_complete = true;
        }

        let rendering = self.mask.rendering_enabled();
        if rendering {
            self.rendering_was_enabled = true;
        }

        // VBlank edges
        if self.timing.is_vblank_set_dot() {
            self.ledger.record_vblank_set(now);
            // A $2002 read that landed earlier in this same master cycle
            // (the CPU runs before the dot's work) races the set
            if self.ledger.last_read_cycle() == now && now != 0 {
                self.ledger.record_race(now);
            }
        }
        if self.timing.is_vblank_clear_dot() {
            self.ledger.record_vblank_span_end(now);
            self.sprite_zero_hit = false;
            self.sprite_overflow = false;
        }

        if rendering && self.timing.is_rendering_scanline() {
            self.run_background_pipeline(bus);
            self.run_sprite_pipeline(bus);
        }

        // Pixel output (backdrop when rendering is disabled)
        if self.timing.is_visible_scanline() && self.timing.is_visible_dot() {
            if rendering {
                self.compose_pixel();
            } else {
                let x = usize::from(self.timing.dot()) - 1;
                let y = usize::from(self.timing.scanline());
                let color = self.apply_greyscale(self.vram.pixel_color(0, 0));
                self.framebuffer[y * FRAME_WIDTH + x] = NES_PALETTE[usize::from(color & 0x3F)];
            }
        }
    }

    /// Background fetches, shifter reloads, and scroll updates.
    fn run_background_pipeline(&mut self, bus: &mut impl PpuBus) {
        let dot = self.timing.dot();

        if self.timing.is_visible_dot() || self.timing.is_prefetch_dot() {
            self.background.shift();

            match dot % 8 {
                1 => {
                    let addr = self.scroll.nametable_addr();
                    self.track_a12(addr);
                    let tile = self.vram.read_nametable(addr);
                    self.background.set_nametable_byte(tile);
                }
                3 => {
                    let addr = self.scroll.attribute_addr();
                    self.track_a12(addr);
                    let attr = self.vram.read_nametable(addr);
                    self.background
                        .set_attribute_byte(attr, self.scroll.coarse_x(), self.scroll.coarse_y());
                }
                5 => {
                    let addr = self.bg_pattern_addr();
                    let lo = self.chr_read(bus, addr);
                    self.background.set_pattern_low(lo);
                }
                7 => {
                    let addr = self.bg_pattern_addr() + 8;
                    let hi = self.chr_read(bus, addr);
                    self.background.set_pattern_high(hi);
                }
                0 => {
                    self.background.reload_shifters();
                    self.scroll.increment_x();
                }
                _ => {}
            }

            if dot == 256 {
                self.scroll.increment_y();
            }
        }

        if self.timing.is_hori_copy_dot() {
            self.scroll.copy_horizontal();
        }
        if self.timing.is_vert_copy_dot() {
            self.scroll.copy_vertical();
        }

        // Dummy nametable fetches at dots 338 and 340
        if self.timing.is_dummy_nt_fetch_dot() {
            let addr = self.scroll.nametable_addr();
            self.track_a12(addr);
            let _ = self.vram.read_nametable(addr);
        }
    }

    fn bg_pattern_addr(&self) -> u16 {
        self.ctrl.bg_table_addr()
            + u16::from(self.background.nametable_byte()) * 16
            + u16::from(self.scroll.fine_y())
    }

    /// Secondary OAM clear, evaluation, and the dots 257-320 fetch pipeline.
    fn run_sprite_pipeline(&mut self, bus: &mut impl PpuBus) {
        let dot = self.timing.dot();
        let scanline = self.timing.scanline();

        if self.timing.is_visible_scanline() {
            // Dots 1-64 clear secondary OAM to $FF; modeled at dot 1
            if dot == 1 {
                self.secondary_oam.clear();
            }

            // Dot 65: select up to 8 sprites for the NEXT scanline,
            // capturing their OAM source indices
            if self.timing.is_sprite_eval_dot() {
                let overflow = SpriteUnit::evaluate(
                    &self.oam,
                    scanline,
                    self.ctrl.sprite_height(),
                    &mut self.secondary_oam,
                );
                if overflow {
                    self.sprite_overflow = true;
                }
            }
        }

        if self.timing.is_sprite_fetch_dot() {
            if dot == 257 {
                if self.timing.is_prerender_scanline() {
                    // No evaluation precedes line 0; it renders no sprites
                    self.secondary_oam.clear();
                }
                self.sprite_unit.load_from_secondary(&self.secondary_oam);
                // OAMADDR is forced to 0 during sprite fetches
                self.oam.set_addr(0);
            }

            let fetch = dot - 257;
            let slot = (fetch / 8) as u8;
            let step = fetch % 8;

            match step {
                // Garbage nametable/attribute reads; these pull A12 low
                // between sprite pattern fetches, which is what gives the
                // MMC3 counter its one-clock-per-slot cadence
                0 | 2 => {
                    let addr = self.scroll.nametable_addr();
                    self.track_a12(addr);
                    let _ = self.vram.read_nametable(addr);
                }
                4 => {
                    let addr = self.sprite_fetch_addr(slot, scanline);
                    self.sprite_pattern_lo = self.chr_read(bus, addr);
                }
                6 => {
                    let addr = self.sprite_fetch_addr(slot, scanline) + 8;
                    let hi = self.chr_read(bus, addr);
                    self.load_sprite_slot(slot, hi);
                }
                _ => {}
            }
        }
    }

    /// Pattern address for a sprite fetch slot. Empty slots fetch tile $FF
    /// (the cleared secondary OAM value), which keeps the A12 activity the
    /// mapper's IRQ counter depends on.
    fn sprite_fetch_addr(&self, slot: u8, scanline: u16) -> u16 {
        let height = self.ctrl.sprite_height();
        match self.secondary_oam.sprite(slot) {
            Some(sprite) => {
                let row = scanline.saturating_sub(u16::from(sprite.y)).min(height - 1);
                sprite_pattern_addr(sprite, row, height, self.ctrl.sprite_table_addr())
            }
            None => {
                // Tile $FF, row 0
                if height == 16 {
                    0x1000 + u16::from(0xFEu8) * 16
                } else {
                    self.ctrl.sprite_table_addr() + u16::from(0xFFu8) * 16
                }
            }
        }
    }

    fn load_sprite_slot(&mut self, slot: u8, pattern_hi: u8) {
        if let Some(sprite) = self.secondary_oam.sprite(slot) {
            let mut lo = self.sprite_pattern_lo;
            let mut hi = pattern_hi;
            if sprite.attributes.flip_horizontal() {
                lo = lo.reverse_bits();
                hi = hi.reverse_bits();
            }
            self.sprite_unit.load_pattern(slot, lo, hi);
        } else {
            // Empty slot: keep it transparent
            self.sprite_unit.load_pattern(slot, 0, 0);
        }
    }

    /// Compose the final pixel at the current (visible) position.
    fn compose_pixel(&mut self) {
        let dot = self.timing.dot();
        let x = dot - 1;
        let y = self.timing.scanline();

        let mut bg_pattern = 0;
        let mut bg_palette = 0;
        if self.mask.show_background() && (x >= 8 || self.mask.show_bg_left()) {
            let (pattern, palette) = self.background.pixel(self.scroll.fine_x());
            bg_pattern = pattern;
            bg_palette = palette;
        }

        let sprite = if self.mask.show_sprites() && (x >= 8 || self.mask.show_sprites_left()) {
            self.sprite_unit.pixel(x)
        } else {
            None
        };

        // Sprite 0 hit: both pixels opaque, x < 255, dot >= 2, and the
        // sprite really is OAM index 0
        if let Some(pixel) = sprite {
            if pixel.is_sprite_zero && bg_pattern != 0 && x < 255 && dot >= 2 {
                self.sprite_zero_hit = true;
            }
        }

        let (pattern, palette) = match (bg_pattern, sprite) {
            (0, None) => (0, 0),
            (0, Some(pixel)) => (pixel.pattern, pixel.palette),
            (_, None) => (bg_pattern, bg_palette),
            (_, Some(pixel)) => {
                if pixel.behind_background {
                    (bg_pattern, bg_palette)
                } else {
                    (pixel.pattern, pixel.palette)
                }
            }
        };

        let color = self.apply_greyscale(self.vram.pixel_color(palette, pattern));
        self.framebuffer[usize::from(y) * FRAME_WIDTH + usize::from(x)] =
            NES_PALETTE[usize::from(color & 0x3F)];
    }

    fn apply_greyscale(&self, color: u8) -> u8 {
        if self.mask.contains(PpuMask::GREYSCALE) {
            color & 0x30
        } else {
            color
        }
    }
}
