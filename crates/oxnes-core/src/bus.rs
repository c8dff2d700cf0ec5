//! CPU memory bus.
//!
//! Routes CPU addresses to work RAM, PPU registers, APU/IO registers,
//! controllers, and the cartridge, with open-bus behavior on the undriven
//! ranges:
//!
//! ```text
//! $0000-$1FFF  work RAM (2KB, mirrored every $0800)
//! $2000-$3FFF  PPU registers (mirrored every 8 bytes)
//! $4000-$4013  APU channel registers (write only)
//! $4014        OAM DMA trigger
//! $4015        APU status (internal open bus only)
//! $4016-$4017  controllers (read) / strobe + frame counter (write)
//! $4018-$401F  disabled test registers
//! $4020-$FFFF  cartridge; test-RAM fallback when no cartridge is loaded
//! ```

use crate::controller::Controller;
use crate::open_bus::OpenBus;
use crate::ram::{POWER_ON_RAM, WRAM_SIZE};
use oxnes_apu::Apu;
use oxnes_mappers::Cartridge;
use oxnes_ppu::{Ppu, PpuBus};

/// Test-RAM standing in for a cartridge: a PRG-RAM window at $6000-$7FFF
/// and flat RAM across $8000-$FFFF.
pub struct TestRam {
    prg_ram: Box<[u8; 0x2000]>,
    prg: Box<[u8; 0x8000]>,
}

impl TestRam {
    /// Zeroed test RAM.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prg_ram: Box::new([0; 0x2000]),
            prg: Box::new([0; 0x8000]),
        }
    }

    fn read(&self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.prg_ram[(addr - 0x6000) as usize]),
            0x8000..=0xFFFF => Some(self.prg[(addr - 0x8000) as usize]),
            _ => None,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize] = value,
            0x8000..=0xFFFF => self.prg[(addr - 0x8000) as usize] = value,
            _ => {}
        }
    }
}

impl Default for TestRam {
    fn default() -> Self {
        Self::new()
    }
}

/// CHR-side adapter handing the PPU its pattern-table accesses.
struct ChrBus<'a> {
    cartridge: Option<&'a mut Cartridge>,
}

impl PpuBus for ChrBus<'_> {
    fn read_chr(&mut self, addr: u16) -> u8 {
        self.cartridge.as_ref().map_or(0, |cart| cart.ppu_read(addr))
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        if let Some(cart) = self.cartridge.as_mut() {
            cart.ppu_write(addr, value);
        }
    }
}

/// The CPU-visible system bus.
pub struct CpuBus {
    /// 2KB work RAM.
    pub ram: [u8; WRAM_SIZE],
    /// Picture processing unit.
    pub ppu: Ppu,
    /// Audio processing unit.
    pub apu: Apu,
    /// Loaded cartridge, if any.
    pub cartridge: Option<Cartridge>,
    /// Test-RAM fallback used when no cartridge is present.
    pub test_ram: Option<TestRam>,
    /// Controller ports.
    pub controllers: [Controller; 2],
    /// External/internal open-bus latch.
    pub open_bus: OpenBus,
    /// Host override for DMC sample fetches; `None` reads the bus.
    pub dmc_sample_hook: Option<fn(u16) -> u8>,
    /// Master cycle of the in-flight tick (PPU register timestamps).
    now: u64,
    /// $4014 write latched until the orchestrator starts the transfer.
    oam_dma_request: Option<u8>,
    /// Last CPU-visible access, drained by the orchestrator for the
    /// debugger's watchpoints.
    last_access: Option<(u16, u8, bool)>,
}

impl CpuBus {
    /// Bus with power-on RAM pattern and no cartridge.
    #[must_use]
    pub fn new(ppu: Ppu, apu: Apu) -> Self {
        Self {
            ram: POWER_ON_RAM,
            ppu,
            apu,
            cartridge: None,
            test_ram: None,
            controllers: [Controller::new(); 2],
            open_bus: OpenBus::new(),
            dmc_sample_hook: None,
            now: 0,
            oam_dma_request: None,
            last_access: None,
        }
    }

    /// Update the master-cycle timestamp used for PPU register traffic.
    pub fn set_now(&mut self, now: u64) {
        self.now = now;
    }

    /// Take the pending $4014 request, if any.
    pub fn take_oam_dma_request(&mut self) -> Option<u8> {
        self.oam_dma_request.take()
    }

    /// Take the last CPU memory access for watchpoint evaluation.
    pub fn take_last_access(&mut self) -> Option<(u16, u8, bool)> {
        self.last_access.take()
    }

    /// Advance the PPU's dot clock.
    pub fn ppu_clock_advance(&mut self) {
        self.ppu.clock_advance();
    }

    /// Run the current PPU dot, then forward any A12 rising edge to the
    /// cartridge.
    pub fn ppu_render_dot(&mut self, now: u64) {
        let Self {
            ppu, cartridge, ..
        } = self;
        let mut chr = ChrBus {
            cartridge: cartridge.as_mut(),
        };
        ppu.render_dot(now, &mut chr);

        if self.ppu.take_a12_rising() {
            if let Some(cart) = self.cartridge.as_mut() {
                cart.ppu_a12_rising();
            }
        }
    }

    /// Poll the mapper IRQ line (once per CPU tick).
    pub fn tick_mapper_irq(&mut self) -> bool {
        self.cartridge
            .as_mut()
            .is_some_and(oxnes_mappers::Cartridge::tick_irq)
    }

    /// Read a byte, with all hardware side effects.
    pub fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            0x2000..=0x3FFF => {
                let now = self.now;
                let Self {
                    ppu, cartridge, ..
                } = self;
                let mut chr = ChrBus {
                    cartridge: cartridge.as_mut(),
                };
                ppu.read_register(addr, now, &mut chr)
            }

            // $4015 is handled below; everything else in the APU range is
            // write-only and reads as open bus
            0x4000..=0x4014 => self.open_bus.get(),

            0x4015 => {
                let status = self.apu.read_status();
                // The $4015 read does not drive the external bus
                self.open_bus.set_internal_only(status);
                self.last_access = Some((addr, status, false));
                return status;
            }

            0x4016 => {
                let bit = self.controllers[0].read();
                bit | (self.open_bus.get() & 0xE0)
            }
            0x4017 => {
                let bit = self.controllers[1].read();
                bit | (self.open_bus.get() & 0xE0)
            }

            0x4018..=0x401F => self.open_bus.get(),

            0x4020..=0xFFFF => {
                if let Some(cart) = self.cartridge.as_ref() {
                    cart.cpu_read(addr)
                } else if let Some(test_ram) = self.test_ram.as_ref() {
                    test_ram.read(addr).unwrap_or_else(|| self.open_bus.get())
                } else {
                    self.open_bus.get()
                }
            }
        };

        self.open_bus.set(value);
        self.last_access = Some((addr, value, false));
        value
    }

    /// Write a byte, with all hardware side effects.
    pub fn write(&mut self, addr: u16, value: u8) {
        self.open_bus.set(value);
        self.last_access = Some((addr, value, true));

        match addr {
            0x0000..=0x1FFF => {
                self.ram[(addr & 0x07FF) as usize] = value;
            }

            0x2000..=0x3FFF => {
                let now = self.now;
                let Self {
                    ppu, cartridge, ..
                } = self;
                let mut chr = ChrBus {
                    cartridge: cartridge.as_mut(),
                };
                ppu.write_register(addr, value, now, &mut chr);
            }

            0x4000..=0x4013 | 0x4015 => self.apu.write(addr, value),

            0x4014 => {
                self.oam_dma_request = Some(value);
            }

            0x4016 => {
                self.controllers[0].write_strobe(value);
                self.controllers[1].write_strobe(value);
            }

            // $4017 write goes to the APU frame counter, not the controller
            0x4017 => self.apu.write(addr, value),

            0x4018..=0x401F => {}

            0x4020..=0xFFFF => {
                if let Some(cart) = self.cartridge.as_mut() {
                    cart.cpu_write(addr, value);
                } else if let Some(test_ram) = self.test_ram.as_mut() {
                    test_ram.write(addr, value);
                }
            }
        }
    }

    /// Read with zero side effects: no open-bus update, no $2002 clear, no
    /// $4015 IRQ clear, no $2007 buffer update.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu.peek_register(addr),
            0x4015 => self.apu.peek_status(),
            0x4016 => self.controllers[0].peek() | (self.open_bus.get() & 0xE0),
            0x4017 => self.controllers[1].peek() | (self.open_bus.get() & 0xE0),
            0x4000..=0x401F => self.open_bus.get(),
            0x4020..=0xFFFF => {
                if let Some(cart) = self.cartridge.as_ref() {
                    cart.cpu_read(addr)
                } else if let Some(test_ram) = self.test_ram.as_ref() {
                    test_ram.read(addr).unwrap_or_else(|| self.open_bus.get())
                } else {
                    self.open_bus.get()
                }
            }
        }
    }
}

impl oxnes_cpu::Bus for CpuBus {
    fn read(&mut self, addr: u16) -> u8 {
        CpuBus::read(self, addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        CpuBus::write(self, addr, value);
    }
}
