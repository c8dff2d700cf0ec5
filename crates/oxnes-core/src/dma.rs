//! DMA engines: OAM sprite transfer and DMC sample fetch.
//!
//! Both engines run cycle-by-cycle on the CPU clock and assert the RDY
//! line while busy; the CPU treats RDY as "do not progress this cycle".
//!
//! - OAM DMA ($4014): 256 read/write pairs through the $2004 path, so a
//!   non-zero OAMADDR wraps the destination exactly like hardware. 513
//!   stall cycles from an even-cycle trigger, 514 from odd.
//! - DMC DMA: 3-4 stall cycles (halt, optional alignment, dummy, read).
//!
//! A DMC fetch arriving mid-OAM-transfer wins the bus: OAM pauses, the DMC
//! runs to completion, OAM spends one realignment cycle, then resumes from
//! the byte it was about to transfer. The interaction ledger records the
//! pause/resume cycle numbers for inspection.

use crate::bus::CpuBus;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Phase of an in-flight DMC sample fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum DmcPhase {
    /// CPU halt cycle.
    Halt,
    /// Extra cycle to reach a read-aligned cycle.
    Align,
    /// Dummy cycle.
    Dummy,
    /// The actual sample byte read.
    Read,
}

/// OAM DMA transfer state.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct OamDma {
    active: bool,
    page: u8,
    /// Bytes transferred so far (0-255).
    offset: u16,
    /// Byte latched by the read half of the current pair.
    latch: u8,
    read_phase: bool,
    /// Leading wait cycles (1 even-aligned, 2 odd-aligned).
    wait_cycles: u8,
    paused: bool,
    start_cycle: u64,
}

/// DMC fetch state.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct DmcDma {
    phase: Option<DmcPhase>,
    address: u16,
}

/// Cycle log of DMC/OAM interactions.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InteractionLedger {
    /// CPU cycle the last DMC fetch began stalling.
    pub dmc_started: u64,
    /// CPU cycle the last DMC fetch completed.
    pub dmc_finished: u64,
    /// CPU cycle OAM DMA last paused for a DMC fetch.
    pub oam_paused: u64,
    /// CPU cycle OAM DMA last resumed.
    pub oam_resumed: u64,
    /// OAM still owes a realignment cycle after the DMC finished.
    pub realign_pending: bool,
}

/// The two DMA engines plus their interaction ledger.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dma {
    oam: OamDma,
    dmc: DmcDma,
    /// DMC/OAM interaction timestamps.
    pub ledger: InteractionLedger,
}

impl Dma {
    /// Idle engines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// $4014 write: begin an OAM transfer from `page << 8`.
    pub fn begin_oam(&mut self, page: u8, cpu_cycle: u64) {
        self.oam = OamDma {
            active: true,
            page,
            offset: 0,
            latch: 0,
            read_phase: true,
            wait_cycles: if cpu_cycle % 2 == 1 { 2 } else { 1 },
            paused: false,
            start_cycle: cpu_cycle,
        };
        log::trace!("OAM DMA from ${page:02X}00 at CPU cycle {cpu_cycle}");
    }

    /// Composite RDY output: the CPU stalls while either engine is busy.
    #[must_use]
    pub fn rdy_line(&self) -> bool {
        self.oam.active || self.dmc.phase.is_some()
    }

    /// OAM transfer in flight?
    #[must_use]
    pub fn oam_active(&self) -> bool {
        self.oam.active
    }

    /// CPU cycle the OAM transfer was triggered on.
    #[must_use]
    pub fn oam_start_cycle(&self) -> u64 {
        self.oam.start_cycle
    }

    /// Run one CPU cycle of DMA work.
    pub fn step(&mut self, bus: &mut CpuBus, cpu_cycle: u64) {
        // A DMC fetch request preempts everything
        if self.dmc.phase.is_none() && bus.apu.dmc_needs_sample() {
            self.dmc.phase = Some(DmcPhase::Halt);
            self.dmc.address = bus.apu.dmc_sample_address();
            self.ledger.dmc_started = cpu_cycle;
            if self.oam.active && !self.oam.paused {
                self.oam.paused = true;
                self.ledger.oam_paused = cpu_cycle;
            }
        }

        if let Some(phase) = self.dmc.phase {
            match phase {
                DmcPhase::Halt => {
                    self.dmc.phase = Some(if cpu_cycle % 2 == 1 {
                        DmcPhase::Align
                    } else {
                        DmcPhase::Dummy
                    });
                }
                DmcPhase::Align => self.dmc.phase = Some(DmcPhase::Dummy),
                DmcPhase::Dummy => self.dmc.phase = Some(DmcPhase::Read),
                DmcPhase::Read => {
                    let value = match bus.dmc_sample_hook {
                        Some(hook) => hook(self.dmc.address),
                        None => bus.read(self.dmc.address),
                    };
                    bus.apu.dmc_complete_fetch(value);
                    self.dmc.phase = None;
                    self.ledger.dmc_finished = cpu_cycle;
                    if self.oam.paused {
                        self.ledger.realign_pending = true;
                    }
                }
            }
            return;
        }

        if !self.oam.active {
            return;
        }

        if self.oam.paused {
            // The cycle after the DMC releases the bus realigns the
            // read/write cadence; no byte moves.
            self.oam.paused = false;
            self.ledger.realign_pending = false;
            self.ledger.oam_resumed = cpu_cycle;
            return;
        }

        if self.oam.wait_cycles > 0 {
            self.oam.wait_cycles -= 1;
            return;
        }

        if self.oam.read_phase {
            let addr = (u16::from(self.oam.page) << 8) | self.oam.offset;
            self.oam.latch = bus.read(addr);
            self.oam.read_phase = false;
        } else {
            // Write through the OAMDATA path so OAMADDR wrap applies
            bus.write(0x2004, self.oam.latch);
            self.oam.read_phase = true;
            self.oam.offset += 1;
            if self.oam.offset == 256 {
                self.oam.active = false;
            }
        }
    }

    /// Abort all transfers (reset).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
