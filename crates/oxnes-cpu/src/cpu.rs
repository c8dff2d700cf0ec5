//! 6502 CPU microstep engine.
//!
//! The CPU advances one cycle per [`Cpu::tick`] call. Each cycle performs at
//! most one bus access and is scripted by the current macro-state
//! ([`ExecState`]) plus an intra-state step counter. Instruction semantics
//! live in [`crate::ops`] as pure delta functions; this module only sequences
//! bus traffic and applies deltas.
//!
//! Interrupt behavior:
//! - NMI is edge-latched from the `nmi_line` input and polled at opcode fetch.
//! - IRQ is level-sampled, masked by the I flag with the one-instruction
//!   latency of CLI/SEI/PLP (RTI applies its restored I flag immediately).
//! - RESET runs the interrupt sequence with stack writes suppressed.
//! - BRK pushes P with B=1; a pending NMI hijacks BRK's vector while the
//!   pushed byte keeps B=1.
//!
//! Known deviation: absolute,X/Y and (zp),Y *reads* always spend the
//! address-fixup cycle, costing one cycle extra when no page is crossed.
//! `page_crossed` still records whether the cross actually happened.

use crate::addressing::AddrMode;
use crate::opcodes::{addr_mode, mnemonic};
use crate::ops::{self, OpDelta, Registers};
use crate::state::{ExecState, InstrClass, PendingInterrupt};
use crate::status::Status;
use crate::vectors;

/// Memory bus seen by the CPU.
pub trait Bus {
    /// Read a byte. May have side effects (PPU/APU registers).
    fn read(&mut self, addr: u16) -> u8;
    /// Write a byte.
    fn write(&mut self, addr: u16, value: u8);
}

/// Cycle-accurate 6502 CPU.
#[derive(Debug, Clone)]
pub struct Cpu {
    /// Programmer-visible registers.
    pub regs: Registers,
    /// Total cycles executed.
    cycles: u64,

    // State machine
    state: ExecState,
    step: u8,
    opcode: u8,
    mode: AddrMode,
    class: InstrClass,
    operand_lo: u8,
    operand_hi: u8,
    base_addr: u16,
    effective_addr: u16,
    temp: u8,
    page_crossed: bool,
    halted: bool,

    // Interrupt plumbing
    pending: PendingInterrupt,
    interrupt_vector: u16,
    nmi_line: bool,
    nmi_latched: bool,
    irq_line: bool,
    rdy_line: bool,
    /// I flag as sampled at the previous opcode fetch (IRQ poll latency).
    prev_irq_inhibit: bool,
    /// Skip the NMI poll at the next opcode fetch (set when BRK completes).
    suppress_nmi_poll: bool,

    /// Last value seen on the data bus.
    data_latch: u8,
}

impl Cpu {
    /// Create a CPU in the power-on state. PC is loaded by [`Cpu::reset`],
    /// whose three stack decrements take SP from $00 to the familiar $FD.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers {
                a: 0,
                x: 0,
                y: 0,
                sp: 0x00,
                pc: 0,
                status: Status::POWER_ON,
            },
            cycles: 0,
            state: ExecState::FetchOpcode,
            step: 0,
            opcode: 0,
            mode: AddrMode::Implied,
            class: InstrClass::Read,
            operand_lo: 0,
            operand_hi: 0,
            base_addr: 0,
            effective_addr: 0,
            temp: 0,
            page_crossed: false,
            halted: false,
            pending: PendingInterrupt::None,
            interrupt_vector: 0,
            nmi_line: false,
            nmi_latched: false,
            irq_line: false,
            rdy_line: false,
            prev_irq_inhibit: true,
            suppress_nmi_poll: false,
            data_latch: 0,
        }
    }

    /// Run the RESET sequence synchronously: SP drops by 3 with no stack
    /// writes, I is set, PC loads from $FFFC/$FFFD, 7 cycles elapse.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.regs.sp = self.regs.sp.wrapping_sub(3);
        self.regs.status.insert(Status::I);
        let lo = bus.read(vectors::RESET);
        let hi = bus.read(vectors::RESET.wrapping_add(1));
        self.regs.pc = u16::from_le_bytes([lo, hi]);
        self.cycles += 7;

        self.state = ExecState::FetchOpcode;
        self.step = 0;
        self.halted = false;
        self.pending = PendingInterrupt::None;
        self.nmi_latched = false;
        self.irq_line = false;
        self.rdy_line = false;
        self.prev_irq_inhibit = true;
        self.suppress_nmi_poll = false;
        log::debug!("CPU reset: PC=${:04X}", self.regs.pc);
    }

    /// Drive the NMI input line. A 0 -> 1 transition latches an NMI.
    pub fn set_nmi_line(&mut self, level: bool) {
        if level && !self.nmi_line {
            self.nmi_latched = true;
        }
        self.nmi_line = level;
    }

    /// Drive the IRQ input line (level-triggered).
    pub fn set_irq_line(&mut self, level: bool) {
        self.irq_line = level;
    }

    /// Drive the RDY input. `true` stalls the instruction state machine.
    pub fn set_rdy_line(&mut self, stall: bool) {
        self.rdy_line = stall;
    }

    /// Total cycles executed.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// True when the CPU hit a JAM opcode; only RESET recovers.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// True at an instruction boundary (next tick fetches an opcode).
    #[must_use]
    pub fn at_instruction_boundary(&self) -> bool {
        self.state == ExecState::FetchOpcode
    }

    /// Opcode currently executing.
    #[must_use]
    pub fn current_opcode(&self) -> u8 {
        self.opcode
    }

    /// Whether the current instruction crossed a page during indexing.
    #[must_use]
    pub fn page_crossed(&self) -> bool {
        self.page_crossed
    }

    /// Last value observed on the data bus.
    #[must_use]
    pub fn data_latch(&self) -> u8 {
        self.data_latch
    }

    /// Execute one CPU cycle. Returns `true` when an instruction (or
    /// interrupt sequence) completed on this cycle.
    pub fn tick(&mut self, bus: &mut impl Bus) -> bool {
        self.cycles += 1;

        // RDY stall: reads/writes already issued have completed; just don't
        // progress the state machine.
        if self.rdy_line || self.halted {
            return false;
        }

        match self.state {
            ExecState::FetchOpcode => self.tick_fetch(bus),
            ExecState::FetchOperandLo => self.tick_operand(bus),
            ExecState::Execute => self.tick_execute(bus),
            ExecState::InterruptSequence => self.tick_interrupt(bus),
        }
    }

    fn read(&mut self, bus: &mut impl Bus, addr: u16) -> u8 {
        let value = bus.read(addr);
        self.data_latch = value;
        value
    }

    fn write(&mut self, bus: &mut impl Bus, addr: u16, value: u8) {
        self.data_latch = value;
        bus.write(addr, value);
    }

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        self.write(bus, 0x0100 | u16::from(self.regs.sp), value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn finish(&mut self) {
        self.state = ExecState::FetchOpcode;
        self.step = 0;
    }

    fn apply(&mut self, delta: &OpDelta) {
        if let Some(a) = delta.a {
            self.regs.a = a;
        }
        if let Some(x) = delta.x {
            self.regs.x = x;
        }
        if let Some(y) = delta.y {
            self.regs.y = y;
        }
        if let Some(sp) = delta.sp {
            self.regs.sp = sp;
        }
        if let Some(status) = delta.status {
            self.regs.status = status;
        }
        if delta.halt {
            self.halted = true;
            log::warn!(
                "CPU jammed by {} (${:02X}) at ${:04X}",
                mnemonic(self.opcode),
                self.opcode,
                self.regs.pc.wrapping_sub(1)
            );
        }
    }

    /// Opcode fetch cycle. Interrupts latched before this cycle win over the
    /// fetch and redirect into the interrupt sequence.
    fn tick_fetch(&mut self, bus: &mut impl Bus) -> bool {
        let inhibit_now = self.regs.status.contains(Status::I);

        if self.nmi_latched && !self.suppress_nmi_poll {
            self.nmi_latched = false;
            self.prev_irq_inhibit = true;
            self.begin_interrupt(PendingInterrupt::Nmi);
            return self.tick_interrupt(bus);
        }
        self.suppress_nmi_poll = false;

        if self.irq_line && !self.prev_irq_inhibit {
            self.prev_irq_inhibit = true;
            self.begin_interrupt(PendingInterrupt::Irq);
            return self.tick_interrupt(bus);
        }

        self.prev_irq_inhibit = inhibit_now;

        let pc = self.regs.pc;
        self.opcode = self.read(bus, pc);
        self.regs.pc = pc.wrapping_add(1);

        self.mode = addr_mode(self.opcode);
        self.class = InstrClass::from_opcode(self.opcode);
        self.operand_lo = 0;
        self.operand_hi = 0;
        self.base_addr = 0;
        self.effective_addr = 0;
        self.temp = 0;
        self.page_crossed = false;
        self.step = 0;

        self.state = if self.mode.has_operand() {
            ExecState::FetchOperandLo
        } else {
            ExecState::Execute
        };
        false
    }

    fn begin_interrupt(&mut self, kind: PendingInterrupt) {
        self.pending = kind;
        self.interrupt_vector = match kind {
            PendingInterrupt::Nmi => vectors::NMI,
            PendingInterrupt::Reset => vectors::RESET,
            _ => vectors::IRQ,
        };
        self.state = ExecState::InterruptSequence;
        self.step = 0;
    }

    /// Seven-cycle interrupt sequence. RESET replaces the stack pushes with
    /// reads but still decrements SP.
    fn tick_interrupt(&mut self, bus: &mut impl Bus) -> bool {
        let is_reset = self.pending == PendingInterrupt::Reset;
        match self.step {
            0 | 1 => {
                let pc = self.regs.pc;
                let _ = self.read(bus, pc);
            }
            2 => {
                let value = (self.regs.pc >> 8) as u8;
                if is_reset {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.regs.sp = self.regs.sp.wrapping_sub(1);
                } else {
                    self.push(bus, value);
                }
            }
            3 => {
                let value = (self.regs.pc & 0xFF) as u8;
                if is_reset {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.regs.sp = self.regs.sp.wrapping_sub(1);
                } else {
                    self.push(bus, value);
                }
            }
            4 => {
                // Hardware interrupts push with B clear
                let value = self.regs.status.to_stack_byte(false);
                if is_reset {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.regs.sp = self.regs.sp.wrapping_sub(1);
                } else {
                    self.push(bus, value);
                }
                self.regs.status.insert(Status::I);
            }
            5 => {
                let vector = self.interrupt_vector;
                self.operand_lo = self.read(bus, vector);
            }
            _ => {
                let vector = self.interrupt_vector.wrapping_add(1);
                self.operand_hi = self.read(bus, vector);
                self.regs.pc = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                if is_reset {
                    self.halted = false;
                }
                self.pending = PendingInterrupt::None;
                self.finish();
                return true;
            }
        }
        self.step += 1;
        false
    }

    /// Operand fetch and address resolution, scripted per addressing mode.
    #[allow(clippy::too_many_lines)]
    fn tick_operand(&mut self, bus: &mut impl Bus) -> bool {
        match self.mode {
            AddrMode::Immediate => {
                // Operand fetch and execute share the cycle (2-cycle ops)
                let pc = self.regs.pc;
                let value = self.read(bus, pc);
                self.regs.pc = pc.wrapping_add(1);
                self.effective_addr = pc;
                let delta = ops::execute_read(self.opcode, &self.regs, value);
                self.apply(&delta);
                self.finish();
                return true;
            }

            AddrMode::ZeroPage => {
                let pc = self.regs.pc;
                self.operand_lo = self.read(bus, pc);
                self.regs.pc = pc.wrapping_add(1);
                self.effective_addr = u16::from(self.operand_lo);
                self.state = ExecState::Execute;
                self.step = 0;
            }

            AddrMode::ZeroPageX | AddrMode::ZeroPageY => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    self.operand_lo = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.base_addr = u16::from(self.operand_lo);
                    self.step = 1;
                }
                _ => {
                    // Index add happens during a dummy read of the base
                    let base = self.base_addr;
                    let _ = self.read(bus, base);
                    let index = if self.mode == AddrMode::ZeroPageX {
                        self.regs.x
                    } else {
                        self.regs.y
                    };
                    self.effective_addr = u16::from((base as u8).wrapping_add(index));
                    self.state = ExecState::Execute;
                    self.step = 0;
                }
            },

            AddrMode::Absolute => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    self.operand_lo = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.step = 1;
                }
                _ => {
                    let pc = self.regs.pc;
                    self.operand_hi = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.effective_addr = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    if self.class == InstrClass::JumpAbsolute {
                        self.regs.pc = self.effective_addr;
                        self.finish();
                        return true;
                    }
                    self.state = ExecState::Execute;
                    self.step = 0;
                }
            },

            AddrMode::AbsoluteX | AddrMode::AbsoluteY => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    self.operand_lo = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.step = 1;
                }
                1 => {
                    let pc = self.regs.pc;
                    self.operand_hi = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    let base = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    let index = if self.mode == AddrMode::AbsoluteX {
                        self.regs.x
                    } else {
                        self.regs.y
                    };
                    self.base_addr = base;
                    self.effective_addr = base.wrapping_add(u16::from(index));
                    self.page_crossed = base & 0xFF00 != self.effective_addr & 0xFF00;
                    self.step = 2;
                }
                _ => {
                    // Address fixup: read with the un-carried high byte.
                    // Taken unconditionally, see module-level deviation note.
                    let addr = (self.base_addr & 0xFF00) | (self.effective_addr & 0x00FF);
                    let _ = self.read(bus, addr);
                    self.state = ExecState::Execute;
                    self.step = 0;
                }
            },

            AddrMode::Indirect => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    self.operand_lo = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.step = 1;
                }
                1 => {
                    let pc = self.regs.pc;
                    self.operand_hi = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.base_addr = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.step = 2;
                }
                2 => {
                    let base = self.base_addr;
                    self.operand_lo = self.read(bus, base);
                    self.step = 3;
                }
                _ => {
                    // Pointer high byte wraps within the page (hardware bug)
                    let base = self.base_addr;
                    let hi_addr = (base & 0xFF00) | u16::from((base as u8).wrapping_add(1));
                    self.operand_hi = self.read(bus, hi_addr);
                    self.regs.pc = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.finish();
                    return true;
                }
            },

            AddrMode::IndexedIndirectX => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    self.temp = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.step = 1;
                }
                1 => {
                    let _ = self.read(bus, u16::from(self.temp));
                    self.base_addr = u16::from(self.temp.wrapping_add(self.regs.x));
                    self.step = 2;
                }
                2 => {
                    let ptr = self.base_addr;
                    self.operand_lo = self.read(bus, ptr);
                    self.step = 3;
                }
                _ => {
                    let ptr = u16::from((self.base_addr as u8).wrapping_add(1));
                    self.operand_hi = self.read(bus, ptr);
                    self.effective_addr = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.state = ExecState::Execute;
                    self.step = 0;
                }
            },

            AddrMode::IndirectIndexedY => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    self.temp = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.step = 1;
                }
                1 => {
                    self.operand_lo = self.read(bus, u16::from(self.temp));
                    self.step = 2;
                }
                2 => {
                    let ptr = u16::from(self.temp.wrapping_add(1));
                    self.operand_hi = self.read(bus, ptr);
                    let base = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.base_addr = base;
                    self.effective_addr = base.wrapping_add(u16::from(self.regs.y));
                    self.page_crossed = base & 0xFF00 != self.effective_addr & 0xFF00;
                    self.step = 3;
                }
                _ => {
                    let addr = (self.base_addr & 0xFF00) | (self.effective_addr & 0x00FF);
                    let _ = self.read(bus, addr);
                    self.state = ExecState::Execute;
                    self.step = 0;
                }
            },

            AddrMode::Relative => {
                let pc = self.regs.pc;
                self.temp = self.read(bus, pc);
                self.regs.pc = pc.wrapping_add(1);
                if self.branch_taken() {
                    self.state = ExecState::Execute;
                    self.step = 0;
                } else {
                    self.finish();
                    return true;
                }
            }

            AddrMode::Implied | AddrMode::Accumulator => {
                debug_assert!(false, "operand fetch entered without operand");
                self.finish();
            }
        }
        false
    }

    fn branch_taken(&self) -> bool {
        let status = self.regs.status;
        match self.opcode {
            0x10 => !status.contains(Status::N), // BPL
            0x30 => status.contains(Status::N),  // BMI
            0x50 => !status.contains(Status::V), // BVC
            0x70 => status.contains(Status::V),  // BVS
            0x90 => !status.contains(Status::C), // BCC
            0xB0 => status.contains(Status::C),  // BCS
            0xD0 => !status.contains(Status::Z), // BNE
            _ => status.contains(Status::Z),     // BEQ
        }
    }

    /// Execute-phase cycles, scripted per instruction class.
    #[allow(clippy::too_many_lines)]
    fn tick_execute(&mut self, bus: &mut impl Bus) -> bool {
        match self.class {
            InstrClass::Read => {
                let addr = self.effective_addr;
                let value = self.read(bus, addr);
                let delta = ops::execute_read(self.opcode, &self.regs, value);
                self.apply(&delta);
                self.finish();
                return true;
            }

            InstrClass::Write => {
                let delta = ops::execute_store(self.opcode, &self.regs, self.effective_addr);
                self.apply(&delta);
                if let Some(value) = delta.store {
                    let addr = self.effective_addr;
                    self.write(bus, addr, value);
                }
                self.finish();
                return true;
            }

            InstrClass::ReadModifyWrite => match self.step {
                0 => {
                    let addr = self.effective_addr;
                    self.temp = self.read(bus, addr);
                    self.step = 1;
                }
                1 => {
                    // Dummy write of the unmodified value
                    let addr = self.effective_addr;
                    let value = self.temp;
                    self.write(bus, addr, value);
                    self.step = 2;
                }
                _ => {
                    let delta = ops::execute_rmw(self.opcode, &self.regs, self.temp);
                    self.apply(&delta);
                    if let Some(value) = delta.store {
                        let addr = self.effective_addr;
                        self.write(bus, addr, value);
                    }
                    self.finish();
                    return true;
                }
            },

            InstrClass::Implied | InstrClass::Jam => {
                let pc = self.regs.pc;
                let _ = self.read(bus, pc);
                let delta = ops::execute_implied(self.opcode, &self.regs);
                self.apply(&delta);
                self.finish();
                return true;
            }

            InstrClass::Accumulator => {
                let pc = self.regs.pc;
                let _ = self.read(bus, pc);
                let delta = ops::execute_accumulator(self.opcode, &self.regs);
                self.apply(&delta);
                self.finish();
                return true;
            }

            InstrClass::Branch => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.base_addr = pc;
                    let offset = self.temp as i8;
                    self.regs.pc = pc.wrapping_add(offset as u16);
                    self.page_crossed = self.base_addr & 0xFF00 != self.regs.pc & 0xFF00;
                    if self.page_crossed {
                        self.step = 1;
                    } else {
                        self.finish();
                        return true;
                    }
                }
                _ => {
                    // PCH fixup cycle reads from the not-yet-fixed address
                    let addr = (self.base_addr & 0xFF00) | (self.regs.pc & 0x00FF);
                    let _ = self.read(bus, addr);
                    self.finish();
                    return true;
                }
            },

            InstrClass::JumpSubroutine => match self.step {
                0 => {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.step = 1;
                }
                1 => {
                    // Return address is the last byte of the JSR (RTS adds 1)
                    let value = (self.regs.pc.wrapping_sub(1) >> 8) as u8;
                    self.push(bus, value);
                    self.step = 2;
                }
                _ => {
                    let value = (self.regs.pc.wrapping_sub(1) & 0xFF) as u8;
                    self.push(bus, value);
                    self.regs.pc = self.effective_addr;
                    self.finish();
                    return true;
                }
            },

            InstrClass::ReturnSubroutine => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.step = 1;
                }
                1 => {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.step = 2;
                }
                2 => {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                    self.operand_lo = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.step = 3;
                }
                3 => {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                    self.operand_hi = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.regs.pc = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.step = 4;
                }
                _ => {
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.finish();
                    return true;
                }
            },

            InstrClass::ReturnInterrupt => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.step = 1;
                }
                1 => {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.step = 2;
                }
                2 => {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                    let value = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.regs.status = Status::from_stack_byte(value);
                    // RTI's restored I flag takes effect without the usual
                    // one-instruction delay
                    self.prev_irq_inhibit = self.regs.status.contains(Status::I);
                    self.step = 3;
                }
                3 => {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                    self.operand_lo = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.step = 4;
                }
                _ => {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                    self.operand_hi = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.regs.pc = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.finish();
                    return true;
                }
            },

            InstrClass::Push => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.step = 1;
                }
                _ => {
                    let value = if self.opcode == 0x08 {
                        // PHP pushes with B set
                        self.regs.status.to_stack_byte(true)
                    } else {
                        self.regs.a
                    };
                    self.push(bus, value);
                    self.finish();
                    return true;
                }
            },

            InstrClass::Pull => match self.step {
                0 => {
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.step = 1;
                }
                1 => {
                    let _ = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    self.step = 2;
                }
                _ => {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                    let value = self.read(bus, 0x0100 | u16::from(self.regs.sp));
                    if self.opcode == 0x68 {
                        // PLA
                        self.regs.a = value;
                        self.regs.status.set_zn(value);
                    } else {
                        // PLP; I-flag change has the one-instruction delay
                        self.regs.status = Status::from_stack_byte(value);
                    }
                    self.finish();
                    return true;
                }
            },

            InstrClass::Break => match self.step {
                0 => {
                    // Padding byte after BRK is fetched and discarded
                    let pc = self.regs.pc;
                    let _ = self.read(bus, pc);
                    self.regs.pc = pc.wrapping_add(1);
                    self.step = 1;
                }
                1 => {
                    let value = (self.regs.pc >> 8) as u8;
                    self.push(bus, value);
                    self.step = 2;
                }
                2 => {
                    let value = (self.regs.pc & 0xFF) as u8;
                    self.push(bus, value);
                    self.step = 3;
                }
                3 => {
                    // A pending NMI hijacks the vector; the pushed byte keeps
                    // B=1 either way, which is how handlers detect the hijack
                    let hijacked = self.nmi_latched;
                    if hijacked {
                        self.nmi_latched = false;
                    }
                    self.interrupt_vector = if hijacked { vectors::NMI } else { vectors::IRQ };
                    let value = self.regs.status.to_stack_byte(true);
                    self.push(bus, value);
                    self.regs.status.insert(Status::I);
                    self.suppress_nmi_poll = true;
                    self.step = 4;
                }
                4 => {
                    let vector = self.interrupt_vector;
                    self.operand_lo = self.read(bus, vector);
                    self.step = 5;
                }
                _ => {
                    let vector = self.interrupt_vector.wrapping_add(1);
                    self.operand_hi = self.read(bus, vector);
                    self.regs.pc = u16::from_le_bytes([self.operand_lo, self.operand_hi]);
                    self.finish();
                    return true;
                }
            },

            // Jumps complete during operand resolution
            InstrClass::JumpAbsolute | InstrClass::JumpIndirect => {
                debug_assert!(false, "jump reached execute phase");
                self.finish();
                return true;
            }
        }
        false
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        memory: Vec<u8>,
    }

    impl TestBus {
        fn new() -> Self {
            Self {
                memory: vec![0; 0x10000],
            }
        }

        fn load(&mut self, addr: u16, bytes: &[u8]) {
            let addr = addr as usize;
            self.memory[addr..addr + bytes.len()].copy_from_slice(bytes);
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.memory[addr as usize]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.memory[addr as usize] = value;
        }
    }

    fn setup(program: &[u8]) -> (Cpu, TestBus) {
        let mut bus = TestBus::new();
        bus.load(0x8000, program);
        bus.load(0xFFFC, &[0x00, 0x80]);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        (cpu, bus)
    }

    /// Tick until one instruction completes; returns cycles consumed.
    fn run_one(cpu: &mut Cpu, bus: &mut TestBus) -> u64 {
        let start = cpu.cycles();
        while !cpu.tick(bus) {
            assert!(cpu.cycles() - start < 20, "instruction never completed");
        }
        cpu.cycles() - start
    }

    #[test]
    fn test_reset_vector() {
        let (cpu, _) = setup(&[0xEA]);
        assert_eq!(cpu.regs.pc, 0x8000);
        assert_eq!(cpu.regs.sp, 0xFD);
        assert!(cpu.regs.status.contains(Status::I));
        assert_eq!(cpu.cycles(), 7);
    }

    #[test]
    fn test_lda_immediate() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x42]);
        let cycles = run_one(&mut cpu, &mut bus);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.regs.a, 0x42);
    }

    #[test]
    fn test_lda_zero_page() {
        let (mut cpu, mut bus) = setup(&[0xA5, 0x10]);
        bus.memory[0x10] = 0x55;
        assert_eq!(run_one(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.regs.a, 0x55);
    }

    #[test]
    fn test_lda_zero_page_x_wraps() {
        let (mut cpu, mut bus) = setup(&[0xA2, 0x05, 0xB5, 0xFE]);
        bus.memory[0x03] = 0x99; // (0xFE + 0x05) & 0xFF
        run_one(&mut cpu, &mut bus); // LDX #5
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.regs.a, 0x99);
    }

    #[test]
    fn test_lda_absolute() {
        let (mut cpu, mut bus) = setup(&[0xAD, 0x34, 0x12]);
        bus.memory[0x1234] = 0x77;
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.regs.a, 0x77);
    }

    #[test]
    fn test_lda_absolute_x_fixed_cost() {
        // The fixup cycle is always taken: 5 cycles with or without a cross
        let (mut cpu, mut bus) = setup(&[0xA2, 0x01, 0xBD, 0x00, 0x20, 0xBD, 0xFF, 0x20]);
        bus.memory[0x2001] = 0x11;
        bus.memory[0x2100] = 0x22;
        run_one(&mut cpu, &mut bus); // LDX #1

        assert_eq!(run_one(&mut cpu, &mut bus), 5);
        assert_eq!(cpu.regs.a, 0x11);
        assert!(!cpu.page_crossed());

        assert_eq!(run_one(&mut cpu, &mut bus), 5);
        assert_eq!(cpu.regs.a, 0x22);
        assert!(cpu.page_crossed());
    }

    #[test]
    fn test_sta_absolute() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x5A, 0x8D, 0x00, 0x02]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(bus.memory[0x0200], 0x5A);
    }

    #[test]
    fn test_sta_indirect_y() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x5A, 0xA0, 0x04, 0x91, 0x10]);
        bus.memory[0x10] = 0x00;
        bus.memory[0x11] = 0x03; // pointer -> $0300
        run_one(&mut cpu, &mut bus); // LDA
        run_one(&mut cpu, &mut bus); // LDY
        assert_eq!(run_one(&mut cpu, &mut bus), 6);
        assert_eq!(bus.memory[0x0304], 0x5A);
    }

    #[test]
    fn test_inc_rmw_dummy_write() {
        let (mut cpu, mut bus) = setup(&[0xE6, 0x10]);
        bus.memory[0x10] = 0x41;
        assert_eq!(run_one(&mut cpu, &mut bus), 5);
        assert_eq!(bus.memory[0x10], 0x42);
    }

    #[test]
    fn test_branch_cycles() {
        // BNE not taken: 2 cycles
        let (mut cpu, mut bus) = setup(&[0xA9, 0x00, 0xD0, 0x10]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(run_one(&mut cpu, &mut bus), 2);

        // BNE taken, same page: 3 cycles
        let (mut cpu, mut bus) = setup(&[0xA9, 0x01, 0xD0, 0x10]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(run_one(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.regs.pc, 0x8014);

        // Taken with page cross (backwards off the page): 4 cycles
        let (mut cpu, mut bus) = setup(&[0xA9, 0x01, 0xD0, 0xFB]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.regs.pc, 0x7FFF);
    }

    #[test]
    fn test_branch_backwards() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x01, 0xD0, 0xFC]);
        run_one(&mut cpu, &mut bus);
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.pc, 0x8000);
    }

    #[test]
    fn test_jmp_absolute() {
        let (mut cpu, mut bus) = setup(&[0x4C, 0x00, 0x90]);
        assert_eq!(run_one(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.regs.pc, 0x9000);
    }

    #[test]
    fn test_jmp_indirect_page_bug() {
        let (mut cpu, mut bus) = setup(&[0x6C, 0xFF, 0x02]);
        bus.memory[0x02FF] = 0x00;
        bus.memory[0x0200] = 0x90; // high byte wraps to $0200, not $0300
        bus.memory[0x0300] = 0xFF;
        assert_eq!(run_one(&mut cpu, &mut bus), 5);
        assert_eq!(cpu.regs.pc, 0x9000);
    }

    #[test]
    fn test_jsr_rts() {
        let mut bus = TestBus::new();
        bus.load(0x8000, &[0x20, 0x00, 0x90]); // JSR $9000
        bus.load(0x9000, &[0x60]); // RTS
        bus.load(0xFFFC, &[0x00, 0x80]);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);

        assert_eq!(run_one(&mut cpu, &mut bus), 6);
        assert_eq!(cpu.regs.pc, 0x9000);
        // Return address on stack is the JSR's last byte ($8002)
        assert_eq!(bus.memory[0x01FD], 0x80);
        assert_eq!(bus.memory[0x01FC], 0x02);

        assert_eq!(run_one(&mut cpu, &mut bus), 6);
        assert_eq!(cpu.regs.pc, 0x8003);
    }

    #[test]
    fn test_pha_pla() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x42, 0x48, 0xA9, 0x00, 0x68]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(run_one(&mut cpu, &mut bus), 3); // PHA
        run_one(&mut cpu, &mut bus);
        assert_eq!(run_one(&mut cpu, &mut bus), 4); // PLA
        assert_eq!(cpu.regs.a, 0x42);
    }

    #[test]
    fn test_php_pushes_b_set() {
        let (mut cpu, mut bus) = setup(&[0x08]);
        let sp = cpu.regs.sp;
        run_one(&mut cpu, &mut bus);
        let pushed = bus.memory[0x0100 + sp as usize];
        assert_eq!(pushed & 0x30, 0x30);
    }

    #[test]
    fn test_brk_pushes_b_set() {
        let (mut cpu, mut bus) = setup(&[0x00]);
        bus.load(0xFFFE, &[0x00, 0xA0]);
        let sp = cpu.regs.sp;
        assert_eq!(run_one(&mut cpu, &mut bus), 7);
        assert_eq!(cpu.regs.pc, 0xA000);
        assert!(cpu.regs.status.contains(Status::I));
        let pushed_status = bus.memory[0x0100 + (sp as usize) - 2];
        assert_eq!(pushed_status & 0x30, 0x30);
        // Return address is BRK + 2
        assert_eq!(bus.memory[0x0100 + sp as usize], 0x80);
        assert_eq!(bus.memory[0x0100 + (sp as usize) - 1], 0x02);
    }

    #[test]
    fn test_nmi_sequence() {
        let (mut cpu, mut bus) = setup(&[0xEA, 0xEA]);
        bus.load(0xFFFA, &[0x00, 0x90]);
        let sp = cpu.regs.sp;

        cpu.set_nmi_line(true);
        let cycles = run_one(&mut cpu, &mut bus);
        assert_eq!(cycles, 7);
        assert_eq!(cpu.regs.pc, 0x9000);
        // Status pushed with B clear
        let pushed = bus.memory[0x0100 + (sp as usize) - 2];
        assert_eq!(pushed & 0x30, 0x20);
    }

    #[test]
    fn test_nmi_edge_triggered() {
        let (mut cpu, mut bus) = setup(&[0xEA, 0xEA, 0xEA]);
        bus.load(0xFFFA, &[0x00, 0x90]);

        // Level held high: exactly one NMI
        cpu.set_nmi_line(true);
        run_one(&mut cpu, &mut bus); // NMI sequence
        assert_eq!(cpu.regs.pc, 0x9000);
        cpu.set_nmi_line(true); // still high, no new edge
        bus.load(0x9000, &[0xEA]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.pc, 0x9001);
    }

    #[test]
    fn test_irq_masked_by_i_flag() {
        let (mut cpu, mut bus) = setup(&[0xEA, 0xEA]);
        bus.load(0xFFFE, &[0x00, 0xA0]);

        // I is set after reset; IRQ must not fire
        cpu.set_irq_line(true);
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.pc, 0x8001);
    }

    #[test]
    fn test_irq_after_cli_has_one_instruction_delay() {
        let (mut cpu, mut bus) = setup(&[0x58, 0xEA, 0xEA]); // CLI; NOP; NOP
        bus.load(0xFFFE, &[0x00, 0xA0]);
        cpu.set_irq_line(true);

        run_one(&mut cpu, &mut bus); // CLI
        // The instruction after CLI still runs before the IRQ is taken
        run_one(&mut cpu, &mut bus); // NOP at $8001
        assert_eq!(cpu.regs.pc, 0x8002);
        run_one(&mut cpu, &mut bus); // IRQ sequence
        assert_eq!(cpu.regs.pc, 0xA000);
    }

    #[test]
    fn test_rti_restores_status() {
        let (mut cpu, mut bus) = setup(&[0x00]); // BRK
        bus.load(0xFFFE, &[0x00, 0xA0]);
        bus.load(0xA000, &[0x40]); // RTI

        run_one(&mut cpu, &mut bus); // BRK
        assert_eq!(run_one(&mut cpu, &mut bus), 6); // RTI
        assert_eq!(cpu.regs.pc, 0x8002);
    }

    #[test]
    fn test_brk_nmi_hijack() {
        let (mut cpu, mut bus) = setup(&[0x00]);
        bus.load(0xFFFA, &[0x00, 0x90]);
        bus.load(0xFFFE, &[0x00, 0xA0]);
        let sp = cpu.regs.sp;

        // Latch NMI before BRK reaches its status push
        cpu.tick(&mut bus); // fetch
        cpu.set_nmi_line(true);
        while !cpu.tick(&mut bus) {}

        // Vector hijacked, B still 1 on the stack
        assert_eq!(cpu.regs.pc, 0x9000);
        let pushed = bus.memory[0x0100 + (sp as usize) - 2];
        assert_eq!(pushed & 0x10, 0x10);
    }

    #[test]
    fn test_jam_halts_until_reset() {
        let (mut cpu, mut bus) = setup(&[0x02, 0xEA]);
        run_one(&mut cpu, &mut bus);
        assert!(cpu.is_halted());

        let pc = cpu.regs.pc;
        for _ in 0..10 {
            assert!(!cpu.tick(&mut bus));
        }
        assert_eq!(cpu.regs.pc, pc);

        cpu.reset(&mut bus);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn test_rdy_stalls_state_machine() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x42]);
        cpu.set_rdy_line(true);
        for _ in 0..5 {
            assert!(!cpu.tick(&mut bus));
        }
        assert_eq!(cpu.regs.a, 0);

        cpu.set_rdy_line(false);
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.a, 0x42);
    }

    #[test]
    fn test_unofficial_lax() {
        let (mut cpu, mut bus) = setup(&[0xA7, 0x10]);
        bus.memory[0x10] = 0x3C;
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.a, 0x3C);
        assert_eq!(cpu.regs.x, 0x3C);
    }

    #[test]
    fn test_unofficial_dcp() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x10, 0xC7, 0x20]);
        bus.memory[0x20] = 0x11;
        run_one(&mut cpu, &mut bus);
        run_one(&mut cpu, &mut bus);
        assert_eq!(bus.memory[0x20], 0x10);
        assert!(cpu.regs.status.contains(Status::Z));
    }

    #[test]
    fn test_instruction_boundary_tracking() {
        let (mut cpu, mut bus) = setup(&[0xAD, 0x00, 0x02]);
        assert!(cpu.at_instruction_boundary());
        cpu.tick(&mut bus);
        assert!(!cpu.at_instruction_boundary());
        while !cpu.tick(&mut bus) {}
        assert!(cpu.at_instruction_boundary());
    }
}
