//! CPU execution state machine.
//!
//! The engine advances through four macro-states; within a state, the
//! `step` counter on the CPU selects the scripted sub-cycle. Every sub-cycle
//! performs at most one bus access, which is what makes the engine
//! cycle-accurate.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Execution macro-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecState {
    /// Seven-cycle interrupt sequence (NMI/IRQ/RESET entry).
    InterruptSequence,
    /// Opcode fetch; interrupts are sampled at the start of this cycle.
    #[default]
    FetchOpcode,
    /// Operand fetch and address resolution (scripted per addressing mode).
    FetchOperandLo,
    /// Operation cycles: reads, dummy writes, stack traffic, the delta apply.
    Execute,
}

/// Interrupt pending at the next opcode fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PendingInterrupt {
    /// Nothing pending.
    #[default]
    None,
    /// Non-maskable interrupt (edge-latched).
    Nmi,
    /// Maskable interrupt (level-sampled).
    Irq,
    /// Reset sequence (stack writes suppressed).
    Reset,
}

/// Instruction execution pattern.
///
/// The class picks the Execute-phase script; together with the addressing
/// mode it fully determines an instruction's cycle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InstrClass {
    /// Load/arithmetic/logic reads (LDA, ADC, CMP, BIT, LAX, ...).
    #[default]
    Read,
    /// Stores (STA, STX, STY, SAX, SHA, SHX, SHY, TAS).
    Write,
    /// Read-modify-write (ASL, INC, DEC, SLO, RLA, ...).
    ReadModifyWrite,
    /// Single-byte register operations (TAX, CLC, NOP, ...).
    Implied,
    /// Shifts/rotates on the accumulator.
    Accumulator,
    /// Conditional branches.
    Branch,
    /// JMP absolute.
    JumpAbsolute,
    /// JMP indirect.
    JumpIndirect,
    /// JSR.
    JumpSubroutine,
    /// RTS.
    ReturnSubroutine,
    /// RTI.
    ReturnInterrupt,
    /// PHA/PHP.
    Push,
    /// PLA/PLP.
    Pull,
    /// BRK.
    Break,
    /// JAM/KIL: halts the CPU until RESET.
    Jam,
}

impl InstrClass {
    /// Classify an opcode (all 256, official and unofficial).
    #[inline]
    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode {
            // Branches
            0x10 | 0x30 | 0x50 | 0x70 | 0x90 | 0xB0 | 0xD0 | 0xF0 => Self::Branch,

            // Jumps and returns
            0x4C => Self::JumpAbsolute,
            0x6C => Self::JumpIndirect,
            0x20 => Self::JumpSubroutine,
            0x60 => Self::ReturnSubroutine,
            0x40 => Self::ReturnInterrupt,
            0x00 => Self::Break,

            // Stack
            0x48 | 0x08 => Self::Push,
            0x68 | 0x28 => Self::Pull,

            // Accumulator shifts
            0x0A | 0x2A | 0x4A | 0x6A => Self::Accumulator,

            // Implied register operations
            0xAA | 0xA8 | 0x8A | 0x98 | 0xBA | 0x9A => Self::Implied, // transfers
            0xE8 | 0xC8 | 0xCA | 0x88 => Self::Implied,               // inc/dec
            0x18 | 0x38 | 0x58 | 0x78 | 0xB8 | 0xD8 | 0xF8 => Self::Implied, // flags
            0xEA | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => Self::Implied, // NOPs

            // Stores
            0x85 | 0x95 | 0x8D | 0x9D | 0x99 | 0x81 | 0x91 => Self::Write, // STA
            0x86 | 0x96 | 0x8E => Self::Write,                             // STX
            0x84 | 0x94 | 0x8C => Self::Write,                             // STY
            0x87 | 0x97 | 0x8F | 0x83 => Self::Write,                      // SAX
            0x93 | 0x9F | 0x9C | 0x9E | 0x9B => Self::Write,               // SHA/SHX/SHY/TAS

            // Read-modify-write
            0x06 | 0x16 | 0x0E | 0x1E => Self::ReadModifyWrite, // ASL
            0x46 | 0x56 | 0x4E | 0x5E => Self::ReadModifyWrite, // LSR
            0x26 | 0x36 | 0x2E | 0x3E => Self::ReadModifyWrite, // ROL
            0x66 | 0x76 | 0x6E | 0x7E => Self::ReadModifyWrite, // ROR
            0xE6 | 0xF6 | 0xEE | 0xFE => Self::ReadModifyWrite, // INC
            0xC6 | 0xD6 | 0xCE | 0xDE => Self::ReadModifyWrite, // DEC
            0x07 | 0x17 | 0x0F | 0x1F | 0x1B | 0x03 | 0x13 => Self::ReadModifyWrite, // SLO
            0x27 | 0x37 | 0x2F | 0x3F | 0x3B | 0x23 | 0x33 => Self::ReadModifyWrite, // RLA
            0x47 | 0x57 | 0x4F | 0x5F | 0x5B | 0x43 | 0x53 => Self::ReadModifyWrite, // SRE
            0x67 | 0x77 | 0x6F | 0x7F | 0x7B | 0x63 | 0x73 => Self::ReadModifyWrite, // RRA
            0xC7 | 0xD7 | 0xCF | 0xDF | 0xDB | 0xC3 | 0xD3 => Self::ReadModifyWrite, // DCP
            0xE7 | 0xF7 | 0xEF | 0xFF | 0xFB | 0xE3 | 0xF3 => Self::ReadModifyWrite, // ISC

            // JAM/KIL
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                Self::Jam
            }

            // Everything else reads
            _ => Self::Read,
        }
    }
}
