//! 6502 addressing modes.
//!
//! Each memory-touching instruction resolves its effective address through one
//! of these modes. The microstep engine runs the mode's scripted sub-cycles
//! (operand fetches, index adds, dummy reads) before handing control to the
//! execute phase.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Addressing mode of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AddrMode {
    /// No operand; the operation acts on registers only.
    #[default]
    Implied,
    /// Operates on the accumulator (ASL A, ...).
    Accumulator,
    /// Operand is the byte following the opcode.
    Immediate,
    /// One-byte address in page zero.
    ZeroPage,
    /// Zero-page address indexed by X (wraps within page zero).
    ZeroPageX,
    /// Zero-page address indexed by Y (wraps within page zero).
    ZeroPageY,
    /// Two-byte absolute address.
    Absolute,
    /// Absolute address indexed by X.
    AbsoluteX,
    /// Absolute address indexed by Y.
    AbsoluteY,
    /// Two-byte pointer; JMP only, with the page-wrap bug.
    Indirect,
    /// (zp,X): pointer at (operand + X) in page zero.
    IndexedIndirectX,
    /// (zp),Y: pointer at operand in page zero, indexed by Y.
    IndirectIndexedY,
    /// Signed 8-bit branch offset.
    Relative,
}

impl AddrMode {
    /// Number of operand bytes following the opcode.
    #[inline]
    #[must_use]
    pub const fn operand_len(self) -> u16 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndexedIndirectX
            | Self::IndirectIndexedY
            | Self::Relative => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 2,
        }
    }

    /// True if the mode needs any operand-resolution cycles at all.
    #[inline]
    #[must_use]
    pub const fn has_operand(self) -> bool {
        self.operand_len() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_len() {
        assert_eq!(AddrMode::Implied.operand_len(), 0);
        assert_eq!(AddrMode::Immediate.operand_len(), 1);
        assert_eq!(AddrMode::ZeroPageX.operand_len(), 1);
        assert_eq!(AddrMode::Absolute.operand_len(), 2);
        assert_eq!(AddrMode::Indirect.operand_len(), 2);
    }

    #[test]
    fn test_has_operand() {
        assert!(!AddrMode::Implied.has_operand());
        assert!(!AddrMode::Accumulator.has_operand());
        assert!(AddrMode::Relative.has_operand());
    }
}
