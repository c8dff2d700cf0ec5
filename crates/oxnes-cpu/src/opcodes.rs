//! Opcode decode tables.
//!
//! Maps each of the 256 opcodes to its addressing mode and mnemonic. The
//! execution pattern comes from [`crate::state::InstrClass::from_opcode`];
//! mode plus class fully scripts an instruction's cycles.

use crate::addressing::AddrMode;

/// Addressing mode of an opcode (all 256, official and unofficial).
#[allow(clippy::too_many_lines)]
#[must_use]
pub const fn addr_mode(opcode: u8) -> AddrMode {
    match opcode {
        // Immediate
        0xA9 | 0xA2 | 0xA0 | 0x69 | 0xE9 | 0x29 | 0x09 | 0x49 | 0xC9 | 0xE0 | 0xC0 | 0xEB
        | 0x0B | 0x2B | 0x4B | 0x6B | 0x8B | 0xAB | 0xCB | 0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => {
            AddrMode::Immediate
        }

        // Zero page
        0xA5 | 0xA6 | 0xA4 | 0x65 | 0xE5 | 0x25 | 0x05 | 0x45 | 0xC5 | 0xE4 | 0xC4 | 0x24
        | 0x85 | 0x86 | 0x84 | 0x06 | 0x46 | 0x26 | 0x66 | 0xE6 | 0xC6 | 0x07 | 0x27 | 0x47
        | 0x67 | 0xC7 | 0xE7 | 0x87 | 0xA7 | 0x04 | 0x44 | 0x64 => AddrMode::ZeroPage,

        // Zero page,X
        0xB5 | 0xB4 | 0x75 | 0xF5 | 0x35 | 0x15 | 0x55 | 0xD5 | 0x95 | 0x94 | 0x16 | 0x56
        | 0x36 | 0x76 | 0xF6 | 0xD6 | 0x17 | 0x37 | 0x57 | 0x77 | 0xD7 | 0xF7 | 0x14 | 0x34
        | 0x54 | 0x74 | 0xD4 | 0xF4 => AddrMode::ZeroPageX,

        // Zero page,Y
        0xB6 | 0x96 | 0x97 | 0xB7 => AddrMode::ZeroPageY,

        // Absolute
        0xAD | 0xAE | 0xAC | 0x6D | 0xED | 0x2D | 0x0D | 0x4D | 0xCD | 0xEC | 0xCC | 0x2C
        | 0x8D | 0x8E | 0x8C | 0x0E | 0x4E | 0x2E | 0x6E | 0xEE | 0xCE | 0x0F | 0x2F | 0x4F
        | 0x6F | 0xCF | 0xEF | 0x8F | 0xAF | 0x4C | 0x20 | 0x0C => AddrMode::Absolute,

        // Absolute,X
        0xBD | 0xBC | 0x7D | 0xFD | 0x3D | 0x1D | 0x5D | 0xDD | 0x9D | 0x1E | 0x5E | 0x3E
        | 0x7E | 0xFE | 0xDE | 0x1F | 0x3F | 0x5F | 0x7F | 0xDF | 0xFF | 0x9C | 0x1C | 0x3C
        | 0x5C | 0x7C | 0xDC | 0xFC => AddrMode::AbsoluteX,

        // Absolute,Y
        0xB9 | 0xBE | 0x79 | 0xF9 | 0x39 | 0x19 | 0x59 | 0xD9 | 0x99 | 0xBB | 0xBF | 0x1B
        | 0x3B | 0x5B | 0x7B | 0xDB | 0xFB | 0x9B | 0x9E | 0x9F => AddrMode::AbsoluteY,

        // Indirect (JMP only)
        0x6C => AddrMode::Indirect,

        // (zp,X)
        0xA1 | 0x61 | 0xE1 | 0x21 | 0x01 | 0x41 | 0xC1 | 0x81 | 0x83 | 0xA3 | 0x03 | 0x23
        | 0x43 | 0x63 | 0xC3 | 0xE3 => AddrMode::IndexedIndirectX,

        // (zp),Y
        0xB1 | 0x71 | 0xF1 | 0x31 | 0x11 | 0x51 | 0xD1 | 0x91 | 0x93 | 0xB3 | 0x13 | 0x33
        | 0x53 | 0x73 | 0xD3 | 0xF3 => AddrMode::IndirectIndexedY,

        // Branches
        0x10 | 0x30 | 0x50 | 0x70 | 0x90 | 0xB0 | 0xD0 | 0xF0 => AddrMode::Relative,

        // Accumulator
        0x0A | 0x2A | 0x4A | 0x6A => AddrMode::Accumulator,

        // Implied (BRK, returns, stack, transfers, flags, NOPs, JAMs)
        _ => AddrMode::Implied,
    }
}

/// Mnemonic of an opcode, for logging and debugger output. Unofficial
/// opcodes use their conventional names prefixed with `*`.
#[allow(clippy::too_many_lines)]
#[must_use]
pub const fn mnemonic(opcode: u8) -> &'static str {
    match opcode {
        0xA9 | 0xA5 | 0xB5 | 0xAD | 0xBD | 0xB9 | 0xA1 | 0xB1 => "LDA",
        0xA2 | 0xA6 | 0xB6 | 0xAE | 0xBE => "LDX",
        0xA0 | 0xA4 | 0xB4 | 0xAC | 0xBC => "LDY",
        0x85 | 0x95 | 0x8D | 0x9D | 0x99 | 0x81 | 0x91 => "STA",
        0x86 | 0x96 | 0x8E => "STX",
        0x84 | 0x94 | 0x8C => "STY",
        0x69 | 0x65 | 0x75 | 0x6D | 0x7D | 0x79 | 0x61 | 0x71 => "ADC",
        0xE9 | 0xE5 | 0xF5 | 0xED | 0xFD | 0xF9 | 0xE1 | 0xF1 => "SBC",
        0x29 | 0x25 | 0x35 | 0x2D | 0x3D | 0x39 | 0x21 | 0x31 => "AND",
        0x09 | 0x05 | 0x15 | 0x0D | 0x1D | 0x19 | 0x01 | 0x11 => "ORA",
        0x49 | 0x45 | 0x55 | 0x4D | 0x5D | 0x59 | 0x41 | 0x51 => "EOR",
        0xC9 | 0xC5 | 0xD5 | 0xCD | 0xDD | 0xD9 | 0xC1 | 0xD1 => "CMP",
        0xE0 | 0xE4 | 0xEC => "CPX",
        0xC0 | 0xC4 | 0xCC => "CPY",
        0x24 | 0x2C => "BIT",
        0x0A | 0x06 | 0x16 | 0x0E | 0x1E => "ASL",
        0x4A | 0x46 | 0x56 | 0x4E | 0x5E => "LSR",
        0x2A | 0x26 | 0x36 | 0x2E | 0x3E => "ROL",
        0x6A | 0x66 | 0x76 | 0x6E | 0x7E => "ROR",
        0xE6 | 0xF6 | 0xEE | 0xFE => "INC",
        0xC6 | 0xD6 | 0xCE | 0xDE => "DEC",
        0xE8 => "INX",
        0xC8 => "INY",
        0xCA => "DEX",
        0x88 => "DEY",
        0xAA => "TAX",
        0xA8 => "TAY",
        0x8A => "TXA",
        0x98 => "TYA",
        0xBA => "TSX",
        0x9A => "TXS",
        0x48 => "PHA",
        0x08 => "PHP",
        0x68 => "PLA",
        0x28 => "PLP",
        0x18 => "CLC",
        0x38 => "SEC",
        0x58 => "CLI",
        0x78 => "SEI",
        0xB8 => "CLV",
        0xD8 => "CLD",
        0xF8 => "SED",
        0x4C | 0x6C => "JMP",
        0x20 => "JSR",
        0x60 => "RTS",
        0x40 => "RTI",
        0x00 => "BRK",
        0x10 => "BPL",
        0x30 => "BMI",
        0x50 => "BVC",
        0x70 => "BVS",
        0x90 => "BCC",
        0xB0 => "BCS",
        0xD0 => "BNE",
        0xF0 => "BEQ",
        0xEA => "NOP",
        // Unofficial
        0xEB => "*SBC",
        0xA7 | 0xB7 | 0xAF | 0xBF | 0xA3 | 0xB3 => "*LAX",
        0x87 | 0x97 | 0x8F | 0x83 => "*SAX",
        0x07 | 0x17 | 0x0F | 0x1F | 0x1B | 0x03 | 0x13 => "*SLO",
        0x27 | 0x37 | 0x2F | 0x3F | 0x3B | 0x23 | 0x33 => "*RLA",
        0x47 | 0x57 | 0x4F | 0x5F | 0x5B | 0x43 | 0x53 => "*SRE",
        0x67 | 0x77 | 0x6F | 0x7F | 0x7B | 0x63 | 0x73 => "*RRA",
        0xC7 | 0xD7 | 0xCF | 0xDF | 0xDB | 0xC3 | 0xD3 => "*DCP",
        0xE7 | 0xF7 | 0xEF | 0xFF | 0xFB | 0xE3 | 0xF3 => "*ISC",
        0x0B | 0x2B => "*ANC",
        0x4B => "*ALR",
        0x6B => "*ARR",
        0x8B => "*XAA",
        0xAB => "*LXA",
        0xCB => "*AXS",
        0xBB => "*LAS",
        0x9B => "*TAS",
        0x93 | 0x9F => "*SHA",
        0x9E => "*SHX",
        0x9C => "*SHY",
        0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
            "*JAM"
        }
        _ => "*NOP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InstrClass;

    #[test]
    fn test_official_modes() {
        assert_eq!(addr_mode(0xA9), AddrMode::Immediate); // LDA #
        assert_eq!(addr_mode(0xA5), AddrMode::ZeroPage); // LDA zp
        assert_eq!(addr_mode(0xB5), AddrMode::ZeroPageX); // LDA zp,X
        assert_eq!(addr_mode(0xB6), AddrMode::ZeroPageY); // LDX zp,Y
        assert_eq!(addr_mode(0xAD), AddrMode::Absolute); // LDA abs
        assert_eq!(addr_mode(0xBD), AddrMode::AbsoluteX); // LDA abs,X
        assert_eq!(addr_mode(0xB9), AddrMode::AbsoluteY); // LDA abs,Y
        assert_eq!(addr_mode(0xA1), AddrMode::IndexedIndirectX);
        assert_eq!(addr_mode(0xB1), AddrMode::IndirectIndexedY);
        assert_eq!(addr_mode(0x6C), AddrMode::Indirect);
        assert_eq!(addr_mode(0xD0), AddrMode::Relative);
        assert_eq!(addr_mode(0x0A), AddrMode::Accumulator);
        assert_eq!(addr_mode(0xEA), AddrMode::Implied);
    }

    #[test]
    fn test_store_modes() {
        assert_eq!(addr_mode(0x9D), AddrMode::AbsoluteX); // STA abs,X
        assert_eq!(addr_mode(0x99), AddrMode::AbsoluteY); // STA abs,Y
        assert_eq!(addr_mode(0x91), AddrMode::IndirectIndexedY); // STA (zp),Y
        assert_eq!(addr_mode(0x96), AddrMode::ZeroPageY); // STX zp,Y
    }

    #[test]
    fn test_unofficial_modes() {
        assert_eq!(addr_mode(0xA3), AddrMode::IndexedIndirectX); // LAX (zp,X)
        assert_eq!(addr_mode(0xBF), AddrMode::AbsoluteY); // LAX abs,Y
        assert_eq!(addr_mode(0x9C), AddrMode::AbsoluteX); // SHY abs,X
        assert_eq!(addr_mode(0x9E), AddrMode::AbsoluteY); // SHX abs,Y
        assert_eq!(addr_mode(0x0C), AddrMode::Absolute); // NOP abs
    }

    #[test]
    fn test_every_opcode_decodes() {
        // Mode, class, and mnemonic must be total over the opcode space.
        for opcode in 0..=255u8 {
            let mode = addr_mode(opcode);
            let class = InstrClass::from_opcode(opcode);
            let name = mnemonic(opcode);
            assert!(!name.is_empty());

            // Store instructions never use immediate mode
            if class == InstrClass::Write {
                assert_ne!(mode, AddrMode::Immediate, "opcode {opcode:02X}");
            }
            // Branches are all relative and vice versa
            assert_eq!(
                class == InstrClass::Branch,
                mode == AddrMode::Relative,
                "opcode {opcode:02X}"
            );
        }
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(mnemonic(0xA9), "LDA");
        assert_eq!(mnemonic(0x00), "BRK");
        assert_eq!(mnemonic(0xEB), "*SBC");
        assert_eq!(mnemonic(0x02), "*JAM");
        assert_eq!(mnemonic(0x04), "*NOP");
    }
}
