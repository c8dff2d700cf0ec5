//! Standard controller (shift register + strobe).

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// Controller button bits, in shift-out order (A first).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct Buttons: u8 {
        /// A button.
        const A = 0x01;
        /// B button.
        const B = 0x02;
        /// Select.
        const SELECT = 0x04;
        /// Start.
        const START = 0x08;
        /// D-pad up.
        const UP = 0x10;
        /// D-pad down.
        const DOWN = 0x20;
        /// D-pad left.
        const LEFT = 0x40;
        /// D-pad right.
        const RIGHT = 0x80;
    }
}

/// One controller port: button state, shift register, strobe latch.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Controller {
    buttons: u8,
    shift: u8,
    strobe: bool,
}

impl Controller {
    /// Idle controller.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buttons: 0,
            shift: 0,
            strobe: false,
        }
    }

    /// Host input: the current button byte.
    pub fn set_buttons(&mut self, buttons: u8) {
        self.buttons = buttons;
        if self.strobe {
            self.shift = buttons;
        }
    }

    /// $4016 write, bit 0. While high the shift register continuously
    /// reloads; the falling edge latches.
    pub fn write_strobe(&mut self, value: u8) {
        let strobe = value & 1 != 0;
        if self.strobe || strobe {
            self.shift = self.buttons;
        }
        self.strobe = strobe;
    }

    /// Serial read: bit 0 of the shift register, shifting in 1s behind.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            // Strobe high: always the A button
            return self.buttons & 1;
        }
        let bit = self.shift & 1;
        self.shift = (self.shift >> 1) | 0x80;
        bit
    }

    /// Read without side effects (debugger).
    #[must_use]
    pub fn peek(&self) -> u8 {
        if self.strobe {
            self.buttons & 1
        } else {
            self.shift & 1
        }
    }

    /// Reset (button state survives; latch state does not).
    pub fn reset(&mut self) {
        self.shift = 0;
        self.strobe = false;
    }
}
