//! NES emulation core: the deterministic, synchronous state machine that
//! advances the virtual console one master-clock tick at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Console                             │
//! │  ┌────────────┐              ┌───────────────────────────┐   │
//! │  │ MasterClock│              │          CpuBus           │   │
//! │  └────────────┘              │  ┌─────┐ ┌─────┐ ┌─────┐  │   │
//! │  ┌────────────┐              │  │ RAM │ │ PPU │ │ APU │  │   │
//! │  │    CPU     │◄────────────►│  └─────┘ └─────┘ └─────┘  │   │
//! │  └────────────┘              │  ┌─────────┐ ┌─────────┐  │   │
//! │  ┌────────────┐              │  │Cartridge│ │Controls │  │   │
//! │  │ DMA / Dbg  │              │  └─────────┘ └─────────┘  │   │
//! │  └────────────┘              └───────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All subsystems are sibling fields of one owning [`Console`] value; the
//! per-tick scheduling (PPU every tick, CPU/APU/DMA every third) and the
//! signal wiring (NMI, IRQ, RDY) live in [`Console::tick`]. The core never
//! suspends, blocks, allocates, or fails at runtime; shared access from an
//! outer thread is the caller's responsibility.
//!
//! Everything outside the synchronous core -- video/audio backends, input
//! sampling, ROM file parsing, snapshots, frontends -- is an external
//! collaborator behind the narrow surface [`Console`] exposes.

mod bus;
mod clock;
mod config;
mod console;
mod controller;
mod debug;
mod dma;
mod open_bus;
mod ram;

pub use bus::{CpuBus, TestRam};
pub use clock::{MasterClock, DEFAULT_POWER_ON_PHASE, MASTER_CYCLES_PER_CPU};
pub use config::{Accuracy, CicVariant, ConsoleVariant, CoreConfig, CpuVariant, PpuVariant};
pub use console::{Console, TimingStep, FRAME_TICK_CAP};
pub use controller::{Buttons, Controller};
pub use debug::{
    BreakCallback, Breakpoint, Debugger, StepMode, WatchKind, Watchpoint, MAX_BREAKPOINTS,
    MAX_CALLBACKS, MAX_WATCHPOINTS,
};
pub use dma::{Dma, InteractionLedger};
pub use open_bus::OpenBus;
pub use ram::{POWER_ON_RAM, WRAM_SIZE};

// Re-export the component crates' primary types for collaborators
pub use oxnes_apu::{Apu, Region};
pub use oxnes_cpu::{Cpu, Status};
pub use oxnes_mappers::{Cartridge, CartridgeError, Mapper, Mirroring, Mmc3, Nrom};
pub use oxnes_ppu::{Ppu, VBlankLedger, FRAME_HEIGHT, FRAME_SIZE, FRAME_WIDTH, NES_PALETTE};
