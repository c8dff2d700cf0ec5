//! Debugger hooks.
//!
//! The debugger is consulted at two points: before each opcode fetch (PC
//! breakpoints, step modes, user callbacks) and after every CPU memory
//! access (read/write/access and value-change watchpoints). It is fully
//! pre-allocated -- fixed-size tables and a fixed break-reason buffer -- so
//! the hot path never allocates.

use core::fmt::Write as _;

/// Maximum number of breakpoints.
pub const MAX_BREAKPOINTS: usize = 32;
/// Maximum number of watchpoints.
pub const MAX_WATCHPOINTS: usize = 32;
/// Maximum number of user break callbacks.
pub const MAX_CALLBACKS: usize = 8;
/// Break reason buffer size.
const REASON_CAPACITY: usize = 96;

/// PC breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    /// Program counter to break at.
    pub addr: u16,
    /// Disabled breakpoints stay in their slot but never fire.
    pub enabled: bool,
}

/// What kind of memory traffic a watchpoint observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// Break on reads.
    Read,
    /// Break on writes.
    Write,
    /// Break on either.
    Access,
    /// Break when a write changes the byte's value.
    ValueChange,
}

/// Memory watchpoint.
#[derive(Debug, Clone, Copy)]
pub struct Watchpoint {
    /// Watched address.
    pub addr: u16,
    /// Trigger condition.
    pub kind: WatchKind,
    /// Last value seen (for `ValueChange`).
    last_value: u8,
    /// Disabled watchpoints stay in their slot but never fire.
    pub enabled: bool,
}

/// Stepping behavior requested by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepMode {
    /// Free-running.
    #[default]
    Run,
    /// Break at the next instruction boundary.
    Instruction,
    /// Run until SP returns to the recorded depth (step over a JSR).
    StepOver {
        /// Stack pointer at the stepped instruction.
        target_sp: u8,
    },
    /// Run until SP rises above the recorded depth (step out of a routine).
    StepOut {
        /// Stack pointer inside the routine.
        target_sp: u8,
    },
    /// Break at the start of the next scanline.
    Scanline {
        /// Scanline at the time of the request.
        from: u16,
    },
    /// Break when the current frame completes.
    Frame,
}

/// User break predicate: called with PC, returns true to halt.
pub type BreakCallback = fn(u16) -> bool;

/// Pre-allocated, RT-safe debugger state.
pub struct Debugger {
    breakpoints: [Option<Breakpoint>; MAX_BREAKPOINTS],
    watchpoints: [Option<Watchpoint>; MAX_WATCHPOINTS],
    callbacks: [Option<BreakCallback>; MAX_CALLBACKS],
    step_mode: StepMode,
    enabled: bool,
    break_occurred: bool,
    /// Watchpoint hit waiting for the next instruction boundary.
    pending_watch_break: bool,
    reason: [u8; REASON_CAPACITY],
    reason_len: usize,
}

/// `fmt::Write` adapter over the fixed reason buffer.
struct ReasonWriter<'a> {
    buf: &'a mut [u8; REASON_CAPACITY],
    len: &'a mut usize,
}

impl core::fmt::Write for ReasonWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let remaining = REASON_CAPACITY - *self.len;
        let take = s.len().min(remaining);
        self.buf[*self.len..*self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        *self.len += take;
        Ok(())
    }
}

impl Debugger {
    /// Debugger with empty tables, disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakpoints: [None; MAX_BREAKPOINTS],
            watchpoints: [None; MAX_WATCHPOINTS],
            callbacks: [None; MAX_CALLBACKS],
            step_mode: StepMode::Run,
            enabled: false,
            break_occurred: false,
            pending_watch_break: false,
            reason: [0; REASON_CAPACITY],
            reason_len: 0,
        }
    }

    /// Enable or disable all debugger processing.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Debugger active?
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Add a PC breakpoint. Returns false when the table is full.
    pub fn add_breakpoint(&mut self, addr: u16) -> bool {
        for slot in &mut self.breakpoints {
            if slot.is_none() {
                *slot = Some(Breakpoint {
                    addr,
                    enabled: true,
                });
                return true;
            }
        }
        false
    }

    /// Remove a breakpoint by address.
    pub fn remove_breakpoint(&mut self, addr: u16) {
        for slot in &mut self.breakpoints {
            if slot.is_some_and(|bp| bp.addr == addr) {
                *slot = None;
            }
        }
    }

    /// Add a watchpoint. Returns false when the table is full.
    pub fn add_watchpoint(&mut self, addr: u16, kind: WatchKind) -> bool {
        for slot in &mut self.watchpoints {
            if slot.is_none() {
                *slot = Some(Watchpoint {
                    addr,
                    kind,
                    last_value: 0,
                    enabled: true,
                });
                return true;
            }
        }
        false
    }

    /// Remove a watchpoint by address.
    pub fn remove_watchpoint(&mut self, addr: u16) {
        for slot in &mut self.watchpoints {
            if slot.is_some_and(|wp| wp.addr == addr) {
                *slot = None;
            }
        }
    }

    /// Register a user break predicate. Returns false when full.
    pub fn add_callback(&mut self, callback: BreakCallback) -> bool {
        for slot in &mut self.callbacks {
            if slot.is_none() {
                *slot = Some(callback);
                return true;
            }
        }
        false
    }

    /// Request a step mode; also enables the debugger.
    pub fn set_step_mode(&mut self, mode: StepMode) {
        self.step_mode = mode;
        self.enabled = true;
    }

    /// Current step mode.
    #[must_use]
    pub fn step_mode(&self) -> StepMode {
        self.step_mode
    }

    /// A break fired and has not been acknowledged.
    #[must_use]
    pub fn break_occurred(&self) -> bool {
        self.break_occurred
    }

    /// Human-readable reason for the last break.
    #[must_use]
    pub fn break_reason(&self) -> &str {
        core::str::from_utf8(&self.reason[..self.reason_len]).unwrap_or("")
    }

    /// Acknowledge the break and resume free-running.
    pub fn resume(&mut self) {
        self.break_occurred = false;
        self.pending_watch_break = false;
        self.step_mode = StepMode::Run;
        self.reason_len = 0;
    }

    fn set_reason(&mut self, args: core::fmt::Arguments<'_>) {
        self.reason_len = 0;
        let mut writer = ReasonWriter {
            buf: &mut self.reason,
            len: &mut self.reason_len,
        };
        let _ = writer.write_fmt(args);
    }

    /// Instruction-boundary hook: decide whether to halt before the fetch.
    ///
    /// `sp` is the CPU stack pointer, `scanline`/`frame` the PPU position.
    pub fn check_instruction(&mut self, pc: u16, sp: u8, scanline: u16, frame: u64) -> bool {
        if !self.enabled {
            return false;
        }
        if self.break_occurred {
            return true;
        }

        if self.pending_watch_break {
            self.pending_watch_break = false;
            self.break_occurred = true;
            return true;
        }

        let breakpoint_hit = self
            .breakpoints
            .iter()
            .flatten()
            .any(|bp| bp.enabled && bp.addr == pc);
        if breakpoint_hit {
            self.break_occurred = true;
            self.set_reason(format_args!("breakpoint at ${pc:04X}"));
            return true;
        }

        let callback_hit = self.callbacks.iter().flatten().any(|callback| callback(pc));
        if callback_hit {
            self.break_occurred = true;
            self.set_reason(format_args!("callback break at ${pc:04X}"));
            return true;
        }

        let hit = match self.step_mode {
            StepMode::Run => false,
            StepMode::Instruction => true,
            StepMode::StepOver { target_sp } => sp >= target_sp,
            StepMode::StepOut { target_sp } => sp > target_sp,
            StepMode::Scanline { from } => scanline != from,
            StepMode::Frame => {
                // Armed by the orchestrator when the frame completes
                false
            }
        };
        if hit {
            self.step_mode = StepMode::Run;
            self.break_occurred = true;
            self.set_reason(format_args!(
                "step complete at ${pc:04X} (line {scanline}, frame {frame})"
            ));
            return true;
        }
        false
    }

    /// JAM/KIL hook: the CPU halted and only RESET recovers.
    pub fn notify_jam(&mut self, pc: u16) {
        if self.enabled && !self.break_occurred {
            self.break_occurred = true;
            self.set_reason(format_args!("CPU jammed at ${pc:04X}"));
        }
    }

    /// Frame-completion hook for [`StepMode::Frame`].
    pub fn notify_frame_complete(&mut self) {
        if self.enabled && self.step_mode == StepMode::Frame {
            self.step_mode = StepMode::Run;
            self.break_occurred = true;
            self.set_reason(format_args!("frame complete"));
        }
    }

    /// Memory-access hook: evaluate watchpoints. Breaks are deferred to
    /// the next instruction boundary.
    pub fn notify_memory_access(&mut self, addr: u16, value: u8, is_write: bool) {
        if !self.enabled {
            return;
        }

        let mut hit: Option<(u16, WatchKind)> = None;
        for wp in self.watchpoints.iter_mut().flatten() {
            if !wp.enabled || wp.addr != addr {
                continue;
            }
            let fired = match wp.kind {
                WatchKind::Read => !is_write,
                WatchKind::Write => is_write,
                WatchKind::Access => true,
                WatchKind::ValueChange => {
                    let changed = is_write && wp.last_value != value;
                    if is_write {
                        wp.last_value = value;
                    }
                    changed
                }
            };
            if fired && hit.is_none() {
                hit = Some((wp.addr, wp.kind));
            }
        }

        if let Some((addr, kind)) = hit {
            self.pending_watch_break = true;
            let verb = if is_write { "write" } else { "read" };
            self.set_reason(format_args!("watchpoint ({kind:?}) {verb} ${addr:04X} = ${value:02X}"));
        }
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Debugger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Debugger")
            .field("enabled", &self.enabled)
            .field("step_mode", &self.step_mode)
            .field("break_occurred", &self.break_occurred)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_halts_at_pc() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        assert!(debugger.add_breakpoint(0x8010));

        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));
        assert!(debugger.check_instruction(0x8010, 0xFD, 0, 0));
        assert!(debugger.break_occurred());
        assert!(debugger.break_reason().contains("8010"));
    }

    #[test]
    fn test_disabled_debugger_never_breaks() {
        let mut debugger = Debugger::new();
        debugger.add_breakpoint(0x8000);
        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));
    }

    #[test]
    fn test_breakpoint_table_capacity() {
        let mut debugger = Debugger::new();
        for i in 0..MAX_BREAKPOINTS {
            assert!(debugger.add_breakpoint(i as u16));
        }
        assert!(!debugger.add_breakpoint(0xFFFF));
    }

    #[test]
    fn test_remove_breakpoint() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        debugger.add_breakpoint(0x8000);
        debugger.remove_breakpoint(0x8000);
        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));
    }

    #[test]
    fn test_step_instruction() {
        let mut debugger = Debugger::new();
        debugger.set_step_mode(StepMode::Instruction);
        assert!(debugger.check_instruction(0x8000, 0xFD, 0, 0));
        debugger.resume();
        assert!(!debugger.check_instruction(0x8001, 0xFD, 0, 0));
    }

    #[test]
    fn test_step_over_waits_for_sp() {
        let mut debugger = Debugger::new();
        // Stepping over a JSR at SP=$FD: halt once SP is back at $FD
        debugger.set_step_mode(StepMode::StepOver { target_sp: 0xFD });
        assert!(!debugger.check_instruction(0x9000, 0xFB, 0, 0));
        assert!(debugger.check_instruction(0x8003, 0xFD, 0, 0));
    }

    #[test]
    fn test_step_out_waits_for_return() {
        let mut debugger = Debugger::new();
        debugger.set_step_mode(StepMode::StepOut { target_sp: 0xFB });
        assert!(!debugger.check_instruction(0x9000, 0xFB, 0, 0));
        assert!(debugger.check_instruction(0x8003, 0xFD, 0, 0));
    }

    #[test]
    fn test_step_scanline() {
        let mut debugger = Debugger::new();
        debugger.set_step_mode(StepMode::Scanline { from: 10 });
        assert!(!debugger.check_instruction(0x8000, 0xFD, 10, 0));
        assert!(debugger.check_instruction(0x8001, 0xFD, 11, 0));
    }

    #[test]
    fn test_step_frame_via_notification() {
        let mut debugger = Debugger::new();
        debugger.set_step_mode(StepMode::Frame);
        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));
        debugger.notify_frame_complete();
        assert!(debugger.check_instruction(0x8001, 0xFD, 0, 1));
        assert!(debugger.break_reason().contains("frame"));
    }

    #[test]
    fn test_watchpoint_write() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        debugger.add_watchpoint(0x0200, WatchKind::Write);

        debugger.notify_memory_access(0x0200, 0x42, false);
        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));

        debugger.notify_memory_access(0x0200, 0x42, true);
        assert!(debugger.check_instruction(0x8001, 0xFD, 0, 0));
        assert!(debugger.break_reason().contains("0200"));
    }

    #[test]
    fn test_watchpoint_value_change() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        debugger.add_watchpoint(0x0010, WatchKind::ValueChange);

        debugger.notify_memory_access(0x0010, 0x00, true);
        // First write from the 0 baseline is not a change
        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));

        debugger.notify_memory_access(0x0010, 0x00, true);
        assert!(!debugger.check_instruction(0x8001, 0xFD, 0, 0));

        debugger.notify_memory_access(0x0010, 0x01, true);
        assert!(debugger.check_instruction(0x8002, 0xFD, 0, 0));
    }

    #[test]
    fn test_callback_break() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        debugger.add_callback(|pc| pc == 0xC000);
        assert!(!debugger.check_instruction(0x8000, 0xFD, 0, 0));
        assert!(debugger.check_instruction(0xC000, 0xFD, 0, 0));
    }

    #[test]
    fn test_jam_notification() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        debugger.notify_jam(0x8042);
        assert!(debugger.break_occurred());
        assert!(debugger.break_reason().contains("jammed"));
    }

    #[test]
    fn test_resume_clears_state() {
        let mut debugger = Debugger::new();
        debugger.set_enabled(true);
        debugger.add_breakpoint(0x8000);
        debugger.check_instruction(0x8000, 0xFD, 0, 0);
        debugger.resume();
        assert!(!debugger.break_occurred());
        assert!(debugger.break_reason().is_empty());
    }
}
