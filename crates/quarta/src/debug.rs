//! Execution tracing controls.
//!
//! All toggles are off by default; traces write to stderr. This is a
//! developer surface, not part of the simulation semantics.

#[derive(Debug, Clone, Default)]
pub struct ExecTraceOptions {
    /// Print each opcode as it dispatches, with the running thread id.
    pub opcodes: bool,
    /// Print scheduler slot transitions (time advances, region swaps).
    pub scheduler: bool,
    /// Echo user diagnostics to stderr as they are collected.
    pub diagnostics: bool,
}

impl ExecTraceOptions {
    pub fn any(&self) -> bool {
        self.opcodes || self.scheduler
    }
}
