//! Compiler-wide configuration.

/// Tunable knobs for a [`crate::compiler::Compiler`] instance.
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    /// Emit a `tracing` debug event after selecting each method's pseudo-instructions.
    pub trace_selection: bool,
    /// Fixed address of the external `allocate_object(class_ptr) -> objectref` runtime
    /// helper `new` calls into. Object allocation and layout are out of scope for this
    /// crate (see the crate-level documentation); this is the one address compiled
    /// code needs to reach across that boundary.
    pub allocate_object_addr: usize,
    /// Starting capacity for each basic block's pseudo-instruction vector; zero falls
    /// back to each block's own statement count.
    pub instruction_capacity_hint: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig { trace_selection: false, allocate_object_addr: 0, instruction_capacity_hint: 0 }
    }
}
