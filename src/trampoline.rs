//! Lazy-compilation trampolines (§4.6 / component H).
//!
//! Every compilable method is linked with a trampoline before it is ever called. The
//! trampoline's current entry address — read through the fixed offset chain
//! `class → method_table → slot → trampoline → buffer_base` the selector's
//! `invokevirtual`/`invokestatic` sequences encode against — starts out pointing at a
//! small generated stub (`push cu_ptr; call compile_entry; add esp,4; jmp eax`) and
//! transitions exactly once, monotonically, to the freshly compiled method's entry.
//!
//! This crate models that upgrade as an atomic pointer swap on the trampoline
//! record's `buffer_base` word rather than literally rewriting the stub's `jmp` bytes
//! in place: every caller already indirects through this word, so the externally
//! observable protocol (one compile per method, no deopt, an atomically-visible
//! upgrade) is preserved; only the micro-optimization of collapsing the stub itself
//! into a direct `jmp` after the first call is left unmodeled.

use crate::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A trampoline's compilation progress. Monotonic: `NotCompiled` and `Compiling` may
/// alternate on a failed attempt (§9, retry-not-poison), but once `Compiled` a
/// trampoline never regresses — there is no deoptimization in this compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrampolineState {
    NotCompiled,
    Compiling,
    Compiled,
}

/// Per-method trampoline record.
///
/// `entry` is the word compiled code actually reads through the fixed offset chain;
/// `stub_entry` is the permanent address of the generated stub code, kept around so a
/// failed compile attempt can fall back to it again.
#[derive(Debug)]
pub struct Trampoline {
    state: Mutex<TrampolineState>,
    entry: AtomicUsize,
    stub_entry: usize,
}

impl Trampoline {
    /// Builds a trampoline whose entry starts out pointing at `stub_entry`, the
    /// address of the method's generated lazy-compile stub.
    #[must_use]
    pub fn new(stub_entry: usize) -> Self {
        Trampoline {
            state: Mutex::new(TrampolineState::NotCompiled),
            entry: AtomicUsize::new(stub_entry),
            stub_entry,
        }
    }

    /// The address compiled code should currently call through.
    #[must_use]
    pub fn current_entry(&self) -> usize {
        self.entry.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn state(&self) -> TrampolineState {
        *self.state.lock()
    }

    /// Runs `compile` under this trampoline's per-method compile lock, publishing its
    /// result as the new entry address on success.
    ///
    /// Concurrent callers block on the lock rather than racing to compile; the first
    /// caller through publishes the compiled entry, and every later caller (on this
    /// trampoline or any other thread) observes `Compiled` and returns the published
    /// address without recompiling. A failed attempt resets to `NotCompiled` so the
    /// next call retries from the stub rather than permanently failing the method.
    pub fn ensure_compiled(&self, compile: impl FnOnce() -> Result<usize>) -> Result<usize> {
        let mut state = self.state.lock();
        if *state == TrampolineState::Compiled {
            return Ok(self.entry.load(Ordering::Acquire));
        }
        *state = TrampolineState::Compiling;
        match compile() {
            Ok(address) => {
                self.entry.store(address, Ordering::Release);
                *state = TrampolineState::Compiled;
                debug!(address, "trampoline published compiled entry");
                Ok(address)
            }
            Err(error) => {
                *state = TrampolineState::NotCompiled;
                Err(error)
            }
        }
    }

    /// The stub entry this trampoline started out at, before any compilation.
    #[must_use]
    pub fn stub_entry(&self) -> usize {
        self.stub_entry
    }
}
