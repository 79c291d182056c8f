//! Traps: install, snapshot, unwind
//!
//! A trap is a snapshot of every LIFO resource the evaluator owns. When a
//! failure unwinds to the trap, restoring the snapshot releases everything
//! acquired since: manual series are freed newest-first, guard stacks and
//! the data stack truncate, frames pop, and the GC-disable counter and
//! mold stack return to their recorded depths.
//!
//! Haltable traps (user `trap [...]`) intercept errors but let halts and
//! quits keep unwinding. The host-boundary trap intercepts everything:
//! halts become a `halted` error context, while quits stay a distinct
//! [`HostOutcome`] so the host can exit with the requested code.

use tracing::trace;

use revel_core::Cell;

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};

/// How a host-boundary evaluation ended: a value, an intercepted error
/// (halts included), or a clean QUIT with its exit code.
#[derive(Debug)]
pub enum HostOutcome<T> {
    Value(T),
    Error(Cell),
    Quit(i32),
}

/// Saved resource depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub data_stack: usize,
    pub frames: usize,
    pub manuals: usize,
    pub series_guards: usize,
    pub value_guards: usize,
    pub gc_disabled: u32,
    pub mold_depth: usize,
}

impl Engine {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            data_stack: self.data_stack.len(),
            frames: self.frames.len(),
            manuals: self.heap.manual_count(),
            series_guards: self.heap.series_guard_depth(),
            value_guards: self.heap.value_guard_depth(),
            gc_disabled: self.heap.gc_disabled_depth(),
            mold_depth: self.mold_stack.len(),
        }
    }

    /// Restore every tracked resource to its snapshot depth.
    pub fn unwind_to(&mut self, snapshot: &Snapshot) {
        trace!(
            frames = self.frames.len() - snapshot.frames.min(self.frames.len()),
            manuals = self.heap.manual_count().saturating_sub(snapshot.manuals),
            "unwinding to trap"
        );
        while self.frames.len() > snapshot.frames {
            self.pop_frame_source();
        }
        self.data_stack.truncate(snapshot.data_stack);
        self.heap.truncate_manuals(snapshot.manuals);
        self.heap
            .truncate_guards(snapshot.series_guards, snapshot.value_guards);
        self.heap.set_gc_disabled_depth(snapshot.gc_disabled);
        self.mold_stack.truncate(snapshot.mold_depth);
        self.thrown_arg = Cell::void();
    }

    /// Run `body` under a haltable trap. `Ok(Ok(v))` on success,
    /// `Ok(Err(error))` when a failure was intercepted (state restored),
    /// `Err(_)` when a halt or quit passes through.
    pub fn with_trap<T>(
        &mut self,
        body: impl FnOnce(&mut Engine) -> Result<T, Raised>,
    ) -> Result<Result<T, Cell>, Raised> {
        let snapshot = self.snapshot();
        match body(self) {
            Ok(value) => {
                self.drop_trap(&snapshot);
                Ok(Ok(value))
            }
            Err(Raised::Error(error)) => {
                self.unwind_to(&snapshot);
                Ok(Err(error))
            }
            // Halts and quits keep unwinding; the host boundary restores.
            Err(other) => Err(other),
        }
    }

    /// Run `body` under the host-boundary trap: errors are intercepted,
    /// halts surface as a `halted` error context, and QUIT arrives as its
    /// own outcome so the host can actually exit on it.
    pub fn with_unhaltable_trap<T>(
        &mut self,
        body: impl FnOnce(&mut Engine) -> Result<T, Raised>,
    ) -> HostOutcome<T> {
        let snapshot = self.snapshot();
        match body(self) {
            Ok(value) => {
                self.drop_trap(&snapshot);
                HostOutcome::Value(value)
            }
            Err(Raised::Error(error)) => {
                self.unwind_to(&snapshot);
                HostOutcome::Error(error)
            }
            Err(Raised::Halt) => {
                self.unwind_to(&snapshot);
                let halted = self.make_error(ErrorId::Halted, &[]);
                HostOutcome::Error(halted)
            }
            Err(Raised::Quit(code)) => {
                self.unwind_to(&snapshot);
                HostOutcome::Quit(code)
            }
        }
    }

    /// Leaving a trap scope on the success path must find the resources
    /// balanced; debug builds verify instead of silently truncating.
    fn drop_trap(&mut self, snapshot: &Snapshot) {
        debug_assert_eq!(self.frames.len(), snapshot.frames, "unbalanced frames at trap exit");
        debug_assert_eq!(
            self.heap.manual_count(),
            snapshot.manuals,
            "manual series leaked across trap scope"
        );
        debug_assert_eq!(
            self.data_stack.len(),
            snapshot.data_stack,
            "unbalanced data stack at trap exit"
        );
        debug_assert_eq!(
            self.heap.series_guard_depth(),
            snapshot.series_guards,
            "unbalanced series guards at trap exit"
        );
        debug_assert_eq!(
            self.heap.value_guard_depth(),
            snapshot.value_guards,
            "unbalanced value guards at trap exit"
        );
        debug_assert_eq!(
            self.heap.gc_disabled_depth(),
            snapshot.gc_disabled,
            "unbalanced GC disables at trap exit"
        );
    }
}
