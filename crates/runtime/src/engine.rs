//! The engine: one interpreter instance
//!
//! Everything that would otherwise live in file-scope globals — pools,
//! signal mask, canon table, root cells, trap bookkeeping, GC ballast — is
//! packaged here so a host can run isolated instances side by side.
//!
//! The engine owns the heap, the interning table, the data stack, the
//! evaluator frame stack, the dispatcher table, and the Lib/Sys contexts.
//! Signals are shared with the host through an `Arc` so interrupt handlers
//! can raise HALT without touching engine internals.

use std::sync::Arc;

use tracing::trace;

use revel_core::{Cell, CellFlags, ContextKind, Heap, Link, NodeFlags, NodeId, SymbolTable};

use crate::device::DeviceTable;
use crate::error::Raised;
use crate::frame::Frame;
use crate::function::NativeFn;
use crate::host::{Host, StdioHost};
use crate::signal::{Signal, SignalMask};

/// Switches for behaviors with more than one defensible reading, plus
/// evaluator limits. See DESIGN.md for the default rationale.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Re-pack a SET-PATH! write into its parent structure when the
    /// intermediate was a temporary.
    pub set_path_repacks_temporaries: bool,
    /// A deferred enfix step dampens after exactly one completion.
    pub dampen_defer_once: bool,
    /// Give `EVAL_FLIP`-flagged cells inverted evaluation semantics.
    pub eval_flip_enabled: bool,
    /// Allow halts raised inside dispatchers to unwind immediately.
    pub halt_in_dispatchers: bool,
    /// Evaluator recursion budget; exceeding it is a stack-overflow error.
    /// Each interpreted nesting level costs several host frames, so this
    /// stays well inside a 2 MiB thread stack.
    pub max_eval_depth: u32,
}

impl Default for EvalConfig {
    fn default() -> EvalConfig {
        EvalConfig {
            set_path_repacks_temporaries: true,
            dampen_defer_once: true,
            eval_flip_enabled: false,
            halt_in_dispatchers: true,
            max_eval_depth: 512,
        }
    }
}

/// One interpreter instance.
pub struct Engine {
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub signals: Arc<SignalMask>,
    pub(crate) data_stack: Vec<Cell>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) thrown_arg: Cell,
    pub(crate) dispatchers: Vec<NativeFn>,
    pub(crate) lib: NodeId,
    pub(crate) sys: NodeId,
    pub(crate) root_cells: Vec<Cell>,
    pub(crate) mold_stack: Vec<NodeId>,
    pub(crate) devices: DeviceTable,
    pub(crate) host: Box<dyn Host>,
    pub config: EvalConfig,
    /// Paramlist of the definitional RETURN function, built at boot.
    pub(crate) return_paramlist: NodeId,
    /// Paramlist of the definitional LEAVE function, built at boot.
    pub(crate) leave_paramlist: NodeId,
}

impl Engine {
    /// Boot an engine with the default host and config.
    pub fn new() -> Engine {
        Engine::with_host(Box::new(StdioHost), EvalConfig::default())
    }

    /// Boot an engine with a custom host and config.
    pub fn with_host(host: Box<dyn Host>, config: EvalConfig) -> Engine {
        revel_core::verify_boot_layout();

        let mut heap = Heap::new();
        let lib = raw_context(&mut heap);
        let sys = raw_context(&mut heap);

        let mut engine = Engine {
            heap,
            symbols: SymbolTable::new(),
            signals: Arc::new(SignalMask::new()),
            data_stack: Vec::new(),
            frames: Vec::new(),
            thrown_arg: Cell::void(),
            dispatchers: Vec::new(),
            lib,
            sys,
            root_cells: vec![Cell::logic(true), Cell::logic(false), Cell::blank()],
            mold_stack: Vec::new(),
            devices: DeviceTable::new(),
            host,
            config,
            return_paramlist: lib, // placeholder until boot
            leave_paramlist: lib,  // placeholder until boot
        };
        crate::boot::install(&mut engine);
        trace!(symbols = engine.symbols.len(), "engine booted");
        engine
    }

    // --- frame stack ------------------------------------------------------

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().expect("no evaluator frame")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no evaluator frame")
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // --- data stack -------------------------------------------------------

    pub(crate) fn ds_push(&mut self, cell: Cell) {
        self.data_stack.push(cell);
    }

    pub(crate) fn ds_pop(&mut self) -> Cell {
        self.data_stack.pop().expect("data stack underflow")
    }

    pub fn data_stack_depth(&self) -> usize {
        self.data_stack.len()
    }

    /// Root a loop iteration's value on the data stack, replacing the slot
    /// above `base`. Keeps results alive across the next iteration's safe
    /// points.
    pub(crate) fn ds_keep(&mut self, base: usize, value: Cell) {
        if self.data_stack.len() > base {
            self.data_stack.pop();
        }
        self.data_stack.push(value);
    }

    /// Release and return the value parked by `ds_keep` (void if none).
    pub(crate) fn ds_release(&mut self, base: usize) -> Cell {
        if self.data_stack.len() > base {
            self.data_stack.pop().expect("length checked")
        } else {
            Cell::void()
        }
    }

    // --- host & devices ---------------------------------------------------

    pub fn host_mut(&mut self) -> &mut dyn Host {
        self.host.as_mut()
    }

    pub fn devices_mut(&mut self) -> &mut DeviceTable {
        &mut self.devices
    }

    pub fn lib_context(&self) -> NodeId {
        self.lib
    }

    pub fn sys_context(&self) -> NodeId {
        self.sys
    }

    // --- signals and safe points -----------------------------------------

    /// Ask the engine to halt at its next safe point (callable from any
    /// thread through the shared mask).
    pub fn request_halt(&self) {
        self.signals.raise(Signal::Halt);
    }

    /// The evaluator's single signal service point, run between
    /// expressions. Never mid-allocation.
    pub(crate) fn service_signals(&mut self) -> Result<(), Raised> {
        if self.signals.take(Signal::Halt) {
            return Err(Raised::Halt);
        }
        if self.signals.take(Signal::Interrupt) {
            trace!("interrupt signal serviced");
        }
        if self.signals.take(Signal::Event) {
            trace!("event signal serviced");
        }
        let wants_recycle = self.signals.take(Signal::Recycle) || self.heap.ballast_exceeded();
        if wants_recycle && self.heap.gc_disabled_depth() == 0 {
            self.collect_garbage();
        }
        Ok(())
    }

    /// Run a full recycle with the engine's root set.
    pub fn collect_garbage(&mut self) -> revel_core::RecycleStats {
        let mut cells: Vec<Cell> = Vec::with_capacity(self.data_stack.len() + 8);
        cells.extend_from_slice(&self.data_stack);
        cells.push(self.thrown_arg);
        cells.extend_from_slice(&self.root_cells);

        let mut nodes: Vec<NodeId> = vec![self.lib, self.sys, self.return_paramlist, self.leave_paramlist];
        for frame in &self.frames {
            cells.push(frame.out);
            cells.push(frame.scratch);
            if let Some(pending) = frame.pending {
                cells.push(pending);
            }
            if let Some(original) = frame.original {
                cells.push(original);
            }
            nodes.push(frame.source);
            nodes.extend(frame.specifier);
            nodes.extend(frame.varlist);
            nodes.extend(frame.phase);
            nodes.extend(frame.facade);
        }
        nodes.extend_from_slice(&self.mold_stack);

        self.heap.recycle(&cells, &nodes)
    }

    // --- throw plumbing ---------------------------------------------------

    /// Mark `label` as a throw in flight, parking the payload in the
    /// engine-wide thrown-argument slot.
    pub(crate) fn throw(&mut self, label: Cell, payload: Cell) -> Cell {
        let mut out = label;
        out.flags |= CellFlags::THROWN;
        self.thrown_arg = payload;
        out
    }

    /// Consume a throw: clear the bit, hand back (label, payload).
    pub(crate) fn catch_thrown(&mut self, out: &Cell) -> (Cell, Cell) {
        debug_assert!(out.is_thrown());
        let mut label = *out;
        label.flags -= CellFlags::THROWN;
        let payload = self.thrown_arg;
        self.thrown_arg = Cell::void();
        (label, payload)
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

/// A bare empty context (keylist + varlist, both managed), used to
/// bootstrap Lib and Sys before any engine machinery exists.
fn raw_context(heap: &mut Heap) -> NodeId {
    let keylist = heap
        .make_array(1, NodeFlags::KEYLIST)
        .expect("boot keylist allocation");
    heap.push_cell(keylist, Cell::blank()).expect("boot keylist self slot");

    let varlist = heap
        .make_array(1, NodeFlags::VARLIST)
        .expect("boot varlist allocation");
    let canon = Cell::context(ContextKind::Object, varlist);
    heap.push_cell(varlist, canon).expect("boot varlist self cell");
    heap.node_mut(varlist).link = Link::Keylist(keylist);

    heap.manage(keylist);
    heap.manage(varlist);
    varlist
}
