//! Evaluator frames
//!
//! One [`Frame`] per evaluation source or function call, chained through
//! the engine's frame stack. A frame owns its output and scratch cells, a
//! source position with a one-cell lookahead slot, and — during a function
//! call — the fulfillment cursors and the args varlist.

use bitflags::bitflags;

use revel_core::{Cell, NodeId, Sym};

/// What the frame is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Evaluating expressions, not inside a call.
    #[default]
    Normal,
    /// Fulfilling ordinary arguments.
    Args,
    /// Saw a refinement param; deciding whether it applies.
    RefinePending,
    /// Consuming the arguments of an active refinement.
    RefineArgs,
    /// Scanning ahead for an out-of-order refinement.
    Scanning,
    /// Skipping the arguments of an unused refinement.
    Skipping,
    /// A refinement arg came back void; remaining args must too.
    Revoking,
    /// Arguments complete; the dispatcher is running.
    Function,
}

bitflags! {
    /// Per-frame behavior switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u32 {
        /// Evaluate to the end of the source, not a single step.
        const TO_END = 1 << 0;
        /// Args come from an apply-style array; do not evaluate them.
        const APPLYING = 1 << 1;
        /// This frame exists to fulfill a parent frame's argument.
        const FULFILLING_ARG = 1 << 2;
        /// Quoted-argument mode: feed cells are taken literally.
        const NO_ARGS_EVALUATE = 1 << 3;
        /// Suppress enfix lookahead after the current step completes.
        const NO_LOOKAHEAD = 1 << 4;
        /// A deferred enfix step already ran at this level; don't cascade.
        const DAMPEN_DEFER = 1 << 5;
        /// The source array is held for the duration of this frame.
        const SOURCE_HELD = 1 << 6;
    }
}

/// Per-call evaluator state.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Where the current expression's product lands.
    pub out: Cell,
    /// Evaluation temporary (current value, path pickers).
    pub scratch: Cell,
    /// Source array being consumed.
    pub source: NodeId,
    /// Next fetch position.
    pub index: u32,
    /// Instance context for relative words in the source.
    pub specifier: Option<NodeId>,
    /// One-cell lookahead; a fetched-but-unconsumed cell.
    pub pending: Option<Cell>,
    /// Function value being applied, when this is a call frame.
    pub original: Option<Cell>,
    /// Paramlist currently dispatching (changes on redispatch).
    pub phase: Option<NodeId>,
    /// Paramlist to fulfill against (facade when one exists).
    pub facade: Option<NodeId>,
    /// Word the call was reached through, for error messages.
    pub label: Option<Sym>,
    /// Args context of a call frame.
    pub varlist: Option<NodeId>,
    /// 1-based cursor into the facade during fulfillment.
    pub param_index: u32,
    /// Param index of the refinement currently consuming args.
    pub refine_index: u32,
    pub mode: Mode,
    pub flags: FrameFlags,
}

impl Frame {
    pub fn new(source: NodeId, index: u32, specifier: Option<NodeId>) -> Frame {
        Frame {
            out: Cell::void(),
            scratch: Cell::void(),
            source,
            index,
            specifier,
            pending: None,
            original: None,
            phase: None,
            facade: None,
            label: None,
            varlist: None,
            param_index: 0,
            refine_index: 0,
            mode: Mode::Normal,
            flags: FrameFlags::empty(),
        }
    }
}

/// Result of one evaluator step: the next position, end of source, or a
/// throw in flight. Sentinels are distinct variants, so index arithmetic on
/// them is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexor {
    Next(u32),
    End,
    Thrown,
}

impl Indexor {
    pub fn is_end(self) -> bool {
        matches!(self, Indexor::End)
    }

    pub fn is_thrown(self) -> bool {
        matches!(self, Indexor::Thrown)
    }
}
