//! Revel core: the value and memory substrate
//!
//! This crate holds the interpreter-independent foundation:
//!
//! - [`cell::Cell`] — the tagged, four-word, `Copy` value cell.
//! - [`symbol::SymbolTable`] — engine-wide interning with canon linkage.
//! - [`node::Node`] / [`pool::NodePool`] — uniform pooled series nodes.
//! - [`series::Heap`] — series creation/growth, manual tracking, guards.
//! - [`gc`] — precise mark-and-sweep over the pool.
//!
//! The evaluator, contexts, functions, and everything else that gives the
//! cells meaning lives in `revel-runtime`.

pub mod cell;
pub mod flags;
pub mod gc;
pub mod kind;
pub mod node;
pub mod pool;
pub mod series;
pub mod symbol;

pub use cell::{Cell, ContextKind, ListKind, ParamClass, Payload, WordKind};
pub use flags::{CellFlags, NodeFlags, NodeInfo};
pub use gc::{cell_refs, RecycleStats};
pub use kind::{Kind, KIND_MAX};
pub use node::{Buffer, Content, Link, MapKey, Misc, Node, NodeId, CELL_WIDTH, MAX_BIAS};
pub use pool::{pow2_capacity, PoolStats};
pub use series::{Heap, Trouble, DEFAULT_BALLAST};
pub use symbol::{Sym, SymbolTable};

/// Verify the cell layout contract at runtime, for hosts that want the
/// loud-boot behavior in release builds (the same check is a compile-time
/// test in `cell`).
pub fn verify_boot_layout() {
    let cell_size = std::mem::size_of::<Cell>();
    let expected = 4 * std::mem::size_of::<usize>();
    assert_eq!(
        cell_size, expected,
        "cell layout broken: {cell_size} bytes, expected {expected}"
    );
}
