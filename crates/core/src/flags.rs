//! Header flag words for cells and series nodes
//!
//! Both cells and nodes lead with a packed 32-bit flag word. The cell word
//! splits into bits owned by the slot (never overwritten by an assignment)
//! and bits that travel with the value; see [`CellFlags::assign_mask`].

use bitflags::bitflags;

bitflags! {
    /// Cell header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellFlags: u32 {
        /// Set on every live cell. A header with `END` set and this bit
        /// clear is an end marker, never a writable cell.
        const CELL = 1 << 0;
        /// Array terminator marker.
        const END = 1 << 1;
        /// Slot may not be overwritten (`protect 'word`).
        const PROTECTED = 1 << 2;
        /// Source formatting: a newline preceded this cell.
        const NEWLINE_BEFORE = 1 << 3;
        /// The function in this slot is invoked with a left-hand argument.
        const ENFIXED = 1 << 4;
        /// Value was quoted rather than produced by evaluation.
        const UNEVALUATED = 1 << 5;
        /// Output cell carries a throw label; the payload is parked in the
        /// engine's thrown-argument slot.
        const THROWN = 1 << 6;
        /// Cached "conditionally false" answer (blank and false only).
        const FALSEY = 1 << 7;
        /// Experimental evaluation-inversion marker; inert unless the
        /// engine config enables it.
        const EVAL_FLIP = 1 << 8;
    }
}

impl CellFlags {
    /// Bits owned by the destination slot: an assignment keeps these from
    /// the old header no matter what the source carried.
    pub const SLOT_OWNED: CellFlags = CellFlags::CELL.union(CellFlags::END).union(CellFlags::PROTECTED);

    /// Bits that do not travel with an ordinary assignment.
    pub const NOT_PROPAGATED: CellFlags = CellFlags::ENFIXED
        .union(CellFlags::UNEVALUATED)
        .union(CellFlags::PROTECTED)
        .union(CellFlags::THROWN);

    /// Header bits an assignment writes into the destination, given a
    /// source header.
    pub fn assign_mask(src: CellFlags) -> CellFlags {
        src.difference(Self::SLOT_OWNED.union(Self::NOT_PROPAGATED))
    }
}

bitflags! {
    /// Primary series-node flags, fixed at creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u32 {
        /// Elements are cells; the series is end-terminated.
        const ARRAY = 1 << 0;
        /// Byte buffer holds UTF-8 text.
        const UTF8_TEXT = 1 << 1;
        /// Buffer may not grow or shrink.
        const FIXED_SIZE = 1 << 2;
        /// Buffer capacity was rounded to a power of two.
        const POW2_ALLOC = 1 << 3;
        /// Content is an out-of-line buffer rather than an embedded cell.
        const DYNAMIC = 1 << 4;
        /// Array is a function's parameter list.
        const PARAMLIST = 1 << 5;
        /// Array is a context's variable list.
        const VARLIST = 1 << 6;
        /// Array is a map's `[key value ...]` pairlist.
        const PAIRLIST = 1 << 7;
        /// Array is a context's key list.
        const KEYLIST = 1 << 8;
        /// Paramlist property, cached at function-make time: as an enfix
        /// operation this function defers its lookback by one step while a
        /// first argument is being fulfilled.
        const DEFERS_LOOKBACK = 1 << 9;
    }
}

bitflags! {
    /// Secondary node state, mutated over the series' lifetime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeInfo: u32 {
        /// Permanent, transitive read-only state.
        const FROZEN = 1 << 0;
        /// Revocable write protection.
        const PROTECTED = 1 << 1;
        /// Stack-transient read lock held by an in-progress enumeration.
        const HOLD = 1 << 2;
        /// Context whose frame has exited; lookups fail rather than crash.
        const INACCESSIBLE = 1 << 3;
        /// Keylist shared by several contexts; clone before mutating.
        const SHARED_KEYLIST = 1 << 4;
        /// Varlist belonging to a live (call-stack scoped) frame.
        const STACK_CONTEXT = 1 << 5;
        /// Owned by the collector rather than a manual tracker.
        const MANAGED = 1 << 6;
        /// Mark-phase reachability bit, clear between collections.
        const MARKED = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_mask_drops_slot_and_sticky_bits() {
        let src = CellFlags::CELL
            | CellFlags::ENFIXED
            | CellFlags::PROTECTED
            | CellFlags::FALSEY
            | CellFlags::NEWLINE_BEFORE;
        let copied = CellFlags::assign_mask(src);
        assert!(copied.contains(CellFlags::FALSEY));
        assert!(copied.contains(CellFlags::NEWLINE_BEFORE));
        assert!(!copied.contains(CellFlags::CELL));
        assert!(!copied.contains(CellFlags::ENFIXED));
        assert!(!copied.contains(CellFlags::PROTECTED));
    }
}
