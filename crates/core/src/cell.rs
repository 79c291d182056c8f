//! The tagged value cell
//!
//! A cell is the boxed union of every datatype the evaluator can see. It is
//! `Copy` and exactly four machine words on 64-bit targets; boot re-checks
//! the size loudly at runtime and a test pins it here.
//!
//! Layout:
//!
//! ```text
//! ┌───────────────┬──────────────────────────────────────────┐
//! │ flags (u32)   │ payload (tag + up to 16 data bytes)      │
//! └───────────────┴──────────────────────────────────────────┘
//! ```
//!
//! The payload discriminant is the kind tag; binding references, key
//! spellings, and similar "extra"-word data live inside the variant that
//! needs them. Assignment is *not* a plain struct copy: slot-owned header
//! bits stay with the destination and sticky bits (enfix, unevaluated,
//! protected, thrown) do not travel. See [`Cell::assign`].

use crate::flags::CellFlags;
use crate::kind::Kind;
use crate::node::NodeId;
use crate::symbol::Sym;

/// Word-family sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
}

impl WordKind {
    pub fn kind(self) -> Kind {
        match self {
            WordKind::Word => Kind::Word,
            WordKind::SetWord => Kind::SetWord,
            WordKind::GetWord => Kind::GetWord,
            WordKind::LitWord => Kind::LitWord,
            WordKind::Refinement => Kind::Refinement,
        }
    }
}

/// List-family sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
}

impl ListKind {
    pub fn kind(self) -> Kind {
        match self {
            ListKind::Block => Kind::Block,
            ListKind::Group => Kind::Group,
            ListKind::Path => Kind::Path,
            ListKind::SetPath => Kind::SetPath,
            ListKind::GetPath => Kind::GetPath,
            ListKind::LitPath => Kind::LitPath,
        }
    }
}

/// Context-family sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Object,
    Frame,
    Error,
    Port,
    Module,
}

impl ContextKind {
    pub fn kind(self) -> Kind {
        match self {
            ContextKind::Object => Kind::Object,
            ContextKind::Frame => Kind::FrameCtx,
            ContextKind::Error => Kind::Error,
            ContextKind::Port => Kind::Port,
            ContextKind::Module => Kind::Module,
        }
    }
}

/// Parameter convention, carried on paramlist typeset cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamClass {
    #[default]
    Normal,
    HardQuote,
    SoftQuote,
    Refinement,
    Local,
    Return,
    Leave,
}

/// Variant payload; the discriminant doubles as the kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Payload {
    /// Terminator slot; the only payload legal without `CellFlags::CELL`.
    #[default]
    End,
    Void,
    Blank,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Char(char),
    Datatype(Kind),
    Typeset {
        bits: u64,
        /// Key spelling when this typeset is a keylist/paramlist entry.
        spelling: Option<Sym>,
        class: ParamClass,
    },
    Word {
        kind: WordKind,
        spelling: Sym,
        /// Varlist (specific) or paramlist (relative) the word is bound
        /// into; the target node's role flag distinguishes the two.
        binding: Option<NodeId>,
        /// Cached 1-based slot index; re-validated against the keylist on
        /// every lookup.
        index: u32,
    },
    List {
        kind: ListKind,
        node: NodeId,
        index: u32,
        /// Instance context for resolving relative words inside the array.
        specifier: Option<NodeId>,
    },
    Text {
        node: NodeId,
        index: u32,
    },
    Binary {
        node: NodeId,
        index: u32,
    },
    Context {
        kind: ContextKind,
        varlist: NodeId,
    },
    Function {
        paramlist: NodeId,
        body: NodeId,
    },
    Map {
        pairlist: NodeId,
    },
    Handle {
        id: u32,
    },
}

/// The boxed value cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    pub flags: CellFlags,
    pub payload: Payload,
}

impl Cell {
    fn new(payload: Payload) -> Cell {
        Cell {
            flags: CellFlags::CELL,
            payload,
        }
    }

    /// An end marker: END set, CELL clear, so no routine mistakes it for a
    /// writable cell.
    pub const fn end() -> Cell {
        Cell {
            flags: CellFlags::END,
            payload: Payload::End,
        }
    }

    pub fn void() -> Cell {
        Cell::new(Payload::Void)
    }

    pub fn blank() -> Cell {
        let mut cell = Cell::new(Payload::Blank);
        cell.flags |= CellFlags::FALSEY;
        cell
    }

    pub fn logic(value: bool) -> Cell {
        let mut cell = Cell::new(Payload::Logic(value));
        if !value {
            cell.flags |= CellFlags::FALSEY;
        }
        cell
    }

    pub fn integer(value: i64) -> Cell {
        Cell::new(Payload::Integer(value))
    }

    pub fn decimal(value: f64) -> Cell {
        Cell::new(Payload::Decimal(value))
    }

    pub fn char(value: char) -> Cell {
        Cell::new(Payload::Char(value))
    }

    pub fn datatype(kind: Kind) -> Cell {
        Cell::new(Payload::Datatype(kind))
    }

    pub fn typeset(bits: u64, spelling: Option<Sym>, class: ParamClass) -> Cell {
        Cell::new(Payload::Typeset {
            bits,
            spelling,
            class,
        })
    }

    pub fn word(kind: WordKind, spelling: Sym) -> Cell {
        Cell::new(Payload::Word {
            kind,
            spelling,
            binding: None,
            index: 0,
        })
    }

    pub fn bound_word(kind: WordKind, spelling: Sym, binding: NodeId, index: u32) -> Cell {
        Cell::new(Payload::Word {
            kind,
            spelling,
            binding: Some(binding),
            index,
        })
    }

    pub fn list(kind: ListKind, node: NodeId, index: u32) -> Cell {
        Cell::new(Payload::List {
            kind,
            node,
            index,
            specifier: None,
        })
    }

    pub fn text(node: NodeId, index: u32) -> Cell {
        Cell::new(Payload::Text { node, index })
    }

    pub fn binary(node: NodeId, index: u32) -> Cell {
        Cell::new(Payload::Binary { node, index })
    }

    pub fn context(kind: ContextKind, varlist: NodeId) -> Cell {
        Cell::new(Payload::Context { kind, varlist })
    }

    pub fn function(paramlist: NodeId, body: NodeId) -> Cell {
        Cell::new(Payload::Function { paramlist, body })
    }

    pub fn map(pairlist: NodeId) -> Cell {
        Cell::new(Payload::Map { pairlist })
    }

    pub fn handle(id: u32) -> Cell {
        Cell::new(Payload::Handle { id })
    }

    /// The kind tag. End markers answer `None`; together with the CELL/END
    /// bits this forms the total discriminator.
    pub fn kind(&self) -> Option<Kind> {
        Some(match self.payload {
            Payload::End => return None,
            Payload::Void => Kind::Void,
            Payload::Blank => Kind::Blank,
            Payload::Logic(_) => Kind::Logic,
            Payload::Integer(_) => Kind::Integer,
            Payload::Decimal(_) => Kind::Decimal,
            Payload::Char(_) => Kind::Char,
            Payload::Datatype(_) => Kind::Datatype,
            Payload::Typeset { .. } => Kind::Typeset,
            Payload::Word { kind, .. } => kind.kind(),
            Payload::List { kind, .. } => kind.kind(),
            Payload::Text { .. } => Kind::Text,
            Payload::Binary { .. } => Kind::Binary,
            Payload::Context { kind, .. } => kind.kind(),
            Payload::Function { .. } => Kind::Function,
            Payload::Map { .. } => Kind::Map,
            Payload::Handle { .. } => Kind::Handle,
        })
    }

    pub fn is_end(&self) -> bool {
        self.flags.contains(CellFlags::END) && !self.flags.contains(CellFlags::CELL)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.payload, Payload::Void)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.payload, Payload::Blank)
    }

    /// One bit test, thanks to the cached FALSEY flag.
    pub fn is_truthy(&self) -> bool {
        !self.flags.contains(CellFlags::FALSEY)
    }

    pub fn is_thrown(&self) -> bool {
        self.flags.contains(CellFlags::THROWN)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.payload {
            Payload::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self.payload {
            Payload::Decimal(f) => Some(f),
            Payload::Integer(n) => Some(n as f64),
            _ => None,
        }
    }

    pub fn as_logic(&self) -> Option<bool> {
        match self.payload {
            Payload::Logic(b) => Some(b),
            _ => None,
        }
    }

    /// Overwrite this slot with `src`'s value, honoring the header rules:
    /// slot-owned bits survive, sticky bits do not propagate.
    pub fn assign(&mut self, src: &Cell) {
        debug_assert!(!self.is_end(), "assignment into an end marker");
        debug_assert!(!src.is_end(), "assignment from an end marker");
        let kept = self.flags & CellFlags::SLOT_OWNED;
        self.flags = kept | CellFlags::assign_mask(src.flags);
        self.payload = src.payload;
    }

    /// A fresh value cell carrying only the propagatable bits of `src`.
    /// This is what lands in newly-allocated slots (array appends, argument
    /// slots, outputs).
    pub fn copied(src: &Cell) -> Cell {
        Cell {
            flags: CellFlags::CELL | CellFlags::assign_mask(src.flags),
            payload: src.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn cell_is_four_machine_words() {
        assert_eq!(
            size_of::<Cell>(),
            4 * size_of::<usize>(),
            "Cell must be exactly four machine words, got {}",
            size_of::<Cell>()
        );
        assert_eq!(align_of::<Cell>(), align_of::<u64>());
    }

    #[test]
    fn end_marker_is_not_a_cell() {
        let end = Cell::end();
        assert!(end.is_end());
        assert!(!end.flags.contains(CellFlags::CELL));
        assert_eq!(end.kind(), None);
    }

    #[test]
    fn falsey_bit_is_cached() {
        assert!(Cell::logic(true).is_truthy());
        assert!(!Cell::logic(false).is_truthy());
        assert!(!Cell::blank().is_truthy());
        assert!(Cell::integer(0).is_truthy());
        assert!(Cell::void().is_truthy());
    }

    #[test]
    fn assign_preserves_slot_bits_and_drops_sticky_bits() {
        let mut slot = Cell::void();
        slot.flags |= CellFlags::PROTECTED;

        let mut incoming = Cell::integer(7);
        incoming.flags |= CellFlags::ENFIXED | CellFlags::NEWLINE_BEFORE;

        slot.assign(&incoming);
        assert_eq!(slot.as_integer(), Some(7));
        assert!(slot.flags.contains(CellFlags::PROTECTED), "slot keeps its protection");
        assert!(slot.flags.contains(CellFlags::CELL));
        assert!(!slot.flags.contains(CellFlags::ENFIXED), "enfix does not travel");
        assert!(slot.flags.contains(CellFlags::NEWLINE_BEFORE));
    }

    #[test]
    fn assign_refreshes_falsey_cache() {
        let mut slot = Cell::logic(false);
        slot.assign(&Cell::integer(1));
        assert!(slot.is_truthy());
        slot.assign(&Cell::blank());
        assert!(!slot.is_truthy());
    }
}
