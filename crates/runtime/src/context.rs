//! Contexts: paired varlist/keylist arrays
//!
//! A context is two arrays. The **varlist** holds the canonical context
//! cell at index 0 and one variable cell per slot after it; its `link`
//! reaches the **keylist**, whose entries are typeset cells carrying the
//! key spelling. Slot access is 1-based. Keylists may be shared between
//! contexts (object copying); the shared bit forces a clone before any
//! mutation so siblings never see each other's keys.

use revel_core::{
    Cell, ContextKind, Link, NodeFlags, NodeId, NodeInfo, ParamClass, Payload, Sym, WordKind,
};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};

impl Engine {
    /// Create an empty context of the given kind. Both arrays are managed.
    pub fn make_context(&mut self, capacity: usize, kind: ContextKind) -> Result<NodeId, Raised> {
        let keylist = self
            .heap
            .make_array(capacity + 1, NodeFlags::KEYLIST)
            .map_err(|t| self.fail_trouble(t))?;
        self.heap
            .push_cell(keylist, Cell::blank())
            .map_err(|t| self.fail_trouble(t))?;

        let varlist = self
            .heap
            .make_array(capacity + 1, NodeFlags::VARLIST)
            .map_err(|t| self.fail_trouble(t))?;
        let canon = Cell::context(kind, varlist);
        self.heap
            .push_cell(varlist, canon)
            .map_err(|t| self.fail_trouble(t))?;
        self.heap.node_mut(varlist).link = Link::Keylist(keylist);

        self.heap.manage(keylist);
        self.heap.manage(varlist);
        Ok(varlist)
    }

    /// The keylist a varlist reaches through its link. Frame varlists link
    /// straight to the function's paramlist.
    pub fn keylist_of(&self, varlist: NodeId) -> NodeId {
        match self.heap.node(varlist).link {
            Link::Keylist(keylist) => keylist,
            _ => panic!("varlist without a keylist link"),
        }
    }

    /// Visible slot count (keys, not counting the canon slot).
    pub fn context_len(&self, varlist: NodeId) -> usize {
        self.heap.node(varlist).len().saturating_sub(1)
    }

    /// Key spelling at a 1-based index.
    pub fn key_sym(&self, keylist: NodeId, index: u32) -> Option<Sym> {
        match self.heap.node(keylist).at(index as usize).payload {
            Payload::Typeset { spelling, .. } => spelling,
            _ => None,
        }
    }

    /// Find a word's 1-based slot in a context by canon spelling.
    pub fn find_in_context(&self, varlist: NodeId, sym: Sym) -> Option<u32> {
        self.find_in_keylist(self.keylist_of(varlist), sym)
    }

    /// Find a canon spelling in any keylist/paramlist shaped array.
    pub fn find_in_keylist(&self, keylist: NodeId, sym: Sym) -> Option<u32> {
        let len = self.heap.node(keylist).len();
        for index in 1..len {
            if let Some(key) = self.key_sym(keylist, index as u32) {
                if self.symbols.same_word(key, sym) {
                    return Some(index as u32);
                }
            }
        }
        None
    }

    /// Variable cell at a 1-based slot.
    pub fn var_at(&self, varlist: NodeId, index: u32) -> Cell {
        self.heap.node(varlist).at(index as usize)
    }

    /// Write a variable slot, honoring cell-level protection.
    pub fn set_var_at(&mut self, varlist: NodeId, index: u32, value: &Cell) -> Result<(), Raised> {
        let slot = self.var_at(varlist, index);
        if slot.flags.contains(revel_core::CellFlags::PROTECTED) {
            let keylist = self.keylist_of(varlist);
            let name = self
                .key_sym(keylist, index)
                .map(|sym| Cell::word(WordKind::Word, sym))
                .unwrap_or_else(Cell::blank);
            return Err(self.fail(ErrorId::ProtectedWord, &[name]));
        }
        let mut updated = slot;
        updated.assign(value);
        self.heap.overwrite_cell(varlist, index as usize, updated);
        Ok(())
    }

    /// Toggle cell-level protection of one slot.
    pub fn protect_var_at(&mut self, varlist: NodeId, index: u32, protect: bool) {
        let mut slot = self.var_at(varlist, index);
        if protect {
            slot.flags |= revel_core::CellFlags::PROTECTED;
        } else {
            slot.flags -= revel_core::CellFlags::PROTECTED;
        }
        self.heap.overwrite_cell(varlist, index as usize, slot);
    }

    /// Append a new key to a context, returning its slot. Clones a shared
    /// keylist before writing; fails on inaccessible contexts.
    pub fn append_to_context(&mut self, varlist: NodeId, sym: Sym) -> Result<u32, Raised> {
        if self.heap.node(varlist).info.contains(NodeInfo::INACCESSIBLE) {
            let name = Cell::word(WordKind::Word, sym);
            return Err(self.fail(ErrorId::ExpiredFrame, &[name]));
        }
        if let Some(index) = self.find_in_context(varlist, sym) {
            return Ok(index);
        }

        let mut keylist = self.keylist_of(varlist);
        if self.heap.node(keylist).info.contains(NodeInfo::SHARED_KEYLIST) {
            keylist = self.clone_keylist(keylist)?;
            self.heap.node_mut(varlist).link = Link::Keylist(keylist);
        }

        let key = Cell::typeset(u64::MAX, Some(sym), ParamClass::Normal);
        self.heap
            .push_cell(keylist, key)
            .map_err(|t| self.fail_trouble(t))?;
        self.heap
            .push_cell(varlist, Cell::void())
            .map_err(|t| self.fail_trouble(t))?;
        Ok(self.context_len(varlist) as u32)
    }

    fn clone_keylist(&mut self, keylist: NodeId) -> Result<NodeId, Raised> {
        let len = self.heap.node(keylist).len();
        let copy = self
            .heap
            .make_array(len, NodeFlags::KEYLIST)
            .map_err(|t| self.fail_trouble(t))?;
        for index in 0..len {
            let key = self.heap.node(keylist).at(index);
            self.heap
                .push_cell(copy, key)
                .map_err(|t| self.fail_trouble(t))?;
        }
        self.heap.manage(copy);
        Ok(copy)
    }

    /// Share one keylist across a second context (object copying). Both
    /// sides get the shared bit so either clones before mutating.
    pub fn share_keylist(&mut self, from_varlist: NodeId, to_varlist: NodeId) {
        let keylist = self.keylist_of(from_varlist);
        self.heap.node_mut(keylist).info |= NodeInfo::SHARED_KEYLIST;
        self.heap.node_mut(to_varlist).link = Link::Keylist(keylist);
    }

    /// `make object! [...]`: collect set-words into a fresh context, bind
    /// the body to it, then evaluate the body for its side effects.
    pub fn make_object(&mut self, body: &Cell) -> Result<Cell, Raised> {
        let (body_node, body_index, specifier) = match body.payload {
            Payload::List { node, index, specifier, .. } => (node, index, specifier),
            _ => {
                return Err(self.fail(ErrorId::BadMakeArg, &[Cell::datatype(revel_core::Kind::Object), *body]))
            }
        };

        let mut set_words: Vec<Sym> = Vec::new();
        collect_set_words(self, body_node, body_index as usize, &mut set_words);

        let varlist = self.make_context(set_words.len(), ContextKind::Object)?;
        for sym in set_words {
            self.append_to_context(varlist, sym)?;
        }

        self.bind_array_deep(body_node, varlist)?;
        let result = self.do_to_end(body_node, body_index, specifier)?;
        if result.is_thrown() {
            // A throw escaping a MAKE body keeps propagating.
            return Ok(result);
        }
        Ok(Cell::context(ContextKind::Object, varlist))
    }

    /// Copy a context: fresh varlist, shared keylist.
    pub fn copy_context(&mut self, varlist: NodeId) -> Result<NodeId, Raised> {
        let kind = match self.var_at(varlist, 0).payload {
            Payload::Context { kind, .. } => kind,
            _ => ContextKind::Object,
        };
        let len = self.heap.node(varlist).len();
        let copy = self
            .heap
            .make_array(len, NodeFlags::VARLIST)
            .map_err(|t| self.fail_trouble(t))?;
        self.heap
            .push_cell(copy, Cell::context(kind, copy))
            .map_err(|t| self.fail_trouble(t))?;
        for index in 1..len {
            let var = self.var_at(varlist, index as u32);
            self.heap
                .push_cell(copy, var)
                .map_err(|t| self.fail_trouble(t))?;
        }
        self.heap.manage(copy);
        self.share_keylist(varlist, copy);
        Ok(copy)
    }
}

/// Gather set-word spellings from one level of a body block (the slots an
/// object will have).
fn collect_set_words(engine: &Engine, node: NodeId, start: usize, out: &mut Vec<Sym>) {
    let len = engine.heap.node(node).len();
    for index in start..len {
        let cell = engine.heap.node(node).at(index);
        if let Payload::Word {
            kind: WordKind::SetWord,
            spelling,
            ..
        } = cell.payload
        {
            let canon = engine.symbols.canon(spelling);
            if !out.iter().any(|&s| engine.symbols.same_word(s, canon)) {
                out.push(spelling);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_slots_are_one_based() {
        let mut engine = Engine::new();
        let ctx = engine.make_context(2, ContextKind::Object).unwrap();
        let x = engine.symbols.intern("x");
        let y = engine.symbols.intern("y");

        assert_eq!(engine.append_to_context(ctx, x).unwrap(), 1);
        assert_eq!(engine.append_to_context(ctx, y).unwrap(), 2);
        assert_eq!(engine.context_len(ctx), 2);

        engine.set_var_at(ctx, 1, &Cell::integer(10)).unwrap();
        assert_eq!(engine.var_at(ctx, 1).as_integer(), Some(10));
        assert!(engine.var_at(ctx, 2).is_void());

        // The canon slot self-references.
        match engine.var_at(ctx, 0).payload {
            Payload::Context { varlist, .. } => assert_eq!(varlist, ctx),
            other => panic!("expected context canon cell, got {other:?}"),
        }
    }

    #[test]
    fn appending_existing_key_reuses_slot() {
        let mut engine = Engine::new();
        let ctx = engine.make_context(1, ContextKind::Object).unwrap();
        let x = engine.symbols.intern("x");
        let x_upper = engine.symbols.intern("X");

        let slot = engine.append_to_context(ctx, x).unwrap();
        assert_eq!(engine.append_to_context(ctx, x_upper).unwrap(), slot);
        assert_eq!(engine.context_len(ctx), 1);
    }

    #[test]
    fn shared_keylists_clone_before_mutation() {
        let mut engine = Engine::new();
        let original = engine.make_context(1, ContextKind::Object).unwrap();
        let x = engine.symbols.intern("x");
        engine.append_to_context(original, x).unwrap();

        let copy = engine.copy_context(original).unwrap();
        assert_eq!(
            engine.keylist_of(original),
            engine.keylist_of(copy),
            "copy shares the keylist"
        );

        // Mutating the copy forces a clone; the original keeps its keys.
        let y = engine.symbols.intern("y");
        engine.append_to_context(copy, y).unwrap();
        assert_ne!(engine.keylist_of(original), engine.keylist_of(copy));
        assert_eq!(engine.context_len(original), 1);
        assert_eq!(engine.context_len(copy), 2);
        assert!(engine.find_in_context(copy, x).is_some());
    }

    #[test]
    fn protected_slots_refuse_writes() {
        let mut engine = Engine::new();
        let ctx = engine.make_context(1, ContextKind::Object).unwrap();
        let x = engine.symbols.intern("x");
        engine.append_to_context(ctx, x).unwrap();
        engine.protect_var_at(ctx, 1, true);

        let err = engine.set_var_at(ctx, 1, &Cell::integer(5)).unwrap_err();
        match err {
            Raised::Error(cell) => {
                assert_eq!(engine.error_id(&cell), Some("protected-word"));
            }
            other => panic!("unexpected non-error unwind: {other:?}"),
        }

        engine.protect_var_at(ctx, 1, false);
        assert!(engine.set_var_at(ctx, 1, &Cell::integer(5)).is_ok());
    }

    #[test]
    fn inaccessible_contexts_fail_cleanly() {
        let mut engine = Engine::new();
        let ctx = engine.make_context(1, ContextKind::Frame).unwrap();
        let x = engine.symbols.intern("x");
        engine.append_to_context(ctx, x).unwrap();
        engine.heap.node_mut(ctx).info |= NodeInfo::INACCESSIBLE;

        let err = engine.append_to_context(ctx, engine.symbols.canon(x)).unwrap_err();
        match err {
            Raised::Error(cell) => assert_eq!(engine.error_id(&cell), Some("expired-frame")),
            other => panic!("unexpected non-error unwind: {other:?}"),
        }
    }
}
