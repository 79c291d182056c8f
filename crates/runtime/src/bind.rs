//! Binding: word ↔ context slot resolution
//!
//! A word cell caches `(binding, index)`. Lookup re-validates the cache:
//! the index must be in range and the keylist entry's spelling must still
//! match. A stale cache (keylist mutated since binding) re-binds by
//! spelling; an inaccessible context fails cleanly. Words bound to a
//! **paramlist** are *relative*: they need a frame specifier — the live
//! instance varlist — found by searching the frame chain.
//!
//! Bulk binds (loading source, object bodies, function bodies) do not scan
//! the keylist per word: they record each key's slot in the interning
//! table's per-canon scratch slot, walk the tree once, then zero the slots.

use bitflags::bitflags;

use revel_core::{Cell, NodeFlags, NodeId, NodeInfo, Payload, Sym, WordKind};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};

bitflags! {
    /// Mask for wholesale bind/unbind walks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindMode: u32 {
        /// Recurse into nested arrays.
        const DEEP = 1 << 0;
        /// Also rewrite words already bound to a function paramlist.
        const FUNC = 1 << 1;
    }
}

/// A resolved variable location: specific varlist plus 1-based slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLocation {
    pub varlist: NodeId,
    pub index: u32,
}

impl Engine {
    /// Resolve a word cell to its variable slot. Returns the location and
    /// a refreshed word cell when the cache had to be repaired (the caller
    /// writes it back if it owns the source slot).
    pub fn resolve_word(&mut self, word: &Cell) -> Result<(VarLocation, Option<Cell>), Raised> {
        let (kind, spelling, binding, index) = match word.payload {
            Payload::Word {
                kind,
                spelling,
                binding,
                index,
            } => (kind, spelling, binding, index),
            _ => panic!("resolve_word on a non-word cell"),
        };
        let name = Cell::word(WordKind::Word, spelling);

        let Some(target) = binding else {
            return Err(self.fail(ErrorId::NoValue, &[name]));
        };

        let varlist = if self.heap.node(target).flags.contains(NodeFlags::PARAMLIST) {
            // Relative word: combine with a frame specifier to find the
            // instance data.
            self.specifier_for(target)
                .ok_or_else(|| self.fail(ErrorId::ExpiredFrame, &[name]))?
        } else {
            target
        };

        if self.heap.node(varlist).info.contains(NodeInfo::INACCESSIBLE) {
            return Err(self.fail(ErrorId::ExpiredFrame, &[name]));
        }

        let keylist = self.keylist_of(varlist);
        let len = self.context_len(varlist) as u32;
        if index >= 1 && index <= len {
            if let Some(key) = self.key_sym(keylist, index) {
                if self.symbols.same_word(key, spelling) {
                    return Ok((VarLocation { varlist, index }, None));
                }
            }
        }

        // Stale cache: re-bind by spelling.
        match self.find_in_keylist(keylist, spelling) {
            Some(found) => {
                let repaired = Cell {
                    flags: word.flags,
                    payload: Payload::Word {
                        kind,
                        spelling,
                        binding,
                        index: found,
                    },
                };
                Ok((
                    VarLocation {
                        varlist,
                        index: found,
                    },
                    Some(repaired),
                ))
            }
            None => Err(self.fail(ErrorId::NoValue, &[name])),
        }
    }

    /// Find the live varlist for a relative word's paramlist by walking the
    /// frame chain innermost-first. The current frame's specifier is tried
    /// first (the common case inside a body evaluation).
    pub(crate) fn specifier_for(&self, paramlist: NodeId) -> Option<NodeId> {
        let matches = |varlist: NodeId| -> bool {
            match self.heap.node(varlist).link {
                revel_core::Link::Keylist(keylist) => keylist == paramlist,
                _ => false,
            }
        };

        if let Some(frame) = self.frames.last() {
            if let Some(specifier) = frame.specifier {
                if matches(specifier) {
                    return Some(specifier);
                }
            }
        }
        for frame in self.frames.iter().rev() {
            if let Some(specifier) = frame.specifier {
                if matches(specifier) {
                    return Some(specifier);
                }
            }
            if let Some(varlist) = frame.varlist {
                if matches(varlist) {
                    return Some(varlist);
                }
            }
        }
        None
    }

    /// Read a word's value. Void values are a `no-value` failure unless
    /// `allow_void` (get-word semantics).
    pub fn get_word_value(&mut self, word: &Cell, allow_void: bool) -> Result<Cell, Raised> {
        let (loc, _) = self.resolve_word(word)?;
        let value = self.var_at(loc.varlist, loc.index);
        if value.is_void() && !allow_void {
            let spelling = match word.payload {
                Payload::Word { spelling, .. } => spelling,
                _ => unreachable!(),
            };
            return Err(self.fail(ErrorId::NoValue, &[Cell::word(WordKind::Word, spelling)]));
        }
        Ok(value)
    }

    /// Write a word's variable slot.
    pub fn set_word_value(&mut self, word: &Cell, value: &Cell) -> Result<(), Raised> {
        let (loc, _) = self.resolve_word(word)?;
        self.set_var_at(loc.varlist, loc.index, value)
    }

    /// Strip bindings from words in an array. `BindMode::DEEP` recurses;
    /// without `BindMode::FUNC`, relative (paramlist-bound) words keep
    /// their binding.
    pub fn unbind_array(&mut self, array: NodeId, mode: BindMode) {
        self.unbind_walk(array, mode, &mut Vec::new());
    }

    fn unbind_walk(&mut self, array: NodeId, mode: BindMode, visited: &mut Vec<NodeId>) {
        if visited.contains(&array) {
            return;
        }
        visited.push(array);
        let len = self.heap.node(array).len();
        for i in 0..len {
            let cell = self.heap.node(array).at(i);
            match cell.payload {
                Payload::Word {
                    kind,
                    spelling,
                    binding: Some(target),
                    ..
                } => {
                    let relative = self.heap.node(target).flags.contains(NodeFlags::PARAMLIST);
                    if relative && !mode.contains(BindMode::FUNC) {
                        continue;
                    }
                    let mut unbound = cell;
                    unbound.payload = Payload::Word {
                        kind,
                        spelling,
                        binding: None,
                        index: 0,
                    };
                    self.heap.overwrite_cell(array, i, unbound);
                }
                Payload::List { node, .. } if mode.contains(BindMode::DEEP) => {
                    self.unbind_walk(node, mode, visited);
                }
                _ => {}
            }
        }
    }

    /// Bind every word in an array (deep through blocks, groups, and
    /// paths) whose spelling names a slot of `context`. Uses the scratch
    /// bind table; leaves it empty.
    pub fn bind_array_deep(&mut self, array: NodeId, context: NodeId) -> Result<(), Raised> {
        let keylist = self.keylist_of(context);
        let len = self.heap.node(keylist).len();
        let mut seeded: Vec<Sym> = Vec::with_capacity(len.saturating_sub(1));
        for index in 1..len {
            if let Some(sym) = self.key_sym(keylist, index as u32) {
                self.symbols.set_bind_index(sym, index as u32);
                seeded.push(sym);
            }
        }

        self.bind_walk(array, context, &mut Vec::new());

        for sym in seeded {
            self.symbols.clear_bind_index(sym);
        }
        self.symbols.assert_bind_table_empty();
        Ok(())
    }

    fn bind_walk(&mut self, array: NodeId, context: NodeId, visited: &mut Vec<NodeId>) {
        if visited.contains(&array) {
            return;
        }
        visited.push(array);
        let len = self.heap.node(array).len();
        for i in 0..len {
            let cell = self.heap.node(array).at(i);
            match cell.payload {
                Payload::Word {
                    kind,
                    spelling,
                    ..
                } => {
                    let slot = self.symbols.bind_index(spelling);
                    if slot != 0 {
                        let mut bound = cell;
                        bound.payload = Payload::Word {
                            kind,
                            spelling,
                            binding: Some(context),
                            index: slot,
                        };
                        self.heap.overwrite_cell(array, i, bound);
                    }
                }
                Payload::List { node, .. } => self.bind_walk(node, context, visited),
                _ => {}
            }
        }
    }

    /// Bind loaded source into Lib the way the user context interns console
    /// input: every word (any kind, any depth) gets a Lib slot — new ones
    /// unset — and then the whole tree binds.
    pub fn bind_source_to_lib(&mut self, array: NodeId) -> Result<(), Raised> {
        let mut words: Vec<Sym> = Vec::new();
        collect_words_deep(self, array, &mut words, &mut Vec::new());
        let lib = self.lib;
        for sym in words {
            self.append_to_context(lib, sym)?;
        }
        self.bind_array_deep(array, lib)
    }
}

fn collect_words_deep(
    engine: &Engine,
    array: NodeId,
    out: &mut Vec<Sym>,
    visited: &mut Vec<NodeId>,
) {
    if visited.contains(&array) {
        return;
    }
    visited.push(array);
    let len = engine.heap.node(array).len();
    for i in 0..len {
        let cell = engine.heap.node(array).at(i);
        match cell.payload {
            Payload::Word { spelling, .. } => {
                if !out.iter().any(|&s| engine.symbols.same_word(s, spelling)) {
                    out.push(spelling);
                }
            }
            Payload::List { node, .. } => collect_words_deep(engine, node, out, visited),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revel_core::ContextKind;

    fn engine_with_block(cells: &[Cell]) -> (Engine, NodeId) {
        let mut engine = Engine::new();
        let block = engine
            .heap
            .make_array(cells.len(), NodeFlags::empty())
            .unwrap();
        for cell in cells {
            engine.heap.push_cell(block, *cell).unwrap();
        }
        (engine, block)
    }

    #[test]
    fn bind_deep_reaches_nested_blocks() {
        let mut engine = Engine::new();
        let x = engine.symbols.intern("x");
        let inner = engine.heap.make_array(1, NodeFlags::empty()).unwrap();
        engine
            .heap
            .push_cell(inner, Cell::word(WordKind::Word, x))
            .unwrap();
        let outer = engine.heap.make_array(2, NodeFlags::empty()).unwrap();
        engine
            .heap
            .push_cell(outer, Cell::word(WordKind::Word, x))
            .unwrap();
        engine
            .heap
            .push_cell(outer, Cell::list(revel_core::ListKind::Block, inner, 0))
            .unwrap();

        let ctx = engine.make_context(1, ContextKind::Object).unwrap();
        engine.append_to_context(ctx, x).unwrap();
        engine.bind_array_deep(outer, ctx).unwrap();

        for (node, index) in [(outer, 0), (inner, 0)] {
            match engine.heap.node(node).at(index).payload {
                Payload::Word { binding, index, .. } => {
                    assert_eq!(binding, Some(ctx));
                    assert_eq!(index, 1);
                }
                other => panic!("expected bound word, got {other:?}"),
            }
        }
        engine.symbols.assert_bind_table_empty();
    }

    #[test]
    fn stale_cache_rebinds_by_spelling() {
        let mut engine = Engine::new();
        let ctx = engine.make_context(2, ContextKind::Object).unwrap();
        let x = engine.symbols.intern("x");
        let y = engine.symbols.intern("y");
        engine.append_to_context(ctx, x).unwrap();
        engine.append_to_context(ctx, y).unwrap();
        engine.set_var_at(ctx, 2, &Cell::integer(7)).unwrap();

        // A word bound to y but caching x's slot index.
        let stale = Cell::bound_word(WordKind::Word, y, ctx, 1);
        let (loc, repaired) = engine.resolve_word(&stale).unwrap();
        assert_eq!(loc.index, 2, "re-bound by spelling");
        assert!(repaired.is_some(), "cache repair offered for write-back");
        assert_eq!(engine.var_at(loc.varlist, loc.index).as_integer(), Some(7));
    }

    #[test]
    fn unbound_words_have_no_value() {
        let (mut engine, _) = engine_with_block(&[]);
        let nowhere = engine.symbols.intern("nowhere");
        let word = Cell::word(WordKind::Word, nowhere);
        let err = engine.get_word_value(&word, false).unwrap_err();
        match err {
            Raised::Error(cell) => assert_eq!(engine.error_id(&cell), Some("no-value")),
            other => panic!("unexpected non-error unwind: {other:?}"),
        }
    }

    #[test]
    fn unbind_strips_specific_bindings_only() {
        let mut engine = Engine::new();
        let ctx = engine.make_context(1, ContextKind::Object).unwrap();
        let x = engine.symbols.intern("x");
        engine.append_to_context(ctx, x).unwrap();

        let block = engine.heap.make_array(2, NodeFlags::empty()).unwrap();
        engine
            .heap
            .push_cell(block, Cell::bound_word(WordKind::Word, x, ctx, 1))
            .unwrap();
        let relative = engine.heap.make_array(1, NodeFlags::PARAMLIST).unwrap();
        engine
            .heap
            .push_cell(block, Cell::bound_word(WordKind::Word, x, relative, 1))
            .unwrap();

        engine.unbind_array(block, BindMode::DEEP);
        match engine.heap.node(block).at(0).payload {
            Payload::Word { binding, .. } => assert_eq!(binding, None),
            other => panic!("expected word, got {other:?}"),
        }
        match engine.heap.node(block).at(1).payload {
            Payload::Word { binding, .. } => {
                assert_eq!(binding, Some(relative), "relative words kept without FUNC");
            }
            other => panic!("expected word, got {other:?}"),
        }

        engine.unbind_array(block, BindMode::DEEP | BindMode::FUNC);
        match engine.heap.node(block).at(1).payload {
            Payload::Word { binding, .. } => assert_eq!(binding, None),
            other => panic!("expected word, got {other:?}"),
        }
    }

    #[test]
    fn set_words_load_into_lib() {
        let mut engine = Engine::new();
        let x = engine.symbols.intern("x");
        let block = engine.heap.make_array(2, NodeFlags::empty()).unwrap();
        engine
            .heap
            .push_cell(block, Cell::word(WordKind::SetWord, x))
            .unwrap();
        engine.heap.push_cell(block, Cell::integer(1)).unwrap();

        engine.bind_source_to_lib(block).unwrap();
        let lib = engine.lib_context();
        assert!(engine.find_in_context(lib, x).is_some());
        match engine.heap.node(block).at(0).payload {
            Payload::Word { binding, .. } => assert_eq!(binding, Some(lib)),
            other => panic!("expected bound set-word, got {other:?}"),
        }
    }
}
