//! Path dispatch
//!
//! Paths thread a picker cell through successive containers: contexts pick
//! by word, series by index or by word-select, maps by key. A function
//! encountered under evaluation collects the remaining segments as
//! refinements and becomes a call. SET-PATH! walks the same way but
//! remembers the final slot's location so the write can honor protection
//! and locking.

use revel_core::{Cell, Kind, ListKind, MapKey, NodeId, NodeInfo, Payload, Sym, WordKind};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};

/// What the caller wants from the path.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PathMode {
    /// GET-PATH!: fetch without calling functions.
    Get,
    /// PATH! under evaluation: functions consume refinements and run.
    Eval,
    /// SET-PATH!: write this value into the final location.
    Set(Cell),
}

/// How one picker step left the walk (mirrors the dispatch result codes of
/// the path machinery).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathState {
    /// Keep walking with the picked value.
    Ok,
    /// The picked slot is assignable if the path ends here.
    SetIfEnd,
    /// The value lives in the scratch store (computed, not a slot).
    UseStore,
    /// Nothing picked (soft miss).
    None,
}

/// Where the final value lives, for SET writes.
#[derive(Debug, Clone, Copy)]
enum Place {
    None,
    ContextSlot(NodeId, u32),
    SeriesAt(NodeId, u32),
    MapEntry(NodeId),
}

impl Engine {
    /// Evaluate a path cell in the given mode. The result (for Get/Eval)
    /// lands in the frame's output cell.
    pub(crate) fn eval_path_cell(&mut self, path: &Cell, mode: PathMode) -> Result<(), Raised> {
        let (node, start) = match path.payload {
            Payload::List { node, index, .. } => (node, index as usize),
            _ => panic!("eval_path_cell on a non-path"),
        };
        let len = self.heap.node(node).len();
        if len <= start {
            return Err(self.fail(ErrorId::InvalidPath, &[*path, Cell::blank()]));
        }

        // Head: a word resolved in the usual way.
        let head = self.heap.node(node).at(start);
        let head_sym = match head.payload {
            Payload::Word {
                kind: WordKind::Word,
                spelling,
                ..
            } => spelling,
            _ => return Err(self.fail(ErrorId::InvalidPath, &[*path, head])),
        };
        let (loc, _) = self.resolve_word(&head)?;
        let mut current = self.var_at(loc.varlist, loc.index);
        let mut place = Place::ContextSlot(loc.varlist, loc.index);

        if current.is_void() {
            return Err(self.fail(ErrorId::NoValue, &[Cell::word(WordKind::Word, head_sym)]));
        }

        // A function at the head takes the remaining segments as
        // refinements (evaluation mode only).
        if current.kind() == Some(Kind::Function) {
            if matches!(mode, PathMode::Eval) {
                let refinements = self.collect_refinements(path, node, start + 1)?;
                return self.call_function(current, Some(head_sym), None, refinements, false);
            }
            if matches!(mode, PathMode::Get) && len == start + 1 {
                self.frame_mut().out = current;
                return Ok(());
            }
        }

        let mut position = start + 1;
        while position < len {
            let segment = self.heap.node(node).at(position);
            let picker = self.resolve_picker(&segment)?;
            let Some(picker) = picker else {
                // Throw escaped from a group picker.
                return Ok(());
            };

            let (value, next_place, state) = self.pick_step(*path, current, &picker)?;

            if state == PathState::None && !matches!(mode, PathMode::Set(_)) {
                self.frame_mut().out = Cell::blank();
                return Ok(());
            }

            // Function mid-path: remaining segments are refinements.
            if value.kind() == Some(Kind::Function) && matches!(mode, PathMode::Eval) {
                let label = match picker.payload {
                    Payload::Word { spelling, .. } => Some(spelling),
                    _ => None,
                };
                let refinements = self.collect_refinements(path, node, position + 1)?;
                return self.call_function(value, label, None, refinements, false);
            }

            current = value;
            place = next_place;
            position += 1;

            if position >= len {
                match mode {
                    PathMode::Set(new_value) => {
                        if state == PathState::UseStore && !self.config.set_path_repacks_temporaries
                        {
                            return Err(self.fail(ErrorId::InvalidPath, &[*path, picker]));
                        }
                        return self.write_place(place, *path, &picker, &new_value);
                    }
                    _ => {
                        let _ = state == PathState::SetIfEnd; // terminal reads need no repack
                        self.frame_mut().out = current;
                        return Ok(());
                    }
                }
            }
        }

        // Single-segment path (degenerate): behaves like the word.
        match mode {
            PathMode::Set(new_value) => {
                if let Place::ContextSlot(varlist, index) = place {
                    self.set_var_at(varlist, index, &new_value)
                } else {
                    Err(self.fail(ErrorId::InvalidPath, &[*path, head]))
                }
            }
            _ => {
                self.frame_mut().out = current;
                Ok(())
            }
        }
    }

    /// Resolve a path segment into a literal picker. Groups evaluate;
    /// get-words fetch. `None` means a throw is in flight.
    fn resolve_picker(&mut self, segment: &Cell) -> Result<Option<Cell>, Raised> {
        match segment.payload {
            Payload::List {
                kind: ListKind::Group,
                node,
                index,
                specifier,
            } => {
                let specifier = specifier.or(self.frame().specifier);
                let value = self.do_to_end(node, index, specifier)?;
                if value.is_thrown() {
                    self.frame_mut().out = value;
                    return Ok(None);
                }
                Ok(Some(value))
            }
            Payload::Word {
                kind: WordKind::GetWord,
                ..
            } => Ok(Some(self.get_word_value(segment, false)?)),
            _ => Ok(Some(*segment)),
        }
    }

    /// One picker application.
    fn pick_step(
        &mut self,
        path: Cell,
        current: Cell,
        picker: &Cell,
    ) -> Result<(Cell, Place, PathState), Raised> {
        match current.payload {
            Payload::Context { kind: _, varlist } => {
                if self.heap.node(varlist).info.contains(NodeInfo::INACCESSIBLE) {
                    return Err(self.fail(ErrorId::ExpiredFrame, &[path]));
                }
                let sym = match picker.payload {
                    Payload::Word { spelling, .. } => spelling,
                    _ => return Err(self.fail(ErrorId::InvalidPath, &[path, *picker])),
                };
                match self.find_in_context(varlist, sym) {
                    Some(index) => Ok((
                        self.var_at(varlist, index),
                        Place::ContextSlot(varlist, index),
                        PathState::SetIfEnd,
                    )),
                    None => Err(self.fail(ErrorId::InvalidPath, &[path, *picker])),
                }
            }
            Payload::List { node, index, .. } => match picker.payload {
                Payload::Integer(n) => {
                    let at = index as i64 + n - 1;
                    let len = self.heap.node(node).len() as i64;
                    if n < 1 || at >= len {
                        Ok((Cell::blank(), Place::None, PathState::None))
                    } else {
                        Ok((
                            self.heap.node(node).at(at as usize),
                            Place::SeriesAt(node, at as u32),
                            PathState::SetIfEnd,
                        ))
                    }
                }
                Payload::Word { spelling, .. } => {
                    // Word pickers select: find the word, yield what follows.
                    let len = self.heap.node(node).len();
                    for i in index as usize..len {
                        let cell = self.heap.node(node).at(i);
                        if let Payload::Word {
                            spelling: found, ..
                        } = cell.payload
                        {
                            if self.symbols.same_word(found, spelling) && i + 1 < len {
                                return Ok((
                                    self.heap.node(node).at(i + 1),
                                    Place::SeriesAt(node, i as u32 + 1),
                                    PathState::SetIfEnd,
                                ));
                            }
                        }
                    }
                    Ok((Cell::blank(), Place::None, PathState::None))
                }
                _ => Err(self.fail(ErrorId::InvalidPath, &[path, *picker])),
            },
            Payload::Map { pairlist } => {
                let Some(key) = self.map_key_for(picker) else {
                    return Err(self.fail(ErrorId::InvalidPath, &[path, *picker]));
                };
                match self.map_find(pairlist, &key) {
                    Some(pair_index) => Ok((
                        self.heap.node(pairlist).at(pair_index as usize + 1),
                        Place::MapEntry(pairlist),
                        PathState::SetIfEnd,
                    )),
                    None => Ok((Cell::blank(), Place::MapEntry(pairlist), PathState::None)),
                }
            }
            Payload::Text { node, index } => match picker.payload {
                Payload::Integer(n) if n >= 1 => {
                    let text = self.heap.node(node).as_str();
                    match text.chars().nth(index as usize + n as usize - 1) {
                        Some(ch) => Ok((Cell::char(ch), Place::None, PathState::UseStore)),
                        None => Ok((Cell::blank(), Place::None, PathState::None)),
                    }
                }
                Payload::Integer(_) => Ok((Cell::blank(), Place::None, PathState::None)),
                _ => Err(self.fail(ErrorId::InvalidPath, &[path, *picker])),
            },
            _ => Err(self.fail(ErrorId::InvalidPath, &[path, *picker])),
        }
    }

    fn write_place(
        &mut self,
        place: Place,
        path: Cell,
        picker: &Cell,
        value: &Cell,
    ) -> Result<(), Raised> {
        match place {
            Place::ContextSlot(varlist, index) => self.set_var_at(varlist, index, value),
            Place::SeriesAt(node, index) => self
                .heap
                .poke_cell(node, index as usize, *value)
                .map_err(|t| self.fail_trouble(t)),
            Place::MapEntry(pairlist) => {
                let key = self
                    .map_key_for(picker)
                    .expect("map picker validated during walk");
                self.map_put(pairlist, key, picker, value)
            }
            Place::None => Err(self.fail(ErrorId::InvalidPath, &[path, *picker])),
        }
    }

    fn collect_refinements(
        &mut self,
        path: &Cell,
        node: NodeId,
        from: usize,
    ) -> Result<Vec<Sym>, Raised> {
        let len = self.heap.node(node).len();
        let mut refinements = Vec::with_capacity(len - from);
        for i in from..len {
            let segment = self.heap.node(node).at(i);
            match segment.payload {
                Payload::Word { spelling, .. } => refinements.push(spelling),
                _ => return Err(self.fail(ErrorId::BadRefine, &[*path, segment])),
            }
        }
        Ok(refinements)
    }

    // --- map primitives ---------------------------------------------------

    /// Hashable projection of a picker/key cell.
    pub(crate) fn map_key_for(&self, cell: &Cell) -> Option<MapKey> {
        match cell.payload {
            Payload::Integer(n) => Some(MapKey::Integer(n)),
            Payload::Char(c) => Some(MapKey::Char(c)),
            Payload::Logic(b) => Some(MapKey::Logic(b)),
            Payload::Word { spelling, .. } => Some(MapKey::Word(self.symbols.canon(spelling))),
            Payload::Text { node, .. } => Some(MapKey::Text(self.heap.node(node).as_str().into())),
            _ => None,
        }
    }

    /// Find a key's 0-based pair position via the hash index.
    pub(crate) fn map_find(&self, pairlist: NodeId, key: &MapKey) -> Option<u32> {
        match &self.heap.node(pairlist).misc {
            revel_core::Misc::Hashlist(index) => index.get(key).copied(),
            _ => None,
        }
    }

    /// Insert or update a map entry, maintaining the hash index.
    pub(crate) fn map_put(
        &mut self,
        pairlist: NodeId,
        key: MapKey,
        key_cell: &Cell,
        value: &Cell,
    ) -> Result<(), Raised> {
        if let Some(pair_index) = self.map_find(pairlist, &key) {
            self.heap
                .poke_cell(pairlist, pair_index as usize + 1, *value)
                .map_err(|t| self.fail_trouble(t))?;
            return Ok(());
        }
        let at = self.heap.node(pairlist).len() as u32;
        self.heap
            .push_cell(pairlist, *key_cell)
            .map_err(|t| self.fail_trouble(t))?;
        self.heap
            .push_cell(pairlist, *value)
            .map_err(|t| self.fail_trouble(t))?;
        if let revel_core::Misc::Hashlist(index) = &mut self.heap.node_mut(pairlist).misc {
            index.insert(key, at);
        }
        Ok(())
    }
}
