//! Function values
//!
//! A function is two arrays. The **paramlist** holds the canonical
//! function cell at index 0 and one typeset cell per parameter after it
//! (spelling + allowed-type bits + parameter class). The **body holder**
//! is a single-cell array whose embedded cell is whatever the dispatcher
//! needs — an interpreted body block, a frame reference for definitional
//! returns, an exemplar for specializations — and whose `misc` slot names
//! the dispatcher by index into the engine's dispatcher table.
//!
//! Function bodies are deep-copied at make time and their param words are
//! bound *relatively* to the paramlist; the live instance varlist is found
//! through the frame specifier at call time.

use std::collections::HashMap;

use revel_core::{
    Cell, CellFlags, Kind, Link, Misc, NodeFlags, NodeId, ParamClass, Payload, Sym, WordKind,
};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};

/// What a dispatcher tells the evaluator to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The frame's output cell holds the result.
    Out,
    /// The output cell carries a throw label; propagate or catch.
    OutIsThrown,
    /// Re-enter dispatch with the frame's mutated phase (specializations
    /// and other wrappers).
    Redispatch,
}

/// A dispatcher: reads args from the frame, writes the output cell.
pub type NativeFn = fn(&mut Engine) -> Result<Flow, Raised>;

/// Dispatcher table indexes fixed at boot.
pub const DISPATCH_USER_BODY: u32 = 0;
pub const DISPATCH_RETURN: u32 = 1;
pub const DISPATCH_LEAVE: u32 = 2;
pub const DISPATCH_SPECIALIZED: u32 = 3;
/// First index handed to natives.
pub const DISPATCH_NATIVE_BASE: u32 = 4;

/// One parameter, decoded from a paramlist typeset cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub sym: Sym,
    pub class: ParamClass,
    pub bits: u64,
}

/// All-type bits, with and without void.
pub const TS_ANY: u64 = u64::MAX;
pub const TS_VOIDABLE: u64 = u64::MAX;
pub const TS_ANY_VALUE: u64 = !(Kind::Void.typeset_bit());

impl Engine {
    /// Decode a facade/paramlist into its parameters (1-based order).
    pub fn paramlist_params(&self, paramlist: NodeId) -> Vec<ParamInfo> {
        let len = self.heap.node(paramlist).len();
        let mut params = Vec::with_capacity(len.saturating_sub(1));
        for index in 1..len {
            if let Payload::Typeset {
                bits,
                spelling: Some(sym),
                class,
            } = self.heap.node(paramlist).at(index).payload
            {
                params.push(ParamInfo { sym, class, bits });
            }
        }
        params
    }

    /// The dispatcher table index stored on a body holder.
    pub fn dispatcher_of(&self, body: NodeId) -> u32 {
        match self.heap.node(body).misc {
            Misc::Dispatcher(id) => id,
            _ => panic!("body holder without a dispatcher"),
        }
    }

    /// Cached enfix-deferral property of a paramlist.
    pub fn defers_lookback(&self, paramlist: NodeId) -> bool {
        self.heap
            .node(paramlist)
            .flags
            .contains(NodeFlags::DEFERS_LOOKBACK)
    }

    /// Type bits named by a word in a function spec: a datatype gives its
    /// bit, a typeset its whole set.
    pub fn typeset_bits_for(&mut self, sym: Sym) -> Result<u64, Raised> {
        let lib = self.lib;
        if let Some(index) = self.find_in_context(lib, sym) {
            match self.var_at(lib, index).payload {
                Payload::Datatype(kind) => return Ok(kind.typeset_bit()),
                Payload::Typeset { bits, .. } => return Ok(bits),
                _ => {}
            }
        }
        Err(self.fail(ErrorId::InvalidArg, &[Cell::word(WordKind::Word, sym)]))
    }

    /// Parse a `func` spec block into parameter descriptions.
    ///
    /// - `word` — normal evaluated argument
    /// - `'word` — hard-quoted argument
    /// - `:word` — soft-quoted argument
    /// - `/refinement` — refinement; following words are its arguments
    /// - `/local` — following words are locals
    /// - `[types]` — restricts the preceding parameter
    /// - text — docstring, carried to the meta slot (ignored for calls)
    pub fn parse_spec(&mut self, spec: &Cell) -> Result<Vec<ParamInfo>, Raised> {
        let (node, start) = match spec.payload {
            Payload::List { node, index, .. } => (node, index as usize),
            _ => return Err(self.fail(ErrorId::InvalidArg, &[*spec])),
        };

        let mut params: Vec<ParamInfo> = Vec::new();
        let mut in_refinement = false;
        let mut in_locals = false;
        let len = self.heap.node(node).len();
        for i in start..len {
            let cell = self.heap.node(node).at(i);
            match cell.payload {
                Payload::Word { kind, spelling, .. } => match kind {
                    WordKind::Refinement => {
                        if self.symbols.spelling(self.symbols.canon(spelling)) == "local" {
                            in_locals = true;
                            continue;
                        }
                        in_refinement = true;
                        in_locals = false;
                        params.push(ParamInfo {
                            sym: spelling,
                            class: ParamClass::Refinement,
                            bits: Kind::Logic.typeset_bit() | Kind::Blank.typeset_bit(),
                        });
                    }
                    WordKind::Word | WordKind::LitWord | WordKind::GetWord => {
                        let class = if in_locals {
                            ParamClass::Local
                        } else {
                            match kind {
                                WordKind::LitWord => ParamClass::HardQuote,
                                WordKind::GetWord => ParamClass::SoftQuote,
                                _ => ParamClass::Normal,
                            }
                        };
                        let bits = if in_refinement || in_locals {
                            // Refinement args must accept void (revocation).
                            TS_VOIDABLE
                        } else {
                            TS_ANY_VALUE
                        };
                        params.push(ParamInfo {
                            sym: spelling,
                            class,
                            bits,
                        });
                    }
                    WordKind::SetWord => {
                        // `return:` annotation; ignored by the call path.
                        continue;
                    }
                },
                Payload::List { .. } if cell.kind() == Some(Kind::Block) => {
                    // Type restriction for the parameter just declared.
                    if let Some(last) = params.last_mut() {
                        last.bits = self.typeset_bits_from_block(&cell)?;
                        if matches!(last.class, ParamClass::Refinement) {
                            return Err(self.fail(ErrorId::InvalidArg, &[cell]));
                        }
                        if in_refinement {
                            last.bits |= Kind::Void.typeset_bit();
                        }
                    }
                }
                Payload::Text { .. } => continue,
                _ => return Err(self.fail(ErrorId::InvalidArg, &[cell])),
            }
        }
        Ok(params)
    }

    fn typeset_bits_from_block(&mut self, block: &Cell) -> Result<u64, Raised> {
        let (node, start) = match block.payload {
            Payload::List { node, index, .. } => (node, index as usize),
            _ => unreachable!(),
        };
        let mut bits = 0u64;
        let len = self.heap.node(node).len();
        for i in start..len {
            let cell = self.heap.node(node).at(i);
            match cell.payload {
                Payload::Word { spelling, .. } => bits |= self.typeset_bits_for(spelling)?,
                Payload::Datatype(kind) => bits |= kind.typeset_bit(),
                _ => return Err(self.fail(ErrorId::InvalidArg, &[cell])),
            }
        }
        Ok(if bits == 0 { TS_ANY_VALUE } else { bits })
    }

    /// Build a paramlist array from parsed parameters. Managed.
    pub fn make_paramlist(&mut self, params: &[ParamInfo]) -> Result<NodeId, Raised> {
        let paramlist = self
            .heap
            .make_array(params.len() + 1, NodeFlags::PARAMLIST)
            .map_err(|t| self.fail_trouble(t))?;
        // Slot 0 is patched to the canonical function cell once the body
        // holder exists.
        self.heap
            .push_cell(paramlist, Cell::blank())
            .map_err(|t| self.fail_trouble(t))?;
        for param in params {
            let key = Cell::typeset(param.bits, Some(param.sym), param.class);
            self.heap
                .push_cell(paramlist, key)
                .map_err(|t| self.fail_trouble(t))?;
        }
        if let Some(first) = params.first() {
            if first.class == ParamClass::SoftQuote {
                self.heap.node_mut(paramlist).flags |= NodeFlags::DEFERS_LOOKBACK;
            }
        }
        self.heap.manage(paramlist);
        Ok(paramlist)
    }

    /// Assemble a function value from a finished paramlist and body-holder
    /// cell, stamping the canonical cell into paramlist slot 0.
    pub fn finish_function(&mut self, paramlist: NodeId, body_cell: Cell, dispatcher: u32) -> Cell {
        let body = self.heap.make_singular(body_cell, NodeFlags::empty());
        self.heap.node_mut(body).misc = Misc::Dispatcher(dispatcher);
        self.heap.manage(body);

        let function = Cell::function(paramlist, body);
        self.heap.overwrite_cell(paramlist, 0, function);
        self.heap.node_mut(paramlist).link = Link::Underlying(paramlist);
        function
    }

    /// `func spec body`: parse the spec (adding the definitional RETURN
    /// slot), deep-copy the body, bind it relatively, and assemble the
    /// value.
    pub fn make_function_from_spec(&mut self, spec: &Cell, body: &Cell) -> Result<Cell, Raised> {
        let mut params = self.parse_spec(spec)?;
        let return_sym = self.symbols.intern("return");
        if !params
            .iter()
            .any(|p| self.symbols.same_word(p.sym, return_sym))
        {
            params.push(ParamInfo {
                sym: return_sym,
                class: ParamClass::Return,
                bits: Kind::Function.typeset_bit(),
            });
        }
        let paramlist = self.make_paramlist(&params)?;

        let (body_node, body_index, _) = match body.payload {
            Payload::List { node, index, specifier, .. } => (node, index, specifier),
            _ => return Err(self.fail(ErrorId::InvalidArg, &[*body])),
        };
        let copied = self.copy_array_deep(body_node, &mut HashMap::new())?;
        self.bind_relative(copied, paramlist, &params);
        self.manage_array_deep(copied);

        let body_cell = Cell::list(revel_core::ListKind::Block, copied, body_index);
        Ok(self.finish_function(paramlist, body_cell, DISPATCH_USER_BODY))
    }

    /// Deep-copy an array, preserving shared structure and cycles via the
    /// seen map.
    pub fn copy_array_deep(
        &mut self,
        node: NodeId,
        seen: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId, Raised> {
        if let Some(&copy) = seen.get(&node) {
            return Ok(copy);
        }
        let len = self.heap.node(node).len();
        let flags = self.heap.node(node).flags & (NodeFlags::ARRAY | NodeFlags::UTF8_TEXT);
        let copy = self
            .heap
            .make_array(len, flags)
            .map_err(|t| self.fail_trouble(t))?;
        seen.insert(node, copy);
        for i in 0..len {
            let cell = self.heap.node(node).at(i);
            let copied = match cell.payload {
                Payload::List {
                    kind,
                    node: inner,
                    index,
                    specifier,
                } => {
                    let inner_copy = self.copy_array_deep(inner, seen)?;
                    Cell {
                        flags: cell.flags,
                        payload: Payload::List {
                            kind,
                            node: inner_copy,
                            index,
                            specifier,
                        },
                    }
                }
                _ => cell,
            };
            self.heap
                .push_cell(copy, copied)
                .map_err(|t| self.fail_trouble(t))?;
        }
        Ok(copy)
    }

    /// Promote a (freshly copied) array tree to managed.
    pub fn manage_array_deep(&mut self, node: NodeId) {
        if self.heap.is_managed(node) {
            return;
        }
        self.heap.manage(node);
        let len = self.heap.node(node).len();
        for i in 0..len {
            if let Payload::List { node: inner, .. } = self.heap.node(node).at(i).payload {
                self.manage_array_deep(inner);
            }
        }
    }

    /// Bind param words in a body tree relatively to the paramlist.
    fn bind_relative(&mut self, array: NodeId, paramlist: NodeId, params: &[ParamInfo]) {
        for (slot, param) in params.iter().enumerate() {
            self.symbols.set_bind_index(param.sym, slot as u32 + 1);
        }
        self.bind_relative_walk(array, paramlist, &mut Vec::new());
        for param in params {
            self.symbols.clear_bind_index(param.sym);
        }
        self.symbols.assert_bind_table_empty();
    }

    fn bind_relative_walk(&mut self, array: NodeId, paramlist: NodeId, visited: &mut Vec<NodeId>) {
        if visited.contains(&array) {
            return;
        }
        visited.push(array);
        let len = self.heap.node(array).len();
        for i in 0..len {
            let cell = self.heap.node(array).at(i);
            match cell.payload {
                Payload::Word { kind, spelling, .. } => {
                    let slot = self.symbols.bind_index(spelling);
                    if slot != 0 {
                        let mut bound = cell;
                        bound.payload = Payload::Word {
                            kind,
                            spelling,
                            binding: Some(paramlist),
                            index: slot,
                        };
                        self.heap.overwrite_cell(array, i, bound);
                    }
                }
                Payload::List { node, .. } => self.bind_relative_walk(node, paramlist, visited),
                _ => {}
            }
        }
    }

    /// The definitional RETURN for a live frame: a one-argument function
    /// whose body holder points at the frame's varlist.
    pub fn make_definitional_return(&mut self, varlist: NodeId) -> Cell {
        let target = Cell::context(revel_core::ContextKind::Frame, varlist);
        let body = self.heap.make_singular(target, NodeFlags::empty());
        self.heap.node_mut(body).misc = Misc::Dispatcher(DISPATCH_RETURN);
        self.heap.manage(body);
        Cell::function(self.return_paramlist, body)
    }

    /// The definitional LEAVE: like RETURN but always yields void.
    pub fn make_definitional_leave(&mut self, varlist: NodeId) -> Cell {
        let target = Cell::context(revel_core::ContextKind::Frame, varlist);
        let body = self.heap.make_singular(target, NodeFlags::empty());
        self.heap.node_mut(body).misc = Misc::Dispatcher(DISPATCH_LEAVE);
        self.heap.manage(body);
        Cell::function(self.leave_paramlist, body)
    }

    /// Does a typeset admit this value?
    pub fn typecheck(&self, bits: u64, value: &Cell) -> bool {
        match value.kind() {
            Some(kind) => bits & kind.typeset_bit() != 0,
            None => false,
        }
    }

    /// Report an argument-type failure naming function, parameter, and the
    /// offending type.
    pub fn fail_arg_type(&mut self, label: Option<Sym>, param: Sym, value: &Cell) -> Raised {
        let name = label
            .map(|sym| Cell::word(WordKind::Word, sym))
            .unwrap_or_else(Cell::blank);
        let param_cell = Cell::word(WordKind::Word, param);
        let type_cell = match value.kind() {
            Some(kind) => Cell::datatype(kind),
            None => Cell::blank(),
        };
        self.fail(ErrorId::BadArgType, &[name, param_cell, type_cell])
    }
}

/// Mark a cell as unevaluated (quoted literals).
pub fn quoted(mut cell: Cell) -> Cell {
    cell.flags |= CellFlags::UNEVALUATED;
    cell
}
