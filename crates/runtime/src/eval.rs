//! The do-loop
//!
//! `eval_expression` evaluates one expression on the top frame: fetch the
//! cell, dispatch on its kind, then run enfix **lookahead** — if the next
//! cell is a word whose variable slot holds an enfix-flagged function, the
//! fresh output becomes its left argument and the call continues the
//! expression. Function calls push a child frame that shares the parent's
//! feed, fulfill arguments per parameter class, then run the dispatcher
//! (looping on redispatch requests).
//!
//! Signals are serviced at exactly one safe point, the top of each
//! expression. Throws ride the output cell's thrown bit and are surfaced
//! as `Indexor::Thrown`; callers either catch or propagate.

use revel_core::{
    Cell, CellFlags, ContextKind, Kind, Link, NodeFlags, NodeId, NodeInfo, ParamClass, Payload,
    Sym, WordKind,
};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};
use crate::frame::{Frame, FrameFlags, Indexor, Mode};
use crate::function::{quoted, Flow, ParamInfo};
use crate::paths::PathMode;
use crate::signal::Signal;

impl Engine {
    // --- public evaluator API --------------------------------------------

    /// Scan, bind, and evaluate source text to completion. An uncaught
    /// throw at this boundary becomes a `no-catch` failure, and any
    /// failure restores the engine's resource depths before returning.
    pub fn do_text(&mut self, text: &str) -> Result<Cell, Raised> {
        let snapshot = self.snapshot();
        let result = self.do_text_unguarded(text);
        if result.is_err() {
            self.unwind_to(&snapshot);
        }
        result
    }

    fn do_text_unguarded(&mut self, text: &str) -> Result<Cell, Raised> {
        let block = self.load_text(text)?;
        self.heap.guard_series(block);
        let result = self
            .bind_source_to_lib(block)
            .and_then(|_| self.do_to_end(block, 0, None));
        self.heap.drop_series_guard(block);
        let out = result?;
        if out.is_thrown() {
            let (label, _) = self.catch_thrown(&out);
            return Err(self.fail(ErrorId::NoCatch, &[label]));
        }
        Ok(out)
    }

    /// Evaluate a block value to completion. The result may carry the
    /// thrown bit; callers catch or propagate.
    pub fn do_block(&mut self, block: &Cell) -> Result<Cell, Raised> {
        match block.payload {
            Payload::List { node, index, specifier, .. } => {
                let specifier = specifier.or_else(|| self.frames.last().and_then(|f| f.specifier));
                self.do_to_end(node, index, specifier)
            }
            _ => Err(self.fail(ErrorId::InvalidArg, &[*block])),
        }
    }

    /// Evaluate an array position to the end of the array; the value of
    /// the last expression is returned (void for an empty source).
    pub fn do_to_end(
        &mut self,
        source: NodeId,
        index: u32,
        specifier: Option<NodeId>,
    ) -> Result<Cell, Raised> {
        self.push_frame_source(source, index, specifier)?;
        self.frame_mut().flags |= FrameFlags::TO_END;
        let mut out = Cell::void();
        loop {
            match self.eval_expression() {
                Ok(Indexor::Next(_)) => out = self.frame().out,
                Ok(Indexor::End) => break,
                Ok(Indexor::Thrown) => {
                    out = self.frame().out;
                    break;
                }
                Err(raised) => {
                    self.pop_frame_source();
                    return Err(raised);
                }
            }
        }
        self.pop_frame_source();
        Ok(out)
    }

    /// Evaluate exactly one expression at an array position. Returns the
    /// value and the indexor for the next position.
    pub fn do_step(
        &mut self,
        source: NodeId,
        index: u32,
        specifier: Option<NodeId>,
    ) -> Result<(Cell, Indexor), Raised> {
        self.push_frame_source(source, index, specifier)?;
        let result = self.eval_expression();
        let frame = self.pop_frame_source();
        Ok((frame.out, result?))
    }

    /// Evaluate a slice of cells: the variadic-feed entry point. The slice
    /// is reified into a heap array up front.
    pub fn do_values(&mut self, values: &[Cell]) -> Result<Cell, Raised> {
        let array = self
            .heap
            .make_array(values.len(), NodeFlags::empty())
            .map_err(|t| self.fail_trouble(t))?;
        for value in values {
            self.heap
                .push_cell(array, *value)
                .map_err(|t| self.fail_trouble(t))?;
        }
        let result = self.do_to_end(array, 0, None);
        if !self.heap.is_managed(array) {
            self.heap.free_series(array);
        }
        result
    }

    /// Invoke a function value with positional arguments taken literally
    /// (refinement params consume their logic values from the slice).
    pub fn apply_function(&mut self, f: &Cell, args: &[Cell]) -> Result<Cell, Raised> {
        if f.kind() != Some(Kind::Function) {
            return Err(self.fail(ErrorId::NotAFunction, &[*f]));
        }
        let array = self
            .heap
            .make_array(args.len(), NodeFlags::empty())
            .map_err(|t| self.fail_trouble(t))?;
        for value in args {
            self.heap
                .push_cell(array, *value)
                .map_err(|t| self.fail_trouble(t))?;
        }
        self.push_frame_source(array, 0, None)?;
        let result = self.call_function(*f, None, None, Vec::new(), true);
        let frame = self.pop_frame_source();
        if !self.heap.is_managed(array) {
            self.heap.free_series(array);
        }
        result?;
        Ok(frame.out)
    }

    // --- frame plumbing ---------------------------------------------------

    pub(crate) fn push_frame_source(
        &mut self,
        source: NodeId,
        index: u32,
        specifier: Option<NodeId>,
    ) -> Result<(), Raised> {
        if self.frames.len() as u32 >= self.config.max_eval_depth {
            return Err(self.fail(ErrorId::StackOverflow, &[]));
        }
        let mut frame = Frame::new(source, index, specifier);
        if !self.heap.node(source).info.contains(NodeInfo::HOLD) {
            self.heap.hold(source);
            frame.flags |= FrameFlags::SOURCE_HELD;
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame_source(&mut self) -> Frame {
        let frame = self.frames.pop().expect("frame stack underflow");
        if frame.flags.contains(FrameFlags::SOURCE_HELD) {
            self.heap.unhold(frame.source);
        }
        frame
    }

    // --- one expression ---------------------------------------------------

    /// Evaluate one expression into the top frame's output cell.
    pub(crate) fn eval_expression(&mut self) -> Result<Indexor, Raised> {
        self.service_signals()?;

        let frame = self.frame();
        let source = frame.source;
        let index = frame.index;
        let specifier = frame.specifier;

        let cell = self.heap.node(source).at(index as usize);
        if cell.is_end() {
            return Ok(Indexor::End);
        }
        self.frame_mut().index = index + 1;
        self.frame_mut().scratch = cell;

        // Inert shortcut: a self-evaluating cell followed by nothing that
        // could begin an enfix lookup copies straight to the output.
        if let Some(kind) = cell.kind() {
            let flipped = self.config.eval_flip_enabled && cell.flags.contains(CellFlags::EVAL_FLIP);
            if kind.is_inert() && !flipped {
                let next = self.heap.node(source).at((index + 1) as usize);
                let next_evaluative = matches!(
                    next.kind(),
                    Some(Kind::Word | Kind::Path | Kind::SetPath | Kind::GetPath)
                );
                if !next_evaluative {
                    let out = self.inertize(cell, specifier);
                    self.frame_mut().out = out;
                    return Ok(Indexor::Next(index + 1));
                }
            }
        }

        self.eval_core(cell)?;
        if self.frame().out.is_thrown() {
            return Ok(Indexor::Thrown);
        }
        self.lookahead()?;
        if self.frame().out.is_thrown() {
            return Ok(Indexor::Thrown);
        }
        Ok(Indexor::Next(self.frame().index))
    }

    /// Inert values copy to the output; lists pick up the frame's
    /// specifier so relative words inside them stay resolvable.
    fn inertize(&self, cell: Cell, specifier: Option<NodeId>) -> Cell {
        let mut out = Cell::copied(&cell);
        if let Payload::List {
            kind,
            node,
            index,
            specifier: None,
        } = out.payload
        {
            if let Some(spec) = specifier {
                out.payload = Payload::List {
                    kind,
                    node,
                    index,
                    specifier: Some(spec),
                };
            }
        }
        out
    }

    /// Dispatch one fetched cell by kind. The feed position has already
    /// advanced past it; set-words and calls consume more as needed.
    fn eval_core(&mut self, cell: Cell) -> Result<(), Raised> {
        match cell.payload {
            Payload::Word { kind, spelling, .. } => match kind {
                WordKind::Word => self.eval_word(cell, spelling),
                WordKind::SetWord => {
                    let Some(value) = self.eval_required(&cell)? else {
                        return Ok(()); // throw in flight
                    };
                    if value.is_void() {
                        let name = Cell::word(WordKind::Word, spelling);
                        return Err(self.fail(ErrorId::NeedValue, &[name]));
                    }
                    self.set_word_value(&cell, &value)?;
                    self.frame_mut().out = value;
                    Ok(())
                }
                WordKind::GetWord => {
                    let value = self.get_word_value(&cell, true)?;
                    self.frame_mut().out = value;
                    Ok(())
                }
                WordKind::LitWord => {
                    let mut word = cell;
                    word.payload = match cell.payload {
                        Payload::Word {
                            spelling,
                            binding,
                            index,
                            ..
                        } => Payload::Word {
                            kind: WordKind::Word,
                            spelling,
                            binding,
                            index,
                        },
                        _ => unreachable!(),
                    };
                    self.frame_mut().out = quoted(Cell::copied(&word));
                    Ok(())
                }
                WordKind::Refinement => {
                    self.frame_mut().out = Cell::copied(&cell);
                    Ok(())
                }
            },
            Payload::List { kind, node, index, specifier } => match kind {
                revel_core::ListKind::Group => {
                    let specifier = specifier.or(self.frame().specifier);
                    let result = self.do_to_end(node, index, specifier)?;
                    self.frame_mut().out = result;
                    Ok(())
                }
                revel_core::ListKind::Block => {
                    let specifier = self.frame().specifier;
                    let out = self.inertize(cell, specifier);
                    self.frame_mut().out = out;
                    Ok(())
                }
                revel_core::ListKind::Path => self.eval_path_cell(&cell, PathMode::Eval),
                revel_core::ListKind::GetPath => self.eval_path_cell(&cell, PathMode::Get),
                revel_core::ListKind::SetPath => {
                    let Some(value) = self.eval_required(&cell)? else {
                        return Ok(());
                    };
                    if value.is_void() {
                        return Err(self.fail(ErrorId::NeedValue, &[cell]));
                    }
                    self.eval_path_cell(&cell, PathMode::Set(value))?;
                    self.frame_mut().out = value;
                    Ok(())
                }
                revel_core::ListKind::LitPath => {
                    let mut path = cell;
                    path.payload = Payload::List {
                        kind: revel_core::ListKind::Path,
                        node,
                        index,
                        specifier,
                    };
                    self.frame_mut().out = quoted(Cell::copied(&path));
                    Ok(())
                }
            },
            Payload::Function { .. } => self.call_function(cell, None, None, Vec::new(), false),
            _ => {
                let specifier = self.frame().specifier;
                let out = self.inertize(cell, specifier);
                self.frame_mut().out = out;
                Ok(())
            }
        }
    }

    fn eval_word(&mut self, cell: Cell, spelling: Sym) -> Result<(), Raised> {
        let fetch_index = self.frame().index - 1;
        let (loc, repaired) = self.resolve_word(&cell)?;
        if let Some(repaired) = repaired {
            // Write the repaired cache back into the source slot we own.
            let source = self.frame().source;
            self.heap.overwrite_cell(source, fetch_index as usize, repaired);
        }
        let value = self.var_at(loc.varlist, loc.index);
        if value.kind() == Some(Kind::Function) {
            let left = if value.flags.contains(CellFlags::ENFIXED) {
                // Enfix found by ordinary lookup: no left argument exists.
                Some(Cell::void())
            } else {
                None
            };
            return self.call_function(value, Some(spelling), left, Vec::new(), false);
        }
        if value.is_void() {
            let name = Cell::word(WordKind::Word, spelling);
            return Err(self.fail(ErrorId::NoValue, &[name]));
        }
        let mut out = Cell::copied(&value);
        out.flags -= CellFlags::UNEVALUATED;
        self.frame_mut().out = out;
        Ok(())
    }

    /// Evaluate the expression a set-word/set-path needs. `None` means a
    /// throw is in flight in the output cell.
    fn eval_required(&mut self, for_cell: &Cell) -> Result<Option<Cell>, Raised> {
        match self.eval_expression()? {
            Indexor::End => Err(self.fail(ErrorId::NeedValue, &[*for_cell])),
            Indexor::Thrown => Ok(None),
            Indexor::Next(_) => Ok(Some(self.frame().out)),
        }
    }

    // --- enfix lookahead --------------------------------------------------

    /// After an expression completes, peek one cell: a word bound to an
    /// enfix-flagged function continues the expression with the output as
    /// its left argument.
    fn lookahead(&mut self) -> Result<(), Raised> {
        loop {
            let frame = self.frame();
            if frame.flags.contains(FrameFlags::NO_LOOKAHEAD) {
                // One-shot suppression: fulfilling an argument for another
                // enfix operation stops the cascade at one level.
                self.frame_mut().flags -= FrameFlags::NO_LOOKAHEAD;
                return Ok(());
            }
            let source = frame.source;
            let index = frame.index;
            let fulfilling = frame.flags.contains(FrameFlags::FULFILLING_ARG);
            let fulfilling_first = fulfilling && frame.param_index == 1;
            let dampened = frame.flags.contains(FrameFlags::DAMPEN_DEFER);

            let next = self.heap.node(source).at(index as usize);
            self.frame_mut().pending = Some(next);
            let Payload::Word {
                kind: WordKind::Word,
                spelling,
                ..
            } = next.payload
            else {
                return Ok(());
            };

            // A quiet resolve: anything that fails lookup cannot be enfix.
            let Ok((loc, _)) = self.resolve_word(&next) else {
                return Ok(());
            };
            let slot = self.var_at(loc.varlist, loc.index);
            if slot.kind() != Some(Kind::Function) || !slot.flags.contains(CellFlags::ENFIXED) {
                return Ok(());
            }
            let paramlist = match slot.payload {
                Payload::Function { paramlist, .. } => paramlist,
                _ => unreachable!(),
            };

            let defers = self.defers_lookback(paramlist);
            let mut dampen_after = false;
            if fulfilling && defers {
                if fulfilling_first && !dampened && self.config.dampen_defer_once {
                    // Complete exactly one left-hand step here, then dampen.
                    dampen_after = true;
                } else {
                    // Leave the operation for the parent step.
                    return Ok(());
                }
            }

            self.frame_mut().index = index + 1;
            self.frame_mut().pending = None;
            let left = self.frame().out;
            self.call_function(slot, Some(spelling), Some(left), Vec::new(), false)?;
            if dampen_after {
                self.frame_mut().flags |= FrameFlags::DAMPEN_DEFER;
            }
            if self.frame().out.is_thrown() {
                return Ok(());
            }
        }
    }

    // --- function calls ---------------------------------------------------

    /// Apply a function value: push a call frame sharing the parent feed,
    /// fulfill the facade's parameters, dispatch, and land the result in
    /// the parent's output cell.
    pub(crate) fn call_function(
        &mut self,
        f: Cell,
        label: Option<Sym>,
        left: Option<Cell>,
        refinements: Vec<Sym>,
        applying: bool,
    ) -> Result<(), Raised> {
        let (paramlist, _body) = match f.payload {
            Payload::Function { paramlist, body } => (paramlist, body),
            _ => return Err(self.fail(ErrorId::NotAFunction, &[f])),
        };

        // The call frame continues consuming the parent's feed.
        let (source, index, specifier) = {
            let parent = self.frame();
            (parent.source, parent.index, parent.specifier)
        };
        self.push_frame_source(source, index, specifier)?;
        {
            let frame = self.frame_mut();
            frame.original = Some(f);
            frame.phase = Some(paramlist);
            frame.facade = Some(paramlist);
            frame.label = label;
            frame.mode = Mode::Args;
            if applying {
                frame.flags |= FrameFlags::APPLYING | FrameFlags::NO_ARGS_EVALUATE;
            }
        }

        let result = self.fulfill_and_dispatch(paramlist, label, left, refinements);

        let child = self.pop_frame_source();
        if let Some(varlist) = child.varlist {
            // Stack frames go inaccessible on exit; the collector reclaims
            // the varlist once nothing references it.
            self.heap.node_mut(varlist).info |= NodeInfo::INACCESSIBLE;
        }
        result?;

        let parent = self.frame_mut();
        parent.out = child.out;
        parent.index = child.index;
        Ok(())
    }

    fn fulfill_and_dispatch(
        &mut self,
        paramlist: NodeId,
        label: Option<Sym>,
        mut left: Option<Cell>,
        refinements: Vec<Sym>,
    ) -> Result<(), Raised> {
        let params = self.paramlist_params(paramlist);
        let applying = self.frame().flags.contains(FrameFlags::APPLYING);
        let enfix_call = left.is_some();

        // Validate the requested refinement set.
        for (i, sym) in refinements.iter().enumerate() {
            let known = params
                .iter()
                .any(|p| p.class == ParamClass::Refinement && self.symbols.same_word(p.sym, *sym));
            let duplicate = refinements[..i]
                .iter()
                .any(|prior| self.symbols.same_word(*prior, *sym));
            if !known || duplicate {
                let name = Cell::word(WordKind::Refinement, *sym);
                return Err(self.fail(ErrorId::BadRefine, &[name]));
            }
        }

        // Allocate the args varlist: canon frame cell plus one slot per
        // parameter. Managed (the collector owns call frames; exiting
        // marks them inaccessible).
        let varlist = self
            .heap
            .make_array(params.len() + 1, NodeFlags::VARLIST)
            .map_err(|t| self.fail_trouble(t))?;
        let canon = Cell::context(ContextKind::Frame, varlist);
        self.heap
            .push_cell(varlist, canon)
            .map_err(|t| self.fail_trouble(t))?;
        for _ in &params {
            self.heap
                .push_cell(varlist, Cell::void())
                .map_err(|t| self.fail_trouble(t))?;
        }
        self.heap.node_mut(varlist).link = Link::Keylist(paramlist);
        self.heap.node_mut(varlist).info |= NodeInfo::STACK_CONTEXT;
        self.heap.manage(varlist);
        self.frame_mut().varlist = Some(varlist);

        // Main fulfillment walk, in facade order. Out-of-mention-order
        // refinements push pickup markers (slot, mention position) on the
        // data stack and defer their arguments. A throw mid-walk must drop
        // any parked markers.
        let ds_base = self.data_stack_depth();
        let mut mention_cursor = 0usize;
        let mut pickups = 0usize;
        let mut index = 0usize;
        while index < params.len() {
            let param = params[index];
            let slot = index as u32 + 1;
            self.frame_mut().param_index = slot;

            match param.class {
                ParamClass::Local => {
                    // Prefilled void.
                }
                ParamClass::Return => {
                    let ret = self.make_definitional_return(varlist);
                    self.heap.overwrite_cell(varlist, slot as usize, ret);
                }
                ParamClass::Leave => {
                    let leave = self.make_definitional_leave(varlist);
                    self.heap.overwrite_cell(varlist, slot as usize, leave);
                }
                ParamClass::Refinement => {
                    self.frame_mut().refine_index = slot;
                    if applying {
                        // Apply-style: the feed supplies the logic value.
                        self.frame_mut().mode = Mode::RefinePending;
                        let value = self.consume_arg(&param, enfix_call)?;
                        let Some(value) = value else {
                            self.data_stack.truncate(ds_base);
                            return Ok(()); // throw in flight
                        };
                        let active = value.is_truthy();
                        let flag = if active { Cell::logic(true) } else { Cell::blank() };
                        self.heap.overwrite_cell(varlist, slot as usize, flag);
                        self.frame_mut().mode =
                            if active { Mode::RefineArgs } else { Mode::Skipping };
                    } else {
                        let pos = refinements
                            .iter()
                            .position(|sym| self.symbols.same_word(*sym, param.sym));
                        match pos {
                            None => {
                                self.heap.overwrite_cell(varlist, slot as usize, Cell::blank());
                                self.frame_mut().mode = Mode::Skipping;
                            }
                            Some(p) if p == mention_cursor => {
                                mention_cursor += 1;
                                self.heap
                                    .overwrite_cell(varlist, slot as usize, Cell::logic(true));
                                self.frame_mut().mode = Mode::RefineArgs;
                            }
                            Some(p) => {
                                // Out of mention order: mark active, defer
                                // the args through a data-stack pickup.
                                self.heap
                                    .overwrite_cell(varlist, slot as usize, Cell::logic(true));
                                self.ds_push(Cell::integer(slot as i64));
                                self.ds_push(Cell::integer(p as i64));
                                pickups += 1;
                                self.frame_mut().mode = Mode::Scanning;
                            }
                        }
                    }
                }
                ParamClass::Normal | ParamClass::HardQuote | ParamClass::SoftQuote => {
                    let mode = self.frame().mode;
                    match mode {
                        Mode::Skipping | Mode::Scanning => {
                            // Unused (or deferred) refinement argument.
                        }
                        _ => {
                            let value = if let Some(l) = left.take() {
                                Some(l)
                            } else {
                                let consumed = self.consume_arg(&param, enfix_call)?;
                                let Some(v) = consumed else {
                                    self.data_stack.truncate(ds_base);
                                    return Ok(()); // throw in flight
                                };
                                Some(v)
                            };
                            let value = value.expect("argument value fulfilled");
                            self.accept_arg(varlist, slot, &param, value, label)?;
                        }
                    }
                }
            }
            index += 1;
        }

        // Pick up deferred refinements in mention order, consuming their
        // args from what remains of the feed.
        if pickups > 0 {
            let mut markers: Vec<(u32, usize)> = Vec::with_capacity(pickups);
            for _ in 0..pickups {
                let mention = self.ds_pop().as_integer().expect("pickup marker") as usize;
                let slot = self.ds_pop().as_integer().expect("pickup marker") as u32;
                markers.push((slot, mention));
            }
            markers.sort_by_key(|&(_, mention)| mention);
            for (slot, _) in markers {
                self.frame_mut().mode = Mode::RefineArgs;
                self.frame_mut().refine_index = slot;
                let mut arg_index = slot as usize; // first arg follows the refinement
                while arg_index < params.len() {
                    let param = params[arg_index];
                    match param.class {
                        ParamClass::Normal | ParamClass::HardQuote | ParamClass::SoftQuote => {
                            self.frame_mut().param_index = arg_index as u32 + 1;
                            let Some(value) = self.consume_arg(&param, enfix_call)? else {
                                return Ok(());
                            };
                            self.accept_arg(varlist, arg_index as u32 + 1, &param, value, label)?;
                            arg_index += 1;
                        }
                        _ => break,
                    }
                }
            }
        }

        // Dispatch, looping while wrappers request a phase change.
        self.frame_mut().mode = Mode::Function;
        self.run_dispatch()
    }

    /// Consume one argument from the feed according to the parameter
    /// class. `None` signals a throw in flight (already in the out cell).
    fn consume_arg(&mut self, param: &ParamInfo, enfix_call: bool) -> Result<Option<Cell>, Raised> {
        let frame = self.frame();
        let source = frame.source;
        let index = frame.index;
        let specifier = frame.specifier;
        let applying = frame.flags.contains(FrameFlags::APPLYING);

        let next = self.heap.node(source).at(index as usize);
        if next.is_end() {
            if applying {
                // Short apply feeds leave the rest void.
                return Ok(Some(Cell::void()));
            }
            let name = self
                .frame()
                .label
                .map(|sym| Cell::word(WordKind::Word, sym))
                .unwrap_or_else(Cell::blank);
            return Err(self.fail(ErrorId::UnexpectedEnd, &[name]));
        }

        if applying {
            self.frame_mut().index = index + 1;
            return Ok(Some(self.inertize(next, specifier)));
        }

        match param.class {
            ParamClass::HardQuote => {
                self.frame_mut().index = index + 1;
                Ok(Some(quoted(self.inertize(next, specifier))))
            }
            ParamClass::SoftQuote => {
                let evaluative = matches!(
                    next.kind(),
                    Some(Kind::Group | Kind::GetWord | Kind::GetPath)
                );
                if evaluative {
                    self.eval_arg_expression(enfix_call)
                } else {
                    self.frame_mut().index = index + 1;
                    Ok(Some(quoted(self.inertize(next, specifier))))
                }
            }
            _ => self.eval_arg_expression(enfix_call),
        }
    }

    fn eval_arg_expression(&mut self, enfix_call: bool) -> Result<Option<Cell>, Raised> {
        {
            let frame = self.frame_mut();
            frame.flags |= FrameFlags::FULFILLING_ARG;
            frame.flags.set(FrameFlags::NO_LOOKAHEAD, enfix_call);
        }
        let result = self.eval_expression();
        {
            let frame = self.frame_mut();
            frame.flags -= FrameFlags::FULFILLING_ARG;
            frame.flags -= FrameFlags::NO_LOOKAHEAD;
        }
        match result? {
            Indexor::End => {
                let name = self
                    .frame()
                    .label
                    .map(|sym| Cell::word(WordKind::Word, sym))
                    .unwrap_or_else(Cell::blank);
                Err(self.fail(ErrorId::UnexpectedEnd, &[name]))
            }
            Indexor::Thrown => Ok(None),
            Indexor::Next(_) => Ok(Some(self.frame().out)),
        }
    }

    /// Type-check and store one fulfilled argument, handling refinement
    /// revocation.
    fn accept_arg(
        &mut self,
        varlist: NodeId,
        slot: u32,
        param: &ParamInfo,
        value: Cell,
        label: Option<Sym>,
    ) -> Result<(), Raised> {
        let mode = self.frame().mode;
        if mode == Mode::RefineArgs && value.is_void() {
            // First void revokes the refinement; the rest must follow suit.
            let refine = self.frame().refine_index;
            self.heap.overwrite_cell(varlist, refine as usize, Cell::blank());
            self.frame_mut().mode = Mode::Revoking;
            self.heap.overwrite_cell(varlist, slot as usize, Cell::void());
            return Ok(());
        }
        if mode == Mode::Revoking {
            if !value.is_void() {
                let refine = self.frame().refine_index;
                let name = self
                    .key_sym(self.frame().facade.expect("facade set during fulfillment"), refine)
                    .map(|sym| Cell::word(WordKind::Refinement, sym))
                    .unwrap_or_else(Cell::blank);
                return Err(self.fail(ErrorId::RevokedRefinement, &[name, value]));
            }
            self.heap.overwrite_cell(varlist, slot as usize, Cell::void());
            return Ok(());
        }

        if !self.typecheck(param.bits, &value) {
            return Err(self.fail_arg_type(label, param.sym, &value));
        }
        let mut stored = value;
        stored.flags -= CellFlags::THROWN;
        self.heap.overwrite_cell(varlist, slot as usize, stored);
        Ok(())
    }

    /// Run the dispatcher for the current frame, looping while wrappers
    /// mutate the phase and ask to go again.
    fn run_dispatch(&mut self) -> Result<(), Raised> {
        loop {
            let f = self.frame().original.expect("dispatch without a function");
            let body = match f.payload {
                Payload::Function { body, .. } => body,
                _ => unreachable!(),
            };
            let dispatcher_index = self.dispatcher_of(body);
            let dispatcher = self.dispatchers[dispatcher_index as usize];
            match dispatcher(self) {
                Ok(Flow::Out) | Ok(Flow::OutIsThrown) => return Ok(()),
                Ok(Flow::Redispatch) => continue,
                Err(Raised::Halt) if !self.config.halt_in_dispatchers => {
                    // Configured to defer: re-raise for the next safe point
                    // and yield void from this call.
                    self.signals.raise(Signal::Halt);
                    self.frame_mut().out = Cell::void();
                    return Ok(());
                }
                Err(raised) => return Err(raised),
            }
        }
    }

    // --- argument access for dispatchers ---------------------------------

    /// Argument cell at a 1-based param index of the current call frame.
    pub fn arg(&self, index: u32) -> Cell {
        let varlist = self.frame().varlist.expect("native outside a call frame");
        self.var_at(varlist, index)
    }

    /// Is the refinement at this param index active?
    pub fn refinement(&self, index: u32) -> bool {
        self.arg(index).is_truthy()
    }

    /// The current frame's args varlist.
    pub fn current_varlist(&self) -> NodeId {
        self.frame().varlist.expect("native outside a call frame")
    }
}
