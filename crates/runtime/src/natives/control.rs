//! Control-flow natives: branching, loops, throw/catch, trap, functions

use revel_core::{
    Cell, CellFlags, ContextKind, Kind, Link, Misc, NodeFlags, ParamClass, Payload, WordKind,
};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};
use crate::function::{Flow, DISPATCH_SPECIALIZED};

/// Run a block argument; `Ok(None)` means a throw is in flight and the
/// caller should surface `Flow::OutIsThrown`.
fn run_block(engine: &mut Engine, block: &Cell) -> Result<Option<Cell>, Raised> {
    let result = engine.do_block(block)?;
    if result.is_thrown() {
        engine.frame_mut().out = result;
        return Ok(None);
    }
    Ok(Some(result))
}

pub(crate) fn native_if(engine: &mut Engine) -> Result<Flow, Raised> {
    let condition = engine.arg(1);
    let branch = engine.arg(2);
    if condition.is_truthy() {
        match run_block(engine, &branch)? {
            Some(value) => engine.frame_mut().out = value,
            None => return Ok(Flow::OutIsThrown),
        }
    } else {
        engine.frame_mut().out = Cell::void();
    }
    Ok(Flow::Out)
}

pub(crate) fn native_either(engine: &mut Engine) -> Result<Flow, Raised> {
    let condition = engine.arg(1);
    let branch = if condition.is_truthy() {
        engine.arg(2)
    } else {
        engine.arg(3)
    };
    match run_block(engine, &branch)? {
        Some(value) => {
            engine.frame_mut().out = value;
            Ok(Flow::Out)
        }
        None => Ok(Flow::OutIsThrown),
    }
}

pub(crate) fn native_while(engine: &mut Engine) -> Result<Flow, Raised> {
    let condition = engine.arg(1);
    let body = engine.arg(2);
    // The last body result parks on the data stack so a recycle between
    // iterations cannot sweep it.
    let base = engine.data_stack_depth();
    loop {
        let test = match run_block(engine, &condition) {
            Ok(Some(test)) => test,
            Ok(None) => {
                engine.ds_release(base);
                return Ok(Flow::OutIsThrown);
            }
            Err(raised) => {
                engine.ds_release(base);
                return Err(raised);
            }
        };
        if !test.is_truthy() {
            break;
        }
        match run_block(engine, &body) {
            Ok(Some(value)) => engine.ds_keep(base, value),
            Ok(None) => {
                engine.ds_release(base);
                return Ok(Flow::OutIsThrown);
            }
            Err(raised) => {
                engine.ds_release(base);
                return Err(raised);
            }
        }
    }
    let out = engine.ds_release(base);
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_loop(engine: &mut Engine) -> Result<Flow, Raised> {
    let count = engine.arg(1).as_integer().expect("typeset checked");
    let body = engine.arg(2);
    let base = engine.data_stack_depth();
    for _ in 0..count.max(0) {
        match run_block(engine, &body) {
            Ok(Some(value)) => engine.ds_keep(base, value),
            Ok(None) => {
                engine.ds_release(base);
                return Ok(Flow::OutIsThrown);
            }
            Err(raised) => {
                engine.ds_release(base);
                return Err(raised);
            }
        }
    }
    let out = engine.ds_release(base);
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_all(engine: &mut Engine) -> Result<Flow, Raised> {
    step_until(engine, false)
}

pub(crate) fn native_any(engine: &mut Engine) -> Result<Flow, Raised> {
    step_until(engine, true)
}

/// ALL stops at the first falsey value (yielding blank), ANY at the first
/// truthy one.
fn step_until(engine: &mut Engine, stop_on_truthy: bool) -> Result<Flow, Raised> {
    let block = engine.arg(1);
    let (node, mut index, specifier) = match block.payload {
        Payload::List { node, index, specifier, .. } => (node, index, specifier),
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[block])),
    };
    let base = engine.data_stack_depth();
    loop {
        let (value, indexor) = match engine.do_step(node, index, specifier) {
            Ok(step) => step,
            Err(raised) => {
                engine.ds_release(base);
                return Err(raised);
            }
        };
        match indexor {
            crate::frame::Indexor::End => break,
            crate::frame::Indexor::Thrown => {
                engine.ds_release(base);
                engine.frame_mut().out = value;
                return Ok(Flow::OutIsThrown);
            }
            crate::frame::Indexor::Next(next) => {
                index = next;
                if value.is_truthy() == stop_on_truthy {
                    engine.ds_release(base);
                    engine.frame_mut().out = if stop_on_truthy { value } else { Cell::blank() };
                    return Ok(Flow::Out);
                }
                engine.ds_keep(base, value);
            }
        }
    }
    let kept = engine.ds_release(base);
    let out = if stop_on_truthy {
        // ANY that ran dry answers blank.
        Cell::blank()
    } else if kept.is_void() {
        // ALL of an empty block is true.
        Cell::logic(true)
    } else {
        kept
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_catch(engine: &mut Engine) -> Result<Flow, Raised> {
    let block = engine.arg(1);
    let named = engine.refinement(2);
    let name = engine.arg(3);

    let result = engine.do_block(&block)?;
    if !result.is_thrown() {
        engine.frame_mut().out = result;
        return Ok(Flow::Out);
    }

    let mut label = result;
    label.flags -= CellFlags::THROWN;

    let matches = if named {
        match (label.payload, name.payload) {
            (Payload::Word { spelling: thrown, .. }, Payload::Word { spelling: want, .. }) => {
                engine.symbols.same_word(thrown, want)
            }
            _ => false,
        }
    } else {
        // A plain catch takes only unnamed throws.
        label.is_blank()
    };

    if matches {
        let (_, payload) = engine.catch_thrown(&result);
        engine.frame_mut().out = payload;
        Ok(Flow::Out)
    } else {
        engine.frame_mut().out = result;
        Ok(Flow::OutIsThrown)
    }
}

pub(crate) fn native_throw(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let named = engine.refinement(2);
    let label = if named {
        let name = engine.arg(3);
        match name.payload {
            Payload::Word { spelling, .. } => Cell::word(WordKind::Word, spelling),
            _ => return Err(engine.fail(ErrorId::InvalidArg, &[name])),
        }
    } else {
        Cell::blank()
    };
    let thrown = engine.throw(label, value);
    engine.frame_mut().out = thrown;
    Ok(Flow::OutIsThrown)
}

pub(crate) fn native_trap(engine: &mut Engine) -> Result<Flow, Raised> {
    let block = engine.arg(1);
    match engine.with_trap(|engine| engine.do_block(&block))? {
        Ok(value) => {
            // Throws pass through a trap uncaught.
            engine.frame_mut().out = value;
            if value.is_thrown() {
                Ok(Flow::OutIsThrown)
            } else {
                Ok(Flow::Out)
            }
        }
        Err(error) => {
            engine.frame_mut().out = error;
            Ok(Flow::Out)
        }
    }
}

pub(crate) fn native_attempt(engine: &mut Engine) -> Result<Flow, Raised> {
    let block = engine.arg(1);
    match engine.with_trap(|engine| engine.do_block(&block))? {
        Ok(value) => {
            engine.frame_mut().out = value;
            if value.is_thrown() {
                Ok(Flow::OutIsThrown)
            } else {
                Ok(Flow::Out)
            }
        }
        Err(_) => {
            engine.frame_mut().out = Cell::blank();
            Ok(Flow::Out)
        }
    }
}

pub(crate) fn native_fail(engine: &mut Engine) -> Result<Flow, Raised> {
    let reason = engine.arg(1);
    match reason.payload {
        Payload::Context {
            kind: ContextKind::Error,
            ..
        } => Err(Raised::Error(reason)),
        Payload::Text { .. } => Err(engine.fail(ErrorId::User, &[reason])),
        _ => Err(engine.fail(ErrorId::InvalidArg, &[reason])),
    }
}

pub(crate) fn native_do(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    match value.payload {
        Payload::List { .. } => match run_block(engine, &value)? {
            Some(result) => {
                engine.frame_mut().out = result;
                Ok(Flow::Out)
            }
            None => Ok(Flow::OutIsThrown),
        },
        Payload::Text { node, .. } => {
            let text = engine.heap.node(node).as_str().to_string();
            let result = engine.do_text(&text)?;
            engine.frame_mut().out = result;
            Ok(Flow::Out)
        }
        _ => {
            engine.frame_mut().out = value;
            Ok(Flow::Out)
        }
    }
}

pub(crate) fn native_func(engine: &mut Engine) -> Result<Flow, Raised> {
    let spec = engine.arg(1);
    let body = engine.arg(2);
    let function = engine.make_function_from_spec(&spec, &body)?;
    engine.frame_mut().out = function;
    Ok(Flow::Out)
}

pub(crate) fn native_does(engine: &mut Engine) -> Result<Flow, Raised> {
    let body = engine.arg(1);
    let empty_spec_node = engine
        .heap
        .make_array(0, NodeFlags::empty())
        .map_err(|t| engine.fail_trouble(t))?;
    engine.heap.manage(empty_spec_node);
    let spec = Cell::list(revel_core::ListKind::Block, empty_spec_node, 0);
    let function = engine.make_function_from_spec(&spec, &body)?;
    engine.frame_mut().out = function;
    Ok(Flow::Out)
}

/// QUIT unwinds on its own channel: every trap passes it along, and the
/// host boundary sees the exit code rather than a `halted` error.
pub(crate) fn native_quit(engine: &mut Engine) -> Result<Flow, Raised> {
    let code = if engine.refinement(1) {
        engine.arg(2).as_integer().unwrap_or(0).clamp(0, 255)
    } else {
        0
    };
    Err(Raised::Quit(code as i32))
}

pub(crate) fn native_recycle(engine: &mut Engine) -> Result<Flow, Raised> {
    let off = engine.refinement(1);
    let on = engine.refinement(2);
    if off {
        engine.heap.gc_disable();
        engine.frame_mut().out = Cell::void();
        return Ok(Flow::Out);
    }
    if on {
        engine.heap.gc_enable();
        engine.frame_mut().out = Cell::void();
        return Ok(Flow::Out);
    }
    if engine.heap.gc_disabled_depth() > 0 {
        engine.frame_mut().out = Cell::blank();
        return Ok(Flow::Out);
    }
    let stats = engine.collect_garbage();
    engine.frame_mut().out = Cell::integer(stats.freed as i64);
    Ok(Flow::Out)
}

pub(crate) fn native_enfix(engine: &mut Engine) -> Result<Flow, Raised> {
    let word = engine.arg(1);
    let (loc, _) = engine.resolve_word(&word)?;
    let mut slot = engine.var_at(loc.varlist, loc.index);
    if slot.kind() != Some(Kind::Function) {
        return Err(engine.fail(ErrorId::NotAFunction, &[word]));
    }
    slot.flags |= CellFlags::ENFIXED;
    engine.heap.overwrite_cell(loc.varlist, loc.index as usize, slot);
    engine.frame_mut().out = slot;
    Ok(Flow::Out)
}

pub(crate) fn native_apply(engine: &mut Engine) -> Result<Flow, Raised> {
    let action = engine.arg(1);
    let args = engine.arg(2);
    let function = match action.payload {
        Payload::Function { .. } => action,
        Payload::Word { .. } => engine.get_word_value(&action, false)?,
        _ => return Err(engine.fail(ErrorId::NotAFunction, &[action])),
    };
    let (node, index) = match args.payload {
        Payload::List { node, index, .. } => (node, index),
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[args])),
    };
    let len = engine.heap.node(node).len();
    let cells: Vec<Cell> = (index as usize..len)
        .map(|i| engine.heap.node(node).at(i))
        .collect();
    let result = engine.apply_function(&function, &cells)?;
    engine.frame_mut().out = result;
    if result.is_thrown() {
        Ok(Flow::OutIsThrown)
    } else {
        Ok(Flow::Out)
    }
}

/// Build a specialization: evaluate the def block inside an exemplar frame
/// for the action, then wrap it behind a facade whose fixed params became
/// locals.
pub(crate) fn native_specialize(engine: &mut Engine) -> Result<Flow, Raised> {
    let action = engine.arg(1);
    let def = engine.arg(2);

    let function = match action.payload {
        Payload::Function { .. } => action,
        Payload::Word { .. } => engine.get_word_value(&action, false)?,
        _ => return Err(engine.fail(ErrorId::NotAFunction, &[action])),
    };
    let paramlist = match function.payload {
        Payload::Function { paramlist, .. } => paramlist,
        _ => unreachable!(),
    };

    // Exemplar: a frame-shaped context keyed by the action's paramlist.
    let params = engine.paramlist_params(paramlist);
    let exemplar = engine
        .heap
        .make_array(params.len() + 1, NodeFlags::VARLIST)
        .map_err(|t| engine.fail_trouble(t))?;
    let canon = Cell::context(ContextKind::Frame, exemplar);
    engine
        .heap
        .push_cell(exemplar, canon)
        .map_err(|t| engine.fail_trouble(t))?;
    for _ in &params {
        engine
            .heap
            .push_cell(exemplar, Cell::void())
            .map_err(|t| engine.fail_trouble(t))?;
    }
    engine.heap.node_mut(exemplar).link = Link::Keylist(paramlist);
    engine.heap.manage(exemplar);

    let (def_node, def_index, def_specifier) = match def.payload {
        Payload::List { node, index, specifier, .. } => (node, index, specifier),
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[def])),
    };
    engine.bind_array_deep(def_node, exemplar)?;
    let filled = engine.do_to_end(def_node, def_index, def_specifier)?;
    if filled.is_thrown() {
        engine.frame_mut().out = filled;
        return Ok(Flow::OutIsThrown);
    }

    // Facade: same arity; params fixed by the exemplar turn Local.
    let facade_params: Vec<_> = params
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let fixed = !engine.var_at(exemplar, i as u32 + 1).is_void();
            let mut out = *param;
            if fixed {
                out.class = ParamClass::Local;
            }
            out
        })
        .collect();
    let facade = engine.make_paramlist(&facade_params)?;
    engine.heap.node_mut(facade).link = Link::Underlying(paramlist);

    let body_cell = Cell::context(ContextKind::Frame, exemplar);
    let body = engine.heap.make_singular(body_cell, NodeFlags::empty());
    engine.heap.node_mut(body).misc = Misc::Dispatcher(DISPATCH_SPECIALIZED);
    engine.heap.manage(body);

    let specialized = Cell::function(facade, body);
    engine.heap.overwrite_cell(facade, 0, specialized);
    engine.frame_mut().out = specialized;
    Ok(Flow::Out)
}
