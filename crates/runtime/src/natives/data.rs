//! Value and I/O natives: make, type-of, mold/form, print, set/get

use std::collections::HashMap;

use revel_core::{Cell, Kind, Misc, NodeFlags, Payload};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};
use crate::function::Flow;

pub(crate) fn native_make(engine: &mut Engine) -> Result<Flow, Raised> {
    let what = engine.arg(1);
    let spec = engine.arg(2);

    let Payload::Datatype(kind) = what.payload else {
        return Err(engine.fail(ErrorId::BadMakeArg, &[what, spec]));
    };

    let out = match (kind, spec.payload) {
        (Kind::Object, Payload::List { .. }) => {
            let object = engine.make_object(&spec)?;
            if object.is_thrown() {
                engine.frame_mut().out = object;
                return Ok(Flow::OutIsThrown);
            }
            object
        }
        (Kind::Map, Payload::List { node, index, .. }) => {
            let pairlist = engine
                .heap
                .make_array(engine.heap.node(node).len(), NodeFlags::PAIRLIST)
                .map_err(|t| engine.fail_trouble(t))?;
            engine.heap.node_mut(pairlist).misc = Misc::Hashlist(HashMap::new());
            let len = engine.heap.node(node).len();
            let mut i = index as usize;
            while i + 1 < len {
                let key_cell = engine.heap.node(node).at(i);
                let value = engine.heap.node(node).at(i + 1);
                let key = engine
                    .map_key_for(&key_cell)
                    .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[key_cell]))?;
                engine.map_put(pairlist, key, &key_cell, &value)?;
                i += 2;
            }
            engine.heap.manage(pairlist);
            Cell::map(pairlist)
        }
        (Kind::Block, Payload::Integer(capacity)) => {
            let node = engine
                .heap
                .make_array(capacity.max(0) as usize, NodeFlags::empty())
                .map_err(|t| engine.fail_trouble(t))?;
            engine.heap.manage(node);
            Cell::list(revel_core::ListKind::Block, node, 0)
        }
        (Kind::Block, Payload::List { node, index, .. }) => {
            let len = engine.heap.node(node).len();
            let copy = engine
                .heap
                .make_array(len.saturating_sub(index as usize), NodeFlags::empty())
                .map_err(|t| engine.fail_trouble(t))?;
            for i in index as usize..len {
                let cell = engine.heap.node(node).at(i);
                engine
                    .heap
                    .push_cell(copy, cell)
                    .map_err(|t| engine.fail_trouble(t))?;
            }
            engine.heap.manage(copy);
            Cell::list(revel_core::ListKind::Block, copy, 0)
        }
        (Kind::Text, Payload::Integer(_)) => {
            let node = engine.heap.make_text("").map_err(|t| engine.fail_trouble(t))?;
            engine.heap.manage(node);
            Cell::text(node, 0)
        }
        _ => return Err(engine.fail(ErrorId::BadMakeArg, &[what, spec])),
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_type_of(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let out = match value.kind() {
        Some(kind) => Cell::datatype(kind),
        None => Cell::blank(),
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_mold(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let rendered = engine.mold_value(&value);
    let node = engine
        .heap
        .make_text(&rendered)
        .map_err(|t| engine.fail_trouble(t))?;
    engine.heap.manage(node);
    engine.frame_mut().out = Cell::text(node, 0);
    Ok(Flow::Out)
}

pub(crate) fn native_form(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let rendered = engine.form_value(&value);
    let node = engine
        .heap
        .make_text(&rendered)
        .map_err(|t| engine.fail_trouble(t))?;
    engine.heap.manage(node);
    engine.frame_mut().out = Cell::text(node, 0);
    Ok(Flow::Out)
}

/// Render one value for PRINT: blocks reduce and join with spaces.
fn print_text(engine: &mut Engine, value: &Cell) -> Result<Option<String>, Raised> {
    if value.kind() == Some(Kind::Block) {
        let (node, mut index, specifier) = match value.payload {
            Payload::List { node, index, specifier, .. } => (node, index, specifier),
            _ => unreachable!(),
        };
        let mut parts = Vec::new();
        loop {
            let (item, indexor) = engine.do_step(node, index, specifier)?;
            match indexor {
                crate::frame::Indexor::End => break,
                crate::frame::Indexor::Thrown => {
                    engine.frame_mut().out = item;
                    return Ok(None);
                }
                crate::frame::Indexor::Next(next) => {
                    index = next;
                    parts.push(engine.form_value(&item));
                }
            }
        }
        Ok(Some(parts.join(" ")))
    } else {
        Ok(Some(engine.form_value(value)))
    }
}

pub(crate) fn native_print(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let Some(text) = print_text(engine, &value)? else {
        return Ok(Flow::OutIsThrown);
    };
    let line = format!("{text}\n");
    engine.host_mut().write_stdout(&line);
    engine.frame_mut().out = Cell::void();
    Ok(Flow::Out)
}

pub(crate) fn native_probe(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let rendered = engine.mold_value(&value);
    let line = format!("{rendered}\n");
    engine.host_mut().write_stdout(&line);
    engine.frame_mut().out = value;
    Ok(Flow::Out)
}

pub(crate) fn native_get(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = engine.arg(1);
    let out = match target.payload {
        Payload::Word { .. } => engine.get_word_value(&target, true)?,
        Payload::List { .. } => {
            engine.eval_path_cell(&target, crate::paths::PathMode::Get)?;
            engine.frame().out
        }
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[target])),
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_set(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = engine.arg(1);
    let value = engine.arg(2);
    match target.payload {
        Payload::Word { .. } => engine.set_word_value(&target, &value)?,
        Payload::List { .. } => {
            engine.eval_path_cell(&target, crate::paths::PathMode::Set(value))?;
        }
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[target])),
    }
    engine.frame_mut().out = value;
    Ok(Flow::Out)
}
