//! Series natives: append, pick/poke, copy, protect, select, reduce

use std::collections::HashMap;

use revel_core::{Cell, Kind, NodeFlags, Payload};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};
use crate::frame::Indexor;
use crate::function::Flow;
use crate::natives::math::cells_equal;

pub(crate) fn native_append(engine: &mut Engine) -> Result<Flow, Raised> {
    let series = engine.arg(1);
    let value = engine.arg(2);
    let part = engine.refinement(3);
    let limit = engine.arg(4).as_integer().unwrap_or(i64::MAX);
    let only = engine.refinement(5);
    let dup = engine.refinement(6);
    let count = if dup {
        engine.arg(7).as_integer().unwrap_or(1).max(0)
    } else {
        1
    };

    for _ in 0..count {
        match series.payload {
            Payload::List { node, .. } => {
                let splice = matches!(value.kind(), Some(Kind::Block)) && !only;
                if splice {
                    let (src, src_index) = match value.payload {
                        Payload::List { node, index, .. } => (node, index),
                        _ => unreachable!(),
                    };
                    let len = engine.heap.node(src).len();
                    let take = if part {
                        (src_index as usize + limit.max(0) as usize).min(len)
                    } else {
                        len
                    };
                    for i in src_index as usize..take {
                        let cell = engine.heap.node(src).at(i);
                        engine
                            .heap
                            .push_cell(node, cell)
                            .map_err(|t| engine.fail_trouble(t))?;
                    }
                } else {
                    engine
                        .heap
                        .push_cell(node, value)
                        .map_err(|t| engine.fail_trouble(t))?;
                }
            }
            Payload::Text { node, .. } => {
                let rendered = engine.form_value(&value);
                let text = if part {
                    rendered.chars().take(limit.max(0) as usize).collect()
                } else {
                    rendered
                };
                engine
                    .heap
                    .append_bytes(node, text.as_bytes())
                    .map_err(|t| engine.fail_trouble(t))?;
            }
            Payload::Binary { node, .. } => match value.payload {
                Payload::Integer(byte) if (0..=255).contains(&byte) => {
                    engine
                        .heap
                        .append_bytes(node, &[byte as u8])
                        .map_err(|t| engine.fail_trouble(t))?;
                }
                Payload::Binary { node: src, index } => {
                    let bytes: Vec<u8> = engine.heap.node(src).bytes()[index as usize..].to_vec();
                    engine
                        .heap
                        .append_bytes(node, &bytes)
                        .map_err(|t| engine.fail_trouble(t))?;
                }
                _ => return Err(engine.fail(ErrorId::InvalidArg, &[value])),
            },
            _ => return Err(engine.fail(ErrorId::InvalidArg, &[series])),
        }
    }

    engine.frame_mut().out = series;
    Ok(Flow::Out)
}

pub(crate) fn native_pick(engine: &mut Engine) -> Result<Flow, Raised> {
    let series = engine.arg(1);
    let n = engine.arg(2).as_integer().expect("typeset checked");
    engine.frame_mut().out = pick_at(engine, &series, n);
    Ok(Flow::Out)
}

pub(crate) fn native_first(engine: &mut Engine) -> Result<Flow, Raised> {
    let series = engine.arg(1);
    engine.frame_mut().out = pick_at(engine, &series, 1);
    Ok(Flow::Out)
}

fn pick_at(engine: &Engine, series: &Cell, n: i64) -> Cell {
    if n < 1 {
        return Cell::blank();
    }
    match series.payload {
        Payload::List { node, index, .. } => {
            let at = index as usize + n as usize - 1;
            if at < engine.heap.node(node).len() {
                engine.heap.node(node).at(at)
            } else {
                Cell::blank()
            }
        }
        Payload::Text { node, index } => engine
            .heap
            .node(node)
            .as_str()
            .chars()
            .nth(index as usize + n as usize - 1)
            .map(Cell::char)
            .unwrap_or_else(Cell::blank),
        Payload::Binary { node, index } => engine
            .heap
            .node(node)
            .bytes()
            .get(index as usize + n as usize - 1)
            .map(|&b| Cell::integer(b as i64))
            .unwrap_or_else(Cell::blank),
        _ => Cell::blank(),
    }
}

pub(crate) fn native_poke(engine: &mut Engine) -> Result<Flow, Raised> {
    let series = engine.arg(1);
    let n = engine.arg(2).as_integer().expect("typeset checked");
    let value = engine.arg(3);
    let Payload::List { node, index, .. } = series.payload else {
        return Err(engine.fail(ErrorId::InvalidArg, &[series]));
    };
    let at = index as i64 + n - 1;
    if n < 1 || at >= engine.heap.node(node).len() as i64 {
        return Err(engine.fail(ErrorId::InvalidArg, &[engine.arg(2)]));
    }
    engine
        .heap
        .poke_cell(node, at as usize, value)
        .map_err(|t| engine.fail_trouble(t))?;
    engine.frame_mut().out = value;
    Ok(Flow::Out)
}

pub(crate) fn native_length_of(engine: &mut Engine) -> Result<Flow, Raised> {
    let series = engine.arg(1);
    let len = match series.payload {
        Payload::List { node, index, .. } => {
            engine.heap.node(node).len().saturating_sub(index as usize)
        }
        Payload::Text { node, index } => engine
            .heap
            .node(node)
            .as_str()
            .chars()
            .count()
            .saturating_sub(index as usize),
        Payload::Binary { node, index } => {
            engine.heap.node(node).bytes().len().saturating_sub(index as usize)
        }
        Payload::Map { pairlist } => engine.heap.node(pairlist).len() / 2,
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[series])),
    };
    engine.frame_mut().out = Cell::integer(len as i64);
    Ok(Flow::Out)
}

pub(crate) fn native_head(engine: &mut Engine) -> Result<Flow, Raised> {
    let series = engine.arg(1);
    let mut out = series;
    match &mut out.payload {
        Payload::List { index, .. } => *index = 0,
        Payload::Text { index, .. } => *index = 0,
        Payload::Binary { index, .. } => *index = 0,
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[series])),
    }
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_copy(engine: &mut Engine) -> Result<Flow, Raised> {
    let value = engine.arg(1);
    let deep = engine.refinement(2);

    let out = match value.payload {
        Payload::List { kind, node, index, specifier } => {
            let copy = if deep {
                let copy = engine.copy_array_deep(node, &mut HashMap::new())?;
                engine.manage_array_deep(copy);
                copy
            } else {
                let len = engine.heap.node(node).len();
                let copy = engine
                    .heap
                    .make_array(len, NodeFlags::empty())
                    .map_err(|t| engine.fail_trouble(t))?;
                for i in 0..len {
                    let cell = engine.heap.node(node).at(i);
                    engine
                        .heap
                        .push_cell(copy, cell)
                        .map_err(|t| engine.fail_trouble(t))?;
                }
                engine.heap.manage(copy);
                copy
            };
            Cell {
                flags: value.flags,
                payload: Payload::List {
                    kind,
                    node: copy,
                    index,
                    specifier,
                },
            }
        }
        Payload::Text { node, index } => {
            let text: String = engine
                .heap
                .node(node)
                .as_str()
                .chars()
                .skip(index as usize)
                .collect();
            let copy = engine
                .heap
                .make_text(&text)
                .map_err(|t| engine.fail_trouble(t))?;
            engine.heap.manage(copy);
            Cell::text(copy, 0)
        }
        Payload::Binary { node, index } => {
            let bytes: Vec<u8> = engine.heap.node(node).bytes()[index as usize..].to_vec();
            let copy = engine
                .heap
                .make_binary(&bytes)
                .map_err(|t| engine.fail_trouble(t))?;
            engine.heap.manage(copy);
            Cell::binary(copy, 0)
        }
        Payload::Context { varlist, .. } => {
            let copy = engine.copy_context(varlist)?;
            engine.var_at(copy, 0)
        }
        _ => value,
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

/// Lock a series against modification, or protect a variable slot.
pub(crate) fn native_protect(engine: &mut Engine) -> Result<Flow, Raised> {
    protect_helper(engine, true)
}

pub(crate) fn native_unprotect(engine: &mut Engine) -> Result<Flow, Raised> {
    protect_helper(engine, false)
}

fn protect_helper(engine: &mut Engine, protect: bool) -> Result<Flow, Raised> {
    let target = engine.arg(1);
    match target.payload {
        Payload::Word { .. } => {
            let (loc, _) = engine.resolve_word(&target)?;
            engine.protect_var_at(loc.varlist, loc.index, protect);
        }
        Payload::List { kind, node, index, .. } if kind.kind().is_path() => {
            // Walk to the final context slot: o/x protects x inside o.
            let len = engine.heap.node(node).len();
            if len < index as usize + 2 {
                return Err(engine.fail(ErrorId::InvalidPath, &[target, Cell::blank()]));
            }
            let head = engine.heap.node(node).at(index as usize);
            let mut varlist = match head.payload {
                Payload::Word { .. } => {
                    let value = engine.get_word_value(&head, false)?;
                    match value.payload {
                        Payload::Context { varlist, .. } => varlist,
                        _ => return Err(engine.fail(ErrorId::InvalidPath, &[target, head])),
                    }
                }
                _ => return Err(engine.fail(ErrorId::InvalidPath, &[target, head])),
            };
            for i in index as usize + 1..len {
                let segment = engine.heap.node(node).at(i);
                let sym = match segment.payload {
                    Payload::Word { spelling, .. } => spelling,
                    _ => return Err(engine.fail(ErrorId::InvalidPath, &[target, segment])),
                };
                let slot = engine
                    .find_in_context(varlist, sym)
                    .ok_or_else(|| engine.fail(ErrorId::InvalidPath, &[target, segment]))?;
                if i + 1 == len {
                    engine.protect_var_at(varlist, slot, protect);
                } else {
                    match engine.var_at(varlist, slot).payload {
                        Payload::Context { varlist: next, .. } => varlist = next,
                        _ => return Err(engine.fail(ErrorId::InvalidPath, &[target, segment])),
                    }
                }
            }
        }
        Payload::List { node, .. } => {
            if protect {
                engine.heap.protect(node);
            } else {
                engine.heap.unprotect(node);
            }
        }
        Payload::Text { node, .. } | Payload::Binary { node, .. } => {
            if protect {
                engine.heap.protect(node);
            } else {
                engine.heap.unprotect(node);
            }
        }
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[target])),
    }
    engine.frame_mut().out = target;
    Ok(Flow::Out)
}

pub(crate) fn native_freeze(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = engine.arg(1);
    match target.payload {
        Payload::List { node, .. }
        | Payload::Text { node, .. }
        | Payload::Binary { node, .. } => engine.heap.freeze(node),
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[target])),
    }
    engine.frame_mut().out = target;
    Ok(Flow::Out)
}

pub(crate) fn native_select(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = engine.arg(1);
    let key = engine.arg(2);
    let out = match target.payload {
        Payload::List { node, index, .. } => {
            let len = engine.heap.node(node).len();
            let mut found = Cell::blank();
            for i in index as usize..len.saturating_sub(1) {
                let cell = engine.heap.node(node).at(i);
                if cells_equal(engine, &cell, &key) {
                    found = engine.heap.node(node).at(i + 1);
                    break;
                }
            }
            found
        }
        Payload::Map { pairlist } => {
            let map_key = engine
                .map_key_for(&key)
                .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[key]))?;
            match engine.map_find(pairlist, &map_key) {
                Some(pair) => engine.heap.node(pairlist).at(pair as usize + 1),
                None => Cell::blank(),
            }
        }
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[target])),
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_put(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = engine.arg(1);
    let key = engine.arg(2);
    let value = engine.arg(3);
    let Payload::Map { pairlist } = target.payload else {
        return Err(engine.fail(ErrorId::InvalidArg, &[target]));
    };
    let map_key = engine
        .map_key_for(&key)
        .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[key]))?;
    engine.map_put(pairlist, map_key, &key, &value)?;
    engine.frame_mut().out = value;
    Ok(Flow::Out)
}

/// Evaluate each expression of a block, collecting results through the
/// data stack into a fresh block.
pub(crate) fn native_reduce(engine: &mut Engine) -> Result<Flow, Raised> {
    let block = engine.arg(1);
    let (node, mut index, specifier) = match block.payload {
        Payload::List { node, index, specifier, .. } => (node, index, specifier),
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[block])),
    };

    let base = engine.data_stack_depth();
    loop {
        let (value, indexor) = engine.do_step(node, index, specifier)?;
        match indexor {
            Indexor::End => break,
            Indexor::Thrown => {
                while engine.data_stack_depth() > base {
                    engine.ds_pop();
                }
                engine.frame_mut().out = value;
                return Ok(Flow::OutIsThrown);
            }
            Indexor::Next(next) => {
                index = next;
                engine.ds_push(value);
            }
        }
    }

    let count = engine.data_stack_depth() - base;
    let result = engine
        .heap
        .make_array(count, NodeFlags::empty())
        .map_err(|t| engine.fail_trouble(t))?;
    for _ in 0..count {
        engine
            .heap
            .push_cell(result, Cell::void())
            .map_err(|t| engine.fail_trouble(t))?;
    }
    for slot in (0..count).rev() {
        let value = engine.ds_pop();
        engine.heap.overwrite_cell(result, slot, value);
    }
    engine.heap.manage(result);
    engine.frame_mut().out = Cell::list(revel_core::ListKind::Block, result, 0);
    Ok(Flow::Out)
}
