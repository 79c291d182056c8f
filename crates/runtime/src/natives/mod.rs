//! Native dispatchers
//!
//! The first entries of the engine's dispatcher table are the structural
//! dispatchers every function machinery needs: the interpreted user-body
//! runner, definitional RETURN/LEAVE, and the specialization shim. The
//! rest of the table is filled from the boot native table (`boot::NATIVES`)
//! with the functions defined in the submodules here.

pub(crate) mod control;
pub(crate) mod data;
pub(crate) mod math;
pub(crate) mod series;

use revel_core::{Cell, ContextKind, Link, NodeInfo, ParamClass, Payload};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};
use crate::function::Flow;

/// Run an interpreted function body, catching the definitional returns
/// that target this frame.
pub(crate) fn dispatch_user_body(engine: &mut Engine) -> Result<Flow, Raised> {
    let f = engine.frame().original.expect("user body without a function");
    let body = match f.payload {
        Payload::Function { body, .. } => body,
        _ => unreachable!("dispatch on a non-function"),
    };
    let body_cell = engine.heap.node(body).at(0);
    let (node, index) = match body_cell.payload {
        Payload::List { node, index, .. } => (node, index),
        _ => panic!("user body holder without a block"),
    };
    let varlist = engine.frame().varlist.expect("user body without args");

    let result = engine.do_to_end(node, index, Some(varlist))?;
    if result.is_thrown() {
        let mut label = result;
        label.flags -= revel_core::CellFlags::THROWN;
        if let Payload::Context {
            kind: ContextKind::Frame,
            varlist: target,
        } = label.payload
        {
            if target == varlist {
                let (_, payload) = engine.catch_thrown(&result);
                engine.frame_mut().out = payload;
                return Ok(Flow::Out);
            }
        }
        engine.frame_mut().out = result;
        return Ok(Flow::OutIsThrown);
    }
    engine.frame_mut().out = result;
    Ok(Flow::Out)
}

fn definitional_target(engine: &mut Engine) -> Result<Cell, Raised> {
    let f = engine.frame().original.expect("definitional without function");
    let body = match f.payload {
        Payload::Function { body, .. } => body,
        _ => unreachable!(),
    };
    let target = engine.heap.node(body).at(0);
    if let Payload::Context { varlist, .. } = target.payload {
        if engine.heap.node(varlist).info.contains(NodeInfo::INACCESSIBLE) {
            return Err(engine.fail(ErrorId::ExpiredFrame, &[target]));
        }
    }
    Ok(target)
}

/// Definitional RETURN: throw the argument at the frame it was born in.
pub(crate) fn dispatch_return(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = definitional_target(engine)?;
    let value = engine.arg(1);
    let thrown = engine.throw(target, value);
    engine.frame_mut().out = thrown;
    Ok(Flow::OutIsThrown)
}

/// Definitional LEAVE: like RETURN, but the payload is always void.
pub(crate) fn dispatch_leave(engine: &mut Engine) -> Result<Flow, Raised> {
    let target = definitional_target(engine)?;
    let thrown = engine.throw(target, Cell::void());
    engine.frame_mut().out = thrown;
    Ok(Flow::OutIsThrown)
}

/// Specialization shim: copy the exemplar's fixed values into the frame,
/// re-key it to the underlying paramlist, and redispatch.
pub(crate) fn dispatch_specialized(engine: &mut Engine) -> Result<Flow, Raised> {
    let f = engine.frame().original.expect("specialization without function");
    let (facade, body) = match f.payload {
        Payload::Function { paramlist, body } => (paramlist, body),
        _ => unreachable!(),
    };
    let exemplar = match engine.heap.node(body).at(0).payload {
        Payload::Context { varlist, .. } => varlist,
        _ => panic!("specialization body holder without an exemplar"),
    };
    let underlying = match engine.heap.node(facade).link {
        Link::Underlying(node) => node,
        _ => panic!("facade without an underlying paramlist"),
    };
    let varlist = engine.frame().varlist.expect("specialization without args");

    let params = engine.paramlist_params(facade);
    for (i, param) in params.iter().enumerate() {
        if param.class != ParamClass::Local {
            continue;
        }
        let fixed = engine.var_at(exemplar, i as u32 + 1);
        if !fixed.is_void() {
            engine.heap.overwrite_cell(varlist, i + 1, fixed);
        }
    }

    // Re-key so relative words in the underlying body resolve through this
    // frame, then hand dispatch to the underlying function.
    engine.heap.node_mut(varlist).link = Link::Keylist(underlying);
    let underlying_fn = engine.heap.node(underlying).at(0);
    engine.frame_mut().original = Some(underlying_fn);
    engine.frame_mut().phase = Some(underlying);
    Ok(Flow::Redispatch)
}
