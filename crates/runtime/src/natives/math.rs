//! Arithmetic and comparison natives

use revel_core::{Cell, Payload};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};
use crate::function::Flow;

enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

fn arith(engine: &mut Engine, op: ArithOp) -> Result<Flow, Raised> {
    let a = engine.arg(1);
    let b = engine.arg(2);

    let out = match (a.payload, b.payload) {
        (Payload::Integer(x), Payload::Integer(y)) => match op {
            ArithOp::Add => x
                .checked_add(y)
                .map(Cell::integer)
                .ok_or_else(|| engine.fail(ErrorId::Overflow, &[]))?,
            ArithOp::Subtract => x
                .checked_sub(y)
                .map(Cell::integer)
                .ok_or_else(|| engine.fail(ErrorId::Overflow, &[]))?,
            ArithOp::Multiply => x
                .checked_mul(y)
                .map(Cell::integer)
                .ok_or_else(|| engine.fail(ErrorId::Overflow, &[]))?,
            ArithOp::Divide => {
                if y == 0 {
                    return Err(engine.fail(ErrorId::ZeroDivide, &[]));
                }
                if x % y == 0 {
                    Cell::integer(x / y)
                } else {
                    Cell::decimal(x as f64 / y as f64)
                }
            }
        },
        _ => {
            let x = a
                .as_decimal()
                .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[a]))?;
            let y = b
                .as_decimal()
                .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[b]))?;
            match op {
                ArithOp::Add => Cell::decimal(x + y),
                ArithOp::Subtract => Cell::decimal(x - y),
                ArithOp::Multiply => Cell::decimal(x * y),
                ArithOp::Divide => {
                    if y == 0.0 {
                        return Err(engine.fail(ErrorId::ZeroDivide, &[]));
                    }
                    Cell::decimal(x / y)
                }
            }
        }
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

pub(crate) fn native_add(engine: &mut Engine) -> Result<Flow, Raised> {
    arith(engine, ArithOp::Add)
}

pub(crate) fn native_subtract(engine: &mut Engine) -> Result<Flow, Raised> {
    arith(engine, ArithOp::Subtract)
}

pub(crate) fn native_multiply(engine: &mut Engine) -> Result<Flow, Raised> {
    arith(engine, ArithOp::Multiply)
}

pub(crate) fn native_divide(engine: &mut Engine) -> Result<Flow, Raised> {
    arith(engine, ArithOp::Divide)
}

pub(crate) fn native_negate(engine: &mut Engine) -> Result<Flow, Raised> {
    let a = engine.arg(1);
    let out = match a.payload {
        Payload::Integer(n) => n
            .checked_neg()
            .map(Cell::integer)
            .ok_or_else(|| engine.fail(ErrorId::Overflow, &[]))?,
        Payload::Decimal(f) => Cell::decimal(-f),
        _ => return Err(engine.fail(ErrorId::InvalidArg, &[a])),
    };
    engine.frame_mut().out = out;
    Ok(Flow::Out)
}

/// Value equality across the kinds with content semantics: numbers compare
/// numerically, words by canon, series by contents.
pub(crate) fn cells_equal(engine: &Engine, a: &Cell, b: &Cell) -> bool {
    match (a.payload, b.payload) {
        (Payload::Void, Payload::Void) | (Payload::Blank, Payload::Blank) => true,
        (Payload::Logic(x), Payload::Logic(y)) => x == y,
        (Payload::Integer(x), Payload::Integer(y)) => x == y,
        (Payload::Char(x), Payload::Char(y)) => x == y,
        (Payload::Integer(_), Payload::Decimal(_))
        | (Payload::Decimal(_), Payload::Integer(_))
        | (Payload::Decimal(_), Payload::Decimal(_)) => {
            a.as_decimal().expect("numeric") == b.as_decimal().expect("numeric")
        }
        (Payload::Word { spelling: x, .. }, Payload::Word { spelling: y, .. }) => {
            engine.symbols.same_word(x, y)
        }
        (Payload::Datatype(x), Payload::Datatype(y)) => x == y,
        (Payload::Text { node: x, index: xi }, Payload::Text { node: y, index: yi }) => {
            let xs: Vec<char> = engine.heap.node(x).as_str().chars().collect();
            let ys: Vec<char> = engine.heap.node(y).as_str().chars().collect();
            xs[(xi as usize).min(xs.len())..] == ys[(yi as usize).min(ys.len())..]
        }
        (Payload::Binary { node: x, index: xi }, Payload::Binary { node: y, index: yi }) => {
            let xs = engine.heap.node(x).bytes();
            let ys = engine.heap.node(y).bytes();
            xs[(xi as usize).min(xs.len())..] == ys[(yi as usize).min(ys.len())..]
        }
        (
            Payload::List { node: x, index: xi, .. },
            Payload::List { node: y, index: yi, .. },
        ) => {
            if x == y && xi == yi {
                return true;
            }
            let xlen = engine.heap.node(x).len() - (xi as usize).min(engine.heap.node(x).len());
            let ylen = engine.heap.node(y).len() - (yi as usize).min(engine.heap.node(y).len());
            if xlen != ylen {
                return false;
            }
            (0..xlen).all(|i| {
                let xa = engine.heap.node(x).at(xi as usize + i);
                let ya = engine.heap.node(y).at(yi as usize + i);
                cells_equal(engine, &xa, &ya)
            })
        }
        (Payload::Context { varlist: x, .. }, Payload::Context { varlist: y, .. }) => x == y,
        (Payload::Function { paramlist: x, .. }, Payload::Function { paramlist: y, .. }) => x == y,
        (Payload::Map { pairlist: x }, Payload::Map { pairlist: y }) => x == y,
        _ => false,
    }
}

fn ordering(engine: &mut Engine) -> Result<std::cmp::Ordering, Raised> {
    let a = engine.arg(1);
    let b = engine.arg(2);
    match (a.payload, b.payload) {
        (Payload::Integer(x), Payload::Integer(y)) => Ok(x.cmp(&y)),
        (Payload::Char(x), Payload::Char(y)) => Ok(x.cmp(&y)),
        (Payload::Text { .. }, Payload::Text { .. }) => {
            let (Payload::Text { node: x, index: xi }, Payload::Text { node: y, index: yi }) =
                (a.payload, b.payload)
            else {
                unreachable!()
            };
            let xs: String = engine.heap.node(x).as_str().chars().skip(xi as usize).collect();
            let ys: String = engine.heap.node(y).as_str().chars().skip(yi as usize).collect();
            Ok(xs.cmp(&ys))
        }
        _ => {
            let x = a
                .as_decimal()
                .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[a]))?;
            let y = b
                .as_decimal()
                .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[b]))?;
            x.partial_cmp(&y)
                .ok_or_else(|| engine.fail(ErrorId::InvalidArg, &[b]))
        }
    }
}

pub(crate) fn native_equal(engine: &mut Engine) -> Result<Flow, Raised> {
    let a = engine.arg(1);
    let b = engine.arg(2);
    let eq = cells_equal(engine, &a, &b);
    engine.frame_mut().out = Cell::logic(eq);
    Ok(Flow::Out)
}

pub(crate) fn native_not_equal(engine: &mut Engine) -> Result<Flow, Raised> {
    let a = engine.arg(1);
    let b = engine.arg(2);
    let eq = cells_equal(engine, &a, &b);
    engine.frame_mut().out = Cell::logic(!eq);
    Ok(Flow::Out)
}

pub(crate) fn native_lesser(engine: &mut Engine) -> Result<Flow, Raised> {
    let ord = ordering(engine)?;
    engine.frame_mut().out = Cell::logic(ord == std::cmp::Ordering::Less);
    Ok(Flow::Out)
}

pub(crate) fn native_greater(engine: &mut Engine) -> Result<Flow, Raised> {
    let ord = ordering(engine)?;
    engine.frame_mut().out = Cell::logic(ord == std::cmp::Ordering::Greater);
    Ok(Flow::Out)
}

pub(crate) fn native_lesser_or_equal(engine: &mut Engine) -> Result<Flow, Raised> {
    let ord = ordering(engine)?;
    engine.frame_mut().out = Cell::logic(ord != std::cmp::Ordering::Greater);
    Ok(Flow::Out)
}

pub(crate) fn native_greater_or_equal(engine: &mut Engine) -> Result<Flow, Raised> {
    let ord = ordering(engine)?;
    engine.frame_mut().out = Cell::logic(ord != std::cmp::Ordering::Less);
    Ok(Flow::Out)
}

pub(crate) fn native_not(engine: &mut Engine) -> Result<Flow, Raised> {
    let a = engine.arg(1);
    engine.frame_mut().out = Cell::logic(!a.is_truthy());
    Ok(Flow::Out)
}
