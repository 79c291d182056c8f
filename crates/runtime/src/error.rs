//! Error values and the FAIL surface
//!
//! Failures in the core never recover locally: helpers build an error
//! context (an ordinary context value with the standard `type`/`id`/
//! `message`/`near`/`where`/`arg1..arg3` shape) and return [`Raised`],
//! which `?`-propagates out to the nearest trap. Halts travel the same
//! channel but only unhaltable traps stop them.
//!
//! THROW is the *other*, cooperative channel: it rides the output cell's
//! thrown bit and is not an error at all until it reaches an evaluator
//! boundary uncaught (at which point it becomes `no-catch` here).

use thiserror::Error;

use revel_core::{Cell, ContextKind, ListKind, NodeFlags, ParamClass, Payload, Trouble, WordKind};

use crate::engine::Engine;

/// Non-local unwind carried through `Result`.
#[derive(Debug, Clone, Copy, Error)]
pub enum Raised {
    /// An error context is in flight to the nearest trap.
    #[error("error raised")]
    Error(Cell),
    /// User interrupt; only unhaltable traps intercept.
    #[error("halt")]
    Halt,
    /// Clean exit requested by QUIT, carrying the exit code. Not an error:
    /// it passes every trap and surfaces to the host boundary intact.
    #[error("quit ({0})")]
    Quit(i32),
}

/// Error taxonomy category; becomes the context's `type` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Internal,
    Syntax,
    Script,
    Math,
    Access,
}

impl ErrorType {
    pub fn word(self) -> &'static str {
        match self {
            ErrorType::Internal => "internal",
            ErrorType::Syntax => "syntax",
            ErrorType::Script => "script",
            ErrorType::Math => "math",
            ErrorType::Access => "access",
        }
    }

    fn code_base(self) -> i64 {
        match self {
            ErrorType::Internal => 0,
            ErrorType::Syntax => 100,
            ErrorType::Script => 200,
            ErrorType::Math => 300,
            ErrorType::Access => 400,
        }
    }
}

/// Every failure the core can raise. Templates substitute `$1`..`$3` with
/// molded arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorId {
    // internal
    StackOverflow,
    OutOfMemory,
    InvalidCellAccess,
    // syntax
    ScanInvalid,
    ScanMissing,
    // script
    NoValue,
    NotAFunction,
    UnexpectedEnd,
    BadArgType,
    BadRefine,
    RevokedRefinement,
    InvalidPath,
    InvalidArg,
    BadMakeArg,
    NoCatch,
    NeedValue,
    ExpiredFrame,
    User,
    // math
    ZeroDivide,
    Overflow,
    // access
    ProtectedWord,
    LockedSeries,
    Halted,
}

impl ErrorId {
    pub fn spelling(self) -> &'static str {
        match self {
            ErrorId::StackOverflow => "stack-overflow",
            ErrorId::OutOfMemory => "out-of-memory",
            ErrorId::InvalidCellAccess => "invalid-cell-access",
            ErrorId::ScanInvalid => "scan-invalid",
            ErrorId::ScanMissing => "scan-missing",
            ErrorId::NoValue => "no-value",
            ErrorId::NotAFunction => "not-a-function",
            ErrorId::UnexpectedEnd => "unexpected-end",
            ErrorId::BadArgType => "bad-arg-type",
            ErrorId::BadRefine => "bad-refine",
            ErrorId::RevokedRefinement => "revoked-refinement",
            ErrorId::InvalidPath => "invalid-path",
            ErrorId::InvalidArg => "invalid-arg",
            ErrorId::BadMakeArg => "bad-make-arg",
            ErrorId::NoCatch => "no-catch",
            ErrorId::NeedValue => "need-value",
            ErrorId::ExpiredFrame => "expired-frame",
            ErrorId::User => "user",
            ErrorId::ZeroDivide => "zero-divide",
            ErrorId::Overflow => "overflow",
            ErrorId::ProtectedWord => "protected-word",
            ErrorId::LockedSeries => "locked-series",
            ErrorId::Halted => "halted",
        }
    }

    pub fn error_type(self) -> ErrorType {
        match self {
            ErrorId::StackOverflow | ErrorId::OutOfMemory | ErrorId::InvalidCellAccess => {
                ErrorType::Internal
            }
            ErrorId::ScanInvalid | ErrorId::ScanMissing => ErrorType::Syntax,
            ErrorId::ZeroDivide | ErrorId::Overflow => ErrorType::Math,
            ErrorId::ProtectedWord | ErrorId::LockedSeries | ErrorId::Halted => ErrorType::Access,
            _ => ErrorType::Script,
        }
    }

    pub fn code(self) -> i64 {
        let offset = match self {
            ErrorId::StackOverflow => 1,
            ErrorId::OutOfMemory => 2,
            ErrorId::InvalidCellAccess => 3,
            ErrorId::ScanInvalid => 1,
            ErrorId::ScanMissing => 2,
            ErrorId::NoValue => 1,
            ErrorId::NotAFunction => 2,
            ErrorId::UnexpectedEnd => 3,
            ErrorId::BadArgType => 4,
            ErrorId::BadRefine => 5,
            ErrorId::RevokedRefinement => 6,
            ErrorId::InvalidPath => 7,
            ErrorId::InvalidArg => 8,
            ErrorId::BadMakeArg => 9,
            ErrorId::NoCatch => 10,
            ErrorId::NeedValue => 11,
            ErrorId::ExpiredFrame => 12,
            ErrorId::User => 13,
            ErrorId::ZeroDivide => 1,
            ErrorId::Overflow => 2,
            ErrorId::ProtectedWord => 1,
            ErrorId::LockedSeries => 2,
            ErrorId::Halted => 3,
        };
        self.error_type().code_base() + offset
    }

    pub fn template(self) -> &'static str {
        match self {
            ErrorId::StackOverflow => "stack overflow",
            ErrorId::OutOfMemory => "not enough memory",
            ErrorId::InvalidCellAccess => "invalid cell access",
            ErrorId::ScanInvalid => "invalid token: $1",
            ErrorId::ScanMissing => "missing $1 at end of input",
            ErrorId::NoValue => "$1 has no value",
            ErrorId::NotAFunction => "$1 does not evaluate to a function",
            ErrorId::UnexpectedEnd => "expression ended before $1 had its arguments",
            ErrorId::BadArgType => "$1 does not allow $3 for its $2 argument",
            ErrorId::BadRefine => "incompatible or duplicate refinement: $1",
            ErrorId::RevokedRefinement => "refinement $1 revoked by void, but $2 was supplied",
            ErrorId::InvalidPath => "cannot pick $2 in path $1",
            ErrorId::InvalidArg => "invalid argument: $1",
            ErrorId::BadMakeArg => "cannot make $1 from $2",
            ErrorId::NoCatch => "no catch for throw: $1",
            ErrorId::NeedValue => "$1 needs a value",
            ErrorId::ExpiredFrame => "context of $1 is no longer on the stack",
            ErrorId::User => "$1",
            ErrorId::ZeroDivide => "attempt to divide by zero",
            ErrorId::Overflow => "math or number overflow",
            ErrorId::ProtectedWord => "variable $1 is protected from modification",
            ErrorId::LockedSeries => "series is protected from modification",
            ErrorId::Halted => "halted by user",
        }
    }
}

/// Field order of the standard error context.
pub const ERROR_FIELDS: &[&str] = &[
    "type", "id", "message", "near", "where", "arg1", "arg2", "arg3",
];

const FIELD_TYPE: usize = 1;
const FIELD_ID: usize = 2;
const FIELD_MESSAGE: usize = 3;
const FIELD_NEAR: usize = 4;
const FIELD_WHERE: usize = 5;
const FIELD_ARG1: usize = 6;

impl Engine {
    /// Build an error context. Managed; safe to carry through an unwind
    /// because no safe point runs until a trap has hold of it.
    pub fn make_error(&mut self, id: ErrorId, args: &[Cell]) -> Cell {
        debug_assert!(args.len() <= 3, "error templates take at most three args");

        let message = self.render_template(id.template(), args);

        // Where: innermost call labels, most recent first.
        let labels: Vec<_> = self
            .frames
            .iter()
            .rev()
            .filter_map(|f| f.label)
            .collect();
        // Near: the source position of the innermost frame.
        let near = self
            .frames
            .last()
            .map(|f| Cell::list(ListKind::Block, f.source, f.index.saturating_sub(1)));

        let keylist = self
            .heap
            .make_array(ERROR_FIELDS.len() + 1, NodeFlags::KEYLIST)
            .expect("error keylist allocation");
        self.heap
            .push_cell(keylist, Cell::blank())
            .expect("error keylist self slot");
        for field in ERROR_FIELDS {
            let sym = self.symbols.intern(field);
            let key = Cell::typeset(u64::MAX, Some(sym), ParamClass::Normal);
            self.heap.push_cell(keylist, key).expect("error keylist key");
        }

        let varlist = self
            .heap
            .make_array(ERROR_FIELDS.len() + 1, NodeFlags::VARLIST)
            .expect("error varlist allocation");
        let error_cell = Cell::context(ContextKind::Error, varlist);
        self.heap.push_cell(varlist, error_cell).expect("error self cell");

        let type_sym = self.symbols.intern(id.error_type().word());
        let id_sym = self.symbols.intern(id.spelling());
        let message_text = self.heap.make_text(&message).expect("error message text");

        let mut slots = [Cell::blank(); 8];
        slots[FIELD_TYPE - 1] = Cell::word(WordKind::Word, type_sym);
        slots[FIELD_ID - 1] = Cell::word(WordKind::Word, id_sym);
        slots[FIELD_MESSAGE - 1] = Cell::text(message_text, 0);
        if let Some(near) = near {
            slots[FIELD_NEAR - 1] = near;
        }
        if !labels.is_empty() {
            let where_block = self
                .heap
                .make_array(labels.len(), NodeFlags::empty())
                .expect("error where block");
            for sym in labels {
                self.heap
                    .push_cell(where_block, Cell::word(WordKind::Word, sym))
                    .expect("error where entry");
            }
            self.heap.manage(where_block);
            slots[FIELD_WHERE - 1] = Cell::list(ListKind::Block, where_block, 0);
        }
        for (i, arg) in args.iter().enumerate() {
            slots[FIELD_ARG1 - 1 + i] = *arg;
        }
        for slot in slots {
            self.heap.push_cell(varlist, slot).expect("error field");
        }

        self.heap.node_mut(varlist).link = revel_core::Link::Keylist(keylist);
        self.heap.manage(keylist);
        self.heap.manage(message_text);
        self.heap.manage(varlist);
        error_cell
    }

    /// Build and raise in one step: `return Err(self.fail(...))`.
    pub fn fail(&mut self, id: ErrorId, args: &[Cell]) -> Raised {
        Raised::Error(self.make_error(id, args))
    }

    /// Lift a low-level memory fault into a raised error.
    pub fn fail_trouble(&mut self, trouble: Trouble) -> Raised {
        let id = match trouble {
            Trouble::OutOfMemory => ErrorId::OutOfMemory,
            Trouble::LockedSeries | Trouble::FixedSize => ErrorId::LockedSeries,
        };
        self.fail(id, &[])
    }

    fn render_template(&mut self, template: &str, args: &[Cell]) -> String {
        let mut message = template.to_string();
        for (i, arg) in args.iter().enumerate() {
            let placeholder = format!("${}", i + 1);
            if message.contains(&placeholder) {
                let rendered = self.mold_value(arg);
                message = message.replace(&placeholder, &rendered);
            }
        }
        message
    }

    /// The `id` field of an error context, if `cell` is one.
    pub fn error_id(&self, cell: &Cell) -> Option<&str> {
        match cell.payload {
            Payload::Context {
                kind: ContextKind::Error,
                varlist,
            } => {
                let id_cell = self.heap.node(varlist).at(FIELD_ID);
                match id_cell.payload {
                    Payload::Word { spelling, .. } => Some(self.symbols.spelling(spelling)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The `message` field of an error context.
    pub fn error_message(&self, cell: &Cell) -> Option<&str> {
        match cell.payload {
            Payload::Context {
                kind: ContextKind::Error,
                varlist,
            } => match self.heap.node(varlist).at(FIELD_MESSAGE).payload {
                Payload::Text { node, .. } => Some(self.heap.node(node).as_str()),
                _ => None,
            },
            _ => None,
        }
    }
}
