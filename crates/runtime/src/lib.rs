//! Revel runtime: evaluator, contexts, and control flow
//!
//! Builds the interpreter on top of `revel-core`'s cells and heap:
//!
//! - [`engine::Engine`] — one interpreter instance (heap, symbols, Lib,
//!   frames, signals, dispatcher table).
//! - [`eval`] — the do-loop: enfix lookahead, argument fulfillment,
//!   dispatch.
//! - [`error`] / [`trap`] — FAIL unwinding with snapshot/restore; THROW
//!   rides the output cell.
//! - [`bind`] / [`context`] / [`function`] — words, objects, functions.
//! - [`scan`] / [`mold`] — source in, text out.
//! - [`device`] / [`host`] — the I/O seams the core consumes.

pub mod bind;
pub mod boot;
pub mod context;
pub mod device;
pub mod engine;
pub mod error;
pub mod eval;
pub mod frame;
pub mod function;
pub mod host;
pub mod mold;
pub mod natives;
pub mod paths;
pub mod scan;
pub mod signal;
pub mod trap;

pub use bind::{BindMode, VarLocation};
pub use device::{Device, DeviceResult, DeviceTable, LoopbackDevice, Request, RequestCode};
pub use engine::{Engine, EvalConfig};
pub use error::{ErrorId, ErrorType, Raised};
pub use frame::{Frame, FrameFlags, Indexor, Mode};
pub use function::{Flow, NativeFn, ParamInfo};
pub use host::{CaptureHost, Host, StdioHost};
pub use signal::{Signal, SignalMask};
pub use trap::{HostOutcome, Snapshot};

// Re-export the substrate so embedders need only one dependency.
pub use revel_core as core;
pub use revel_core::{Cell, CellFlags, Kind, NodeId, Payload};
