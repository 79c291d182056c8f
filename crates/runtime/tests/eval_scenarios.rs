//! End-to-end evaluator scenarios
//!
//! Drives the public engine API with source text and checks values, error
//! ids, and throw behavior, covering enfix precedence and deferral,
//! refinements (ordering, revocation), objects and protection, catch and
//! throw labeling, and trap recovery.

use std::sync::{Arc, Mutex};

use revel_runtime::{Cell, Engine, EvalConfig, Host, HostOutcome, Kind, Raised};

fn eval_int(engine: &mut Engine, source: &str) -> i64 {
    let value = engine.do_text(source).expect("evaluation succeeds");
    value
        .as_integer()
        .unwrap_or_else(|| panic!("expected integer from {source:?}, got {value:?}"))
}

fn eval_error_id(engine: &mut Engine, source: &str) -> String {
    match engine.do_text(source) {
        Err(Raised::Error(error)) => engine
            .error_id(&error)
            .expect("error context has an id")
            .to_string(),
        other => panic!("expected failure from {source:?}, got {other:?}"),
    }
}

#[test]
fn enfix_is_left_to_right() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "1 + 2 * 3"), 9);
    assert_eq!(eval_int(&mut engine, "10 - 3 - 2"), 5);
    assert_eq!(eval_int(&mut engine, "add 1 multiply 2 3"), 7);
}

#[test]
fn prefix_argument_fulfillment_is_greedy_for_enfix() {
    let mut engine = Engine::new();
    // The enfix op binds to the argument being fulfilled.
    assert_eq!(eval_int(&mut engine, "subtract 10 2 + 1"), 7);
}

#[test]
fn division_promotes_and_guards_zero() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "6 / 2"), 3);
    let value = engine.do_text("1 / 2").unwrap();
    assert_eq!(value.as_decimal(), Some(0.5));
    assert_eq!(eval_error_id(&mut engine, "1 / 0"), "zero-divide");
}

#[test]
fn functions_with_refinements() {
    let mut engine = Engine::new();
    engine
        .do_text("f: func [a /b c] [either b [c] [a]]")
        .unwrap();
    assert_eq!(eval_int(&mut engine, "f/b 10 20"), 20);
    assert_eq!(eval_int(&mut engine, "f 10"), 10);
}

#[test]
fn out_of_order_refinements_pick_up_from_the_feed() {
    let mut engine = Engine::new();
    // Paramlist order is /part then /only; the path mentions them the
    // other way around, so /part's argument rides a data-stack pickup.
    engine.do_text("a: copy [1 2]").unwrap();
    engine.do_text("append/only/part a [3 4 5] 9").unwrap();
    let value = engine.do_text("length? a").unwrap();
    assert_eq!(value.as_integer(), Some(3), "block appended as one value");
}

#[test]
fn refinement_revocation() {
    let mut engine = Engine::new();
    engine
        .do_text("f: func [a /b c] [either b [c] [a]]")
        .unwrap();
    // A void first argument revokes the refinement entirely.
    assert_eq!(eval_int(&mut engine, "f/b 10 ()"), 10);

    engine.do_text("g: func [/b c d] [reduce [b c d]]").unwrap();
    assert_eq!(
        eval_error_id(&mut engine, "g/b () 5"),
        "revoked-refinement",
        "mixing void and non-void args of a revoked refinement fails"
    );
}

#[test]
fn definitional_return() {
    let mut engine = Engine::new();
    engine
        .do_text("f: func [x] [if x > 10 [return 99] x]")
        .unwrap();
    assert_eq!(eval_int(&mut engine, "f 20"), 99);
    assert_eq!(eval_int(&mut engine, "f 5"), 5);
}

#[test]
fn catch_and_throw() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "catch [throw 42]"), 42);
    assert_eq!(eval_int(&mut engine, "catch [1 throw 42 99]"), 42);
    assert_eq!(
        eval_int(&mut engine, "catch/name [throw/name 42 'foo] 'foo"),
        42
    );
    assert_eq!(
        eval_error_id(&mut engine, "catch [throw/name 42 'foo]"),
        "no-catch",
        "a named throw passes a plain catch and reaches the boundary"
    );
    assert_eq!(eval_error_id(&mut engine, "throw 1"), "no-catch");
}

#[test]
fn trap_intercepts_failures() {
    let mut engine = Engine::new();
    let value = engine.do_text("trap [1 / 0]").unwrap();
    assert_eq!(value.kind(), Some(Kind::Error));
    assert_eq!(engine.error_id(&value), Some("zero-divide"));

    // The trapped value is an ordinary context; its id picks like one.
    engine.do_text("e: trap [1 / 0]").unwrap();
    let id = engine.do_text("e/id").unwrap();
    assert_eq!(engine.mold_value(&id), "zero-divide");
}

#[test]
fn trap_restores_resource_depths() {
    let mut engine = Engine::new();
    let frames = engine.frame_depth();
    let data = engine.data_stack_depth();
    let manuals = engine.heap.manual_count();
    let series_guards = engine.heap.series_guard_depth();
    let value_guards = engine.heap.value_guard_depth();
    let gc_disabled = engine.heap.gc_disabled_depth();

    engine.do_text("trap [f: func [x] [x / 0] f 3]").unwrap();

    assert_eq!(engine.frame_depth(), frames);
    assert_eq!(engine.data_stack_depth(), data);
    assert_eq!(engine.heap.manual_count(), manuals);
    assert_eq!(engine.heap.series_guard_depth(), series_guards);
    assert_eq!(engine.heap.value_guard_depth(), value_guards);
    assert_eq!(engine.heap.gc_disabled_depth(), gc_disabled);
}

#[test]
fn append_mutates_and_locks_fail() {
    let mut engine = Engine::new();
    let value = engine.do_text("a: [1 2 3]  append a 4  a").unwrap();
    assert_eq!(engine.mold_value(&value), "[1 2 3 4]");

    let mut engine = Engine::new();
    assert_eq!(
        eval_error_id(&mut engine, "a: [1 2 3]  freeze a  append a 4"),
        "locked-series"
    );
    let mut engine = Engine::new();
    assert_eq!(
        eval_error_id(&mut engine, "a: [1 2 3]  protect a  append a 4"),
        "locked-series"
    );
}

#[test]
fn objects_and_slot_protection() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "o: make object! [x: 10]  o/x"), 10);
    assert_eq!(eval_int(&mut engine, "o/x: 15  o/x"), 15);

    engine.do_text("protect 'o/x").unwrap();
    assert_eq!(eval_error_id(&mut engine, "o/x: 20"), "protected-word");
    assert_eq!(eval_int(&mut engine, "o/x"), 15, "value unchanged");

    engine.do_text("unprotect 'o/x").unwrap();
    assert_eq!(eval_int(&mut engine, "o/x: 20  o/x"), 20);
}

#[test]
fn unset_words_fail_cleanly() {
    let mut engine = Engine::new();
    assert_eq!(eval_error_id(&mut engine, "no-such-word"), "no-value");
    assert_eq!(eval_error_id(&mut engine, "x:"), "need-value");
}

#[test]
fn get_and_set_words() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "x: 7  :x"), 7);
    assert_eq!(eval_int(&mut engine, "set 'y 8  y"), 8);
    assert_eq!(eval_int(&mut engine, "get 'y"), 8);
}

#[test]
fn groups_and_blocks() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "(1 + 2)"), 3);
    let value = engine.do_text("[1 + 2]").unwrap();
    assert_eq!(engine.mold_value(&value), "[1 + 2]", "blocks are inert");
    let value = engine.do_text("reduce [1 + 2 3 * 4]").unwrap();
    assert_eq!(engine.mold_value(&value), "[3 12]");
}

#[test]
fn control_flow_natives() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "either true [1] [2]"), 1);
    assert_eq!(eval_int(&mut engine, "either false [1] [2]"), 2);
    assert_eq!(eval_int(&mut engine, "if 1 < 2 [5]"), 5);
    assert_eq!(
        eval_int(&mut engine, "n: 0 while [n < 5] [n: n + 1] n"),
        5
    );
    assert_eq!(eval_int(&mut engine, "total: 0 loop 4 [total: total + 2] total"), 8);
    assert_eq!(eval_int(&mut engine, "any [false _ 9]"), 9);
    assert_eq!(eval_int(&mut engine, "all [1 2 3]"), 3);
}

#[test]
fn deferred_enfix_dampens_after_one_step() {
    let mut engine = Engine::new();
    // plus1 soft-quotes its left argument, which marks it defers_lookback
    // at make time.
    engine.do_text("plus1: func [:left] [left + 1]  enfix 'plus1").unwrap();
    engine.do_text("twice: func [x] [x * 2]").unwrap();

    // One deferred step completes inside the argument; the second sees the
    // dampen flag and waits for the outer expression.
    assert_eq!(eval_int(&mut engine, "twice 3 plus1"), 8);
    assert_eq!(eval_int(&mut engine, "twice 3 plus1 plus1"), 9);

    // Past the first argument the deferral always waits.
    assert_eq!(eval_int(&mut engine, "subtract 10 2 plus1"), 9);
}

#[test]
fn specialization_fixes_arguments() {
    let mut engine = Engine::new();
    engine
        .do_text("append4: specialize 'append [value: 4]")
        .unwrap();
    let value = engine.do_text("a: copy [1 2 3]  append4 a  a").unwrap();
    assert_eq!(engine.mold_value(&value), "[1 2 3 4]");
}

#[test]
fn apply_takes_literal_arguments() {
    let mut engine = Engine::new();
    assert_eq!(eval_int(&mut engine, "apply :add [1 2]"), 3);
    let values = [Cell::integer(4), Cell::integer(5)];
    let add = engine.do_text(":add").unwrap();
    let result = engine.apply_function(&add, &values).unwrap();
    assert_eq!(result.as_integer(), Some(9));
}

#[test]
fn do_values_reifies_a_feed() {
    let mut engine = Engine::new();
    let lib = engine.lib_context();
    let add_sym = engine.symbols.intern("add");
    let index = engine
        .find_in_context(lib, add_sym)
        .expect("add is a boot native");
    let add_word = Cell::bound_word(revel_runtime::core::WordKind::Word, add_sym, lib, index);
    let result = engine
        .do_values(&[add_word, Cell::integer(2), Cell::integer(3)])
        .unwrap();
    assert_eq!(result.as_integer(), Some(5));
}

#[test]
fn maps_select_and_update() {
    let mut engine = Engine::new();
    engine.do_text("m: make map! [a 1 b 2]").unwrap();
    assert_eq!(eval_int(&mut engine, "select m 'b"), 2);
    assert_eq!(eval_int(&mut engine, "put m 'c 3  select m 'c"), 3);
    assert_eq!(eval_int(&mut engine, "m/a"), 1);
    assert_eq!(eval_int(&mut engine, "m/a: 10  m/a"), 10);
    assert_eq!(eval_int(&mut engine, "length? m"), 3);
}

#[test]
fn type_reflection() {
    let mut engine = Engine::new();
    let value = engine.do_text("type-of 1").unwrap();
    assert_eq!(engine.mold_value(&value), "integer!");
    let value = engine.do_text("type-of [1]").unwrap();
    assert_eq!(engine.mold_value(&value), "block!");
}

/// Host capturing stdout into a shared buffer.
struct SharedHost(Arc<Mutex<String>>);

impl Host for SharedHost {
    fn write_stdout(&mut self, text: &str) {
        self.0.lock().unwrap().push_str(text);
    }

    fn now_ms(&self) -> i64 {
        0
    }

    fn panic_report(&mut self, _diagnostic: &str) {}
}

#[test]
fn print_routes_through_the_host() {
    let buffer = Arc::new(Mutex::new(String::new()));
    let mut engine = Engine::with_host(
        Box::new(SharedHost(buffer.clone())),
        EvalConfig::default(),
    );
    engine.do_text("print 42").unwrap();
    engine.do_text(r#"print "hello""#).unwrap();
    engine.do_text("print [1 + 2 \"x\"]").unwrap();
    assert_eq!(&*buffer.lock().unwrap(), "42\nhello\n3 x\n");
}

#[test]
fn quit_unwinds_on_its_own_channel() {
    let mut engine = Engine::new();
    match engine.do_text("quit") {
        Err(Raised::Quit(0)) => {}
        other => panic!("expected quit, got {other:?}"),
    }
    match engine.do_text("quit/return 3") {
        Err(Raised::Quit(3)) => {}
        other => panic!("expected quit 3, got {other:?}"),
    }
    // QUIT is not an error: user traps pass it along untouched...
    match engine.do_text("trap [quit/return 7]") {
        Err(Raised::Quit(7)) => {}
        other => panic!("expected quit through trap, got {other:?}"),
    }
    // ...and it works from arbitrary code, not just top level.
    match engine.do_text("f: does [quit/return 9]  if true [f]") {
        Err(Raised::Quit(9)) => {}
        other => panic!("expected quit from a call, got {other:?}"),
    }
    // The host boundary sees it distinctly from errors and halts.
    match engine.with_unhaltable_trap(|engine| engine.do_text("quit/return 2")) {
        HostOutcome::Quit(2) => {}
        other => panic!("expected quit outcome, got {other:?}"),
    }
    // The engine stays usable afterwards.
    assert_eq!(eval_int(&mut engine, "1 + 1"), 2);
}

#[test]
fn halt_unwinds_to_the_boundary() {
    let mut engine = Engine::new();
    engine.request_halt();
    match engine.do_text("1 + 1") {
        Err(Raised::Halt) => {}
        other => panic!("expected halt, got {other:?}"),
    }
    // The signal was consumed; evaluation works again.
    assert_eq!(eval_int(&mut engine, "1 + 1"), 2);
}

#[test]
fn user_fail_raises_an_error_context() {
    let mut engine = Engine::new();
    assert_eq!(eval_error_id(&mut engine, r#"fail "boom""#), "user");
    let value = engine.do_text(r#"trap [fail "boom"]"#).unwrap();
    assert_eq!(engine.error_message(&value), Some("\"boom\""));
}
