//! Engine-level memory and structural invariants
//!
//! The core crate unit-tests the heap in isolation; these tests drive the
//! same invariants through the full engine: collection with live program
//! state, end-terminator maintenance across mutations, evaluator depth
//! limits, and scanner/mold round-trips.

use revel_runtime::{Engine, Payload, Raised};

#[test]
fn collection_preserves_program_state() {
    let mut engine = Engine::new();
    engine.do_text("keep: [1 2 3]").unwrap();

    // Churn out garbage: every copy is a fresh managed series.
    engine.do_text("loop 50 [copy [9 9 9]]").unwrap();
    let stats = engine.collect_garbage();
    assert!(stats.freed >= 50, "loop garbage collected, freed {}", stats.freed);

    // Everything reachable from Lib survived.
    let value = engine.do_text("keep").unwrap();
    assert_eq!(engine.mold_value(&value), "[1 2 3]");
    let value = engine.do_text("append keep 4  keep").unwrap();
    assert_eq!(engine.mold_value(&value), "[1 2 3 4]");

    // A second collection right away finds nothing new to free.
    assert_eq!(engine.collect_garbage().freed, 0);
}

#[test]
fn recycle_native_reports_and_toggles() {
    let mut engine = Engine::new();
    engine.do_text("loop 10 [copy [1]]").unwrap();
    let freed = engine.do_text("recycle").unwrap();
    assert!(freed.as_integer().expect("recycle returns a count") >= 10);

    // Disabled collection answers blank and frees nothing.
    engine.do_text("recycle/off").unwrap();
    engine.do_text("loop 10 [copy [1]]").unwrap();
    let blocked = engine.do_text("recycle").unwrap();
    assert!(blocked.is_blank());
    engine.do_text("recycle/on").unwrap();
    assert!(engine.do_text("recycle").unwrap().as_integer().is_some());
}

#[test]
fn arrays_stay_terminated_through_program_mutations() {
    let mut engine = Engine::new();
    let value = engine.do_text("a: [1 2 3]  append a 4  a").unwrap();
    let node = match value.payload {
        Payload::List { node, .. } => node,
        other => panic!("expected block, got {other:?}"),
    };
    let len = engine.heap.node(node).len();
    assert_eq!(len, 4);
    assert!(engine.heap.node(node).at(len).is_end(), "terminator after append");
}

#[test]
fn evaluator_depth_is_bounded() {
    let mut engine = Engine::new();
    engine.do_text("f: func [] [f]").unwrap();
    match engine.do_text("f") {
        Err(Raised::Error(error)) => {
            assert_eq!(engine.error_id(&error), Some("stack-overflow"));
        }
        other => panic!("expected stack overflow, got {other:?}"),
    }
    // The engine recovers after unwinding.
    assert_eq!(engine.frame_depth(), 0);
    let value = engine.do_text("1 + 1").unwrap();
    assert_eq!(value.as_integer(), Some(2));
}

#[test]
fn scanner_mold_round_trip_is_stable() {
    let mut engine = Engine::new();
    for source in [
        "[1 2 3]",
        "[a b: :c 'd /e]",
        "[a/b a/2 [nested (group)]]",
        "[\"text\" #\"x\" 1.5 _ #{AB}]",
    ] {
        let first = engine.do_text(source).unwrap();
        let molded = engine.mold_value(&first);
        let second = engine.do_text(&molded).unwrap();
        let remolded = engine.mold_value(&second);
        assert_eq!(molded, remolded, "round-trip of {source:?}");
    }
}

#[test]
fn mold_of_cyclic_block_terminates() {
    let mut engine = Engine::new();
    let value = engine.do_text("a: [1]  append/only a a  a").unwrap();
    assert_eq!(engine.mold_value(&value), "[1 [...]]");
}

#[test]
fn copy_deep_preserves_shared_structure() {
    let mut engine = Engine::new();
    engine.do_text("inner: [1]  outer: reduce [inner inner]").unwrap();
    // Mutating through one alias of a deep copy must show through the
    // other alias: the copy maps each source node once.
    engine.do_text("c: copy/deep outer").unwrap();
    engine.do_text("append first c 2").unwrap();
    let value = engine.do_text("c").unwrap();
    assert_eq!(engine.mold_value(&value), "[[1 2] [1 2]]");
    // The original is untouched.
    let value = engine.do_text("outer").unwrap();
    assert_eq!(engine.mold_value(&value), "[[1] [1]]");
}

#[test]
fn symbols_compare_case_insensitively() {
    let mut engine = Engine::new();
    let value = engine.do_text("FOO: 3  foo").unwrap();
    assert_eq!(value.as_integer(), Some(3));
    let value = engine.do_text("equal? 'Bar 'bar").unwrap();
    assert_eq!(value.as_logic(), Some(true));
}

#[test]
fn keylist_cache_survives_context_growth() {
    let mut engine = Engine::new();
    engine.do_text("o: make object! [x: 1 y: 2]").unwrap();
    assert_eq!(engine.do_text("o/y").unwrap().as_integer(), Some(2));
    // Growing Lib (new set-words) between lookups must not disturb bound
    // words' cached indices.
    engine.do_text("zzz: 9  o/y: 5").unwrap();
    assert_eq!(engine.do_text("o/y").unwrap().as_integer(), Some(5));
}

#[test]
fn text_series_operations() {
    let mut engine = Engine::new();
    let value = engine.do_text(r#"s: "ab"  append s "cd"  s"#).unwrap();
    assert_eq!(engine.mold_value(&value), "\"abcd\"");
    assert_eq!(engine.do_text("length? s").unwrap().as_integer(), Some(4));
    let value = engine.do_text("pick s 2").unwrap();
    assert_eq!(engine.mold_value(&value), "#\"b\"");
}

#[test]
fn thrown_bit_never_escapes_do_text() {
    let mut engine = Engine::new();
    // Any value returned from the API has a clean header: throws either
    // caught inside or converted to no-catch failures at the boundary.
    let value = engine.do_text("catch [throw 42]").unwrap();
    assert!(!value.is_thrown());
    assert!(matches!(
        engine.do_text("throw 42"),
        Err(Raised::Error(_))
    ));
}
