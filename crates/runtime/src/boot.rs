//! Boot tables
//!
//! The canon datatype and typeset words, the logic/blank singletons, the
//! native function table (name, spec source, dispatcher, enfix flag), and
//! the definitional RETURN/LEAVE paramlists. `install` consumes these at
//! engine creation, populating Lib and the dispatcher table.

use revel_core::{Cell, CellFlags, Kind, ListKind, ParamClass, WordKind, KIND_MAX};

use crate::engine::Engine;
use crate::function::{NativeFn, ParamInfo, DISPATCH_NATIVE_BASE, TS_VOIDABLE};
use crate::natives;

/// One native registration.
struct NativeSpec {
    name: &'static str,
    /// Spec block source, scanned at boot and parsed like a `func` spec.
    spec: &'static str,
    dispatch: NativeFn,
    enfix: bool,
}

const fn native(name: &'static str, spec: &'static str, dispatch: NativeFn) -> NativeSpec {
    NativeSpec {
        name,
        spec,
        dispatch,
        enfix: false,
    }
}

const fn operator(name: &'static str, spec: &'static str, dispatch: NativeFn) -> NativeSpec {
    NativeSpec {
        name,
        spec,
        dispatch,
        enfix: true,
    }
}

const NUMERIC2: &str = "value1 [integer! decimal!] value2 [integer! decimal!]";
const COMPARE2: &str = "value1 [integer! decimal! char! text!] value2 [integer! decimal! char! text!]";

static NATIVES: &[NativeSpec] = &[
    // math
    native("add", NUMERIC2, natives::math::native_add),
    native("subtract", NUMERIC2, natives::math::native_subtract),
    native("multiply", NUMERIC2, natives::math::native_multiply),
    native("divide", NUMERIC2, natives::math::native_divide),
    native("negate", "value [integer! decimal!]", natives::math::native_negate),
    operator("+", NUMERIC2, natives::math::native_add),
    operator("-", NUMERIC2, natives::math::native_subtract),
    operator("*", NUMERIC2, natives::math::native_multiply),
    operator("/", NUMERIC2, natives::math::native_divide),
    // comparison
    native("equal?", "value1 [any-value!] value2 [any-value!]", natives::math::native_equal),
    native("not-equal?", "value1 [any-value!] value2 [any-value!]", natives::math::native_not_equal),
    native("lesser?", COMPARE2, natives::math::native_lesser),
    native("greater?", COMPARE2, natives::math::native_greater),
    operator("=", "value1 [any-value!] value2 [any-value!]", natives::math::native_equal),
    operator("<>", "value1 [any-value!] value2 [any-value!]", natives::math::native_not_equal),
    operator("<", COMPARE2, natives::math::native_lesser),
    operator(">", COMPARE2, natives::math::native_greater),
    operator("<=", COMPARE2, natives::math::native_lesser_or_equal),
    operator(">=", COMPARE2, natives::math::native_greater_or_equal),
    native("not", "value [any-value!]", natives::math::native_not),
    // control flow
    native("if", "condition [any-value!] then-block [block!]", natives::control::native_if),
    native(
        "either",
        "condition [any-value!] then-block [block!] else-block [block!]",
        natives::control::native_either,
    ),
    native("while", "condition [block!] body [block!]", natives::control::native_while),
    native("loop", "count [integer!] body [block!]", natives::control::native_loop),
    native("all", "block [block!]", natives::control::native_all),
    native("any", "block [block!]", natives::control::native_any),
    native("catch", "block [block!] /name word [word!]", natives::control::native_catch),
    native("throw", "value [any-value!] /name word [word!]", natives::control::native_throw),
    native("trap", "block [block!]", natives::control::native_trap),
    native("attempt", "block [block!]", natives::control::native_attempt),
    native("fail", "reason [text! error!]", natives::control::native_fail),
    native("do", "value [block! group! text! any-value!]", natives::control::native_do),
    native("func", "spec [block!] body [block!]", natives::control::native_func),
    native("does", "body [block!]", natives::control::native_does),
    native("quit", "/return value [integer!]", natives::control::native_quit),
    native("recycle", "/off /on", natives::control::native_recycle),
    native("enfix", "'word [word! lit-word!]", natives::control::native_enfix),
    native("apply", "action [function! word!] args [block!]", natives::control::native_apply),
    native(
        "specialize",
        "'action [word! lit-word! function!] def [block!]",
        natives::control::native_specialize,
    ),
    // series
    native(
        "append",
        "series [block! group! text! binary!] value [any-value!] /part limit [integer!] /only /dup count [integer!]",
        natives::series::native_append,
    ),
    native("pick", "series [block! group! text! binary!] index [integer!]", natives::series::native_pick),
    native(
        "poke",
        "series [block! group!] index [integer!] value [any-value!]",
        natives::series::native_poke,
    ),
    native("first", "series [block! group! text! binary!]", natives::series::native_first),
    native("length?", "series [block! group! text! binary! map!]", natives::series::native_length_of),
    native("head", "series [block! group! text! binary!]", natives::series::native_head),
    native("copy", "value [any-value!] /deep", natives::series::native_copy),
    native("protect", "target [word! path! block! text! binary!]", natives::series::native_protect),
    native("unprotect", "target [word! path! block! text! binary!]", natives::series::native_unprotect),
    native("freeze", "target [block! group! text! binary!]", natives::series::native_freeze),
    native("select", "target [block! map!] key [any-value!]", natives::series::native_select),
    native("put", "target [map!] key [any-value!] value [any-value!]", natives::series::native_put),
    native("reduce", "block [block!]", natives::series::native_reduce),
    // values
    native("make", "type [datatype!] spec [any-value!]", natives::data::native_make),
    native("type-of", "value [any-value!]", natives::data::native_type_of),
    native("mold", "value [any-value!]", natives::data::native_mold),
    native("form", "value [any-value!]", natives::data::native_form),
    native("print", "value [any-value!]", natives::data::native_print),
    native("probe", "value [any-value!]", natives::data::native_probe),
    native("get", "word [word! path!]", natives::data::native_get),
    native("set", "word [word! path!] value [any-value!]", natives::data::native_set),
];

/// Populate a fresh engine: dispatcher table, datatypes, typesets, logic
/// words, definitional paramlists, then the native table.
pub(crate) fn install(engine: &mut Engine) {
    engine.dispatchers.push(natives::dispatch_user_body);
    engine.dispatchers.push(natives::dispatch_return);
    engine.dispatchers.push(natives::dispatch_leave);
    engine.dispatchers.push(natives::dispatch_specialized);
    debug_assert_eq!(engine.dispatchers.len(), DISPATCH_NATIVE_BASE as usize);

    install_datatypes(engine);
    install_typesets(engine);
    install_logic_words(engine);
    install_definitional_paramlists(engine);
    install_natives(engine);
}

fn set_lib_word(engine: &mut Engine, name: &str, value: Cell, enfix: bool) {
    let sym = engine.symbols.intern(name);
    let lib = engine.lib_context();
    let index = engine
        .append_to_context(lib, sym)
        .expect("lib expands during boot");
    engine
        .set_var_at(lib, index, &value)
        .expect("boot words are unprotected");
    if enfix {
        let mut slot = engine.var_at(lib, index);
        slot.flags |= CellFlags::ENFIXED;
        engine.heap.overwrite_cell(lib, index as usize, slot);
    }
}

fn install_datatypes(engine: &mut Engine) {
    for raw in 1..KIND_MAX {
        let kind = Kind::try_from(raw).expect("contiguous kind space");
        set_lib_word(engine, kind.name(), Cell::datatype(kind), false);
    }
}

fn install_typesets(engine: &mut Engine) {
    let any_word = Kind::Word.typeset_bit()
        | Kind::SetWord.typeset_bit()
        | Kind::GetWord.typeset_bit()
        | Kind::LitWord.typeset_bit()
        | Kind::Refinement.typeset_bit();
    let any_block = Kind::Block.typeset_bit()
        | Kind::Group.typeset_bit()
        | Kind::Path.typeset_bit()
        | Kind::SetPath.typeset_bit()
        | Kind::GetPath.typeset_bit()
        | Kind::LitPath.typeset_bit();
    let any_series = any_block | Kind::Text.typeset_bit() | Kind::Binary.typeset_bit();
    let any_value = crate::function::TS_ANY_VALUE;

    for (name, bits) in [
        ("any-value!", any_value),
        ("any-word!", any_word),
        ("any-block!", any_block),
        ("any-series!", any_series),
    ] {
        set_lib_word(engine, name, Cell::typeset(bits, None, ParamClass::Normal), false);
    }
}

fn install_logic_words(engine: &mut Engine) {
    for (name, value) in [
        ("true", Cell::logic(true)),
        ("false", Cell::logic(false)),
        ("yes", Cell::logic(true)),
        ("no", Cell::logic(false)),
        ("on", Cell::logic(true)),
        ("off", Cell::logic(false)),
        ("blank", Cell::blank()),
    ] {
        set_lib_word(engine, name, value, false);
    }
}

fn install_definitional_paramlists(engine: &mut Engine) {
    let value_sym = engine.symbols.intern("value");
    let return_params = [ParamInfo {
        sym: value_sym,
        class: ParamClass::Normal,
        bits: TS_VOIDABLE,
    }];
    engine.return_paramlist = engine
        .make_paramlist(&return_params)
        .expect("return paramlist allocates");
    let return_sym = engine.symbols.intern("return");
    let return_canon = Cell::word(WordKind::Word, return_sym);
    engine.heap.overwrite_cell(engine.return_paramlist, 0, return_canon);

    engine.leave_paramlist = engine.make_paramlist(&[]).expect("leave paramlist allocates");
    let leave_sym = engine.symbols.intern("leave");
    let leave_canon = Cell::word(WordKind::Word, leave_sym);
    engine.heap.overwrite_cell(engine.leave_paramlist, 0, leave_canon);
}

fn install_natives(engine: &mut Engine) {
    for spec in NATIVES {
        let params = if spec.spec.is_empty() {
            Vec::new()
        } else {
            let node = engine.load_text(spec.spec).expect("native spec scans");
            let block = Cell::list(ListKind::Block, node, 0);
            engine.parse_spec(&block).expect("native spec parses")
        };
        let paramlist = engine
            .make_paramlist(&params)
            .expect("native paramlist allocates");
        engine.dispatchers.push(spec.dispatch);
        let dispatcher = engine.dispatchers.len() as u32 - 1;
        let function = engine.finish_function(paramlist, Cell::blank(), dispatcher);
        set_lib_word(engine, spec.name, function, spec.enfix);
    }
}
