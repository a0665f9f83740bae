//! End-to-end Tests
//!
//! Source text in, outcome and printed output out, through the whole
//! pipeline and the machine.

use pretty_assertions::assert_eq;

use duplex::pipeline::CompileOptions;
use duplex::runtime::{ExitStatus, Outcome, Value};
use duplex::test_support::{
    assert_exit_int, assert_exit_value, assert_uncaught, output_of, run, run_with,
};
use duplex::{assert_exits_with, assert_prints};

fn message_contains(fragment: &'static str) -> impl Fn(&Value) -> bool {
    move |value| match value {
        Value::Str(s) => String::from_utf8_lossy(s.bytes()).contains(fragment),
        _ => false,
    }
}

// ============================================================================
// Basics
// ============================================================================

#[test]
fn last_expression_is_the_exit_value() {
    assert_exits_with!("f = { x -> x + 1 }; f' 4", 5);
    assert_exit_value("", Value::Nil);
    assert_exit_value("\"done\"", Value::str("done"));
}

#[test]
fn arithmetic_and_comparison() {
    assert_exit_int("(7 - 2) * 3", 15);
    assert_exit_int("-7 / 2", -3);
    assert_exit_int("17 % 5", 2);
    assert_exit_value("1.5 + 1", Value::Float(2.5));
    assert_exit_value("\"ab\" + \"cd\"", Value::str("abcd"));
    assert_exit_value("1 < 2", Value::Bool(true));
    assert_exit_value("3 >= 3", Value::Bool(true));
    assert_exit_value("2 <= 1", Value::Bool(false));
    assert_exit_value("1 != 2", Value::Bool(true));
    assert_exit_value("\"b\" > \"a\"", Value::Bool(true));
    assert_exit_value("2 == 2.0", Value::Bool(true));
}

#[test]
fn print_renders_space_separated_lines() {
    assert_prints!("print' 1 2.5 \"hi\" true\nprint' b\"xy\"", "1 2.5 hi true\nxy\n");
    assert_prints!("x = print' 1\nprint' x", "1\nnil\n");
}

#[test]
fn comments_and_separators() {
    let source = "-- leading comment\n\
                  a = 1; b = 2 -- trailing comment\n\
                  \n\
                  a + b";
    assert_exit_int(source, 3);
}

// ============================================================================
// Functions and closures
// ============================================================================

#[test]
fn left_and_right_parameters() {
    assert_exit_int("f = { a | b -> a - b }\n10 f' 3", 7);
    assert_exit_int("f = { a | b -> a - b }\nf(10; 3)", 7);
}

#[test]
fn optional_parameters_use_defaults() {
    assert_exit_int("f = { a, b = 10 -> a + b }\nf' 1", 11);
    assert_exit_int("f = { a, b = 10 -> a + b }\nf' 1 2", 3);
}

#[test]
fn defaults_are_evaluated_when_the_closure_is_made() {
    assert_exit_int("d = 1\nf = { x = d -> x }\nd := 2\nf'", 1);
}

#[test]
fn rest_and_keyword_parameters() {
    assert_exit_int("f = { *xs -> xs.len' }\nf' 1 2 3", 3);
    assert_exit_int("f = { a, *xs -> xs[0] }\nf' 1 2 3", 2);
    assert_exit_int("f = { **kw -> kw.size }\nf(size: 5)", 5);
}

#[test]
fn counter_closure_shares_its_cell() {
    let source = "make = { n = 0; { n := n + 1; n } }\n\
                  c = make'\n\
                  c'\n\
                  c'\n\
                  c'";
    assert_exit_int(source, 3);
}

#[test]
fn mutation_is_visible_to_every_closure() {
    assert_exit_int("n = 0\nbump = { n := n + 1 }\nbump'\nbump'\nn", 2);
    assert_exit_int("x = 1\nget = { x }\nx := 9\nget'", 9);
}

#[test]
fn separate_closures_get_separate_cells() {
    let source = "make = { n = 0; { n := n + 1; n } }\n\
                  a = make'\n\
                  b = make'\n\
                  a'\n\
                  a'\n\
                  b'";
    assert_exit_int(source, 1);
}

#[test]
fn recursion_through_the_defined_name() {
    let source = "fact = { n -> if' (n < 2) { 1 } { n * (fact' (n - 1)) } }\nfact' 10";
    assert_exit_int(source, 3628800);
}

#[test]
fn deep_recursion_does_not_grow_the_host_stack() {
    let source = "count = { n -> if' (n > 0) { count' (n - 1) } { n } }\ncount' 100000";
    assert_exit_int(source, 0);
}

// ============================================================================
// Control flow and exceptions
// ============================================================================

#[test]
fn if_without_else_yields_nil() {
    assert_exit_value("if' false { 1 }", Value::Nil);
    assert_exit_int("if' 0 { 1 } { 2 }", 2);
    assert_exit_int("if' \"\" { 1 } { 2 }", 1);
}

#[test]
fn try_catches_thrown_values() {
    assert_exit_int("r = try' { throw' 41 } { e -> e + 1 }\nr", 42);
    assert_exit_int("try' { 5 } { e -> 0 }", 5);
}

#[test]
fn code_after_throw_does_not_run() {
    let source = "try' { print' 1; throw' 2; print' 3 } { e -> print' e }";
    assert_eq!(output_of(source), "1\n2\n");
}

#[test]
fn runtime_errors_become_exceptions() {
    let (outcome, _) = run("try' { 1 / 0 } { e -> e }").unwrap();
    let Outcome::Exit(value) = outcome else {
        panic!("expected a normal exit, got {:?}", outcome);
    };
    assert!(message_contains("division by zero")(&value));
}

#[test]
fn nested_try_rethrows_to_the_outer_handler() {
    let source = "try' { try' { throw' 1 } { e -> throw' (e + 1) } } { e -> e * 10 }";
    assert_exit_int(source, 20);
}

#[test]
fn uncaught_exceptions_end_the_program() {
    assert_uncaught("throw' 7", |v| *v == Value::Integer(7));
    assert_uncaught("1 + \"a\"", message_contains("unsupported operation"));
    assert_uncaught("f = { a -> a }\nf' 1 2", message_contains("arity mismatch"));
    assert_uncaught("f = { a -> a }\nf(1, k: 2)", message_contains("named"));
    assert_uncaught("x = 1\nx' 2", message_contains("not callable"));
    assert_uncaught("print' (new_object')", message_contains("cannot print"));
}

#[test]
fn exit_status_follows_the_outcome() {
    let status = |source: &str| ExitStatus::from_outcome(&run(source).unwrap().0).code();
    assert_eq!(status("3"), 3);
    assert_eq!(status("print' 1"), 0);
    assert_eq!(status("false"), 1);
    assert_eq!(status("throw' 0"), 1);
}

// ============================================================================
// Objects and arrays
// ============================================================================

#[test]
fn object_fields() {
    assert_exit_int("o = [a: 1, b: 2]\no.a + o.b", 3);
    assert_exit_int("o = [:]\no.c := 3\no[\"c\"]", 3);
    assert_exit_int("o = new_object'\no[1] := 4\no[1]", 4);
    assert_uncaught("o = [:]\no.missing", message_contains("missing field"));
}

#[test]
fn sealed_objects_keep_their_keys() {
    let base = "o = [x: 1]\nseal_object' o\n";
    assert_exit_int(&format!("{}o.x := 2\no.x", base), 2);
    assert_uncaught(&format!("{}o.y := 2", base), message_contains("sealed"));
}

#[test]
fn copied_objects_are_independent() {
    assert_exit_int("o = [a: 1]\np = copy_object' o\np.a := 2\no.a", 1);
    assert_exit_int("o = [a: 1]\np = copy_object' o\np.a := 2\np.a", 2);
    let sealed = "o = seal_object' [a: 1]\np = copy_object' o\np.b := 2";
    assert_uncaught(sealed, message_contains("sealed"));
}

#[test]
fn array_indexing_and_methods() {
    assert_exit_int("xs = [1, 2, 3]\nxs[1]", 2);
    assert_exit_int("xs = [1, 2, 3]\nxs[1] := 9\nxs[1]", 9);
    assert_exit_int("xs = [1, 2, 3]\nxs.push' 4 5\nxs.len'", 5);
    assert_exit_int("xs = [1, 2, 3]\nxs.pop'", 3);
    assert_exit_int("xs = [1, 2, 3]\nxs.insert' 0 7\nxs[0]", 7);
    assert_exit_int("xs = [1, 2, 3]\nxs.remove' 1", 2);
    assert_exit_int("xs = [1]\nxs.extend' [2, 3]\nxs[2]", 3);
    assert_exit_int("xs = Array' 1 2\nxs.len'", 2);
}

#[test]
fn copied_arrays_are_independent() {
    let base = "xs = Array' 1 2\nys = copy_object' xs\nys.push' 3\nys[0] := 9\n";
    assert_exit_int(&format!("{}xs.len'", base), 2);
    assert_exit_int(&format!("{}xs[0]", base), 1);
    assert_exit_int(&format!("{}ys.len'", base), 3);
    assert_exit_int(&format!("{}ys[0]", base), 9);
    assert_exit_int(&format!("{}xs.pop'\nys.len'", base), 3);
    assert_exit_int("xs = [1]\nxs.len := { 7 }\nys = copy_object' xs\nys.len'", 7);
}

#[test]
fn array_errors() {
    assert_uncaught("xs = [1]\nxs[3]", message_contains("out of bounds"));
    assert_uncaught("xs = [1]\nxs.pop'\nxs.pop'", message_contains("out of bounds"));
    assert_uncaught("xs = [1]\nxs.size := 1", message_contains("sealed"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn results_do_not_depend_on_optimization_or_collection() {
    let source = "make = { n = 0; { n := n + 1; [n, n] } }\n\
                  c = make'\n\
                  loop = { i -> if' (i > 0) { c'; loop' (i - 1) } }\n\
                  loop' 500\n\
                  (c')[0]";
    for (optimize, gc, gc_threshold) in [(true, true, 16), (false, true, 1), (true, false, 16)] {
        let options = CompileOptions {
            optimize,
            gc,
            gc_threshold,
        };
        let (outcome, _) = run_with(source, &options).unwrap();
        assert_eq!(outcome, Outcome::Exit(Value::Integer(501)));
    }
}
