//! Property-based tests for the Duplex runtime and compiler
//!
//! These tests verify invariants that must hold for any input:
//! - Object copies share no storage with their source, arrays included
//! - Sealing freezes the key set but not the values
//! - Dynamic arrays agree with `Vec` and grow geometrically
//! - Value comparison is a total order
//! - CPS call counts follow from the IR, and compaction is idempotent and
//!   never changes what a program does

use std::cmp::Ordering;
use std::collections::BTreeMap;

use proptest::prelude::*;

use duplex::codegen::compact;
use duplex::pipeline::CompileOptions;
use duplex::runtime::ops::{compare, less_than};
use duplex::runtime::{DynArray, Object, Outcome, RString, Value};
use duplex::test_support::{cps, cps_compacted, lower, run_with};

// ============================================================================
// Generators
// ============================================================================

fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(b'a'..=b'f', 1..4)
}

fn arb_fields() -> impl Strategy<Value = Vec<(Vec<u8>, i64)>> {
    prop::collection::vec((arb_key(), -100i64..100), 0..40)
}

/// Comparable values; integers stay small so float conversion is exact
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1000i64..1000).prop_map(Value::Integer),
        (-1000.0f64..1000.0).prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Nil),
        ("[a-c]{0,3}", any::<bool>())
            .prop_map(|(s, bytes)| Value::Str(RString::new(s.into_bytes(), bytes))),
    ]
}

fn object_from(fields: &[(Vec<u8>, i64)]) -> Object {
    let mut object = Object::new();
    for (key, value) in fields {
        object.set(key, Value::Integer(*value));
    }
    object
}

fn snapshot(object: &Object) -> Vec<(Vec<u8>, Value)> {
    object
        .fields()
        .map(|(key, value)| (key.to_vec(), value.clone()))
        .collect()
}

/// Statement of a generated program, rendered over already-defined names
#[derive(Debug, Clone)]
enum Step {
    Define(i64),
    Add(usize, i64),
    Scale(i64),
    Apply(usize),
    Print(usize),
    Guard(usize),
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            (-50i64..50).prop_map(Step::Define),
            (any::<prop::sample::Index>(), -50i64..50)
                .prop_map(|(i, n)| Step::Add(i.index(usize::MAX), n)),
            (-5i64..5).prop_map(Step::Scale),
            any::<prop::sample::Index>().prop_map(|i| Step::Apply(i.index(usize::MAX))),
            any::<prop::sample::Index>().prop_map(|i| Step::Print(i.index(usize::MAX))),
            any::<prop::sample::Index>().prop_map(|i| Step::Guard(i.index(usize::MAX))),
        ],
        1..12,
    )
}

fn render_program(steps: &[Step]) -> String {
    let mut lines = vec!["x0 = 1".to_string()];
    let mut values = 1;
    let mut functions = 0;
    for step in steps {
        let (defined, known) = (values, functions);
        let line = match step {
            Step::Define(n) => {
                values += 1;
                format!("x{} = {}", defined, n)
            }
            Step::Add(i, n) => {
                values += 1;
                format!("x{} = x{} + {}", defined, i % defined, n)
            }
            Step::Scale(n) => {
                functions += 1;
                format!("f{} = {{ p, q = {} -> p * q }}", known, n)
            }
            Step::Apply(i) if known > 0 => {
                values += 1;
                format!("x{} = f{}' x{}", defined, i % known, i % defined)
            }
            Step::Apply(i) | Step::Print(i) => format!("print' x{}", i % defined),
            Step::Guard(i) => {
                let target = i % defined;
                format!("x{0} := if' (x{0} > 0) {{ x{0} - 1 }} {{ 0 }}", target)
            }
        };
        lines.push(line);
    }
    lines.push(format!("x{}", values - 1));
    lines.join("\n")
}

// ============================================================================
// Objects
// ============================================================================

proptest! {
    #[test]
    fn prop_fields_iterate_in_key_order(fields in arb_fields()) {
        let object = object_from(&fields);
        let model: BTreeMap<Vec<u8>, i64> = fields.into_iter().collect();
        let expected: Vec<(Vec<u8>, Value)> = model
            .into_iter()
            .map(|(k, v)| (k, Value::Integer(v)))
            .collect();
        prop_assert_eq!(snapshot(&object), expected);
    }

    #[test]
    fn prop_copy_is_independent(fields in arb_fields(), extra in arb_key()) {
        let original = object_from(&fields);
        let before = snapshot(&original);

        let mut copy = original.copy();
        prop_assert_eq!(snapshot(&copy), before.clone());
        for (key, _) in &fields {
            copy.set(key, Value::Nil);
        }
        copy.set(&extra, Value::Bool(true));

        prop_assert_eq!(snapshot(&original), before);
        prop_assert_eq!(original.get(&extra).is_some(), fields.iter().any(|(k, _)| *k == extra));
    }

    #[test]
    fn prop_seal_freezes_keys(fields in arb_fields(), key in arb_key(), value in -5i64..5) {
        let mut object = object_from(&fields);
        object.seal();
        let len = object.len();
        let existed = object.get(&key).is_some();

        prop_assert_eq!(object.set(&key, Value::Integer(value)), existed);
        prop_assert_eq!(object.len(), len);
        if existed {
            prop_assert_eq!(object.get(&key), Some(&Value::Integer(value)));
        }
        prop_assert!(object.copy().is_sealed());
    }
}

// ============================================================================
// Dynamic arrays
// ============================================================================

#[derive(Debug, Clone)]
enum ArrayOp {
    Push(i32),
    Pop,
    Insert(usize, i32),
    Remove(usize),
    Extend(Vec<i32>),
}

fn arb_array_op() -> impl Strategy<Value = ArrayOp> {
    prop_oneof![
        4 => any::<i32>().prop_map(ArrayOp::Push),
        1 => Just(ArrayOp::Pop),
        2 => (0usize..64, any::<i32>()).prop_map(|(i, x)| ArrayOp::Insert(i, x)),
        2 => (0usize..64).prop_map(ArrayOp::Remove),
        1 => prop::collection::vec(any::<i32>(), 0..20).prop_map(ArrayOp::Extend),
    ]
}

proptest! {
    #[test]
    fn prop_array_matches_vec(ops in prop::collection::vec(arb_array_op(), 0..200)) {
        let mut array = DynArray::new();
        let mut model = Vec::new();
        for op in ops {
            match op {
                ArrayOp::Push(x) => {
                    array.push(x);
                    model.push(x);
                }
                ArrayOp::Pop => prop_assert_eq!(array.pop(), model.pop()),
                ArrayOp::Insert(i, x) => {
                    let fits = i <= model.len();
                    prop_assert_eq!(array.insert(i, x), fits);
                    if fits {
                        model.insert(i, x);
                    }
                }
                ArrayOp::Remove(i) => {
                    let expected = (i < model.len()).then(|| model.remove(i));
                    prop_assert_eq!(array.remove(i), expected);
                }
                ArrayOp::Extend(items) => {
                    array.extend(items.clone());
                    model.extend(items);
                }
            }
            prop_assert!(array.capacity() >= array.len());
        }
        prop_assert_eq!(array.as_slice(), model.as_slice());
    }

    #[test]
    fn prop_pushes_resize_logarithmically(n in 1usize..5000) {
        let mut array = DynArray::new();
        for i in 0..n {
            array.push(i);
        }
        prop_assert_eq!(array.len(), n);
        let bits = (usize::BITS - n.leading_zeros()) as usize;
        prop_assert!(array.resizes() <= bits, "{} resizes for {} pushes", array.resizes(), n);
    }
}

/// Edit applied to a copied array from a program
#[derive(Debug, Clone)]
enum CopyEdit {
    Push(i64),
    Pop,
    Set(usize, i64),
    Insert(usize, i64),
    Remove(usize),
}

fn arb_copy_edit() -> impl Strategy<Value = CopyEdit> {
    prop_oneof![
        (0i64..100).prop_map(CopyEdit::Push),
        Just(CopyEdit::Pop),
        (any::<prop::sample::Index>(), 0i64..100)
            .prop_map(|(i, x)| CopyEdit::Set(i.index(usize::MAX), x)),
        (any::<prop::sample::Index>(), 0i64..100)
            .prop_map(|(i, x)| CopyEdit::Insert(i.index(usize::MAX), x)),
        any::<prop::sample::Index>().prop_map(|i| CopyEdit::Remove(i.index(usize::MAX))),
    ]
}

/// Program that copies `initial`, edits the copy, then prints both arrays.
/// Returns the source and the expected contents of the copy.
fn render_copy_program(initial: &[i64], edits: &[CopyEdit]) -> (String, Vec<i64>) {
    let items: Vec<String> = initial.iter().map(|x| x.to_string()).collect();
    let mut lines = vec![
        format!("xs = Array' {}", items.join(" ")),
        "ys = copy_object' xs".to_string(),
    ];
    let mut model = initial.to_vec();
    for edit in edits {
        let line = match edit {
            CopyEdit::Push(x) => {
                model.push(*x);
                format!("ys.push' {}", x)
            }
            CopyEdit::Insert(i, x) => {
                let at = i % (model.len() + 1);
                model.insert(at, *x);
                format!("ys.insert' {} {}", at, x)
            }
            _ if model.is_empty() => continue,
            CopyEdit::Pop => {
                model.pop();
                "ys.pop'".to_string()
            }
            CopyEdit::Set(i, x) => {
                let at = i % model.len();
                model[at] = *x;
                format!("ys[{}] := {}", at, x)
            }
            CopyEdit::Remove(i) => {
                let at = i % model.len();
                model.remove(at);
                format!("ys.remove' {}", at)
            }
        };
        lines.push(line);
    }
    for (name, len) in [("xs", initial.len()), ("ys", model.len())] {
        for i in 0..len {
            lines.push(format!("print' ({}[{}])", name, i));
        }
    }
    lines.push("xs.len'".to_string());
    (lines.join("\n"), model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_copied_array_is_independent(
        initial in prop::collection::vec(0i64..100, 0..8),
        edits in prop::collection::vec(arb_copy_edit(), 0..16),
    ) {
        let (source, model) = render_copy_program(&initial, &edits);
        let (outcome, output) = duplex::test_support::run(&source).unwrap();
        let expected: String = initial
            .iter()
            .chain(&model)
            .map(|x| format!("{}\n", x))
            .collect();
        prop_assert_eq!(outcome, Outcome::Exit(Value::Integer(initial.len() as i64)));
        prop_assert_eq!(output, expected);
    }
}

// ============================================================================
// Comparison
// ============================================================================

proptest! {
    #[test]
    fn prop_compare_is_antisymmetric(a in arb_value(), b in arb_value()) {
        let forward = compare(&a, &b).unwrap();
        let backward = compare(&b, &a).unwrap();
        prop_assert_eq!(forward, backward.reverse());
        prop_assert_eq!(less_than(&a, &b).unwrap(), forward == Ordering::Less);
    }

    #[test]
    fn prop_less_than_is_transitive(a in arb_value(), b in arb_value(), c in arb_value()) {
        if less_than(&a, &b).unwrap() && less_than(&b, &c).unwrap() {
            prop_assert!(less_than(&a, &c).unwrap());
        }
    }
}

// ============================================================================
// Compilation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_call_count_follows_ir(steps in arb_steps()) {
        let source = render_program(&steps);
        let block = lower(&source).unwrap();
        let (expr, _) = cps(&source).unwrap();
        prop_assert_eq!(expr.call_count(), block.call_count() + block.block_count());
    }

    #[test]
    fn prop_compaction_is_idempotent(steps in arb_steps()) {
        let source = render_program(&steps);
        let (plain, _) = cps(&source).unwrap();
        let (mut compacted, _) = cps_compacted(&source).unwrap();
        prop_assert!(compacted.call_count() <= plain.call_count());
        prop_assert_eq!(compact(&mut compacted), 0);
    }

    #[test]
    fn prop_compaction_preserves_behaviour(steps in arb_steps()) {
        let source = render_program(&steps);
        let plain = CompileOptions { optimize: false, ..CompileOptions::default() };
        let tight_gc = CompileOptions { gc_threshold: 2, ..CompileOptions::default() };
        let expected = run_with(&source, &plain).unwrap();
        prop_assert_eq!(run_with(&source, &CompileOptions::default()).unwrap(), expected.clone());
        prop_assert_eq!(run_with(&source, &tight_gc).unwrap(), expected);
    }
}
