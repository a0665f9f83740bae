//! Test support for inspecting the Duplex pipeline stage by stage.
//!
//! Tests should check not only what a program prints and returns, but also
//! the shape of the intermediate forms: how many statements lowering made,
//! which variables the annotator boxed, what compaction removed.

use crate::ast::Expression;
use crate::codegen::cps;
use crate::codegen::ir;
use crate::codegen::{Annotations, Image};
use crate::parser::parse_source;
use crate::pipeline::{self, CompileOptions};
use crate::runtime::{Outcome, Value};

// ============================================================================
// Pipeline Inspection
// ============================================================================

/// Parse a program and return its expressions
pub fn parse_program(input: &str) -> Result<Vec<Expression>, String> {
    parse_source(input).map_err(|e| format!("Parse error: {}", e))
}

/// Lower a program to the statement IR
pub fn lower(input: &str) -> Result<ir::Block, String> {
    pipeline::lower_source(input).map_err(|e| format!("Lower error: {}", e))
}

/// CPS-transform and annotate a program without compaction
pub fn cps(input: &str) -> Result<(cps::Expression, Annotations), String> {
    let options = CompileOptions {
        optimize: false,
        ..CompileOptions::default()
    };
    pipeline::cps_source(input, &options).map_err(|e| format!("CPS error: {}", e))
}

/// CPS-transform, annotate and compact a program
pub fn cps_compacted(input: &str) -> Result<(cps::Expression, Annotations), String> {
    pipeline::cps_source(input, &CompileOptions::default())
        .map_err(|e| format!("CPS error: {}", e))
}

/// Compile a program to an image with default options
pub fn image(input: &str) -> Result<Image, String> {
    pipeline::compile(input, &CompileOptions::default()).map_err(|e| format!("Compile error: {}", e))
}

// ============================================================================
// Running Programs
// ============================================================================

/// Run a program, returning its outcome and everything it printed
pub fn run(input: &str) -> Result<(Outcome, String), String> {
    run_with(input, &CompileOptions::default())
}

pub fn run_with(input: &str, options: &CompileOptions) -> Result<(Outcome, String), String> {
    let (outcome, output) =
        pipeline::run_source(input, options).map_err(|e| format!("Run error: {}", e))?;
    Ok((outcome, String::from_utf8_lossy(&output).into_owned()))
}

/// Printed output of a program that must exit normally
pub fn output_of(input: &str) -> String {
    match run(input) {
        Ok((Outcome::Exit(_), output)) => output,
        Ok((outcome, output)) => panic!(
            "Expected normal exit for: {}\nOutcome: {:?}\nOutput: {}",
            input, outcome, output
        ),
        Err(e) => panic!("Run failed for: {}\nError: {}", input, e),
    }
}

// ============================================================================
// Value Assertions
// ============================================================================

/// Assert that a program exits with a specific value
pub fn assert_exit_value(input: &str, expected: Value) {
    match run(input) {
        Ok((Outcome::Exit(actual), _)) => assert_eq!(
            actual, expected,
            "Value mismatch for: {}\nExpected: {:?}\nActual: {:?}",
            input, expected, actual
        ),
        Ok((outcome, _)) => panic!(
            "Expected exit with {:?} for: {}\nOutcome: {:?}",
            expected, input, outcome
        ),
        Err(e) => panic!(
            "Run failed for: {}\nExpected: {:?}\nError: {}",
            input, expected, e
        ),
    }
}

pub fn assert_exit_int(input: &str, expected: i64) {
    assert_exit_value(input, Value::Integer(expected));
}

/// Assert that an exception reaches the top level, checking its message
pub fn assert_uncaught<F>(input: &str, check: F)
where
    F: FnOnce(&Value) -> bool,
{
    match run(input) {
        Ok((Outcome::Uncaught(exception), _)) => assert!(
            check(&exception),
            "Exception mismatch for: {}\nActual: {:?}",
            input,
            exception
        ),
        Ok((outcome, _)) => panic!(
            "Expected an uncaught exception for: {}\nOutcome: {:?}",
            input, outcome
        ),
        Err(e) => panic!("Run failed for: {}\nError: {}", input, e),
    }
}

/// Assert that compilation fails, checking the error message
pub fn assert_compile_error(input: &str, fragment: &str) {
    match pipeline::compile(input, &CompileOptions::default()) {
        Ok(_) => panic!("Expected compile error for: {}", input),
        Err(e) => assert!(
            e.to_string().contains(fragment),
            "Error mismatch for: {}\nExpected fragment: {}\nActual: {}",
            input,
            fragment,
            e
        ),
    }
}

// ============================================================================
// Test Macros
// ============================================================================

/// Macro for asserting a program exits with an integer
#[macro_export]
macro_rules! assert_exits_with {
    ($input:expr, $expected:expr) => {
        $crate::test_support::assert_exit_int($input, $expected)
    };
}

/// Macro for asserting a program's printed output
#[macro_export]
macro_rules! assert_prints {
    ($input:expr, $expected:expr) => {
        assert_eq!($crate::test_support::output_of($input), $expected)
    };
}
