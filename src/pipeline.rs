//! Source-to-outcome driver
//!
//! Every stage fully consumes its input before the next one starts. The
//! first error aborts the whole compilation.

use std::io::Write;

use tracing::debug;

use crate::codegen::{self, cps, ir, Image, VarIdGen};
use crate::errors::Error;
use crate::names::NameGen;
use crate::parser::parse_source;
use crate::runtime::{Machine, Outcome};

/// Allocations between collections unless configured otherwise
pub const DEFAULT_GC_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run call compaction
    pub optimize: bool,
    pub gc: bool,
    pub gc_threshold: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            gc: true,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

/// Parse and lower `source` to the statement IR
pub fn lower_source(source: &str) -> Result<ir::Block, Error> {
    let program = parse_source(source)?;
    let mut names = NameGen::new();
    let block = codegen::lower_program(&program, &mut names)?;
    debug!(
        statements = block.statements.len(),
        temporaries = names.issued(),
        "lowered"
    );
    Ok(block)
}

/// Lower, CPS-transform, check and annotate `source`; compact when
/// `options.optimize` is set
pub fn cps_source(
    source: &str,
    options: &CompileOptions,
) -> Result<(cps::Expression, codegen::Annotations), Error> {
    let block = lower_source(source)?;
    let mut expr = codegen::cps_transform(block);
    debug!(calls = expr.call_count(), "cps transformed");

    codegen::check_free_names(&expr)?;
    let mut ids = VarIdGen::new();
    let notes = codegen::annotate(&mut expr, &mut ids)?;
    debug!(
        varids = ids.issued(),
        boxed = notes.boxed.len(),
        "annotated"
    );

    if options.optimize {
        let before = expr.call_count();
        let removed = codegen::compact(&mut expr);
        debug!(before, after = expr.call_count(), removed, "compacted");
    }
    Ok((expr, notes))
}

/// Compile `source` into an executable image
pub fn compile(source: &str, options: &CompileOptions) -> Result<Image, Error> {
    let (expr, notes) = cps_source(source, options)?;
    Ok(codegen::generate(
        &expr,
        &notes,
        options.gc,
        options.gc_threshold,
    )?)
}

/// Compile and run `source`, writing program output to `output`
pub fn run<W: Write>(
    source: &str,
    options: &CompileOptions,
    output: W,
) -> Result<(Outcome, W), Error> {
    let image = compile(source, options)?;
    let mut machine = Machine::new(&image, output)?;
    let outcome = machine.run()?;
    Ok((outcome, machine.into_output()))
}

/// Compile and run `source`, capturing its output
pub fn run_source(source: &str, options: &CompileOptions) -> Result<(Outcome, Vec<u8>), Error> {
    run(source, options, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompileError;
    use crate::runtime::Value;

    #[test]
    fn test_unbound_name_is_rejected_before_annotation() {
        let err = compile("print' y", &CompileOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::UnboundVariable { ref name }) if name == "y"
        ));
    }

    #[test]
    fn test_optimize_does_not_change_results() {
        let source = "x = 3\ny = x * 2\nprint' x y\ny - 1";
        for optimize in [true, false] {
            let options = CompileOptions {
                optimize,
                ..CompileOptions::default()
            };
            let (outcome, out) = run_source(source, &options).unwrap();
            assert_eq!(outcome, Outcome::Exit(Value::Integer(5)));
            assert_eq!(out, b"3 6\n");
        }
    }
}
