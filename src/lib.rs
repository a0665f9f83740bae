//! Duplex - a small language with two-sided argument lists, compiled
//! through continuation-passing style to a trampolined image

pub mod ast;
pub mod codegen;
pub mod errors;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod pipeline;
pub mod runtime;
pub mod test_support;

pub use ast::{Position, SourceMap, Span};
pub use errors::{render_error, Colors, CompileError, Error};
pub use lexer::Lexer;
pub use parser::Parser;
pub use pipeline::{compile, run, run_source, CompileOptions};
pub use runtime::{ExitStatus, Machine, Outcome, Value};
