//! Compile-time error types and terminal rendering
//!
//! Structural errors abort the current compilation unit; there is no
//! partial-result recovery. Runtime failures are not represented here: they
//! become values routed to the hidden object's `throw` handler (see
//! [`crate::runtime::RuntimeError`]), and only fatal machine conditions
//! surface as [`crate::runtime::Fault`].

use thiserror::Error;

use crate::ast::{SourceMap, Span};
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::runtime::Fault;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("more than one term in an application carries an open-call marker")]
    MultipleOpenCalls { span: Span },

    #[error("application of several terms has no open-call marker")]
    MissingOpenCall { span: Span },

    #[error("invalid assignment target")]
    InvalidAssignmentTarget { span: Span },

    #[error("unknown argument shape: {detail}")]
    UnknownArgumentShape { detail: &'static str, span: Span },

    #[error("unbound variable: {name}")]
    UnboundVariable { name: String },

    #[error("variable missing from every enclosing scope: {name}")]
    VarMissing { name: String },

    #[error("variable id read before annotation: {name}")]
    VaridUnset { name: String },
}

impl CompileError {
    pub fn span(&self) -> Option<&Span> {
        match self {
            CompileError::MultipleOpenCalls { span }
            | CompileError::MissingOpenCall { span }
            | CompileError::InvalidAssignmentTarget { span }
            | CompileError::UnknownArgumentShape { span, .. } => Some(span),
            CompileError::UnboundVariable { .. }
            | CompileError::VarMissing { .. }
            | CompileError::VaridUnset { .. } => None,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Any failure of the pipeline, from lexing to a fatal machine fault
#[derive(Error, Debug)]
pub enum Error {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("fatal: {0}")]
    Fault(#[from] Fault),
}

impl Error {
    pub fn span(&self) -> Option<&Span> {
        match self {
            Error::Lex(e) => Some(e.span()),
            Error::Parse(e) => Some(e.span()),
            Error::Compile(e) => e.span(),
            Error::Fault(_) => None,
        }
    }
}

/// ANSI color codes for terminal output
#[derive(Debug, Clone, Default)]
pub struct Colors {
    pub enabled: bool,
}

impl Colors {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn red(&self) -> &'static str {
        if self.enabled { "\x1b[31m" } else { "" }
    }

    pub fn cyan(&self) -> &'static str {
        if self.enabled { "\x1b[36m" } else { "" }
    }

    pub fn bold(&self) -> &'static str {
        if self.enabled { "\x1b[1m" } else { "" }
    }

    pub fn reset(&self) -> &'static str {
        if self.enabled { "\x1b[0m" } else { "" }
    }
}

/// Render an error with its location and the offending source line.
///
/// ```text
/// error: compile error: invalid assignment target
///  --> prog.dx:3:1
/// 3 | a b := 1
///     ^
/// ```
pub fn render_error(
    error: &Error,
    source_map: &SourceMap,
    filename: Option<&str>,
    colors: &Colors,
) -> String {
    let mut out = format!(
        "{}{}error{}: {}\n",
        colors.bold(),
        colors.red(),
        colors.reset(),
        error
    );
    let Some(span) = error.span() else {
        return out;
    };

    let start = source_map.position(span.start);
    let end = source_map.position(span.end);
    out.push_str(&format!(
        " {}-->{} {}:{}\n",
        colors.cyan(),
        colors.reset(),
        filename.unwrap_or("<input>"),
        start
    ));

    let line_text = source_map.line(start.line).unwrap_or("");
    let gutter = start.line.to_string();
    out.push_str(&format!(
        "{}{} |{} {}\n",
        colors.cyan(),
        gutter,
        colors.reset(),
        line_text
    ));
    let width = if start.line == end.line {
        end.column.saturating_sub(start.column).max(1)
    } else {
        1
    };
    out.push_str(&format!(
        "{}{}{}{}\n",
        " ".repeat(gutter.len() + 3 + start.column - 1),
        colors.red(),
        "^".repeat(width),
        colors.reset()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_points_at_span() {
        let source = "x = 1\na b := 2";
        let map = SourceMap::new(source);
        let err = Error::Compile(CompileError::InvalidAssignmentTarget {
            span: Span::new(6, 9),
        });
        let rendered = render_error(&err, &map, Some("t.dx"), &Colors::default());
        assert!(rendered.contains("invalid assignment target"));
        assert!(rendered.contains("t.dx:2:1"));
        assert!(rendered.contains("2 | a b := 2"));
        assert!(rendered.ends_with("    ^^^\n"));
    }

    #[test]
    fn test_render_without_span() {
        let map = SourceMap::new("y");
        let err = Error::Compile(CompileError::UnboundVariable { name: "y".into() });
        let rendered = render_error(&err, &map, None, &Colors::default());
        assert_eq!(rendered, "error: compile error: unbound variable: y\n");
    }
}
