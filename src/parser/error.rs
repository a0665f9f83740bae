//! Parser error types

use crate::ast::Span;
use crate::lexer::Token;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token: expected {expected}, found {found:?}")]
    UnexpectedToken {
        expected: String,
        found: Token,
        span: Span,
    },

    #[error("unexpected end of file")]
    UnexpectedEof { expected: String, last_span: Span },

    #[error("assignment target must be a single term")]
    CompoundTarget { span: Span },

    #[error("invalid parameter list")]
    InvalidParameters { span: Span },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::UnexpectedToken { span, .. } => span,
            ParseError::UnexpectedEof { last_span, .. } => last_span,
            ParseError::CompoundTarget { span } | ParseError::InvalidParameters { span } => span,
        }
    }

    pub fn unexpected(expected: impl Into<String>, found: Token, span: Span) -> Self {
        if found == Token::Eof {
            return ParseError::UnexpectedEof {
                expected: expected.into(),
                last_span: span,
            };
        }
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found,
            span,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
