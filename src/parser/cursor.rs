//! Token stream cursor with lookahead and span tracking

use crate::ast::Span;
use crate::lexer::{SpannedToken, Token};

use super::error::{ParseError, ParseResult};

/// Cursor over lexed tokens with lookahead and backtracking
pub struct TokenCursor {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl TokenCursor {
    /// Start a cursor at the first token
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    // ========================================================================
    // Position and lookahead
    // ========================================================================

    /// Current token, `Eof` once the stream is exhausted
    pub fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    /// Token `n` positions ahead (0 = current)
    pub fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    /// Span of the current token
    pub fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.clone())
            .unwrap_or_default()
    }

    /// Span of the most recently consumed token
    pub fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.clone())
            .unwrap_or_default()
    }

    /// True when the current token starts exactly where the previous one ended
    pub fn is_adjacent(&self) -> bool {
        self.pos > 0 && self.previous_span().end == self.current_span().start
    }

    /// Whether only `Eof` remains
    pub fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Position to hand back to `restore` when backtracking
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Rewind to a position taken with `position`
    pub fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    // ========================================================================
    // Token consumption
    // ========================================================================

    /// Consume the current token and return it
    pub fn advance(&mut self) -> SpannedToken {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(SpannedToken {
            token: Token::Eof,
            span: self.previous_span(),
        });
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    /// Whether the current token equals `token`
    pub fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    /// Consume the current token if it equals `token`
    pub fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `expected` or fail with an unexpected-token error
    pub fn consume(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    /// Unexpected-token error at the current position
    pub fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::unexpected(expected, self.peek().clone(), self.current_span())
    }

    /// Skip expression separators (newlines and semicolons)
    pub fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon) {
            self.pos += 1;
        }
    }

    /// Skip newlines only; semicolons stay significant
    pub fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.pos += 1;
        }
    }

    // ========================================================================
    // Token predicates
    // ========================================================================

    /// Check if the current token could start a term
    pub fn is_term_start(&self) -> bool {
        matches!(
            self.peek(),
            Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Bytes(_)
                | Token::Ident(_)
                | Token::Operator(_)
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn cursor(input: &str) -> TokenCursor {
        TokenCursor::new(Lexer::new(input).tokenize().unwrap())
    }

    #[test]
    fn test_lookahead_and_backtracking() {
        let mut c = cursor("a b c");
        assert!(matches!(c.peek_nth(2), Token::Ident(s) if s == "c"));
        let pos = c.position();
        c.advance();
        c.advance();
        assert!(matches!(c.peek(), Token::Ident(s) if s == "c"));
        c.restore(pos);
        assert!(matches!(c.peek(), Token::Ident(s) if s == "a"));
    }

    #[test]
    fn test_adjacency() {
        let mut c = cursor("f(x) g (y)");
        c.advance();
        assert!(c.is_adjacent());
        c.advance();
        c.advance();
        c.advance();
        c.advance();
        assert!(!c.is_adjacent());
    }
}
