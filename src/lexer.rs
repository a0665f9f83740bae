//! Handwritten lexer for duplex source text

use crate::ast::Span;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),

    Ident(String),
    /// Operator identifiers: + - * / % < > <= >= == !=
    Operator(String),

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Semicolon, // ;
    Newline,
    Colon,    // :
    Dot,      // .
    Quote,    // '
    Eq,       // =
    ColonEq,  // :=
    Arrow,    // ->
    Pipe,     // |
    StarStar, // **

    Eof,
}

impl Token {
    /// Tokens after which a `-` followed by a digit is a negative literal
    fn ends_value(&self) -> bool {
        matches!(
            self,
            Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Bytes(_)
                | Token::Ident(_)
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        )
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character: {0}")]
    UnexpectedChar(char, Span),
    #[error("unterminated string")]
    UnterminatedString(Span),
    #[error("invalid escape sequence: \\{0}")]
    InvalidEscape(char, Span),
    #[error("invalid number: {0}")]
    InvalidNumber(String, Span),
    #[error("unbalanced delimiter: {0}")]
    Unbalanced(char, Span),
}

impl LexError {
    pub fn span(&self) -> &Span {
        match self {
            LexError::UnexpectedChar(_, span)
            | LexError::UnterminatedString(span)
            | LexError::InvalidEscape(_, span)
            | LexError::InvalidNumber(_, span)
            | LexError::Unbalanced(_, span) => span,
        }
    }
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
    /// Open delimiters; newlines only separate expressions at the top level
    /// or directly inside a brace body.
    nesting: Vec<char>,
    last: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            pos: 0,
            nesting: Vec::new(),
            last: None,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.token == Token::Eof;
            self.last = Some(tok.token.clone());
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn newlines_significant(&self) -> bool {
        matches!(self.nesting.last(), None | Some('{'))
    }

    /// Skips blanks and comments; reports whether a significant newline was crossed
    fn skip_trivia(&mut self) -> bool {
        let mut saw_newline = false;
        while let Some(c) = self.peek() {
            if c == '\n' {
                saw_newline |= self.newlines_significant();
                self.advance();
            } else if c.is_whitespace() {
                self.advance();
            } else if c == '-' {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() != Some(&'-') {
                    break;
                }
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
        saw_newline
    }

    fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        let newline_start = self.pos;
        if self.skip_trivia() && !matches!(self.last, None | Some(Token::Newline)) {
            return Ok(SpannedToken {
                token: Token::Newline,
                span: Span::new(newline_start, self.pos),
            });
        }

        let start = self.pos;
        let Some(c) = self.advance() else {
            return Ok(SpannedToken {
                token: Token::Eof,
                span: Span::new(start, start),
            });
        };

        let token = match c {
            '(' | '[' | '{' => {
                self.nesting.push(c);
                match c {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                }
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if self.nesting.pop() != Some(expected) {
                    return Err(LexError::Unbalanced(c, Span::new(start, self.pos)));
                }
                match c {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                }
            }
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            '\'' => Token::Quote,
            ':' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::ColonEq
                } else {
                    Token::Colon
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator("==".into())
                } else {
                    Token::Eq
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator("!=".into())
                } else {
                    return Err(LexError::UnexpectedChar('!', Span::new(start, self.pos)));
                }
            }
            '<' | '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator(format!("{}=", c))
                } else {
                    Token::Operator(c.to_string())
                }
            }
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    Token::Arrow
                } else if self.peek().is_some_and(|d| d.is_ascii_digit())
                    && !self.last.as_ref().is_some_and(Token::ends_value)
                {
                    self.lex_number('-', start)?
                } else {
                    Token::Operator("-".into())
                }
            }
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    Token::StarStar
                } else {
                    Token::Operator("*".into())
                }
            }
            '+' | '/' | '%' => Token::Operator(c.to_string()),
            '|' => Token::Pipe,
            '"' => Token::Str(String::from_utf8_lossy(&self.lex_string(start)?).into_owned()),
            'b' if self.peek() == Some('"') => {
                self.advance();
                Token::Bytes(self.lex_string(start)?)
            }
            c if c.is_ascii_digit() => self.lex_number(c, start)?,
            c if c.is_alphabetic() || c == '_' => self.lex_ident(c),
            _ => return Err(LexError::UnexpectedChar(c, Span::new(start, self.pos))),
        };

        Ok(SpannedToken {
            token,
            span: Span::new(start, self.pos),
        })
    }

    fn lex_string(&mut self, start: usize) -> Result<Vec<u8>, LexError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(c) => {
                            return Err(LexError::InvalidEscape(c, Span::new(start, self.pos)))
                        }
                        None => {
                            return Err(LexError::UnterminatedString(Span::new(start, self.pos)))
                        }
                    };
                    s.push(escaped);
                }
                Some(c) => s.push(c),
                None => return Err(LexError::UnterminatedString(Span::new(start, self.pos))),
            }
        }
        Ok(s.into_bytes())
    }

    fn lex_number(&mut self, first: char, start: usize) -> Result<Token, LexError> {
        let mut s = String::new();
        s.push(first);
        self.take_digits(&mut s);

        // `1.5` is a float, `xs.1` style access is not supported so a dot
        // followed by a digit always continues the literal
        if self.peek() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                s.push('.');
                self.advance();
                self.take_digits(&mut s);
                let f: f64 = s
                    .parse()
                    .map_err(|_| LexError::InvalidNumber(s.clone(), Span::new(start, self.pos)))?;
                return Ok(Token::Float(f));
            }
        }

        let n: i64 = s
            .parse()
            .map_err(|_| LexError::InvalidNumber(s.clone(), Span::new(start, self.pos)))?;
        Ok(Token::Int(n))
    }

    fn take_digits(&mut self, s: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn lex_ident(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::Ident(s)
    }
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_basic() {
        assert_eq!(
            tokens("f = { x -> x + 1 }"),
            vec![
                Token::Ident("f".into()),
                Token::Eq,
                Token::LBrace,
                Token::Ident("x".into()),
                Token::Arrow,
                Token::Ident("x".into()),
                Token::Operator("+".into()),
                Token::Int(1),
                Token::RBrace,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_open_call_and_mutation() {
        assert_eq!(
            tokens("f' 4; x := 2"),
            vec![
                Token::Ident("f".into()),
                Token::Quote,
                Token::Int(4),
                Token::Semicolon,
                Token::Ident("x".into()),
                Token::ColonEq,
                Token::Int(2),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_newlines_inside_parens_are_ignored() {
        assert_eq!(
            tokens("a\n(b\nc)\n\nd"),
            vec![
                Token::Ident("a".into()),
                Token::Newline,
                Token::LParen,
                Token::Ident("b".into()),
                Token::Ident("c".into()),
                Token::RParen,
                Token::Newline,
                Token::Ident("d".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_negative_literal_vs_minus() {
        assert_eq!(
            tokens("x - 1"),
            vec![
                Token::Ident("x".into()),
                Token::Operator("-".into()),
                Token::Int(1),
                Token::Eof
            ]
        );
        assert_eq!(tokens("(-3)")[1], Token::Int(-3));
    }

    #[test]
    fn test_strings_and_comments() {
        assert_eq!(
            tokens("\"hi\\n\" b\"raw\" -- trailing\n2.5"),
            vec![
                Token::Str("hi\n".into()),
                Token::Bytes(b"raw".to_vec()),
                Token::Newline,
                Token::Float(2.5),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_unbalanced_delimiter() {
        let err = Lexer::new("(]").tokenize().unwrap_err();
        assert!(matches!(err, LexError::Unbalanced(']', _)));
    }
}
