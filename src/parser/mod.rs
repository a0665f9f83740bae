//! Recursive descent parser for duplex
//!
//! Produces the expression trees consumed by lowering: a program is a list
//! of expressions, an expression is an assignment or an application, and an
//! application is a run of terms with trailing modifiers.
//!
//! - `cursor` - Token stream navigation and lookahead
//! - `error` - Error types with source location tracking

pub mod cursor;
pub mod error;

pub use cursor::TokenCursor;
pub use error::{ParseError, ParseResult};

use crate::ast::*;
use crate::lexer::{SpannedToken, Token};

pub struct Parser {
    cursor: TokenCursor,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
        }
    }

    /// Parse a whole program
    pub fn parse_program(&mut self) -> ParseResult<Vec<Expression>> {
        let body = self.parse_body()?;
        if !self.cursor.is_at_end() {
            return Err(self.cursor.unexpected("end of input"));
        }
        Ok(body)
    }

    /// Parse separated expressions until a closing brace or end of input
    fn parse_body(&mut self) -> ParseResult<Vec<Expression>> {
        let mut body = Vec::new();
        self.cursor.skip_separators();
        while !matches!(self.cursor.peek(), Token::RBrace | Token::Eof) {
            body.push(self.parse_expression()?);
            if !matches!(
                self.cursor.peek(),
                Token::Newline | Token::Semicolon | Token::RBrace | Token::Eof
            ) {
                return Err(self.cursor.unexpected("end of expression"));
            }
            self.cursor.skip_separators();
        }
        Ok(body)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let lhs = self.parse_application()?;
        let kind = match self.cursor.peek() {
            Token::Eq => AssignKind::Definition,
            Token::ColonEq => AssignKind::Mutation,
            _ => return Ok(Expression::Application(lhs)),
        };
        self.cursor.advance();
        if lhs.terms.len() != 1 {
            return Err(ParseError::CompoundTarget { span: lhs.span });
        }
        let value = self.parse_application()?;
        let span = lhs.span.merge(&value.span);
        let target = lhs.terms.into_iter().next().ok_or_else(|| {
            ParseError::CompoundTarget {
                span: span.clone(),
            }
        })?;
        Ok(Expression::Assignment(Assignment {
            kind,
            target,
            value,
            span,
        }))
    }

    pub fn parse_application(&mut self) -> ParseResult<Application> {
        let start = self.cursor.current_span();
        let mut terms = Vec::new();
        while self.cursor.is_term_start() {
            terms.push(self.parse_term()?);
        }
        if terms.is_empty() {
            return Err(self.cursor.unexpected("a term"));
        }
        mark_operator_call(&mut terms);
        let span = start.merge(&self.cursor.previous_span());
        Ok(Application { terms, span })
    }

    fn parse_term(&mut self) -> ParseResult<Term> {
        let start = self.cursor.current_span();
        let value = self.parse_value()?;
        let mut term = Term::new(value, start.clone());
        loop {
            match self.cursor.peek() {
                Token::Dot => {
                    self.cursor.advance();
                    match self.cursor.advance().token {
                        Token::Ident(name) => term.modifiers.push(Modifier::Field(name)),
                        found => {
                            return Err(ParseError::unexpected(
                                "field name",
                                found,
                                self.cursor.previous_span(),
                            ))
                        }
                    }
                }
                Token::Quote => {
                    self.cursor.advance();
                    term.modifiers.push(Modifier::OpenCall);
                }
                Token::LBracket if self.cursor.is_adjacent() => {
                    self.cursor.advance();
                    let index = self.parse_application()?;
                    self.cursor.consume(Token::RBracket)?;
                    term.modifiers.push(Modifier::Index(Box::new(index)));
                }
                Token::LParen if self.cursor.is_adjacent() => {
                    self.cursor.advance();
                    let args = self.parse_arg_list()?;
                    self.cursor.consume(Token::RParen)?;
                    term.modifiers.push(Modifier::Call(args));
                }
                _ => break,
            }
        }
        term.span = start.merge(&self.cursor.previous_span());
        Ok(term)
    }

    fn parse_value(&mut self) -> ParseResult<Value> {
        let tok = self.cursor.advance();
        match tok.token {
            Token::Ident(name) | Token::Operator(name) => Ok(Value::Variable(name)),
            Token::Int(n) => Ok(Value::Integer(n)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::Str(s) => Ok(Value::Str {
                bytes: s.into_bytes(),
                byte_oriented: false,
            }),
            Token::Bytes(bytes) => Ok(Value::Str {
                bytes,
                byte_oriented: true,
            }),
            Token::LParen => {
                let inner = self.parse_application()?;
                self.cursor.consume(Token::RParen)?;
                Ok(Value::SubExpression(Box::new(inner)))
            }
            Token::LBracket => self.parse_collection(),
            Token::LBrace => {
                let func = self.parse_function()?;
                self.cursor.consume(Token::RBrace)?;
                Ok(Value::Function(func))
            }
            found => Err(ParseError::unexpected("a value", found, tok.span)),
        }
    }

    /// Array `[a, b]` or dictionary `[k: v]` literal, after the opening bracket
    fn parse_collection(&mut self) -> ParseResult<Value> {
        if self.cursor.match_token(&Token::RBracket) {
            return Ok(Value::Array(Vec::new()));
        }
        if self.cursor.check(&Token::Colon) && self.cursor.peek_nth(1) == &Token::RBracket {
            self.cursor.advance();
            self.cursor.advance();
            return Ok(Value::Dictionary(Vec::new()));
        }

        let is_dict = matches!(self.cursor.peek(), Token::Ident(_) | Token::Str(_))
            && self.cursor.peek_nth(1) == &Token::Colon;
        if is_dict {
            let mut entries = Vec::new();
            loop {
                let key = match self.cursor.advance() {
                    SpannedToken {
                        token: Token::Ident(name),
                        ..
                    } => DictKey::Name(name),
                    SpannedToken {
                        token: Token::Str(s),
                        ..
                    } => DictKey::Str(s.into_bytes()),
                    other => {
                        return Err(ParseError::unexpected(
                            "dictionary key",
                            other.token,
                            other.span,
                        ))
                    }
                };
                self.cursor.consume(Token::Colon)?;
                entries.push((key, self.parse_application()?));
                if !self.cursor.match_token(&Token::Comma) {
                    break;
                }
            }
            self.cursor.consume(Token::RBracket)?;
            return Ok(Value::Dictionary(entries));
        }

        let mut items = vec![self.parse_application()?];
        while self.cursor.match_token(&Token::Comma) {
            items.push(self.parse_application()?);
        }
        self.cursor.consume(Token::RBracket)?;
        Ok(Value::Array(items))
    }

    /// Function literal body after the opening brace: `params -> body` or `body`
    fn parse_function(&mut self) -> ParseResult<FunctionLiteral> {
        self.cursor.skip_newlines();
        let checkpoint = self.cursor.position();
        let (left, right) = match self.try_parse_params() {
            Some(params) => params,
            None => {
                self.cursor.restore(checkpoint);
                (ParamList::default(), ParamList::default())
            }
        };
        let body = self.parse_body()?;
        Ok(FunctionLiteral { left, right, body })
    }

    /// Returns `None` (leaving the cursor wherever it stopped) when the brace
    /// does not start with a parameter list terminated by `->`.
    fn try_parse_params(&mut self) -> Option<(ParamList, ParamList)> {
        let first = self.parse_param_list().ok()?;
        let (left, right) = if self.cursor.match_token(&Token::Pipe) {
            let right = self.parse_param_list().ok()?;
            (first, right)
        } else {
            (ParamList::default(), first)
        };
        if !self.cursor.match_token(&Token::Arrow) {
            return None;
        }
        Some((left, right))
    }

    fn parse_param_list(&mut self) -> ParseResult<ParamList> {
        let mut params = ParamList::default();
        loop {
            match self.cursor.peek().clone() {
                Token::Ident(name) => {
                    self.cursor.advance();
                    if self.cursor.match_token(&Token::Eq) {
                        let default = self.parse_application()?;
                        params.optional.push((name, default));
                    } else if params.optional.is_empty() && params.arbitrary.is_none() {
                        params.required.push(name);
                    } else {
                        return Err(ParseError::InvalidParameters {
                            span: self.cursor.previous_span(),
                        });
                    }
                }
                Token::Operator(op) if op == "*" => {
                    self.cursor.advance();
                    let name = self.expect_param_name()?;
                    if params.arbitrary.replace(name).is_some() {
                        return Err(ParseError::InvalidParameters {
                            span: self.cursor.previous_span(),
                        });
                    }
                }
                Token::StarStar => {
                    self.cursor.advance();
                    let name = self.expect_param_name()?;
                    if params.keyword.replace(name).is_some() {
                        return Err(ParseError::InvalidParameters {
                            span: self.cursor.previous_span(),
                        });
                    }
                }
                _ => break,
            }
            if !self.cursor.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn expect_param_name(&mut self) -> ParseResult<Ident> {
        let tok = self.cursor.advance();
        match tok.token {
            Token::Ident(name) => Ok(name),
            found => Err(ParseError::unexpected("parameter name", found, tok.span)),
        }
    }

    /// Arguments inside `( ... )`: `right, ...` or `left, ...; right, ...`
    fn parse_arg_list(&mut self) -> ParseResult<ArgList> {
        let mut args = ArgList::default();
        if self.cursor.check(&Token::RParen) {
            return Ok(args);
        }
        let first = self.parse_args()?;
        if self.cursor.match_token(&Token::Semicolon) {
            args.left = first;
            if !self.cursor.check(&Token::RParen) {
                args.right = self.parse_args()?;
            }
        } else {
            args.right = first;
        }
        Ok(args)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Argument>> {
        let mut args = Vec::new();
        loop {
            let named = match (self.cursor.peek(), self.cursor.peek_nth(1)) {
                (Token::Ident(name), Token::Colon) => Some(name.clone()),
                _ => None,
            };
            match named {
                Some(name) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    args.push(Argument::Named(name, self.parse_application()?));
                }
                None => args.push(Argument::Positional(self.parse_application()?)),
            }
            if !self.cursor.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(args)
    }
}

/// Operators written between their operands carry an implicit open-call
/// marker when nothing else in the application is marked.
fn mark_operator_call(terms: &mut [Term]) {
    if terms.len() < 2 || terms.iter().any(Term::is_open_call) {
        return;
    }
    let operator = terms.iter_mut().find(|term| {
        term.modifiers.is_empty()
            && matches!(&term.value, Value::Variable(name) if is_operator_name(name))
    });
    if let Some(term) = operator {
        term.modifiers.push(Modifier::OpenCall);
    }
}

pub fn is_operator_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| !c.is_alphanumeric() && c != '_')
}

/// Lex and parse a source string
pub fn parse_source(source: &str) -> Result<Vec<Expression>, crate::Error> {
    let tokens = crate::lexer::Lexer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse_program()?)
}
