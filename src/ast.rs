//! Parsed expression trees handed to the lowering pass.
//!
//! A program is a sequence of [`Expression`]s. Every expression is either an
//! assignment (definition or mutation) or a bare [`Application`], and every
//! application is a list of [`Term`]s: a value decorated with trailing
//! [`Modifier`]s.

pub type Ident = String;

/// Byte range in the source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// 1-indexed line and column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets back to line:column positions for error reporting.
#[derive(Debug, Clone)]
pub struct SourceMap {
    source: String,
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                source
                    .char_indices()
                    .filter(|&(_, c)| c == '\n')
                    .map(|(i, _)| i + 1),
            )
            .collect();
        Self {
            source: source.to_string(),
            line_starts,
        }
    }

    pub fn position(&self, byte_offset: usize) -> Position {
        let offset = byte_offset.min(self.source.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        Position {
            line: line_idx + 1,
            column: self.source[line_start..offset].chars().count() + 1,
        }
    }

    /// Text of a 1-indexed line without its terminator
    pub fn line(&self, line_num: usize) -> Option<&str> {
        let idx = line_num.checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map_or(self.source.len(), |next| next - 1);
        Some(self.source[start..end].trim_end_matches('\r'))
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Assignment(Assignment),
    Application(Application),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    /// `x = ...` introduces a new local binding
    Definition,
    /// `x := ...`, `a.b := ...` or `a[i] := ...` updates an existing place
    Mutation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub kind: AssignKind,
    pub target: Term,
    pub value: Application,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub terms: Vec<Term>,
    pub span: Span,
}

impl Application {
    pub fn single(term: Term) -> Self {
        let span = term.span.clone();
        Self {
            terms: vec![term],
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub value: Value,
    pub modifiers: Vec<Modifier>,
    pub span: Span,
}

impl Term {
    pub fn new(value: Value, span: Span) -> Self {
        Self {
            value,
            modifiers: Vec::new(),
            span,
        }
    }

    /// True when the last modifier is the open-call marker
    pub fn is_open_call(&self) -> bool {
        matches!(self.modifiers.last(), Some(Modifier::OpenCall))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Ident),
    Integer(i64),
    Float(f64),
    Str { bytes: Vec<u8>, byte_oriented: bool },
    Function(FunctionLiteral),
    SubExpression(Box<Application>),
    Array(Vec<Application>),
    Dictionary(Vec<(DictKey, Application)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictKey {
    Name(Ident),
    Str(Vec<u8>),
}

impl DictKey {
    pub fn bytes(&self) -> &[u8] {
        match self {
            DictKey::Name(name) => name.as_bytes(),
            DictKey::Str(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Field(Ident),
    Index(Box<Application>),
    /// Curried call whose arguments are the neighbouring terms
    OpenCall,
    /// Call with a fully specified argument list
    Call(ArgList),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    pub left: Vec<Argument>,
    pub right: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Application),
    Named(Ident, Application),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub left: ParamList,
    pub right: ParamList,
    pub body: Vec<Expression>,
}

/// One side of a function's parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamList {
    pub required: Vec<Ident>,
    pub optional: Vec<(Ident, Application)>,
    pub arbitrary: Option<Ident>,
    pub keyword: Option<Ident>,
}

impl ParamList {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.optional.is_empty()
            && self.arbitrary.is_none()
            && self.keyword.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_map_positions() {
        let map = SourceMap::new("ab\ncd\n\nx");
        assert_eq!(map.position(0), Position { line: 1, column: 1 });
        assert_eq!(map.position(4), Position { line: 2, column: 2 });
        assert_eq!(map.position(7), Position { line: 4, column: 1 });
        assert_eq!(map.line(2), Some("cd"));
        assert_eq!(map.line(3), Some(""));
        assert_eq!(map.line(9), None);
    }

    #[test]
    fn test_open_call_marker_must_be_last() {
        let mut term = Term::new(Value::Variable("f".into()), Span::default());
        term.modifiers.push(Modifier::OpenCall);
        assert!(term.is_open_call());
        term.modifiers.push(Modifier::Field("x".into()));
        assert!(!term.is_open_call());
    }
}
