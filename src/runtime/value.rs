//! Tagged runtime values

use std::fmt;
use std::rc::Rc;

use super::builtins::Builtin;
use crate::codegen::image::BlockId;

/// Index of a heap slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub(crate) u32);

impl Handle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Immutable string, either character- or byte-oriented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RString {
    bytes: Rc<[u8]>,
    byte_oriented: bool,
}

impl RString {
    pub fn new(bytes: impl Into<Rc<[u8]>>, byte_oriented: bool) -> Self {
        Self {
            bytes: bytes.into(),
            byte_oriented,
        }
    }

    pub fn chars(text: &str) -> Self {
        Self::new(text.as_bytes(), false)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_byte_oriented(&self) -> bool {
        self.byte_oriented
    }
}

/// Entry point of a closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Code {
    Block(BlockId),
    Builtin(Builtin),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Str(RString),
    Closure(Code, Option<Handle>),
    Object(Handle),
    /// Shared box of a captured, mutated variable
    Cell(Handle),
}

impl Value {
    pub fn str(text: &str) -> Self {
        Value::Str(RString::chars(text))
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Value::Closure(Code::Builtin(builtin), None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Nil => "Nil",
            Value::Str(s) if s.is_byte_oriented() => "Bytes",
            Value::Str(_) => "String",
            Value::Closure(..) => "Closure",
            Value::Object(_) => "Object",
            Value::Cell(_) => "Cell",
        }
    }

    /// Heap slot this value keeps alive, if any
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Value::Closure(_, env) => *env,
            Value::Object(h) | Value::Cell(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Str(s) if s.is_byte_oriented() => {
                write!(f, "b{:?}", String::from_utf8_lossy(s.bytes()))
            }
            Value::Str(s) => write!(f, "{}", String::from_utf8_lossy(s.bytes())),
            Value::Closure(Code::Block(id), _) => write!(f, "<closure {}>", id),
            Value::Closure(Code::Builtin(b), _) => write!(f, "<builtin {}>", b.name()),
            Value::Object(h) => write!(f, "<object {}>", h.0),
            Value::Cell(h) => write!(f, "<cell {}>", h.0),
        }
    }
}
