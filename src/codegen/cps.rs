//! Continuation-passing style graph
//!
//! Every call names what happens next: its continuation is a [`Callable`]
//! (or a variable holding one) and no call returns. The tree is uniquely
//! owned; variables refer to each other by name and, after annotation, by
//! [`VarId`].

use std::fmt;

use crate::errors::{CompileError, CompileResult};
use crate::names::Name;

pub type VarId = u32;

/// A binding or use site. The id is assigned once by the annotator.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Name,
    varid: Option<VarId>,
}

impl Variable {
    pub fn new(name: Name) -> Self {
        Self { name, varid: None }
    }

    pub fn varid(&self) -> CompileResult<VarId> {
        self.varid.ok_or_else(|| CompileError::VaridUnset {
            name: self.name.to_string(),
        })
    }

    pub fn is_annotated(&self) -> bool {
        self.varid.is_some()
    }

    pub(crate) fn set_varid(&mut self, id: VarId) {
        debug_assert!(self.varid.is_none(), "varid of {} set twice", self.name);
        self.varid = Some(id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Field { object: Variable, key: Box<Value> },
    VariableRef(Variable),
    Integer(i64),
    Str { bytes: Vec<u8>, byte_oriented: bool },
    Float(f64),
    Callable(Box<Callable>),
}

impl Value {
    pub fn variable(name: Name) -> Self {
        Value::VariableRef(Variable::new(name))
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Callable(callable) => Some(callable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Value),
    Named(Vec<u8>, Value),
}

impl Arg {
    pub fn value(&self) -> &Value {
        match self {
            Arg::Positional(v) | Arg::Named(_, v) => v,
        }
    }

    pub fn value_mut(&mut self) -> &mut Value {
        match self {
            Arg::Positional(v) | Arg::Named(_, v) => v,
        }
    }
}

/// Parameter groups of one side of a callable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgGroup {
    pub required: Vec<Variable>,
    /// Parameter and its default, evaluated where the callable is created
    pub optional: Vec<(Variable, Value)>,
    pub arbitrary: Option<Variable>,
    pub keyword: Option<Variable>,
}

impl ArgGroup {
    pub fn required(names: impl IntoIterator<Item = Name>) -> Self {
        Self {
            required: names.into_iter().map(Variable::new).collect(),
            ..Self::default()
        }
    }

    /// Binders in installation order
    pub fn binders_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.required
            .iter_mut()
            .chain(self.optional.iter_mut().map(|(var, _)| var))
            .chain(self.arbitrary.iter_mut())
            .chain(self.keyword.iter_mut())
    }

    pub fn binders(&self) -> impl Iterator<Item = &Variable> {
        self.required
            .iter()
            .chain(self.optional.iter().map(|(var, _)| var))
            .chain(self.arbitrary.iter())
            .chain(self.keyword.iter())
    }
}

/// Continuation and hidden-object binders of a function
#[derive(Debug, Clone, PartialEq)]
pub struct Implicit {
    pub continuation: Variable,
    pub hidden: Variable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub left: ArgGroup,
    pub right: ArgGroup,
    /// Present exactly when `is_function` is set
    pub implicit: Option<Implicit>,
    pub body: Expression,
    /// Written by the user as a function literal; continuations are not
    pub is_function: bool,
    /// Captured variables in environment order, filled by the annotator
    pub free: Vec<VarId>,
}

impl Callable {
    /// Single-parameter continuation receiving a call's result
    pub fn continuation(param: Name, body: Expression) -> Self {
        Self {
            left: ArgGroup::default(),
            right: ArgGroup::required([param]),
            implicit: None,
            body,
            is_function: false,
            free: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Call {
        callee: Value,
        left: Vec<Arg>,
        right: Vec<Arg>,
        /// `None` only for the call that ends a unit
        continuation: Option<Value>,
        hidden: Value,
    },
    Assignment {
        assignee: Variable,
        value: Value,
        /// Introduces a binding rather than mutating an existing one
        local: bool,
        next: Box<Expression>,
    },
    ObjectMutation {
        object: Variable,
        key: Value,
        value: Value,
        next: Box<Expression>,
    },
}

impl Expression {
    /// Number of call nodes, including those inside nested callables
    pub fn call_count(&self) -> usize {
        match self {
            Expression::Call {
                callee,
                left,
                right,
                continuation,
                hidden,
            } => {
                let nested: usize = std::iter::once(callee)
                    .chain(left.iter().chain(right).map(Arg::value))
                    .chain(continuation.iter())
                    .chain(std::iter::once(hidden))
                    .map(Value::call_count)
                    .sum();
                1 + nested
            }
            Expression::Assignment { value, next, .. } => value.call_count() + next.call_count(),
            Expression::ObjectMutation {
                key, value, next, ..
            } => key.call_count() + value.call_count() + next.call_count(),
        }
    }

    /// Number of callables nested anywhere below this expression
    pub fn callable_count(&self) -> usize {
        let mut count = 0;
        self.for_each_value(&mut |value| {
            if let Value::Callable(callable) = value {
                count += 1 + callable.body.callable_count();
            }
        });
        count
    }

    fn for_each_value(&self, f: &mut impl FnMut(&Value)) {
        match self {
            Expression::Call {
                callee,
                left,
                right,
                continuation,
                hidden,
            } => {
                f(callee);
                left.iter().chain(right).for_each(|arg| f(arg.value()));
                continuation.iter().for_each(&mut *f);
                f(hidden);
            }
            Expression::Assignment { value, next, .. } => {
                f(value);
                next.for_each_value(f);
            }
            Expression::ObjectMutation {
                key, value, next, ..
            } => {
                f(key);
                f(value);
                next.for_each_value(f);
            }
        }
    }
}

impl Value {
    fn call_count(&self) -> usize {
        match self {
            Value::Callable(callable) => {
                let defaults: usize = callable
                    .left
                    .optional
                    .iter()
                    .chain(&callable.right.optional)
                    .map(|(_, value)| value.call_count())
                    .sum();
                defaults + callable.body.call_count()
            }
            Value::Field { key, .. } => key.call_count(),
            _ => 0,
        }
    }
}

// ============================================================================
// Pretty printing (used by `--dump-cps`)
// ============================================================================

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.varid {
            Some(id) => write!(f, "{}@{}", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl Expression {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Expression::Call {
                callee,
                left,
                right,
                continuation,
                ..
            } => {
                write!(f, "{}call ", pad)?;
                callee.fmt_indented(f, depth)?;
                write!(f, "(")?;
                fmt_args(f, left, depth)?;
                write!(f, "; ")?;
                fmt_args(f, right, depth)?;
                write!(f, ")")?;
                if let Some(k) = continuation {
                    write!(f, " -> ")?;
                    k.fmt_indented(f, depth)?;
                }
                writeln!(f)
            }
            Expression::Assignment {
                assignee,
                value,
                local,
                next,
            } => {
                let op = if *local { "=" } else { ":=" };
                write!(f, "{}{} {} ", pad, assignee, op)?;
                value.fmt_indented(f, depth)?;
                writeln!(f)?;
                next.fmt_indented(f, depth)
            }
            Expression::ObjectMutation {
                object,
                key,
                value,
                next,
            } => {
                write!(f, "{}{}[", pad, object)?;
                key.fmt_indented(f, depth)?;
                write!(f, "] := ")?;
                value.fmt_indented(f, depth)?;
                writeln!(f)?;
                next.fmt_indented(f, depth)
            }
        }
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &[Arg], depth: usize) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if let Arg::Named(key, _) = arg {
            write!(f, "{}: ", String::from_utf8_lossy(key))?;
        }
        arg.value().fmt_indented(f, depth)?;
    }
    Ok(())
}

impl Value {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Value::Field { object, key } => {
                write!(f, "{}[", object)?;
                key.fmt_indented(f, depth)?;
                write!(f, "]")
            }
            Value::VariableRef(var) => write!(f, "{}", var),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str {
                bytes,
                byte_oriented,
            } => {
                let prefix = if *byte_oriented { "b" } else { "" };
                write!(f, "{}{:?}", prefix, String::from_utf8_lossy(bytes))
            }
            Value::Callable(callable) => {
                let kind = if callable.is_function { "fn" } else { "k" };
                write!(f, "{}(", kind)?;
                for (i, var) in callable.left.binders().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", var)?;
                }
                write!(f, " | ")?;
                for (i, var) in callable.right.binders().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", var)?;
                }
                writeln!(f, ") {{")?;
                callable.body.fmt_indented(f, depth + 1)?;
                write!(f, "{}}}", "  ".repeat(depth))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varid_unset_is_an_error() {
        let var = Variable::new(Name::user("x"));
        assert!(matches!(
            var.varid(),
            Err(CompileError::VaridUnset { name }) if name == "x"
        ));
    }

    #[test]
    fn test_call_count_includes_continuations() {
        let inner = Expression::Call {
            callee: Value::variable(Name::user("k")),
            left: vec![],
            right: vec![Arg::Positional(Value::variable(Name::user("t")))],
            continuation: None,
            hidden: Value::variable(Name::user("h")),
        };
        let outer = Expression::Call {
            callee: Value::variable(Name::user("f")),
            left: vec![],
            right: vec![],
            continuation: Some(Value::Callable(Box::new(Callable::continuation(
                Name::user("t"),
                inner,
            )))),
            hidden: Value::variable(Name::user("h")),
        };
        assert_eq!(outer.call_count(), 2);
        assert_eq!(outer.callable_count(), 1);
    }
}
