//! Flat intermediate representation
//!
//! Administrative normal form: every intermediate result is named, calls only
//! take atoms as arguments, and a [`Block`] is a straight-line statement list
//! followed by the name holding its value.

use std::fmt;

use crate::names::Name;

/// Statement list plus the name of its result
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub last: Name,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Introduce a local binding
    Definition { name: Name, value: IrValue },
    /// Overwrite an existing binding
    VariableMutation { name: Name, value: IrValue },
    /// `object[key] := value`, also used for field assignment
    ObjectMutation {
        object: Name,
        key: IrValue,
        value: IrValue,
    },
    /// Bind the value returned by a call
    ReturnValue { name: Name, call: Call },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: IrValue,
    pub left: Vec<IrArg>,
    pub right: Vec<IrArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrArg {
    Positional(IrValue),
    Named(Vec<u8>, IrValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrValue {
    Variable(Name),
    Integer(i64),
    Float(f64),
    Str { bytes: Vec<u8>, byte_oriented: bool },
    /// Read `object[key]`; field access uses a string key
    Field { object: Name, key: Box<IrValue> },
    Function(Box<Function>),
}

impl IrValue {
    pub fn field_key(field: &str) -> IrValue {
        IrValue::Str {
            bytes: field.as_bytes().to_vec(),
            byte_oriented: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub left: Params,
    pub right: Params,
    pub body: Block,
}

/// One side of a function's parameters. Defaults are atoms computed before
/// the function value is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub required: Vec<Name>,
    pub optional: Vec<(Name, IrValue)>,
    pub arbitrary: Option<Name>,
    pub keyword: Option<Name>,
}

impl Block {
    /// Number of calls, counting nested function bodies
    pub fn call_count(&self) -> usize {
        self.statements.iter().map(Statement::call_count).sum()
    }

    /// Number of blocks (this one plus every nested function body)
    pub fn block_count(&self) -> usize {
        1 + self
            .statements
            .iter()
            .map(Statement::nested_block_count)
            .sum::<usize>()
    }
}

impl Statement {
    fn values(&self) -> Vec<&IrValue> {
        match self {
            Statement::Definition { value, .. } | Statement::VariableMutation { value, .. } => {
                vec![value]
            }
            Statement::ObjectMutation { key, value, .. } => vec![key, value],
            Statement::ReturnValue { call, .. } => std::iter::once(&call.callee)
                .chain(call.left.iter().chain(&call.right).map(IrArg::value))
                .collect(),
        }
    }

    fn call_count(&self) -> usize {
        let own = usize::from(matches!(self, Statement::ReturnValue { .. }));
        own + self
            .values()
            .into_iter()
            .map(|v| match v {
                IrValue::Function(f) => f.body.call_count(),
                _ => 0,
            })
            .sum::<usize>()
    }

    fn nested_block_count(&self) -> usize {
        self.values()
            .into_iter()
            .map(|v| match v {
                IrValue::Function(f) => f.body.block_count(),
                _ => 0,
            })
            .sum()
    }
}

impl IrArg {
    pub fn value(&self) -> &IrValue {
        match self {
            IrArg::Positional(v) | IrArg::Named(_, v) => v,
        }
    }
}

// ============================================================================
// Pretty printing (used by `--dump-ir`)
// ============================================================================

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl Block {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        for stmt in &self.statements {
            write!(f, "{}", pad)?;
            match stmt {
                Statement::Definition { name, value } => {
                    write!(f, "{} = ", name)?;
                    value.fmt_indented(f, depth)?;
                }
                Statement::VariableMutation { name, value } => {
                    write!(f, "{} := ", name)?;
                    value.fmt_indented(f, depth)?;
                }
                Statement::ObjectMutation { object, key, value } => {
                    write!(f, "{}[", object)?;
                    key.fmt_indented(f, depth)?;
                    write!(f, "] := ")?;
                    value.fmt_indented(f, depth)?;
                }
                Statement::ReturnValue { name, call } => {
                    write!(f, "{} = call ", name)?;
                    call.callee.fmt_indented(f, depth)?;
                    write!(f, "(")?;
                    for (i, arg) in call.left.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        arg.value().fmt_indented(f, depth)?;
                    }
                    write!(f, "; ")?;
                    for (i, arg) in call.right.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        if let IrArg::Named(key, _) = arg {
                            write!(f, "{}: ", String::from_utf8_lossy(key))?;
                        }
                        arg.value().fmt_indented(f, depth)?;
                    }
                    write!(f, ")")?;
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "{}=> {}", pad, self.last)
    }
}

impl IrValue {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            IrValue::Variable(name) => write!(f, "{}", name),
            IrValue::Integer(n) => write!(f, "{}", n),
            IrValue::Float(x) => write!(f, "{:?}", x),
            IrValue::Str { bytes, byte_oriented } => {
                let prefix = if *byte_oriented { "b" } else { "" };
                write!(f, "{}{:?}", prefix, String::from_utf8_lossy(bytes))
            }
            IrValue::Field { object, key } => {
                write!(f, "{}[", object)?;
                key.fmt_indented(f, depth)?;
                write!(f, "]")
            }
            IrValue::Function(func) => {
                writeln!(
                    f,
                    "fn({} | {}) {{",
                    func.left.required.len(),
                    func.right.required.len()
                )?;
                func.body.fmt_indented(f, depth + 1)?;
                write!(f, "{}}}", "  ".repeat(depth))
            }
        }
    }
}
