//! Provided functions
//!
//! Builtins take their operands from both argument sides, left first, so
//! `x + 1` and `+(x, 1)` are the same call. A builtin never returns: it
//! resumes the continuation it was given, transfers somewhere else, or halts.

use std::io::Write;

use super::heap::Heap;
use super::machine::{Machine, Outcome, Pending, Step};
use super::object::Object;
use super::ops;
use super::value::{Code, Handle, Value};
use super::{Fault, Interrupt, RuntimeError};
use crate::codegen::provided;
use crate::names::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Builtin {
    Array,
    NewObject,
    SealObject,
    CopyObject,
    If,
    Print,
    Throw,
    Try,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Equal,
    NotEqual,
    /// Initial continuation: halts with its argument
    Exit,
    /// `throw` field of the initial hidden object
    Uncaught,
    /// `throw` field of a hidden object made by `try`
    TryHandler,
    ArrayPush,
    ArrayPop,
    ArrayLen,
    ArrayInsert,
    ArrayRemove,
    ArrayExtend,
}

/// Method fields every array carries
pub const ARRAY_METHODS: &[(&str, Builtin)] = &[
    ("push", Builtin::ArrayPush),
    ("pop", Builtin::ArrayPop),
    ("len", Builtin::ArrayLen),
    ("insert", Builtin::ArrayInsert),
    ("remove", Builtin::ArrayRemove),
    ("extend", Builtin::ArrayExtend),
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Array => "Array",
            Builtin::NewObject => "new_object",
            Builtin::SealObject => "seal_object",
            Builtin::CopyObject => "copy_object",
            Builtin::If => "if",
            Builtin::Print => "print",
            Builtin::Throw => "throw",
            Builtin::Try => "try",
            Builtin::Add => "+",
            Builtin::Subtract => "-",
            Builtin::Multiply => "*",
            Builtin::Divide => "/",
            Builtin::Modulo => "%",
            Builtin::Less => "<",
            Builtin::Greater => ">",
            Builtin::LessEq => "<=",
            Builtin::GreaterEq => ">=",
            Builtin::Equal => "==",
            Builtin::NotEqual => "!=",
            Builtin::Exit => "exit",
            Builtin::Uncaught => "uncaught",
            Builtin::TryHandler => "try_handler",
            Builtin::ArrayPush => "push",
            Builtin::ArrayPop => "pop",
            Builtin::ArrayLen => "len",
            Builtin::ArrayInsert => "insert",
            Builtin::ArrayRemove => "remove",
            Builtin::ArrayExtend => "extend",
        }
    }

    /// The builtin a user-visible provided name refers to
    pub fn from_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "Array" => Builtin::Array,
            "new_object" => Builtin::NewObject,
            "seal_object" => Builtin::SealObject,
            "copy_object" => Builtin::CopyObject,
            "if" => Builtin::If,
            "print" => Builtin::Print,
            "throw" => Builtin::Throw,
            "try" => Builtin::Try,
            "+" => Builtin::Add,
            "-" => Builtin::Subtract,
            "*" => Builtin::Multiply,
            "/" => Builtin::Divide,
            "%" => Builtin::Modulo,
            "<" => Builtin::Less,
            ">" => Builtin::Greater,
            "<=" => Builtin::LessEq,
            ">=" => Builtin::GreaterEq,
            "==" => Builtin::Equal,
            "!=" => Builtin::NotEqual,
            _ => return None,
        })
    }

    pub(crate) fn invoke<W: Write>(
        self,
        machine: &mut Machine<'_, W>,
        env: Option<Handle>,
        call: Pending,
    ) -> Result<Step, Interrupt> {
        let Pending {
            left,
            right,
            named,
            continuation: cont,
            hidden,
            ..
        } = call;
        if !named.is_empty() {
            return Err(RuntimeError::ArityMismatch {
                expected: format!("no named arguments for {}", self.name()),
                found: named.len(),
            }
            .into());
        }
        let args: Vec<Value> = left.into_iter().chain(right).collect();

        let result = match self {
            Builtin::Add => binary(args, ops::add)?,
            Builtin::Subtract => binary(args, ops::subtract)?,
            Builtin::Multiply => binary(args, ops::multiply)?,
            Builtin::Divide => binary(args, ops::divide)?,
            Builtin::Modulo => binary(args, ops::modulo)?,
            Builtin::Less => binary(args, |a, b| ops::less_than(a, b).map(Value::Bool))?,
            Builtin::Greater => binary(args, |a, b| ops::less_than(b, a).map(Value::Bool))?,
            Builtin::LessEq => binary(args, |a, b| Ok(Value::Bool(!ops::less_than(b, a)?)))?,
            Builtin::GreaterEq => binary(args, |a, b| Ok(Value::Bool(!ops::less_than(a, b)?)))?,
            Builtin::Equal => binary(args, |a, b| ops::equals(a, b).map(Value::Bool))?,
            Builtin::NotEqual => binary(args, |a, b| Ok(Value::Bool(!ops::equals(a, b)?)))?,

            Builtin::Print => {
                let mut line = Vec::new();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        line.push(b' ');
                    }
                    line.extend(ops::render(arg)?);
                }
                line.push(b'\n');
                machine.output().write_all(&line)?;
                Value::Nil
            }

            Builtin::NewObject => {
                exact::<0>(args)?;
                machine.heap_mut().alloc_object(Object::new())
            }
            Builtin::SealObject => {
                let [target] = exact::<1>(args)?;
                machine.object_mut(&target, "seal_object")?.seal();
                target
            }
            Builtin::CopyObject => {
                let [source] = exact::<1>(args)?;
                machine.copy_object(&source)?
            }
            Builtin::Array => machine.new_array(args),

            Builtin::If => {
                if !(2..=3).contains(&args.len()) {
                    return Err(arity("2 or 3", args.len()).into());
                }
                let mut args = args.into_iter();
                let condition = args.next().unwrap_or(Value::Nil);
                let then_branch = args.next();
                let else_branch = args.next();
                let chosen = if ops::is_true(&condition) {
                    then_branch
                } else {
                    else_branch
                };
                match chosen {
                    Some(branch) => {
                        return Ok(Step::Transfer(Pending::call(branch, Vec::new(), cont, hidden)))
                    }
                    None => Value::Nil,
                }
            }

            Builtin::Throw => {
                let [exception] = exact::<1>(args)?;
                let handler = machine.throw_handler(&hidden)?;
                return Ok(Step::Transfer(Pending::call(
                    handler,
                    vec![exception],
                    cont,
                    hidden,
                )));
            }
            Builtin::Try => {
                let [body, handler] = exact::<2>(args)?;
                let saved = machine
                    .heap_mut()
                    .alloc_env(vec![handler, cont.clone(), hidden]);
                let mut scope = Object::new();
                scope.set(
                    b"throw",
                    Value::Closure(Code::Builtin(Builtin::TryHandler), Some(saved)),
                );
                let scoped_hidden = machine.heap_mut().alloc_object(scope);
                return Ok(Step::Transfer(Pending::call(
                    body,
                    Vec::new(),
                    cont,
                    scoped_hidden,
                )));
            }
            Builtin::TryHandler => {
                let [exception] = exact::<1>(args)?;
                let handler = machine.env_entry(env, 0)?;
                let outer_cont = machine.env_entry(env, 1)?;
                let outer_hidden = machine.env_entry(env, 2)?;
                return Ok(Step::Transfer(Pending::call(
                    handler,
                    vec![exception],
                    outer_cont,
                    outer_hidden,
                )));
            }
            Builtin::Exit => {
                let value = args.into_iter().next().unwrap_or(Value::Nil);
                return Ok(Step::Halt(Outcome::Exit(value)));
            }
            Builtin::Uncaught => {
                let value = args.into_iter().next().unwrap_or(Value::Nil);
                return Ok(Step::Halt(Outcome::Uncaught(value)));
            }

            Builtin::ArrayPush => {
                let elements = machine.elements_mut(env)?;
                elements.extend(args);
                Value::Nil
            }
            Builtin::ArrayPop => {
                exact::<0>(args)?;
                machine
                    .elements_mut(env)?
                    .pop()
                    .ok_or(RuntimeError::IndexOutOfBounds { index: -1, len: 0 })?
            }
            Builtin::ArrayLen => {
                exact::<0>(args)?;
                Value::Integer(machine.elements_mut(env)?.len() as i64)
            }
            Builtin::ArrayInsert => {
                let [index, item] = exact::<2>(args)?;
                let index = integer(&index, "insert")?;
                let elements = machine.elements_mut(env)?;
                let len = elements.len();
                let inserted = usize::try_from(index)
                    .map(|at| elements.insert(at, item))
                    .unwrap_or(false);
                if !inserted {
                    return Err(RuntimeError::IndexOutOfBounds { index, len }.into());
                }
                Value::Nil
            }
            Builtin::ArrayRemove => {
                let [index] = exact::<1>(args)?;
                let index = integer(&index, "remove")?;
                let elements = machine.elements_mut(env)?;
                let len = elements.len();
                usize::try_from(index)
                    .ok()
                    .and_then(|at| elements.remove(at))
                    .ok_or(RuntimeError::IndexOutOfBounds { index, len })?
            }
            Builtin::ArrayExtend => {
                let [other] = exact::<1>(args)?;
                let items: Vec<Value> = match &other {
                    Value::Object(h) => machine
                        .heap()
                        .object(*h)
                        .and_then(Object::elements)
                        .map(|e| e.as_slice().to_vec()),
                    _ => None,
                }
                .ok_or(RuntimeError::TypeMismatch {
                    op: "extend",
                    expected: "Array",
                    found: other.type_name(),
                })?;
                machine.elements_mut(env)?.extend(items);
                Value::Nil
            }
        };
        Ok(Step::Transfer(Pending::call(cont, vec![result], Value::Nil, hidden)))
    }
}

fn arity(expected: &str, found: usize) -> RuntimeError {
    RuntimeError::ArityMismatch {
        expected: expected.to_string(),
        found,
    }
}

fn exact<const N: usize>(args: Vec<Value>) -> Result<[Value; N], RuntimeError> {
    let found = args.len();
    args.try_into().map_err(|_| arity(&N.to_string(), found))
}

fn binary(
    args: Vec<Value>,
    op: impl FnOnce(&Value, &Value) -> Result<Value, RuntimeError>,
) -> Result<Value, RuntimeError> {
    let [a, b] = exact::<2>(args)?;
    op(&a, &b)
}

fn integer(value: &Value, op: &'static str) -> Result<i64, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(RuntimeError::TypeMismatch {
            op,
            expected: "Integer",
            found: other.type_name(),
        }),
    }
}

/// Initial value of a provided name
pub fn provided_value(name: &Name, heap: &mut Heap) -> Result<Value, Fault> {
    if name.is_synthesized() {
        return match name.text.as_str() {
            provided::NULL => Ok(Value::Nil),
            provided::CONTINUATION => Ok(Value::builtin(Builtin::Exit)),
            provided::HIDDEN => {
                let mut root = Object::new();
                root.set(b"throw", Value::builtin(Builtin::Uncaught));
                Ok(heap.alloc_object(root))
            }
            _ => Err(Fault::BadImage(format!("unknown reserved name {}", name))),
        };
    }
    match name.text.as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        text => Builtin::from_name(text)
            .map(Value::builtin)
            .ok_or_else(|| Fault::BadImage(format!("unknown provided name {}", name))),
    }
}
