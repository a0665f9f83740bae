//! Primitive value operations: ordering, equality, arithmetic, truthiness
//! and rendering for `print`.
//!
//! Values of different kinds are ordered by a fixed precedence:
//! numbers < Bool < Nil < String < Closure < Object. Integers and floats
//! compare numerically with each other.

use std::cmp::Ordering;

use super::value::{RString, Value};
use super::{RuntimeError, RuntimeResult};

fn rank(value: &Value, op: &'static str) -> RuntimeResult<u8> {
    Ok(match value {
        Value::Integer(_) | Value::Float(_) => 0,
        Value::Bool(_) => 1,
        Value::Nil => 2,
        Value::Str(_) => 3,
        Value::Closure(..) => 4,
        Value::Object(_) => 5,
        Value::Cell(_) => return Err(RuntimeError::UnknownType { op }),
    })
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Total order across all value kinds
pub fn compare(a: &Value, b: &Value) -> RuntimeResult<Ordering> {
    let by_rank = rank(a, "compare")?.cmp(&rank(b, "compare")?);
    if by_rank != Ordering::Equal {
        return Ok(by_rank);
    }
    Ok(match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Integer(x), Value::Float(y)) => float_cmp(*x as f64, *y),
        (Value::Float(x), Value::Integer(y)) => float_cmp(*x, *y as f64),
        (Value::Float(x), Value::Float(y)) => float_cmp(*x, *y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Nil, Value::Nil) => Ordering::Equal,
        // byte strings sort before character strings
        (Value::Str(x), Value::Str(y)) => y
            .is_byte_oriented()
            .cmp(&x.is_byte_oriented())
            .then_with(|| x.bytes().cmp(y.bytes())),
        (Value::Closure(code_x, env_x), Value::Closure(code_y, env_y)) => {
            code_x.cmp(code_y).then_with(|| env_x.cmp(env_y))
        }
        (Value::Object(x), Value::Object(y)) => x.cmp(y),
        _ => return Err(RuntimeError::UnknownType { op: "compare" }),
    })
}

pub fn less_than(a: &Value, b: &Value) -> RuntimeResult<bool> {
    Ok(compare(a, b)? == Ordering::Less)
}

pub fn equals(a: &Value, b: &Value) -> RuntimeResult<bool> {
    Ok(match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => {
            *x as f64 == *y
        }
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Nil, Value::Nil) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Closure(code_x, env_x), Value::Closure(code_y, env_y)) => {
            code_x == code_y && env_x == env_y
        }
        (Value::Object(x), Value::Object(y)) => x == y,
        (Value::Cell(_), _) | (_, Value::Cell(_)) => {
            return Err(RuntimeError::UnknownType { op: "equals" })
        }
        _ => false,
    })
}

enum Numbers {
    Integers(i64, i64),
    Floats(f64, f64),
}

fn numbers(op: &'static str, a: &Value, b: &Value) -> RuntimeResult<Numbers> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Numbers::Integers(*x, *y)),
        (Value::Integer(x), Value::Float(y)) => Ok(Numbers::Floats(*x as f64, *y)),
        (Value::Float(x), Value::Integer(y)) => Ok(Numbers::Floats(*x, *y as f64)),
        (Value::Float(x), Value::Float(y)) => Ok(Numbers::Floats(*x, *y)),
        _ => Err(RuntimeError::UnsupportedOperation {
            op,
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn checked(op: &'static str, result: Option<i64>) -> RuntimeResult<Value> {
    result
        .map(Value::Integer)
        .ok_or(RuntimeError::Overflow { op })
}

pub fn add(a: &Value, b: &Value) -> RuntimeResult<Value> {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        if x.is_byte_oriented() == y.is_byte_oriented() {
            let joined: Vec<u8> = x.bytes().iter().chain(y.bytes()).copied().collect();
            return Ok(Value::Str(RString::new(joined, x.is_byte_oriented())));
        }
    }
    match numbers("add", a, b)? {
        Numbers::Integers(x, y) => checked("add", x.checked_add(y)),
        Numbers::Floats(x, y) => Ok(Value::Float(x + y)),
    }
}

pub fn subtract(a: &Value, b: &Value) -> RuntimeResult<Value> {
    match numbers("subtract", a, b)? {
        Numbers::Integers(x, y) => checked("subtract", x.checked_sub(y)),
        Numbers::Floats(x, y) => Ok(Value::Float(x - y)),
    }
}

pub fn multiply(a: &Value, b: &Value) -> RuntimeResult<Value> {
    match numbers("multiply", a, b)? {
        Numbers::Integers(x, y) => checked("multiply", x.checked_mul(y)),
        Numbers::Floats(x, y) => Ok(Value::Float(x * y)),
    }
}

/// Integer division truncates toward zero
pub fn divide(a: &Value, b: &Value) -> RuntimeResult<Value> {
    match numbers("divide", a, b)? {
        Numbers::Integers(_, 0) => Err(RuntimeError::DivisionByZero),
        Numbers::Integers(x, y) => checked("divide", x.checked_div(y)),
        Numbers::Floats(x, y) => Ok(Value::Float(x / y)),
    }
}

pub fn modulo(a: &Value, b: &Value) -> RuntimeResult<Value> {
    match numbers("modulo", a, b)? {
        Numbers::Integers(_, 0) => Err(RuntimeError::DivisionByZero),
        Numbers::Integers(x, y) => checked("modulo", x.checked_rem(y)),
        Numbers::Floats(x, y) => Ok(Value::Float(x % y)),
    }
}

/// `false`, `Nil`, `0` and `0.0` are falsy
pub fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Nil => false,
        Value::Integer(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        _ => true,
    }
}

/// Bytes written by `print` for one value
pub fn render(value: &Value) -> RuntimeResult<Vec<u8>> {
    match value {
        Value::Integer(_) | Value::Float(_) | Value::Bool(_) | Value::Nil => {
            Ok(value.to_string().into_bytes())
        }
        Value::Str(s) => Ok(s.bytes().to_vec()),
        other => Err(RuntimeError::Unprintable {
            kind: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Handle;

    #[test]
    fn test_cross_kind_order() {
        let ordered = [
            Value::Integer(0),
            Value::Bool(true),
            Value::Nil,
            Value::str("a"),
            Value::Object(Handle(0)),
        ];
        for (i, a) in ordered.iter().enumerate() {
            for (j, b) in ordered.iter().enumerate() {
                assert_eq!(less_than(a, b).unwrap(), i < j, "{} < {}", a, b);
            }
        }
    }

    #[test]
    fn test_mixed_numbers() {
        assert!(less_than(&Value::Integer(1), &Value::Float(1.5)).unwrap());
        assert!(equals(&Value::Integer(2), &Value::Float(2.0)).unwrap());
        assert_eq!(
            add(&Value::Integer(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_strings() {
        let bytes = Value::Str(RString::new(&b"a"[..], true));
        assert!(less_than(&bytes, &Value::str("a")).unwrap());
        assert!(!equals(&bytes, &Value::str("a")).unwrap());
        assert_eq!(
            add(&Value::str("ab"), &Value::str("c")).unwrap(),
            Value::str("abc")
        );
        assert!(matches!(
            add(&bytes, &Value::str("c")),
            Err(RuntimeError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_integer_errors() {
        assert_eq!(
            divide(&Value::Integer(1), &Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            add(&Value::Integer(i64::MAX), &Value::Integer(1)),
            Err(RuntimeError::Overflow { op: "add" })
        );
        assert_eq!(
            divide(&Value::Integer(-7), &Value::Integer(2)).unwrap(),
            Value::Integer(-3)
        );
    }

    #[test]
    fn test_truthiness_and_render() {
        assert!(!is_true(&Value::Integer(0)));
        assert!(!is_true(&Value::Float(0.0)));
        assert!(!is_true(&Value::Nil));
        assert!(is_true(&Value::str("")));
        assert_eq!(render(&Value::Float(1.0)).unwrap(), b"1.0");
        assert!(render(&Value::Object(Handle(3))).is_err());
    }

    #[test]
    fn test_cells_have_no_order() {
        assert!(matches!(
            compare(&Value::Cell(Handle(0)), &Value::Nil),
            Err(RuntimeError::UnknownType { .. })
        ));
    }
}
