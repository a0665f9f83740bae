//! Call compaction
//!
//! The CPS transform gives every call an anonymous continuation, including
//! calls in tail position whose continuation only forwards the result:
//!
//! ```text
//! call f(x) -> k(t) { call cont(t) }     ==>     call f(x) -> cont
//! ```
//!
//! The forwarding continuation is replaced by the variable it forwards to.
//! A function-flagged callable is never removed. The rewrite runs bottom-up
//! in one pass, so running it again changes nothing.

use tracing::debug;

use super::cps::{Arg, Callable, Expression, Value, VarId};

/// Compact `expr` in place. Returns the number of calls removed.
pub fn compact(expr: &mut Expression) -> usize {
    let before = expr.call_count();
    compact_expression(expr);
    let removed = before - expr.call_count();
    debug!(before, after = before - removed, "call compaction");
    removed
}

fn compact_expression(expr: &mut Expression) {
    match expr {
        Expression::Call {
            callee,
            left,
            right,
            continuation,
            hidden,
        } => {
            compact_value(callee);
            for arg in left.iter_mut().chain(right.iter_mut()) {
                compact_value(arg.value_mut());
            }
            compact_value(hidden);
            if let Some(k) = continuation {
                compact_value(k);
                if let Some(target) = k.as_callable().and_then(forwarding_target) {
                    *k = target;
                }
            }
        }
        Expression::Assignment { value, next, .. } => {
            compact_value(value);
            compact_expression(next);
        }
        Expression::ObjectMutation {
            key, value, next, ..
        } => {
            compact_value(key);
            compact_value(value);
            compact_expression(next);
        }
    }
}

fn compact_value(value: &mut Value) {
    match value {
        Value::Callable(callable) => {
            for (_, default) in callable
                .left
                .optional
                .iter_mut()
                .chain(callable.right.optional.iter_mut())
            {
                compact_value(default);
            }
            compact_expression(&mut callable.body);
        }
        Value::Field { key, .. } => compact_value(key),
        Value::VariableRef(_) | Value::Integer(_) | Value::Float(_) | Value::Str { .. } => {}
    }
}

/// The variable `k` forwards to, when `k` is `k(t) { call c(t) }`
fn forwarding_target(k: &Callable) -> Option<Value> {
    if k.is_function || k.left.binders().next().is_some() {
        return None;
    }
    let param = single_required(k)?;

    let Expression::Call {
        callee: Value::VariableRef(target),
        left,
        right,
        continuation: None,
        ..
    } = &k.body
    else {
        return None;
    };
    let target_id = target.varid().ok()?;
    if target_id == param || !left.is_empty() {
        return None;
    }
    match right.as_slice() {
        [Arg::Positional(Value::VariableRef(arg))] if arg.varid().ok() == Some(param) => {
            Some(Value::VariableRef(target.clone()))
        }
        _ => None,
    }
}

fn single_required(k: &Callable) -> Option<VarId> {
    let group = &k.right;
    if group.optional.is_empty() && group.arbitrary.is_none() && group.keyword.is_none() {
        if let [param] = group.required.as_slice() {
            return param.varid().ok();
        }
    }
    None
}
