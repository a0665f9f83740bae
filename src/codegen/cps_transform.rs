//! Flat IR to CPS conversion
//!
//! A right fold over each block's statements: the expression for statement
//! `i` wraps the expression already built for statements `i+1..`. A call
//! becomes a `Call` whose continuation is an anonymous callable binding the
//! call's result name, so every non-tail call turns into a tail call. A block
//! ends with a call of the ambient continuation on the block's last value.
//!
//! Function literals become function-flagged callables that bind their own
//! continuation and hidden object.

use tracing::trace;

use super::cps::{Arg, ArgGroup, Callable, Expression, Implicit, Value, Variable};
use super::ir::{Block, Call, Function, IrArg, IrValue, Params, Statement};
use super::provided::{continuation_name, hidden_name};

/// Convert a lowered program into the CPS expression run at entry
pub fn cps_transform(block: Block) -> Expression {
    let expr = transform_block(block);
    trace!(calls = expr.call_count(), "cps transform done");
    expr
}

fn transform_block(block: Block) -> Expression {
    let mut expr = Expression::Call {
        callee: Value::variable(continuation_name()),
        left: Vec::new(),
        right: vec![Arg::Positional(Value::variable(block.last))],
        continuation: None,
        hidden: Value::variable(hidden_name()),
    };

    for statement in block.statements.into_iter().rev() {
        let next = Box::new(expr);
        expr = match statement {
            Statement::Definition { name, value } => Expression::Assignment {
                assignee: Variable::new(name),
                value: transform_value(value),
                local: true,
                next,
            },
            Statement::VariableMutation { name, value } => Expression::Assignment {
                assignee: Variable::new(name),
                value: transform_value(value),
                local: false,
                next,
            },
            Statement::ObjectMutation { object, key, value } => Expression::ObjectMutation {
                object: Variable::new(object),
                key: transform_value(key),
                value: transform_value(value),
                next,
            },
            Statement::ReturnValue { name, call } => {
                let Call {
                    callee,
                    left,
                    right,
                } = call;
                Expression::Call {
                    callee: transform_value(callee),
                    left: left.into_iter().map(transform_arg).collect(),
                    right: right.into_iter().map(transform_arg).collect(),
                    continuation: Some(Value::Callable(Box::new(Callable::continuation(
                        name, *next,
                    )))),
                    hidden: Value::variable(hidden_name()),
                }
            }
        };
    }
    expr
}

fn transform_arg(arg: IrArg) -> Arg {
    match arg {
        IrArg::Positional(value) => Arg::Positional(transform_value(value)),
        IrArg::Named(key, value) => Arg::Named(key, transform_value(value)),
    }
}

fn transform_value(value: IrValue) -> Value {
    match value {
        IrValue::Variable(name) => Value::variable(name),
        IrValue::Integer(n) => Value::Integer(n),
        IrValue::Float(x) => Value::Float(x),
        IrValue::Str {
            bytes,
            byte_oriented,
        } => Value::Str {
            bytes,
            byte_oriented,
        },
        IrValue::Field { object, key } => Value::Field {
            object: Variable::new(object),
            key: Box::new(transform_value(*key)),
        },
        IrValue::Function(function) => Value::Callable(Box::new(transform_function(*function))),
    }
}

fn transform_function(function: Function) -> Callable {
    Callable {
        left: transform_params(function.left),
        right: transform_params(function.right),
        implicit: Some(Implicit {
            continuation: Variable::new(continuation_name()),
            hidden: Variable::new(hidden_name()),
        }),
        body: transform_block(function.body),
        is_function: true,
        free: Vec::new(),
    }
}

fn transform_params(params: Params) -> ArgGroup {
    ArgGroup {
        required: params.required.into_iter().map(Variable::new).collect(),
        optional: params
            .optional
            .into_iter()
            .map(|(name, default)| (Variable::new(name), transform_value(default)))
            .collect(),
        arbitrary: params.arbitrary.map(Variable::new),
        keyword: params.keyword.map(Variable::new),
    }
}
