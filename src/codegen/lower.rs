//! AST to flat IR lowering
//!
//! Flattens nested applications, field/index chains and literals into a
//! straight-line statement list. Every intermediate result gets a fresh
//! synthesized name; operands of calls and mutations are atoms.
//!
//! Key rewrites:
//! - a multi-term application is one call: terms left of the open-call
//!   marker are left arguments, terms right of it are right arguments
//! - `x = v` binds `x` to the null sentinel first, then mutates it, so a
//!   function literal can refer to the name it is being bound to
//! - dictionary literals become `new_object` plus one mutation per entry,
//!   array literals become a call of `Array`

use tracing::trace;

use crate::ast::{
    self, Application, Argument, AssignKind, Assignment, Expression, FunctionLiteral, Modifier,
    ParamList, Span, Term,
};
use crate::errors::{CompileError, CompileResult};
use crate::names::{Name, NameGen};

use super::ir::{Block, Call, Function, IrArg, IrValue, Params, Statement};
use super::provided::null_name;

/// Lower a whole program into one block
pub fn lower_program(program: &[Expression], names: &mut NameGen) -> CompileResult<Block> {
    let mut lowerer = Lowerer {
        names,
        statements: Vec::new(),
    };
    let block = lowerer.lower_body(program)?;
    trace!(
        statements = block.statements.len(),
        blocks = block.block_count(),
        "lowered program"
    );
    Ok(block)
}

struct Lowerer<'a> {
    names: &'a mut NameGen,
    /// Output of the block currently being lowered
    statements: Vec<Statement>,
}

impl Lowerer<'_> {
    fn emit(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    fn fresh(&mut self, hint: &str) -> Name {
        self.names.gensym(hint)
    }

    /// Name an atom, binding literals to a temporary
    fn to_name(&mut self, atom: IrValue) -> Name {
        match atom {
            IrValue::Variable(name) => name,
            other => {
                let name = self.fresh("lit");
                self.emit(Statement::Definition {
                    name: name.clone(),
                    value: other,
                });
                name
            }
        }
    }

    /// Lower a statement sequence into a block of its own
    fn lower_body(&mut self, body: &[Expression]) -> CompileResult<Block> {
        let outer = std::mem::take(&mut self.statements);
        let result = self.lower_expressions(body);
        let statements = std::mem::replace(&mut self.statements, outer);
        let last = result?;
        Ok(Block { statements, last })
    }

    fn lower_expressions(&mut self, body: &[Expression]) -> CompileResult<Name> {
        let mut last = null_name();
        for expr in body {
            last = match expr {
                Expression::Assignment(assign) => self.lower_assignment(assign)?,
                Expression::Application(app) => {
                    let atom = self.lower_application(app)?;
                    self.to_name(atom)
                }
            };
        }
        Ok(last)
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    fn lower_assignment(&mut self, assign: &Assignment) -> CompileResult<Name> {
        let invalid = || CompileError::InvalidAssignmentTarget {
            span: assign.target.span.clone(),
        };
        let target = &assign.target;

        match assign.kind {
            AssignKind::Definition => {
                let (ast::Value::Variable(ident), true) =
                    (&target.value, target.modifiers.is_empty())
                else {
                    return Err(invalid());
                };
                let name = Name::user(ident.clone());
                self.emit(Statement::Definition {
                    name: name.clone(),
                    value: IrValue::Variable(null_name()),
                });
                let value = self.lower_application(&assign.value)?;
                self.emit(Statement::VariableMutation {
                    name: name.clone(),
                    value,
                });
                Ok(name)
            }
            AssignKind::Mutation => match target.modifiers.split_last() {
                None => {
                    let ast::Value::Variable(ident) = &target.value else {
                        return Err(invalid());
                    };
                    let name = Name::user(ident.clone());
                    let value = self.lower_application(&assign.value)?;
                    self.emit(Statement::VariableMutation {
                        name: name.clone(),
                        value,
                    });
                    Ok(name)
                }
                Some((last, init)) => {
                    let prefix = Term {
                        value: target.value.clone(),
                        modifiers: init.to_vec(),
                        span: target.span.clone(),
                    };
                    let object = self.lower_term(&prefix)?;
                    let object = self.to_name(object);
                    let key = match last {
                        Modifier::Field(field) => IrValue::field_key(field),
                        Modifier::Index(index) => self.lower_application(index)?,
                        Modifier::OpenCall | Modifier::Call(_) => return Err(invalid()),
                    };
                    let value = self.lower_application(&assign.value)?;
                    let name = self.to_name(value);
                    self.emit(Statement::ObjectMutation {
                        object,
                        key,
                        value: IrValue::Variable(name.clone()),
                    });
                    Ok(name)
                }
            },
        }
    }

    // ========================================================================
    // Applications and terms
    // ========================================================================

    /// Lower an application to an atom
    fn lower_application(&mut self, app: &Application) -> CompileResult<IrValue> {
        if let [term] = app.terms.as_slice() {
            return self.lower_term(term);
        }

        let mut marked = app
            .terms
            .iter()
            .enumerate()
            .filter(|(_, term)| term.is_open_call());
        let (index, _) = marked.next().ok_or_else(|| CompileError::MissingOpenCall {
            span: app.span.clone(),
        })?;
        if marked.next().is_some() {
            return Err(CompileError::MultipleOpenCalls {
                span: app.span.clone(),
            });
        }

        let mut left = Vec::new();
        for term in &app.terms[..index] {
            left.push(IrArg::Positional(self.lower_term(term)?));
        }

        let callee_term = &app.terms[index];
        let callee = self.lower_value(&callee_term.value, &callee_term.span)?;
        let modifiers = &callee_term.modifiers[..callee_term.modifiers.len() - 1];
        let callee = self.apply_modifiers(callee, modifiers)?;

        let mut right = Vec::new();
        for term in &app.terms[index + 1..] {
            right.push(IrArg::Positional(self.lower_term(term)?));
        }

        Ok(self.emit_call(callee, left, right))
    }

    fn lower_term(&mut self, term: &Term) -> CompileResult<IrValue> {
        let value = self.lower_value(&term.value, &term.span)?;
        self.apply_modifiers(value, &term.modifiers)
    }

    fn apply_modifiers(
        &mut self,
        mut current: IrValue,
        modifiers: &[Modifier],
    ) -> CompileResult<IrValue> {
        for modifier in modifiers {
            current = match modifier {
                Modifier::Field(field) => self.emit_field(current, IrValue::field_key(field)),
                Modifier::Index(index) => {
                    let key = self.lower_application(index)?;
                    self.emit_field(current, key)
                }
                // Not followed by neighbouring terms: a call without arguments
                Modifier::OpenCall => self.emit_call(current, Vec::new(), Vec::new()),
                Modifier::Call(args) => {
                    let left = self.lower_arguments(&args.left, false)?;
                    let right = self.lower_arguments(&args.right, true)?;
                    self.emit_call(current, left, right)
                }
            };
        }
        Ok(current)
    }

    fn lower_arguments(
        &mut self,
        args: &[Argument],
        named_allowed: bool,
    ) -> CompileResult<Vec<IrArg>> {
        args.iter()
            .map(|arg| match arg {
                Argument::Positional(app) => Ok(IrArg::Positional(self.lower_application(app)?)),
                Argument::Named(name, app) if named_allowed => Ok(IrArg::Named(
                    name.as_bytes().to_vec(),
                    self.lower_application(app)?,
                )),
                Argument::Named(_, app) => Err(CompileError::UnknownArgumentShape {
                    detail: "named argument on the left side",
                    span: app.span.clone(),
                }),
            })
            .collect()
    }

    fn emit_field(&mut self, object: IrValue, key: IrValue) -> IrValue {
        let object = self.to_name(object);
        let name = self.fresh("field");
        self.emit(Statement::Definition {
            name: name.clone(),
            value: IrValue::Field {
                object,
                key: Box::new(key),
            },
        });
        IrValue::Variable(name)
    }

    fn emit_call(&mut self, callee: IrValue, left: Vec<IrArg>, right: Vec<IrArg>) -> IrValue {
        let name = self.fresh("ret");
        self.emit(Statement::ReturnValue {
            name: name.clone(),
            call: Call {
                callee,
                left,
                right,
            },
        });
        IrValue::Variable(name)
    }

    fn lower_value(&mut self, value: &ast::Value, span: &Span) -> CompileResult<IrValue> {
        match value {
            ast::Value::Variable(ident) => Ok(IrValue::Variable(Name::user(ident.clone()))),
            ast::Value::Integer(n) => Ok(IrValue::Integer(*n)),
            ast::Value::Float(x) => Ok(IrValue::Float(*x)),
            ast::Value::Str {
                bytes,
                byte_oriented,
            } => Ok(IrValue::Str {
                bytes: bytes.clone(),
                byte_oriented: *byte_oriented,
            }),
            ast::Value::SubExpression(inner) => self.lower_application(inner),
            ast::Value::Function(func) => {
                if func.left.keyword.is_some() {
                    return Err(CompileError::UnknownArgumentShape {
                        detail: "keyword rest parameter on the left side",
                        span: span.clone(),
                    });
                }
                let function = self.lower_function(func)?;
                let name = self.fresh("fn");
                self.emit(Statement::Definition {
                    name: name.clone(),
                    value: IrValue::Function(Box::new(function)),
                });
                Ok(IrValue::Variable(name))
            }
            ast::Value::Array(items) => {
                let mut right = Vec::with_capacity(items.len());
                for item in items {
                    right.push(IrArg::Positional(self.lower_application(item)?));
                }
                let callee = IrValue::Variable(Name::user("Array"));
                Ok(self.emit_call(callee, Vec::new(), right))
            }
            ast::Value::Dictionary(entries) => {
                let callee = IrValue::Variable(Name::user("new_object"));
                let object = self.emit_call(callee, Vec::new(), Vec::new());
                let object = self.to_name(object);
                for (key, value) in entries {
                    let value = self.lower_application(value)?;
                    self.emit(Statement::ObjectMutation {
                        object: object.clone(),
                        key: IrValue::Str {
                            bytes: key.bytes().to_vec(),
                            byte_oriented: false,
                        },
                        value,
                    });
                }
                Ok(IrValue::Variable(object))
            }
        }
    }

    fn lower_function(&mut self, func: &FunctionLiteral) -> CompileResult<Function> {
        // Defaults belong to the enclosing block
        let left = self.lower_params(&func.left)?;
        let right = self.lower_params(&func.right)?;
        let body = self.lower_body(&func.body)?;
        Ok(Function { left, right, body })
    }

    fn lower_params(&mut self, params: &ParamList) -> CompileResult<Params> {
        let mut optional = Vec::with_capacity(params.optional.len());
        for (ident, default) in &params.optional {
            let value = self.lower_application(default)?;
            optional.push((Name::user(ident.clone()), value));
        }
        Ok(Params {
            required: params.required.iter().cloned().map(Name::user).collect(),
            optional,
            arbitrary: params.arbitrary.clone().map(Name::user),
            keyword: params.keyword.clone().map(Name::user),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn lower(source: &str) -> CompileResult<Block> {
        let program = parse_source(source).unwrap();
        lower_program(&program, &mut NameGen::new())
    }

    #[test]
    fn test_variable_references_emit_nothing() {
        let block = lower("a; b; c").unwrap();
        assert!(block.statements.is_empty());
        assert_eq!(block.last, Name::user("c"));
    }

    #[test]
    fn test_definition_binds_placeholder_first() {
        let block = lower("f = { x -> x + 1 }").unwrap();
        assert!(matches!(
            &block.statements[0],
            Statement::Definition { name, value: IrValue::Variable(v) }
                if *name == Name::user("f") && *v == null_name()
        ));
        assert!(matches!(
            &block.statements[1],
            Statement::Definition { value: IrValue::Function(_), .. }
        ));
        assert!(matches!(
            &block.statements[2],
            Statement::VariableMutation { name, .. } if *name == Name::user("f")
        ));
        assert_eq!(block.last, Name::user("f"));
    }

    #[test]
    fn test_open_call_partitions_arguments() {
        let block = lower("a b f' c").unwrap();
        let [Statement::ReturnValue { call, .. }] = block.statements.as_slice() else {
            panic!("expected one call, got {:?}", block.statements);
        };
        assert_eq!(call.callee, IrValue::Variable(Name::user("f")));
        assert_eq!(call.left.len(), 2);
        assert_eq!(call.right.len(), 1);
    }

    #[test]
    fn test_multiple_open_calls_rejected() {
        let err = lower("f' g' x").unwrap_err();
        assert!(matches!(err, CompileError::MultipleOpenCalls { .. }));
    }

    #[test]
    fn test_missing_open_call_rejected() {
        let err = lower("f x").unwrap_err();
        assert!(matches!(err, CompileError::MissingOpenCall { .. }));
    }

    #[test]
    fn test_open_call_followed_by_field_is_closed_call() {
        let block = lower("make'.size").unwrap();
        assert!(matches!(&block.statements[0], Statement::ReturnValue { call, .. }
            if call.left.is_empty() && call.right.is_empty()));
        assert!(matches!(
            &block.statements[1],
            Statement::Definition { value: IrValue::Field { .. }, .. }
        ));
    }

    #[test]
    fn test_mutation_targets() {
        let block = lower("o.a := 1").unwrap();
        assert!(block.statements.iter().any(|s| matches!(s,
            Statement::ObjectMutation { object, key, .. }
                if *object == Name::user("o") && *key == IrValue::field_key("a"))));

        let block = lower("xs[0] := 2").unwrap();
        assert!(block.statements.iter().any(|s| matches!(s,
            Statement::ObjectMutation { key: IrValue::Integer(0), .. })));

        let err = lower("f' := 3").unwrap_err();
        assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
        let err = lower("1 := 3").unwrap_err();
        assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
    }

    #[test]
    fn test_left_keyword_rest_rejected() {
        let err = lower("f = { **kw | x -> x }").unwrap_err();
        assert!(matches!(err, CompileError::UnknownArgumentShape { .. }));
    }

    #[test]
    fn test_dictionary_literal() {
        let block = lower("d = [a: 1, b: 2]").unwrap();
        let mutations = block
            .statements
            .iter()
            .filter(|s| matches!(s, Statement::ObjectMutation { .. }))
            .count();
        assert_eq!(mutations, 2);
    }

    #[test]
    fn test_defaults_are_hoisted_out_of_the_body() {
        let block = lower("f = { x = 1 + 2 -> x }").unwrap();
        // `+` is called in the enclosing block, not inside the function
        assert!(block.statements.iter().any(|s| matches!(s,
            Statement::ReturnValue { call, .. }
                if call.callee == IrValue::Variable(Name::user("+")))));
        let func = block.statements.iter().find_map(|s| match s {
            Statement::Definition { value: IrValue::Function(f), .. } => Some(f),
            _ => None,
        });
        assert_eq!(func.unwrap().body.call_count(), 0);
    }
}
