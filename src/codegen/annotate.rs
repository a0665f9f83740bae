//! Variable annotation and the whole-program free-name check
//!
//! The annotator walks the CPS graph depth-first with one scope per
//! callable, on top of a root scope holding the provided names and an entry
//! scope for the program's own top-level bindings. It:
//! - gives every binder a fresh id and every use the id of its nearest binder
//! - records, per callable, the ids it captures from enclosing callables
//! - marks ids assigned through a non-local assignment as mutated
//!
//! Variables that are both captured and mutated are boxed so that every
//! closure observes the same cell.

use std::collections::HashSet;

use tracing::debug;

use super::cps::{Callable, Expression, Value, VarId, Variable};
use super::provided::{is_provided, provided_names};
use super::scope::{ScopeId, Scopes, VarIdGen};
use crate::errors::{CompileError, CompileResult};
use crate::names::Name;

/// Facts about the program gathered while annotating
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    /// Ids of the provided names, in provided-table order
    pub globals: Vec<(VarId, Name)>,
    /// Ids that live in a shared cell
    pub boxed: HashSet<VarId>,
    pub captured: HashSet<VarId>,
    pub mutated: HashSet<VarId>,
}

impl Annotations {
    pub fn is_boxed(&self, id: VarId) -> bool {
        self.boxed.contains(&id)
    }
}

/// Annotate `expr` in place
pub fn annotate(expr: &mut Expression, ids: &mut VarIdGen) -> CompileResult<Annotations> {
    let mut scopes = Scopes::new();
    let root = scopes.root();
    let globals = provided_names()
        .into_iter()
        .map(|name| (scopes.bind(root, name.clone(), ids), name))
        .collect();
    let entry = scopes.child(root);

    let mut annotator = Annotator {
        ids,
        scopes,
        root,
        frames: vec![Frame::new(entry)],
        captured: HashSet::new(),
        mutated: HashSet::new(),
    };
    annotator.expression(expr)?;

    let boxed: HashSet<VarId> = annotator
        .captured
        .intersection(&annotator.mutated)
        .copied()
        .collect();
    debug!(
        varids = annotator.ids.issued(),
        scopes = annotator.scopes.len(),
        boxed = boxed.len(),
        "annotated"
    );
    Ok(Annotations {
        globals,
        boxed,
        captured: annotator.captured,
        mutated: annotator.mutated,
    })
}

struct Frame {
    scope: ScopeId,
    free: Vec<VarId>,
}

impl Frame {
    fn new(scope: ScopeId) -> Self {
        Self {
            scope,
            free: Vec::new(),
        }
    }
}

struct Annotator<'a> {
    ids: &'a mut VarIdGen,
    scopes: Scopes,
    root: ScopeId,
    /// One frame per callable being walked, entry frame at the bottom
    frames: Vec<Frame>,
    captured: HashSet<VarId>,
    mutated: HashSet<VarId>,
}

impl Annotator<'_> {
    fn current_scope(&self) -> ScopeId {
        self.frames.last().map_or(self.root, |frame| frame.scope)
    }

    fn bind(&mut self, var: &mut Variable) {
        let scope = self.current_scope();
        let id = self.scopes.bind(scope, var.name.clone(), self.ids);
        var.set_varid(id);
    }

    fn resolve(&mut self, var: &mut Variable) -> CompileResult<VarId> {
        let (id, owner) = self
            .scopes
            .lookup(self.current_scope(), &var.name)
            .ok_or_else(|| CompileError::VarMissing {
                name: var.name.to_string(),
            })?;
        if owner != self.root {
            for frame in self.frames.iter_mut().rev() {
                if frame.scope == owner {
                    break;
                }
                if !frame.free.contains(&id) {
                    frame.free.push(id);
                }
                self.captured.insert(id);
            }
        }
        var.set_varid(id);
        Ok(id)
    }

    fn expression(&mut self, expr: &mut Expression) -> CompileResult<()> {
        match expr {
            Expression::Call {
                callee,
                left,
                right,
                continuation,
                hidden,
            } => {
                self.value(callee)?;
                for arg in left.iter_mut().chain(right.iter_mut()) {
                    self.value(arg.value_mut())?;
                }
                if let Some(k) = continuation {
                    self.value(k)?;
                }
                self.value(hidden)
            }
            Expression::Assignment {
                assignee,
                value,
                local,
                next,
            } => {
                self.value(value)?;
                if *local {
                    self.bind(assignee);
                } else {
                    let id = self.resolve(assignee)?;
                    self.mutated.insert(id);
                }
                self.expression(next)
            }
            Expression::ObjectMutation {
                object,
                key,
                value,
                next,
            } => {
                self.resolve(object)?;
                self.value(key)?;
                self.value(value)?;
                self.expression(next)
            }
        }
    }

    fn value(&mut self, value: &mut Value) -> CompileResult<()> {
        match value {
            Value::VariableRef(var) => self.resolve(var).map(drop),
            Value::Field { object, key } => {
                self.resolve(object)?;
                self.value(key)
            }
            Value::Callable(callable) => self.callable(callable),
            Value::Integer(_) | Value::Float(_) | Value::Str { .. } => Ok(()),
        }
    }

    fn callable(&mut self, callable: &mut Callable) -> CompileResult<()> {
        // Defaults see the enclosing scope, not the parameters
        for (_, default) in callable
            .left
            .optional
            .iter_mut()
            .chain(callable.right.optional.iter_mut())
        {
            self.value(default)?;
        }

        let scope = self.scopes.child(self.current_scope());
        self.frames.push(Frame::new(scope));
        if let Some(implicit) = &mut callable.implicit {
            self.bind(&mut implicit.continuation);
            self.bind(&mut implicit.hidden);
        }
        for var in callable
            .left
            .binders_mut()
            .chain(callable.right.binders_mut())
        {
            self.bind(var);
        }
        let walked = self.expression(&mut callable.body);
        if let Some(frame) = self.frames.pop() {
            callable.free = frame.free;
        }
        walked
    }
}

// ============================================================================
// Free-name check
// ============================================================================

/// Fails with `UnboundVariable` on the first use that no binder or provided
/// name accounts for.
pub fn check_free_names(expr: &Expression) -> CompileResult<()> {
    let mut checker = FreeNames { bound: Vec::new() };
    checker.expression(expr)
}

struct FreeNames<'a> {
    /// Binders in scope, innermost last
    bound: Vec<&'a Name>,
}

impl<'a> FreeNames<'a> {
    fn check(&self, name: &Name) -> CompileResult<()> {
        if is_provided(name) || self.bound.iter().rev().any(|bound| *bound == name) {
            Ok(())
        } else {
            Err(CompileError::UnboundVariable {
                name: name.to_string(),
            })
        }
    }

    fn expression(&mut self, expr: &'a Expression) -> CompileResult<()> {
        match expr {
            Expression::Call {
                callee,
                left,
                right,
                continuation,
                hidden,
            } => {
                self.value(callee)?;
                for arg in left.iter().chain(right) {
                    self.value(arg.value())?;
                }
                if let Some(k) = continuation {
                    self.value(k)?;
                }
                self.value(hidden)
            }
            Expression::Assignment {
                assignee,
                value,
                local,
                next,
            } => {
                self.value(value)?;
                if *local {
                    self.bound.push(&assignee.name);
                } else {
                    self.check(&assignee.name)?;
                }
                self.expression(next)
            }
            Expression::ObjectMutation {
                object,
                key,
                value,
                next,
            } => {
                self.check(&object.name)?;
                self.value(key)?;
                self.value(value)?;
                self.expression(next)
            }
        }
    }

    fn value(&mut self, value: &'a Value) -> CompileResult<()> {
        match value {
            Value::VariableRef(var) => self.check(&var.name),
            Value::Field { object, key } => {
                self.check(&object.name)?;
                self.value(key)
            }
            Value::Callable(callable) => {
                for (_, default) in callable.left.optional.iter().chain(&callable.right.optional) {
                    self.value(default)?;
                }
                let mark = self.bound.len();
                if let Some(implicit) = &callable.implicit {
                    self.bound.push(&implicit.continuation.name);
                    self.bound.push(&implicit.hidden.name);
                }
                self.bound.extend(
                    callable
                        .left
                        .binders()
                        .chain(callable.right.binders())
                        .map(|var| &var.name),
                );
                let checked = self.expression(&callable.body);
                self.bound.truncate(mark);
                checked
            }
            Value::Integer(_) | Value::Float(_) | Value::Str { .. } => Ok(()),
        }
    }
}
