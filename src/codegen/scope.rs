//! Scope arena and variable id generation
//!
//! Scopes form a tree stored in a flat arena and linked by parent index. A
//! lookup falls through to ancestors; binding always inserts locally.

use std::collections::HashMap;

use super::cps::VarId;
use crate::names::Name;

/// Source of variable ids. Ids are never reused within a compilation.
#[derive(Debug, Default)]
pub struct VarIdGen {
    next: VarId,
}

impl VarIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> VarId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u32 {
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    bindings: HashMap<Name, VarId>,
}

#[derive(Debug, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope with no parent
    pub fn root(&mut self) -> ScopeId {
        self.push(None)
    }

    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.push(Some(parent))
    }

    fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            bindings: HashMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Mint a new id for `name` in `scope`, shadowing any earlier binding
    pub fn bind(&mut self, scope: ScopeId, name: Name, ids: &mut VarIdGen) -> VarId {
        let id = ids.fresh();
        self.scopes[scope.0].bindings.insert(name, id);
        id
    }

    /// Resolve through the parent chain, returning the id and the owning scope
    pub fn lookup(&self, scope: ScopeId, name: &Name) -> Option<(VarId, ScopeId)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(&varid) = scope.bindings.get(name) {
                return Some((varid, id));
            }
            current = scope.parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
