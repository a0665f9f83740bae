//! Names and fresh-name generation
//!
//! A [`Name`] identifies a binding by its text and provenance. Identifiers
//! written by the user and temporaries synthesized by the compiler live in
//! separate spaces, so a temporary can never capture a user variable.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provenance {
    UserProvided,
    Synthesized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Lexical,
    /// Compiler temporary that never outlives the statement sequence it was made for
    ScopedTemp,
}

/// Equality, ordering and hashing only consider `(text, provenance)`.
#[derive(Debug, Clone)]
pub struct Name {
    pub text: String,
    pub provenance: Provenance,
    pub scope_kind: ScopeKind,
}

impl Name {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::UserProvided,
            scope_kind: ScopeKind::Lexical,
        }
    }

    /// Synthesized name with a fixed spelling (continuation, hidden object, ...)
    pub fn reserved(text: &str) -> Self {
        Self {
            text: text.to_string(),
            provenance: Provenance::Synthesized,
            scope_kind: ScopeKind::Lexical,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.provenance == Provenance::Synthesized
    }

    fn key(&self) -> (&str, Provenance) {
        (&self.text, self.provenance)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provenance {
            Provenance::UserProvided => write!(f, "{}", self.text),
            Provenance::Synthesized => write!(f, "%{}", self.text),
        }
    }
}

/// Monotonic gensym counter, one per compilation
#[derive(Debug, Default)]
pub struct NameGen {
    next: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// A fresh temporary; the counter suffix keeps it distinct from every
    /// reserved name and every earlier temporary.
    pub fn gensym(&mut self, hint: &str) -> Name {
        let n = self.next;
        self.next += 1;
        Name {
            text: format!("{}#{}", hint, n),
            provenance: Provenance::Synthesized,
            scope_kind: ScopeKind::ScopedTemp,
        }
    }

    pub fn issued(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_user_and_synthesized_are_distinct() {
        assert_ne!(Name::user("cont"), Name::reserved("cont"));
        assert_eq!(Name::user("x"), Name::user("x"));
    }

    #[test]
    fn test_scope_kind_ignored_by_equality() {
        let mut temp = Name::reserved("t");
        temp.scope_kind = ScopeKind::ScopedTemp;
        assert_eq!(temp, Name::reserved("t"));
    }

    #[test]
    fn test_gensym_unique() {
        let mut gen = NameGen::new();
        let names: HashSet<Name> = (0..100).map(|_| gen.gensym("t")).collect();
        assert_eq!(names.len(), 100);
        assert_eq!(gen.issued(), 100);
        assert!(!names.contains(&Name::reserved("t")));
    }
}
