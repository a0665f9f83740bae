//! Keyed mutable objects
//!
//! Sealing freezes the key set, not the values: a sealed object rejects
//! new keys but still lets existing keys be overwritten. Arrays are objects
//! that also carry element storage.

use super::array::DynArray;
use super::tree::Tree;
use super::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Object {
    sealed: bool,
    fields: Tree<Value>,
    elements: Option<DynArray<Value>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn array(elements: DynArray<Value>) -> Self {
        Self {
            sealed: false,
            fields: Tree::new(),
            elements: Some(elements),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns `false` when the object is sealed and `key` is new
    pub fn set(&mut self, key: &[u8], value: Value) -> bool {
        if self.sealed {
            match self.fields.get_mut(key) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        } else {
            self.fields.insert(key, value);
            true
        }
    }

    pub fn fields(&self) -> super::tree::Iter<'_, Value> {
        self.fields.iter()
    }

    pub fn elements(&self) -> Option<&DynArray<Value>> {
        self.elements.as_ref()
    }

    pub fn elements_mut(&mut self) -> Option<&mut DynArray<Value>> {
        self.elements.as_mut()
    }

    /// Structural copy with independent storage; keeps the sealed flag
    pub fn copy(&self) -> Object {
        Object {
            sealed: self.sealed,
            fields: self.fields.copy(),
            elements: self.elements.clone(),
        }
    }

    /// Values reachable from this object
    pub fn children(&self) -> impl Iterator<Item = &Value> {
        self.fields
            .values()
            .chain(self.elements.iter().flat_map(|e| e.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_object_freezes_key_set() {
        let mut object = Object::new();
        assert!(object.set(b"a", Value::Integer(1)));
        object.seal();
        assert!(!object.set(b"b", Value::Integer(2)));
        assert!(object.set(b"a", Value::Integer(3)));
        assert_eq!(object.get(b"a"), Some(&Value::Integer(3)));
        assert_eq!(object.get(b"b"), None);
    }

    #[test]
    fn test_copy_is_independent() {
        let mut object = Object::new();
        object.set(b"x", Value::Integer(1));
        object.set(b"y", Value::Integer(2));
        let mut copy = object.copy();
        copy.set(b"x", Value::Integer(10));
        copy.set(b"z", Value::Nil);
        assert_eq!(object.get(b"x"), Some(&Value::Integer(1)));
        assert_eq!(object.get(b"z"), None);
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn test_copy_keeps_seal() {
        let mut object = Object::new();
        object.seal();
        assert!(object.copy().is_sealed());
    }
}
