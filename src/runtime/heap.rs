//! Handle arena with mark-and-sweep collection
//!
//! Objects, closure environments and variable cells live in slots addressed
//! by [`Handle`]. Freed slots are recycled. Collection only happens when the
//! machine asks for it, between transfers, so no frame is live at that point.

use tracing::trace;

use super::object::Object;
use super::value::{Handle, Value};

#[derive(Debug, Clone)]
pub enum HeapObject {
    Object(Object),
    Env(Vec<Value>),
    Cell(Value),
}

impl HeapObject {
    fn children(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            HeapObject::Object(object) => Box::new(object.children()),
            HeapObject::Env(values) => Box::new(values.iter()),
            HeapObject::Cell(value) => Box::new(std::iter::once(value)),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    object: Option<HeapObject>,
    marked: bool,
}

#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    /// Allocations since the last collection
    pending: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: HeapObject) -> Handle {
        self.live += 1;
        self.pending += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].object = Some(object);
                Handle(index)
            }
            None => {
                self.slots.push(Slot {
                    object: Some(object),
                    marked: false,
                });
                Handle(self.slots.len() as u32 - 1)
            }
        }
    }

    pub fn alloc_object(&mut self, object: Object) -> Value {
        Value::Object(self.alloc(HeapObject::Object(object)))
    }

    pub fn alloc_cell(&mut self, value: Value) -> Value {
        Value::Cell(self.alloc(HeapObject::Cell(value)))
    }

    pub fn alloc_env(&mut self, values: Vec<Value>) -> Handle {
        self.alloc(HeapObject::Env(values))
    }

    pub fn get(&self, handle: Handle) -> Option<&HeapObject> {
        self.slots.get(handle.index())?.object.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut HeapObject> {
        self.slots.get_mut(handle.index())?.object.as_mut()
    }

    pub fn object(&self, handle: Handle) -> Option<&Object> {
        match self.get(handle)? {
            HeapObject::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn object_mut(&mut self, handle: Handle) -> Option<&mut Object> {
        match self.get_mut(handle)? {
            HeapObject::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn env(&self, handle: Handle) -> Option<&[Value]> {
        match self.get(handle)? {
            HeapObject::Env(values) => Some(values),
            _ => None,
        }
    }

    pub fn cell(&self, handle: Handle) -> Option<&Value> {
        match self.get(handle)? {
            HeapObject::Cell(value) => Some(value),
            _ => None,
        }
    }

    pub fn cell_mut(&mut self, handle: Handle) -> Option<&mut Value> {
        match self.get_mut(handle)? {
            HeapObject::Cell(value) => Some(value),
            _ => None,
        }
    }

    /// Number of occupied slots
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn allocations_since_collect(&self) -> usize {
        self.pending
    }

    /// Free every slot not reachable from `roots`. Returns the number freed.
    pub fn collect<'a>(&mut self, roots: impl IntoIterator<Item = &'a Value>) -> usize {
        let mut worklist: Vec<Handle> = roots.into_iter().filter_map(Value::handle).collect();
        while let Some(handle) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(handle.index()) else {
                continue;
            };
            if slot.marked || slot.object.is_none() {
                continue;
            }
            slot.marked = true;
            if let Some(object) = &slot.object {
                worklist.extend(object.children().filter_map(Value::handle));
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
            } else if slot.object.take().is_some() {
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        self.pending = 0;
        trace!(freed, live = self.live, "collected");
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builtins::Builtin;
    use crate::runtime::value::Code;

    #[test]
    fn test_unreachable_slots_are_freed_and_reused() {
        let mut heap = Heap::new();
        let kept = heap.alloc_object(Object::new());
        let dropped = heap.alloc_object(Object::new());
        assert_eq!(heap.collect([&kept]), 1);
        assert_eq!(heap.live(), 1);

        let reused = heap.alloc_cell(Value::Nil);
        assert_eq!(reused.handle(), dropped.handle());
    }

    #[test]
    fn test_reachability_through_fields_envs_and_cells() {
        let mut heap = Heap::new();
        let inner = heap.alloc_object(Object::new());
        let cell = heap.alloc_cell(inner.clone());
        let env = heap.alloc_env(vec![cell]);
        let closure = Value::Closure(Code::Builtin(Builtin::Print), Some(env));
        let mut outer = Object::new();
        outer.set(b"f", closure);
        let root = heap.alloc_object(outer);

        assert_eq!(heap.collect([&root]), 0);
        assert_eq!(heap.live(), 4);
        assert_eq!(heap.collect(std::iter::empty()), 4);
        assert!(heap.object(inner.handle().unwrap()).is_none());
    }
}
