//! Trampoline executing an [`Image`]
//!
//! The machine holds a single pending transfer. Each turn of the loop either
//! enters a code block (bind parameters, run its instructions, read its
//! terminating transfer) or invokes a builtin. Host recursion never grows
//! with the program's call depth.
//!
//! Runtime errors become string exceptions delivered to the `throw` field of
//! the hidden object that was current when the error happened.

use std::io::Write;
use std::rc::Rc;

use tracing::{debug, trace};

use super::array::DynArray;
use super::builtins::{self, ARRAY_METHODS};
use super::heap::Heap;
use super::object::Object;
use super::value::{Code, Handle, RString, Value};
use super::{Fault, Interrupt, RuntimeError};
use crate::codegen::image::{
    BlockId, Capture, CodeBlock, Image, Instruction, Operand, ParamLayout, Place, Rvalue, Slot,
    Transfer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub gc: bool,
    /// Allocations between collections
    pub gc_threshold: usize,
}

impl MachineConfig {
    pub fn from_image(image: &Image) -> Self {
        Self {
            gc: image.gc,
            gc_threshold: image.gc_threshold.max(1),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The initial continuation was called
    Exit(Value),
    /// An exception reached the initial hidden object
    Uncaught(Value),
}

/// Process exit code for an [`Outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    /// Integers are used as is, Nil exits 0, other values by truthiness
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Integer(n) => ExitStatus(*n as i32),
            Value::Nil => ExitStatus(0),
            other if super::ops::is_true(other) => ExitStatus(0),
            _ => ExitStatus(1),
        }
    }

    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Exit(value) => Self::from_value(value),
            Outcome::Uncaught(_) => ExitStatus(1),
        }
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

/// Transfer with every operand evaluated
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub(crate) callee: Value,
    pub(crate) left: Vec<Value>,
    pub(crate) right: Vec<Value>,
    pub(crate) named: Vec<(Rc<[u8]>, Value)>,
    /// Nil when the transfer carried no continuation
    pub(crate) continuation: Value,
    pub(crate) hidden: Value,
}

impl Pending {
    /// Call `callee` with right positional arguments only
    pub(crate) fn call(callee: Value, right: Vec<Value>, continuation: Value, hidden: Value) -> Self {
        Self {
            callee,
            left: Vec::new(),
            right,
            named: Vec::new(),
            continuation,
            hidden,
        }
    }

    fn values(&self) -> impl Iterator<Item = &Value> {
        std::iter::once(&self.callee)
            .chain(&self.left)
            .chain(&self.right)
            .chain(self.named.iter().map(|(_, v)| v))
            .chain([&self.continuation, &self.hidden])
    }
}

pub(crate) enum Step {
    Transfer(Pending),
    Halt(Outcome),
}

pub struct Machine<'img, W> {
    image: &'img Image,
    config: MachineConfig,
    heap: Heap,
    globals: Vec<Value>,
    output: W,
    transfers: u64,
}

impl<'img, W: Write> Machine<'img, W> {
    pub fn new(image: &'img Image, output: W) -> Result<Self, Fault> {
        let mut heap = Heap::new();
        let globals = image
            .globals
            .iter()
            .map(|name| builtins::provided_value(name, &mut heap))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            image,
            config: MachineConfig::from_image(image),
            heap,
            globals,
            output,
            transfers: 0,
        })
    }

    pub fn with_config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Transfers executed so far
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run from the entry block until the program halts
    pub fn run(&mut self) -> Result<Outcome, Fault> {
        let root_hidden = self.root_hidden()?;
        let mut pending = Pending::call(
            Value::Closure(Code::Block(self.image.entry), None),
            Vec::new(),
            Value::Nil,
            root_hidden,
        );
        loop {
            self.transfers += 1;
            self.maybe_collect(&pending);
            let hidden = pending.hidden.clone();
            let step = match pending.callee.clone() {
                Value::Closure(Code::Block(id), env) => self.enter(id, env, pending).map(Step::Transfer),
                Value::Closure(Code::Builtin(builtin), env) => builtin.invoke(self, env, pending),
                other => Err(RuntimeError::NotCallable {
                    kind: other.type_name(),
                }
                .into()),
            };
            pending = match step {
                Ok(Step::Transfer(next)) => next,
                Ok(Step::Halt(outcome)) => {
                    debug!(transfers = self.transfers, live = self.heap.live(), ?outcome, "halted");
                    self.output.flush()?;
                    return Ok(outcome);
                }
                Err(Interrupt::Fault(fault)) => return Err(fault),
                Err(Interrupt::Error(error)) => self.raise(error, hidden)?,
            };
        }
    }

    fn root_hidden(&self) -> Result<Value, Fault> {
        self.image
            .globals
            .iter()
            .position(|name| name == &crate::codegen::provided::hidden_name())
            .and_then(|index| self.globals.get(index).cloned())
            .ok_or_else(|| Fault::BadImage("no hidden object among the globals".to_string()))
    }

    fn maybe_collect(&mut self, pending: &Pending) {
        if !self.config.gc || self.heap.allocations_since_collect() < self.config.gc_threshold {
            return;
        }
        let freed = self.heap.collect(self.globals.iter().chain(pending.values()));
        trace!(freed, live = self.heap.live(), "collection at transfer {}", self.transfers);
    }

    /// Hand `error` to the `throw` handler of `hidden`
    fn raise(&mut self, error: RuntimeError, hidden: Value) -> Result<Pending, Fault> {
        debug!(%error, "raising runtime error");
        let message = error.to_string();
        match self.throw_handler(&hidden) {
            Ok(handler) => Ok(Pending::call(
                handler,
                vec![Value::str(&message)],
                Value::Nil,
                hidden,
            )),
            Err(_) => Err(Fault::NoHandler(message)),
        }
    }

    pub(crate) fn throw_handler(&self, hidden: &Value) -> Result<Value, Fault> {
        let Value::Object(handle) = hidden else {
            return Err(Fault::NoHandler(format!("hidden value is {}", hidden.type_name())));
        };
        self.heap
            .object(*handle)
            .and_then(|object| object.get(b"throw"))
            .cloned()
            .ok_or_else(|| Fault::NoHandler("hidden object has no throw field".to_string()))
    }

    fn enter(
        &mut self,
        id: BlockId,
        env: Option<Handle>,
        call: Pending,
    ) -> Result<Pending, Interrupt> {
        let image = self.image;
        let block = image
            .block(id)
            .ok_or_else(|| Fault::BadImage(format!("no block {}", id)))?;
        trace!(block = %block.label, "enter");
        let mut frame = vec![Value::Nil; block.frame_size as usize];

        if let Some((continuation, hidden)) = block.implicit {
            self.init(&mut frame, continuation, call.continuation)?;
            self.init(&mut frame, hidden, call.hidden)?;
        }
        self.bind(&mut frame, env, block, &block.left, call.left, Vec::new())?;
        self.bind(&mut frame, env, block, &block.right, call.right, call.named)?;

        for instruction in &block.instructions {
            self.execute(&mut frame, env, instruction)?;
        }
        self.transfer(&frame, env, &block.transfer)
    }

    fn bind(
        &mut self,
        frame: &mut [Value],
        env: Option<Handle>,
        block: &CodeBlock,
        layout: &ParamLayout,
        positional: Vec<Value>,
        named: Vec<(Rc<[u8]>, Value)>,
    ) -> Result<(), Interrupt> {
        let found = positional.len();
        let mismatch = || RuntimeError::ArityMismatch {
            expected: format!("{} for {}", layout.describe(), block.label),
            found,
        };
        if found < layout.required.len() {
            return Err(mismatch().into());
        }

        let mut args = positional.into_iter();
        for slot in &layout.required {
            let value = args.next().unwrap_or(Value::Nil);
            self.init(frame, *slot, value)?;
        }
        for (slot, default) in &layout.optional {
            let value = match args.next() {
                Some(value) => value,
                None => self.env_entry(env, *default)?,
            };
            self.init(frame, *slot, value)?;
        }

        let rest: Vec<Value> = args.collect();
        match layout.arbitrary {
            Some(slot) => {
                let array = self.new_array(rest);
                self.init(frame, slot, array)?;
            }
            None if !rest.is_empty() => return Err(mismatch().into()),
            None => {}
        }

        match layout.keyword {
            Some(slot) => {
                let mut keywords = Object::new();
                for (key, value) in named {
                    keywords.set(&key, value);
                }
                let object = self.heap.alloc_object(keywords);
                self.init(frame, slot, object)?;
            }
            None if !named.is_empty() => {
                return Err(RuntimeError::ArityMismatch {
                    expected: format!("no named arguments for {}", block.label),
                    found: named.len(),
                }
                .into())
            }
            None => {}
        }
        Ok(())
    }

    /// Store a fresh binding, boxing it when the slot is boxed
    fn init(&mut self, frame: &mut [Value], slot: Slot, value: Value) -> Result<(), Fault> {
        let value = if slot.boxed {
            self.heap.alloc_cell(value)
        } else {
            value
        };
        *frame_slot(frame, slot.index)? = value;
        Ok(())
    }

    pub(crate) fn env_entry(&self, env: Option<Handle>, index: u32) -> Result<Value, Fault> {
        env.and_then(|h| self.heap.env(h))
            .and_then(|values| values.get(index as usize))
            .cloned()
            .ok_or_else(|| Fault::BadImage(format!("missing environment entry {}", index)))
    }

    fn unbox(&self, value: &Value) -> Result<Value, Fault> {
        match value {
            Value::Cell(h) => self
                .heap
                .cell(*h)
                .cloned()
                .ok_or_else(|| Fault::BadImage("dangling cell".to_string())),
            _ => Err(Fault::BadImage(format!(
                "expected a cell, found {}",
                value.type_name()
            ))),
        }
    }

    fn write_cell(&mut self, cell: &Value, value: Value) -> Result<(), Fault> {
        let target = cell
            .handle()
            .and_then(|h| self.heap.cell_mut(h))
            .ok_or_else(|| Fault::BadImage("store through a non-cell".to_string()))?;
        *target = value;
        Ok(())
    }

    fn read(&self, frame: &[Value], env: Option<Handle>, operand: &Operand) -> Result<Value, Fault> {
        Ok(match operand {
            Operand::Local(slot) => {
                let value = frame
                    .get(slot.index as usize)
                    .ok_or_else(|| Fault::BadImage(format!("no slot {}", slot.index)))?;
                if slot.boxed {
                    self.unbox(value)?
                } else {
                    value.clone()
                }
            }
            Operand::Env { index, boxed } => {
                let value = self.env_entry(env, *index)?;
                if *boxed {
                    self.unbox(&value)?
                } else {
                    value
                }
            }
            Operand::Global(index) => self
                .globals
                .get(*index as usize)
                .cloned()
                .ok_or_else(|| Fault::BadImage(format!("no global {}", index)))?,
            Operand::Integer(n) => Value::Integer(*n),
            Operand::Float(x) => Value::Float(*x),
            Operand::Str {
                bytes,
                byte_oriented,
            } => Value::Str(RString::new(bytes.clone(), *byte_oriented)),
        })
    }

    fn evaluate(
        &mut self,
        frame: &[Value],
        env: Option<Handle>,
        rvalue: &Rvalue,
    ) -> Result<Value, Interrupt> {
        match rvalue {
            Rvalue::Use(operand) => Ok(self.read(frame, env, operand)?),
            Rvalue::Field { object, key } => {
                let object = self.read(frame, env, object)?;
                let key = self.read(frame, env, key)?;
                self.get_field(&object, &key)
            }
            Rvalue::Closure {
                block,
                captures,
                defaults,
            } => {
                let mut values = Vec::with_capacity(captures.len() + defaults.len());
                for capture in captures {
                    values.push(match capture {
                        Capture::Local(index) => frame_value(frame, *index)?,
                        Capture::Env(index) => self.env_entry(env, *index)?,
                    });
                }
                for default in defaults {
                    values.push(self.read(frame, env, default)?);
                }
                let env = if values.is_empty() {
                    None
                } else {
                    Some(self.heap.alloc_env(values))
                };
                Ok(Value::Closure(Code::Block(*block), env))
            }
        }
    }

    fn execute(
        &mut self,
        frame: &mut [Value],
        env: Option<Handle>,
        instruction: &Instruction,
    ) -> Result<(), Interrupt> {
        match instruction {
            Instruction::Define { slot, value } => {
                let value = self.evaluate(frame, env, value)?;
                self.init(frame, *slot, value)?;
            }
            Instruction::Store { place, value } => {
                let value = self.evaluate(frame, env, value)?;
                match place {
                    Place::Local(slot) if slot.boxed => {
                        let cell = frame_value(frame, slot.index)?;
                        self.write_cell(&cell, value)?;
                    }
                    Place::Local(slot) => *frame_slot(frame, slot.index)? = value,
                    Place::Env { index, boxed: true } => {
                        let cell = self.env_entry(env, *index)?;
                        self.write_cell(&cell, value)?;
                    }
                    Place::Env { index, boxed: false } => {
                        return Err(Fault::BadImage(format!(
                            "store to unboxed environment entry {}",
                            index
                        ))
                        .into())
                    }
                    Place::Global(index) => {
                        let global = self
                            .globals
                            .get_mut(*index as usize)
                            .ok_or_else(|| Fault::BadImage(format!("no global {}", index)))?;
                        *global = value;
                    }
                }
            }
            Instruction::SetField { object, key, value } => {
                let object = self.read(frame, env, object)?;
                let key = self.read(frame, env, key)?;
                let value = self.read(frame, env, value)?;
                self.set_field(&object, &key, value)?;
            }
        }
        Ok(())
    }

    fn transfer(
        &self,
        frame: &[Value],
        env: Option<Handle>,
        transfer: &Transfer,
    ) -> Result<Pending, Interrupt> {
        let read_all = |operands: &[Operand]| {
            operands
                .iter()
                .map(|op| self.read(frame, env, op))
                .collect::<Result<Vec<_>, _>>()
        };
        let named = transfer
            .named
            .iter()
            .map(|(key, op)| Ok((key.clone(), self.read(frame, env, op)?)))
            .collect::<Result<Vec<_>, Fault>>()?;
        Ok(Pending {
            callee: self.read(frame, env, &transfer.callee)?,
            left: read_all(&transfer.left)?,
            right: read_all(&transfer.right)?,
            named,
            continuation: match &transfer.continuation {
                Some(k) => self.read(frame, env, k)?,
                None => Value::Nil,
            },
            hidden: self.read(frame, env, &transfer.hidden)?,
        })
    }

    pub(crate) fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub(crate) fn output(&mut self) -> &mut W {
        &mut self.output
    }

    pub(crate) fn object_mut(
        &mut self,
        value: &Value,
        op: &'static str,
    ) -> Result<&mut Object, RuntimeError> {
        let object = match value {
            Value::Object(h) => self.heap.object_mut(*h),
            _ => None,
        };
        object.ok_or(RuntimeError::TypeMismatch {
            op,
            expected: "Object",
            found: value.type_name(),
        })
    }

    /// Element storage of the array an array method closes over
    pub(crate) fn elements_mut(
        &mut self,
        env: Option<Handle>,
    ) -> Result<&mut DynArray<Value>, Interrupt> {
        let array = self.env_entry(env, 0)?;
        array
            .handle()
            .and_then(|h| self.heap.object_mut(h))
            .and_then(Object::elements_mut)
            .ok_or_else(|| Fault::BadImage("array method without an array".to_string()).into())
    }

    /// Allocate an array holding `items` with its sealed method fields
    pub(crate) fn new_array(&mut self, items: Vec<Value>) -> Value {
        let mut elements = DynArray::new();
        elements.extend(items);
        let array = self.heap.alloc_object(Object::array(elements));
        self.bind_array_methods(&array);
        array
    }

    /// Structural copy of `source`; a copied array gets methods bound to the copy
    pub(crate) fn copy_object(&mut self, source: &Value) -> Result<Value, RuntimeError> {
        let copy = match source {
            Value::Object(h) => self.heap.object(*h).map(Object::copy),
            _ => None,
        }
        .ok_or(RuntimeError::TypeMismatch {
            op: "copy_object",
            expected: "Object",
            found: source.type_name(),
        })?;
        let is_array = copy.elements().is_some();
        let copy = self.heap.alloc_object(copy);
        if is_array {
            self.bind_array_methods(&copy);
        }
        Ok(copy)
    }

    /// Point the array method fields of `array` at a fresh environment
    /// holding `array`. Fields overwritten with other values are left alone.
    fn bind_array_methods(&mut self, array: &Value) {
        let env = self.heap.alloc_env(vec![array.clone()]);
        let Some(object) = array.handle().and_then(|h| self.heap.object_mut(h)) else {
            return;
        };
        for (name, method) in ARRAY_METHODS {
            let rebind = match object.get(name.as_bytes()) {
                None => true,
                Some(Value::Closure(Code::Builtin(current), _)) => current == method,
                Some(_) => false,
            };
            if rebind {
                object.set(name.as_bytes(), Value::Closure(Code::Builtin(*method), Some(env)));
            }
        }
        object.seal();
    }

    fn get_field(&self, object: &Value, key: &Value) -> Result<Value, Interrupt> {
        let target = match object {
            Value::Object(h) => self.heap.object(*h),
            _ => None,
        }
        .ok_or(RuntimeError::TypeMismatch {
            op: "field access",
            expected: "Object",
            found: object.type_name(),
        })?;

        if let (Value::Integer(index), Some(elements)) = (key, target.elements()) {
            return usize::try_from(*index)
                .ok()
                .and_then(|i| elements.get(i))
                .cloned()
                .ok_or_else(|| {
                    RuntimeError::IndexOutOfBounds {
                        index: *index,
                        len: elements.len(),
                    }
                    .into()
                });
        }
        let key = key_bytes(key)?;
        target.get(&key).cloned().ok_or_else(|| {
            RuntimeError::MissingField {
                key: String::from_utf8_lossy(&key).into_owned(),
            }
            .into()
        })
    }

    fn set_field(&mut self, object: &Value, key: &Value, value: Value) -> Result<(), Interrupt> {
        let target = self.object_mut(object, "field assignment")?;
        if let (Value::Integer(index), Some(elements)) = (key, target.elements_mut()) {
            let len = elements.len();
            let slot = usize::try_from(*index)
                .ok()
                .and_then(|i| elements.get_mut(i))
                .ok_or(RuntimeError::IndexOutOfBounds { index: *index, len })?;
            *slot = value;
            return Ok(());
        }
        let key = key_bytes(key)?;
        if !target.set(&key, value) {
            return Err(RuntimeError::SealedObject {
                key: String::from_utf8_lossy(&key).into_owned(),
            }
            .into());
        }
        Ok(())
    }
}

/// Field key of a String or Integer value
fn key_bytes(key: &Value) -> Result<Vec<u8>, RuntimeError> {
    match key {
        Value::Str(s) => Ok(s.bytes().to_vec()),
        Value::Integer(n) => Ok(n.to_string().into_bytes()),
        other => Err(RuntimeError::TypeMismatch {
            op: "field key",
            expected: "String or Integer",
            found: other.type_name(),
        }),
    }
}

fn frame_slot(frame: &mut [Value], index: u32) -> Result<&mut Value, Fault> {
    frame
        .get_mut(index as usize)
        .ok_or_else(|| Fault::BadImage(format!("no slot {}", index)))
}

fn frame_value(frame: &[Value], index: u32) -> Result<Value, Fault> {
    frame
        .get(index as usize)
        .cloned()
        .ok_or_else(|| Fault::BadImage(format!("no slot {}", index)))
}
