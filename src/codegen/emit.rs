//! Code generation: annotated CPS to [`Image`]
//!
//! Each callable becomes a code block. Its binders get frame slots, its
//! free variables become environment entries in annotation order, and the
//! defaults of its optional parameters follow the captures in the same
//! environment. Variables the annotator marked as boxed live in cells, so a
//! capture copies the cell and every closure sees later writes.
//!
//! Non-atomic operands (field reads, nested callables) are first stored in a
//! temporary slot.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::annotate::Annotations;
use super::cps::{Arg, ArgGroup, Callable, Expression, Value, VarId, Variable};
use super::image::{
    BlockId, Capture, CodeBlock, Image, Instruction, Operand, ParamLayout, Place, Rvalue, Slot,
    Transfer,
};
use crate::errors::{CompileError, CompileResult};

/// Generate the image for an annotated program
pub fn generate(
    program: &Expression,
    notes: &Annotations,
    gc: bool,
    gc_threshold: usize,
) -> CompileResult<Image> {
    let mut generator = Generator {
        notes,
        globals: notes
            .globals
            .iter()
            .enumerate()
            .map(|(index, (id, _))| (*id, index as u32))
            .collect(),
        blocks: Vec::new(),
    };

    let mut frame = Frame::default();
    let transfer = generator.expression(&mut frame, program)?;
    generator.blocks.push(CodeBlock {
        label: "entry".to_string(),
        is_function: false,
        frame_size: frame.size,
        implicit: None,
        left: ParamLayout::default(),
        right: ParamLayout::default(),
        captures: 0,
        instructions: frame.instructions,
        transfer,
    });

    let image = Image {
        entry: generator.blocks.len() - 1,
        blocks: generator.blocks,
        globals: notes.globals.iter().map(|(_, name)| name.clone()).collect(),
        gc,
        gc_threshold,
    };
    debug!(blocks = image.blocks.len(), gc, "generated image");
    Ok(image)
}

struct Generator<'a> {
    notes: &'a Annotations,
    /// Global index of each provided name's id
    globals: HashMap<VarId, u32>,
    /// Finished blocks; children are pushed before their parents
    blocks: Vec<CodeBlock>,
}

/// Block under construction
#[derive(Default)]
struct Frame {
    locals: HashMap<VarId, Slot>,
    env: HashMap<VarId, u32>,
    size: u32,
    instructions: Vec<Instruction>,
}

impl Frame {
    fn slot(&mut self, boxed: bool) -> Slot {
        let slot = Slot {
            index: self.size,
            boxed,
        };
        self.size += 1;
        slot
    }
}

impl Generator<'_> {
    fn bind(&self, frame: &mut Frame, var: &Variable) -> CompileResult<Slot> {
        let id = var.varid()?;
        let slot = frame.slot(self.notes.is_boxed(id));
        frame.locals.insert(id, slot);
        Ok(slot)
    }

    fn place(&self, frame: &Frame, var: &Variable) -> CompileResult<Place> {
        let id = var.varid()?;
        if let Some(slot) = frame.locals.get(&id) {
            Ok(Place::Local(*slot))
        } else if let Some(index) = frame.env.get(&id) {
            Ok(Place::Env {
                index: *index,
                boxed: self.notes.is_boxed(id),
            })
        } else if let Some(index) = self.globals.get(&id) {
            Ok(Place::Global(*index))
        } else {
            Err(CompileError::VarMissing {
                name: var.name.to_string(),
            })
        }
    }

    fn variable(&self, frame: &Frame, var: &Variable) -> CompileResult<Operand> {
        Ok(match self.place(frame, var)? {
            Place::Local(slot) => Operand::Local(slot),
            Place::Env { index, boxed } => Operand::Env { index, boxed },
            Place::Global(index) => Operand::Global(index),
        })
    }

    fn capture(&self, frame: &Frame, id: VarId) -> CompileResult<Capture> {
        if let Some(slot) = frame.locals.get(&id) {
            Ok(Capture::Local(slot.index))
        } else if let Some(index) = frame.env.get(&id) {
            Ok(Capture::Env(*index))
        } else {
            Err(CompileError::VarMissing {
                name: format!("#{}", id),
            })
        }
    }

    fn operand(&mut self, frame: &mut Frame, value: &Value) -> CompileResult<Operand> {
        match value {
            Value::VariableRef(var) => self.variable(frame, var),
            Value::Integer(n) => Ok(Operand::Integer(*n)),
            Value::Float(x) => Ok(Operand::Float(*x)),
            Value::Str {
                bytes,
                byte_oriented,
            } => Ok(Operand::Str {
                bytes: Rc::from(bytes.as_slice()),
                byte_oriented: *byte_oriented,
            }),
            Value::Field { .. } | Value::Callable(_) => {
                let value = self.rvalue(frame, value)?;
                let slot = frame.slot(false);
                frame.instructions.push(Instruction::Define { slot, value });
                Ok(Operand::Local(slot))
            }
        }
    }

    fn rvalue(&mut self, frame: &mut Frame, value: &Value) -> CompileResult<Rvalue> {
        match value {
            Value::Field { object, key } => Ok(Rvalue::Field {
                object: self.variable(frame, object)?,
                key: self.operand(frame, key)?,
            }),
            Value::Callable(callable) => {
                let defaults = callable
                    .left
                    .optional
                    .iter()
                    .chain(&callable.right.optional)
                    .map(|(_, default)| self.operand(frame, default))
                    .collect::<CompileResult<Vec<_>>>()?;
                let captures = callable
                    .free
                    .iter()
                    .map(|id| self.capture(frame, *id))
                    .collect::<CompileResult<Vec<_>>>()?;
                let block = self.callable(callable)?;
                Ok(Rvalue::Closure {
                    block,
                    captures,
                    defaults,
                })
            }
            other => Ok(Rvalue::Use(self.operand(frame, other)?)),
        }
    }

    fn params(
        &self,
        frame: &mut Frame,
        group: &ArgGroup,
        next_default: &mut u32,
    ) -> CompileResult<ParamLayout> {
        let mut layout = ParamLayout::default();
        for var in &group.required {
            layout.required.push(self.bind(frame, var)?);
        }
        for (var, _) in &group.optional {
            layout.optional.push((self.bind(frame, var)?, *next_default));
            *next_default += 1;
        }
        if let Some(var) = &group.arbitrary {
            layout.arbitrary = Some(self.bind(frame, var)?);
        }
        if let Some(var) = &group.keyword {
            layout.keyword = Some(self.bind(frame, var)?);
        }
        Ok(layout)
    }

    fn callable(&mut self, callable: &Callable) -> CompileResult<BlockId> {
        let mut frame = Frame::default();
        for (index, id) in callable.free.iter().enumerate() {
            frame.env.insert(*id, index as u32);
        }
        let captures = callable.free.len() as u32;

        let implicit = match &callable.implicit {
            Some(implicit) => Some((
                self.bind(&mut frame, &implicit.continuation)?,
                self.bind(&mut frame, &implicit.hidden)?,
            )),
            None => None,
        };
        let mut next_default = captures;
        let left = self.params(&mut frame, &callable.left, &mut next_default)?;
        let right = self.params(&mut frame, &callable.right, &mut next_default)?;

        let transfer = self.expression(&mut frame, &callable.body)?;
        let id = self.blocks.len();
        let kind = if callable.is_function { "fn" } else { "k" };
        self.blocks.push(CodeBlock {
            label: format!("{}{}", kind, id),
            is_function: callable.is_function,
            frame_size: frame.size,
            implicit,
            left,
            right,
            captures,
            instructions: frame.instructions,
            transfer,
        });
        Ok(id)
    }

    /// Emit the straight-line part of `expr` and return its final transfer
    fn expression(&mut self, frame: &mut Frame, expr: &Expression) -> CompileResult<Transfer> {
        let mut current = expr;
        loop {
            match current {
                Expression::Assignment {
                    assignee,
                    value,
                    local,
                    next,
                } => {
                    let value = self.rvalue(frame, value)?;
                    let instruction = if *local {
                        Instruction::Define {
                            slot: self.bind(frame, assignee)?,
                            value,
                        }
                    } else {
                        Instruction::Store {
                            place: self.place(frame, assignee)?,
                            value,
                        }
                    };
                    frame.instructions.push(instruction);
                    current = next.as_ref();
                }
                Expression::ObjectMutation {
                    object,
                    key,
                    value,
                    next,
                } => {
                    let instruction = Instruction::SetField {
                        object: self.variable(frame, object)?,
                        key: self.operand(frame, key)?,
                        value: self.operand(frame, value)?,
                    };
                    frame.instructions.push(instruction);
                    current = next.as_ref();
                }
                Expression::Call {
                    callee,
                    left,
                    right,
                    continuation,
                    hidden,
                } => {
                    let callee = self.operand(frame, callee)?;
                    let left = left
                        .iter()
                        .map(|arg| self.operand(frame, arg.value()))
                        .collect::<CompileResult<Vec<_>>>()?;
                    let mut positional = Vec::new();
                    let mut named = Vec::new();
                    for arg in right {
                        match arg {
                            Arg::Positional(value) => positional.push(self.operand(frame, value)?),
                            Arg::Named(key, value) => {
                                named.push((Rc::from(key.as_slice()), self.operand(frame, value)?))
                            }
                        }
                    }
                    let continuation = continuation
                        .as_ref()
                        .map(|k| self.operand(frame, k))
                        .transpose()?;
                    let hidden = self.operand(frame, hidden)?;
                    return Ok(Transfer {
                        callee,
                        left,
                        right: positional,
                        named,
                        continuation,
                        hidden,
                    });
                }
            }
        }
    }
}
