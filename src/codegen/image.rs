//! Executable image produced by the code generator
//!
//! One [`CodeBlock`] per callable plus one for the program entry. A block
//! runs its instructions in order and ends in exactly one [`Transfer`];
//! nothing ever returns, so the machine needs no call stack.

use std::rc::Rc;

use crate::names::Name;

pub type BlockId = usize;

/// Frame slot of a block; boxed slots hold a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub index: u32,
    pub boxed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Local(Slot),
    /// Environment entry; `boxed` entries hold a cell
    Env { index: u32, boxed: bool },
    Global(u32),
    Integer(i64),
    Float(f64),
    Str { bytes: Rc<[u8]>, byte_oriented: bool },
}

/// Where a closure's captured entry is read from, without unboxing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Local(u32),
    Env(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    Use(Operand),
    /// `object[key]`
    Field { object: Operand, key: Operand },
    /// New closure over `block`: captures first, then default values
    Closure {
        block: BlockId,
        captures: Vec<Capture>,
        defaults: Vec<Operand>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Local(Slot),
    Env { index: u32, boxed: bool },
    Global(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Initialize a slot, allocating a fresh cell when it is boxed
    Define { slot: Slot, value: Rvalue },
    /// Overwrite an existing binding
    Store { place: Place, value: Rvalue },
    SetField {
        object: Operand,
        key: Operand,
        value: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub callee: Operand,
    pub left: Vec<Operand>,
    pub right: Vec<Operand>,
    pub named: Vec<(Rc<[u8]>, Operand)>,
    pub continuation: Option<Operand>,
    pub hidden: Operand,
}

/// Parameter slots of one side of a callable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamLayout {
    pub required: Vec<Slot>,
    /// Slot and the environment index holding its default
    pub optional: Vec<(Slot, u32)>,
    pub arbitrary: Option<Slot>,
    pub keyword: Option<Slot>,
}

impl ParamLayout {
    pub fn describe(&self) -> String {
        let min = self.required.len();
        if self.arbitrary.is_some() {
            format!("at least {}", min)
        } else if self.optional.is_empty() {
            min.to_string()
        } else {
            format!("{} to {}", min, min + self.optional.len())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    /// Label for dumps and traces
    pub label: String,
    pub is_function: bool,
    pub frame_size: u32,
    /// Slots receiving the continuation and the hidden object
    pub implicit: Option<(Slot, Slot)>,
    pub left: ParamLayout,
    pub right: ParamLayout,
    /// Number of environment entries holding captures
    pub captures: u32,
    pub instructions: Vec<Instruction>,
    pub transfer: Transfer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub blocks: Vec<CodeBlock>,
    pub entry: BlockId,
    /// Provided name of each global index
    pub globals: Vec<Name>,
    pub gc: bool,
    pub gc_threshold: usize,
}

impl Image {
    pub fn block(&self, id: BlockId) -> Option<&CodeBlock> {
        self.blocks.get(id)
    }
}
