//! Runtime for generated images
//!
//! - `value` - Tagged values and handles
//! - `tree` - Unbalanced byte-keyed search tree backing objects
//! - `object` - Keyed mutable objects with seal and copy
//! - `array` - Amortized-growth dynamic array
//! - `heap` - Handle arena with mark-and-sweep collection
//! - `ops` - Comparison, arithmetic, truthiness and rendering
//! - `builtins` - Provided functions
//! - `machine` - Trampoline executing an [`crate::codegen::Image`]

pub mod array;
pub mod builtins;
pub mod heap;
pub mod machine;
pub mod object;
pub mod ops;
pub mod tree;
pub mod value;

pub use array::DynArray;
pub use builtins::Builtin;
pub use heap::{Heap, HeapObject};
pub use machine::{ExitStatus, Machine, MachineConfig, Outcome};
pub use object::Object;
pub use tree::Tree;
pub use value::{Code, Handle, RString, Value};

use thiserror::Error;

/// Failures inside the running program. These never abort the machine by
/// themselves: they are turned into exception values and handed to the
/// current hidden object's `throw` field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("arity mismatch: expected {expected}, got {found}")]
    ArityMismatch { expected: String, found: usize },

    #[error("type mismatch in {op}: expected {expected}, got {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown value type in {op}")]
    UnknownType { op: &'static str },

    #[error("unsupported operation {op} on {left} and {right}")]
    UnsupportedOperation {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot add key {key:?} to a sealed object")]
    SealedObject { key: String },

    #[error("missing field {key:?}")]
    MissingField { key: String },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{kind} value is not callable")]
    NotCallable { kind: &'static str },

    #[error("cannot print a {kind} value")]
    Unprintable { kind: &'static str },

    #[error("integer overflow in {op}")]
    Overflow { op: &'static str },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Conditions that stop the machine outright
#[derive(Error, Debug)]
pub enum Fault {
    #[error("exception raised with no handler installed: {0}")]
    NoHandler(String),

    #[error("malformed image: {0}")]
    BadImage(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a builtin or an instruction did not produce the next transfer
#[derive(Debug)]
pub enum Interrupt {
    /// Routed to the hidden object's `throw` handler
    Error(RuntimeError),
    Fault(Fault),
}

impl From<RuntimeError> for Interrupt {
    fn from(e: RuntimeError) -> Self {
        Interrupt::Error(e)
    }
}

impl From<Fault> for Interrupt {
    fn from(e: Fault) -> Self {
        Interrupt::Fault(e)
    }
}

impl From<std::io::Error> for Interrupt {
    fn from(e: std::io::Error) -> Self {
        Interrupt::Fault(Fault::Io(e))
    }
}
