//! The provided-name table
//!
//! These bindings seed the root scope before annotation and are the only
//! names allowed to stay free in a whole program. The machine supplies a
//! value for each of them at startup.

use crate::names::Name;

/// Bumped whenever a name is added, removed or changes meaning.
pub const PROVIDED_VERSION: u32 = 2;

/// User-visible builtins, in root-scope order
pub const PROVIDED_NAMES: &[&str] = &[
    "Array",
    "new_object",
    "seal_object",
    "copy_object",
    "if",
    "print",
    "throw",
    "try",
    "true",
    "false",
    "+",
    "-",
    "*",
    "/",
    "%",
    "<",
    ">",
    "<=",
    ">=",
    "==",
    "!=",
];

/// Null-value sentinel used as the placeholder of a definition
pub const NULL: &str = "null";
/// Ambient continuation of the program and of every function body
pub const CONTINUATION: &str = "cont";
/// Dynamically scoped handler object carrying the `throw` field
pub const HIDDEN: &str = "hidden";

pub const RESERVED_NAMES: &[&str] = &[NULL, CONTINUATION, HIDDEN];

pub fn null_name() -> Name {
    Name::reserved(NULL)
}

pub fn continuation_name() -> Name {
    Name::reserved(CONTINUATION)
}

pub fn hidden_name() -> Name {
    Name::reserved(HIDDEN)
}

/// Every provided binding: builtins first, then the reserved names
pub fn provided_names() -> Vec<Name> {
    PROVIDED_NAMES
        .iter()
        .map(|text| Name::user(*text))
        .chain(RESERVED_NAMES.iter().map(|text| Name::reserved(text)))
        .collect()
}

pub fn is_provided(name: &Name) -> bool {
    if name.is_synthesized() {
        RESERVED_NAMES.contains(&name.text.as_str())
    } else {
        PROVIDED_NAMES.contains(&name.text.as_str())
    }
}
