//! Duplex compiler backend: AST → IR → CPS → Image
//!
//! 1. Lower the AST to a flat statement IR (`lower`)
//! 2. CPS-transform the IR into calls that never return (`cps_transform`)
//! 3. Check that every name is bound, then assign varids and compute
//!    captures and boxing (`annotate`)
//! 4. Eta-reduce forwarding continuations (`optimize`)
//! 5. Generate the executable image (`emit`)

pub mod annotate;
pub mod cps;
pub mod cps_transform;
pub mod emit;
pub mod image;
pub mod ir;
pub mod lower;
pub mod optimize;
pub mod provided;
pub mod scope;

pub use annotate::{annotate, check_free_names, Annotations};
pub use cps_transform::cps_transform;
pub use emit::generate;
pub use image::Image;
pub use lower::lower_program;
pub use optimize::compact;
pub use scope::VarIdGen;
