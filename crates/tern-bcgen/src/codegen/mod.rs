//! Bytecode generation
//!
//! The backend seams ([`CodegenBackend`], [`RegisterAllocator`]) and the
//! module-level driver that calls them.

pub mod backend;
pub mod generator;

pub use backend::{CodegenBackend, RegisterAllocator, SelectionContext};
pub use generator::{BytecodeModuleGenerator, STRIPPED_FUNCTION_NAME};
