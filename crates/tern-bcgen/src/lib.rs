//! Tern Bytecode Backend
//!
//! This crate turns optimized SSA IR into interpreter bytecode:
//! - **IR**: Arena-based functions, blocks and instructions (`ir` module)
//! - **Analysis**: Dominator tree and block orderings (`analysis` module)
//! - **Lowering**: IR-to-IR passes that bring the IR close to the bytecode (`lower` module)
//! - **Bytecode**: Function sink, string table, literal buffers, debug tables (`bytecode` module)
//! - **Codegen**: Backend traits and the module generator (`codegen` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use tern_bcgen::{BytecodeGenerationOptions, BytecodeModuleGenerator, Module};
//!
//! let mut module: Module = build_ir();
//! let entry = module.function_ids().next().unwrap();
//!
//! let generator = BytecodeModuleGenerator::new(&mut module, MyBackend::new(), BytecodeGenerationOptions::optimized());
//! let bytecode = generator.generate(entry, None)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Control-flow analyses
pub mod analysis;

/// Bytecode output structures
pub mod bytecode;

/// Backend traits and module generation
pub mod codegen;

/// Generation options
pub mod config;

/// Error types
pub mod error;

/// Intermediate representation
pub mod ir;

/// Lowering passes
pub mod lower;

// ============================================================================
// Re-exports
// ============================================================================

pub use bytecode::{BytecodeFunction, BytecodeFunctionGenerator, BytecodeModule, StringTable};
pub use codegen::{BytecodeModuleGenerator, CodegenBackend, RegisterAllocator, SelectionContext};
pub use config::{BytecodeGenerationOptions, PackingCostModel};
pub use error::{ConfigError, Diagnostic, GenerationError, Severity};
pub use ir::{Function, FunctionId, InstKind, Module, Value};
pub use lower::{LowerPass, LoweringPipeline};
