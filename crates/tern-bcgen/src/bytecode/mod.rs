//! Bytecode output
//!
//! Data structures produced by generation: the per-function sink and its
//! finalized functions, the string table, literal buffers, debug tables and
//! the module that ties them together.

pub mod debug_info;
pub mod function;
pub mod generator;
pub mod literals;
pub mod module;
pub mod strings;

pub use debug_info::{DebugInfo, DebugInfoGenerator, FileAndSourceMapId, FileAndSourceMapIdCache};
pub use function::{
    BytecodeFunction, DebugOffsets, DebugSourceLocation, ExceptionHandlerInfo, FuncKind,
    FunctionHeader, FunctionHeaderFlags,
};
pub use generator::BytecodeFunctionGenerator;
pub use literals::{LiteralBufferBuilder, LiteralBuffers, LiteralOffsets, LiteralTag};
pub use module::{BytecodeModule, BytecodeOptions, DynamicCjsModule, StaticCjsModule};
pub use strings::{
    encode_source_text, SourceTextEncoder, StringAccumulator, StringKind, StringKindRun,
    StringTable,
};
