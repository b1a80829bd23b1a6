//! Backend traits
//!
//! Register allocation and instruction selection are target specific and
//! live outside this crate. A backend plugs them into
//! [`BytecodeModuleGenerator`](super::BytecodeModuleGenerator) by
//! implementing [`CodegenBackend`].

use crate::bytecode::{
    BytecodeFunctionGenerator, DebugInfoGenerator, FileAndSourceMapId, FileAndSourceMapIdCache,
    LiteralBuffers, LiteralOffsets, StringTable,
};
use crate::config::BytecodeGenerationOptions;
use crate::error::GenerationError;
use crate::ir::{BlockId, Function, FunctionId, InstId, LiteralTable, Module, SourceLoc};
use rustc_hash::FxHashMap;

/// Assigns frame registers to the values of one function
pub trait RegisterAllocator {
    /// Functions with fewer instructions than this may use the fast allocator
    fn set_fast_pass_threshold(&mut self, instructions: usize);
    /// Memory the fast allocator may use, in bytes
    fn set_memory_limit(&mut self, bytes: u64);
    /// Allocate registers, visiting blocks in `order`
    fn allocate(&mut self, func: &Function, order: &[BlockId]);
    /// Number of registers the function needs
    fn max_register_usage(&self) -> u32;
}

/// A bytecode backend
pub trait CodegenBackend {
    /// Register allocator used by this backend
    type Allocator: RegisterAllocator;

    /// Create an allocator for `func`
    fn register_allocator(&mut self, func: &Function) -> Self::Allocator;

    /// Lowering that needs register assignments. Runs after allocation and
    /// before instruction selection; returns whether `func` changed.
    fn lower_allocated(
        &mut self,
        _func: &mut Function,
        _allocator: &mut Self::Allocator,
        _options: &BytecodeGenerationOptions,
    ) -> bool {
        false
    }

    /// Encode `func` into `sink`. A function that cannot be encoded is
    /// flagged with [`BytecodeFunctionGenerator::set_encoding_error`].
    ///
    /// The backend may finalize the sink itself (after patching jump-table
    /// offsets, which need the final code size). A sink left open is
    /// finalized by the module generator right after this returns, so no
    /// opcodes can be added afterwards.
    fn select_instructions(
        &mut self,
        func: &Function,
        allocator: &Self::Allocator,
        sink: &mut BytecodeFunctionGenerator,
        ctx: &mut SelectionContext<'_>,
    ) -> Result<(), GenerationError>;
}

/// Module-wide data available to instruction selection
pub struct SelectionContext<'a> {
    pub(crate) function: FunctionId,
    pub(crate) module: &'a Module,
    pub(crate) strings: &'a StringTable,
    pub(crate) buffers: &'a LiteralBuffers,
    pub(crate) function_ids: &'a FxHashMap<FunctionId, u32>,
    pub(crate) file_ids: &'a mut FileAndSourceMapIdCache,
    pub(crate) debug_info: &'a mut DebugInfoGenerator,
}

impl<'a> SelectionContext<'a> {
    /// IR handle of the function being selected
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Interned literals of the module
    pub fn literals(&self) -> &'a LiteralTable {
        &self.module.literals
    }

    /// ID of a string operand
    pub fn string_id(&self, text: &str) -> Result<u32, GenerationError> {
        self.strings
            .id_of(text)
            .ok_or_else(|| GenerationError::MissingString(text.to_string()))
    }

    /// ID of an identifier operand
    pub fn identifier_id(&self, text: &str) -> Result<u32, GenerationError> {
        self.strings
            .identifier_id(text)
            .ok_or_else(|| GenerationError::MissingString(text.to_string()))
    }

    /// Buffer offsets of an `AllocArray` or `AllocObjectFromBuffer`
    pub fn literal_offsets(&self, inst: InstId) -> Option<LiteralOffsets> {
        self.buffers.offsets(self.function, inst)
    }

    /// Bytecode ID of a function referenced from this one
    pub fn bytecode_function_id(&self, func: FunctionId) -> Result<u32, GenerationError> {
        self.function_ids
            .get(&func)
            .copied()
            .ok_or(GenerationError::UnknownFunction(func))
    }

    /// Debug file IDs for the source buffer of `loc`
    pub fn file_and_source_map_id(&mut self, loc: SourceLoc) -> FileAndSourceMapId {
        let module = self.module;
        let debug_info = &mut *self.debug_info;
        self.file_ids.get_or_insert_with(loc.buffer, || FileAndSourceMapId {
            filename_id: debug_info.add_filename(module.source_file(loc.buffer).unwrap_or("")),
            source_map_url_id: 0,
        })
    }

    /// The shared debug-table generator
    pub fn debug_info(&mut self) -> &mut DebugInfoGenerator {
        self.debug_info
    }
}
