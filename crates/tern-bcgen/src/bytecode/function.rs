//! Finalized bytecode functions
//!
//! A [`BytecodeFunction`] is produced once per function by
//! [`BytecodeFunctionGenerator`](super::generator::BytecodeFunctionGenerator)
//! and never modified afterwards.

use crate::ir::{FunctionKind, ProhibitInvoke};

/// Function kind as encoded in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuncKind {
    /// Plain function (including arrows)
    #[default]
    Normal = 0,
    /// Generator
    Generator = 1,
    /// Async function
    Async = 2,
}

impl From<FunctionKind> for FuncKind {
    fn from(kind: FunctionKind) -> Self {
        match kind {
            FunctionKind::Normal | FunctionKind::Arrow => FuncKind::Normal,
            FunctionKind::Generator => FuncKind::Generator,
            FunctionKind::Async => FuncKind::Async,
        }
    }
}

/// Flag bits of a function header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionHeaderFlags {
    /// Forbidden invocation forms
    pub prohibit_invoke: ProhibitInvoke,
    /// Strict-mode code
    pub strict_mode: bool,
    /// At least one exception handler
    pub has_exception_handler: bool,
    /// Debug offsets are attached
    pub has_debug_info: bool,
    /// Function kind
    pub kind: FuncKind,
}

impl FunctionHeaderFlags {
    /// Pack into one byte: bits 0-1 prohibit-invoke, bit 2 strict, bit 3
    /// exception handler, bit 4 debug info, bits 5-6 kind.
    pub fn to_bits(self) -> u8 {
        (self.prohibit_invoke as u8 & 0b11)
            | (u8::from(self.strict_mode) << 2)
            | (u8::from(self.has_exception_handler) << 3)
            | (u8::from(self.has_debug_info) << 4)
            | ((self.kind as u8 & 0b11) << 5)
    }
}

/// Per-function header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionHeader {
    /// Opcode bytes, excluding jump-table padding and the jump table
    pub bytecode_size_in_bytes: u32,
    /// Declared parameters including `this`
    pub param_count: u32,
    /// Number of frame registers
    pub frame_size: u32,
    /// String ID of the function name
    pub function_name: u32,
    /// Highest property-read inline cache index used
    pub highest_read_cache_index: u8,
    /// Highest property-write inline cache index used
    pub highest_write_cache_index: u8,
    /// Flags
    pub flags: FunctionHeaderFlags,
}

/// A try range and its handler, as byte offsets into the opcode stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandlerInfo {
    /// First covered byte
    pub start: u32,
    /// One past the last covered byte
    pub end: u32,
    /// Handler entry
    pub target: u32,
}

/// One source-location record of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugSourceLocation {
    /// Bytecode offset the record starts at
    pub address: u32,
    /// Debug file ID
    pub filename_id: u32,
    /// Source map URL string ID
    pub source_map_url_id: u32,
    /// Line (1-based)
    pub line: u32,
    /// Column (1-based)
    pub column: u32,
    /// Statement index within the function
    pub statement: u32,
}

/// Offsets of a function's records in the shared debug tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugOffsets {
    /// Offset into the source-location table
    pub source_locations: u32,
    /// Offset into the lexical-data table
    pub lexical_data: u32,
}

/// A finalized function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeFunction {
    header: FunctionHeader,
    opcodes: Vec<u8>,
    exception_handlers: Vec<ExceptionHandlerInfo>,
    debug_offsets: Option<DebugOffsets>,
}

impl BytecodeFunction {
    /// Assemble a function from its parts
    pub fn new(
        opcodes: Vec<u8>,
        header: FunctionHeader,
        exception_handlers: Vec<ExceptionHandlerInfo>,
    ) -> Self {
        Self { header, opcodes, exception_handlers, debug_offsets: None }
    }

    /// Attach debug-table offsets
    pub fn set_debug_offsets(&mut self, offsets: DebugOffsets) {
        self.header.flags.has_debug_info = true;
        self.debug_offsets = Some(offsets);
    }

    /// The header
    pub fn header(&self) -> &FunctionHeader {
        &self.header
    }

    /// Full stream: opcodes, padding and jump table
    pub fn opcodes(&self) -> &[u8] {
        &self.opcodes
    }

    /// Opcode bytes only
    pub fn bytecode(&self) -> &[u8] {
        &self.opcodes[..self.header.bytecode_size_in_bytes as usize]
    }

    /// Byte offset of the jump table (the code size rounded up to 4)
    pub fn jump_table_offset(&self) -> usize {
        align_to_4(self.header.bytecode_size_in_bytes as usize)
    }

    /// Decoded jump-table entries
    pub fn jump_table(&self) -> Vec<u32> {
        let start = self.jump_table_offset().min(self.opcodes.len());
        self.opcodes[start..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Exception handlers
    pub fn exception_handlers(&self) -> &[ExceptionHandlerInfo] {
        &self.exception_handlers
    }

    /// Debug-table offsets, if the function has debug info
    pub fn debug_offsets(&self) -> Option<DebugOffsets> {
        self.debug_offsets
    }
}

/// Round up to a multiple of 4
pub fn align_to_4(n: usize) -> usize {
    (n + 3) & !3
}
