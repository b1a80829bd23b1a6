//! Per-function bytecode sink
//!
//! Instruction selection writes opcodes, exception handlers, debug locations
//! and jump tables into a [`BytecodeFunctionGenerator`]. Once
//! [`bytecode_generation_complete`](BytecodeFunctionGenerator::bytecode_generation_complete)
//! has run, the generator is frozen and only its contents can be taken out.
//!
//! Multi-byte operands are always little-endian.

use super::function::{align_to_4, DebugSourceLocation, ExceptionHandlerInfo};
use crate::ir::SourceLoc;

/// Accumulates the bytecode of one function
#[derive(Debug, Default)]
pub struct BytecodeFunctionGenerator {
    opcodes: Vec<u8>,
    exception_handlers: Vec<ExceptionHandlerInfo>,
    debug_locations: Vec<DebugSourceLocation>,
    jump_table: Vec<u32>,
    /// Size of the opcode stream before padding, set on completion
    bytecode_size: u32,
    complete: bool,
    frame_size: u32,
    highest_read_cache_index: u8,
    highest_write_cache_index: u8,
    encoding_error: bool,
    source_location: Option<SourceLoc>,
    lexical_parent_id: Option<u32>,
    variable_names: Vec<String>,
}

impl BytecodeFunctionGenerator {
    /// Create a generator for a function using `frame_size` registers
    pub fn new(frame_size: u32) -> Self {
        Self { frame_size, ..Self::default() }
    }

    fn assert_not_complete(&self) {
        assert!(
            !self.complete,
            "Cannot modify BytecodeFunction after call to bytecode_generation_complete"
        );
    }

    // ===== Emission =====

    /// Current write offset
    pub fn current_offset(&self) -> u32 {
        self.opcodes.len() as u32
    }

    /// Emit an opcode byte and return its offset
    pub fn emit_opcode(&mut self, opcode: u8) -> u32 {
        let offset = self.current_offset();
        self.emit_u8(opcode);
        offset
    }

    /// Emit a u8 operand
    pub fn emit_u8(&mut self, value: u8) {
        self.assert_not_complete();
        self.opcodes.push(value);
    }

    /// Emit a u16 operand
    pub fn emit_u16(&mut self, value: u16) {
        self.assert_not_complete();
        self.opcodes.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a u32 operand
    pub fn emit_u32(&mut self, value: u32) {
        self.assert_not_complete();
        self.opcodes.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit an i32 operand
    pub fn emit_i32(&mut self, value: i32) {
        self.assert_not_complete();
        self.opcodes.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit an f64 operand
    pub fn emit_f64(&mut self, value: f64) {
        self.assert_not_complete();
        self.opcodes.extend_from_slice(&value.to_le_bytes());
    }

    /// The bytes emitted so far
    pub fn opcodes(&self) -> &[u8] {
        &self.opcodes
    }

    // ===== Jumps =====

    /// Overwrite `bytes` bytes at `loc` with `value`, little-endian
    pub fn update_jump_target(&mut self, loc: u32, value: i32, bytes: usize) {
        let loc = loc as usize;
        let encoded = value.to_le_bytes();
        self.opcodes[loc..loc + bytes].copy_from_slice(&encoded[..bytes]);
    }

    /// Turn the long jump whose 4-byte operand starts at `loc` into the short
    /// form. Removes three operand bytes and rewrites the opcode at `loc - 1`.
    /// Every later byte moves left by 3; callers fix up their own offsets.
    pub fn shrink_jump(&mut self, loc: u32, short_opcode: u8) {
        self.assert_not_complete();
        let loc = loc as usize;
        self.opcodes.drain(loc..loc + 3);
        self.opcodes[loc - 1] = short_opcode;
    }

    /// Append jump-table entries, returning the index of the first one
    pub fn add_jump_table(&mut self, entries: &[u32]) -> u32 {
        self.assert_not_complete();
        let start = self.jump_table.len() as u32;
        self.jump_table.extend_from_slice(entries);
        start
    }

    /// Patch the table-offset operand at `loc` of the switch instruction at
    /// `inst_loc` so it points at entry `table_index` of the jump table.
    /// Valid only once the opcode stream has its final size.
    pub fn update_jump_table_offset(&mut self, loc: u32, table_index: u32, inst_loc: u32) {
        debug_assert!(self.opcodes.len() as u32 > inst_loc, "invalid switch offset");
        // Unaligned here; the interpreter aligns it when reading.
        let offset = self.opcodes.len() as u32 + table_index * 4 - inst_loc;
        self.update_jump_target(loc, offset as i32, 4);
    }

    /// Freeze the opcode stream. If there is a jump table, pad to 4 bytes and
    /// append it.
    pub fn bytecode_generation_complete(&mut self) {
        assert!(!self.complete, "Can only call bytecode_generation_complete once");
        self.complete = true;
        self.bytecode_size = self.opcodes.len() as u32;

        if !self.jump_table.is_empty() {
            let aligned = align_to_4(self.opcodes.len());
            self.opcodes.reserve(aligned - self.opcodes.len() + self.jump_table.len() * 4);
            self.opcodes.resize(aligned, 0);
            for entry in &self.jump_table {
                self.opcodes.extend_from_slice(&entry.to_le_bytes());
            }
        }
    }

    /// Whether the stream has been frozen
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Code size recorded at completion
    pub fn bytecode_size(&self) -> u32 {
        self.bytecode_size
    }

    // ===== Exception handlers and debug info =====

    /// Record a try range
    pub fn add_exception_handler(&mut self, handler: ExceptionHandlerInfo) {
        self.assert_not_complete();
        self.exception_handlers.push(handler);
    }

    /// Record a source location. A record at the same address as the
    /// previous one replaces it, since nothing was emitted in between.
    pub fn add_debug_source_location(&mut self, info: DebugSourceLocation) {
        self.assert_not_complete();
        match self.debug_locations.last_mut() {
            Some(last) if last.address == info.address => *last = info,
            _ => self.debug_locations.push(info),
        }
    }

    /// Recorded source locations
    pub fn debug_locations(&self) -> &[DebugSourceLocation] {
        &self.debug_locations
    }

    /// Whether debug info should be emitted for this function
    pub fn has_debug_info(&self) -> bool {
        !self.debug_locations.is_empty()
    }

    /// Set where the function starts in source
    pub fn set_source_location(&mut self, loc: Option<SourceLoc>) {
        self.source_location = loc;
    }

    /// Where the function starts in source
    pub fn source_location(&self) -> Option<SourceLoc> {
        self.source_location
    }

    /// Set the lexical-scope data written to the debug tables
    pub fn set_lexical_data(&mut self, parent_id: Option<u32>, variable_names: Vec<String>) {
        self.lexical_parent_id = parent_id;
        self.variable_names = variable_names;
    }

    /// Bytecode ID of the lexically enclosing function
    pub fn lexical_parent_id(&self) -> Option<u32> {
        self.lexical_parent_id
    }

    /// Variable names of the function scope
    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    // ===== Frame, caches and errors =====

    /// Number of frame registers
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    /// Raise the highest read cache index seen
    pub fn note_read_cache_index(&mut self, index: u8) {
        self.highest_read_cache_index = self.highest_read_cache_index.max(index);
    }

    /// Raise the highest write cache index seen
    pub fn note_write_cache_index(&mut self, index: u8) {
        self.highest_write_cache_index = self.highest_write_cache_index.max(index);
    }

    /// Highest read cache index seen
    pub fn highest_read_cache_index(&self) -> u8 {
        self.highest_read_cache_index
    }

    /// Highest write cache index seen
    pub fn highest_write_cache_index(&self) -> u8 {
        self.highest_write_cache_index
    }

    /// Mark the function as impossible to encode
    pub fn set_encoding_error(&mut self) {
        self.encoding_error = true;
    }

    /// Whether instruction selection failed to encode the function
    pub fn has_encoding_error(&self) -> bool {
        self.encoding_error
    }

    /// Take the opcode stream and exception handlers out of a completed generator
    pub(crate) fn into_parts(self) -> (Vec<u8>, Vec<ExceptionHandlerInfo>) {
        (self.opcodes, self.exception_handlers)
    }
}
