//! Shared helpers for the integration tests: a minimal backend and IR
//! construction shortcuts.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tern_bcgen::bytecode::{BytecodeFunctionGenerator, DebugSourceLocation};
use tern_bcgen::codegen::{CodegenBackend, RegisterAllocator, SelectionContext};
use tern_bcgen::error::GenerationError;
use tern_bcgen::ir::{BlockId, Function, InstKind, Literal, OperandRole, Value};

/// What the backend saw for one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRecord {
    pub name: String,
    pub fast_pass_threshold: Option<usize>,
    pub memory_limit: Option<u64>,
    pub block_order: Vec<BlockId>,
}

/// One register per instruction plus one per parameter
#[derive(Debug, Default)]
pub struct LinearAllocator {
    registers: u32,
    fast_pass_threshold: Option<usize>,
    memory_limit: Option<u64>,
    order: Vec<BlockId>,
}

impl RegisterAllocator for LinearAllocator {
    fn set_fast_pass_threshold(&mut self, instructions: usize) {
        self.fast_pass_threshold = Some(instructions);
    }

    fn set_memory_limit(&mut self, bytes: u64) {
        self.memory_limit = Some(bytes);
    }

    fn allocate(&mut self, func: &Function, order: &[BlockId]) {
        self.order = order.to_vec();
        self.registers = func.instruction_count() as u32 + func.param_count;
    }

    fn max_register_usage(&self) -> u32 {
        self.registers
    }
}

/// Emits one opcode byte per instruction, followed by 4-byte operands for
/// identifiers, function references and literal buffer offsets.
#[derive(Debug, Default, Clone)]
pub struct TestBackend {
    /// Name of a function to refuse to encode
    pub fail_on: Option<String>,
    pub log: Rc<RefCell<Vec<SelectionRecord>>>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(name: &str) -> Self {
        Self { fail_on: Some(name.to_string()), ..Self::default() }
    }
}

pub fn opcode(kind: &InstKind) -> u8 {
    match kind {
        InstKind::Return { .. } => 0xFF,
        InstKind::Branch { .. } => 0x01,
        InstKind::CompareBranch { .. } => 0x02,
        InstKind::CondBranch { .. } => 0x03,
        InstKind::LoadConst { .. } => 0x10,
        InstKind::LoadProperty { .. } => 0x11,
        InstKind::AllocArray { .. } => 0x20,
        InstKind::AllocObjectFromBuffer { .. } => 0x21,
        InstKind::CallBuiltin { .. } => 0x30,
        InstKind::Call { .. } => 0x31,
        _ => 0x7F,
    }
}

impl CodegenBackend for TestBackend {
    type Allocator = LinearAllocator;

    fn register_allocator(&mut self, _func: &Function) -> LinearAllocator {
        LinearAllocator::default()
    }

    fn select_instructions(
        &mut self,
        func: &Function,
        allocator: &LinearAllocator,
        sink: &mut BytecodeFunctionGenerator,
        ctx: &mut SelectionContext<'_>,
    ) -> Result<(), GenerationError> {
        self.log.borrow_mut().push(SelectionRecord {
            name: func.name.clone(),
            fast_pass_threshold: allocator.fast_pass_threshold,
            memory_limit: allocator.memory_limit,
            block_order: allocator.order.clone(),
        });
        if self.fail_on.as_deref() == Some(func.name.as_str()) {
            sink.set_encoding_error();
            return Ok(());
        }

        for &block in &allocator.order {
            for &inst in func.block_insts(block) {
                if let Some(loc) = func.location(inst) {
                    let ids = ctx.file_and_source_map_id(loc);
                    sink.add_debug_source_location(DebugSourceLocation {
                        address: sink.current_offset(),
                        filename_id: ids.filename_id,
                        line: loc.line,
                        column: loc.column,
                        ..Default::default()
                    });
                }
                let kind = func.kind(inst);
                sink.emit_opcode(opcode(kind));
                for operand in kind.operands() {
                    match operand.value {
                        Value::Function(f) => sink.emit_u32(ctx.bytecode_function_id(f)?),
                        Value::Literal(id) if operand.role == OperandRole::Identifier => {
                            if let Literal::String(name) = ctx.literals().get(id) {
                                sink.emit_u32(ctx.identifier_id(name)?);
                            }
                        }
                        _ => {}
                    }
                }
                if let Some(offsets) = ctx.literal_offsets(inst) {
                    sink.emit_u32(offsets.values);
                }
            }
        }
        Ok(())
    }
}
