//! Intermediate Representation
//!
//! SSA-form IR consumed by the backend. Instructions and blocks live in
//! per-function arenas and are addressed by handles; literals are interned
//! per module.

pub mod function;
pub mod instr;
pub mod module;
pub mod value;

pub use function::{BasicBlock, Builder, Function, FunctionKind, InsertPoint, ProhibitInvoke};
pub use instr::{
    BinaryOp, Builtin, CompareOp, InstKind, Instruction, Operand, OperandRole, SideEffect,
    UnaryOp,
};
pub use module::{CjsModule, Module};
pub use value::{BlockId, FunctionId, InstId, Literal, LiteralId, LiteralTable, SourceLoc, Value};
