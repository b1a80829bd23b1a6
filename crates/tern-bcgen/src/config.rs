//! Backend configuration
//!
//! All tunables of the lowering pipeline and the module generator. The cost
//! constants describe one concrete bytecode encoding; targets with different
//! instruction sizes should re-derive them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Cost constants for the literal-buffer packing heuristic.
///
/// Defaults are derived from the reference encoding: `NewObject` is 2 bytes,
/// `NewObjectWithBuffer` 10, `CallBuiltin` 4, `LoadConstInt` 6,
/// `PutNewOwnById` 5 and `PutByIdLoose` 6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingCostModel {
    /// Size of a generic allocation minus a buffer allocation (usually negative)
    pub alloc_saving: i32,
    /// Cost of the builtin call that installs a non-default prototype
    pub set_prototype_cost: i32,
    /// Bytes saved per literal value moved into the buffer
    pub literal_saved: i32,
    /// Bytes lost per placeholder slot
    pub placeholder_cost: i32,
    /// Maximum number of placeholder slots per object
    pub placeholder_limit: u32,
}

impl Default for PackingCostModel {
    fn default() -> Self {
        Self {
            alloc_saving: 2 - 10,
            set_prototype_cost: 4,
            literal_saved: 6,
            placeholder_cost: 2,
            placeholder_limit: 3,
        }
    }
}

/// Options controlling lowering and bytecode generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BytecodeGenerationOptions {
    /// Full register allocation and frequency-ordered string table
    pub optimization_enabled: bool,
    /// Replace every function name with one shared placeholder
    pub strip_function_names: bool,
    /// Instruction count below which the fast register allocator may be used
    pub fast_allocation_threshold: usize,
    /// Memory bound for the fast register allocator, in bytes
    pub allocation_memory_limit: u64,
    /// Maximum number of inline array-literal elements
    pub max_array_inline_elements: u32,
    /// Maximum number of entries in one object buffer
    pub max_object_buffer_entries: u32,
    /// Packing heuristic constants
    pub packing: PackingCostModel,
}

impl Default for BytecodeGenerationOptions {
    fn default() -> Self {
        Self {
            optimization_enabled: false,
            strip_function_names: false,
            fast_allocation_threshold: 250,
            allocation_memory_limit: 10 * 1024 * 1024,
            max_array_inline_elements: u16::MAX as u32,
            max_object_buffer_entries: u16::MAX as u32,
            packing: PackingCostModel::default(),
        }
    }
}

impl BytecodeGenerationOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Options with optimization enabled
    pub fn optimized() -> Self {
        Self { optimization_enabled: true, ..Self::default() }
    }
}
