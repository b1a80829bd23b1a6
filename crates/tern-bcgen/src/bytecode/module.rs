//! Bytecode module
//!
//! The output of generation: every emitted function, indexed by its
//! bytecode function ID, plus the tables they share.

use super::debug_info::DebugInfo;
use super::function::BytecodeFunction;
use super::strings::StringTable;

/// Module-wide flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BytecodeOptions {
    /// At least one function is async
    pub has_async: bool,
    /// CommonJS modules were resolved to static IDs at compile time
    pub cjs_modules_statically_resolved: bool,
}

/// CommonJS module resolved at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticCjsModule {
    /// Static module ID
    pub module_id: u32,
    /// Function ID of the module wrapper
    pub function_id: u32,
}

/// CommonJS module resolved by file name at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicCjsModule {
    /// Function ID of the module wrapper
    pub function_id: u32,
    /// String ID of the module's file name
    pub filename_id: u32,
}

/// A generated bytecode module
#[derive(Debug, Clone, Default)]
pub struct BytecodeModule {
    functions: Vec<Option<BytecodeFunction>>,
    /// Strings and identifiers
    pub string_table: StringTable,
    /// Array elements and object values
    pub literal_value_buffer: Vec<u8>,
    /// Object keys
    pub object_key_buffer: Vec<u8>,
    /// Module-wide flags
    pub options: BytecodeOptions,
    /// Function ID of the entry point
    pub entry_point_index: u32,
    /// Segment this module was generated for
    pub segment_id: u32,
    /// Statically resolved CommonJS modules
    pub cjs_static: Vec<StaticCjsModule>,
    /// CommonJS modules resolved at runtime
    pub cjs_dynamic: Vec<DynamicCjsModule>,
    /// `(function ID, string ID)` of functions whose source text is kept
    pub function_source_table: Vec<(u32, u32)>,
    /// Debug tables, present when any function has debug info
    pub debug_info: Option<DebugInfo>,
}

impl BytecodeModule {
    /// Create a module with `function_count` empty function slots
    pub fn new(function_count: usize) -> Self {
        Self { functions: vec![None; function_count], ..Self::default() }
    }

    /// Fill function slot `id`
    pub fn set_function(&mut self, id: u32, func: BytecodeFunction) {
        let index = id as usize;
        debug_assert!(self.functions[index].is_none(), "function {id} emitted twice");
        self.functions[index] = Some(func);
    }

    /// Function with bytecode ID `id`
    pub fn function(&self, id: u32) -> Option<&BytecodeFunction> {
        self.functions.get(id as usize).and_then(Option::as_ref)
    }

    /// Number of function slots
    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    /// Every function in ID order. Empty slots are skipped.
    pub fn functions(&self) -> impl Iterator<Item = (u32, &BytecodeFunction)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (i as u32, f)))
    }

    /// Whether every slot has been filled
    pub fn is_complete(&self) -> bool {
        self.functions.iter().all(Option::is_some)
    }

    /// The entry-point function
    pub fn entry_point(&self) -> Option<&BytecodeFunction> {
        self.function(self.entry_point_index)
    }
}
