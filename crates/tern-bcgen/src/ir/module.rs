//! IR Modules
//!
//! The module is the unit handed to the backend: it owns every function, the
//! interned literals, the source-file list, bundle segment assignments,
//! CommonJS module records and the diagnostics produced while lowering and
//! generating.

use super::function::Function;
use super::value::{FunctionId, LiteralTable, SourceLoc};
use crate::error::{Diagnostic, Severity};
use rustc_hash::{FxHashMap, FxHashSet};

/// A CommonJS module wrapped by one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CjsModule {
    /// The wrapper function
    pub function: FunctionId,
    /// Statically resolved module ID
    pub id: u32,
    /// Path the module was loaded from
    pub filename: String,
}

/// An IR module
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Interned literals shared by every function
    pub literals: LiteralTable,
    /// Source file names, indexed by `SourceLoc::buffer`
    pub source_files: Vec<String>,
    /// Whether CommonJS `require` calls were resolved at compile time
    pub cjs_modules_resolved: bool,
    functions: Vec<Function>,
    segments: FxHashMap<u32, FxHashSet<FunctionId>>,
    cjs_modules: Vec<CjsModule>,
    diagnostics: Vec<Diagnostic>,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function and return its handle
    pub fn add_function(&mut self, func: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(func);
        id
    }

    /// Get a function
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    /// Get a function mutably
    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    /// All function handles in insertion order
    pub fn function_ids(&self) -> impl Iterator<Item = FunctionId> + '_ {
        (0..self.functions.len() as u32).map(FunctionId)
    }

    /// Number of functions
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Borrow every function mutably together with the literal table
    pub fn functions_and_literals_mut(&mut self) -> (&mut [Function], &mut LiteralTable) {
        (&mut self.functions, &mut self.literals)
    }

    /// Add a source file name, returning its buffer index
    pub fn add_source_file(&mut self, name: impl Into<String>) -> u32 {
        self.source_files.push(name.into());
        (self.source_files.len() - 1) as u32
    }

    /// Name of a source buffer
    pub fn source_file(&self, buffer: u32) -> Option<&str> {
        self.source_files.get(buffer as usize).map(String::as_str)
    }

    // ===== Segments =====

    /// Assign a function to a bundle segment
    pub fn assign_segment(&mut self, segment: u32, func: FunctionId) {
        self.segments.entry(segment).or_default().insert(func);
    }

    /// Functions assigned to a segment
    pub fn functions_in_segment(&self, segment: u32) -> Option<&FxHashSet<FunctionId>> {
        self.segments.get(&segment)
    }

    // ===== CommonJS =====

    /// Register the CommonJS module wrapped by `function`
    pub fn add_cjs_module(&mut self, function: FunctionId, id: u32, filename: impl Into<String>) {
        self.cjs_modules.push(CjsModule { function, id, filename: filename.into() });
    }

    /// All CommonJS modules in registration order
    pub fn cjs_modules(&self) -> &[CjsModule] {
        &self.cjs_modules
    }

    /// The CommonJS module wrapped by `function`, if any
    pub fn find_cjs_module(&self, function: FunctionId) -> Option<&CjsModule> {
        self.cjs_modules.iter().find(|m| m.function == function)
    }

    // ===== Diagnostics =====

    /// Record an error diagnostic
    pub fn report_error(&mut self, location: Option<SourceLoc>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            location,
            message: message.into(),
        });
    }

    /// Diagnostics recorded so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether any error has been recorded
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}
