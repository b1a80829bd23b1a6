//! IR lowering passes
//!
//! Each pass implements [`LowerPass`] and rewrites one function in place in a
//! single sweep. Passes first collect the instructions they will touch and
//! only then mutate, so nothing is erased while it is being visited.

pub mod alloc_array;
pub mod alloc_object;
pub mod cond_branch;
pub mod exponentiation;
pub mod literal;
pub mod numeric_props;
pub mod packing;
pub mod store_order;
pub mod switch;

pub use alloc_array::LimitAllocArray;
pub use alloc_object::{LowerAllocObject, LowerAllocObjectLiteral};
pub use cond_branch::LowerCondBranch;
pub use exponentiation::LowerExponentiationOperator;
pub use numeric_props::{to_array_index, LowerNumericProperties};
pub use switch::SwitchLowering;

use crate::config::BytecodeGenerationOptions;
use crate::ir::{Function, LiteralTable, Module};

/// A lowering pass over one function
pub trait LowerPass: Send + Sync {
    /// Name of this pass (for logging)
    fn name(&self) -> &'static str;
    /// Run the pass; returns whether the function changed
    fn run_on_function(&self, func: &mut Function, literals: &mut LiteralTable) -> bool;
}

/// Runs a sequence of lowering passes over every function of a module
pub struct LoweringPipeline {
    passes: Vec<Box<dyn LowerPass>>,
}

impl LoweringPipeline {
    /// The default pipeline.
    ///
    /// Numeric keys must be canonicalized before packing: the cost model only
    /// recognizes numeric keys stored as number literals.
    pub fn new(options: &BytecodeGenerationOptions) -> Self {
        LoweringPipeline {
            passes: vec![
                Box::new(LowerNumericProperties),
                Box::new(LowerAllocObjectLiteral::new(
                    options.packing.clone(),
                    options.max_object_buffer_entries,
                )),
                Box::new(LowerAllocObject::new(
                    options.packing.clone(),
                    options.max_object_buffer_entries,
                )),
                Box::new(LimitAllocArray::new(options.max_array_inline_elements)),
                Box::new(LowerExponentiationOperator),
                Box::new(SwitchLowering),
                Box::new(LowerCondBranch),
            ],
        }
    }

    /// Create an empty pipeline (no passes)
    pub fn empty() -> Self {
        LoweringPipeline { passes: vec![] }
    }

    /// Add a pass to the pipeline
    pub fn add_pass(&mut self, pass: Box<dyn LowerPass>) {
        self.passes.push(pass);
    }

    /// Names of the passes in run order
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass over one function
    pub fn run_on_function(&self, func: &mut Function, literals: &mut LiteralTable) -> bool {
        let mut changed = false;
        for pass in &self.passes {
            let pass_changed = pass.run_on_function(func, literals);
            tracing::debug!(
                target: "tern::lower",
                pass = pass.name(),
                function = %func.name,
                changed = pass_changed,
                "ran lowering pass"
            );
            changed |= pass_changed;
        }
        changed
    }

    /// Run every pass over every function with a body
    pub fn run(&self, module: &mut Module) -> bool {
        let (functions, literals) = module.functions_and_literals_mut();
        let mut changed = false;
        for func in functions.iter_mut().filter(|f| !f.lazy) {
            changed |= self.run_on_function(func, literals);
        }
        changed
    }
}

impl Default for LoweringPipeline {
    fn default() -> Self {
        Self::new(&BytecodeGenerationOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, InstKind, Value};

    #[test]
    fn test_default_pass_order() {
        let pipeline = LoweringPipeline::default();
        assert_eq!(
            pipeline.pass_names(),
            vec![
                "lower-numeric-properties",
                "lower-alloc-object-literal",
                "lower-alloc-object",
                "limit-alloc-array",
                "lower-exponentiation",
                "lower-switch",
                "lower-cond-branch",
            ]
        );
    }

    #[test]
    fn test_empty_pipeline_changes_nothing() {
        let mut module = Module::new();
        let mut func = Function::new("f", 2);
        let bb = func.add_block();
        let pow = func.append(
            bb,
            InstKind::BinaryOperator { op: BinaryOp::Exponentiation, lhs: Value::Param(0), rhs: Value::Param(1) },
        );
        func.append(bb, InstKind::Return { value: Value::Inst(pow) });
        module.add_function(func);

        assert!(!LoweringPipeline::empty().run(&mut module));
        let mut pipeline = LoweringPipeline::empty();
        pipeline.add_pass(Box::new(LowerExponentiationOperator));
        assert!(pipeline.run(&mut module));
    }
}
