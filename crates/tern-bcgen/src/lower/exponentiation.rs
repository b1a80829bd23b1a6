//! Exponentiation lowering
//!
//! `a ** b` has no opcode; it becomes a call to the runtime builtin.

use super::LowerPass;
use crate::ir::{BinaryOp, Builtin, Function, InstId, InstKind, LiteralTable, Value};

/// Replaces `**` with `CallBuiltin(exponentiationOperator, a, b)`
pub struct LowerExponentiationOperator;

impl LowerPass for LowerExponentiationOperator {
    fn name(&self) -> &'static str {
        "lower-exponentiation"
    }

    fn run_on_function(&self, func: &mut Function, _literals: &mut LiteralTable) -> bool {
        let targets: Vec<(InstId, Value, Value)> = func
            .instructions()
            .filter_map(|inst| match func.kind(inst) {
                InstKind::BinaryOperator { op: BinaryOp::Exponentiation, lhs, rhs } => {
                    Some((inst, *lhs, *rhs))
                }
                _ => None,
            })
            .collect();

        for &(inst, lhs, rhs) in &targets {
            let loc = func.location(inst);
            let call = func.insert_before(
                inst,
                InstKind::CallBuiltin { builtin: Builtin::ExponentiationOperator, args: vec![lhs, rhs] },
            );
            func.set_location(call, loc);
            func.replace_all_uses_with(inst, Value::Inst(call));
            func.erase(inst);
        }

        !targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponentiation_becomes_builtin_call() {
        let mut lits = LiteralTable::new();
        let mut func = Function::new("pow", 2);
        let bb = func.add_block();
        let pow = func.append(
            bb,
            InstKind::BinaryOperator { op: BinaryOp::Exponentiation, lhs: Value::Param(0), rhs: Value::Param(1) },
        );
        let ret = func.append(bb, InstKind::Return { value: Value::Inst(pow) });

        assert!(LowerExponentiationOperator.run_on_function(&mut func, &mut lits));
        let call = func.block_insts(bb)[0];
        assert_eq!(
            func.kind(call),
            &InstKind::CallBuiltin {
                builtin: Builtin::ExponentiationOperator,
                args: vec![Value::Param(0), Value::Param(1)],
            }
        );
        assert_eq!(func.kind(ret), &InstKind::Return { value: Value::Inst(call) });
        assert!(func.inst(pow).is_erased());
    }

    #[test]
    fn test_other_operators_untouched() {
        let mut lits = LiteralTable::new();
        let mut func = Function::new("mul", 2);
        let bb = func.add_block();
        let mul = func.append(
            bb,
            InstKind::BinaryOperator { op: BinaryOp::Mul, lhs: Value::Param(0), rhs: Value::Param(1) },
        );
        func.append(bb, InstKind::Return { value: Value::Inst(mul) });
        assert!(!LowerExponentiationOperator.run_on_function(&mut func, &mut lits));
    }
}
