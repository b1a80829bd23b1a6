//! Switch lowering
//!
//! Replaces every `Switch` with a chain of strict-equality tests. The chain
//! is built back to front: the block for the last case falls through to the
//! default, each earlier case falls through to the block built before it,
//! and the original block branches to the block of the first case.

use super::LowerPass;
use crate::ir::{BinaryOp, BlockId, Builder, Function, InsertPoint, InstId, InstKind, LiteralTable, Value};

/// Lowers `Switch` into a chain of compare-and-branch blocks
pub struct SwitchLowering;

impl SwitchLowering {
    fn lower_switch(func: &mut Function, switch: InstId) {
        let InstKind::Switch { input, default, cases } = func.kind(switch).clone() else {
            return;
        };
        let Some(current) = func.parent(switch) else {
            return;
        };
        let location = func.location(switch);

        let mut next = default;
        for (case, dest) in cases.iter().rev().copied() {
            let mut builder = Builder::new(func, InsertPoint::AtEnd(current));
            builder.set_location(location);
            let if_block = builder.create_block();
            builder.set_insert_point(InsertPoint::AtEnd(if_block));
            let pred = builder.create(InstKind::BinaryOperator {
                op: BinaryOp::StrictlyEqual,
                lhs: Value::Literal(case),
                rhs: input,
            });
            builder.create(InstKind::CondBranch { cond: Value::Inst(pred), on_true: dest, on_false: next });

            copy_phi_target(func, dest, current, if_block);
            // Only the last-case block falls through to the default.
            if next == default && dest != next {
                copy_phi_target(func, next, current, if_block);
            }

            next = if_block;
        }

        if !cases.is_empty() {
            erase_phi_target(func, default, current);
            for &(_, dest) in &cases {
                erase_phi_target(func, dest, current);
            }
        }

        func.erase(switch);
        let branch = func.append(current, InstKind::Branch { target: next });
        func.set_location(branch, location);
    }
}

/// Give `new_pred` a copy of every phi entry `block` has for `old_pred`
fn copy_phi_target(func: &mut Function, block: BlockId, old_pred: BlockId, new_pred: BlockId) {
    for phi in func.phis(block) {
        if let Some(value) = func.phi_incoming(phi, old_pred) {
            func.add_phi_entry(phi, value, new_pred);
        }
    }
}

/// Drop every phi entry of `block` that comes from `pred`
fn erase_phi_target(func: &mut Function, block: BlockId, pred: BlockId) {
    for phi in func.phis(block) {
        func.remove_phi_entries(phi, pred);
    }
}

impl LowerPass for SwitchLowering {
    fn name(&self) -> &'static str {
        "lower-switch"
    }

    fn run_on_function(&self, func: &mut Function, _literals: &mut LiteralTable) -> bool {
        let switches: Vec<InstId> = func
            .instructions()
            .filter(|&i| matches!(func.kind(i), InstKind::Switch { .. }))
            .collect();

        for &switch in &switches {
            Self::lower_switch(func, switch);
        }

        !switches.is_empty()
    }
}
