//! Comparison/branch fusion
//!
//! A `CondBranch` whose condition is a comparison used only by that branch
//! becomes a single `CompareBranch`. Comparisons that may read memory must
//! also sit immediately before the branch so no effect is reordered.

use super::LowerPass;
use crate::ir::{Function, InstId, InstKind, LiteralTable, Value};

/// Fuses comparisons into their single conditional branch
pub struct LowerCondBranch;

impl LowerCondBranch {
    /// The fused instruction for `branch`, if fusion is legal
    fn fuse(func: &Function, branch: InstId) -> Option<(InstId, InstKind)> {
        let InstKind::CondBranch { cond, on_true, on_false } = func.kind(branch) else {
            return None;
        };
        let cmp = cond.as_inst()?;
        if !func.has_one_user(cmp) {
            return None;
        }
        let kind = func.kind(cmp);
        let InstKind::BinaryOperator { op, lhs, rhs } = kind else {
            return None;
        };
        if kind.side_effect().may_read_or_worse() && func.prev_inst(branch) != Some(cmp) {
            return None;
        }
        let op = op.compare_op()?;

        Some((
            cmp,
            InstKind::CompareBranch { op, lhs: *lhs, rhs: *rhs, on_true: *on_true, on_false: *on_false },
        ))
    }
}

impl LowerPass for LowerCondBranch {
    fn name(&self) -> &'static str {
        "lower-cond-branch"
    }

    fn run_on_function(&self, func: &mut Function, _literals: &mut LiteralTable) -> bool {
        let mut changed = false;
        let blocks: Vec<_> = func.blocks().collect();

        for block in blocks {
            let candidates: Vec<(InstId, InstId, InstKind)> = func
                .block_insts(block)
                .iter()
                .filter_map(|&inst| Self::fuse(func, inst).map(|(cmp, kind)| (inst, cmp, kind)))
                .collect();

            let mut fusions = Vec::with_capacity(candidates.len());
            for (branch, cmp, kind) in candidates {
                let loc = func.location(branch);
                let fused = func.insert_before(branch, kind);
                func.set_location(fused, loc);
                fusions.push((branch, cmp));
            }

            for (branch, cmp) in fusions {
                func.erase(branch);
                debug_assert!(func.users(cmp).is_empty());
                func.erase(cmp);
                changed = true;
            }
        }

        changed
    }
}
