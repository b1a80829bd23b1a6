//! Dominance
//!
//! [`DominanceInfo`] is the query interface the lowering passes depend on.
//! [`DominatorTree`] implements it with the iterative algorithm of Cooper,
//! Harvey and Kennedy over reverse post-order numbers.

use super::order::reverse_post_order;
use crate::ir::{BlockId, Function};

/// Dominance queries over the blocks of one function
pub trait DominanceInfo {
    /// Whether `a` dominates `b` (every block dominates itself)
    fn dominates(&self, a: BlockId, b: BlockId) -> bool;

    /// Whether `a` dominates `b` and `a != b`
    fn properly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Immediate dominator; `None` for the entry and unreachable blocks
    fn idom(&self, block: BlockId) -> Option<BlockId>;

    /// Children in the dominator tree
    fn children(&self, block: BlockId) -> &[BlockId];

    /// Root of the dominator tree
    fn root(&self) -> Option<BlockId>;
}

const UNDEFINED: usize = usize::MAX;

/// Dominator tree of a function
#[derive(Debug, Clone)]
pub struct DominatorTree {
    root: Option<BlockId>,
    idom: Vec<Option<BlockId>>,
    children: Vec<Vec<BlockId>>,
    /// DFS entry/exit numbers on the tree for O(1) dominance queries
    dfs_in: Vec<u32>,
    dfs_out: Vec<u32>,
    reachable: Vec<bool>,
}

impl DominatorTree {
    /// Compute the dominator tree of `func`
    pub fn compute(func: &Function) -> Self {
        let n = func.block_count();
        let rpo = reverse_post_order(func);

        let mut rpo_index = vec![UNDEFINED; n];
        for (i, b) in rpo.iter().enumerate() {
            rpo_index[b.index()] = i;
        }

        let preds: Vec<Vec<usize>> = rpo
            .iter()
            .map(|&b| {
                func.predecessors(b)
                    .into_iter()
                    .map(|p| rpo_index[p.index()])
                    .filter(|&p| p != UNDEFINED)
                    .collect()
            })
            .collect();

        // doms[i] is the idom of rpo[i], in RPO numbering
        let mut doms = vec![UNDEFINED; rpo.len()];
        if !rpo.is_empty() {
            doms[0] = 0;
        }

        let mut changed = true;
        while changed {
            changed = false;
            for i in 1..rpo.len() {
                let new_idom = preds[i]
                    .iter()
                    .copied()
                    .filter(|&p| doms[p] != UNDEFINED)
                    .reduce(|a, b| intersect(&doms, a, b));
                if let Some(new_idom) = new_idom {
                    if doms[i] != new_idom {
                        doms[i] = new_idom;
                        changed = true;
                    }
                }
            }
        }

        let mut idom = vec![None; n];
        let mut children = vec![Vec::new(); n];
        let mut reachable = vec![false; n];
        for (i, &b) in rpo.iter().enumerate() {
            reachable[b.index()] = true;
            if i == 0 || doms[i] == UNDEFINED {
                continue;
            }
            let parent = rpo[doms[i]];
            idom[b.index()] = Some(parent);
            children[parent.index()].push(b);
        }

        let root = rpo.first().copied();
        let mut tree = Self {
            root,
            idom,
            children,
            dfs_in: vec![0; n],
            dfs_out: vec![0; n],
            reachable,
        };
        tree.number();
        tree
    }

    fn number(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        let mut counter = 0u32;
        let mut stack = vec![(root, 0usize)];
        self.dfs_in[root.index()] = counter;
        while let Some((block, next)) = stack.last_mut() {
            let b = *block;
            if let Some(&child) = self.children[b.index()].get(*next) {
                *next += 1;
                counter += 1;
                self.dfs_in[child.index()] = counter;
                stack.push((child, 0));
            } else {
                counter += 1;
                self.dfs_out[b.index()] = counter;
                stack.pop();
            }
        }
    }

    /// Whether `block` is reachable from the entry
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.reachable[block.index()]
    }
}

fn intersect(doms: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = doms[a];
        }
        while b > a {
            b = doms[b];
        }
    }
    a
}

impl DominanceInfo for DominatorTree {
    fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return a == b;
        }
        self.dfs_in[a.index()] <= self.dfs_in[b.index()]
            && self.dfs_out[b.index()] <= self.dfs_out[a.index()]
    }

    fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom[block.index()]
    }

    fn children(&self, block: BlockId) -> &[BlockId] {
        &self.children[block.index()]
    }

    fn root(&self) -> Option<BlockId> {
        self.root
    }
}
