//! Block orderings

use crate::ir::{BlockId, Function};

/// Blocks reachable from the entry, in post-order
pub fn post_order(func: &Function) -> Vec<BlockId> {
    let Some(entry) = func.entry_block() else {
        return Vec::new();
    };

    let mut visited = vec![false; func.block_count()];
    let mut order = Vec::with_capacity(func.block_count());
    // (block, successors, next successor index)
    let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();

    visited[entry.index()] = true;
    stack.push((entry, func.successors(entry), 0));

    while let Some((block, succs, next)) = stack.last_mut() {
        if let Some(&succ) = succs.get(*next) {
            *next += 1;
            if !visited[succ.index()] {
                visited[succ.index()] = true;
                let succ_succs = func.successors(succ);
                stack.push((succ, succ_succs, 0));
            }
        } else {
            order.push(*block);
            stack.pop();
        }
    }

    order
}

/// Blocks reachable from the entry, in reverse post-order
pub fn reverse_post_order(func: &Function) -> Vec<BlockId> {
    let mut order = post_order(func);
    order.reverse();
    order
}
