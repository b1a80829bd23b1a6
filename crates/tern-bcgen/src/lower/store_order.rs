//! Dominance-ordered store collection
//!
//! For an `AllocObject`, find the `StoreNewOwnProperty` instructions that are
//! guaranteed to run, in order, before anything else can observe the object.
//! Blocks holding such stores are chained by dominance; the first pair of
//! blocks on parallel branches ends the chain for good.

use crate::analysis::DominanceInfo;
use crate::ir::{BlockId, Function, InstId, InstKind, Value};
use rustc_hash::FxHashMap;

/// Eligible stores of one allocation within each block, in instruction order.
/// A `None` entry ends eligibility for the rest of the block.
pub type BlockStores = FxHashMap<BlockId, Vec<Option<InstId>>>;

/// Per-allocation store lists for every `AllocObject` of `func` that has users,
/// in allocation layout order.
pub fn collect_alloc_users(func: &Function) -> Vec<(InstId, BlockStores)> {
    let mut order: Vec<InstId> = Vec::new();
    let mut users: FxHashMap<InstId, BlockStores> = FxHashMap::default();

    for block in func.blocks() {
        for &inst in func.block_insts(block) {
            for operand in func.kind(inst).operands() {
                let Some(alloc) = operand.value.as_inst() else {
                    continue;
                };
                if !matches!(func.kind(alloc), InstKind::AllocObject { .. }) {
                    continue;
                }
                let stores = users.entry(alloc).or_insert_with(|| {
                    order.push(alloc);
                    BlockStores::default()
                });
                try_add(func, alloc, inst, stores.entry(block).or_default());
            }
        }
    }

    order.sort_by_key(|&alloc| layout_position(func, alloc));
    order
        .into_iter()
        .filter_map(|alloc| users.remove(&alloc).map(|stores| (alloc, stores)))
        .collect()
}

fn layout_position(func: &Function, inst: InstId) -> usize {
    func.instructions().position(|i| i == inst).unwrap_or(usize::MAX)
}

/// Record `user` as the next store into `alloc`, or terminate the list if
/// `user` is anything else.
fn try_add(func: &Function, alloc: InstId, user: InstId, stores: &mut Vec<Option<InstId>>) {
    if matches!(stores.last(), Some(None)) {
        return;
    }
    match func.kind(user) {
        InstKind::StoreNewOwnProperty { value, object, .. } if *value != Value::Inst(alloc) => {
            debug_assert_eq!(
                *object,
                Value::Inst(alloc),
                "StoreNewOwnProperty must use the allocation as object or value"
            );
            stores.push(Some(user));
        }
        // Storing the object into itself is treated like any other escape.
        _ => stores.push(None),
    }
}

/// Blocks satisfying `pred`, in a chain where each block properly dominates
/// the next. Walks the dominator tree depth-first from `start`.
pub fn order_blocks_by_dominance(
    dom: &impl DominanceInfo,
    start: BlockId,
    pred: impl Fn(BlockId) -> bool,
) -> Vec<BlockId> {
    let mut sorted: Vec<BlockId> = Vec::new();
    let mut stop_adding = false;
    let mut stack = vec![start];

    while let Some(block) = stack.pop() {
        // Children in reverse so they are visited in tree order.
        stack.extend(dom.children(block).iter().rev().copied());

        if !pred(block) {
            continue;
        }
        while let Some(&last) = sorted.last() {
            if dom.properly_dominates(last, block) {
                break;
            }
            // `last` and `block` sit on parallel branches.
            sorted.pop();
            stop_adding = true;
        }
        if !stop_adding {
            sorted.push(block);
        }
    }

    sorted
}

/// The ordered stores into `alloc` that may be folded into a buffer
pub fn collect_stores(
    func: &Function,
    alloc: InstId,
    block_stores: &BlockStores,
    dom: &impl DominanceInfo,
) -> Vec<InstId> {
    let Some(alloc_block) = func.parent(alloc) else {
        return Vec::new();
    };
    let blocks = order_blocks_by_dominance(dom, alloc_block, |b| block_stores.contains_key(&b));

    let mut stores = Vec::new();
    for block in blocks {
        for entry in &block_stores[&block] {
            match entry {
                Some(store) => stores.push(*store),
                None => return stores,
            }
        }
    }
    stores
}
