//! Control-flow analyses used by the lowering passes

pub mod dominance;
pub mod order;

pub use dominance::{DominanceInfo, DominatorTree};
pub use order::{post_order, reverse_post_order};
