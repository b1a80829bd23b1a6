//! Literal-buffer packing heuristic
//!
//! Given the ordered property definitions of an object, pick how many leading
//! definitions to encode in a key/value buffer. The running saving starts at
//! the (usually negative) difference between a generic allocation and a
//! buffer allocation, grows by a fixed amount per literal value and shrinks
//! per placeholder slot. The prefix ending at the maximum saving wins.

use crate::config::PackingCostModel;

/// One property definition as seen by the cost model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackCandidate {
    /// The key is a numeric literal
    pub numeric_key: bool,
    /// The value can be encoded in the buffer
    pub serializable: bool,
}

/// Length of the most profitable prefix to encode; 0 means no buffer.
pub fn estimate_best_prefix(
    candidates: impl IntoIterator<Item = PackCandidate>,
    has_parent: bool,
    model: &PackingCostModel,
) -> usize {
    let mut cur_saving = model.alloc_saving;
    if has_parent {
        cur_saving -= model.set_prototype_cost;
    }
    let mut max_saving = 0;
    let mut best = 0;
    let mut placeholders = 0;

    for (i, candidate) in candidates.into_iter().enumerate() {
        if candidate.serializable {
            cur_saving += model.literal_saved;
            if cur_saving > max_saving {
                max_saving = cur_saving;
                best = i + 1;
            }
        } else {
            // Numeric keys can be defined in any order after construction.
            if candidate.numeric_key {
                continue;
            }
            if placeholders == model.placeholder_limit {
                break;
            }
            placeholders += 1;
            cur_saving -= model.placeholder_cost;
        }
    }

    best
}
