//! Object buffer packing
//!
//! Folds the leading property definitions of an object into a serialized
//! key/value buffer when the cost model says it pays off:
//!
//! - [`LowerAllocObject`] handles `AllocObject` followed by
//!   `StoreNewOwnProperty` instructions, ordered by dominance.
//! - [`LowerAllocObjectLiteral`] handles `AllocObjectLiteral`, whose key/value
//!   list is already ordered.
//!
//! Both replace the allocation with `AllocObjectFromBuffer`. Non-literal
//! values with string keys keep a `null` placeholder slot in the buffer and
//! are assigned right after; numeric keys are never given placeholders.

use super::literal::{is_numeric_key, serializable_value};
use super::packing::{estimate_best_prefix, PackCandidate};
use super::store_order::{collect_alloc_users, collect_stores};
use super::LowerPass;
use crate::analysis::DominatorTree;
use crate::config::PackingCostModel;
use crate::ir::{
    Builder, Builtin, Function, InsertPoint, InstId, InstKind, Literal, LiteralTable, Value,
};

// ===== AllocObject =====

/// Packs `AllocObject` + `StoreNewOwnProperty` sequences into buffers
pub struct LowerAllocObject {
    cost: PackingCostModel,
    max_entries: u32,
}

impl LowerAllocObject {
    /// Create the pass
    pub fn new(cost: PackingCostModel, max_entries: u32) -> Self {
        Self { cost, max_entries }
    }

    fn store_parts(func: &Function, store: InstId) -> Option<(Value, Value, Value)> {
        match func.kind(store) {
            InstKind::StoreNewOwnProperty { value, object, property, .. } => {
                Some((*value, *object, *property))
            }
            _ => None,
        }
    }

    fn lower_alloc_object_buffer(
        &self,
        func: &mut Function,
        literals: &mut LiteralTable,
        alloc: InstId,
        stores: &[InstId],
    ) -> bool {
        let InstKind::AllocObject { size_hint, parent } = *func.kind(alloc) else {
            return false;
        };

        let candidates = stores.iter().filter_map(|&store| {
            let (value, _, property) = Self::store_parts(func, store)?;
            Some(PackCandidate {
                numeric_key: is_numeric_key(literals, property),
                serializable: serializable_value(func, literals, value).is_some(),
            })
        });
        let size = estimate_best_prefix(candidates, !parent.is_empty(), &self.cost);
        if size == 0 {
            return false;
        }
        let size = size.min(self.max_entries as usize);

        let null = Value::Literal(literals.null());
        let mut entries = Vec::with_capacity(size);
        for &store in &stores[..size] {
            let Some((value, object, property)) = Self::store_parts(func, store) else {
                continue;
            };
            debug_assert!(
                literals.of(property).is_some_and(|l| l.is_string() || l.is_number()),
                "StoreNewOwnProperty key must be a string or number literal"
            );

            if let Some(lit) = serializable_value(func, literals, value) {
                entries.push((property, Value::Literal(lit)));
                func.erase(store);
            } else if literals.of(property).is_some_and(Literal::is_string) {
                // Defined twice now, so the second definition must overwrite.
                entries.push((property, null));
                let loc = func.location(store);
                let put = func.insert_before(store, InstKind::StoreProperty { value, object, property });
                func.set_location(put, loc);
                func.erase(store);
            }
        }

        let loc = func.location(alloc);
        let new_alloc = {
            let mut builder = Builder::new(func, InsertPoint::Before(alloc));
            builder.set_location(loc);
            let new_alloc = builder.create(InstKind::AllocObjectFromBuffer { size_hint, entries });
            // The buffer form has no prototype operand.
            if !parent.is_empty() {
                builder.create(InstKind::CallBuiltin {
                    builtin: Builtin::SilentSetPrototypeOf,
                    args: vec![Value::Inst(new_alloc), parent],
                });
            }
            new_alloc
        };
        func.replace_all_uses_with(alloc, Value::Inst(new_alloc));
        func.erase(alloc);
        true
    }
}

impl LowerPass for LowerAllocObject {
    fn name(&self) -> &'static str {
        "lower-alloc-object"
    }

    fn run_on_function(&self, func: &mut Function, literals: &mut LiteralTable) -> bool {
        let users = collect_alloc_users(func);
        if users.is_empty() {
            return false;
        }

        let dom = DominatorTree::compute(func);
        let mut changed = false;
        for (alloc, block_stores) in users {
            let stores = collect_stores(func, alloc, &block_stores, &dom);
            changed |= self.lower_alloc_object_buffer(func, literals, alloc, &stores);
        }
        changed
    }
}

// ===== AllocObjectLiteral =====

/// Packs `AllocObjectLiteral` key/value lists into buffers
pub struct LowerAllocObjectLiteral {
    cost: PackingCostModel,
    max_entries: u32,
}

impl LowerAllocObjectLiteral {
    /// Create the pass
    pub fn new(cost: PackingCostModel, max_entries: u32) -> Self {
        Self { cost, max_entries }
    }

    /// Degenerate the literal into `AllocObject` plus one store per property
    fn lower_to_stores(func: &mut Function, alloc: InstId, pairs: Vec<(Value, Value)>) -> bool {
        let loc = func.location(alloc);
        let obj = {
            let mut builder = Builder::new(func, InsertPoint::Before(alloc));
            builder.set_location(loc);
            let obj = builder.create(InstKind::AllocObject {
                size_hint: pairs.len() as u32,
                parent: Value::Empty,
            });
            for (key, value) in pairs {
                builder.create(InstKind::StoreNewOwnProperty {
                    value,
                    object: Value::Inst(obj),
                    property: key,
                    enumerable: true,
                });
            }
            obj
        };
        func.replace_all_uses_with(alloc, Value::Inst(obj));
        func.erase(alloc);
        true
    }

    fn lower_alloc_object_buffer(
        &self,
        func: &mut Function,
        literals: &mut LiteralTable,
        alloc: InstId,
    ) -> bool {
        let InstKind::AllocObjectLiteral { pairs } = func.kind(alloc) else {
            return false;
        };
        let pairs = pairs.clone();

        let candidates = pairs.iter().map(|&(key, value)| PackCandidate {
            numeric_key: is_numeric_key(literals, key),
            serializable: serializable_value(func, literals, value).is_some(),
        });
        let size = estimate_best_prefix(candidates, false, &self.cost).min(self.max_entries as usize);
        if size == 0 {
            return Self::lower_to_stores(func, alloc, pairs);
        }

        let null = Value::Literal(literals.null());
        let object = Value::Inst(alloc);
        let loc = func.location(alloc);
        let mut entries = Vec::with_capacity(size);
        {
            let mut builder = Builder::new(func, InsertPoint::After(alloc));
            builder.set_location(loc);
            for (i, &(key, value)) in pairs.iter().enumerate() {
                if i >= size {
                    builder.create(InstKind::StoreNewOwnProperty { value, object, property: key, enumerable: true });
                    continue;
                }
                let serialized = serializable_value(builder.func(), literals, value);
                if let Some(lit) = serialized {
                    entries.push((key, Value::Literal(lit)));
                } else if literals.of(key).is_some_and(Literal::is_string) {
                    entries.push((key, null));
                    builder.create(InstKind::StoreProperty { value, object, property: key });
                } else {
                    // Numeric keys can be added in any order.
                    builder.create(InstKind::StoreOwnProperty { value, object, property: key, enumerable: true });
                }
            }
        }

        let new_alloc = func.insert_before(
            alloc,
            InstKind::AllocObjectFromBuffer { size_hint: pairs.len() as u32, entries },
        );
        func.set_location(new_alloc, loc);
        func.replace_all_uses_with(alloc, Value::Inst(new_alloc));
        func.erase(alloc);
        true
    }
}

impl LowerPass for LowerAllocObjectLiteral {
    fn name(&self) -> &'static str {
        "lower-alloc-object-literal"
    }

    fn run_on_function(&self, func: &mut Function, literals: &mut LiteralTable) -> bool {
        let allocs: Vec<InstId> = func
            .instructions()
            .filter(|&i| matches!(func.kind(i), InstKind::AllocObjectLiteral { .. }))
            .collect();

        let mut changed = false;
        for alloc in allocs {
            changed |= self.lower_alloc_object_buffer(func, literals, alloc);
        }
        changed
    }
}
