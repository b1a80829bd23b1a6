//! Array-literal size limiting
//!
//! Keeps at most `max_size` elements inline in an `AllocArray`. The first
//! element with no buffer encoding (directly or through `LoadConst`), and
//! everything after it, is moved out to indexed stores, since buffer slots are
//! positional. Whatever still exceeds
//! the limit is trimmed from the tail.

use super::literal::serializable_value;
use super::LowerPass;
use crate::ir::{Builder, Function, InsertPoint, InstId, InstKind, LiteralTable, Value};

/// Limits inline array-literal elements
pub struct LimitAllocArray {
    max_size: u32,
}

impl LimitAllocArray {
    /// Create the pass with the given inline element limit
    pub fn new(max_size: u32) -> Self {
        Self { max_size }
    }

    fn limit(&self, func: &mut Function, literals: &mut LiteralTable, alloc: InstId) -> bool {
        let InstKind::AllocArray { elements, .. } = func.kind(alloc) else {
            return false;
        };
        let mut elements = elements.clone();
        if elements.is_empty() {
            return false;
        }

        let mut demoted: Vec<(Value, u32)> = Vec::new();
        if let Some(first_bad) = elements
            .iter()
            .position(|&e| serializable_value(func, literals, e).is_none())
        {
            for (i, value) in elements.drain(first_bad..).enumerate() {
                demoted.push((value, (first_bad + i) as u32));
            }
        }

        let max = self.max_size as usize;
        if elements.len() > max {
            for index in (max..elements.len()).rev() {
                demoted.push((elements[index], index as u32));
            }
            elements.truncate(max);
        }

        let changed = !demoted.is_empty();
        let loc = func.location(alloc);
        let mut builder = Builder::new(func, InsertPoint::After(alloc));
        builder.set_location(loc);
        for (value, index) in demoted {
            let key = literals.number(f64::from(index));
            builder.create(InstKind::StoreOwnProperty {
                value,
                object: Value::Inst(alloc),
                property: Value::Literal(key),
                enumerable: true,
            });
        }

        if let InstKind::AllocArray { elements: inline, .. } = func.kind_mut(alloc) {
            *inline = elements;
        }
        changed
    }
}

impl LowerPass for LimitAllocArray {
    fn name(&self) -> &'static str {
        "limit-alloc-array"
    }

    fn run_on_function(&self, func: &mut Function, literals: &mut LiteralTable) -> bool {
        let allocs: Vec<InstId> = func
            .instructions()
            .filter(|&i| matches!(func.kind(i), InstKind::AllocArray { .. }))
            .collect();

        let mut changed = false;
        for alloc in allocs {
            changed |= self.limit(func, literals, alloc);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Literal;

    fn array(elements: Vec<Value>) -> (Function, InstId) {
        let mut func = Function::new("f", 0);
        let bb = func.add_block();
        let size_hint = elements.len() as u32;
        let alloc = func.append(bb, InstKind::AllocArray { size_hint, elements });
        func.append(bb, InstKind::Return { value: Value::Inst(alloc) });
        (func, alloc)
    }

    fn stores(func: &Function, lits: &LiteralTable) -> Vec<(Value, f64)> {
        func.instructions()
            .filter_map(|i| match func.kind(i) {
                InstKind::StoreOwnProperty { value, property, .. } => {
                    Some((*value, lits.of(*property).and_then(Literal::as_number)?))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_trailing_literals_after_trim_keep_order() {
        let mut lits = LiteralTable::new();
        let values: Vec<Value> = (0..4).map(|i| Value::Literal(lits.number(f64::from(i)))).collect();
        let (mut func, alloc) = array(values.clone());
        assert!(LimitAllocArray::new(2).run_on_function(&mut func, &mut lits));
        assert_eq!(
            func.kind(alloc),
            &InstKind::AllocArray { size_hint: 4, elements: values[..2].to_vec() }
        );
        assert_eq!(stores(&func, &lits), vec![(values[3], 3.0), (values[2], 2.0)]);
    }

    #[test]
    fn test_loaded_undefined_is_demoted() {
        let mut lits = LiteralTable::new();
        let one = Value::Literal(lits.number(1.0));
        let undef = Value::Literal(lits.undefined());
        let mut func = Function::new("f", 0);
        let bb = func.add_block();
        let load = func.append(bb, InstKind::LoadConst { value: undef });
        let loaded_one = func.append(bb, InstKind::LoadConst { value: one });
        let alloc = func.append(
            bb,
            InstKind::AllocArray { size_hint: 3, elements: vec![one, Value::Inst(loaded_one), Value::Inst(load)] },
        );
        func.append(bb, InstKind::Return { value: Value::Inst(alloc) });

        assert!(LimitAllocArray::new(10).run_on_function(&mut func, &mut lits));
        assert_eq!(
            func.kind(alloc),
            &InstKind::AllocArray { size_hint: 3, elements: vec![one, Value::Inst(loaded_one)] }
        );
        assert_eq!(stores(&func, &lits), vec![(Value::Inst(load), 2.0)]);
    }

    #[test]
    fn test_fitting_array_reports_no_change() {
        let mut lits = LiteralTable::new();
        let values: Vec<Value> = (0..3).map(|i| Value::Literal(lits.number(f64::from(i)))).collect();
        let (mut func, _) = array(values);
        assert!(!LimitAllocArray::new(3).run_on_function(&mut func, &mut lits));
        assert!(stores(&func, &lits).is_empty());
    }

    #[test]
    fn test_empty_array_untouched() {
        let mut lits = LiteralTable::new();
        let (mut func, _) = array(vec![]);
        assert!(!LimitAllocArray::new(2).run_on_function(&mut func, &mut lits));
    }
}
