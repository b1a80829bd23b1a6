//! Behavioural tests of the lowering passes.
//!
//! Control-flow rewrites are checked by running the function before and
//! after lowering through a tiny evaluator and comparing where it ends up.

use rustc_hash::FxHashMap;
use tern_bcgen::config::PackingCostModel;
use tern_bcgen::ir::{
    BinaryOp, BlockId, CompareOp, Function, InstId, InstKind, Literal, LiteralTable, Value,
};
use tern_bcgen::lower::{
    LimitAllocArray, LowerAllocObject, LowerCondBranch, LowerPass, LoweringPipeline, SwitchLowering,
};

// ============================================================================
// Evaluator
// ============================================================================

/// Result of running a function: the block that returned and the value
#[derive(Debug, Clone, Copy, PartialEq)]
struct Outcome {
    exit: BlockId,
    value: f64,
}

fn compare(op: CompareOp, a: f64, b: f64) -> bool {
    match op {
        CompareOp::LessThan => a < b,
        CompareOp::LessThanOrEqual => a <= b,
        CompareOp::GreaterThan => a > b,
        CompareOp::GreaterThanOrEqual => a >= b,
        CompareOp::Equal | CompareOp::StrictlyEqual => a == b,
        CompareOp::NotEqual | CompareOp::StrictlyNotEqual => a != b,
    }
}

/// Run `func` with numeric parameter `input`. Supports numeric literals,
/// comparisons, phis and every terminator.
fn run(func: &Function, lits: &LiteralTable, input: f64) -> Outcome {
    let mut env: FxHashMap<InstId, f64> = FxHashMap::default();
    let eval = |env: &FxHashMap<InstId, f64>, v: Value| match v {
        Value::Param(_) => input,
        Value::Literal(id) => match lits.get(id) {
            Literal::Number(n) => *n,
            other => panic!("unexpected literal {other:?}"),
        },
        Value::Inst(i) => env[&i],
        other => panic!("unexpected operand {other:?}"),
    };

    let mut block = func.entry_block().unwrap();
    let mut prev: Option<BlockId> = None;
    for _ in 0..1000 {
        let mut next = None;
        // Phis read their inputs in parallel.
        let phi_values: Vec<(InstId, f64)> = func
            .phis(block)
            .into_iter()
            .map(|phi| {
                let from = prev.expect("phi in entry block");
                let v = func.phi_incoming(phi, from).expect("missing phi entry");
                (phi, eval(&env, v))
            })
            .collect();
        env.extend(phi_values);

        for &inst in func.block_insts(block) {
            match func.kind(inst) {
                InstKind::Phi { .. } => {}
                InstKind::BinaryOperator { op, lhs, rhs } => {
                    let (a, b) = (eval(&env, *lhs), eval(&env, *rhs));
                    let result = match op.compare_op() {
                        Some(cmp) => f64::from(u8::from(compare(cmp, a, b))),
                        None => f64::NAN,
                    };
                    env.insert(inst, result);
                }
                InstKind::Branch { target } => next = Some(*target),
                InstKind::CondBranch { cond, on_true, on_false } => {
                    next = Some(if eval(&env, *cond) != 0.0 { *on_true } else { *on_false });
                }
                InstKind::CompareBranch { op, lhs, rhs, on_true, on_false } => {
                    let taken = compare(*op, eval(&env, *lhs), eval(&env, *rhs));
                    next = Some(if taken { *on_true } else { *on_false });
                }
                InstKind::Switch { input: sw, default, cases } => {
                    let v = eval(&env, *sw);
                    let hit = cases
                        .iter()
                        .find(|(lit, _)| lits.get(*lit).as_number() == Some(v))
                        .map(|&(_, dest)| dest);
                    next = Some(hit.unwrap_or(*default));
                }
                InstKind::Return { value } => {
                    return Outcome { exit: block, value: eval(&env, *value) };
                }
                other => panic!("evaluator does not support {other}"),
            }
        }
        prev = Some(block);
        block = next.expect("block without terminator");
    }
    panic!("evaluation did not terminate");
}

fn count(func: &Function, pred: impl Fn(&InstKind) -> bool) -> usize {
    func.instructions().filter(|&i| pred(func.kind(i))).count()
}

// ============================================================================
// Switch lowering and branch fusion
// ============================================================================

/// `switch (p) { case 1: case 3: A; case 2: B; case 4: join } default: D`
/// where A, B and D jump to `join`, which returns a phi of where control
/// came from. With `default_is_join` the default edge goes straight to
/// `join` as well.
fn switch_fn(lits: &mut LiteralTable, default_is_join: bool) -> (Function, BlockId) {
    let mut func = Function::new("sw", 1);
    let entry = func.add_block();
    let a = func.add_block();
    let b = func.add_block();
    let d = func.add_block();
    let join = func.add_block();

    let case = |lits: &mut LiteralTable, n: f64| lits.number(n);
    let cases = vec![
        (case(lits, 1.0), a),
        (case(lits, 2.0), b),
        (case(lits, 3.0), a),
        (case(lits, 4.0), join),
    ];
    let default = if default_is_join { join } else { d };
    func.append(entry, InstKind::Switch { input: Value::Param(0), default, cases });
    for bb in [a, b, d] {
        func.append(bb, InstKind::Branch { target: join });
    }

    let mut entries = vec![
        (Value::Literal(lits.number(10.0)), a),
        (Value::Literal(lits.number(20.0)), b),
        (Value::Literal(lits.number(40.0)), entry),
    ];
    if !default_is_join {
        entries.push((Value::Literal(lits.number(30.0)), d));
    }
    let phi = func.append(join, InstKind::Phi { entries });
    func.append(join, InstKind::Return { value: Value::Inst(phi) });
    (func, join)
}

#[test]
fn test_switch_chain_preserves_destinations_and_phis() {
    for default_is_join in [false, true] {
        let mut lits = LiteralTable::new();
        let (mut func, _) = switch_fn(&mut lits, default_is_join);
        let inputs = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, -1.0];
        let before: Vec<Outcome> = inputs.iter().map(|&x| run(&func, &lits, x)).collect();
        let blocks_before = func.block_count();

        assert!(SwitchLowering.run_on_function(&mut func, &mut lits));
        assert_eq!(func.block_count(), blocks_before + 4);
        assert_eq!(count(&func, |k| matches!(k, InstKind::Switch { .. })), 0);
        assert!(func.validate().is_ok());
        let after: Vec<Outcome> = inputs.iter().map(|&x| run(&func, &lits, x)).collect();
        assert_eq!(before, after);

        assert!(LowerCondBranch.run_on_function(&mut func, &mut lits));
        assert_eq!(count(&func, |k| matches!(k, InstKind::CondBranch { .. })), 0);
        assert_eq!(count(&func, |k| matches!(k, InstKind::CompareBranch { .. })), 4);
        let fused: Vec<Outcome> = inputs.iter().map(|&x| run(&func, &lits, x)).collect();
        assert_eq!(before, fused);
    }
}

#[test]
fn test_switch_without_cases_branches_to_default() {
    let mut lits = LiteralTable::new();
    let mut func = Function::new("sw", 1);
    let entry = func.add_block();
    let dflt = func.add_block();
    func.append(entry, InstKind::Switch { input: Value::Param(0), default: dflt, cases: vec![] });
    let seven = Value::Literal(lits.number(7.0));
    let phi = func.append(dflt, InstKind::Phi { entries: vec![(seven, entry)] });
    func.append(dflt, InstKind::Return { value: Value::Inst(phi) });

    assert!(SwitchLowering.run_on_function(&mut func, &mut lits));
    assert_eq!(func.block_count(), 2);
    assert_eq!(run(&func, &lits, 3.0), Outcome { exit: dflt, value: 7.0 });
}

#[test]
fn test_fusion_preconditions() {
    // Single-use, side-effect-free comparison: fused for every comparator.
    for op in [
        BinaryOp::LessThan,
        BinaryOp::LessThanOrEqual,
        BinaryOp::GreaterThan,
        BinaryOp::GreaterThanOrEqual,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::StrictlyEqual,
        BinaryOp::StrictlyNotEqual,
    ] {
        let mut lits = LiteralTable::new();
        let mut func = Function::new("f", 1);
        let entry = func.add_block();
        let yes = func.add_block();
        let no = func.add_block();
        let two = Value::Literal(lits.number(2.0));
        let cmp = func.append(entry, InstKind::BinaryOperator { op, lhs: Value::Param(0), rhs: two });
        func.append(entry, InstKind::CondBranch { cond: Value::Inst(cmp), on_true: yes, on_false: no });
        let (one, zero) = (Value::Literal(lits.number(1.0)), Value::Literal(lits.number(0.0)));
        func.append(yes, InstKind::Return { value: one });
        func.append(no, InstKind::Return { value: zero });

        let before: Vec<Outcome> = [1.0, 2.0, 3.0].iter().map(|&x| run(&func, &lits, x)).collect();
        assert!(LowerCondBranch.run_on_function(&mut func, &mut lits), "{op:?} not fused");
        assert_eq!(count(&func, |k| matches!(k, InstKind::CompareBranch { .. })), 1);
        let after: Vec<Outcome> = [1.0, 2.0, 3.0].iter().map(|&x| run(&func, &lits, x)).collect();
        assert_eq!(before, after);
    }

    // A comparison with a second use is kept.
    let mut lits = LiteralTable::new();
    let mut func = Function::new("f", 1);
    let entry = func.add_block();
    let yes = func.add_block();
    let no = func.add_block();
    let two = Value::Literal(lits.number(2.0));
    let cmp = func.append(
        entry,
        InstKind::BinaryOperator { op: BinaryOp::LessThan, lhs: Value::Param(0), rhs: two },
    );
    func.append(entry, InstKind::CondBranch { cond: Value::Inst(cmp), on_true: yes, on_false: no });
    func.append(yes, InstKind::Return { value: Value::Inst(cmp) });
    func.append(no, InstKind::Return { value: two });
    assert!(!LowerCondBranch.run_on_function(&mut func, &mut lits));

    // An effectful comparison separated from the branch is kept.
    let mut lits = LiteralTable::new();
    let mut func = Function::new("f", 2);
    let entry = func.add_block();
    let yes = func.add_block();
    let no = func.add_block();
    let cmp = func.append(
        entry,
        InstKind::BinaryOperator { op: BinaryOp::Equal, lhs: Value::Param(0), rhs: Value::Param(1) },
    );
    let two = Value::Literal(lits.number(2.0));
    func.append(entry, InstKind::LoadConst { value: two });
    func.append(entry, InstKind::CondBranch { cond: Value::Inst(cmp), on_true: yes, on_false: no });
    func.append(yes, InstKind::Return { value: two });
    func.append(no, InstKind::Return { value: two });
    assert!(!LowerCondBranch.run_on_function(&mut func, &mut lits));
}

// ============================================================================
// Array literals
// ============================================================================

fn array_stores(func: &Function, lits: &LiteralTable) -> Vec<u32> {
    let mut indices: Vec<u32> = func
        .instructions()
        .filter_map(|i| match func.kind(i) {
            InstKind::StoreOwnProperty { property, .. } => {
                lits.of(*property).and_then(Literal::as_number).map(|n| n as u32)
            }
            _ => None,
        })
        .collect();
    indices.sort_unstable();
    indices
}

fn array_fn(elements: Vec<Value>) -> (Function, InstId) {
    let mut func = Function::new("arr", 0);
    let bb = func.add_block();
    let size_hint = elements.len() as u32;
    let alloc = func.append(bb, InstKind::AllocArray { size_hint, elements });
    func.append(bb, InstKind::Return { value: Value::Inst(alloc) });
    (func, alloc)
}

#[test]
fn test_undefined_element_demotes_the_rest() {
    let mut lits = LiteralTable::new();
    let elements = vec![
        Value::Literal(lits.number(1.0)),
        Value::Literal(lits.number(2.0)),
        Value::Literal(lits.undefined()),
        Value::Literal(lits.number(3.0)),
    ];
    let (mut func, alloc) = array_fn(elements.clone());
    assert!(LimitAllocArray::new(10).run_on_function(&mut func, &mut lits));

    let InstKind::AllocArray { elements: inline, size_hint } = func.kind(alloc) else {
        panic!("allocation was replaced");
    };
    assert_eq!(inline, &elements[..2]);
    assert_eq!(*size_hint, 4);
    assert_eq!(array_stores(&func, &lits), vec![2, 3]);
}

#[test]
fn test_oversized_array_trims_tail() {
    let mut lits = LiteralTable::new();
    let elements: Vec<Value> = (0..12).map(|i| Value::Literal(lits.number(f64::from(i)))).collect();
    let (mut func, alloc) = array_fn(elements.clone());
    assert!(LimitAllocArray::new(10).run_on_function(&mut func, &mut lits));

    let InstKind::AllocArray { elements: inline, .. } = func.kind(alloc) else {
        panic!("allocation was replaced");
    };
    assert_eq!(inline, &elements[..10]);
    assert_eq!(array_stores(&func, &lits), vec![10, 11]);
    // Stores go right after the allocation, before its use.
    let insts = func.block_insts(func.entry_block().unwrap());
    assert!(matches!(func.kind(*insts.last().unwrap()), InstKind::Return { .. }));
}

// ============================================================================
// Object packing
// ============================================================================

#[test]
fn test_packing_stops_at_maximum_saving() {
    let cost = PackingCostModel {
        alloc_saving: -8,
        set_prototype_cost: 4,
        literal_saved: 10,
        placeholder_cost: 15,
        placeholder_limit: 3,
    };
    let mut lits = LiteralTable::new();
    let mut func = Function::new("obj", 1);
    let bb = func.add_block();
    let obj = func.append(bb, InstKind::AllocObject { size_hint: 4, parent: Value::Empty });
    let props = [
        ("a", Value::Literal(lits.number(1.0))),
        ("b", Value::Literal(lits.number(2.0))),
        ("c", Value::Param(0)),
        ("d", Value::Literal(lits.number(3.0))),
    ];
    for (name, value) in props {
        let property = Value::Literal(lits.string(name));
        func.append(
            bb,
            InstKind::StoreNewOwnProperty { value, object: Value::Inst(obj), property, enumerable: true },
        );
    }
    func.append(bb, InstKind::Return { value: Value::Inst(obj) });

    assert!(LowerAllocObject::new(cost, 65535).run_on_function(&mut func, &mut lits));

    let insts = func.block_insts(bb).to_vec();
    let InstKind::AllocObjectFromBuffer { entries, .. } = func.kind(insts[0]) else {
        panic!("expected a buffer allocation");
    };
    let keys: Vec<&str> = entries.iter().filter_map(|(k, _)| lits.of(*k)?.as_str()).collect();
    assert_eq!(keys, vec!["a", "b"]);

    let remaining: Vec<&str> = insts[1..]
        .iter()
        .filter_map(|&i| match func.kind(i) {
            InstKind::StoreNewOwnProperty { property, object, .. } => {
                assert_eq!(*object, Value::Inst(insts[0]));
                lits.of(*property)?.as_str()
            }
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec!["c", "d"]);
}

#[test]
fn test_default_pipeline_packs_object_literal() {
    let mut lits = LiteralTable::new();
    let mut func = Function::new("obj", 0);
    let bb = func.add_block();
    let pairs = vec![
        (Value::Literal(lits.string("x")), Value::Literal(lits.number(1.0))),
        (Value::Literal(lits.string("0")), Value::Literal(lits.boolean(true))),
        (Value::Literal(lits.string("y")), Value::Literal(lits.null())),
    ];
    let obj = func.append(bb, InstKind::AllocObjectLiteral { pairs });
    func.append(bb, InstKind::Return { value: Value::Inst(obj) });

    assert!(LoweringPipeline::default().run_on_function(&mut func, &mut lits));
    let first = func.block_insts(bb)[0];
    let InstKind::AllocObjectFromBuffer { entries, .. } = func.kind(first) else {
        panic!("expected a buffer allocation");
    };
    assert_eq!(entries.len(), 3);
    // The numeric key was canonicalized to a number before packing.
    assert_eq!(lits.of(entries[1].0), Some(&Literal::Number(0.0)));
}
