//! Literal classification
//!
//! Decides which values can be written straight into a literal buffer.

use crate::ir::{Function, InstKind, Literal, LiteralId, LiteralTable, Value};

/// Whether a literal can be encoded in a literal buffer.
///
/// `undefined` and big integers have no buffer encoding.
pub fn is_serializable_literal(lit: &Literal) -> bool {
    match lit {
        Literal::Number(_) | Literal::String(_) | Literal::Bool(_) | Literal::Null => true,
        Literal::Undefined | Literal::BigInt(_) => false,
    }
}

/// The buffer-encodable literal a value stands for: either the literal
/// itself or a `LoadConst` of one.
pub fn serializable_value(func: &Function, literals: &LiteralTable, value: Value) -> Option<LiteralId> {
    let lit = match value {
        Value::Literal(id) => id,
        Value::Inst(inst) => match func.kind(inst) {
            InstKind::LoadConst { value: Value::Literal(id) } => *id,
            _ => return None,
        },
        _ => return None,
    };
    is_serializable_literal(literals.get(lit)).then_some(lit)
}

/// Whether a property key is a numeric literal
pub fn is_numeric_key(literals: &LiteralTable, key: Value) -> bool {
    literals.of(key).is_some_and(Literal::is_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(is_serializable_literal(&Literal::Number(1.5)));
        assert!(is_serializable_literal(&Literal::String("a".into())));
        assert!(is_serializable_literal(&Literal::Bool(false)));
        assert!(is_serializable_literal(&Literal::Null));
        assert!(!is_serializable_literal(&Literal::Undefined));
        assert!(!is_serializable_literal(&Literal::BigInt("12".into())));
    }

    #[test]
    fn test_serializable_value_sees_through_load_const() {
        let mut literals = LiteralTable::new();
        let one = literals.number(1.0);
        let undef = literals.undefined();

        let mut func = Function::new("f", 1);
        let bb = func.add_block();
        let load = func.append(bb, InstKind::LoadConst { value: Value::Literal(one) });
        let load_undef = func.append(bb, InstKind::LoadConst { value: Value::Literal(undef) });

        assert_eq!(serializable_value(&func, &literals, Value::Literal(one)), Some(one));
        assert_eq!(serializable_value(&func, &literals, Value::Inst(load)), Some(one));
        assert_eq!(serializable_value(&func, &literals, Value::Inst(load_undef)), None);
        assert_eq!(serializable_value(&func, &literals, Value::Param(0)), None);
    }
}
