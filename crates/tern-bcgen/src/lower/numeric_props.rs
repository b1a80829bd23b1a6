//! String-to-numeric property key canonicalization
//!
//! Rewrites string-literal property keys that spell an array index (`"0"`,
//! `"42"`) into number literals, so later passes only need to recognize
//! numeric keys in one form.

use super::LowerPass;
use crate::ir::{Function, InstKind, LiteralTable, Value};

/// Largest valid array index (2^32 - 2)
pub const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// Parse `s` as a canonical array index: decimal digits only, no sign, no
/// leading zero (except `"0"` itself), at most [`MAX_ARRAY_INDEX`].
pub fn to_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return None;
    }
    let mut value: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + u64::from(b - b'0');
        if value > u64::from(MAX_ARRAY_INDEX) {
            return None;
        }
    }
    Some(value as u32)
}

/// Rewrites array-index-like string keys to number literals
pub struct LowerNumericProperties;

impl LowerNumericProperties {
    fn canonicalize(key: &mut Value, literals: &mut LiteralTable) -> bool {
        let Some(index) = literals.of(*key).and_then(|lit| lit.as_str()).and_then(to_array_index)
        else {
            return false;
        };
        *key = Value::Literal(literals.number(f64::from(index)));
        true
    }
}

impl LowerPass for LowerNumericProperties {
    fn name(&self) -> &'static str {
        "lower-numeric-properties"
    }

    fn run_on_function(&self, func: &mut Function, literals: &mut LiteralTable) -> bool {
        let insts: Vec<_> = func.instructions().collect();
        let mut changed = false;

        for inst in insts {
            match func.kind_mut(inst) {
                InstKind::AllocObjectLiteral { pairs }
                | InstKind::AllocObjectFromBuffer { entries: pairs, .. } => {
                    for (key, _) in pairs.iter_mut() {
                        changed |= Self::canonicalize(key, literals);
                    }
                }
                other => {
                    if let Some(key) = other.property_operand_mut() {
                        changed |= Self::canonicalize(key, literals);
                    }
                }
            }
        }

        changed
    }
}
