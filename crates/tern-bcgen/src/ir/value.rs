//! IR Values
//!
//! Operands are small `Copy` handles. Instructions are addressed by [`InstId`]
//! within their function, literals by [`LiteralId`] within the module that
//! interned them.

use rustc_hash::FxHashMap;
use std::fmt;

/// Instruction handle (index into the owning function's instruction arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// Basic block handle (index into the owning function's block arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Function handle (index into the module's function list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// Literal handle (index into the module's literal table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralId(pub u32);

impl InstId {
    /// Get the raw index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    /// Get the raw index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FunctionId {
    /// Get the raw index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// An instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Result of another instruction in the same function
    Inst(InstId),
    /// An interned literal
    Literal(LiteralId),
    /// A formal parameter (0 is the first declared parameter)
    Param(u32),
    /// A function of the module (closure creation, callee)
    Function(FunctionId),
    /// Absent operand (e.g. "no explicit prototype")
    Empty,
}

impl Value {
    /// The instruction this value refers to, if any
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// The literal this value refers to, if any
    pub fn as_literal(self) -> Option<LiteralId> {
        match self {
            Value::Literal(id) => Some(id),
            _ => None,
        }
    }

    /// Whether this is the empty sentinel
    pub fn is_empty(self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Inst(id) => write!(f, "{}", id),
            Value::Literal(id) => write!(f, "$lit{}", id.0),
            Value::Param(i) => write!(f, "%param{}", i),
            Value::Function(id) => write!(f, "{}", id),
            Value::Empty => write!(f, "empty"),
        }
    }
}

/// A source position attached to an instruction or function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLoc {
    /// Index into the module's source file list
    pub buffer: u32,
    /// Line (1-based)
    pub line: u32,
    /// Column (1-based)
    pub column: u32,
}

impl SourceLoc {
    /// Create a new source location
    pub fn new(buffer: u32, line: u32, column: u32) -> Self {
        Self { buffer, line, column }
    }
}

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// IEEE-754 double
    Number(f64),
    /// String (UTF-8)
    String(String),
    /// Boolean
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Big integer, kept in its decimal source text
    BigInt(String),
}

impl Literal {
    /// The string contents, if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric value, if this is a number literal
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is a number literal
    pub fn is_number(&self) -> bool {
        matches!(self, Literal::Number(_))
    }

    /// Whether this is a string literal
    pub fn is_string(&self) -> bool {
        matches!(self, Literal::String(_))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
            Literal::Undefined => write!(f, "undefined"),
            Literal::BigInt(s) => write!(f, "{}n", s),
        }
    }
}

/// Hashable interning key. Numbers are keyed by bit pattern so `0` and `-0`
/// stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Number(u64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    BigInt(String),
}

impl From<&Literal> for LiteralKey {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Number(n) => LiteralKey::Number(n.to_bits()),
            Literal::String(s) => LiteralKey::String(s.clone()),
            Literal::Bool(b) => LiteralKey::Bool(*b),
            Literal::Null => LiteralKey::Null,
            Literal::Undefined => LiteralKey::Undefined,
            Literal::BigInt(s) => LiteralKey::BigInt(s.clone()),
        }
    }
}

/// Per-module literal interning table
#[derive(Debug, Clone, Default)]
pub struct LiteralTable {
    literals: Vec<Literal>,
    lookup: FxHashMap<LiteralKey, LiteralId>,
}

impl LiteralTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a literal, returning the existing handle for equal literals
    pub fn intern(&mut self, lit: Literal) -> LiteralId {
        let key = LiteralKey::from(&lit);
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = LiteralId(self.literals.len() as u32);
        self.literals.push(lit);
        self.lookup.insert(key, id);
        id
    }

    /// Intern a number
    pub fn number(&mut self, n: f64) -> LiteralId {
        self.intern(Literal::Number(n))
    }

    /// Intern a string
    pub fn string(&mut self, s: impl Into<String>) -> LiteralId {
        self.intern(Literal::String(s.into()))
    }

    /// Intern a boolean
    pub fn boolean(&mut self, b: bool) -> LiteralId {
        self.intern(Literal::Bool(b))
    }

    /// Intern `null`
    pub fn null(&mut self) -> LiteralId {
        self.intern(Literal::Null)
    }

    /// Intern `undefined`
    pub fn undefined(&mut self) -> LiteralId {
        self.intern(Literal::Undefined)
    }

    /// Intern a big integer from its decimal text
    pub fn bigint(&mut self, digits: impl Into<String>) -> LiteralId {
        self.intern(Literal::BigInt(digits.into()))
    }

    /// Look up a literal by handle
    pub fn get(&self, id: LiteralId) -> &Literal {
        &self.literals[id.0 as usize]
    }

    /// The literal behind a value, if the value is a literal
    pub fn of(&self, value: Value) -> Option<&Literal> {
        value.as_literal().map(|id| self.get(id))
    }

    /// Number of interned literals
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_dedups() {
        let mut table = LiteralTable::new();
        let a = table.string("x");
        let b = table.string("x");
        let c = table.number(1.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_negative_zero_is_distinct() {
        let mut table = LiteralTable::new();
        let pos = table.number(0.0);
        let neg = table.number(-0.0);
        assert_ne!(pos, neg);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Inst(InstId(3)).to_string(), "%3");
        assert_eq!(Value::Empty.to_string(), "empty");
        assert_eq!(BlockId(2).to_string(), "BB2");
    }
}
