//! IR Instructions
//!
//! Every instruction kind is a variant of the closed [`InstKind`] enum, so
//! passes that ask "which operand is a property name" or "is this a valid
//! comparator" get exhaustive matching for free.

use super::value::{BlockId, LiteralId, SourceLoc, Value};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Exponentiation,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,
    /// `>>>`
    UnsignedRightShift,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `===`
    StrictlyEqual,
    /// `!==`
    StrictlyNotEqual,
    /// `in`
    In,
    /// `instanceof`
    InstanceOf,
}

impl BinaryOp {
    /// The comparator a fused compare-and-branch can carry for this operator
    pub fn compare_op(self) -> Option<CompareOp> {
        match self {
            BinaryOp::LessThan => Some(CompareOp::LessThan),
            BinaryOp::LessThanOrEqual => Some(CompareOp::LessThanOrEqual),
            BinaryOp::GreaterThan => Some(CompareOp::GreaterThan),
            BinaryOp::GreaterThanOrEqual => Some(CompareOp::GreaterThanOrEqual),
            BinaryOp::Equal => Some(CompareOp::Equal),
            BinaryOp::NotEqual => Some(CompareOp::NotEqual),
            BinaryOp::StrictlyEqual => Some(CompareOp::StrictlyEqual),
            BinaryOp::StrictlyNotEqual => Some(CompareOp::StrictlyNotEqual),
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Exponentiation
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::LeftShift
            | BinaryOp::RightShift
            | BinaryOp::UnsignedRightShift
            | BinaryOp::In
            | BinaryOp::InstanceOf => None,
        }
    }

    /// Source spelling
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exponentiation => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::UnsignedRightShift => ">>>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictlyEqual => "===",
            BinaryOp::StrictlyNotEqual => "!==",
            BinaryOp::In => "in",
            BinaryOp::InstanceOf => "instanceof",
        }
    }
}

/// Comparators carried by [`InstKind::CompareBranch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `===`
    StrictlyEqual,
    /// `!==`
    StrictlyNotEqual,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-`
    Minus,
    /// `~`
    Tilde,
    /// `!`
    Bang,
    /// `typeof`
    TypeOf,
    /// `void`
    Void,
}

/// Runtime builtins reachable through [`InstKind::CallBuiltin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `base ** exponent`
    ExponentiationOperator,
    /// Set the prototype of a fresh object without observable effects
    SilentSetPrototypeOf,
}

impl Builtin {
    /// Runtime index of the builtin
    pub fn index(self) -> u8 {
        match self {
            Builtin::ExponentiationOperator => 0,
            Builtin::SilentSetPrototypeOf => 1,
        }
    }
}

/// How much an instruction may affect the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SideEffect {
    /// No observable effect
    None,
    /// May read memory or run user code that reads
    MayReadOrWorse,
}

impl SideEffect {
    /// Whether the instruction may read memory or do anything worse
    pub fn may_read_or_worse(self) -> bool {
        self >= SideEffect::MayReadOrWorse
    }
}

/// How an operand is interpreted by the instruction that uses it.
///
/// Only string literals in identifier roles are registered as identifiers in
/// the string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// Ordinary value
    Value,
    /// Property key that the encoded instruction addresses by identifier ID
    Identifier,
    /// Property key of an instruction that takes a computed key
    ComputedKey,
}

/// An operand together with its role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// The value
    pub value: Value,
    /// How the instruction uses it
    pub role: OperandRole,
}

impl Operand {
    fn value(value: Value) -> Self {
        Self { value, role: OperandRole::Value }
    }

    fn identifier(value: Value) -> Self {
        Self { value, role: OperandRole::Identifier }
    }

    fn computed(value: Value) -> Self {
        Self { value, role: OperandRole::ComputedKey }
    }
}

/// Instruction kinds.
///
/// Operand fields are named after their role; the variant docs describe them.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum InstKind {
    // ===== Arithmetic =====
    /// Binary operator
    BinaryOperator { op: BinaryOp, lhs: Value, rhs: Value },
    /// Unary operator
    UnaryOperator { op: UnaryOp, operand: Value },
    /// Materialize a literal into a register
    LoadConst { value: Value },

    // ===== Properties =====
    /// `object[property]`
    LoadProperty { object: Value, property: Value },
    /// `object[property] = value`
    StoreProperty { value: Value, object: Value, property: Value },
    /// Define an own property, possibly redefining an existing one
    StoreOwnProperty { value: Value, object: Value, property: Value, enumerable: bool },
    /// Define an own property that is known not to exist yet
    StoreNewOwnProperty { value: Value, object: Value, property: Value, enumerable: bool },
    /// Define an accessor property
    StoreGetterSetter {
        getter: Value,
        setter: Value,
        object: Value,
        property: Value,
        enumerable: bool,
    },
    /// `delete object[property]`
    DeleteProperty { object: Value, property: Value },
    /// Read a global property, throwing if absent
    TryLoadGlobalProperty { property: Value },
    /// Write a global property, throwing if absent in strict mode
    TryStoreGlobalProperty { value: Value, property: Value },
    /// Declare a global variable
    DeclareGlobalVar { name: Value },

    // ===== Allocation =====
    /// Empty object populated by later stores. `parent` is `Value::Empty` for
    /// the default prototype.
    AllocObject { size_hint: u32, parent: Value },
    /// Object literal carrying its own ordered key/value list
    AllocObjectLiteral { pairs: Vec<(Value, Value)> },
    /// Array literal with inline elements
    AllocArray { size_hint: u32, elements: Vec<Value> },
    /// Object built from a serialized key/value buffer
    AllocObjectFromBuffer { size_hint: u32, entries: Vec<(Value, Value)> },

    // ===== Calls =====
    /// Call a function value
    Call { callee: Value, this: Value, args: Vec<Value> },
    /// Call a runtime builtin with positional arguments
    CallBuiltin { builtin: Builtin, args: Vec<Value> },

    // ===== SSA =====
    /// Select a value by incoming edge
    Phi { entries: Vec<(Value, BlockId)> },

    // ===== Terminators =====
    /// Unconditional branch
    Branch { target: BlockId },
    /// Conditional branch on a boolean-ish value
    CondBranch { cond: Value, on_true: BlockId, on_false: BlockId },
    /// Fused comparison and conditional branch
    CompareBranch {
        op: CompareOp,
        lhs: Value,
        rhs: Value,
        on_true: BlockId,
        on_false: BlockId,
    },
    /// Multi-way branch on strict equality with literal cases
    Switch { input: Value, default: BlockId, cases: Vec<(LiteralId, BlockId)> },
    /// Return from the function
    Return { value: Value },
    /// Throw an exception
    Throw { value: Value },
    /// Control never reaches here
    Unreachable,
}

impl InstKind {
    /// Short mnemonic for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            InstKind::BinaryOperator { .. } => "BinaryOperator",
            InstKind::UnaryOperator { .. } => "UnaryOperator",
            InstKind::LoadConst { .. } => "LoadConst",
            InstKind::LoadProperty { .. } => "LoadProperty",
            InstKind::StoreProperty { .. } => "StoreProperty",
            InstKind::StoreOwnProperty { .. } => "StoreOwnProperty",
            InstKind::StoreNewOwnProperty { .. } => "StoreNewOwnProperty",
            InstKind::StoreGetterSetter { .. } => "StoreGetterSetter",
            InstKind::DeleteProperty { .. } => "DeleteProperty",
            InstKind::TryLoadGlobalProperty { .. } => "TryLoadGlobalProperty",
            InstKind::TryStoreGlobalProperty { .. } => "TryStoreGlobalProperty",
            InstKind::DeclareGlobalVar { .. } => "DeclareGlobalVar",
            InstKind::AllocObject { .. } => "AllocObject",
            InstKind::AllocObjectLiteral { .. } => "AllocObjectLiteral",
            InstKind::AllocArray { .. } => "AllocArray",
            InstKind::AllocObjectFromBuffer { .. } => "AllocObjectFromBuffer",
            InstKind::Call { .. } => "Call",
            InstKind::CallBuiltin { .. } => "CallBuiltin",
            InstKind::Phi { .. } => "Phi",
            InstKind::Branch { .. } => "Branch",
            InstKind::CondBranch { .. } => "CondBranch",
            InstKind::CompareBranch { .. } => "CompareBranch",
            InstKind::Switch { .. } => "Switch",
            InstKind::Return { .. } => "Return",
            InstKind::Throw { .. } => "Throw",
            InstKind::Unreachable => "Unreachable",
        }
    }

    /// Whether this instruction ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. }
                | InstKind::CondBranch { .. }
                | InstKind::CompareBranch { .. }
                | InstKind::Switch { .. }
                | InstKind::Return { .. }
                | InstKind::Throw { .. }
                | InstKind::Unreachable
        )
    }

    /// Whether this is a phi
    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi { .. })
    }

    /// Successor blocks, in operand order (duplicates preserved)
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Branch { target } => vec![*target],
            InstKind::CondBranch { on_true, on_false, .. }
            | InstKind::CompareBranch { on_true, on_false, .. } => vec![*on_true, *on_false],
            InstKind::Switch { default, cases, .. } => {
                let mut succs = vec![*default];
                succs.extend(cases.iter().map(|(_, dest)| *dest));
                succs
            }
            _ => Vec::new(),
        }
    }

    /// All value operands with their roles, in operand order
    pub fn operands(&self) -> Vec<Operand> {
        use Operand as O;
        match self {
            InstKind::BinaryOperator { lhs, rhs, .. } => vec![O::value(*lhs), O::value(*rhs)],
            InstKind::UnaryOperator { operand, .. } => vec![O::value(*operand)],
            InstKind::LoadConst { value } => vec![O::value(*value)],
            InstKind::LoadProperty { object, property } => {
                vec![O::value(*object), O::identifier(*property)]
            }
            InstKind::StoreProperty { value, object, property } => {
                vec![O::value(*value), O::value(*object), O::identifier(*property)]
            }
            InstKind::StoreOwnProperty { value, object, property, .. } => {
                vec![O::value(*value), O::value(*object), O::computed(*property)]
            }
            InstKind::StoreNewOwnProperty { value, object, property, .. } => {
                vec![O::value(*value), O::value(*object), O::identifier(*property)]
            }
            InstKind::StoreGetterSetter { getter, setter, object, property, .. } => vec![
                O::value(*getter),
                O::value(*setter),
                O::value(*object),
                O::computed(*property),
            ],
            InstKind::DeleteProperty { object, property } => {
                vec![O::value(*object), O::identifier(*property)]
            }
            InstKind::TryLoadGlobalProperty { property } => vec![O::identifier(*property)],
            InstKind::TryStoreGlobalProperty { value, property } => {
                vec![O::value(*value), O::identifier(*property)]
            }
            InstKind::DeclareGlobalVar { name } => vec![O::identifier(*name)],
            InstKind::AllocObject { parent, .. } => vec![O::value(*parent)],
            InstKind::AllocObjectLiteral { pairs } => pairs
                .iter()
                .flat_map(|(k, v)| [O::computed(*k), O::value(*v)])
                .collect(),
            InstKind::AllocArray { elements, .. } => {
                elements.iter().map(|e| O::value(*e)).collect()
            }
            InstKind::AllocObjectFromBuffer { entries, .. } => entries
                .iter()
                .flat_map(|(k, v)| [O::identifier(*k), O::value(*v)])
                .collect(),
            InstKind::Call { callee, this, args } => {
                let mut ops = vec![O::value(*callee), O::value(*this)];
                ops.extend(args.iter().map(|a| O::value(*a)));
                ops
            }
            InstKind::CallBuiltin { args, .. } => args.iter().map(|a| O::value(*a)).collect(),
            InstKind::Phi { entries } => entries.iter().map(|(v, _)| O::value(*v)).collect(),
            InstKind::CondBranch { cond, .. } => vec![O::value(*cond)],
            InstKind::CompareBranch { lhs, rhs, .. } => vec![O::value(*lhs), O::value(*rhs)],
            InstKind::Switch { input, .. } => vec![O::value(*input)],
            InstKind::Return { value } | InstKind::Throw { value } => vec![O::value(*value)],
            InstKind::Branch { .. } | InstKind::Unreachable => Vec::new(),
        }
    }

    /// Visit every value operand mutably, in operand order
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            InstKind::BinaryOperator { lhs, rhs, .. } | InstKind::CompareBranch { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            InstKind::UnaryOperator { operand: v, .. }
            | InstKind::LoadConst { value: v }
            | InstKind::TryLoadGlobalProperty { property: v }
            | InstKind::DeclareGlobalVar { name: v }
            | InstKind::AllocObject { parent: v, .. }
            | InstKind::CondBranch { cond: v, .. }
            | InstKind::Switch { input: v, .. }
            | InstKind::Return { value: v }
            | InstKind::Throw { value: v } => f(v),
            InstKind::LoadProperty { object, property }
            | InstKind::DeleteProperty { object, property } => {
                f(object);
                f(property);
            }
            InstKind::StoreProperty { value, object, property }
            | InstKind::StoreOwnProperty { value, object, property, .. }
            | InstKind::StoreNewOwnProperty { value, object, property, .. } => {
                f(value);
                f(object);
                f(property);
            }
            InstKind::StoreGetterSetter { getter, setter, object, property, .. } => {
                f(getter);
                f(setter);
                f(object);
                f(property);
            }
            InstKind::TryStoreGlobalProperty { value, property } => {
                f(value);
                f(property);
            }
            InstKind::AllocObjectLiteral { pairs: entries }
            | InstKind::AllocObjectFromBuffer { entries, .. } => {
                for (k, v) in entries {
                    f(k);
                    f(v);
                }
            }
            InstKind::AllocArray { elements: vs, .. } | InstKind::CallBuiltin { args: vs, .. } => {
                vs.iter_mut().for_each(f)
            }
            InstKind::Call { callee, this, args } => {
                f(callee);
                f(this);
                args.iter_mut().for_each(f);
            }
            InstKind::Phi { entries } => entries.iter_mut().for_each(|(v, _)| f(v)),
            InstKind::Branch { .. } | InstKind::Unreachable => {}
        }
    }

    /// The property-key operand of instructions that address a single property
    pub fn property_operand_mut(&mut self) -> Option<&mut Value> {
        match self {
            InstKind::LoadProperty { property, .. }
            | InstKind::StoreProperty { property, .. }
            | InstKind::StoreOwnProperty { property, .. }
            | InstKind::StoreNewOwnProperty { property, .. }
            | InstKind::StoreGetterSetter { property, .. }
            | InstKind::DeleteProperty { property, .. } => Some(property),
            _ => None,
        }
    }

    /// Side-effect class of this instruction.
    ///
    /// Comparisons between two literals, and strict (in)equality on any
    /// operands, cannot call user code. Every other operator may run
    /// `valueOf`/`toString` and is conservatively treated as reading.
    pub fn side_effect(&self) -> SideEffect {
        match self {
            InstKind::BinaryOperator { op, lhs, rhs } => {
                let literal_only = lhs.as_literal().is_some() && rhs.as_literal().is_some();
                if literal_only
                    || matches!(op, BinaryOp::StrictlyEqual | BinaryOp::StrictlyNotEqual)
                {
                    SideEffect::None
                } else {
                    SideEffect::MayReadOrWorse
                }
            }
            InstKind::UnaryOperator { op, operand } => match op {
                UnaryOp::TypeOf | UnaryOp::Void | UnaryOp::Bang => SideEffect::None,
                UnaryOp::Minus | UnaryOp::Tilde if operand.as_literal().is_some() => {
                    SideEffect::None
                }
                UnaryOp::Minus | UnaryOp::Tilde => SideEffect::MayReadOrWorse,
            },
            InstKind::LoadConst { .. }
            | InstKind::AllocObject { .. }
            | InstKind::AllocArray { .. }
            | InstKind::AllocObjectLiteral { .. }
            | InstKind::AllocObjectFromBuffer { .. }
            | InstKind::Phi { .. } => SideEffect::None,
            _ => SideEffect::MayReadOrWorse,
        }
    }
}

/// An instruction in a function's arena
#[derive(Debug, Clone)]
pub struct Instruction {
    /// What the instruction does
    pub kind: InstKind,
    /// Owning block (`None` once erased)
    pub parent: Option<BlockId>,
    /// Source position, if known
    pub location: Option<SourceLoc>,
}

impl Instruction {
    /// Create a detached instruction
    pub fn new(kind: InstKind) -> Self {
        Self { kind, parent: None, location: None }
    }

    /// Whether the instruction has been erased from its block
    pub fn is_erased(&self) -> bool {
        self.parent.is_none()
    }
}

impl fmt::Display for InstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            InstKind::BinaryOperator { op, lhs, rhs } => write!(f, " {} {} {}", lhs, op.as_str(), rhs),
            InstKind::CompareBranch { op, lhs, rhs, on_true, on_false } => {
                write!(f, " {:?} {}, {}, {}, {}", op, lhs, rhs, on_true, on_false)
            }
            _ => {
                let ops = self.operands();
                for (i, op) in ops.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { " " } else { ", " }, op.value)?;
                }
                for (i, succ) in self.successors().iter().enumerate() {
                    let sep = if i == 0 && ops.is_empty() { " " } else { ", " };
                    write!(f, "{}{}", sep, succ)?;
                }
                Ok(())
            }
        }
    }
}
