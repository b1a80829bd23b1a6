//! IR Functions
//!
//! A function owns two arenas: instructions and basic blocks. Blocks hold the
//! ordered list of live instruction handles; erasing an instruction unlinks it
//! from its block but keeps its arena slot, so handles stay stable for the
//! lifetime of the function.

use super::instr::{InstKind, Instruction};
use super::value::{BlockId, FunctionId, InstId, SourceLoc, Value};
use rustc_hash::FxHashSet;

/// Syntactic kind of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionKind {
    /// Ordinary function or method
    #[default]
    Normal,
    /// Arrow function
    Arrow,
    /// Generator function
    Generator,
    /// Async function
    Async,
}

/// Which invocation forms are forbidden for a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProhibitInvoke {
    /// May only be called with `new`
    Call = 0,
    /// May not be called with `new`
    Construct = 1,
    /// Any invocation form is allowed
    #[default]
    None = 2,
}

/// A basic block: an ordered list of instruction handles
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    insts: Vec<InstId>,
}

impl BasicBlock {
    /// Instructions in order
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Whether the block is empty
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

/// An IR function
#[derive(Debug, Clone)]
pub struct Function {
    /// Display name
    pub name: String,
    /// Syntactic kind
    pub kind: FunctionKind,
    /// Forbidden invocation forms
    pub prohibit_invoke: ProhibitInvoke,
    /// Strict-mode code
    pub strict: bool,
    /// Top-level (global scope) function
    pub global_scope: bool,
    /// Still awaiting deferred compilation
    pub lazy: bool,
    /// Declared parameter count, excluding `this`
    pub param_count: u32,
    /// Source text of the function, kept for `Function.prototype.toString`
    pub source_representation: Option<String>,
    /// Where the function starts in source
    pub location: Option<SourceLoc>,
    /// Lexically enclosing function
    pub lexical_parent: Option<FunctionId>,
    /// Names of the variables declared in the function scope
    pub variables: Vec<String>,
    insts: Vec<Instruction>,
    blocks: Vec<BasicBlock>,
}

impl Function {
    /// Create a new empty function
    pub fn new(name: impl Into<String>, param_count: u32) -> Self {
        Self {
            name: name.into(),
            kind: FunctionKind::Normal,
            prohibit_invoke: ProhibitInvoke::None,
            strict: false,
            global_scope: false,
            lazy: false,
            param_count,
            source_representation: None,
            location: None,
            lexical_parent: None,
            variables: Vec::new(),
            insts: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Parameter count including the implicit `this`
    pub fn expected_param_count_including_this(&self) -> u32 {
        self.param_count + 1
    }

    // ===== Blocks =====

    /// Add an empty block at the end of the layout
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::default());
        id
    }

    /// The entry block (first in layout)
    pub fn entry_block(&self) -> Option<BlockId> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(BlockId(0))
        }
    }

    /// All blocks in layout order
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Get a block
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// Instructions of a block in order
    pub fn block_insts(&self, id: BlockId) -> &[InstId] {
        &self.blocks[id.index()].insts
    }

    /// The last instruction of a block, if it is a terminator
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.block_insts(block).last()?;
        self.kind(last).is_terminator().then_some(last)
    }

    /// Successors of a block, deduplicated, in terminator operand order
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let Some(term) = self.terminator(block) else {
            return Vec::new();
        };
        let mut seen = FxHashSet::default();
        self.kind(term)
            .successors()
            .into_iter()
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Predecessors of a block, in layout order
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.blocks()
            .filter(|&b| self.successors(b).contains(&block))
            .collect()
    }

    // ===== Instructions =====

    /// Get an instruction
    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.index()]
    }

    /// Get an instruction's kind
    pub fn kind(&self, id: InstId) -> &InstKind {
        &self.insts[id.index()].kind
    }

    /// Get an instruction's kind mutably
    pub fn kind_mut(&mut self, id: InstId) -> &mut InstKind {
        &mut self.insts[id.index()].kind
    }

    /// Block containing an instruction, `None` if erased
    pub fn parent(&self, id: InstId) -> Option<BlockId> {
        self.insts[id.index()].parent
    }

    /// Source location of an instruction
    pub fn location(&self, id: InstId) -> Option<SourceLoc> {
        self.insts[id.index()].location
    }

    /// Set the source location of an instruction
    pub fn set_location(&mut self, id: InstId, loc: Option<SourceLoc>) {
        self.insts[id.index()].location = loc;
    }

    fn alloc(&mut self, kind: InstKind, parent: BlockId) -> InstId {
        let id = InstId(self.insts.len() as u32);
        let mut inst = Instruction::new(kind);
        inst.parent = Some(parent);
        self.insts.push(inst);
        id
    }

    fn position(&self, id: InstId) -> (BlockId, usize) {
        let block = self
            .parent(id)
            .unwrap_or_else(|| panic!("instruction {} is not in a block", id));
        let pos = self.blocks[block.index()]
            .insts
            .iter()
            .position(|&i| i == id)
            .unwrap_or_else(|| panic!("instruction {} missing from {}", id, block));
        (block, pos)
    }

    /// Append an instruction at the end of a block
    pub fn append(&mut self, block: BlockId, kind: InstKind) -> InstId {
        let id = self.alloc(kind, block);
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Insert an instruction immediately before `anchor`
    pub fn insert_before(&mut self, anchor: InstId, kind: InstKind) -> InstId {
        let (block, pos) = self.position(anchor);
        let id = self.alloc(kind, block);
        self.blocks[block.index()].insts.insert(pos, id);
        id
    }

    /// Insert an instruction immediately after `anchor`
    pub fn insert_after(&mut self, anchor: InstId, kind: InstKind) -> InstId {
        let (block, pos) = self.position(anchor);
        let id = self.alloc(kind, block);
        self.blocks[block.index()].insts.insert(pos + 1, id);
        id
    }

    /// Unlink an instruction from its block. The handle stays valid but the
    /// instruction no longer executes or counts as a user.
    pub fn erase(&mut self, id: InstId) {
        let (block, pos) = self.position(id);
        self.blocks[block.index()].insts.remove(pos);
        self.insts[id.index()].parent = None;
    }

    /// The instruction immediately preceding `id` in its block
    pub fn prev_inst(&self, id: InstId) -> Option<InstId> {
        let (block, pos) = self.position(id);
        pos.checked_sub(1).map(|p| self.blocks[block.index()].insts[p])
    }

    /// All live instructions in layout order
    pub fn instructions(&self) -> impl Iterator<Item = InstId> + '_ {
        self.blocks.iter().flat_map(|b| b.insts.iter().copied())
    }

    /// Number of live instructions
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    /// Live instructions that use `id` as an operand, in layout order
    pub fn users(&self, id: InstId) -> Vec<InstId> {
        let target = Value::Inst(id);
        self.instructions()
            .filter(|&user| self.kind(user).operands().iter().any(|o| o.value == target))
            .collect()
    }

    /// Number of operand slots referring to `id`
    pub fn use_count(&self, id: InstId) -> usize {
        let target = Value::Inst(id);
        self.instructions()
            .map(|user| {
                self.kind(user)
                    .operands()
                    .iter()
                    .filter(|o| o.value == target)
                    .count()
            })
            .sum()
    }

    /// Whether `id` is used by exactly one operand slot
    pub fn has_one_user(&self, id: InstId) -> bool {
        self.use_count(id) == 1
    }

    /// Redirect every use of `old` to `new`
    pub fn replace_all_uses_with(&mut self, old: InstId, new: Value) {
        let target = Value::Inst(old);
        let live: Vec<InstId> = self.instructions().collect();
        for user in live {
            self.kind_mut(user).for_each_operand_mut(|v| {
                if *v == target {
                    *v = new;
                }
            });
        }
    }

    // ===== Phis =====

    /// Phi instructions at the head of a block
    pub fn phis(&self, block: BlockId) -> Vec<InstId> {
        self.block_insts(block)
            .iter()
            .copied()
            .take_while(|&i| self.kind(i).is_phi())
            .collect()
    }

    /// The incoming value of a phi for the given predecessor
    pub fn phi_incoming(&self, phi: InstId, pred: BlockId) -> Option<Value> {
        match self.kind(phi) {
            InstKind::Phi { entries } => {
                entries.iter().find(|(_, b)| *b == pred).map(|(v, _)| *v)
            }
            _ => None,
        }
    }

    /// Add an incoming `(value, pred)` entry to a phi
    pub fn add_phi_entry(&mut self, phi: InstId, value: Value, pred: BlockId) {
        if let InstKind::Phi { entries } = self.kind_mut(phi) {
            entries.push((value, pred));
        }
    }

    /// Remove every entry of a phi coming from `pred`
    pub fn remove_phi_entries(&mut self, phi: InstId, pred: BlockId) {
        if let InstKind::Phi { entries } = self.kind_mut(phi) {
            entries.retain(|(_, b)| *b != pred);
        }
    }

    // ===== Validation =====

    /// Validate the function structure
    pub fn validate(&self) -> Result<(), String> {
        if self.blocks.is_empty() {
            return Err(format!("Function '{}' has no blocks", self.name));
        }

        for block in self.blocks() {
            let insts = self.block_insts(block);
            let Some(&last) = insts.last() else {
                return Err(format!("Block {} is empty", block));
            };
            if !self.kind(last).is_terminator() {
                return Err(format!("Block {} is not terminated", block));
            }

            let mut seen_non_phi = false;
            for &inst in insts {
                let kind = self.kind(inst);
                if kind.is_terminator() && inst != last {
                    return Err(format!("Terminator {} is not last in block {}", inst, block));
                }
                if kind.is_phi() {
                    if seen_non_phi {
                        return Err(format!("Phi {} is not at the head of block {}", inst, block));
                    }
                } else {
                    seen_non_phi = true;
                }
            }

            for succ in self.kind(last).successors() {
                if succ.index() >= self.blocks.len() {
                    return Err(format!("Block {} branches to missing block {}", block, succ));
                }
            }
        }

        Ok(())
    }
}

/// Where a [`Builder`] places new instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append to the end of a block
    AtEnd(BlockId),
    /// Insert before an instruction; successive insertions keep creation order
    Before(InstId),
    /// Insert after an instruction; successive insertions keep creation order
    After(InstId),
}

/// Instruction builder with a movable insertion cursor
pub struct Builder<'f> {
    func: &'f mut Function,
    point: InsertPoint,
    location: Option<SourceLoc>,
}

impl<'f> Builder<'f> {
    /// Create a builder positioned at `point`
    pub fn new(func: &'f mut Function, point: InsertPoint) -> Self {
        Self { func, point, location: None }
    }

    /// Move the insertion cursor
    pub fn set_insert_point(&mut self, point: InsertPoint) {
        self.point = point;
    }

    /// Source location stamped on every created instruction
    pub fn set_location(&mut self, loc: Option<SourceLoc>) {
        self.location = loc;
    }

    /// Create an instruction at the cursor
    pub fn create(&mut self, kind: InstKind) -> InstId {
        let id = match self.point {
            InsertPoint::AtEnd(block) => self.func.append(block, kind),
            InsertPoint::Before(anchor) => self.func.insert_before(anchor, kind),
            InsertPoint::After(anchor) => {
                let id = self.func.insert_after(anchor, kind);
                self.point = InsertPoint::After(id);
                id
            }
        };
        self.func.set_location(id, self.location);
        id
    }

    /// Add a new block to the function
    pub fn create_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    /// The function being built
    pub fn func(&mut self) -> &mut Function {
        &mut *self.func
    }
}
