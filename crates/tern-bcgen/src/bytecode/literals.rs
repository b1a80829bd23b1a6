//! Literal value and object key buffers
//!
//! Array elements and object values of every emitted function are serialized
//! into one shared value buffer; object keys go into a shared key buffer.
//! The instruction that consumes a sequence refers to it by byte offset.
//!
//! A sequence is a list of runs. Each run starts with a header holding the
//! tag of its elements and their count:
//!
//! - count <= 15: one byte, `tag << 4 | count`
//! - count <= 4095: two bytes, `0x80 | tag << 4 | count >> 8`, `count & 0xff`
//!
//! and is followed by the payload of each element (little-endian).

use super::strings::StringTable;
use crate::error::GenerationError;
use crate::ir::{Function, FunctionId, InstId, InstKind, Literal, LiteralTable, Module, Value};
use crate::lower::literal::serializable_value;
use rustc_hash::FxHashMap;

/// Longest run a header can describe
pub const MAX_RUN_LENGTH: usize = 4095;

/// Element tag of a serialized run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LiteralTag {
    /// `null`, no payload
    Null = 0,
    /// `true`, no payload
    True = 1,
    /// `false`, no payload
    False = 2,
    /// 8-byte double
    Number = 3,
    /// 4-byte string ID
    LongString = 4,
    /// 2-byte string ID
    ShortString = 5,
    /// 1-byte string ID
    ByteString = 6,
    /// 4-byte signed integer
    Integer = 7,
}

/// Where the buffers of one allocation start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralOffsets {
    /// Offset into the key buffer (objects only)
    pub keys: Option<u32>,
    /// Offset into the value buffer
    pub values: u32,
}

/// Serialized buffers shared by a whole bytecode module
#[derive(Debug, Clone, Default)]
pub struct LiteralBuffers {
    /// Array elements and object values
    pub value_buffer: Vec<u8>,
    /// Object keys
    pub key_buffer: Vec<u8>,
    offsets: FxHashMap<(FunctionId, InstId), LiteralOffsets>,
}

impl LiteralBuffers {
    /// Offsets of the buffers used by an allocation instruction
    pub fn offsets(&self, func: FunctionId, inst: InstId) -> Option<LiteralOffsets> {
        self.offsets.get(&(func, inst)).copied()
    }

    /// Number of allocations with buffer data
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no allocation has buffer data
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Builds [`LiteralBuffers`] one function at a time
pub struct LiteralBufferBuilder<'a> {
    literals: &'a LiteralTable,
    strings: &'a StringTable,
    /// Reuse identical sequences
    dedup: bool,
    buffers: LiteralBuffers,
    seen_values: FxHashMap<Vec<u8>, u32>,
    seen_keys: FxHashMap<Vec<u8>, u32>,
}

impl<'a> LiteralBufferBuilder<'a> {
    /// Create a builder. Strings are looked up in `strings`, which must
    /// already contain every string a buffer refers to.
    pub fn new(literals: &'a LiteralTable, strings: &'a StringTable, optimize: bool) -> Self {
        Self {
            literals,
            strings,
            dedup: optimize,
            buffers: LiteralBuffers::default(),
            seen_values: FxHashMap::default(),
            seen_keys: FxHashMap::default(),
        }
    }

    /// Serialize the buffers of every function `emit` accepts
    pub fn build(
        module: &Module,
        strings: &StringTable,
        optimize: bool,
        emit: impl Fn(FunctionId) -> bool,
    ) -> Result<LiteralBuffers, GenerationError> {
        let mut builder = LiteralBufferBuilder::new(&module.literals, strings, optimize);
        for id in module.function_ids().filter(|&id| emit(id)) {
            builder.add_function(id, module.function(id))?;
        }
        Ok(builder.finish())
    }

    /// Serialize the array and object buffers of one function
    pub fn add_function(&mut self, id: FunctionId, func: &Function) -> Result<(), GenerationError> {
        for inst in func.instructions() {
            match func.kind(inst) {
                InstKind::AllocArray { elements, .. } if !elements.is_empty() => {
                    let Some(values) = self.resolve(func, elements.iter().copied()) else {
                        return Err(GenerationError::UnserializableLiteral { function: func.name.clone() });
                    };
                    let bytes = self.serialize(&values, false)?;
                    let values = self.append_values(bytes);
                    self.buffers.offsets.insert((id, inst), LiteralOffsets { keys: None, values });
                }
                InstKind::AllocObjectFromBuffer { entries, .. } if !entries.is_empty() => {
                    let keys = self.resolve(func, entries.iter().map(|&(k, _)| k));
                    let values = self.resolve(func, entries.iter().map(|&(_, v)| v));
                    let (Some(keys), Some(values)) = (keys, values) else {
                        return Err(GenerationError::UnserializableLiteral { function: func.name.clone() });
                    };
                    let key_bytes = self.serialize(&keys, true)?;
                    let value_bytes = self.serialize(&values, false)?;
                    let keys = self.append_keys(key_bytes);
                    let values = self.append_values(value_bytes);
                    self.buffers.offsets.insert((id, inst), LiteralOffsets { keys: Some(keys), values });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Take the finished buffers
    pub fn finish(self) -> LiteralBuffers {
        self.buffers
    }

    fn resolve(&self, func: &Function, values: impl Iterator<Item = Value>) -> Option<Vec<&'a Literal>> {
        let literals = self.literals;
        values
            .map(|v| serializable_value(func, literals, v).map(|id| literals.get(id)))
            .collect()
    }

    fn append_values(&mut self, bytes: Vec<u8>) -> u32 {
        append(&mut self.buffers.value_buffer, &mut self.seen_values, bytes, self.dedup)
    }

    fn append_keys(&mut self, bytes: Vec<u8>) -> u32 {
        append(&mut self.buffers.key_buffer, &mut self.seen_keys, bytes, self.dedup)
    }

    fn serialize(&self, literals: &[&Literal], keys: bool) -> Result<Vec<u8>, GenerationError> {
        let mut out = Vec::new();
        let mut run: Vec<u8> = Vec::new();
        let mut run_tag: Option<LiteralTag> = None;
        let mut run_len = 0usize;

        for lit in literals {
            let (tag, payload) = self.encode(lit, keys)?;
            if run_tag != Some(tag) || run_len == MAX_RUN_LENGTH {
                if let Some(prev) = run_tag {
                    write_header(&mut out, prev, run_len);
                    out.append(&mut run);
                }
                run_tag = Some(tag);
                run_len = 0;
            }
            run.extend_from_slice(&payload);
            run_len += 1;
        }
        if let Some(prev) = run_tag {
            write_header(&mut out, prev, run_len);
            out.append(&mut run);
        }
        Ok(out)
    }

    fn encode(&self, lit: &Literal, key: bool) -> Result<(LiteralTag, Vec<u8>), GenerationError> {
        Ok(match lit {
            Literal::Null => (LiteralTag::Null, vec![]),
            Literal::Bool(true) => (LiteralTag::True, vec![]),
            Literal::Bool(false) => (LiteralTag::False, vec![]),
            Literal::Number(n) => match as_int32(*n) {
                Some(i) => (LiteralTag::Integer, i.to_le_bytes().to_vec()),
                None => (LiteralTag::Number, n.to_le_bytes().to_vec()),
            },
            Literal::String(s) => {
                let id = if key { self.strings.identifier_id(s) } else { self.strings.id_of(s) };
                let id = id.ok_or_else(|| GenerationError::MissingString(s.clone()))?;
                if id <= u32::from(u8::MAX) {
                    (LiteralTag::ByteString, vec![id as u8])
                } else if id <= u32::from(u16::MAX) {
                    (LiteralTag::ShortString, (id as u16).to_le_bytes().to_vec())
                } else {
                    (LiteralTag::LongString, id.to_le_bytes().to_vec())
                }
            }
            Literal::Undefined | Literal::BigInt(_) => {
                unreachable!("unserializable literal in buffer")
            }
        })
    }
}

fn append(buffer: &mut Vec<u8>, seen: &mut FxHashMap<Vec<u8>, u32>, bytes: Vec<u8>, dedup: bool) -> u32 {
    if dedup {
        if let Some(&offset) = seen.get(&bytes) {
            return offset;
        }
    }
    let offset = buffer.len() as u32;
    buffer.extend_from_slice(&bytes);
    if dedup {
        seen.insert(bytes, offset);
    }
    offset
}

fn write_header(out: &mut Vec<u8>, tag: LiteralTag, len: usize) {
    debug_assert!(len > 0 && len <= MAX_RUN_LENGTH);
    let tag = (tag as u8) << 4;
    if len > 15 {
        out.push(0x80 | tag | (len >> 8) as u8);
        out.push((len & 0xFF) as u8);
    } else {
        out.push(tag | len as u8);
    }
}

/// `n` as an i32 if it is one exactly (`-0` is not)
fn as_int32(n: f64) -> Option<i32> {
    let i = n as i32;
    (f64::from(i) == n && !(n == 0.0 && n.is_sign_negative())).then_some(i)
}
