//! String table for bytecode modules
//!
//! Strings are collected into a [`StringAccumulator`] while walking the IR and
//! frozen into a [`StringTable`] that maps each distinct byte string to a
//! stable ID. Every entry is either a plain string or an identifier
//! (property names, global names); the runtime interns identifiers up front.

use rustc_hash::FxHashMap;

/// Class of a string table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    /// Plain string literal
    String,
    /// Identifier
    Identifier,
}

/// A run of consecutive entries of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringKindRun {
    /// Kind of every entry in the run
    pub kind: StringKind,
    /// Number of entries
    pub count: u32,
}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    is_identifier: bool,
    uses: u32,
    /// Order of first insertion, used as the tie-breaker when sorting
    first_seen: u32,
    seeded: bool,
}

/// Collects strings and how they are used
#[derive(Debug, Clone, Default)]
pub struct StringAccumulator {
    entries: Vec<Entry>,
    lookup: FxHashMap<Vec<u8>, usize>,
}

impl StringAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously emitted table. Every seeded string keeps its ID.
    pub fn with_base(base: &StringTable) -> Self {
        let mut acc = Self::new();
        for (id, bytes) in base.strings.iter().enumerate() {
            acc.lookup.insert(bytes.clone(), id);
            acc.entries.push(Entry {
                bytes: bytes.clone(),
                is_identifier: base.identifiers[id],
                uses: 0,
                first_seen: id as u32,
                seeded: true,
            });
        }
        acc
    }

    /// Register a UTF-8 string
    pub fn add_string(&mut self, text: &str, is_identifier: bool) {
        self.add_bytes(text.as_bytes(), is_identifier);
    }

    /// Register a raw byte string. Once a string has been used as an
    /// identifier it stays one.
    pub fn add_bytes(&mut self, bytes: &[u8], is_identifier: bool) {
        if let Some(&index) = self.lookup.get(bytes) {
            let entry = &mut self.entries[index];
            entry.uses += 1;
            entry.is_identifier |= is_identifier;
            return;
        }
        let index = self.entries.len();
        self.lookup.insert(bytes.to_vec(), index);
        self.entries.push(Entry {
            bytes: bytes.to_vec(),
            is_identifier,
            uses: 1,
            first_seen: index as u32,
            seeded: false,
        });
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze into a table. Seeded strings come first in their original
    /// order. With `optimize`, new strings are sorted by descending use count
    /// so frequent strings get small IDs.
    pub fn to_table(self, optimize: bool) -> StringTable {
        let (seeded, mut fresh): (Vec<Entry>, Vec<Entry>) =
            self.entries.into_iter().partition(|e| e.seeded);
        if optimize {
            fresh.sort_by(|a, b| b.uses.cmp(&a.uses).then(a.first_seen.cmp(&b.first_seen)));
        }

        let mut table = StringTable::default();
        for entry in seeded.into_iter().chain(fresh) {
            let id = table.strings.len() as u32;
            table.lookup.insert(entry.bytes.clone(), id);
            table.strings.push(entry.bytes);
            table.identifiers.push(entry.is_identifier);
        }
        table
    }
}

/// A frozen, ID-addressed string table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    strings: Vec<Vec<u8>>,
    identifiers: Vec<bool>,
    lookup: FxHashMap<Vec<u8>, u32>,
}

impl StringTable {
    /// ID of a byte string
    pub fn id_of_bytes(&self, bytes: &[u8]) -> Option<u32> {
        self.lookup.get(bytes).copied()
    }

    /// ID of a string, whatever its kind
    pub fn id_of(&self, text: &str) -> Option<u32> {
        self.id_of_bytes(text.as_bytes())
    }

    /// ID of a string registered as an identifier
    pub fn identifier_id(&self, text: &str) -> Option<u32> {
        self.id_of(text).filter(|&id| self.identifiers[id as usize])
    }

    /// Bytes of entry `id`
    pub fn get(&self, id: u32) -> Option<&[u8]> {
        self.strings.get(id as usize).map(Vec::as_slice)
    }

    /// Kind of entry `id`
    pub fn kind(&self, id: u32) -> Option<StringKind> {
        self.identifiers.get(id as usize).map(|&ident| {
            if ident {
                StringKind::Identifier
            } else {
                StringKind::String
            }
        })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Entry kinds, run-length encoded in ID order
    pub fn string_kinds(&self) -> Vec<StringKindRun> {
        let mut runs: Vec<StringKindRun> = Vec::new();
        for &ident in &self.identifiers {
            let kind = if ident { StringKind::Identifier } else { StringKind::String };
            match runs.last_mut() {
                Some(run) if run.kind == kind => run.count += 1,
                _ => runs.push(StringKindRun { kind, count: 1 }),
            }
        }
        runs
    }
}

/// Re-encode source text for the string table.
///
/// Code points above the BMP are split into a UTF-16 surrogate pair and
/// each half is UTF-8 encoded on its own (six bytes in total). Everything
/// else is plain UTF-8, so ASCII text is unchanged.
pub fn encode_source_text(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }
    let mut out = Vec::with_capacity(text.len() + text.len() / 2);
    for ch in text.chars() {
        let cp = u32::from(ch);
        if cp >= 0x10000 {
            let offset = cp - 0x10000;
            encode_code_unit(0xD800 + ((offset >> 10) & 0x3FF), &mut out);
            encode_code_unit(0xDC00 + (offset & 0x3FF), &mut out);
        } else {
            encode_code_unit(cp, &mut out);
        }
    }
    out
}

/// UTF-8 encode a code point below 0x10000. Surrogates are accepted, which
/// is why `char::encode_utf8` cannot be used.
fn encode_code_unit(cp: u32, out: &mut Vec<u8>) {
    debug_assert!(cp < 0x10000);
    if cp < 0x80 {
        out.push(cp as u8);
    } else if cp < 0x800 {
        out.push(0xC0 | (cp >> 6) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else {
        out.push(0xE0 | (cp >> 12) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    }
}

/// Caches [`encode_source_text`] per distinct source string
#[derive(Debug, Default)]
pub struct SourceTextEncoder {
    cache: FxHashMap<String, Vec<u8>>,
}

impl SourceTextEncoder {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded form of `text`
    pub fn encode(&mut self, text: &str) -> &[u8] {
        self.cache
            .entry(text.to_string())
            .or_insert_with(|| encode_source_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identifier_flag_is_sticky() {
        let mut acc = StringAccumulator::new();
        acc.add_string("x", false);
        acc.add_string("x", true);
        acc.add_string("x", false);
        let table = acc.to_table(false);
        assert_eq!(table.len(), 1);
        assert_eq!(table.identifier_id("x"), Some(0));
        assert_eq!(table.kind(0), Some(StringKind::Identifier));
    }

    #[test]
    fn test_plain_string_has_no_identifier_id() {
        let mut acc = StringAccumulator::new();
        acc.add_string("hello", false);
        let table = acc.to_table(false);
        assert_eq!(table.id_of("hello"), Some(0));
        assert_eq!(table.identifier_id("hello"), None);
    }

    #[test]
    fn test_optimize_orders_by_use_count() {
        let mut acc = StringAccumulator::new();
        acc.add_string("rare", false);
        acc.add_string("tie", false);
        for _ in 0..3 {
            acc.add_string("hot", true);
        }
        acc.add_string("tie", false);
        acc.add_string("also", false);
        acc.add_string("also", false);

        let table = acc.clone().to_table(true);
        assert_eq!(table.id_of("hot"), Some(0));
        assert_eq!(table.id_of("tie"), Some(1));
        assert_eq!(table.id_of("also"), Some(2));
        assert_eq!(table.id_of("rare"), Some(3));

        let unoptimized = acc.to_table(false);
        assert_eq!(unoptimized.id_of("rare"), Some(0));
        assert_eq!(unoptimized.id_of("hot"), Some(2));
    }

    #[test]
    fn test_seeded_ids_are_stable() {
        let mut acc = StringAccumulator::new();
        acc.add_string("a", false);
        acc.add_string("b", true);
        let base = acc.to_table(false);

        let mut delta = StringAccumulator::with_base(&base);
        for _ in 0..5 {
            delta.add_string("new", false);
        }
        delta.add_string("a", true);
        let table = delta.to_table(true);

        assert_eq!(table.id_of("a"), Some(0));
        assert_eq!(table.identifier_id("a"), Some(0));
        assert_eq!(table.identifier_id("b"), Some(1));
        assert_eq!(table.id_of("new"), Some(2));
    }

    #[test]
    fn test_string_kind_runs() {
        let mut acc = StringAccumulator::new();
        acc.add_string("a", true);
        acc.add_string("b", true);
        acc.add_string("c", false);
        acc.add_string("d", true);
        let runs = acc.to_table(false).string_kinds();
        assert_eq!(
            runs,
            vec![
                StringKindRun { kind: StringKind::Identifier, count: 2 },
                StringKindRun { kind: StringKind::String, count: 1 },
                StringKindRun { kind: StringKind::Identifier, count: 1 },
            ]
        );
    }

    #[test]
    fn test_astral_code_point_becomes_surrogate_pair() {
        // U+1F600 -> D83D DE00
        assert_eq!(
            encode_source_text("\u{1F600}"),
            vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
        assert_eq!(encode_source_text("a\u{e9}"), "a\u{e9}".as_bytes());
        assert_eq!(encode_source_text("plain"), b"plain");
    }

    #[test]
    fn test_encoder_caches() {
        let mut encoder = SourceTextEncoder::new();
        let first = encoder.encode("f(\u{10000})").to_vec();
        assert_eq!(encoder.encode("f(\u{10000})"), first.as_slice());
        assert_eq!(encoder.cache.len(), 1);
    }

    fn decode_surrogate_utf8(bytes: &[u8]) -> Vec<u32> {
        let mut units = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            let (len, init) = match b {
                0x00..=0x7F => (1, u32::from(b)),
                0xC0..=0xDF => (2, u32::from(b & 0x1F)),
                _ => (3, u32::from(b & 0x0F)),
            };
            let unit = bytes[i + 1..i + len]
                .iter()
                .fold(init, |acc, &c| (acc << 6) | u32::from(c & 0x3F));
            units.push(unit);
            i += len;
        }
        units
    }

    proptest! {
        #[test]
        fn prop_matches_utf16_code_units(text in "\\PC*") {
            let encoded = encode_source_text(&text);
            let units: Vec<u32> = text.encode_utf16().map(u32::from).collect();
            prop_assert_eq!(decode_surrogate_utf8(&encoded), units);
        }

        #[test]
        fn prop_bmp_text_is_plain_utf8(text in "[\\x{0}-\\x{D7FF}\\x{E000}-\\x{FFFF}]*") {
            prop_assert_eq!(encode_source_text(&text), text.as_bytes().to_vec());
        }
    }
}
