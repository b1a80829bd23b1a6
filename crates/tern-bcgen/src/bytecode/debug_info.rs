//! Debug tables
//!
//! All functions of a module share two byte tables. The source-location
//! table holds, per function, a header followed by delta-encoded location
//! records; the lexical-data table holds each function's enclosing function
//! and variable names. Functions store their offsets into both tables.

use super::function::DebugSourceLocation;
use crate::ir::SourceLoc;
use rustc_hash::FxHashMap;

/// Serialized debug tables of a module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    /// Source file names, indexed by debug file ID
    pub filenames: Vec<String>,
    /// Source-location table
    pub source_locations: Vec<u8>,
    /// Lexical-data table
    pub lexical_data: Vec<u8>,
}

/// Builds the debug tables one function at a time
#[derive(Debug, Default)]
pub struct DebugInfoGenerator {
    filenames: Vec<String>,
    filename_ids: FxHashMap<String, u32>,
    source_locations: Vec<u8>,
    lexical_data: Vec<u8>,
}

impl DebugInfoGenerator {
    /// Create an empty generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug file ID of `name`, registering it if needed
    pub fn add_filename(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.filename_ids.get(name) {
            return id;
        }
        let id = self.filenames.len() as u32;
        self.filenames.push(name.to_string());
        self.filename_ids.insert(name.to_string(), id);
        id
    }

    /// Append the location records of a function, returning their offset.
    ///
    /// Layout: function index (ULEB128), start line and column (SLEB128),
    /// then per record the deltas of address, line, column, statement and
    /// file ID against the previous record (SLEB128), ending with an address
    /// delta of -1.
    pub fn append_source_locations(
        &mut self,
        start: Option<SourceLoc>,
        function_index: u32,
        locations: &[DebugSourceLocation],
    ) -> u32 {
        let offset = self.source_locations.len() as u32;
        let out = &mut self.source_locations;
        let (line, column) = start.map_or((0, 0), |loc| (loc.line, loc.column));
        append_uleb128(out, u64::from(function_index));
        append_sleb128(out, i64::from(line));
        append_sleb128(out, i64::from(column));

        let mut prev = DebugSourceLocation { line, column, ..Default::default() };
        for loc in locations {
            append_sleb128(out, delta(loc.address, prev.address));
            append_sleb128(out, delta(loc.line, prev.line));
            append_sleb128(out, delta(loc.column, prev.column));
            append_sleb128(out, delta(loc.statement, prev.statement));
            append_sleb128(out, delta(loc.filename_id, prev.filename_id));
            prev = *loc;
        }
        append_sleb128(out, -1);
        offset
    }

    /// Append the lexical data of a function, returning its offset.
    ///
    /// Layout: parent function ID (SLEB128, -1 for none), name count
    /// (ULEB128), then each name as a ULEB128 length and its UTF-8 bytes.
    pub fn append_lexical_data(&mut self, parent: Option<u32>, names: &[String]) -> u32 {
        let offset = self.lexical_data.len() as u32;
        let out = &mut self.lexical_data;
        append_sleb128(out, parent.map_or(-1, i64::from));
        append_uleb128(out, names.len() as u64);
        for name in names {
            append_uleb128(out, name.len() as u64);
            out.extend_from_slice(name.as_bytes());
        }
        offset
    }

    /// Finish and hand out the tables
    pub fn serialize(self) -> DebugInfo {
        DebugInfo {
            filenames: self.filenames,
            source_locations: self.source_locations,
            lexical_data: self.lexical_data,
        }
    }
}

/// File and source-map IDs of one source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAndSourceMapId {
    /// Debug file ID
    pub filename_id: u32,
    /// Source map URL ID
    pub source_map_url_id: u32,
}

/// Maps source buffers to debug file IDs across every function of a module
#[derive(Debug, Default)]
pub struct FileAndSourceMapIdCache {
    ids: FxHashMap<u32, FileAndSourceMapId>,
}

impl FileAndSourceMapIdCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached IDs of `buffer`, computed with `compute` on a miss
    pub fn get_or_insert_with(
        &mut self,
        buffer: u32,
        compute: impl FnOnce() -> FileAndSourceMapId,
    ) -> FileAndSourceMapId {
        *self.ids.entry(buffer).or_insert_with(compute)
    }

    /// Number of cached buffers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn delta(cur: u32, prev: u32) -> i64 {
    i64::from(cur) - i64::from(prev)
}

/// Append `value` as unsigned LEB128
pub fn append_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Append `value` as signed LEB128
pub fn append_sleb128(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Read an unsigned LEB128 value at `*pos`, advancing it
pub fn read_uleb128(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

/// Read a signed LEB128 value at `*pos`, advancing it
pub fn read_sleb128(bytes: &[u8], pos: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        result |= i64::from(byte & 0x7F) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                result |= -1 << shift;
            }
            return Some(result);
        }
        if shift >= 64 {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128_known_values() {
        let mut out = Vec::new();
        append_uleb128(&mut out, 624_485);
        assert_eq!(out, vec![0xE5, 0x8E, 0x26]);

        out.clear();
        append_sleb128(&mut out, -123_456);
        assert_eq!(out, vec![0xC0, 0xBB, 0x78]);

        out.clear();
        append_sleb128(&mut out, -1);
        append_sleb128(&mut out, 63);
        append_sleb128(&mut out, 64);
        assert_eq!(out, vec![0x7F, 0x3F, 0xC0, 0x00]);
    }

    #[test]
    fn test_leb128_decode() {
        let mut out = Vec::new();
        for v in [0i64, 1, -1, 64, -65, i64::from(i32::MAX), i64::from(i32::MIN)] {
            append_sleb128(&mut out, v);
        }
        append_uleb128(&mut out, u64::MAX);

        let mut pos = 0;
        for v in [0i64, 1, -1, 64, -65, i64::from(i32::MAX), i64::from(i32::MIN)] {
            assert_eq!(read_sleb128(&out, &mut pos), Some(v));
        }
        assert_eq!(read_uleb128(&out, &mut pos), Some(u64::MAX));
        assert_eq!(pos, out.len());
        assert_eq!(read_uleb128(&out, &mut pos), None);
    }

    #[test]
    fn test_source_locations_are_delta_encoded() {
        let mut debug = DebugInfoGenerator::new();
        let file = debug.add_filename("a.js");
        let locs = [
            DebugSourceLocation { address: 0, filename_id: file, line: 3, column: 5, ..Default::default() },
            DebugSourceLocation { address: 4, filename_id: file, line: 2, column: 9, statement: 1, ..Default::default() },
        ];
        let first = debug.append_source_locations(Some(SourceLoc::new(0, 3, 1)), 7, &locs);
        let second = debug.append_source_locations(None, 8, &[]);
        let info = debug.serialize();

        assert_eq!(first, 0);
        let mut pos = 0;
        let table = &info.source_locations;
        assert_eq!(read_uleb128(table, &mut pos), Some(7));
        assert_eq!(read_sleb128(table, &mut pos), Some(3));
        assert_eq!(read_sleb128(table, &mut pos), Some(1));
        let deltas: Vec<i64> = (0..10).filter_map(|_| read_sleb128(table, &mut pos)).collect();
        assert_eq!(deltas, vec![0, 0, 4, 0, 0, 4, -1, 4, 1, 0]);
        assert_eq!(read_sleb128(table, &mut pos), Some(-1));
        assert_eq!(second as usize, pos);
        assert_eq!(info.filenames, vec!["a.js".to_string()]);
    }

    #[test]
    fn test_lexical_data_layout() {
        let mut debug = DebugInfoGenerator::new();
        let first = debug.append_lexical_data(None, &[]);
        let second = debug.append_lexical_data(Some(2), &["x".to_string(), "yy".to_string()]);
        let info = debug.serialize();
        assert_eq!(first, 0);
        assert_eq!(second, 2);
        assert_eq!(info.lexical_data, vec![0x7F, 0x00, 0x02, 0x02, 0x01, b'x', 0x02, b'y', b'y']);
    }

    #[test]
    fn test_filename_ids_are_shared() {
        let mut debug = DebugInfoGenerator::new();
        assert_eq!(debug.add_filename("a.js"), 0);
        assert_eq!(debug.add_filename("b.js"), 1);
        assert_eq!(debug.add_filename("a.js"), 0);

        let mut cache = FileAndSourceMapIdCache::new();
        let mut misses = 0;
        for _ in 0..3 {
            cache.get_or_insert_with(4, || {
                misses += 1;
                FileAndSourceMapId { filename_id: 1, source_map_url_id: 0 }
            });
        }
        assert_eq!(misses, 1);
        assert_eq!(cache.len(), 1);
    }
}
