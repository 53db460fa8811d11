//! Cross-reference table parser.
//!
//! Maps object numbers to byte offsets so the placeholder injector can read
//! the catalog and first page of a finished document. Only classic `xref`
//! tables are understood; a file whose `startxref` points at a
//! cross-reference stream is reported as [`Error::Unsupported`].

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::parse_object;
use std::collections::HashMap;

/// Longest `/Prev` chain followed before the file is considered corrupt.
const MAX_PREV_DEPTH: u32 = 100;

/// Cross-reference table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Byte offset of `N G obj`, or next free object for free entries
    pub offset: u64,
    /// Generation number
    pub generation: u16,
    /// `n` entries are in use, `f` entries are free
    pub in_use: bool,
}

impl XRefEntry {
    /// Create a new cross-reference entry.
    pub fn new(offset: u64, generation: u16, in_use: bool) -> Self {
        Self {
            offset,
            generation,
            in_use,
        }
    }
}

/// Merged cross-reference table plus the newest trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
    startxref: u64,
}

impl CrossRefTable {
    /// Entry for an object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Byte offset of an in-use object.
    pub fn offset_of(&self, object_number: u32) -> Result<usize> {
        match self.entries.get(&object_number) {
            Some(entry) if entry.in_use => Ok(entry.offset as usize),
            Some(entry) => Err(Error::ObjectNotFound(object_number, entry.generation)),
            None => Err(Error::ObjectNotFound(object_number, 0)),
        }
    }

    /// In-use objects as `(object number, byte offset)`, in no particular order.
    pub fn in_use_objects(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.in_use)
            .map(|(number, entry)| (*number, entry.offset as usize))
    }

    /// Trailer of the newest section (older sections only fill gaps).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Offset the file's last `startxref` points at.
    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    /// Number of entries across all sections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no section had any entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `/Size` from the trailer, falling back to one past the highest entry.
    pub fn size(&self) -> u32 {
        self.trailer
            .get("Size")
            .and_then(Object::as_integer)
            .map(|s| s as u32)
            .unwrap_or_else(|| self.entries.keys().max().map_or(0, |max| max + 1))
    }

    /// Fill in entries from an older section; entries already present win.
    fn merge_older(&mut self, older: CrossRefTable) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in older.trailer {
            if key != "Prev" {
                self.trailer.entry(key).or_insert(value);
            }
        }
    }
}

/// Offset following the last `startxref` keyword in the file.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let keyword = b"startxref";
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: String = tail[pos + keyword.len()..]
        .iter()
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .map(|&c| c as char)
        .collect();
    digits.parse().map_err(|_| Error::InvalidXref)
}

/// Read the whole cross-reference chain, newest section first.
pub fn parse_xref(data: &[u8]) -> Result<CrossRefTable> {
    let startxref = find_startxref(data)?;
    let mut table = parse_section_chain(data, startxref, 0)?;
    table.startxref = startxref;
    log::debug!("Cross-reference table: {} entries, startxref {}", table.len(), startxref);
    Ok(table)
}

fn parse_section_chain(data: &[u8], offset: u64, depth: u32) -> Result<CrossRefTable> {
    if depth > MAX_PREV_DEPTH {
        return Err(Error::InvalidPdf(format!(
            "xref /Prev chain deeper than {}",
            MAX_PREV_DEPTH
        )));
    }

    let mut table = parse_section(data, offset as usize)?;
    if let Some(prev) = table.trailer.get("Prev").and_then(Object::as_integer) {
        if prev as u64 == offset {
            return Err(Error::InvalidPdf("xref /Prev points at itself".to_string()));
        }
        log::debug!("Following /Prev from {} to {}", offset, prev);
        let older = parse_section_chain(data, prev as u64, depth + 1)?;
        table.merge_older(older);
    }
    Ok(table)
}

/// One classic section: `xref`, subsections, `trailer << ... >>`.
fn parse_section(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let section = data.get(offset..).ok_or(Error::InvalidXref)?;
    let leading_ws = section.iter().take_while(|c| c.is_ascii_whitespace()).count();
    let section = &section[leading_ws..];

    if !section.starts_with(b"xref") {
        if section.first().is_some_and(u8::is_ascii_digit) {
            return Err(Error::Unsupported(
                "cross-reference streams cannot be updated incrementally".to_string(),
            ));
        }
        return Err(Error::InvalidXref);
    }

    let keyword = b"trailer";
    let trailer_pos = section
        .windows(keyword.len())
        .position(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let table_text = String::from_utf8_lossy(&section[4..trailer_pos]);
    let entries = parse_entries(&table_text)?;

    let (_, trailer) = parse_object(&section[trailer_pos + keyword.len()..]).map_err(|_| {
        Error::ParseError {
            offset: offset + leading_ws + trailer_pos,
            reason: "unreadable trailer dictionary".to_string(),
        }
    })?;

    Ok(CrossRefTable {
        entries,
        trailer: trailer.into_dict()?,
        startxref: offset as u64,
    })
}

/// Subsection headers `start count` followed by `count` 20-byte entries.
fn parse_entries(text: &str) -> Result<HashMap<u32, XRefEntry>> {
    let mut entries = HashMap::new();
    let mut lines = text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('%'));

    while let Some(header) = lines.next() {
        let mut parts = header.split_whitespace();
        let (Some(start), Some(count), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidXref);
        };
        let start: u32 = start.parse().map_err(|_| Error::InvalidXref)?;
        let count: u32 = count.parse().map_err(|_| Error::InvalidXref)?;
        if count > 1_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }

        for i in 0..count {
            let line = lines.next().ok_or(Error::InvalidXref)?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [offset, generation, kind, ..] = fields[..] else {
                log::warn!("Malformed xref entry for object {}: {:?}", start + i, line);
                continue;
            };
            let (Ok(offset), Ok(generation)) = (offset.parse::<u64>(), generation.parse::<u16>()) else {
                log::warn!("Malformed xref entry for object {}: {:?}", start + i, line);
                continue;
            };
            entries.insert(start + i, XRefEntry::new(offset, generation, kind.starts_with('n')));
        }
    }

    Ok(entries)
}
