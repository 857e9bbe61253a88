//! Scanner for the leading `[assembly: ...]` block of a decompiled C# file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::DecompilerError;

use super::model::AttributeEntry;

pub const ATTRIBUTE_PREFIX: &str = "[assembly: ";

/// Attributes in the order the decompiler emitted them. Keys may repeat,
/// e.g. one `InternalsVisibleTo` per friend assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBlock {
    entries: Vec<AttributeEntry>,
}

impl AttributeBlock {
    pub fn entries(&self) -> &[AttributeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    /// Collapses repeated keys, keeping the value seen last.
    pub fn last_values(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    fn push(&mut self, entry: AttributeEntry) {
        self.entries.push(entry);
    }
}

/// Parses one line. Returns `None` for anything that is not an assembly attribute.
pub fn parse_attribute_line(line: &str) -> Option<AttributeEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let rest = line.strip_prefix(ATTRIBUTE_PREFIX)?;

    if !line.contains('(') || !line.contains(')') {
        // attribute without arguments
        let key = rest.split(']').next().unwrap_or(rest);
        return Some(AttributeEntry::new(key, ""));
    }

    let (key, args) = rest.split_once('(')?;
    let value = match args.rfind(')') {
        Some(end) => &args[..end],
        None => args,
    };
    Some(AttributeEntry::new(key, value))
}

/// Collects attributes until the first non-attribute line after the block started.
pub fn scan_attributes<R: BufRead>(mut reader: R) -> Result<AttributeBlock, DecompilerError> {
    let mut block = AttributeBlock::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        match parse_attribute_line(&line) {
            Some(entry) => block.push(entry),
            None if !block.is_empty() => break,
            None => {}
        }
    }
    Ok(block)
}

pub fn extract_assembly_attributes(path: &Path) -> Result<AttributeBlock, DecompilerError> {
    let file = File::open(path)?;
    scan_attributes(BufReader::new(file))
}
