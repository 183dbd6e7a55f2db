//! Line-oriented key-value block parsing for inventory-tool output.
//!
//! System inventory tools (`dmidecode`, `lshw`, `system_profiler`,
//! `nvidia-smi -q`) emit repeated blocks of `key: value` pairs describing one
//! entity each, separated by blank lines or headers. This module turns that
//! text into a sequence of field maps, one per detected entity, which the
//! per-domain normalizers then convert into typed records.
//!
//! Two line grammars are supported, selected by [`FieldSeparator`]:
//!
//! - `key: value` — a colon directly after the key (`dmidecode`, `lshw`)
//! - `key : value` — a padded colon (`nvidia-smi -q` style)
//!
//! A blank line or a line with no parseable key closes the current block; a
//! block is emitted only if it accumulated at least one field, so runs of
//! blank lines never produce empty blocks. Both Windows and Unix line endings
//! are tolerated, and keys and values are trimmed.
//!
//! # Example
//!
//! ```rust
//! use sysprobe::parser::{BlockParser, FieldSeparator};
//!
//! let blocks = BlockParser::new(FieldSeparator::ColonSpace)
//!     .parse("Size: 16 GB\nType: DDR4\n\nSize: 8 GB\nType: DDR4\n");
//! assert_eq!(blocks.len(), 2);
//! assert_eq!(blocks[0].get("Size"), Some("16 GB"));
//! assert_eq!(blocks[1].get("Size"), Some("8 GB"));
//! ```

use std::collections::HashMap;

/// The grammar used to split a line into key and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSeparator {
    /// `key: value` — colon immediately after the key.
    ColonSpace,
    /// `key : value` — colon padded with spaces on both sides.
    SpacedColon,
}

impl FieldSeparator {
    fn separator(self) -> &'static str {
        match self {
            FieldSeparator::ColonSpace => ": ",
            FieldSeparator::SpacedColon => " : ",
        }
    }

    /// The separator as it appears on a line whose value is empty
    /// (`"Key:"` / `"Key :"`).
    fn bare_separator(self) -> &'static str {
        match self {
            FieldSeparator::ColonSpace => ":",
            FieldSeparator::SpacedColon => " :",
        }
    }

    /// Splits a line into a trimmed `(key, value)` pair, or `None` if the
    /// line does not match the grammar.
    fn split(self, line: &str) -> Option<(&str, &str)> {
        if let Some((key, value)) = line.split_once(self.separator()) {
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            return Some((key, value.trim()));
        }
        // A key with no value at all, e.g. a `BANK 0:` heading line.
        let key = line.trim_end().strip_suffix(self.bare_separator())?.trim();
        if key.is_empty() { None } else { Some((key, "")) }
    }
}

/// One parsed entity: a map from field name to raw field value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    fields: HashMap<String, String>,
}

impl Block {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Numeric accessor; a missing or non-numeric field yields `None` and
    /// leaves the rest of the record usable.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_owned(), value.to_owned());
    }
}

/// Parses block-structured key-value text into [`Block`]s.
#[derive(Debug, Clone, Copy)]
pub struct BlockParser {
    separator: FieldSeparator,
    headings: bool,
}

impl BlockParser {
    pub fn new(separator: FieldSeparator) -> Self {
        Self {
            separator,
            headings: false,
        }
    }

    /// Treats a key with an empty value as a structural heading: it closes
    /// the current block and suppresses subsequent fields until the next
    /// block boundary. Used to skip non-physical placeholder sections in
    /// tools that nest device blocks under headings.
    pub fn with_headings(mut self) -> Self {
        self.headings = true;
        self
    }

    pub fn parse(&self, input: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut current = Block::default();
        let mut suppressing = false;

        for raw in input.lines() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                close(&mut blocks, &mut current);
                suppressing = false;
                continue;
            }
            match self.separator.split(line) {
                Some((_, "")) if self.headings => {
                    close(&mut blocks, &mut current);
                    suppressing = true;
                }
                Some((key, value)) => {
                    if !suppressing {
                        current.insert(key, value);
                    }
                }
                None => {
                    close(&mut blocks, &mut current);
                    suppressing = false;
                }
            }
        }
        close(&mut blocks, &mut current);
        blocks
    }
}

fn close(blocks: &mut Vec<Block>, current: &mut Block) {
    if !current.is_empty() {
        blocks.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colon_space() -> BlockParser {
        BlockParser::new(FieldSeparator::ColonSpace)
    }

    #[test]
    fn test_two_blocks_split_on_blank_line() {
        let blocks = colon_space().parse("A: 1\nB: 2\n\nA: 3\nB: 4\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].get("A"), Some("1"));
        assert_eq!(blocks[0].get("B"), Some("2"));
        assert_eq!(blocks[1].get("A"), Some("3"));
        assert_eq!(blocks[1].get("B"), Some("4"));
    }

    #[test]
    fn test_consecutive_blank_lines_are_idempotent() {
        let blocks = colon_space().parse("A: 1\n\n\n\nA: 2\n");
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_keyless_line_closes_block() {
        let input = "\
Handle 0x0040, DMI type 17, 27 bytes
Memory Device
	Size: 16 GB
	Type: DDR4
";
        let blocks = colon_space().parse(input);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get("Size"), Some("16 GB"));
        assert_eq!(blocks[0].get("Type"), Some("DDR4"));
    }

    #[test]
    fn test_windows_line_endings_and_whitespace() {
        let blocks = colon_space().parse("  A:  1  \r\n  B:\t2\t\r\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get("A"), Some("1"));
        assert_eq!(blocks[0].get("B"), Some("2"));
    }

    #[test]
    fn test_spaced_colon_grammar() {
        let input = "\
Product Name : GeForce GTX 1650
Fan Speed : 35 %
";
        let blocks = BlockParser::new(FieldSeparator::SpacedColon).parse(input);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get("Product Name"), Some("GeForce GTX 1650"));
        assert_eq!(blocks[0].get("Fan Speed"), Some("35 %"));
    }

    #[test]
    fn test_value_containing_separator_splits_on_first() {
        let blocks = colon_space().parse("bus info: pci@0000:01:00.0\n");
        assert_eq!(blocks[0].get("bus info"), Some("pci@0000:01:00.0"));
    }

    #[test]
    fn test_empty_value_kept_as_field_by_default() {
        let blocks = colon_space().parse("Part Number:\nSize: 16 GB\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get("Part Number"), Some(""));
    }

    #[test]
    fn test_heading_mode_suppresses_until_next_block() {
        let input = "\
Memory Slots:
ECC: Disabled
Upgradeable Memory: Yes

Size: 8 GB
Type: DDR4
";
        let blocks = colon_space().with_headings().parse(input);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get("Size"), Some("8 GB"));
        assert_eq!(blocks[0].get("ECC"), None);
    }

    #[test]
    fn test_heading_closes_accumulated_block() {
        let input = "\
Size: 8 GB
BANK 1:
Speed: 2400 MHz

Size: 4 GB
";
        let blocks = colon_space().with_headings().parse(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].get("Size"), Some("8 GB"));
        assert_eq!(blocks[0].get("Speed"), None);
        assert_eq!(blocks[1].get("Size"), Some("4 GB"));
    }

    #[test]
    fn test_typed_accessors_recover_per_field() {
        let blocks = colon_space().parse("Rank: 2\nSpeed: fast\n");
        assert_eq!(blocks[0].get_u64("Rank"), Some(2));
        assert_eq!(blocks[0].get_u64("Speed"), None);
        assert_eq!(blocks[0].get("Speed"), Some("fast"));
    }

    #[test]
    fn test_empty_input_yields_no_blocks() {
        assert!(colon_space().parse("").is_empty());
        assert!(colon_space().parse("\n\n").is_empty());
    }
}
