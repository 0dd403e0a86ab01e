pub mod identity;

use std::ops::Range;

use crate::block::identity::Identity;
use crate::region::Region;

/// Key of a keyword field within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Text before the first keyword marker of the region.
    Preamble,
    Keyword(String),
    /// A `!QUOTE:` line inside the region, emitted raw.
    Quote,
}

impl Field {
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Field::Preamble | Field::Quote => None,
            Field::Keyword(name) => Some(name),
        }
    }
}

/// One keyword field and the lines accumulated under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub field: Field,
    /// Newline-terminated lines, comment token stripped, interior whitespace intact.
    pub text: String,
}

impl Entry {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

/// A finalized keyword-bearing region (introduction or prologue family).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub region: Region,
    /// Fields in the order their keywords first appeared.
    pub entries: Vec<Entry>,
    /// The identity keyword that names this block, if any.
    pub identity: Option<Identity>,
    /// 1-based line of the opening marker.
    pub line: usize,
    /// Byte span from the opening marker to the closing marker.
    pub span: Range<usize>,
}

impl Block {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field.keyword() == Some(name))
            .map(|e| e.text.as_str())
    }

    pub fn preamble(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field == Field::Preamble)
            .map(|e| e.text.as_str())
    }

    /// Identity keyword and its value, whitespace-normalized from the first
    /// non-blank line.
    pub fn identity_value(&self) -> Option<(Identity, String)> {
        let identity = self.identity?;
        let text = self.get(identity.keyword())?;
        let value = text
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Some((identity, value))
    }

    /// Names of the keyword fields, in source order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.field.keyword())
    }
}

/// Lines of a code or resource region, kept line by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbatim {
    pub region: Region,
    pub lines: Vec<String>,
    pub line: usize,
    pub span: Range<usize>,
}

/// Text passed through as-is from a `QUOTE` line outside any region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub text: String,
    pub line: usize,
}

/// Unit handed from the assembler to the renderer, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Block(Block),
    Verbatim(Verbatim),
    Literal(Literal),
}

impl Item {
    pub fn region(&self) -> Option<Region> {
        match self {
            Item::Block(block) => Some(block.region),
            Item::Verbatim(verbatim) => Some(verbatim.region),
            Item::Literal(_) => None,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Item::Block(block) => block.line,
            Item::Verbatim(verbatim) => verbatim.line,
            Item::Literal(literal) => literal.line,
        }
    }
}
