pub mod assemble;
pub mod classify;
pub mod error;

pub use assemble::Assembler;
pub use classify::{Line, classify};
pub use error::ParseError;

use std::ops::Range;

use crate::Parsed;
use crate::config::Config;

/// Parser entry point.
pub struct Parser<'c> {
    source: String,
    file_id: usize,
    config: &'c Config,
}

impl<'c> Parser<'c> {
    pub fn new(source: String, file_id: usize, config: &'c Config) -> Self {
        Parser {
            source,
            file_id,
            config,
        }
    }

    /// Assemble the whole source into items. Stops at the first structural
    /// error; vocabulary mismatches are returned as warnings.
    pub fn parse(&self) -> Result<Parsed, ParseError> {
        let mut assembler = Assembler::new(self.config, self.file_id);
        let mut items = Vec::new();
        for (line, span, text) in source_lines(&self.source) {
            items.extend(assembler.feed(text, line, span)?);
        }
        let warnings = assembler.finish()?;
        Ok(Parsed {
            items,
            warnings,
            source_id: self.file_id,
        })
    }
}

/// Lines of `source` with their 1-based number and byte span (terminator
/// included in the span, excluded from the text).
pub fn source_lines(source: &str) -> impl Iterator<Item = (usize, Range<usize>, &str)> {
    source
        .split_inclusive('\n')
        .scan(0usize, |offset, raw| {
            let start = *offset;
            *offset += raw.len();
            Some((start..*offset, raw))
        })
        .enumerate()
        .map(|(idx, (span, raw))| (idx + 1, span, raw.trim_end_matches(['\n', '\r'])))
}
