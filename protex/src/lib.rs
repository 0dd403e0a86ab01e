pub mod block;
pub mod config;
pub mod parser;
pub mod region;

pub use block::{Block, Item};
pub use config::{Config, ConfigError, Language};
pub use region::Region;

use crate::parser::ParseError;

/// A source file assembled into renderable items.
#[derive(Debug, Clone)]
pub struct Parsed {
    /// Finalized regions and pass-through literals, in source order.
    pub items: Vec<Item>,
    /// Non-fatal diagnostics (unrecognized keyword markers).
    pub warnings: Vec<ParseError>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
