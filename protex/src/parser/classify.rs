//! Line classification: decides what a single source line means without
//! looking at any surrounding state.

use crate::config::Vocabulary;
use crate::region::{Boundary, Region};

/// Character that introduces keyword markers in every host language.
const MARKER: char = '!';

const QUOTE: &str = "QUOTE:";

/// What a single source line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Begin(Region),
    End(Region),
    /// A recognized `!NAME:` marker and the text following the colon.
    Keyword { name: &'a str, rest: &'a str },
    /// `!QUOTE:` pass-through text.
    Quote(&'a str),
    /// Anything else, with the comment token stripped.
    Content(&'a str),
}

/// Classify one line (without its terminator) for the given comment token.
pub fn classify<'a>(line: &'a str, comment: &str, vocabulary: &'a Vocabulary) -> Line<'a> {
    let line = line.trim_end_matches(['\n', '\r']);
    let trimmed = line.trim_start();
    let body = trimmed.strip_prefix(comment);

    if let Some(marker) = body.and_then(|b| section_marker(b, comment)) {
        return marker;
    }

    for candidate in marker_candidates(trimmed, body) {
        if let Some(text) = candidate.strip_prefix(QUOTE) {
            return Line::Quote(text.trim());
        }
        if let Some((name, rest)) = vocabulary.lookup(candidate) {
            return Line::Keyword {
                name,
                rest: rest.trim(),
            };
        }
    }

    Line::Content(body.unwrap_or(line))
}

/// Remove leading whitespace and one comment token, if present.
pub fn strip_comment<'a>(line: &'a str, comment: &str) -> &'a str {
    let line = line.trim_end_matches(['\n', '\r']);
    line.trim_start().strip_prefix(comment).unwrap_or(line)
}

/// A line shaped like `!NAME:` whose name is not in the vocabulary.
/// Returns the unrecognized name.
pub fn unknown_marker<'a>(line: &'a str, comment: &str, vocabulary: &Vocabulary) -> Option<&'a str> {
    let line = line.trim_end_matches(['\n', '\r']);
    let trimmed = line.trim_start();
    let body = trimmed.strip_prefix(comment);

    marker_candidates(trimmed, body).into_iter().find_map(|candidate| {
        let (name, _) = candidate.split_once(':')?;
        let shaped = name.starts_with(|c: char| c.is_ascii_uppercase())
            && name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || " /_-".contains(c));
        (shaped && !vocabulary.contains(name) && name != "QUOTE").then_some(name)
    })
}

/// `TOKEN` directly after the comment token, or `<comment> <comment>TOKEN`.
fn section_marker(body: &str, comment: &str) -> Option<Line<'static>> {
    let nested = body.trim_start().strip_prefix(comment);
    [Some(body), nested].into_iter().flatten().find_map(|s| {
        if s.starts_with(char::is_whitespace) {
            return None;
        }
        let token = s.split_whitespace().next()?;
        Region::from_token(token).map(|(region, boundary)| match boundary {
            Boundary::Begin => Line::Begin(region),
            Boundary::End => Line::End(region),
        })
    })
}

/// Places a `!` keyword marker may start: right after the indentation, or
/// after the comment token and optional whitespace.
fn marker_candidates<'a>(trimmed: &'a str, body: Option<&'a str>) -> Vec<&'a str> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(rest) = trimmed.strip_prefix(MARKER) {
        candidates.push(rest);
    }
    if let Some(rest) = body.and_then(|b| b.trim_start().strip_prefix(MARKER)) {
        if !candidates.contains(&rest) {
            candidates.push(rest);
        }
    }
    candidates
}
