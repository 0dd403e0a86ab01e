use std::ops::Range;

use log::{debug, trace, warn};

use crate::block::identity::Identity;
use crate::block::{Block, Entry, Field, Item, Literal, Verbatim};
use crate::config::Config;
use crate::parser::classify::{self, Line};
use crate::parser::error::ParseError;
use crate::region::Region;

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Line-at-a-time state machine turning classified lines into [`Item`]s.
///
/// Holds the single region being built; everything else is emitted as soon
/// as its closing marker is seen, so memory stays bounded by the largest
/// region rather than the file.
pub struct Assembler<'c> {
    config: &'c Config,
    file_id: usize,
    open: Option<OpenRegion>,
    warnings: Vec<ParseError>,
}

struct OpenRegion {
    region: Region,
    line: usize,
    span: Range<usize>,
    body: Body,
}

enum Body {
    Fields(FieldsBuilder),
    Verbatim(Vec<String>),
}

struct FieldsBuilder {
    entries: Vec<Entry>,
    active: Field,
    identity: Option<Identity>,
}

impl<'c> Assembler<'c> {
    pub fn new(config: &'c Config, file_id: usize) -> Self {
        Assembler {
            config,
            file_id,
            open: None,
            warnings: Vec::new(),
        }
    }

    /// Feed one line (terminator optional). `span` is its byte range in the
    /// source and `line` its 1-based number.
    pub fn feed(
        &mut self,
        text: &str,
        line: usize,
        span: Range<usize>,
    ) -> Result<Option<Item>, ParseError> {
        let config = self.config;
        let classified = classify::classify(text, config.comment(), config.vocabulary());
        trace!("line {}: {:?}", line, classified);

        let Some(mut open) = self.open.take() else {
            return self.outside(classified, line, span);
        };

        match classified {
            Line::Begin(region) => Err(ParseError::error(
                format!(
                    "`{}` opens a {} region inside an open {} region",
                    region.begin_token(),
                    region,
                    open.region
                ),
                span,
                self.file_id,
                line,
            )
            .with_related(
                open.span.clone(),
                format!("{} region opened here", open.region),
            )
            .with_note(format!(
                "close it with `{}` first; regions do not nest",
                open.region.end_token()
            ))),

            Line::End(region) if region == open.region => {
                let item = open.finish(span.end);
                debug!("closed {} region from line {}", region, item.line());
                Ok(Some(item))
            }

            Line::End(region) => Err(ParseError::error(
                format!(
                    "`{}` does not close the open {} region",
                    region.end_token(),
                    open.region
                ),
                span,
                self.file_id,
                line,
            )
            .with_related(
                open.span.clone(),
                format!("{} region opened here", open.region),
            )
            .with_note(format!("expected `{}`", open.region.end_token()))),

            Line::Keyword { name, rest } => {
                self.keyword(&mut open, name, rest, text);
                self.open = Some(open);
                Ok(None)
            }

            Line::Quote(quoted) => {
                if let Body::Fields(fields) = &mut open.body {
                    fields.quote(quoted);
                } else {
                    self.content(&mut open, text, line, span);
                }
                self.open = Some(open);
                Ok(None)
            }

            Line::Content(_) => {
                self.content(&mut open, text, line, span);
                self.open = Some(open);
                Ok(None)
            }
        }
    }

    /// Check that no region is left open and hand back collected warnings.
    pub fn finish(self) -> Result<Vec<ParseError>, ParseError> {
        match self.open {
            Some(open) => Err(ParseError::error(
                format!(
                    "end of input inside {} region; missing `{}`",
                    open.region,
                    open.region.end_token()
                ),
                open.span.clone(),
                self.file_id,
                open.line,
            )),
            None => Ok(self.warnings),
        }
    }

    fn outside(
        &mut self,
        classified: Line<'_>,
        line: usize,
        span: Range<usize>,
    ) -> Result<Option<Item>, ParseError> {
        match classified {
            Line::Begin(region) => {
                debug!("line {}: opening {} region", line, region);
                self.open = Some(OpenRegion::new(region, line, span, self.config.shut_up));
                Ok(None)
            }
            Line::End(region) => Err(ParseError::error(
                format!(
                    "`{}` without a matching `{}`",
                    region.end_token(),
                    region.begin_token()
                ),
                span,
                self.file_id,
                line,
            )),
            Line::Quote(text) => Ok(Some(Item::Literal(Literal {
                text: text.to_string(),
                line,
            }))),
            Line::Keyword { .. } | Line::Content(_) => Ok(None),
        }
    }

    fn keyword(&self, open: &mut OpenRegion, name: &str, rest: &str, raw: &str) {
        let comment = self.config.comment();
        let region = open.region;
        match &mut open.body {
            Body::Fields(fields) => {
                let identity = Identity::from_keyword(name).filter(|_| region.is_prologue_family());
                if identity.is_some() && fields.identity.is_some() {
                    debug!("second identity keyword `{}` kept as content", name);
                    fields.push(classify::strip_comment(raw, comment));
                    return;
                }
                if identity.is_some() {
                    fields.identity = identity;
                }
                fields.open(name, rest);
            }
            Body::Verbatim(lines) => push_verbatim(lines, region, raw, comment, self.config.shut_up),
        }
    }

    fn content(&mut self, open: &mut OpenRegion, raw: &str, line: usize, span: Range<usize>) {
        let comment = self.config.comment();
        let region = open.region;
        match &mut open.body {
            Body::Fields(fields) => {
                if let Some(name) = classify::unknown_marker(raw, comment, self.config.vocabulary()) {
                    warn!("line {}: unrecognized keyword `!{}:` kept as text", line, name);
                    self.warnings.push(
                        ParseError::warning(
                            format!("unrecognized keyword `!{}:` treated as text", name),
                            span,
                            self.file_id,
                            line,
                        )
                        .with_note("register it with --keys to make it a section"),
                    );
                }
                fields.push(classify::strip_comment(raw, comment));
            }
            Body::Verbatim(lines) => push_verbatim(lines, region, raw, comment, self.config.shut_up),
        }
    }
}

fn push_verbatim(lines: &mut Vec<String>, region: Region, raw: &str, comment: &str, shut_up: bool) {
    match region {
        Region::CodeBlock if shut_up => {}
        Region::CodeBlock => lines.push(raw.trim_end_matches(['\n', '\r']).to_string()),
        _ => lines.push(classify::strip_comment(raw, comment).to_string()),
    }
}

// ---------------------------------------------------------------------------
// Region builders
// ---------------------------------------------------------------------------

impl OpenRegion {
    fn new(region: Region, line: usize, span: Range<usize>, shut_up: bool) -> Self {
        let body = if region.has_keywords() {
            Body::Fields(FieldsBuilder {
                entries: Vec::new(),
                active: Field::Preamble,
                identity: None,
            })
        } else {
            if region == Region::CodeBlock && shut_up {
                debug!("line {}: discarding code region (shut-up mode)", line);
            }
            Body::Verbatim(Vec::new())
        };
        OpenRegion {
            region,
            line,
            span,
            body,
        }
    }

    fn finish(self, span_end: usize) -> Item {
        let span = self.span.start..span_end;
        match self.body {
            Body::Fields(fields) => Item::Block(Block {
                region: self.region,
                entries: fields.entries,
                identity: fields.identity,
                line: self.line,
                span,
            }),
            Body::Verbatim(lines) => Item::Verbatim(Verbatim {
                region: self.region,
                lines,
                line: self.line,
                span,
            }),
        }
    }
}

impl FieldsBuilder {
    /// Make `name` the active field, creating it if this is its first marker.
    fn open(&mut self, name: &str, rest: &str) {
        self.active = Field::Keyword(name.to_string());
        if !self.entries.iter().any(|e| e.field == self.active) {
            self.entries.push(Entry {
                field: self.active.clone(),
                text: String::new(),
            });
        }
        if !rest.is_empty() {
            self.push(rest);
        }
    }

    /// Record a quote as its own entry; the active field stays open.
    fn quote(&mut self, text: &str) {
        self.entries.push(Entry {
            field: Field::Quote,
            text: format!("{}\n", text),
        });
    }

    /// Append a line under the active field.
    fn push(&mut self, text: &str) {
        let entry = match self.entries.iter().position(|e| e.field == self.active) {
            Some(idx) => &mut self.entries[idx],
            // Blank lines before any text do not start a preamble.
            None if text.trim().is_empty() => return,
            None => {
                self.entries.push(Entry {
                    field: self.active.clone(),
                    text: String::new(),
                });
                let last = self.entries.len() - 1;
                &mut self.entries[last]
            }
        };
        entry.text.push_str(text);
        entry.text.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(source: &str, config: &Config) -> Result<(Vec<Item>, Vec<ParseError>), ParseError> {
        let mut assembler = Assembler::new(config, 0);
        let mut items = Vec::new();
        let mut offset = 0;
        for (idx, text) in source.split_inclusive('\n').enumerate() {
            let span = offset..offset + text.len();
            offset += text.len();
            items.extend(assembler.feed(text, idx + 1, span)?);
        }
        let warnings = assembler.finish()?;
        Ok((items, warnings))
    }

    fn blocks(source: &str) -> Vec<Block> {
        let (items, _) = assemble(source, &Config::default()).unwrap();
        items
            .into_iter()
            .filter_map(|i| match i {
                Item::Block(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn prologue_fields_in_order() {
        let src = "!BOP\n! !MODULE: m_time.f90\n! !DESCRIPTION: desc text\n!   more\n!EOP\n";
        let blocks = blocks(src);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.region, Region::Prologue);
        assert_eq!(block.identity, Some(Identity::Module));
        assert_eq!(block.keywords().collect::<Vec<_>>(), vec!["MODULE", "DESCRIPTION"]);
        assert_eq!(block.get("MODULE"), Some("m_time.f90\n"));
        assert_eq!(block.get("DESCRIPTION"), Some("desc text\n   more\n"));
        assert_eq!(block.span, 0..src.len());
    }

    #[test]
    fn text_before_first_keyword_is_preamble() {
        let blocks = blocks("!BOP\n!\n! loose words\n! !ROUTINE: r\n!EOP\n");
        assert_eq!(blocks[0].entries[0].field, Field::Preamble);
        assert_eq!(blocks[0].preamble(), Some(" loose words\n"));
    }

    #[test]
    fn first_identity_wins() {
        let blocks = blocks("!BOP\n! !ROUTINE: a\n! !IROUTINE: b c\n!EOP\n");
        let block = &blocks[0];
        assert_eq!(block.identity, Some(Identity::Routine));
        assert_eq!(block.get("ROUTINE"), Some("a\n !IROUTINE: b c\n"));
        assert_eq!(block.get("IROUTINE"), None);
    }

    #[test]
    fn repeated_keyword_appends_to_first_entry() {
        let blocks = blocks("!BOP\n! !BUGS: one\n! !SEE ALSO: x\n! !BUGS: two\n!EOP\n");
        assert_eq!(blocks[0].get("BUGS"), Some("one\ntwo\n"));
        assert_eq!(blocks[0].entries.len(), 2);
    }

    #[test]
    fn quote_inside_prologue_is_raw_entry() {
        let blocks = blocks(
            "!BOP\n! !ROUTINE: r\n! !DESCRIPTION: x\n!QUOTE: \\clearpage\n!   y\n!EOP\n",
        );
        let block = &blocks[0];
        assert_eq!(
            block.entries.iter().map(|e| e.field.clone()).collect::<Vec<_>>(),
            vec![
                Field::Keyword("ROUTINE".into()),
                Field::Keyword("DESCRIPTION".into()),
                Field::Quote,
            ]
        );
        assert_eq!(block.entries[2].text, "\\clearpage\n");
        assert_eq!(block.get("DESCRIPTION"), Some("x\n   y\n"));
        assert_eq!(block.keywords().collect::<Vec<_>>(), vec!["ROUTINE", "DESCRIPTION"]);
    }

    #[test]
    fn quote_inside_code_stays_verbatim() {
        let (items, _) = assemble("!BOC\n!QUOTE: \\clearpage\n!EOC\n", &Config::default()).unwrap();
        match &items[0] {
            Item::Verbatim(v) => assert_eq!(v.lines, vec!["!QUOTE: \\clearpage"]),
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn code_block_is_verbatim() {
        let src = "!BOC\n  do i = 1, n\n     x(i) = 0  ! zero\n  end do\n!EOC\n";
        let (items, _) = assemble(src, &Config::default()).unwrap();
        assert_eq!(
            items,
            vec![Item::Verbatim(Verbatim {
                region: Region::CodeBlock,
                lines: vec![
                    "  do i = 1, n".into(),
                    "     x(i) = 0  ! zero".into(),
                    "  end do".into()
                ],
                line: 1,
                span: 0..src.len(),
            })]
        );
    }

    #[test]
    fn shut_up_discards_code_but_tracks_region() {
        let config = Config::builder().shut_up(true).build().unwrap();
        let (items, _) = assemble("!BOC\nx = 1\n!EOC\n!BOP\n!EOP\n", &config).unwrap();
        assert_eq!(items.len(), 2);
        match &items[0] {
            Item::Verbatim(v) => assert!(v.lines.is_empty()),
            other => panic!("expected verbatim, got {:?}", other),
        }
    }

    #[test]
    fn outside_content_dropped_and_quotes_kept() {
        let (items, _) = assemble("program p\n!QUOTE: \\clearpage\nend\n", &Config::default()).unwrap();
        assert_eq!(
            items,
            vec![Item::Literal(Literal {
                text: "\\clearpage".into(),
                line: 2
            })]
        );
    }

    #[test]
    fn mismatched_end_is_fatal() {
        let err = assemble("!BOP\n! !ROUTINE: r\n!EOC\n", &Config::default()).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("`EOC` does not close"), "{}", err.message);
        assert_eq!(err.related[0].0, 0..5);
    }

    #[test]
    fn end_outside_region_is_fatal() {
        let err = assemble("x\n!EOP\n", &Config::default()).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("without a matching `BOP`"));
    }

    #[test]
    fn nested_begin_is_fatal() {
        let err = assemble("!BOP\n!BOC\n", &Config::default()).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn unterminated_region_is_fatal() {
        let err = assemble("\n!BOI\n! !TITLE: t\n", &Config::default()).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("missing `EOI`"));
    }

    #[test]
    fn unknown_keyword_warns_and_stays_content() {
        let (items, warnings) =
            assemble("!BOP\n! !ROUTINE: r\n! !NOTES: n\n!EOP\n", &Config::default()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 3);
        assert!(warnings[0].is_warning());
        match &items[0] {
            Item::Block(b) => assert_eq!(b.get("ROUTINE"), Some("r\n !NOTES: n\n")),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn custom_key_opens_field() {
        let config = Config::builder().custom_keys(["NOTES"]).build().unwrap();
        let (items, warnings) =
            assemble("!BOP\n! !ROUTINE: r\n! !NOTES: n\n!EOP\n", &config).unwrap();
        assert!(warnings.is_empty());
        match &items[0] {
            Item::Block(b) => assert_eq!(b.get("NOTES"), Some("n\n")),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn resource_rows_strip_comment() {
        let (items, _) =
            assemble("!BOR\n! dt, time step, s, 600\n!EOR\n", &Config::default()).unwrap();
        match &items[0] {
            Item::Verbatim(v) => {
                assert_eq!(v.region, Region::Resource);
                assert_eq!(v.lines, vec![" dt, time step, s, 600".to_string()]);
            }
            other => panic!("expected verbatim, got {:?}", other),
        }
    }
}
