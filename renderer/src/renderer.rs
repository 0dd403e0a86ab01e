use std::io::Write;
use std::path::Path;

use log::debug;

use protex::block::identity::Identity;
use protex::block::{Block, Entry, Field, Item, Verbatim};
use protex::config::Config;
use protex::region::Region;

use crate::error::RenderError;
use crate::latex::{self, escape};

/// Keyword labels containing any of these are set in italics.
const PARAMETER_LIKE: &[&str] = &["USES", "INPUT", "OUTPUT", "PARAMETERS", "VALUE", "ARGUMENTS"];

const TITLE_KEYWORDS: &[&str] = &["TITLE", "AUTHORS", "AFFILIATION", "DATE"];

const CODE_OPTIONS: &str = "breaklines,breakafter=-+*/&";
const TEXT_OPTIONS: &str = "breaklines";

/// Where the items being rendered came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Base name of the file; `None` for standard input.
    pub name: Option<String>,
    /// Generation timestamp shown in the page header.
    pub date: String,
}

impl SourceFile {
    pub fn stdin(date: impl Into<String>) -> Self {
        SourceFile {
            name: None,
            date: date.into(),
        }
    }

    pub fn from_path(path: &Path, date: impl Into<String>) -> Self {
        SourceFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            date: date.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TitlePage {
    title: Option<String>,
    authors: Option<String>,
    affiliation: Option<String>,
    date: Option<String>,
}

impl TitlePage {
    fn absorb(&mut self, block: &Block) {
        for keyword in TITLE_KEYWORDS {
            let Some(text) = block.get(keyword) else {
                continue;
            };
            let value = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let slot = match *keyword {
                "TITLE" => &mut self.title,
                "AUTHORS" => &mut self.authors,
                "AFFILIATION" => &mut self.affiliation,
                _ => &mut self.date,
            };
            *slot = Some(value);
        }
    }

    fn is_set(&self) -> bool {
        self.title.is_some()
            || self.authors.is_some()
            || self.affiliation.is_some()
            || self.date.is_some()
    }
}

/// State that spans every file of a run.
#[derive(Debug, Clone, Default)]
struct DocumentState {
    /// `\begin{document}` has been written.
    begun: bool,
    prologues: usize,
    title: TitlePage,
}

/// Document state saved by [`Renderer::checkpoint`].
#[derive(Debug, Clone)]
pub struct Checkpoint(DocumentState);

/// Turns assembled items into LaTeX.
///
/// Document-level state (whether `\begin{document}` was written, how many
/// prologues were rendered) spans every file of a run; file-level state is
/// reset by [`Renderer::begin_file`].
pub struct Renderer<'c> {
    config: &'c Config,
    document: DocumentState,
    file: Option<SourceFile>,
    /// Last `MODULE` name seen in the current file, used to label
    /// standard input.
    module: Option<String>,
}

impl<'c> Renderer<'c> {
    pub fn new(config: &'c Config) -> Self {
        Renderer {
            config,
            document: DocumentState::default(),
            file: None,
            module: None,
        }
    }

    pub fn config(&self) -> &'c Config {
        self.config
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.document.clone())
    }

    /// Discard everything rendered since `checkpoint`, including any open file.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.document = checkpoint.0;
        self.file = None;
        self.module = None;
    }

    /// Notice, preamble (unless bare) and shorthand macros.
    pub fn start(&mut self, out: &mut dyn Write) -> Result<(), RenderError> {
        latex::write_notice(out)?;
        if !self.config.bare {
            latex::write_preamble(out, self.config.style.as_deref())?;
        }
        latex::write_macros(out)?;
        Ok(())
    }

    /// Page header annotation for a new source file.
    pub fn begin_file(&mut self, file: &SourceFile, out: &mut dyn Write) -> Result<(), RenderError> {
        self.file = Some(file.clone());
        self.module = None;
        if !self.config.no_file_info {
            writeln!(out)?;
            writeln!(
                out,
                "\\markboth{{Left}}{{Source File: {},  Date: {}}}",
                self.file_label(),
                escape(&file.date)
            )?;
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn end_file(&mut self, out: &mut dyn Write) -> Result<(), RenderError> {
        writeln!(out)?;
        self.file = None;
        Ok(())
    }

    /// Close the document (unless bare).
    pub fn finish(&mut self, out: &mut dyn Write) -> Result<(), RenderError> {
        if !self.config.bare {
            self.begin_document(out)?;
            writeln!(out, "\\end{{document}}")?;
        }
        Ok(())
    }

    pub fn render(&mut self, item: &Item, out: &mut dyn Write) -> Result<(), RenderError> {
        if self.config.listing && !item.region().is_none_or(Region::is_prologue_family) {
            debug!("listing mode: skipping item at line {}", item.line());
            return Ok(());
        }
        match item {
            Item::Literal(literal) => writeln!(out, "{}", literal.text)?,
            Item::Verbatim(verbatim) if verbatim.region == Region::CodeBlock => {
                self.code(verbatim, out)?
            }
            Item::Verbatim(verbatim) => self.resource(verbatim, out)?,
            Item::Block(block) => match block.region {
                Region::Introduction => self.introduction(block, out)?,
                Region::ExamplePrologue => self.example(block, out)?,
                _ => self.prologue(block, out)?,
            },
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Regions
    // -----------------------------------------------------------------------

    fn introduction(&mut self, block: &Block, out: &mut dyn Write) -> std::io::Result<()> {
        self.document.title.absorb(block);
        self.begin_document(out)?;

        for entry in &block.entries {
            match entry.field.keyword() {
                Some(name) if TITLE_KEYWORDS.contains(&name) => {}
                Some("INTRODUCTION") => {
                    // First line is the section title, the rest its body.
                    let lines = trimmed_lines(entry);
                    let heading = lines.first().copied().unwrap_or_default();
                    writeln!(out, " %..............................................")?;
                    writeln!(out, "\\section{{{}}}", escape(heading.trim()))?;
                    write_text(out, lines.iter().skip(1).copied())?;
                }
                _ => self.entry(entry, out)?,
            }
        }

        writeln!(out)?;
        writeln!(out, " %/////////////////////////////////////////////////////////////")?;
        writeln!(out, "\\newpage")
    }

    fn prologue(&mut self, block: &Block, out: &mut dyn Write) -> std::io::Result<()> {
        if block.region == Region::InternalPrologue && self.config.internal {
            debug!("internal mode: skipping prologue at line {}", block.line);
            return Ok(());
        }
        self.begin_document(out)?;

        if self.document.prologues == 0 {
            if !self.config.bare {
                writeln!(out, "\\section{{Routine/Function Prologues}} \\label{{app:ProLogues}}")?;
            }
        } else {
            writeln!(out)?;
            writeln!(out, "\\mbox{{}}\\hrulefill\\")?;
        }
        self.document.prologues += 1;

        // Only ahead of a heading; a nameless block prints none.
        if self.config.new_page && block.identity_value().is_some() {
            writeln!(out, "\\newpage")?;
        }
        self.heading(block, out)?;
        self.entries(block, out)
    }

    fn example(&mut self, block: &Block, out: &mut dyn Write) -> std::io::Result<()> {
        self.begin_document(out)?;
        writeln!(out)?;
        writeln!(out, " %/////////////////////////////////////////////////////////////")?;
        match block.identity_value() {
            Some((_, name)) => writeln!(out, "\\subsubsection*{{Example: {}}}", escape(&name))?,
            None => writeln!(out, "\\subsubsection*{{Example}}")?,
        }
        self.entries(block, out)
    }

    fn code(&mut self, verbatim: &Verbatim, out: &mut dyn Write) -> std::io::Result<()> {
        if self.config.shut_up {
            return Ok(());
        }
        self.begin_document(out)?;
        writeln!(out)?;
        writeln!(out, " %------------------ START CODE ------------------%")?;
        latex::write_minted(
            out,
            CODE_OPTIONS,
            self.config.language.lexer(),
            verbatim.lines.iter().map(String::as_str),
        )?;
        writeln!(out)?;
        writeln!(out, " %------------------ END CODE ------------------%")
    }

    fn resource(&mut self, verbatim: &Verbatim, out: &mut dyn Write) -> std::io::Result<()> {
        self.begin_document(out)?;
        writeln!(out, "\\begin{{center}}")?;
        writeln!(out, "{{\\bf RESOURCES:}}\\\\")?;
        writeln!(out, "\\begin{{tabular}}{{|l|l|l|l|}}")?;
        writeln!(out, "\\hline")?;
        writeln!(
            out,
            "\\textbf{{Name}} & \\textbf{{Description}} & \\textbf{{Units}} & \\textbf{{Default}} \\\\"
        )?;
        writeln!(out, "\\hline")?;

        let mut loose = Vec::new();
        for line in &verbatim.lines {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 4 {
                if !line.trim().is_empty() {
                    loose.push(line.as_str());
                }
                continue;
            }
            writeln!(
                out,
                "\\makebox[1.0in][l]{{{}}} & \\makebox[3.5in][l]{{{}}} & \\makebox[1.0in][l]{{{}}} & \\makebox[1.0in][l]{{{}}} \\\\",
                escape(parts[0]),
                escape(parts[1]),
                escape(parts[2]),
                escape(parts[3])
            )?;
            writeln!(out, "\\hline")?;
        }

        writeln!(out, "\\end{{tabular}}")?;
        writeln!(out, "\\end{{center}}")?;
        write_text(out, loose)
    }

    // -----------------------------------------------------------------------
    // Pieces
    // -----------------------------------------------------------------------

    fn begin_document(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.document.begun || self.config.bare {
            return Ok(());
        }
        self.document.begun = true;

        let title = &self.document.title;
        let title_page = title.is_set();
        if title_page {
            let field = |v: &Option<String>| escape(v.as_deref().unwrap_or_default()).into_owned();
            writeln!(out, "\\title{{{}}}", field(&title.title))?;
            writeln!(
                out,
                "\\author{{{{\\sc {}}}\\\\ {{\\em {}}}}}",
                field(&title.authors),
                field(&title.affiliation)
            )?;
            writeln!(out, "\\date{{{}}}", field(&title.date))?;
        }
        writeln!(out, "\\begin{{document}}")?;
        if title_page {
            writeln!(out, "\\maketitle")?;
        }
        writeln!(out, "\\tableofcontents")?;
        writeln!(out, "\\newpage")
    }

    fn heading(&mut self, block: &Block, out: &mut dyn Write) -> std::io::Result<()> {
        let Some((identity, value)) = block.identity_value() else {
            return Ok(());
        };
        if identity == Identity::Module {
            self.module = Some(value.clone());
        }

        let name = escape(&value);
        let language = self.config.language.name();
        let source = self.source_suffix();
        match identity {
            Identity::Module => writeln!(
                out,
                "\\subsection{{{}: Module Interface {}{}}}",
                language, name, source
            ),
            Identity::Program => writeln!(
                out,
                "\\subsection{{{}: Main Program {}{}}}",
                language, name, source
            ),
            Identity::Routine | Identity::Function => {
                writeln!(out, "\\subsubsection{{{}{}}}", name, source)
            }
            _ => {
                let short = identity.short_label(&value).unwrap_or_default();
                writeln!(out, "\\subsubsection [{}]{{{}}}", escape(&short), name)
            }
        }
    }

    /// Keyword sections of a prologue-family block, identity excluded.
    fn entries(&mut self, block: &Block, out: &mut dyn Write) -> std::io::Result<()> {
        let identity = block.identity.map(Identity::keyword);
        for entry in &block.entries {
            if identity.is_some() && entry.field.keyword() == identity {
                // Lines after the name continue as plain text.
                let lines = trimmed_lines(entry);
                write_text(out, lines.iter().skip(1).copied())?;
                continue;
            }
            self.entry(entry, out)?;
        }
        Ok(())
    }

    fn entry(&mut self, entry: &Entry, out: &mut dyn Write) -> std::io::Result<()> {
        let lexer = self.config.language.lexer();
        match &entry.field {
            Field::Preamble => write_text(out, trimmed_lines(entry)),
            Field::Quote => writeln!(out, "{}", entry.text.trim_end_matches('\n')),
            Field::Keyword(name) if name == "DESCRIPTION" => {
                writeln!(out)?;
                writeln!(out, "{{\\sf DESCRIPTION:\\\\ }}")?;
                writeln!(out)?;
                if self.config.no_latex {
                    latex::write_minted(out, TEXT_OPTIONS, lexer, trimmed_lines(entry))
                } else {
                    write_text(out, trimmed_lines(entry))
                }
            }
            Field::Keyword(name) if self.config.vocabulary().is_optional(name) => {
                let style = if PARAMETER_LIKE.iter().any(|p| name.contains(p)) {
                    "em"
                } else {
                    "sf"
                };
                writeln!(out)?;
                writeln!(out, "\\bigskip")?;
                writeln!(out, "{{\\{} {}:}}", style, escape(name))?;
                latex::write_minted(out, TEXT_OPTIONS, lexer, trimmed_lines(entry))
            }
            Field::Keyword(name) => {
                writeln!(out)?;
                writeln!(out, "\\bigskip")?;
                writeln!(out, "{{\\sf {}:}}\\\\", escape(name))?;
                write_text(out, trimmed_lines(entry))
            }
        }
    }

    /// ` (Source File: NAME)` unless file info is off.
    fn source_suffix(&self) -> String {
        if self.config.no_file_info {
            String::new()
        } else {
            format!(" (Source File: {})", self.file_label())
        }
    }

    /// Escaped file name, falling back to the current module for
    /// standard input.
    fn file_label(&self) -> String {
        let name = self
            .file
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .or(self.module.as_deref())
            .unwrap_or("Standard Input");
        escape(name).into_owned()
    }
}

/// Entry lines without leading or trailing blank lines.
fn trimmed_lines(entry: &Entry) -> Vec<&str> {
    let lines: Vec<&str> = entry.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

/// Escaped text, one output line per input line.
fn write_text<'a>(out: &mut dyn Write, lines: impl IntoIterator<Item = &'a str>) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{}", escape(line))?;
    }
    Ok(())
}
