pub mod error;
pub mod latex;
pub mod renderer;

pub use error::{Error, RenderError};
pub use renderer::{Checkpoint, Renderer, SourceFile};

use std::io::Write;

use protex::config::Config;
use protex::parser::{Assembler, ParseError, source_lines};

/// Assemble and render one source file, streaming each finalized item
/// straight to the renderer.
///
/// The file's output is committed to `out` only once the whole file has
/// assembled cleanly, so a structural error never leaves a half-rendered
/// file behind. On error the renderer is rolled back too, so later files
/// still open the document and the prologue section. Returns the non-fatal
/// warnings.
pub fn render_file(
    renderer: &mut Renderer<'_>,
    source: &str,
    file_id: usize,
    file: &SourceFile,
    out: &mut dyn Write,
) -> Result<Vec<ParseError>, Error> {
    let checkpoint = renderer.checkpoint();
    match assemble_file(renderer, source, file_id, file) {
        Ok((buffer, warnings)) => {
            out.write_all(&buffer)?;
            Ok(warnings)
        }
        Err(err) => {
            renderer.rollback(checkpoint);
            Err(err)
        }
    }
}

fn assemble_file(
    renderer: &mut Renderer<'_>,
    source: &str,
    file_id: usize,
    file: &SourceFile,
) -> Result<(Vec<u8>, Vec<ParseError>), Error> {
    let mut assembler = Assembler::new(renderer.config(), file_id);
    let mut buffer = Vec::new();

    renderer.begin_file(file, &mut buffer)?;
    for (line, span, text) in source_lines(source) {
        if let Some(item) = assembler.feed(text, line, span)? {
            renderer.render(&item, &mut buffer)?;
        }
    }
    let warnings = assembler.finish()?;
    renderer.end_file(&mut buffer)?;
    Ok((buffer, warnings))
}

/// Render a complete single-file document.
pub fn render_source(
    source: &str,
    file: &SourceFile,
    config: &Config,
    out: &mut dyn Write,
) -> Result<Vec<ParseError>, Error> {
    let mut renderer = Renderer::new(config);
    renderer.start(out)?;
    let warnings = render_file(&mut renderer, source, 0, file, out)?;
    renderer.finish(out)?;
    Ok(warnings)
}
