mod settings;
mod test_runner;

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use protex::block::Item;
use protex::config::{Config, ConfigError, Language};
use protex::parser::ParseError;
use renderer::{Renderer, SourceFile};

use settings::Settings;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];
const GLOBAL_FLAGS: &[&str] = &["--no-color", "-v", "--verbose"];

#[derive(Parser)]
#[command(name = "protex", version, about = "Turn source code prologues into LaTeX")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log region transitions and skipped blocks to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert source files into one LaTeX document
    Run(RunArgs),

    /// Run .test.* fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Source files; `-` or none reads standard input
    files: Vec<String>,

    /// Bare mode: no preamble, title page or closing
    #[arg(short = 'b', long)]
    bare: bool,

    /// Internal mode: omit prologues marked BOPI
    #[arg(short = 'i', long)]
    internal: bool,

    /// New page before every prologue
    #[arg(short = 'n', long)]
    new_page: bool,

    /// Listing mode: prologues only
    #[arg(short = 'l', long)]
    listing: bool,

    /// Shut-up mode: drop code between BOC and EOC
    #[arg(short = 's', long)]
    shut_up: bool,

    /// Put DESCRIPTION text in a verbatim environment
    #[arg(short = 'x', long)]
    no_latex: bool,

    /// Leave source file names out of headings
    #[arg(short = 'f', long)]
    no_file_info: bool,

    /// Fortran source (default)
    #[arg(short = 'F')]
    fortran: bool,

    /// Ada source
    #[arg(short = 'A')]
    ada: bool,

    /// C or C++ source
    #[arg(short = 'C')]
    cpp: bool,

    /// Shell script
    #[arg(short = 'S')]
    shell: bool,

    /// GrADS script
    #[arg(short = 'G')]
    grads: bool,

    /// Python source
    #[arg(short = 'P')]
    python: bool,

    /// Source language by selector letter or name
    #[arg(long = "lang", value_name = "NAME")]
    language: Option<String>,

    /// Extra optional keywords, comma separated (e.g. `NOTES,!EXAMPLES:`)
    #[arg(long, value_delimiter = ',')]
    keys: Vec<String>,

    /// Custom LaTeX document class
    #[arg(long)]
    style: Option<String>,

    /// TOML settings file
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// Write the document here instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Parse only, don't render (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump assembled items
    #[arg(long)]
    ast: bool,

    /// List every region with its line and name
    #[arg(long)]
    list_blocks: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.* file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let args = with_default_subcommand(std::env::args().collect());
    let cli = Cli::parse_from(&args);

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// `protex a.f90` means `protex run a.f90`: insert `run` before the first
/// argument that is neither a global flag nor a subcommand.
fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let first = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !GLOBAL_FLAGS.contains(&a.as_str()))
        .map(|(pos, a)| {
            let explicit = SUBCOMMANDS.contains(&a.as_str())
                || matches!(a.as_str(), "-h" | "--help" | "-V" | "--version");
            (pos, explicit)
        });

    match first {
        Some((_, true)) => {}
        Some((pos, false)) => args.insert(pos, "run".to_string()),
        None => args.push("run".to_string()),
    }
    args
}

fn fail(message: impl fmt::Display) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}

fn build_config(args: &RunArgs, settings: &Settings) -> Result<Config, ConfigError> {
    let language = match selected_language(args) {
        Some(language) => language,
        None => match args.language.as_deref().or(settings.language.as_deref()) {
            Some(name) => name.parse()?,
            None => Language::default(),
        },
    };

    Config::builder()
        .language(language)
        .bare(args.bare || settings.bare)
        .internal(args.internal || settings.internal)
        .new_page(args.new_page || settings.new_page)
        .listing(args.listing || settings.listing)
        .shut_up(args.shut_up || settings.shut_up)
        .no_latex(args.no_latex || settings.no_latex)
        .no_file_info(args.no_file_info || settings.no_file_info)
        .style(args.style.clone().or_else(|| settings.style.clone()))
        .custom_keys(settings.keys.iter().chain(&args.keys).map(String::as_str))
        .build()
}

/// First language selector switch given, in table order.
fn selected_language(args: &RunArgs) -> Option<Language> {
    [
        args.fortran,
        args.ada,
        args.cpp,
        args.shell,
        args.grads,
        args.python,
    ]
    .into_iter()
    .zip(Language::ALL)
    .find_map(|(on, language)| on.then_some(language))
}

struct Input {
    file_id: usize,
    source: String,
    file: SourceFile,
}

fn read_inputs(
    names: &[String],
    files: &mut SimpleFiles<String, String>,
    date: &str,
) -> Vec<Input> {
    let stdin = ["-".to_string()];
    let names = if names.is_empty() { &stdin[..] } else { names };

    names
        .iter()
        .map(|name| {
            let (source, file) = if name == "-" || name.is_empty() {
                let mut source = String::new();
                if let Err(e) = io::stdin().read_to_string(&mut source) {
                    fail(format_args!("cannot read standard input: {}", e));
                }
                (source, SourceFile::stdin(date))
            } else {
                match std::fs::read_to_string(name) {
                    Ok(s) => (s, SourceFile::from_path(Path::new(name), date)),
                    Err(e) => fail(format_args!("cannot read '{}': {}", name, e)),
                }
            };
            let label = file.name.clone().unwrap_or_else(|| "<stdin>".to_string());
            let file_id = files.add(label, source.clone());
            Input {
                file_id,
                source,
                file,
            }
        })
        .collect()
}

fn do_run(args: RunArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let term_config = term::Config::default();

    let settings = match &args.config_file {
        Some(path) => Settings::load(Path::new(path)).unwrap_or_else(|e| fail(e)),
        None => Settings::default(),
    };
    let config = build_config(&args, &settings).unwrap_or_else(|e| fail(e));
    log::debug!("language: {}", config.language);

    let date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut files = SimpleFiles::new();
    let inputs = read_inputs(&args.files, &mut files, &date);

    if args.check || args.ast || args.list_blocks {
        inspect(&args, &config, &inputs, &writer, &term_config, &files);
        return;
    }

    // Nothing reaches the destination unless every file renders.
    let mut output = Vec::new();
    let mut renderer = Renderer::new(&config);
    if let Err(e) = renderer.start(&mut output) {
        fail(e);
    }
    for input in &inputs {
        match renderer::render_file(
            &mut renderer,
            &input.source,
            input.file_id,
            &input.file,
            &mut output,
        ) {
            Ok(warnings) => emit_diagnostics(&writer, &term_config, &files, &warnings),
            Err(renderer::Error::Parse(error)) => {
                emit_diagnostics(&writer, &term_config, &files, &[error]);
                process::exit(1);
            }
            Err(e) => fail(e),
        }
    }
    if let Err(e) = renderer.finish(&mut output) {
        fail(e);
    }

    let written = match &args.output {
        Some(path) => std::fs::write(path, &output),
        None => io::stdout().lock().write_all(&output),
    };
    if let Err(e) = written {
        fail(format_args!("cannot write output: {}", e));
    }
}

/// `--check`, `--ast` and `--list-blocks`: assemble without rendering.
fn inspect(
    args: &RunArgs,
    config: &Config,
    inputs: &[Input],
    writer: &StandardStream,
    term_config: &term::Config,
    files: &SimpleFiles<String, String>,
) {
    for input in inputs {
        let parser = protex::parser::Parser::new(input.source.clone(), input.file_id, config);
        let parsed = match parser.parse() {
            Ok(p) => p,
            Err(error) => {
                emit_diagnostics(writer, term_config, files, &[error]);
                process::exit(1);
            }
        };
        emit_diagnostics(writer, term_config, files, &parsed.warnings);

        let name = input.file.name.as_deref().unwrap_or("<stdin>");
        if args.ast {
            println!("{:#?}", parsed.items);
        } else if args.list_blocks {
            println!("{}:", name);
            for item in &parsed.items {
                println!("  {}", describe(item));
            }
        } else {
            eprintln!("ok: {} parsed successfully", name);
        }
    }
}

fn describe(item: &Item) -> String {
    match item {
        Item::Block(block) => match block.identity_value() {
            Some((identity, value)) => format!(
                "{:>5}  {} {} {}",
                block.line,
                block.region,
                identity.keyword(),
                value
            ),
            None => format!("{:>5}  {}", block.line, block.region),
        },
        Item::Verbatim(verbatim) => format!(
            "{:>5}  {} ({} lines)",
            verbatim.line,
            verbatim.region,
            verbatim.lines.len()
        ),
        Item::Literal(literal) => format!("{:>5}  quote", literal.line),
    }
}

fn emit_diagnostics(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostics: &[ParseError],
) {
    for diag in diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diag.to_diagnostic());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(with_default_subcommand(argv(args))).unwrap();
        match cli.command {
            Command::Run(run) => run,
            Command::Test(_) => panic!("expected run"),
        }
    }

    #[test]
    fn run_is_the_default_subcommand() {
        assert_eq!(
            with_default_subcommand(argv(&["protex", "a.f90"])),
            argv(&["protex", "run", "a.f90"])
        );
        assert_eq!(
            with_default_subcommand(argv(&["protex", "-o", "out.tex", "a.f90"])),
            argv(&["protex", "run", "-o", "out.tex", "a.f90"])
        );
        assert_eq!(
            with_default_subcommand(argv(&["protex", "--no-color", "test", "fixtures"])),
            argv(&["protex", "--no-color", "test", "fixtures"])
        );
        assert_eq!(with_default_subcommand(argv(&["protex"])), argv(&["protex", "run"]));
        assert_eq!(
            with_default_subcommand(argv(&["protex", "--help"])),
            argv(&["protex", "--help"])
        );
    }

    #[test]
    fn switches_map_onto_config() {
        let args = run_args(&["protex", "-b", "-i", "-s", "-x", "-f", "-n", "-l", "a.f90"]);
        let config = build_config(&args, &Settings::default()).unwrap();
        assert!(config.bare && config.internal && config.shut_up);
        assert!(config.no_latex && config.no_file_info && config.new_page && config.listing);
        assert_eq!(args.files, vec!["a.f90"]);
    }

    #[test]
    fn language_selectors() {
        let config = build_config(&run_args(&["protex", "-C"]), &Settings::default()).unwrap();
        assert_eq!(config.language, Language::Cpp);

        let config =
            build_config(&run_args(&["protex", "--lang", "python"]), &Settings::default()).unwrap();
        assert_eq!(config.language, Language::Python);

        let err = build_config(&run_args(&["protex", "--lang", "cobol"]), &Settings::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownLanguage("cobol".into()));
    }

    #[test]
    fn command_line_overrides_settings() {
        let settings = Settings {
            language: Some("A".into()),
            style: Some("fromFile".into()),
            keys: vec!["NOTES".into()],
            ..Settings::default()
        };
        let args = run_args(&["protex", "-P", "--style", "cli", "--keys", "EXTRA,MORE"]);
        let config = build_config(&args, &settings).unwrap();
        assert_eq!(config.language, Language::Python);
        assert_eq!(config.style.as_deref(), Some("cli"));
        assert!(config.vocabulary().is_optional("NOTES"));
        assert!(config.vocabulary().is_optional("EXTRA"));
        assert!(config.vocabulary().is_optional("MORE"));

        let config = build_config(&run_args(&["protex"]), &settings).unwrap();
        assert_eq!(config.language, Language::Ada);
    }

    #[test]
    fn reserved_custom_key_rejected() {
        let err =
            build_config(&run_args(&["protex", "--keys", "BOC"]), &Settings::default()).unwrap_err();
        assert_eq!(err, ConfigError::ReservedKeyword("BOC".into()));
    }
}
