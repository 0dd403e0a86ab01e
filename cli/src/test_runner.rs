use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use protex::config::{Config, Language};
use protex::parser::ParseError;
use renderer::SourceFile;

/// Marker in fixture file names: `module.test.f90`.
const FIXTURE_MARKER: &str = ".test.";

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning must be reported on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    pub description: Option<String>,

    /// Language selector or name. Defaults to the one implied by the file
    /// extension, then Fortran.
    pub language: Option<String>,

    /// Mode switches by name: `bare`, `internal`, `new_page`, `listing`,
    /// `shut_up`, `no_latex`, `no_file_info`.
    pub flags: Vec<String>,

    /// Extra optional keywords.
    pub keys: Vec<String>,

    pub style: Option<String>,

    /// Substrings the rendered document must contain.
    pub expect_contains: Vec<String>,

    /// Substrings the rendered document must not contain.
    pub expect_absent: Vec<String>,

    /// Expected fatal error; its message must contain this substring.
    pub expect_error: Option<String>,

    /// Line the expected error is reported on.
    pub expect_error_line: Option<usize>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

impl TestConfig {
    fn build(&self, extension: &str) -> Result<Config, String> {
        let language = match &self.language {
            Some(name) => name.parse::<Language>().map_err(|e| e.to_string())?,
            None => language_for_extension(extension).unwrap_or_default(),
        };

        let mut builder = Config::builder()
            .language(language)
            .style(self.style.clone())
            .custom_keys(self.keys.iter().map(String::as_str));
        for flag in &self.flags {
            builder = match flag.as_str() {
                "bare" => builder.bare(true),
                "internal" => builder.internal(true),
                "new_page" => builder.new_page(true),
                "listing" => builder.listing(true),
                "shut_up" => builder.shut_up(true),
                "no_latex" => builder.no_latex(true),
                "no_file_info" => builder.no_file_info(true),
                other => return Err(format!("unknown flag '{}'", other)),
            };
        }
        builder.build().map_err(|e| e.to_string())
    }
}

fn language_for_extension(extension: &str) -> Option<Language> {
    match extension {
        "f" | "f90" | "F90" | "F" => Some(Language::Fortran),
        "ada" | "adb" | "ads" => Some(Language::Ada),
        "c" | "h" | "cc" | "cpp" | "hpp" => Some(Language::Cpp),
        "sh" | "csh" => Some(Language::Shell),
        "gs" => Some(Language::Grads),
        "py" => Some(Language::Python),
        _ => None,
    }
}

/// Parse a fixture file into its TOML config and source text.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

/// `module.test.f90` renders as `module.f90`.
fn source_name(path: &Path) -> Option<(String, String)> {
    let name = path.file_name()?.to_str()?;
    let (stem, extension) = name.split_once(FIXTURE_MARKER)?;
    Some((format!("{}.{}", stem, extension), extension.to_string()))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, outcome) = match check_fixture(path) {
        Ok(description) => (description, TestOutcome::Pass),
        Err((description, reason)) => (description, TestOutcome::Fail(reason)),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

type Checked = Result<Option<String>, (Option<String>, String)>;

fn check_fixture(path: &Path) -> Checked {
    let content = std::fs::read_to_string(path)
        .map_err(|e| (None, format!("cannot read file: {}", e)))?;
    let (config, source) =
        parse_test_file(&content).map_err(|e| (None, format!("frontmatter error: {}", e)))?;
    let description = config.description.clone();
    let fail = |reason: String| (description.clone(), reason);

    let (name, extension) =
        source_name(path).ok_or_else(|| fail("file name has no .test. marker".into()))?;

    let run_config = match config.build(&extension) {
        Ok(c) => c,
        // A rejected configuration can be the expected outcome.
        Err(reason) => {
            return match &config.expect_error {
                Some(expected) if reason.contains(expected.as_str()) => Ok(description.clone()),
                _ => Err(fail(format!("configuration error: {}", reason))),
            };
        }
    };

    let file = SourceFile {
        name: Some(name),
        date: "FIXTURE".to_string(),
    };
    let mut output = Vec::new();
    let result = renderer::render_source(source, &file, &run_config, &mut output);

    let warnings = match (result, &config.expect_error) {
        (Err(renderer::Error::Parse(error)), Some(expected)) => {
            return check_error(&error, expected, config.expect_error_line)
                .map(|()| description.clone())
                .map_err(fail);
        }
        (Err(error), Some(expected)) => {
            let message = error.to_string();
            if message.contains(expected.as_str()) {
                return Ok(description.clone());
            }
            return Err(fail(format!(
                "expected error containing \"{}\", got: {}",
                expected, message
            )));
        }
        (Ok(_), Some(expected)) => {
            return Err(fail(format!(
                "expected error containing \"{}\", but rendering succeeded",
                expected
            )));
        }
        (Err(error), None) => return Err(fail(format!("unexpected error: {}", error))),
        (Ok(warnings), None) => warnings,
    };

    let document = String::from_utf8_lossy(&output);
    for expected in &config.expect_contains {
        if !document.contains(expected.as_str()) {
            return Err(fail(format!(
                "output does not contain:\n    {}\n  output:\n{}",
                expected, document
            )));
        }
    }
    for unwanted in &config.expect_absent {
        if document.contains(unwanted.as_str()) {
            return Err(fail(format!("output unexpectedly contains: {}", unwanted)));
        }
    }

    if let Some(expected_warnings) = &config.expect_warnings {
        check_warnings(&warnings, expected_warnings).map_err(fail)?;
    }

    Ok(description)
}

fn check_error(error: &ParseError, expected: &str, line: Option<usize>) -> Result<(), String> {
    if !error.message.contains(expected) {
        return Err(format!(
            "expected error containing \"{}\", got: {}",
            expected, error
        ));
    }
    match line {
        Some(line) if line != error.line => Err(format!(
            "expected error on line {}, but it is on line {}",
            line, error.line
        )),
        _ => Ok(()),
    }
}

/// Check that actual warnings match expectations.
fn check_warnings(warnings: &[ParseError], expected: &[ExpectedWarning]) -> Result<(), String> {
    if warnings.len() != expected.len() {
        let actual_msgs: Vec<String> = warnings.iter().map(|w| format!("  - {}", w)).collect();
        return Err(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            warnings.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in warnings.iter().zip(expected).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Err(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual
            ));
        }
        if let Some(line) = expected.line.filter(|&line| line != actual.line) {
            return Err(format!(
                "warning[{}]: expected on line {}, but it is on line {}",
                i, line, actual.line
            ));
        }
    }

    Ok(())
}

/// Discover fixture files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if source_name(&path).is_some() {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.* files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Run every fixture under `path` (or a single file). If `categories` is
/// non-empty, only run those. Returns the exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no .test.* files found in {}", path.display());
            return 1;
        }
        filter_categories(all_categories, categories)
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", paint(header, "1", no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            paint("ok", "32", no_color),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

fn filter_categories(
    all_categories: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> Vec<(String, Vec<PathBuf>)> {
    if requested.is_empty() {
        return all_categories.into_iter().collect();
    }

    for req in requested {
        let req = req.trim_matches('/');
        let found = all_categories
            .keys()
            .any(|cat| cat == req || cat.starts_with(&format!("{}/", req)));
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    all_categories
        .into_iter()
        .filter(|(cat, _)| {
            requested.iter().map(|r| r.trim_matches('/')).any(|req| {
                cat.as_str() == req || cat.starts_with(&format!("{}/", req))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmatter_split() {
        let (config, source) = parse_test_file(
            "---\ndescription = \"d\"\nflags = [\"bare\"]\nexpect_contains = [\"x\"]\n---\n!BOP\n!EOP\n",
        )
        .unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.flags, vec!["bare"]);
        assert_eq!(source, "!BOP\n!EOP\n");
    }

    #[test]
    fn frontmatter_required() {
        assert!(parse_test_file("!BOP\n").is_err());
        assert!(parse_test_file("---\ndescription = \"d\"\n").is_err());
    }

    #[test]
    fn fixture_names() {
        assert_eq!(
            source_name(Path::new("fixtures/modes/bare.test.f90")),
            Some(("bare.f90".to_string(), "f90".to_string()))
        );
        assert_eq!(source_name(Path::new("README.md")), None);
    }

    #[test]
    fn extension_picks_language() {
        let config = TestConfig::default();
        assert_eq!(config.build("py").unwrap().language, Language::Python);
        assert_eq!(config.build("txt").unwrap().language, Language::Fortran);
    }

    #[test]
    fn unknown_flag_rejected() {
        let config = TestConfig {
            flags: vec!["loud".into()],
            ..TestConfig::default()
        };
        assert!(config.build("f90").unwrap_err().contains("loud"));
    }
}
