use std::fmt;
use std::str::FromStr;

use crate::region::Region;

/// Host language of the source being documented.
/// Each language fixes the comment token that introduces prologue lines
/// and the lexer used for verbatim code listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Fortran,
    Ada,
    Cpp,
    Shell,
    Grads,
    Python,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Fortran,
        Language::Ada,
        Language::Cpp,
        Language::Shell,
        Language::Grads,
        Language::Python,
    ];

    /// Single-letter selector used on the command line (`-F`, `-A`, ...).
    pub fn selector(self) -> char {
        match self {
            Language::Fortran => 'F',
            Language::Ada => 'A',
            Language::Cpp => 'C',
            Language::Shell => 'S',
            Language::Grads => 'G',
            Language::Python => 'P',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Fortran => "Fortran90",
            Language::Ada => "Ada",
            Language::Cpp => "C++",
            Language::Shell => "Shell",
            Language::Grads => "GrADS",
            Language::Python => "Python",
        }
    }

    /// Line-comment token.
    pub fn comment(self) -> &'static str {
        match self {
            Language::Fortran => "!",
            Language::Ada => "--",
            Language::Cpp => "//",
            Language::Shell | Language::Python => "#",
            Language::Grads => "*",
        }
    }

    /// Lexer name understood by the `minted` package.
    pub fn lexer(self) -> &'static str {
        match self {
            Language::Fortran => "fortran",
            Language::Ada => "ada",
            Language::Cpp => "c",
            Language::Shell | Language::Grads => "bash",
            Language::Python => "python",
        }
    }

    pub fn from_selector(selector: char) -> Option<Self> {
        Language::ALL.into_iter().find(|l| l.selector() == selector)
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    /// Accepts the single-letter selector (case-sensitive) or a language
    /// name (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(lang) = Language::from_selector(c) {
                return Ok(lang);
            }
        }
        match trimmed.to_lowercase().as_str() {
            "fortran" | "fortran90" | "f90" => Ok(Language::Fortran),
            "ada" => Ok(Language::Ada),
            "c" | "c++" | "cpp" => Ok(Language::Cpp),
            "shell" | "sh" | "bash" => Ok(Language::Shell),
            "grads" => Ok(Language::Grads),
            "python" | "py" => Ok(Language::Python),
            _ => Err(ConfigError::UnknownLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keywords naming the subject of a prologue.
pub const IDENTITY_KEYWORDS: &[&str] = &[
    "MODULE",
    "PROGRAM",
    "ROUTINE",
    "FUNCTION",
    "IROUTINE",
    "IFUNCTION",
    "IIROUTINE",
    "CROUTINE",
];

/// Keywords that are always recognized, apart from the identity keywords.
pub const FIXED_KEYWORDS: &[&str] = &[
    "DESCRIPTION",
    "TITLE",
    "AUTHORS",
    "AFFILIATION",
    "DATE",
    "INTRODUCTION",
];

/// Optional keywords recognized by default. Custom keys extend this list.
pub const DEFAULT_OPTIONAL_KEYWORDS: &[&str] = &[
    "INTERFACE",
    "USES",
    "PUBLIC TYPES",
    "PRIVATE TYPES",
    "PUBLIC MEMBER FUNCTIONS",
    "PRIVATE MEMBER FUNCTIONS",
    "PUBLIC DATA MEMBERS",
    "PARAMETERS",
    "ARGUMENTS",
    "DEFINED PARAMETERS",
    "INPUT PARAMETERS",
    "INPUT/OUTPUT PARAMETERS",
    "OUTPUT PARAMETERS",
    "RETURN VALUE",
    "REVISION HISTORY",
    "BUGS",
    "SEE ALSO",
    "SYSTEM ROUTINES",
    "FILES USED",
    "REMARKS",
    "TO DO",
    "CALLING SEQUENCE",
    "AUTHOR",
    "CALLED FROM",
    "LOCAL VARIABLES",
];

/// The set of keyword names recognized inside prologue-like regions.
/// Built once per run; matching is literal and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    optional: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary {
            optional: DEFAULT_OPTIONAL_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Extend the default optional keywords with custom names.
    pub fn with_custom<I, S>(custom: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary = Vocabulary::default();
        for key in custom {
            let name = normalize_custom_key(key.as_ref())?;
            if !vocabulary.contains(&name) {
                vocabulary.optional.push(name);
            }
        }
        Ok(vocabulary)
    }

    pub fn contains(&self, name: &str) -> bool {
        IDENTITY_KEYWORDS.contains(&name)
            || FIXED_KEYWORDS.contains(&name)
            || self.optional.iter().any(|k| k == name)
    }

    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.iter().any(|k| k == name)
    }

    /// Optional keywords in registration order (defaults first, then custom).
    pub fn optional(&self) -> impl Iterator<Item = &str> {
        self.optional.iter().map(String::as_str)
    }

    /// Match `NAME:` at the start of `candidate`, returning the recognized
    /// name and the text after the colon.
    pub fn lookup<'a>(&'a self, candidate: &'a str) -> Option<(&'a str, &'a str)> {
        let matches = |name: &'a str| {
            let rest = candidate.strip_prefix(name)?.strip_prefix(':')?;
            Some((name, rest))
        };
        IDENTITY_KEYWORDS
            .iter()
            .chain(FIXED_KEYWORDS)
            .find_map(|name| matches(*name))
            .or_else(|| self.optional().find_map(matches))
    }
}

/// Accepts `NOTES`, `!NOTES` or `!NOTES:` and returns `NOTES`.
fn normalize_custom_key(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix('!').unwrap_or(trimmed);
    let name = name.strip_suffix(':').unwrap_or(name).trim();

    if name.is_empty() {
        return Err(ConfigError::EmptyKeyword);
    }
    if name.contains([':', '!', '\n', '\r']) {
        return Err(ConfigError::MalformedKeyword(raw.to_string()));
    }
    if Region::from_token(name).is_some() || name == "QUOTE" {
        return Err(ConfigError::ReservedKeyword(name.to_string()));
    }
    Ok(name.to_string())
}

/// Problems detected while assembling a [`Config`], before any line is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownLanguage(String),
    EmptyKeyword,
    MalformedKeyword(String),
    ReservedKeyword(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownLanguage(name) => write!(
                f,
                "unknown language '{}' (expected one of {})",
                name,
                Language::ALL
                    .iter()
                    .map(|l| format!("{} ({})", l.selector(), l.name()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ConfigError::EmptyKeyword => write!(f, "custom keyword must not be empty"),
            ConfigError::MalformedKeyword(raw) => {
                write!(f, "malformed custom keyword '{}'", raw)
            }
            ConfigError::ReservedKeyword(name) => {
                write!(f, "'{}' is a section marker and cannot be a keyword", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Immutable settings for one run.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub language: Language,
    /// No preamble, title page or closing wrapper.
    pub bare: bool,
    /// Omit prologues marked `BOPI`.
    pub internal: bool,
    /// Page break before every prologue heading.
    pub new_page: bool,
    /// Render prologues only.
    pub listing: bool,
    /// Discard code between `BOC` and `EOC`.
    pub shut_up: bool,
    /// Put `DESCRIPTION` text in a verbatim environment.
    pub no_latex: bool,
    /// Drop source file names from headings and page marks.
    pub no_file_info: bool,
    /// Custom LaTeX document class.
    pub style: Option<String>,
    vocabulary: Vocabulary,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn comment(&self) -> &'static str {
        self.language.comment()
    }
}

/// Collects settings and validates them into a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
    custom_keys: Vec<String>,
}

impl ConfigBuilder {
    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn bare(mut self, on: bool) -> Self {
        self.config.bare = on;
        self
    }

    pub fn internal(mut self, on: bool) -> Self {
        self.config.internal = on;
        self
    }

    pub fn new_page(mut self, on: bool) -> Self {
        self.config.new_page = on;
        self
    }

    pub fn listing(mut self, on: bool) -> Self {
        self.config.listing = on;
        self
    }

    pub fn shut_up(mut self, on: bool) -> Self {
        self.config.shut_up = on;
        self
    }

    pub fn no_latex(mut self, on: bool) -> Self {
        self.config.no_latex = on;
        self
    }

    pub fn no_file_info(mut self, on: bool) -> Self {
        self.config.no_file_info = on;
        self
    }

    pub fn style(mut self, style: Option<String>) -> Self {
        self.config.style = style;
        self
    }

    pub fn custom_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = self.config;
        config.vocabulary = Vocabulary::with_custom(&self.custom_keys)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_selector_and_name() {
        assert_eq!("F".parse::<Language>(), Ok(Language::Fortran));
        assert_eq!("A".parse::<Language>(), Ok(Language::Ada));
        assert_eq!("c++".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert!(matches!(
            "cobol".parse::<Language>(),
            Err(ConfigError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn comment_tokens() {
        assert_eq!(Language::Fortran.comment(), "!");
        assert_eq!(Language::Ada.comment(), "--");
        assert_eq!(Language::Cpp.comment(), "//");
        assert_eq!(Language::Shell.comment(), "#");
    }

    #[test]
    fn custom_keys_extend_defaults() {
        let config = Config::builder()
            .custom_keys(["!NOTES:", "EXAMPLES"])
            .build()
            .unwrap();
        let vocab = config.vocabulary();
        assert!(vocab.is_optional("NOTES"));
        assert!(vocab.is_optional("EXAMPLES"));
        assert!(vocab.is_optional("INTERFACE"));
        assert!(vocab.contains("MODULE"));
    }

    #[test]
    fn duplicate_custom_key_registered_once() {
        let vocab = Vocabulary::with_custom(["BUGS", "NOTES", "!NOTES:"]).unwrap();
        assert_eq!(vocab.optional().filter(|k| *k == "NOTES").count(), 1);
        assert_eq!(vocab.optional().filter(|k| *k == "BUGS").count(), 1);
    }

    #[test]
    fn malformed_custom_keys_rejected() {
        assert_eq!(
            Vocabulary::with_custom(["  "]),
            Err(ConfigError::EmptyKeyword)
        );
        assert!(matches!(
            Vocabulary::with_custom(["A:B"]),
            Err(ConfigError::MalformedKeyword(_))
        ));
        assert_eq!(
            Vocabulary::with_custom(["BOP"]),
            Err(ConfigError::ReservedKeyword("BOP".into()))
        );
    }

    #[test]
    fn lookup_requires_colon_and_exact_case() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.lookup("MODULE: m_time"), Some(("MODULE", " m_time")));
        assert_eq!(vocab.lookup("SEE ALSO:"), Some(("SEE ALSO", "")));
        assert_eq!(vocab.lookup("MODULE m_time"), None);
        assert_eq!(vocab.lookup("module: m_time"), None);
        assert_eq!(
            vocab.lookup("INPUT/OUTPUT PARAMETERS: x"),
            Some(("INPUT/OUTPUT PARAMETERS", " x"))
        );
    }
}
