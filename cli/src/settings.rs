use std::path::Path;

use serde::Deserialize;

/// Defaults loaded from a `--config` TOML file. Every field is optional;
/// switches given on the command line win.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Language selector letter or name, e.g. `"F"` or `"python"`.
    pub language: Option<String>,
    pub bare: bool,
    pub internal: bool,
    pub new_page: bool,
    pub listing: bool,
    pub shut_up: bool,
    pub no_latex: bool,
    pub no_file_info: bool,
    pub style: Option<String>,
    /// Extra optional keywords.
    pub keys: Vec<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("TOML parse error: {}", e))
    }
}
