//! Language selection and highlight results

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language tag reported for empty input and error fallbacks.
pub const PLAINTEXT: &str = "plaintext";

/// Language tag reported when auto-detection has no guess.
pub const AUTO: &str = "auto";

/// Which language the highlighter should use.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum LanguageSelection {
    /// Let the engine guess
    #[default]
    Auto,
    /// Force a specific language tag (e.g. `rust`, `py`)
    Explicit(String),
}

impl LanguageSelection {
    pub fn explicit(tag: impl Into<String>) -> Self {
        LanguageSelection::Explicit(tag.into())
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, LanguageSelection::Auto)
    }
}

impl FromStr for LanguageSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        if tag.is_empty() || tag.eq_ignore_ascii_case(AUTO) {
            Ok(LanguageSelection::Auto)
        } else {
            Ok(LanguageSelection::Explicit(tag.to_string()))
        }
    }
}

impl From<String> for LanguageSelection {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(sel) => sel,
            Err(never) => match never {},
        }
    }
}

impl From<LanguageSelection> for String {
    fn from(sel: LanguageSelection) -> Self {
        sel.to_string()
    }
}

impl fmt::Display for LanguageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSelection::Auto => f.write_str(AUTO),
            LanguageSelection::Explicit(tag) => f.write_str(tag),
        }
    }
}

/// How the resolved language of a [`HighlightResult`] was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Source was blank; the engine was not consulted
    Empty,
    /// Auto-detection was requested
    Detected,
    /// An explicit, supported language was forced
    Forced,
    /// An explicit language was not recognised, auto-detection was used instead
    Fallback,
    /// The engine failed and the source was escaped as plain text
    Error,
}

/// Output of one highlighter run. Never mutated; superseded by the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightResult {
    /// Highlighted markup (classed HTML spans)
    pub markup: String,
    /// Language the markup was produced for
    pub resolved_language: String,
    pub resolution: Resolution,
}

impl HighlightResult {
    pub fn empty() -> Self {
        Self {
            markup: String::new(),
            resolved_language: PLAINTEXT.to_string(),
            resolution: Resolution::Empty,
        }
    }

    /// Human readable label for the resolved language, as shown next to the
    /// language selector.
    pub fn label(&self) -> String {
        match self.resolution {
            Resolution::Empty => format!("Detected: {}", PLAINTEXT),
            Resolution::Detected => format!("Detected: {}", self.resolved_language),
            Resolution::Forced => format!("Language: {} (Forced)", self.resolved_language),
            Resolution::Fallback => format!("Detected: {} (Fallback)", self.resolved_language),
            Resolution::Error => "Highlighting Error".to_string(),
        }
    }
}
