//! [`HighlightEngine`] backed by syntect's bundled grammars.
//!
//! Markup is classed HTML: every scope becomes a `<span>` whose classes are the
//! scope atoms separated by spaces (`keyword control rust`). The preview
//! surface turns those back into scopes to pick theme colours.
//!
//! syntect has no content-based language guessing, so auto-detection first
//! asks the grammars' first-line patterns (shebangs, `<?php`, ...) and then
//! parses the snippet with each candidate grammar, keeping the one that
//! recognises the most language-specific tokens. Generic `source.*`, `meta.*`
//! and punctuation scopes every grammar pushes are not counted.

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{ParseState, ScopeStackOp, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use super::{EngineOutput, HighlightEngine};
use crate::{Error, Result};

/// Languages tried, in priority order, when guessing.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "python",
    "rust",
    "javascript",
    "java",
    "c",
    "cpp",
    "cs",
    "go",
    "ruby",
    "html",
    "php",
    "sh",
    "css",
    "json",
    "sql",
    "yaml",
    "haskell",
    "lua",
];

// An `invalid.*` scope cancels out this many points.
const INVALID_PENALTY: i64 = 4;

/// Points a pushed scope is worth when guessing.
fn scope_weight(scope: &str) -> i64 {
    let top = scope.split('.').next().unwrap_or_default();
    match top {
        "invalid" => -INVALID_PENALTY,
        "keyword" if !scope.starts_with("keyword.operator") => 3,
        "storage" => 3,
        "entity" | "support" => 2,
        "string" => 1,
        "constant" if scope.starts_with("constant.language") => 1,
        _ => 0,
    }
}

pub struct SyntectEngine {
    syntaxes: SyntaxSet,
    candidates: Vec<String>,
}

impl Default for SyntectEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntectEngine {
    pub fn new() -> Self {
        Self::with_candidates(DEFAULT_CANDIDATES.iter().copied())
    }

    /// Build an engine that guesses among `candidates` (language tokens).
    pub fn with_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    fn find_syntax(&self, token: &str) -> Option<&SyntaxReference> {
        let lowercase = token.trim().to_ascii_lowercase();
        if matches!(lowercase.as_str(), "plaintext" | "text" | "plain") {
            return Some(self.syntaxes.find_syntax_plain_text());
        }
        self.syntaxes
            .find_syntax_by_token(&lowercase)
            .or_else(|| self.syntaxes.find_syntax_by_name(token.trim()))
            .or_else(|| self.syntaxes.find_syntax_by_extension(&lowercase))
    }

    fn render(&self, syntax: &SyntaxReference, text: &str) -> Result<String> {
        let mut code = text.to_string();
        if !code.ends_with('\n') {
            code.push('\n');
        }

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code.as_str()) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|e| Error::HighlightError(format!("{}: {}", syntax.name, e)))?;
        }
        Ok(generator.finalize())
    }

    /// How many language-specific tokens `syntax` recognises in `text`.
    ///
    /// Keywords and storage count most, then entity and support names, then
    /// strings and language constants; every `invalid.*` scope takes points
    /// away. Grammars that fail to parse score zero.
    fn score(&self, syntax: &SyntaxReference, text: &str) -> u64 {
        let mut state = ParseState::new(syntax);
        let mut total = 0i64;
        for line in LinesWithEndings::from(text) {
            let ops = match state.parse_line(line, &self.syntaxes) {
                Ok(ops) => ops,
                Err(_) => return 0,
            };
            for (_, op) in ops {
                if let ScopeStackOp::Push(scope) = op {
                    total += scope_weight(&scope.build_string());
                }
            }
        }
        total.max(0) as u64
    }

    /// The candidate token naming `syntax`, or its lowercased name.
    fn token_for(&self, syntax: &SyntaxReference) -> String {
        self.candidates
            .iter()
            .find(|c| self.find_syntax(c).map(|s| s.name == syntax.name).unwrap_or(false))
            .cloned()
            .unwrap_or_else(|| syntax.name.to_ascii_lowercase())
    }

    fn guess(&self, text: &str) -> Option<&SyntaxReference> {
        if let Some(first) = text.lines().find(|l| !l.trim().is_empty()) {
            if let Some(syntax) = self.syntaxes.find_syntax_by_first_line(first) {
                return Some(syntax);
            }
        }

        let mut best: Option<(&SyntaxReference, u64)> = None;
        for token in &self.candidates {
            let Some(syntax) = self.find_syntax(token) else {
                continue;
            };
            let score = self.score(syntax, text);
            if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((syntax, score));
            }
        }
        best.map(|(syntax, _)| syntax)
    }
}

impl HighlightEngine for SyntectEngine {
    fn is_language_supported(&self, tag: &str) -> bool {
        self.find_syntax(tag).is_some()
    }

    fn highlight(&self, text: &str, language: &str) -> Result<EngineOutput> {
        let syntax = self
            .find_syntax(language)
            .ok_or_else(|| Error::HighlightError(format!("unknown language: {}", language)))?;
        Ok(EngineOutput {
            markup: self.render(syntax, text)?,
            language: Some(language.to_string()),
        })
    }

    fn highlight_auto(&self, text: &str) -> Result<EngineOutput> {
        match self.guess(text) {
            Some(syntax) => Ok(EngineOutput {
                markup: self.render(syntax, text)?,
                language: Some(self.token_for(syntax)),
            }),
            None => Ok(EngineOutput {
                markup: self.render(self.syntaxes.find_syntax_plain_text(), text)?,
                language: None,
            }),
        }
    }

    fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .syntaxes
            .syntaxes()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
