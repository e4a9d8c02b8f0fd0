//! Highlighting: the engine boundary and the fail-soft adapter over it.
//!
//! A [`HighlightEngine`] turns text into highlighted markup, either for a given
//! language or by guessing. The [`Highlighter`] adapter applies the selection
//! policy on top of an engine and never lets an engine failure escape: blank
//! input short-circuits, unknown languages fall back to auto-detection and
//! errors degrade to escaped plain text.

pub mod syntect_engine;

use std::sync::Arc;

use log::{debug, error, warn};

use crate::language::{HighlightResult, LanguageSelection, Resolution, AUTO, PLAINTEXT};
use crate::Result;

pub use self::syntect_engine::SyntectEngine;

/// Raw output of a highlighting engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// Highlighted markup
    pub markup: String,
    /// Language the engine used, if it knows
    pub language: Option<String>,
}

/// External highlighting engine.
pub trait HighlightEngine: Send + Sync {
    /// Whether `tag` names a language this engine can highlight
    fn is_language_supported(&self, tag: &str) -> bool;

    /// Highlight `text` as `language`
    fn highlight(&self, text: &str, language: &str) -> Result<EngineOutput>;

    /// Guess the language of `text` and highlight it
    fn highlight_auto(&self, text: &str) -> Result<EngineOutput>;

    /// Names of the languages this engine knows about
    fn languages(&self) -> Vec<String>;
}

/// Applies the language selection policy on top of a [`HighlightEngine`].
#[derive(Clone)]
pub struct Highlighter {
    engine: Arc<dyn HighlightEngine>,
}

impl Highlighter {
    pub fn new(engine: Arc<dyn HighlightEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn HighlightEngine> {
        &self.engine
    }

    /// Highlight `source` according to `selection`. Infallible by contract.
    pub fn highlight(&self, source: &str, selection: &LanguageSelection) -> HighlightResult {
        if source.trim().is_empty() {
            return HighlightResult::empty();
        }

        let attempt = match selection {
            LanguageSelection::Auto => self.auto(source, Resolution::Detected),
            LanguageSelection::Explicit(tag) if self.engine.is_language_supported(tag) => self
                .engine
                .highlight(source, tag)
                .map(|out| HighlightResult {
                    markup: out.markup,
                    resolved_language: tag.clone(),
                    resolution: Resolution::Forced,
                }),
            LanguageSelection::Explicit(tag) => {
                warn!(
                    "Language \"{}\" not recognized by the highlighter, falling back to auto-detect",
                    tag
                );
                self.auto(source, Resolution::Fallback)
            }
        };

        match attempt {
            Ok(result) => {
                debug!("highlighted {} bytes as {}", source.len(), result.resolved_language);
                result
            }
            Err(e) => {
                error!("Error during highlighting: {}", e);
                HighlightResult {
                    markup: escape_html(source),
                    resolved_language: PLAINTEXT.to_string(),
                    resolution: Resolution::Error,
                }
            }
        }
    }

    fn auto(&self, source: &str, resolution: Resolution) -> Result<HighlightResult> {
        let out = self.engine.highlight_auto(source)?;
        Ok(HighlightResult {
            markup: out.markup,
            resolved_language: out.language.unwrap_or_else(|| AUTO.to_string()),
            resolution,
        })
    }
}

/// Escape the characters that are unsafe inside HTML text content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine stub that knows a single language and counts calls.
    #[derive(Default)]
    struct StubEngine {
        calls: AtomicUsize,
        fail: bool,
        guess: Option<&'static str>,
    }

    impl HighlightEngine for StubEngine {
        fn is_language_supported(&self, tag: &str) -> bool {
            tag == "rust"
        }

        fn highlight(&self, text: &str, language: &str) -> Result<EngineOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::HighlightError("boom".into()));
            }
            Ok(EngineOutput {
                markup: format!("<{}>{}", language, text),
                language: Some(language.to_string()),
            })
        }

        fn highlight_auto(&self, text: &str) -> Result<EngineOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::HighlightError("boom".into()));
            }
            Ok(EngineOutput {
                markup: format!("<auto>{}", text),
                language: self.guess.map(String::from),
            })
        }

        fn languages(&self) -> Vec<String> {
            vec!["rust".into()]
        }
    }

    fn highlighter(engine: StubEngine) -> (Highlighter, Arc<StubEngine>) {
        let engine = Arc::new(engine);
        (Highlighter::new(engine.clone()), engine)
    }

    #[test]
    fn blank_input_skips_engine_for_every_selection() {
        let (h, engine) = highlighter(StubEngine::default());
        for sel in [
            LanguageSelection::Auto,
            LanguageSelection::explicit("rust"),
            LanguageSelection::explicit("klingon"),
        ] {
            for src in ["", "   ", "\n\t\n"] {
                let r = h.highlight(src, &sel);
                assert_eq!(r.markup, "");
                assert_eq!(r.resolved_language, "plaintext");
                assert_eq!(r.resolution, Resolution::Empty);
            }
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn auto_reports_guess_or_auto() {
        let (h, _) = highlighter(StubEngine { guess: Some("python"), ..Default::default() });
        let r = h.highlight("print('hi')", &LanguageSelection::Auto);
        assert_eq!(r.resolved_language, "python");
        assert_eq!(r.resolution, Resolution::Detected);

        let (h, _) = highlighter(StubEngine::default());
        let r = h.highlight("???", &LanguageSelection::Auto);
        assert_eq!(r.resolved_language, "auto");
    }

    #[test]
    fn explicit_supported_is_forced() {
        let (h, _) = highlighter(StubEngine::default());
        let r = h.highlight("fn main() {}", &LanguageSelection::explicit("rust"));
        assert_eq!(r.markup, "<rust>fn main() {}");
        assert_eq!(r.resolved_language, "rust");
        assert_eq!(r.resolution, Resolution::Forced);
    }

    #[test]
    fn explicit_unsupported_falls_back_to_auto_markup() {
        let (h, _) = highlighter(StubEngine { guess: Some("python"), ..Default::default() });
        let r = h.highlight("x = 1", &LanguageSelection::explicit("cobol-2099"));
        let auto = h.highlight("x = 1", &LanguageSelection::Auto);
        assert_eq!(r.resolution, Resolution::Fallback);
        assert_eq!(r.markup, auto.markup);
        assert_eq!(r.resolved_language, "python");
    }

    #[test]
    fn engine_failure_degrades_to_escaped_plaintext() {
        let (h, _) = highlighter(StubEngine { fail: true, ..Default::default() });
        let r = h.highlight("a < b && c > \"d\"", &LanguageSelection::explicit("rust"));
        assert_eq!(r.markup, "a &lt; b &amp;&amp; c &gt; &quot;d&quot;");
        assert_eq!(r.resolved_language, "plaintext");
        assert_eq!(r.resolution, Resolution::Error);
        assert_eq!(r.label(), "Highlighting Error");
    }
}
