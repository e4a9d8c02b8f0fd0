//! Colour themes for the preview surface

use log::warn;
use syntect::highlighting::{Theme, ThemeSet};

/// Theme used when none is configured or the configured one is unknown.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// The bundled syntect themes.
pub struct ThemeCatalog {
    set: ThemeSet,
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self::load()
    }
}

impl ThemeCatalog {
    pub fn load() -> Self {
        Self {
            set: ThemeSet::load_defaults(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.set.themes.contains_key(name)
    }

    /// Look up `name`, falling back to [`DEFAULT_THEME`] with a warning.
    pub fn resolve(&self, name: &str) -> Theme {
        if let Some(theme) = self.set.themes.get(name) {
            return theme.clone();
        }
        warn!("Unknown theme \"{}\", using {}", name, DEFAULT_THEME);
        self.set
            .themes
            .get(DEFAULT_THEME)
            .cloned()
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.set.themes.keys().cloned().collect()
    }
}
