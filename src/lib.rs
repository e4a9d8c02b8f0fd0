//! Snipshot
//!
//! Render a code snippet as syntax-highlighted text and capture it as a PNG
//! image, behind a debounced pipeline that is safe against overlapping runs.
//!
//! # Features
//!
//! - **Debounced pipeline**: rapid edits coalesce into one highlight + capture
//!   run; runs are serialised and stale completions are discarded
//! - **Adapter-based engines**: highlighting ([`HighlightEngine`]) and capture
//!   ([`CaptureEngine`]) sit behind traits with syntect and tiny-skia defaults
//! - **Fail-soft**: highlight, capture and storage failures degrade a feature
//!   and never take the pipeline down
//! - **Sharing** (feature `publish`) and **clipboard copy** (feature `clipboard`)
//!
//! # Example
//!
//! ```no_run
//! use snipshot::{PipelineConfig, SnippetPipeline};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = SnippetPipeline::builder(PipelineConfig::default()).spawn()?;
//! pipeline.edit("fn main() { println!(\"hi\"); }")?;
//! let snapshot = pipeline.flush().await?;
//! if let Some(artifact) = &snapshot.artifact {
//!     std::fs::write("snippet.png", &artifact.png)?;
//! }
//! pipeline.close().await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod clipboard;
pub mod debounce;
pub mod editing;
pub mod highlight;
pub mod language;
pub mod pipeline;
pub mod rendering;
pub mod state;
pub mod store;

#[cfg(feature = "publish")]
pub mod publish;

pub use clipboard::{ClipboardSink, ImageCopier};
pub use debounce::Trigger;
pub use highlight::{HighlightEngine, Highlighter, SyntectEngine};
pub use language::{HighlightResult, LanguageSelection, Resolution};
pub use pipeline::{PipelineBuilder, PipelineEvent, SnippetPipeline};
pub use rendering::layout::ContainerStyle;
pub use rendering::paint::Rgba;
pub use rendering::raster::{CaptureEngine, CaptureOptions, PixmapCapture};
pub use rendering::{Bitmap, RenderArtifact};
pub use state::{Actions, PipelineSnapshot, RunPhase, RunState};
pub use store::{FileStore, MemoryStore, SnippetStore};

/// Default remote instance for publishing and fetching creations.
pub const DEFAULT_INSTANCE_URL: &str = "https://pondiverse.val.run";

/// Visual settings of the rendered snippet.
///
/// Changing any of these schedules a style-triggered run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Name of a bundled syntect theme
    pub theme: String,
    /// Container background; `None` renders a transparent container
    pub background: Option<Rgba>,
    /// Padding around the code in px
    pub padding: u32,
    /// Font size in px
    pub font_size: f32,
    /// Font family handed to the capture engine
    pub font_family: String,
    /// Language to highlight as
    pub language: LanguageSelection,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            theme: rendering::theme::DEFAULT_THEME.to_string(),
            background: Some(Rgba::new(0x2b, 0x30, 0x3b, 0xff)),
            padding: 32,
            font_size: 14.0,
            font_family: rendering::layout::DEFAULT_FONT_FAMILY.to_string(),
            language: LanguageSelection::Auto,
        }
    }
}

impl RenderSettings {
    pub fn container_style(&self) -> ContainerStyle {
        ContainerStyle {
            background: self.background,
            padding: self.padding as f32,
            font_size: self.font_size,
            font_family: self.font_family.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(Error::ConfigError(format!("font size must be positive, got {}", self.font_size)));
        }
        if self.font_family.trim().is_empty() {
            return Err(Error::ConfigError("font family must not be empty".into()));
        }
        Ok(())
    }
}

/// Configuration for a [`SnippetPipeline`]
///
/// Defaults follow the interactive tool: 350ms quiet period for text edits,
/// 250ms for style changes, 150ms settle delay and 2x capture density.
///
/// # Examples
///
/// ```
/// let cfg = snipshot::PipelineConfig::default();
/// assert_eq!(cfg.edit_debounce_ms, 350);
/// assert_eq!(cfg.capture_scale, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quiet period after a text edit, in milliseconds
    pub edit_debounce_ms: u64,
    /// Quiet period after a style or language change, in milliseconds
    pub style_debounce_ms: u64,
    /// Delay between applying markup and capturing, in milliseconds
    pub settle_ms: u64,
    /// Pixel density of captures
    pub capture_scale: f32,
    /// Language tokens tried by auto-detection, in priority order
    pub candidate_languages: Vec<String>,
    /// Store key the source is persisted under
    pub store_key: String,
    /// Base URL of the remote creation service
    pub instance_url: String,
    /// Initial render settings
    pub settings: RenderSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            edit_debounce_ms: 350,
            style_debounce_ms: 250,
            settle_ms: 150,
            capture_scale: 2.0,
            candidate_languages: highlight::syntect_engine::DEFAULT_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            store_key: store::SOURCE_KEY.to_string(),
            instance_url: DEFAULT_INSTANCE_URL.to_string(),
            settings: RenderSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.capture_scale.is_finite() && self.capture_scale > 0.0) {
            return Err(Error::ConfigError(format!(
                "capture scale must be positive, got {}",
                self.capture_scale
            )));
        }
        if self.store_key.is_empty() {
            return Err(Error::ConfigError("store key must not be empty".into()));
        }
        self.settings.validate()
    }

    pub fn edit_debounce(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }

    pub fn style_debounce(&self) -> Duration {
        Duration::from_millis(self.style_debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
