//! Configuration types for Markdown-to-PDF conversion.
//!
//! Per-document choices (paper, watermark, output name) live on
//! [`crate::request::ConversionRequest`]. Everything about *how* a document
//! is rendered lives here, in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. One config can serve any number of requests.
//!
//! # Design choice: builder over constructor
//! Most callers only touch one or two knobs (an output directory, a longer
//! settle delay). The builder lets them set those and rely on documented
//! defaults for the rest, and gives one place to validate the combination.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::Md2PdfError;
use crate::pipeline::highlight;
use crate::progress::ProgressCallback;

/// Environment variable selecting the output directory.
pub const OUTPUT_DIR_ENV: &str = "M2P_OUTPUT_DIR";

/// Mermaid runtime loaded by pages that contain diagrams.
pub const DEFAULT_DIAGRAM_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";

pub const DEFAULT_HIGHLIGHT_THEME: &str = "InspiredGitHub";

const MAX_RENDER_DELAY: Duration = Duration::from_secs(120);

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`], [`ConversionConfig::from_env()`]
/// or using [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf::ConversionConfig;
/// use std::time::Duration;
///
/// let config = ConversionConfig::builder()
///     .render_delay(Duration::from_secs(2))
///     .output_dir("/tmp/pdfs")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Settle delay between page load and export. Default: 7 s.
    ///
    /// Mermaid renders asynchronously after `load` fires; the delay gives it
    /// and the final layout pass time to finish. Documents without diagrams
    /// can use a much shorter delay. Capped at 120 s.
    pub render_delay: Duration,

    /// Upper bound on navigation to the assembled page. Default: 60 s.
    ///
    /// The page pulls the diagram runtime from a CDN and may reference remote
    /// images, so a slow network is the usual reason this fires.
    pub load_timeout: Duration,

    /// Browser window size in CSS pixels. Default: 1200×1600.
    pub viewport: (u32, u32),

    /// Output directory that beats any caller-supplied path. Default: none,
    /// or the value of `M2P_OUTPUT_DIR` via [`ConversionConfig::from_env`].
    pub output_dir_override: Option<PathBuf>,

    /// Fallback output directory. Default: the user's home directory.
    pub home_dir: Option<PathBuf>,

    /// Explicit pinned Chrome binary. When `None`, the pinned build located
    /// by `chrome-locate` is used if installed.
    pub chrome_path: Option<PathBuf>,

    /// Script URL for the diagram runtime.
    pub diagram_script_url: String,

    /// syntect theme the highlight stylesheet is generated from.
    pub highlight_theme: String,

    /// Extra CSS file injected after load, after the built-in stylesheet.
    pub stylesheet: Option<PathBuf>,

    /// Pre-constructed engine. Takes precedence over launching Chrome.
    pub engine: Option<Arc<dyn Engine>>,

    /// Optional callback for per-stage progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            render_delay: Duration::from_millis(7000),
            load_timeout: Duration::from_secs(60),
            viewport: (1200, 1600),
            output_dir_override: None,
            home_dir: dirs::home_dir(),
            chrome_path: None,
            diagram_script_url: DEFAULT_DIAGRAM_SCRIPT_URL.to_string(),
            highlight_theme: DEFAULT_HIGHLIGHT_THEME.to_string(),
            stylesheet: None,
            engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("render_delay", &self.render_delay)
            .field("load_timeout", &self.load_timeout)
            .field("viewport", &self.viewport)
            .field("output_dir_override", &self.output_dir_override)
            .field("home_dir", &self.home_dir)
            .field("chrome_path", &self.chrome_path)
            .field("diagram_script_url", &self.diagram_script_url)
            .field("highlight_theme", &self.highlight_theme)
            .field("stylesheet", &self.stylesheet)
            .field("engine", &self.engine.as_ref().map(|_| "<dyn Engine>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Builder pre-populated from the environment (`M2P_OUTPUT_DIR`).
    pub fn from_env() -> ConversionConfigBuilder {
        let builder = Self::builder();
        match std::env::var(OUTPUT_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => builder.output_dir(dir),
            _ => builder,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn render_delay(mut self, delay: Duration) -> Self {
        self.config.render_delay = delay;
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport = (width, height);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir_override = Some(dir.into());
        self
    }

    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.home_dir = Some(dir.into());
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn diagram_script_url(mut self, url: impl Into<String>) -> Self {
        self.config.diagram_script_url = url.into();
        self
    }

    pub fn highlight_theme(mut self, theme: impl Into<String>) -> Self {
        self.config.highlight_theme = theme.into();
        self
    }

    pub fn stylesheet(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stylesheet = Some(path.into());
        self
    }

    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.render_delay > MAX_RENDER_DELAY {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Render delay must be at most 120s, got {}ms",
                c.render_delay.as_millis()
            )));
        }
        if c.load_timeout < Duration::from_secs(1) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Load timeout must be at least 1s, got {}ms",
                c.load_timeout.as_millis()
            )));
        }
        if c.viewport.0 < 100 || c.viewport.1 < 100 {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Viewport must be at least 100×100, got {}×{}",
                c.viewport.0, c.viewport.1
            )));
        }
        if !highlight::theme_exists(&c.highlight_theme) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Unknown highlight theme '{}'",
                c.highlight_theme
            )));
        }
        if c.diagram_script_url.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "Diagram script URL must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
