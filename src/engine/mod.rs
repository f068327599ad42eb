//! The rendering-engine seam.
//!
//! The driver in [`crate::pipeline::render`] talks to a headless browser
//! only through [`Engine`] and [`EngineInstance`]. The production
//! implementation is [`chrome::ChromeEngine`]; tests plug in an in-process
//! fake through [`crate::ConversionConfigBuilder::engine`].
//!
//! ## Why a blocking trait?
//!
//! `headless_chrome` exposes a synchronous API that parks the calling thread
//! while Chrome works. The driver therefore runs the whole engine session
//! inside `tokio::task::spawn_blocking`, and the trait mirrors that: every
//! method is a plain blocking call.

pub mod chrome;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::request::PaperSpec;

pub use chrome::ChromeEngine;

// ── Launch ───────────────────────────────────────────────────────────────

/// One way of starting an engine instance. Strategies are tried in order
/// and the first success wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// The version-pinned binary for this platform.
    Pinned(PathBuf),
    /// Whatever installation the host offers.
    Discovered,
}

impl LaunchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            LaunchStrategy::Pinned(_) => "pinned",
            LaunchStrategy::Discovered => "discovered",
        }
    }

    /// Extra command-line flags for this strategy. Sandbox-disabling flags
    /// apply to the discovered fallback only.
    pub fn extra_args(&self) -> &'static [&'static str] {
        match self {
            LaunchStrategy::Pinned(_) => &[],
            LaunchStrategy::Discovered => &["--no-sandbox", "--disable-setuid-sandbox"],
        }
    }
}

/// Ordered probe list: the pinned binary when one is known, then discovery.
pub fn launch_plan(pinned: Option<PathBuf>) -> Vec<LaunchStrategy> {
    let mut plan = Vec::with_capacity(2);
    if let Some(path) = pinned {
        plan.push(LaunchStrategy::Pinned(path));
    }
    plan.push(LaunchStrategy::Discovered);
    plan
}

/// Settings shared by every launch strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Window size in CSS pixels.
    pub viewport: (u32, u32),
    /// How long the engine may sit idle before it gives up on the session.
    pub idle_timeout: Duration,
    /// Bound on engine calls other than navigation (scripts, export).
    pub command_timeout: Duration,
}

// ── Export ───────────────────────────────────────────────────────────────

/// Arguments for the engine's PDF export call.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfExportOptions {
    /// Portrait paper width in inches; the engine swaps for landscape.
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub landscape: bool,
    /// Applied to all four sides.
    pub margin_in: f64,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
}

impl PdfExportOptions {
    pub fn for_paper(paper: &PaperSpec) -> Self {
        let (w, h) = paper.format.dimensions();
        Self {
            paper_width_in: w.to_inches(),
            paper_height_in: h.to_inches(),
            landscape: paper.orientation.is_landscape(),
            margin_in: paper.border.to_inches(),
            print_background: true,
            prefer_css_page_size: true,
            header_template: None,
            footer_template: None,
        }
    }

    pub fn with_running_templates(mut self, header: String, footer: String) -> Self {
        self.header_template = Some(header);
        self.footer_template = Some(footer);
        self
    }

    /// Header and footer are shown iff templates were supplied.
    pub fn display_header_footer(&self) -> bool {
        self.header_template.is_some() || self.footer_template.is_some()
    }
}

// ── Traits ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("{0}")]
    Failed(String),
}

/// Starts engine instances.
pub trait Engine: Send + Sync {
    fn launch(
        &self,
        strategy: &LaunchStrategy,
        settings: &LaunchSettings,
    ) -> Result<Box<dyn EngineInstance>, EngineError>;
}

/// One running engine instance with a single page.
///
/// `close` must tolerate being called on an instance that already failed.
pub trait EngineInstance: Send {
    /// Navigate to `url` and wait until the load settles, bounded by `timeout`.
    fn load(&mut self, url: &str, timeout: Duration) -> Result<(), EngineError>;

    /// Append a stylesheet to the loaded document.
    fn inject_stylesheet(&mut self, css: &str) -> Result<(), EngineError>;

    /// Force a style recalculation and layout.
    fn repaint(&mut self) -> Result<(), EngineError>;

    /// Text content of the first element matching `selector`, or `None`
    /// when nothing matches.
    fn query_text(&mut self, selector: &str) -> Result<Option<String>, EngineError>;

    fn print_pdf(&mut self, options: &PdfExportOptions) -> Result<Vec<u8>, EngineError>;

    fn close(&mut self);
}
