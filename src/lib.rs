//! # md2pdf
//!
//! Convert Markdown documents to paginated PDF through headless Chrome.
//!
//! ## Why a browser?
//!
//! Markdown users expect what they see in a browser preview: GitHub-style
//! tables, highlighted code, Mermaid diagrams. Reproducing that layout
//! engine natively is a non-starter, so this crate builds an HTML page and
//! lets Chrome paginate and print it, driving the browser through a small
//! state machine that detects every way that can go wrong.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Transform  comrak AST; syntect highlighting; mermaid placeholders
//!  ├─ 2. Assemble   @page geometry, watermark overlay, diagram runtime
//!  ├─ 3. Temp file  page shell in a scoped temp file (deleted on drop)
//!  ├─ 4. Resolve    output directory policy + collision suffixes
//!  ├─ 5. Render     launch → load → stabilize → export (spawn_blocking)
//!  └─ 6. Verify     the PDF exists where the engine said it would
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{convert, ConversionConfig, ConversionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = ConversionRequest::builder("# Title\n\nHello **world**")
//!         .paper_format("a4")
//!         .watermark("DRAFT")
//!         .build()?;
//!     let config = ConversionConfig::from_env().build()?;
//!     let output = convert(&request, &config).await?;
//!     println!("{}", output.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Chrome
//!
//! A pinned `chrome-headless-shell` build (see the `chrome-locate` crate) is
//! preferred; when it is missing, the installed Chrome is discovered and
//! launched with its sandbox disabled.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OUTPUT_DIR_ENV};
pub use convert::{convert, convert_sync, convert_with_cancel, preview_html};
pub use engine::{Engine, EngineError, EngineInstance, LaunchSettings, LaunchStrategy, PdfExportOptions};
pub use error::{ConversionError, Md2PdfError, Phase};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::markup::RenderedFragment;
pub use pipeline::render::CancelFlag;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{
    ConversionRequest, ConversionRequestBuilder, OutputRequest, PaperBorder, PaperFormat,
    PaperOrientation, PaperSpec, RawRequest, Watermark,
};
