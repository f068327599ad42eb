//! Error types for the md2pdf library.
//!
//! Two layers reflect two audiences:
//!
//! * [`Md2PdfError`] — **What** went wrong. One variant per failure category
//!   (validation, filesystem, engine launch, load timeout, in-content
//!   rendering, export, post-condition). Pipeline stages return it.
//!
//! * [`ConversionError`] — **Where** it went wrong. The orchestrator wraps
//!   every stage failure with the failing [`Phase`], the attempted output
//!   path and the paper options, so callers get one structured error with
//!   enough context to report without re-deriving anything.
//!
//! Syntax-highlighting problems never reach either type: highlighting is
//! best-effort and degrades to plain code blocks.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::request::PaperSpec;

/// All failure categories produced by the md2pdf pipeline.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Request errors ────────────────────────────────────────────────────
    /// A request field is missing or malformed.
    #[error("Invalid request field '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    /// The request body could not be parsed at all.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Directory creation or file write failed.
    #[error("Filesystem error at '{path}': {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scoped temporary HTML file could not be created or written.
    #[error("Failed to create temporary HTML file: {source}")]
    TempFile {
        #[source]
        source: std::io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Every launch strategy failed.
    #[error(
        "No usable Chrome found on {os}/{arch}.\n{}\n\n\
Install the pinned build or set MD2PDF_CHROME_PATH=/path/to/chrome.",
        .attempts.join("\n")
    )]
    EngineLaunch {
        os: &'static str,
        arch: &'static str,
        attempts: Vec<String>,
    },

    /// Navigation did not settle within the load timeout.
    #[error("Timed out after {elapsed_ms}ms during {phase}")]
    LoadTimeout { phase: &'static str, elapsed_ms: u64 },

    /// Navigation or post-load page setup failed.
    #[error("Page load failed during {phase}: {detail}")]
    Load { phase: &'static str, detail: String },

    /// The page's diagram error surface was populated after the settle delay.
    #[error("Mermaid diagram rendering failed: {message}")]
    DiagramRendering { message: String },

    /// The engine's PDF generation call failed.
    #[error("PDF export failed: {detail}")]
    Export { detail: String },

    // ── Post-conditions ───────────────────────────────────────────────────
    /// The engine reported success but nothing exists at the destination.
    #[error("PDF file was not created at '{path}'")]
    OutputMissing { path: PathBuf },

    /// The caller asked the conversion to stop.
    #[error("Conversion cancelled during {phase}")]
    Cancelled { phase: &'static str },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Pipeline stage a conversion was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validation,
    Transform,
    Assemble,
    TempFile,
    ResolveOutput,
    Launch,
    Load,
    Stabilize,
    Export,
    Verify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Validation => "validation",
            Phase::Transform => "transform",
            Phase::Assemble => "assemble",
            Phase::TempFile => "temp_file",
            Phase::ResolveOutput => "resolve_output",
            Phase::Launch => "launch",
            Phase::Load => "load",
            Phase::Stabilize => "stabilize",
            Phase::Export => "export",
            Phase::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single structured error returned by [`crate::convert::convert`].
#[derive(Debug, Error)]
#[error("PDF generation failed during {phase}: {kind}")]
pub struct ConversionError {
    pub phase: Phase,
    /// Resolved destination, when resolution got that far.
    pub output_path: Option<PathBuf>,
    pub paper: Option<PaperSpec>,
    #[source]
    pub kind: Md2PdfError,
}

impl ConversionError {
    pub(crate) fn new(phase: Phase, kind: Md2PdfError) -> Self {
        Self {
            phase,
            output_path: None,
            paper: None,
            kind,
        }
    }

    pub(crate) fn with_context(mut self, output_path: Option<PathBuf>, paper: &PaperSpec) -> Self {
        self.output_path = output_path;
        self.paper = Some(paper.clone());
        self
    }

    /// Contextual details for an error response payload.
    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.to_string(),
            "phase": self.phase,
            "outputPath": self.output_path.as_ref().map(|p| p.display().to_string()),
            "paperFormat": self.paper.as_ref().map(|p| p.format.as_str()),
            "paperOrientation": self.paper.as_ref().map(|p| p.orientation.as_str()),
            "paperBorder": self.paper.as_ref().map(|p| p.border.as_str().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{PaperBorder, PaperFormat, PaperOrientation};

    #[test]
    fn diagram_error_names_diagram_and_message() {
        let e = Md2PdfError::DiagramRendering {
            message: "Parse error on line 2".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("diagram"), "got: {msg}");
        assert!(msg.contains("Parse error on line 2"));
    }

    #[test]
    fn launch_error_lists_attempts() {
        let e = Md2PdfError::EngineLaunch {
            os: "linux",
            arch: "x86_64",
            attempts: vec!["pinned: not installed".into(), "discovered: no chrome".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("linux/x86_64"));
        assert!(msg.contains("pinned: not installed"));
        assert!(msg.contains("discovered: no chrome"));
    }

    #[test]
    fn load_timeout_names_phase() {
        let e = Md2PdfError::LoadTimeout {
            phase: "navigation",
            elapsed_ms: 60000,
        };
        assert!(e.to_string().contains("navigation"));
        assert!(e.to_string().contains("60000ms"));
    }

    #[test]
    fn details_carry_phase_path_and_paper() {
        let paper = PaperSpec {
            format: PaperFormat::A4,
            orientation: PaperOrientation::Landscape,
            border: PaperBorder::parse("1.5cm").unwrap(),
        };
        let err = ConversionError::new(
            Phase::Export,
            Md2PdfError::Export {
                detail: "printToPDF failed".into(),
            },
        )
        .with_context(Some(PathBuf::from("/out/doc.pdf")), &paper);

        let details = err.details();
        assert_eq!(details["phase"], "export");
        assert_eq!(details["outputPath"], "/out/doc.pdf");
        assert_eq!(details["paperFormat"], "a4");
        assert_eq!(details["paperOrientation"], "landscape");
        assert_eq!(details["paperBorder"], "1.5cm");
        assert!(details["message"]
            .as_str()
            .unwrap()
            .contains("printToPDF failed"));
    }
}
