//! Result types returned by a successful conversion.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Phase;
use crate::request::PaperSpec;

/// A written PDF and how it was produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutput {
    /// Absolute path of the PDF.
    pub path: PathBuf,
    pub paper: PaperSpec,
    pub watermark: Option<String>,
    pub stats: ConversionStats,
}

/// Sizes, counts and timings for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub markdown_bytes: u64,
    pub html_bytes: u64,
    pub pdf_bytes: u64,
    pub code_blocks: usize,
    pub highlighted_blocks: usize,
    pub diagram_blocks: usize,
    /// `pinned` or `discovered`.
    pub engine_strategy: String,
    pub transform_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Wall time of each completed stage, in pipeline order.
    pub stage_durations_ms: Vec<(Phase, u64)>,
}

impl ConversionOutput {
    /// Human-readable confirmation naming the absolute output path.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Starting PDF conversion (format: {}, orientation: {})",
                self.paper.format.as_str(),
                self.paper.orientation.as_str()
            ),
            format!("PDF file created successfully at: {}", self.path.display()),
        ];
        if let Some(mark) = &self.watermark {
            lines.push(format!("Watermark: {mark}"));
        }
        lines.push(format!(
            "{} bytes in {}ms",
            self.stats.pdf_bytes, self.stats.total_duration_ms
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{PaperFormat, PaperOrientation};

    fn output() -> ConversionOutput {
        ConversionOutput {
            path: PathBuf::from("/home/u/output.pdf"),
            paper: PaperSpec {
                format: PaperFormat::A4,
                orientation: PaperOrientation::Landscape,
                ..Default::default()
            },
            watermark: Some("DRAFT".into()),
            stats: ConversionStats {
                pdf_bytes: 2048,
                total_duration_ms: 7400,
                ..Default::default()
            },
        }
    }

    #[test]
    fn summary_names_path_and_paper() {
        let s = output().summary();
        assert!(s.contains("/home/u/output.pdf"));
        assert!(s.contains("format: a4, orientation: landscape"));
        assert!(s.contains("Watermark: DRAFT"));
    }

    #[test]
    fn serialises_camel_case() {
        let v = serde_json::to_value(output()).unwrap();
        assert_eq!(v["paper"]["format"], "a4");
        assert_eq!(v["paper"]["border"], "20mm");
        assert_eq!(v["stats"]["pdfBytes"], 2048);
        assert!(v["stats"]["stageDurationsMs"].as_array().unwrap().is_empty());
    }
}
