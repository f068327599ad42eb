//! The conversion request: Markdown source plus output and paper options.
//!
//! A [`ConversionRequest`] can only be obtained through
//! [`ConversionRequestBuilder::build`] or [`ConversionRequest::from_json`],
//! both of which validate every field. Once built it is immutable, so the
//! pipeline never has to re-check a border string or a watermark.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Md2PdfError;

/// Default filename when the caller names no output.
pub const DEFAULT_OUTPUT_FILENAME: &str = "output.pdf";

/// Default uniform page margin.
pub const DEFAULT_BORDER: &str = "20mm";

/// Longest accepted watermark.
pub const MAX_WATERMARK_CHARS: usize = 15;

static BORDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)?)(cm|mm|in|px)$").expect("valid regex"));

static WATERMARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9\s-]+$").expect("valid regex"));

// ── Paper ────────────────────────────────────────────────────────────────

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    #[default]
    Letter,
    A4,
    A3,
    A5,
    Legal,
    Tabloid,
}

/// A physical length in the unit a paper standard is defined in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Inches(f64),
    Millimetres(f64),
}

impl Length {
    pub fn to_inches(self) -> f64 {
        match self {
            Length::Inches(v) => v,
            Length::Millimetres(v) => v / 25.4,
        }
    }

    /// CSS form, e.g. `8.5in` or `210mm`.
    pub fn css(self) -> String {
        match self {
            Length::Inches(v) => format!("{v}in"),
            Length::Millimetres(v) => format!("{v}mm"),
        }
    }
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 6] = [
        PaperFormat::Letter,
        PaperFormat::A4,
        PaperFormat::A3,
        PaperFormat::A5,
        PaperFormat::Legal,
        PaperFormat::Tabloid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperFormat::Letter => "letter",
            PaperFormat::A4 => "a4",
            PaperFormat::A3 => "a3",
            PaperFormat::A5 => "a5",
            PaperFormat::Legal => "legal",
            PaperFormat::Tabloid => "tabloid",
        }
    }

    /// Portrait `(width, height)`.
    pub fn dimensions(&self) -> (Length, Length) {
        match self {
            PaperFormat::Letter => (Length::Inches(8.5), Length::Inches(11.0)),
            PaperFormat::Legal => (Length::Inches(8.5), Length::Inches(14.0)),
            PaperFormat::Tabloid => (Length::Inches(11.0), Length::Inches(17.0)),
            PaperFormat::A3 => (Length::Millimetres(297.0), Length::Millimetres(420.0)),
            PaperFormat::A4 => (Length::Millimetres(210.0), Length::Millimetres(297.0)),
            PaperFormat::A5 => (Length::Millimetres(148.0), Length::Millimetres(210.0)),
        }
    }
}

impl std::str::FromStr for PaperFormat {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaperFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Md2PdfError::Validation {
                field: "paperFormat",
                reason: format!("'{s}' is not one of letter, a4, a3, a5, legal, tabloid"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperOrientation {
    #[default]
    Portrait,
    Landscape,
}

impl PaperOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperOrientation::Portrait => "portrait",
            PaperOrientation::Landscape => "landscape",
        }
    }

    pub fn is_landscape(&self) -> bool {
        matches!(self, PaperOrientation::Landscape)
    }
}

impl std::str::FromStr for PaperOrientation {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(PaperOrientation::Portrait),
            "landscape" => Ok(PaperOrientation::Landscape),
            other => Err(Md2PdfError::Validation {
                field: "paperOrientation",
                reason: format!("'{other}' is not one of portrait, landscape"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderUnit {
    Cm,
    Mm,
    In,
    Px,
}

/// A validated CSS margin such as `20mm` or `0.75in`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "String")]
pub struct PaperBorder {
    raw: String,
    value: f64,
    unit: BorderUnit,
}

impl PaperBorder {
    pub fn parse(raw: &str) -> Result<Self, Md2PdfError> {
        let caps = BORDER_RE
            .captures(raw)
            .ok_or_else(|| Md2PdfError::Validation {
                field: "paperBorder",
                reason: format!("'{raw}' must look like 20mm, 2cm, 0.5in or 40px"),
            })?;
        let value: f64 = caps[1].parse().map_err(|_| Md2PdfError::Validation {
            field: "paperBorder",
            reason: format!("'{raw}' has an unreadable number"),
        })?;
        let unit = match &caps[2] {
            "cm" => BorderUnit::Cm,
            "mm" => BorderUnit::Mm,
            "in" => BorderUnit::In,
            _ => BorderUnit::Px,
        };
        Ok(Self {
            raw: raw.to_string(),
            value,
            unit,
        })
    }

    /// The border exactly as given, usable as a CSS length.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn to_inches(&self) -> f64 {
        match self.unit {
            BorderUnit::Cm => self.value / 2.54,
            BorderUnit::Mm => self.value / 25.4,
            BorderUnit::In => self.value,
            BorderUnit::Px => self.value / 96.0,
        }
    }
}

impl Default for PaperBorder {
    fn default() -> Self {
        Self {
            raw: DEFAULT_BORDER.to_string(),
            value: 20.0,
            unit: BorderUnit::Mm,
        }
    }
}

impl From<PaperBorder> for String {
    fn from(b: PaperBorder) -> Self {
        b.raw
    }
}

impl fmt::Display for PaperBorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Format, orientation and border: copied into both the page CSS and the
/// engine's export call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PaperSpec {
    pub format: PaperFormat,
    pub orientation: PaperOrientation,
    pub border: PaperBorder,
}

impl PaperSpec {
    /// Oriented `(width, height)`.
    pub fn page_size(&self) -> (Length, Length) {
        let (w, h) = self.format.dimensions();
        if self.orientation.is_landscape() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

// ── Watermark ────────────────────────────────────────────────────────────

/// Uppercase overlay text, at most 15 characters of `A-Z`, digits,
/// whitespace and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Watermark(String);

impl Watermark {
    /// Validate `text`. An empty string means "no watermark" and yields `None`.
    pub fn parse(text: &str) -> Result<Option<Self>, Md2PdfError> {
        if text.is_empty() {
            return Ok(None);
        }
        let chars = text.chars().count();
        if chars > MAX_WATERMARK_CHARS {
            return Err(Md2PdfError::Validation {
                field: "watermark",
                reason: format!("{chars} characters exceeds the {MAX_WATERMARK_CHARS} maximum"),
            });
        }
        if !WATERMARK_RE.is_match(text) {
            return Err(Md2PdfError::Validation {
                field: "watermark",
                reason: format!("'{text}' may only contain A-Z, 0-9, whitespace and '-'"),
            });
        }
        Ok(Some(Self(text.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Watermark> for String {
    fn from(w: Watermark) -> Self {
        w.0
    }
}

// ── Request ──────────────────────────────────────────────────────────────

/// Where the caller asked the PDF to go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutputRequest {
    /// A bare filename; the directory comes from policy.
    Filename(String),
    /// A path whose parent directory is the caller's choice.
    Path(String),
}

impl OutputRequest {
    pub fn as_str(&self) -> &str {
        match self {
            OutputRequest::Filename(s) | OutputRequest::Path(s) => s,
        }
    }
}

/// One validated conversion request.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionRequest {
    markdown: String,
    output: Option<OutputRequest>,
    paper: PaperSpec,
    watermark: Option<Watermark>,
}

impl ConversionRequest {
    pub fn builder(markdown: impl Into<String>) -> ConversionRequestBuilder {
        ConversionRequestBuilder {
            markdown: markdown.into(),
            output: None,
            format: None,
            orientation: None,
            border: None,
            watermark: None,
        }
    }

    /// Parse and validate the camelCase JSON request schema.
    pub fn from_json(json: &str) -> Result<Self, Md2PdfError> {
        let raw: RawRequest =
            serde_json::from_str(json).map_err(|e| Md2PdfError::MalformedRequest(e.to_string()))?;
        raw.try_into()
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn output(&self) -> Option<&OutputRequest> {
        self.output.as_ref()
    }

    pub fn paper(&self) -> &PaperSpec {
        &self.paper
    }

    pub fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }
}

/// Builder for [`ConversionRequest`]. Values are checked in [`build`](Self::build).
#[derive(Debug)]
pub struct ConversionRequestBuilder {
    markdown: String,
    output: Option<OutputRequest>,
    format: Option<String>,
    orientation: Option<String>,
    border: Option<String>,
    watermark: Option<String>,
}

impl ConversionRequestBuilder {
    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.output = Some(OutputRequest::Filename(name.into()));
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output = Some(OutputRequest::Path(path.into()));
        self
    }

    pub fn paper_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn paper_orientation(mut self, orientation: impl Into<String>) -> Self {
        self.orientation = Some(orientation.into());
        self
    }

    pub fn paper_border(mut self, border: impl Into<String>) -> Self {
        self.border = Some(border.into());
        self
    }

    pub fn watermark(mut self, text: impl Into<String>) -> Self {
        self.watermark = Some(text.into());
        self
    }

    /// Validate every field and produce the immutable request.
    pub fn build(self) -> Result<ConversionRequest, Md2PdfError> {
        if let Some(out) = &self.output {
            if out.as_str().trim().is_empty() {
                return Err(Md2PdfError::Validation {
                    field: "outputFilename",
                    reason: "must not be empty".into(),
                });
            }
        }

        let format = match self.format.as_deref() {
            Some(f) => f.parse()?,
            None => PaperFormat::default(),
        };
        let orientation = match self.orientation.as_deref() {
            Some(o) => o.parse()?,
            None => PaperOrientation::default(),
        };
        let border = match self.border.as_deref() {
            Some(b) => PaperBorder::parse(b)?,
            None => PaperBorder::default(),
        };
        let watermark = match self.watermark.as_deref() {
            Some(w) => Watermark::parse(w)?,
            None => None,
        };

        Ok(ConversionRequest {
            markdown: self.markdown,
            output: self.output,
            paper: PaperSpec {
                format,
                orientation,
                border,
            },
            watermark,
        })
    }
}

/// Wire form of a request, as received from a transport.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRequest {
    pub markdown: Option<String>,
    pub output_filename: Option<String>,
    pub output_path: Option<String>,
    pub paper_format: Option<String>,
    pub paper_orientation: Option<String>,
    pub paper_border: Option<String>,
    pub watermark: Option<String>,
}

impl TryFrom<RawRequest> for ConversionRequest {
    type Error = Md2PdfError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let markdown = raw.markdown.ok_or(Md2PdfError::Validation {
            field: "markdown",
            reason: "is required".into(),
        })?;

        let mut builder = ConversionRequest::builder(markdown);
        if let Some(path) = raw.output_path {
            builder = builder.output_path(path);
        } else if let Some(name) = raw.output_filename {
            builder = builder.output_filename(name);
        }
        if let Some(f) = raw.paper_format {
            builder = builder.paper_format(f);
        }
        if let Some(o) = raw.paper_orientation {
            builder = builder.paper_orientation(o);
        }
        if let Some(b) = raw.paper_border {
            builder = builder.paper_border(b);
        }
        if let Some(w) = raw.watermark {
            builder = builder.watermark(w);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_letter_portrait_20mm_no_watermark() {
        let req = ConversionRequest::builder("# Title").build().unwrap();
        assert_eq!(req.paper().format, PaperFormat::Letter);
        assert_eq!(req.paper().orientation, PaperOrientation::Portrait);
        assert_eq!(req.paper().border.as_str(), "20mm");
        assert!(req.watermark().is_none());
        assert!(req.output().is_none());
    }

    #[test]
    fn border_units_convert_to_inches() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(close(PaperBorder::parse("25.4mm").unwrap().to_inches(), 1.0));
        assert!(close(PaperBorder::parse("2.54cm").unwrap().to_inches(), 1.0));
        assert!(close(PaperBorder::parse("0.5in").unwrap().to_inches(), 0.5));
        assert!(close(PaperBorder::parse("96px").unwrap().to_inches(), 1.0));
    }

    #[test]
    fn malformed_borders_are_rejected() {
        for bad in ["20", "mm", "20 mm", "-2cm", "2.cm", "2pt", "1.5CM"] {
            assert!(PaperBorder::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn watermark_length_boundary() {
        assert!(Watermark::parse("FIFTEEN CHARS 1").unwrap().is_some());
        let err = Watermark::parse("SIXTEEN CHARS 12").unwrap_err();
        assert!(err.to_string().contains("watermark"));
    }

    #[test]
    fn watermark_rejects_lowercase_and_punctuation() {
        assert!(Watermark::parse("Draft").is_err());
        assert!(Watermark::parse("DRAFT!").is_err());
        assert!(Watermark::parse("FOR REVIEW").unwrap().is_some());
        assert!(Watermark::parse("V-2").unwrap().is_some());
    }

    #[test]
    fn empty_watermark_means_none() {
        let req = ConversionRequest::builder("x").watermark("").build().unwrap();
        assert!(req.watermark().is_none());
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let spec = PaperSpec {
            format: PaperFormat::A4,
            orientation: PaperOrientation::Landscape,
            border: PaperBorder::default(),
        };
        let (w, h) = spec.page_size();
        assert_eq!(w, Length::Millimetres(297.0));
        assert_eq!(h, Length::Millimetres(210.0));
    }

    #[test]
    fn json_request_uses_schema_names() {
        let req = ConversionRequest::from_json(
            r##"{"markdown":"# Hi","outputFilename":"report","paperFormat":"a3",
                "paperOrientation":"landscape","paperBorder":"1in","watermark":"DRAFT"}"##,
        )
        .unwrap();
        assert_eq!(req.paper().format, PaperFormat::A3);
        assert!(req.paper().orientation.is_landscape());
        assert_eq!(req.watermark().unwrap().as_str(), "DRAFT");
        assert_eq!(
            req.output(),
            Some(&OutputRequest::Filename("report".into()))
        );
    }

    #[test]
    fn json_request_requires_markdown() {
        let err = ConversionRequest::from_json(r#"{"paperFormat":"a4"}"#).unwrap_err();
        assert!(matches!(
            err,
            Md2PdfError::Validation {
                field: "markdown",
                ..
            }
        ));
    }

    #[test]
    fn output_path_wins_over_filename() {
        let req = ConversionRequest::from_json(
            r#"{"markdown":"x","outputFilename":"a.pdf","outputPath":"/tmp/b.pdf"}"#,
        )
        .unwrap();
        assert_eq!(req.output(), Some(&OutputRequest::Path("/tmp/b.pdf".into())));
    }

    #[test]
    fn unknown_format_is_a_validation_error() {
        let err = ConversionRequest::builder("x")
            .paper_format("b5")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("paperFormat"));
    }
}
