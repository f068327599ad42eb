//! Page shell assembly.
//!
//! Wraps a [`RenderedFragment`] in a complete HTML document carrying the
//! page geometry, the optional watermark overlay and, when the fragment has
//! diagram placeholders, the diagram runtime plus its error surface.
//!
//! The output is a pure function of the inputs: no timestamps, no ids.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::escape_html;
use super::markup::RenderedFragment;
use crate::error::Md2PdfError;
use crate::request::{PaperSpec, Watermark};

/// Element id of the in-page diagram error surface.
pub const DIAGRAM_ERROR_ID: &str = "md2pdf-diagram-error";
pub const DIAGRAM_ERROR_SELECTOR: &str = "#md2pdf-diagram-error";
/// Element id of the watermark overlay.
pub const WATERMARK_ID: &str = "md2pdf-watermark";
pub const WATERMARK_SELECTOR: &str = "#md2pdf-watermark";

/// Watermark font size as a fraction of page width.
const WATERMARK_SCALE: f64 = 0.14;

/// Build the page shell.
pub fn assemble(
    fragment: &RenderedFragment,
    paper: &PaperSpec,
    watermark: Option<&Watermark>,
    diagram_script_url: &str,
) -> String {
    let mut html = String::with_capacity(fragment.html.len() + 4096);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    if fragment.has_diagrams() {
        html.push_str(&format!(
            "<script src=\"{}\"></script>\n",
            escape_html(diagram_script_url)
        ));
    }
    html.push_str("<style>\n");
    html.push_str(&geometry_css(paper));
    if watermark.is_some() {
        html.push_str(&watermark_css(paper));
    }
    html.push_str("</style>\n</head>\n<body>\n");

    // Shell elements precede the content so selector lookups find them
    // before anything the document itself contains.
    if let Some(mark) = watermark {
        html.push_str(&format!(
            "<div id=\"{WATERMARK_ID}\">{}</div>\n",
            escape_html(mark.as_str())
        ));
    }
    if fragment.has_diagrams() {
        html.push_str(&format!(
            "<div id=\"{DIAGRAM_ERROR_ID}\" style=\"display: none; color: red;\"></div>\n"
        ));
    }
    html.push_str("<div class=\"content\">\n");
    html.push_str(&fragment.html);
    html.push_str("</div>\n");
    if fragment.has_diagrams() {
        html.push_str(DIAGRAM_SCRIPT);
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn geometry_css(paper: &PaperSpec) -> String {
    let (width, height) = paper.page_size();
    format!(
        "@page {{ size: {} {}; margin: {}; }}\n\
         html, body {{ margin: 0; padding: 0; }}\n\
         .content {{ position: relative; z-index: 1; }}\n",
        width.css(),
        height.css(),
        paper.border
    )
}

fn watermark_css(paper: &PaperSpec) -> String {
    let (width, _) = paper.page_size();
    format!(
        "#{WATERMARK_ID} {{ position: fixed; top: 0; left: 0; right: 0; bottom: 0; \
         display: flex; justify-content: center; align-items: center; \
         font-size: calc({} * {WATERMARK_SCALE}); color: rgba(0, 0, 0, 0.15); \
         font-family: Arial, sans-serif; white-space: nowrap; pointer-events: none; \
         z-index: 0; transform: rotate(-45deg); }}\n",
        width.css()
    )
}

/// Runs the diagram runtime once the DOM is ready and reports any failure,
/// including a runtime that never loaded, into the error surface.
const DIAGRAM_SCRIPT: &str = r#"<script>
document.addEventListener('DOMContentLoaded', function () {
  var surface = document.getElementById('md2pdf-diagram-error');
  function report(e) {
    if (!surface) { return; }
    surface.textContent = (e && e.message) ? e.message : String(e);
    surface.style.display = 'block';
  }
  if (typeof mermaid === 'undefined') {
    report('Mermaid runtime failed to load');
    return;
  }
  try {
    mermaid.initialize({ startOnLoad: false });
    Promise.resolve(mermaid.run({ nodes: document.querySelectorAll('.mermaid') }))
      .catch(report);
  } catch (e) {
    report(e);
  }
});
</script>
"#;

// ── Scoped temp file ─────────────────────────────────────────────────────

/// The assembled page on disk for the lifetime of one render.
///
/// The file lives in the system temp directory and is removed when this
/// value drops, on success and failure alike.
#[derive(Debug)]
pub struct AssembledDocument {
    file: NamedTempFile,
    len: usize,
}

impl AssembledDocument {
    pub fn write(html: &str) -> Result<Self, Md2PdfError> {
        let mut file = tempfile::Builder::new()
            .prefix("md2pdf-")
            .suffix(".html")
            .tempfile()
            .map_err(|source| Md2PdfError::TempFile { source })?;
        file.write_all(html.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| Md2PdfError::TempFile { source })?;
        Ok(Self {
            file,
            len: html.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::markup;
    use crate::request::{PaperBorder, PaperFormat, PaperOrientation};

    const CDN: &str = "https://cdn.example/mermaid.js";

    fn paper(format: PaperFormat, orientation: PaperOrientation) -> PaperSpec {
        PaperSpec {
            format,
            orientation,
            border: PaperBorder::default(),
        }
    }

    #[test]
    fn page_size_matches_every_format_and_orientation() {
        let fragment = markup::render("text").unwrap();
        for format in PaperFormat::ALL {
            for orientation in [PaperOrientation::Portrait, PaperOrientation::Landscape] {
                let spec = paper(format, orientation);
                let (w, h) = spec.page_size();
                let html = assemble(&fragment, &spec, None, CDN);
                let expected = format!("size: {} {};", w.css(), h.css());
                assert!(html.contains(&expected), "{format:?}/{orientation:?}");
            }
        }
    }

    #[test]
    fn letter_portrait_uses_inches_and_default_margin() {
        let fragment = markup::render("text").unwrap();
        let html = assemble(
            &fragment,
            &paper(PaperFormat::Letter, PaperOrientation::Portrait),
            None,
            CDN,
        );
        assert!(html.contains("size: 8.5in 11in;"));
        assert!(html.contains("margin: 20mm;"));
    }

    #[test]
    fn watermark_overlay_only_when_requested() {
        let fragment = markup::render("text").unwrap();
        let spec = paper(PaperFormat::A4, PaperOrientation::Portrait);
        let mark = Watermark::parse("DRAFT").unwrap();

        let with = assemble(&fragment, &spec, mark.as_ref(), CDN);
        assert!(with.contains("<div id=\"md2pdf-watermark\">DRAFT</div>"));
        assert!(with.contains("rotate(-45deg)"));
        assert!(with.contains("calc(210mm * 0.14)"));

        let without = assemble(&fragment, &spec, None, CDN);
        assert!(!without.contains(WATERMARK_ID));
    }

    #[test]
    fn shell_elements_come_before_document_content() {
        let fragment = markup::render("<div id=\"md2pdf-watermark\">SPOOF</div>\n\n```mermaid\nA-->B\n```").unwrap();
        let spec = paper(PaperFormat::Letter, PaperOrientation::Portrait);
        let mark = Watermark::parse("REAL").unwrap();
        let html = assemble(&fragment, &spec, mark.as_ref(), CDN);
        let content = html.find("<div class=\"content\">").unwrap();
        assert!(html.find("<div id=\"md2pdf-watermark\">REAL").unwrap() < content);
        assert!(html.find("id=\"md2pdf-diagram-error\"").unwrap() < content);
    }

    #[test]
    fn diagram_runtime_and_error_surface_only_with_diagrams() {
        let spec = paper(PaperFormat::Letter, PaperOrientation::Portrait);

        let plain = assemble(&markup::render("no diagrams").unwrap(), &spec, None, CDN);
        assert!(!plain.contains(CDN));
        assert!(!plain.contains(DIAGRAM_ERROR_ID));

        let diagram = markup::render("```mermaid\ngraph TD\nA-->B\n```").unwrap();
        let html = assemble(&diagram, &spec, None, CDN);
        assert!(html.contains(&format!("<script src=\"{CDN}\"></script>")));
        assert!(html.contains("id=\"md2pdf-diagram-error\" style=\"display: none"));
        assert!(DIAGRAM_SCRIPT.contains(DIAGRAM_ERROR_ID));
        assert!(html.contains(".catch(report)"));
    }

    #[test]
    fn output_is_deterministic() {
        let fragment = markup::render("# Same\n\n```python\nprint(1)\n```").unwrap();
        let spec = paper(PaperFormat::A5, PaperOrientation::Landscape);
        let mark = Watermark::parse("COPY").unwrap();
        assert_eq!(
            assemble(&fragment, &spec, mark.as_ref(), CDN),
            assemble(&fragment, &spec, mark.as_ref(), CDN)
        );
    }

    #[test]
    fn temp_document_is_removed_on_drop() {
        let doc = AssembledDocument::write("<html></html>").unwrap();
        let path = doc.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("html"));
        assert_eq!(doc.len(), 13);
        drop(doc);
        assert!(!path.exists());
    }
}
