//! Markdown → HTML fragment.
//!
//! The document is parsed into a comrak AST, fenced code blocks are rewritten
//! in place to pre-rendered HTML blocks, and the tree is then formatted.
//! Diagram blocks become placeholders that the page shell hands to the
//! diagram runtime in the browser; all other fenced blocks go through
//! [`super::highlight`].

use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use comrak::options::Options;
use comrak::{format_html, parse_document, Arena};
use tracing::debug;

use super::{escape_html, highlight};
use crate::error::Md2PdfError;

/// Fence tags whose content is rendered client-side.
const DIAGRAM_LANGUAGES: &[&str] = &["mermaid"];

/// HTML produced from one Markdown document, plus what the transform found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedFragment {
    pub html: String,
    pub diagram_blocks: usize,
    pub code_blocks: usize,
    /// Code blocks that received grammar highlighting rather than plain output.
    pub highlighted_blocks: usize,
}

impl RenderedFragment {
    pub fn has_diagrams(&self) -> bool {
        self.diagram_blocks > 0
    }
}

fn options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.table = true;
    ext.strikethrough = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.tagfilter = false;

    let render = &mut options.render;
    render.r#unsafe = true;
    render.hardbreaks = true;
    options
}

/// Convert Markdown source into an HTML fragment.
pub fn render(markdown: &str) -> Result<RenderedFragment, Md2PdfError> {
    let options = options();
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &options);

    let mut fragment = RenderedFragment::default();
    rewrite_code_blocks(root, &mut fragment);

    let mut html = String::new();
    format_html(root, &options, &mut html)
        .map_err(|e| Md2PdfError::Internal(format!("HTML formatting failed: {e}")))?;
    fragment.html = html;

    debug!(
        code_blocks = fragment.code_blocks,
        highlighted = fragment.highlighted_blocks,
        diagrams = fragment.diagram_blocks,
        "Markdown transformed"
    );
    Ok(fragment)
}

fn rewrite_code_blocks<'a>(node: &'a AstNode<'a>, fragment: &mut RenderedFragment) {
    if let Some((info, literal)) = fenced_code_block(node) {
        let language = info.split_whitespace().next();
        let html = if language.is_some_and(is_diagram_language) {
            fragment.diagram_blocks += 1;
            diagram_placeholder(&literal)
        } else {
            fragment.code_blocks += 1;
            let block = highlight::highlight_block(language, &literal);
            if block.is_highlighted() {
                fragment.highlighted_blocks += 1;
            }
            block.html
        };
        node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: html,
        });
        return;
    }

    let mut child = node.first_child();
    while let Some(next) = child {
        rewrite_code_blocks(next, fragment);
        child = next.next_sibling();
    }
}

fn fenced_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    match &data.value {
        NodeValue::CodeBlock(block) if block.fenced => {
            Some((block.info.trim().to_string(), block.literal.clone()))
        }
        _ => None,
    }
}

fn is_diagram_language(tag: &str) -> bool {
    DIAGRAM_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(tag))
}

/// The block content survives verbatim as the element's text.
fn diagram_placeholder(source: &str) -> String {
    format!("<div class=\"mermaid\">{}</div>\n", escape_html(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_emphasis() {
        let f = render("# Title\n\nHello **world**").unwrap();
        assert!(f.html.contains("<h1>Title</h1>"));
        assert!(f.html.contains("<strong>world</strong>"));
        assert_eq!(f.code_blocks, 0);
        assert!(!f.has_diagrams());
    }

    #[test]
    fn line_breaks_are_significant() {
        let f = render("first\nsecond").unwrap();
        assert!(f.html.contains("<br"));
    }

    #[test]
    fn tables_and_strikethrough() {
        let f = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~").unwrap();
        assert!(f.html.contains("<table>"));
        assert!(f.html.contains("<del>gone</del>"));
    }

    #[test]
    fn mermaid_block_becomes_verbatim_placeholder() {
        let f = render("```mermaid\ngraph TD\n  A-->B\n```\n").unwrap();
        assert_eq!(f.diagram_blocks, 1);
        assert_eq!(f.code_blocks, 0);
        assert!(f
            .html
            .contains("<div class=\"mermaid\">graph TD\n  A--&gt;B\n</div>"));
        assert!(!f.html.contains("<pre"));
    }

    #[test]
    fn tagged_code_is_highlighted() {
        let f = render("```rust\nlet x = 1;\n```\n").unwrap();
        assert_eq!(f.code_blocks, 1);
        assert_eq!(f.highlighted_blocks, 1);
        assert!(f.html.contains("hl-"));
    }

    #[test]
    fn undetectable_code_still_renders() {
        let f = render("```nonsense\nplain words only\n```\n").unwrap();
        assert_eq!(f.code_blocks, 1);
        assert_eq!(f.highlighted_blocks, 0);
        assert!(f.html.contains("plain words only"));
    }

    #[test]
    fn raw_html_and_remote_images_pass_through() {
        let f = render("<span class=\"x\">hi</span>\n\n![logo](https://example.com/a.png)").unwrap();
        assert!(f.html.contains("<span class=\"x\">hi</span>"));
        assert!(f.html.contains("src=\"https://example.com/a.png\""));
    }
}
