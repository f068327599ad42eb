//! Best-effort syntax highlighting with syntect.
//!
//! ## Why class-based output?
//!
//! Highlighted spans carry `hl-*` classes rather than inline colours. The
//! colours arrive separately, as the theme stylesheet the driver injects
//! after load, so a theme change never alters the transformed HTML.
//!
//! Nothing in here fails a conversion. A grammar that cannot be found or a
//! parser that errors mid-block degrades to plain escaped code.

use once_cell::sync::Lazy;
use regex::Regex;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

use super::escape_html;

pub const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Content patterns tried, in order, when neither the fence tag nor the
/// first line identifies a grammar. Each maps to a syntect token.
static HEURISTICS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?m)^\s*(pub\s+)?(fn|impl|struct|enum|mod|use)\s+\w+", "rs"),
        (r"(?m)^\s*(def|class)\s+\w+.*:\s*$|^\s*from\s+\S+\s+import\s", "py"),
        (r"(?m)^\s*package\s+\w+\s*$|^\s*func\s+(\(\w+ \*?\w+\)\s*)?\w+\(", "go"),
        (r"(?m)^\s*(public|private|protected)\s+(static\s+)?(class|void|int|String)\b", "java"),
        (r"(?m)^\s*#include\s*[<\x22]", "c"),
        (r"(?mi)^\s*(select|insert\s+into|update|delete\s+from|create\s+table)\b", "sql"),
        (r"(?m)^\s*(const|let|var|function|import|export)\s", "js"),
        (r"(?m)^\s*<(!doctype|html|div|p|span|head|body)\b", "html"),
        (r"^\s*[\{\[]\s*(\x22|\]|\}|$)", "json"),
        (r"(?m)^\s*(\$\s|sudo\s|echo\s|export\s+\w+=|cd\s)", "sh"),
        (r"(?m)^\s*[.#]?[\w-]+(\s*[>+~]?\s*[.#]?[\w-]+)*\s*\{\s*$", "css"),
        (r"(?m)^[\w-]+:\s+\S|^---\s*$", "yaml"),
    ]
    .into_iter()
    .filter_map(|(pattern, token)| Regex::new(pattern).ok().map(|re| (re, token)))
    .collect()
});

/// How a code block ended up being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedBlock {
    pub html: String,
    /// Grammar name used, or `None` when the block was emitted plain.
    pub language: Option<String>,
}

impl HighlightedBlock {
    pub fn is_highlighted(&self) -> bool {
        self.language.is_some()
    }
}

/// Render one fenced code block: explicit language, then detection, then plain.
pub fn highlight_block(language: Option<&str>, code: &str) -> HighlightedBlock {
    let syntax_set = &*SYNTAX_SET;

    let explicit = language.filter(|l| !l.is_empty()).and_then(|lang| {
        let found = find_syntax(syntax_set, lang);
        if found.is_none() {
            warn!("Unknown code language '{lang}', trying detection");
        }
        found
    });

    let syntax = explicit.or_else(|| detect_syntax(syntax_set, code));

    if let Some(syntax) = syntax {
        match render_classed(syntax, syntax_set, code) {
            Ok(body) => {
                return HighlightedBlock {
                    html: wrap(Some(&syntax.name), &body),
                    language: Some(syntax.name.clone()),
                }
            }
            Err(e) => debug!("Highlighting as {} failed, emitting plain: {e}", syntax.name),
        }
    }

    HighlightedBlock {
        html: wrap(None, &escape_html(code)),
        language: None,
    }
}

/// Best guess for an untagged or unknown-tag block.
pub fn detect_syntax<'a>(syntax_set: &'a SyntaxSet, code: &str) -> Option<&'a SyntaxReference> {
    if let Some(syntax) = syntax_set.find_syntax_by_first_line(code) {
        return Some(syntax);
    }
    HEURISTICS
        .iter()
        .find(|(re, _)| re.is_match(code))
        .and_then(|(_, token)| syntax_set.find_syntax_by_token(token))
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
        .filter(|s| s.name != "Plain Text")
}

fn render_classed(
    syntax: &SyntaxReference,
    syntax_set: &SyntaxSet,
    code: &str,
) -> Result<String, syntect::Error> {
    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, CLASS_STYLE);
    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

fn wrap(language: Option<&str>, body: &str) -> String {
    match language {
        Some(name) => {
            let slug = name.to_ascii_lowercase().replace(|c: char| !c.is_ascii_alphanumeric(), "-");
            format!(
                "<pre class=\"hl-code\" data-language=\"{}\"><code class=\"language-{slug}\">{body}</code></pre>\n",
                escape_html(name)
            )
        }
        None => format!("<pre class=\"hl-code hl-plain\"><code>{body}</code></pre>\n"),
    }
}

// ── Themes ───────────────────────────────────────────────────────────────

pub fn theme_exists(name: &str) -> bool {
    THEME_SET.themes.contains_key(name)
}

/// Stylesheet for the `hl-*` classes in the given theme.
///
/// Returns `None` for an unknown theme; highlighting stays legible
/// without colours.
pub fn theme_css(name: &str) -> Option<String> {
    let theme = THEME_SET.themes.get(name)?;
    match css_for_theme_with_class_style(theme, CLASS_STYLE) {
        Ok(css) => Some(css),
        Err(e) => {
            warn!("Could not build CSS for theme '{name}': {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_language_is_highlighted() {
        let block = highlight_block(Some("rust"), "fn main() {}\n");
        assert_eq!(block.language.as_deref(), Some("Rust"));
        assert!(block.html.contains("hl-"));
        assert!(block.html.contains("data-language=\"Rust\""));
    }

    #[test]
    fn unknown_language_falls_back_to_detection() {
        let block = highlight_block(Some("not-a-language"), "def greet(name):\n    return name\n");
        assert_eq!(block.language.as_deref(), Some("Python"));
    }

    #[test]
    fn shebang_selects_grammar() {
        let block = highlight_block(None, "#!/bin/bash\necho hi\n");
        assert!(block.is_highlighted());
    }

    #[test]
    fn undetectable_block_is_plain_and_escaped() {
        let block = highlight_block(Some("zzz"), "just <some> words & things");
        assert!(!block.is_highlighted());
        assert!(block.html.contains("hl-plain"));
        assert!(block.html.contains("just &lt;some&gt; words &amp; things"));
    }

    #[test]
    fn default_theme_has_css() {
        assert!(theme_exists("InspiredGitHub"));
        let css = theme_css("InspiredGitHub").unwrap();
        assert!(css.contains(".hl-"));
        assert!(theme_css("missing").is_none());
    }
}
