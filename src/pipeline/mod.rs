//! Internal pipeline stages.
//!
//! Each sub-module implements exactly one stage of the conversion pipeline:
//!
//! | Module        | Stage                                                  |
//! |---------------|--------------------------------------------------------|
//! | `markup`      | Markdown → HTML fragment (comrak AST rewrite)           |
//! | `highlight`   | syntect highlighting, language detection, theme CSS    |
//! | `assemble`    | Fragment → page shell (geometry, watermark, diagrams)  |
//! | `runnings`    | Running header/footer templates for the export call    |
//! | `output_path` | Destination directory policy and collision suffixes    |
//! | `render`      | Engine driver state machine (spawn_blocking)           |
//!
//! Stages are plain functions; [`crate::convert`] sequences them.

pub mod assemble;
pub mod highlight;
pub mod markup;
pub mod output_path;
pub mod render;
pub mod runnings;

/// Escape text for use in HTML element content or a double-quoted attribute.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_html;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"a < b && "c" > d"#),
            "a &lt; b &amp;&amp; &quot;c&quot; &gt; d"
        );
        assert_eq!(escape_html("plain"), "plain");
    }
}
