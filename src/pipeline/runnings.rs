//! Running header and footer templates.
//!
//! Chrome renders these in a separate, unstyled context: no page CSS
//! applies and the default font size is tiny, so each template carries its
//! own `<style>`.

use super::escape_html;

const RUNNING_STYLE: &str = "width: 100%; height: 100%; margin: 0; padding: 0; \
font-size: 24px; color: rgba(0,0,0,0.1); display: flex; \
justify-content: center; align-items: center;";

pub fn header(watermark: &str) -> String {
    template("watermark-header", watermark)
}

pub fn footer(watermark: &str) -> String {
    template("watermark-footer", watermark)
}

fn template(class: &str, watermark: &str) -> String {
    format!(
        "<style>.{class} {{ {RUNNING_STYLE} }}</style><div class=\"{class}\">{}</div>",
        escape_html(watermark)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_carry_text_and_style() {
        let h = header("DRAFT");
        let f = footer("DRAFT");
        assert!(h.contains(">DRAFT</div>"));
        assert!(f.contains(">DRAFT</div>"));
        assert!(h.contains("font-size: 24px"));
        assert!(h.contains("rgba(0,0,0,0.1)"));
        assert_ne!(h, f);
    }
}
