use super::attributes::BlockAttributes;
use super::registration::BLOCK_NAME;

/// CSS class the block editor assigns to the saved wrapper.
pub fn block_class_name() -> String {
    format!("wp-block-{}", BLOCK_NAME.replace('/', "-"))
}

/// Render the post content saved for a block.
pub fn render_saved_markup(attrs: &BlockAttributes) -> String {
    let mut html = format!("<p class=\"{}\">", block_class_name());
    if let Some(url) = attrs.audiogram_url.as_deref().filter(|u| !u.is_empty()) {
        html.push_str(&format!("<video src=\"{}\" controls></video>", escape_attr(url)));
    }
    html.push_str("</p>");
    html
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
