use std::sync::Arc;

/// Output-escaping function applied to `<%= %>` expressions
pub type EscapeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Escape XML/HTML special characters
pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// The escaping function used when none is configured
pub fn default_escape() -> EscapeFn {
    Arc::new(escape_xml)
}
