//! Line-contextualized runtime errors

use crate::error::Error;
use std::path::Path;

/// Lines shown on each side of the failing line
const CONTEXT_LINES: usize = 3;

/// Source excerpt around `line` (1-based), the failing line marked with `>>`
pub fn context_window(source: &str, line: usize) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let first = line.saturating_sub(CONTEXT_LINES).max(1);
    let last = (line + CONTEXT_LINES).min(lines.len());

    let mut window = String::new();
    for number in first..=last {
        let marker = if number == line { " >> " } else { "    " };
        let text = lines.get(number - 1).copied().unwrap_or_default();
        window.push_str(&format!("{}{}| {}\n", marker, number, text));
    }
    window
}

/// Rewrite a runtime failure with a `path:line` header and the surrounding
/// template lines
pub fn rethrow(error: Error, source: &str, path: Option<&Path>, line: usize) -> Error {
    let header = match path {
        Some(path) => format!("{}:{}", path.display(), line),
        None => format!("pjs:{}", line),
    };
    let message = format!(
        "{}\n{}\n{}",
        header,
        context_window(source, line),
        error
    );

    Error::Render {
        message,
        path: path.map(Path::to_path_buf),
        line,
        source: Box::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_LINES: &str = "l1\nl2\nl3\nl4\nl5\nl6\nl7\nl8\nl9\nl10";

    #[test]
    fn test_window_around_middle_line() {
        let window = context_window(TEN_LINES, 5);
        let lines: Vec<&str> = window.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "    2| l2");
        assert_eq!(lines[3], " >> 5| l5");
        assert_eq!(lines[6], "    8| l8");
    }

    #[test]
    fn test_window_clamped_at_edges() {
        let window = context_window(TEN_LINES, 1);
        assert!(window.starts_with(" >> 1| l1"));
        assert_eq!(window.lines().count(), 4);

        let window = context_window(TEN_LINES, 10);
        assert!(window.trim_end().ends_with(" >> 10| l10"));
        assert_eq!(window.lines().count(), 4);
    }

    #[test]
    fn test_rethrow_message_layout() {
        let err = rethrow(
            Error::UnboundName("user".into()),
            TEN_LINES,
            Some(Path::new("views/page.pjs")),
            5,
        );
        let message = err.to_string();
        assert!(message.starts_with("views/page.pjs:5\n    2| l2\n"));
        assert!(message.ends_with("    8| l8\n\nReferenceError: user is not defined"));
        assert_eq!(err.path(), Some(Path::new("views/page.pjs")));
        assert!(matches!(err.root_cause(), Error::UnboundName(_)));
    }

    #[test]
    fn test_rethrow_without_path() {
        let err = rethrow(Error::type_error("boom"), "only", None, 1);
        assert!(err.to_string().starts_with("pjs:1\n >> 1| only\n"));
        assert_eq!(err.path(), None);
    }
}
