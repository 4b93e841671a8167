//! Minimal cleanup of raw VLM page output.
//!
//! Models sometimes wrap the whole answer in a ```` ```markdown ```` fence
//! even when told not to, emit CRLF line endings, or sprinkle zero-width
//! characters copied from the rendering. These rules fix only that; the
//! page text itself is left alone.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*?)\n?```$").unwrap());

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}',
];

/// Apply every rule in order: fences, line endings, invisible characters,
/// trailing whitespace.
pub fn tidy_page(raw: &str) -> String {
    let s = strip_outer_fence(raw.trim());
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = s.replace(INVISIBLE, "");
    s.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn strip_outer_fence(input: &str) -> &str {
    RE_OUTER_FENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map_or(input, |m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_markdown_fence() {
        assert_eq!(tidy_page("```markdown\n# Hi\nthere\n```"), "# Hi\nthere");
        assert_eq!(tidy_page("```\n# Hi\n```\n"), "# Hi");
    }

    #[test]
    fn keeps_inner_code_blocks() {
        let page = "Intro\n\n```rust\nfn main() {}\n```\n\nOutro";
        assert_eq!(tidy_page(page), page);
    }

    #[test]
    fn normalises_line_endings_and_whitespace() {
        assert_eq!(tidy_page("a  \r\nb\rc\t\n"), "a\nb\nc");
    }

    #[test]
    fn strips_invisible_characters() {
        assert_eq!(tidy_page("he\u{200B}llo\u{FEFF}"), "hello");
    }
}
