//! Prompts sent to the VLM by [`crate::engine::VlmEngine`].
//!
//! A custom system prompt from the form replaces [`DEFAULT_SYSTEM_PROMPT`]
//! entirely; the continuity context is added on top of whichever is active.

/// System prompt used when the form leaves the custom prompt empty.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Convert the following PDF page to Markdown.
Return only the Markdown, with no explanation or commentary.
Do not exclude any content from the page.

- Keep the reading order a person would use.
- Use # headings that match the visual hierarchy.
- Render tables as GitHub-flavoured pipe tables.
- Render formulas as LaTeX ($inline$, $$display$$).
- Do not wrap the answer in a code fence.
- Skip page numbers and running headers or footers."#;

/// Context message passed in sequential mode so lists, numbering and heading
/// levels continue across the page break.
pub fn maintain_format_context(prior_page: &str) -> String {
    format!(
        "Markdown must maintain consistent formatting with the following page:\n\n\"\"\"{prior_page}\"\"\""
    )
}
