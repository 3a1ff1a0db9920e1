//! Prompts for HTML-to-Markdown extraction.
//!
//! Callers can override the instruction via
//! [`crate::config::ScrapeConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system instruction for the extraction model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert web content extractor. \
Return ONLY clean markdown of the main article. \
Remove ads, navigation, footers, scripts, cookie banners, and other boilerplate. \
Preserve the article's headings, lists, and paragraphs.";

/// Lead-in placed before the HTML in the user prompt.
pub const EXTRACTION_PREAMBLE: &str =
    "Extract the main article/content from this HTML. Return clean markdown only:";

/// Build the user prompt around an (already truncated) HTML fragment.
pub fn extraction_prompt(html: &str) -> String {
    let mut prompt = String::with_capacity(EXTRACTION_PREAMBLE.len() + 2 + html.len());
    prompt.push_str(EXTRACTION_PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(html);
    prompt
}
