//! Extraction: turn rendered HTML into article Markdown with a language model.
//!
//! The model is reached through [`TextGenerator`], a single
//! `generate(system, prompt)` call. Two implementations ship with the crate:
//! the built-in Gemini REST client ([`crate::pipeline::gemini`]) and a bridge
//! to any edgequake-llm provider ([`crate::pipeline::provider`]).
//!
//! The HTML is cut to `max_html_chars` *characters* before the prompt is
//! built, so nothing past the cutoff can reach the backend. The model's
//! answer is returned as-is: no trimming, no cleanup, no validation beyond
//! rejecting an answer with no visible text.

use crate::config::ScrapeConfig;
use crate::error::ExtractionError;
use crate::output::{ExtractionResult, RenderedPage};
use crate::prompts::{extraction_prompt, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info};

/// Text produced by one model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Generation {
    /// A generation with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A hosted generative-text model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short label used in logs and error messages, e.g. "gemini/gemini-1.5-flash".
    fn name(&self) -> String;

    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<Generation, ExtractionError>;
}

/// Return at most `max_chars` leading characters of `html`, and whether
/// anything was cut off. Never splits a UTF-8 sequence.
pub fn truncate_html(html: &str, max_chars: usize) -> (&str, bool) {
    match html.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&html[..byte_idx], true),
        None => (html, false),
    }
}

/// Ask the model for the article Markdown of a rendered page.
pub async fn extract_markdown(
    generator: &dyn TextGenerator,
    page: &RenderedPage,
    config: &ScrapeConfig,
) -> Result<ExtractionResult, ExtractionError> {
    let start = Instant::now();
    let (html, truncated) = truncate_html(&page.html, config.max_html_chars);
    let submitted_chars = html.chars().count();
    if truncated {
        debug!(
            "HTML truncated to {} of {} characters",
            submitted_chars,
            page.char_len()
        );
    }

    let system = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let prompt = extraction_prompt(html);

    let model = generator.name();
    info!("Extracting article with {} ({} chars)", model, submitted_chars);
    let generation = generator.generate(system, &prompt).await?;

    if generation.text.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse { provider: model });
    }

    let extract_ms = start.elapsed().as_millis() as u64;
    debug!(
        "{}: {} input tokens, {} output tokens, {}ms",
        model, generation.input_tokens, generation.output_tokens, extract_ms
    );

    Ok(ExtractionResult {
        markdown: generation.text,
        model,
        submitted_chars,
        truncated,
        input_tokens: generation.input_tokens,
        output_tokens: generation.output_tokens,
        extract_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    struct Echo {
        reply: String,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl Echo {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Echo {
        fn name(&self) -> String {
            "echo".into()
        }

        async fn generate(&self, system: &str, prompt: &str) -> Result<Generation, ExtractionError> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok(Generation::text(self.reply.clone()))
        }
    }

    fn page(html: &str) -> RenderedPage {
        RenderedPage {
            url: "https://example.com".into(),
            html: html.into(),
            captured_at: Utc::now(),
            render_ms: 0,
        }
    }

    #[test]
    fn truncate_short_input_is_untouched() {
        assert_eq!(truncate_html("<p>Hi</p>", 100), ("<p>Hi</p>", false));
        assert_eq!(truncate_html("abc", 3), ("abc", false));
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let html = "héllo wörld";
        let (cut, truncated) = truncate_html(html, 5);
        assert_eq!(cut, "héllo");
        assert!(truncated);
    }

    #[test]
    fn truncate_never_splits_multibyte_chars() {
        let html = "日本語のページ";
        let (cut, truncated) = truncate_html(html, 3);
        assert_eq!(cut, "日本語");
        assert!(truncated);
    }

    #[tokio::test]
    async fn prompt_contains_only_the_prefix() {
        let gen = Echo::replying("# Title");
        let config = ScrapeConfig::builder().max_html_chars(10).build().unwrap();
        let html = format!("0123456789{}", "SECRET-TAIL");
        let result = extract_markdown(&gen, &page(&html), &config).await.unwrap();

        let seen = gen.seen.lock().unwrap();
        let (system, prompt) = &seen[0];
        assert_eq!(system, DEFAULT_SYSTEM_PROMPT);
        assert!(prompt.ends_with("0123456789"));
        assert!(!prompt.contains("SECRET-TAIL"));
        assert!(result.truncated);
        assert_eq!(result.submitted_chars, 10);
    }

    #[tokio::test]
    async fn markdown_is_returned_verbatim() {
        let gen = Echo::replying("  # Title\n\nbody\n\n\n");
        let config = ScrapeConfig::default();
        let result = extract_markdown(&gen, &page("<h1>Title</h1>"), &config)
            .await
            .unwrap();
        assert_eq!(result.markdown, "  # Title\n\nbody\n\n\n");
        assert!(!result.truncated);
        assert_eq!(result.model, "echo");
    }

    #[tokio::test]
    async fn blank_answer_is_an_error() {
        let gen = Echo::replying(" \n\t ");
        let err = extract_markdown(&gen, &page("<p>x</p>"), &ScrapeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn custom_system_prompt_is_used() {
        let gen = Echo::replying("ok");
        let config = ScrapeConfig::builder()
            .system_prompt("Only the title.")
            .build()
            .unwrap();
        extract_markdown(&gen, &page("<p>x</p>"), &config).await.unwrap();
        assert_eq!(gen.seen.lock().unwrap()[0].0, "Only the title.");
    }
}
