//! Values produced by the pipeline stages.
//!
//! All types are request-scoped and serde-serialisable so the CLI can emit
//! them as JSON. Nothing here is persisted between requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The browser capture of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPage {
    /// The URL that was navigated to.
    pub url: String,
    /// Fully rendered DOM, serialised as HTML.
    pub html: String,
    /// When the DOM was captured.
    pub captured_at: DateTime<Utc>,
    /// Wall-clock time from browser launch to capture.
    pub render_ms: u64,
}

impl RenderedPage {
    /// Length of the HTML in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.html.chars().count()
    }
}

/// The model's answer for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Generated Markdown, exactly as returned by the model.
    pub markdown: String,
    /// Backend label, e.g. "gemini/gemini-1.5-flash".
    pub model: String,
    /// Characters of HTML actually sent.
    pub submitted_chars: usize,
    /// Whether the HTML was cut at the configured cap.
    pub truncated: bool,
    /// Prompt tokens reported by the backend (0 if unknown).
    pub input_tokens: usize,
    /// Completion tokens reported by the backend (0 if unknown).
    pub output_tokens: usize,
    /// Wall-clock duration of the model call.
    pub extract_ms: u64,
}

/// Timing and size figures for a complete scrape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub html_chars: usize,
    pub submitted_chars: usize,
    pub truncated: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub render_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ScrapeStats {
    /// Combine the two stage outputs into one stats record.
    pub fn from_stages(page: &RenderedPage, extraction: &ExtractionResult, total_ms: u64) -> Self {
        Self {
            html_chars: page.char_len(),
            submitted_chars: extraction.submitted_chars,
            truncated: extraction.truncated,
            input_tokens: extraction.input_tokens,
            output_tokens: extraction.output_tokens,
            render_duration_ms: page.render_ms,
            extract_duration_ms: extraction.extract_ms,
            total_duration_ms: total_ms,
        }
    }
}

/// Result of a successful end-to-end scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutput {
    pub page: RenderedPage,
    pub extraction: ExtractionResult,
    pub stats: ScrapeStats,
}

impl ScrapeOutput {
    /// The extracted Markdown.
    pub fn markdown(&self) -> &str {
        &self.extraction.markdown
    }
}
